use std::io::Write;
use std::sync::Mutex;

use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use notify_bridge_core::{Observer, ObserverError};

#[derive(Serialize)]
struct Envelope<'a, E> {
    received_at: String,
    event: &'a E,
}

/// Writes each event as one JSON object per line.
pub struct JsonLinesObserver<W> {
    out: Mutex<W>,
}

impl JsonLinesObserver<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> JsonLinesObserver<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out.into_inner().unwrap()
    }
}

impl<E, W> Observer<E> for JsonLinesObserver<W>
where
    E: Serialize,
    W: Write + Send,
{
    fn receive(&self, event: E) -> Result<(), ObserverError> {
        let received_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .map_err(|e| ObserverError::rejected(format!("format timestamp: {e}")))?;
        let line = serde_json::to_string(&Envelope {
            received_at,
            event: &event,
        })
        .map_err(|e| ObserverError::rejected(format!("serialize event: {e}")))?;

        let mut out = self
            .out
            .lock()
            .map_err(|_| ObserverError::rejected("output lock poisoned"))?;
        writeln!(out, "{line}")
            .and_then(|()| out.flush())
            .map_err(|e| ObserverError::rejected(format!("write event: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use notify_bridge_core::{Token, WalletTransaction};

    use super::*;

    #[test]
    fn writes_one_json_object_per_event() {
        let observer = JsonLinesObserver::new(Vec::new());
        observer.receive(Token::parse("abc123").unwrap()).unwrap();
        observer.receive(WalletTransaction::stub("badid")).unwrap();

        let written = String::from_utf8(observer.into_inner()).unwrap();
        let lines: Vec<serde_json::Value> = written
            .lines()
            .map(|line| serde_json::from_str(line).expect("valid JSON line"))
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "abc123");
        assert_eq!(lines[1]["event"]["txid"], "badid");
        assert_eq!(lines[1]["event"]["amount"], 0);
        assert!(lines[0]["received_at"].as_str().is_some());
    }
}
