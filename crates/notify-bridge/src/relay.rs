//! Hook side of the bridge: deliver one token and exit.

use std::time::Duration;

use eyre::{eyre, WrapErr};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::cli::RelayArgs;

pub async fn send(args: &RelayArgs) -> eyre::Result<()> {
    let token = args.token.trim();
    if token.is_empty() {
        return Err(eyre!("refusing to relay an empty token"));
    }
    if token.contains('\n') {
        return Err(eyre!("token must be a single line"));
    }

    let limit = Duration::from_secs(args.timeout_secs);
    tokio::time::timeout(limit, write_token(&args.host, args.port, token))
        .await
        .map_err(|_| eyre!("timed out after {limit:?} relaying to {}:{}", args.host, args.port))??;
    tracing::debug!(token, host = %args.host, port = args.port, "relayed notification");
    Ok(())
}

async fn write_token(host: &str, port: u16, token: &str) -> eyre::Result<()> {
    let mut stream = TcpStream::connect((host, port))
        .await
        .with_context(|| format!("connect to notify-bridge at {host}:{port}"))?;
    stream
        .write_all(format!("{token}\n").as_bytes())
        .await
        .context("write token")?;
    stream.shutdown().await.context("close connection")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    use super::*;

    fn args(port: u16, token: &str) -> RelayArgs {
        RelayArgs {
            host: "127.0.0.1".into(),
            port,
            timeout_secs: 5,
            token: token.into(),
        }
    }

    #[tokio::test]
    async fn relays_trimmed_token_as_one_line() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut received = String::new();
            stream.read_to_string(&mut received).await.unwrap();
            received
        });

        send(&args(port, "  abc123 ")).await.unwrap();
        assert_eq!(server.await.unwrap(), "abc123\n");
    }

    #[tokio::test]
    async fn rejects_blank_token() {
        let err = send(&args(1, "   ")).await.unwrap_err();
        assert!(err.to_string().contains("empty token"));
    }

    #[tokio::test]
    async fn reports_unreachable_bridge() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = send(&args(port, "abc123")).await.unwrap_err();
        assert!(format!("{err:#}").contains("connect to notify-bridge"));
    }
}
