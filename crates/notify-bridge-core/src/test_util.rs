//! Shared test helpers for `notify-bridge-core` unit tests.
//!
//! Recording and misbehaving observers, a hook-like client that writes
//! lines to a listener, and builders for canned RPC records.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bitcoin::SignedAmount;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::watch;

use crate::error::ObserverError;
use crate::notify::{ListenerState, Observer};
use crate::types::WalletTransaction;

const WAIT_LIMIT: Duration = Duration::from_secs(5);

// ==============================================================================
// Observers
// ==============================================================================

/// Ordered log of `(observer name, event)` pairs shared by several
/// recording observers, so tests can assert cross-observer order.
pub struct Journal<E> {
    entries: Mutex<Vec<(String, E)>>,
}

impl<E: Clone> Journal<E> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(Vec::new()),
        })
    }

    pub fn entries(&self) -> Vec<(String, E)> {
        self.entries.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Poll until at least `count` entries are recorded.
    pub async fn wait_for(&self, count: usize) {
        let waited = tokio::time::timeout(WAIT_LIMIT, async {
            while self.len() < count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(
            waited.is_ok(),
            "expected {count} events, got {} within {WAIT_LIMIT:?}",
            self.len()
        );
    }
}

pub struct RecordingObserver<E> {
    name: String,
    journal: Arc<Journal<E>>,
}

impl<E: Clone> RecordingObserver<E> {
    pub fn new(name: &str, journal: &Arc<Journal<E>>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_owned(),
            journal: Arc::clone(journal),
        })
    }
}

impl<E: Clone + Send> Observer<E> for RecordingObserver<E> {
    fn receive(&self, event: E) -> Result<(), ObserverError> {
        self.journal
            .entries
            .lock()
            .unwrap()
            .push((self.name.clone(), event));
        Ok(())
    }
}

/// Always rejects the event.
pub struct FailingObserver;

impl<E> Observer<E> for FailingObserver {
    fn receive(&self, _event: E) -> Result<(), ObserverError> {
        Err(ObserverError::rejected("failing observer"))
    }
}

/// Panics on every event.
pub struct PanickingObserver;

impl<E> Observer<E> for PanickingObserver {
    fn receive(&self, _event: E) -> Result<(), ObserverError> {
        panic!("panicking observer");
    }
}

// ==============================================================================
// Hook Client
// ==============================================================================

/// Behave like a notify hook: connect, write each line, close.
pub async fn send_lines(addr: SocketAddr, lines: &[&str]) {
    let mut stream = TcpStream::connect(addr).await.expect("connect to listener");
    for line in lines {
        stream
            .write_all(format!("{line}\n").as_bytes())
            .await
            .expect("write line");
    }
    stream.shutdown().await.expect("shutdown write half");
}

pub async fn wait_for_state(states: &mut watch::Receiver<ListenerState>, target: ListenerState) {
    tokio::time::timeout(WAIT_LIMIT, states.wait_for(|state| *state == target))
        .await
        .expect("state transition within limit")
        .expect("listener state channel open");
}

// ==============================================================================
// Records
// ==============================================================================

/// A confirmed wallet transaction with the given net amount in satoshis.
pub fn make_wallet_tx(txid: &str, sats: i64) -> WalletTransaction {
    let mut tx = WalletTransaction::stub(txid);
    tx.amount = SignedAmount::from_sat(sats);
    tx.confirmations = 1;
    tx.block_height = Some(101);
    tx.time = Some(1_700_000_000);
    tx.hex = "0200000000".to_owned();
    tx
}
