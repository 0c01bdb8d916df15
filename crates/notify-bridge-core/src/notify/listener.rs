//! Lifecycle wrapper around a [`NotificationSource`] running on its own task.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ListenerError;
use crate::rpc::DaemonRpc;

use super::enrich::{BlockEnricher, WalletEnricher};
use super::observer::{Observer, Subscribers};
use super::source::{NotificationSource, Publisher};
use super::transform::{RawTokens, Transform};

/// How long `stop` waits for the worker before abandoning it.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Extra time granted to an aborted worker to tear down and release its
/// socket.
const ABORT_GRACE: Duration = Duration::from_millis(500);

// ==============================================================================
// Configuration & State
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerConfig {
    pub bind: IpAddr,
    /// Port to listen on; `0` picks an ephemeral port.
    pub port: u16,
    pub stop_timeout: Duration,
    /// Drop a connection that sends nothing for this long. `None` lets a
    /// connection stay open for as long as the peer wants.
    pub connection_timeout: Option<Duration>,
}

impl ListenerConfig {
    /// Loopback listener on `port` with default timeouts.
    pub fn new(port: u16) -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            connection_timeout: None,
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

/// Observable lifecycle of a listener.
///
/// `Created → Accepting ⇄ Serving → Stopped`, or `→ Terminated` when the
/// listening socket fails on its own. Both end states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerState {
    Created,
    Accepting,
    Serving,
    Stopped,
    Terminated,
}

impl ListenerState {
    pub fn is_running(self) -> bool {
        matches!(self, Self::Accepting | Self::Serving)
    }

    pub fn is_finished(self) -> bool {
        matches!(self, Self::Stopped | Self::Terminated)
    }
}

// ==============================================================================
// Listener
// ==============================================================================

struct Worker {
    cancel: CancellationToken,
    handle: JoinHandle<Result<(), ListenerError>>,
}

/// Notification listener: owns the socket worker and the observer registry,
/// and runs every received token through `T` before fan-out.
///
/// An instance is single-use. Once stopped (or terminated by a socket
/// failure) it cannot be started again; build a new one instead.
pub struct NotificationListener<T: Transform> {
    config: ListenerConfig,
    transform: Arc<T>,
    subscribers: Arc<Subscribers<T::Event>>,
    state: Arc<watch::Sender<ListenerState>>,
    worker: Mutex<Option<Worker>>,
    local_addr: OnceLock<SocketAddr>,
}

impl<T: Transform> NotificationListener<T> {
    pub fn new(config: ListenerConfig, transform: T) -> Self {
        let (state, _) = watch::channel(ListenerState::Created);
        Self {
            config,
            transform: Arc::new(transform),
            subscribers: Arc::default(),
            state: Arc::new(state),
            worker: Mutex::new(None),
            local_addr: OnceLock::new(),
        }
    }

    pub fn config(&self) -> &ListenerConfig {
        &self.config
    }

    /// Register an observer; `false` if it was already registered.
    pub fn subscribe(&self, observer: Arc<dyn Observer<T::Event>>) -> bool {
        self.subscribers.subscribe(observer)
    }

    /// Remove an observer; `false` if it was not registered.
    pub fn unsubscribe<O>(&self, observer: &Arc<O>) -> bool
    where
        O: Observer<T::Event> + ?Sized,
    {
        self.subscribers.unsubscribe(observer)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn state(&self) -> ListenerState {
        *self.state.borrow()
    }

    /// Follow state transitions, e.g. to wait for the worker to be serving.
    pub fn watch_state(&self) -> watch::Receiver<ListenerState> {
        self.state.subscribe()
    }

    /// Address actually bound, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }

    /// Bind the socket and launch the worker. Calling `start` on a running
    /// listener is a no-op that returns the bound address.
    pub async fn start(&self) -> Result<SocketAddr, ListenerError> {
        let mut worker = self.worker.lock().await;
        if self.state().is_finished() {
            return Err(ListenerError::AlreadyStopped);
        }
        if let (Some(_), Some(addr)) = (worker.as_ref(), self.local_addr()) {
            return Ok(addr);
        }

        let source =
            NotificationSource::bind(self.config.socket_addr(), self.config.connection_timeout)
                .await?;
        let addr = source.local_addr().map_err(|err| ListenerError::Bind {
            addr: self.config.socket_addr(),
            source: err,
        })?;
        let _ = self.local_addr.set(addr);

        let cancel = CancellationToken::new();
        let publisher = Publisher::new(Arc::clone(&self.transform), Arc::clone(&self.subscribers));
        let state = Arc::clone(&self.state);
        state.send_replace(ListenerState::Accepting);

        let run = source.run(publisher, cancel.clone(), Arc::clone(&state));
        let handle = tokio::spawn(async move {
            let result = run.await;
            let end = if result.is_ok() {
                ListenerState::Stopped
            } else {
                ListenerState::Terminated
            };
            state.send_replace(end);
            result
        });

        info!(%addr, "notification listener started");
        *worker = Some(Worker { cancel, handle });
        Ok(addr)
    }

    /// Stop accepting, close the socket, and wait for the worker.
    ///
    /// A connection being served when `stop` is called may finish first. If
    /// the worker has not exited within `stop_timeout` it is aborted. Calling
    /// `stop` again, or on a listener that never started, is a no-op.
    pub async fn stop(&self) {
        let mut worker = self.worker.lock().await;
        let Some(Worker { cancel, mut handle }) = worker.take() else {
            self.state.send_if_modified(|state| {
                if *state == ListenerState::Created {
                    *state = ListenerState::Stopped;
                    true
                } else {
                    false
                }
            });
            return;
        };

        cancel.cancel();
        match tokio::time::timeout(self.config.stop_timeout, &mut handle).await {
            Ok(Ok(Ok(()))) => debug!("notification worker exited"),
            Ok(Ok(Err(err))) => warn!(error = %err, "notification worker had already terminated"),
            Ok(Err(err)) => warn!(error = %err, "notification worker panicked"),
            Err(_) => {
                warn!(
                    timeout = ?self.config.stop_timeout,
                    "notification worker did not exit in time; abandoning it"
                );
                handle.abort();
                if tokio::time::timeout(ABORT_GRACE, handle).await.is_err() {
                    warn!("abandoned notification worker is still running");
                }
            }
        }

        self.state.send_if_modified(|state| {
            if *state == ListenerState::Terminated || *state == ListenerState::Stopped {
                false
            } else {
                *state = ListenerState::Stopped;
                true
            }
        });
        info!(addr = ?self.local_addr(), "notification listener stopped");
    }
}

impl<T: Transform> Drop for NotificationListener<T> {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.get_mut().take() {
            worker.cancel.cancel();
            worker.handle.abort();
        }
    }
}

// ==============================================================================
// Specializations
// ==============================================================================

/// Publishes raw tokens as received.
pub type RawNotificationListener = NotificationListener<RawTokens>;

/// Publishes [`WalletTransaction`](crate::types::WalletTransaction)s resolved
/// from `-walletnotify` txids.
pub type WalletNotificationListener = NotificationListener<WalletEnricher>;

/// Publishes [`BlockSummary`](crate::types::BlockSummary)s resolved from
/// `-blocknotify` block hashes.
pub type BlockNotificationListener = NotificationListener<BlockEnricher>;

impl NotificationListener<RawTokens> {
    pub fn raw(config: ListenerConfig) -> Self {
        Self::new(config, RawTokens)
    }
}

impl NotificationListener<WalletEnricher> {
    pub fn wallet(config: ListenerConfig, rpc: Arc<dyn DaemonRpc>) -> Self {
        Self::new(config, WalletEnricher::new(rpc))
    }
}

impl NotificationListener<BlockEnricher> {
    pub fn block(config: ListenerConfig, rpc: Arc<dyn DaemonRpc>) -> Self {
        Self::new(config, BlockEnricher::new(rpc))
    }
}
