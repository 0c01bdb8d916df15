//! The socket side of the bridge: a serialized accept-and-read loop.
//!
//! Connections are served strictly one at a time. Hook processes connect,
//! write a line, and exit, so a second connection simply waits in the
//! listen backlog until the first one is finished. Events from one
//! connection are therefore published in line order, and connections in
//! arrival order.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::ListenerError;
use crate::types::Token;

use super::listener::ListenerState;
use super::observer::Subscribers;
use super::transform::Transform;

/// Longest line accepted from a hook. Txids and block hashes are 64 hex
/// characters; anything near this limit is not a notification.
pub const MAX_TOKEN_LEN: usize = 4096;

/// Pause before accepting again after the process ran out of descriptors
/// or memory.
const ACCEPT_BACKOFF: Duration = Duration::from_secs(1);

/// Transform-then-fan-out step invoked for every received token.
pub struct Publisher<T: Transform> {
    transform: Arc<T>,
    subscribers: Arc<Subscribers<T::Event>>,
}

impl<T: Transform> Publisher<T> {
    pub fn new(transform: Arc<T>, subscribers: Arc<Subscribers<T::Event>>) -> Self {
        Self {
            transform,
            subscribers,
        }
    }

    /// Transform `token` and deliver the result. Returns the number of
    /// observers that accepted the event.
    pub async fn publish(&self, token: Token) -> usize {
        let event = self.transform.apply(token).await;
        self.subscribers.publish(&event)
    }
}

/// A bound notification socket, ready to run its accept loop.
pub struct NotificationSource {
    listener: TcpListener,
    connection_timeout: Option<Duration>,
}

impl NotificationSource {
    /// Bind the listening socket. Fails with [`ListenerError::Bind`] when the
    /// address is unavailable.
    pub async fn bind(
        addr: SocketAddr,
        connection_timeout: Option<Duration>,
    ) -> Result<Self, ListenerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ListenerError::Bind { addr, source })?;
        Ok(Self {
            listener,
            connection_timeout,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept and serve connections until `cancel` fires or the listening
    /// socket fails.
    ///
    /// Cancellation is only observed while waiting in `accept`; a connection
    /// already being served runs until EOF or error. The listening socket is
    /// closed when this returns, since `self` is consumed.
    pub async fn run<T: Transform>(
        self,
        publisher: Publisher<T>,
        cancel: CancellationToken,
        state: Arc<watch::Sender<ListenerState>>,
    ) -> Result<(), ListenerError> {
        let local = self.listener.local_addr().ok();
        info!(addr = ?local, "notification source accepting connections");

        loop {
            state.send_replace(ListenerState::Accepting);
            let accepted = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    info!(addr = ?local, "notification source cancelled; closing socket");
                    return Ok(());
                }
                accepted = self.listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer)) => {
                    state.send_replace(ListenerState::Serving);
                    match self.serve_connection(stream, peer, &publisher).await {
                        Ok(published) => {
                            debug!(%peer, published, "notification connection closed");
                        }
                        Err(err) => {
                            warn!(%peer, error = %err, "notification connection failed");
                        }
                    }
                }
                Err(err) => recover_from_accept_error(err, &cancel, local).await?,
            }
        }
    }

    /// Read lines from one connection until EOF, publishing each non-blank
    /// line. Returns the number of tokens published.
    async fn serve_connection<T: Transform>(
        &self,
        stream: TcpStream,
        peer: SocketAddr,
        publisher: &Publisher<T>,
    ) -> Result<usize, ListenerError> {
        let mut lines = FramedRead::new(stream, LinesCodec::new_with_max_length(MAX_TOKEN_LEN));
        let mut published = 0;

        loop {
            let next = match self.connection_timeout {
                Some(limit) => tokio::time::timeout(limit, lines.next())
                    .await
                    .map_err(|_| ListenerError::ConnectionTimeout(limit))?,
                None => lines.next().await,
            };
            let Some(line) = next else {
                return Ok(published);
            };
            let line = line.map_err(codec_error)?;

            let Some(token) = Token::parse(&line) else {
                continue;
            };
            debug!(%peer, %token, "received notification");
            publisher.publish(token).await;
            published += 1;
        }
    }
}

fn codec_error(err: LinesCodecError) -> ListenerError {
    match err {
        LinesCodecError::MaxLineLengthExceeded => ListenerError::LineTooLong { max: MAX_TOKEN_LEN },
        LinesCodecError::Io(err) => ListenerError::Connection(err),
    }
}

/// How the accept loop proceeds after `accept` failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AcceptFailure {
    /// Only the pending connection was affected.
    Connection,
    /// The process is short on descriptors or memory; the socket is fine.
    Exhausted,
    /// The listening socket is unusable.
    Fatal,
}

fn classify_accept_error(err: &io::Error) -> AcceptFailure {
    match err.kind() {
        io::ErrorKind::ConnectionAborted
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::Interrupted
        | io::ErrorKind::TimedOut => AcceptFailure::Connection,
        io::ErrorKind::OutOfMemory => AcceptFailure::Exhausted,
        _ if err.raw_os_error().is_some_and(is_exhaustion_errno) => AcceptFailure::Exhausted,
        _ => AcceptFailure::Fatal,
    }
}

#[cfg(unix)]
fn is_exhaustion_errno(code: i32) -> bool {
    matches!(code, libc::EMFILE | libc::ENFILE | libc::ENOBUFS | libc::ENOMEM)
}

#[cfg(not(unix))]
fn is_exhaustion_errno(_code: i32) -> bool {
    false
}

/// Log an accept failure and decide whether the loop may accept again.
/// Resource exhaustion backs off first, returning early on cancellation.
async fn recover_from_accept_error(
    err: io::Error,
    cancel: &CancellationToken,
    local: Option<SocketAddr>,
) -> Result<(), ListenerError> {
    match classify_accept_error(&err) {
        AcceptFailure::Connection => {
            warn!(error = %err, "failed to accept notification connection");
            Ok(())
        }
        AcceptFailure::Exhausted => {
            warn!(
                addr = ?local,
                error = %err,
                backoff = ?ACCEPT_BACKOFF,
                "out of resources accepting notification connection; backing off"
            );
            tokio::select! {
                () = cancel.cancelled() => {}
                () = tokio::time::sleep(ACCEPT_BACKOFF) => {}
            }
            Ok(())
        }
        AcceptFailure::Fatal => {
            error!(addr = ?local, error = %err, "notification socket failed");
            Err(ListenerError::Accept(err))
        }
    }
}
