use std::net::SocketAddr;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("RPC communication failure: {0}")]
    Rpc(#[from] RpcError),

    #[error("transaction not found: {0}")]
    TxNotFound(String),

    #[error("block not found: {0}")]
    BlockNotFound(String),

    #[error("invalid RPC response data: {0}")]
    InvalidResponse(String),

    #[error("RPC lookup timed out after {0:?}")]
    LookupTimeout(std::time::Duration),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Failures on the JSON-RPC channel itself, as opposed to domain errors
/// such as an unknown transaction id.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server returned error {code}: {message}")]
    ServerError { code: i64, message: String },

    #[error("invalid JSON-RPC response: {0}")]
    InvalidResponse(String),
}

/// Errors surfaced by the notification listener and its worker.
///
/// Only [`ListenerError::Bind`] and [`ListenerError::Accept`] end a
/// listener's life; the remaining variants are logged where they occur and
/// the accept loop carries on.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("failed to bind notification socket on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("listening socket failed: {0}")]
    Accept(#[source] std::io::Error),

    #[error("connection error: {0}")]
    Connection(#[source] std::io::Error),

    #[error("notification line exceeds {max} bytes")]
    LineTooLong { max: usize },

    #[error("connection idle for longer than {0:?}")]
    ConnectionTimeout(std::time::Duration),

    #[error("listener has already been stopped")]
    AlreadyStopped,
}

/// Failure reported by (or caught from) a single observer during fan-out.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ObserverError {
    #[error("observer rejected event: {0}")]
    Rejected(String),

    #[error("observer panicked: {0}")]
    Panicked(String),
}

impl ObserverError {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }
}
