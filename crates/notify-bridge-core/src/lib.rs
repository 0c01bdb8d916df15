pub mod error;
pub mod notify;
pub mod rpc;
pub mod types;

#[cfg(test)]
pub(crate) mod test_util;

pub use error::{CoreError, ListenerError, ObserverError, RpcError};
pub use notify::{
    BlockNotificationListener, ListenerConfig, ListenerState, NotificationListener, Observer,
    RawNotificationListener, WalletNotificationListener,
};
pub use types::{BlockSummary, Token, WalletTransaction};
