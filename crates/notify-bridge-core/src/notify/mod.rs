//! The notification bridge.
//!
//! Bitcoin Core runs a shell command on wallet and block events
//! (`-walletnotify`, `-blocknotify`). Pointed at this bridge, that command
//! connects to a local TCP port and writes the event's identifier as one
//! line. [`NotificationSource`] reads those lines, a [`Transform`] turns each
//! one into an event, and the listener fans the event out to its
//! [`Observer`]s.

pub mod enrich;
pub mod listener;
pub mod observer;
pub mod source;
pub mod transform;

pub use enrich::{BlockEnricher, WalletEnricher};
pub use listener::{
    BlockNotificationListener, ListenerConfig, ListenerState, NotificationListener,
    RawNotificationListener, WalletNotificationListener, DEFAULT_STOP_TIMEOUT,
};
pub use observer::{observer_fn, FnObserver, Observer, Subscribers};
pub use source::{NotificationSource, Publisher, MAX_TOKEN_LEN};
pub use transform::{RawTokens, Transform};
