use async_trait::async_trait;

use crate::types::Token;

/// Per-token step between the socket and the observers.
///
/// `apply` is infallible on purpose: an implementation that cannot produce
/// its full event must still return a degraded one, so every received
/// token results in exactly one published event.
#[async_trait]
pub trait Transform: Send + Sync + 'static {
    type Event: Clone + Send + Sync + 'static;

    async fn apply(&self, token: Token) -> Self::Event;
}

/// Identity transform: observers receive the raw tokens.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawTokens;

#[async_trait]
impl Transform for RawTokens {
    type Event = Token;

    async fn apply(&self, token: Token) -> Token {
        token
    }
}
