//! Enrichment transforms: resolve a bare identifier into a full record via
//! the daemon RPC, falling back to a stub record when the lookup fails.
//!
//! Each token is looked up exactly once. Retrying is the RPC client's
//! business; a failed lookup here is logged and degraded, never propagated.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::rpc::DaemonRpc;
use crate::types::{BlockSummary, Token, WalletTransaction};

use super::transform::Transform;

// ==============================================================================
// Wallet Transactions
// ==============================================================================

/// Resolves `-walletnotify` txids into [`WalletTransaction`]s.
pub struct WalletEnricher {
    rpc: Arc<dyn DaemonRpc>,
    lookup_timeout: Option<Duration>,
}

impl WalletEnricher {
    pub fn new(rpc: Arc<dyn DaemonRpc>) -> Self {
        Self {
            rpc,
            lookup_timeout: None,
        }
    }

    /// Give up on a lookup after `timeout` and publish the stub instead.
    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl Transform for WalletEnricher {
    type Event = WalletTransaction;

    async fn apply(&self, token: Token) -> WalletTransaction {
        let txid = token.as_str().trim();
        let lookup = self.rpc.lookup_transaction_by_id(txid);
        match bounded(self.lookup_timeout, lookup).await {
            Ok(tx) => {
                debug!(txid, confirmations = tx.confirmations, "resolved wallet transaction");
                tx
            }
            Err(err) => {
                warn!(txid, error = %err, "transaction lookup failed; publishing stub");
                WalletTransaction::stub(txid)
            }
        }
    }
}

// ==============================================================================
// Blocks
// ==============================================================================

/// Resolves `-blocknotify` block hashes into [`BlockSummary`]s.
pub struct BlockEnricher {
    rpc: Arc<dyn DaemonRpc>,
    lookup_timeout: Option<Duration>,
}

impl BlockEnricher {
    pub fn new(rpc: Arc<dyn DaemonRpc>) -> Self {
        Self {
            rpc,
            lookup_timeout: None,
        }
    }

    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl Transform for BlockEnricher {
    type Event = BlockSummary;

    async fn apply(&self, token: Token) -> BlockSummary {
        let hash = token.as_str().trim();
        match bounded(self.lookup_timeout, self.rpc.lookup_block_by_hash(hash)).await {
            Ok(block) => {
                debug!(hash, height = ?block.height, "resolved block header");
                block
            }
            Err(err) => {
                warn!(hash, error = %err, "block lookup failed; publishing stub");
                BlockSummary::stub(hash)
            }
        }
    }
}

async fn bounded<T, F>(timeout: Option<Duration>, lookup: F) -> Result<T, CoreError>
where
    F: Future<Output = Result<T, CoreError>>,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, lookup)
            .await
            .map_err(|_| CoreError::LookupTimeout(limit))?,
        None => lookup.await,
    }
}
