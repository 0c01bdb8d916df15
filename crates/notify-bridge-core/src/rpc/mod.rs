//! Bitcoin Core RPC abstraction layer.
//!
//! The bridge only needs a handful of lookups from the daemon, so the
//! [`DaemonRpc`] trait stays small. [`HttpRpcClient`] is the JSON-RPC
//! implementation; tests use `mock::MockRpc`.

mod http_adapter;
#[cfg(test)]
pub mod mock;

pub use http_adapter::HttpRpcClient;

use async_trait::async_trait;

use crate::error::CoreError;
use crate::types::{BlockSummary, ChainInfo, WalletTransaction};

/// The daemon RPC calls the enrichment transforms depend on.
///
/// Implementations handle authentication, connection management, and
/// response decoding internally. Unknown identifiers must be reported as
/// [`CoreError::TxNotFound`] / [`CoreError::BlockNotFound`].
#[async_trait]
pub trait DaemonRpc: Send + Sync {
    /// Resolve a wallet transaction by its txid (`gettransaction`).
    async fn lookup_transaction_by_id(&self, txid: &str) -> Result<WalletTransaction, CoreError>;

    /// Resolve a block header by hash (`getblockheader`).
    async fn lookup_block_by_hash(&self, hash: &str) -> Result<BlockSummary, CoreError>;

    /// Fetch basic chain info (network, block count, pruning status).
    async fn get_blockchain_info(&self) -> Result<ChainInfo, CoreError>;
}
