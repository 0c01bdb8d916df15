use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bitcoin::hashes::Hash;
use bitcoin::BlockHash;

use crate::error::{CoreError, RpcError};
use crate::types::{BlockSummary, ChainInfo, WalletTransaction};

use super::DaemonRpc;

/// A mock daemon RPC backend for testing. Returns canned records from maps
/// populated via the builder pattern and counts lookups.
pub struct MockRpc {
    transactions: HashMap<String, WalletTransaction>,
    blocks: HashMap<String, BlockSummary>,
    chain_info: ChainInfo,
    unavailable: bool,
    delay: Option<Duration>,
    lookups: AtomicUsize,
}

impl MockRpc {
    pub fn builder() -> MockRpcBuilder {
        MockRpcBuilder {
            transactions: HashMap::new(),
            blocks: HashMap::new(),
            chain_info: ChainInfo {
                chain: "regtest".into(),
                blocks: 100,
                best_block_hash: BlockHash::all_zeros(),
                pruned: false,
            },
            unavailable: false,
            delay: None,
        }
    }

    /// Number of lookup calls served so far, successful or not.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    async fn begin_lookup(&self) -> Result<(), CoreError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.unavailable {
            return Err(CoreError::Rpc(RpcError::InvalidResponse(
                "mock RPC channel unavailable".into(),
            )));
        }
        Ok(())
    }
}

pub struct MockRpcBuilder {
    transactions: HashMap<String, WalletTransaction>,
    blocks: HashMap<String, BlockSummary>,
    chain_info: ChainInfo,
    unavailable: bool,
    delay: Option<Duration>,
}

impl MockRpcBuilder {
    pub fn with_tx(mut self, tx: WalletTransaction) -> Self {
        self.transactions.insert(tx.txid.clone(), tx);
        self
    }

    pub fn with_block(mut self, block: BlockSummary) -> Self {
        self.blocks.insert(block.hash.clone(), block);
        self
    }

    /// Every lookup fails as if the RPC channel were down.
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    /// Every lookup sleeps for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn build(self) -> MockRpc {
        MockRpc {
            transactions: self.transactions,
            blocks: self.blocks,
            chain_info: self.chain_info,
            unavailable: self.unavailable,
            delay: self.delay,
            lookups: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl DaemonRpc for MockRpc {
    async fn lookup_transaction_by_id(&self, txid: &str) -> Result<WalletTransaction, CoreError> {
        self.begin_lookup().await?;
        self.transactions
            .get(txid)
            .cloned()
            .ok_or_else(|| CoreError::TxNotFound(txid.to_owned()))
    }

    async fn lookup_block_by_hash(&self, hash: &str) -> Result<BlockSummary, CoreError> {
        self.begin_lookup().await?;
        self.blocks
            .get(hash)
            .cloned()
            .ok_or_else(|| CoreError::BlockNotFound(hash.to_owned()))
    }

    async fn get_blockchain_info(&self) -> Result<ChainInfo, CoreError> {
        Ok(self.chain_info.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::make_wallet_tx;

    #[tokio::test]
    async fn lookup_returns_canned_transaction() {
        let rpc = MockRpc::builder()
            .with_tx(make_wallet_tx("abc123", 5))
            .build();
        let tx = rpc.lookup_transaction_by_id("abc123").await.unwrap();
        assert_eq!(tx, make_wallet_tx("abc123", 5));
        assert_eq!(rpc.lookups(), 1);
    }

    #[tokio::test]
    async fn unknown_txid_is_not_found() {
        let rpc = MockRpc::builder().build();
        let err = rpc.lookup_transaction_by_id("badid").await.unwrap_err();
        assert!(matches!(err, CoreError::TxNotFound(id) if id == "badid"));
    }

    #[tokio::test]
    async fn unavailable_channel_fails_every_lookup() {
        let rpc = MockRpc::builder()
            .with_tx(make_wallet_tx("abc123", 5))
            .unavailable()
            .build();
        assert!(rpc.lookup_transaction_by_id("abc123").await.is_err());
        assert!(rpc.lookup_block_by_hash("00").await.is_err());
        assert_eq!(rpc.lookups(), 2);
    }
}
