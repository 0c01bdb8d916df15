//! Domain types carried through the notification bridge.
//!
//! A [`Token`] is what the daemon's notify hook writes on the socket. The
//! enrichment transforms turn tokens into [`WalletTransaction`] or
//! [`BlockSummary`] records; [`ChainInfo`] is only used for the startup probe.

use bitcoin::{BlockHash, SignedAmount};
use serde::{Deserialize, Serialize};

// ==============================================================================
// Token
// ==============================================================================

/// One trimmed, non-empty line received from a notify hook connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    /// Trim `line` and wrap it. Returns `None` for blank lines, which are
    /// never published.
    pub fn parse(line: &str) -> Option<Self> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_owned()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Token {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ==============================================================================
// Wallet Transaction
// ==============================================================================

/// Wallet view of a transaction, as returned by `gettransaction`.
///
/// `txid` is kept as text rather than [`bitcoin::Txid`] so that a stub built
/// from an unparseable token still carries exactly what the hook sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub txid: String,
    /// Net effect on the wallet balance; negative for sends.
    #[serde(with = "bitcoin::amount::serde::as_sat")]
    pub amount: SignedAmount,
    #[serde(with = "bitcoin::amount::serde::as_sat::opt", default)]
    pub fee: Option<SignedAmount>,
    /// Negative when the transaction conflicts with the active chain.
    pub confirmations: i64,
    pub block_hash: Option<BlockHash>,
    pub block_height: Option<u32>,
    pub block_time: Option<u64>,
    pub time: Option<u64>,
    pub details: Vec<TransactionDetail>,
    /// Raw serialized transaction, hex encoded.
    pub hex: String,
}

impl WalletTransaction {
    /// Placeholder delivered when enrichment fails: the identifier and
    /// nothing else.
    pub fn stub(txid: impl Into<String>) -> Self {
        Self {
            txid: txid.into(),
            amount: SignedAmount::ZERO,
            fee: None,
            confirmations: 0,
            block_hash: None,
            block_height: None,
            block_time: None,
            time: None,
            details: Vec::new(),
            hex: String::new(),
        }
    }

    pub fn is_stub(&self) -> bool {
        *self == Self::stub(self.txid.clone())
    }
}

/// One wallet-relevant output or input of a [`WalletTransaction`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionDetail {
    pub address: Option<String>,
    pub category: Category,
    #[serde(with = "bitcoin::amount::serde::as_sat")]
    pub amount: SignedAmount,
    pub vout: u32,
    pub label: Option<String>,
}

/// Wallet category of a transaction detail. Unknown categories reported by
/// newer daemons are preserved verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    Send,
    Receive,
    Generate,
    Immature,
    Orphan,
    Other(String),
}

impl From<String> for Category {
    fn from(value: String) -> Self {
        match value.as_str() {
            "send" => Self::Send,
            "receive" => Self::Receive,
            "generate" => Self::Generate,
            "immature" => Self::Immature,
            "orphan" => Self::Orphan,
            _ => Self::Other(value),
        }
    }
}

impl From<Category> for String {
    fn from(value: Category) -> Self {
        value.to_string()
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Send => write!(f, "send"),
            Self::Receive => write!(f, "receive"),
            Self::Generate => write!(f, "generate"),
            Self::Immature => write!(f, "immature"),
            Self::Orphan => write!(f, "orphan"),
            Self::Other(other) => f.write_str(other),
        }
    }
}

// ==============================================================================
// Block Summary
// ==============================================================================

/// Header-level view of a block, as returned by `getblockheader`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSummary {
    pub hash: String,
    pub height: Option<u32>,
    pub confirmations: i64,
    pub time: Option<u64>,
    pub tx_count: Option<u64>,
    pub previous_block_hash: Option<BlockHash>,
}

impl BlockSummary {
    pub fn stub(hash: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            height: None,
            confirmations: 0,
            time: None,
            tx_count: None,
            previous_block_hash: None,
        }
    }

    pub fn is_stub(&self) -> bool {
        *self == Self::stub(self.hash.clone())
    }
}

// ==============================================================================
// Chain Info
// ==============================================================================

/// Basic chain information from `getblockchaininfo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainInfo {
    pub chain: String,
    pub blocks: u64,
    #[serde(rename = "bestblockhash")]
    pub best_block_hash: BlockHash,
    pub pruned: bool,
}
