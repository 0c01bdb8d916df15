//! Native JSON-RPC client for Bitcoin Core compatible endpoints.
//!
//! Implements [`DaemonRpc`](super::DaemonRpc) over JSON-RPC using `reqwest`,
//! with basic or cookie auth, optional wallet endpoint selection, and
//! optional request rate limiting.

mod client;
mod connection;
mod parsing;
mod protocol;

pub use client::HttpRpcClient;
