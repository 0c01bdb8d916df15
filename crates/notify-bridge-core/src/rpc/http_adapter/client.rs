use std::num::NonZeroU32;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::header;
use tracing::{debug, trace};

use crate::error::{CoreError, RpcError};
use crate::types::{BlockSummary, ChainInfo, WalletTransaction};

use super::super::DaemonRpc;
use super::connection::{parse_connection, resolve_auth};
use super::parsing::{parse_block_header, parse_wallet_transaction};
use super::protocol::{parse_jsonrpc_error, JsonRpcRequest, JsonRpcResponse};

/// Bitcoin Core's `RPC_INVALID_ADDRESS_OR_KEY`, returned for unknown txids
/// and block hashes.
const RPC_INVALID_ADDRESS_OR_KEY: i64 = -5;
/// `RPC_INVALID_PARAMETER`, returned by `gettransaction` for ids that are
/// not valid hex.
const RPC_INVALID_PARAMETER: i64 = -8;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Bitcoin Core JSON-RPC client over HTTP(S).
pub struct HttpRpcClient {
    client: reqwest::Client,
    url: String,
    auth: Option<(String, String)>,
    limiter: Option<DirectRateLimiter>,
    next_id: AtomicU64,
}

impl HttpRpcClient {
    /// Create a new client for an HTTP URL.
    ///
    /// Authentication precedence:
    /// 1. explicit `user` + `pass`
    /// 2. cookie file (`username:password`) from `cookie_file`
    /// 3. no auth
    ///
    /// `wallet` selects a loaded wallet via the `/wallet/<name>` endpoint,
    /// which `gettransaction` needs when the daemon has several wallets.
    /// If `requests_per_second` is set, outbound calls are rate-limited.
    pub fn new(
        connection: &str,
        user: Option<&str>,
        pass: Option<&str>,
        cookie_file: Option<&Path>,
        wallet: Option<&str>,
        requests_per_second: Option<u32>,
    ) -> Result<Self, CoreError> {
        let auth = resolve_auth(user, pass, cookie_file)?;
        let url = parse_connection(connection, wallet)?;

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .tcp_nodelay(true)
            .build()
            .map_err(RpcError::Transport)?;

        let limiter = match requests_per_second {
            None => None,
            Some(limit) => {
                let limit = NonZeroU32::new(limit).ok_or_else(|| {
                    CoreError::InvalidConfig("requests_per_second must be at least 1".to_owned())
                })?;
                Some(RateLimiter::direct(Quota::per_second(limit)))
            }
        };

        Ok(Self {
            client,
            url,
            auth,
            limiter,
            next_id: AtomicU64::new(initial_request_id()),
        })
    }

    fn next_request_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn wait_for_rate_limit(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }

    async fn rpc_call(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<serde_json::Value, CoreError> {
        self.wait_for_rate_limit().await;
        let id = self.next_request_id();
        debug!(
            rpc.id = id,
            rpc.method = method,
            rpc.params = params.len(),
            "rpc call"
        );
        let req = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };

        let mut builder = self
            .client
            .post(&self.url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&req);
        if let Some((ref user, ref pass)) = self.auth {
            builder = builder.basic_auth(user, Some(pass));
        }

        let response = builder.send().await.map_err(RpcError::Transport)?;
        let status = response.status();

        let body = response.text().await.map_err(RpcError::Transport)?;
        debug!(rpc.id = id, rpc.method = method, %status, body_len = body.len(), "rpc response");
        trace!(rpc.id = id, rpc.method = method, body = %body, "rpc response body");

        // Bitcoin Core answers RPC errors with HTTP 404/500 and a JSON body,
        // so the status alone says nothing; decode first.
        let decoded: JsonRpcResponse = serde_json::from_str(&body).map_err(|e| {
            RpcError::InvalidResponse(format!(
                "decode JSON-RPC response: {e}; status={status}; body={body}"
            ))
        })?;

        if let Some(err) = decoded.error.filter(|err| !err.is_null()) {
            return Err(parse_jsonrpc_error(err));
        }

        Ok(decoded.result.unwrap_or(serde_json::Value::Null))
    }
}

#[async_trait]
impl DaemonRpc for HttpRpcClient {
    async fn lookup_transaction_by_id(&self, txid: &str) -> Result<WalletTransaction, CoreError> {
        let raw = self
            .rpc_call(
                "gettransaction",
                vec![serde_json::json!(txid), serde_json::json!(true)],
            )
            .await
            .map_err(|err| normalize_not_found(err, || CoreError::TxNotFound(txid.to_owned())))?;
        parse_wallet_transaction(raw)
    }

    async fn lookup_block_by_hash(&self, hash: &str) -> Result<BlockSummary, CoreError> {
        let raw = self
            .rpc_call(
                "getblockheader",
                vec![serde_json::json!(hash), serde_json::json!(true)],
            )
            .await
            .map_err(|err| normalize_not_found(err, || CoreError::BlockNotFound(hash.to_owned())))?;
        parse_block_header(raw)
    }

    async fn get_blockchain_info(&self) -> Result<ChainInfo, CoreError> {
        let raw = self.rpc_call("getblockchaininfo", Vec::new()).await?;
        let info: ChainInfo = serde_json::from_value(raw).map_err(|e| {
            CoreError::InvalidResponse(format!("invalid getblockchaininfo result: {e}"))
        })?;
        Ok(info)
    }
}

fn initial_request_id() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(1)
}

// ==============================================================================
// RPC Error Normalization
// ==============================================================================

/// Convert Bitcoin Core "unknown id" JSON-RPC responses into a typed
/// not-found error, preserving other RPC/transport failures as-is.
fn normalize_not_found(err: CoreError, not_found: impl FnOnce() -> CoreError) -> CoreError {
    match err {
        CoreError::Rpc(RpcError::ServerError { code, .. })
            if code == RPC_INVALID_ADDRESS_OR_KEY || code == RPC_INVALID_PARAMETER =>
        {
            not_found()
        }
        other => other,
    }
}
