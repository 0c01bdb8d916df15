use crate::error::{CoreError, RpcError};

#[derive(serde::Serialize)]
pub(super) struct JsonRpcRequest<'a> {
    pub(super) jsonrpc: &'static str,
    pub(super) id: u64,
    pub(super) method: &'a str,
    pub(super) params: Vec<serde_json::Value>,
}

#[derive(serde::Deserialize)]
pub(super) struct JsonRpcResponse {
    pub(super) result: Option<serde_json::Value>,
    pub(super) error: Option<serde_json::Value>,
}

/// Parse a JSON-RPC error value into a structured `CoreError`.
///
/// JSON-RPC defines errors as `{"code": <int>, "message": <string>}`.
/// If the error value matches that shape, we produce a `ServerError`;
/// otherwise we fall back to `InvalidResponse` with the raw JSON.
pub(super) fn parse_jsonrpc_error(err: serde_json::Value) -> CoreError {
    #[derive(serde::Deserialize)]
    struct JsonRpcError {
        code: i64,
        message: String,
    }

    if let Ok(parsed) = serde_json::from_value::<JsonRpcError>(err.clone()) {
        CoreError::Rpc(RpcError::ServerError {
            code: parsed.code,
            message: parsed.message,
        })
    } else {
        CoreError::Rpc(RpcError::InvalidResponse(format!(
            "non-standard JSON-RPC error: {err}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_jsonrpc_error_standard_shape() {
        let err = parse_jsonrpc_error(serde_json::json!({
            "code": -5,
            "message": "Invalid or non-wallet transaction id"
        }));
        assert!(matches!(
            err,
            CoreError::Rpc(RpcError::ServerError { code: -5, ref message })
                if message == "Invalid or non-wallet transaction id"
        ));
    }

    #[test]
    fn parse_jsonrpc_error_non_standard_shape() {
        let err = parse_jsonrpc_error(serde_json::json!("boom"));
        assert!(matches!(err, CoreError::Rpc(RpcError::InvalidResponse(_))));
    }
}
