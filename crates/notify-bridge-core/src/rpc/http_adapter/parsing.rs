use bitcoin::{BlockHash, SignedAmount};

use crate::error::CoreError;
use crate::types::{BlockSummary, Category, TransactionDetail, WalletTransaction};

pub(super) fn parse_wallet_transaction(
    raw: serde_json::Value,
) -> Result<WalletTransaction, CoreError> {
    let txid = parse_string_required(raw.get("txid"), "txid")?;
    let amount = parse_btc_amount(
        raw.get("amount")
            .ok_or_else(|| CoreError::InvalidResponse("missing amount".into()))?,
    )?;
    let fee = raw.get("fee").map(parse_btc_amount).transpose()?;
    let confirmations =
        parse_integer_required::<i64, true>(raw.get("confirmations"), "confirmations")?;
    let block_hash = parse_opt_block_hash(raw.get("blockhash"))?;
    let block_height = parse_integer_optional::<u32, false>(raw.get("blockheight"));
    let block_time = parse_integer_optional::<u64, false>(raw.get("blocktime"));
    let time = parse_integer_optional::<u64, false>(raw.get("time"));
    let details = match raw.get("details").and_then(serde_json::Value::as_array) {
        Some(details) => parse_details(details)?,
        None => Vec::new(),
    };
    let hex = raw
        .get("hex")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default()
        .to_owned();

    Ok(WalletTransaction {
        txid,
        amount,
        fee,
        confirmations,
        block_hash,
        block_height,
        block_time,
        time,
        details,
        hex,
    })
}

fn parse_details(details: &[serde_json::Value]) -> Result<Vec<TransactionDetail>, CoreError> {
    details
        .iter()
        .map(|detail| {
            let category = parse_string_required(detail.get("category"), "details.category")?;
            let amount = parse_btc_amount(detail.get("amount").ok_or_else(|| {
                CoreError::InvalidResponse("missing amount in details".into())
            })?)?;
            let vout = parse_integer_required::<u32, false>(detail.get("vout"), "details.vout")?;

            Ok(TransactionDetail {
                address: parse_string_optional(detail.get("address")),
                category: Category::from(category),
                amount,
                vout,
                label: parse_string_optional(detail.get("label")),
            })
        })
        .collect()
}

pub(super) fn parse_block_header(raw: serde_json::Value) -> Result<BlockSummary, CoreError> {
    let hash = parse_string_required(raw.get("hash"), "hash")?;
    let confirmations =
        parse_integer_required::<i64, true>(raw.get("confirmations"), "confirmations")?;

    Ok(BlockSummary {
        hash,
        height: parse_integer_optional::<u32, false>(raw.get("height")),
        confirmations,
        time: parse_integer_optional::<u64, false>(raw.get("time")),
        tx_count: parse_integer_optional::<u64, false>(raw.get("nTx")),
        previous_block_hash: parse_opt_block_hash(raw.get("previousblockhash"))?,
    })
}

fn parse_string_required(value: Option<&serde_json::Value>, field: &str) -> Result<String, CoreError> {
    value
        .and_then(serde_json::Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| CoreError::InvalidResponse(format!("missing {field}")))
}

fn parse_string_optional(value: Option<&serde_json::Value>) -> Option<String> {
    value.and_then(serde_json::Value::as_str).map(str::to_owned)
}

fn parse_opt_block_hash(value: Option<&serde_json::Value>) -> Result<Option<BlockHash>, CoreError> {
    match value.and_then(serde_json::Value::as_str) {
        None => Ok(None),
        Some(s) => s
            .parse()
            .map(Some)
            .map_err(|e| CoreError::InvalidResponse(format!("invalid blockhash: {e}"))),
    }
}

pub(super) fn parse_integer_required<T, const SIGNED: bool>(
    value: Option<&serde_json::Value>,
    field: &str,
) -> Result<T, CoreError>
where
    T: TryFrom<i64> + TryFrom<u64>,
{
    parse_integer::<T, SIGNED, true>(value, field)?
        .ok_or_else(|| CoreError::InvalidResponse(format!("missing {field}")))
}

pub(super) fn parse_integer_optional<T, const SIGNED: bool>(
    value: Option<&serde_json::Value>,
) -> Option<T>
where
    T: TryFrom<i64> + TryFrom<u64>,
{
    parse_integer::<T, SIGNED, false>(value, "value")
        .ok()
        .flatten()
}

// `required=false` treats missing/null/type-mismatch as `Ok(None)`.
fn parse_integer<T, const SIGNED: bool, const REQUIRED: bool>(
    value: Option<&serde_json::Value>,
    field: &str,
) -> Result<Option<T>, CoreError>
where
    T: TryFrom<i64> + TryFrom<u64>,
{
    let missing_or_none = || {
        if REQUIRED {
            Err(CoreError::InvalidResponse(format!("missing {field}")))
        } else {
            Ok(None)
        }
    };

    let Some(value) = value else {
        return missing_or_none();
    };

    if SIGNED {
        let Some(n) = value.as_i64() else {
            return missing_or_none();
        };
        T::try_from(n)
            .map(Some)
            .map_err(|_| CoreError::InvalidResponse(format!("{field} out of range: {n}")))
    } else {
        let Some(n) = value.as_u64() else {
            return missing_or_none();
        };
        T::try_from(n)
            .map(Some)
            .map_err(|_| CoreError::InvalidResponse(format!("{field} out of range: {n}")))
    }
}

/// Parse a signed BTC amount from a JSON value.
///
/// Wallet amounts are negative for sends and fees. Number values go through
/// `SignedAmount::from_float_in` to support scientific notation, string
/// values through `SignedAmount::from_str_in`.
pub(super) fn parse_btc_amount(value: &serde_json::Value) -> Result<SignedAmount, CoreError> {
    match value {
        serde_json::Value::Number(n) => {
            let parsed = n.as_f64().ok_or_else(|| {
                CoreError::InvalidResponse(format!("invalid BTC amount `{value}`"))
            })?;
            SignedAmount::from_float_in(parsed, bitcoin::Denomination::Bitcoin).map_err(|e| {
                CoreError::InvalidResponse(format!("invalid BTC amount `{value}`: {e}"))
            })
        }
        serde_json::Value::String(s) => {
            SignedAmount::from_str_in(s, bitcoin::Denomination::Bitcoin)
                .map_err(|e| CoreError::InvalidResponse(format!("invalid BTC amount `{s}`: {e}")))
        }
        _ => Err(CoreError::InvalidResponse(format!(
            "expected numeric BTC amount, got: {value}"
        ))),
    }
}
