//! JSON-RPC client for the HTTP endpoint
//!
//! Thin typed wrapper over the handful of eth_* methods the indexer and
//! relay need. Every call carries the client's request timeout.

use alloy_primitives::{Address, Bytes, B256, U256};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Default timeout applied to every RPC call.
const RPC_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum RpcClientError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// A log entry as returned by `eth_getLogs` / log subscriptions.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    #[serde(deserialize_with = "quantity_u64")]
    pub block_number: u64,
    pub transaction_hash: B256,
    #[serde(deserialize_with = "quantity_u64")]
    pub log_index: u64,
    #[serde(default)]
    pub removed: bool,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// HTTP JSON-RPC client.
pub struct EvmRpcClient {
    http: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl EvmRpcClient {
    pub fn new(url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(RPC_TIMEOUT)
            .build()
            .expect("reqwest client construction is infallible with static config");
        Self {
            http,
            url: url.into(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, RpcClientError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params,
        });

        let response: RpcResponse = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        if let Some(error) = response.error {
            return Err(RpcClientError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        response
            .result
            .ok_or_else(|| RpcClientError::InvalidResponse(format!("{method}: missing result")))
    }

    pub async fn block_number(&self) -> Result<u64, RpcClientError> {
        let result = self.request("eth_blockNumber", json!([])).await?;
        parse_quantity_u64(&result)
    }

    pub async fn chain_id(&self) -> Result<u64, RpcClientError> {
        let result = self.request("eth_chainId", json!([])).await?;
        parse_quantity_u64(&result)
    }

    pub async fn gas_price(&self) -> Result<U256, RpcClientError> {
        let result = self.request("eth_gasPrice", json!([])).await?;
        parse_quantity_u256(&result)
    }

    pub async fn get_balance(&self, address: Address) -> Result<U256, RpcClientError> {
        let result = self
            .request("eth_getBalance", json!([address, "latest"]))
            .await?;
        parse_quantity_u256(&result)
    }

    /// Pending-tag transaction count, used for the relay's local tx nonce.
    pub async fn get_transaction_count(&self, address: Address) -> Result<u64, RpcClientError> {
        let result = self
            .request("eth_getTransactionCount", json!([address, "pending"]))
            .await?;
        parse_quantity_u64(&result)
    }

    pub async fn get_code(&self, address: Address) -> Result<Bytes, RpcClientError> {
        let result = self.request("eth_getCode", json!([address, "latest"])).await?;
        serde_json::from_value(result)
            .map_err(|e| RpcClientError::InvalidResponse(format!("eth_getCode: {e}")))
    }

    pub async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, RpcClientError> {
        let result = self
            .request("eth_call", json!([{"to": to, "data": data}, "latest"]))
            .await?;
        serde_json::from_value(result)
            .map_err(|e| RpcClientError::InvalidResponse(format!("eth_call: {e}")))
    }

    pub async fn send_raw_transaction(&self, raw: Bytes) -> Result<B256, RpcClientError> {
        let result = self.request("eth_sendRawTransaction", json!([raw])).await?;
        serde_json::from_value(result)
            .map_err(|e| RpcClientError::InvalidResponse(format!("eth_sendRawTransaction: {e}")))
    }

    pub async fn get_logs(
        &self,
        address: Address,
        topic0: B256,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<LogEntry>, RpcClientError> {
        let filter = json!({
            "address": address,
            "topics": [topic0],
            "fromBlock": format!("{:#x}", from_block),
            "toBlock": format!("{:#x}", to_block),
        });
        let result = self.request("eth_getLogs", json!([filter])).await?;
        serde_json::from_value(result)
            .map_err(|e| RpcClientError::InvalidResponse(format!("eth_getLogs: {e}")))
    }
}

/// Parse a JSON-RPC hex quantity ("0x1a") into a u64.
pub fn parse_quantity_u64(value: &Value) -> Result<u64, RpcClientError> {
    let text = value
        .as_str()
        .ok_or_else(|| RpcClientError::InvalidResponse(format!("expected quantity, got {value}")))?;
    let digits = text.strip_prefix("0x").unwrap_or(text);
    u64::from_str_radix(digits, 16)
        .map_err(|_| RpcClientError::InvalidResponse(format!("bad quantity {text}")))
}

fn parse_quantity_u256(value: &Value) -> Result<U256, RpcClientError> {
    let text = value
        .as_str()
        .ok_or_else(|| RpcClientError::InvalidResponse(format!("expected quantity, got {value}")))?;
    U256::from_str_radix(text.strip_prefix("0x").unwrap_or(text), 16)
        .map_err(|_| RpcClientError::InvalidResponse(format!("bad quantity {text}")))
}

fn quantity_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    let digits = text.strip_prefix("0x").unwrap_or(&text);
    u64::from_str_radix(digits, 16).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity_u64(&json!("0x0")).unwrap(), 0);
        assert_eq!(parse_quantity_u64(&json!("0x1a")).unwrap(), 26);
        assert!(parse_quantity_u64(&json!("zz")).is_err());
        assert!(parse_quantity_u64(&json!(12)).is_err());
    }

    #[test]
    fn test_log_entry_deserializes_from_rpc_shape() {
        let raw = json!({
            "address": "0x1111111111111111111111111111111111111111",
            "topics": [
                "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
                "0x0000000000000000000000002222222222222222222222222222222222222222"
            ],
            "data": "0x0000000000000000000000000000000000000000000000000000000000000004",
            "blockNumber": "0x7",
            "transactionHash": "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb",
            "logIndex": "0x0"
        });

        let log: LogEntry = serde_json::from_value(raw).unwrap();
        assert_eq!(log.block_number, 7);
        assert_eq!(log.log_index, 0);
        assert_eq!(log.topics.len(), 2);
        assert!(!log.removed);
        assert_eq!(log.data.len(), 32);
    }
}
