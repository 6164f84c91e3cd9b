//! Plain HTTP JSON-RPC client for EVM nodes

use ethers::types::{Address, Bytes, H256, U256, U64};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};

use super::WalletError;

/// JSON-RPC request structure
#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    id: u64,
}

/// JSON-RPC response structure
#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// Transaction receipt from eth_getTransactionReceipt
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: H256,
    pub block_hash: Option<H256>,
    pub block_number: Option<U64>,
    pub status: Option<U64>,
    pub gas_used: Option<U256>,
    pub effective_gas_price: Option<U256>,
}

impl TransactionReceipt {
    /// Status 1, or a pre-Byzantium receipt without a status field
    pub fn succeeded(&self) -> bool {
        self.status.map(|s| s == U64::one()).unwrap_or(true)
    }
}

pub struct JsonRpcClient {
    http: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

fn parse_quantity(value: &Value, what: &str) -> Result<U256, WalletError> {
    let hex_str = value
        .as_str()
        .ok_or_else(|| WalletError::Rpc(format!("Invalid {} response", what)))?;
    U256::from_str_radix(hex_str.trim_start_matches("0x"), 16)
        .map_err(|e| WalletError::Rpc(format!("Failed to parse {}: {}", what, e)))
}

impl JsonRpcClient {
    pub fn new(url: impl Into<String>) -> Self {
        JsonRpcClient {
            http: reqwest::Client::new(),
            url: url.into(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn rpc_call(&self, method: &str, params: Value) -> Result<Value, WalletError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };

        log::debug!("[rpc] {} to {} with params: {}", method, self.url, request.params);

        let response = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| WalletError::Rpc(format!("Request to {} failed: {}", self.url, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| WalletError::Rpc(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(WalletError::Rpc(format!(
                "HTTP {} from {}: {}",
                status,
                self.url,
                if body.is_empty() { "empty response" } else { &body }
            )));
        }

        decode_response(&body)
    }

    pub async fn chain_id(&self) -> Result<u64, WalletError> {
        let result = self.rpc_call("eth_chainId", json!([])).await?;
        Ok(parse_quantity(&result, "chainId")?.low_u64())
    }

    /// Balance in wei
    pub async fn get_balance(&self, address: Address) -> Result<U256, WalletError> {
        let result = self
            .rpc_call("eth_getBalance", json!([format!("{:?}", address), "latest"]))
            .await?;
        parse_quantity(&result, "balance")
    }

    /// Read-only contract call
    pub async fn eth_call(&self, to: Address, data: &[u8]) -> Result<Bytes, WalletError> {
        let params = json!([
            {
                "to": format!("{:?}", to),
                "data": format!("0x{}", hex::encode(data))
            },
            "latest"
        ]);

        let result = self.rpc_call("eth_call", params).await?;
        let hex_str = result
            .as_str()
            .ok_or_else(|| WalletError::Rpc("Invalid eth_call response".to_string()))?;
        let bytes = hex::decode(hex_str.trim_start_matches("0x"))
            .map_err(|e| WalletError::Rpc(format!("Failed to decode eth_call result: {}", e)))?;
        Ok(Bytes::from(bytes))
    }

    pub async fn estimate_gas(
        &self,
        from: Address,
        to: Address,
        data: &[u8],
        value: U256,
    ) -> Result<U256, WalletError> {
        let params = json!([
            {
                "from": format!("{:?}", from),
                "to": format!("{:?}", to),
                "data": format!("0x{}", hex::encode(data)),
                "value": format!("0x{:x}", value)
            }
        ]);
        let result = self.rpc_call("eth_estimateGas", params).await?;
        parse_quantity(&result, "gas estimate")
    }

    /// (max_fee_per_gas, max_priority_fee_per_gas)
    pub async fn estimate_eip1559_fees(&self) -> Result<(U256, U256), WalletError> {
        let gas_price = parse_quantity(&self.rpc_call("eth_gasPrice", json!([])).await?, "gas price")?;
        let priority_fee = parse_quantity(
            &self.rpc_call("eth_maxPriorityFeePerGas", json!([])).await?,
            "priority fee",
        )?;

        // Some providers report priority fees above the gas price
        let capped_priority_fee = std::cmp::min(priority_fee, gas_price);
        let max_fee = gas_price + gas_price / 10;

        log::debug!(
            "[rpc] Gas estimate: gas_price={}, priority_fee={} (capped from {}), max_fee={}",
            gas_price,
            capped_priority_fee,
            priority_fee,
            max_fee
        );

        Ok((max_fee, capped_priority_fee))
    }

    pub async fn send_raw_transaction(&self, signed_tx: &[u8]) -> Result<H256, WalletError> {
        let result = self
            .rpc_call("eth_sendRawTransaction", json!([format!("0x{}", hex::encode(signed_tx))]))
            .await?;
        let hash_hex = result
            .as_str()
            .ok_or_else(|| WalletError::Rpc("Invalid sendRawTransaction response".to_string()))?;
        hash_hex
            .parse()
            .map_err(|e| WalletError::Rpc(format!("Failed to parse tx hash: {}", e)))
    }

    pub async fn get_transaction_receipt(
        &self,
        tx_hash: H256,
    ) -> Result<Option<TransactionReceipt>, WalletError> {
        let result = match self
            .rpc_call("eth_getTransactionReceipt", json!([format!("{:?}", tx_hash)]))
            .await
        {
            Ok(v) => v,
            // A pending transaction has a null receipt
            Err(WalletError::Rpc(msg)) if msg == NULL_RESULT => return Ok(None),
            Err(e) => return Err(e),
        };

        let receipt: TransactionReceipt = serde_json::from_value(result)
            .map_err(|e| WalletError::Rpc(format!("Failed to parse receipt: {}", e)))?;
        Ok(Some(receipt))
    }

    /// Pending nonce for an address
    pub async fn get_transaction_count(&self, address: Address) -> Result<U256, WalletError> {
        let result = self
            .rpc_call("eth_getTransactionCount", json!([format!("{:?}", address), "pending"]))
            .await?;
        parse_quantity(&result, "nonce")
    }
}

const NULL_RESULT: &str = "RPC returned null result";

fn decode_response(body: &str) -> Result<Value, WalletError> {
    let rpc_response: JsonRpcResponse = serde_json::from_str(body)
        .map_err(|e| WalletError::Rpc(format!("Failed to parse RPC response: {} - body: {}", e, body)))?;

    if let Some(error) = rpc_response.error {
        return Err(WalletError::Rpc(format!("RPC error {}: {}", error.code, error.message)));
    }

    match rpc_response.result {
        Some(Value::Null) | None => Err(WalletError::Rpc(NULL_RESULT.to_string())),
        Some(v) => Ok(v),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_response() {
        let ok = decode_response(r#"{"jsonrpc":"2.0","id":1,"result":"0x2105"}"#).unwrap();
        assert_eq!(parse_quantity(&ok, "chainId").unwrap(), U256::from(8453u64));

        let err = decode_response(
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"insufficient funds"}}"#,
        )
        .unwrap_err();
        assert_eq!(err, WalletError::Rpc("RPC error -32000: insufficient funds".to_string()));

        let null = decode_response(r#"{"jsonrpc":"2.0","id":1,"result":null}"#).unwrap_err();
        assert_eq!(null, WalletError::Rpc(NULL_RESULT.to_string()));
    }

    #[test]
    fn test_receipt_status() {
        let receipt: TransactionReceipt = serde_json::from_value(json!({
            "transactionHash": format!("{:?}", H256::repeat_byte(1)),
            "blockHash": null,
            "blockNumber": "0x10",
            "status": "0x0",
            "gasUsed": "0x5208",
            "effectiveGasPrice": null
        }))
        .unwrap();
        assert!(!receipt.succeeded());
        assert_eq!(receipt.gas_used, Some(U256::from(21000u64)));
    }
}
