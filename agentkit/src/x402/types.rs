//! x402 v1 wire types

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::network::known_network;

pub const X402_VERSION: u8 = 1;

/// Request header carrying the signed payment
pub const X_PAYMENT_HEADER: &str = "X-PAYMENT";

/// Response header carrying the settlement result
pub const X_PAYMENT_RESPONSE_HEADER: &str = "X-PAYMENT-RESPONSE";

/// The only scheme this client can pay
pub const EXACT_SCHEME: &str = "exact";

/// EIP-712 domain of USDC, used when `extra` does not name one
pub const DEFAULT_TOKEN_NAME: &str = "USD Coin";
pub const DEFAULT_TOKEN_VERSION: &str = "2";

/// Lower bound on the authorization window
pub const MIN_VALIDITY_SECONDS: u64 = 60;

#[derive(Debug, thiserror::Error)]
pub enum X402Error {
    #[error("Failed to encode payment: {0}")]
    Encoding(String),
    #[error("Failed to decode {what}: {reason}")]
    Decoding { what: &'static str, reason: String },
    #[error("Invalid payment requirements: {0}")]
    InvalidRequirements(String),
    #[error("Unsupported payment scheme: {0}")]
    UnsupportedScheme(String),
    #[error("Failed to sign payment: {0}")]
    Signing(String),
    #[error("No acceptable payment option: {0}")]
    NoAcceptableOption(String),
    #[error(transparent)]
    Http(#[from] crate::http::HttpError),
}

/// Chain id for an x402 network name. Accepts agentkit ids and the short forms servers use.
pub fn chain_id_for_network(network: &str) -> Option<u64> {
    match network {
        "base" => Some(8453),
        "ethereum" => Some(1),
        "sepolia" => Some(11_155_111),
        other => known_network(other).map(|n| n.chain_id),
    }
}

/// One acceptable way to pay for a resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    pub scheme: String,
    pub network: String,
    /// Atomic units of `asset`
    pub max_amount_required: String,
    pub resource: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub mime_type: String,
    pub pay_to: String,
    pub max_timeout_seconds: u64,
    /// Token contract address
    pub asset: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

impl PaymentRequirements {
    fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.as_ref()?.get(key)?.as_str()
    }

    /// EIP-712 domain name of the asset
    pub fn token_name(&self) -> &str {
        self.extra_str("name").unwrap_or(DEFAULT_TOKEN_NAME)
    }

    pub fn token_version(&self) -> &str {
        self.extra_str("version").unwrap_or(DEFAULT_TOKEN_VERSION)
    }

    pub fn validity_seconds(&self) -> u64 {
        self.max_timeout_seconds.max(MIN_VALIDITY_SECONDS)
    }
}

/// Body of a 402 response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequiredResponse {
    #[serde(default = "default_version")]
    pub x402_version: u8,
    #[serde(default)]
    pub accepts: Vec<PaymentRequirements>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn default_version() -> u8 {
    X402_VERSION
}

/// EIP-3009 TransferWithAuthorization fields, all as decimal or hex strings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eip3009Authorization {
    pub from: String,
    pub to: String,
    pub value: String,
    pub valid_after: String,
    pub valid_before: String,
    pub nonce: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExactEvmPayload {
    pub signature: String,
    pub authorization: Eip3009Authorization,
}

/// Decoded form of the X-PAYMENT header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    pub x402_version: u8,
    pub scheme: String,
    pub network: String,
    pub payload: ExactEvmPayload,
}

impl PaymentPayload {
    pub fn to_header(&self) -> Result<String, X402Error> {
        encode_header(self)
    }

    pub fn from_header(header: &str) -> Result<Self, X402Error> {
        decode_header(header, "payment header")
    }
}

/// Settlement result returned by the resource server (X-PAYMENT-RESPONSE)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub transaction: String,
    #[serde(default)]
    pub network: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
}

impl SettleResponse {
    pub fn from_header(header: &str) -> Result<Self, X402Error> {
        decode_header(header, "payment response header")
    }
}

/// base64(JSON)
pub fn encode_header<T: Serialize>(value: &T) -> Result<String, X402Error> {
    let json = serde_json::to_string(value).map_err(|e| X402Error::Encoding(e.to_string()))?;
    Ok(STANDARD.encode(json))
}

pub fn decode_header<T: DeserializeOwned>(header: &str, what: &'static str) -> Result<T, X402Error> {
    let bytes = STANDARD.decode(header.trim()).map_err(|e| X402Error::Decoding {
        what,
        reason: e.to_string(),
    })?;
    serde_json::from_slice(&bytes).map_err(|e| X402Error::Decoding {
        what,
        reason: e.to_string(),
    })
}

#[cfg(test)]
pub(crate) mod testing {
    use super::PaymentRequirements;
    use serde_json::json;

    pub fn sample_requirements() -> PaymentRequirements {
        serde_json::from_value(json!({
            "scheme": "exact",
            "network": "base-sepolia",
            "maxAmountRequired": "1000",
            "resource": "https://api.example.com/data",
            "description": "Access to data",
            "mimeType": "application/json",
            "payTo": "0x9876543210987654321098765432109876543210",
            "maxTimeoutSeconds": 300,
            "asset": "0x036CbD53842c5426634e7929541eC2318f3dCF7e"
        }))
        .unwrap()
    }
}
