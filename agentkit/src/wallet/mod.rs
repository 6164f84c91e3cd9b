//! Wallet Provider Abstraction
//!
//! Wallets are modelled as capability traits:
//!
//! - [`WalletProvider`] is implemented by every wallet (address, network,
//!   native balance, message signing, native transfers)
//! - [`EvmWalletProvider`] adds the EVM-only operations (hash and typed-data
//!   signing, transactions, receipts, contract reads)
//!
//! Action providers that need EVM features ask for them through
//! [`WalletProvider::as_evm`] and report an error result when it is absent.

mod env_provider;
pub mod rpc;

pub use env_provider::EnvWalletProvider;
pub use rpc::TransactionReceipt;

use async_trait::async_trait;
use ethers::abi::{Function, Token};
use ethers::types::{transaction::eip2718::TypedTransaction, Address, Bytes, Signature, H256, U256};
use std::time::Duration;

use crate::network::Network;

/// Default time to wait for a transaction receipt
pub const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_secs(120);
/// Default delay between receipt polls
pub const DEFAULT_RECEIPT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalletError {
    #[error("Invalid private key: {0}")]
    InvalidKey(String),
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("RPC error: {0}")]
    Rpc(String),
    #[error("Signing failed: {0}")]
    Signing(String),
    #[error("ABI error: {0}")]
    Abi(String),
    #[error("Transaction failed: {0}")]
    Transaction(String),
    #[error("Timeout waiting for transaction receipt: {0}")]
    Timeout(String),
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

/// Gas overrides applied when a wallet builds a transaction
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EvmGasConfig {
    /// Multiplier on the estimated gas limit (1.2 when unset)
    pub gas_limit_multiplier: Option<f64>,
    /// Multiplier on the estimated fee per gas (1.0 when unset)
    pub fee_per_gas_multiplier: Option<f64>,
}

impl EvmGasConfig {
    pub const DEFAULT_GAS_LIMIT_MULTIPLIER: f64 = 1.2;

    pub fn apply_gas_limit(&self, estimate: U256) -> U256 {
        scale(estimate, self.gas_limit_multiplier.unwrap_or(Self::DEFAULT_GAS_LIMIT_MULTIPLIER))
    }

    pub fn apply_fee_per_gas(&self, fee: U256) -> U256 {
        scale(fee, self.fee_per_gas_multiplier.unwrap_or(1.0))
    }
}

/// Multiply by a float factor in basis points; non-positive factors act as 1.0
fn scale(value: U256, factor: f64) -> U256 {
    let bps = if factor.is_finite() && factor > 0.0 {
        (factor * 10_000.0).round() as u64
    } else {
        10_000
    };
    value.saturating_mul(U256::from(bps)) / U256::from(10_000u64)
}

/// Transaction to be filled, signed and broadcast by an EVM wallet
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionRequest {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    /// Skip estimation and use this limit
    pub gas_limit: Option<U256>,
}

impl TransactionRequest {
    pub fn new(to: Address) -> Self {
        TransactionRequest {
            to,
            ..Default::default()
        }
    }

    pub fn data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = data.into();
        self
    }

    pub fn value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }
}

/// Trait implemented by every wallet
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Wallet address, lower-case 0x-prefixed hex for EVM wallets
    fn get_address(&self) -> String;

    fn get_network(&self) -> Network;

    /// Provider name for display and logging
    fn get_name(&self) -> &str;

    /// Native balance in the smallest unit (wei)
    async fn get_balance(&self) -> Result<U256, WalletError>;

    /// Sign a message (EIP-191 personal_sign)
    async fn sign_message(&self, message: &[u8]) -> Result<Signature, WalletError>;

    /// Transfer native currency; `value` is in whole units (ether)
    async fn native_transfer(&self, to: &str, value: &str) -> Result<H256, WalletError>;

    /// EVM capabilities, when this wallet has them
    fn as_evm(&self) -> Option<&dyn EvmWalletProvider> {
        None
    }
}

/// EVM-specific wallet capabilities
#[async_trait]
pub trait EvmWalletProvider: WalletProvider {
    /// Sign a raw 32-byte hash
    async fn sign_hash(&self, hash: H256) -> Result<Signature, WalletError>;

    /// Sign EIP-712 typed data given as eth_signTypedData_v4 JSON
    async fn sign_typed_data(&self, typed_data: &serde_json::Value) -> Result<Signature, WalletError>;

    async fn sign_transaction(&self, tx: &TypedTransaction) -> Result<Signature, WalletError>;

    /// Fill, sign and broadcast; returns the transaction hash
    async fn send_transaction(&self, tx: TransactionRequest) -> Result<H256, WalletError>;

    async fn wait_for_transaction_receipt(
        &self,
        tx_hash: H256,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<TransactionReceipt, WalletError>;

    /// eth_call `function` on `address` and decode its outputs
    async fn read_contract(
        &self,
        address: Address,
        function: &Function,
        args: &[Token],
    ) -> Result<Vec<Token>, WalletError>;

    /// Wait with the default timeout and poll interval
    async fn wait_for_receipt(&self, tx_hash: H256) -> Result<TransactionReceipt, WalletError> {
        self.wait_for_transaction_receipt(tx_hash, DEFAULT_RECEIPT_TIMEOUT, DEFAULT_RECEIPT_POLL_INTERVAL)
            .await
    }
}

/// Parse a 0x-prefixed hex address
pub fn parse_address(address: &str) -> Result<Address, WalletError> {
    let trimmed = address.trim();
    let hex_part = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .ok_or_else(|| WalletError::InvalidAddress(address.to_string()))?;
    if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(WalletError::InvalidAddress(address.to_string()));
    }
    hex_part
        .parse::<Address>()
        .map_err(|_| WalletError::InvalidAddress(address.to_string()))
}

pub fn is_address(address: &str) -> bool {
    parse_address(address).is_ok()
}

/// Lower-case 0x-prefixed form of an address
pub fn format_address(address: Address) -> String {
    format!("{:?}", address).to_lowercase()
}

/// 0x-prefixed full hash
pub fn format_hash(hash: H256) -> String {
    format!("{:?}", hash)
}
