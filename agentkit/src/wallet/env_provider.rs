//! Local-key wallet provider
//!
//! Holds a secp256k1 private key (from PRIVATE_KEY) and talks to an EVM node
//! over plain JSON-RPC. Transactions are signed locally with ethers LocalWallet.

use async_trait::async_trait;
use ethers::abi::{Function, Token};
use ethers::core::k256::ecdsa::SigningKey;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::transaction::eip712::TypedData;
use ethers::types::{Address, Eip1559TransactionRequest, Signature, H256, U256};
use std::time::Duration;

use super::rpc::{JsonRpcClient, TransactionReceipt};
use super::{
    format_address, parse_address, EvmGasConfig, EvmWalletProvider, TransactionRequest, WalletError,
    WalletProvider,
};
use crate::amount::parse_ether;
use crate::config::Config;
use crate::network::Network;

/// Wallet provider backed by a private key and an RPC endpoint
pub struct EnvWalletProvider {
    wallet: LocalWallet,
    address: String,
    network: Network,
    rpc: JsonRpcClient,
    gas: EvmGasConfig,
}

impl EnvWalletProvider {
    /// Create provider from configuration (PRIVATE_KEY, RPC_URL, NETWORK_ID)
    pub fn from_config(config: &Config) -> Result<Self, WalletError> {
        let private_key = config
            .private_key
            .as_deref()
            .ok_or_else(|| WalletError::InvalidKey("PRIVATE_KEY not set".to_string()))?;

        let network = Network::from_network_id(&config.network_id).ok_or_else(|| {
            WalletError::Unsupported(format!("Unknown network id '{}'", config.network_id))
        })?;

        let gas = EvmGasConfig {
            gas_limit_multiplier: config.gas_limit_multiplier,
            fee_per_gas_multiplier: config.fee_per_gas_multiplier,
        };
        Ok(Self::from_private_key(private_key, &config.rpc_url, network)?.with_gas_config(gas))
    }

    /// Create provider from a private key string
    pub fn from_private_key(private_key: &str, rpc_url: &str, network: Network) -> Result<Self, WalletError> {
        let key_hex = private_key.trim().strip_prefix("0x").unwrap_or(private_key.trim());

        let key_bytes = hex::decode(key_hex)
            .map_err(|e| WalletError::InvalidKey(format!("Invalid private key hex: {}", e)))?;
        if key_bytes.len() != 32 {
            return Err(WalletError::InvalidKey(format!(
                "Expected 32 bytes, got {}",
                key_bytes.len()
            )));
        }

        let signing_key = SigningKey::from_bytes(key_bytes.as_slice().into())
            .map_err(|e| WalletError::InvalidKey(e.to_string()))?;

        let mut wallet = LocalWallet::from(signing_key);
        if let Some(chain_id) = network.chain_id {
            wallet = wallet.with_chain_id(chain_id);
        }
        let address = format_address(wallet.address());

        Ok(Self {
            wallet,
            address,
            network,
            rpc: JsonRpcClient::new(rpc_url),
            gas: EvmGasConfig::default(),
        })
    }

    pub fn with_gas_config(mut self, gas: EvmGasConfig) -> Self {
        self.gas = gas;
        self
    }

    fn chain_id(&self) -> Result<u64, WalletError> {
        self.network
            .chain_id
            .ok_or_else(|| WalletError::Unsupported("Network has no chain id".to_string()))
    }
}

#[async_trait]
impl WalletProvider for EnvWalletProvider {
    fn get_address(&self) -> String {
        self.address.clone()
    }

    fn get_network(&self) -> Network {
        self.network.clone()
    }

    fn get_name(&self) -> &str {
        "env_wallet_provider"
    }

    async fn get_balance(&self) -> Result<U256, WalletError> {
        self.rpc.get_balance(self.wallet.address()).await
    }

    async fn sign_message(&self, message: &[u8]) -> Result<Signature, WalletError> {
        self.wallet
            .sign_message(message)
            .await
            .map_err(|e| WalletError::Signing(format!("Failed to sign message: {}", e)))
    }

    async fn native_transfer(&self, to: &str, value: &str) -> Result<H256, WalletError> {
        let to = parse_address(to)?;
        let wei = parse_ether(value).map_err(WalletError::Transaction)?;

        let tx_hash = self.send_transaction(TransactionRequest::new(to).value(wei)).await?;
        let receipt = self.wait_for_receipt(tx_hash).await?;
        if !receipt.succeeded() {
            return Err(WalletError::Transaction(format!("Transaction {:?} reverted", tx_hash)));
        }
        Ok(tx_hash)
    }

    fn as_evm(&self) -> Option<&dyn EvmWalletProvider> {
        Some(self)
    }
}

#[async_trait]
impl EvmWalletProvider for EnvWalletProvider {
    async fn sign_hash(&self, hash: H256) -> Result<Signature, WalletError> {
        self.wallet
            .sign_hash(hash)
            .map_err(|e| WalletError::Signing(format!("Failed to sign hash: {}", e)))
    }

    async fn sign_typed_data(&self, typed_data: &serde_json::Value) -> Result<Signature, WalletError> {
        let typed: TypedData = serde_json::from_value(typed_data.clone())
            .map_err(|e| WalletError::Signing(format!("Invalid typed data: {}", e)))?;

        self.wallet
            .sign_typed_data(&typed)
            .await
            .map_err(|e| WalletError::Signing(format!("Failed to sign typed data: {}", e)))
    }

    async fn sign_transaction(&self, tx: &TypedTransaction) -> Result<Signature, WalletError> {
        self.wallet
            .sign_transaction(tx)
            .await
            .map_err(|e| WalletError::Signing(format!("Failed to sign transaction: {}", e)))
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> Result<H256, WalletError> {
        let chain_id = self.chain_id()?;
        let from = self.wallet.address();

        let nonce = self.rpc.get_transaction_count(from).await?;
        let gas = match tx.gas_limit {
            Some(limit) => limit,
            None => {
                let estimate = self.rpc.estimate_gas(from, tx.to, &tx.data, tx.value).await?;
                self.gas.apply_gas_limit(estimate)
            }
        };
        let (max_fee, priority_fee) = self.rpc.estimate_eip1559_fees().await?;
        let max_fee = self.gas.apply_fee_per_gas(max_fee);
        let priority_fee = std::cmp::min(self.gas.apply_fee_per_gas(priority_fee), max_fee);

        log::info!(
            "[wallet] Sending tx: to={:?}, value={}, data_len={} bytes, gas={}, nonce={} on {}",
            tx.to,
            tx.value,
            tx.data.len(),
            gas,
            nonce,
            self.network.network_id_str()
        );

        let request = Eip1559TransactionRequest::new()
            .from(from)
            .to(tx.to)
            .value(tx.value)
            .data(tx.data.clone())
            .nonce(nonce)
            .gas(gas)
            .max_fee_per_gas(max_fee)
            .max_priority_fee_per_gas(priority_fee)
            .chain_id(chain_id);

        let typed_tx: TypedTransaction = request.into();
        let signature = self.sign_transaction(&typed_tx).await?;
        let signed_tx = typed_tx.rlp_signed(&signature);

        let tx_hash = self.rpc.send_raw_transaction(&signed_tx).await?;
        log::info!("[wallet] Broadcast tx {:?}", tx_hash);
        Ok(tx_hash)
    }

    async fn wait_for_transaction_receipt(
        &self,
        tx_hash: H256,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<TransactionReceipt, WalletError> {
        let start = tokio::time::Instant::now();

        loop {
            match self.rpc.get_transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => return Ok(receipt),
                Ok(None) => log::debug!("[wallet] Waiting for receipt of {:?}...", tx_hash),
                Err(e) => log::warn!("[wallet] Error fetching receipt: {}, retrying...", e),
            }

            if start.elapsed() >= timeout {
                return Err(WalletError::Timeout(format!("{:?}", tx_hash)));
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    async fn read_contract(
        &self,
        address: Address,
        function: &Function,
        args: &[Token],
    ) -> Result<Vec<Token>, WalletError> {
        let calldata = function
            .encode_input(args)
            .map_err(|e| WalletError::Abi(format!("Failed to encode {}: {}", function.name, e)))?;

        let output = self.rpc.eth_call(address, &calldata).await?;

        function
            .decode_output(&output)
            .map_err(|e| WalletError::Abi(format!("Failed to decode {}: {}", function.name, e)))
    }
}
