//! Wrap and unwrap the native token through the canonical WETH contract

use async_trait::async_trait;
use ethers::abi::{Function, ParamType, StateMutability, Token};
use ethers::types::{Address, U256};
use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::abi::{encode_call, expect_uint, function};
use crate::action::{
    parse_params, Action, ActionContext, ActionDefinition, ActionInputSchema, ActionProvider,
    ActionResult, PropertySchema,
};
use crate::amount::{format_ether, parse_ether};
use crate::network::{Network, ARBITRUM_MAINNET, BASE_MAINNET, BASE_SEPOLIA, ETHEREUM_MAINNET, OPTIMISM_MAINNET};
use crate::wallet::{format_hash, parse_address, EvmWalletProvider, TransactionRequest, WalletError};

const SUPPORTED_NETWORKS: &[&str] = &[BASE_MAINNET, BASE_SEPOLIA, ETHEREUM_MAINNET, ARBITRUM_MAINNET, OPTIMISM_MAINNET];

/// WETH deployment for a network id
pub fn weth_address(network_id: &str) -> Option<&'static str> {
    match network_id {
        BASE_MAINNET | BASE_SEPOLIA | OPTIMISM_MAINNET => Some("0x4200000000000000000000000000000000000006"),
        ETHEREUM_MAINNET => Some("0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"),
        ARBITRUM_MAINNET => Some("0x82aF49447D8a07e3bd95BD0d56f35241523fBab1"),
        _ => None,
    }
}

pub static WETH_DEPOSIT: Lazy<Function> =
    Lazy::new(|| function("deposit", vec![], vec![], StateMutability::Payable));

pub static WETH_WITHDRAW: Lazy<Function> =
    Lazy::new(|| function("withdraw", vec![ParamType::Uint(256)], vec![], StateMutability::NonPayable));

pub static WETH_BALANCE_OF: Lazy<Function> = Lazy::new(|| {
    function(
        "balanceOf",
        vec![ParamType::Address],
        vec![ParamType::Uint(256)],
        StateMutability::View,
    )
});

pub struct WethActionProvider;

impl ActionProvider for WethActionProvider {
    fn name(&self) -> &str {
        "weth"
    }

    fn supports_network(&self, network: &Network) -> bool {
        network.is_evm_network_in(SUPPORTED_NETWORKS)
    }

    fn actions(&self) -> Vec<Arc<dyn Action>> {
        vec![Arc::new(WrapEth), Arc::new(UnwrapEth)]
    }
}

/// Validate a whole-unit amount and convert it to wei
fn parse_amount(amount: &str) -> Result<U256, String> {
    let trimmed = amount.trim();
    if trimmed.parse::<f64>().map(|v| !v.is_finite()).unwrap_or(true) {
        return Err("Amount must be a valid number".to_string());
    }
    if trimmed.starts_with('-') {
        return Err("Amount must be greater than 0".to_string());
    }
    let wei = parse_ether(trimmed).map_err(|_| "Amount must be a valid number".to_string())?;
    if wei.is_zero() {
        return Err("Amount must be greater than 0".to_string());
    }
    Ok(wei)
}

fn weth_contract(network: &Network) -> Result<Address, String> {
    weth_address(network.network_id_str())
        .and_then(|a| parse_address(a).ok())
        .ok_or_else(|| format!("Error: WETH not supported on network {}", network.network_id_str()))
}

async fn send_and_confirm(evm: &dyn EvmWalletProvider, tx: TransactionRequest) -> Result<String, WalletError> {
    let tx_hash = evm.send_transaction(tx).await?;
    let receipt = evm.wait_for_receipt(tx_hash).await?;
    if !receipt.succeeded() {
        return Err(WalletError::Transaction(format!("Transaction {:?} reverted", tx_hash)));
    }
    Ok(format_hash(tx_hash))
}

#[derive(Debug, Deserialize)]
struct WrapEthParams {
    amount_to_wrap: String,
}

pub struct WrapEth;

#[async_trait]
impl Action for WrapEth {
    fn definition(&self) -> ActionDefinition {
        ActionDefinition {
            name: "wrap_eth".to_string(),
            description: "Wrap ETH into WETH. The amount is in whole units, e.g. '0.1' wraps 0.1 ETH."
                .to_string(),
            input_schema: ActionInputSchema::default().required_property(
                "amount_to_wrap",
                PropertySchema::string("Amount of ETH to wrap in whole units"),
            ),
        }
    }

    async fn invoke(&self, params: Value, context: &ActionContext) -> ActionResult {
        let params: WrapEthParams = match parse_params(params) {
            Ok(p) => p,
            Err(e) => return ActionResult::error(format!("Error wrapping ETH: {}", e.content)),
        };
        let amount = match parse_amount(&params.amount_to_wrap) {
            Ok(a) => a,
            Err(e) => return ActionResult::error(format!("Error wrapping ETH: {}", e)),
        };
        let evm = match context.evm() {
            Ok(w) => w,
            Err(e) => return e,
        };
        let contract = match weth_contract(&evm.get_network()) {
            Ok(c) => c,
            Err(e) => return ActionResult::error(e),
        };

        let balance = match evm.get_balance().await {
            Ok(b) => b,
            Err(e) => return ActionResult::error(format!("Error wrapping ETH: {}", e)),
        };
        if balance < amount {
            return ActionResult::error(format!(
                "Error: Insufficient ETH balance. Requested to wrap {} ETH, but only {} ETH is available.",
                params.amount_to_wrap.trim(),
                format_ether(balance)
            ));
        }

        let data = match encode_call(&WETH_DEPOSIT, &[]) {
            Ok(d) => d,
            Err(e) => return ActionResult::error(format!("Error wrapping ETH: {}", e)),
        };
        log::info!("[weth] Wrapping {} wei", amount);

        match send_and_confirm(evm, TransactionRequest::new(contract).data(data).value(amount)).await {
            Ok(hash) => ActionResult::success(format!(
                "Wrapped {} ETH to WETH. Transaction hash: {}",
                params.amount_to_wrap.trim(),
                hash
            )),
            Err(e) => ActionResult::error(format!("Error wrapping ETH: {}", e)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct UnwrapEthParams {
    amount_to_unwrap: String,
}

pub struct UnwrapEth;

#[async_trait]
impl Action for UnwrapEth {
    fn definition(&self) -> ActionDefinition {
        ActionDefinition {
            name: "unwrap_eth".to_string(),
            description: "Unwrap WETH back into ETH. The amount is in whole units, e.g. '0.1' unwraps 0.1 WETH."
                .to_string(),
            input_schema: ActionInputSchema::default().required_property(
                "amount_to_unwrap",
                PropertySchema::string("Amount of WETH to unwrap in whole units"),
            ),
        }
    }

    async fn invoke(&self, params: Value, context: &ActionContext) -> ActionResult {
        let params: UnwrapEthParams = match parse_params(params) {
            Ok(p) => p,
            Err(e) => return ActionResult::error(format!("Error unwrapping WETH: {}", e.content)),
        };
        let amount = match parse_amount(&params.amount_to_unwrap) {
            Ok(a) => a,
            Err(e) => return ActionResult::error(format!("Error unwrapping WETH: {}", e)),
        };
        let evm = match context.evm() {
            Ok(w) => w,
            Err(e) => return e,
        };
        let contract = match weth_contract(&evm.get_network()) {
            Ok(c) => c,
            Err(e) => return ActionResult::error(e),
        };
        let owner = match parse_address(&evm.get_address()) {
            Ok(o) => o,
            Err(e) => return ActionResult::error(format!("Error unwrapping WETH: {}", e)),
        };

        let balance = match evm
            .read_contract(contract, &WETH_BALANCE_OF, &[Token::Address(owner)])
            .await
            .and_then(|out| expect_uint(&out, "balanceOf"))
        {
            Ok(b) => b,
            Err(e) => return ActionResult::error(format!("Error unwrapping WETH: {}", e)),
        };
        if balance < amount {
            return ActionResult::error(format!(
                "Error: Insufficient WETH balance. Requested to unwrap {} WETH, but only {} WETH is available.",
                params.amount_to_unwrap.trim(),
                format_ether(balance)
            ));
        }

        let data = match encode_call(&WETH_WITHDRAW, &[Token::Uint(amount)]) {
            Ok(d) => d,
            Err(e) => return ActionResult::error(format!("Error unwrapping WETH: {}", e)),
        };
        log::info!("[weth] Unwrapping {} wei", amount);

        match send_and_confirm(evm, TransactionRequest::new(contract).data(data)).await {
            Ok(hash) => ActionResult::success(format!(
                "Unwrapped {} WETH to ETH. Transaction hash: {}",
                params.amount_to_unwrap.trim(),
                hash
            )),
            Err(e) => ActionResult::error(format!("Error unwrapping WETH: {}", e)),
        }
    }
}
