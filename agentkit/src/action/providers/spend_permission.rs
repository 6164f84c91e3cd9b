//! Spend permissions granted by smart wallets to this wallet
//!
//! Permissions are discovered through a [`SpendPermissionSource`] (the smart
//! wallet indexer) and spent on-chain through the SpendPermissionManager.

use async_trait::async_trait;
use ethers::abi::{Function, ParamType, StateMutability, Token};
use ethers::types::{Address, Bytes, U256};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::abi::{encode_call, function};
use crate::action::providers::erc20::utils::resolve_token_address;
use crate::action::{
    parse_params, Action, ActionContext, ActionDefinition, ActionInputSchema, ActionProvider,
    ActionResult, PropertySchema,
};
use crate::network::{Network, BASE_MAINNET, BASE_SEPOLIA};
use crate::retry::retry_with_exponential_backoff;
use crate::wallet::{format_address, format_hash, parse_address, EvmWalletProvider, TransactionRequest, WalletError};

pub const SPEND_PERMISSION_MANAGER_ADDRESS: &str = "0xf85210B21cC50302F477BA56686d2019dC9b67Ad";

/// Token address standing for the native asset in a permission
pub const NATIVE_TOKEN_ADDRESS: &str = "0xEeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE";

const SUPPORTED_NETWORKS: &[&str] = &[BASE_MAINNET, BASE_SEPOLIA];

const FETCH_RETRIES: u32 = 3;
const FETCH_BASE_DELAY_MS: u64 = 1000;
/// Freshly granted permissions take a moment to be readable on-chain
const STATUS_INITIAL_DELAY_MS: u64 = 2000;

fn permission_param() -> ParamType {
    ParamType::Tuple(vec![
        ParamType::Address,
        ParamType::Address,
        ParamType::Address,
        ParamType::Uint(160),
        ParamType::Uint(48),
        ParamType::Uint(48),
        ParamType::Uint(48),
        ParamType::Uint(256),
        ParamType::Bytes,
    ])
}

pub static GET_CURRENT_PERIOD: Lazy<Function> = Lazy::new(|| {
    function(
        "getCurrentPeriod",
        vec![permission_param()],
        vec![ParamType::Tuple(vec![ParamType::Uint(48), ParamType::Uint(48), ParamType::Uint(160)])],
        StateMutability::View,
    )
});

pub static SPEND: Lazy<Function> = Lazy::new(|| {
    function(
        "spend",
        vec![permission_param(), ParamType::Uint(160)],
        vec![],
        StateMutability::NonPayable,
    )
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendPermission {
    /// Smart wallet that granted the permission
    pub account: Address,
    pub spender: Address,
    pub token: Address,
    /// Per-period cap in atomic units
    pub allowance: U256,
    /// Period length in seconds
    pub period: u64,
    pub start: u64,
    pub end: u64,
    pub salt: U256,
    #[serde(default)]
    pub extra_data: Bytes,
}

impl SpendPermission {
    pub fn to_token(&self) -> Token {
        Token::Tuple(vec![
            Token::Address(self.account),
            Token::Address(self.spender),
            Token::Address(self.token),
            Token::Uint(self.allowance),
            Token::Uint(U256::from(self.period)),
            Token::Uint(U256::from(self.start)),
            Token::Uint(U256::from(self.end)),
            Token::Uint(self.salt),
            Token::Bytes(self.extra_data.to_vec()),
        ])
    }

    fn token_label(&self) -> String {
        if format_address(self.token) == NATIVE_TOKEN_ADDRESS.to_lowercase() {
            "ETH".to_string()
        } else {
            format_address(self.token)
        }
    }
}

/// Spend already used in the permission's current period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodSpend {
    pub start: u64,
    pub end: u64,
    pub spend: U256,
}

impl PeriodSpend {
    fn from_tokens(tokens: Vec<Token>) -> Result<Self, WalletError> {
        let fields = match tokens.into_iter().next() {
            Some(Token::Tuple(fields)) => fields,
            other => return Err(WalletError::Abi(format!("Unexpected getCurrentPeriod output: {:?}", other))),
        };
        match fields.as_slice() {
            [Token::Uint(start), Token::Uint(end), Token::Uint(spend)] => Ok(PeriodSpend {
                start: start.low_u64(),
                end: end.low_u64(),
                spend: *spend,
            }),
            other => Err(WalletError::Abi(format!("Unexpected getCurrentPeriod fields: {:?}", other))),
        }
    }
}

/// Lookup of the permissions smart wallets granted to a spender
#[async_trait]
pub trait SpendPermissionSource: Send + Sync {
    async fn fetch_permissions(&self, account: Address, spender: Address) -> Result<Vec<SpendPermission>, String>;
}

pub struct SpendPermissionActionProvider {
    source: Arc<dyn SpendPermissionSource>,
}

impl SpendPermissionActionProvider {
    pub fn new(source: Arc<dyn SpendPermissionSource>) -> Self {
        SpendPermissionActionProvider { source }
    }
}

impl ActionProvider for SpendPermissionActionProvider {
    fn name(&self) -> &str {
        "spend_permission"
    }

    fn supports_network(&self, network: &Network) -> bool {
        network.is_evm_network_in(SUPPORTED_NETWORKS)
    }

    fn actions(&self) -> Vec<Arc<dyn Action>> {
        vec![
            Arc::new(ListSpendPermissions(self.source.clone())),
            Arc::new(UseSpendPermission(self.source.clone())),
        ]
    }
}

fn manager_address() -> Address {
    parse_address(SPEND_PERMISSION_MANAGER_ADDRESS).unwrap_or_default()
}

fn format_timestamp(ts: u64) -> String {
    i64::try_from(ts)
        .ok()
        .and_then(|t| chrono::DateTime::from_timestamp(t, 0))
        .map(|d| d.to_rfc3339())
        .unwrap_or_else(|| ts.to_string())
}

async fn fetch_with_retry(
    source: &dyn SpendPermissionSource,
    account: Address,
    spender: Address,
) -> Result<Vec<SpendPermission>, String> {
    retry_with_exponential_backoff(
        || source.fetch_permissions(account, spender),
        FETCH_RETRIES,
        FETCH_BASE_DELAY_MS,
        0,
    )
    .await
}

fn wallet_addresses(evm: &dyn EvmWalletProvider, smart_wallet: &str) -> Result<(Address, Address), String> {
    let account = parse_address(smart_wallet).map_err(|_| format!("Invalid smart wallet address: {}", smart_wallet))?;
    let spender = parse_address(&evm.get_address()).map_err(|e| e.to_string())?;
    Ok((account, spender))
}

#[derive(Debug, Deserialize)]
struct ListParams {
    smart_wallet_address: String,
}

pub struct ListSpendPermissions(Arc<dyn SpendPermissionSource>);

#[async_trait]
impl Action for ListSpendPermissions {
    fn definition(&self) -> ActionDefinition {
        ActionDefinition {
            name: "list_spend_permissions".to_string(),
            description: "List the spend permissions a smart wallet granted to this wallet.".to_string(),
            input_schema: ActionInputSchema::default().required_property(
                "smart_wallet_address",
                PropertySchema::string("Address of the smart wallet that granted the permissions"),
            ),
        }
    }

    async fn invoke(&self, params: Value, context: &ActionContext) -> ActionResult {
        let params: ListParams = match parse_params(params) {
            Ok(p) => p,
            Err(e) => return e,
        };
        let evm = match context.evm() {
            Ok(w) => w,
            Err(e) => return e,
        };
        let (account, spender) = match wallet_addresses(evm, &params.smart_wallet_address) {
            Ok(a) => a,
            Err(e) => return ActionResult::error(format!("Failed to list spend permissions: {}", e)),
        };

        let permissions = match fetch_with_retry(self.0.as_ref(), account, spender).await {
            Ok(p) => p,
            Err(e) => return ActionResult::error(format!("Failed to list spend permissions: {}", e)),
        };
        if permissions.is_empty() {
            return ActionResult::success(format!(
                "No spend permissions found for spender {} on smart wallet {}",
                format_address(spender),
                params.smart_wallet_address
            ));
        }

        let lines: Vec<String> = permissions
            .iter()
            .enumerate()
            .map(|(i, p)| {
                format!(
                    "{}. Token: {}, Allowance: {}, Period: {} seconds, Start: {}, End: {}",
                    i + 1,
                    p.token_label(),
                    p.allowance,
                    p.period,
                    format_timestamp(p.start),
                    format_timestamp(p.end)
                )
            })
            .collect();

        ActionResult::success(format!(
            "Found {} spend permission(s):\n{}",
            permissions.len(),
            lines.join("\n")
        ))
        .with_metadata(json!({ "permissions": permissions }))
    }
}

#[derive(Debug, Deserialize)]
struct UseParams {
    smart_wallet_address: String,
    /// Atomic units of the permission's token
    value: String,
    #[serde(default)]
    token: Option<String>,
}

pub struct UseSpendPermission(Arc<dyn SpendPermissionSource>);

impl UseSpendPermission {
    async fn run(&self, evm: &dyn EvmWalletProvider, params: &UseParams) -> Result<String, String> {
        let (account, spender) = wallet_addresses(evm, &params.smart_wallet_address)?;
        let value = U256::from_dec_str(params.value.trim())
            .map_err(|_| format!("Invalid value '{}'. Must be an integer amount in atomic units.", params.value))?;
        if value.is_zero() {
            return Err("Value must be greater than 0".to_string());
        }

        let token = match params.token.as_deref() {
            Some(t) if t.eq_ignore_ascii_case("eth") => Some(parse_address(NATIVE_TOKEN_ADDRESS).map_err(|e| e.to_string())?),
            Some(t) => Some(resolve_token_address(evm.get_network().network_id_str(), t)?),
            None => None,
        };

        let permissions = fetch_with_retry(self.0.as_ref(), account, spender).await?;
        let permission = permissions
            .into_iter()
            .filter(|p| token.map(|t| p.token == t).unwrap_or(true))
            .max_by_key(|p| p.start)
            .ok_or_else(|| match params.token.as_deref() {
                Some(t) => format!("No spend permission found for token {}", t),
                None => "No spend permissions found".to_string(),
            })?;

        let manager = manager_address();
        let permission_arg = [permission.to_token()];
        let period = retry_with_exponential_backoff(
            || evm.read_contract(manager, &GET_CURRENT_PERIOD, &permission_arg),
            FETCH_RETRIES,
            FETCH_BASE_DELAY_MS,
            STATUS_INITIAL_DELAY_MS,
        )
        .await
        .and_then(PeriodSpend::from_tokens)
        .map_err(|e| format!("Could not read the permission's current period: {}", e))?;

        let remaining = permission.allowance.saturating_sub(period.spend);
        if value > remaining {
            return Err(format!(
                "Spend amount {} exceeds remaining allowance {} for the current period (ends {})",
                value,
                remaining,
                format_timestamp(period.end)
            ));
        }

        let data = encode_call(&SPEND, &[permission.to_token(), Token::Uint(value)]).map_err(|e| e.to_string())?;
        let tx_hash = evm
            .send_transaction(TransactionRequest::new(manager).data(data))
            .await
            .map_err(|e| e.to_string())?;
        let receipt = evm.wait_for_receipt(tx_hash).await.map_err(|e| e.to_string())?;
        if !receipt.succeeded() {
            return Err(format!("Transaction {} reverted", format_hash(tx_hash)));
        }

        log::info!(
            "[spend_permission] Spent {} of {} from {}",
            value,
            permission.token_label(),
            format_address(account)
        );
        Ok(format!(
            "Successfully spent {} tokens from spend permission.\nTransaction hash: {}",
            value,
            format_hash(tx_hash)
        ))
    }
}

#[async_trait]
impl Action for UseSpendPermission {
    fn definition(&self) -> ActionDefinition {
        ActionDefinition {
            name: "use_spend_permission".to_string(),
            description: "Spend tokens from a spend permission a smart wallet granted to this wallet. The value is in atomic units of the token."
                .to_string(),
            input_schema: ActionInputSchema::default()
                .required_property(
                    "smart_wallet_address",
                    PropertySchema::string("Address of the smart wallet that granted the permission"),
                )
                .required_property("value", PropertySchema::string("Amount to spend in atomic units"))
                .property(
                    "token",
                    PropertySchema::string("Token address or symbol of the permission; defaults to the most recent one"),
                ),
        }
    }

    async fn invoke(&self, params: Value, context: &ActionContext) -> ActionResult {
        let params: UseParams = match parse_params(params) {
            Ok(p) => p,
            Err(e) => return e,
        };
        let evm = match context.evm() {
            Ok(w) => w,
            Err(e) => return e,
        };

        match self.run(evm, &params).await {
            Ok(content) => ActionResult::success(content),
            Err(e) => ActionResult::error(format!("Failed to use spend permission: {}", e)),
        }
    }
}
