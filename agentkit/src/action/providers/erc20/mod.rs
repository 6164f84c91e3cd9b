//! ERC20 token actions
//!
//! Token arguments accept either a contract address or a symbol from the
//! token table of the wallet's network.

pub mod constants;
pub mod utils;

use async_trait::async_trait;
use ethers::abi::Token;
use ethers::types::Address;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use self::constants::*;
use self::utils::{get_token_details, resolve_token_address, TokenDetails};
use crate::abi::{encode_call, expect_uint};
use crate::action::{
    parse_params, Action, ActionContext, ActionDefinition, ActionInputSchema, ActionProvider,
    ActionResult, PropertySchema,
};
use crate::amount::{format_units, parse_units};
use crate::network::Network;
use crate::tokens;
use crate::wallet::{
    format_address, format_hash, parse_address, EvmWalletProvider, TransactionRequest, WalletError,
};

pub struct Erc20ActionProvider;

impl ActionProvider for Erc20ActionProvider {
    fn name(&self) -> &str {
        "erc20"
    }

    fn supports_network(&self, network: &Network) -> bool {
        network.supports_evm()
    }

    fn actions(&self) -> Vec<Arc<dyn Action>> {
        vec![
            Arc::new(GetBalance),
            Arc::new(Transfer),
            Arc::new(Approve),
            Arc::new(GetAllowance),
            Arc::new(GetTokenAddress),
        ]
    }
}

fn token_details_error(contract: &str) -> ActionResult {
    ActionResult::error(format!(
        "Error: Could not fetch token details for {}. Please verify the token address is correct.",
        contract
    ))
}

fn address_param(value: &str, what: &str) -> Result<Address, ActionResult> {
    parse_address(value).map_err(|_| ActionResult::error(format!("Error: Invalid {} address: {}", what, value)))
}

/// Resolve the token argument and fetch its details for `owner`
async fn load_token(
    evm: &dyn EvmWalletProvider,
    token: &str,
    owner: Option<Address>,
) -> Result<(Address, TokenDetails), ActionResult> {
    let network = evm.get_network();
    let contract = resolve_token_address(network.network_id_str(), token).map_err(ActionResult::error)?;
    match get_token_details(evm, contract, owner).await {
        Some(details) => Ok((contract, details)),
        None => Err(token_details_error(token)),
    }
}

fn token_property() -> PropertySchema {
    PropertySchema::string("The ERC20 token contract address, or a token symbol such as 'USDC'")
}

// ---------------------------------------------------------------------------
// get_balance

#[derive(Debug, Deserialize)]
struct GetBalanceParams {
    contract_address: String,
    #[serde(default)]
    address: Option<String>,
}

pub struct GetBalance;

#[async_trait]
impl Action for GetBalance {
    fn definition(&self) -> ActionDefinition {
        ActionDefinition {
            name: "get_balance".to_string(),
            description: "Get the balance of an ERC20 token for the wallet, or for another address when given. Returns the balance in whole units."
                .to_string(),
            input_schema: ActionInputSchema::default()
                .required_property("contract_address", token_property())
                .property(
                    "address",
                    PropertySchema::string("Address to check; defaults to the connected wallet"),
                ),
        }
    }

    async fn invoke(&self, params: Value, context: &ActionContext) -> ActionResult {
        let params: GetBalanceParams = match parse_params(params) {
            Ok(p) => p,
            Err(e) => return e,
        };
        let evm = match context.evm() {
            Ok(w) => w,
            Err(e) => return e,
        };

        let owner = match params.address.as_deref() {
            Some(a) => match address_param(a, "owner") {
                Ok(addr) => Some(addr),
                Err(e) => return e,
            },
            None => None,
        };
        let owner_display = params.address.clone().unwrap_or_else(|| evm.get_address());

        let (contract, details) = match load_token(evm, &params.contract_address, owner).await {
            Ok(t) => t,
            Err(e) => return e,
        };

        ActionResult::success(format!(
            "Balance of {} ({}) at address {} is {}",
            details.name, params.contract_address, owner_display, details.formatted_balance
        ))
        .with_metadata(json!({
            "contract_address": format_address(contract),
            "name": details.name,
            "decimals": details.decimals,
            "balance": details.balance.to_string(),
        }))
    }
}

// ---------------------------------------------------------------------------
// transfer

#[derive(Debug, Deserialize)]
struct TransferParams {
    amount: String,
    contract_address: String,
    destination_address: String,
}

pub struct Transfer;

impl Transfer {
    async fn run(evm: &dyn EvmWalletProvider, params: &TransferParams) -> Result<String, ActionResult> {
        let (contract, details) = load_token(evm, &params.contract_address, None).await?;
        let destination = address_param(&params.destination_address, "destination")?;

        let amount = parse_units(&params.amount, details.decimals)
            .map_err(|e| ActionResult::error(format!("Error: {}", e)))?;
        if amount.is_zero() {
            return Err(ActionResult::error("Error: Amount must be greater than 0"));
        }

        if destination == contract {
            return Err(ActionResult::error(
                "Error: Transfer destination is the token contract address. Refusing transfer to prevent loss of funds.",
            ));
        }
        if get_token_details(evm, destination, None).await.is_some() {
            return Err(ActionResult::error(
                "Error: Transfer destination is an ERC20 token contract. Refusing to transfer to prevent loss of funds.",
            ));
        }

        let data = encode_call(&ERC20_TRANSFER, &[Token::Address(destination), Token::Uint(amount)])
            .map_err(|e| ActionResult::error(format!("Error transferring the asset: {}", e)))?;

        let send = async {
            let tx_hash = evm.send_transaction(TransactionRequest::new(contract).data(data)).await?;
            let receipt = evm.wait_for_receipt(tx_hash).await?;
            if !receipt.succeeded() {
                return Err(WalletError::Transaction(format!("Transaction {:?} reverted", tx_hash)));
            }
            Ok::<_, WalletError>(tx_hash)
        };

        match send.await {
            Ok(tx_hash) => {
                log::info!(
                    "[erc20] Transferred {} {} to {:?}: {:?}",
                    params.amount,
                    details.name,
                    destination,
                    tx_hash
                );
                Ok(format!(
                    "Transferred {} of {} ({}) to {}.\nTransaction hash for the transfer: {}",
                    params.amount,
                    details.name,
                    params.contract_address,
                    params.destination_address,
                    format_hash(tx_hash)
                ))
            }
            Err(e) => Err(ActionResult::error(format!("Error transferring the asset: {}", e))),
        }
    }
}

#[async_trait]
impl Action for Transfer {
    fn definition(&self) -> ActionDefinition {
        ActionDefinition {
            name: "transfer".to_string(),
            description: "Transfer an amount of an ERC20 token to a destination address. The amount is in whole units, e.g. '1.5' for 1.5 USDC. Refuses transfers to token contracts."
                .to_string(),
            input_schema: ActionInputSchema::default()
                .required_property("amount", PropertySchema::string("Amount in whole units, e.g. '10.5'"))
                .required_property("contract_address", token_property())
                .required_property("destination_address", PropertySchema::string("Recipient address")),
        }
    }

    async fn invoke(&self, params: Value, context: &ActionContext) -> ActionResult {
        let params: TransferParams = match parse_params(params) {
            Ok(p) => p,
            Err(e) => return e,
        };
        let evm = match context.evm() {
            Ok(w) => w,
            Err(e) => return e,
        };

        match Self::run(evm, &params).await {
            Ok(content) => ActionResult::success(content),
            Err(e) => e,
        }
    }
}

// ---------------------------------------------------------------------------
// approve

#[derive(Debug, Deserialize)]
struct ApproveParams {
    amount: String,
    contract_address: String,
    spender_address: String,
}

pub struct Approve;

#[async_trait]
impl Action for Approve {
    fn definition(&self) -> ActionDefinition {
        ActionDefinition {
            name: "approve".to_string(),
            description: "Approve a spender to transfer up to an amount of an ERC20 token from the wallet. Amount is in whole units; 0 revokes."
                .to_string(),
            input_schema: ActionInputSchema::default()
                .required_property("amount", PropertySchema::string("Allowance in whole units (0 or more)"))
                .required_property("contract_address", token_property())
                .required_property("spender_address", PropertySchema::string("Address allowed to spend")),
        }
    }

    async fn invoke(&self, params: Value, context: &ActionContext) -> ActionResult {
        let params: ApproveParams = match parse_params(params) {
            Ok(p) => p,
            Err(e) => return e,
        };
        let evm = match context.evm() {
            Ok(w) => w,
            Err(e) => return e,
        };

        let (contract, details) = match load_token(evm, &params.contract_address, None).await {
            Ok(t) => t,
            Err(e) => return e,
        };
        let spender = match address_param(&params.spender_address, "spender") {
            Ok(s) => s,
            Err(e) => return e,
        };
        let amount = match parse_units(&params.amount, details.decimals) {
            Ok(a) => a,
            Err(e) => return ActionResult::error(format!("Error: {}", e)),
        };

        let send = async {
            let data = encode_call(&ERC20_APPROVE, &[Token::Address(spender), Token::Uint(amount)])?;
            let tx_hash = evm.send_transaction(TransactionRequest::new(contract).data(data)).await?;
            evm.wait_for_receipt(tx_hash).await?;
            Ok::<_, WalletError>(tx_hash)
        };

        match send.await {
            Ok(tx_hash) => ActionResult::success(format!(
                "Approved {} {} ({}) for spender {}.\nTransaction hash: {}",
                params.amount,
                details.name,
                params.contract_address,
                params.spender_address,
                format_hash(tx_hash)
            )),
            Err(e) => ActionResult::error(format!("Error approving tokens: {}", e)),
        }
    }
}

// ---------------------------------------------------------------------------
// get_allowance

#[derive(Debug, Deserialize)]
struct GetAllowanceParams {
    contract_address: String,
    spender_address: String,
}

pub struct GetAllowance;

#[async_trait]
impl Action for GetAllowance {
    fn definition(&self) -> ActionDefinition {
        ActionDefinition {
            name: "get_allowance".to_string(),
            description: "Check how much of an ERC20 token a spender may transfer from the wallet.".to_string(),
            input_schema: ActionInputSchema::default()
                .required_property("contract_address", token_property())
                .required_property("spender_address", PropertySchema::string("Spender address to check")),
        }
    }

    async fn invoke(&self, params: Value, context: &ActionContext) -> ActionResult {
        let params: GetAllowanceParams = match parse_params(params) {
            Ok(p) => p,
            Err(e) => return e,
        };
        let evm = match context.evm() {
            Ok(w) => w,
            Err(e) => return e,
        };

        let (contract, details) = match load_token(evm, &params.contract_address, None).await {
            Ok(t) => t,
            Err(e) => return e,
        };
        let spender = match address_param(&params.spender_address, "spender") {
            Ok(s) => s,
            Err(e) => return e,
        };
        let owner = match parse_address(&evm.get_address()) {
            Ok(o) => o,
            Err(e) => return ActionResult::error(format!("Error checking allowance: {}", e)),
        };

        let allowance = evm
            .read_contract(contract, &ERC20_ALLOWANCE, &[Token::Address(owner), Token::Address(spender)])
            .await
            .and_then(|out| expect_uint(&out, "allowance"));

        match allowance {
            Ok(raw) => ActionResult::success(format!(
                "Allowance for {} to spend {} ({}) is {} tokens",
                params.spender_address,
                details.name,
                params.contract_address,
                format_units(raw, details.decimals)
            ))
            .with_metadata(json!({ "allowance": raw.to_string(), "decimals": details.decimals })),
            Err(e) => ActionResult::error(format!("Error checking allowance: {}", e)),
        }
    }
}

// ---------------------------------------------------------------------------
// get_token_address

#[derive(Debug, Deserialize)]
struct GetTokenAddressParams {
    symbol: String,
}

pub struct GetTokenAddress;

#[async_trait]
impl Action for GetTokenAddress {
    fn definition(&self) -> ActionDefinition {
        ActionDefinition {
            name: "get_token_address".to_string(),
            description: "Look up the contract address of a well-known token symbol on the wallet's network. Case-insensitive."
                .to_string(),
            input_schema: ActionInputSchema::default()
                .required_property("symbol", PropertySchema::string("Token symbol, e.g. 'USDC' or 'WETH'")),
        }
    }

    async fn invoke(&self, params: Value, context: &ActionContext) -> ActionResult {
        let params: GetTokenAddressParams = match parse_params(params) {
            Ok(p) => p,
            Err(e) => return e,
        };
        let network = context.wallet.get_network();
        let network_id = network.network_id_str();
        let symbol = params.symbol.trim().to_uppercase();

        match tokens::lookup_token(network_id, &symbol) {
            Some(info) => ActionResult::success(format!(
                "Token address for {} on {}: {}",
                symbol, network_id, info.address
            ))
            .with_metadata(json!({
                "symbol": symbol,
                "address": info.address,
                "decimals": info.decimals,
                "name": info.name,
            })),
            None => {
                let available = tokens::tokens()
                    .map(|t| t.symbols(network_id))
                    .unwrap_or_default();
                ActionResult::error(format!(
                    "Error: Token symbol {} not found on {}. Available tokens: {}",
                    symbol,
                    network_id,
                    if available.is_empty() { "none".to_string() } else { available.join(", ") }
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::utils::testing::{reverted_response, token_details_response};
    use super::*;
    use crate::action::testing::{MockWallet, MOCK_TX_HASH};
    use crate::wallet::WalletProvider;
    use ethers::types::U256;

    const CONTRACT: &str = "0x1234567890123456789012345678901234567890";
    const DESTINATION: &str = "0x9876543210987654321098765432109876543210";
    const SPENDER: &str = "0xabcdef1234567890123456789012345678901234";

    fn token_wallet() -> MockWallet {
        MockWallet::base_sepolia().with_read(
            "aggregate3",
            token_details_response("MockToken", 6, U256::from(1_000_000_000_000_000_000u64)),
        )
    }

    fn context(wallet: MockWallet) -> (Arc<MockWallet>, ActionContext) {
        let wallet = Arc::new(wallet);
        (wallet.clone(), ActionContext::new(wallet))
    }

    #[tokio::test]
    async fn test_get_balance_success() {
        let (_, ctx) = context(token_wallet());
        let result = GetBalance.invoke(json!({"contract_address": CONTRACT}), &ctx).await;

        assert!(result.success, "{}", result.content);
        assert!(result.content.contains("MockToken"));
        assert!(result.content.contains(CONTRACT));
        assert!(result.content.contains("1000000000000"));
    }

    #[tokio::test]
    async fn test_get_balance_error() {
        let (_, ctx) = context(MockWallet::base_sepolia());
        let result = GetBalance.invoke(json!({"contract_address": CONTRACT}), &ctx).await;
        assert!(!result.success);
        assert!(result.content.contains("Error"));
        assert!(result.content.contains("Could not fetch token details"));

        let missing = GetBalance.invoke(json!({}), &ctx).await;
        assert!(missing.content.starts_with("Invalid parameters:"));
    }

    #[tokio::test]
    async fn test_transfer_destination_is_token() {
        // Every address answers like a token, including the destination
        let (wallet, ctx) = context(token_wallet());
        let result = Transfer
            .invoke(
                json!({"amount": "1.5", "contract_address": CONTRACT, "destination_address": DESTINATION}),
                &ctx,
            )
            .await;
        assert!(!result.success);
        assert!(result.content.contains("is an ERC20 token contract"));
        assert!(wallet.sent().is_empty());

        let self_send = Transfer
            .invoke(
                json!({"amount": "1", "contract_address": CONTRACT, "destination_address": CONTRACT}),
                &ctx,
            )
            .await;
        assert!(self_send.content.contains("is the token contract address"));
    }

    /// Token contract answers details, destination reverts (an EOA)
    struct SelectiveWallet {
        inner: MockWallet,
        token: Address,
    }

    #[async_trait]
    impl WalletProvider for SelectiveWallet {
        fn get_address(&self) -> String {
            self.inner.get_address()
        }
        fn get_network(&self) -> Network {
            self.inner.get_network()
        }
        fn get_name(&self) -> &str {
            self.inner.get_name()
        }
        async fn get_balance(&self) -> Result<U256, WalletError> {
            self.inner.get_balance().await
        }
        async fn sign_message(&self, message: &[u8]) -> Result<ethers::types::Signature, WalletError> {
            self.inner.sign_message(message).await
        }
        async fn native_transfer(&self, to: &str, value: &str) -> Result<ethers::types::H256, WalletError> {
            self.inner.native_transfer(to, value).await
        }
        fn as_evm(&self) -> Option<&dyn EvmWalletProvider> {
            Some(self)
        }
    }

    #[async_trait]
    impl EvmWalletProvider for SelectiveWallet {
        async fn sign_hash(&self, hash: ethers::types::H256) -> Result<ethers::types::Signature, WalletError> {
            self.inner.sign_hash(hash).await
        }
        async fn sign_typed_data(&self, data: &Value) -> Result<ethers::types::Signature, WalletError> {
            self.inner.sign_typed_data(data).await
        }
        async fn sign_transaction(
            &self,
            tx: &ethers::types::transaction::eip2718::TypedTransaction,
        ) -> Result<ethers::types::Signature, WalletError> {
            self.inner.sign_transaction(tx).await
        }
        async fn send_transaction(&self, tx: TransactionRequest) -> Result<ethers::types::H256, WalletError> {
            self.inner.send_transaction(tx).await
        }
        async fn wait_for_transaction_receipt(
            &self,
            tx_hash: ethers::types::H256,
            timeout: std::time::Duration,
            poll: std::time::Duration,
        ) -> Result<crate::wallet::TransactionReceipt, WalletError> {
            self.inner.wait_for_transaction_receipt(tx_hash, timeout, poll).await
        }
        async fn read_contract(
            &self,
            address: Address,
            function: &ethers::abi::Function,
            args: &[Token],
        ) -> Result<Vec<Token>, WalletError> {
            let target = match args.first() {
                Some(Token::Array(calls)) => match calls.first() {
                    Some(Token::Tuple(fields)) => fields.first().cloned(),
                    _ => None,
                },
                _ => None,
            };
            if target == Some(Token::Address(self.token)) {
                self.inner.read_contract(address, function, args).await
            } else {
                Ok(reverted_response())
            }
        }
    }

    fn selective(inner: MockWallet) -> Arc<SelectiveWallet> {
        Arc::new(SelectiveWallet {
            inner,
            token: parse_address(CONTRACT).unwrap(),
        })
    }

    #[tokio::test]
    async fn test_transfer_success() {
        let wallet = selective(token_wallet());
        let ctx = ActionContext::new(wallet.clone());

        let result = Transfer
            .invoke(
                json!({"amount": "1.5", "contract_address": CONTRACT, "destination_address": DESTINATION}),
                &ctx,
            )
            .await;

        assert!(result.success, "{}", result.content);
        assert!(result.content.contains(&format!("Transferred 1.5 of MockToken ({}) to {}", CONTRACT, DESTINATION)));
        assert!(result
            .content
            .contains(&format!("Transaction hash for the transfer: {:?}", MOCK_TX_HASH)));

        let sent = wallet.inner.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, parse_address(CONTRACT).unwrap());
        let expected = encode_call(
            &ERC20_TRANSFER,
            &[Token::Address(parse_address(DESTINATION).unwrap()), Token::Uint(U256::from(1_500_000u64))],
        )
        .unwrap();
        assert_eq!(sent[0].data.to_vec(), expected);
    }

    #[tokio::test]
    async fn test_transfer_error() {
        let wallet = selective(token_wallet().failing_sends(WalletError::Rpc("nonce too low".to_string())));
        let ctx = ActionContext::new(wallet);
        let result = Transfer
            .invoke(
                json!({"amount": "1", "contract_address": CONTRACT, "destination_address": DESTINATION}),
                &ctx,
            )
            .await;
        assert_eq!(result.content, "Error transferring the asset: RPC error: nonce too low");
    }

    #[tokio::test]
    async fn test_approve() {
        let (wallet, ctx) = context(token_wallet());
        let result = Approve
            .invoke(
                json!({"amount": "100", "contract_address": CONTRACT, "spender_address": SPENDER}),
                &ctx,
            )
            .await;

        assert!(result.success, "{}", result.content);
        assert!(result.content.contains("Approved 100 MockToken"));
        assert!(result.content.contains(CONTRACT));
        assert!(result.content.contains(SPENDER));
        assert!(result.content.contains(&format!("Transaction hash: {:?}", MOCK_TX_HASH)));

        let expected = encode_call(
            &ERC20_APPROVE,
            &[Token::Address(parse_address(SPENDER).unwrap()), Token::Uint(U256::from(100_000_000u64))],
        )
        .unwrap();
        assert_eq!(wallet.sent()[0].data.to_vec(), expected);
    }

    #[tokio::test]
    async fn test_approve_errors() {
        let (_, ctx) = context(MockWallet::base_sepolia());
        let no_details = Approve
            .invoke(json!({"amount": "1", "contract_address": CONTRACT, "spender_address": SPENDER}), &ctx)
            .await;
        assert!(no_details.content.contains("Could not fetch token details"));

        let failing = token_wallet().failing_sends(WalletError::Transaction("reverted".to_string()));
        let (_, ctx) = context(failing);
        let result = Approve
            .invoke(json!({"amount": "1", "contract_address": CONTRACT, "spender_address": SPENDER}), &ctx)
            .await;
        assert_eq!(result.content, "Error approving tokens: Transaction failed: reverted");
    }

    #[tokio::test]
    async fn test_get_allowance() {
        let wallet = token_wallet().with_read("allowance", vec![Token::Uint(U256::from(2_500_000u64))]);
        let (wallet, ctx) = context(wallet);
        let result = GetAllowance
            .invoke(json!({"contract_address": CONTRACT, "spender_address": SPENDER}), &ctx)
            .await;

        assert!(result.success, "{}", result.content);
        assert_eq!(
            result.content,
            format!("Allowance for {} to spend MockToken ({}) is 2.5 tokens", SPENDER, CONTRACT)
        );
        assert_eq!(wallet.read_names(), vec!["aggregate3", "allowance"]);

        let failing = token_wallet().with_read_error("allowance", WalletError::Rpc("boom".to_string()));
        let (_, ctx) = context(failing);
        let result = GetAllowance
            .invoke(json!({"contract_address": CONTRACT, "spender_address": SPENDER}), &ctx)
            .await;
        assert_eq!(result.content, "Error checking allowance: RPC error: boom");
    }

    #[tokio::test]
    async fn test_get_token_address() {
        let config_dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../config");
        tokens::load_tokens(&config_dir).unwrap();

        let (_, ctx) = context(MockWallet::on("base-mainnet"));
        let result = GetTokenAddress.invoke(json!({"symbol": "usdc"}), &ctx).await;
        assert!(result.success);
        assert!(result.content.contains("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"));

        let missing = GetTokenAddress.invoke(json!({"symbol": "NOPE"}), &ctx).await;
        assert!(!missing.success);
        assert!(missing.content.contains("USDC"));
    }

    #[test]
    fn test_provider_supports_evm_only() {
        let provider = Erc20ActionProvider;
        assert!(provider.supports_network(&Network::from_network_id("base-mainnet").unwrap()));
        let solana = Network::new(crate::network::ProtocolFamily::Solana, Some("solana-mainnet"), None);
        assert!(!provider.supports_network(&solana));
        assert_eq!(provider.actions().len(), 5);
    }
}
