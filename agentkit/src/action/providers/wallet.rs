//! Basic wallet actions available on every network

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::action::{
    parse_params, Action, ActionContext, ActionDefinition, ActionInputSchema, ActionProvider,
    ActionResult, PropertySchema,
};
use crate::amount::{format_ether, is_positive_decimal};
use crate::network::Network;
use crate::wallet::{format_hash, is_address};

pub struct WalletActionProvider;

impl ActionProvider for WalletActionProvider {
    fn name(&self) -> &str {
        "wallet"
    }

    fn supports_network(&self, _network: &Network) -> bool {
        true
    }

    fn actions(&self) -> Vec<Arc<dyn Action>> {
        vec![Arc::new(GetWalletDetails), Arc::new(NativeTransfer)]
    }
}

pub struct GetWalletDetails;

#[async_trait]
impl Action for GetWalletDetails {
    fn definition(&self) -> ActionDefinition {
        ActionDefinition {
            name: "get_wallet_details".to_string(),
            description: "Get details about the connected wallet: address, provider, network and native balance."
                .to_string(),
            input_schema: ActionInputSchema::default(),
        }
    }

    async fn invoke(&self, _params: Value, context: &ActionContext) -> ActionResult {
        let wallet = &context.wallet;
        let network = wallet.get_network();

        let balance = match wallet.get_balance().await {
            Ok(b) => b,
            Err(e) => return ActionResult::error(format!("Error getting wallet details: {}", e)),
        };

        let content = format!(
            "Wallet Details:\n\
             - Provider: {}\n\
             - Address: {}\n\
             - Network:\n\
             \x20 * Protocol Family: {}\n\
             \x20 * Network ID: {}\n\
             \x20 * Chain ID: {}\n\
             - Native Balance: {} wei ({} {})",
            wallet.get_name(),
            wallet.get_address(),
            network.protocol_family,
            network.network_id_str(),
            network.chain_id.map(|c| c.to_string()).unwrap_or_else(|| "N/A".to_string()),
            balance,
            format_ether(balance),
            network.native_currency()
        );

        ActionResult::success(content).with_metadata(json!({
            "address": wallet.get_address(),
            "provider": wallet.get_name(),
            "network": network,
            "balance_wei": balance.to_string(),
        }))
    }
}

#[derive(Debug, Deserialize)]
struct NativeTransferParams {
    to: String,
    value: String,
}

pub struct NativeTransfer;

impl NativeTransfer {
    fn validate(params: &NativeTransferParams) -> Result<(), ActionResult> {
        let value = params.value.trim();
        if value.parse::<f64>().map(|v| v == 0.0).unwrap_or(false) {
            return Err(ActionResult::error("Failed to parse decimal value"));
        }
        if !is_positive_decimal(value) {
            return Err(ActionResult::error("Invalid decimal format. Must be a positive number."));
        }
        if !is_address(&params.to) {
            return Err(ActionResult::error(format!("Invalid destination address: {}", params.to)));
        }
        Ok(())
    }
}

#[async_trait]
impl Action for NativeTransfer {
    fn definition(&self) -> ActionDefinition {
        ActionDefinition {
            name: "native_transfer".to_string(),
            description: "Transfer native tokens (e.g. ETH) from the wallet to another address. Value is in whole units, e.g. '0.01' for 0.01 ETH."
                .to_string(),
            input_schema: ActionInputSchema::default()
                .required_property("to", PropertySchema::string("The destination address, e.g. '0x5154eae861cac3aa757d6016babaf972341354cf'"))
                .required_property("value", PropertySchema::string("The amount to transfer in whole units, e.g. '1' for 1 ETH")),
        }
    }

    async fn invoke(&self, params: Value, context: &ActionContext) -> ActionResult {
        let params: NativeTransferParams = match parse_params(params) {
            Ok(p) => p,
            Err(e) => return e,
        };
        if let Err(e) = Self::validate(&params) {
            return e;
        }

        let value = params.value.trim();
        let currency = context.wallet.get_network().native_currency();
        log::info!("[wallet] Transferring {} {} to {}", value, currency, params.to);

        match context.wallet.native_transfer(&params.to, value).await {
            Ok(tx_hash) => ActionResult::success(format!(
                "Transferred {} {} to {}.\nTransaction hash: {}",
                value,
                currency,
                params.to,
                format_hash(tx_hash)
            )),
            Err(e) => ActionResult::error(format!("Error during transaction: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::testing::{MockWallet, MOCK_TX_HASH};
    use crate::wallet::{WalletError, WalletProvider};

    const DEST: &str = "0x9876543210987654321098765432109876543210";

    fn context(wallet: MockWallet) -> (Arc<MockWallet>, ActionContext) {
        let wallet = Arc::new(wallet);
        (wallet.clone(), ActionContext::new(wallet))
    }

    #[tokio::test]
    async fn test_native_transfer_success() {
        let (wallet, ctx) = context(MockWallet::base_sepolia());
        let result = NativeTransfer
            .invoke(json!({"to": DEST, "value": "0.01"}), &ctx)
            .await;

        assert!(result.success, "{}", result.content);
        assert_eq!(
            result.content,
            format!("Transferred 0.01 ETH to {}.\nTransaction hash: {:?}", DEST, MOCK_TX_HASH)
        );
        assert_eq!(
            wallet.transfers.lock().unwrap().clone(),
            vec![(DEST.to_string(), "0.01".to_string())]
        );
    }

    #[tokio::test]
    async fn test_native_transfer_validation() {
        let (wallet, ctx) = context(MockWallet::base_sepolia());

        for bad in ["-1", "abc", "1e5", ""] {
            let result = NativeTransfer.invoke(json!({"to": DEST, "value": bad}), &ctx).await;
            assert_eq!(result.content, "Invalid decimal format. Must be a positive number.", "value {}", bad);
        }

        let zero = NativeTransfer.invoke(json!({"to": DEST, "value": "0"}), &ctx).await;
        assert_eq!(zero.content, "Failed to parse decimal value");

        let missing = NativeTransfer.invoke(json!({"to": DEST}), &ctx).await;
        assert!(missing.content.starts_with("Invalid parameters:"));

        assert!(wallet.transfers.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_native_transfer_error() {
        let wallet = MockWallet::base_sepolia().failing_sends(WalletError::Transaction("insufficient funds".to_string()));
        let (_, ctx) = context(wallet);
        let result = NativeTransfer.invoke(json!({"to": DEST, "value": "1"}), &ctx).await;
        assert!(!result.success);
        assert_eq!(result.content, "Error during transaction: Transaction failed: insufficient funds");
    }

    #[tokio::test]
    async fn test_get_wallet_details() {
        let (wallet, ctx) = context(MockWallet::base_sepolia());
        let result = GetWalletDetails.invoke(json!({}), &ctx).await;

        assert!(result.success);
        assert!(result.content.contains(&wallet.get_address()));
        assert!(result.content.contains("base-sepolia"));
        assert!(result.content.contains("84532"));
        assert!(result.content.contains("1000000000000000000 wei (1 ETH)"));
    }
}
