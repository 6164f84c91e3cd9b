//! Built-in action providers

pub mod erc20;
pub mod polymarket;
pub mod pyth;
pub mod spend_permission;
pub mod wallet;
pub mod weth;
pub mod x402;

use std::sync::Arc;

use crate::action::ActionProvider;
use crate::config::Config;
use crate::http::HttpClient;

/// Providers that need nothing beyond configuration and an HTTP client.
/// `spend_permission` is added by callers that have a permission source.
pub fn default_providers(config: &Config, http: Arc<dyn HttpClient>) -> Vec<Box<dyn ActionProvider>> {
    vec![
        Box::new(wallet::WalletActionProvider),
        Box::new(erc20::Erc20ActionProvider),
        Box::new(weth::WethActionProvider),
        Box::new(pyth::PythActionProvider::new(http.clone(), config.pyth_hermes_url.clone())),
        Box::new(polymarket::PolymarketActionProvider::new(
            http.clone(),
            config.polymarket_gamma_url.clone(),
        )),
        Box::new(x402::X402ActionProvider::new(http)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::testing::MockWallet;
    use crate::action::AgentKit;
    use crate::http::testing::MockHttpClient;

    fn kit_on(network_id: &str) -> AgentKit {
        let http = Arc::new(MockHttpClient::default());
        AgentKit::new(
            Arc::new(MockWallet::on(network_id)),
            default_providers(&Config::default(), http),
        )
    }

    #[test]
    fn test_base_sepolia_gets_every_provider() {
        let kit = kit_on("base-sepolia");
        assert_eq!(kit.providers(), ["wallet", "erc20", "weth", "pyth", "polymarket", "x402"]);

        let names: Vec<String> = kit.definitions().into_iter().map(|d| d.name).collect();
        for expected in [
            "get_wallet_details",
            "get_balance",
            "transfer",
            "wrap_eth",
            "fetch_price",
            "get_markets",
            "make_http_request_with_x402",
        ] {
            assert!(names.iter().any(|n| n == expected), "missing {}", expected);
        }
    }

    #[test]
    fn test_polygon_skips_network_bound_providers() {
        let kit = kit_on("polygon-mainnet");
        assert!(!kit.providers().iter().any(|p| p == "weth" || p == "x402"));
        assert!(kit.providers().iter().any(|p| p == "erc20"));
    }
}
