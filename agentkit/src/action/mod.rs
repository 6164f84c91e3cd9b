//! Action framework
//!
//! Actions are registered explicitly: every provider hands out its actions as
//! `Arc<dyn Action>` and [`AgentKit`] puts the ones whose provider supports the
//! wallet's network into an [`ActionRegistry`].

pub mod providers;
pub mod registry;
pub mod types;

pub use registry::{Action, ActionRegistry};
pub use types::{
    parse_params, ActionContext, ActionDefinition, ActionInputSchema, ActionResult, PropertySchema,
};

use serde_json::Value;
use std::sync::Arc;

use crate::network::Network;
use crate::wallet::WalletProvider;

/// A named group of related actions
pub trait ActionProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the actions make sense on `network`
    fn supports_network(&self, network: &Network) -> bool;

    fn actions(&self) -> Vec<Arc<dyn Action>>;
}

/// A wallet plus the actions available to it
pub struct AgentKit {
    registry: ActionRegistry,
    context: ActionContext,
    providers: Vec<String>,
}

impl AgentKit {
    pub fn new(wallet: Arc<dyn WalletProvider>, providers: Vec<Box<dyn ActionProvider>>) -> Self {
        let network = wallet.get_network();
        let mut registry = ActionRegistry::new();
        let mut enabled = Vec::new();

        for provider in &providers {
            if !provider.supports_network(&network) {
                log::info!(
                    "[agentkit] Skipping {} (not supported on {})",
                    provider.name(),
                    network.network_id_str()
                );
                continue;
            }
            for action in provider.actions() {
                registry.register(action);
            }
            enabled.push(provider.name().to_string());
        }

        log::info!(
            "[agentkit] {} actions from {} providers for wallet {} on {}",
            registry.len(),
            enabled.len(),
            wallet.get_address(),
            network.network_id_str()
        );

        AgentKit {
            registry,
            context: ActionContext::new(wallet),
            providers: enabled,
        }
    }

    pub async fn invoke(&self, name: &str, params: Value) -> ActionResult {
        self.registry.invoke(name, params, &self.context).await
    }

    pub fn definitions(&self) -> Vec<ActionDefinition> {
        self.registry.definitions()
    }

    pub fn wallet(&self) -> &Arc<dyn WalletProvider> {
        &self.context.wallet
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// Names of providers whose actions were registered
    pub fn providers(&self) -> &[String] {
        &self.providers
    }
}
