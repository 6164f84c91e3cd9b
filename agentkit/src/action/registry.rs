use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use super::types::{ActionContext, ActionDefinition, ActionResult};

/// Trait that all actions must implement
#[async_trait]
pub trait Action: Send + Sync {
    /// Returns the action definition for agent runtimes
    fn definition(&self) -> ActionDefinition;

    /// Executes the action with the given parameters
    async fn invoke(&self, params: Value, context: &ActionContext) -> ActionResult;

    fn name(&self) -> String {
        self.definition().name
    }
}

/// Registry that holds all available actions
#[derive(Default)]
pub struct ActionRegistry {
    actions: HashMap<String, Arc<dyn Action>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        ActionRegistry {
            actions: HashMap::new(),
        }
    }

    /// Register an action; a later registration with the same name wins
    pub fn register(&mut self, action: Arc<dyn Action>) {
        let name = action.name();
        if self.actions.insert(name.clone(), action).is_some() {
            log::warn!("[actions] Action '{}' registered twice, keeping the latest", name);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Action>> {
        self.actions.get(name).cloned()
    }

    /// Definitions sorted by name
    pub fn definitions(&self) -> Vec<ActionDefinition> {
        let mut definitions: Vec<ActionDefinition> =
            self.actions.values().map(|a| a.definition()).collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    /// Execute an action by name
    pub async fn invoke(&self, name: &str, params: Value, context: &ActionContext) -> ActionResult {
        let action = match self.get(name) {
            Some(a) => a,
            None => return ActionResult::error(format!("Action '{}' not found", name)),
        };

        log::debug!("[actions] Invoking {} with {}", name, params);
        action.invoke(params, context).await
    }

    pub fn has_action(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
