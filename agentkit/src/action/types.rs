use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::wallet::{EvmWalletProvider, WalletProvider};

/// JSON Schema property definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<PropertySchema>>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
}

impl PropertySchema {
    pub fn new(schema_type: &str, description: impl Into<String>) -> Self {
        PropertySchema {
            schema_type: schema_type.to_string(),
            description: description.into(),
            default: None,
            items: None,
            enum_values: None,
        }
    }

    pub fn string(description: impl Into<String>) -> Self {
        Self::new("string", description)
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_enum(mut self, values: &[&str]) -> Self {
        self.enum_values = Some(values.iter().map(|v| v.to_string()).collect());
        self
    }
}

/// Action input schema using JSON Schema format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionInputSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    pub properties: HashMap<String, PropertySchema>,
    #[serde(default)]
    pub required: Vec<String>,
}

impl Default for ActionInputSchema {
    fn default() -> Self {
        ActionInputSchema {
            schema_type: "object".to_string(),
            properties: HashMap::new(),
            required: vec![],
        }
    }
}

impl ActionInputSchema {
    pub fn property(mut self, name: &str, schema: PropertySchema) -> Self {
        self.properties.insert(name.to_string(), schema);
        self
    }

    pub fn required_property(mut self, name: &str, schema: PropertySchema) -> Self {
        self.required.push(name.to_string());
        self.property(name, schema)
    }
}

/// Descriptor an agent runtime uses to discover and call an action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: ActionInputSchema,
}

/// Result of action execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl ActionResult {
    pub fn success(content: impl Into<String>) -> Self {
        ActionResult {
            success: true,
            content: content.into(),
            error: None,
            metadata: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        let msg = message.into();
        ActionResult {
            success: false,
            content: msg.clone(),
            error: Some(msg),
            metadata: None,
        }
    }

    /// Successful result with a pretty-printed JSON body
    pub fn json(value: Value) -> Self {
        ActionResult::success(pretty(&value)).with_metadata(value)
    }

    /// Failed result with a pretty-printed JSON body
    pub fn json_error(value: Value) -> Self {
        ActionResult::error(pretty(&value)).with_metadata(value)
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Context provided to actions during execution
#[derive(Clone)]
pub struct ActionContext {
    pub wallet: Arc<dyn WalletProvider>,
}

impl ActionContext {
    pub fn new(wallet: Arc<dyn WalletProvider>) -> Self {
        ActionContext { wallet }
    }

    /// EVM capabilities of the wallet, or the error result actions return without them
    pub fn evm(&self) -> Result<&dyn EvmWalletProvider, ActionResult> {
        self.wallet
            .as_evm()
            .ok_or_else(|| ActionResult::error("Error: This action requires an EVM wallet"))
    }
}

/// Deserialize action parameters, mapping failures to an error result
pub fn parse_params<T: serde::de::DeserializeOwned>(params: Value) -> Result<T, ActionResult> {
    // Agents sometimes send null for "no arguments"
    let params = if params.is_null() { Value::Object(Default::default()) } else { params };
    serde_json::from_value(params).map_err(|e| ActionResult::error(format!("Invalid parameters: {}", e)))
}
