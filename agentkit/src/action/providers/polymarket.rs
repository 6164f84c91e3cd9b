//! Prediction markets from the Polymarket Gamma API

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::action::{
    parse_params, Action, ActionContext, ActionDefinition, ActionInputSchema, ActionProvider,
    ActionResult, PropertySchema,
};
use crate::http::{HttpClient, HttpRequest};
use crate::network::Network;

const MAX_LIMIT: u32 = 100;

#[derive(Clone)]
struct Gamma {
    http: Arc<dyn HttpClient>,
    base_url: String,
}

impl Gamma {
    async fn markets(&self, query: &str) -> Result<Vec<GammaMarket>, String> {
        let url = format!("{}/markets?{}", self.base_url.trim_end_matches('/'), query);
        log::debug!("[polymarket] GET {}", url);
        let response = self.http.send(HttpRequest::get(url)).await.map_err(|e| e.to_string())?;
        if !response.is_success() {
            return Err(format!("HTTP error! status: {}", response.status));
        }
        serde_json::from_str(&response.body).map_err(|e| format!("Invalid response from Gamma: {}", e))
    }
}

/// Gamma encodes some list fields as JSON inside a string
fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let list = match value {
        None | Some(Value::Null) => Value::Array(vec![]),
        Some(Value::String(s)) if s.trim().is_empty() => Value::Array(vec![]),
        Some(Value::String(s)) => serde_json::from_str(&s).map_err(serde::de::Error::custom)?,
        Some(other) => other,
    };
    match list {
        Value::Array(items) => Ok(items
            .into_iter()
            .map(|v| match v {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect()),
        other => Err(serde::de::Error::custom(format!("expected a list, got {}", other))),
    }
}

fn number_or_string<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GammaMarket {
    #[serde(default)]
    question: String,
    #[serde(default)]
    slug: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, deserialize_with = "string_list")]
    outcomes: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    outcome_prices: Vec<String>,
    #[serde(default, deserialize_with = "number_or_string")]
    volume: Option<f64>,
    #[serde(default, deserialize_with = "number_or_string")]
    liquidity: Option<f64>,
    #[serde(default)]
    end_date: Option<String>,
    #[serde(default)]
    active: Option<bool>,
    #[serde(default)]
    closed: Option<bool>,
}

impl GammaMarket {
    fn outcomes_json(&self) -> Value {
        let outcomes: Vec<Value> = self
            .outcomes
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let price = self.outcome_prices.get(i).and_then(|p| p.parse::<f64>().ok());
                json!({ "outcome": name, "price": price })
            })
            .collect();
        Value::Array(outcomes)
    }

    fn summary(&self) -> Value {
        json!({
            "question": self.question,
            "slug": self.slug,
            "outcomes": self.outcomes_json(),
            "volume": self.volume,
            "endDate": self.end_date,
        })
    }

    fn details(&self) -> Value {
        json!({
            "question": self.question,
            "slug": self.slug,
            "description": self.description,
            "outcomes": self.outcomes_json(),
            "volume": self.volume,
            "liquidity": self.liquidity,
            "endDate": self.end_date,
            "active": self.active,
            "closed": self.closed,
        })
    }
}

pub struct PolymarketActionProvider {
    gamma: Gamma,
}

impl PolymarketActionProvider {
    pub fn new(http: Arc<dyn HttpClient>, gamma_url: impl Into<String>) -> Self {
        PolymarketActionProvider {
            gamma: Gamma {
                http,
                base_url: gamma_url.into(),
            },
        }
    }
}

impl ActionProvider for PolymarketActionProvider {
    fn name(&self) -> &str {
        "polymarket"
    }

    fn supports_network(&self, _network: &Network) -> bool {
        true
    }

    fn actions(&self) -> Vec<Arc<dyn Action>> {
        vec![
            Arc::new(GetMarkets(self.gamma.clone())),
            Arc::new(GetMarket(self.gamma.clone())),
        ]
    }
}

fn failure(error: impl Into<String>) -> ActionResult {
    ActionResult::json_error(json!({ "success": false, "error": error.into() }))
}

#[derive(Debug, Deserialize)]
struct GetMarketsParams {
    #[serde(default = "default_limit")]
    limit: u32,
    #[serde(default = "default_active")]
    active: bool,
}

fn default_limit() -> u32 {
    10
}

fn default_active() -> bool {
    true
}

pub struct GetMarkets(Gamma);

#[async_trait]
impl Action for GetMarkets {
    fn definition(&self) -> ActionDefinition {
        ActionDefinition {
            name: "get_markets".to_string(),
            description: "List Polymarket prediction markets with their outcomes and current prices.".to_string(),
            input_schema: ActionInputSchema::default()
                .property(
                    "limit",
                    PropertySchema::new("integer", "Maximum number of markets (1-100)").with_default(json!(10)),
                )
                .property(
                    "active",
                    PropertySchema::new("boolean", "Only markets open for trading").with_default(json!(true)),
                ),
        }
    }

    async fn invoke(&self, params: Value, _context: &ActionContext) -> ActionResult {
        let params: GetMarketsParams = match parse_params(params) {
            Ok(p) => p,
            Err(e) => return failure(e.content),
        };
        let limit = params.limit.clamp(1, MAX_LIMIT);
        let query = format!("limit={}&active={}&closed=false", limit, params.active);

        match self.0.markets(&query).await {
            Ok(markets) => {
                let summaries: Vec<Value> = markets.iter().map(GammaMarket::summary).collect();
                ActionResult::json(json!({
                    "success": true,
                    "count": summaries.len(),
                    "markets": summaries,
                }))
            }
            Err(e) => failure(format!("Error fetching markets: {}", e)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GetMarketParams {
    slug: String,
}

pub struct GetMarket(Gamma);

#[async_trait]
impl Action for GetMarket {
    fn definition(&self) -> ActionDefinition {
        ActionDefinition {
            name: "get_market".to_string(),
            description: "Get the details of one Polymarket prediction market by its slug.".to_string(),
            input_schema: ActionInputSchema::default()
                .required_property("slug", PropertySchema::string("Market slug, e.g. 'will-it-rain-tomorrow'")),
        }
    }

    async fn invoke(&self, params: Value, _context: &ActionContext) -> ActionResult {
        let params: GetMarketParams = match parse_params(params) {
            Ok(p) => p,
            Err(e) => return failure(e.content),
        };
        let query = format!("slug={}", urlencoding::encode(params.slug.trim()));

        let markets = match self.0.markets(&query).await {
            Ok(m) => m,
            Err(e) => return failure(format!("Error fetching market: {}", e)),
        };
        match markets.first() {
            Some(market) => ActionResult::json(json!({ "success": true, "market": market.details() })),
            None => failure(format!("No market found with slug {}", params.slug)),
        }
    }
}
