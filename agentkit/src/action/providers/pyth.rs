//! Price feeds from the Pyth Hermes API

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::action::{
    parse_params, Action, ActionContext, ActionDefinition, ActionInputSchema, ActionProvider,
    ActionResult, PropertySchema,
};
use crate::http::{HttpClient, HttpRequest};
use crate::network::Network;

/// Largest |expo| accepted from Hermes
const MAX_PRICE_EXPONENT: u32 = 64;

/// Market-session suffixes of equity feeds outside regular hours
const OFF_HOURS_SUFFIXES: &[&str] = &[".PRE", ".POST", ".ON"];

#[derive(Clone)]
struct Hermes {
    http: Arc<dyn HttpClient>,
    base_url: String,
}

impl Hermes {
    async fn get_json(&self, path_and_query: &str) -> Result<Value, String> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), path_and_query);
        log::debug!("[pyth] GET {}", url);
        let response = self.http.send(HttpRequest::get(url)).await.map_err(|e| e.to_string())?;
        if !response.is_success() {
            return Err(format!("HTTP error! status: {}", response.status));
        }
        response.json_value().map_err(|e| format!("Invalid response from Hermes: {}", e))
    }
}

pub struct PythActionProvider {
    hermes: Hermes,
}

impl PythActionProvider {
    pub fn new(http: Arc<dyn HttpClient>, base_url: impl Into<String>) -> Self {
        PythActionProvider {
            hermes: Hermes {
                http,
                base_url: base_url.into(),
            },
        }
    }
}

impl ActionProvider for PythActionProvider {
    fn name(&self) -> &str {
        "pyth"
    }

    fn supports_network(&self, _network: &Network) -> bool {
        true
    }

    fn actions(&self) -> Vec<Arc<dyn Action>> {
        vec![
            Arc::new(FetchPriceFeed(self.hermes.clone())),
            Arc::new(FetchPrice(self.hermes.clone())),
        ]
    }
}

fn failure(error: impl Into<String>) -> ActionResult {
    ActionResult::json_error(json!({ "success": false, "error": error.into() }))
}

#[derive(Debug, Deserialize)]
struct PriceFeedAttributes {
    #[serde(default)]
    base: String,
    #[serde(default)]
    quote_currency: String,
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    display_symbol: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PriceFeed {
    id: String,
    attributes: PriceFeedAttributes,
}

/// Pick the feed for `symbol`/`quote`; equities prefer regular market hours
fn select_feed<'a>(feeds: &'a [PriceFeed], symbol: &str, quote: &str, asset_type: &str) -> Option<&'a PriceFeed> {
    let matching: Vec<&PriceFeed> = feeds
        .iter()
        .filter(|f| {
            f.attributes.base.eq_ignore_ascii_case(symbol) && f.attributes.quote_currency.eq_ignore_ascii_case(quote)
        })
        .collect();

    if asset_type.eq_ignore_ascii_case("equity") {
        let regular = matching.iter().find(|f| {
            let s = f.attributes.symbol.as_deref().unwrap_or("");
            !OFF_HOURS_SUFFIXES.iter().any(|suffix| s.ends_with(suffix))
        });
        if let Some(feed) = regular {
            return Some(*feed);
        }
    }
    matching.first().copied()
}

#[derive(Debug, Deserialize)]
struct FetchPriceFeedParams {
    token_symbol: String,
    #[serde(default = "default_quote")]
    quote_currency: String,
    #[serde(default = "default_asset_type")]
    asset_type: String,
}

fn default_quote() -> String {
    "USD".to_string()
}

fn default_asset_type() -> String {
    "crypto".to_string()
}

pub struct FetchPriceFeed(Hermes);

#[async_trait]
impl Action for FetchPriceFeed {
    fn definition(&self) -> ActionDefinition {
        ActionDefinition {
            name: "fetch_price_feed".to_string(),
            description: "Fetch the Pyth price feed ID for a token symbol. Use the ID with fetch_price to get the current price."
                .to_string(),
            input_schema: ActionInputSchema::default()
                .required_property("token_symbol", PropertySchema::string("Token or asset symbol, e.g. 'BTC' or 'COIN'"))
                .property(
                    "quote_currency",
                    PropertySchema::string("Quote currency").with_default(json!("USD")),
                )
                .property(
                    "asset_type",
                    PropertySchema::string("Asset class of the feed")
                        .with_default(json!("crypto"))
                        .with_enum(&["crypto", "equity", "fx", "metal", "rates"]),
                ),
        }
    }

    async fn invoke(&self, params: Value, _context: &ActionContext) -> ActionResult {
        let params: FetchPriceFeedParams = match parse_params(params) {
            Ok(p) => p,
            Err(e) => return failure(e.content),
        };
        let query = format!(
            "/v2/price_feeds?query={}&asset_type={}",
            urlencoding::encode(&params.token_symbol),
            urlencoding::encode(&params.asset_type)
        );

        let body = match self.0.get_json(&query).await {
            Ok(b) => b,
            Err(e) => return failure(format!("Error fetching price feed: {}", e)),
        };
        let feeds: Vec<PriceFeed> = match serde_json::from_value(body) {
            Ok(f) => f,
            Err(e) => return failure(format!("Error fetching price feed: unexpected response: {}", e)),
        };

        match select_feed(&feeds, &params.token_symbol, &params.quote_currency, &params.asset_type) {
            Some(feed) => ActionResult::json(json!({
                "success": true,
                "priceFeedID": feed.id,
                "tokenSymbol": params.token_symbol,
                "quoteCurrency": params.quote_currency,
                "feedType": feed.attributes.display_symbol,
            })),
            None => failure(format!("No price feed found for {}", params.token_symbol)),
        }
    }
}

/// Apply a Pyth exponent to an integer price string: ("4212345", -2) -> "42123.45"
pub fn scale_price(price: &str, expo: i32) -> Result<String, String> {
    if expo.unsigned_abs() > MAX_PRICE_EXPONENT {
        return Err(format!("Invalid price exponent: {}", expo));
    }
    let (negative, digits) = match price.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, price),
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(format!("Invalid price value: {}", price));
    }

    let scaled = if expo >= 0 {
        format!("{}{}", digits, "0".repeat(expo as usize))
    } else {
        let places = expo.unsigned_abs() as usize;
        let padded = format!("{:0>width$}", digits, width = places + 1);
        let (whole, fraction) = padded.split_at(padded.len() - places);
        format!("{}.{}", whole, fraction)
    };
    Ok(if negative { format!("-{}", scaled) } else { scaled })
}

#[derive(Debug, Deserialize)]
struct FetchPriceParams {
    price_feed_id: String,
}

#[derive(Debug, Deserialize)]
struct LatestPrice {
    price: String,
    expo: i32,
}

#[derive(Debug, Deserialize)]
struct ParsedUpdate {
    price: LatestPrice,
}

#[derive(Debug, Deserialize)]
struct LatestUpdates {
    parsed: Vec<ParsedUpdate>,
}

pub struct FetchPrice(Hermes);

#[async_trait]
impl Action for FetchPrice {
    fn definition(&self) -> ActionDefinition {
        ActionDefinition {
            name: "fetch_price".to_string(),
            description: "Fetch the latest price for a Pyth price feed ID.".to_string(),
            input_schema: ActionInputSchema::default().required_property(
                "price_feed_id",
                PropertySchema::string("Price feed ID returned by fetch_price_feed"),
            ),
        }
    }

    async fn invoke(&self, params: Value, _context: &ActionContext) -> ActionResult {
        let params: FetchPriceParams = match parse_params(params) {
            Ok(p) => p,
            Err(e) => return failure(e.content),
        };
        let query = format!("/v2/updates/price/latest?ids[]={}", urlencoding::encode(&params.price_feed_id));

        let body = match self.0.get_json(&query).await {
            Ok(b) => b,
            Err(e) => return failure(format!("Error fetching price: {}", e)),
        };
        let update = match serde_json::from_value::<LatestUpdates>(body) {
            Ok(u) => u.parsed.into_iter().next(),
            Err(e) => return failure(format!("Error fetching price: unexpected response: {}", e)),
        };
        let Some(update) = update else {
            return failure(format!("No price data found for {}", params.price_feed_id));
        };

        match scale_price(&update.price.price, update.price.expo) {
            Ok(price) => ActionResult::json(json!({
                "success": true,
                "priceFeedID": params.price_feed_id,
                "price": price,
            })),
            Err(e) => failure(format!("Error fetching price: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::testing::MockWallet;
    use crate::http::testing::MockHttpClient;
    use crate::http::{HttpError, HttpResponse};

    const FEED_ID: &str = "0ff1e87c65eb6e6f7768e66543859b7f3076ba8a3529636f6b2664f367c3344a";

    fn provider(responses: Vec<Result<HttpResponse, HttpError>>) -> (Arc<MockHttpClient>, PythActionProvider) {
        let http = Arc::new(MockHttpClient::new(responses));
        (http.clone(), PythActionProvider::new(http, "https://hermes.pyth.network"))
    }

    fn ctx() -> ActionContext {
        ActionContext::new(Arc::new(MockWallet::base_sepolia()))
    }

    fn body(result: &ActionResult) -> Value {
        serde_json::from_str(&result.content).unwrap()
    }

    #[test]
    fn test_scale_price() {
        assert_eq!(scale_price("4212345", -2).unwrap(), "42123.45");
        assert_eq!(scale_price("5", -3).unwrap(), "0.005");
        assert_eq!(scale_price("12", 2).unwrap(), "1200");
        assert_eq!(scale_price("-150", -2).unwrap(), "-1.50");
        assert!(scale_price("abc", -2).is_err());
    }

    #[test]
    fn test_scale_price_rejects_huge_exponent() {
        assert_eq!(scale_price("1", -64).unwrap().len(), 66);
        assert_eq!(scale_price("1", 64).unwrap().len(), 65);
        assert_eq!(scale_price("1", 65).unwrap_err(), "Invalid price exponent: 65");
        assert_eq!(
            scale_price("1", i32::MIN).unwrap_err(),
            format!("Invalid price exponent: {}", i32::MIN)
        );
        assert!(scale_price("1", -1_000_000_000).is_err());
    }

    #[tokio::test]
    async fn test_fetch_price_feed_success() {
        let feeds = json!([{
            "id": FEED_ID,
            "type": "price_feed",
            "attributes": {"base": "BTC", "quote_currency": "USD", "asset_type": "crypto", "display_symbol": "BTC/USD"}
        }]);
        let (http, provider) = provider(vec![Ok(HttpResponse::json(200, &feeds))]);
        let action = FetchPriceFeed(provider.hermes.clone());

        let result = action
            .invoke(json!({"token_symbol": "BTC", "quote_currency": "USD", "asset_type": "crypto"}), &ctx())
            .await;
        let parsed = body(&result);
        assert_eq!(parsed["success"], true);
        assert_eq!(parsed["priceFeedID"], FEED_ID);
        assert_eq!(parsed["tokenSymbol"], "BTC");
        assert_eq!(parsed["quoteCurrency"], "USD");
        assert_eq!(parsed["feedType"], "BTC/USD");
        assert_eq!(
            http.recorded()[0].url,
            "https://hermes.pyth.network/v2/price_feeds?query=BTC&asset_type=crypto"
        );
    }

    #[tokio::test]
    async fn test_fetch_price_feed_errors() {
        let (_, provider) = provider(vec![Ok(HttpResponse::json(200, &json!([]))), Ok(HttpResponse::new(404, ""))]);
        let action = FetchPriceFeed(provider.hermes.clone());

        let empty = action.invoke(json!({"token_symbol": "TEST"}), &ctx()).await;
        assert!(!empty.success);
        assert!(body(&empty)["error"].as_str().unwrap().contains("No price feed found for TEST"));

        let http_error = action.invoke(json!({"token_symbol": "BTC"}), &ctx()).await;
        assert_eq!(body(&http_error)["success"], false);
        assert!(body(&http_error)["error"].as_str().unwrap().contains("HTTP error! status: 404"));
    }

    #[tokio::test]
    async fn test_fetch_price_feed_prefers_regular_equity_session() {
        let feeds = json!([
            {"id": "post-market-feed-id", "attributes": {"base": "COIN", "quote_currency": "USD", "symbol": "Equity.US.COIN/USD.POST", "display_symbol": "COIN/USD POST MARKET"}},
            {"id": "regular-market-feed-id", "attributes": {"base": "COIN", "quote_currency": "USD", "symbol": "Equity.US.COIN/USD", "display_symbol": "COIN/USD"}},
            {"id": "pre-market-feed-id", "attributes": {"base": "COIN", "quote_currency": "USD", "symbol": "Equity.US.COIN/USD.PRE", "display_symbol": "COIN/USD PRE MARKET"}}
        ]);
        let (_, provider) = provider(vec![Ok(HttpResponse::json(200, &feeds))]);
        let action = FetchPriceFeed(provider.hermes.clone());

        let result = action
            .invoke(json!({"token_symbol": "COIN", "asset_type": "equity"}), &ctx())
            .await;
        let parsed = body(&result);
        assert_eq!(parsed["priceFeedID"], "regular-market-feed-id");
        assert_eq!(parsed["feedType"], "COIN/USD");
    }

    #[tokio::test]
    async fn test_fetch_price() {
        let update = json!({"parsed": [{"price": {"price": "4212345", "expo": -2, "conf": "1234"}, "id": "test_feed_id"}]});
        let (http, provider) = provider(vec![Ok(HttpResponse::json(200, &update)), Ok(HttpResponse::new(404, ""))]);
        let action = FetchPrice(provider.hermes.clone());

        let result = action.invoke(json!({"price_feed_id": FEED_ID}), &ctx()).await;
        let parsed = body(&result);
        assert_eq!(parsed["success"], true);
        assert_eq!(parsed["priceFeedID"], FEED_ID);
        assert_eq!(parsed["price"], "42123.45");
        assert!(http.recorded()[0].url.ends_with(&format!("/v2/updates/price/latest?ids[]={}", FEED_ID)));

        let failed = action.invoke(json!({"price_feed_id": FEED_ID}), &ctx()).await;
        assert!(body(&failed)["error"].as_str().unwrap().contains("HTTP error! status: 404"));
    }
}
