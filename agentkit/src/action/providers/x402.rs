//! HTTP requests to x402-protected resources

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use strum::{AsRefStr, Display};

use crate::action::{
    parse_params, Action, ActionContext, ActionDefinition, ActionInputSchema, ActionProvider,
    ActionResult, PropertySchema,
};
use crate::http::{HttpClient, HttpRequest};
use crate::network::{Network, BASE_MAINNET, BASE_SEPOLIA};
use crate::x402::{parse_payment_required, PaymentRequirements, SettleResponse, X402Client, PAYMENT_REQUIRED_STATUS};

const SUPPORTED_NETWORKS: &[&str] = &[BASE_MAINNET, BASE_SEPOLIA];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

pub struct X402ActionProvider {
    client: X402Client,
}

impl X402ActionProvider {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        X402ActionProvider {
            client: X402Client::new(http),
        }
    }
}

impl ActionProvider for X402ActionProvider {
    fn name(&self) -> &str {
        "x402"
    }

    fn supports_network(&self, network: &Network) -> bool {
        network.is_evm_network_in(SUPPORTED_NETWORKS)
    }

    fn actions(&self) -> Vec<Arc<dyn Action>> {
        vec![
            Arc::new(MakeHttpRequest(self.client.clone())),
            Arc::new(RetryHttpRequestWithX402(self.client.clone())),
            Arc::new(MakeHttpRequestWithX402(self.client.clone())),
        ]
    }
}

fn method_property() -> PropertySchema {
    PropertySchema::string("HTTP method")
        .with_default(json!("GET"))
        .with_enum(&["GET", "POST", "PUT", "DELETE", "PATCH"])
}

fn request_schema() -> ActionInputSchema {
    ActionInputSchema::default()
        .required_property("url", PropertySchema::string("The URL of the API endpoint"))
        .property("method", method_property())
        .property("headers", PropertySchema::new("object", "Optional request headers"))
        .property("body", PropertySchema::new("object", "Optional JSON request body"))
}

/// Only absolute http(s) URLs are requested
fn build_request(
    url: &str,
    method: HttpMethod,
    headers: &Option<HashMap<String, String>>,
    body: &Option<Value>,
) -> Result<HttpRequest, ActionResult> {
    match url::Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
        Ok(parsed) => {
            return Err(request_failed(
                "Unsupported URL scheme",
                format!("scheme '{}' in {}", parsed.scheme(), url),
                "Use an http:// or https:// URL",
            ))
        }
        Err(e) => {
            return Err(request_failed(
                "Invalid URL",
                format!("{}: {}", url, e),
                "Provide an absolute URL such as https://api.example.com/data",
            ))
        }
    }

    let mut request = HttpRequest::new(method.as_ref(), url).body(body.clone());
    if let Some(headers) = headers {
        request = request.headers(headers);
    }
    Ok(request)
}

fn proof_json(proof: Option<SettleResponse>) -> Value {
    proof
        .and_then(|p| serde_json::to_value(p).ok())
        .unwrap_or(Value::Null)
}

fn request_failed(message: &str, details: impl std::fmt::Display, suggestion: &str) -> ActionResult {
    ActionResult::json_error(json!({
        "error": true,
        "message": message,
        "details": details.to_string(),
        "suggestion": suggestion,
    }))
}

#[derive(Debug, Deserialize)]
struct HttpRequestParams {
    url: String,
    #[serde(default)]
    method: HttpMethod,
    #[serde(default)]
    headers: Option<HashMap<String, String>>,
    #[serde(default)]
    body: Option<Value>,
}

pub struct MakeHttpRequest(X402Client);

#[async_trait]
impl Action for MakeHttpRequest {
    fn definition(&self) -> ActionDefinition {
        ActionDefinition {
            name: "make_http_request".to_string(),
            description: "Make a basic HTTP request to an API endpoint. If the endpoint requires an x402 payment (status 402), the payment options are returned so the user can confirm before paying with retry_http_request_with_x402."
                .to_string(),
            input_schema: request_schema(),
        }
    }

    async fn invoke(&self, params: Value, _context: &ActionContext) -> ActionResult {
        let params: HttpRequestParams = match parse_params(params) {
            Ok(p) => p,
            Err(e) => return e,
        };
        let request = match build_request(&params.url, params.method, &params.headers, &params.body) {
            Ok(r) => r,
            Err(e) => return e,
        };

        let response = match self.0.send(request).await {
            Ok(r) => r,
            Err(e) => {
                return request_failed(
                    "Network error while making the request",
                    e,
                    "Check that the URL is correct and the server is reachable",
                )
            }
        };

        if response.status != PAYMENT_REQUIRED_STATUS {
            return ActionResult::json(json!({
                "success": true,
                "url": params.url,
                "method": params.method.to_string(),
                "status": response.status,
                "data": response.data(),
            }));
        }

        let accepts = match parse_payment_required(&response) {
            Ok(required) => required.accepts,
            Err(e) => {
                return request_failed(
                    "Endpoint returned 402 without readable payment requirements",
                    e,
                    "The endpoint may not implement the x402 protocol",
                )
            }
        };
        log::info!("[x402] {} requires payment ({} options)", params.url, accepts.len());

        ActionResult::json(json!({
            "status": "error_402_payment_required",
            "acceptablePaymentOptions": accepts,
            "nextSteps": [
                "Inform the user that the requested server replied with a 402 Payment Required response.",
                "Show the payment options: amount (maxAmountRequired), asset, payTo address and network.",
                "Ask the user whether they want to pay for the request.",
                "If they agree, call retry_http_request_with_x402 with the selected payment option.",
            ],
        }))
    }
}

#[derive(Debug, Deserialize)]
struct RetryWithX402Params {
    url: String,
    #[serde(default)]
    method: HttpMethod,
    #[serde(default)]
    headers: Option<HashMap<String, String>>,
    #[serde(default)]
    body: Option<Value>,
    scheme: String,
    network: String,
    max_amount_required: String,
    resource: String,
    pay_to: String,
    max_timeout_seconds: u64,
    asset: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    extra: Option<Value>,
}

impl RetryWithX402Params {
    fn requirements(&self) -> PaymentRequirements {
        PaymentRequirements {
            scheme: self.scheme.clone(),
            network: self.network.clone(),
            max_amount_required: self.max_amount_required.clone(),
            resource: self.resource.clone(),
            description: self.description.clone().unwrap_or_default(),
            mime_type: self.mime_type.clone().unwrap_or_default(),
            pay_to: self.pay_to.clone(),
            max_timeout_seconds: self.max_timeout_seconds,
            asset: self.asset.clone(),
            output_schema: None,
            extra: self.extra.clone(),
        }
    }
}

pub struct RetryHttpRequestWithX402(X402Client);

#[async_trait]
impl Action for RetryHttpRequestWithX402 {
    fn definition(&self) -> ActionDefinition {
        let mut schema = request_schema();
        for (name, description) in [
            ("scheme", "Payment scheme from the 402 response, e.g. 'exact'"),
            ("network", "Network of the payment option, e.g. 'base-sepolia'"),
            ("max_amount_required", "Maximum amount in atomic units of the asset"),
            ("resource", "Resource URL from the payment option"),
            ("pay_to", "Address receiving the payment"),
            ("asset", "Token contract address of the payment"),
        ] {
            schema = schema.required_property(name, PropertySchema::string(description));
        }
        schema = schema
            .required_property(
                "max_timeout_seconds",
                PropertySchema::new("integer", "Validity window of the payment in seconds"),
            )
            .property("description", PropertySchema::string("Description of the resource"))
            .property("mime_type", PropertySchema::string("MIME type of the resource"))
            .property("extra", PropertySchema::new("object", "Token metadata such as EIP-712 name and version"));

        ActionDefinition {
            name: "retry_http_request_with_x402".to_string(),
            description: "Retry an HTTP request that returned 402, paying with the selected x402 payment option. Only use after the user confirmed the payment."
                .to_string(),
            input_schema: schema,
        }
    }

    async fn invoke(&self, params: Value, context: &ActionContext) -> ActionResult {
        let params: RetryWithX402Params = match parse_params(params) {
            Ok(p) => p,
            Err(e) => return e,
        };
        let evm = match context.evm() {
            Ok(w) => w,
            Err(e) => return e,
        };

        let network = evm.get_network();
        if params.network != network.network_id_str() {
            return request_failed(
                "Payment network does not match the wallet network",
                format!("payment option is on {}, wallet is on {}", params.network, network.network_id_str()),
                "Select a payment option on the wallet's network",
            );
        }

        let requirements = params.requirements();
        let request = match build_request(&params.url, params.method, &params.headers, &params.body) {
            Ok(r) => r,
            Err(e) => return e,
        };
        let paid = match self.0.send_with_payment(evm, request, &requirements).await {
            Ok(p) => p,
            Err(e) => {
                return request_failed(
                    "Failed to retry request with payment",
                    e,
                    "Check the payment details and the wallet balance of the asset",
                )
            }
        };

        ActionResult::json(json!({
            "success": true,
            "message": "Request completed successfully with payment",
            "details": {
                "url": params.url,
                "method": params.method.to_string(),
                "paymentUsed": {
                    "network": requirements.network,
                    "asset": requirements.asset,
                    "amount": requirements.max_amount_required,
                },
                "paymentProof": proof_json(paid.proof),
            },
            "data": paid.response.data(),
        }))
    }
}

pub struct MakeHttpRequestWithX402(X402Client);

#[async_trait]
impl Action for MakeHttpRequestWithX402 {
    fn definition(&self) -> ActionDefinition {
        ActionDefinition {
            name: "make_http_request_with_x402".to_string(),
            description: "Make an HTTP request and pay automatically if the endpoint answers 402. Only use when the user explicitly asked to pay without confirmation."
                .to_string(),
            input_schema: request_schema(),
        }
    }

    async fn invoke(&self, params: Value, context: &ActionContext) -> ActionResult {
        let params: HttpRequestParams = match parse_params(params) {
            Ok(p) => p,
            Err(e) => return e,
        };
        let evm = match context.evm() {
            Ok(w) => w,
            Err(e) => return e,
        };
        let request = match build_request(&params.url, params.method, &params.headers, &params.body) {
            Ok(r) => r,
            Err(e) => return e,
        };

        match self.0.send_paying_if_required(evm, request).await {
            Ok(paid) => ActionResult::json(json!({
                "success": true,
                "message": "Request completed successfully (payment handled automatically if required)",
                "url": params.url,
                "method": params.method.to_string(),
                "status": paid.response.status,
                "data": paid.response.data(),
                "paymentProof": proof_json(paid.proof),
            })),
            Err(e) => request_failed(
                "Error making request with automatic payment",
                e,
                "Check the URL and that the wallet holds the requested asset",
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::testing::MockWallet;
    use crate::http::testing::MockHttpClient;
    use crate::http::{HttpError, HttpResponse};
    use crate::network::ProtocolFamily;
    use crate::x402::testing::sample_requirements;
    use crate::x402::{PaymentPayload, X_PAYMENT_HEADER};
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;

    const URL: &str = "https://api.example.com/data";

    fn setup(responses: Vec<Result<HttpResponse, HttpError>>) -> (Arc<MockHttpClient>, X402Client, ActionContext) {
        let http = Arc::new(MockHttpClient::new(responses));
        let client = X402Client::new(http.clone());
        (http, client, ActionContext::new(Arc::new(MockWallet::base_sepolia())))
    }

    fn body(result: &ActionResult) -> Value {
        serde_json::from_str(&result.content).unwrap()
    }

    fn payment_required() -> HttpResponse {
        HttpResponse::json(402, &json!({"x402Version": 1, "accepts": [sample_requirements()]}))
    }

    fn paid_response() -> HttpResponse {
        let proof = STANDARD.encode(
            json!({"success": true, "transaction": "0xabcdef1234567890", "network": "base-sepolia", "payer": "0x1234"})
                .to_string(),
        );
        HttpResponse::json(200, &json!({"data": "paid_success"})).with_header("x-payment-response", proof)
    }

    fn retry_args() -> Value {
        json!({
            "url": URL,
            "method": "GET",
            "scheme": "exact",
            "network": "base-sepolia",
            "max_amount_required": "1000",
            "resource": URL,
            "pay_to": "0x9876543210987654321098765432109876543210",
            "max_timeout_seconds": 300,
            "asset": "0x036CbD53842c5426634e7929541eC2318f3dCF7e",
        })
    }

    #[tokio::test]
    async fn test_make_http_request_success() {
        let (http, client, ctx) = setup(vec![Ok(HttpResponse::json(200, &json!({"data": "success"})))]);
        let result = MakeHttpRequest(client)
            .invoke(json!({"url": URL, "method": "GET"}), &ctx)
            .await;

        let parsed = body(&result);
        assert_eq!(parsed["success"], true);
        assert_eq!(parsed["url"], URL);
        assert_eq!(parsed["method"], "GET");
        assert_eq!(parsed["status"], 200);
        assert_eq!(parsed["data"], json!({"data": "success"}));
        assert_eq!(http.recorded()[0].method, "GET");
    }

    #[tokio::test]
    async fn test_make_http_request_402() {
        let (_, client, ctx) = setup(vec![Ok(payment_required())]);
        let result = MakeHttpRequest(client)
            .invoke(json!({"url": URL, "method": "POST", "body": {"q": 1}}), &ctx)
            .await;

        let parsed = body(&result);
        assert_eq!(parsed["status"], "error_402_payment_required");
        let options = parsed["acceptablePaymentOptions"].as_array().unwrap();
        assert_eq!(options.len(), 1);
        assert_eq!(options[0]["network"], "base-sepolia");
        assert_eq!(parsed["nextSteps"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_make_http_request_error() {
        let (_, client, ctx) = setup(vec![Err(HttpError::Transport("Network error".to_string()))]);
        let result = MakeHttpRequest(client).invoke(json!({"url": URL}), &ctx).await;

        let parsed = body(&result);
        assert_eq!(parsed["error"], true);
        assert!(parsed.get("message").is_some());
        assert!(parsed["details"].as_str().unwrap().contains("Network error"));
        assert!(parsed.get("suggestion").is_some());
    }

    #[tokio::test]
    async fn test_request_params_validation() {
        let (_, client, ctx) = setup(vec![]);
        let action = MakeHttpRequest(client);

        let missing = action.invoke(json!({}), &ctx).await;
        assert!(missing.content.starts_with("Invalid parameters:"));

        let bad_method = action.invoke(json!({"url": URL, "method": "INVALID"}), &ctx).await;
        assert!(bad_method.content.starts_with("Invalid parameters:"));

        let relative = action.invoke(json!({"url": "/data"}), &ctx).await;
        assert_eq!(body(&relative)["message"], "Invalid URL");
        let ftp = action.invoke(json!({"url": "ftp://example.com/file"}), &ctx).await;
        assert_eq!(body(&ftp)["message"], "Unsupported URL scheme");

        let (_, client, _) = setup(vec![]);
        let incomplete = RetryHttpRequestWithX402(client).invoke(json!({"url": URL}), &ctx).await;
        assert!(incomplete.content.starts_with("Invalid parameters:"));
    }

    #[tokio::test]
    async fn test_retry_with_x402_success() {
        let (http, client, ctx) = setup(vec![Ok(paid_response())]);
        let result = RetryHttpRequestWithX402(client).invoke(retry_args(), &ctx).await;

        let parsed = body(&result);
        assert_eq!(parsed["success"], true);
        assert_eq!(parsed["message"], "Request completed successfully with payment");
        assert_eq!(parsed["details"]["paymentProof"]["transaction"], "0xabcdef1234567890");
        assert_eq!(parsed["details"]["paymentUsed"]["amount"], "1000");
        assert_eq!(parsed["data"], json!({"data": "paid_success"}));

        let header = http.recorded()[0].header_value(X_PAYMENT_HEADER).unwrap().to_string();
        let payment = PaymentPayload::from_header(&header).unwrap();
        assert_eq!(payment.network, "base-sepolia");
        assert_eq!(payment.payload.authorization.to, "0x9876543210987654321098765432109876543210");
    }

    #[tokio::test]
    async fn test_retry_with_x402_without_proof_and_wrong_network() {
        let (_, client, ctx) = setup(vec![Ok(HttpResponse::json(200, &json!({"data": "success"})))]);
        let action = RetryHttpRequestWithX402(client);

        let result = action.invoke(retry_args(), &ctx).await;
        let parsed = body(&result);
        assert_eq!(parsed["success"], true);
        assert!(parsed["details"]["paymentProof"].is_null());

        let mut args = retry_args();
        args["network"] = json!("base-mainnet");
        let mismatch = action.invoke(args, &ctx).await;
        assert!(!mismatch.success);
        assert_eq!(body(&mismatch)["error"], true);
    }

    #[tokio::test]
    async fn test_make_http_request_with_x402() {
        let (http, client, ctx) = setup(vec![Ok(payment_required()), Ok(paid_response())]);
        let result = MakeHttpRequestWithX402(client)
            .invoke(json!({"url": URL, "method": "GET"}), &ctx)
            .await;

        let parsed = body(&result);
        assert_eq!(parsed["success"], true);
        assert_eq!(
            parsed["message"],
            "Request completed successfully (payment handled automatically if required)"
        );
        assert_eq!(parsed["paymentProof"]["transaction"], "0xabcdef1234567890");
        assert_eq!(parsed["status"], 200);
        assert_eq!(http.recorded().len(), 2);
    }

    #[test]
    fn test_supports_network() {
        let provider = X402ActionProvider::new(Arc::new(MockHttpClient::default()));
        let cases = [
            (Network::new(ProtocolFamily::Evm, Some("base-mainnet"), Some(1)), true),
            (Network::new(ProtocolFamily::Evm, Some("base-sepolia"), Some(1)), true),
            (Network::new(ProtocolFamily::Evm, Some("ethereum"), Some(1)), false),
            (Network::new(ProtocolFamily::Solana, Some("base-mainnet"), Some(1)), false),
        ];
        for (network, expected) in cases {
            assert_eq!(provider.supports_network(&network), expected, "{}", network);
        }
    }
}
