//! HTTP client that can pay for 402 responses

use std::sync::Arc;

use super::signer::sign_exact_payment;
use super::types::*;
use crate::http::{HttpClient, HttpRequest, HttpResponse};
use crate::wallet::EvmWalletProvider;

pub const PAYMENT_REQUIRED_STATUS: u16 = 402;

/// Response of a request that may have been paid for
#[derive(Debug, Clone)]
pub struct PaidResponse {
    pub response: HttpResponse,
    /// Requirement that was paid, if any
    pub paid: Option<PaymentRequirements>,
    /// Settlement result from X-PAYMENT-RESPONSE
    pub proof: Option<SettleResponse>,
}

/// Parse the requirements a 402 body offers
pub fn parse_payment_required(response: &HttpResponse) -> Result<PaymentRequiredResponse, X402Error> {
    serde_json::from_str(&response.body).map_err(|e| X402Error::Decoding {
        what: "402 response body",
        reason: e.to_string(),
    })
}

/// First `exact` option on `network_id`
pub fn select_requirements<'a>(
    accepts: &'a [PaymentRequirements],
    network_id: &str,
) -> Result<&'a PaymentRequirements, X402Error> {
    accepts
        .iter()
        .find(|r| r.scheme == EXACT_SCHEME && r.network == network_id)
        .ok_or_else(|| {
            let offered: Vec<String> = accepts.iter().map(|r| format!("{}/{}", r.scheme, r.network)).collect();
            X402Error::NoAcceptableOption(format!(
                "wallet is on {}, server accepts [{}]",
                network_id,
                offered.join(", ")
            ))
        })
}

/// Settlement proof from a paid response. Malformed headers are logged and dropped.
pub fn payment_proof(response: &HttpResponse) -> Option<SettleResponse> {
    let header = response.header(X_PAYMENT_RESPONSE_HEADER)?;
    match SettleResponse::from_header(header) {
        Ok(proof) => Some(proof),
        Err(e) => {
            log::warn!("[x402] Ignoring payment response header: {}", e);
            None
        }
    }
}

#[derive(Clone)]
pub struct X402Client {
    http: Arc<dyn HttpClient>,
}

impl X402Client {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        X402Client { http }
    }

    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse, X402Error> {
        log::debug!("[x402] {} {}", request.method, request.url);
        Ok(self.http.send(request).await?)
    }

    /// Sign `requirements` and send `request` with the X-PAYMENT header
    pub async fn send_with_payment(
        &self,
        wallet: &dyn EvmWalletProvider,
        request: HttpRequest,
        requirements: &PaymentRequirements,
    ) -> Result<PaidResponse, X402Error> {
        let payment = sign_exact_payment(wallet, requirements).await?;
        let request = request.header(X_PAYMENT_HEADER, payment.to_header()?);
        let response = self.send(request).await?;
        log::info!("[x402] Paid request returned status {}", response.status);

        Ok(PaidResponse {
            proof: payment_proof(&response),
            paid: Some(requirements.clone()),
            response,
        })
    }

    /// Send `request`; on 402 pay the matching option and retry once
    pub async fn send_paying_if_required(
        &self,
        wallet: &dyn EvmWalletProvider,
        request: HttpRequest,
    ) -> Result<PaidResponse, X402Error> {
        let first = self.send(request.clone()).await?;
        if first.status != PAYMENT_REQUIRED_STATUS {
            return Ok(PaidResponse {
                response: first,
                paid: None,
                proof: None,
            });
        }

        let required = parse_payment_required(&first)?;
        let network = wallet.get_network();
        let requirements = select_requirements(&required.accepts, network.network_id_str())?;
        log::info!(
            "[x402] {} requires {} of {} to {}",
            request.url,
            requirements.max_amount_required,
            requirements.asset,
            requirements.pay_to
        );
        self.send_with_payment(wallet, request, requirements).await
    }
}
