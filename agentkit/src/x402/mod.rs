//! x402 pay-per-request protocol
//!
//! A resource server answers 402 with the payment options it accepts. The
//! client signs an EIP-3009 `TransferWithAuthorization` for one of them and
//! retries with the signed payload in `X-PAYMENT`. The server settles it and
//! reports the result in `X-PAYMENT-RESPONSE`.

mod client;
mod signer;
mod types;

pub use client::{parse_payment_required, payment_proof, select_requirements, PaidResponse, X402Client, PAYMENT_REQUIRED_STATUS};
pub use signer::{domain_for, random_nonce, sign_exact_payment, sign_exact_payment_at, Eip712Domain, TransferWithAuthorization};
pub use types::*;

#[cfg(test)]
pub(crate) use types::testing;
