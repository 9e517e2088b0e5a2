//! axum middleware that turns the price table into 402 challenges

use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;

use super::pricing::PriceTable;
use super::types::{Network, PaymentChallenge, PaymentProof, PaymentRequiredResponse, Pubkey, Scheme, TokenConfig};
use super::verifier::PaymentVerifier;
use crate::models::ErrorResponse;

pub const PAYMENT_HEADER: &str = "x-payment";
pub const PAYMENT_REQUIRED_HEADER: &str = "x-payment-required";

/// Where and in what token a deployment gets paid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentTerms {
    pub recipient: Pubkey,
    pub network: Network,
    pub token: TokenConfig,
}

/// Proof that got a request through the gate, attached as a request extension
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedPayment {
    pub payer: String,
    pub signature: String,
    pub amount: u64,
}

pub struct Paygate {
    pricing: Arc<PriceTable>,
    terms: PaymentTerms,
    verifier: Arc<dyn PaymentVerifier>,
}

impl Paygate {
    pub fn new(pricing: Arc<PriceTable>, terms: PaymentTerms, verifier: Arc<dyn PaymentVerifier>) -> Self {
        Self {
            pricing,
            terms,
            verifier,
        }
    }

    pub fn terms(&self) -> &PaymentTerms {
        &self.terms
    }

    pub fn challenge(&self, path: &str, amount: u64) -> PaymentChallenge {
        PaymentChallenge {
            recipient: self.terms.recipient.to_string(),
            amount,
            network: self.terms.network,
            mint: self.terms.token.mint.to_string(),
            decimals: Some(self.terms.token.decimals),
            scheme: Scheme::TokenTransfer,
            resource: Some(path.to_string()),
        }
    }
}

fn payment_required(challenge: PaymentChallenge, details: Option<String>) -> Response {
    let mut headers = HeaderMap::new();
    if let Ok(value) = serde_json::to_string(&challenge)
        .map_err(|e| e.to_string())
        .and_then(|json| HeaderValue::from_str(&json).map_err(|e| e.to_string()))
    {
        headers.insert(PAYMENT_REQUIRED_HEADER, value);
    }

    let body = PaymentRequiredResponse {
        error: "Payment required".to_string(),
        details,
        payment: challenge,
    };

    (StatusCode::PAYMENT_REQUIRED, headers, Json(body)).into_response()
}

/// Gate priced routes behind a verified `X-Payment` proof.
///
/// Mount with `axum::middleware::from_fn_with_state(paygate, enforce)`.
pub async fn enforce(State(gate): State<Arc<Paygate>>, mut request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let price = match gate.pricing.price_for(&method, &path) {
        Some(price) if price > 0 => price,
        _ => return next.run(request).await,
    };

    let challenge = gate.challenge(&path, price);

    let header = match request.headers().get(PAYMENT_HEADER) {
        Some(value) => value,
        None => {
            tracing::debug!("{} {} requires {} tokens, issuing challenge", method, path, price);
            return payment_required(challenge, None);
        }
    };

    let proof = match header
        .to_str()
        .map_err(|e| e.to_string())
        .and_then(|raw| PaymentProof::from_header(raw).map_err(|e| e.to_string()))
    {
        Ok(proof) => proof,
        Err(e) => {
            tracing::warn!("Malformed X-Payment header on {} {}: {}", method, path, e);
            return payment_required(challenge, Some(format!("Malformed X-Payment header: {}", e)));
        }
    };

    if let Err(mismatch) = proof.check_against(&challenge) {
        tracing::warn!("Payment proof does not match challenge on {}: {}", path, mismatch);
        return payment_required(challenge, Some(mismatch));
    }

    match gate.verifier.verify(&proof, &challenge).await {
        Ok(resp) if resp.is_valid => {
            let payer = resp.payer.unwrap_or_else(|| proof.payload.from.clone());
            tracing::info!(
                payer = %payer,
                signature = %proof.payload.signature,
                amount = price,
                "Payment accepted for {} {}",
                method,
                path
            );
            request.extensions_mut().insert(VerifiedPayment {
                payer,
                signature: proof.payload.signature,
                amount: price,
            });
            next.run(request).await
        }
        Ok(resp) => {
            let reason = resp
                .invalid_reason
                .unwrap_or_else(|| "payment rejected by verifier".to_string());
            tracing::warn!("Payment rejected on {}: {}", path, reason);
            payment_required(challenge, Some(reason))
        }
        Err(e) => {
            tracing::error!("Payment verifier unavailable: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Payment verification failed").with_details(e.to_string())),
            )
                .into_response()
        }
    }
}
