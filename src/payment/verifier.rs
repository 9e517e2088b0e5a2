//! Payment verification: the external facilitator and a replay guard around it

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::error::{PaymentError, PaymentResult};
use super::types::{PaymentChallenge, PaymentProof};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalid_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
}

impl VerifyResponse {
    pub fn valid(payer: impl Into<String>) -> Self {
        Self {
            is_valid: true,
            invalid_reason: None,
            payer: Some(payer.into()),
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            invalid_reason: Some(reason.into()),
            payer: None,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyRequest<'a> {
    payment_payload: &'a PaymentProof,
    payment_requirements: &'a PaymentChallenge,
}

/// Decides whether a proof really settles a challenge
#[async_trait]
pub trait PaymentVerifier: Send + Sync {
    async fn verify(
        &self,
        proof: &PaymentProof,
        challenge: &PaymentChallenge,
    ) -> PaymentResult<VerifyResponse>;
}

#[async_trait]
impl<T: PaymentVerifier + ?Sized> PaymentVerifier for Arc<T> {
    async fn verify(
        &self,
        proof: &PaymentProof,
        challenge: &PaymentChallenge,
    ) -> PaymentResult<VerifyResponse> {
        self.as_ref().verify(proof, challenge).await
    }
}

// ============================================================================
// FacilitatorClient
// ============================================================================

/// HTTP client for a remote facilitator exposing `POST /verify`
#[derive(Clone, Debug)]
pub struct FacilitatorClient {
    client: Client,
    verify_url: String,
}

impl FacilitatorClient {
    pub fn new(base_url: &str) -> Self {
        let base = base_url.trim().trim_end_matches('/');
        Self {
            client: Client::new(),
            verify_url: format!("{}/verify", base),
        }
    }

    pub fn verify_url(&self) -> &str {
        &self.verify_url
    }
}

impl TryFrom<&str> for FacilitatorClient {
    type Error = PaymentError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let trimmed = value.trim();
        if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
            return Err(PaymentError::Verifier(format!(
                "facilitator URL must be http(s): {}",
                value
            )));
        }
        Ok(Self::new(trimmed))
    }
}

#[async_trait]
impl PaymentVerifier for FacilitatorClient {
    async fn verify(
        &self,
        proof: &PaymentProof,
        challenge: &PaymentChallenge,
    ) -> PaymentResult<VerifyResponse> {
        let body = VerifyRequest {
            payment_payload: proof,
            payment_requirements: challenge,
        };

        let response = self
            .client
            .post(&self.verify_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| PaymentError::Verifier(format!("POST /verify failed: {}", e)))?;

        let status = response.status();
        if status == StatusCode::OK {
            return response
                .json::<VerifyResponse>()
                .await
                .map_err(|e| PaymentError::Verifier(format!("bad /verify response: {}", e)));
        }

        let text = response.text().await.unwrap_or_default();
        // Facilitators answer a rejected proof with a 4xx carrying the same body
        if status.is_client_error() {
            if let Ok(parsed) = serde_json::from_str::<VerifyResponse>(&text) {
                return Ok(parsed);
            }
        }
        Err(PaymentError::Verifier(format!(
            "/verify returned {}: {}",
            status, text
        )))
    }
}

// ============================================================================
// ReplayGuard
// ============================================================================

/// Rejects any transaction signature that has already unlocked a request.
///
/// A signature is reserved before the inner verifier runs and released again
/// if verification fails, so two concurrent presentations of one proof can
/// never both pass.
pub struct ReplayGuard<V> {
    inner: V,
    seen: Mutex<HashSet<String>>,
}

impl<V: PaymentVerifier> ReplayGuard<V> {
    pub fn new(inner: V) -> Self {
        Self {
            inner,
            seen: Mutex::new(HashSet::new()),
        }
    }

    pub async fn is_spent(&self, signature: &str) -> bool {
        self.seen.lock().await.contains(signature)
    }

    async fn release(&self, signature: &str) {
        self.seen.lock().await.remove(signature);
    }
}

#[async_trait]
impl<V: PaymentVerifier> PaymentVerifier for ReplayGuard<V> {
    async fn verify(
        &self,
        proof: &PaymentProof,
        challenge: &PaymentChallenge,
    ) -> PaymentResult<VerifyResponse> {
        let signature = proof.payload.signature.clone();

        if !self.seen.lock().await.insert(signature.clone()) {
            tracing::warn!(signature = %signature, "Rejected replayed payment proof");
            return Ok(VerifyResponse::invalid("payment proof already used"));
        }

        match self.inner.verify(proof, challenge).await {
            Ok(resp) if resp.is_valid => Ok(resp),
            Ok(resp) => {
                self.release(&signature).await;
                Ok(resp)
            }
            Err(e) => {
                self.release(&signature).await;
                Err(e)
            }
        }
    }
}
