//! Ledger access over Solana JSON-RPC

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use super::error::{PaymentError, PaymentResult};
use super::types::{Commitment, Pubkey, RecentBlockhash, SignedTransaction};

const CONFIRMATION_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[async_trait]
pub trait Ledger: Send + Sync {
    /// Token account holding `mint` for `owner`
    async fn token_account(&self, owner: &Pubkey, mint: &Pubkey) -> PaymentResult<Pubkey>;

    async fn latest_blockhash(&self, commitment: Commitment) -> PaymentResult<RecentBlockhash>;

    /// Submit with preflight simulation at `confirmed`; returns the signature
    async fn send_transaction(&self, tx: &SignedTransaction) -> PaymentResult<String>;

    /// Wait until `signature` reaches `commitment` or its blockhash expires
    async fn confirm_transaction(
        &self,
        signature: &str,
        blockhash: &RecentBlockhash,
        commitment: Commitment,
    ) -> PaymentResult<()>;
}

#[derive(Deserialize)]
struct RpcEnvelope<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Deserialize)]
struct KeyedAccount {
    pubkey: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignatureStatus {
    #[serde(default)]
    err: Option<Value>,
    #[serde(default)]
    confirmation_status: Option<Commitment>,
}

/// JSON-RPC client against a Solana node
pub struct RpcLedger {
    client: Client,
    url: String,
    poll_interval: Duration,
}

impl RpcLedger {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            poll_interval: CONFIRMATION_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> PaymentResult<T> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self.client.post(&self.url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(PaymentError::Rpc(format!("{} returned {}: {}", method, status, text)));
        }

        let envelope: RpcEnvelope<T> = response.json().await?;
        if let Some(err) = envelope.error {
            return Err(PaymentError::Rpc(format!("{} failed ({}): {}", method, err.code, err.message)));
        }
        envelope
            .result
            .ok_or_else(|| PaymentError::Rpc(format!("{} returned no result", method)))
    }

    async fn block_height(&self, commitment: Commitment) -> PaymentResult<u64> {
        self.call("getBlockHeight", json!([{ "commitment": commitment }])).await
    }
}

#[async_trait]
impl Ledger for RpcLedger {
    async fn token_account(&self, owner: &Pubkey, mint: &Pubkey) -> PaymentResult<Pubkey> {
        let accounts: WithContext<Vec<KeyedAccount>> = self
            .call(
                "getTokenAccountsByOwner",
                json!([
                    owner.to_string(),
                    { "mint": mint.to_string() },
                    { "encoding": "jsonParsed" }
                ]),
            )
            .await?;

        let first = accounts
            .value
            .into_iter()
            .next()
            .ok_or_else(|| PaymentError::TokenAccountNotFound {
                owner: owner.to_string(),
                mint: mint.to_string(),
            })?;
        first.pubkey.parse()
    }

    async fn latest_blockhash(&self, commitment: Commitment) -> PaymentResult<RecentBlockhash> {
        let resp: WithContext<RecentBlockhash> = self
            .call("getLatestBlockhash", json!([{ "commitment": commitment }]))
            .await?;
        Ok(resp.value)
    }

    async fn send_transaction(&self, tx: &SignedTransaction) -> PaymentResult<String> {
        self.call(
            "sendTransaction",
            json!([
                tx.to_base64(),
                {
                    "encoding": "base64",
                    "skipPreflight": false,
                    "preflightCommitment": Commitment::Confirmed,
                }
            ]),
        )
        .await
        .map_err(|e| PaymentError::SubmissionFailed(e.to_string()))
    }

    async fn confirm_transaction(
        &self,
        signature: &str,
        blockhash: &RecentBlockhash,
        commitment: Commitment,
    ) -> PaymentResult<()> {
        loop {
            let statuses: WithContext<Vec<Option<SignatureStatus>>> = self
                .call("getSignatureStatuses", json!([[signature]]))
                .await?;

            if let Some(Some(status)) = statuses.value.into_iter().next() {
                if let Some(err) = status.err {
                    return Err(PaymentError::ConfirmationFailed {
                        signature: signature.to_string(),
                        reason: err.to_string(),
                    });
                }
                if status
                    .confirmation_status
                    .is_some_and(|reported| commitment.is_satisfied_by(reported))
                {
                    tracing::debug!("Transaction {} reached {}", signature, commitment);
                    return Ok(());
                }
            }

            if self.block_height(commitment).await? > blockhash.last_valid_block_height {
                return Err(PaymentError::ConfirmationExpired(signature.to_string()));
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
