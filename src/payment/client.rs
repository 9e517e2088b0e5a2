//! HTTP client that pays on 402 and retries once with a proof

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

use super::error::{PaymentError, PaymentResult};
use super::ledger::Ledger;
use super::paygate::PAYMENT_HEADER;
use super::types::{
    Commitment, PaymentChallenge, PaymentProof, PaymentRequiredResponse, ProofPayload, Pubkey,
    TokenConfig, TransferTransaction, SPL402_VERSION,
};
use super::wallet::Wallet;

/// A transfer that settled a challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReceipt {
    pub signature: String,
    /// Whole tokens
    pub amount: u64,
}

/// A response body, plus the receipt when a payment was needed to get it
#[derive(Debug, Clone)]
pub struct Paid<R> {
    pub body: R,
    pub receipt: Option<PaymentReceipt>,
}

pub struct PaymentClient {
    http: Client,
    base_url: String,
    wallet: Arc<dyn Wallet>,
    ledger: Arc<dyn Ledger>,
    token: TokenConfig,
}

impl PaymentClient {
    pub fn new(
        base_url: &str,
        wallet: Arc<dyn Wallet>,
        ledger: Arc<dyn Ledger>,
        token: TokenConfig,
    ) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            wallet,
            ledger,
            token,
        }
    }

    pub fn payer(&self) -> Pubkey {
        self.wallet.public_key()
    }

    /// POST a JSON body; on 402 pay the challenge and retry exactly once
    pub async fn post_json<B, R>(&self, path: &str, body: &B) -> PaymentResult<Paid<R>>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let response = self.http.post(&url).json(body).send().await?;
        let status = response.status();

        if status == StatusCode::PAYMENT_REQUIRED {
            let text = response.text().await.unwrap_or_default();
            let challenge = parse_challenge(&text)?;
            tracing::info!(
                "{} requires {} tokens to {}",
                path,
                challenge.amount,
                challenge.recipient
            );

            let (proof, receipt) = self.pay(&challenge).await?;

            let retry = self
                .http
                .post(&url)
                .header(PAYMENT_HEADER, proof.to_header()?)
                .json(body)
                .send()
                .await?;

            let status = retry.status();
            if !status.is_success() {
                let text = retry.text().await.unwrap_or_default();
                tracing::warn!("Paid retry of {} failed with {}", path, status);
                return Err(PaymentError::ProofRejected {
                    status,
                    details: error_details(&text),
                });
            }

            return Ok(Paid {
                body: retry.json().await?,
                receipt: Some(receipt),
            });
        }

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(PaymentError::RequestFailed {
                status,
                details: error_details(&text),
            });
        }

        Ok(Paid {
            body: response.json().await?,
            receipt: None,
        })
    }

    /// Perform the on-chain transfer a challenge asks for and build its proof
    pub async fn pay(&self, challenge: &PaymentChallenge) -> PaymentResult<(PaymentProof, PaymentReceipt)> {
        let recipient: Pubkey = challenge.recipient.parse()?;

        let mint = self.token.mint.to_string();
        if challenge.mint != mint {
            return Err(PaymentError::UnsupportedToken(challenge.mint.clone()));
        }
        if let Some(decimals) = challenge.decimals {
            if decimals != self.token.decimals {
                return Err(PaymentError::InvalidChallenge(format!(
                    "expected {} decimals, server asked for {}",
                    self.token.decimals, decimals
                )));
            }
        }

        let base_units = self.token.to_base_units(challenge.amount)?;
        let payer = self.wallet.public_key();

        let source = self.ledger.token_account(&payer, &self.token.mint).await?;
        let destination = self.ledger.token_account(&recipient, &self.token.mint).await?;
        let blockhash = self.ledger.latest_blockhash(Commitment::Finalized).await?;

        let tx = TransferTransaction::transfer(payer, &blockhash, source, destination, base_units);
        let signed = self.wallet.sign_transaction(&tx).await?;
        let signature = self.ledger.send_transaction(&signed).await?;
        tracing::info!("Submitted payment {} ({} base units)", signature, base_units);

        self.ledger
            .confirm_transaction(&signature, &blockhash, Commitment::Confirmed)
            .await?;

        let proof = PaymentProof {
            version: SPL402_VERSION,
            scheme: challenge.scheme,
            network: challenge.network,
            mint,
            decimals: self.token.decimals,
            payload: ProofPayload {
                from: payer.to_string(),
                to: recipient.to_string(),
                amount: challenge.amount,
                signature: signature.clone(),
                timestamp: chrono::Utc::now().timestamp_millis(),
            },
        };

        Ok((
            proof,
            PaymentReceipt {
                signature,
                amount: challenge.amount,
            },
        ))
    }
}

fn parse_challenge(text: &str) -> PaymentResult<PaymentChallenge> {
    let parsed: PaymentRequiredResponse = serde_json::from_str(text)
        .map_err(|e| PaymentError::InvalidChallenge(format!("Invalid payment info from server: {}", e)))?;
    if parsed.payment.amount == 0 {
        return Err(PaymentError::InvalidChallenge("payment amount is zero".to_string()));
    }
    if parsed.payment.recipient.is_empty() {
        return Err(PaymentError::InvalidChallenge("payment recipient is missing".to_string()));
    }
    Ok(parsed.payment)
}

/// Pull the most useful message out of an `{error, details}` body
fn error_details(text: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(json) => {
            let error = json.get("error").and_then(|v| v.as_str());
            let details = json.get("details").and_then(|v| v.as_str());
            match (error, details) {
                (Some(e), Some(d)) => format!("{}: {}", e, d),
                (Some(e), None) => e.to_string(),
                (None, Some(d)) => d.to_string(),
                (None, None) => text.to_string(),
            }
        }
        Err(_) => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::types::{Network, RecentBlockhash, Scheme, SignedTransaction};
    use async_trait::async_trait;
    use mockito::Matcher;
    use serde_json::json;
    use std::sync::Mutex;

    const MINT: &str = "DXgxW5ESEpvTA194VJZRxwXADRuZKPoeadLoK7o5pump";

    fn recipient() -> Pubkey {
        Pubkey::new_from_array([5; 32])
    }

    fn token() -> TokenConfig {
        TokenConfig {
            mint: MINT.parse().unwrap(),
            decimals: 6,
        }
    }

    struct FakeWallet {
        key: Pubkey,
        reject: bool,
        signed: Mutex<Vec<TransferTransaction>>,
    }

    #[async_trait]
    impl Wallet for FakeWallet {
        fn public_key(&self) -> Pubkey {
            self.key
        }

        async fn sign_transaction(&self, tx: &TransferTransaction) -> PaymentResult<SignedTransaction> {
            if self.reject {
                return Err(PaymentError::SigningRejected("User rejected the request".into()));
            }
            self.signed.lock().unwrap().push(tx.clone());
            Ok(SignedTransaction(vec![7; 8]))
        }
    }

    #[derive(Default)]
    struct FakeLedger {
        calls: Mutex<Vec<String>>,
        fail_confirm: bool,
    }

    impl FakeLedger {
        fn log(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }
    }

    #[async_trait]
    impl Ledger for FakeLedger {
        async fn token_account(&self, owner: &Pubkey, _mint: &Pubkey) -> PaymentResult<Pubkey> {
            self.log(format!("token_account {}", owner));
            let mut bytes = owner.to_bytes();
            bytes[0] ^= 0xff;
            Ok(Pubkey::new_from_array(bytes))
        }

        async fn latest_blockhash(&self, commitment: Commitment) -> PaymentResult<RecentBlockhash> {
            self.log(format!("latest_blockhash {}", commitment));
            Ok(RecentBlockhash {
                blockhash: "recent".into(),
                last_valid_block_height: 99,
            })
        }

        async fn send_transaction(&self, _tx: &SignedTransaction) -> PaymentResult<String> {
            self.log("send_transaction");
            Ok("5ignature".into())
        }

        async fn confirm_transaction(
            &self,
            signature: &str,
            _blockhash: &RecentBlockhash,
            commitment: Commitment,
        ) -> PaymentResult<()> {
            self.log(format!("confirm {} {}", signature, commitment));
            if self.fail_confirm {
                return Err(PaymentError::ConfirmationExpired(signature.to_string()));
            }
            Ok(())
        }
    }

    fn client(url: &str, wallet: Arc<FakeWallet>, ledger: Arc<FakeLedger>) -> PaymentClient {
        PaymentClient::new(url, wallet, ledger, token())
    }

    fn wallet(reject: bool) -> Arc<FakeWallet> {
        Arc::new(FakeWallet {
            key: Pubkey::new_from_array([1; 32]),
            reject,
            signed: Mutex::new(Vec::new()),
        })
    }

    fn challenge_body(amount: u64) -> String {
        json!({
            "error": "Payment required",
            "payment": {
                "recipient": recipient().to_string(),
                "amount": amount,
                "network": "mainnet-beta",
                "mint": MINT,
                "decimals": 6,
                "scheme": "token-transfer"
            }
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_pays_and_retries_once() {
        let mut server = mockito::Server::new_async().await;
        let unpaid = server
            .mock("POST", "/api/chat")
            .match_header("x-payment", Matcher::Missing)
            .with_status(402)
            .with_body(challenge_body(1000))
            .expect(1)
            .create_async()
            .await;
        let paid = server
            .mock("POST", "/api/chat")
            .match_header("x-payment", Matcher::Regex(r#""signature":"5ignature""#.into()))
            .with_status(200)
            .with_body(r#"{"reply":"gm"}"#)
            .expect(1)
            .create_async()
            .await;

        let wallet = wallet(false);
        let ledger = Arc::new(FakeLedger::default());
        let c = client(&server.url(), wallet.clone(), ledger.clone());

        let resp: Paid<serde_json::Value> = c.post_json("/api/chat", &json!({"message": "hi"})).await.unwrap();
        assert_eq!(resp.body["reply"], "gm");
        assert_eq!(
            resp.receipt,
            Some(PaymentReceipt { signature: "5ignature".into(), amount: 1000 })
        );

        unpaid.assert_async().await;
        paid.assert_async().await;

        let signed = wallet.signed.lock().unwrap();
        assert_eq!(signed.len(), 1);
        assert_eq!(signed[0].instructions.len(), 1);
        assert_eq!(signed[0].instructions[0].amount, 1_000_000_000);
        assert_eq!(signed[0].recent_blockhash, "recent");

        let calls = ledger.calls.lock().unwrap();
        assert_eq!(calls[2], "latest_blockhash finalized");
        assert_eq!(calls.last().unwrap(), "confirm 5ignature confirmed");
    }

    #[tokio::test]
    async fn test_free_response_has_no_receipt() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/api/chat")
            .with_body(r#"{"reply":"free"}"#)
            .create_async()
            .await;

        let ledger = Arc::new(FakeLedger::default());
        let c = client(&server.url(), wallet(false), ledger.clone());
        let resp: Paid<serde_json::Value> = c.post_json("/api/chat", &json!({})).await.unwrap();
        assert!(resp.receipt.is_none());
        assert!(ledger.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_retry_is_not_retried_again() {
        let mut server = mockito::Server::new_async().await;
        let _unpaid = server
            .mock("POST", "/api/chat")
            .match_header("x-payment", Matcher::Missing)
            .with_status(402)
            .with_body(challenge_body(1000))
            .create_async()
            .await;
        let paid = server
            .mock("POST", "/api/chat")
            .match_header("x-payment", Matcher::Any)
            .with_status(402)
            .with_body(r#"{"error":"Payment required","details":"transfer not found"}"#)
            .expect(1)
            .create_async()
            .await;

        let c = client(&server.url(), wallet(false), Arc::new(FakeLedger::default()));
        let err = c
            .post_json::<_, serde_json::Value>("/api/chat", &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PaymentError::ProofRejected { status, ref details }
                if status == StatusCode::PAYMENT_REQUIRED && details.contains("transfer not found")
        ));
        paid.assert_async().await;
    }

    #[tokio::test]
    async fn test_bad_challenges() {
        let c = client("http://unused", wallet(false), Arc::new(FakeLedger::default()));

        let mut challenge = parse_challenge(&challenge_body(1000)).unwrap();
        challenge.recipient = "not-base58!".into();
        assert!(matches!(c.pay(&challenge).await, Err(PaymentError::InvalidAddress(_))));

        let mut foreign = parse_challenge(&challenge_body(1000)).unwrap();
        foreign.mint = Pubkey::new_from_array([4; 32]).to_string();
        assert!(matches!(c.pay(&foreign).await, Err(PaymentError::UnsupportedToken(_))));

        let overflow = PaymentChallenge {
            amount: u64::MAX,
            ..parse_challenge(&challenge_body(1000)).unwrap()
        };
        assert!(matches!(c.pay(&overflow).await, Err(PaymentError::AmountOverflow { .. })));

        assert!(matches!(parse_challenge(&challenge_body(0)), Err(PaymentError::InvalidChallenge(_))));
        assert!(matches!(parse_challenge("<html>"), Err(PaymentError::InvalidChallenge(_))));
    }

    #[tokio::test]
    async fn test_signing_rejection_stops_before_submission() {
        let ledger = Arc::new(FakeLedger::default());
        let c = client("http://unused", wallet(true), ledger.clone());
        let challenge = parse_challenge(&challenge_body(1000)).unwrap();

        assert!(matches!(c.pay(&challenge).await, Err(PaymentError::SigningRejected(_))));
        assert!(!ledger.calls.lock().unwrap().iter().any(|c| c == "send_transaction"));
    }

    #[tokio::test]
    async fn test_confirmation_failure_surfaces() {
        let ledger = Arc::new(FakeLedger {
            fail_confirm: true,
            ..Default::default()
        });
        let c = client("http://unused", wallet(false), ledger);
        let challenge = parse_challenge(&challenge_body(1000)).unwrap();
        assert!(matches!(c.pay(&challenge).await, Err(PaymentError::ConfirmationExpired(_))));
    }

    #[tokio::test]
    async fn test_proof_fields() {
        let challenge = PaymentChallenge {
            recipient: recipient().to_string(),
            amount: 10,
            network: Network::Devnet,
            mint: MINT.into(),
            decimals: None,
            scheme: Scheme::TokenTransfer,
            resource: None,
        };
        let c = client("http://unused", wallet(false), Arc::new(FakeLedger::default()));
        let (proof, receipt) = c.pay(&challenge).await.unwrap();
        assert_eq!(proof.network, Network::Devnet);
        assert_eq!(proof.payload.to, recipient().to_string());
        assert_eq!(proof.payload.from, Pubkey::new_from_array([1; 32]).to_string());
        assert_eq!(proof.payload.amount, 10);
        assert!(proof.payload.timestamp > 1_600_000_000_000);
        assert!(proof.check_against(&challenge).is_ok());
        assert_eq!(receipt.amount, 10);
    }

    #[test]
    fn test_error_details() {
        assert_eq!(
            error_details(r#"{"error":"Failed to process chat message","details":"timeout"}"#),
            "Failed to process chat message: timeout"
        );
        assert_eq!(error_details("plain"), "plain");
    }
}
