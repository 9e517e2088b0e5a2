//! Wallet collaborator: holds the payer key and signs transfers

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::error::{PaymentError, PaymentResult};
use super::types::{Pubkey, SignedTransaction, TransferTransaction};

#[async_trait]
pub trait Wallet: Send + Sync {
    fn public_key(&self) -> Pubkey;

    /// Sign the transaction; a refusal surfaces as `SigningRejected`
    async fn sign_transaction(&self, tx: &TransferTransaction) -> PaymentResult<SignedTransaction>;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PubkeyResponse {
    public_key: String,
}

#[derive(Deserialize)]
struct SignResponse {
    transaction: String,
}

/// Signer reached over a local HTTP bridge (`GET /pubkey`, `POST /sign`)
pub struct RemoteWallet {
    client: Client,
    base_url: String,
    public_key: Pubkey,
}

impl RemoteWallet {
    /// Connect to the bridge and fetch the wallet's public key
    pub async fn connect(base_url: &str) -> PaymentResult<Self> {
        let client = Client::new();
        let base_url = base_url.trim_end_matches('/').to_string();

        let response = client.get(format!("{}/pubkey", base_url)).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(PaymentError::SigningRejected(format!(
                "wallet unavailable ({}): {}",
                status, text
            )));
        }
        let body: PubkeyResponse = response.json().await?;
        let public_key = body.public_key.parse()?;

        tracing::info!("Connected wallet {}", public_key);
        Ok(Self {
            client,
            base_url,
            public_key,
        })
    }
}

#[async_trait]
impl Wallet for RemoteWallet {
    fn public_key(&self) -> Pubkey {
        self.public_key
    }

    async fn sign_transaction(&self, tx: &TransferTransaction) -> PaymentResult<SignedTransaction> {
        let response = self
            .client
            .post(format!("{}/sign", self.base_url))
            .json(&json!({ "transaction": tx }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(PaymentError::SigningRejected(format!("{}: {}", status, text)));
        }

        let body: SignResponse = response.json().await?;
        SignedTransaction::from_base64(&body.transaction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::types::RecentBlockhash;

    fn transfer(owner: Pubkey) -> TransferTransaction {
        TransferTransaction::transfer(
            owner,
            &RecentBlockhash { blockhash: "hash".into(), last_valid_block_height: 10 },
            Pubkey::new_from_array([2; 32]),
            Pubkey::new_from_array([3; 32]),
            5,
        )
    }

    #[tokio::test]
    async fn test_connect_and_sign() {
        let owner = Pubkey::new_from_array([1; 32]);
        let mut server = mockito::Server::new_async().await;
        let _pk = server
            .mock("GET", "/pubkey")
            .with_body(json!({ "publicKey": owner.to_string() }).to_string())
            .create_async()
            .await;
        let sign = server
            .mock("POST", "/sign")
            .match_body(mockito::Matcher::PartialJson(json!({
                "transaction": { "feePayer": owner.to_string(), "recentBlockhash": "hash" }
            })))
            .with_body(r#"{"transaction":"AQID"}"#)
            .create_async()
            .await;

        let wallet = RemoteWallet::connect(&server.url()).await.unwrap();
        assert_eq!(wallet.public_key(), owner);

        let signed = wallet.sign_transaction(&transfer(owner)).await.unwrap();
        assert_eq!(signed, SignedTransaction(vec![1, 2, 3]));
        sign.assert_async().await;
    }

    #[tokio::test]
    async fn test_user_rejects_signature() {
        let owner = Pubkey::new_from_array([1; 32]);
        let mut server = mockito::Server::new_async().await;
        let _pk = server
            .mock("GET", "/pubkey")
            .with_body(json!({ "publicKey": owner.to_string() }).to_string())
            .create_async()
            .await;
        let _sign = server
            .mock("POST", "/sign")
            .with_status(403)
            .with_body("User rejected the request")
            .create_async()
            .await;

        let wallet = RemoteWallet::connect(&server.url()).await.unwrap();
        let err = wallet.sign_transaction(&transfer(owner)).await.unwrap_err();
        assert!(matches!(err, PaymentError::SigningRejected(ref m) if m.contains("rejected")));
    }

    #[tokio::test]
    async fn test_connect_rejects_bad_pubkey() {
        let mut server = mockito::Server::new_async().await;
        let _pk = server
            .mock("GET", "/pubkey")
            .with_body(r#"{"publicKey":"nope"}"#)
            .create_async()
            .await;

        assert!(matches!(
            RemoteWallet::connect(&server.url()).await,
            Err(PaymentError::InvalidAddress(_))
        ));
    }
}
