use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Unknown network: {0}")]
    UnknownNetwork(String),

    #[error("Amount {amount} overflows at {decimals} decimals")]
    AmountOverflow { amount: u64, decimals: u8 },

    #[error("Invalid payment challenge: {0}")]
    InvalidChallenge(String),

    #[error("Payment requested in unsupported token {0}")]
    UnsupportedToken(String),

    #[error("Invalid payment proof: {0}")]
    InvalidProof(String),

    #[error("No token account for {owner} (mint {mint})")]
    TokenAccountNotFound { owner: String, mint: String },

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Wallet rejected signing: {0}")]
    SigningRejected(String),

    #[error("Transaction submission failed: {0}")]
    SubmissionFailed(String),

    #[error("Transaction {signature} failed: {reason}")]
    ConfirmationFailed { signature: String, reason: String },

    #[error("Transaction {0} expired before confirmation")]
    ConfirmationExpired(String),

    #[error("Payment was not accepted ({status}): {details}")]
    ProofRejected { status: StatusCode, details: String },

    #[error("Request failed ({status}): {details}")]
    RequestFailed { status: StatusCode, details: String },

    #[error("Verifier error: {0}")]
    Verifier(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type PaymentResult<T> = std::result::Result<T, PaymentError>;
