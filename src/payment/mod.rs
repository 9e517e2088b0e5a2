// spl402 payments: pricing, the server-side paygate and the paying client

pub mod client;
pub mod error;
pub mod ledger;
pub mod paygate;
pub mod pricing;
pub mod types;
pub mod verifier;
pub mod wallet;

pub use client::{Paid, PaymentClient, PaymentReceipt};
pub use error::{PaymentError, PaymentResult};
pub use ledger::{Ledger, RpcLedger};
pub use paygate::{enforce, PaymentTerms, Paygate, VerifiedPayment, PAYMENT_HEADER, PAYMENT_REQUIRED_HEADER};
pub use pricing::PriceTable;
pub use types::*;
pub use verifier::{FacilitatorClient, PaymentVerifier, ReplayGuard, VerifyResponse};
pub use wallet::{RemoteWallet, Wallet};
