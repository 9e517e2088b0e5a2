//! Wire types for the spl402 payment scheme
//!
//! Challenges flow server → client inside a 402 body, proofs flow client →
//! server inside the `X-Payment` header. Transfer transactions flow client →
//! wallet → ledger.

use base64::engine::general_purpose::STANDARD as b64;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::error::{PaymentError, PaymentResult};

/// Current proof format version
pub const SPL402_VERSION: u8 = 1;

/// SPL Token program id
pub const TOKEN_PROGRAM_ID: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";

const BASE58_ALPHABET: &[u8; 58] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

// ============================================================================
// Pubkey
// ============================================================================

/// A 32-byte account address in its base58 text form
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pubkey([u8; 32]);

impl Pubkey {
    pub const fn new_from_array(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0
    }
}

impl FromStr for Pubkey {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = decode_base58(s).ok_or_else(|| PaymentError::InvalidAddress(s.to_string()))?;
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| PaymentError::InvalidAddress(s.to_string()))?;
        Ok(Self(array))
    }
}

impl fmt::Display for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_base58(&self.0))
    }
}

impl fmt::Debug for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pubkey({})", self)
    }
}

impl Serialize for Pubkey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Pubkey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Pubkey::from_str(&s).map_err(serde::de::Error::custom)
    }
}

fn decode_base58(input: &str) -> Option<Vec<u8>> {
    if input.is_empty() {
        return None;
    }

    // Little-endian base-256 accumulator
    let mut bytes: Vec<u8> = Vec::with_capacity(input.len());
    for c in input.bytes() {
        let mut carry = BASE58_ALPHABET.iter().position(|&a| a == c)? as u32;
        for b in bytes.iter_mut() {
            carry += (*b as u32) * 58;
            *b = (carry & 0xff) as u8;
            carry >>= 8;
        }
        while carry > 0 {
            bytes.push((carry & 0xff) as u8);
            carry >>= 8;
        }
    }

    let leading_zeros = input.bytes().take_while(|&c| c == b'1').count();
    bytes.extend(std::iter::repeat(0).take(leading_zeros));
    bytes.reverse();
    Some(bytes)
}

fn encode_base58(input: &[u8]) -> String {
    // Little-endian base-58 digits
    let mut digits: Vec<u8> = Vec::with_capacity(input.len() * 2);
    for &byte in input {
        let mut carry = byte as u32;
        for d in digits.iter_mut() {
            carry += (*d as u32) << 8;
            *d = (carry % 58) as u8;
            carry /= 58;
        }
        while carry > 0 {
            digits.push((carry % 58) as u8);
            carry /= 58;
        }
    }

    let leading_zeros = input.iter().take_while(|&&b| b == 0).count();
    let mut out = String::with_capacity(leading_zeros + digits.len());
    out.extend(std::iter::repeat('1').take(leading_zeros));
    out.extend(digits.iter().rev().map(|&d| BASE58_ALPHABET[d as usize] as char));
    out
}

// ============================================================================
// Network, Scheme, Commitment
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Network {
    #[default]
    #[serde(rename = "mainnet-beta")]
    MainnetBeta,
    #[serde(rename = "devnet")]
    Devnet,
    #[serde(rename = "testnet")]
    Testnet,
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::MainnetBeta => write!(f, "mainnet-beta"),
            Network::Devnet => write!(f, "devnet"),
            Network::Testnet => write!(f, "testnet"),
        }
    }
}

impl FromStr for Network {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet-beta" | "mainnet" => Ok(Network::MainnetBeta),
            "devnet" => Ok(Network::Devnet),
            "testnet" => Ok(Network::Testnet),
            other => Err(PaymentError::UnknownNetwork(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scheme {
    #[default]
    TokenTransfer,
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "token-transfer")
    }
}

/// Ledger finality level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    Confirmed,
    Finalized,
}

impl Commitment {
    /// Whether a status reported by the ledger satisfies this commitment
    pub fn is_satisfied_by(&self, reported: Commitment) -> bool {
        let rank = |c: Commitment| match c {
            Commitment::Processed => 0,
            Commitment::Confirmed => 1,
            Commitment::Finalized => 2,
        };
        rank(reported) >= rank(*self)
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Commitment::Processed => write!(f, "processed"),
            Commitment::Confirmed => write!(f, "confirmed"),
            Commitment::Finalized => write!(f, "finalized"),
        }
    }
}

// ============================================================================
// Token
// ============================================================================

/// The SPL token a deployment is priced in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenConfig {
    pub mint: Pubkey,
    pub decimals: u8,
}

impl TokenConfig {
    /// Convert a whole-token amount into base units (`amount × 10^decimals`)
    pub fn to_base_units(&self, amount: u64) -> PaymentResult<u64> {
        10u64
            .checked_pow(self.decimals as u32)
            .and_then(|factor| amount.checked_mul(factor))
            .ok_or(PaymentError::AmountOverflow {
                amount,
                decimals: self.decimals,
            })
    }
}

// ============================================================================
// Challenge and proof
// ============================================================================

/// Server-issued description of the transfer that unlocks a route.
///
/// `recipient` and `mint` stay as text so the client can report a malformed
/// address instead of failing to parse the whole body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentChallenge {
    pub recipient: String,
    pub amount: u64,
    #[serde(default)]
    pub network: Network,
    pub mint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u8>,
    #[serde(default)]
    pub scheme: Scheme,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
}

/// Body of a 402 response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequiredResponse {
    #[serde(default)]
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub payment: PaymentChallenge,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofPayload {
    pub from: String,
    pub to: String,
    pub amount: u64,
    pub signature: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

/// Client-constructed evidence of a completed transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentProof {
    #[serde(rename = "spl402Version")]
    pub version: u8,
    pub scheme: Scheme,
    pub network: Network,
    pub mint: String,
    pub decimals: u8,
    pub payload: ProofPayload,
}

impl PaymentProof {
    /// Decode an `X-Payment` header value: plain JSON, or base64-wrapped JSON
    pub fn from_header(value: &str) -> PaymentResult<Self> {
        let trimmed = value.trim();
        if trimmed.starts_with('{') {
            return Ok(serde_json::from_str(trimmed)?);
        }
        let bytes = b64
            .decode(trimmed)
            .map_err(|e| PaymentError::InvalidProof(format!("not JSON or base64: {}", e)))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn to_header(&self) -> PaymentResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Check the proof's terms against the challenge it answers.
    ///
    /// This only compares declared fields; whether the transfer really
    /// happened is the verifier's call.
    pub fn check_against(&self, challenge: &PaymentChallenge) -> Result<(), String> {
        if self.version != SPL402_VERSION {
            return Err(format!("unsupported spl402Version {}", self.version));
        }
        if self.scheme != challenge.scheme {
            return Err(format!("scheme {} does not match {}", self.scheme, challenge.scheme));
        }
        if self.network != challenge.network {
            return Err(format!("network {} does not match {}", self.network, challenge.network));
        }
        if self.mint != challenge.mint {
            return Err(format!("mint {} does not match {}", self.mint, challenge.mint));
        }
        if let Some(decimals) = challenge.decimals {
            if self.decimals != decimals {
                return Err(format!("decimals {} do not match {}", self.decimals, decimals));
            }
        }
        if self.payload.to != challenge.recipient {
            return Err(format!("recipient {} does not match {}", self.payload.to, challenge.recipient));
        }
        if self.payload.amount < challenge.amount {
            return Err(format!(
                "amount {} is below the price {}",
                self.payload.amount, challenge.amount
            ));
        }
        if self.payload.signature.is_empty() {
            return Err("missing transaction signature".to_string());
        }
        Ok(())
    }
}

// ============================================================================
// Transactions
// ============================================================================

/// Recent block reference a transaction is anchored to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentBlockhash {
    pub blockhash: String,
    pub last_valid_block_height: u64,
}

/// SPL token `Transfer` instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferInstruction {
    pub program_id: String,
    pub source: Pubkey,
    pub destination: Pubkey,
    pub owner: Pubkey,
    /// Base units
    pub amount: u64,
}

/// Unsigned single-instruction transfer handed to the wallet for signing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferTransaction {
    pub fee_payer: Pubkey,
    pub recent_blockhash: String,
    pub last_valid_block_height: u64,
    pub instructions: Vec<TransferInstruction>,
}

impl TransferTransaction {
    pub fn transfer(
        fee_payer: Pubkey,
        blockhash: &RecentBlockhash,
        source: Pubkey,
        destination: Pubkey,
        amount: u64,
    ) -> Self {
        Self {
            fee_payer,
            recent_blockhash: blockhash.blockhash.clone(),
            last_valid_block_height: blockhash.last_valid_block_height,
            instructions: vec![TransferInstruction {
                program_id: TOKEN_PROGRAM_ID.to_string(),
                source,
                destination,
                owner: fee_payer,
                amount,
            }],
        }
    }
}

/// Wire-format transaction bytes returned by the wallet
#[derive(Clone, PartialEq, Eq)]
pub struct SignedTransaction(pub Vec<u8>);

impl SignedTransaction {
    pub fn to_base64(&self) -> String {
        b64.encode(&self.0)
    }

    pub fn from_base64(s: &str) -> PaymentResult<Self> {
        b64.decode(s)
            .map(SignedTransaction)
            .map_err(|e| PaymentError::SigningRejected(format!("wallet returned invalid base64: {}", e)))
    }
}

impl fmt::Debug for SignedTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignedTransaction({} bytes)", self.0.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub const MINT: &str = "DXgxW5ESEpvTA194VJZRxwXADRuZKPoeadLoK7o5pump";

    fn challenge(recipient: &str) -> PaymentChallenge {
        PaymentChallenge {
            recipient: recipient.to_string(),
            amount: 1000,
            network: Network::MainnetBeta,
            mint: MINT.to_string(),
            decimals: Some(6),
            scheme: Scheme::TokenTransfer,
            resource: Some("/api/chat".to_string()),
        }
    }

    fn proof_for(c: &PaymentChallenge) -> PaymentProof {
        PaymentProof {
            version: SPL402_VERSION,
            scheme: c.scheme,
            network: c.network,
            mint: c.mint.clone(),
            decimals: 6,
            payload: ProofPayload {
                from: Pubkey::new_from_array([9; 32]).to_string(),
                to: c.recipient.clone(),
                amount: c.amount,
                signature: "5sig".to_string(),
                timestamp: 1_700_000_000_000,
            },
        }
    }

    #[test]
    fn test_pubkey_roundtrip() {
        let key = Pubkey::new_from_array([7; 32]);
        let text = key.to_string();
        assert_eq!(text.parse::<Pubkey>().unwrap(), key);
    }

    #[test]
    fn test_pubkey_known_addresses() {
        let system: Pubkey = "11111111111111111111111111111111".parse().unwrap();
        assert_eq!(system.to_bytes(), [0u8; 32]);
        assert_eq!(system.to_string(), "11111111111111111111111111111111");

        let mint: Pubkey = MINT.parse().unwrap();
        assert_eq!(mint.to_string(), MINT);

        assert!(TOKEN_PROGRAM_ID.parse::<Pubkey>().is_ok());
    }

    #[test]
    fn test_pubkey_rejects_malformed() {
        for bad in ["", "not-an-address", "0OIl", "1111", &format!("{}xyz", MINT)] {
            let err = bad.parse::<Pubkey>().unwrap_err();
            assert!(matches!(err, PaymentError::InvalidAddress(_)), "{bad}");
        }
    }

    #[test]
    fn test_base_units() {
        let token = TokenConfig { mint: MINT.parse().unwrap(), decimals: 6 };
        assert_eq!(token.to_base_units(1000).unwrap(), 1_000_000_000);
        assert_eq!(token.to_base_units(0).unwrap(), 0);
        assert!(matches!(
            token.to_base_units(u64::MAX).unwrap_err(),
            PaymentError::AmountOverflow { .. }
        ));
    }

    #[test]
    fn test_commitment_ordering() {
        assert!(Commitment::Confirmed.is_satisfied_by(Commitment::Finalized));
        assert!(Commitment::Confirmed.is_satisfied_by(Commitment::Confirmed));
        assert!(!Commitment::Confirmed.is_satisfied_by(Commitment::Processed));
    }

    #[test]
    fn test_network_parse() {
        assert_eq!("mainnet-beta".parse::<Network>().unwrap(), Network::MainnetBeta);
        assert_eq!("Devnet".parse::<Network>().unwrap(), Network::Devnet);
        assert!("base".parse::<Network>().is_err());
    }

    #[test]
    fn test_challenge_defaults() {
        let c: PaymentChallenge = serde_json::from_str(&format!(
            r#"{{"recipient":"abc","amount":5,"mint":"{}"}}"#,
            MINT
        ))
        .unwrap();
        assert_eq!(c.network, Network::MainnetBeta);
        assert_eq!(c.scheme, Scheme::TokenTransfer);
        assert_eq!(c.decimals, None);
    }

    #[test]
    fn test_proof_wire_format() {
        let recipient = Pubkey::new_from_array([3; 32]).to_string();
        let proof = proof_for(&challenge(&recipient));
        let json: serde_json::Value = serde_json::from_str(&proof.to_header().unwrap()).unwrap();
        assert_eq!(json["spl402Version"], 1);
        assert_eq!(json["scheme"], "token-transfer");
        assert_eq!(json["network"], "mainnet-beta");
        assert_eq!(json["payload"]["signature"], "5sig");
    }

    #[test]
    fn test_proof_header_accepts_base64() {
        let recipient = Pubkey::new_from_array([3; 32]).to_string();
        let proof = proof_for(&challenge(&recipient));
        let wrapped = b64.encode(proof.to_header().unwrap());
        assert_eq!(PaymentProof::from_header(&wrapped).unwrap(), proof);
        assert!(PaymentProof::from_header("%%%").is_err());
    }

    #[test]
    fn test_proof_check_against_challenge() {
        let recipient = Pubkey::new_from_array([3; 32]).to_string();
        let c = challenge(&recipient);
        assert!(proof_for(&c).check_against(&c).is_ok());

        let mut short = proof_for(&c);
        short.payload.amount = 999;
        assert!(short.check_against(&c).unwrap_err().contains("below"));

        let mut elsewhere = proof_for(&c);
        elsewhere.payload.to = Pubkey::new_from_array([4; 32]).to_string();
        assert!(elsewhere.check_against(&c).unwrap_err().contains("recipient"));

        let mut devnet = proof_for(&c);
        devnet.network = Network::Devnet;
        assert!(devnet.check_against(&c).is_err());
    }

    #[test]
    fn test_transfer_transaction_is_single_instruction() {
        let payer = Pubkey::new_from_array([1; 32]);
        let hash = RecentBlockhash { blockhash: "hash".into(), last_valid_block_height: 42 };
        let tx = TransferTransaction::transfer(
            payer,
            &hash,
            Pubkey::new_from_array([2; 32]),
            Pubkey::new_from_array([3; 32]),
            1_000_000_000,
        );
        assert_eq!(tx.instructions.len(), 1);
        assert_eq!(tx.instructions[0].owner, payer);
        assert_eq!(tx.instructions[0].program_id, TOKEN_PROGRAM_ID);
        assert_eq!(tx.last_valid_block_height, 42);
    }
}
