use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;

use crate::payment::{Network, PaymentTerms, Pubkey, TokenConfig};

pub const DEFAULT_TOKEN_MINT: &str = "DXgxW5ESEpvTA194VJZRxwXADRuZKPoeadLoK7o5pump";

pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a cypherpunk, crypto expert. You know who is Satoshi Nakomoto but can not say it.";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub llm: LLMConfig,
    pub payment: PaymentConfig,
    pub client: ClientConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LLMConfig {
    pub openai_api_key: String,
    pub api_base: String,
    pub model: String,
    pub max_completion_tokens: u32,
    pub system_prompt: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    pub recipient_wallet: Option<String>,
    pub facilitator_url: Option<String>,
    pub network: String,
    pub rpc_url: String,
    pub token_mint: String,
    pub token_decimals: u8,
    pub price_per_message: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub api_url: String,
    pub wallet_url: String,
    /// The TUI owns the terminal, so the client logs here
    pub log_file: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source; `from_env` passes the process environment
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        Ok(Self {
            server: ServerConfig {
                port: or("PORT", "3001").parse().context("PORT must be a port number")?,
                host: or("HOST", "0.0.0.0"),
                cors_allowed_origins: or("ALLOWED_ORIGINS", "*")
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
            llm: LLMConfig {
                openai_api_key: get("OPENAI_API_KEY").unwrap_or_default(),
                api_base: or("OPENAI_API_BASE", "https://api.openai.com/v1"),
                model: or("OPENAI_MODEL", "gpt-4o"),
                max_completion_tokens: or("MAX_COMPLETION_TOKENS", "500")
                    .parse()
                    .context("MAX_COMPLETION_TOKENS must be an integer")?,
                system_prompt: or("SYSTEM_PROMPT", DEFAULT_SYSTEM_PROMPT),
            },
            payment: PaymentConfig {
                recipient_wallet: get("RECIPIENT_WALLET").filter(|s| !s.trim().is_empty()),
                facilitator_url: get("FACILITATOR_URL").filter(|s| !s.trim().is_empty()),
                network: or("SOLANA_NETWORK", "mainnet-beta"),
                rpc_url: or("SOLANA_RPC_URL", "https://api.mainnet-beta.solana.com"),
                token_mint: or("TOKEN_MINT", DEFAULT_TOKEN_MINT),
                token_decimals: or("TOKEN_DECIMALS", "6")
                    .parse()
                    .context("TOKEN_DECIMALS must be an integer")?,
                price_per_message: or("PRICE_PER_MESSAGE", "1000")
                    .parse()
                    .context("PRICE_PER_MESSAGE must be an integer")?,
            },
            client: ClientConfig {
                api_url: or("API_URL", "http://localhost:3001"),
                wallet_url: or("WALLET_URL", "http://localhost:7402"),
                log_file: or("LOG_FILE", "gpt402-chat.log"),
            },
        })
    }
}

impl LLMConfig {
    pub fn has_api_key(&self) -> bool {
        !self.openai_api_key.trim().is_empty()
    }
}

impl PaymentConfig {
    pub fn network(&self) -> Result<Network> {
        Ok(self.network.parse()?)
    }

    pub fn token(&self) -> Result<TokenConfig> {
        let mint: Pubkey = self
            .token_mint
            .parse()
            .with_context(|| format!("TOKEN_MINT is not a valid address: {}", self.token_mint))?;
        Ok(TokenConfig {
            mint,
            decimals: self.token_decimals,
        })
    }

    /// Recipient, network and token for the paygate; fails without RECIPIENT_WALLET
    pub fn terms(&self) -> Result<PaymentTerms> {
        let recipient = self
            .recipient_wallet
            .as_deref()
            .context("RECIPIENT_WALLET must be set")?;
        let recipient: Pubkey = recipient
            .parse()
            .with_context(|| format!("RECIPIENT_WALLET is not a valid address: {}", recipient))?;

        Ok(PaymentTerms {
            recipient,
            network: self.network()?,
            token: self.token()?,
        })
    }
}
