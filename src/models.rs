use std::sync::Arc;

use crate::config::Config;
use crate::llm::LLMAdapter;
use crate::payment::{PaymentTerms, PriceTable};
use crate::types::ChatMessage;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// `None` when no model API key is configured
    pub llm: Option<Arc<dyn LLMAdapter>>,
    pub pricing: Arc<PriceTable>,
    pub terms: PaymentTerms,
}

// API Request/Response types

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ChatResponse {
    pub reply: String,
    /// Whole tokens charged for this message
    pub cost: u64,
    pub timestamp: String,
    pub model: String,
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub network: String,
    pub recipient: String,
}

/// Error body shared by every failing route: `{error, details?}`
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_request_defaults() {
        let req: ChatRequest = serde_json::from_str("{}").unwrap();
        assert!(req.message.is_none());
        assert!(req.history.is_empty());

        let req: ChatRequest = serde_json::from_str(
            r#"{"message":"gm","history":[{"role":"user","content":"hi"}]}"#,
        )
        .unwrap();
        assert_eq!(req.message.as_deref(), Some("gm"));
        assert_eq!(req.history.len(), 1);
    }

    #[test]
    fn test_error_response_omits_empty_details() {
        let json = serde_json::to_value(ErrorResponse::new("Message is required")).unwrap();
        assert_eq!(json, serde_json::json!({"error": "Message is required"}));

        let json = serde_json::to_value(ErrorResponse::new("x").with_details("y")).unwrap();
        assert_eq!(json["details"], "y");
    }
}
