use async_trait::async_trait;
use std::sync::Arc;

use crate::config::LLMConfig;
use crate::types::{LLMRequest, LLMResponse, AppResult};

#[async_trait]
pub trait LLMAdapter: Send + Sync {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse>;
}

/// Build the configured chat model, or `None` when no API key is set
pub fn from_config(config: &LLMConfig) -> Option<Arc<dyn LLMAdapter>> {
    if !config.has_api_key() {
        return None;
    }
    Some(Arc::new(crate::llm::openai::OpenAIAdapter::with_base_url(
        &config.openai_api_key,
        &config.api_base,
    )))
}
