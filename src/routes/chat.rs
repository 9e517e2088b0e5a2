use axum::{
    Router,
    routing::post,
    Json,
    extract::{rejection::JsonRejection, State},
    http::{Extensions, Method},
    response::Json as ResponseJson,
};
use crate::models::{AppState, ChatRequest, ChatResponse};
use crate::payment::VerifiedPayment;
use crate::types::{AppError, AppResult, ChatMessage, LLMRequest};
use tracing::{error, info};

pub const CHAT_PATH: &str = "/api/chat";

/// Prior turns forwarded to the model with each message
pub const HISTORY_LIMIT: usize = 10;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(CHAT_PATH, post(post_chat))
        .with_state(state)
}

/// System persona, then the tail of the history, then the new message
pub fn build_prompt(system_prompt: &str, history: &[ChatMessage], message: &str) -> Vec<ChatMessage> {
    let start = history.len().saturating_sub(HISTORY_LIMIT);
    let mut messages = Vec::with_capacity(history.len() - start + 2);
    messages.push(ChatMessage::system(system_prompt));
    messages.extend_from_slice(&history[start..]);
    messages.push(ChatMessage::user(message));
    messages
}

pub async fn post_chat(
    State(state): State<AppState>,
    extensions: Extensions,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> AppResult<ResponseJson<ChatResponse>> {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            info!("Unreadable chat body: {}", rejection);
            ChatRequest::default()
        }
    };

    let message = request
        .message
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .ok_or_else(|| AppError::InvalidRequest("Message is required".to_string()))?;

    let llm = state.llm.as_ref().ok_or_else(|| AppError::Configuration {
        message: "OpenAI API key not configured".to_string(),
        hint: "Add OPENAI_API_KEY to .env file".to_string(),
    })?;

    if let Some(payment) = extensions.get::<VerifiedPayment>() {
        info!("Chat message paid by {} ({})", payment.payer, payment.signature);
    }
    info!(
        "Received chat message ({} chars, {} history entries)",
        message.len(),
        request.history.len()
    );

    let llm_request = LLMRequest {
        model: state.config.llm.model.clone(),
        messages: build_prompt(&state.config.llm.system_prompt, &request.history, message),
        max_tokens: Some(state.config.llm.max_completion_tokens),
        temperature: None,
    };

    let completion = llm.create_chat_completion(&llm_request).await.map_err(|e| {
        error!("Chat completion failed: {}", e);
        match e {
            AppError::LLMApi(_) => e,
            other => AppError::LLMApi(other.to_string()),
        }
    })?;

    let cost = state
        .pricing
        .price_for(&Method::POST, CHAT_PATH)
        .unwrap_or(0);

    Ok(Json(ChatResponse {
        reply: completion.content,
        cost,
        timestamp: chrono::Utc::now().to_rfc3339(),
        model: state.config.llm.model.clone(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    #[test]
    fn test_prompt_keeps_last_ten_history_entries() {
        let history: Vec<ChatMessage> = (0..14)
            .map(|i| ChatMessage::user(format!("m{}", i)))
            .collect();
        let prompt = build_prompt("persona", &history, "now");

        assert_eq!(prompt.len(), 12);
        assert_eq!(prompt[0], ChatMessage::system("persona"));
        assert_eq!(prompt[1].content, "m4");
        assert_eq!(prompt[10].content, "m13");
        assert_eq!(prompt[11], ChatMessage::user("now"));
    }

    #[test]
    fn test_prompt_with_short_history() {
        let prompt = build_prompt("persona", &[ChatMessage::assistant("hi")], "gm");
        let roles: Vec<Role> = prompt.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::Assistant, Role::User]);
    }
}
