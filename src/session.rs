//! Client-side chat session: transcript, spend counter and in-flight guard

use async_trait::async_trait;
use std::sync::Arc;

use crate::models::{ChatRequest, ChatResponse};
use crate::payment::{Paid, PaymentClient, PaymentResult};
use crate::routes::chat::{CHAT_PATH, HISTORY_LIMIT};
use crate::types::{ChatMessage, Role};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Message is empty")]
    Empty,

    #[error("A message is already being sent")]
    Busy,
}

/// Delivers one chat request, paying if the server asks
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send_chat(&self, request: &ChatRequest) -> PaymentResult<Paid<ChatResponse>>;
}

/// `POST /api/chat` through the paying client
pub struct ChatClient {
    payments: Arc<PaymentClient>,
}

impl ChatClient {
    pub fn new(payments: Arc<PaymentClient>) -> Self {
        Self { payments }
    }
}

#[async_trait]
impl ChatTransport for ChatClient {
    async fn send_chat(&self, request: &ChatRequest) -> PaymentResult<Paid<ChatResponse>> {
        self.payments.post_json(CHAT_PATH, request).await
    }
}

/// A message accepted by [`ChatSession::begin`] and waiting for delivery
#[derive(Debug, Clone)]
pub struct PendingMessage {
    pub request: ChatRequest,
}

impl PendingMessage {
    pub async fn deliver(&self, transport: &dyn ChatTransport) -> PaymentResult<Paid<ChatResponse>> {
        transport.send_chat(&self.request).await
    }
}

#[derive(Debug, Default)]
pub struct ChatSession {
    messages: Vec<ChatMessage>,
    total_spent: u64,
    in_flight: bool,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Whole tokens paid so far
    pub fn total_spent(&self) -> u64 {
        self.total_spent
    }

    pub fn is_sending(&self) -> bool {
        self.in_flight
    }

    /// Accept a user message and build its request.
    ///
    /// The request carries the last prior user/assistant turns, not the new
    /// message itself and never local error notes.
    pub fn begin(&mut self, text: &str) -> Result<PendingMessage, SessionError> {
        let message = text.trim();
        if message.is_empty() {
            return Err(SessionError::Empty);
        }
        if self.in_flight {
            return Err(SessionError::Busy);
        }

        let prior: Vec<ChatMessage> = self
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .cloned()
            .collect();
        let history = prior[prior.len().saturating_sub(HISTORY_LIMIT)..].to_vec();

        self.messages.push(ChatMessage::user(message));
        self.in_flight = true;

        Ok(PendingMessage {
            request: ChatRequest {
                message: Some(message.to_string()),
                history,
            },
        })
    }

    /// Record the outcome of the pending message
    pub fn complete(&mut self, result: PaymentResult<Paid<ChatResponse>>) {
        self.in_flight = false;
        match result {
            Ok(paid) => {
                if let Some(receipt) = &paid.receipt {
                    self.total_spent = self.total_spent.saturating_add(receipt.amount);
                }
                self.messages.push(ChatMessage::assistant(paid.body.reply));
            }
            Err(e) => {
                tracing::warn!("Chat message failed: {}", e);
                self.messages.push(ChatMessage::system(format!("Error: {}", e)));
            }
        }
    }

    /// begin, deliver, complete
    pub async fn send(&mut self, transport: &dyn ChatTransport, text: &str) -> Result<(), SessionError> {
        let pending = self.begin(text)?;
        let result = pending.deliver(transport).await;
        self.complete(result);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::{PaymentError, PaymentReceipt};
    use reqwest::StatusCode;
    use std::sync::Mutex;

    enum Outcome {
        Paid(u64),
        Free,
        Fail,
    }

    struct FakeTransport {
        outcome: Outcome,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl FakeTransport {
        fn new(outcome: Outcome) -> Self {
            Self {
                outcome,
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatTransport for FakeTransport {
        async fn send_chat(&self, request: &ChatRequest) -> PaymentResult<Paid<ChatResponse>> {
            self.requests.lock().unwrap().push(request.clone());
            let body = ChatResponse {
                reply: format!("re: {}", request.message.clone().unwrap_or_default()),
                cost: 1000,
                timestamp: "2024-01-01T00:00:00Z".into(),
                model: "gpt-4o".into(),
            };
            match self.outcome {
                Outcome::Paid(amount) => Ok(Paid {
                    body,
                    receipt: Some(PaymentReceipt { signature: "sig".into(), amount }),
                }),
                Outcome::Free => Ok(Paid { body, receipt: None }),
                Outcome::Fail => Err(PaymentError::ProofRejected {
                    status: StatusCode::PAYMENT_REQUIRED,
                    details: "Payment required".into(),
                }),
            }
        }
    }

    #[tokio::test]
    async fn test_paid_reply_increments_spend() {
        let transport = FakeTransport::new(Outcome::Paid(1000));
        let mut session = ChatSession::new();

        session.send(&transport, "  gm  ").await.unwrap();
        assert_eq!(session.total_spent(), 1000);
        assert_eq!(
            session.messages(),
            &[ChatMessage::user("gm"), ChatMessage::assistant("re: gm")]
        );
        assert!(!session.is_sending());

        session.send(&transport, "again").await.unwrap();
        assert_eq!(session.total_spent(), 2000);

        let sent = transport.requests.lock().unwrap();
        assert!(sent[0].history.is_empty());
        assert_eq!(sent[1].history.len(), 2);
    }

    #[tokio::test]
    async fn test_failure_adds_error_and_keeps_spend() {
        let transport = FakeTransport::new(Outcome::Fail);
        let mut session = ChatSession::new();

        session.send(&transport, "gm").await.unwrap();
        assert_eq!(session.total_spent(), 0);
        let last = session.messages().last().unwrap();
        assert_eq!(last.role, Role::System);
        assert!(last.content.starts_with("Error: "));
        assert!(!session.is_sending());
    }

    #[tokio::test]
    async fn test_free_reply_costs_nothing() {
        let mut session = ChatSession::new();
        session.send(&FakeTransport::new(Outcome::Free), "gm").await.unwrap();
        assert_eq!(session.total_spent(), 0);
        assert_eq!(session.messages().len(), 2);
    }

    #[test]
    fn test_empty_message_rejected() {
        let mut session = ChatSession::new();
        assert_eq!(session.begin("").unwrap_err(), SessionError::Empty);
        assert_eq!(session.begin(" \n\t").unwrap_err(), SessionError::Empty);
        assert!(session.messages().is_empty());
    }

    #[test]
    fn test_second_send_while_pending_is_busy() {
        let mut session = ChatSession::new();
        let _pending = session.begin("first").unwrap();
        assert_eq!(session.begin("second").unwrap_err(), SessionError::Busy);
        assert_eq!(session.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_history_is_last_ten_without_errors() {
        let ok = FakeTransport::new(Outcome::Paid(1));
        let mut session = ChatSession::new();
        for i in 0..6 {
            session.send(&ok, &format!("q{i}")).await.unwrap();
        }
        session.send(&FakeTransport::new(Outcome::Fail), "broken").await.unwrap();

        let pending = session.begin("latest").unwrap();
        let history = &pending.request.history;
        assert_eq!(history.len(), 10);
        assert!(history.iter().all(|m| m.role != Role::System));
        assert_eq!(history.last().unwrap(), &ChatMessage::user("broken"));
        assert_eq!(history[0], ChatMessage::assistant("re: q1"));
        assert_eq!(pending.request.message.as_deref(), Some("latest"));
    }
}
