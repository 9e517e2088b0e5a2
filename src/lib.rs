// gpt402 - pay-per-message AI chat gated by spl402 token payments

pub mod config;
pub mod types;
pub mod models;
pub mod llm;
pub mod payment;   // spl402: pricing, paygate, verifier, paying client
pub mod routes;
pub mod middleware;
pub mod markdown;
pub mod session;   // Client-side transcript and spend counter
pub mod tui;       // Terminal chat client
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use models::AppState;

pub fn create_router(state: AppState, paygate: std::sync::Arc<payment::Paygate>) -> axum::Router {
    routes::create_router(state, paygate)
}
