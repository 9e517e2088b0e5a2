//! API Routes
//!
//! - `/health` - Health check (never priced)
//! - `/api/free-data`, `/api/premium-data`, `/api/ultra-premium`, `/api/enterprise-data` - Tiered content
//! - `/api/chat` - Paid chat endpoint
//!
//! Every route sits behind the paygate; the price table decides which ones charge.

pub mod chat;
pub mod content;
pub mod health;

use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::middleware::cors::cors_layer;
use crate::models::AppState;
use crate::payment::{enforce, Paygate};

/// Create the main application router
pub fn create_router(state: AppState, paygate: Arc<Paygate>) -> Router {
    info!("Creating application router");

    let cors = cors_layer(&state.config.server.cors_allowed_origins);

    Router::new()
        .merge(health::router(state.clone()))
        .merge(content::router())
        .merge(chat::router(state))
        .layer(axum::middleware::from_fn_with_state(paygate, enforce))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
