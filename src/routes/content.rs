//! Tiered content routes. The paygate decides who gets here; these only answer.

use axum::{Router, routing::get, Json};
use serde_json::{json, Value};

pub fn router() -> Router {
    Router::new()
        .route("/api/free-data", get(free_data))
        .route("/api/premium-data", get(premium_data))
        .route("/api/ultra-premium", get(ultra_premium))
        .route("/api/enterprise-data", get(enterprise_data))
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

async fn free_data() -> Json<Value> {
    Json(json!({
        "message": "This is free data",
        "timestamp": now(),
        "tier": "free"
    }))
}

async fn premium_data() -> Json<Value> {
    Json(json!({
        "message": "Welcome to premium tier!",
        "data": {
            "secret": "This data costs 10000 SPL402",
            "features": ["Advanced analytics", "Real-time updates", "Priority support"],
            "timestamp": now()
        },
        "tier": "premium"
    }))
}

async fn ultra_premium() -> Json<Value> {
    Json(json!({
        "message": "Ultra premium content unlocked!",
        "data": {
            "secret": "This exclusive data costs 50000 SPL402",
            "features": [
                "Advanced analytics",
                "Real-time updates",
                "Priority support",
                "Dedicated account manager",
                "Custom integrations"
            ],
            "insights": {
                "market_analysis": "Bullish trend detected",
                "recommendation": "Strong buy",
                "confidence": 0.95
            },
            "timestamp": now()
        },
        "tier": "ultra-premium"
    }))
}

async fn enterprise_data() -> Json<Value> {
    Json(json!({
        "message": "Enterprise tier activated!",
        "data": {
            "secret": "Top-tier enterprise data costs 100000 SPL402",
            "features": [
                "All premium features",
                "White-label solution",
                "Custom SLA",
                "24/7 dedicated support",
                "Advanced security features",
                "API rate limit: Unlimited"
            ],
            "enterprise_insights": {
                "market_depth": "Complete order book analysis",
                "trading_signals": ["BUY", "HOLD", "ACCUMULATE"],
                "risk_score": 0.15,
                "recommended_position": "15% portfolio allocation"
            },
            "timestamp": now()
        },
        "tier": "enterprise"
    }))
}
