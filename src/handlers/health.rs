// handlers/health.rs - GET /health handler

use axum::{extract::State, response::Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// Liveness check. Always 200, with the storage status reported alongside.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let now = chrono::Utc::now();

    let storage = match state.store.ping().await {
        Ok(()) => "ok",
        Err(e) => {
            tracing::warn!("Health check storage ping failed: {}", e);
            "unavailable"
        }
    };

    Json(json!({
        "status": "ok",
        "timestamp": now,
        "storage": storage
    }))
}
