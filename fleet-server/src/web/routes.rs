//! Read-only route handlers: liveness, health and the fleet snapshot.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::web::AppState;

/// GET / — liveness.
pub async fn index() -> &'static str {
    "Fleet server is running!"
}

/// GET /api/health — fleet and subscriber counts.
pub async fn api_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "ok": true,
        "aircraft": state.store().len(),
        "subscribers": state.gateway.subscriber_count(),
    }))
}

/// GET /api/aircraft — current fleet snapshot.
pub async fn api_aircraft(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.store().snapshot())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
