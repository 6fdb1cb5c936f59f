use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::json;

use crate::server::AppState;

/// Liveness probe.
///
/// # Route
/// - **Method**: GET
/// - **Path**: `/ping`
/// - **Response**: `{"status":"pong"}`
pub async fn ping() -> Json<serde_json::Value> {
    Json(json!({ "status": "pong" }))
}

/// Readiness probe: checks that the database answers.
///
/// # Route
/// - **Method**: GET
/// - **Path**: `/health`
///
/// # HTTP Status Codes
/// - **200 OK**: `{"status":"ok"}`
/// - **503 Service Unavailable**: `{"status":"degraded"}` when the database is unreachable
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    match state.data.ping().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ok", "database": "up" }))),
        Err(e) => {
            tracing::warn!("Health check failed: {:#}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "degraded", "database": "down" })),
            )
        }
    }
}
