// crates/server/src/routes/health.rs
//! Health check endpoint for the API.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Response for the health check endpoint.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    /// Whether a sync currently holds the ingest guard.
    pub sync_running: bool,
    /// Plan used by `/api/token-usage` when the request names none.
    pub plan: String,
}

/// GET /api/health - Health check endpoint.
///
/// Returns server status, version, uptime, and the sync and plan state
/// a client needs before calling `/api/sync` or `/api/token-usage`.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.uptime_secs(),
        sync_running: state.ingestor.is_running(),
        plan: state.plan.to_string(),
    })
}

/// Create the health routes router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health_check))
}
