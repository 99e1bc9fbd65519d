// crates/server/src/routes/mod.rs
//! API route handlers for the ledger server.

pub mod health;
pub mod metrics;
pub mod sessions;
pub mod sync;
pub mod usage;
pub mod windows;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Create the combined API router with all routes under /api prefix.
///
/// Routes:
/// - GET  /api/health - Health check
/// - GET  /api/sessions - Sessions, most recent first
/// - GET  /api/sessions/{id} - One session with its messages
/// - GET  /api/session-windows - Usage windows, most recent first
/// - GET  /api/token-usage - Usage of the current window against the plan
/// - POST /api/sync - Run a sync and return its report
/// - GET  /metrics - Prometheus metrics (no /api prefix)
pub fn api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", health::router())
        .nest("/api", sessions::router())
        .nest("/api", windows::router())
        .nest("/api", usage::router())
        .nest("/api", sync::router())
        .merge(metrics::router())
        .with_state(state)
}
