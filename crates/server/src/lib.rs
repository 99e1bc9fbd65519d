// crates/server/src/lib.rs
//! Claude ledger server library.
//!
//! Axum HTTP surface over the ingestion store: session and window listings,
//! token usage for the current window, and a manual sync trigger.

pub mod error;
pub mod metrics;
pub mod routes;
pub mod state;

pub use error::*;
pub use metrics::{init_metrics, record_sync, record_sync_failure, render_metrics};
pub use routes::api_routes;
pub use state::AppState;

use std::sync::Arc;

use axum::Router;
use claude_ledger_db::Ingestor;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the Axum application with all routes and middleware.
///
/// Sync requests and the periodic loop share `ingestor`, so they never
/// overlap.
pub fn create_app(ingestor: Arc<Ingestor>) -> Router {
    let state = AppState::new(ingestor);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api_routes(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
