// crates/server/src/state.rs
//! Application state for the Axum server.

use std::sync::Arc;
use std::time::Instant;

use claude_ledger_core::Plan;
use claude_ledger_db::{Database, Ingestor};

/// Shared application state accessible from all route handlers.
pub struct AppState {
    /// Server start time for uptime tracking.
    pub start_time: Instant,
    /// Read-only handle for the query routes.
    pub db: Database,
    /// Sync entry point; owns the single-flight guard.
    pub ingestor: Arc<Ingestor>,
    /// Plan used by `/api/token-usage` when the request names none.
    pub plan: Plan,
}

impl AppState {
    /// Create a new application state wrapped in an Arc for sharing.
    pub fn new(ingestor: Arc<Ingestor>) -> Arc<Self> {
        Arc::new(Self {
            start_time: Instant::now(),
            db: ingestor.db().clone(),
            plan: ingestor.config().plan,
            ingestor,
        })
    }

    /// Get the server uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
