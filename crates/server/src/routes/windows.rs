// crates/server/src/routes/windows.rs
//! Usage window listing.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use claude_ledger_core::SessionWindow;
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct WindowsQuery {
    /// Number of windows to return (default 20)
    pub limit: Option<i64>,
}

/// GET /api/session-windows - Most recent windows first.
pub async fn list_windows(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WindowsQuery>,
) -> ApiResult<Json<Vec<SessionWindow>>> {
    let limit = query.limit.unwrap_or(20);
    if !(1..=500).contains(&limit) {
        return Err(ApiError::BadRequest(format!(
            "limit must be between 1 and 500, got {limit}"
        )));
    }
    Ok(Json(state.db.list_windows(limit).await?))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/session-windows", get(list_windows))
}
