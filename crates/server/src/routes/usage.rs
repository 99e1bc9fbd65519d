// crates/server/src/routes/usage.rs
//! Token usage against the plan limit for the current window.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use claude_ledger_core::{Plan, TokenUsage};
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct UsageQuery {
    /// Plan override: pro, max5, max20 or a token count
    pub plan: Option<String>,
}

/// GET /api/token-usage - Snapshot of the latest window. Never writes.
pub async fn token_usage(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UsageQuery>,
) -> ApiResult<Json<TokenUsage>> {
    let plan = match query.plan.as_deref() {
        Some(raw) => raw
            .parse::<Plan>()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?,
        None => state.plan,
    };
    let usage = state
        .db
        .token_usage_snapshot(plan, Utc::now().timestamp())
        .await?;
    Ok(Json(usage))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/token-usage", get(token_usage))
}
