// crates/server/src/routes/sessions.rs
//! Session listing and detail endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use claude_ledger_core::{MessagesPage, SessionSummary, SessionsPage};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 500;

/// Pagination query shared by the session endpoints.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct PageQuery {
    /// Pagination limit (default 50, at most 500)
    pub limit: Option<i64>,
    /// Pagination offset (default 0)
    pub offset: Option<i64>,
}

impl PageQuery {
    /// Validated `(limit, offset)`.
    pub fn resolve(&self) -> ApiResult<(i64, i64)> {
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT);
        let offset = self.offset.unwrap_or(0);
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(ApiError::BadRequest(format!(
                "limit must be between 1 and {MAX_LIMIT}, got {limit}"
            )));
        }
        if offset < 0 {
            return Err(ApiError::BadRequest(format!(
                "offset must not be negative, got {offset}"
            )));
        }
        Ok((limit, offset))
    }
}

/// Response for GET /api/sessions/{id}
#[derive(Debug, Clone, Serialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../bindings/"))]
#[serde(rename_all = "camelCase")]
pub struct SessionDetail {
    pub session: SessionSummary,
    pub messages: MessagesPage,
}

/// GET /api/sessions - Sessions ordered by most recent activity.
pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<SessionsPage>> {
    let (limit, offset) = query.resolve()?;
    Ok(Json(state.db.list_sessions(limit, offset).await?))
}

/// GET /api/sessions/{id} - One session and a page of its messages.
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<SessionDetail>> {
    let (limit, offset) = query.resolve()?;
    let session = state
        .db
        .get_session(&session_id)
        .await?
        .ok_or_else(|| ApiError::SessionNotFound(session_id.clone()))?;
    let messages = state
        .db
        .list_session_messages(&session_id, limit, offset)
        .await?;
    Ok(Json(SessionDetail { session, messages }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sessions", get(list_sessions))
        .route("/sessions/{id}", get(get_session))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{assistant_line, get, user_line, TestEnv};
    use pretty_assertions::assert_eq;
    use axum::http::StatusCode;

    #[test]
    fn test_page_query_defaults_and_bounds() {
        assert_eq!(PageQuery::default().resolve().unwrap(), (50, 0));
        let q = PageQuery {
            limit: Some(0),
            offset: None,
        };
        assert!(matches!(q.resolve(), Err(ApiError::BadRequest(_))));
        let q = PageQuery {
            limit: Some(10),
            offset: Some(-1),
        };
        assert!(matches!(q.resolve(), Err(ApiError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_list_sessions_after_sync() {
        let env = TestEnv::new().await;
        env.write_log(
            "-home-u-app",
            "s1",
            &[
                user_line("u1", "s1", "2025-01-15T10:00:00Z"),
                assistant_line("a1", "s1", "2025-01-15T10:00:05Z", 100, 50),
            ],
        );
        env.write_log(
            "-home-u-app",
            "s2",
            &[user_line("u2", "s2", "2025-01-15T12:00:00Z")],
        );
        env.ingestor.sync().await.unwrap();

        let (status, body) = get(env.app(), "/api/sessions").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["total"], 2);
        assert_eq!(json["sessions"][0]["id"], "s2");
        assert_eq!(json["sessions"][1]["totalTokens"], 150);
        assert_eq!(json["sessions"][1]["projectName"], "app");

        let (status, body) = get(env.app(), "/api/sessions?limit=1&offset=1").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["sessions"].as_array().unwrap().len(), 1);
        assert_eq!(json["sessions"][0]["id"], "s1");
    }

    #[tokio::test]
    async fn test_session_detail_includes_messages() {
        let env = TestEnv::new().await;
        env.write_log(
            "-home-u-app",
            "s1",
            &[
                user_line("u1", "s1", "2025-01-15T10:00:00Z"),
                assistant_line("a1", "s1", "2025-01-15T10:00:05Z", 100, 50),
            ],
        );
        env.ingestor.sync().await.unwrap();

        let (status, body) = get(env.app(), "/api/sessions/s1").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["session"]["messageCount"], 2);
        assert_eq!(json["messages"]["total"], 2);
        assert_eq!(json["messages"]["messages"][0]["id"], "u1");
        assert_eq!(json["messages"]["messages"][1]["outputTokens"], 50);

        let session: SessionSummary = serde_json::from_value(json["session"].clone()).unwrap();
        assert_eq!(Some(session), env.ingestor.db().get_session("s1").await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_session_is_404() {
        let env = TestEnv::new().await;
        let (status, body) = get(env.app(), "/api/sessions/missing").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.contains("missing"));
    }

    #[tokio::test]
    async fn test_invalid_limit_is_400() {
        let env = TestEnv::new().await;
        let (status, _) = get(env.app(), "/api/sessions?limit=9999").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
