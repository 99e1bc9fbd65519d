// crates/server/src/routes/sync.rs
//! Manual sync trigger.

use std::sync::Arc;

use axum::{extract::State, routing::post, Json, Router};
use claude_ledger_db::{IngestError, SyncReport};

use crate::error::{ApiError, ApiResult};
use crate::metrics::{record_sync, record_sync_failure};
use crate::state::AppState;

/// POST /api/sync - Run a sync to completion and return its report.
///
/// Returns:
/// - 200 OK: the sync report
/// - 409 Conflict: another sync (periodic or manual) is in progress
pub async fn trigger_sync(State(state): State<Arc<AppState>>) -> ApiResult<Json<SyncReport>> {
    tracing::info!("Sync triggered via API");
    match state.ingestor.sync().await {
        Ok(report) => {
            record_sync(&report);
            Ok(Json(report))
        }
        Err(IngestError::AlreadyRunning) => {
            record_sync_failure("rejected");
            Err(ApiError::Conflict(
                "Sync already in progress. Please wait for it to complete.".to_string(),
            ))
        }
        Err(e) => {
            record_sync_failure("error");
            Err(e.into())
        }
    }
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/sync", post(trigger_sync))
}

#[cfg(test)]
mod tests {
    use crate::test_support::{assistant_line, post, TestEnv};
    use pretty_assertions::assert_eq;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_sync_returns_report() {
        let env = TestEnv::new().await;
        env.write_log(
            "-home-u-app",
            "s1",
            &[
                assistant_line("a1", "s1", "2025-01-15T10:00:00Z", 100, 50),
                "{broken".to_string(),
            ],
        );

        let (status, body) = post(env.app(), "/api/sync").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["filesScanned"], 1);
        assert_eq!(json["linesProcessed"], 1);
        assert_eq!(json["linesFailed"], 1);

        // Nothing changed on disk.
        let (_, body) = post(env.app(), "/api/sync").await;
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["filesUnchanged"], 1);
        assert_eq!(json["linesProcessed"], 0);
    }

    #[tokio::test]
    async fn test_sync_while_running_is_409() {
        let env = TestEnv::new().await;
        env.write_log(
            "-home-u-app",
            "s1",
            &[assistant_line("a1", "s1", "2025-01-15T10:00:00Z", 1, 1)],
        );

        // The first future takes the guard before the request is polled.
        let (running, (status, body)) =
            tokio::join!(env.ingestor.sync(), post(env.app(), "/api/sync"));
        assert!(running.is_ok());
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body.contains("already in progress"));
    }

    #[tokio::test]
    async fn test_missing_projects_dir_is_500() {
        let env = TestEnv::new().await;
        std::fs::remove_dir_all(env.projects_dir()).unwrap();

        let (status, body) = post(env.app(), "/api/sync").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.contains("projects directory not found"));
    }
}
