// crates/server/src/error.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use claude_ledger_core::DiscoveryError;
use claude_ledger_db::{DbError, IngestError};
use serde::Serialize;
use thiserror::Error;
use ts_rs::TS;

/// Structured JSON error response for API errors
#[derive(Debug, Serialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../bindings/"))]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}

/// API error types that map to HTTP status codes
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::AlreadyRunning => ApiError::Conflict(err.to_string()),
            IngestError::Discovery(e) => ApiError::Discovery(e),
            IngestError::Db(e) => ApiError::Database(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            ApiError::SessionNotFound(id) => {
                tracing::warn!(session_id = %id, "Session not found");
                (
                    StatusCode::NOT_FOUND,
                    ErrorResponse::with_details("Session not found", format!("Session ID: {}", id)),
                )
            }
            ApiError::Discovery(discovery_err) => {
                let error_msg = match discovery_err {
                    DiscoveryError::ProjectsDirNotFound { path } => {
                        tracing::error!(path = %path.display(), "Projects directory not found");
                        "Claude projects directory not found"
                    }
                    DiscoveryError::NotADirectory { path } => {
                        tracing::error!(path = %path.display(), "Projects path is not a directory");
                        "Claude projects path is not a directory"
                    }
                    DiscoveryError::PermissionDenied { path } => {
                        tracing::error!(
                            path = %path.display(),
                            "Permission denied accessing projects"
                        );
                        "Cannot access Claude projects directory"
                    }
                    DiscoveryError::Io { path, source } => {
                        tracing::error!(
                            path = %path.display(),
                            error = %source,
                            "IO error during discovery"
                        );
                        "IO error accessing projects"
                    }
                    DiscoveryError::HomeDirNotFound => {
                        tracing::error!("Home directory not found");
                        "Home directory not found"
                    }
                };
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::with_details(error_msg, discovery_err.to_string()),
                )
            }
            ApiError::Database(db_err) => {
                tracing::error!(error = %db_err, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::with_details("Database error", db_err.to_string()),
                )
            }
            ApiError::Internal(msg) => {
                tracing::error!(message = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("Internal server error"),
                )
            }
            ApiError::BadRequest(msg) => {
                tracing::warn!(message = %msg, "Bad request");
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::with_details("Bad request", msg.clone()),
                )
            }
            ApiError::Conflict(msg) => {
                tracing::warn!(message = %msg, "Conflict");
                (
                    StatusCode::CONFLICT,
                    ErrorResponse::with_details("Conflict", msg.clone()),
                )
            }
        };

        (status, Json(error_response)).into_response()
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
