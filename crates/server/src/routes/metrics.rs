// crates/server/src/routes/metrics.rs
//! Prometheus metrics endpoint.

use std::sync::Arc;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};

use crate::metrics::render_metrics;
use crate::state::AppState;

/// GET /metrics - Prometheus text format, 503 if the recorder is not installed.
pub async fn metrics_handler() -> Response {
    match render_metrics() {
        Some(output) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            output,
        )
            .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "Metrics not initialized").into_response(),
    }
}

/// Mounted at the root, not under `/api`.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/metrics", get(metrics_handler))
}

#[cfg(test)]
mod tests {
    use crate::test_support::{get, TestEnv};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_metrics_endpoint_exists() {
        crate::metrics::init_metrics();
        let env = TestEnv::new().await;

        let (status, body) = get(env.app(), "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(!body.contains("Metrics not initialized"));
    }
}
