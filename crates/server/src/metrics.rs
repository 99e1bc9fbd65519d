// crates/server/src/metrics.rs
//! Prometheus metrics for the ledger server.
//!
//! The recorder is installed once at startup; `/metrics` renders it.

use std::sync::OnceLock;
use std::time::Duration;

use claude_ledger_db::SyncReport;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// Returns `true` if initialization succeeded, `false` if already initialized.
pub fn init_metrics() -> bool {
    if PROMETHEUS_HANDLE.get().is_some() {
        return false;
    }

    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();

    if metrics::set_global_recorder(recorder).is_err() {
        tracing::warn!("Failed to set global metrics recorder (already set)");
        return false;
    }

    if PROMETHEUS_HANDLE.set(handle).is_err() {
        tracing::warn!("Failed to store Prometheus handle (already set)");
    }

    describe_metrics();

    tracing::info!("Prometheus metrics initialized");
    true
}

fn describe_metrics() {
    describe_counter!("ledger_syncs_total", "Sync runs by outcome");
    describe_histogram!(
        "ledger_sync_duration_seconds",
        "Duration of completed sync runs in seconds"
    );
    describe_counter!(
        "ledger_lines_processed_total",
        "Log lines stored as messages"
    );
    describe_counter!(
        "ledger_lines_failed_total",
        "Log lines that could not be parsed"
    );
    describe_counter!(
        "ledger_records_failed_total",
        "Parsed records the store rejected"
    );
    describe_gauge!(
        "ledger_sync_files_processed",
        "Files read in the last sync"
    );
}

/// Render current metrics in Prometheus text format.
///
/// Returns `None` if metrics are not initialized.
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|h| h.render())
}

/// Record a completed sync.
pub fn record_sync(report: &SyncReport) {
    counter!("ledger_syncs_total", "outcome" => "ok").increment(1);
    histogram!("ledger_sync_duration_seconds")
        .record(Duration::from_millis(report.duration_ms).as_secs_f64());
    counter!("ledger_lines_processed_total").increment(report.lines_processed as u64);
    counter!("ledger_lines_failed_total").increment(report.lines_failed as u64);
    counter!("ledger_records_failed_total").increment(report.records_failed as u64);
    gauge!("ledger_sync_files_processed").set(report.files_processed as f64);
}

/// Record a sync that did not complete. `outcome` is `"rejected"` or `"error"`.
pub fn record_sync_failure(outcome: &'static str) {
    counter!("ledger_syncs_total", "outcome" => outcome).increment(1);
}
