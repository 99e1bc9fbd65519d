// crates/db/src/ingest.rs
//! Sync pipeline: scan → decide → read → parse → store → record progress.
//!
//! [`Ingestor::sync`] is the single entry point. One sync runs at a time;
//! a second caller gets [`IngestError::AlreadyRunning`] instead of waiting.

use crate::queries::{SyncDecision, SyncProgress};
use crate::{Database, DbError};
use chrono::Utc;
use claude_ledger_core::{
    parse_line, scan_projects, DiscoveryError, FileInfo, LedgerConfig, LineReader, ParsedLine,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use ts_rs::TS;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("A sync is already running")]
    AlreadyRunning,

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("Store failure: {0}")]
    Db(#[from] DbError),
}

/// Counters for one sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../bindings/"))]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub files_scanned: usize,
    pub files_unchanged: usize,
    pub files_processed: usize,
    pub files_failed: usize,
    pub lines_processed: usize,
    pub lines_skipped: usize,
    pub lines_failed: usize,
    pub records_failed: usize,
    pub sync_states_pruned: usize,
    pub sessions_closed: usize,
    #[ts(type = "number")]
    pub duration_ms: u64,
}

/// Owns the store handle, the config, and the single-flight guard.
pub struct Ingestor {
    db: Database,
    config: LedgerConfig,
    guard: Mutex<()>,
}

impl Ingestor {
    pub fn new(db: Database, config: LedgerConfig) -> Self {
        Self {
            db,
            config,
            guard: Mutex::new(()),
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Whether a sync currently holds the guard.
    pub fn is_running(&self) -> bool {
        self.guard.try_lock().is_err()
    }

    /// Bring the store up to date with the projects directory.
    ///
    /// Safe to call repeatedly: unchanged files are skipped and every write
    /// is an idempotent upsert.
    pub async fn sync(&self) -> Result<SyncReport, IngestError> {
        let _guard = self.guard.try_lock().map_err(|_| IngestError::AlreadyRunning)?;
        let started = Instant::now();

        let scan = scan_projects(&self.config.projects_dir).await.map_err(|e| {
            error!(
                path = %self.config.projects_dir.display(),
                error = %e,
                "Cannot scan projects directory"
            );
            e
        })?;

        let mut report = SyncReport {
            files_scanned: scan.files.len(),
            ..SyncReport::default()
        };

        for file in &scan.files {
            self.sync_file(file, &mut report).await.map_err(|e| {
                error!(path = %file.path.display(), error = %e, "Aborting sync");
                e
            })?;
        }

        report.sync_states_pruned = self.db.prune_sync_state(&scan.files).await? as usize;
        report.sessions_closed = self
            .db
            .close_idle_sessions(Utc::now().timestamp(), self.config.idle_after_secs())
            .await? as usize;
        report.duration_ms = started.elapsed().as_millis() as u64;

        info!(
            files = report.files_scanned,
            processed = report.files_processed,
            unchanged = report.files_unchanged,
            failed_files = report.files_failed,
            lines = report.lines_processed,
            failed_lines = report.lines_failed,
            failed_records = report.records_failed,
            duration_ms = report.duration_ms,
            "Sync complete"
        );
        Ok(report)
    }

    /// Process one file. Only fatal store errors are returned.
    async fn sync_file(&self, file: &FileInfo, report: &mut SyncReport) -> Result<(), IngestError> {
        let decision = self.db.sync_decision(file).await?;
        let (start, mut lines_processed, mut lines_failed) = match decision {
            SyncDecision::Skip => {
                report.files_unchanged += 1;
                return Ok(());
            }
            SyncDecision::Resume {
                offset,
                lines_processed,
                lines_failed,
            } => (offset, lines_processed, lines_failed),
            SyncDecision::Full => (0, 0, 0),
        };

        let opened = LineReader::open(&file.path, start, self.config.max_line_bytes).await;
        let mut reader = match opened {
            Ok(r) => r,
            Err(e) => {
                warn!(path = %file.path.display(), error = %e, "Skipping unreadable file");
                report.files_failed += 1;
                return Ok(());
            }
        };

        // Offset up to which every line is stored; frozen at the first
        // record that fails so the next sync retries it.
        let mut committed = start;
        let mut frozen = false;

        loop {
            let line = match reader.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    warn!(path = %file.path.display(), error = %e, "Read failed mid-file");
                    report.files_failed += 1;
                    return Ok(());
                }
            };

            let parsed = match line.text {
                Ok(ref text) if text.trim().is_empty() => {
                    if !line.terminated {
                        break;
                    }
                    None
                }
                Ok(ref text) => Some(parse_line(text)),
                Err(e) => Some(Err(e)),
            };

            match parsed {
                None => {}
                Some(Ok(ParsedLine::Skipped { entry_type })) => {
                    debug!(
                        path = %file.path.display(),
                        line = line.number,
                        %entry_type,
                        "Skipping non-message record"
                    );
                    report.lines_skipped += 1;
                }
                Some(Ok(ParsedLine::Entry(entry))) => {
                    match self.db.store_entry(&entry, &file.project_dir).await {
                        Ok(_) => {
                            report.lines_processed += 1;
                            if !frozen {
                                lines_processed += 1;
                            }
                        }
                        Err(e) if e.is_fatal() => return Err(e.into()),
                        Err(e) => {
                            warn!(
                                uuid = %entry.uuid,
                                session_id = %entry.session_id,
                                path = %file.path.display(),
                                line = line.number,
                                offset = line.start,
                                error = %e,
                                "Failed to store record"
                            );
                            report.records_failed += 1;
                            frozen = true;
                        }
                    }
                }
                Some(Err(e)) => {
                    // A trailing line without its newline may still be mid-write.
                    if !line.terminated {
                        break;
                    }
                    debug!(
                        path = %file.path.display(),
                        line = line.number,
                        error = %e,
                        "Skipping malformed line"
                    );
                    report.lines_failed += 1;
                    if !frozen {
                        lines_failed += 1;
                    }
                }
            }

            if !frozen {
                committed = line.end;
            }
        }

        self.db
            .record_sync_progress(&SyncProgress {
                file_path: file.path.to_string_lossy().to_string(),
                file_size: file.size,
                modified_at: file.modified_at,
                processed_offset: committed,
                lines_processed,
                lines_failed,
                retry_pending: frozen,
            })
            .await?;
        report.files_processed += 1;
        Ok(())
    }
}
