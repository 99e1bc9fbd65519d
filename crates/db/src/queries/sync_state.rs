// crates/db/src/queries/sync_state.rs
// Per-file sync fingerprints for differential sync.

use crate::{Database, DbResult};
use chrono::Utc;
use claude_ledger_core::FileInfo;
use std::collections::{HashMap, HashSet};

/// Stored fingerprint of one log file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStateEntry {
    pub file_path: String,
    pub file_size: i64,
    pub modified_at: i64,
    pub processed_offset: i64,
    pub lines_processed: i64,
    pub lines_failed: i64,
    pub synced_at: i64,
    /// A record after `processed_offset` failed to store last time.
    pub retry_pending: bool,
}

/// What to do with a file on this sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDecision {
    /// Size and mtime match the last sync and nothing is left to retry.
    Skip,
    /// The file grew, or a failed record awaits retry; continue after the
    /// last committed byte.
    Resume {
        offset: u64,
        lines_processed: i64,
        lines_failed: i64,
    },
    /// New, shrunk, or rewritten in place.
    Full,
}

impl SyncDecision {
    /// Decide from the stored fingerprint (if any) and the file as scanned.
    pub fn for_file(file: &FileInfo, stored: Option<&SyncStateEntry>) -> Self {
        let Some(stored) = stored else {
            return SyncDecision::Full;
        };
        let size = file.size as i64;
        if size < stored.file_size || stored.processed_offset > size {
            return SyncDecision::Full;
        }

        let resume = SyncDecision::Resume {
            offset: stored.processed_offset.max(0) as u64,
            lines_processed: stored.lines_processed,
            lines_failed: stored.lines_failed,
        };
        if size == stored.file_size && file.modified_at == stored.modified_at {
            return if stored.retry_pending {
                resume
            } else {
                SyncDecision::Skip
            };
        }
        if size > stored.file_size {
            return resume;
        }
        SyncDecision::Full
    }
}

/// Fingerprint to record once a file's committed content is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncProgress {
    pub file_path: String,
    pub file_size: u64,
    pub modified_at: i64,
    pub processed_offset: u64,
    pub lines_processed: i64,
    pub lines_failed: i64,
    pub retry_pending: bool,
}

impl Database {
    pub async fn get_sync_state(&self, file_path: &str) -> DbResult<Option<SyncStateEntry>> {
        let row: Option<SyncStateRow> = sqlx::query_as(
            "SELECT file_path, file_size, modified_at, processed_offset, lines_processed, \
             lines_failed, synced_at, retry_pending FROM sync_state WHERE file_path = ?1",
        )
        .bind(file_path)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(into_entry))
    }

    /// All fingerprints keyed by file path.
    pub async fn get_all_sync_states(&self) -> DbResult<HashMap<String, SyncStateEntry>> {
        let rows: Vec<SyncStateRow> = sqlx::query_as(
            "SELECT file_path, file_size, modified_at, processed_offset, lines_processed, \
             lines_failed, synced_at, retry_pending FROM sync_state",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows
            .into_iter()
            .map(into_entry)
            .map(|e| (e.file_path.clone(), e))
            .collect())
    }

    pub async fn sync_decision(&self, file: &FileInfo) -> DbResult<SyncDecision> {
        let stored = self.get_sync_state(&file.path.to_string_lossy()).await?;
        Ok(SyncDecision::for_file(file, stored.as_ref()))
    }

    pub async fn record_sync_progress(&self, progress: &SyncProgress) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sync_state (
                file_path, file_size, modified_at, processed_offset,
                lines_processed, lines_failed, synced_at, retry_pending
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(file_path) DO UPDATE SET
                file_size = excluded.file_size,
                modified_at = excluded.modified_at,
                processed_offset = excluded.processed_offset,
                lines_processed = excluded.lines_processed,
                lines_failed = excluded.lines_failed,
                synced_at = excluded.synced_at,
                retry_pending = excluded.retry_pending
            "#,
        )
        .bind(&progress.file_path)
        .bind(progress.file_size as i64)
        .bind(progress.modified_at)
        .bind(progress.processed_offset as i64)
        .bind(progress.lines_processed)
        .bind(progress.lines_failed)
        .bind(Utc::now().timestamp())
        .bind(progress.retry_pending)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Drop fingerprints for files no longer on disk. Returns rows removed.
    pub async fn prune_sync_state(&self, present: &[FileInfo]) -> DbResult<u64> {
        let keep: HashSet<String> = present
            .iter()
            .map(|f| f.path.to_string_lossy().to_string())
            .collect();
        let stale: Vec<String> = self
            .get_all_sync_states()
            .await?
            .into_keys()
            .filter(|p| !keep.contains(p))
            .collect();
        if stale.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool().begin().await?;
        for path in &stale {
            sqlx::query("DELETE FROM sync_state WHERE file_path = ?1")
                .bind(path)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(stale.len() as u64)
    }
}

type SyncStateRow = (String, i64, i64, i64, i64, i64, i64, bool);

fn into_entry(row: SyncStateRow) -> SyncStateEntry {
    let (
        file_path,
        file_size,
        modified_at,
        processed_offset,
        lines_processed,
        lines_failed,
        synced_at,
        retry_pending,
    ) = row;
    SyncStateEntry {
        file_path,
        file_size,
        modified_at,
        processed_offset,
        lines_processed,
        lines_failed,
        synced_at,
        retry_pending,
    }
}
