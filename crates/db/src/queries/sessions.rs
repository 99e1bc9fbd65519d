// crates/db/src/queries/sessions.rs
// Session registry: upsert, aggregate refresh, idle closing, listing.

use crate::{Database, DbResult};
use chrono::Utc;
use claude_ledger_core::{ProjectRef, SessionStatus, SessionSummary, SessionsPage};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

const SESSION_COLUMNS: &str = "id, project_name, project_path, start_time, end_time, \
     duration_seconds, total_input_tokens, total_output_tokens, total_cache_creation_tokens, \
     total_cache_read_tokens, total_tokens, message_count, status";

fn session_from_row(row: &SqliteRow) -> Result<SessionSummary, sqlx::Error> {
    let status: String = row.try_get("status")?;
    Ok(SessionSummary {
        id: row.try_get("id")?,
        project_name: row.try_get("project_name")?,
        project_path: row.try_get("project_path")?,
        start_time: row.try_get("start_time")?,
        end_time: row.try_get("end_time")?,
        duration_seconds: row.try_get("duration_seconds")?,
        total_input_tokens: row.try_get("total_input_tokens")?,
        total_output_tokens: row.try_get("total_output_tokens")?,
        total_cache_creation_tokens: row.try_get("total_cache_creation_tokens")?,
        total_cache_read_tokens: row.try_get("total_cache_read_tokens")?,
        total_tokens: row.try_get("total_tokens")?,
        message_count: row.try_get("message_count")?,
        status: SessionStatus::from_db(&status),
    })
}

// ============================================================================
// Transaction-accepting writes
// ============================================================================

/// Create the session if absent, otherwise widen its time bounds.
///
/// Project name and path are first-write-wins.
pub(crate) async fn upsert_session_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    session_id: &str,
    project: &ProjectRef,
    timestamp: i64,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO sessions (
            id, project_name, project_path, start_time, end_time,
            duration_seconds, status, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?4, 0, 'active', ?5)
        ON CONFLICT(id) DO UPDATE SET
            start_time = MIN(sessions.start_time, excluded.start_time),
            end_time = MAX(sessions.end_time, excluded.end_time),
            duration_seconds = MAX(sessions.end_time, excluded.end_time)
                - MIN(sessions.start_time, excluded.start_time)
        "#,
    )
    .bind(session_id)
    .bind(&project.name)
    .bind(&project.path)
    .bind(timestamp)
    .bind(Utc::now().timestamp())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Re-derive a session's counters and time bounds from its messages.
///
/// A session left with no messages keeps its previous bounds.
pub(crate) async fn refresh_session_totals_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    session_id: &str,
) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE sessions SET
            total_input_tokens = agg.input,
            total_output_tokens = agg.output,
            total_cache_creation_tokens = agg.cache_creation,
            total_cache_read_tokens = agg.cache_read,
            total_tokens = agg.input + agg.output,
            message_count = agg.cnt,
            start_time = COALESCE(agg.first_ts, sessions.start_time),
            end_time = COALESCE(agg.last_ts, sessions.end_time),
            duration_seconds = COALESCE(agg.last_ts - agg.first_ts, sessions.duration_seconds)
        FROM (
            SELECT
                COALESCE(SUM(input_tokens), 0) AS input,
                COALESCE(SUM(output_tokens), 0) AS output,
                COALESCE(SUM(cache_creation_input_tokens), 0) AS cache_creation,
                COALESCE(SUM(cache_read_input_tokens), 0) AS cache_read,
                COUNT(*) AS cnt,
                MIN(timestamp) AS first_ts,
                MAX(timestamp) AS last_ts
            FROM messages WHERE session_id = ?1
        ) AS agg
        WHERE sessions.id = ?1
        "#,
    )
    .bind(session_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

// ============================================================================
// Database API
// ============================================================================

impl Database {
    /// Register activity for a session at `timestamp` (unix seconds).
    pub async fn upsert_session(
        &self,
        session_id: &str,
        project: &ProjectRef,
        timestamp: i64,
    ) -> DbResult<()> {
        let mut tx = self.pool().begin().await?;
        upsert_session_tx(&mut tx, session_id, project, timestamp).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Recompute a session's aggregates from its stored messages.
    pub async fn refresh_session_totals(&self, session_id: &str) -> DbResult<()> {
        let mut tx = self.pool().begin().await?;
        refresh_session_totals_tx(&mut tx, session_id).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Mark sessions idle since before `now - idle_secs` as closed, and the
    /// rest as active. Returns how many sessions are closed afterwards.
    pub async fn close_idle_sessions(&self, now: i64, idle_secs: i64) -> DbResult<u64> {
        let cutoff = now - idle_secs;
        let mut tx = self.pool().begin().await?;
        sqlx::query(
            "UPDATE sessions SET status = 'closed' WHERE end_time < ?1 AND status != 'closed'",
        )
            .bind(cutoff)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "UPDATE sessions SET status = 'active' WHERE end_time >= ?1 AND status != 'active'",
        )
            .bind(cutoff)
            .execute(&mut *tx)
            .await?;
        let (closed,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM sessions WHERE status = 'closed'")
                .fetch_one(&mut *tx)
                .await?;
        tx.commit().await?;
        Ok(closed as u64)
    }

    /// Sessions most recently active first.
    pub async fn list_sessions(&self, limit: i64, offset: i64) -> DbResult<SessionsPage> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM sessions \
             ORDER BY end_time DESC, id ASC LIMIT ?1 OFFSET ?2"
        );
        let rows = sqlx::query(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool())
            .await?;
        let sessions = rows
            .iter()
            .map(session_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sessions")
            .fetch_one(self.pool())
            .await?;

        Ok(SessionsPage {
            sessions,
            total: total as usize,
        })
    }

    pub async fn get_session(&self, session_id: &str) -> DbResult<Option<SessionSummary>> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(session_id)
            .fetch_optional(self.pool())
            .await?;
        Ok(row.as_ref().map(session_from_row).transpose()?)
    }

    pub async fn count_active_sessions(&self) -> DbResult<u64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM sessions WHERE status = 'active'")
                .fetch_one(self.pool())
                .await?;
        Ok(count as u64)
    }
}
