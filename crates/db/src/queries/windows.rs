// crates/db/src/queries/windows.rs
// Window aggregator: assigns timestamps to fixed 5-hour usage windows and
// keeps each window's totals in step with its messages.

use crate::{Database, DbResult};
use chrono::Utc;
use claude_ledger_core::{compute_usage, Plan, SessionWindow, TokenUsage, WINDOW_SECONDS};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::debug;

const WINDOW_COLUMNS: &str = "id, window_start, window_end, reset_time, total_input_tokens, \
     total_output_tokens, total_tokens, message_count, session_count, is_active";

fn window_from_row(row: &SqliteRow) -> Result<SessionWindow, sqlx::Error> {
    Ok(SessionWindow {
        id: row.try_get("id")?,
        window_start: row.try_get("window_start")?,
        window_end: row.try_get("window_end")?,
        reset_time: row.try_get("reset_time")?,
        total_input_tokens: row.try_get("total_input_tokens")?,
        total_output_tokens: row.try_get("total_output_tokens")?,
        total_tokens: row.try_get("total_tokens")?,
        message_count: row.try_get("message_count")?,
        session_count: row.try_get("session_count")?,
        is_active: row.try_get("is_active")?,
    })
}

/// Bounds for a new window holding `ts`, given the nearest stored windows.
///
/// `prev_end` is the end of the latest window starting at or before `ts`;
/// `next_start` the start of the earliest window after it. Neither contains
/// `ts`. The result always contains `ts` and never overlaps a neighbor.
pub(crate) fn new_window_bounds(
    ts: i64,
    prev_end: Option<i64>,
    next_start: Option<i64>,
) -> (i64, i64) {
    let mut start = ts;
    let mut end = ts + WINDOW_SECONDS;

    if let Some(next) = next_start {
        if end > next {
            end = next;
            start = next - WINDOW_SECONDS;
            if let Some(prev) = prev_end {
                // Gap narrower than a window: fill it exactly.
                start = start.max(prev);
            }
        }
    }

    (start, end)
}

/// Return the id of the window containing `ts`, creating one if needed.
///
/// Containment wins over the `is_active` flag.
pub(crate) async fn assign_window_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    ts: i64,
) -> DbResult<i64> {
    let containing: Option<(i64,)> = sqlx::query_as(
        "SELECT id FROM session_windows WHERE window_start <= ?1 AND window_end > ?1 \
         ORDER BY window_start DESC LIMIT 1",
    )
    .bind(ts)
    .fetch_optional(&mut **tx)
    .await?;
    if let Some((id,)) = containing {
        return Ok(id);
    }

    let prev_end: Option<(i64,)> = sqlx::query_as(
        "SELECT window_end FROM session_windows WHERE window_start <= ?1 \
         ORDER BY window_start DESC LIMIT 1",
    )
    .bind(ts)
    .fetch_optional(&mut **tx)
    .await?;
    let next_start: Option<(i64,)> = sqlx::query_as(
        "SELECT window_start FROM session_windows WHERE window_start > ?1 \
         ORDER BY window_start ASC LIMIT 1",
    )
    .bind(ts)
    .fetch_optional(&mut **tx)
    .await?;

    let (start, end) = new_window_bounds(ts, prev_end.map(|r| r.0), next_start.map(|r| r.0));
    let is_active = next_start.is_none();
    let now = Utc::now().timestamp();

    sqlx::query(
        "UPDATE session_windows SET is_active = 0, updated_at = ?2 \
         WHERE window_end <= ?1 AND is_active = 1",
    )
    .bind(start)
    .bind(now)
    .execute(&mut **tx)
    .await?;

    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO session_windows (
            window_start, window_end, reset_time, is_active, created_at, updated_at
        ) VALUES (?1, ?2, ?2, ?3, ?4, ?4)
        RETURNING id
        "#,
    )
    .bind(start)
    .bind(end)
    .bind(is_active)
    .bind(now)
    .fetch_one(&mut **tx)
    .await?;

    debug!(window_id = id, start, end, "Created usage window");
    Ok(id)
}

/// Re-sum a window's totals from the messages assigned to it.
pub(crate) async fn recompute_window_stats_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    window_id: i64,
) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE session_windows SET
            total_input_tokens = agg.input,
            total_output_tokens = agg.output,
            total_tokens = agg.input + agg.output,
            message_count = agg.cnt,
            session_count = agg.sessions,
            updated_at = ?2
        FROM (
            SELECT
                COALESCE(SUM(input_tokens), 0) AS input,
                COALESCE(SUM(output_tokens), 0) AS output,
                COUNT(*) AS cnt,
                COUNT(DISTINCT session_id) AS sessions
            FROM messages WHERE session_window_id = ?1
        ) AS agg
        WHERE session_windows.id = ?1
        "#,
    )
    .bind(window_id)
    .bind(Utc::now().timestamp())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

impl Database {
    /// Window containing `ts` (unix seconds), created if none does.
    pub async fn assign_window(&self, ts: i64) -> DbResult<SessionWindow> {
        let mut tx = self.pool().begin().await?;
        let id = assign_window_tx(&mut tx, ts).await?;
        tx.commit().await?;
        self.get_window(id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
            .map_err(Into::into)
    }

    pub async fn recompute_window_stats(&self, window_id: i64) -> DbResult<()> {
        let mut tx = self.pool().begin().await?;
        recompute_window_stats_tx(&mut tx, window_id).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn get_window(&self, window_id: i64) -> DbResult<Option<SessionWindow>> {
        let sql = format!("SELECT {WINDOW_COLUMNS} FROM session_windows WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(window_id)
            .fetch_optional(self.pool())
            .await?;
        Ok(row.as_ref().map(window_from_row).transpose()?)
    }

    /// Most recent windows first.
    pub async fn list_windows(&self, limit: i64) -> DbResult<Vec<SessionWindow>> {
        let sql = format!(
            "SELECT {WINDOW_COLUMNS} FROM session_windows ORDER BY window_start DESC LIMIT ?1"
        );
        let rows = sqlx::query(&sql).bind(limit).fetch_all(self.pool()).await?;
        Ok(rows
            .iter()
            .map(window_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    pub async fn latest_window(&self) -> DbResult<Option<SessionWindow>> {
        Ok(self.list_windows(1).await?.into_iter().next())
    }

    /// Usage of the latest window against `plan` at `now`. Read-only.
    pub async fn token_usage_snapshot(&self, plan: Plan, now: i64) -> DbResult<TokenUsage> {
        let latest = self.latest_window().await?;
        let active_sessions = self.count_active_sessions().await?;
        Ok(compute_usage(
            plan.token_limit(),
            latest.as_ref(),
            active_sessions,
            now,
        ))
    }
}
