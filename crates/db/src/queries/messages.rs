// crates/db/src/queries/messages.rs
// Message writes and the per-record ingest transaction.

use super::sessions::{refresh_session_totals_tx, upsert_session_tx};
use super::windows::{assign_window_tx, recompute_window_stats_tx};
use crate::{Database, DbResult};
use chrono::Utc;
use claude_ledger_core::{resolve_project, LogEntry, MessagesPage, StoredMessage};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

fn message_from_row(row: &SqliteRow) -> Result<StoredMessage, sqlx::Error> {
    Ok(StoredMessage {
        id: row.try_get("id")?,
        session_id: row.try_get("session_id")?,
        session_window_id: row.try_get("session_window_id")?,
        parent_uuid: row.try_get("parent_uuid")?,
        is_sidechain: row.try_get("is_sidechain")?,
        user_type: row.try_get("user_type")?,
        message_type: row.try_get("message_type")?,
        message_role: row.try_get("message_role")?,
        model: row.try_get("model")?,
        content: row.try_get("content")?,
        input_tokens: row.try_get("input_tokens")?,
        cache_creation_input_tokens: row.try_get("cache_creation_input_tokens")?,
        cache_read_input_tokens: row.try_get("cache_read_input_tokens")?,
        output_tokens: row.try_get("output_tokens")?,
        service_tier: row.try_get("service_tier")?,
        request_id: row.try_get("request_id")?,
        timestamp: row.try_get("timestamp")?,
    })
}

/// Insert or overwrite a message by id.
pub(crate) async fn upsert_message_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    msg: &StoredMessage,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO messages (
            id, session_id, session_window_id, parent_uuid, is_sidechain,
            user_type, message_type, message_role, model, content,
            input_tokens, cache_creation_input_tokens, cache_read_input_tokens, output_tokens,
            service_tier, request_id, timestamp, created_at
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5,
            ?6, ?7, ?8, ?9, ?10,
            ?11, ?12, ?13, ?14,
            ?15, ?16, ?17, ?18
        )
        ON CONFLICT(id) DO UPDATE SET
            session_id = excluded.session_id,
            session_window_id = excluded.session_window_id,
            parent_uuid = excluded.parent_uuid,
            is_sidechain = excluded.is_sidechain,
            user_type = excluded.user_type,
            message_type = excluded.message_type,
            message_role = excluded.message_role,
            model = excluded.model,
            content = excluded.content,
            input_tokens = excluded.input_tokens,
            cache_creation_input_tokens = excluded.cache_creation_input_tokens,
            cache_read_input_tokens = excluded.cache_read_input_tokens,
            output_tokens = excluded.output_tokens,
            service_tier = excluded.service_tier,
            request_id = excluded.request_id,
            timestamp = excluded.timestamp
        "#,
    )
    .bind(&msg.id)
    .bind(&msg.session_id)
    .bind(msg.session_window_id)
    .bind(&msg.parent_uuid)
    .bind(msg.is_sidechain)
    .bind(&msg.user_type)
    .bind(&msg.message_type)
    .bind(&msg.message_role)
    .bind(&msg.model)
    .bind(&msg.content)
    .bind(msg.input_tokens)
    .bind(msg.cache_creation_input_tokens)
    .bind(msg.cache_read_input_tokens)
    .bind(msg.output_tokens)
    .bind(&msg.service_tier)
    .bind(&msg.request_id)
    .bind(msg.timestamp)
    .bind(Utc::now().timestamp())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

impl Database {
    /// Store one parsed entry with its session and window bookkeeping.
    ///
    /// Runs in a single transaction: session upsert, window assignment,
    /// message upsert, then aggregate recompute for every window and session
    /// the message touches (old and new, if it moved). Returns the window id.
    pub async fn store_entry(&self, entry: &LogEntry, project_dir: &str) -> DbResult<i64> {
        let project = resolve_project(entry.cwd.as_deref(), project_dir);
        let mut msg = StoredMessage::from_entry(entry);

        let mut tx = self.pool().begin().await?;

        upsert_session_tx(&mut tx, &msg.session_id, &project, msg.timestamp).await?;

        let previous: Option<(String, Option<i64>)> =
            sqlx::query_as("SELECT session_id, session_window_id FROM messages WHERE id = ?1")
                .bind(&msg.id)
                .fetch_optional(&mut *tx)
                .await?;

        let window_id = assign_window_tx(&mut tx, msg.timestamp).await?;
        msg.session_window_id = Some(window_id);
        upsert_message_tx(&mut tx, &msg).await?;

        recompute_window_stats_tx(&mut tx, window_id).await?;
        refresh_session_totals_tx(&mut tx, &msg.session_id).await?;

        if let Some((old_session, old_window)) = previous {
            if let Some(old_window) = old_window.filter(|w| *w != window_id) {
                recompute_window_stats_tx(&mut tx, old_window).await?;
            }
            if old_session != msg.session_id {
                refresh_session_totals_tx(&mut tx, &old_session).await?;
            }
        }

        tx.commit().await?;
        Ok(window_id)
    }

    /// One session's messages in timestamp order.
    pub async fn list_session_messages(
        &self,
        session_id: &str,
        limit: i64,
        offset: i64,
    ) -> DbResult<MessagesPage> {
        let rows = sqlx::query(
            r#"
            SELECT id, session_id, session_window_id, parent_uuid, is_sidechain,
                   user_type, message_type, message_role, model, content,
                   input_tokens, cache_creation_input_tokens, cache_read_input_tokens,
                   output_tokens, service_tier, request_id, timestamp
            FROM messages
            WHERE session_id = ?1
            ORDER BY timestamp ASC, id ASC
            LIMIT ?2 OFFSET ?3
            "#,
        )
        .bind(session_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool())
        .await?;
        let messages = rows
            .iter()
            .map(message_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages WHERE session_id = ?1")
            .bind(session_id)
            .fetch_one(self.pool())
            .await?;

        Ok(MessagesPage {
            messages,
            total: total as usize,
            limit: limit.max(0) as usize,
            offset: offset.max(0) as usize,
        })
    }

    pub async fn count_messages(&self) -> DbResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages")
            .fetch_one(self.pool())
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claude_ledger_core::{parse_line, ParsedLine, WINDOW_SECONDS};

    fn entry(uuid: &str, session: &str, ts: &str, input: u64, output: u64) -> LogEntry {
        let line = format!(
            r#"{{"type":"assistant","uuid":"{uuid}","sessionId":"{session}","cwd":"/home/u/proj/backend","timestamp":"{ts}","message":{{"role":"assistant","content":"ok","usage":{{"input_tokens":{input},"output_tokens":{output}}}}}}}"#
        );
        match parse_line(&line).unwrap() {
            ParsedLine::Entry(e) => e,
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_store_entry_updates_aggregates() {
        let db = Database::new_in_memory().await.unwrap();
        let w = db
            .store_entry(
                &entry("m1", "s1", "2025-01-15T10:00:00Z", 100, 50),
                "-home-u-proj-backend",
            )
            .await
            .unwrap();
        db.store_entry(&entry("m2", "s1", "2025-01-15T10:10:00Z", 20, 5), "-home-u-proj-backend")
            .await
            .unwrap();

        let session = db.get_session("s1").await.unwrap().unwrap();
        assert_eq!(session.project_name, "proj");
        assert_eq!(session.total_tokens, 175);
        assert_eq!(session.message_count, 2);
        assert_eq!(session.duration_seconds, 600);

        let window = db.get_window(w).await.unwrap().unwrap();
        assert_eq!(window.total_tokens, 175);
        assert_eq!(window.total_input_tokens, 120);
        assert_eq!(window.message_count, 2);
        assert_eq!(window.session_count, 1);
        assert_eq!(window.window_end - window.window_start, WINDOW_SECONDS);
    }

    #[tokio::test]
    async fn test_store_entry_is_idempotent() {
        let db = Database::new_in_memory().await.unwrap();
        let e = entry("m1", "s1", "2025-01-15T10:00:00Z", 100, 50);
        let w1 = db.store_entry(&e, "-p").await.unwrap();
        let w2 = db.store_entry(&e, "-p").await.unwrap();
        assert_eq!(w1, w2);
        assert_eq!(db.count_messages().await.unwrap(), 1);
        assert_eq!(db.get_window(w1).await.unwrap().unwrap().total_tokens, 150);
        assert_eq!(db.get_session("s1").await.unwrap().unwrap().message_count, 1);
    }

    #[tokio::test]
    async fn test_moved_message_recomputes_old_owners() {
        let db = Database::new_in_memory().await.unwrap();
        let old_w = db
            .store_entry(&entry("m1", "s1", "2025-01-15T10:00:00Z", 100, 50), "-p")
            .await
            .unwrap();
        // Same uuid, different session and a timestamp in a later window.
        let new_w = db
            .store_entry(&entry("m1", "s2", "2025-01-15T20:00:00Z", 1, 1), "-p")
            .await
            .unwrap();
        assert_ne!(old_w, new_w);

        let old = db.get_window(old_w).await.unwrap().unwrap();
        assert_eq!(old.total_tokens, 0);
        assert_eq!(old.message_count, 0);
        assert_eq!(db.get_session("s1").await.unwrap().unwrap().total_tokens, 0);
        assert_eq!(db.get_session("s2").await.unwrap().unwrap().total_tokens, 2);
    }

    #[tokio::test]
    async fn test_moved_message_shrinks_old_session_bounds() {
        let db = Database::new_in_memory().await.unwrap();
        db.store_entry(&entry("m1", "s1", "2025-01-15T10:00:00Z", 1, 1), "-p")
            .await
            .unwrap();
        db.store_entry(&entry("m2", "s1", "2025-01-15T11:00:00Z", 1, 1), "-p")
            .await
            .unwrap();
        assert_eq!(db.get_session("s1").await.unwrap().unwrap().duration_seconds, 3600);

        db.store_entry(&entry("m2", "s2", "2025-01-15T11:00:00Z", 1, 1), "-p")
            .await
            .unwrap();

        let old = db.get_session("s1").await.unwrap().unwrap();
        assert_eq!(old.end_time, old.start_time);
        assert_eq!(old.duration_seconds, 0);
        assert_eq!(old.message_count, 1);
        let new = db.get_session("s2").await.unwrap().unwrap();
        assert_eq!(new.start_time, new.end_time);
    }

    #[tokio::test]
    async fn test_recompute_repairs_drifted_aggregates() {
        let db = Database::new_in_memory().await.unwrap();
        let w = db
            .store_entry(&entry("m1", "s1", "2025-01-15T10:00:00Z", 30, 10), "-p")
            .await
            .unwrap();
        sqlx::query("UPDATE sessions SET total_tokens = 0, message_count = 9")
            .execute(db.pool())
            .await
            .unwrap();
        sqlx::query("UPDATE session_windows SET total_tokens = 0, message_count = 9")
            .execute(db.pool())
            .await
            .unwrap();

        db.refresh_session_totals("s1").await.unwrap();
        db.recompute_window_stats(w).await.unwrap();

        let session = db.get_session("s1").await.unwrap().unwrap();
        assert_eq!((session.total_tokens, session.message_count), (40, 1));
        let window = db.get_window(w).await.unwrap().unwrap();
        assert_eq!((window.total_tokens, window.message_count), (40, 1));
    }

    #[tokio::test]
    async fn test_list_session_messages_paginates() {
        let db = Database::new_in_memory().await.unwrap();
        for (i, ts) in ["10:02", "10:00", "10:01"].iter().enumerate() {
            let e = entry(&format!("m{i}"), "s1", &format!("2025-01-15T{ts}:00Z"), 1, 1);
            db.store_entry(&e, "-p").await.unwrap();
        }

        let page = db.list_session_messages("s1", 2, 0).await.unwrap();
        assert_eq!(page.total, 3);
        let ids: Vec<&str> = page.messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2"]);
        assert_eq!(page.messages[0].content.as_deref(), Some("ok"));
        assert!(page.messages[0].session_window_id.is_some());

        let page = db.list_session_messages("s1", 2, 2).await.unwrap();
        assert_eq!(page.messages.len(), 1);
        assert_eq!(page.messages[0].id, "m0");
        assert_eq!(page.offset, 2);
    }
}
