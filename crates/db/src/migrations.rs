/// Inline SQL migrations for the claude-ledger database schema.
///
/// One statement per entry. All times are unix seconds.

pub const MIGRATIONS: &[&str] = &[
    // Migration 1: sessions
    r#"
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    project_name TEXT NOT NULL,
    project_path TEXT NOT NULL,
    start_time INTEGER NOT NULL,
    end_time INTEGER NOT NULL,
    duration_seconds INTEGER NOT NULL DEFAULT 0,
    total_input_tokens INTEGER NOT NULL DEFAULT 0,
    total_output_tokens INTEGER NOT NULL DEFAULT 0,
    total_cache_creation_tokens INTEGER NOT NULL DEFAULT 0,
    total_cache_read_tokens INTEGER NOT NULL DEFAULT 0,
    total_tokens INTEGER NOT NULL DEFAULT 0,
    message_count INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'active',
    created_at INTEGER NOT NULL
);
"#,
    // Migration 2: usage windows
    r#"
CREATE TABLE IF NOT EXISTS session_windows (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    window_start INTEGER NOT NULL,
    window_end INTEGER NOT NULL,
    reset_time INTEGER NOT NULL,
    total_input_tokens INTEGER NOT NULL DEFAULT 0,
    total_output_tokens INTEGER NOT NULL DEFAULT 0,
    total_tokens INTEGER NOT NULL DEFAULT 0,
    message_count INTEGER NOT NULL DEFAULT 0,
    session_count INTEGER NOT NULL DEFAULT 0,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
"#,
    // Migration 3: messages
    r#"
CREATE TABLE IF NOT EXISTS messages (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL REFERENCES sessions(id),
    session_window_id INTEGER REFERENCES session_windows(id),
    parent_uuid TEXT,
    is_sidechain INTEGER NOT NULL DEFAULT 0,
    user_type TEXT,
    message_type TEXT,
    message_role TEXT,
    model TEXT,
    content TEXT,
    input_tokens INTEGER NOT NULL DEFAULT 0,
    cache_creation_input_tokens INTEGER NOT NULL DEFAULT 0,
    cache_read_input_tokens INTEGER NOT NULL DEFAULT 0,
    output_tokens INTEGER NOT NULL DEFAULT 0,
    service_tier TEXT,
    request_id TEXT,
    timestamp INTEGER NOT NULL,
    created_at INTEGER NOT NULL
);
"#,
    // Migration 4: per-file sync fingerprints
    r#"
CREATE TABLE IF NOT EXISTS sync_state (
    file_path TEXT PRIMARY KEY,
    file_size INTEGER NOT NULL,
    modified_at INTEGER NOT NULL,
    processed_offset INTEGER NOT NULL DEFAULT 0,
    lines_processed INTEGER NOT NULL DEFAULT 0,
    lines_failed INTEGER NOT NULL DEFAULT 0,
    synced_at INTEGER NOT NULL
);
"#,
    // Migration 5+: indexes
    r#"CREATE INDEX IF NOT EXISTS idx_messages_session ON messages(session_id, timestamp);"#,
    r#"CREATE INDEX IF NOT EXISTS idx_messages_window ON messages(session_window_id);"#,
    r#"CREATE INDEX IF NOT EXISTS idx_messages_timestamp ON messages(timestamp);"#,
    r#"CREATE INDEX IF NOT EXISTS idx_sessions_end_time ON sessions(end_time DESC);"#,
    r#"CREATE INDEX IF NOT EXISTS idx_sessions_status ON sessions(status);"#,
    r#"CREATE INDEX IF NOT EXISTS idx_windows_start ON session_windows(window_start);"#,
    // Migration 11: files whose last sync left a record unstored
    r#"ALTER TABLE sync_state ADD COLUMN retry_pending INTEGER NOT NULL DEFAULT 0;"#,
];
