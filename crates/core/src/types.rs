// crates/core/src/types.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use ts_rs::TS;

/// Length of one usage window in seconds (5 hours).
pub const WINDOW_SECONDS: i64 = 5 * 60 * 60;

// ============================================================================
// Source log records (ephemeral)
// ============================================================================

/// One conversational record decoded from a JSONL line.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub uuid: String,
    pub parent_uuid: Option<String>,
    pub session_id: String,
    pub cwd: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub is_sidechain: bool,
    /// Top-level `type` of the record (`user`, `assistant`, `system`, ...).
    pub entry_type: String,
    pub user_type: Option<String>,
    pub message: Option<MessagePayload>,
    pub request_id: Option<String>,
}

impl LogEntry {
    /// Token usage of this record, zeroed when the record carries none.
    pub fn usage(&self) -> Usage {
        self.message
            .as_ref()
            .and_then(|m| m.usage.clone())
            .unwrap_or_default()
    }

    /// Content flattened to its stored text form.
    pub fn content_text(&self) -> Option<String> {
        self.message
            .as_ref()
            .and_then(|m| m.content.as_ref())
            .map(MessageContent::canonical_text)
    }
}

/// The `message` object of a log record.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct MessagePayload {
    #[serde(rename = "type", default)]
    pub message_type: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub content: Option<MessageContent>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

/// Message content as it appears in the source: a plain string, an array of
/// content blocks, or a structured object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<serde_json::Value>),
    Object(serde_json::Map<String, serde_json::Value>),
    Other(serde_json::Value),
}

impl MessageContent {
    /// Text stored for this content.
    ///
    /// Strings are kept verbatim. Structured content is serialized back to
    /// compact JSON; object keys come out sorted, so equal content always
    /// produces equal text.
    pub fn canonical_text(&self) -> String {
        match self {
            MessageContent::Text(s) => s.clone(),
            MessageContent::Blocks(blocks) => {
                serde_json::to_string(blocks).unwrap_or_else(|_| "[]".to_string())
            }
            MessageContent::Object(map) => {
                serde_json::to_string(map).unwrap_or_else(|_| "{}".to_string())
            }
            MessageContent::Other(value) => value.to_string(),
        }
    }
}

/// Token usage sub-record of an assistant message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Usage {
    #[serde(deserialize_with = "null_as_zero")]
    pub input_tokens: u64,
    #[serde(deserialize_with = "null_as_zero")]
    pub output_tokens: u64,
    #[serde(deserialize_with = "null_as_zero")]
    pub cache_creation_input_tokens: u64,
    #[serde(deserialize_with = "null_as_zero")]
    pub cache_read_input_tokens: u64,
    pub service_tier: Option<String>,
}

impl Usage {
    /// Input + output tokens, the quantity counted against plan limits.
    pub fn billable(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

fn null_as_zero<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<u64>::deserialize(deserializer)?.unwrap_or(0))
}

// ============================================================================
// Stored projections (shared with the serving layer)
// ============================================================================

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../bindings/"))]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Closed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Closed => "closed",
        }
    }

    /// Unknown values read back from the store are treated as active.
    pub fn from_db(s: &str) -> Self {
        match s {
            "closed" => SessionStatus::Closed,
            _ => SessionStatus::Active,
        }
    }
}

/// Session summary row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../bindings/"))]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: String,
    pub project_name: String,
    pub project_path: String,
    #[ts(type = "number")]
    pub start_time: i64,
    #[ts(type = "number")]
    pub end_time: i64,
    #[ts(type = "number")]
    pub duration_seconds: i64,
    #[ts(type = "number")]
    pub total_input_tokens: i64,
    #[ts(type = "number")]
    pub total_output_tokens: i64,
    #[ts(type = "number")]
    pub total_cache_creation_tokens: i64,
    #[ts(type = "number")]
    pub total_cache_read_tokens: i64,
    #[ts(type = "number")]
    pub total_tokens: i64,
    #[ts(type = "number")]
    pub message_count: i64,
    pub status: SessionStatus,
}

/// A normalized message as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../bindings/"))]
#[serde(rename_all = "camelCase")]
pub struct StoredMessage {
    pub id: String,
    pub session_id: String,
    #[ts(type = "number | null")]
    pub session_window_id: Option<i64>,
    pub parent_uuid: Option<String>,
    pub is_sidechain: bool,
    pub user_type: Option<String>,
    pub message_type: Option<String>,
    pub message_role: Option<String>,
    pub model: Option<String>,
    pub content: Option<String>,
    #[ts(type = "number")]
    pub input_tokens: i64,
    #[ts(type = "number")]
    pub cache_creation_input_tokens: i64,
    #[ts(type = "number")]
    pub cache_read_input_tokens: i64,
    #[ts(type = "number")]
    pub output_tokens: i64,
    pub service_tier: Option<String>,
    pub request_id: Option<String>,
    #[ts(type = "number")]
    pub timestamp: i64,
}

impl StoredMessage {
    /// Normalize a parsed entry. The window is assigned later.
    pub fn from_entry(entry: &LogEntry) -> Self {
        let usage = entry.usage();
        let message = entry.message.as_ref();
        Self {
            id: entry.uuid.clone(),
            session_id: entry.session_id.clone(),
            session_window_id: None,
            parent_uuid: entry.parent_uuid.clone(),
            is_sidechain: entry.is_sidechain,
            user_type: entry.user_type.clone(),
            message_type: message.and_then(|m| m.message_type.clone()),
            message_role: message.and_then(|m| m.role.clone()),
            model: message.and_then(|m| m.model.clone()),
            content: entry.content_text(),
            input_tokens: usage.input_tokens as i64,
            cache_creation_input_tokens: usage.cache_creation_input_tokens as i64,
            cache_read_input_tokens: usage.cache_read_input_tokens as i64,
            output_tokens: usage.output_tokens as i64,
            service_tier: usage.service_tier,
            request_id: entry.request_id.clone(),
            timestamp: entry.timestamp.timestamp(),
        }
    }
}

/// A fixed-length usage window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../bindings/"))]
#[serde(rename_all = "camelCase")]
pub struct SessionWindow {
    #[ts(type = "number")]
    pub id: i64,
    #[ts(type = "number")]
    pub window_start: i64,
    #[ts(type = "number")]
    pub window_end: i64,
    #[ts(type = "number")]
    pub reset_time: i64,
    #[ts(type = "number")]
    pub total_input_tokens: i64,
    #[ts(type = "number")]
    pub total_output_tokens: i64,
    #[ts(type = "number")]
    pub total_tokens: i64,
    #[ts(type = "number")]
    pub message_count: i64,
    #[ts(type = "number")]
    pub session_count: i64,
    pub is_active: bool,
}

impl SessionWindow {
    /// Whether `ts` falls in `[window_start, window_end)`.
    pub fn contains(&self, ts: i64) -> bool {
        self.window_start <= ts && ts < self.window_end
    }
}

/// A page of sessions, most recent first.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../bindings/"))]
#[serde(rename_all = "camelCase")]
pub struct SessionsPage {
    pub sessions: Vec<SessionSummary>,
    pub total: usize,
}

/// A page of one session's messages in timestamp order.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../bindings/"))]
#[serde(rename_all = "camelCase")]
pub struct MessagesPage {
    pub messages: Vec<StoredMessage>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}
