// crates/core/src/parser.rs
//! Line-level parsing of Claude Code JSONL logs.
//!
//! [`LineReader`] yields raw lines with their byte offsets so a caller can
//! resume a file where it left off. [`parse_line`] turns one line into a
//! [`LogEntry`]. A bad line never fails the file it came from.

use crate::error::{LineError, ParseError};
use crate::types::{LogEntry, MessagePayload};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::io::SeekFrom;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncSeekExt, BufReader};

/// Default upper bound for a single line.
pub const DEFAULT_MAX_LINE_BYTES: usize = 64 * 1024 * 1024;

/// Record types that describe the log itself rather than a conversation turn.
pub const SKIPPED_ENTRY_TYPES: &[&str] = &["summary", "file-history-snapshot", "queue-operation"];

/// Outcome of parsing one non-blank line.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLine {
    Entry(LogEntry),
    /// A well-formed record of a type that carries no message.
    Skipped { entry_type: String },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEntry {
    #[serde(rename = "type")]
    entry_type: Option<String>,
    uuid: Option<String>,
    parent_uuid: Option<String>,
    session_id: Option<String>,
    cwd: Option<String>,
    timestamp: Option<String>,
    is_sidechain: Option<bool>,
    user_type: Option<String>,
    message: Option<MessagePayload>,
    request_id: Option<String>,
}

/// Parse a single JSONL line.
///
/// `uuid`, `sessionId` and an RFC 3339 `timestamp` are required for
/// conversational records. Unknown fields are ignored.
pub fn parse_line(line: &str) -> Result<ParsedLine, LineError> {
    let raw: RawEntry = serde_json::from_str(line.trim())?;

    if let Some(t) = raw.entry_type.as_deref() {
        if SKIPPED_ENTRY_TYPES.contains(&t) {
            return Ok(ParsedLine::Skipped {
                entry_type: t.to_string(),
            });
        }
    }

    let uuid = required(raw.uuid, "uuid")?;
    let session_id = required(raw.session_id, "sessionId")?;
    let ts_raw = required(raw.timestamp, "timestamp")?;
    let timestamp = parse_timestamp(&ts_raw)?;

    Ok(ParsedLine::Entry(LogEntry {
        uuid,
        parent_uuid: raw.parent_uuid,
        session_id,
        cwd: raw.cwd,
        timestamp,
        is_sidechain: raw.is_sidechain.unwrap_or(false),
        entry_type: raw.entry_type.unwrap_or_default(),
        user_type: raw.user_type,
        message: raw.message,
        request_id: raw.request_id,
    }))
}

fn required(value: Option<String>, field: &'static str) -> Result<String, LineError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(LineError::MissingField { field }),
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, LineError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| LineError::InvalidTimestamp {
            value: value.to_string(),
        })
}

// ============================================================================
// LineReader
// ============================================================================

/// One line as read from disk.
#[derive(Debug)]
pub struct RawLine {
    /// 1-based, counted from where the reader started.
    pub number: u64,
    /// Byte offset of the first byte of the line.
    pub start: u64,
    /// Byte offset just past the line, including its newline if any.
    pub end: u64,
    /// False only for a trailing line with no `\n` yet.
    pub terminated: bool,
    /// Line text without its newline, or why it cannot be used.
    pub text: Result<String, LineError>,
}

/// Bounded line reader over an async byte stream.
///
/// Lines longer than `max_line_bytes` are drained without being buffered and
/// reported as [`LineError::TooLong`].
pub struct LineReader<R> {
    inner: R,
    max_line_bytes: usize,
    offset: u64,
    line_number: u64,
    buf: Vec<u8>,
}

impl LineReader<BufReader<File>> {
    /// Open `path` and position the reader at `offset`.
    pub async fn open(path: &Path, offset: u64, max_line_bytes: usize) -> Result<Self, ParseError> {
        let mut file = File::open(path).await.map_err(|e| ParseError::io(path, e))?;
        if offset > 0 {
            file.seek(SeekFrom::Start(offset))
                .await
                .map_err(|e| ParseError::io(path, e))?;
        }
        Ok(Self::new(BufReader::new(file), offset, max_line_bytes))
    }
}

impl<R: AsyncBufRead + Unpin> LineReader<R> {
    /// `offset` is the absolute position `inner` is already at.
    pub fn new(inner: R, offset: u64, max_line_bytes: usize) -> Self {
        Self {
            inner,
            max_line_bytes,
            offset,
            line_number: 0,
            buf: Vec::new(),
        }
    }

    /// Absolute offset of the next unread byte.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Read the next line. `Ok(None)` at end of input.
    pub async fn next_line(&mut self) -> std::io::Result<Option<RawLine>> {
        self.buf.clear();
        let start = self.offset;
        let mut len: usize = 0;
        let mut overflow = false;
        let mut terminated = false;

        loop {
            let available = self.inner.fill_buf().await?;
            if available.is_empty() {
                break;
            }
            let newline = memchr::memchr(b'\n', available);
            let chunk = match newline {
                Some(i) => &available[..i],
                None => available,
            };
            let chunk_len = chunk.len();

            if !overflow {
                if len + chunk_len > self.max_line_bytes {
                    overflow = true;
                    self.buf = Vec::new();
                } else {
                    self.buf.extend_from_slice(chunk);
                }
            }
            len += chunk_len;

            let consumed = chunk_len + usize::from(newline.is_some());
            self.inner.consume(consumed);
            self.offset += consumed as u64;

            if newline.is_some() {
                terminated = true;
                break;
            }
        }

        if !terminated && len == 0 {
            return Ok(None);
        }

        self.line_number += 1;
        let text = if overflow {
            Err(LineError::TooLong {
                len,
                max: self.max_line_bytes,
            })
        } else {
            String::from_utf8(std::mem::take(&mut self.buf)).map_err(|_| LineError::InvalidUtf8)
        };

        Ok(Some(RawLine {
            number: self.line_number,
            start,
            end: self.offset,
            terminated,
            text,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MessageContent;
    use pretty_assertions::assert_eq;

    const ASSISTANT: &str = r#"{"type":"assistant","uuid":"u-1","parentUuid":"u-0","sessionId":"s-1","cwd":"/home/u/proj","timestamp":"2025-01-15T10:00:00.000Z","isSidechain":false,"userType":"external","requestId":"req_1","message":{"type":"message","role":"assistant","model":"claude-sonnet-4","content":[{"type":"text","text":"hi"}],"usage":{"input_tokens":100,"output_tokens":50,"cache_creation_input_tokens":10,"cache_read_input_tokens":5,"service_tier":"standard"}}}"#;

    fn entry(line: &str) -> LogEntry {
        match parse_line(line).unwrap() {
            ParsedLine::Entry(e) => e,
            other => panic!("expected entry, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_assistant_line() {
        let e = entry(ASSISTANT);
        assert_eq!(e.uuid, "u-1");
        assert_eq!(e.parent_uuid.as_deref(), Some("u-0"));
        assert_eq!(e.session_id, "s-1");
        assert_eq!(e.cwd.as_deref(), Some("/home/u/proj"));
        assert_eq!(e.entry_type, "assistant");
        assert_eq!(e.request_id.as_deref(), Some("req_1"));
        assert_eq!(e.timestamp.timestamp(), 1736935200);

        let usage = e.usage();
        assert_eq!(usage.input_tokens, 100);
        assert_eq!(usage.output_tokens, 50);
        assert_eq!(usage.cache_creation_input_tokens, 10);
        assert_eq!(usage.cache_read_input_tokens, 5);
        assert_eq!(usage.service_tier.as_deref(), Some("standard"));

        let msg = e.message.as_ref().unwrap();
        assert_eq!(msg.role.as_deref(), Some("assistant"));
        assert_eq!(msg.model.as_deref(), Some("claude-sonnet-4"));
        assert!(matches!(msg.content, Some(MessageContent::Blocks(_))));
    }

    #[test]
    fn test_parse_user_string_content() {
        let line = r#"{"type":"user","uuid":"u-2","sessionId":"s-1","timestamp":"2025-01-15T10:00:01+02:00","message":{"role":"user","content":"fix the bug"}}"#;
        let e = entry(line);
        assert_eq!(e.content_text().as_deref(), Some("fix the bug"));
        assert_eq!(e.usage().billable(), 0);
        assert!(!e.is_sidechain);
        // Offset timestamps normalize to UTC.
        assert_eq!(e.timestamp.to_rfc3339(), "2025-01-15T08:00:01+00:00");
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let line = r#"{"type":"user","uuid":"u","sessionId":"s","timestamp":"2025-01-15T10:00:00Z","version":"2.0.1","gitBranch":"main","isMeta":true}"#;
        assert!(matches!(parse_line(line), Ok(ParsedLine::Entry(_))));
    }

    #[test]
    fn test_summary_is_skipped() {
        let line = r#"{"type":"summary","summary":"Refactor","leafUuid":"abc"}"#;
        assert_eq!(
            parse_line(line).unwrap(),
            ParsedLine::Skipped {
                entry_type: "summary".to_string()
            }
        );
    }

    #[test]
    fn test_missing_required_fields() {
        let no_uuid = r#"{"type":"user","sessionId":"s","timestamp":"2025-01-15T10:00:00Z"}"#;
        assert_eq!(
            parse_line(no_uuid).unwrap_err(),
            LineError::MissingField { field: "uuid" }
        );

        let empty_session = r#"{"type":"user","uuid":"u","sessionId":"","timestamp":"2025-01-15T10:00:00Z"}"#;
        assert_eq!(
            parse_line(empty_session).unwrap_err(),
            LineError::MissingField { field: "sessionId" }
        );

        let no_ts = r#"{"type":"user","uuid":"u","sessionId":"s"}"#;
        assert_eq!(
            parse_line(no_ts).unwrap_err(),
            LineError::MissingField { field: "timestamp" }
        );
    }

    #[test]
    fn test_invalid_timestamp() {
        let line = r#"{"uuid":"u","sessionId":"s","timestamp":"yesterday"}"#;
        assert!(matches!(
            parse_line(line),
            Err(LineError::InvalidTimestamp { .. })
        ));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(parse_line("{not json"), Err(LineError::Json { .. })));
        assert!(matches!(parse_line("[1,2,3]"), Err(LineError::Json { .. })));
        assert!(matches!(
            parse_line(r#"{"uuid":"u","sessionId":"s","timestamp":"2025-01-15T10:00:00Z""#),
            Err(LineError::Json { .. })
        ));
    }

    async fn collect(input: &[u8], max: usize) -> Vec<RawLine> {
        let mut reader = LineReader::new(BufReader::with_capacity(4, input), 0, max);
        let mut out = Vec::new();
        while let Some(line) = reader.next_line().await.unwrap() {
            out.push(line);
        }
        out
    }

    #[tokio::test]
    async fn test_reader_offsets_and_unterminated_tail() {
        let lines = collect(b"ab\n\ncdef\ngh", 1024).await;
        assert_eq!(lines.len(), 4);

        assert_eq!(lines[0].text.as_deref(), Ok("ab"));
        assert_eq!((lines[0].start, lines[0].end), (0, 3));
        assert!(lines[0].terminated);

        assert_eq!(lines[1].text.as_deref(), Ok(""));
        assert_eq!((lines[1].start, lines[1].end), (3, 4));

        assert_eq!(lines[2].text.as_deref(), Ok("cdef"));
        assert_eq!((lines[2].start, lines[2].end), (4, 9));

        assert_eq!(lines[3].text.as_deref(), Ok("gh"));
        assert_eq!((lines[3].start, lines[3].end), (9, 11));
        assert!(!lines[3].terminated);
        assert_eq!(lines[3].number, 4);
    }

    #[tokio::test]
    async fn test_reader_drains_long_lines() {
        let lines = collect(b"short\nthis-line-is-too-long\nok\n", 8).await;
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].text.as_deref(), Ok("short"));
        assert_eq!(
            lines[1].text,
            Err(LineError::TooLong { len: 21, max: 8 })
        );
        assert_eq!(lines[2].text.as_deref(), Ok("ok"));
        assert_eq!(lines[2].end, 31);
    }

    #[tokio::test]
    async fn test_reader_invalid_utf8() {
        let lines = collect(b"\xff\xfe\nok\n", 1024).await;
        assert_eq!(lines[0].text, Err(LineError::InvalidUtf8));
        assert_eq!(lines[1].text.as_deref(), Ok("ok"));
    }

    #[tokio::test]
    async fn test_open_at_offset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.jsonl");
        std::fs::write(&path, "first\nsecond\n").unwrap();

        let mut reader = LineReader::open(&path, 6, DEFAULT_MAX_LINE_BYTES).await.unwrap();
        let line = reader.next_line().await.unwrap().unwrap();
        assert_eq!(line.text.as_deref(), Ok("second"));
        assert_eq!(line.start, 6);
        assert_eq!(reader.offset(), 13);
        assert!(reader.next_line().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_open_missing_file() {
        let err = LineReader::open(Path::new("/nonexistent/x.jsonl"), 0, 16)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ParseError::NotFound { .. }));
    }
}
