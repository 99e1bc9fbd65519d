// crates/core/src/error.rs
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when reading a JSONL log file as a whole.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Log file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Permission denied reading file: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors for a single JSONL line. Never fatal for the file it came from.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LineError {
    #[error("Malformed JSON: {message}")]
    Json { message: String },

    #[error("Missing required field `{field}`")]
    MissingField { field: &'static str },

    #[error("Invalid timestamp `{value}`")]
    InvalidTimestamp { value: String },

    #[error("Line exceeds {max} bytes ({len} bytes)")]
    TooLong { len: usize, max: usize },

    #[error("Invalid UTF-8 in line")]
    InvalidUtf8,
}

/// Errors that can occur during project discovery
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Claude projects directory not found: {path}")]
    ProjectsDirNotFound { path: PathBuf },

    #[error("Cannot access Claude projects directory: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("Claude projects path is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    #[error("IO error accessing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Home directory not found")]
    HomeDirNotFound,
}

/// Errors raised while building a [`crate::config::LedgerConfig`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Unknown plan `{0}` (expected pro, max5, max20 or a token count)")]
    UnknownPlan(String),

    #[error("Cache directory not found")]
    NoCacheDir,

    #[error("Home directory not found")]
    NoHomeDir,
}

impl ParseError {
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound { path: path.into() }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            _ => Self::Io { path, source },
        }
    }
}

impl DiscoveryError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::ProjectsDirNotFound { path },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            _ => Self::Io { path, source },
        }
    }
}

impl From<serde_json::Error> for LineError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json {
            message: e.to_string(),
        }
    }
}
