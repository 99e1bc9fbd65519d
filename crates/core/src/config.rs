// crates/core/src/config.rs
use crate::error::ConfigError;
use crate::parser::DEFAULT_MAX_LINE_BYTES;
use crate::paths;
use crate::types::WINDOW_SECONDS;
use crate::usage::Plan;
use std::path::PathBuf;
use std::time::Duration;

/// Everything the ingestion engine needs, resolved up front.
///
/// The engine never looks up home or cache directories itself; callers build
/// this explicitly (tests point it at a temp dir).
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Root holding one directory per project (`~/.claude/projects`).
    pub projects_dir: PathBuf,
    pub db_path: PathBuf,
    pub plan: Plan,
    /// Sessions with no activity for this long are marked closed.
    pub idle_after: Duration,
    pub max_line_bytes: usize,
}

impl LedgerConfig {
    pub fn new(projects_dir: impl Into<PathBuf>, db_path: impl Into<PathBuf>) -> Self {
        Self {
            projects_dir: projects_dir.into(),
            db_path: db_path.into(),
            plan: Plan::default(),
            idle_after: Duration::from_secs(WINDOW_SECONDS as u64),
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }

    /// Config rooted at the user's `~/.claude/projects` and app cache.
    pub fn from_default_paths() -> Result<Self, ConfigError> {
        let projects_dir = paths::claude_projects_dir().map_err(|_| ConfigError::NoHomeDir)?;
        let db_path = paths::db_path().ok_or(ConfigError::NoCacheDir)?;
        Ok(Self::new(projects_dir, db_path))
    }

    pub fn with_plan(mut self, plan: Plan) -> Self {
        self.plan = plan;
        self
    }

    pub fn with_idle_after(mut self, idle_after: Duration) -> Self {
        self.idle_after = idle_after;
        self
    }

    pub fn with_max_line_bytes(mut self, max_line_bytes: usize) -> Self {
        self.max_line_bytes = max_line_bytes;
        self
    }

    /// Idle threshold in whole seconds.
    pub fn idle_after_secs(&self) -> i64 {
        self.idle_after.as_secs() as i64
    }
}
