//! Default storage locations.

use crate::error::DiscoveryError;
use std::path::PathBuf;

/// Claude projects directory: `~/.claude/projects`.
pub fn claude_projects_dir() -> Result<PathBuf, DiscoveryError> {
    let home = dirs::home_dir().ok_or(DiscoveryError::HomeDirNotFound)?;
    Ok(home.join(".claude").join("projects"))
}

/// App cache root: `~/Library/Caches/claude-ledger/` (macOS) or `~/.cache/claude-ledger/` (Linux).
pub fn app_cache_dir() -> Option<PathBuf> {
    dirs::cache_dir().map(|d| d.join("claude-ledger"))
}

/// SQLite database file: `<app_cache_dir>/ledger.db`.
pub fn db_path() -> Option<PathBuf> {
    app_cache_dir().map(|d| d.join("ledger.db"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claude_projects_dir() {
        let dir = claude_projects_dir().unwrap();
        assert!(dir.ends_with(".claude/projects"));
    }

    #[test]
    fn test_db_path() {
        let path = db_path();
        assert!(path.is_some());
        let path = path.unwrap();
        assert!(path.to_string_lossy().ends_with("ledger.db"));
        assert!(path.to_string_lossy().contains("claude-ledger"));
    }
}
