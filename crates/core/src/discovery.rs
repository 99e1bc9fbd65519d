// crates/core/src/discovery.rs
//! Discovery of JSONL log files under the Claude projects directory.
//!
//! Expects the structure:
//! ```text
//! projects_dir/
//!   <encoded-project-dir>/
//!     <session-id>.jsonl
//! ```

use crate::error::DiscoveryError;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// A discovered `.jsonl` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub path: PathBuf,
    /// File size in bytes.
    pub size: u64,
    /// Last modification time as Unix timestamp (seconds).
    pub modified_at: i64,
    /// Encoded project directory name (e.g., "-Users-foo-project-a").
    pub project_dir: String,
}

/// Result of scanning the projects directory.
#[derive(Debug, Default)]
pub struct ScanResult {
    /// Sorted by path.
    pub files: Vec<FileInfo>,
    pub project_count: usize,
    pub total_size: u64,
}

/// Scan `projects_dir` for log files, one directory level deep.
///
/// A missing or unreadable root is an error. Unreadable project directories
/// and files are skipped.
pub async fn scan_projects(projects_dir: &Path) -> Result<ScanResult, DiscoveryError> {
    let root_meta = fs::metadata(projects_dir)
        .await
        .map_err(|e| DiscoveryError::io(projects_dir, e))?;
    if !root_meta.is_dir() {
        return Err(DiscoveryError::NotADirectory {
            path: projects_dir.to_path_buf(),
        });
    }

    let mut entries = fs::read_dir(projects_dir)
        .await
        .map_err(|e| DiscoveryError::io(projects_dir, e))?;

    let mut result = ScanResult::default();
    let mut project_dirs = HashSet::new();

    while let Some(project_entry) = entries
        .next_entry()
        .await
        .map_err(|e| DiscoveryError::io(projects_dir, e))?
    {
        let project_path = project_entry.path();
        match project_entry.file_type().await {
            Ok(ft) if ft.is_dir() => {}
            _ => continue,
        }

        let project_dir = project_entry.file_name().to_string_lossy().to_string();

        let mut session_entries = match fs::read_dir(&project_path).await {
            Ok(e) => e,
            Err(e) => {
                debug!(path = %project_path.display(), error = %e, "Cannot read project dir");
                continue;
            }
        };

        while let Ok(Some(session_entry)) = session_entries.next_entry().await {
            let file_path = session_entry.path();
            if file_path.extension().map(|e| e != "jsonl").unwrap_or(true) {
                continue;
            }

            let metadata = match fs::metadata(&file_path).await {
                Ok(m) if m.is_file() => m,
                _ => continue,
            };

            let modified_at = metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0);

            result.total_size += metadata.len();
            project_dirs.insert(project_dir.clone());
            result.files.push(FileInfo {
                path: file_path,
                size: metadata.len(),
                modified_at,
                project_dir: project_dir.clone(),
            });
        }
    }

    result.files.sort_by(|a, b| a.path.cmp(&b.path));
    result.project_count = project_dirs.len();
    Ok(result)
}
