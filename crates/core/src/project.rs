// crates/core/src/project.rs
//! Project naming for sessions.
//!
//! A session's project comes from the working directory recorded in its log
//! lines. When a record carries no `cwd`, the encoded directory name the log
//! file lives under is decoded instead (`-Users-foo-app` → `/Users/foo/app`).

/// Directory names too generic to identify a project on their own.
pub const GENERIC_SUBDIRS: &[&str] = &["frontend", "backend", "src", "lib"];

const UNKNOWN_PROJECT: &str = "unknown";

/// Display name and path of the project a session belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRef {
    pub name: String,
    pub path: String,
}

/// Resolve a session's project from the record's `cwd`, falling back to the
/// encoded directory name of its log file.
pub fn resolve_project(cwd: Option<&str>, project_dir: &str) -> ProjectRef {
    match cwd.map(str::trim).filter(|c| !c.is_empty()) {
        Some(cwd) => ProjectRef {
            name: project_name_from_cwd(cwd),
            path: cwd.to_string(),
        },
        None => ProjectRef {
            name: project_dir.to_string(),
            path: decode_project_dir(project_dir),
        },
    }
}

/// Derive a display name from an absolute working directory.
///
/// The deepest path segment names the project, unless it is one of
/// [`GENERIC_SUBDIRS`]; then the nearest non-generic ancestor is used.
/// A path made only of generic segments keeps its deepest one.
pub fn project_name_from_cwd(cwd: &str) -> String {
    let segments: Vec<&str> = cwd
        .split(['/', '\\'])
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .collect();

    let Some(&deepest) = segments.last() else {
        return UNKNOWN_PROJECT.to_string();
    };

    if !is_generic(deepest) {
        return deepest.to_string();
    }

    segments
        .iter()
        .rev()
        .skip(1)
        .find(|s| !is_generic(s))
        .unwrap_or(&deepest)
        .to_string()
}

/// Decode a projects-directory entry name into the path it stands for.
///
/// Names start with `-` and use `-` for every separator. The decoding is
/// lossy: hyphens that were part of a real directory name also become `/`.
/// Names without the leading `-` are returned unchanged.
pub fn decode_project_dir(encoded: &str) -> String {
    if encoded.starts_with('-') {
        encoded.replace('-', "/")
    } else {
        encoded.to_string()
    }
}

fn is_generic(segment: &str) -> bool {
    GENERIC_SUBDIRS.contains(&segment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_is_deepest_segment() {
        assert_eq!(project_name_from_cwd("/home/u/code/myproj"), "myproj");
        assert_eq!(project_name_from_cwd("/home/u/code/myproj/"), "myproj");
    }

    #[test]
    fn test_generic_leaf_walks_to_parent() {
        assert_eq!(project_name_from_cwd("/home/u/code/myproj/backend"), "myproj");
        assert_eq!(project_name_from_cwd("/home/u/app/frontend/src"), "app");
        assert_eq!(project_name_from_cwd("/work/tool/src/lib"), "tool");
    }

    #[test]
    fn test_all_generic_keeps_deepest() {
        assert_eq!(project_name_from_cwd("/src/lib"), "lib");
        assert_eq!(project_name_from_cwd("/backend"), "backend");
    }

    #[test]
    fn test_generic_only_checked_at_leaf() {
        // A generic ancestor does not matter once the leaf is meaningful.
        assert_eq!(project_name_from_cwd("/home/u/src/widgets"), "widgets");
    }

    #[test]
    fn test_empty_and_dot_segments() {
        assert_eq!(project_name_from_cwd(""), "unknown");
        assert_eq!(project_name_from_cwd("/"), "unknown");
        assert_eq!(project_name_from_cwd("/./.."), "unknown");
        assert_eq!(project_name_from_cwd("/home/u/proj/./src"), "proj");
    }

    #[test]
    fn test_windows_separators() {
        assert_eq!(project_name_from_cwd(r"C:\Users\u\game\backend"), "game");
    }

    #[test]
    fn test_decode_project_dir() {
        assert_eq!(decode_project_dir("-Users-foo-app"), "/Users/foo/app");
        assert_eq!(decode_project_dir("-a-b-c"), "/a/b/c");
        assert_eq!(decode_project_dir("plain"), "plain");
    }

    #[test]
    fn test_resolve_prefers_cwd() {
        let p = resolve_project(
            Some("/home/u/code/myproj/backend"),
            "-home-u-code-myproj-backend",
        );
        assert_eq!(p.name, "myproj");
        assert_eq!(p.path, "/home/u/code/myproj/backend");
    }

    #[test]
    fn test_resolve_falls_back_to_dir_name() {
        let p = resolve_project(None, "-Users-foo-app");
        assert_eq!(p.name, "-Users-foo-app");
        assert_eq!(p.path, "/Users/foo/app");

        let p = resolve_project(Some("   "), "-x");
        assert_eq!(p.path, "/x");
    }
}
