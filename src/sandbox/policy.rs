use serde::{Deserialize, Serialize};
use std::path::{Component, Path};

/// Directory names whose entire subtree is off limits.
pub const DENIED_DIRS: &[&str] = &[".git", "node_modules", "output"];

/// Basenames denied outright, and the prefixes (`<name>.`) derived from them.
const DENIED_BASENAMES: &[&str] = &[".env", "id_rsa"];

/// Secret-bearing extensions.
const DENIED_SUFFIXES: &[&str] = &[".pem", ".key"];

/// Outcome of checking a root-relative path against the deny list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenialVerdict {
    pub denied: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl DenialVerdict {
    fn allowed() -> Self {
        Self {
            denied: false,
            reason: None,
        }
    }

    fn denied(reason: String) -> Self {
        Self {
            denied: true,
            reason: Some(reason),
        }
    }
}

/// Normalize platform separators to `/`.
pub fn to_posix(path: &str) -> String {
    path.replace('\\', "/")
}

/// Classify a root-relative path.
///
/// Pure string matching on POSIX segments; no filesystem access.
///
/// ```
/// use repo_scout::sandbox::policy::check_path;
///
/// assert!(check_path("src/.env.local").denied);
/// assert!(check_path("node_modules/left-pad/index.js").denied);
/// assert!(!check_path("src/main.rs").denied);
/// ```
pub fn check_path(relative: &str) -> DenialVerdict {
    let posix = to_posix(relative);
    let segments: Vec<&str> = posix.split('/').filter(|s| !s.is_empty()).collect();

    if let Some(dir) = segments.iter().find(|s| DENIED_DIRS.contains(s)) {
        return DenialVerdict::denied(format!("Denied directory: {}", dir));
    }

    let Some(basename) = segments.last() else {
        return DenialVerdict::allowed();
    };

    let blocked_name = DENIED_BASENAMES
        .iter()
        .any(|name| basename == name || basename.starts_with(&format!("{}.", name)));
    let blocked_suffix = DENIED_SUFFIXES.iter().any(|ext| basename.ends_with(ext));

    if blocked_name || blocked_suffix {
        DenialVerdict::denied(format!("Denied file: {}", basename))
    } else {
        DenialVerdict::allowed()
    }
}

pub fn is_denied(relative: &str) -> bool {
    check_path(relative).denied
}

/// True if a root-relative path points outside the root.
///
/// Covers a leading `..`, any `..` segment, and absolute paths (which
/// [`super::resolve::relative_path`] yields when there is no common prefix).
pub fn escapes_root(relative: &Path) -> bool {
    relative.is_absolute()
        || relative.has_root()
        || relative.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        })
}
