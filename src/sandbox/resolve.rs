//! Root-relative path resolution.
//!
//! Resolution happens in two independent phases:
//!
//! 1. [`resolve_in_root`] is purely lexical. It joins the caller's path onto
//!    the root, collapses `.`/`..`, and rejects anything that lands outside the
//!    root or hits the deny list. It never touches the filesystem.
//! 2. [`ensure_realpath_inside_root`] canonicalizes both the root and the
//!    target and repeats the containment test on the real paths. A path that
//!    is lexically inside the root can still dereference through a symlink to
//!    somewhere else; this is the phase that catches it.
//!
//! Both phases must pass before any read.

use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

use super::policy::{check_path, escapes_root, to_posix};
use crate::error::ToolError;

pub const ESCAPE_REASON: &str = "Path escapes target root";
pub const REALPATH_ESCAPE_REASON: &str = "Path resolves outside target root";

/// A caller path resolved against the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Lexically normalized absolute path.
    pub absolute: PathBuf,
    /// POSIX-style path relative to the root. Never contains `..`.
    pub relative: String,
}

/// Collapse `.` and `..` without consulting the filesystem.
///
/// `..` never climbs above a root or prefix component.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out: Vec<Component> = Vec::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(comp),
            },
            other => out.push(other),
        }
    }
    out.into_iter().collect()
}

/// Relative path leading from `from` to `to`.
///
/// Emits `..` for every component of `from` past the common prefix. When the
/// two paths share nothing (e.g. different drive prefixes) `to` is returned
/// unchanged, which [`escapes_root`] then reports as absolute.
pub fn relative_path(from: &Path, to: &Path) -> PathBuf {
    let from: Vec<Component> = from.components().collect();
    let to_components: Vec<Component> = to.components().collect();

    let common = from
        .iter()
        .zip(to_components.iter())
        .take_while(|(a, b)| a == b)
        .count();

    if common == 0 && !from.is_empty() {
        return to.to_path_buf();
    }

    let mut relative = PathBuf::new();
    for _ in common..from.len() {
        relative.push("..");
    }
    for comp in &to_components[common..] {
        relative.push(comp);
    }
    relative
}

/// Lexically resolve `user_path` beneath `root` and apply the deny list.
pub fn resolve_in_root(tool: &str, root: &Path, user_path: &str) -> Result<ResolvedPath, ToolError> {
    let root = normalize_lexically(root);
    let absolute = normalize_lexically(&root.join(user_path));
    let relative = relative_path(&root, &absolute);

    if escapes_root(&relative) {
        warn!(tool, path = user_path, "Rejected path escaping root");
        return Err(ToolError::denied(tool, user_path, ESCAPE_REASON));
    }

    let relative = to_posix(&relative.to_string_lossy());
    let verdict = check_path(&relative);
    if verdict.denied {
        let reason = verdict.reason.unwrap_or_else(|| "Denied by policy".to_string());
        warn!(tool, path = user_path, %reason, "Rejected denied path");
        return Err(ToolError::denied(tool, user_path, reason));
    }

    debug!(tool, path = %relative, "Resolved path inside root");
    Ok(ResolvedPath { absolute, relative })
}

/// Verify that the symlink-resolved target still lives under the real root.
///
/// A missing target is let through so the subsequent read reports a plain
/// not-found error. The real relative path is re-checked against the deny
/// list as well, so an in-root link cannot alias a denied file.
pub fn ensure_realpath_inside_root(
    tool: &str,
    root: &Path,
    absolute: &Path,
    shown_path: &str,
) -> Result<(), ToolError> {
    let real_target = match std::fs::canonicalize(absolute) {
        Ok(path) => path,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(tool, path = shown_path, "Target missing, skipping realpath check");
            return Ok(());
        }
        Err(e) => {
            return Err(ToolError::fs(
                tool,
                format!("Failed to resolve real path of {}", shown_path),
                e,
            ));
        }
    };
    let real_root = std::fs::canonicalize(root)
        .map_err(|e| ToolError::fs(tool, "Failed to resolve real path of root", e))?;

    let relative = relative_path(&real_root, &real_target);
    if escapes_root(&relative) {
        warn!(
            tool,
            path = shown_path,
            real = %real_target.display(),
            "Rejected path resolving outside root"
        );
        return Err(ToolError::denied(tool, shown_path, REALPATH_ESCAPE_REASON));
    }

    let verdict = check_path(&to_posix(&relative.to_string_lossy()));
    if verdict.denied {
        let reason = verdict.reason.unwrap_or_else(|| "Denied by policy".to_string());
        warn!(tool, path = shown_path, %reason, "Rejected path aliasing a denied file");
        return Err(ToolError::denied(tool, shown_path, reason));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[cfg(unix)]
    const ROOT: &str = "/srv/repo";

    #[test]
    fn normalize_collapses_dots() {
        assert_eq!(
            normalize_lexically(Path::new("/a/./b/../c")),
            PathBuf::from("/a/c")
        );
        assert_eq!(normalize_lexically(Path::new("/../..")), PathBuf::from("/"));
        assert_eq!(normalize_lexically(Path::new("a/..")), PathBuf::new());
        assert_eq!(normalize_lexically(Path::new("../a")), PathBuf::from("../a"));
    }

    #[cfg(unix)]
    #[test]
    fn relative_path_emits_parent_segments() {
        assert_eq!(
            relative_path(Path::new("/srv/repo"), Path::new("/srv/repo/src/lib.rs")),
            PathBuf::from("src/lib.rs")
        );
        assert_eq!(
            relative_path(Path::new("/srv/repo"), Path::new("/etc/passwd")),
            PathBuf::from("../../etc/passwd")
        );
        assert_eq!(
            relative_path(Path::new("/srv/repo"), Path::new("/srv/repo")),
            PathBuf::new()
        );
        assert_eq!(
            relative_path(Path::new("/srv/repo"), Path::new("/srv/repository/x")),
            PathBuf::from("../repository/x")
        );
    }

    #[cfg(unix)]
    #[test]
    fn resolves_nested_paths() {
        let resolved = resolve_in_root("read_file", Path::new(ROOT), "src/./lib.rs").unwrap();
        assert_eq!(resolved.absolute, PathBuf::from("/srv/repo/src/lib.rs"));
        assert_eq!(resolved.relative, "src/lib.rs");

        let resolved = resolve_in_root("read_file", Path::new(ROOT), "src/../Cargo.toml").unwrap();
        assert_eq!(resolved.relative, "Cargo.toml");
    }

    #[cfg(unix)]
    #[test]
    fn rejects_lexical_escapes() {
        for path in ["../../etc/passwd", "..", "src/../../x", "/etc/passwd"] {
            let err = resolve_in_root("read_file", Path::new(ROOT), path).unwrap_err();
            match err {
                ToolError::Denied { reason, path: p, .. } => {
                    assert_eq!(reason, ESCAPE_REASON);
                    assert_eq!(p, path);
                }
                other => panic!("expected denial for {}, got {:?}", path, other),
            }
        }
    }

    #[cfg(unix)]
    #[test]
    fn absolute_path_inside_root_is_accepted() {
        let resolved = resolve_in_root("read_file", Path::new(ROOT), "/srv/repo/a.txt").unwrap();
        assert_eq!(resolved.relative, "a.txt");
    }

    #[cfg(unix)]
    #[test]
    fn rejects_denied_paths_after_normalization() {
        let err = resolve_in_root("read_file", Path::new(ROOT), "src/../.env").unwrap_err();
        assert!(matches!(
            err,
            ToolError::Denied { ref reason, .. } if reason == "Denied file: .env"
        ));

        let err = resolve_in_root("read_file", Path::new(ROOT), ".git/HEAD").unwrap_err();
        assert_eq!(err.tag(), "ToolDeniedError");
    }

    #[test]
    fn realpath_check_skips_missing_target() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("nope.txt");
        assert!(ensure_realpath_inside_root("read_file", tmp.path(), &missing, "nope.txt").is_ok());
    }

    #[test]
    fn realpath_check_accepts_regular_file() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("a.txt");
        fs::write(&file, "hello").unwrap();
        assert!(ensure_realpath_inside_root("read_file", tmp.path(), &file, "a.txt").is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn realpath_check_rejects_symlinked_escape() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("root");
        let outside = tmp.path().join("outside");
        fs::create_dir_all(&root).unwrap();
        fs::create_dir_all(&outside).unwrap();
        fs::write(outside.join("secret.txt"), "top secret").unwrap();
        std::os::unix::fs::symlink(&outside, root.join("linked")).unwrap();

        let resolved = resolve_in_root("read_file", &root, "linked/secret.txt").unwrap();
        let err = ensure_realpath_inside_root(
            "read_file",
            &root,
            &resolved.absolute,
            "linked/secret.txt",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ToolError::Denied { ref reason, .. } if reason == REALPATH_ESCAPE_REASON
        ));
    }

    #[cfg(unix)]
    #[test]
    fn realpath_check_rejects_alias_of_denied_file() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join(".env"), "TOKEN=1").unwrap();
        std::os::unix::fs::symlink(tmp.path().join(".env"), tmp.path().join("notes.txt")).unwrap();

        let err = ensure_realpath_inside_root(
            "read_file",
            tmp.path(),
            &tmp.path().join("notes.txt"),
            "notes.txt",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ToolError::Denied { ref reason, .. } if reason == "Denied file: .env"
        ));
    }
}
