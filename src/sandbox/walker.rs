use std::io;
use std::path::Path;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use super::policy::{DENIED_DIRS, is_denied, to_posix};
use crate::error::ToolError;

/// List regular files under `root` as sorted, root-relative POSIX paths.
///
/// Denied directories are pruned during the walk and symlinks are skipped
/// without being followed. File-level deny patterns are applied after
/// collection, then the list is sorted and capped to `max_files`.
pub fn list_files(tool: &str, root: &Path, max_files: usize) -> Result<Vec<String>, ToolError> {
    let mut files = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_denied_dir_name(entry));

    for entry in walker {
        let entry = entry.map_err(|e| {
            let shown = e
                .path()
                .unwrap_or(root)
                .display()
                .to_string();
            ToolError::fs(
                tool,
                format!("Failed to read directory {}", shown),
                io::Error::from(e),
            )
        })?;

        // With follow_links(false) this is the link itself, never its target.
        if !entry.file_type().is_file() {
            continue;
        }

        if let Ok(relative) = entry.path().strip_prefix(root) {
            files.push(to_posix(&relative.to_string_lossy()));
        }
    }

    let collected = files.len();
    files.retain(|path| !is_denied(path));
    files.sort();
    files.truncate(max_files);

    debug!(
        tool,
        root = %root.display(),
        collected,
        returned = files.len(),
        "Walked root"
    );
    Ok(files)
}

fn is_denied_dir_name(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|n| DENIED_DIRS.contains(&n))
}
