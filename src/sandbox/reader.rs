use serde::Serialize;
use std::fs;
use std::io::{self, Read};
use std::path::Path;

use crate::error::ToolError;

/// Bytes read from a file, capped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadResult {
    pub content: String,
    pub truncated: bool,
}

/// Read at most `max_bytes` bytes of `path`.
///
/// Decoding is lossy: if the cap lands inside a multi-byte UTF-8 sequence,
/// the dangling bytes become U+FFFD rather than being dropped or rejected.
/// The byte slice itself is always exactly `max_bytes` long when truncated.
pub fn read_capped(tool: &str, path: &Path, max_bytes: usize) -> Result<ReadResult, ToolError> {
    let shown = path.display().to_string();

    // Checked before opening: opening a FIFO blocks until a writer appears.
    let metadata = fs::metadata(path)
        .map_err(|e| ToolError::fs(tool, format!("Failed to stat {}", shown), e))?;
    if !metadata.is_file() {
        return Err(ToolError::fs(
            tool,
            format!("Not a regular file: {}", shown),
            io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
        ));
    }

    let file = fs::File::open(path)
        .map_err(|e| ToolError::fs(tool, format!("Failed to open {}", shown), e))?;

    // One byte past the cap tells us whether the file is longer.
    let limit = (max_bytes as u64).saturating_add(1);
    let mut bytes = Vec::with_capacity(max_bytes.min(metadata.len() as usize) + 1);
    file.take(limit)
        .read_to_end(&mut bytes)
        .map_err(|e| ToolError::fs(tool, format!("Failed to read {}", shown), e))?;

    let truncated = bytes.len() > max_bytes;
    if truncated {
        bytes.truncate(max_bytes);
    }

    Ok(ReadResult {
        content: String::from_utf8_lossy(&bytes).into_owned(),
        truncated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_to_exact_byte_count() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a.txt");
        fs::write(&path, "0123456789ABCDEFGHIJ").unwrap();

        let result = read_capped("read_file", &path, 10).unwrap();
        assert_eq!(result.content, "0123456789");
        assert!(result.truncated);
    }

    #[test]
    fn cap_equal_to_size_is_not_truncated() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a.txt");
        fs::write(&path, "0123456789ABCDEFGHIJ").unwrap();

        let result = read_capped("read_file", &path, 20).unwrap();
        assert_eq!(result.content, "0123456789ABCDEFGHIJ");
        assert!(!result.truncated);

        let result = read_capped("read_file", &path, 1000).unwrap();
        assert!(!result.truncated);
    }

    #[test]
    fn split_multibyte_char_becomes_replacement() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("utf8.txt");
        // "é" is two bytes (0xC3 0xA9); cut after the first.
        fs::write(&path, "abé").unwrap();

        let result = read_capped("read_file", &path, 3).unwrap();
        assert!(result.truncated);
        assert_eq!(result.content, "ab\u{FFFD}");
    }

    #[test]
    fn missing_file_is_fs_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = read_capped("read_file", &tmp.path().join("missing.txt"), 10).unwrap_err();
        match err {
            ToolError::Fs { source, .. } => assert_eq!(source.kind(), io::ErrorKind::NotFound),
            other => panic!("expected fs error, got {:?}", other),
        }
    }

    #[test]
    fn directory_is_fs_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = read_capped("read_file", tmp.path(), 10).unwrap_err();
        assert_eq!(err.tag(), "ToolFsError");
    }

    #[cfg(unix)]
    #[test]
    fn fifo_is_fs_error_without_blocking() {
        let tmp = tempfile::tempdir().unwrap();
        let fifo = tmp.path().join("pipe");
        let status = std::process::Command::new("mkfifo")
            .arg(&fifo)
            .status()
            .unwrap();
        assert!(status.success());

        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let _ = tx.send(read_capped("read_file", &fifo, 10));
        });

        let result = rx
            .recv_timeout(std::time::Duration::from_secs(3))
            .expect("read_capped blocked on a FIFO");
        let err = result.unwrap_err();
        assert_eq!(err.tag(), "ToolFsError");
        assert!(err.to_string().contains("Not a regular file"));
    }

    #[test]
    fn empty_file_reads_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("empty.txt");
        fs::write(&path, "").unwrap();
        let result = read_capped("read_file", &path, 0).unwrap();
        assert_eq!(result.content, "");
        assert!(!result.truncated);
    }
}
