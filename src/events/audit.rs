//! Append-only, hash-chained tool event log.
//!
//! Stored at `<state_dir>/repo-scout.events.jsonl`. Each line is one
//! [`EventRecord`] carrying the SHA-256 of the previous raw line, so a
//! removed or edited record breaks the chain and shows up in
//! [`verify_event_chain`]. Denied escape attempts land here with full
//! context (tool, path, reason), which makes the log an audit trail.
//!
//! The first record uses 64 zeros as `prev_entry_sha256`. If the last line
//! on disk is not valid JSON when the log is opened, a `chain_recovery`
//! record is written before the next event to mark the break.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

use super::{EventLog, ToolEvent};

pub const EVENT_LOG_FILENAME: &str = "repo-scout.events.jsonl";

/// Chain link for the first record.
const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// One line of the event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    /// RFC 3339 timestamp.
    pub ts: String,
    pub action: RecordAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<ToolEvent>,
    /// SHA-256 of the previous raw line, hex-encoded.
    pub prev_entry_sha256: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecordAction {
    ToolEvent,
    /// Previous line was corrupt; a new chain segment starts here.
    ChainRecovery,
}

/// [`EventLog`] that appends to a hash-chained JSONL file.
///
/// The hash of the last written line is cached, so appends do not re-read
/// the file. Only one writer per file is expected.
pub struct JsonlEventLog {
    path: PathBuf,
    last_hash: Mutex<Option<String>>,
}

impl JsonlEventLog {
    /// Open (or create) the log at `path`, creating parent directories.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        Ok(Self {
            path,
            last_hash: Mutex::new(None),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event, returning any I/O failure.
    pub fn append(&self, event: &ToolEvent) -> Result<()> {
        let mut last_hash = self
            .last_hash
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let prev_hash = match last_hash.take() {
            Some(hash) => hash,
            None => self.recover_tail()?,
        };

        let record = EventRecord {
            ts: chrono::Utc::now().to_rfc3339(),
            action: RecordAction::ToolEvent,
            event: Some(event.clone()),
            prev_entry_sha256: prev_hash,
            detail: None,
        };
        let json = serde_json::to_string(&record).context("Failed to serialize event record")?;
        append_line(&self.path, &json)?;
        *last_hash = Some(sha256_hex(json.as_bytes()));

        Ok(())
    }

    /// Hash of the last line on disk, writing a recovery record if that
    /// line is corrupt.
    fn recover_tail(&self) -> Result<String> {
        if !self.path.exists() {
            return Ok(GENESIS_HASH.to_string());
        }

        let content = fs::read_to_string(&self.path).context("Failed to read event log")?;
        match content.lines().last() {
            Some(last_line) if !last_line.is_empty() => {
                if serde_json::from_str::<EventRecord>(last_line).is_ok() {
                    if !content.ends_with('\n') {
                        append_line(&self.path, "")?;
                    }
                    return Ok(sha256_hex(last_line.as_bytes()));
                }
                let recovery = EventRecord {
                    ts: chrono::Utc::now().to_rfc3339(),
                    action: RecordAction::ChainRecovery,
                    event: None,
                    prev_entry_sha256: sha256_hex(last_line.as_bytes()),
                    detail: Some(format!(
                        "Previous entry corrupted ({} bytes), new chain segment",
                        last_line.len()
                    )),
                };
                let json = serde_json::to_string(&recovery)
                    .context("Failed to serialize recovery record")?;
                if !content.ends_with('\n') {
                    // Torn write: end the partial line so the record gets its own.
                    append_line(&self.path, "")?;
                }
                append_line(&self.path, &json)?;
                Ok(sha256_hex(json.as_bytes()))
            }
            _ => Ok(GENESIS_HASH.to_string()),
        }
    }
}

impl EventLog for JsonlEventLog {
    fn emit(&self, event: &ToolEvent) {
        if let Err(e) = self.append(event) {
            warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to append tool event"
            );
        }
    }
}

/// Default log location inside the state directory.
pub fn event_log_path(state_dir: &Path) -> PathBuf {
    state_dir.join(EVENT_LOG_FILENAME)
}

fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .context("Failed to open event log")?;
    writeln!(file, "{}", line).context("Failed to write event record")?;
    Ok(())
}

/// Parse every valid record; corrupt lines are skipped.
pub fn read_event_log(path: &Path) -> Result<Vec<EventRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(path).context("Failed to read event log")?;
    Ok(content
        .lines()
        .filter(|line| !line.is_empty())
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect())
}

/// Indices of lines whose chain link does not match the previous line.
///
/// Corrupt (non-JSON) lines are reported as broken. Empty means intact.
pub fn verify_event_chain(path: &Path) -> Result<Vec<usize>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(path).context("Failed to read event log")?;
    let lines: Vec<&str> = content.lines().filter(|l| !l.is_empty()).collect();

    let mut broken = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        let Ok(record) = serde_json::from_str::<EventRecord>(line) else {
            broken.push(i);
            continue;
        };
        let expected = if i == 0 {
            GENESIS_HASH.to_string()
        } else {
            sha256_hex(lines[i - 1].as_bytes())
        };
        if record.prev_entry_sha256 != expected {
            broken.push(i);
        }
    }

    Ok(broken)
}

fn sha256_hex(data: &[u8]) -> String {
    Sha256::digest(data)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn start(tool: &str) -> ToolEvent {
        ToolEvent::Start {
            tool: tool.to_string(),
            input: json!({}),
        }
    }

    #[test]
    fn chain_is_intact_after_appends() {
        let tmp = tempfile::tempdir().unwrap();
        let log = JsonlEventLog::open(event_log_path(tmp.path())).unwrap();

        for tool in ["list_files", "search_text", "read_file"] {
            log.emit(&start(tool));
        }

        let records = read_event_log(log.path()).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].prev_entry_sha256, GENESIS_HASH);
        assert_eq!(records[2].event.as_ref().unwrap().tool(), "read_file");
        assert!(verify_event_chain(log.path()).unwrap().is_empty());
    }

    #[test]
    fn reopened_log_continues_chain() {
        let tmp = tempfile::tempdir().unwrap();
        let path = event_log_path(tmp.path());

        JsonlEventLog::open(&path).unwrap().emit(&start("list_files"));
        JsonlEventLog::open(&path).unwrap().emit(&start("read_file"));

        assert_eq!(read_event_log(&path).unwrap().len(), 2);
        assert!(verify_event_chain(&path).unwrap().is_empty());
    }

    #[test]
    fn tampering_breaks_chain() {
        let tmp = tempfile::tempdir().unwrap();
        let path = event_log_path(tmp.path());
        let log = JsonlEventLog::open(&path).unwrap();
        for tool in ["a", "b", "c"] {
            log.emit(&start(tool));
        }

        let content = fs::read_to_string(&path).unwrap();
        let mut lines: Vec<String> = content.lines().map(str::to_string).collect();
        lines[1] = lines[1].replace("\"b\"", "\"tampered\"");
        fs::write(&path, lines.join("\n") + "\n").unwrap();

        let broken = verify_event_chain(&path).unwrap();
        assert_eq!(broken, vec![2]);
    }

    #[test]
    fn corrupt_tail_triggers_recovery_record() {
        let tmp = tempfile::tempdir().unwrap();
        let path = event_log_path(tmp.path());
        JsonlEventLog::open(&path).unwrap().emit(&start("a"));

        let mut content = fs::read_to_string(&path).unwrap();
        content.push_str("not json at all\n");
        fs::write(&path, content).unwrap();

        JsonlEventLog::open(&path).unwrap().emit(&start("b"));

        let records = read_event_log(&path).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[1].action, RecordAction::ChainRecovery);
        assert!(records[1].detail.as_ref().unwrap().contains("corrupted"));
        assert_eq!(records[2].event.as_ref().unwrap().tool(), "b");

        // Only the corrupt line itself is flagged.
        assert_eq!(verify_event_chain(&path).unwrap(), vec![1]);
    }

    #[test]
    fn torn_tail_without_newline_gets_its_own_recovery_line() {
        let tmp = tempfile::tempdir().unwrap();
        let path = event_log_path(tmp.path());
        JsonlEventLog::open(&path).unwrap().emit(&start("a"));

        let mut content = fs::read_to_string(&path).unwrap();
        content.push_str("{\"ts\":\"partial");
        fs::write(&path, content).unwrap();

        let log = JsonlEventLog::open(&path).unwrap();
        log.emit(&start("b"));
        log.emit(&start("c"));

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[1], "{\"ts\":\"partial");

        let actions: Vec<RecordAction> = read_event_log(&path)
            .unwrap()
            .iter()
            .map(|r| r.action)
            .collect();
        assert_eq!(
            actions,
            vec![
                RecordAction::ToolEvent,
                RecordAction::ChainRecovery,
                RecordAction::ToolEvent,
                RecordAction::ToolEvent
            ]
        );
        assert_eq!(verify_event_chain(&path).unwrap(), vec![1]);
    }

    #[test]
    fn valid_tail_missing_newline_is_terminated() {
        let tmp = tempfile::tempdir().unwrap();
        let path = event_log_path(tmp.path());
        JsonlEventLog::open(&path).unwrap().emit(&start("a"));

        let content = fs::read_to_string(&path).unwrap();
        fs::write(&path, content.trim_end_matches('\n')).unwrap();

        JsonlEventLog::open(&path).unwrap().emit(&start("b"));

        assert_eq!(read_event_log(&path).unwrap().len(), 2);
        assert!(verify_event_chain(&path).unwrap().is_empty());
    }

    #[test]
    fn missing_log_reads_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let path = event_log_path(tmp.path());
        assert!(read_event_log(&path).unwrap().is_empty());
        assert!(verify_event_chain(&path).unwrap().is_empty());
    }

    #[test]
    fn write_failure_does_not_panic() {
        let tmp = tempfile::tempdir().unwrap();
        // A directory where the file should be makes every append fail.
        let path = tmp.path().join("events.jsonl");
        fs::create_dir_all(&path).unwrap();
        let log = JsonlEventLog::open(&path).unwrap();
        log.emit(&start("a"));
        assert!(log.append(&start("b")).is_err());
    }
}
