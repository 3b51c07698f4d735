use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use super::providers::ToolSchema;
use crate::error::ToolError;
use crate::events::{EventLog, ToolEvent};
use crate::sandbox::{self, normalize_lexically};

pub const LIST_FILES: &str = "list_files";
pub const SEARCH_TEXT: &str = "search_text";
pub const READ_FILE: &str = "read_file";

/// Extensions search_text never opens.
const BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "webp", "ico", "zip", "gz", "tgz", "jar", "pdf", "woff", "woff2",
];

/// Hex characters of the content digest kept in read_file's event summary.
const CONTENT_HASH_CHARS: usize = 12;

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    /// Alternate names accepted when dispatching a call.
    fn aliases(&self) -> &'static [&'static str] {
        &[]
    }

    fn schema(&self) -> ToolSchema;

    async fn execute(&self, input: Value) -> Result<Value, ToolError>;
}

/// Default caps applied when the caller omits (or garbles) a limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolLimits {
    pub max_files: usize,
    pub max_read_bytes: usize,
    pub max_matches: usize,
    pub search_file_bytes: usize,
    pub preview_chars: usize,
}

impl Default for ToolLimits {
    fn default() -> Self {
        Self {
            max_files: 400,
            max_read_bytes: 20_000,
            max_matches: 50,
            search_file_bytes: 200_000,
            preview_chars: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchMatch {
    pub path: String,
    /// 1-based
    pub line: usize,
    pub preview: String,
}

/// Result value plus the summary that goes into the `tool:success` event.
struct ToolOutput {
    value: Value,
    summary: Value,
}

/// The list/search/read operations, confined to one root.
///
/// Holds only immutable state, so one instance can serve concurrent calls.
pub struct ExplorerTools {
    root: PathBuf,
    limits: ToolLimits,
    events: Arc<dyn EventLog>,
}

impl ExplorerTools {
    /// Fix the root for the lifetime of this tool set.
    ///
    /// A relative root is made absolute against the working directory.
    pub fn new(root: impl AsRef<Path>, limits: ToolLimits, events: Arc<dyn EventLog>) -> Result<Self> {
        let root = root.as_ref();
        let absolute = std::path::absolute(root)
            .with_context(|| format!("Failed to make {} absolute", root.display()))?;
        let root = normalize_lexically(&absolute);
        if !root.is_dir() {
            anyhow::bail!("Root is not a directory: {}", root.display());
        }

        Ok(Self {
            root,
            limits,
            events,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn limits(&self) -> &ToolLimits {
        &self.limits
    }

    /// `{max?}` → `{root, files}`
    pub fn list_files(&self, input: &Value) -> Result<Value, ToolError> {
        self.instrumented(LIST_FILES, input, || {
            let max = optional_limit(input, "max", self.limits.max_files);
            let files = sandbox::list_files(LIST_FILES, &self.root, max)?;

            Ok(ToolOutput {
                summary: json!({ "count": files.len(), "max": max }),
                value: json!({ "root": self.root_display(), "files": files }),
            })
        })
    }

    /// `{query, maxMatches?}` → `{root, query, matches}`
    pub fn search_text(&self, input: &Value) -> Result<Value, ToolError> {
        self.instrumented(SEARCH_TEXT, input, || {
            let query = required_string(SEARCH_TEXT, input, "query")?;
            let max_matches = optional_limit(input, "maxMatches", self.limits.max_matches);

            let files = sandbox::list_files(SEARCH_TEXT, &self.root, self.limits.max_files)?;
            let mut matches = Vec::new();
            let mut scanned = 0usize;

            'files: for relative in files.iter().filter(|f| !is_binary_path(f)) {
                let read = sandbox::read_capped(
                    SEARCH_TEXT,
                    &self.root.join(relative),
                    self.limits.search_file_bytes,
                )?;
                scanned += 1;

                for (idx, line) in read.content.split('\n').enumerate() {
                    let line = line.strip_suffix('\r').unwrap_or(line);
                    if !line.contains(query) {
                        continue;
                    }
                    matches.push(SearchMatch {
                        path: relative.clone(),
                        line: idx + 1,
                        preview: line.chars().take(self.limits.preview_chars).collect(),
                    });
                    if matches.len() >= max_matches {
                        break 'files;
                    }
                }
            }

            debug!(query, scanned, matches = matches.len(), "Search finished");

            Ok(ToolOutput {
                summary: json!({
                    "matches": matches.len(),
                    "filesScanned": scanned,
                    "maxMatches": max_matches,
                }),
                value: json!({
                    "root": self.root_display(),
                    "query": query,
                    "matches": matches,
                }),
            })
        })
    }

    /// `{path, maxBytes?}` → `{path, content, truncated}`
    pub fn read_file(&self, input: &Value) -> Result<Value, ToolError> {
        self.instrumented(READ_FILE, input, || {
            let path = required_string(READ_FILE, input, "path")?;
            let max_bytes = optional_limit(input, "maxBytes", self.limits.max_read_bytes);

            let resolved = sandbox::resolve_in_root(READ_FILE, &self.root, path)?;
            sandbox::ensure_realpath_inside_root(READ_FILE, &self.root, &resolved.absolute, path)?;
            let read = sandbox::read_capped(READ_FILE, &resolved.absolute, max_bytes)?;

            Ok(ToolOutput {
                summary: json!({
                    "path": resolved.relative,
                    "bytes": read.content.len(),
                    "truncated": read.truncated,
                    "sha256": content_hash(&read.content),
                }),
                value: json!({
                    "path": resolved.relative,
                    "content": read.content,
                    "truncated": read.truncated,
                }),
            })
        })
    }

    /// Emit start/success/error around `op`; the error passes through unchanged.
    fn instrumented<F>(&self, tool: &str, input: &Value, op: F) -> Result<Value, ToolError>
    where
        F: FnOnce() -> Result<ToolOutput, ToolError>,
    {
        self.events.emit(&ToolEvent::Start {
            tool: tool.to_string(),
            input: input.clone(),
        });
        let started = Instant::now();
        let result = op();
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match result {
            Ok(output) => {
                self.events.emit(&ToolEvent::Success {
                    tool: tool.to_string(),
                    duration_ms,
                    output_summary: output.summary,
                });
                Ok(output.value)
            }
            Err(err) => {
                self.events.emit(&ToolEvent::Error {
                    tool: tool.to_string(),
                    duration_ms,
                    error: err.to_json(),
                });
                Err(err)
            }
        }
    }

    fn root_display(&self) -> String {
        self.root.to_string_lossy().into_owned()
    }
}

/// A positive integer limit, or `default` when absent or unusable.
///
/// Non-numbers, non-finite values and anything below 1 after flooring fall
/// back silently; limits are advisory.
fn optional_limit(input: &Value, key: &str, default: usize) -> usize {
    input
        .get(key)
        .and_then(Value::as_f64)
        .filter(|n| n.is_finite())
        .map(f64::floor)
        .filter(|n| *n >= 1.0)
        .map(|n| n as usize)
        .unwrap_or(default)
}

fn required_string<'a>(tool: &str, input: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    match input.get(key) {
        None | Some(Value::Null) => Err(ToolError::input(tool, format!("`{}` is required", key))),
        Some(Value::String(s)) if s.trim().is_empty() => {
            Err(ToolError::input(tool, format!("`{}` must not be blank", key)))
        }
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(ToolError::input(tool, format!("`{}` must be a string", key))),
    }
}

fn is_binary_path(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            BINARY_EXTENSIONS
                .iter()
                .any(|b| b.eq_ignore_ascii_case(ext))
        })
}

fn content_hash(content: &str) -> String {
    Sha256::digest(content.as_bytes())
        .iter()
        .map(|b| format!("{:02x}", b))
        .take(CONTENT_HASH_CHARS / 2)
        .collect()
}

/// Build the three explorer tools over a shared tool set.
pub fn create_explorer_tools(explorer: Arc<ExplorerTools>) -> Vec<Box<dyn Tool>> {
    vec![
        Box::new(ListFilesTool::new(Arc::clone(&explorer))),
        Box::new(SearchTextTool::new(Arc::clone(&explorer))),
        Box::new(ReadFileTool::new(explorer)),
    ]
}

// List Files Tool
pub struct ListFilesTool {
    explorer: Arc<ExplorerTools>,
}

impl ListFilesTool {
    pub fn new(explorer: Arc<ExplorerTools>) -> Self {
        Self { explorer }
    }
}

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        LIST_FILES
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["listFiles"]
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: LIST_FILES.to_string(),
            description: "List files under the repository root as sorted relative paths. \
                          Dependency trees, VCS metadata and secrets are never listed."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "max": {
                        "type": "integer",
                        "minimum": 1,
                        "description": format!("Maximum number of paths to return (default: {})", self.explorer.limits.max_files)
                    }
                }
            }),
        }
    }

    async fn execute(&self, input: Value) -> Result<Value, ToolError> {
        self.explorer.list_files(&input)
    }
}

// Search Text Tool
pub struct SearchTextTool {
    explorer: Arc<ExplorerTools>,
}

impl SearchTextTool {
    pub fn new(explorer: Arc<ExplorerTools>) -> Self {
        Self { explorer }
    }
}

#[async_trait]
impl Tool for SearchTextTool {
    fn name(&self) -> &str {
        SEARCH_TEXT
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["searchText"]
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: SEARCH_TEXT.to_string(),
            description: "Search text files under the repository root for a literal, \
                          case-sensitive substring. Returns path, 1-based line and a preview."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "minLength": 1,
                        "description": "Literal text to find (no regex)"
                    },
                    "maxMatches": {
                        "type": "integer",
                        "minimum": 1,
                        "description": format!("Stop after this many matches (default: {})", self.explorer.limits.max_matches)
                    }
                },
                "required": ["query"]
            }),
        }
    }

    async fn execute(&self, input: Value) -> Result<Value, ToolError> {
        self.explorer.search_text(&input)
    }
}

// Read File Tool
pub struct ReadFileTool {
    explorer: Arc<ExplorerTools>,
}

impl ReadFileTool {
    pub fn new(explorer: Arc<ExplorerTools>) -> Self {
        Self { explorer }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        READ_FILE
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["readFile"]
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: READ_FILE.to_string(),
            description: "Read a file relative to the repository root. Large files are \
                          truncated and flagged with `truncated: true`."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "minLength": 1,
                        "description": "Path relative to the repository root"
                    },
                    "maxBytes": {
                        "type": "integer",
                        "minimum": 1,
                        "description": format!("Maximum bytes to return (default: {})", self.explorer.limits.max_read_bytes)
                    }
                },
                "required": ["path"]
            }),
        }
    }

    async fn execute(&self, input: Value) -> Result<Value, ToolError> {
        self.explorer.read_file(&input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MemoryEventLog;
    use std::fs;

    fn explorer(root: &Path) -> (ExplorerTools, Arc<MemoryEventLog>) {
        let events = Arc::new(MemoryEventLog::new());
        let tools = ExplorerTools::new(root, ToolLimits::default(), events.clone()).unwrap();
        (tools, events)
    }

    #[test]
    fn optional_limit_coercion() {
        let input = json!({"a": 5, "b": -5, "c": 0, "d": "7", "e": 2.9, "f": 0.5, "g": null});
        assert_eq!(optional_limit(&input, "a", 400), 5);
        assert_eq!(optional_limit(&input, "b", 400), 400);
        assert_eq!(optional_limit(&input, "c", 400), 400);
        assert_eq!(optional_limit(&input, "d", 400), 400);
        assert_eq!(optional_limit(&input, "e", 400), 2);
        assert_eq!(optional_limit(&input, "f", 400), 400);
        assert_eq!(optional_limit(&input, "g", 400), 400);
        assert_eq!(optional_limit(&input, "missing", 400), 400);
        assert_eq!(optional_limit(&json!("not an object"), "a", 7), 7);
    }

    #[test]
    fn required_string_validation() {
        assert!(required_string("t", &json!({"q": "x"}), "q").is_ok());
        for input in [json!({}), json!({"q": null}), json!({"q": "   "}), json!({"q": 3}), json!(null)] {
            let err = required_string("t", &input, "q").unwrap_err();
            assert_eq!(err.tag(), "ToolInputError");
        }
    }

    #[test]
    fn binary_extensions_are_case_insensitive() {
        assert!(is_binary_path("assets/logo.PNG"));
        assert!(is_binary_path("dist/app.tgz"));
        assert!(is_binary_path("fonts/a.woff2"));
        assert!(!is_binary_path("src/main.rs"));
        assert!(!is_binary_path("Makefile"));
    }

    #[test]
    fn content_hash_is_short_hex() {
        let hash = content_hash("hello");
        assert_eq!(hash.len(), CONTENT_HASH_CHARS);
        assert_eq!(hash, "2cf24dba5fb0");
    }

    #[test]
    fn root_must_be_a_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("file.txt");
        fs::write(&file, "x").unwrap();
        let events: Arc<dyn EventLog> = Arc::new(MemoryEventLog::new());
        assert!(ExplorerTools::new(&file, ToolLimits::default(), events.clone()).is_err());
        assert!(ExplorerTools::new(tmp.path().join("missing"), ToolLimits::default(), events).is_err());
    }

    #[test]
    fn read_emits_start_then_success_with_hash() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a.txt"), "0123456789ABCDEFGHIJ").unwrap();
        let (tools, events) = explorer(tmp.path());

        let out = tools.read_file(&json!({"path": "a.txt", "maxBytes": 10})).unwrap();
        assert_eq!(out, json!({"path": "a.txt", "content": "0123456789", "truncated": true}));

        let recorded = events.events();
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[0].kind(), "tool:start");
        match &recorded[1] {
            ToolEvent::Success { tool, output_summary, .. } => {
                assert_eq!(tool, READ_FILE);
                assert_eq!(output_summary["bytes"], 10);
                assert_eq!(output_summary["sha256"], content_hash("0123456789"));
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[test]
    fn denied_read_emits_error_event() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join(".env"), "SECRET=1").unwrap();
        let (tools, events) = explorer(tmp.path());

        let err = tools.read_file(&json!({"path": ".env"})).unwrap_err();
        assert_eq!(err.tag(), "ToolDeniedError");

        let recorded = events.events();
        match &recorded[1] {
            ToolEvent::Error { error, .. } => {
                assert_eq!(error["_tag"], "ToolDeniedError");
                assert_eq!(error["path"], ".env");
                assert_eq!(error["reason"], "Denied file: .env");
            }
            other => panic!("expected error event, got {:?}", other),
        }
    }

    #[test]
    fn search_stops_at_max_matches() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a.txt"), "foo\nfoo\nfoo\n").unwrap();
        fs::write(tmp.path().join("b.txt"), "foo\n").unwrap();
        let (tools, events) = explorer(tmp.path());

        let out = tools.search_text(&json!({"query": "foo", "maxMatches": 2})).unwrap();
        let matches = out["matches"].as_array().unwrap();
        assert_eq!(matches.len(), 2);
        assert!(matches.iter().all(|m| m["path"] == "a.txt"));

        match &events.events()[1] {
            ToolEvent::Success { output_summary, .. } => {
                assert_eq!(output_summary["filesScanned"], 1);
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[test]
    fn search_handles_crlf_and_long_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let long = format!("needle{}", "x".repeat(500));
        fs::write(tmp.path().join("win.txt"), format!("one\r\ntwo needle\r\n{}\r\n", long)).unwrap();
        let (tools, _) = explorer(tmp.path());

        let out = tools.search_text(&json!({"query": "needle"})).unwrap();
        let matches = out["matches"].as_array().unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0]["line"], 2);
        assert_eq!(matches[0]["preview"], "two needle");
        assert_eq!(matches[1]["line"], 3);
        assert_eq!(matches[1]["preview"].as_str().unwrap().chars().count(), 200);
    }

    #[test]
    fn search_skips_binary_files() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("image.PNG"), "needle").unwrap();
        fs::write(tmp.path().join("notes.md"), "needle").unwrap();
        let (tools, _) = explorer(tmp.path());

        let out = tools.search_text(&json!({"query": "needle"})).unwrap();
        let matches = out["matches"].as_array().unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0]["path"], "notes.md");
    }

    #[test]
    fn search_is_case_sensitive_and_literal() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a.txt"), "Foo\nfoo\nf.o\n").unwrap();
        let (tools, _) = explorer(tmp.path());

        let out = tools.search_text(&json!({"query": "f.o"})).unwrap();
        let matches = out["matches"].as_array().unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0]["line"], 3);
    }

    #[cfg(unix)]
    #[test]
    fn search_read_failure_is_fs_error() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a.txt"), "needle").unwrap();
        let locked = tmp.path().join("b.txt");
        fs::write(&locked, "needle").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Privileged users read through mode 000; nothing to check then.
        if fs::read(&locked).is_ok() {
            return;
        }

        let (tools, events) = explorer(tmp.path());
        let err = tools.search_text(&json!({"query": "needle"})).unwrap_err();
        assert_eq!(err.tag(), "ToolFsError");
        assert_eq!(err.tool(), SEARCH_TEXT);

        match &events.events()[1] {
            ToolEvent::Error { error, .. } => assert_eq!(error["_tag"], "ToolFsError"),
            other => panic!("expected error event, got {:?}", other),
        }

        fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();
    }

    #[tokio::test]
    async fn tool_trait_dispatches_to_explorer() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a.txt"), "hi").unwrap();
        let (explorer, _) = explorer(tmp.path());
        let tools = create_explorer_tools(Arc::new(explorer));

        let names: Vec<&str> = tools.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec![LIST_FILES, SEARCH_TEXT, READ_FILE]);

        let read = tools.iter().find(|t| t.aliases().contains(&"readFile")).unwrap();
        let out = read.execute(json!({"path": "a.txt"})).await.unwrap();
        assert_eq!(out["content"], "hi");

        let schema = tools[1].schema();
        assert_eq!(schema.parameters["required"], json!(["query"]));
    }
}
