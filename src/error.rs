use serde_json::{Value, json};
use thiserror::Error;

/// Failures surfaced by the explorer tools.
///
/// Every variant maps to a stable discriminant (see [`ToolError::tag`]) so the
/// calling agent can tell a malformed request from a sandbox refusal or an
/// I/O failure.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Caller-supplied input is missing, wrong-typed, or blank.
    #[error("{tool}: invalid input: {message}")]
    Input { tool: String, message: String },

    /// Path escapes the root or matches the deny list.
    #[error("{tool}: access denied for '{path}': {reason}")]
    Denied {
        tool: String,
        path: String,
        reason: String,
    },

    /// The underlying filesystem operation failed.
    #[error("{tool}: {message}: {source}")]
    Fs {
        tool: String,
        message: String,
        #[source]
        source: std::io::Error,
    },
}

impl ToolError {
    pub fn input(tool: &str, message: impl Into<String>) -> Self {
        ToolError::Input {
            tool: tool.to_string(),
            message: message.into(),
        }
    }

    pub fn denied(tool: &str, path: impl Into<String>, reason: impl Into<String>) -> Self {
        ToolError::Denied {
            tool: tool.to_string(),
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn fs(tool: &str, message: impl Into<String>, source: std::io::Error) -> Self {
        ToolError::Fs {
            tool: tool.to_string(),
            message: message.into(),
            source,
        }
    }

    /// Discriminant reported to the caller.
    pub fn tag(&self) -> &'static str {
        match self {
            ToolError::Input { .. } => "ToolInputError",
            ToolError::Denied { .. } => "ToolDeniedError",
            ToolError::Fs { .. } => "ToolFsError",
        }
    }

    pub fn tool(&self) -> &str {
        match self {
            ToolError::Input { tool, .. }
            | ToolError::Denied { tool, .. }
            | ToolError::Fs { tool, .. } => tool,
        }
    }

    /// Wire form handed back to the model and written to the event log.
    pub fn to_json(&self) -> Value {
        match self {
            ToolError::Input { tool, message } => json!({
                "_tag": self.tag(),
                "tool": tool,
                "message": message,
            }),
            ToolError::Denied { tool, path, reason } => json!({
                "_tag": self.tag(),
                "tool": tool,
                "path": path,
                "reason": reason,
            }),
            ToolError::Fs {
                tool,
                message,
                source,
            } => json!({
                "_tag": self.tag(),
                "tool": tool,
                "message": message,
                "cause": source.to_string(),
                "kind": format!("{:?}", source.kind()),
            }),
        }
    }
}
