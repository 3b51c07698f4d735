//! Tool lifecycle events and the sinks that record them.
//!
//! Every tool invocation produces a `tool:start` event followed by exactly one
//! of `tool:success` or `tool:error`. The sink is handed to the tool set at
//! construction; there is no process-wide logger.

mod audit;

pub use audit::{
    EVENT_LOG_FILENAME, EventRecord, JsonlEventLog, RecordAction, event_log_path, read_event_log,
    verify_event_chain,
};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// A single tool lifecycle event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ToolEvent {
    #[serde(rename = "tool:start")]
    Start { tool: String, input: Value },

    #[serde(rename = "tool:success", rename_all = "camelCase")]
    Success {
        tool: String,
        duration_ms: u64,
        output_summary: Value,
    },

    #[serde(rename = "tool:error", rename_all = "camelCase")]
    Error {
        tool: String,
        duration_ms: u64,
        error: Value,
    },
}

impl ToolEvent {
    pub fn tool(&self) -> &str {
        match self {
            ToolEvent::Start { tool, .. }
            | ToolEvent::Success { tool, .. }
            | ToolEvent::Error { tool, .. } => tool,
        }
    }

    /// The `type` discriminant as written on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            ToolEvent::Start { .. } => "tool:start",
            ToolEvent::Success { .. } => "tool:success",
            ToolEvent::Error { .. } => "tool:error",
        }
    }
}

/// Receiver for tool events.
///
/// Implementations must not fail the tool call: sink errors are logged and
/// swallowed by the sink itself.
pub trait EventLog: Send + Sync {
    fn emit(&self, event: &ToolEvent);
}

/// Emits events as structured `tracing` records.
#[derive(Debug, Default, Clone)]
pub struct TracingEventLog;

impl EventLog for TracingEventLog {
    fn emit(&self, event: &ToolEvent) {
        match event {
            ToolEvent::Start { tool, input } => {
                info!(target: "repo_scout::events", event = "tool:start", tool = tool.as_str(), %input);
            }
            ToolEvent::Success {
                tool,
                duration_ms,
                output_summary,
            } => {
                info!(
                    target: "repo_scout::events",
                    event = "tool:success",
                    tool = tool.as_str(),
                    duration_ms,
                    summary = %output_summary
                );
            }
            ToolEvent::Error {
                tool,
                duration_ms,
                error,
            } => {
                warn!(
                    target: "repo_scout::events",
                    event = "tool:error",
                    tool = tool.as_str(),
                    duration_ms,
                    %error
                );
            }
        }
    }
}

/// Collects events in memory.
#[derive(Debug, Default)]
pub struct MemoryEventLog {
    events: Mutex<Vec<ToolEvent>>,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn events(&self) -> Vec<ToolEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}

impl EventLog for MemoryEventLog {
    fn emit(&self, event: &ToolEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event.clone());
    }
}

/// Forwards every event to each inner sink, in order.
#[derive(Default, Clone)]
pub struct FanoutEventLog {
    sinks: Vec<Arc<dyn EventLog>>,
}

impl FanoutEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn EventLog>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl EventLog for FanoutEventLog {
    fn emit(&self, event: &ToolEvent) {
        for sink in &self.sinks {
            sink.emit(event);
        }
    }
}
