//! repo-scout - root-confined repository tools for LLM agents
//!
//! This crate provides:
//! - A sandboxed filesystem layer (path policy, root resolution, capped reads, walking)
//! - The `list_files` / `search_text` / `read_file` tool façade with lifecycle events
//! - Event sinks, including a hash-chained JSONL audit log
//! - A chat-completions client with retries and a small tool-calling agent loop

pub mod agent;
pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod paths;
pub mod sandbox;

pub use config::Config;
pub use error::ToolError;
