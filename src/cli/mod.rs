pub mod ask;
pub mod config;
pub mod events;
pub mod tools;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::agent::ExplorerTools;
use crate::config::Config;
use crate::events::{EventLog, FanoutEventLog, JsonlEventLog, TracingEventLog};

#[derive(Parser)]
#[command(name = "repo-scout")]
#[command(author, version, about = "Explore a repository through root-confined tools")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file
    #[arg(short, long, global = true, env = "REPO_SCOUT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Repository root (overrides explorer.root)
    #[arg(short, long, global = true)]
    pub root: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List files under the root
    List(tools::ListArgs),

    /// Search files for a literal substring
    Search(tools::SearchArgs),

    /// Read a file relative to the root
    Read(tools::ReadArgs),

    /// Print the tool schemas advertised to the model
    Tools,

    /// Ask a question about the repository
    Ask(ask::AskArgs),

    /// Inspect the tool event log
    Events(events::EventsArgs),

    /// Configuration management
    Config(config::ConfigArgs),
}

/// Load config and apply the global `--root` override.
pub fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(ref root) = cli.root {
        config.explorer.root = root.to_string_lossy().into_owned();
    }
    Ok(config)
}

/// Event sinks selected by config: tracing always, the audit log when enabled.
pub fn event_sinks(config: &Config) -> Result<Arc<dyn EventLog>> {
    let mut sinks = FanoutEventLog::new().with(Arc::new(TracingEventLog));
    if config.events.audit_log {
        let log = JsonlEventLog::open(config.paths.event_log())?;
        debug!(path = %log.path().display(), "Audit log enabled");
        sinks = sinks.with(Arc::new(log));
    }
    Ok(Arc::new(sinks))
}

/// Tool set for the configured root.
pub fn open_explorer(config: &Config) -> Result<Arc<ExplorerTools>> {
    let root = config.explorer.root_path();
    let explorer = ExplorerTools::new(&root, config.explorer.limits(), event_sinks(config)?)
        .with_context(|| format!("Cannot open repository root {}", root.display()))?;
    Ok(Arc::new(explorer))
}
