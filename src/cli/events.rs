//! CLI subcommand: `repo-scout events`
//!
//! Shows the hash-chained tool event log and checks its integrity.

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::config::Config;
use crate::events::{EventRecord, RecordAction, read_event_log, verify_event_chain};

#[derive(Args)]
pub struct EventsArgs {
    #[command(subcommand)]
    pub command: EventsCommands,
}

#[derive(Subcommand)]
pub enum EventsCommands {
    /// Show recent events
    Show {
        /// Only the last N records
        #[arg(short, long, default_value_t = 50)]
        limit: usize,

        /// Output raw JSON records
        #[arg(long)]
        json: bool,
    },

    /// Verify the hash chain
    Verify,
}

pub fn run(args: EventsArgs, config: &Config) -> Result<()> {
    match args.command {
        EventsCommands::Show { limit, json } => show(config, limit, json),
        EventsCommands::Verify => verify(config),
    }
}

fn show(config: &Config, limit: usize, json_output: bool) -> Result<()> {
    let path = config.paths.event_log();
    let records = read_event_log(&path)?;

    if records.is_empty() {
        println!("No events recorded at {}", path.display());
        return Ok(());
    }

    let skip = records.len().saturating_sub(limit);
    let recent = &records[skip..];

    if json_output {
        println!("{}", serde_json::to_string_pretty(recent)?);
        return Ok(());
    }

    println!(
        "Tool events ({} of {}, {}):",
        recent.len(),
        records.len(),
        path.display()
    );
    println!();
    for record in recent {
        println!("  {}", describe(record));
    }

    Ok(())
}

fn describe(record: &EventRecord) -> String {
    match (&record.action, &record.event) {
        (RecordAction::ToolEvent, Some(event)) => {
            format!("{} {:<13} {}", record.ts, event.kind(), event.tool())
        }
        (RecordAction::ChainRecovery, _) => format!(
            "{} chain recovery: {}",
            record.ts,
            record.detail.as_deref().unwrap_or("corrupt previous line")
        ),
        (RecordAction::ToolEvent, None) => format!("{} (empty record)", record.ts),
    }
}

fn verify(config: &Config) -> Result<()> {
    let path = config.paths.event_log();
    if !path.exists() {
        println!("No event log at {}", path.display());
        return Ok(());
    }

    let broken = verify_event_chain(&path)?;
    if broken.is_empty() {
        println!("Event chain intact ({})", path.display());
        return Ok(());
    }

    let lines: Vec<String> = broken.iter().map(|i| (i + 1).to_string()).collect();
    anyhow::bail!(
        "Event chain broken at line(s) {} of {}",
        lines.join(", "),
        path.display()
    )
}
