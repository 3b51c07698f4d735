//! CLI subcommands that invoke a single tool: `list`, `search`, `read`, `tools`

use anyhow::Result;
use clap::Args;
use serde_json::{Map, Value, json};

use super::open_explorer;
use crate::agent::create_explorer_tools;
use crate::config::Config;
use crate::error::ToolError;

#[derive(Args)]
pub struct ListArgs {
    /// Maximum number of paths
    #[arg(short, long)]
    pub max: Option<u64>,
}

#[derive(Args)]
pub struct SearchArgs {
    /// Literal text to find
    pub query: String,

    /// Stop after this many matches
    #[arg(short = 'n', long)]
    pub max_matches: Option<u64>,
}

#[derive(Args)]
pub struct ReadArgs {
    /// Path relative to the root
    pub path: String,

    /// Maximum bytes to return
    #[arg(short = 'b', long)]
    pub max_bytes: Option<u64>,
}

pub fn list(args: ListArgs, config: &Config) -> Result<()> {
    let explorer = open_explorer(config)?;
    let input = tool_input([("max", args.max.map(Value::from))]);
    print_result(explorer.list_files(&input))
}

pub fn search(args: SearchArgs, config: &Config) -> Result<()> {
    let explorer = open_explorer(config)?;
    let input = tool_input([
        ("query", Some(Value::from(args.query))),
        ("maxMatches", args.max_matches.map(Value::from)),
    ]);
    print_result(explorer.search_text(&input))
}

pub fn read(args: ReadArgs, config: &Config) -> Result<()> {
    let explorer = open_explorer(config)?;
    let input = tool_input([
        ("path", Some(Value::from(args.path))),
        ("maxBytes", args.max_bytes.map(Value::from)),
    ]);
    print_result(explorer.read_file(&input))
}

pub fn schemas(config: &Config) -> Result<()> {
    let explorer = open_explorer(config)?;
    let schemas: Vec<Value> = create_explorer_tools(explorer)
        .iter()
        .map(|tool| {
            let schema = tool.schema();
            json!({
                "name": schema.name,
                "aliases": tool.aliases(),
                "description": schema.description,
                "parameters": schema.parameters,
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&schemas)?);
    Ok(())
}

/// Build the tool input object, leaving out unset options.
fn tool_input<const N: usize>(fields: [(&str, Option<Value>); N]) -> Value {
    let map: Map<String, Value> = fields
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key.to_string(), v)))
        .collect();
    Value::Object(map)
}

/// Print the result as JSON. A tool error is handed back as-is so the
/// entrypoint can report it on stderr and pick the exit status.
fn print_result(result: Result<Value, ToolError>) -> Result<()> {
    let value = result?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
