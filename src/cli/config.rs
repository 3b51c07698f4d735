use anyhow::Result;
use clap::{Args, Subcommand};

use crate::config::Config;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current configuration
    Show {
        /// Output format: toml (default) or json
        #[arg(short, long, default_value = "toml")]
        format: String,
    },

    /// Show config and state paths
    Path,

    /// Initialize default config file
    Init {
        /// Overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

pub fn run(args: ConfigArgs, config: &Config) -> Result<()> {
    match args.command {
        ConfigCommands::Show { format } => show_config(config, &format),
        ConfigCommands::Path => show_path(config),
        ConfigCommands::Init { force } => init_config(config, force),
    }
}

fn show_config(config: &Config, format: &str) -> Result<()> {
    let mut shown = config.clone();
    if !shown.provider.api_key.is_empty() {
        shown.provider.api_key = "********".to_string();
    }

    match format {
        "json" => {
            let json = serde_json::to_string_pretty(&shown)?;
            println!("{}", json);
        }
        _ => {
            let toml = toml::to_string_pretty(&shown)?;
            println!("{}", toml);
        }
    }

    Ok(())
}

fn show_path(config: &Config) -> Result<()> {
    let paths = &config.paths;
    println!("Config:     {}", paths.config_dir.display());
    println!("  config.toml:    {}", paths.config_file().display());
    println!("State:      {}", paths.state_dir.display());
    println!("  event log:      {}", paths.event_log().display());
    Ok(())
}

fn init_config(config: &Config, force: bool) -> Result<()> {
    let path = config.write_template(force)?;
    println!("Created config file at {}", path.display());
    Ok(())
}
