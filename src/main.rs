use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use repo_scout::ToolError;
use repo_scout::cli::{self, Cli, Commands};
use repo_scout::config::LoggingConfig;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(anyhow::Error::from)
        .and_then(|runtime| runtime.block_on(async_main(cli)));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&err);
            ExitCode::FAILURE
        }
    }
}

async fn async_main(cli: Cli) -> Result<()> {
    let config = cli::load_config(&cli)?;
    init_logging(cli.verbose, &config.logging);

    match cli.command {
        Commands::List(args) => cli::tools::list(args, &config),
        Commands::Search(args) => cli::tools::search(args, &config),
        Commands::Read(args) => cli::tools::read(args, &config),
        Commands::Tools => cli::tools::schemas(&config),
        Commands::Ask(args) => cli::ask::run(args, &config).await,
        Commands::Events(args) => cli::events::run(args, &config),
        Commands::Config(args) => cli::config::run(args, &config),
    }
}

/// Tool failures print their structured JSON; anything else the error chain.
fn report(err: &anyhow::Error) {
    match err.downcast_ref::<ToolError>() {
        Some(tool_err) => match serde_json::to_string_pretty(&tool_err.to_json()) {
            Ok(json) => eprintln!("{}", json),
            Err(_) => eprintln!("{}", tool_err),
        },
        None => eprintln!("Error: {:?}", err),
    }
}

/// `RUST_LOG` wins, then `--verbose`, then `logging.level`. Logs go to stderr
/// so stdout stays machine-readable.
fn init_logging(verbose: bool, logging: &LoggingConfig) {
    let log_level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}
