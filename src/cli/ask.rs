use anyhow::{Context, Result};
use clap::Args;

use super::open_explorer;
use crate::agent::{Agent, OpenAIProvider, ResilientProvider};
use crate::config::Config;

#[derive(Args)]
pub struct AskArgs {
    /// The question about the repository
    pub question: String,

    /// Model to use (overrides config)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Output format: text (default) or json
    #[arg(short, long, default_value = "text")]
    pub format: String,
}

pub async fn run(args: AskArgs, config: &Config) -> Result<()> {
    let explorer = open_explorer(config)?;

    let provider_config = &config.provider;
    if provider_config.api_key.is_empty() {
        tracing::warn!("provider.api_key is empty; requests will be unauthenticated");
    }
    let model = args.model.unwrap_or_else(|| provider_config.model.clone());
    let provider = OpenAIProvider::new(
        &provider_config.api_key,
        &provider_config.base_url,
        &model,
        provider_config.timeout(),
    )
    .context("Failed to build chat client")?;
    let provider = ResilientProvider::new(Box::new(provider), provider_config.retry_config());

    let agent = Agent::new(
        Box::new(provider),
        explorer,
        config.agent.max_turns,
        config.agent.system_prompt.as_deref(),
    );
    let response = agent.run(&args.question).await?;

    match args.format.as_str() {
        "json" => {
            let output = serde_json::json!({
                "question": args.question,
                "response": response,
                "model": model,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        _ => {
            println!("{}", response);
        }
    }

    Ok(())
}
