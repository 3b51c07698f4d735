use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::agent::RetryConfig;
use crate::agent::tools::ToolLimits;
use crate::paths::Paths;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Resolved XDG paths (not serialized)
    #[serde(skip)]
    pub paths: Paths,

    #[serde(default)]
    pub explorer: ExplorerConfig,

    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub events: EventsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorerConfig {
    /// Directory the tools are confined to (`~` is expanded)
    #[serde(default = "default_root")]
    pub root: String,

    /// Default cap for list_files, also the file cap for search_text
    #[serde(default = "default_max_files")]
    pub max_files: usize,

    /// Default byte cap for read_file
    #[serde(default = "default_max_read_bytes")]
    pub max_read_bytes: usize,

    /// Default match cap for search_text
    #[serde(default = "default_max_matches")]
    pub max_matches: usize,

    /// Per-file byte cap while searching
    #[serde(default = "default_search_file_bytes")]
    pub search_file_bytes: usize,

    /// Characters kept in a search match preview
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// OpenAI-compatible API base (the client appends /chat/completions)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key; `${VAR}` and `$VAR` are expanded from the environment
    #[serde(default = "default_api_key")]
    pub api_key: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Attempts per request, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Model round-trips allowed before giving up
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,

    /// Replaces the built-in instructions when set
    #[serde(default)]
    pub system_prompt: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// "text" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Append tool events to the hash-chained audit log in the state dir
    #[serde(default = "default_true")]
    pub audit_log: bool,
}

// Default value functions
fn default_root() -> String {
    ".".to_string()
}
fn default_max_files() -> usize {
    400
}
fn default_max_read_bytes() -> usize {
    20_000
}
fn default_max_matches() -> usize {
    50
}
fn default_search_file_bytes() -> usize {
    200_000
}
fn default_preview_chars() -> usize {
    200
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_api_key() -> String {
    "${OPENAI_API_KEY}".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_max_attempts() -> usize {
    3
}
fn default_base_delay_ms() -> u64 {
    250
}
fn default_max_delay_ms() -> u64 {
    4_000
}
fn default_max_turns() -> usize {
    12
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "text".to_string()
}
fn default_true() -> bool {
    true
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            max_files: default_max_files(),
            max_read_bytes: default_max_read_bytes(),
            max_matches: default_max_matches(),
            search_file_bytes: default_search_file_bytes(),
            preview_chars: default_preview_chars(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: default_api_key(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            system_prompt: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            audit_log: default_true(),
        }
    }
}

impl ExplorerConfig {
    pub fn root_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.root).to_string())
    }

    pub fn limits(&self) -> ToolLimits {
        ToolLimits {
            max_files: self.max_files,
            max_read_bytes: self.max_read_bytes,
            max_matches: self.max_matches,
            search_file_bytes: self.search_file_bytes,
            preview_chars: self.preview_chars,
        }
    }
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts.max(1),
            base_delay_ms: self.base_delay_ms,
            max_delay_ms: self.max_delay_ms,
            jitter: true,
        }
    }
}

impl Config {
    /// Load from `explicit` if given, otherwise from the default config file.
    ///
    /// A missing default file yields the built-in defaults; a missing
    /// explicit file is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let paths = Paths::resolve()?;

        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let path = paths.config_file();
                if !path.exists() {
                    return Ok(Config {
                        paths,
                        ..Config::default()
                    });
                }
                path
            }
        };

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config = Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.paths = paths;
        Ok(config)
    }

    /// Parse TOML and expand env references.
    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content)?;
        config.provider.api_key = expand_env(&config.provider.api_key);
        Ok(config)
    }

    /// Write the commented template to the default config path.
    pub fn write_template(&self, force: bool) -> Result<PathBuf> {
        let path = self.paths.config_file();
        if path.exists() && !force {
            anyhow::bail!(
                "Config file already exists at {} (use --force to overwrite)",
                path.display()
            );
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, DEFAULT_CONFIG_TEMPLATE)?;
        Ok(path)
    }
}

fn expand_env(s: &str) -> String {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).unwrap_or_default()
    } else if let Some(var_name) = s.strip_prefix('$') {
        std::env::var(var_name).unwrap_or_default()
    } else {
        s.to_string()
    }
}

/// Default config template (written by `config init`)
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# repo-scout configuration

[explorer]
# Directory the tools are confined to. Overridden by --root.
root = "."
# max_files = 400            # list_files default cap (also search_text's file cap)
# max_read_bytes = 20000     # read_file default byte cap
# max_matches = 50           # search_text default match cap
# search_file_bytes = 200000 # bytes scanned per file while searching
# preview_chars = 200        # characters kept per match preview

[provider]
# Any OpenAI-compatible chat-completions endpoint
base_url = "https://api.openai.com/v1"
api_key = "${OPENAI_API_KEY}"
model = "gpt-4o-mini"
# timeout_secs = 60
# max_attempts = 3
# base_delay_ms = 250
# max_delay_ms = 4000

[agent]
# max_turns = 12
# system_prompt = "..."

[logging]
level = "info"
# format = "json"

[events]
# Hash-chained tool event log in the state directory
audit_log = true
"#;
