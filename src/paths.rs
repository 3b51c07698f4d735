//! XDG-style directory resolution.
//!
//! Each directory resolves through a fallback chain:
//! 1. repo-scout env var (`REPO_SCOUT_CONFIG_DIR`, `REPO_SCOUT_STATE_DIR`)
//! 2. XDG env var via `etcetera`
//! 3. Platform default
//!
//! Relative or empty env values are ignored.

use anyhow::Result;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "repo-scout";

/// Resolved directories. All paths are absolute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    /// config.toml lives here
    pub config_dir: PathBuf,

    /// Event log and other runtime state
    pub state_dir: PathBuf,
}

impl Paths {
    pub fn resolve() -> Result<Self> {
        Self::resolve_with_env(|key| std::env::var(key))
    }

    /// Resolve with a custom env lookup (for testing).
    pub fn resolve_with_env<F>(env_fn: F) -> Result<Self>
    where
        F: Fn(&str) -> std::result::Result<String, std::env::VarError>,
    {
        use etcetera::BaseStrategy;

        let strategy = etcetera::choose_base_strategy()
            .map_err(|e| anyhow::anyhow!("Failed to determine base directories: {}", e))?;

        let config_dir = env_or(&env_fn, "REPO_SCOUT_CONFIG_DIR", || {
            strategy.config_dir().join(APP_DIR)
        });

        let state_dir = env_or(&env_fn, "REPO_SCOUT_STATE_DIR", || {
            let base = strategy.state_dir().unwrap_or_else(|| strategy.data_dir());
            base.join(APP_DIR)
        });

        Ok(Self {
            config_dir,
            state_dir,
        })
    }

    /// config_dir/config.toml
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    /// state_dir/repo-scout.events.jsonl
    pub fn event_log(&self) -> PathBuf {
        crate::events::event_log_path(&self.state_dir)
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::resolve().unwrap_or_else(|_| {
            let home = etcetera::home_dir().unwrap_or_else(|_| PathBuf::from("."));
            Self {
                config_dir: home.join(".config").join(APP_DIR),
                state_dir: home.join(".local").join("state").join(APP_DIR),
            }
        })
    }
}

fn env_or<F>(env_fn: &F, var: &str, default: impl FnOnce() -> PathBuf) -> PathBuf
where
    F: Fn(&str) -> std::result::Result<String, std::env::VarError>,
{
    match env_fn(var) {
        Ok(value) if !value.is_empty() && Path::new(&value).is_absolute() => PathBuf::from(value),
        _ => default(),
    }
}
