use async_trait::async_trait;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

use super::providers::{LLMProvider, LLMResponse, Message, ProviderError, ToolSchema};

/// Retry and backoff settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Attempts including the first one
    pub max_attempts: usize,
    /// Initial backoff delay in milliseconds
    pub base_delay_ms: u64,
    /// Backoff ceiling in milliseconds
    pub max_delay_ms: u64,
    /// Shave a deterministic amount off each delay
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 250,
            max_delay_ms: 4_000,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt_index` (0-based).
    pub fn delay_for(&self, attempt_index: usize) -> Duration {
        let mut delay = self
            .base_delay_ms
            .saturating_mul(1u64 << attempt_index.min(16))
            .min(self.max_delay_ms);
        if self.jitter {
            let span = (delay / 2).max(1);
            let jitter = (attempt_index as u64)
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1)
                % span;
            delay = delay.saturating_sub(jitter);
        }
        Duration::from_millis(delay)
    }
}

/// Retries transient provider failures with exponential backoff.
pub struct ResilientProvider {
    inner: Box<dyn LLMProvider>,
    cfg: RetryConfig,
}

impl ResilientProvider {
    pub fn new(inner: Box<dyn LLMProvider>, cfg: RetryConfig) -> Self {
        Self { inner, cfg }
    }
}

#[async_trait]
impl LLMProvider for ResilientProvider {
    async fn chat(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
    ) -> Result<LLMResponse, ProviderError> {
        let attempts = self.cfg.max_attempts.max(1);
        let mut last_error = String::new();

        for idx in 0..attempts {
            match self.inner.chat(messages, tools).await {
                Ok(response) => return Ok(response),
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) => {
                    last_error = err.to_string();
                    if idx + 1 < attempts {
                        let delay = self.cfg.delay_for(idx);
                        warn!(
                            attempt = idx + 1,
                            attempts,
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "Chat request failed, retrying"
                        );
                        sleep(delay).await;
                    }
                }
            }
        }

        Err(ProviderError::RetryExceeded {
            attempts,
            last_error,
        })
    }
}
