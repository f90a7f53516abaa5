//! Judge gateway: chat completions with bounded, linearly backed-off retries.

pub mod chat;
pub mod error;
pub mod types;

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use chat::{ChatCompletionsAdapter, ChatProvider};

pub use error::{ErrorContext, GatewayError};
pub use types::*;

/// Anything that can answer a chat request. The scoring layer only sees this.
#[async_trait::async_trait]
pub trait ChatGateway: Send + Sync {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, GatewayError>;
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Backoff unit: retry `n` (1-based) waits `n * retry_base_delay`.
    pub retry_base_delay: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_base_delay: Duration::from_secs(1),
        }
    }
}

/// Wraps a [`ChatProvider`] with the retry policy.
pub struct RetryingGateway<P: ChatProvider = ChatCompletionsAdapter> {
    provider: P,
    config: GatewayConfig,
}

#[async_trait::async_trait]
impl<P: ChatProvider> ChatGateway for RetryingGateway<P> {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, GatewayError> {
        RetryingGateway::chat(self, req).await
    }
}

impl RetryingGateway<ChatCompletionsAdapter> {
    pub fn from_env(
        base_url: Option<&str>,
        timeout: Duration,
        config: GatewayConfig,
    ) -> Result<Self, GatewayError> {
        let adapter = ChatCompletionsAdapter::from_env(base_url, timeout)?;
        Ok(Self::with_config(adapter, config))
    }
}

impl<P: ChatProvider> RetryingGateway<P> {
    pub fn with_config(provider: P, config: GatewayConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, GatewayError> {
        let mut attempt: u32 = 0;
        loop {
            match self.provider.chat(&req).await {
                Ok(resp) => {
                    debug!(
                        model = req.model.model_id(),
                        caller = req.attribution.caller,
                        attempt,
                        latency_ms = resp.latency.as_millis() as u64,
                        input_tokens = resp.input_tokens,
                        output_tokens = resp.output_tokens,
                        "judge call succeeded"
                    );
                    return Ok(resp);
                }
                Err(err) => {
                    if !err.is_retryable() || attempt >= self.config.max_retries {
                        let context = err.context();
                        warn!(
                            model = req.model.model_id(),
                            caller = req.attribution.caller,
                            run_id = ?req.attribution.run_id,
                            attempts = attempt + 1,
                            code = err.code(),
                            endpoint_code = context.and_then(|c| c.provider_code.as_deref()),
                            request_id = context.and_then(|c| c.request_id.as_deref()),
                            error = %err,
                            "judge call failed"
                        );
                        return Err(err);
                    }

                    attempt += 1;
                    let delay = backoff_delay(self.config.retry_base_delay, attempt);
                    debug!(
                        code = err.code(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "retrying judge call"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Linear backoff: the `attempt`-th retry waits `attempt * base`.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(attempt)
}
