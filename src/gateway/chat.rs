//! OpenAI-compatible chat completions adapter used to reach the judge.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use super::error::{ErrorContext, GatewayError};
use super::types::*;

// =============================================================================
// TRAIT
// =============================================================================

/// Trait for a single-shot chat completion backend (no retries).
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse, GatewayError>;
}

// =============================================================================
// ADAPTER
// =============================================================================

/// Maximum allowed response body length (1MB).
const MAX_RESPONSE_LEN: usize = 1_024 * 1_024;

/// Maximum allowed input characters (~125k tokens).
const MAX_INPUT_CHARS: usize = 500_000;

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Chat completions adapter for any OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct ChatCompletionsAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl ChatCompletionsAdapter {
    /// Create from API key against the default endpoint.
    pub fn new(api_key: impl Into<String>) -> Result<Self, GatewayError> {
        Self::with_config(api_key, DEFAULT_BASE_URL, Duration::from_secs(60))
    }

    /// Create from environment variables.
    ///
    /// `ARENA_JUDGE_API_KEY` is required. `ARENA_JUDGE_BASE_URL` and
    /// `ARENA_JUDGE_TIMEOUT_SECONDS` override the given defaults.
    pub fn from_env(
        default_base_url: Option<&str>,
        default_timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let api_key = std::env::var("ARENA_JUDGE_API_KEY")
            .map_err(|_| GatewayError::config("ARENA_JUDGE_API_KEY not set"))?;

        let base_url = std::env::var("ARENA_JUDGE_BASE_URL")
            .ok()
            .or_else(|| default_base_url.map(str::to_string))
            .unwrap_or_else(|| DEFAULT_BASE_URL.into());

        let timeout = std::env::var("ARENA_JUDGE_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(default_timeout);

        Self::with_config(api_key, base_url, timeout)
    }

    /// Create with custom configuration.
    pub fn with_config(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let api_key = api_key.into();
        let base_url = base_url.into().trim_end_matches('/').to_string();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let auth_value = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| GatewayError::config("Invalid API key format"))?;
        headers.insert(AUTHORIZATION, auth_value);

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| GatewayError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, base_url })
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn extract_request_id(headers: &HeaderMap) -> Option<String> {
        headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    }
}

// =============================================================================
// API TYPES
// =============================================================================

#[derive(Serialize)]
struct ChatApiRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ChatApiResponse {
    choices: Option<Vec<Choice>>,
    usage: Option<Usage>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ApiError {
    message: Option<String>,
    code: Option<serde_json::Value>,
}

// =============================================================================
// CHAT PROVIDER IMPL
// =============================================================================

#[async_trait]
impl ChatProvider for ChatCompletionsAdapter {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse, GatewayError> {
        let total_chars: usize = req.messages.iter().map(|m| m.content.len()).sum();
        if total_chars > MAX_INPUT_CHARS {
            return Err(GatewayError::invalid_request(format!(
                "Input too large: {total_chars} chars (max {MAX_INPUT_CHARS})"
            )));
        }

        let start = Instant::now();

        let api_req = ChatApiRequest {
            model: req.model.model_id(),
            messages: &req.messages,
            temperature: req.temperature,
            max_tokens: req.max_tokens,
        };

        let mut response = self
            .client
            .post(self.chat_url())
            .json(&api_req)
            .send()
            .await?;

        let status = response.status();
        let request_id = Self::extract_request_id(response.headers());

        // Stream response to enforce size limit
        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            let new_len = bytes.len() + chunk.len();
            if new_len > MAX_RESPONSE_LEN {
                return Err(GatewayError::provider(
                    format!("Response too large: {new_len} bytes"),
                    false,
                ));
            }
            bytes.extend_from_slice(&chunk);
        }

        let body = String::from_utf8_lossy(&bytes).to_string();

        let ctx = ErrorContext::new().with_status(status.as_u16());
        let ctx = match &request_id {
            Some(id) => ctx.with_request_id(id),
            None => ctx,
        };

        if !status.is_success() {
            if status.as_u16() == 429 {
                return Err(GatewayError::RateLimited {
                    retry_after: Duration::from_secs(1),
                    context: Some(ctx),
                });
            }

            let message = serde_json::from_str::<ChatApiResponse>(&body)
                .ok()
                .and_then(|parsed| parsed.error)
                .map(|error| {
                    if let Some(code) = error.code {
                        let code = match code {
                            serde_json::Value::String(s) => s,
                            other => other.to_string(),
                        };
                        return (error.message.unwrap_or_default(), Some(code));
                    }
                    (error.message.unwrap_or_default(), None)
                });

            return Err(match message {
                Some((message, code)) => {
                    let ctx = match code {
                        Some(code) => ctx.with_code(code),
                        None => ctx,
                    };
                    GatewayError::provider_with_context(message, true, ctx)
                }
                None => GatewayError::provider_with_context(
                    format!("HTTP {}", status.as_u16()),
                    true,
                    ctx,
                ),
            });
        }

        let parsed: ChatApiResponse = serde_json::from_str(&body)
            .map_err(|e| GatewayError::provider(format!("Invalid JSON: {e}"), true))?;

        if let Some(error) = parsed.error {
            let message = error.message.unwrap_or_default();
            return Err(GatewayError::provider(message, true));
        }

        let choice = parsed
            .choices
            .and_then(|c| c.into_iter().next())
            .ok_or_else(|| GatewayError::provider("No choices in response", true))?;

        let content = choice
            .message
            .and_then(|m| m.content)
            .unwrap_or_default();

        let (input_tokens, output_tokens) = parsed
            .usage
            .map(|u| (u.prompt_tokens.unwrap_or(0), u.completion_tokens.unwrap_or(0)))
            .unwrap_or((0, 0));

        Ok(ChatResponse {
            content,
            input_tokens,
            output_tokens,
            latency: start.elapsed(),
            finish_reason: FinishReason::from(choice.finish_reason),
        })
    }
}
