//! One call to the external scoring oracle.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;
use uuid::Uuid;

use crate::gateway::{
    Attribution, ChatGateway, ChatModel, ChatRequest, ChatResponse, FinishReason, GatewayError,
    Message,
};

use super::parse::{parse_judge_response, ParsedScore};

/// Errors surfaced by [`ScoreJudge`]. Neither is retried above the gateway.
#[derive(Debug, thiserror::Error)]
pub enum JudgeError {
    /// Transport or HTTP failure after the gateway exhausted its retries.
    #[error("judge unavailable: {0}")]
    Unavailable(#[from] GatewayError),
    /// The judge answered but no score could be extracted.
    #[error("unparseable judge response")]
    Unparseable { raw: String },
}

impl JudgeError {
    pub fn kind(&self) -> &'static str {
        match self {
            JudgeError::Unavailable(_) => "judge_unavailable",
            JudgeError::Unparseable { .. } => "unparseable",
        }
    }
}

/// What gets sent to the judge.
#[derive(Debug, Clone)]
pub enum PromptPayload {
    /// One instruction string sent as a single user message.
    Combined(String),
    /// Rubric as the system message, query + results as the user message.
    Split { system: String, user: String },
}

impl PromptPayload {
    pub fn to_messages(&self) -> Vec<Message> {
        match self {
            PromptPayload::Combined(text) => vec![Message::user(text)],
            PromptPayload::Split { system, user } => {
                vec![Message::system(system), Message::user(user)]
            }
        }
    }
}

/// A successfully parsed judge answer.
#[derive(Debug, Clone)]
pub struct JudgedScore {
    /// Parsed score before clamping.
    pub score: f64,
    pub reasoning: String,
    pub raw_text: String,
    pub latency: Duration,
    /// The answer stopped at the token limit.
    pub truncated: bool,
}

/// Wraps the judge gateway with model settings and response parsing.
#[derive(Clone)]
pub struct ScoreJudge {
    gateway: Arc<dyn ChatGateway>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    run_id: Option<Uuid>,
}

impl ScoreJudge {
    pub fn new(gateway: Arc<dyn ChatGateway>, model: impl Into<String>) -> Self {
        Self {
            gateway,
            model: model.into(),
            temperature: 0.0,
            max_tokens: None,
            run_id: None,
        }
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.temperature = t;
        self
    }

    pub fn max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn with_run(mut self, run_id: Uuid) -> Self {
        self.run_id = Some(run_id);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send the payload and return the judge's response.
    pub async fn judge(&self, payload: &PromptPayload) -> Result<ChatResponse, JudgeError> {
        let mut attribution = Attribution::new("scoring::judge");
        if let Some(run_id) = self.run_id {
            attribution = attribution.with_run(run_id);
        }
        let mut request = ChatRequest::new(
            ChatModel::new(&self.model),
            payload.to_messages(),
            attribution,
        )
        .temperature(self.temperature);
        if let Some(max) = self.max_tokens {
            request = request.max_tokens(max);
        }

        Ok(self.gateway.chat(request).await?)
    }

    /// Send the payload and parse a score out of the answer.
    pub async fn score(&self, payload: &PromptPayload) -> Result<JudgedScore, JudgeError> {
        let response = self.judge(payload).await?;
        match &response.finish_reason {
            FinishReason::Length => warn!(
                model = %self.model,
                output_tokens = response.output_tokens,
                "judge answer hit the token limit"
            ),
            FinishReason::ContentFilter => {
                warn!(model = %self.model, "judge answer was content-filtered")
            }
            FinishReason::Stop | FinishReason::Unknown(_) => {}
        }
        let truncated = response.finish_reason == FinishReason::Length;
        let ParsedScore { score, reasoning } = parse_judge_response(&response.content)?;
        Ok(JudgedScore {
            score,
            reasoning,
            raw_text: response.content,
            latency: response.latency,
            truncated,
        })
    }
}
