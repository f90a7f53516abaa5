//! Batch-mode dimension scoring: one judge call per (result set, dimension).

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::Dimension;
use crate::prompts::render_scoring_prompt;
use crate::provider::SearchResult;

use super::judge::{JudgeError, ScoreJudge};
use super::scale::ScoringSystem;

/// Outcome of scoring one result set on one dimension.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoreRecord {
    pub dimension: String,
    pub scoring_system: ScoringSystem,
    /// Clamped into the scale when `error` is false; 0 when `error` is true.
    pub score: i32,
    /// Judge rationale, or the raw response / failure message on error.
    pub reasoning: String,
    pub result_count: usize,
    pub timestamp: DateTime<Utc>,
    pub error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(default)]
    pub latency_ms: u64,
}

impl ScoreRecord {
    pub fn scored(
        dimension: &Dimension,
        system: ScoringSystem,
        score: i32,
        reasoning: impl Into<String>,
        result_count: usize,
    ) -> Self {
        Self {
            dimension: dimension.name.clone(),
            scoring_system: system,
            score,
            reasoning: reasoning.into(),
            result_count,
            timestamp: Utc::now(),
            error: false,
            error_kind: None,
            latency_ms: 0,
        }
    }

    pub fn failed(
        dimension: &Dimension,
        system: ScoringSystem,
        kind: &str,
        reasoning: impl Into<String>,
        result_count: usize,
    ) -> Self {
        Self {
            dimension: dimension.name.clone(),
            scoring_system: system,
            score: 0,
            reasoning: reasoning.into(),
            result_count,
            timestamp: Utc::now(),
            error: true,
            error_kind: Some(kind.to_string()),
            latency_ms: 0,
        }
    }
}

/// Scores a whole result set on one dimension for one scale.
///
/// Implementations never fail: every error degrades into a flagged record.
#[async_trait]
pub trait DimensionScorer: Send + Sync {
    fn scoring_system(&self) -> ScoringSystem;

    async fn score_dimension_batch(
        &self,
        results: &[SearchResult],
        query: &str,
        dimension: &Dimension,
    ) -> ScoreRecord;
}

/// [`DimensionScorer`] backed by the LLM judge.
pub struct JudgeDimensionScorer {
    judge: ScoreJudge,
    system: ScoringSystem,
    /// dimension name -> custom rubric
    custom_prompts: HashMap<String, String>,
}

impl JudgeDimensionScorer {
    pub fn new(judge: ScoreJudge, system: ScoringSystem) -> Self {
        Self {
            judge,
            system,
            custom_prompts: HashMap::new(),
        }
    }

    pub fn with_custom_prompts(mut self, prompts: HashMap<String, String>) -> Self {
        self.custom_prompts = prompts;
        self
    }
}

#[async_trait]
impl DimensionScorer for JudgeDimensionScorer {
    fn scoring_system(&self) -> ScoringSystem {
        self.system
    }

    async fn score_dimension_batch(
        &self,
        results: &[SearchResult],
        query: &str,
        dimension: &Dimension,
    ) -> ScoreRecord {
        let system = self.system;
        if results.is_empty() {
            return ScoreRecord::scored(
                dimension,
                system,
                system.min(),
                "provider returned no results",
                0,
            );
        }

        let custom = self.custom_prompts.get(&dimension.name).map(String::as_str);
        let payload = render_scoring_prompt(query, results, dimension, system, custom);

        match self.judge.score(&payload).await {
            Ok(judged) => {
                let score = system.clamp(judged.score);
                let mut reasoning = judged.reasoning;
                if (f64::from(score) - judged.score).abs() > f64::EPSILON {
                    debug!(
                        dimension = %dimension.name,
                        scoring_system = %system,
                        raw_score = judged.score,
                        score,
                        "clamped judge score into scale"
                    );
                    append_note(
                        &mut reasoning,
                        &format!("[raw score {} clamped to {score}]", judged.score),
                    );
                }
                if judged.truncated {
                    append_note(&mut reasoning, "[judge answer truncated at the token limit]");
                }
                let mut record =
                    ScoreRecord::scored(dimension, system, score, reasoning, results.len());
                record.latency_ms = judged.latency.as_millis() as u64;
                record
            }
            Err(err) => {
                warn!(
                    dimension = %dimension.name,
                    scoring_system = %system,
                    kind = err.kind(),
                    error = %err,
                    "dimension scoring failed"
                );
                let reasoning = match &err {
                    JudgeError::Unparseable { raw } => raw.clone(),
                    JudgeError::Unavailable(e) => e.to_string(),
                };
                ScoreRecord::failed(dimension, system, err.kind(), reasoning, results.len())
            }
        }
    }
}

fn append_note(reasoning: &mut String, note: &str) {
    if !reasoning.is_empty() {
        reasoning.push(' ');
    }
    reasoning.push_str(note);
}
