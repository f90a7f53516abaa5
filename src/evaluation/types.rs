//! Evaluation data model.
//!
//! Everything here is produced by one run, frozen once the run finishes and
//! handed to the export layer as plain data.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::scoring::{ScoreRecord, ScoringSystem};

use super::stats::SampleStats;

// =============================================================================
// Single query
// =============================================================================

/// Outcome of one inner round for one scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundStatus {
    /// Every dimension scored.
    Success,
    /// Some dimensions errored; the weighted score covers the survivors.
    Partial,
    /// No dimension scored; the round is excluded from averages.
    Failed,
}

impl RoundStatus {
    pub fn is_valid(self) -> bool {
        !matches!(self, RoundStatus::Failed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundEvaluation {
    /// 1-based inner round number.
    pub round: usize,
    pub scoring_system: ScoringSystem,
    pub overall_scores: BTreeMap<String, ScoreRecord>,
    pub weighted_score: f64,
    pub status: RoundStatus,
    pub timestamp: DateTime<Utc>,
}

/// Per-scale aggregate over the inner rounds of one provider evaluation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScaleAverage {
    pub dimensions: BTreeMap<String, f64>,
    pub weighted: f64,
    pub weighted_std_dev: f64,
    pub weighted_cov: f64,
    pub valid_rounds: usize,
    pub error_rounds: usize,
    pub total_rounds: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEvaluation {
    pub result_count: usize,
    /// Inner rounds, grouped by round number then scale.
    pub rounds: Vec<RoundEvaluation>,
    pub average_scores: BTreeMap<ScoringSystem, ScaleAverage>,
}

impl ProviderEvaluation {
    pub fn average(&self, system: ScoringSystem) -> Option<&ScaleAverage> {
        self.average_scores.get(&system)
    }
}

/// What happened to one provider for one query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProviderOutcome {
    Evaluated(ProviderEvaluation),
    /// The search itself failed; nothing was scored.
    Failed { error: String },
}

impl ProviderOutcome {
    pub fn evaluation(&self) -> Option<&ProviderEvaluation> {
        match self {
            ProviderOutcome::Evaluated(eval) => Some(eval),
            ProviderOutcome::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ProviderOutcome::Evaluated(_) => None,
            ProviderOutcome::Failed { error } => Some(error),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineEvaluation {
    pub engine: String,
    #[serde(flatten)]
    pub outcome: ProviderOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankingEntry {
    /// 1-based position.
    pub rank: usize,
    pub engine: String,
    pub score: f64,
    /// Coefficient of variation; lower is steadier.
    pub stability: f64,
    pub success_rate: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Rankings {
    pub by_scale: BTreeMap<ScoringSystem, Vec<RankingEntry>>,
    pub combined: Vec<RankingEntry>,
}

impl Rankings {
    pub fn scale(&self, system: ScoringSystem) -> &[RankingEntry] {
        self.by_scale
            .get(&system)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderFailure {
    pub engine: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuerySummary {
    pub rankings: Rankings,
    pub successful: usize,
    pub failed: usize,
    pub errors: Vec<ProviderFailure>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryEvaluation {
    pub query: String,
    /// In provider registration order.
    pub engines: Vec<EngineEvaluation>,
    pub summary: QuerySummary,
    pub timestamp: DateTime<Utc>,
}

impl QueryEvaluation {
    pub fn engine(&self, name: &str) -> Option<&ProviderOutcome> {
        self.engines
            .iter()
            .find(|e| e.engine == name)
            .map(|e| &e.outcome)
    }
}

// =============================================================================
// Batch
// =============================================================================

/// Why a batch stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Completed,
    Cancelled,
    DeadlineExceeded,
}

/// One (outer round, query) cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchCell {
    /// 1-based outer round.
    pub test_round: usize,
    pub query: String,
    #[serde(flatten)]
    pub outcome: CellOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CellOutcome {
    Completed { evaluation: QueryEvaluation },
    Failed { error: String },
}

/// Whether a provider ever produced a usable score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    /// At least one cell produced a weighted score.
    Evaluated,
    /// Every search failed, so evaluation never started.
    NotAttempted,
    /// Searches succeeded but no round produced a weighted score.
    AttemptedAndFailed,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScoreStability {
    pub coefficient_of_variation: f64,
    pub range: f64,
}

/// Batch-wide figures for one provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AggregatedPerformance {
    /// successful cells / cells where the provider was asked to search.
    pub success_rate: f64,
    /// successful cells / cells where evaluation started; `None` if none did.
    pub evaluation_success_rate: Option<f64>,
    pub availability: Availability,
    pub total_cells: usize,
    pub successful_cells: usize,
    pub failed_cells: usize,
    pub search_failures: usize,
    pub average_scores: BTreeMap<ScoringSystem, SampleStats>,
    pub score_stability: BTreeMap<ScoringSystem, ScoreStability>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    pub run_id: Uuid,
    pub config_hash: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stop_reason: StopReason,
    pub test_rounds: usize,
    pub queries: Vec<String>,
    pub providers: Vec<String>,
    pub scoring_systems: Vec<ScoringSystem>,
    pub cells: Vec<BatchCell>,
    /// Keyed by provider name.
    pub performance: BTreeMap<String, AggregatedPerformance>,
    pub rankings: Rankings,
}

impl BatchResult {
    pub fn performance(&self, engine: &str) -> Option<&AggregatedPerformance> {
        self.performance.get(engine)
    }

    pub fn completed_cells(&self) -> usize {
        self.cells
            .iter()
            .filter(|c| matches!(c.outcome, CellOutcome::Completed { .. }))
            .count()
    }
}
