//! Repeated multi-dimension scoring of one provider's result set.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::{Dimension, EvaluationConfig};
use crate::provider::SearchResult;
use crate::scoring::{
    DimensionScorer, JudgeDimensionScorer, ScoreJudge, ScoreRecord, ScoringSystem,
};
use crate::trace::{ScoreTrace, TraceContext, TraceSink};

use super::combiner::combine;
use super::control::{JudgePacer, RunControl};
use super::stats::SampleStats;
use super::types::{ProviderEvaluation, RoundEvaluation, RoundStatus, ScaleAverage, StopReason};

/// The result set under evaluation and where it came from.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationTarget<'a> {
    pub query: &'a str,
    pub engine: &'a str,
    pub results: &'a [SearchResult],
    /// Outer round this evaluation belongs to (1-based).
    pub test_round: usize,
    pub run_id: Option<Uuid>,
}

/// Runs `repeat_times` inner rounds; each round scores every dimension on
/// every configured scale, one judge call at a time.
pub struct SingleQueryEvaluator {
    scorers: Vec<Arc<dyn DimensionScorer>>,
    dimensions: Vec<Dimension>,
    repeat_times: usize,
    dimension_delay: Duration,
    trace: Option<Arc<dyn TraceSink>>,
}

impl SingleQueryEvaluator {
    pub fn new(scorers: Vec<Arc<dyn DimensionScorer>>, dimensions: Vec<Dimension>) -> Self {
        Self {
            scorers,
            dimensions,
            repeat_times: 3,
            dimension_delay: Duration::from_millis(1000),
            trace: None,
        }
    }

    /// One judge-backed scorer per configured scale, with custom rubrics.
    pub fn from_config(config: &EvaluationConfig, judge: ScoreJudge) -> Self {
        let scorers = config
            .scoring_systems
            .iter()
            .map(|system| {
                let scorer = JudgeDimensionScorer::new(judge.clone(), *system)
                    .with_custom_prompts(config.custom_prompts_for(*system));
                Arc::new(scorer) as Arc<dyn DimensionScorer>
            })
            .collect();
        Self::new(scorers, config.dimensions.clone())
            .repeat_times(config.repeat_times)
            .dimension_delay(config.dimension_delay())
    }

    pub fn repeat_times(mut self, n: usize) -> Self {
        self.repeat_times = n;
        self
    }

    pub fn dimension_delay(mut self, delay: Duration) -> Self {
        self.dimension_delay = delay;
        self
    }

    pub fn with_trace(mut self, sink: Arc<dyn TraceSink>) -> Self {
        self.trace = Some(sink);
        self
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn scoring_systems(&self) -> Vec<ScoringSystem> {
        self.scorers.iter().map(|s| s.scoring_system()).collect()
    }

    /// Fresh pacer spacing judge calls by the dimension delay.
    pub fn pacer(&self) -> JudgePacer {
        JudgePacer::new(self.dimension_delay)
    }

    /// Score the target. Returns the stop reason if the run was interrupted
    /// before every round finished; partial work is discarded.
    pub async fn evaluate(
        &self,
        target: EvaluationTarget<'_>,
        control: &RunControl,
    ) -> Result<ProviderEvaluation, StopReason> {
        let mut pacer = self.pacer();
        self.evaluate_paced(target, control, &mut pacer).await
    }

    /// [`evaluate`](Self::evaluate) with a caller-owned pacer, so the delay
    /// also separates the last call for one provider from the first call for
    /// the next.
    pub async fn evaluate_paced(
        &self,
        target: EvaluationTarget<'_>,
        control: &RunControl,
        pacer: &mut JudgePacer,
    ) -> Result<ProviderEvaluation, StopReason> {
        let mut rounds = Vec::with_capacity(self.repeat_times * self.scorers.len());

        for round in 1..=self.repeat_times {
            if let Some(reason) = control.interrupted() {
                return Err(reason);
            }

            for scorer in &self.scorers {
                let system = scorer.scoring_system();
                let mut scores = BTreeMap::new();

                for dimension in &self.dimensions {
                    // empty result sets are scored without a judge call
                    let stop = if target.results.is_empty() {
                        control.interrupted()
                    } else {
                        pacer.before_call(control).await
                    };
                    if let Some(reason) = stop {
                        return Err(reason);
                    }

                    let record = scorer
                        .score_dimension_batch(target.results, target.query, dimension)
                        .await;
                    self.emit_trace(&target, round, &record);
                    scores.insert(dimension.name.clone(), record);
                }

                let weighted_score = combine(&scores, &self.dimensions);
                let status = round_status(&scores);
                debug!(
                    engine = target.engine,
                    query = target.query,
                    round,
                    scoring_system = %system,
                    weighted_score,
                    ?status,
                    "round scored"
                );
                rounds.push(RoundEvaluation {
                    round,
                    scoring_system: system,
                    overall_scores: scores,
                    weighted_score,
                    status,
                    timestamp: Utc::now(),
                });
            }
        }

        let average_scores = self
            .scorers
            .iter()
            .map(|s| {
                let system = s.scoring_system();
                (system, average_rounds(&rounds, system, &self.dimensions))
            })
            .collect();

        Ok(ProviderEvaluation {
            result_count: target.results.len(),
            rounds,
            average_scores,
        })
    }

    fn emit_trace(&self, target: &EvaluationTarget<'_>, round: usize, record: &ScoreRecord) {
        let Some(sink) = &self.trace else {
            return;
        };
        let ctx = TraceContext {
            run_id: target.run_id,
            test_round: target.test_round,
            query: target.query,
            engine: target.engine,
        };
        if let Err(err) = sink.record(ScoreTrace::from_record(ctx, round, record)) {
            warn!(error = %err, "failed to record score trace");
        }
    }
}

fn round_status(scores: &BTreeMap<String, ScoreRecord>) -> RoundStatus {
    let scored = scores.values().filter(|r| !r.error).count();
    if scored == 0 {
        RoundStatus::Failed
    } else if scored == scores.len() {
        RoundStatus::Success
    } else {
        RoundStatus::Partial
    }
}

/// Aggregate the rounds of one scale. Failed rounds are left out entirely;
/// inside valid rounds, errored dimensions are left out of that dimension's
/// mean.
pub fn average_rounds(
    rounds: &[RoundEvaluation],
    system: ScoringSystem,
    dimensions: &[Dimension],
) -> ScaleAverage {
    let scale_rounds: Vec<&RoundEvaluation> = rounds
        .iter()
        .filter(|r| r.scoring_system == system)
        .collect();
    let valid: Vec<&RoundEvaluation> = scale_rounds
        .iter()
        .copied()
        .filter(|r| r.status.is_valid())
        .collect();

    let dimension_means = dimensions
        .iter()
        .map(|d| {
            let values: Vec<f64> = valid
                .iter()
                .filter_map(|r| r.overall_scores.get(&d.name))
                .filter(|rec| !rec.error)
                .map(|rec| f64::from(rec.score))
                .collect();
            (d.name.clone(), SampleStats::from_samples(&values).mean)
        })
        .collect();

    let weighted: Vec<f64> = valid.iter().map(|r| r.weighted_score).collect();
    let stats = SampleStats::from_samples(&weighted);

    ScaleAverage {
        dimensions: dimension_means,
        weighted: stats.mean,
        weighted_std_dev: stats.std_dev,
        weighted_cov: stats.coefficient_of_variation(),
        valid_rounds: valid.len(),
        error_rounds: scale_rounds.len() - valid.len(),
        total_rounds: scale_rounds.len(),
    }
}
