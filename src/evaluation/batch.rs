//! Multi-round batch orchestration and batch-wide aggregation.
//!
//! Outer rounds run in order, queries run in input order, and all judge calls
//! are issued one at a time. The only concurrency is the provider search
//! fan-out inside a cell, which is joined before anything is recorded.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::EvaluationConfig;
use crate::provider::{
    ProviderRegistry, SearchError, SearchOptions, SearchProvider, SearchResult,
};
use crate::scoring::{ScoreJudge, ScoringSystem};
use crate::trace::TraceSink;

use super::aggregate::{ratio, CrossProviderAggregator, RankCandidate, Standing};
use super::control::RunControl;
use super::single::{EvaluationTarget, SingleQueryEvaluator};
use super::stats::SampleStats;
use super::types::{
    AggregatedPerformance, Availability, BatchCell, BatchResult, CellOutcome, EngineEvaluation,
    ProviderOutcome, QueryEvaluation, ScoreStability, StopReason,
};

/// A (round, query) cell that could not be evaluated.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("query is empty")]
    EmptyQuery,
    #[error("no search providers are registered")]
    NoProviders,
    #[error("evaluation interrupted ({0:?})")]
    Interrupted(StopReason),
}

pub struct BatchAggregationEngine {
    registry: ProviderRegistry,
    evaluator: SingleQueryEvaluator,
    aggregator: CrossProviderAggregator,
    search: SearchOptions,
    test_rounds: usize,
    query_delay: Duration,
    round_delay: Duration,
    run_id: Uuid,
    config_hash: String,
}

impl BatchAggregationEngine {
    pub fn new(registry: ProviderRegistry, evaluator: SingleQueryEvaluator) -> Self {
        let aggregator = CrossProviderAggregator::new(evaluator.scoring_systems());
        Self {
            registry,
            evaluator,
            aggregator,
            search: SearchOptions::default(),
            test_rounds: 3,
            query_delay: Duration::from_millis(2000),
            round_delay: Duration::from_millis(5000),
            run_id: Uuid::new_v4(),
            config_hash: String::new(),
        }
    }

    /// Wire an engine from a validated configuration.
    pub fn from_config(
        config: &EvaluationConfig,
        registry: ProviderRegistry,
        judge: ScoreJudge,
    ) -> Self {
        let evaluator = SingleQueryEvaluator::from_config(config, judge);
        Self::new(registry, evaluator)
            .search_options(config.search.options())
            .test_rounds(config.test_rounds)
            .query_delay(config.query_delay())
            .round_delay(config.round_delay())
            .config_hash(config.fingerprint())
    }

    pub fn search_options(mut self, options: SearchOptions) -> Self {
        self.search = options;
        self
    }

    pub fn test_rounds(mut self, n: usize) -> Self {
        self.test_rounds = n;
        self
    }

    pub fn query_delay(mut self, delay: Duration) -> Self {
        self.query_delay = delay;
        self
    }

    pub fn round_delay(mut self, delay: Duration) -> Self {
        self.round_delay = delay;
        self
    }

    /// Record every dimension score the evaluator produces.
    pub fn with_trace(mut self, sink: Arc<dyn TraceSink>) -> Self {
        self.evaluator = self.evaluator.with_trace(sink);
        self
    }

    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = hash.into();
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Search every provider for `query`, then score each successful result
    /// set in provider order.
    pub async fn evaluate_query(
        &self,
        query: &str,
        test_round: usize,
        control: &RunControl,
    ) -> Result<QueryEvaluation, QueryError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(QueryError::EmptyQuery);
        }
        if self.registry.is_empty() {
            return Err(QueryError::NoProviders);
        }
        if let Some(reason) = control.interrupted() {
            return Err(QueryError::Interrupted(reason));
        }

        let searches: Vec<(String, Result<Vec<SearchResult>, SearchError>)> =
            stream::iter(self.registry.iter().cloned())
                .map(|provider| {
                    let options = self.search.clone();
                    async move {
                        let outcome = search_with_timeout(provider.as_ref(), query, &options).await;
                        (provider.name().to_string(), outcome)
                    }
                })
                .buffered(self.registry.len())
                .collect()
                .await;

        let mut pacer = self.evaluator.pacer();
        let mut engines = Vec::with_capacity(searches.len());
        for (engine, outcome) in searches {
            let outcome = match outcome {
                Ok(results) => {
                    let target = EvaluationTarget {
                        query,
                        engine: &engine,
                        results: &results,
                        test_round,
                        run_id: Some(self.run_id),
                    };
                    let evaluation = self
                        .evaluator
                        .evaluate_paced(target, control, &mut pacer)
                        .await
                        .map_err(QueryError::Interrupted)?;
                    ProviderOutcome::Evaluated(evaluation)
                }
                Err(err) => {
                    warn!(engine = %engine, query, error = %err, "search failed");
                    ProviderOutcome::Failed {
                        error: err.to_string(),
                    }
                }
            };
            engines.push(EngineEvaluation { engine, outcome });
        }

        let summary = self.aggregator.summarize(&engines);
        Ok(QueryEvaluation {
            query: query.to_string(),
            engines,
            summary,
            timestamp: Utc::now(),
        })
    }

    /// Run every outer round over `queries`. Always returns a result; an
    /// interrupted run keeps the cells that finished.
    pub async fn run(&self, queries: &[String], control: &RunControl) -> BatchResult {
        let started_at = Utc::now();
        let mut cells = Vec::with_capacity(self.test_rounds * queries.len());
        let mut stop_reason = StopReason::Completed;

        info!(
            run_id = %self.run_id,
            test_rounds = self.test_rounds,
            queries = queries.len(),
            providers = self.registry.len(),
            "batch started"
        );

        'batch: for test_round in 1..=self.test_rounds {
            if test_round > 1 {
                if let Some(reason) = control.pause(self.round_delay).await {
                    stop_reason = reason;
                    break 'batch;
                }
            }
            info!(test_round, of = self.test_rounds, "test round started");

            for (idx, query) in queries.iter().enumerate() {
                if idx > 0 {
                    if let Some(reason) = control.pause(self.query_delay).await {
                        stop_reason = reason;
                        break 'batch;
                    }
                }

                let outcome = match self.evaluate_query(query, test_round, control).await {
                    Ok(evaluation) => CellOutcome::Completed { evaluation },
                    Err(QueryError::Interrupted(reason)) => {
                        stop_reason = reason;
                        break 'batch;
                    }
                    Err(err) => {
                        warn!(test_round, query = %query, error = %err, "query failed");
                        CellOutcome::Failed {
                            error: err.to_string(),
                        }
                    }
                };
                cells.push(BatchCell {
                    test_round,
                    query: query.clone(),
                    outcome,
                });
            }
        }

        let providers = self.registry.names();
        let systems = self.aggregator.systems().to_vec();
        let performance = aggregate_performance(&cells, &providers, &systems);
        let candidates = rank_candidates(&performance, &providers);
        let rankings = self.aggregator.rank(&candidates);

        info!(
            run_id = %self.run_id,
            cells = cells.len(),
            stop_reason = ?stop_reason,
            "batch finished"
        );

        BatchResult {
            run_id: self.run_id,
            config_hash: self.config_hash.clone(),
            started_at,
            finished_at: Utc::now(),
            stop_reason,
            test_rounds: self.test_rounds,
            queries: queries.to_vec(),
            providers,
            scoring_systems: systems,
            cells,
            performance,
            rankings,
        }
    }
}

async fn search_with_timeout(
    provider: &dyn SearchProvider,
    query: &str,
    options: &SearchOptions,
) -> Result<Vec<SearchResult>, SearchError> {
    match tokio::time::timeout(options.timeout, provider.search(query, options)).await {
        Ok(outcome) => outcome,
        Err(_) => Err(SearchError::Timeout(options.timeout)),
    }
}

/// Per-provider figures over every completed cell.
///
/// A cell counts for a provider when the provider was asked to search. It is
/// successful when at least one scale produced a weighted score; each such
/// (cell, scale) contributes one observation, the cell's mean weighted score.
pub fn aggregate_performance(
    cells: &[BatchCell],
    providers: &[String],
    systems: &[ScoringSystem],
) -> BTreeMap<String, AggregatedPerformance> {
    providers
        .iter()
        .map(|engine| {
            let mut total = 0;
            let mut search_failures = 0;
            let mut evaluated = 0;
            let mut successful = 0;
            let mut samples: BTreeMap<ScoringSystem, Vec<f64>> =
                systems.iter().map(|s| (*s, Vec::new())).collect();

            for cell in cells {
                let CellOutcome::Completed { evaluation } = &cell.outcome else {
                    continue;
                };
                let Some(outcome) = evaluation.engine(engine) else {
                    continue;
                };
                total += 1;
                let Some(eval) = outcome.evaluation() else {
                    search_failures += 1;
                    continue;
                };
                evaluated += 1;

                let mut scored = false;
                for system in systems {
                    if let Some(avg) = eval.average(*system).filter(|a| a.valid_rounds > 0) {
                        scored = true;
                        if let Some(bucket) = samples.get_mut(system) {
                            bucket.push(avg.weighted);
                        }
                    }
                }
                if scored {
                    successful += 1;
                }
            }

            let average_scores: BTreeMap<ScoringSystem, SampleStats> = samples
                .iter()
                .map(|(system, values)| (*system, SampleStats::from_samples(values)))
                .collect();
            let score_stability = average_scores
                .iter()
                .map(|(system, stats)| {
                    (
                        *system,
                        ScoreStability {
                            coefficient_of_variation: stats.coefficient_of_variation(),
                            range: stats.range(),
                        },
                    )
                })
                .collect();

            let availability = if successful > 0 {
                Availability::Evaluated
            } else if evaluated == 0 {
                Availability::NotAttempted
            } else {
                Availability::AttemptedAndFailed
            };

            let performance = AggregatedPerformance {
                success_rate: ratio(successful, total),
                evaluation_success_rate: (evaluated > 0).then(|| ratio(successful, evaluated)),
                availability,
                total_cells: total,
                successful_cells: successful,
                failed_cells: total - successful,
                search_failures,
                average_scores,
                score_stability,
            };
            (engine.clone(), performance)
        })
        .collect()
}

fn rank_candidates(
    performance: &BTreeMap<String, AggregatedPerformance>,
    providers: &[String],
) -> Vec<RankCandidate> {
    providers
        .iter()
        .filter_map(|engine| {
            let perf = performance.get(engine)?;
            let by_scale = perf
                .average_scores
                .iter()
                .filter(|(_, stats)| stats.count > 0)
                .map(|(system, stats)| {
                    (
                        *system,
                        Standing {
                            score: stats.mean,
                            stability: stats.coefficient_of_variation(),
                        },
                    )
                })
                .collect();
            Some(RankCandidate {
                engine: engine.clone(),
                by_scale,
                success_rate: perf.success_rate,
            })
        })
        .collect()
}
