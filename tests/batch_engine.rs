use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use search_arena::config::Dimension;
use search_arena::evaluation::{
    combine, Availability, BatchAggregationEngine, CellOutcome, EvaluationTarget, RoundStatus,
    RunControl, SingleQueryEvaluator, StopReason,
};
use search_arena::gateway::{ChatGateway, ChatRequest, ChatResponse, GatewayError};
use search_arena::provider::{
    FixtureSearchProvider, ProviderRegistry, SearchError, SearchOptions, SearchProvider,
    SearchResult,
};
use search_arena::report::{build_report, ReportOptions};
use search_arena::scoring::{DimensionScorer, JudgeDimensionScorer, ScoreJudge, ScoringSystem};

// =============================================================================
// Stubs
// =============================================================================

#[derive(Debug, Clone)]
struct Call {
    index: usize,
    dimension: String,
    system: ScoringSystem,
}

type Script = dyn Fn(&Call) -> Result<String, GatewayError> + Send + Sync;

/// Judge stub answering from a script keyed by call order, dimension and scale.
struct ScriptedJudge {
    script: Box<Script>,
    calls: AtomicUsize,
    log: Mutex<Vec<(String, ScoringSystem)>>,
    cancel_after: Option<(usize, Arc<AtomicBool>)>,
}

impl ScriptedJudge {
    fn new(script: impl Fn(&Call) -> Result<String, GatewayError> + Send + Sync + 'static) -> Self {
        Self {
            script: Box::new(script),
            calls: AtomicUsize::new(0),
            log: Mutex::new(Vec::new()),
            cancel_after: None,
        }
    }

    fn constant(score: i32) -> Self {
        Self::new(move |_| Ok(format!("<result>{score}</result>")))
    }

    fn cancel_after(mut self, calls: usize, flag: Arc<AtomicBool>) -> Self {
        self.cancel_after = Some((calls, flag));
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn log(&self) -> Vec<(String, ScoringSystem)> {
        self.log.lock().unwrap().clone()
    }
}

fn parse_call(transcript: &str) -> (String, ScoringSystem) {
    let marker = "Score the result list on ";
    let start = transcript.find(marker).expect("user prompt marker") + marker.len();
    let rest = &transcript[start..];
    let end = rest.find(" using integers").expect("scale marker");
    let system = if rest[end..].starts_with(" using integers from 0 to 2") {
        ScoringSystem::Binary
    } else {
        ScoringSystem::FivePoint
    };
    (rest[..end].to_string(), system)
}

#[async_trait]
impl ChatGateway for ScriptedJudge {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, GatewayError> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        let (dimension, system) = parse_call(&req.transcript());
        self.log.lock().unwrap().push((dimension.clone(), system));
        if let Some((after, flag)) = &self.cancel_after {
            if index + 1 >= *after {
                flag.store(true, Ordering::SeqCst);
            }
        }
        let call = Call {
            index,
            dimension,
            system,
        };
        (self.script)(&call).map(ChatResponse::text)
    }
}

struct SlowProvider {
    name: &'static str,
    delay: Duration,
}

#[async_trait]
impl SearchProvider for SlowProvider {
    fn name(&self) -> &str {
        self.name
    }

    async fn search(
        &self,
        _query: &str,
        _options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, SearchError> {
        tokio::time::sleep(self.delay).await;
        Ok(results(1))
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn results(n: usize) -> Vec<SearchResult> {
    (0..n)
        .map(|i| SearchResult {
            title: format!("Result {i}"),
            url: format!("https://example.com/{i}"),
            snippet: format!("snippet {i}"),
            source: "example.com".into(),
            published_time: None,
        })
        .collect()
}

fn evaluator(
    judge: &Arc<ScriptedJudge>,
    dims: Vec<Dimension>,
    systems: &[ScoringSystem],
    repeat: usize,
) -> SingleQueryEvaluator {
    let score_judge = ScoreJudge::new(judge.clone(), "stub-judge");
    let scorers = systems
        .iter()
        .map(|s| {
            Arc::new(JudgeDimensionScorer::new(score_judge.clone(), *s)) as Arc<dyn DimensionScorer>
        })
        .collect();
    SingleQueryEvaluator::new(scorers, dims)
        .repeat_times(repeat)
        .dimension_delay(Duration::ZERO)
}

fn engine(
    registry: ProviderRegistry,
    evaluator: SingleQueryEvaluator,
    rounds: usize,
) -> BatchAggregationEngine {
    BatchAggregationEngine::new(registry, evaluator)
        .test_rounds(rounds)
        .query_delay(Duration::ZERO)
        .round_delay(Duration::ZERO)
}

fn queries(list: &[&str]) -> Vec<String> {
    list.iter().map(|q| q.to_string()).collect()
}

fn a_and_failing_b() -> ProviderRegistry {
    ProviderRegistry::new()
        .with(Arc::new(FixtureSearchProvider::constant("A", results(3))))
        .with(Arc::new(FixtureSearchProvider::failing("B", "quota exhausted")))
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn end_to_end_failed_search_is_counted_as_failed_cell_and_not_attempted() {
    let judge = Arc::new(ScriptedJudge::constant(5));
    let dims = vec![Dimension::new("relevance", 1.0, "")];
    let eval = evaluator(&judge, dims, &[ScoringSystem::FivePoint], 1);
    let engine = engine(a_and_failing_b(), eval, 1);

    let result = engine.run(&queries(&["rust async"]), &RunControl::new()).await;
    assert_eq!(result.stop_reason, StopReason::Completed);
    assert_eq!(judge.calls(), 1);

    let a = result.performance("A").unwrap();
    assert_eq!(a.success_rate, 1.0);
    assert_eq!(a.evaluation_success_rate, Some(1.0));
    assert_eq!(a.availability, Availability::Evaluated);
    let a_five = a.average_scores[&ScoringSystem::FivePoint];
    assert_eq!(a_five.mean, 5.0);
    assert_eq!(a_five.std_dev, 0.0);
    assert_eq!(a_five.count, 1);

    // Counted over cells where B was asked to search.
    let b = result.performance("B").unwrap();
    assert_eq!(b.success_rate, 0.0);
    assert_eq!(b.total_cells, 1);
    assert_eq!(b.search_failures, 1);
    // Counted over cells where evaluation started: there were none.
    assert_eq!(b.evaluation_success_rate, None);
    assert_eq!(b.availability, Availability::NotAttempted);
    assert_eq!(b.average_scores[&ScoringSystem::FivePoint].count, 0);

    let five = result.rankings.scale(ScoringSystem::FivePoint);
    assert_eq!(five.len(), 1);
    assert_eq!(five[0].engine, "A");
    assert_eq!(five[0].rank, 1);
    assert_eq!(five[0].score, 5.0);
    assert_eq!(result.rankings.combined.len(), 1);
    assert_eq!(result.rankings.combined[0].score, 1.0);

    let CellOutcome::Completed { evaluation } = &result.cells[0].outcome else {
        panic!("cell should complete");
    };
    assert_eq!(evaluation.summary.successful, 1);
    assert_eq!(evaluation.summary.failed, 1);
    assert_eq!(evaluation.summary.errors[0].engine, "B");
    assert_eq!(evaluation.summary.errors[0].error, "quota exhausted");
    assert_eq!(evaluation.engine("B").and_then(|o| o.error()), Some("quota exhausted"));
}

#[tokio::test]
async fn provider_whose_every_round_fails_is_attempted_and_failed() {
    let judge = Arc::new(ScriptedJudge::new(|_| {
        Err(GatewayError::config("judge offline"))
    }));
    let dims = vec![Dimension::new("relevance", 1.0, "")];
    let eval = evaluator(&judge, dims, &[ScoringSystem::FivePoint], 2);
    let registry =
        ProviderRegistry::new().with(Arc::new(FixtureSearchProvider::constant("C", results(2))));
    let result = engine(registry, eval, 1)
        .run(&queries(&["rust"]), &RunControl::new())
        .await;

    let c = result.performance("C").unwrap();
    assert_eq!(c.success_rate, 0.0);
    assert_eq!(c.evaluation_success_rate, Some(0.0));
    assert_eq!(c.availability, Availability::AttemptedAndFailed);
    assert_eq!(c.failed_cells, 1);
    assert!(result.rankings.scale(ScoringSystem::FivePoint).is_empty());
    assert!(result.rankings.combined.is_empty());

    let CellOutcome::Completed { evaluation } = &result.cells[0].outcome else {
        panic!("cell should complete");
    };
    let avg = evaluation.engine("C").unwrap().evaluation().unwrap().average_scores
        [&ScoringSystem::FivePoint]
        .clone();
    assert_eq!(avg.error_rounds, 2);
    assert_eq!(avg.valid_rounds, 0);
}

#[tokio::test]
async fn deterministic_judge_gives_identical_statistics_across_runs() {
    let script = |call: &Call| -> Result<String, GatewayError> {
        let score = match (call.dimension.as_str(), call.system) {
            ("relevance", ScoringSystem::FivePoint) => 4,
            ("freshness", ScoringSystem::FivePoint) => 3,
            ("relevance", ScoringSystem::Binary) => 2,
            _ => 1,
        };
        Ok(format!(r#"<result>{{"score": {score}, "reasoning": "stub"}}</result>"#))
    };
    let dims = vec![
        Dimension::new("relevance", 0.7, ""),
        Dimension::new("freshness", 0.3, ""),
    ];
    let systems = [ScoringSystem::Binary, ScoringSystem::FivePoint];
    let qs = queries(&["rust async", "tokio select"]);

    let mut outcomes = Vec::new();
    for _ in 0..2 {
        let judge = Arc::new(ScriptedJudge::new(script));
        let registry = ProviderRegistry::new()
            .with(Arc::new(FixtureSearchProvider::constant("A", results(3))))
            .with(Arc::new(FixtureSearchProvider::constant("B", results(5))));
        let result = engine(registry, evaluator(&judge, dims.clone(), &systems, 2), 2)
            .run(&qs, &RunControl::new())
            .await;
        // 2 rounds x 2 queries x 2 providers x 2 repeats x 2 scales x 2 dims
        assert_eq!(judge.calls(), 64);
        outcomes.push(result);
    }

    assert_eq!(outcomes[0].performance, outcomes[1].performance);
    assert_eq!(outcomes[0].rankings, outcomes[1].rankings);
    let opts = ReportOptions::default();
    assert_eq!(
        build_report(&outcomes[0], &opts).run_stamp.report_hash,
        build_report(&outcomes[1], &opts).run_stamp.report_hash
    );

    let a = outcomes[0].performance("A").unwrap();
    let five = a.average_scores[&ScoringSystem::FivePoint];
    assert!((five.mean - (4.0 * 0.7 + 3.0 * 0.3)).abs() < 1e-9);
    assert_eq!(five.count, 4);
    assert!(five.std_dev.abs() < 1e-12);
}

#[tokio::test]
async fn constant_scores_have_zero_coefficient_of_variation() {
    let judge = Arc::new(ScriptedJudge::constant(4));
    let dims = vec![Dimension::new("relevance", 1.0, "")];
    let registry =
        ProviderRegistry::new().with(Arc::new(FixtureSearchProvider::constant("A", results(3))));
    let result = engine(
        registry,
        evaluator(&judge, dims, &[ScoringSystem::FivePoint], 1),
        3,
    )
    .run(&queries(&["rust"]), &RunControl::new())
    .await;

    let a = result.performance("A").unwrap();
    assert_eq!(a.average_scores[&ScoringSystem::FivePoint].count, 3);
    assert_eq!(
        a.score_stability[&ScoringSystem::FivePoint].coefficient_of_variation,
        0.0
    );
    assert_eq!(a.score_stability[&ScoringSystem::FivePoint].range, 0.0);
}

#[tokio::test]
async fn varying_scores_have_positive_spread_after_clamping() {
    let judge = Arc::new(ScriptedJudge::new(|call| {
        let score = [2, 4, 6][call.index % 3];
        Ok(format!("<result>{score}</result>"))
    }));
    let dims = vec![Dimension::new("relevance", 1.0, "")];
    let registry =
        ProviderRegistry::new().with(Arc::new(FixtureSearchProvider::constant("A", results(3))));
    let result = engine(
        registry,
        evaluator(&judge, dims, &[ScoringSystem::FivePoint], 1),
        3,
    )
    .run(&queries(&["rust"]), &RunControl::new())
    .await;

    let a = result.performance("A").unwrap();
    let stats = a.average_scores[&ScoringSystem::FivePoint];
    assert_eq!(stats.max, 5.0);
    assert_eq!(stats.min, 2.0);
    assert!(stats.std_dev > 0.0);
    assert!(a.score_stability[&ScoringSystem::FivePoint].coefficient_of_variation > 0.0);
}

#[tokio::test]
async fn failing_dimension_is_excluded_without_failing_the_round() {
    let judge = Arc::new(ScriptedJudge::new(|call| match call.dimension.as_str() {
        "D" => Ok("no idea".to_string()),
        "A" => Ok("<result>4</result>".to_string()),
        _ => Ok("<result>2</result>".to_string()),
    }));
    let dims = vec![
        Dimension::new("A", 0.5, ""),
        Dimension::new("B", 0.3, ""),
        Dimension::new("D", 0.2, ""),
    ];
    let eval = evaluator(&judge, dims.clone(), &[ScoringSystem::FivePoint], 2);
    let hits = results(3);
    let evaluation = eval
        .evaluate(
            EvaluationTarget {
                query: "rust",
                engine: "A",
                results: &hits,
                test_round: 1,
                run_id: None,
            },
            &RunControl::new(),
        )
        .await
        .unwrap();

    assert_eq!(evaluation.rounds.len(), 2);
    for round in &evaluation.rounds {
        assert_eq!(round.status, RoundStatus::Partial);
        assert!(round.overall_scores["D"].error);
        assert_eq!(round.weighted_score, combine(&round.overall_scores, &dims));
        assert!((round.weighted_score - (4.0 * 0.5 + 2.0 * 0.3) / 0.8).abs() < 1e-12);
    }

    let avg = &evaluation.average_scores[&ScoringSystem::FivePoint];
    assert_eq!(avg.error_rounds, 0);
    assert_eq!(avg.valid_rounds, 2);
    assert_eq!(avg.total_rounds, 2);
    assert_eq!(avg.dimensions["A"], 4.0);
    assert_eq!(avg.dimensions["D"], 0.0);
    assert_eq!(avg.weighted_cov, 0.0);
}

#[tokio::test]
async fn judge_calls_follow_scale_then_dimension_order() {
    let judge = Arc::new(ScriptedJudge::constant(1));
    let dims = vec![
        Dimension::new("authority", 0.5, ""),
        Dimension::new("relevance", 0.5, ""),
    ];
    let eval = evaluator(
        &judge,
        dims,
        &[ScoringSystem::Binary, ScoringSystem::FivePoint],
        2,
    );
    let hits = results(1);
    eval.evaluate(
        EvaluationTarget {
            query: "rust",
            engine: "A",
            results: &hits,
            test_round: 1,
            run_id: None,
        },
        &RunControl::new(),
    )
    .await
    .unwrap();

    let expected_round = vec![
        ("authority".to_string(), ScoringSystem::Binary),
        ("relevance".to_string(), ScoringSystem::Binary),
        ("authority".to_string(), ScoringSystem::FivePoint),
        ("relevance".to_string(), ScoringSystem::FivePoint),
    ];
    let expected: Vec<_> = expected_round.iter().chain(&expected_round).cloned().collect();
    assert_eq!(judge.log(), expected);
}

#[tokio::test]
async fn pre_cancelled_run_records_nothing() {
    let judge = Arc::new(ScriptedJudge::constant(3));
    let dims = vec![Dimension::new("relevance", 1.0, "")];
    let eval = evaluator(&judge, dims, &[ScoringSystem::FivePoint], 1);
    let flag = Arc::new(AtomicBool::new(true));

    let result = engine(a_and_failing_b(), eval, 2)
        .run(
            &queries(&["rust"]),
            &RunControl::new().with_cancel_flag(flag),
        )
        .await;

    assert_eq!(result.stop_reason, StopReason::Cancelled);
    assert!(result.cells.is_empty());
    assert_eq!(judge.calls(), 0);
    assert_eq!(result.performance("A").unwrap().total_cells, 0);
    assert_eq!(
        result.performance("A").unwrap().availability,
        Availability::NotAttempted
    );
}

#[tokio::test]
async fn cancelling_mid_cell_discards_the_partial_cell() {
    let flag = Arc::new(AtomicBool::new(false));
    let judge = Arc::new(ScriptedJudge::constant(3).cancel_after(3, flag.clone()));
    let dims = vec![Dimension::new("relevance", 1.0, "")];
    // one judge call per inner round: the first cell needs 2, the second cell
    // gets cancelled after its first call
    let eval = evaluator(&judge, dims, &[ScoringSystem::FivePoint], 2);
    let registry =
        ProviderRegistry::new().with(Arc::new(FixtureSearchProvider::constant("A", results(2))));

    let result = engine(registry, eval, 3)
        .run(
            &queries(&["rust"]),
            &RunControl::new().with_cancel_flag(flag),
        )
        .await;

    assert_eq!(result.stop_reason, StopReason::Cancelled);
    assert_eq!(judge.calls(), 3);
    assert_eq!(result.cells.len(), 1);
    assert_eq!(result.completed_cells(), 1);
    let a = result.performance("A").unwrap();
    assert_eq!(a.total_cells, 1);
    assert_eq!(a.average_scores[&ScoringSystem::FivePoint].mean, 3.0);
}

#[tokio::test]
async fn expired_deadline_stops_before_any_cell() {
    let judge = Arc::new(ScriptedJudge::constant(3));
    let dims = vec![Dimension::new("relevance", 1.0, "")];
    let eval = evaluator(&judge, dims, &[ScoringSystem::FivePoint], 1);
    let result = engine(a_and_failing_b(), eval, 1)
        .run(
            &queries(&["rust"]),
            &RunControl::new().with_timeout(Duration::ZERO),
        )
        .await;
    assert_eq!(result.stop_reason, StopReason::DeadlineExceeded);
    assert!(result.cells.is_empty());
}

#[tokio::test]
async fn slow_provider_times_out_and_the_rest_are_scored() {
    let judge = Arc::new(ScriptedJudge::constant(5));
    let dims = vec![Dimension::new("relevance", 1.0, "")];
    let eval = evaluator(&judge, dims, &[ScoringSystem::FivePoint], 1);
    let registry = ProviderRegistry::new()
        .with(Arc::new(SlowProvider {
            name: "slow",
            delay: Duration::from_secs(5),
        }))
        .with(Arc::new(FixtureSearchProvider::constant("fast", results(2))));

    let result = engine(registry, eval, 1)
        .search_options(SearchOptions {
            max_results: 10,
            timeout: Duration::from_millis(50),
        })
        .run(&queries(&["rust"]), &RunControl::new())
        .await;

    let slow = result.performance("slow").unwrap();
    assert_eq!(slow.search_failures, 1);
    assert_eq!(slow.availability, Availability::NotAttempted);
    assert_eq!(result.performance("fast").unwrap().success_rate, 1.0);

    let CellOutcome::Completed { evaluation } = &result.cells[0].outcome else {
        panic!("cell should complete");
    };
    // registration order is kept through the concurrent fan-out
    assert_eq!(evaluation.engines[0].engine, "slow");
    assert!(evaluation.engines[0]
        .outcome
        .error()
        .unwrap()
        .contains("timed out"));
}

#[tokio::test]
async fn query_level_failure_is_recorded_and_the_batch_continues() {
    let judge = Arc::new(ScriptedJudge::constant(2));
    let dims = vec![Dimension::new("relevance", 1.0, "")];
    let eval = evaluator(&judge, dims, &[ScoringSystem::FivePoint], 1);
    let result = engine(a_and_failing_b(), eval, 1)
        .run(&queries(&["   ", "rust"]), &RunControl::new())
        .await;

    assert_eq!(result.cells.len(), 2);
    match &result.cells[0].outcome {
        CellOutcome::Failed { error } => assert_eq!(error, "query is empty"),
        CellOutcome::Completed { .. } => panic!("blank query should fail"),
    }
    assert_eq!(result.completed_cells(), 1);
    assert_eq!(result.performance("A").unwrap().total_cells, 1);

    let report = build_report(&result, &ReportOptions::default());
    assert_eq!(report.summary.cells_failed, 1);
    assert_eq!(report.query_errors[0].query, "   ");
}

#[tokio::test]
async fn combined_ranking_orders_providers_across_scales() {
    let judge = Arc::new(ScriptedJudge::new(|call| {
        let score = match call.system {
            ScoringSystem::Binary => 1,
            ScoringSystem::FivePoint => 3,
        };
        Ok(format!("<result>{score}</result>"))
    }));
    let dims = vec![Dimension::new("relevance", 1.0, "")];
    let eval = evaluator(
        &judge,
        dims,
        &[ScoringSystem::Binary, ScoringSystem::FivePoint],
        1,
    );
    let registry = ProviderRegistry::new()
        .with(Arc::new(FixtureSearchProvider::constant("A", results(3))))
        .with(Arc::new(FixtureSearchProvider::constant("B", Vec::new())));
    let result = engine(registry, eval, 1)
        .run(&queries(&["rust"]), &RunControl::new())
        .await;

    // A: (1/2 + (3-1)/4) / 2 = 0.5; B has no results: scale minimums (0, 1) -> 0.0
    let combined = &result.rankings.combined;
    assert_eq!(combined.len(), 2);
    assert_eq!(combined[0].engine, "A");
    assert!((combined[0].score - 0.5).abs() < 1e-12);
    assert_eq!(combined[1].engine, "B");
    assert_eq!(combined[1].score, 0.0);
    assert_eq!(combined[1].rank, 2);
    // B never reached the judge
    assert_eq!(judge.calls(), 2);
}

// =============================================================================
// Pacing
// =============================================================================

fn two_dimensions() -> Vec<Dimension> {
    vec![
        Dimension::new("relevance", 0.5, ""),
        Dimension::new("authority", 0.5, ""),
    ]
}

#[tokio::test]
async fn dimension_delay_spaces_consecutive_judge_calls() {
    let delay = Duration::from_millis(40);
    let judge = Arc::new(ScriptedJudge::constant(4));
    let eval = evaluator(&judge, two_dimensions(), &[ScoringSystem::FivePoint], 1)
        .dimension_delay(delay);
    let hits = results(2);

    let started = Instant::now();
    let evaluation = eval
        .evaluate(
            EvaluationTarget {
                query: "rust async",
                engine: "A",
                results: &hits,
                test_round: 1,
                run_id: None,
            },
            &RunControl::new(),
        )
        .await
        .unwrap();

    assert_eq!(judge.calls(), 2);
    assert!(started.elapsed() >= delay * (judge.calls() as u32 - 1));
    assert_eq!(evaluation.rounds[0].weighted_score, 4.0);
}

#[tokio::test]
async fn empty_result_set_skips_both_the_call_and_the_delay() {
    let delay = Duration::from_millis(300);
    let judge = Arc::new(ScriptedJudge::constant(4));
    let eval = evaluator(&judge, two_dimensions(), &[ScoringSystem::FivePoint], 2)
        .dimension_delay(delay);

    let started = Instant::now();
    let evaluation = eval
        .evaluate(
            EvaluationTarget {
                query: "rust async",
                engine: "A",
                results: &[],
                test_round: 1,
                run_id: None,
            },
            &RunControl::new(),
        )
        .await
        .unwrap();

    assert_eq!(judge.calls(), 0);
    assert!(started.elapsed() < delay);
    assert_eq!(evaluation.rounds.len(), 2);
    assert!(evaluation.rounds.iter().all(|r| r.weighted_score == 1.0));
}

#[tokio::test]
async fn delay_also_separates_providers_within_a_cell() {
    let delay = Duration::from_millis(40);
    let judge = Arc::new(ScriptedJudge::constant(3));
    let eval = evaluator(&judge, two_dimensions(), &[ScoringSystem::FivePoint], 1)
        .dimension_delay(delay);
    let registry = ProviderRegistry::new()
        .with(Arc::new(FixtureSearchProvider::constant("A", results(2))))
        .with(Arc::new(FixtureSearchProvider::constant("B", results(2))));
    let engine = engine(registry, eval, 1);

    let started = Instant::now();
    let evaluation = engine
        .evaluate_query("rust async", 1, &RunControl::new())
        .await
        .unwrap();

    assert_eq!(judge.calls(), 4);
    assert!(started.elapsed() >= delay * 3);
    assert_eq!(evaluation.engines.len(), 2);
}
