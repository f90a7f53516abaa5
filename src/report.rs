//! Export shapes for batch runs.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::evaluation::{
    AggregatedPerformance, Availability, BatchCell, BatchResult, CellOutcome, Rankings,
    StopReason,
};
use crate::scoring::ScoringSystem;

#[derive(Debug, Clone, Serialize)]
pub struct ReportOptions {
    /// Embed every (round, query) cell with its round-level detail.
    pub include_cells: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            include_cells: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub run_stamp: RunStamp,
    pub summary: ReportSummary,
    pub performance: BTreeMap<String, AggregatedPerformance>,
    pub rankings: Rankings,
    pub query_errors: Vec<CellError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cells: Option<Vec<BatchCell>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunStamp {
    pub run_id: Uuid,
    pub config_hash: String,
    pub report_hash: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub stop_reason: StopReason,
    pub test_rounds: usize,
    pub query_count: usize,
    pub providers: Vec<String>,
    pub scoring_systems: Vec<ScoringSystem>,
    pub cells_completed: usize,
    pub cells_failed: usize,
    pub cells_planned: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CellError {
    pub test_round: usize,
    pub query: String,
    pub error: String,
}

pub fn build_report(result: &BatchResult, opts: &ReportOptions) -> BatchReport {
    let completed = result.completed_cells();
    let query_errors: Vec<CellError> = result
        .cells
        .iter()
        .filter_map(|cell| match &cell.outcome {
            CellOutcome::Failed { error } => Some(CellError {
                test_round: cell.test_round,
                query: cell.query.clone(),
                error: error.clone(),
            }),
            CellOutcome::Completed { .. } => None,
        })
        .collect();

    BatchReport {
        run_stamp: RunStamp {
            run_id: result.run_id,
            config_hash: result.config_hash.clone(),
            report_hash: hash_result(result),
            started_at: result.started_at,
            finished_at: result.finished_at,
            duration_ms: (result.finished_at - result.started_at).num_milliseconds(),
        },
        summary: ReportSummary {
            stop_reason: result.stop_reason,
            test_rounds: result.test_rounds,
            query_count: result.queries.len(),
            providers: result.providers.clone(),
            scoring_systems: result.scoring_systems.clone(),
            cells_completed: completed,
            cells_failed: query_errors.len(),
            cells_planned: result.test_rounds * result.queries.len(),
        },
        performance: result.performance.clone(),
        rankings: result.rankings.clone(),
        query_errors,
        cells: opts.include_cells.then(|| result.cells.clone()),
    }
}

/// Hash of the aggregate figures only; identical for runs whose statistics
/// and rankings match.
fn hash_result(result: &BatchResult) -> String {
    let payload = serde_json::json!({
        "performance": result.performance,
        "rankings": result.rankings,
    });
    let bytes = serde_json::to_vec(&payload).unwrap_or_default();
    blake3::hash(&bytes).to_hex().to_string()
}

const CSV_HEADER: &str = "engine,scoring_system,rank,success_rate,evaluation_success_rate,availability,count,mean,min,max,std_dev,coefficient_of_variation,range";

/// One row per provider and scale, in provider order.
pub fn performance_csv(result: &BatchResult) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');

    for engine in &result.providers {
        let Some(perf) = result.performance.get(engine) else {
            continue;
        };
        for system in &result.scoring_systems {
            let stats = perf.average_scores.get(system).copied().unwrap_or_default();
            let cov = perf
                .score_stability
                .get(system)
                .map(|s| s.coefficient_of_variation)
                .unwrap_or_default();
            let rank = result
                .rankings
                .scale(*system)
                .iter()
                .find(|e| &e.engine == engine)
                .map(|e| e.rank.to_string())
                .unwrap_or_default();
            let eval_rate = perf
                .evaluation_success_rate
                .map(|r| format!("{r:.4}"))
                .unwrap_or_default();
            let _ = writeln!(
                out,
                "{},{},{},{:.4},{},{},{},{:.4},{:.4},{:.4},{:.4},{:.4},{:.4}",
                csv_field(engine),
                system,
                rank,
                perf.success_rate,
                eval_rate,
                availability_label(perf.availability),
                stats.count,
                stats.mean,
                stats.min,
                stats.max,
                stats.std_dev,
                cov,
                stats.range(),
            );
        }
    }
    out
}

fn availability_label(availability: Availability) -> &'static str {
    match availability {
        Availability::Evaluated => "evaluated",
        Availability::NotAttempted => "not_attempted",
        Availability::AttemptedAndFailed => "attempted_and_failed",
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
