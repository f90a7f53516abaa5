//! Provider rankings, per scale and combined across scales.

use std::collections::BTreeMap;

use crate::scoring::ScoringSystem;

use super::types::{EngineEvaluation, ProviderFailure, QuerySummary, RankingEntry, Rankings};

/// One provider's standing on one scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Standing {
    pub score: f64,
    pub stability: f64,
}

/// A provider as seen by the ranking step.
#[derive(Debug, Clone)]
pub struct RankCandidate {
    pub engine: String,
    pub by_scale: BTreeMap<ScoringSystem, Standing>,
    pub success_rate: f64,
}

/// Ranks providers for every configured scale and across scales.
#[derive(Debug, Clone)]
pub struct CrossProviderAggregator {
    systems: Vec<ScoringSystem>,
}

impl CrossProviderAggregator {
    pub fn new(systems: Vec<ScoringSystem>) -> Self {
        Self { systems }
    }

    pub fn systems(&self) -> &[ScoringSystem] {
        &self.systems
    }

    /// Candidates must be in provider iteration order; ties keep that order.
    pub fn rank(&self, candidates: &[RankCandidate]) -> Rankings {
        let by_scale = self
            .systems
            .iter()
            .map(|system| (*system, rank_scale(candidates, *system)))
            .collect();
        Rankings {
            by_scale,
            combined: combined_ranking(candidates, &self.systems),
        }
    }

    /// Rankings and failure bookkeeping for one query.
    pub fn summarize(&self, engines: &[EngineEvaluation]) -> QuerySummary {
        let mut candidates = Vec::new();
        let mut errors = Vec::new();

        for entry in engines {
            match entry.outcome.evaluation() {
                Some(eval) => {
                    let mut by_scale = BTreeMap::new();
                    let mut valid = 0;
                    let mut total = 0;
                    for system in &self.systems {
                        let Some(avg) = eval.average(*system) else {
                            continue;
                        };
                        valid += avg.valid_rounds;
                        total += avg.total_rounds;
                        if avg.valid_rounds > 0 {
                            by_scale.insert(
                                *system,
                                Standing {
                                    score: avg.weighted,
                                    stability: avg.weighted_cov,
                                },
                            );
                        }
                    }
                    candidates.push(RankCandidate {
                        engine: entry.engine.clone(),
                        by_scale,
                        success_rate: ratio(valid, total),
                    });
                }
                None => errors.push(ProviderFailure {
                    engine: entry.engine.clone(),
                    error: entry.outcome.error().unwrap_or_default().to_string(),
                }),
            }
        }

        QuerySummary {
            rankings: self.rank(&candidates),
            successful: candidates.len(),
            failed: errors.len(),
            errors,
        }
    }
}

/// `num / den`, or 0 when `den` is 0.
pub fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

fn sort_and_number(mut entries: Vec<RankingEntry>) -> Vec<RankingEntry> {
    // stable: equal scores keep input order
    entries.sort_by(|a, b| b.score.total_cmp(&a.score));
    for (idx, entry) in entries.iter_mut().enumerate() {
        entry.rank = idx + 1;
    }
    entries
}

/// Descending by mean weighted score, over providers that have the scale.
pub fn rank_scale(candidates: &[RankCandidate], system: ScoringSystem) -> Vec<RankingEntry> {
    let entries = candidates
        .iter()
        .filter_map(|c| {
            c.by_scale.get(&system).map(|standing| RankingEntry {
                rank: 0,
                engine: c.engine.clone(),
                score: standing.score,
                stability: standing.stability,
                success_rate: c.success_rate,
            })
        })
        .collect();
    sort_and_number(entries)
}

/// Each scale's mean is normalized into [0, 1] and the normalized values are
/// averaged over `systems`; a scale the provider lacks contributes 0.
/// Stability is the mean CoV over the scales the provider has.
pub fn combined_ranking(
    candidates: &[RankCandidate],
    systems: &[ScoringSystem],
) -> Vec<RankingEntry> {
    if systems.is_empty() {
        return Vec::new();
    }

    let entries = candidates
        .iter()
        .filter(|c| systems.iter().any(|s| c.by_scale.contains_key(s)))
        .map(|c| {
            let mut normalized_sum = 0.0;
            let mut cov_sum = 0.0;
            let mut present = 0usize;
            for system in systems {
                if let Some(standing) = c.by_scale.get(system) {
                    normalized_sum += system.normalize(standing.score);
                    cov_sum += standing.stability;
                    present += 1;
                }
            }
            RankingEntry {
                rank: 0,
                engine: c.engine.clone(),
                score: normalized_sum / systems.len() as f64,
                stability: cov_sum / present as f64,
                success_rate: c.success_rate,
            }
        })
        .collect();
    sort_and_number(entries)
}
