//! Weighted combination of dimension scores.

use std::collections::BTreeMap;

use crate::config::Dimension;
use crate::scoring::ScoreRecord;

/// Weighted mean over the dimensions that scored without error.
///
/// Errored or missing dimensions drop out of both the numerator and the weight
/// denominator, so the surviving weights are renormalized. Returns 0.0 when no
/// dimension survived.
pub fn combine(scores: &BTreeMap<String, ScoreRecord>, dimensions: &[Dimension]) -> f64 {
    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;
    for dimension in dimensions {
        let Some(record) = scores.get(&dimension.name) else {
            continue;
        };
        if record.error {
            continue;
        }
        weighted_sum += f64::from(record.score) * dimension.weight;
        weight_total += dimension.weight;
    }

    if weight_total > 0.0 {
        weighted_sum / weight_total
    } else {
        0.0
    }
}
