//! Descriptive statistics over score samples.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct SampleStats {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    /// Population standard deviation.
    pub std_dev: f64,
    pub count: usize,
}

impl SampleStats {
    /// All zeros for an empty sample.
    pub fn from_samples(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        Self {
            mean: Statistics::mean(samples.iter()),
            min: Statistics::min(samples.iter()),
            max: Statistics::max(samples.iter()),
            std_dev: Statistics::population_std_dev(samples.iter()),
            count: samples.len(),
        }
    }

    pub fn coefficient_of_variation(&self) -> f64 {
        coefficient_of_variation(self.mean, self.std_dev)
    }

    pub fn range(&self) -> f64 {
        self.max - self.min
    }
}

/// `std_dev / mean`, or 0 when the mean is 0.
pub fn coefficient_of_variation(mean: f64, std_dev: f64) -> f64 {
    if mean == 0.0 {
        0.0
    } else {
        std_dev / mean
    }
}
