//! The two fixed integer scoring scales.

use serde::{Deserialize, Serialize};

/// A scoring scale variant. Immutable and process-wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringSystem {
    /// {0, 1, 2}
    Binary,
    /// {1, 2, 3, 4, 5}
    FivePoint,
}

impl ScoringSystem {
    pub const ALL: [ScoringSystem; 2] = [ScoringSystem::Binary, ScoringSystem::FivePoint];

    pub fn name(self) -> &'static str {
        match self {
            ScoringSystem::Binary => "binary",
            ScoringSystem::FivePoint => "five_point",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ScoringSystem::Binary => "0-2 scale",
            ScoringSystem::FivePoint => "1-5 scale",
        }
    }

    pub fn scale_values(self) -> &'static [i32] {
        match self {
            ScoringSystem::Binary => &[0, 1, 2],
            ScoringSystem::FivePoint => &[1, 2, 3, 4, 5],
        }
    }

    pub fn min(self) -> i32 {
        self.scale_values()[0]
    }

    pub fn max(self) -> i32 {
        self.scale_values()[self.scale_values().len() - 1]
    }

    pub fn contains(self, score: i32) -> bool {
        (self.min()..=self.max()).contains(&score)
    }

    /// Round to the nearest integer and clamp into the scale.
    pub fn clamp(self, raw: f64) -> i32 {
        let rounded = raw.round();
        if rounded <= self.min() as f64 {
            self.min()
        } else if rounded >= self.max() as f64 {
            self.max()
        } else {
            rounded as i32
        }
    }

    /// Map a mean score on this scale into [0, 1].
    ///
    /// Five-point: `(s - 1) / 4`. Binary: `s / 2`.
    pub fn normalize(self, score: f64) -> f64 {
        match self {
            ScoringSystem::Binary => score / 2.0,
            ScoringSystem::FivePoint => (score - 1.0) / 4.0,
        }
    }

    /// Meaning of each scale value, used to build the default rubric.
    pub fn level_descriptions(self) -> &'static [(i32, &'static str)] {
        match self {
            ScoringSystem::Binary => &[
                (0, "does not meet the criterion"),
                (1, "partially meets the criterion"),
                (2, "fully meets the criterion"),
            ],
            ScoringSystem::FivePoint => &[
                (1, "very poor"),
                (2, "poor"),
                (3, "acceptable"),
                (4, "good"),
                (5, "excellent"),
            ],
        }
    }
}

impl std::fmt::Display for ScoringSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for ScoringSystem {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "binary" | "0-2" => Ok(ScoringSystem::Binary),
            "five_point" | "five-point" | "1-5" => Ok(ScoringSystem::FivePoint),
            other => Err(format!("unknown scoring system: {other}")),
        }
    }
}
