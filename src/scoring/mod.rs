//! Judge-backed scoring of result sets.
//!
//! - [`scale`]: the two integer scales and their normalization
//! - [`parse`]: extraction of `{score, reasoning}` from free-form judge output
//! - [`judge`]: one oracle call with model settings
//! - [`dimension`]: one call per (result set, dimension), degraded to a flagged
//!   record on any failure

pub mod dimension;
pub mod judge;
pub mod parse;
pub mod scale;

pub use dimension::{DimensionScorer, JudgeDimensionScorer, ScoreRecord};
pub use judge::{JudgeError, JudgedScore, PromptPayload, ScoreJudge};
pub use parse::{parse_judge_response, ParsedScore};
pub use scale::ScoringSystem;
