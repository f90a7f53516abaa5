//! Multi-round comparative evaluation.
//!
//! Bottom-up:
//! - [`combiner`]: weighted score of one round
//! - [`single`]: repeated rounds for one provider and query
//! - [`aggregate`]: per-scale and combined provider rankings
//! - [`batch`]: outer rounds over a query set, batch-wide statistics
//!
//! [`control`] carries cancellation and deadlines through all of them.

pub mod aggregate;
pub mod batch;
pub mod combiner;
pub mod control;
pub mod single;
pub mod stats;
pub mod types;

pub use aggregate::{CrossProviderAggregator, RankCandidate, Standing};
pub use batch::{BatchAggregationEngine, QueryError};
pub use combiner::combine;
pub use control::{JudgePacer, RunControl};
pub use single::{EvaluationTarget, SingleQueryEvaluator};
pub use stats::SampleStats;
pub use types::*;
