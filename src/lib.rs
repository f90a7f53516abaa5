#![forbid(unsafe_code)]

//! # search-arena
//!
//! Side-by-side evaluation of search providers with an LLM judge.
//!
//! Every provider's result set for a query is scored on several weighted
//! dimensions, on two integer scales, with one judge call per dimension. The
//! scoring is repeated (inner rounds) to sample judge noise, and the whole
//! query set is repeated (outer rounds) to sample end-to-end noise. The
//! outcome is a per-provider mean, spread and coefficient of variation plus
//! rankings per scale and across scales.
//!
//! Failures never abort a run: a judge failure becomes a flagged dimension
//! score, a failed search drops the provider from that query, and both show
//! up in success rates. Only an invalid configuration is fatal.

pub mod config;
pub mod evaluation;
pub mod gateway;
pub mod prompts;
pub mod provider;
pub mod report;
pub mod scoring;
pub mod trace;

pub use config::{load_config, ConfigError, Dimension, EvaluationConfig};
pub use evaluation::{
    AggregatedPerformance, BatchAggregationEngine, BatchResult, CrossProviderAggregator,
    QueryError, Rankings, RunControl, SingleQueryEvaluator, StopReason,
};
pub use gateway::{ChatGateway, GatewayConfig, GatewayError, RetryingGateway};
pub use provider::{ProviderRegistry, SearchError, SearchProvider, SearchResult};
pub use scoring::{
    DimensionScorer, JudgeDimensionScorer, JudgeError, ScoreJudge, ScoreRecord, ScoringSystem,
};
pub use trace::{JsonlTraceSink, ScoreTrace, TraceError, TraceSink, TraceWorker};
