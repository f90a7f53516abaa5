//! Evaluation configuration.
//!
//! Loaded once from JSON, validated before any evaluation starts, and never
//! mutated afterwards. A configuration that fails validation is
//! [`ConfigError::Invalid`], the only fatal error kind in the engine.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::gateway::GatewayConfig;
use crate::provider::SearchOptions;
use crate::scoring::ScoringSystem;

/// Allowed deviation of the weight sum from 1.0.
pub const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

/// Upper bound on judge retries accepted from configuration.
const MAX_JUDGE_RETRIES: u32 = 10;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("cannot read configuration {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed configuration: {0}")]
    Json(#[from] serde_json::Error),
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(message.into())
}

/// A named, weighted evaluation criterion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    pub weight: f64,
    #[serde(default)]
    pub description: String,
}

impl Dimension {
    pub fn new(name: impl Into<String>, weight: f64, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            weight,
            description: description.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeSettings {
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    /// Overridden by `ARENA_JUDGE_BASE_URL`.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_judge_timeout_secs")]
    pub timeout_secs: u64,
}

impl JudgeSettings {
    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            max_retries: self.max_retries,
            retry_base_delay: Duration::from_millis(self.retry_base_delay_ms),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for JudgeSettings {
    fn default() -> Self {
        Self {
            model: default_judge_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            base_url: None,
            timeout_secs: default_judge_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSettings {
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_search_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            timeout_ms: default_search_timeout_ms(),
        }
    }
}

impl SearchSettings {
    pub fn options(&self) -> SearchOptions {
        SearchOptions {
            max_results: self.max_results,
            timeout: Duration::from_millis(self.timeout_ms),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderKind {
    Http {
        endpoint: String,
        #[serde(default)]
        api_key_env: Option<String>,
    },
    Fixture {
        path: PathBuf,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(flatten)]
    pub kind: ProviderKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    pub dimensions: Vec<Dimension>,
    #[serde(default = "default_scoring_systems")]
    pub scoring_systems: Vec<ScoringSystem>,
    /// scoring system -> dimension name -> rubric
    #[serde(default)]
    pub custom_prompts: BTreeMap<ScoringSystem, BTreeMap<String, String>>,
    /// Inner rounds per (query, provider), sampling judge variance.
    #[serde(default = "default_repeat_times")]
    pub repeat_times: usize,
    /// Outer rounds over the whole query set.
    #[serde(default = "default_test_rounds")]
    pub test_rounds: usize,
    #[serde(default = "default_dimension_delay_ms")]
    pub dimension_delay_ms: u64,
    #[serde(default = "default_query_delay_ms")]
    pub query_delay_ms: u64,
    #[serde(default = "default_round_delay_ms")]
    pub round_delay_ms: u64,
    #[serde(default)]
    pub judge: JudgeSettings,
    #[serde(default)]
    pub search: SearchSettings,
    #[serde(default)]
    pub providers: Vec<ProviderSettings>,
}

fn default_true() -> bool {
    true
}

fn default_judge_model() -> String {
    "openai/gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_tokens() -> u32 {
    512
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

fn default_judge_timeout_secs() -> u64 {
    60
}

fn default_max_results() -> usize {
    10
}

fn default_search_timeout_ms() -> u64 {
    30_000
}

fn default_scoring_systems() -> Vec<ScoringSystem> {
    ScoringSystem::ALL.to_vec()
}

fn default_repeat_times() -> usize {
    3
}

fn default_test_rounds() -> usize {
    3
}

fn default_dimension_delay_ms() -> u64 {
    1000
}

fn default_query_delay_ms() -> u64 {
    2000
}

fn default_round_delay_ms() -> u64 {
    5000
}

impl EvaluationConfig {
    /// Configuration with the given dimensions and defaults everywhere else.
    pub fn with_dimensions(dimensions: Vec<Dimension>) -> Self {
        Self {
            dimensions,
            scoring_systems: default_scoring_systems(),
            custom_prompts: BTreeMap::new(),
            repeat_times: default_repeat_times(),
            test_rounds: default_test_rounds(),
            dimension_delay_ms: default_dimension_delay_ms(),
            query_delay_ms: default_query_delay_ms(),
            round_delay_ms: default_round_delay_ms(),
            judge: JudgeSettings::default(),
            search: SearchSettings::default(),
            providers: Vec::new(),
        }
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: EvaluationConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_dimensions(&self.dimensions)?;

        if self.scoring_systems.is_empty() {
            return Err(invalid("scoring_systems must not be empty"));
        }
        let mut systems = HashSet::new();
        for system in &self.scoring_systems {
            if !systems.insert(*system) {
                return Err(invalid(format!("duplicate scoring system: {system}")));
            }
        }

        if self.repeat_times == 0 {
            return Err(invalid("repeat_times must be >= 1"));
        }
        if self.test_rounds == 0 {
            return Err(invalid("test_rounds must be >= 1"));
        }

        let known: HashSet<&str> = self.dimensions.iter().map(|d| d.name.as_str()).collect();
        for (system, prompts) in &self.custom_prompts {
            for dimension in prompts.keys() {
                if !known.contains(dimension.as_str()) {
                    return Err(invalid(format!(
                        "custom prompt for {system} references unknown dimension: {dimension}"
                    )));
                }
            }
        }

        if self.judge.model.trim().is_empty() {
            return Err(invalid("judge.model must not be empty"));
        }
        if !(0.0..=2.0).contains(&self.judge.temperature) {
            return Err(invalid(format!(
                "judge.temperature must be in [0, 2]: {}",
                self.judge.temperature
            )));
        }
        if self.judge.max_retries > MAX_JUDGE_RETRIES {
            return Err(invalid(format!(
                "judge.max_retries must be <= {MAX_JUDGE_RETRIES}"
            )));
        }
        if self.search.max_results == 0 {
            return Err(invalid("search.max_results must be >= 1"));
        }

        let mut provider_names = HashSet::new();
        for provider in &self.providers {
            if provider.name.trim().is_empty() {
                return Err(invalid("provider name must not be empty"));
            }
            if !provider_names.insert(provider.name.as_str()) {
                return Err(invalid(format!("duplicate provider: {}", provider.name)));
            }
        }

        Ok(())
    }

    /// Custom rubrics for one scoring system, keyed by dimension name.
    pub fn custom_prompts_for(&self, system: ScoringSystem) -> HashMap<String, String> {
        self.custom_prompts
            .get(&system)
            .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default()
    }

    pub fn dimension_delay(&self) -> Duration {
        Duration::from_millis(self.dimension_delay_ms)
    }

    pub fn query_delay(&self) -> Duration {
        Duration::from_millis(self.query_delay_ms)
    }

    pub fn round_delay(&self) -> Duration {
        Duration::from_millis(self.round_delay_ms)
    }

    /// Stable hash of the configuration, recorded in reports.
    pub fn fingerprint(&self) -> String {
        let canonical = serde_json::to_string(self).unwrap_or_default();
        blake3::hash(canonical.as_bytes()).to_hex().to_string()
    }
}

/// Dimension list checks: non-empty, unique non-blank names, each weight in
/// (0, 1], and weights summing to 1.0 within [`WEIGHT_SUM_TOLERANCE`].
pub fn validate_dimensions(dimensions: &[Dimension]) -> Result<(), ConfigError> {
    if dimensions.is_empty() {
        return Err(invalid("dimensions must not be empty"));
    }

    let mut names = HashSet::new();
    for d in dimensions {
        if d.name.trim().is_empty() {
            return Err(invalid("dimension name must not be empty"));
        }
        if !names.insert(d.name.as_str()) {
            return Err(invalid(format!("duplicate dimension: {}", d.name)));
        }
        if !d.weight.is_finite() || d.weight <= 0.0 || d.weight > 1.0 {
            return Err(invalid(format!(
                "dimension weight must be in (0, 1] (dimension={}, weight={})",
                d.name, d.weight
            )));
        }
    }

    let sum: f64 = dimensions.iter().map(|d| d.weight).sum();
    if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(invalid(format!(
            "dimension weights must sum to 1.0 (got {sum:.4})"
        )));
    }

    Ok(())
}

/// Read, parse and validate a configuration file.
pub fn load_config(path: impl AsRef<Path>) -> Result<EvaluationConfig, ConfigError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    EvaluationConfig::from_json_str(&raw)
}
