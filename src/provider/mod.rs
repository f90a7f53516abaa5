//! Search providers: interchangeable sources of ranked result sets.
//!
//! The engine only depends on [`SearchProvider`]; concrete adapters live in
//! [`http`] and [`fixture`]. [`ProviderRegistry`] keeps providers in
//! registration order, which is the tie-break order for rankings.

pub mod fixture;
pub mod http;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{ProviderKind, ProviderSettings};

pub use fixture::FixtureSearchProvider;
pub use http::HttpSearchProvider;

/// One ranked search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub source: String,
    #[serde(
        default,
        alias = "publishedTime",
        skip_serializing_if = "Option::is_none"
    )]
    pub published_time: Option<String>,
}

/// Per-call search options.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub max_results: usize,
    pub timeout: Duration,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            max_results: 10,
            timeout: Duration::from_secs(30),
        }
    }
}

/// A provider's search failed; the provider is skipped for that query.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("search timed out after {0:?}")]
    Timeout(Duration),
    #[error("invalid response: {0}")]
    Decode(String),
    #[error("provider configuration error: {0}")]
    Config(String),
    #[error("{0}")]
    Failed(String),
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, SearchError>;
}

/// Ordered, name-keyed set of providers.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn SearchProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider; a provider with the same name is replaced in place.
    pub fn register(&mut self, provider: Arc<dyn SearchProvider>) {
        match self
            .providers
            .iter()
            .position(|p| p.name() == provider.name())
        {
            Some(idx) => self.providers[idx] = provider,
            None => self.providers.push(provider),
        }
    }

    pub fn with(mut self, provider: Arc<dyn SearchProvider>) -> Self {
        self.register(provider);
        self
    }

    /// Build from configuration, skipping disabled providers.
    pub fn from_settings(settings: &[ProviderSettings]) -> Result<Self, SearchError> {
        let mut registry = Self::new();
        for entry in settings.iter().filter(|s| s.enabled) {
            let provider: Arc<dyn SearchProvider> = match &entry.kind {
                ProviderKind::Http {
                    endpoint,
                    api_key_env,
                } => {
                    let api_key = match api_key_env {
                        Some(var) => Some(std::env::var(var).map_err(|_| {
                            SearchError::Config(format!(
                                "{var} not set (required by provider '{}')",
                                entry.name
                            ))
                        })?),
                        None => None,
                    };
                    Arc::new(HttpSearchProvider::new(&entry.name, endpoint, api_key)?)
                }
                ProviderKind::Fixture { path } => {
                    Arc::new(FixtureSearchProvider::from_path(&entry.name, path)?)
                }
            };
            registry.register(provider);
        }
        Ok(registry)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn SearchProvider>> {
        self.providers.iter().find(|p| p.name() == name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn SearchProvider>> {
        self.providers.iter()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str, usize);

    #[async_trait]
    impl SearchProvider for Named {
        fn name(&self) -> &str {
            self.0
        }

        async fn search(
            &self,
            _query: &str,
            _options: &SearchOptions,
        ) -> Result<Vec<SearchResult>, SearchError> {
            Ok(Vec::with_capacity(self.1))
        }
    }

    #[test]
    fn registry_keeps_registration_order_and_replaces_duplicates() {
        let registry = ProviderRegistry::new()
            .with(Arc::new(Named("b", 0)))
            .with(Arc::new(Named("a", 0)))
            .with(Arc::new(Named("b", 1)));
        assert_eq!(registry.names(), vec!["b".to_string(), "a".to_string()]);
        assert_eq!(registry.len(), 2);
        assert!(registry.get("a").is_some());
        assert!(registry.get("c").is_none());
    }

    #[test]
    fn search_result_accepts_camel_case_published_time() {
        let json = r#"{"title":"t","url":"u","publishedTime":"2024-01-01"}"#;
        let result: SearchResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.published_time.as_deref(), Some("2024-01-01"));
        assert_eq!(result.snippet, "");
    }
}
