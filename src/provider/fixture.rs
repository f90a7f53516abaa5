//! Canned search results loaded from a JSON file.
//!
//! File shape: `{"<query>": [SearchResult, ...], "*": [...]}`. The `"*"` entry
//! is the fallback for queries without their own entry. An entry of the form
//! `{"error": "message"}` makes the search fail for that query.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;

use super::{SearchError, SearchOptions, SearchProvider, SearchResult};

const FALLBACK_KEY: &str = "*";

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FixtureEntry {
    Results(Vec<SearchResult>),
    Error { error: String },
}

#[derive(Debug, Clone)]
pub struct FixtureSearchProvider {
    name: String,
    entries: HashMap<String, FixtureEntry>,
}

impl FixtureSearchProvider {
    pub fn new(name: impl Into<String>, entries: HashMap<String, FixtureEntry>) -> Self {
        Self {
            name: name.into(),
            entries,
        }
    }

    /// Same results for every query.
    pub fn constant(name: impl Into<String>, results: Vec<SearchResult>) -> Self {
        let mut entries = HashMap::new();
        entries.insert(FALLBACK_KEY.to_string(), FixtureEntry::Results(results));
        Self::new(name, entries)
    }

    /// Fails every query with `message`.
    pub fn failing(name: impl Into<String>, message: impl Into<String>) -> Self {
        let mut entries = HashMap::new();
        entries.insert(
            FALLBACK_KEY.to_string(),
            FixtureEntry::Error {
                error: message.into(),
            },
        );
        Self::new(name, entries)
    }

    pub fn from_path(name: impl Into<String>, path: impl AsRef<Path>) -> Result<Self, SearchError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            SearchError::Config(format!("cannot read fixture {}: {e}", path.display()))
        })?;
        let entries: HashMap<String, FixtureEntry> = serde_json::from_str(&raw).map_err(|e| {
            SearchError::Config(format!("invalid fixture {}: {e}", path.display()))
        })?;
        Ok(Self::new(name, entries))
    }
}

#[async_trait]
impl SearchProvider for FixtureSearchProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let entry = self
            .entries
            .get(query)
            .or_else(|| self.entries.get(FALLBACK_KEY));
        match entry {
            Some(FixtureEntry::Results(results)) => {
                Ok(results.iter().take(options.max_results).cloned().collect())
            }
            Some(FixtureEntry::Error { error }) => Err(SearchError::Failed(error.clone())),
            None => Ok(Vec::new()),
        }
    }
}
