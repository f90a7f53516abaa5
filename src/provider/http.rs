//! Generic JSON-over-HTTP search provider.
//!
//! Sends `POST {endpoint}` with `{"query": ..., "max_results": ...}` and
//! expects `{"results": [SearchResult, ...]}` back.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use super::{SearchError, SearchOptions, SearchProvider, SearchResult};

/// Maximum allowed response body length (4MB).
const MAX_RESPONSE_LEN: usize = 4 * 1_024 * 1_024;

#[derive(Debug, Clone)]
pub struct HttpSearchProvider {
    name: String,
    endpoint: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct SearchApiRequest<'a> {
    query: &'a str,
    max_results: usize,
}

#[derive(Deserialize)]
struct SearchApiResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
    #[serde(default)]
    error: Option<String>,
}

impl HttpSearchProvider {
    pub fn new(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self, SearchError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = api_key {
            let value = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|_| SearchError::Config("Invalid API key format".into()))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| SearchError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            endpoint: endpoint.into(),
            client,
        })
    }
}

#[async_trait]
impl SearchProvider for HttpSearchProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let mut response = self
            .client
            .post(&self.endpoint)
            .timeout(options.timeout)
            .json(&SearchApiRequest {
                query,
                max_results: options.max_results,
            })
            .send()
            .await?;

        let status = response.status();

        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if bytes.len() + chunk.len() > MAX_RESPONSE_LEN {
                return Err(SearchError::Decode(format!(
                    "response exceeds {MAX_RESPONSE_LEN} bytes"
                )));
            }
            bytes.extend_from_slice(&chunk);
        }
        let body = String::from_utf8_lossy(&bytes);

        if !status.is_success() {
            let message = body.chars().take(200).collect::<String>();
            return Err(SearchError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: SearchApiResponse =
            serde_json::from_str(&body).map_err(|e| SearchError::Decode(e.to_string()))?;
        if let Some(error) = parsed.error {
            return Err(SearchError::Failed(error));
        }

        let mut results = parsed.results;
        results.truncate(options.max_results);
        Ok(results)
    }
}
