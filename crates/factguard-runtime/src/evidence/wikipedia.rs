//! Wikipedia reference source (MediaWiki `list=search`).

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::{EvidenceSource, SearchHit};
use crate::providers::{check_status, http_client, transport_error, ProviderError};

const API_URL: &str = "https://en.wikipedia.org/w/api.php";
const ARTICLE_BASE: &str = "https://en.wikipedia.org/wiki/";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const USER_AGENT: &str = concat!("factguard/", env!("CARGO_PKG_VERSION"));

/// Keyless encyclopedia search.
#[derive(Debug, Clone)]
pub struct WikipediaSearch {
    api_url: String,
}

impl WikipediaSearch {
    pub fn new() -> Self {
        Self {
            api_url: API_URL.to_string(),
        }
    }

    /// Point at another MediaWiki install.
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }
}

impl Default for WikipediaSearch {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    query: Option<SearchQuery>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    title: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    timestamp: Option<String>,
}

/// Article URL for a page title.
pub fn article_url(title: &str) -> String {
    format!("{}{}", ARTICLE_BASE, title.replace(' ', "_"))
}

impl From<SearchResponse> for Vec<SearchHit> {
    fn from(response: SearchResponse) -> Self {
        response
            .query
            .map(|q| q.search)
            .unwrap_or_default()
            .into_iter()
            .map(|r| SearchHit {
                url: article_url(&r.title),
                snippet: r.snippet,
                age: r.timestamp,
            })
            .collect()
    }
}

#[async_trait]
impl EvidenceSource for WikipediaSearch {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, ProviderError> {
        let limit = limit.to_string();
        let response = http_client()
            .get(&self.api_url)
            .header("User-Agent", USER_AGENT)
            .query(&[
                ("action", "query"),
                ("list", "search"),
                ("srsearch", query),
                ("srlimit", limit.as_str()),
                ("format", "json"),
            ])
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| transport_error(e, REQUEST_TIMEOUT))?;

        let body: SearchResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        Ok(body.into())
    }

    fn name(&self) -> &str {
        "wikipedia"
    }
}
