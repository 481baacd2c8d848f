//! Brave web search source.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::time::Duration;

use super::{EvidenceSource, SearchHit};
use crate::providers::{check_status, http_client, transport_error, ApiCredential, ProviderError};

/// Environment variable holding the Brave subscription token.
pub const BRAVE_API_KEY_ENV: &str = "BRAVE_SEARCH_API_KEY";

const ENDPOINT: &str = "https://api.search.brave.com/res/v1/web/search";

/// Upper bound on a single request; the aggregator applies its own timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Web search through the Brave Search API.
#[derive(Debug)]
pub struct BraveSearch {
    credential: ApiCredential,
    endpoint: String,
}

impl BraveSearch {
    /// Create from `BRAVE_SEARCH_API_KEY`.
    pub fn from_env() -> Result<Self, ProviderError> {
        Ok(Self {
            credential: ApiCredential::from_env(BRAVE_API_KEY_ENV, "Brave Search API key")?,
            endpoint: ENDPOINT.to_string(),
        })
    }

    /// Create from JSON settings (`api_key`, `endpoint`) with environment fallback.
    pub fn from_config(config: &JsonValue) -> Result<Self, ProviderError> {
        Ok(Self {
            credential: ApiCredential::from_config_or_env(
                config,
                "api_key",
                BRAVE_API_KEY_ENV,
                "Brave Search API key",
            )?,
            endpoint: config["endpoint"].as_str().unwrap_or(ENDPOINT).to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct BraveResponse {
    #[serde(default)]
    web: Option<BraveWeb>,
}

#[derive(Debug, Deserialize)]
struct BraveWeb {
    #[serde(default)]
    results: Vec<BraveResult>,
}

#[derive(Debug, Deserialize)]
struct BraveResult {
    #[serde(default)]
    url: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    age: Option<String>,
}

impl From<BraveResponse> for Vec<SearchHit> {
    fn from(response: BraveResponse) -> Self {
        response
            .web
            .map(|web| web.results)
            .unwrap_or_default()
            .into_iter()
            .map(|r| SearchHit {
                url: r.url,
                snippet: r.description,
                age: r.age,
            })
            .collect()
    }
}

#[async_trait]
impl EvidenceSource for BraveSearch {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, ProviderError> {
        let count = limit.to_string();
        let response = http_client()
            .get(&self.endpoint)
            .header("X-Subscription-Token", self.credential.expose())
            .header("Accept", "application/json")
            .query(&[("q", query), ("count", count.as_str())])
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| transport_error(e, REQUEST_TIMEOUT))?;

        let body: BraveResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        Ok(body.into())
    }

    fn name(&self) -> &str {
        "brave"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_mapping() {
        let body: BraveResponse = serde_json::from_str(
            r#"{"web":{"results":[
                {"url":"https://www.britannica.com/place/Paris","description":"<strong>Paris</strong> is the capital","age":"March 3, 2024"},
                {"title":"no url"}
            ]}}"#,
        )
        .unwrap();
        let hits: Vec<SearchHit> = body.into();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].age.as_deref(), Some("March 3, 2024"));
        assert!(hits[1].url.is_empty());
    }

    #[test]
    fn test_missing_web_section() {
        let body: BraveResponse = serde_json::from_str(r#"{"query":{}}"#).unwrap();
        let hits: Vec<SearchHit> = body.into();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_key_not_in_debug() {
        let source = BraveSearch::from_config(&serde_json::json!({"api_key": "brv-secret"})).unwrap();
        assert!(!format!("{:?}", source).contains("brv-secret"));
    }
}
