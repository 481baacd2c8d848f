//! Evidence retrieval.
//!
//! Two source classes feed every claim: a web search source and a reference
//! (encyclopedia) source. Either may be missing or failing; the aggregator
//! then substitutes deterministic placeholder evidence so retrieval never
//! errors.

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use factguard_core::Evidence;

use crate::providers::ProviderError;

mod aggregator;

#[cfg(feature = "web-search")]
mod brave;
#[cfg(feature = "web-search")]
mod wikipedia;

pub use aggregator::EvidenceAggregator;

#[cfg(feature = "web-search")]
pub use brave::{BraveSearch, BRAVE_API_KEY_ENV};
#[cfg(feature = "web-search")]
pub use wikipedia::WikipediaSearch;

/// A raw search result before scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub url: String,
    pub snippet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<String>,
}

/// A searchable evidence backend.
#[async_trait]
pub trait EvidenceSource: Send + Sync {
    /// Search for up to `limit` hits.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, ProviderError>;

    /// Source name for logs.
    fn name(&self) -> &str;
}

/// Which class of source produced evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Web,
    Reference,
}

/// Why placeholder evidence was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Degradation {
    /// No source configured (missing credentials or feature)
    Unconfigured,
    /// The source errored, timed out or its circuit is open
    Failed,
}

impl SourceKind {
    /// Circuit-breaker key.
    pub fn key(&self) -> &'static str {
        match self {
            SourceKind::Web => "web",
            SourceKind::Reference => "reference",
        }
    }

    /// (relevance, credibility) assigned to real hits.
    fn hit_scores(&self) -> (f64, f64) {
        match self {
            SourceKind::Web => (0.75, 0.7),
            SourceKind::Reference => (0.65, 0.8),
        }
    }

    fn placeholder_url(&self, index: usize) -> String {
        match self {
            SourceKind::Web => format!("https://example.com/evidence/{}", index),
            SourceKind::Reference => format!("https://example.com/reference/{}", index),
        }
    }

    /// Turn raw hits into evidence, skipping items missing a URL or snippet.
    pub fn evidence_from_hits(&self, hits: Vec<SearchHit>, limit: usize) -> Vec<Evidence> {
        let (relevance, credibility) = self.hit_scores();
        hits.into_iter()
            .filter_map(|hit| {
                let snippet = strip_markup(&hit.snippet);
                if hit.url.trim().is_empty() || snippet.is_empty() {
                    return None;
                }
                Some(Evidence {
                    source_url: hit.url,
                    snippet,
                    relevance_score: relevance,
                    publish_date: hit.age,
                    credibility_score: credibility,
                })
            })
            .take(limit)
            .collect()
    }
}

/// Deterministic stand-in evidence with relevance decreasing by 0.1 per item.
pub fn placeholder_evidence(kind: SourceKind, degradation: Degradation, claim: &str, count: usize) -> Vec<Evidence> {
    let (base, credibility) = match degradation {
        Degradation::Unconfigured => (0.8, 0.6),
        Degradation::Failed => (0.7, 0.5),
    };

    (0..count)
        .map(|i| Evidence {
            source_url: kind.placeholder_url(i),
            snippet: format!("Placeholder evidence for: {}", claim),
            relevance_score: (base - 0.1 * i as f64).max(0.0),
            publish_date: None,
            credibility_score: credibility,
        })
        .collect()
}

/// Re-score relevance as relevance × credibility, sort descending and keep
/// the first `top_k`.
pub fn rank_evidence(mut evidence: Vec<Evidence>, top_k: usize) -> Vec<Evidence> {
    for item in &mut evidence {
        item.relevance_score = item.rank_score();
    }
    evidence.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
    evidence.truncate(top_k);
    evidence
}

lazy_static! {
    static ref MARKUP_TAG: Regex = Regex::new(r"<[^>]*>").unwrap();
}

/// Remove HTML tags and decode the common entities search APIs emit.
pub fn strip_markup(text: &str) -> String {
    MARKUP_TAG
        .replace_all(text, "")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
        .trim()
        .to_string()
}
