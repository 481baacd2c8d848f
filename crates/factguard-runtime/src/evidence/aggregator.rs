//! Evidence aggregator: concurrent web + reference retrieval with fallback.

use backon::{ExponentialBuilder, Retryable};
use futures::{stream, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use factguard_core::{Claim, Evidence};

use super::{placeholder_evidence, rank_evidence, Degradation, EvidenceSource, SourceKind};
use crate::config::RetrievalConfig;
use crate::providers::ProviderError;
use crate::resilience::CircuitBreaker;

/// Gathers, merges and ranks evidence for claims.
pub struct EvidenceAggregator {
    web: Option<Arc<dyn EvidenceSource>>,
    reference: Option<Arc<dyn EvidenceSource>>,
    circuit_breaker: Arc<CircuitBreaker>,
    config: RetrievalConfig,
}

impl EvidenceAggregator {
    pub fn new(config: RetrievalConfig, circuit_breaker: Arc<CircuitBreaker>) -> Self {
        Self {
            web: None,
            reference: None,
            circuit_breaker,
            config,
        }
    }

    /// Build with the compiled-in sources: Brave (when a key is set) and
    /// Wikipedia.
    pub fn from_config(config: RetrievalConfig, circuit_breaker: Arc<CircuitBreaker>) -> Self {
        #[allow(unused_mut)]
        let mut aggregator = Self::new(config, circuit_breaker);

        #[cfg(feature = "web-search")]
        {
            if aggregator.config.web_enabled {
                match super::BraveSearch::from_env() {
                    Ok(brave) => aggregator.web = Some(Arc::new(brave)),
                    Err(e) => tracing::info!(error = %e, "Web search unavailable, using placeholder evidence"),
                }
            }
            if aggregator.config.reference_enabled {
                aggregator.reference = Some(Arc::new(super::WikipediaSearch::new()));
            }
        }

        aggregator
    }

    /// Set the web source.
    pub fn with_web(mut self, source: Arc<dyn EvidenceSource>) -> Self {
        self.web = Some(source);
        self
    }

    /// Set the reference source.
    pub fn with_reference(mut self, source: Arc<dyn EvidenceSource>) -> Self {
        self.reference = Some(source);
        self
    }

    /// Per-class budgets for `top_k`: web first, reference gets the rest.
    pub fn budgets(&self, top_k: usize) -> (usize, usize) {
        let web = self.config.web_budget.min(top_k);
        let reference = self.config.reference_budget.min(top_k - web);
        (web, reference)
    }

    /// Retrieve at most `top_k` ranked evidence items for one claim.
    ///
    /// Never fails: unavailable sources contribute placeholder evidence.
    pub async fn retrieve(&self, claim: &str, top_k: usize) -> Vec<Evidence> {
        let (web_budget, reference_budget) = self.budgets(top_k);

        let (web, reference) = tokio::join!(
            self.gather(SourceKind::Web, self.web.as_deref(), claim, web_budget),
            self.gather(SourceKind::Reference, self.reference.as_deref(), claim, reference_budget),
        );

        let mut merged = web;
        merged.extend(reference);
        rank_evidence(merged, top_k)
    }

    /// Retrieve evidence for many claims with bounded fan-out, keyed by claim id.
    pub async fn retrieve_all(&self, claims: &[Claim]) -> HashMap<String, Vec<Evidence>> {
        let top_k = self.config.top_k;
        stream::iter(claims.iter().map(|claim| async move {
            let evidence = self.retrieve(&claim.text, top_k).await;
            tracing::debug!(claim_id = %claim.id, count = evidence.len(), "Evidence retrieved");
            (claim.id.clone(), evidence)
        }))
        .buffer_unordered(self.config.max_concurrent_claims)
        .collect()
        .await
    }

    async fn gather(
        &self,
        kind: SourceKind,
        source: Option<&dyn EvidenceSource>,
        claim: &str,
        limit: usize,
    ) -> Vec<Evidence> {
        if limit == 0 {
            return Vec::new();
        }

        let Some(source) = source else {
            return placeholder_evidence(kind, Degradation::Unconfigured, claim, limit);
        };

        if self.circuit_breaker.is_open(kind.key()) {
            tracing::warn!(source = source.name(), "Circuit open, using placeholder evidence");
            return placeholder_evidence(kind, Degradation::Failed, claim, limit);
        }

        match self.search_with_retry(source, claim, limit).await {
            Ok(hits) => {
                self.circuit_breaker.record_success(kind.key());
                kind.evidence_from_hits(hits, limit)
            }
            Err(e) => {
                tracing::warn!(source = source.name(), error = %e, "Evidence search failed, using placeholders");
                self.circuit_breaker.record_failure(kind.key());
                placeholder_evidence(kind, Degradation::Failed, claim, limit)
            }
        }
    }

    async fn search_with_retry(
        &self,
        source: &dyn EvidenceSource,
        claim: &str,
        limit: usize,
    ) -> Result<Vec<super::SearchHit>, ProviderError> {
        let timeout = self.config.timeout;
        let call = move || async move {
            match tokio::time::timeout(timeout, source.search(claim, limit)).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(timeout)),
            }
        };

        call.retry(
            ExponentialBuilder::default()
                .with_min_delay(Duration::from_millis(200))
                .with_max_times(self.config.max_retries),
        )
        .when(ProviderError::is_transient)
        .notify(|e: &ProviderError, delay: Duration| {
            tracing::debug!(source = source.name(), error = %e, ?delay, "Retrying evidence search");
        })
        .await
    }
}
