//! Verification scorer.
//!
//! Scores each claim against its evidence. A delegated scorer (usually an
//! LLM) is tried first; any failure, timeout or unparseable verdict falls
//! back to the deterministic token-overlap heuristic from `factguard-core`.

use async_trait::async_trait;
use futures::{stream, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use factguard_core::{
    heuristic_verification, Claim, Evidence, ParsedVerdict, VerdictParseError, VerificationResult,
};

use crate::prompts::{evidence_block, verification_prompt, VERIFICATION_SYSTEM_PROMPT};
use crate::providers::{ChatMessage, CompletionConfig, LlmProvider, ProviderError};
use crate::resilience::CircuitBreaker;

/// Circuit-breaker key for the delegated scorer.
const SCORER_CIRCUIT: &str = "scorer";

/// Errors from a delegated scorer.
#[derive(Error, Debug)]
pub enum ScorerError {
    #[error("Scorer backend failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("Unusable verdict: {0}")]
    Verdict(#[from] VerdictParseError),

    #[error("Scorer timed out after {0:?}")]
    Timeout(Duration),
}

/// A scorer that returns a structured verdict for a claim.
#[async_trait]
pub trait DelegatedScorer: Send + Sync {
    /// Score `claim` against a numbered evidence block.
    async fn score(&self, claim: &str, evidence_block: &str) -> Result<ParsedVerdict, ScorerError>;

    /// Scorer name for logs.
    fn name(&self) -> &str;
}

/// Delegated scorer backed by any [`LlmProvider`].
pub struct LlmScorer {
    provider: Arc<dyn LlmProvider>,
    config: CompletionConfig,
}

impl LlmScorer {
    pub fn new(provider: Arc<dyn LlmProvider>, config: CompletionConfig) -> Self {
        Self { provider, config }
    }
}

#[async_trait]
impl DelegatedScorer for LlmScorer {
    async fn score(&self, claim: &str, evidence_block: &str) -> Result<ParsedVerdict, ScorerError> {
        let messages = vec![
            ChatMessage::system(VERIFICATION_SYSTEM_PROMPT),
            ChatMessage::user(verification_prompt(claim, evidence_block)),
        ];
        let response = self.provider.complete(messages, &self.config).await?;
        Ok(ParsedVerdict::parse(&response.content)?)
    }

    fn name(&self) -> &str {
        self.provider.name()
    }
}

/// Scores claims, delegating when possible.
pub struct VerificationScorer {
    delegate: Option<Arc<dyn DelegatedScorer>>,
    timeout: Duration,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl VerificationScorer {
    /// Heuristic-only scorer.
    pub fn heuristic() -> Self {
        Self {
            delegate: None,
            timeout: Duration::from_secs(20),
            circuit_breaker: Arc::new(CircuitBreaker::default()),
        }
    }

    pub fn new(
        delegate: Option<Arc<dyn DelegatedScorer>>,
        timeout: Duration,
        circuit_breaker: Arc<CircuitBreaker>,
    ) -> Self {
        Self {
            delegate,
            timeout,
            circuit_breaker,
        }
    }

    /// Whether a delegated scorer is configured.
    pub fn is_delegated(&self) -> bool {
        self.delegate.is_some()
    }

    /// Score one claim. Never fails.
    pub async fn verify(&self, claim_id: &str, claim: &str, evidence: &[Evidence]) -> VerificationResult {
        if evidence.is_empty() {
            return VerificationResult::neutral(claim_id, evidence);
        }

        let Some(delegate) = &self.delegate else {
            return heuristic_verification(claim_id, claim, evidence);
        };

        if self.circuit_breaker.is_open(SCORER_CIRCUIT) {
            tracing::debug!(claim_id, "Scorer circuit open, using heuristic");
            return heuristic_verification(claim_id, claim, evidence);
        }

        let block = evidence_block(evidence);
        let outcome = match tokio::time::timeout(self.timeout, delegate.score(claim, &block)).await {
            Ok(result) => result,
            Err(_) => Err(ScorerError::Timeout(self.timeout)),
        };

        match outcome {
            Ok(verdict) => {
                self.circuit_breaker.record_success(SCORER_CIRCUIT);
                verdict.into_verification(claim_id, evidence)
            }
            Err(ScorerError::Verdict(e)) => {
                // The backend answered; only the content was unusable
                self.circuit_breaker.record_success(SCORER_CIRCUIT);
                tracing::warn!(claim_id, scorer = delegate.name(), error = %e, "Verdict unparseable, using heuristic");
                heuristic_verification(claim_id, claim, evidence)
            }
            Err(e) => {
                self.circuit_breaker.record_failure(SCORER_CIRCUIT);
                tracing::warn!(claim_id, scorer = delegate.name(), error = %e, "Scorer failed, using heuristic");
                heuristic_verification(claim_id, claim, evidence)
            }
        }
    }

    /// Score many claims with bounded fan-out, keyed by claim id.
    ///
    /// Claims with no evidence are left out of the result.
    pub async fn verify_all(
        &self,
        claims: &[Claim],
        evidence: &HashMap<String, Vec<Evidence>>,
        concurrency: usize,
    ) -> HashMap<String, VerificationResult> {
        let scorable = claims.iter().filter_map(|claim| match evidence.get(&claim.id) {
            Some(items) if !items.is_empty() => Some((claim, items.as_slice())),
            _ => {
                tracing::debug!(claim_id = %claim.id, "No evidence, skipping verification");
                None
            }
        });

        stream::iter(scorable.map(|(claim, items)| async move {
            (claim.id.clone(), self.verify(&claim.id, &claim.text, items).await)
        }))
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await
    }
}
