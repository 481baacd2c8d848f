//! Heuristic verification scoring.
//!
//! Token-overlap scoring used whenever no delegated scorer is available or
//! the scorer fails. It never reports contradiction.

use crate::patterns::content_tokens;
use crate::types::{Evidence, VerificationResult};

/// Minimum token length considered by the overlap heuristic.
pub const MIN_TOKEN_LEN: usize = 4;

/// Support floor applied to any claim with evidence.
pub const SUPPORT_FLOOR: f64 = 0.2;

/// Support used when a claim has no qualifying tokens.
pub const TOKENLESS_SUPPORT: f64 = 0.3;

/// Support score from token overlap between the claim and its evidence.
///
/// Each evidence item scores the fraction of claim tokens found in its
/// snippet; the best item wins and is mapped into [0.2, 1.0].
pub fn heuristic_support(claim: &str, evidence: &[Evidence]) -> f64 {
    let tokens = content_tokens(claim, MIN_TOKEN_LEN);
    if tokens.is_empty() {
        return TOKENLESS_SUPPORT;
    }

    let base = evidence
        .iter()
        .map(|item| {
            let haystack = item.snippet.to_lowercase();
            let hits = tokens.iter().filter(|t| haystack.contains(t.as_str())).count();
            hits as f64 / tokens.len() as f64
        })
        .fold(0.0_f64, f64::max);

    (SUPPORT_FLOOR + (1.0 - SUPPORT_FLOOR) * base).clamp(0.0, 1.0)
}

/// Score a claim without a delegated scorer.
pub fn heuristic_verification(
    claim_id: impl Into<String>,
    claim: &str,
    evidence: &[Evidence],
) -> VerificationResult {
    if evidence.is_empty() {
        return VerificationResult::neutral(claim_id, evidence);
    }

    let support = heuristic_support(claim, evidence);
    VerificationResult {
        claim_id: claim_id.into(),
        support_score: support,
        contradiction_score: 0.0,
        neutral_score: (1.0 - support).max(0.0),
        evidence_agreement: support,
        source_count: evidence.len(),
        evidence_ids: evidence.iter().map(|e| e.source_url.clone()).collect(),
    }
}
