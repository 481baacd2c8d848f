//! # factguard-core
//!
//! Deterministic building blocks for answer verification.
//!
//! This crate answers, for a generated answer:
//! - Which sentences make checkable factual claims?
//! - How well does gathered evidence support each claim?
//! - Should the answer be regenerated at a stronger tier?
//! - What happens to each claim: accept, correct, abstain or flag?
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: Same input always produces same output
//! 2. **No I/O**: Retrieval, generation and caching live in `factguard-runtime`
//! 3. **Total**: Every verification result maps to exactly one action
//!
//! ## Example
//!
//! ```rust
//! use factguard_core::{ClaimExtractor, DecisionPolicy, heuristic_verification};
//!
//! let claims = ClaimExtractor::new().extract("Paris is the capital of France.");
//! let verification = heuristic_verification(&claims[0].id, &claims[0].text, &[]);
//! let decision = DecisionPolicy::default().decide(&claims[0], &verification, &[]);
//! println!("{}: {}", decision.action, decision.reasoning);
//! ```

pub mod escalation;
pub mod extractor;
pub mod patterns;
pub mod policy;
pub mod scoring;
pub mod synthesizer;
pub mod types;
pub mod verdict;

// Re-export main types at crate root
pub use escalation::{EscalationController, EscalationDecision, EscalationReason};
pub use extractor::{claim_id, normalize_claim_text, ClaimExtractor};
pub use policy::{DecisionPolicy, PolicyThresholds};
pub use scoring::{heuristic_support, heuristic_verification};
pub use synthesizer::{AssembledAnswer, ClaimBreakdown, Modification, Synthesizer};
pub use types::{
    Action, CachedDecision, Claim, ClaimType, Decision, Evidence, GenerationTier,
    VerificationResult,
};
pub use verdict::{ParsedVerdict, VerdictParseError};

/// Verify text offline: extract claims, score them heuristically against the
/// supplied evidence lookup and assemble the answer.
///
/// Useful for checking an answer when evidence was gathered elsewhere.
pub fn verify_offline<F>(text: &str, mut evidence_for: F) -> (Vec<Claim>, Vec<Decision>, AssembledAnswer)
where
    F: FnMut(&Claim) -> Vec<Evidence>,
{
    let claims = ClaimExtractor::new().extract(text);
    let policy = DecisionPolicy::default();

    let decisions: Vec<Decision> = claims
        .iter()
        .map(|claim| {
            let evidence = evidence_for(claim);
            let verification = heuristic_verification(&claim.id, &claim.text, &evidence);
            policy.decide(claim, &verification, &evidence)
        })
        .collect();

    let answer = Synthesizer::new().assemble(text, &decisions);
    (claims, decisions, answer)
}
