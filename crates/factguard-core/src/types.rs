//! Core data types for factguard verification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of factual assertion a claim makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimType {
    Numerical,
    Temporal,
    Entity,
    Event,
}

impl fmt::Display for ClaimType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClaimType::Numerical => write!(f, "numerical"),
            ClaimType::Temporal => write!(f, "temporal"),
            ClaimType::Entity => write!(f, "entity"),
            ClaimType::Event => write!(f, "event"),
        }
    }
}

/// An atomic, independently checkable assertion extracted from generated text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    /// Stable id derived from the normalized text
    pub id: String,

    /// Normalized claim text
    pub text: String,

    pub claim_type: ClaimType,

    /// Sentence as it appeared in the source (trimmed, not normalized)
    pub source_sentence: String,

    /// Index of the sentence in the source text
    pub position: usize,
}

/// A snippet plus source metadata gathered for one claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub source_url: String,

    pub snippet: String,

    /// Relevance (after ranking: relevance × credibility)
    pub relevance_score: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_date: Option<String>,

    pub credibility_score: f64,
}

impl Evidence {
    /// Score used to rank merged evidence.
    pub fn rank_score(&self) -> f64 {
        self.relevance_score * self.credibility_score
    }
}

/// Support/contradiction scores for one claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub claim_id: String,
    pub support_score: f64,
    pub contradiction_score: f64,
    pub neutral_score: f64,

    /// Agreement across evidence. Equals support on the heuristic path and the
    /// scorer-reported confidence on the delegated path.
    pub evidence_agreement: f64,

    pub source_count: usize,

    /// Source URLs of the evidence that was scored
    pub evidence_ids: Vec<String>,
}

impl VerificationResult {
    /// Result for a claim with nothing to check against.
    pub fn neutral(claim_id: impl Into<String>, evidence: &[Evidence]) -> Self {
        Self {
            claim_id: claim_id.into(),
            support_score: 0.0,
            contradiction_score: 0.0,
            neutral_score: 1.0,
            evidence_agreement: 0.0,
            source_count: evidence.len(),
            evidence_ids: evidence.iter().map(|e| e.source_url.clone()).collect(),
        }
    }
}

/// What the policy does with a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Accept,
    Correct,
    Abstain,
    FlagForHuman,
}

impl Action {
    /// Whether this action counts toward the hallucination score.
    pub fn is_problematic(&self) -> bool {
        matches!(self, Action::Correct | Action::FlagForHuman)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Accept => write!(f, "ACCEPT"),
            Action::Correct => write!(f, "CORRECT"),
            Action::Abstain => write!(f, "ABSTAIN"),
            Action::FlagForHuman => write!(f, "FLAG_FOR_HUMAN"),
        }
    }
}

/// Policy outcome for one claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub claim_id: String,
    pub action: Action,
    pub original_claim: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corrected_claim: Option<String>,

    #[serde(default)]
    pub evidence_urls: Vec<String>,

    pub confidence: f64,

    #[serde(default)]
    pub reasoning: String,
}

/// Decision record as persisted in the result cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedDecision {
    pub action: Action,

    #[serde(default)]
    pub corrected_claim: Option<String>,

    #[serde(default)]
    pub evidence_urls: Vec<String>,

    pub confidence: f64,

    pub updated_at: DateTime<Utc>,
}

impl CachedDecision {
    /// Rebuild a decision for `claim` from this record.
    pub fn to_decision(&self, claim: &Claim) -> Decision {
        Decision {
            claim_id: claim.id.clone(),
            action: self.action,
            original_claim: claim.text.clone(),
            corrected_claim: self.corrected_claim.clone(),
            evidence_urls: self.evidence_urls.clone(),
            confidence: self.confidence,
            reasoning: "from cache".to_string(),
        }
    }
}

/// Cost/quality class of generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationTier {
    /// Small, cheap model
    Slm,
    /// Premium model
    Llm,
}

impl GenerationTier {
    /// The next tier up, if any.
    pub fn escalated(&self) -> Option<GenerationTier> {
        match self {
            GenerationTier::Slm => Some(GenerationTier::Llm),
            GenerationTier::Llm => None,
        }
    }
}

impl fmt::Display for GenerationTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationTier::Slm => write!(f, "slm"),
            GenerationTier::Llm => write!(f, "llm"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_serializes_screaming_case() {
        let json = serde_json::to_string(&Action::FlagForHuman).unwrap();
        assert_eq!(json, "\"FLAG_FOR_HUMAN\"");

        let parsed: Action = serde_json::from_str("\"ACCEPT\"").unwrap();
        assert_eq!(parsed, Action::Accept);
    }

    #[test]
    fn test_tier_ordering() {
        assert!(GenerationTier::Slm < GenerationTier::Llm);
        assert_eq!(GenerationTier::Slm.escalated(), Some(GenerationTier::Llm));
        assert_eq!(GenerationTier::Llm.escalated(), None);
    }

    #[test]
    fn test_problematic_actions() {
        assert!(Action::Correct.is_problematic());
        assert!(Action::FlagForHuman.is_problematic());
        assert!(!Action::Accept.is_problematic());
        assert!(!Action::Abstain.is_problematic());
    }
}
