//! Adaptive decision policy.
//!
//! Maps a verification result to exactly one action:
//! 1. Strong support and negligible contradiction → ACCEPT
//! 2. Strong contradiction → CORRECT
//! 3. Too few sources or weak agreement → ABSTAIN
//! 4. Otherwise → FLAG_FOR_HUMAN
//!
//! The mapping is deterministic. The decision's confidence is the evidence
//! agreement, not the raw support score.

use serde::{Deserialize, Serialize};

use crate::types::{Action, Claim, Decision, Evidence, VerificationResult};

/// Thresholds for the decision rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyThresholds {
    /// Support must exceed this to accept
    pub accept_support: f64,

    /// Contradiction must stay below this to accept
    pub accept_max_contradiction: f64,

    /// Contradiction above this triggers a correction
    pub correct_contradiction: f64,

    /// Fewer sources than this abstains
    pub min_sources: usize,

    /// Agreement below this abstains
    pub min_agreement: f64,
}

impl Default for PolicyThresholds {
    fn default() -> Self {
        Self {
            accept_support: 0.85,
            accept_max_contradiction: 0.1,
            correct_contradiction: 0.7,
            min_sources: 2,
            min_agreement: 0.5,
        }
    }
}

impl PolicyThresholds {
    /// Check that score thresholds are probabilities.
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("accept_support", self.accept_support),
            ("accept_max_contradiction", self.accept_max_contradiction),
            ("correct_contradiction", self.correct_contradiction),
            ("min_agreement", self.min_agreement),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("policy.{} must be within [0, 1], got {}", name, value));
            }
        }
        Ok(())
    }
}

/// Per-claim decision policy.
#[derive(Debug, Clone, Default)]
pub struct DecisionPolicy {
    thresholds: PolicyThresholds,
}

impl DecisionPolicy {
    pub fn new(thresholds: PolicyThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &PolicyThresholds {
        &self.thresholds
    }

    /// Decide what to do with a claim.
    pub fn decide(&self, claim: &Claim, verification: &VerificationResult, evidence: &[Evidence]) -> Decision {
        let action = self.action_for(verification);
        Decision {
            claim_id: claim.id.clone(),
            action,
            original_claim: claim.text.clone(),
            corrected_claim: None,
            evidence_urls: evidence.iter().map(|e| e.source_url.clone()).collect(),
            confidence: verification.evidence_agreement,
            reasoning: reasoning(action).to_string(),
        }
    }

    /// The action for a verification result, first matching rule wins.
    pub fn action_for(&self, v: &VerificationResult) -> Action {
        let t = &self.thresholds;
        if v.support_score > t.accept_support && v.contradiction_score < t.accept_max_contradiction {
            Action::Accept
        } else if v.contradiction_score > t.correct_contradiction {
            Action::Correct
        } else if v.source_count < t.min_sources || v.evidence_agreement < t.min_agreement {
            Action::Abstain
        } else {
            Action::FlagForHuman
        }
    }
}

fn reasoning(action: Action) -> &'static str {
    match action {
        Action::Accept => "Evidence supports the claim.",
        Action::Correct => "Evidence contradicts the claim.",
        Action::Abstain => "Insufficient evidence confidence.",
        Action::FlagForHuman => "Mixed evidence signals; requires review.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClaimType;
    use proptest::prelude::*;

    fn claim() -> Claim {
        Claim {
            id: "abc".to_string(),
            text: "Paris is the capital of France.".to_string(),
            claim_type: ClaimType::Entity,
            source_sentence: "Paris is the capital of France.".to_string(),
            position: 0,
        }
    }

    fn verification(support: f64, contradiction: f64, agreement: f64, sources: usize) -> VerificationResult {
        VerificationResult {
            claim_id: "abc".to_string(),
            support_score: support,
            contradiction_score: contradiction,
            neutral_score: (1.0 - support - contradiction).max(0.0),
            evidence_agreement: agreement,
            source_count: sources,
            evidence_ids: vec![],
        }
    }

    #[test]
    fn test_accept() {
        let policy = DecisionPolicy::default();
        let decision = policy.decide(&claim(), &verification(0.9, 0.05, 0.9, 3), &[]);
        assert_eq!(decision.action, Action::Accept);
        assert_eq!(decision.confidence, 0.9);
        assert!(decision.corrected_claim.is_none());
    }

    #[test]
    fn test_correct() {
        let policy = DecisionPolicy::default();
        assert_eq!(policy.action_for(&verification(0.1, 0.8, 0.9, 3)), Action::Correct);
    }

    #[test]
    fn test_abstain_on_few_sources() {
        let policy = DecisionPolicy::default();
        assert_eq!(policy.action_for(&verification(0.6, 0.2, 0.9, 1)), Action::Abstain);
    }

    #[test]
    fn test_abstain_on_weak_agreement() {
        let policy = DecisionPolicy::default();
        assert_eq!(policy.action_for(&verification(0.6, 0.2, 0.4, 5)), Action::Abstain);
    }

    #[test]
    fn test_flag_for_human() {
        let policy = DecisionPolicy::default();
        assert_eq!(policy.action_for(&verification(0.6, 0.2, 0.6, 5)), Action::FlagForHuman);
    }

    #[test]
    fn test_confidence_is_agreement_not_support() {
        let policy = DecisionPolicy::default();
        let decision = policy.decide(&claim(), &verification(0.95, 0.0, 0.4, 3), &[]);
        assert_eq!(decision.action, Action::Accept);
        assert_eq!(decision.confidence, 0.4);
    }

    #[test]
    fn test_evidence_urls_recorded() {
        let evidence = vec![Evidence {
            source_url: "https://en.wikipedia.org/wiki/Paris".to_string(),
            snippet: "Paris".to_string(),
            relevance_score: 0.5,
            publish_date: None,
            credibility_score: 0.8,
        }];
        let decision = DecisionPolicy::default().decide(&claim(), &verification(0.9, 0.0, 0.9, 1), &evidence);
        assert_eq!(decision.evidence_urls, vec!["https://en.wikipedia.org/wiki/Paris".to_string()]);
    }

    #[test]
    fn test_threshold_validation() {
        assert!(PolicyThresholds::default().validate().is_ok());
        let bad = PolicyThresholds {
            min_agreement: 1.5,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    proptest! {
        #[test]
        fn prop_policy_is_total_and_deterministic(
            support in -10.0f64..10.0,
            contradiction in -10.0f64..10.0,
            agreement in -10.0f64..10.0,
            sources in 0usize..10,
        ) {
            let policy = DecisionPolicy::default();
            let v = verification(support, contradiction, agreement, sources);
            let first = policy.action_for(&v);
            prop_assert_eq!(first, policy.action_for(&v));
            prop_assert!(matches!(
                first,
                Action::Accept | Action::Correct | Action::Abstain | Action::FlagForHuman
            ));
        }
    }
}
