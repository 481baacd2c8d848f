//! Synthesizer: assembles per-claim decisions into the final answer.
//!
//! The synthesizer applies fixed rules:
//! 1. CORRECT with correction text → the original claim is replaced in the
//!    answer with `"{corrected} [CORRECTED]"`
//! 2. CORRECT without correction text → audit entry only, text untouched
//! 3. ABSTAIN → uncertainty entry
//! 4. FLAG_FOR_HUMAN → flagged entry
//!
//! Hallucination score is the fraction of CORRECT and FLAG_FOR_HUMAN
//! decisions; confidence is its complement.

use serde::{Deserialize, Serialize};

use crate::types::{Action, Decision};

/// Marker appended to replaced claims.
pub const CORRECTION_MARKER: &str = "[CORRECTED]";

/// Number of evidence URLs kept per correction entry.
const CORRECTION_EVIDENCE_LIMIT: usize = 3;

/// One audit-trail entry describing a change or caveat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Modification {
    Correction {
        original: String,
        /// Absent when no correction text was available
        corrected: Option<String>,
        evidence: Vec<String>,
    },
    Uncertainty {
        claim: String,
        reason: String,
    },
    Flagged {
        claim: String,
        reason: String,
    },
}

/// Count of decisions per action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimBreakdown {
    pub total: usize,
    pub verified: usize,
    pub corrected: usize,
    pub abstained: usize,
    pub flagged: usize,
}

impl ClaimBreakdown {
    pub fn from_decisions(decisions: &[Decision]) -> Self {
        let count = |action: Action| decisions.iter().filter(|d| d.action == action).count();
        Self {
            total: decisions.len(),
            verified: count(Action::Accept),
            corrected: count(Action::Correct),
            abstained: count(Action::Abstain),
            flagged: count(Action::FlagForHuman),
        }
    }
}

/// The assembled answer and its audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssembledAnswer {
    pub verified_answer: String,
    pub modifications: Vec<Modification>,
    pub hallucination_score: f64,
    pub confidence: f64,
    pub claim_breakdown: ClaimBreakdown,
}

/// The Synthesizer turns decisions into a rewritten answer.
#[derive(Debug, Clone, Copy, Default)]
pub struct Synthesizer;

impl Synthesizer {
    pub fn new() -> Self {
        Self
    }

    /// Assemble the final answer from the raw text and per-claim decisions.
    pub fn assemble(&self, raw_answer: &str, decisions: &[Decision]) -> AssembledAnswer {
        let mut verified_answer = raw_answer.to_string();
        let mut modifications = Vec::new();

        for decision in decisions {
            match decision.action {
                Action::Correct => {
                    if let Some(corrected) = &decision.corrected_claim {
                        verified_answer = verified_answer.replace(
                            &decision.original_claim,
                            &format!("{} {}", corrected, CORRECTION_MARKER),
                        );
                    }
                    modifications.push(Modification::Correction {
                        original: decision.original_claim.clone(),
                        corrected: decision.corrected_claim.clone(),
                        evidence: decision
                            .evidence_urls
                            .iter()
                            .take(CORRECTION_EVIDENCE_LIMIT)
                            .cloned()
                            .collect(),
                    });
                }
                Action::Abstain => modifications.push(Modification::Uncertainty {
                    claim: decision.original_claim.clone(),
                    reason: "Insufficient evidence".to_string(),
                }),
                Action::FlagForHuman => modifications.push(Modification::Flagged {
                    claim: decision.original_claim.clone(),
                    reason: decision.reasoning.clone(),
                }),
                Action::Accept => {}
            }
        }

        let hallucination_score = hallucination_score(decisions);

        AssembledAnswer {
            verified_answer,
            modifications,
            hallucination_score,
            confidence: 1.0 - hallucination_score,
            claim_breakdown: ClaimBreakdown::from_decisions(decisions),
        }
    }
}

/// Fraction of decisions that were corrected or flagged (0 when empty).
pub fn hallucination_score(decisions: &[Decision]) -> f64 {
    if decisions.is_empty() {
        return 0.0;
    }
    let problematic = decisions.iter().filter(|d| d.action.is_problematic()).count();
    problematic as f64 / decisions.len() as f64
}
