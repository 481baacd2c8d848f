//! Escalation controller.
//!
//! Decides whether a cheap-tier answer is unreliable enough to regenerate at
//! the premium tier. Rules are evaluated in order and the first match wins.
//! A request already at the top tier never escalates, which caps the
//! regeneration loop at one pass.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::patterns::contains_hedging;
use crate::types::{GenerationTier, VerificationResult};

/// Hallucination rate above which the answer is regenerated.
pub const MAX_HALLUCINATION_RATE: f64 = 0.3;

/// Mean support below which the answer is regenerated.
pub const MIN_CONFIDENCE: f64 = 0.5;

/// Answers shorter than this many words are regenerated.
pub const MIN_WORDS: usize = 10;

/// Why escalation did or did not fire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EscalationReason {
    AlreadyTopTier,
    ExpressedUncertainty,
    HighHallucinationRate { rate: f64 },
    LowConfidence { confidence: f64 },
    TooBrief { words: usize },
    NotNeeded,
}

impl fmt::Display for EscalationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EscalationReason::AlreadyTopTier => write!(f, "Already at top tier"),
            EscalationReason::ExpressedUncertainty => {
                write!(f, "Generator expressed uncertainty")
            }
            EscalationReason::HighHallucinationRate { rate } => {
                write!(f, "High hallucination rate: {:.1}%", rate * 100.0)
            }
            EscalationReason::LowConfidence { confidence } => {
                write!(f, "Low verification confidence: {:.2}", confidence)
            }
            EscalationReason::TooBrief { words } => {
                write!(f, "Response too brief ({} words), may lack detail", words)
            }
            EscalationReason::NotNeeded => write!(f, "No escalation needed"),
        }
    }
}

/// Outcome of an escalation check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationDecision {
    pub should_escalate: bool,
    pub reason: EscalationReason,

    /// Fraction of verified claims that look contradicted or unsupported
    pub hallucination_score: f64,

    /// Mean support across verified claims
    pub confidence: f64,
}

/// Stateless escalation rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct EscalationController;

impl EscalationController {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate the escalation rules.
    ///
    /// `verifications` holds the results of this cycle only; cached claims
    /// are not included, so an all-cached answer scores as clean.
    pub fn evaluate<'a, I>(&self, tier: GenerationTier, verifications: I, raw_text: &str) -> EscalationDecision
    where
        I: IntoIterator<Item = &'a VerificationResult>,
    {
        let (hallucination_score, confidence) = detected_scores(verifications);
        let decide = |should_escalate: bool, reason: EscalationReason| EscalationDecision {
            should_escalate,
            reason,
            hallucination_score,
            confidence,
        };

        if tier.escalated().is_none() {
            return decide(false, EscalationReason::AlreadyTopTier);
        }

        if contains_hedging(raw_text) {
            return decide(true, EscalationReason::ExpressedUncertainty);
        }

        if hallucination_score > MAX_HALLUCINATION_RATE {
            return decide(
                true,
                EscalationReason::HighHallucinationRate {
                    rate: hallucination_score,
                },
            );
        }

        if confidence < MIN_CONFIDENCE {
            return decide(true, EscalationReason::LowConfidence { confidence });
        }

        let words = raw_text.split_whitespace().count();
        if words < MIN_WORDS {
            return decide(true, EscalationReason::TooBrief { words });
        }

        decide(false, EscalationReason::NotNeeded)
    }
}

/// Hallucination rate and mean support over a set of verifications.
pub fn detected_scores<'a, I>(verifications: I) -> (f64, f64)
where
    I: IntoIterator<Item = &'a VerificationResult>,
{
    let mut total = 0usize;
    let mut problematic = 0usize;
    let mut support_sum = 0.0;

    for v in verifications {
        total += 1;
        if v.contradiction_score > 0.5 || v.neutral_score > 0.7 {
            problematic += 1;
        }
        support_sum += v.support_score;
    }

    if total == 0 {
        return (0.0, 1.0);
    }

    (problematic as f64 / total as f64, support_sum / total as f64)
}
