//! Prompts for generation and delegated verification.

use factguard_core::Evidence;

/// System prompt for answer generation at either tier.
///
/// Asking the model to state uncertainty lets the escalation controller pick
/// up hedged answers.
pub const GENERATION_SYSTEM_PROMPT: &str = "You are a helpful assistant. Provide accurate, concise answers. \
If you're unsure about something, clearly state your uncertainty.";

/// System prompt for the delegated scorer.
pub const VERIFICATION_SYSTEM_PROMPT: &str = "You are a fact-verification expert. \
You compare a claim with numbered evidence and answer with a single JSON object.";

/// Number evidence as `Source N (url):\nsnippet`, separated by blank lines.
pub fn evidence_block(evidence: &[Evidence]) -> String {
    evidence
        .iter()
        .enumerate()
        .map(|(i, e)| format!("Source {} ({}):\n{}", i + 1, e.source_url, e.snippet))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// User prompt asking for a JSON verdict on `claim`.
pub fn verification_prompt(claim: &str, evidence_block: &str) -> String {
    format!(
        r#"Analyze if the evidence supports, contradicts, or is neutral to the claim.

CLAIM: {claim}

EVIDENCE:
{evidence_block}

Return ONLY a JSON object with this exact structure (no markdown, no code blocks):
{{
  "verdict": "SUPPORTED" | "CONTRADICTED" | "NEUTRAL",
  "support_score": 0.0-1.0,
  "contradiction_score": 0.0-1.0,
  "neutral_score": 0.0-1.0,
  "confidence": 0.0-1.0,
  "reasoning": "brief explanation"
}}

Scores must sum to 1.0."#
    )
}
