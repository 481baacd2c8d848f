//! Claim extraction.
//!
//! Turns generated text into an ordered list of checkable claims. Extraction
//! is pure: the same text always yields the same claims, ids and order.

use crate::patterns::{
    split_sentences, CAPITALIZED_WORD, COPULA, FACT_VERB, LOCATIVE_TOKEN, NUMERICAL_TOKEN,
    TEMPORAL_TOKEN, WHITESPACE_RUN,
};
use crate::types::{Claim, ClaimType};

/// Number of hex characters kept from the claim hash.
const CLAIM_ID_LEN: usize = 16;

/// Extracts factual claims from text.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClaimExtractor;

impl ClaimExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract claims in sentence order.
    pub fn extract(&self, text: &str) -> Vec<Claim> {
        split_sentences(text)
            .into_iter()
            .enumerate()
            .filter_map(|(position, sentence)| {
                let sentence = sentence.trim();
                if sentence.is_empty() || sentence.ends_with('?') || !looks_factual(sentence) {
                    return None;
                }

                let text = normalize_claim_text(sentence);
                Some(Claim {
                    id: claim_id(&text),
                    claim_type: classify(sentence),
                    source_sentence: sentence.to_string(),
                    position,
                    text,
                })
            })
            .collect()
    }
}

/// Collapse whitespace runs and trim.
pub fn normalize_claim_text(text: &str) -> String {
    WHITESPACE_RUN.replace_all(text.trim(), " ").into_owned()
}

/// Stable id for already-normalized claim text.
pub fn claim_id(normalized: &str) -> String {
    let hash = blake3::hash(normalized.as_bytes());
    hash.to_hex()[..CLAIM_ID_LEN].to_string()
}

/// A sentence looks factual if it has a digit, or a proper noun plus a
/// copula/creation verb.
pub fn looks_factual(sentence: &str) -> bool {
    let has_digit = sentence.chars().any(|c| c.is_ascii_digit());
    has_digit || (CAPITALIZED_WORD.is_match(sentence) && FACT_VERB.is_match(sentence))
}

/// Classify a sentence; first matching category wins.
///
/// Entity covers locative phrasing and identity statements that name a
/// proper noun on both sides of the copula ("Paris is the capital of France").
pub fn classify(sentence: &str) -> ClaimType {
    if NUMERICAL_TOKEN.is_match(sentence) {
        ClaimType::Numerical
    } else if TEMPORAL_TOKEN.is_match(sentence) {
        ClaimType::Temporal
    } else if LOCATIVE_TOKEN.is_match(sentence) || is_identity_statement(sentence) {
        ClaimType::Entity
    } else {
        ClaimType::Event
    }
}

fn is_identity_statement(sentence: &str) -> bool {
    let Some(copula) = COPULA.find(sentence) else {
        return false;
    };
    CAPITALIZED_WORD.is_match(&sentence[..copula.start()])
        && CAPITALIZED_WORD.is_match(&sentence[copula.end()..])
}
