//! Shared text patterns.
//!
//! Sentence splitting, the "looks factual" cues, claim classification and
//! the hedging phrases used by escalation all live here so the extractor and
//! the escalation controller agree on the same vocabulary.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // =========================================================================
    // SENTENCE STRUCTURE
    // =========================================================================

    /// Sentence-terminal punctuation followed by whitespace
    pub static ref SENTENCE_BOUNDARY: Regex = Regex::new(r"[.!?]\s+").unwrap();

    /// Runs of whitespace, collapsed during normalization
    pub static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").unwrap();

    /// Alphanumeric tokens used by the overlap heuristic
    pub static ref WORD_TOKEN: Regex = Regex::new(r"[A-Za-z0-9]+").unwrap();

    // =========================================================================
    // FACTUALITY CUES
    // =========================================================================

    /// Capitalized multi-letter word (proper noun candidate)
    pub static ref CAPITALIZED_WORD: Regex = Regex::new(r"\b[A-Z][a-z]+\b").unwrap();

    /// Copula or creation verb
    pub static ref FACT_VERB: Regex = Regex::new(
        r"(?i)\b(is|are|was|were|has|have|had|will|won|founded|born|died|released|created|located)\b"
    ).unwrap();

    // =========================================================================
    // CLAIM CLASSIFICATION
    // =========================================================================

    /// Numbers, currency and percentages
    pub static ref NUMERICAL_TOKEN: Regex = Regex::new(
        r"(?i)\b(\d+|percent|usd|million|billion)\b|[%$]"
    ).unwrap();

    /// Years, months and relative days
    pub static ref TEMPORAL_TOKEN: Regex = Regex::new(
        r"(?i)\b(\d{4}|jan|feb|mar|apr|may|jun|jul|aug|sep|sept|oct|nov|dec|january|february|march|april|june|july|august|september|october|november|december|yesterday|today|tomorrow)\b"
    ).unwrap();

    /// Copular verbs
    pub static ref COPULA: Regex = Regex::new(r"(?i)\b(is|are|was|were)\b").unwrap();

    /// Locative prepositions
    pub static ref LOCATIVE_TOKEN: Regex = Regex::new(
        r"(?i)\b(in|at|near|located|based)\b"
    ).unwrap();
}

/// Phrases that signal the generator was unsure of its answer.
pub const HEDGING_PHRASES: &[&str] = &[
    "i don't know",
    "i'm not sure",
    "i cannot",
    "i don't have",
    "unclear",
    "uncertain",
    "i cannot confirm",
];

/// Check if text contains any hedging phrase (case-insensitive).
pub fn contains_hedging(text: &str) -> bool {
    let lower = text.to_lowercase();
    HEDGING_PHRASES.iter().any(|phrase| lower.contains(phrase))
}

/// Split text into non-empty sentences, keeping terminal punctuation.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let text = text.trim();
    let mut sentences = Vec::new();
    let mut start = 0;

    for boundary in SENTENCE_BOUNDARY.find_iter(text) {
        // Punctuation is a single ASCII byte
        let end = boundary.start() + 1;
        sentences.push(&text[start..end]);
        start = boundary.end();
    }
    if start < text.len() {
        sentences.push(&text[start..]);
    }

    sentences.into_iter().filter(|s| !s.trim().is_empty()).collect()
}

/// Lowercased alphanumeric tokens of at least `min_len` characters.
pub fn content_tokens(text: &str, min_len: usize) -> Vec<String> {
    WORD_TOKEN
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|t| t.chars().count() >= min_len)
        .map(|t| t.to_lowercase())
        .collect()
}
