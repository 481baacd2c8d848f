//! Parsing of delegated-scorer verdicts.
//!
//! Scorers answer in loosely formatted JSON, sometimes wrapped in prose or
//! code fences. Parsing is permissive about the wrapping and strict about
//! the values: every score must be a number in [0, 1].

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::types::{Evidence, VerificationResult};

/// Errors from verdict parsing.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VerdictParseError {
    #[error("No JSON object found in scorer output")]
    NoJsonObject,

    #[error("Malformed verdict JSON: {0}")]
    Malformed(String),

    #[error("Verdict failed schema validation: {0}")]
    SchemaViolation(String),
}

lazy_static! {
    static ref VERDICT_VALIDATOR: jsonschema::Validator = {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "support_score": { "type": "number", "minimum": 0.0, "maximum": 1.0 },
                "contradiction_score": { "type": "number", "minimum": 0.0, "maximum": 1.0 },
                "neutral_score": { "type": "number", "minimum": 0.0, "maximum": 1.0 },
                "confidence": { "type": "number", "minimum": 0.0, "maximum": 1.0 },
                "verdict": { "type": "string" },
                "reasoning": { "type": "string" }
            }
        });
        jsonschema::validator_for(&schema).unwrap()
    };
}

/// A verdict returned by a delegated scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedVerdict {
    #[serde(default)]
    pub support_score: f64,

    #[serde(default)]
    pub contradiction_score: f64,

    #[serde(default = "default_neutral")]
    pub neutral_score: f64,

    #[serde(default)]
    pub confidence: f64,

    /// SUPPORTED / CONTRADICTED / NEUTRAL label, informational only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

fn default_neutral() -> f64 {
    1.0
}

impl ParsedVerdict {
    /// Parse scorer output: the whole text as JSON, else the first balanced
    /// `{...}` substring.
    pub fn parse(text: &str) -> Result<Self, VerdictParseError> {
        let value = match serde_json::from_str::<JsonValue>(text.trim()) {
            Ok(value) if value.is_object() => value,
            _ => {
                let candidate = first_balanced_object(text).ok_or(VerdictParseError::NoJsonObject)?;
                serde_json::from_str::<JsonValue>(candidate)
                    .map_err(|e| VerdictParseError::Malformed(e.to_string()))?
            }
        };

        Self::from_value(value)
    }

    /// Validate and convert an already-parsed JSON value.
    pub fn from_value(value: JsonValue) -> Result<Self, VerdictParseError> {
        if let Some(error) = VERDICT_VALIDATOR.iter_errors(&value).next() {
            return Err(VerdictParseError::SchemaViolation(error.to_string()));
        }

        serde_json::from_value(value).map_err(|e| VerdictParseError::Malformed(e.to_string()))
    }

    /// Turn this verdict into a verification result for `claim_id`.
    pub fn into_verification(self, claim_id: impl Into<String>, evidence: &[Evidence]) -> VerificationResult {
        VerificationResult {
            claim_id: claim_id.into(),
            support_score: self.support_score,
            contradiction_score: self.contradiction_score,
            neutral_score: self.neutral_score,
            evidence_agreement: self.confidence,
            source_count: evidence.len(),
            evidence_ids: evidence.iter().map(|e| e.source_url.clone()).collect(),
        }
    }
}

/// Find the first balanced-brace substring, ignoring braces inside strings.
pub fn first_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_parse() {
        let verdict = ParsedVerdict::parse(
            r#"{"support_score": 0.9, "contradiction_score": 0.05, "neutral_score": 0.05, "confidence": 0.8}"#,
        )
        .unwrap();
        assert_eq!(verdict.support_score, 0.9);
        assert_eq!(verdict.confidence, 0.8);
    }

    #[test]
    fn test_parse_wrapped_in_prose() {
        let text = "Sure! Here is my analysis:\n```json\n{\"verdict\": \"CONTRADICTED\", \"support_score\": 0.1, \"contradiction_score\": 0.8, \"neutral_score\": 0.1, \"confidence\": 0.7, \"reasoning\": \"dates {differ}\"}\n```\nAnything else? {\"x\": 1}";
        let verdict = ParsedVerdict::parse(text).unwrap();
        assert_eq!(verdict.contradiction_score, 0.8);
        assert_eq!(verdict.verdict.as_deref(), Some("CONTRADICTED"));
        assert_eq!(verdict.reasoning.as_deref(), Some("dates {differ}"));
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let verdict = ParsedVerdict::parse(r#"{"support_score": 0.4}"#).unwrap();
        assert_eq!(verdict.contradiction_score, 0.0);
        assert_eq!(verdict.neutral_score, 1.0);
        assert_eq!(verdict.confidence, 0.0);
    }

    #[test]
    fn test_no_object() {
        assert_eq!(
            ParsedVerdict::parse("I could not decide."),
            Err(VerdictParseError::NoJsonObject)
        );
    }

    #[test]
    fn test_unbalanced_object() {
        assert_eq!(
            ParsedVerdict::parse(r#"result: {"support_score": 0.4"#),
            Err(VerdictParseError::NoJsonObject)
        );
    }

    #[test]
    fn test_out_of_range_score_rejected() {
        let result = ParsedVerdict::parse(r#"{"support_score": 1.7}"#);
        assert!(matches!(result, Err(VerdictParseError::SchemaViolation(_))));
    }

    #[test]
    fn test_non_numeric_score_rejected() {
        let result = ParsedVerdict::parse(r#"{"support_score": "high"}"#);
        assert!(matches!(result, Err(VerdictParseError::SchemaViolation(_))));
    }

    #[test]
    fn test_balanced_extraction_skips_string_braces() {
        let text = r#"prefix {"a": "}", "b": {"c": 1}} suffix"#;
        assert_eq!(first_balanced_object(text), Some(r#"{"a": "}", "b": {"c": 1}}"#));
    }

    #[test]
    fn test_into_verification_uses_confidence_as_agreement() {
        let evidence = vec![Evidence {
            source_url: "https://a".to_string(),
            snippet: "s".to_string(),
            relevance_score: 0.5,
            publish_date: None,
            credibility_score: 0.5,
        }];
        let verdict = ParsedVerdict::parse(r#"{"support_score": 0.9, "confidence": 0.6}"#).unwrap();
        let result = verdict.into_verification("abc", &evidence);
        assert_eq!(result.evidence_agreement, 0.6);
        assert_eq!(result.source_count, 1);
        assert_eq!(result.evidence_ids, vec!["https://a".to_string()]);
    }
}
