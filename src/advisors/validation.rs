//! Structured-output validation for raw advisor replies
//!
//! Models wrap JSON in markdown fences, prepend apologies, or invent action
//! names. The validator is tolerant of wrapping noise but strict about the
//! schema: exactly one known action, a confidence in [0, 1], and a rationale
//! string. Anything else is a `validation` failure for that advisor.

use serde::Deserialize;

use crate::types::CoarseAction;

/// Schema-validated advisor opinion.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedOpinion {
    pub action: CoarseAction,
    pub confidence: f64,
    pub rationale: String,
}

/// Validation failures, reported per advisor.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum ValidationError {
    #[error("no JSON object found in reply")]
    NoJson,
    #[error("malformed JSON: {0}")]
    Malformed(String),
    #[error("unknown action: {0}")]
    UnknownAction(String),
    #[error("confidence {0} outside [0, 1]")]
    ConfidenceOutOfRange(f64),
}

#[derive(Deserialize)]
struct RawOpinion {
    action: String,
    confidence: f64,
    #[serde(default)]
    rationale: String,
}

/// Validate a raw transport reply into a structured opinion.
pub fn parse_opinion(raw_text: &str) -> Result<ParsedOpinion, ValidationError> {
    let json = extract_json_object(raw_text).ok_or(ValidationError::NoJson)?;
    let raw: RawOpinion =
        serde_json::from_str(json).map_err(|e| ValidationError::Malformed(e.to_string()))?;

    let action: CoarseAction = raw
        .action
        .trim()
        .to_lowercase()
        .parse()
        .map_err(|_| ValidationError::UnknownAction(raw.action.clone()))?;

    if !raw.confidence.is_finite() || !(0.0..=1.0).contains(&raw.confidence) {
        return Err(ValidationError::ConfidenceOutOfRange(raw.confidence));
    }

    Ok(ParsedOpinion {
        action,
        confidence: raw.confidence,
        rationale: raw.rationale.trim().to_string(),
    })
}

/// Slice out the first balanced-looking JSON object, skipping markdown
/// fences and any prose around it.
fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&raw[start..=end])
}

// ============================================================================
// Tests
// ============================================================================
