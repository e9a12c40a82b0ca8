//! Extraction and validation of model responses.
//!
//! Local models wrap JSON in markdown fences or chat filler more often than
//! not, so extraction is two-phase: unwrap a code fence if present, else
//! scan for the outermost brace pair. Parsed payloads are then validated
//! strictly. Any violation of the output contract is a `SchemaValidation`
//! error, which the retry layer treats the same as a failed call.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::Deserialize;
use serde_json::Value;

use super::ModelError;
use crate::models::{ConfidenceLevel, ExemptionCategory, ExemptionFinding};

/// Shortest acceptable reasoning string for a responsiveness verdict.
/// Guards against the model emitting bare "yes"/"no" filler.
const MIN_REASONING_LEN: usize = 10;

/// Pull the JSON object out of a raw model response.
pub fn extract_json(raw: &str) -> Result<String, ModelError> {
    let trimmed = raw.trim();

    // Fenced block first: ```json ... ``` or plain ``` ... ```
    if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        let after_tag = after_fence
            .strip_prefix("json")
            .unwrap_or(after_fence)
            .trim_start();
        if let Some(end) = after_tag.find("```") {
            let inner = after_tag[..end].trim();
            if !inner.is_empty() {
                return Ok(inner.to_string());
            }
        }
    }

    // Fall back to the outermost brace pair.
    let start = trimmed.find('{');
    let end = trimmed.rfind('}');
    match (start, end) {
        (Some(s), Some(e)) if e > s => Ok(trimmed[s..=e].to_string()),
        _ => Err(ModelError::MalformedResponse(
            "no JSON object found in model response".into(),
        )),
    }
}

/// Validated stage-one payload. Arrays are index-aligned with requests.
#[derive(Debug, PartialEq)]
pub struct ParsedResponsiveness {
    pub responsive: Vec<bool>,
    pub confidence: Vec<ConfidenceLevel>,
    pub reasoning: Vec<String>,
}

#[derive(Deserialize)]
struct RawResponsiveness {
    responsive: Vec<bool>,
    confidence: Vec<String>,
    reasoning: Vec<String>,
}

/// Parse and validate a stage-one response against the request count.
pub fn parse_responsiveness(
    raw: &str,
    request_count: usize,
) -> Result<ParsedResponsiveness, ModelError> {
    let json = extract_json(raw)?;
    let value: Value = serde_json::from_str(&json)
        .map_err(|e| ModelError::MalformedResponse(e.to_string()))?;
    let payload: RawResponsiveness = serde_json::from_value(value)
        .map_err(|e| ModelError::SchemaValidation(e.to_string()))?;

    for (name, len) in [
        ("responsive", payload.responsive.len()),
        ("confidence", payload.confidence.len()),
        ("reasoning", payload.reasoning.len()),
    ] {
        if len != request_count {
            return Err(ModelError::SchemaValidation(format!(
                "'{name}' has {len} entries, expected {request_count}"
            )));
        }
    }

    let confidence = payload
        .confidence
        .iter()
        .map(|s| {
            ConfidenceLevel::from_str(&s.to_lowercase())
                .map_err(|e| ModelError::SchemaValidation(e.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    for (i, reason) in payload.reasoning.iter().enumerate() {
        if reason.trim().len() < MIN_REASONING_LEN {
            return Err(ModelError::SchemaValidation(format!(
                "reasoning for request {} is too short",
                i + 1
            )));
        }
    }

    Ok(ParsedResponsiveness {
        responsive: payload.responsive,
        confidence,
        reasoning: payload.reasoning,
    })
}

#[derive(Deserialize)]
struct RawExemptions {
    exemptions: BTreeMap<String, RawFinding>,
}

#[derive(Deserialize)]
struct RawFinding {
    applies: bool,
    confidence: String,
    reasoning: String,
}

/// Parse and validate a stage-two response. Every catalog category must be
/// present; extras are rejected. Findings come back in catalog order.
pub fn parse_exemptions(raw: &str) -> Result<Vec<ExemptionFinding>, ModelError> {
    let json = extract_json(raw)?;
    let value: Value = serde_json::from_str(&json)
        .map_err(|e| ModelError::MalformedResponse(e.to_string()))?;
    let payload: RawExemptions = serde_json::from_value(value)
        .map_err(|e| ModelError::SchemaValidation(e.to_string()))?;

    for key in payload.exemptions.keys() {
        if ExemptionCategory::from_str(key).is_err() {
            return Err(ModelError::SchemaValidation(format!(
                "unknown exemption category '{key}'"
            )));
        }
    }

    let mut findings = Vec::with_capacity(ExemptionCategory::ALL.len());
    for category in ExemptionCategory::ALL {
        let raw_finding = payload.exemptions.get(category.as_str()).ok_or_else(|| {
            ModelError::SchemaValidation(format!(
                "missing exemption category '{}'",
                category.as_str()
            ))
        })?;
        let confidence = ConfidenceLevel::from_str(&raw_finding.confidence.to_lowercase())
            .map_err(|e| ModelError::SchemaValidation(e.to_string()))?;
        findings.push(ExemptionFinding {
            category,
            applies: raw_finding.applies,
            confidence,
            reasoning: raw_finding.reasoning.clone(),
        });
    }
    Ok(findings)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_STAGE_ONE: &str = r#"{
        "responsive": [true, false],
        "confidence": ["high", "medium"],
        "reasoning": ["Discusses the requested project directly.", "Unrelated to the second request."]
    }"#;

    #[test]
    fn extract_json_from_fenced_block() {
        let raw = "Here is my analysis:\n```json\n{\"responsive\": [true]}\n```\nDone.";
        assert_eq!(extract_json(raw).unwrap(), "{\"responsive\": [true]}");
    }

    #[test]
    fn extract_json_from_untagged_fence() {
        let raw = "```\n{\"a\": 1}\n```";
        assert_eq!(extract_json(raw).unwrap(), "{\"a\": 1}");
    }

    #[test]
    fn extract_json_by_brace_scan() {
        let raw = "Sure! {\"a\": {\"b\": 2}} hope that helps";
        assert_eq!(extract_json(raw).unwrap(), "{\"a\": {\"b\": 2}}");
    }

    #[test]
    fn extract_json_rejects_proseonly_response() {
        let err = extract_json("I cannot analyze this document.").unwrap_err();
        assert!(matches!(err, ModelError::MalformedResponse(_)));
    }

    #[test]
    fn parse_responsiveness_happy_path() {
        let parsed = parse_responsiveness(VALID_STAGE_ONE, 2).unwrap();
        assert_eq!(parsed.responsive, vec![true, false]);
        assert_eq!(
            parsed.confidence,
            vec![ConfidenceLevel::High, ConfidenceLevel::Medium]
        );
        assert_eq!(parsed.reasoning.len(), 2);
    }

    #[test]
    fn parse_responsiveness_rejects_wrong_array_length() {
        let err = parse_responsiveness(VALID_STAGE_ONE, 3).unwrap_err();
        match err {
            ModelError::SchemaValidation(msg) => assert!(msg.contains("expected 3")),
            other => panic!("expected SchemaValidation, got {other:?}"),
        }
    }

    #[test]
    fn parse_responsiveness_rejects_nonboolean_verdict() {
        let raw = r#"{
            "responsive": ["yes"],
            "confidence": ["high"],
            "reasoning": ["Looks relevant to the request."]
        }"#;
        assert!(matches!(
            parse_responsiveness(raw, 1).unwrap_err(),
            ModelError::SchemaValidation(_)
        ));
    }

    #[test]
    fn parse_responsiveness_rejects_unknown_confidence() {
        let raw = r#"{
            "responsive": [true],
            "confidence": ["certain"],
            "reasoning": ["Looks relevant to the request."]
        }"#;
        assert!(matches!(
            parse_responsiveness(raw, 1).unwrap_err(),
            ModelError::SchemaValidation(_)
        ));
    }

    #[test]
    fn parse_responsiveness_accepts_uppercase_confidence() {
        let raw = r#"{
            "responsive": [true],
            "confidence": ["High"],
            "reasoning": ["Looks relevant to the request."]
        }"#;
        let parsed = parse_responsiveness(raw, 1).unwrap();
        assert_eq!(parsed.confidence, vec![ConfidenceLevel::High]);
    }

    #[test]
    fn parse_responsiveness_rejects_trivial_reasoning() {
        let raw = r#"{
            "responsive": [true],
            "confidence": ["high"],
            "reasoning": ["yes"]
        }"#;
        match parse_responsiveness(raw, 1).unwrap_err() {
            ModelError::SchemaValidation(msg) => assert!(msg.contains("too short")),
            other => panic!("expected SchemaValidation, got {other:?}"),
        }
    }

    #[test]
    fn parse_responsiveness_rejects_invalid_json() {
        let raw = "{\"responsive\": [true,}";
        assert!(matches!(
            parse_responsiveness(raw, 1).unwrap_err(),
            ModelError::MalformedResponse(_)
        ));
    }

    const VALID_STAGE_TWO: &str = r#"{
        "exemptions": {
            "attorney_client": {"applies": true, "confidence": "high", "reasoning": "Legal advice from counsel."},
            "personnel": {"applies": false, "confidence": "high", "reasoning": "No employee records."},
            "deliberative": {"applies": false, "confidence": "medium", "reasoning": "Final version, not a draft."}
        }
    }"#;

    #[test]
    fn parse_exemptions_happy_path() {
        let findings = parse_exemptions(VALID_STAGE_TWO).unwrap();
        assert_eq!(findings.len(), 3);
        assert_eq!(findings[0].category, ExemptionCategory::AttorneyClient);
        assert!(findings[0].applies);
        assert!(!findings[1].applies);
        assert_eq!(findings[2].confidence, ConfidenceLevel::Medium);
    }

    #[test]
    fn parse_exemptions_rejects_missing_category() {
        let raw = r#"{
            "exemptions": {
                "attorney_client": {"applies": false, "confidence": "high", "reasoning": "None."}
            }
        }"#;
        match parse_exemptions(raw).unwrap_err() {
            ModelError::SchemaValidation(msg) => assert!(msg.contains("missing")),
            other => panic!("expected SchemaValidation, got {other:?}"),
        }
    }

    #[test]
    fn parse_exemptions_rejects_unknown_category() {
        let raw = r#"{
            "exemptions": {
                "attorney_client": {"applies": false, "confidence": "high", "reasoning": "None."},
                "personnel": {"applies": false, "confidence": "high", "reasoning": "None."},
                "deliberative": {"applies": false, "confidence": "high", "reasoning": "None."},
                "trade_secrets": {"applies": true, "confidence": "low", "reasoning": "Maybe."}
            }
        }"#;
        match parse_exemptions(raw).unwrap_err() {
            ModelError::SchemaValidation(msg) => assert!(msg.contains("trade_secrets")),
            other => panic!("expected SchemaValidation, got {other:?}"),
        }
    }

    #[test]
    fn parse_exemptions_from_fenced_response() {
        let raw = format!("Analysis complete.\n```json\n{VALID_STAGE_TWO}\n```");
        let findings = parse_exemptions(&raw).unwrap();
        assert_eq!(findings.len(), 3);
    }
}
