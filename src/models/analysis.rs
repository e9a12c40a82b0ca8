//! Analysis records produced by the two-stage pipeline.
//!
//! **Why:** every determination the model makes is stored with its
//! confidence, reasoning, and a `from_fallback` flag. Fallback records are
//! placeholders written when the model could not be reached or kept
//! returning invalid output; review cannot complete until a human has
//! addressed them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ConfidenceLevel, ExemptionCategory};

/// Stage-one verdict: is one document responsive to one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponsivenessAnalysis {
    pub document_id: String,
    /// 1-based index of the request this verdict answers.
    pub request_index: usize,
    pub responsive: bool,
    pub confidence: ConfidenceLevel,
    pub reasoning: String,
    pub analyzed_at: DateTime<Utc>,
    /// True when this record was synthesized after model failure rather
    /// than parsed from a model response.
    #[serde(default)]
    pub from_fallback: bool,
}

impl ResponsivenessAnalysis {
    /// Placeholder written when the model call failed for this document.
    /// Non-responsive at Low confidence; stage two is skipped for it.
    pub fn fallback(document_id: &str, request_index: usize, reason: &str) -> Self {
        Self {
            document_id: document_id.to_string(),
            request_index,
            responsive: false,
            confidence: ConfidenceLevel::Low,
            reasoning: format!("Analysis failed, manual review required: {reason}"),
            analyzed_at: Utc::now(),
            from_fallback: true,
        }
    }
}

/// Stage-two verdict for one exemption category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExemptionFinding {
    pub category: ExemptionCategory,
    pub applies: bool,
    pub confidence: ConfidenceLevel,
    pub reasoning: String,
}

/// Why a document does or does not carry exemption findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExemptionOutcome {
    /// Document was non-responsive to every request; stage two never ran.
    NotApplicable,
    /// No category asserted. Either stage two ran clean, or it failed and
    /// the record is a placeholder; `from_fallback` tells the two apart,
    /// so always check it before treating this as a verdict.
    NoneFound,
    /// Stage two ran and at least one category applied.
    Found,
}

/// Stage-two result for one document, covering the full fixed catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExemptionAnalysis {
    pub document_id: String,
    pub outcome: ExemptionOutcome,
    /// One finding per catalog category when stage two ran; empty for
    /// `NotApplicable`.
    pub findings: Vec<ExemptionFinding>,
    pub analyzed_at: DateTime<Utc>,
    #[serde(default)]
    pub from_fallback: bool,
}

impl ExemptionAnalysis {
    /// Record for a document stage two was gated out of.
    pub fn not_applicable(document_id: &str) -> Self {
        Self {
            document_id: document_id.to_string(),
            outcome: ExemptionOutcome::NotApplicable,
            findings: Vec::new(),
            analyzed_at: Utc::now(),
            from_fallback: false,
        }
    }

    /// Build from a full set of per-category findings.
    pub fn from_findings(document_id: &str, findings: Vec<ExemptionFinding>) -> Self {
        let any = findings.iter().any(|f| f.applies);
        Self {
            document_id: document_id.to_string(),
            outcome: if any {
                ExemptionOutcome::Found
            } else {
                ExemptionOutcome::NoneFound
            },
            findings,
            analyzed_at: Utc::now(),
            from_fallback: false,
        }
    }

    /// Placeholder written when the stage-two call failed. No category is
    /// asserted and `from_fallback` is set; the reviewer must decide. Not a
    /// no-exemptions verdict, despite sharing the `NoneFound` outcome.
    pub fn fallback(document_id: &str, reason: &str) -> Self {
        let findings = ExemptionCategory::ALL
            .iter()
            .map(|&category| ExemptionFinding {
                category,
                applies: false,
                confidence: ConfidenceLevel::Low,
                reasoning: format!("Analysis failed, manual review required: {reason}"),
            })
            .collect();
        Self {
            document_id: document_id.to_string(),
            outcome: ExemptionOutcome::NoneFound,
            findings,
            analyzed_at: Utc::now(),
            from_fallback: true,
        }
    }

    /// Categories the model found applicable, in catalog order.
    pub fn applicable_categories(&self) -> Vec<ExemptionCategory> {
        self.findings
            .iter()
            .filter(|f| f.applies)
            .map(|f| f.category)
            .collect()
    }
}
