//! Review-side records: per-document review state, append-only overrides,
//! the audit event log, and the final determination produced for export.
//!
//! **Design:** overrides are never edited or deleted. Each human decision
//! appends an `Override`; the effective value for a field is the one with
//! the latest `applied_at`. The event log records every status change and
//! override application so the review history can be reconstructed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ExemptionCategory, ReviewStatus};

/// Which AI determination an override targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OverrideField {
    /// The responsiveness verdict for one request.
    Responsiveness { request_index: usize },
    /// The applicable-exemptions set for the document.
    Exemptions,
}

/// The human-supplied replacement value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", content = "value")]
pub enum OverrideValue {
    Responsive(bool),
    Exemptions(Vec<ExemptionCategory>),
}

/// One appended human decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Override {
    pub field: OverrideField,
    pub value: OverrideValue,
    /// Free-text justification, required for the audit record.
    pub note: String,
    pub applied_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReviewEventKind {
    StatusChanged {
        from: ReviewStatus,
        to: ReviewStatus,
    },
    OverrideApplied {
        field: OverrideField,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewEvent {
    pub at: DateTime<Utc>,
    pub kind: ReviewEventKind,
}

/// Review state for one document. Created alongside the session, one per
/// document, starting at `Pending`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentReview {
    pub document_id: String,
    pub status: ReviewStatus,
    /// Who is performing the review. Set when review starts.
    #[serde(default)]
    pub reviewer: Option<String>,
    /// Append-only; never reordered or truncated.
    #[serde(default)]
    pub overrides: Vec<Override>,
    #[serde(default)]
    pub events: Vec<ReviewEvent>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Vec<String>,
}

impl DocumentReview {
    pub fn new(document_id: &str) -> Self {
        Self {
            document_id: document_id.to_string(),
            status: ReviewStatus::Pending,
            reviewer: None,
            overrides: Vec::new(),
            events: Vec::new(),
            completed_at: None,
            notes: Vec::new(),
        }
    }

    /// The effective override for a field, if any: last write wins by
    /// `applied_at`, falling back to append order on equal timestamps.
    pub fn latest_override(&self, field: OverrideField) -> Option<&Override> {
        self.overrides
            .iter()
            .enumerate()
            .filter(|(_, o)| o.field == field)
            .max_by_key(|(i, o)| (o.applied_at, *i))
            .map(|(_, o)| o)
    }

    /// True if any override targets the field.
    pub fn has_override(&self, field: OverrideField) -> bool {
        self.overrides.iter().any(|o| o.field == field)
    }
}

/// Merged per-document outcome: AI analysis with human overrides applied.
/// Produced for export; never stored back into the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalDetermination {
    pub document_id: String,
    /// Effective responsiveness per request, indexed by `request_index - 1`.
    pub responsive: Vec<bool>,
    /// Effective applicable exemptions, in catalog order.
    pub exemptions: Vec<ExemptionCategory>,
    /// Fields where a human override displaced the AI value.
    pub overridden_fields: Vec<OverrideField>,
}
