//! Review State Manager — the human pass over AI analysis results.
//!
//! Operations are free functions over a `&mut ProcessingSession`, so review
//! state lives inside the same aggregate that gets persisted. The state
//! machine is Pending → InProgress → Completed with an explicit reopen back
//! to InProgress. Completion is gated: every fallback-flagged analysis must
//! carry a human override before a review can close, so a document the
//! model never actually analyzed cannot slip through as reviewed.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::models::{
    ExemptionCategory, FinalDetermination, Override, OverrideField, OverrideValue,
    ProcessingSession, ReviewEvent, ReviewEventKind, ReviewStatus,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReviewError {
    #[error("Unknown document id '{0}'")]
    UnknownDocument(String),

    #[error("Request index {index} is outside 1..={count}")]
    InvalidRequestIndex { index: usize, count: usize },

    #[error("Override value type does not match the targeted field")]
    ValueTypeMismatch,

    #[error("Review for '{0}' is already completed; reopen it first")]
    AlreadyCompleted(String),

    #[error("Review for '{0}' is not completed")]
    NotCompleted(String),

    #[error("Document '{0}' has no analysis results yet")]
    AnalysisMissing(String),

    #[error(
        "Review for '{document_id}' cannot complete: {} fallback field(s) lack an override",
        .unaddressed.len()
    )]
    IncompleteReview {
        document_id: String,
        /// Fallback-flagged fields still awaiting a human decision.
        unaddressed: Vec<OverrideField>,
    },
}

impl std::fmt::Display for OverrideField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OverrideField::Responsiveness { request_index } => {
                write!(f, "responsiveness[{request_index}]")
            }
            OverrideField::Exemptions => write!(f, "exemptions"),
        }
    }
}

fn push_status_event(session: &mut ProcessingSession, document_id: &str, to: ReviewStatus) {
    // Callers check existence before calling
    if let Some(review) = session.reviews.get_mut(document_id) {
        let from = review.status;
        review.status = to;
        review.events.push(ReviewEvent {
            at: Utc::now(),
            kind: ReviewEventKind::StatusChanged { from, to },
        });
    }
}

/// Begin (or take over) review of a document. Pending reviews move to
/// InProgress; an InProgress review just records the new reviewer.
pub fn start_review(
    session: &mut ProcessingSession,
    document_id: &str,
    reviewer: &str,
) -> Result<(), ReviewError> {
    let review = session
        .reviews
        .get_mut(document_id)
        .ok_or_else(|| ReviewError::UnknownDocument(document_id.to_string()))?;

    if review.status == ReviewStatus::Completed {
        return Err(ReviewError::AlreadyCompleted(document_id.to_string()));
    }

    review.reviewer = Some(reviewer.to_string());
    if review.status == ReviewStatus::Pending {
        push_status_event(session, document_id, ReviewStatus::InProgress);
        info!(document_id, reviewer, "review started");
    }
    Ok(())
}

/// Append a human override. The override never edits the AI record; it is
/// layered over it at determination time, latest write winning.
///
/// A Pending review implicitly moves to InProgress. A Completed review
/// must be reopened first.
pub fn apply_override(
    session: &mut ProcessingSession,
    document_id: &str,
    field: OverrideField,
    value: OverrideValue,
    note: &str,
) -> Result<(), ReviewError> {
    if !session.reviews.contains_key(document_id) {
        return Err(ReviewError::UnknownDocument(document_id.to_string()));
    }

    match (&field, &value) {
        (OverrideField::Responsiveness { request_index }, OverrideValue::Responsive(_)) => {
            if *request_index == 0 || *request_index > session.requests.len() {
                return Err(ReviewError::InvalidRequestIndex {
                    index: *request_index,
                    count: session.requests.len(),
                });
            }
        }
        (OverrideField::Exemptions, OverrideValue::Exemptions(_)) => {}
        _ => return Err(ReviewError::ValueTypeMismatch),
    }

    let status = session.reviews[document_id].status;
    if status == ReviewStatus::Completed {
        return Err(ReviewError::AlreadyCompleted(document_id.to_string()));
    }
    if status == ReviewStatus::Pending {
        push_status_event(session, document_id, ReviewStatus::InProgress);
    }

    let review = session
        .reviews
        .get_mut(document_id)
        .ok_or_else(|| ReviewError::UnknownDocument(document_id.to_string()))?;
    review.overrides.push(Override {
        field,
        value,
        note: note.to_string(),
        applied_at: Utc::now(),
    });
    review.events.push(ReviewEvent {
        at: Utc::now(),
        kind: ReviewEventKind::OverrideApplied { field },
    });
    info!(document_id, %field, "override applied");
    Ok(())
}

/// Fallback-flagged fields that still lack an override.
fn unaddressed_fallback_fields(
    session: &ProcessingSession,
    document_id: &str,
) -> Result<Vec<OverrideField>, ReviewError> {
    let analyses = session
        .responsiveness
        .get(document_id)
        .ok_or_else(|| ReviewError::AnalysisMissing(document_id.to_string()))?;
    let review = &session.reviews[document_id];

    let mut unaddressed = Vec::new();
    for analysis in analyses {
        let field = OverrideField::Responsiveness {
            request_index: analysis.request_index,
        };
        if analysis.from_fallback && !review.has_override(field) {
            unaddressed.push(field);
        }
    }
    if let Some(exemption) = session.exemptions.get(document_id) {
        if exemption.from_fallback && !review.has_override(OverrideField::Exemptions) {
            unaddressed.push(OverrideField::Exemptions);
        }
    }
    Ok(unaddressed)
}

/// Close out a review. Errors if any fallback-flagged field has no
/// override. Completing an already-Completed review is a no-op.
pub fn mark_reviewed(
    session: &mut ProcessingSession,
    document_id: &str,
) -> Result<(), ReviewError> {
    let review = session
        .reviews
        .get(document_id)
        .ok_or_else(|| ReviewError::UnknownDocument(document_id.to_string()))?;
    if review.status == ReviewStatus::Completed {
        return Ok(());
    }

    let unaddressed = unaddressed_fallback_fields(session, document_id)?;
    if !unaddressed.is_empty() {
        return Err(ReviewError::IncompleteReview {
            document_id: document_id.to_string(),
            unaddressed,
        });
    }

    push_status_event(session, document_id, ReviewStatus::Completed);
    if let Some(review) = session.reviews.get_mut(document_id) {
        review.completed_at = Some(Utc::now());
    }
    info!(document_id, "review completed");
    Ok(())
}

/// Reopen a completed review for further changes.
pub fn reopen_review(
    session: &mut ProcessingSession,
    document_id: &str,
) -> Result<(), ReviewError> {
    let review = session
        .reviews
        .get(document_id)
        .ok_or_else(|| ReviewError::UnknownDocument(document_id.to_string()))?;
    if review.status != ReviewStatus::Completed {
        return Err(ReviewError::NotCompleted(document_id.to_string()));
    }

    push_status_event(session, document_id, ReviewStatus::InProgress);
    if let Some(review) = session.reviews.get_mut(document_id) {
        review.completed_at = None;
    }
    info!(document_id, "review reopened");
    Ok(())
}

/// Per-document outcome of a batch approval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchApproveOutcome {
    Approved,
    /// Left untouched; approving twice is not an error.
    AlreadyCompleted,
    Rejected { reason: String },
}

/// Complete many reviews at once, accepting each AI determination as-is.
/// Each id is handled independently: one rejection never blocks the rest.
pub fn batch_approve(
    session: &mut ProcessingSession,
    document_ids: &[String],
) -> Vec<(String, BatchApproveOutcome)> {
    document_ids
        .iter()
        .map(|id| {
            let status = session.reviews.get(id).map(|r| r.status);
            let outcome = match status {
                None => BatchApproveOutcome::Rejected {
                    reason: ReviewError::UnknownDocument(id.clone()).to_string(),
                },
                Some(ReviewStatus::Completed) => BatchApproveOutcome::AlreadyCompleted,
                Some(_) => match mark_reviewed(session, id) {
                    Ok(()) => BatchApproveOutcome::Approved,
                    Err(e) => BatchApproveOutcome::Rejected {
                        reason: e.to_string(),
                    },
                },
            };
            (id.clone(), outcome)
        })
        .collect()
}

/// Merge AI analysis with human overrides into the exportable outcome.
/// Pure read: calling it never changes review state, and it works at any
/// review status.
pub fn final_determination(
    session: &ProcessingSession,
    document_id: &str,
) -> Result<FinalDetermination, ReviewError> {
    let review = session
        .reviews
        .get(document_id)
        .ok_or_else(|| ReviewError::UnknownDocument(document_id.to_string()))?;
    let analyses = session
        .responsiveness
        .get(document_id)
        .ok_or_else(|| ReviewError::AnalysisMissing(document_id.to_string()))?;

    let mut overridden_fields = Vec::new();

    let mut responsive = vec![false; session.requests.len()];
    for analysis in analyses {
        responsive[analysis.request_index - 1] = analysis.responsive;
    }
    for request in &session.requests {
        let field = OverrideField::Responsiveness {
            request_index: request.index,
        };
        if let Some(o) = review.latest_override(field) {
            if let OverrideValue::Responsive(value) = o.value {
                responsive[request.index - 1] = value;
                overridden_fields.push(field);
            }
        }
    }

    let mut exemptions: Vec<ExemptionCategory> = session
        .exemptions
        .get(document_id)
        .map(|e| e.applicable_categories())
        .unwrap_or_default();
    if let Some(o) = review.latest_override(OverrideField::Exemptions) {
        if let OverrideValue::Exemptions(ref value) = o.value {
            exemptions = value.clone();
            overridden_fields.push(OverrideField::Exemptions);
        }
    }

    Ok(FinalDetermination {
        document_id: document_id.to_string(),
        responsive,
        exemptions,
        overridden_fields,
    })
}

/// The full event history for one document's review.
pub fn audit_trail<'a>(
    session: &'a ProcessingSession,
    document_id: &str,
) -> Result<&'a [ReviewEvent], ReviewError> {
    session
        .reviews
        .get(document_id)
        .map(|r| r.events.as_slice())
        .ok_or_else(|| ReviewError::UnknownDocument(document_id.to_string()))
}

/// Aggregate review progress across the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewSummary {
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    /// Documents where at least one override displaced an AI value.
    pub overridden: usize,
}

impl ReviewSummary {
    /// Fraction of reviews completed, in 0.0..=1.0.
    pub fn completion(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

pub fn review_summary(session: &ProcessingSession) -> ReviewSummary {
    let mut summary = ReviewSummary {
        total: session.reviews.len(),
        pending: 0,
        in_progress: 0,
        completed: 0,
        overridden: 0,
    };
    for review in session.reviews.values() {
        match review.status {
            ReviewStatus::Pending => summary.pending += 1,
            ReviewStatus::InProgress => summary.in_progress += 1,
            ReviewStatus::Completed => summary.completed += 1,
        }
        if !review.overrides.is_empty() {
            summary.overridden += 1;
        }
    }
    summary
}
