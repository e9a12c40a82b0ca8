//! The processing session: the single aggregate that owns everything one
//! records-request review touches, from inputs through analyses to review
//! state and batch statistics.
//!
//! **Why:** the session is the unit of persistence and resumption. Its
//! constructor enforces the structural invariants (request count and
//! indexing, unique document ids) once, so downstream code can index by
//! document id and request index without re-checking.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::{Document, DocumentReview, ExemptionAnalysis, InformationRequest, ResponsivenessAnalysis};

/// The largest request count a session accepts.
pub const MAX_REQUESTS: usize = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionValidationError {
    #[error("Session requires between 1 and {MAX_REQUESTS} requests, got {0}")]
    RequestCountOutOfRange(usize),
    #[error("Request indices must be 1-based and contiguous; position {position} has index {index}")]
    NonContiguousRequestIndex { position: usize, index: usize },
    #[error("Session requires at least one document")]
    NoDocuments,
    #[error("Duplicate document id '{0}'")]
    DuplicateDocumentId(String),
    #[error("Analysis references unknown document id '{0}'")]
    UnknownAnalysisDocument(String),
    #[error("Review references unknown document id '{0}'")]
    UnknownReviewDocument(String),
    #[error("Document '{0}' has no review record")]
    MissingReview(String),
    #[error("Analysis for document '{document_id}' has request index {index} outside 1..={count}")]
    AnalysisIndexOutOfRange {
        document_id: String,
        index: usize,
        count: usize,
    },
}

/// Running counters for one batch, persisted with the session so a resumed
/// run reports honestly about the whole history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingStats {
    pub total_documents: usize,
    pub processed_documents: usize,
    pub responsive_documents: usize,
    pub exempt_documents: usize,
    pub parse_error_documents: usize,
    pub analysis_error_documents: usize,
    /// Ids that received fallback analyses, in processing order.
    pub failed_document_ids: Vec<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ProcessingStats {
    /// Wall-clock duration of the batch, when both ends were recorded.
    pub fn elapsed(&self) -> Option<chrono::Duration> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }

    /// Fraction of documents processed, in 0.0..=1.0.
    pub fn progress(&self) -> f64 {
        if self.total_documents == 0 {
            0.0
        } else {
            self.processed_documents as f64 / self.total_documents as f64
        }
    }
}

/// One complete analysis-and-review workspace.
///
/// Maps are keyed by document id. `BTreeMap` keeps serialization order
/// deterministic so saved sessions diff cleanly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingSession {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    /// Model identifier the batch ran (or will run) against.
    pub model: String,
    pub requests: Vec<InformationRequest>,
    pub documents: Vec<Document>,
    /// Stage-one results: one entry per analyzed document, one analysis
    /// per request inside it.
    #[serde(default)]
    pub responsiveness: BTreeMap<String, Vec<ResponsivenessAnalysis>>,
    /// Stage-two results, present for every processed document.
    #[serde(default)]
    pub exemptions: BTreeMap<String, ExemptionAnalysis>,
    pub reviews: BTreeMap<String, DocumentReview>,
    #[serde(default)]
    pub stats: ProcessingStats,
}

impl ProcessingSession {
    /// Create a new session, validating inputs and seeding one `Pending`
    /// review per document.
    pub fn new(
        model: impl Into<String>,
        requests: Vec<InformationRequest>,
        documents: Vec<Document>,
    ) -> Result<Self, SessionValidationError> {
        if requests.is_empty() || requests.len() > MAX_REQUESTS {
            return Err(SessionValidationError::RequestCountOutOfRange(requests.len()));
        }
        for (position, request) in requests.iter().enumerate() {
            if request.index != position + 1 {
                return Err(SessionValidationError::NonContiguousRequestIndex {
                    position,
                    index: request.index,
                });
            }
        }
        if documents.is_empty() {
            return Err(SessionValidationError::NoDocuments);
        }

        let mut reviews = BTreeMap::new();
        for doc in &documents {
            if reviews
                .insert(doc.id.clone(), DocumentReview::new(&doc.id))
                .is_some()
            {
                return Err(SessionValidationError::DuplicateDocumentId(doc.id.clone()));
            }
        }

        let total = documents.len();
        let parse_errors = documents.iter().filter(|d| !d.parsed_successfully).count();

        Ok(Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            model: model.into(),
            requests,
            documents,
            responsiveness: BTreeMap::new(),
            exemptions: BTreeMap::new(),
            reviews,
            stats: ProcessingStats {
                total_documents: total,
                parse_error_documents: parse_errors,
                ..ProcessingStats::default()
            },
        })
    }

    pub fn document(&self, document_id: &str) -> Option<&Document> {
        self.documents.iter().find(|d| d.id == document_id)
    }

    /// True once stage one has results for every document.
    pub fn analysis_complete(&self) -> bool {
        self.documents
            .iter()
            .all(|d| self.responsiveness.contains_key(&d.id))
    }

    /// True when any stage-one verdict for the document is responsive.
    /// Drives the stage-two gate.
    pub fn any_responsive(&self, document_id: &str) -> bool {
        self.responsiveness
            .get(document_id)
            .map(|analyses| analyses.iter().any(|a| a.responsive))
            .unwrap_or(false)
    }

    /// Structural validation applied after deserializing a saved session.
    /// Constructor invariants plus referential integrity of the maps.
    pub fn validate(&self) -> Result<(), SessionValidationError> {
        if self.requests.is_empty() || self.requests.len() > MAX_REQUESTS {
            return Err(SessionValidationError::RequestCountOutOfRange(
                self.requests.len(),
            ));
        }
        for (position, request) in self.requests.iter().enumerate() {
            if request.index != position + 1 {
                return Err(SessionValidationError::NonContiguousRequestIndex {
                    position,
                    index: request.index,
                });
            }
        }
        if self.documents.is_empty() {
            return Err(SessionValidationError::NoDocuments);
        }

        let mut ids = std::collections::BTreeSet::new();
        for doc in &self.documents {
            if !ids.insert(doc.id.as_str()) {
                return Err(SessionValidationError::DuplicateDocumentId(doc.id.clone()));
            }
        }

        for (id, analyses) in &self.responsiveness {
            if !ids.contains(id.as_str()) {
                return Err(SessionValidationError::UnknownAnalysisDocument(id.clone()));
            }
            for analysis in analyses {
                if analysis.request_index == 0 || analysis.request_index > self.requests.len() {
                    return Err(SessionValidationError::AnalysisIndexOutOfRange {
                        document_id: id.clone(),
                        index: analysis.request_index,
                        count: self.requests.len(),
                    });
                }
            }
        }
        for id in self.exemptions.keys() {
            if !ids.contains(id.as_str()) {
                return Err(SessionValidationError::UnknownAnalysisDocument(id.clone()));
            }
        }
        for id in self.reviews.keys() {
            if !ids.contains(id.as_str()) {
                return Err(SessionValidationError::UnknownReviewDocument(id.clone()));
            }
        }
        for doc in &self.documents {
            if !self.reviews.contains_key(&doc.id) {
                return Err(SessionValidationError::MissingReview(doc.id.clone()));
            }
        }
        Ok(())
    }
}
