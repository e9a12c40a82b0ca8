//! Analysis orchestrator — runs the two-stage batch over a session.
//!
//! Runs sequentially (one LLM call at a time) as local Ollama serves a
//! single inference slot. Stage one asks the model whether each document is
//! responsive to any request; stage two evaluates exemptions only for
//! documents with at least one responsive verdict. A model failure never
//! aborts the batch: the document gets fallback-flagged placeholder
//! analyses and processing moves on. Documents that already carry results
//! are skipped, which is what makes a resumed session pick up where it
//! stopped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{info, warn};

use crate::llm::ModelClient;
use crate::models::{ExemptionAnalysis, ExemptionOutcome, ProcessingSession, ResponsivenessAnalysis};

/// Where the current document is in its two-stage pass. `Done` fires once
/// per document, after its exemption record is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisPhase {
    Responsiveness,
    Exemptions,
    Done,
}

impl AnalysisPhase {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Responsiveness => "responsiveness",
            Self::Exemptions => "exemptions",
            Self::Done => "done",
        }
    }
}

/// Progress notifications emitted while a batch runs.
#[derive(Debug, Clone)]
pub enum BatchEvent {
    Started {
        total: usize,
    },
    Progress {
        /// 0-based position in the document list.
        index: usize,
        total: usize,
        document_id: String,
        phase: AnalysisPhase,
        elapsed_ms: u64,
    },
    Completed {
        processed: usize,
        duration_ms: u64,
    },
    Cancelled {
        processed: usize,
        total: usize,
    },
}

/// Cooperative cancellation flag, checked between documents. A cancelled
/// batch keeps every result written so far.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Callbacks and knobs for one batch run.
#[derive(Default)]
pub struct BatchOptions<'a> {
    pub progress: Option<&'a dyn Fn(BatchEvent)>,
    /// Called with the session after every `checkpoint_every` processed
    /// documents, so callers can persist mid-batch.
    pub checkpoint: Option<&'a dyn Fn(&ProcessingSession)>,
    pub checkpoint_every: Option<usize>,
    pub cancel: Option<&'a CancellationToken>,
}

/// Outcome of one batch run.
#[derive(Debug, Default)]
pub struct BatchResult {
    pub documents_processed: usize,
    /// Documents that already had results when the batch started.
    pub documents_skipped: usize,
    pub exemption_calls: usize,
    /// Per-document failure descriptions, in processing order.
    pub errors: Vec<String>,
    pub cancelled: bool,
    pub duration_ms: u64,
}

/// Run both analysis stages over every unprocessed document in the session.
pub fn run_batch(
    session: &mut ProcessingSession,
    client: &ModelClient,
    options: &BatchOptions<'_>,
) -> BatchResult {
    let start = Instant::now();
    let total = session.documents.len();
    let mut result = BatchResult::default();

    if session.stats.started_at.is_none() {
        session.stats.started_at = Some(Utc::now());
    }
    session.stats.finished_at = None;

    if let Some(progress) = options.progress {
        progress(BatchEvent::Started { total });
    }
    info!(session_id = %session.id, total, model = client.model(), "batch started");

    // Borrow rule: the loop mutates session maps, so walk a snapshot of
    // the document list.
    let documents = session.documents.clone();

    for (index, document) in documents.iter().enumerate() {
        if let Some(cancel) = options.cancel {
            if cancel.is_cancelled() {
                result.cancelled = true;
                warn!(session_id = %session.id, processed = result.documents_processed, "batch cancelled");
                if let Some(progress) = options.progress {
                    progress(BatchEvent::Cancelled {
                        processed: result.documents_processed,
                        total,
                    });
                }
                break;
            }
        }

        if session.responsiveness.contains_key(&document.id)
            && session.exemptions.contains_key(&document.id)
        {
            result.documents_skipped += 1;
            continue;
        }

        if let Some(progress) = options.progress {
            progress(BatchEvent::Progress {
                index,
                total,
                document_id: document.id.clone(),
                phase: AnalysisPhase::Responsiveness,
                elapsed_ms: start.elapsed().as_millis() as u64,
            });
        }

        let mut document_failed = false;

        // Stage one: responsiveness against every request in one call.
        match client.analyze_responsiveness(document, &session.requests) {
            Ok(analyses) => {
                if analyses.iter().any(|a| a.responsive) {
                    session.stats.responsive_documents += 1;
                }
                session.responsiveness.insert(document.id.clone(), analyses);
            }
            Err(failure) => {
                warn!(document_id = %document.id, error = %failure, "stage one failed, writing fallback");
                let reason = failure.to_string();
                let fallback = session
                    .requests
                    .iter()
                    .map(|r| ResponsivenessAnalysis::fallback(&document.id, r.index, &reason))
                    .collect();
                session.responsiveness.insert(document.id.clone(), fallback);
                result.errors.push(format!("{}: {reason}", document.id));
                document_failed = true;
            }
        }

        // Stage two gate: only documents with a responsive verdict get an
        // exemption call. Fallback stage-one results are all
        // non-responsive, so a failed document is gated out here and its
        // exemption record says so.
        if session.any_responsive(&document.id) {
            if let Some(progress) = options.progress {
                progress(BatchEvent::Progress {
                    index,
                    total,
                    document_id: document.id.clone(),
                    phase: AnalysisPhase::Exemptions,
                    elapsed_ms: start.elapsed().as_millis() as u64,
                });
            }

            result.exemption_calls += 1;
            match client.analyze_exemptions(document) {
                Ok(analysis) => {
                    if analysis.outcome == ExemptionOutcome::Found {
                        session.stats.exempt_documents += 1;
                    }
                    session.exemptions.insert(document.id.clone(), analysis);
                }
                Err(failure) => {
                    warn!(document_id = %document.id, error = %failure, "stage two failed, writing fallback");
                    let reason = failure.to_string();
                    session
                        .exemptions
                        .insert(document.id.clone(), ExemptionAnalysis::fallback(&document.id, &reason));
                    result
                        .errors
                        .push(format!("{} (exemptions): {reason}", document.id));
                    document_failed = true;
                }
            }
        } else {
            session
                .exemptions
                .insert(document.id.clone(), ExemptionAnalysis::not_applicable(&document.id));
        }

        if document_failed {
            session.stats.analysis_error_documents += 1;
            session.stats.failed_document_ids.push(document.id.clone());
        }

        session.stats.processed_documents += 1;
        result.documents_processed += 1;

        if let Some(progress) = options.progress {
            progress(BatchEvent::Progress {
                index,
                total,
                document_id: document.id.clone(),
                phase: AnalysisPhase::Done,
                elapsed_ms: start.elapsed().as_millis() as u64,
            });
        }

        if let (Some(checkpoint), Some(every)) = (options.checkpoint, options.checkpoint_every) {
            if every > 0 && result.documents_processed % every == 0 {
                checkpoint(session);
            }
        }
    }

    result.duration_ms = start.elapsed().as_millis() as u64;

    if !result.cancelled {
        session.stats.finished_at = Some(Utc::now());
        info!(
            session_id = %session.id,
            processed = result.documents_processed,
            skipped = result.documents_skipped,
            errors = result.errors.len(),
            duration_ms = result.duration_ms,
            "batch completed"
        );
        if let Some(progress) = options.progress {
            progress(BatchEvent::Completed {
                processed: result.documents_processed,
                duration_ms: result.duration_ms,
            });
        }
    }

    result
}
