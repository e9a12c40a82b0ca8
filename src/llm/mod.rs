//! Model client subsystem: Ollama transport, prompt construction, response
//! parsing, and bounded retry.
//!
//! Layering mirrors the call path. `ollama` speaks HTTP behind the
//! `LlmClient` trait, `prompt` renders the two analysis prompts, `parser`
//! turns raw model text into validated records, `retry` bounds the attempt
//! loop, and `client` composes them into the two operations the pipeline
//! calls.

pub mod client;
pub mod ollama;
pub mod parser;
pub mod prompt;
pub mod retry;

pub use client::ModelClient;
pub use ollama::{find_best_model, LlmClient, MockLlmClient, OllamaClient};
pub use retry::RetryPolicy;

use thiserror::Error;

/// A single model call (or parse of its output) failing.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Cannot connect to Ollama: {0}")]
    Connection(String),

    #[error("Ollama request timed out after {0}s")]
    Timeout(u64),

    #[error("Ollama API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Model response is not parseable JSON: {0}")]
    MalformedResponse(String),

    #[error("Model response violates the expected schema: {0}")]
    SchemaValidation(String),

    #[error("No suitable model available on the Ollama instance")]
    NoModelAvailable,
}

/// Coarse failure class, used to decide what a fallback record reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Could not reach the model or it answered with an error status.
    Transport,
    /// The model answered, but with output we could not use.
    Schema,
}

impl ModelError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ModelError::Connection(_)
            | ModelError::Timeout(_)
            | ModelError::Api { .. }
            | ModelError::Http(_)
            | ModelError::NoModelAvailable => FailureKind::Transport,
            ModelError::MalformedResponse(_) | ModelError::SchemaValidation(_) => {
                FailureKind::Schema
            }
        }
    }
}

/// Raised when the retry budget for one logical analysis call is exhausted.
/// Carries the last underlying error so callers can report what finally
/// went wrong.
#[derive(Debug, Error)]
#[error("Model call failed after {attempts} attempts: {last_error}")]
pub struct ModelCommunicationFailure {
    pub attempts: u32,
    pub kind: FailureKind,
    #[source]
    pub last_error: ModelError,
}
