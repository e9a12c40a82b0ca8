//! The Model Client: the two analysis operations the pipeline calls.
//!
//! Stateless between calls. Each operation renders a prompt, runs it under
//! the retry policy (parse failures count against the same budget as
//! transport failures), and converts the validated payload into analysis
//! records stamped with the current time.

use chrono::Utc;
use tracing::debug;

use super::ollama::{GenerateOptions, LlmClient};
use super::{parser, prompt, ModelCommunicationFailure, RetryPolicy};
use crate::config::ModelConfig;
use crate::models::{Document, ExemptionAnalysis, InformationRequest, ResponsivenessAnalysis};

pub struct ModelClient {
    backend: Box<dyn LlmClient>,
    config: ModelConfig,
    policy: RetryPolicy,
}

impl ModelClient {
    pub fn new(backend: Box<dyn LlmClient>, config: ModelConfig) -> Self {
        let policy = RetryPolicy::from_config(&config);
        Self {
            backend,
            config,
            policy,
        }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// True when the configured model is present on the backend.
    pub fn check_model(&self) -> bool {
        self.backend
            .is_model_available(&self.config.model)
            .unwrap_or(false)
    }

    /// Stage one: one call covering every request, returning one analysis
    /// per request in request order.
    pub fn analyze_responsiveness(
        &self,
        document: &Document,
        requests: &[InformationRequest],
    ) -> Result<Vec<ResponsivenessAnalysis>, ModelCommunicationFailure> {
        let user_prompt = prompt::responsiveness_prompt(document, requests);
        debug!(document_id = %document.id, requests = requests.len(), "stage one analysis");

        let parsed = self.policy.run(|attempt| {
            let raw = self.backend.generate(
                &self.config.model,
                &user_prompt,
                prompt::RESPONSIVENESS_SYSTEM_PROMPT,
                GenerateOptions {
                    temperature: attempt.temperature,
                    num_predict: self.config.max_tokens,
                },
            )?;
            parser::parse_responsiveness(&raw, requests.len())
        })?;

        let analyzed_at = Utc::now();
        Ok(requests
            .iter()
            .enumerate()
            .map(|(i, request)| ResponsivenessAnalysis {
                document_id: document.id.clone(),
                request_index: request.index,
                responsive: parsed.responsive[i],
                confidence: parsed.confidence[i],
                reasoning: parsed.reasoning[i].clone(),
                analyzed_at,
                from_fallback: false,
            })
            .collect())
    }

    /// Stage two: evaluate the full exemption catalog for one responsive
    /// document.
    pub fn analyze_exemptions(
        &self,
        document: &Document,
    ) -> Result<ExemptionAnalysis, ModelCommunicationFailure> {
        let user_prompt = prompt::exemption_prompt(document);
        debug!(document_id = %document.id, "stage two analysis");

        let findings = self.policy.run(|attempt| {
            let raw = self.backend.generate(
                &self.config.model,
                &user_prompt,
                prompt::EXEMPTION_SYSTEM_PROMPT,
                GenerateOptions {
                    temperature: attempt.temperature,
                    num_predict: self.config.max_tokens,
                },
            )?;
            parser::parse_exemptions(&raw)
        })?;

        Ok(ExemptionAnalysis::from_findings(&document.id, findings))
    }
}
