use std::collections::VecDeque;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use super::ModelError;

/// Models known to handle the analysis prompts well, in order of preference.
const PREFERRED_MODELS: &[&str] = &["gemma3", "gpt-oss:20b", "phi4-mini-reasoning"];

/// Sampling options forwarded to Ollama per call.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct GenerateOptions {
    pub temperature: f32,
    /// Ollama's name for the generation token cap.
    pub num_predict: u32,
}

/// Abstraction over the model backend so the pipeline can be tested
/// without a running Ollama instance.
pub trait LlmClient {
    fn generate(
        &self,
        model: &str,
        prompt: &str,
        system: &str,
        options: GenerateOptions,
    ) -> Result<String, ModelError>;

    fn is_model_available(&self, model: &str) -> Result<bool, ModelError>;

    fn list_models(&self) -> Result<Vec<String>, ModelError>;
}

/// Ollama HTTP client for local LLM inference.
pub struct OllamaClient {
    base_url: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl OllamaClient {
    /// Create a new OllamaClient pointing at a local Ollama instance.
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs,
        }
    }

    /// Default Ollama instance at localhost:11434 with 2-minute timeout.
    pub fn default_local() -> Self {
        Self::new("http://localhost:11434", 120)
    }
}

/// Find the best available model on a backend, in preference-list order.
pub fn find_best_model(client: &dyn LlmClient) -> Result<String, ModelError> {
    let available = client.list_models()?;
    for preferred in PREFERRED_MODELS {
        if available.iter().any(|m| m.starts_with(preferred)) {
            return Ok(preferred.to_string());
        }
    }
    Err(ModelError::NoModelAvailable)
}

/// Request body for Ollama /api/generate
#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    options: GenerateOptions,
}

/// Response body from Ollama /api/generate
#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

/// Response body from Ollama /api/tags
#[derive(Deserialize)]
struct OllamaTagsResponse {
    models: Vec<OllamaModel>,
}

#[derive(Deserialize)]
struct OllamaModel {
    name: String,
}

impl LlmClient for OllamaClient {
    fn generate(
        &self,
        model: &str,
        prompt: &str,
        system: &str,
        options: GenerateOptions,
    ) -> Result<String, ModelError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = OllamaGenerateRequest {
            model,
            prompt,
            system,
            stream: false,
            options,
        };

        let response = self.client.post(&url).json(&body).send().map_err(|e| {
            if e.is_connect() {
                ModelError::Connection(self.base_url.clone())
            } else if e.is_timeout() {
                ModelError::Timeout(self.timeout_secs)
            } else {
                ModelError::Http(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ModelError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OllamaGenerateResponse = response
            .json()
            .map_err(|e| ModelError::MalformedResponse(e.to_string()))?;

        Ok(parsed.response)
    }

    fn is_model_available(&self, model: &str) -> Result<bool, ModelError> {
        let models = self.list_models()?;
        Ok(models.iter().any(|m| m.starts_with(model)))
    }

    fn list_models(&self) -> Result<Vec<String>, ModelError> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self.client.get(&url).send().map_err(|e| {
            if e.is_connect() {
                ModelError::Connection(self.base_url.clone())
            } else if e.is_timeout() {
                ModelError::Timeout(self.timeout_secs)
            } else {
                ModelError::Http(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ModelError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OllamaTagsResponse = response
            .json()
            .map_err(|e| ModelError::MalformedResponse(e.to_string()))?;

        Ok(parsed.models.into_iter().map(|m| m.name).collect())
    }
}

/// Mock LLM client for testing. Returns queued responses in order, then the
/// default response forever; can be told to fail the first N calls.
pub struct MockLlmClient {
    response: String,
    queued: Mutex<VecDeque<String>>,
    failures_before_success: Mutex<u32>,
    fail_when_exhausted: bool,
    available_models: Vec<String>,
    calls: Mutex<Vec<String>>,
}

impl MockLlmClient {
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
            queued: Mutex::new(VecDeque::new()),
            failures_before_success: Mutex::new(0),
            fail_when_exhausted: false,
            available_models: vec!["gemma3:latest".to_string()],
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_models(mut self, models: Vec<String>) -> Self {
        self.available_models = models;
        self
    }

    /// Queue a response to be returned before the default one.
    pub fn push_response(self, response: &str) -> Self {
        self.queued.lock().unwrap().push_back(response.to_string());
        self
    }

    /// Fail the first `n` generate calls with a connection error.
    pub fn fail_first(self, n: u32) -> Self {
        *self.failures_before_success.lock().unwrap() = n;
        self
    }

    /// Fail every generate call.
    pub fn always_failing() -> Self {
        Self::new("").fail_first(u32::MAX)
    }

    /// Fail every generate call once the queued responses run out.
    pub fn fail_after_queue(mut self) -> Self {
        self.fail_when_exhausted = true;
        self
    }

    /// Prompts seen so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl LlmClient for MockLlmClient {
    fn generate(
        &self,
        _model: &str,
        prompt: &str,
        _system: &str,
        _options: GenerateOptions,
    ) -> Result<String, ModelError> {
        self.calls.lock().unwrap().push(prompt.to_string());

        let mut failures = self.failures_before_success.lock().unwrap();
        if *failures > 0 {
            *failures = failures.saturating_sub(1);
            return Err(ModelError::Connection("mock: connection refused".into()));
        }

        if let Some(next) = self.queued.lock().unwrap().pop_front() {
            return Ok(next);
        }
        if self.fail_when_exhausted {
            return Err(ModelError::Connection("mock: connection refused".into()));
        }
        Ok(self.response.clone())
    }

    fn is_model_available(&self, model: &str) -> Result<bool, ModelError> {
        Ok(self.available_models.iter().any(|m| m.starts_with(model)))
    }

    fn list_models(&self) -> Result<Vec<String>, ModelError> {
        Ok(self.available_models.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPTS: GenerateOptions = GenerateOptions {
        temperature: 0.2,
        num_predict: 800,
    };

    #[test]
    fn mock_client_returns_configured_response() {
        let client = MockLlmClient::new("test response");
        let result = client.generate("model", "prompt", "system", OPTS).unwrap();
        assert_eq!(result, "test response");
        assert_eq!(client.call_count(), 1);
    }

    #[test]
    fn mock_client_drains_queue_before_default() {
        let client = MockLlmClient::new("default")
            .push_response("first")
            .push_response("second");
        assert_eq!(client.generate("m", "p", "s", OPTS).unwrap(), "first");
        assert_eq!(client.generate("m", "p", "s", OPTS).unwrap(), "second");
        assert_eq!(client.generate("m", "p", "s", OPTS).unwrap(), "default");
    }

    #[test]
    fn mock_client_fails_then_recovers() {
        let client = MockLlmClient::new("ok").fail_first(2);
        assert!(client.generate("m", "p", "s", OPTS).is_err());
        assert!(client.generate("m", "p", "s", OPTS).is_err());
        assert_eq!(client.generate("m", "p", "s", OPTS).unwrap(), "ok");
    }

    #[test]
    fn mock_client_fails_after_queue_drains() {
        let client = MockLlmClient::new("").push_response("only").fail_after_queue();
        assert_eq!(client.generate("m", "p", "s", OPTS).unwrap(), "only");
        assert!(client.generate("m", "p", "s", OPTS).is_err());
    }

    #[test]
    fn mock_client_lists_models() {
        let client = MockLlmClient::new("")
            .with_models(vec!["gemma3:latest".into(), "llama3:8b".into()]);
        let models = client.list_models().unwrap();
        assert_eq!(models.len(), 2);
        assert!(client.is_model_available("gemma3").unwrap());
    }

    #[test]
    fn mock_client_model_not_available() {
        let client = MockLlmClient::new("").with_models(vec!["llama3:8b".into()]);
        assert!(!client.is_model_available("gemma3").unwrap());
    }

    #[test]
    fn ollama_client_constructor() {
        let client = OllamaClient::new("http://localhost:11434", 120);
        assert_eq!(client.base_url, "http://localhost:11434");
        assert_eq!(client.timeout_secs, 120);
    }

    #[test]
    fn ollama_client_trims_trailing_slash() {
        let client = OllamaClient::new("http://localhost:11434/", 60);
        assert_eq!(client.base_url, "http://localhost:11434");
    }

    #[test]
    fn default_local_uses_standard_port() {
        let client = OllamaClient::default_local();
        assert_eq!(client.base_url, "http://localhost:11434");
    }

    #[test]
    fn model_preference_order() {
        assert_eq!(PREFERRED_MODELS[0], "gemma3");
        assert!(PREFERRED_MODELS.len() >= 3);
    }

    #[test]
    fn find_best_model_prefers_earlier_entries() {
        let client = MockLlmClient::new("").with_models(vec![
            "phi4-mini-reasoning:latest".into(),
            "gemma3:latest".into(),
        ]);
        assert_eq!(find_best_model(&client).unwrap(), "gemma3");
    }

    #[test]
    fn find_best_model_falls_through_the_list() {
        let client = MockLlmClient::new("")
            .with_models(vec!["llama3:8b".into(), "phi4-mini-reasoning:latest".into()]);
        assert_eq!(find_best_model(&client).unwrap(), "phi4-mini-reasoning");
    }

    #[test]
    fn find_best_model_errors_when_none_match() {
        let client = MockLlmClient::new("").with_models(vec!["llama3:8b".into()]);
        assert!(matches!(
            find_best_model(&client),
            Err(ModelError::NoModelAvailable)
        ));
    }
}
