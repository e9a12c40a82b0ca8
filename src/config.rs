//! Application configuration.
//!
//! Constants, data directories, and environment-overridable settings for the
//! model client and batch processing. Every setting has a working default so
//! the pipeline runs out of the box against a local Ollama instance.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "Recordflow";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get the application data directory
/// ~/Recordflow/ on all platforms (user-visible, per design requirement)
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join("Recordflow")
}

/// Get the sessions directory (saved `ProcessingSession` files)
pub fn sessions_dir() -> PathBuf {
    app_data_dir().join("sessions")
}

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> String {
    "info,recordflow=debug".to_string()
}

// ═══════════════════════════════════════════════════════════
// ModelConfig
// ═══════════════════════════════════════════════════════════

/// Settings for the local model client.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Ollama base URL.
    pub base_url: String,
    /// Model used for both analysis stages.
    pub model: String,
    /// Starting sampling temperature. Lowered toward zero on retries.
    pub temperature: f32,
    /// Generation cap per call.
    pub max_tokens: u32,
    /// Per-request HTTP timeout.
    pub timeout_secs: u64,
    /// Attempt budget for one logical analysis call (initial + retries).
    pub retry_attempts: u32,
    /// Delay between attempts.
    pub retry_delay: Duration,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "gemma3:latest".to_string(),
            temperature: 0.2,
            max_tokens: 800,
            timeout_secs: 120,
            retry_attempts: 3,
            retry_delay: Duration::from_millis(2000),
        }
    }
}

impl ModelConfig {
    /// Build from environment, falling back to defaults per setting.
    ///
    /// Recognized variables: `RECORDFLOW_OLLAMA_URL`, `RECORDFLOW_MODEL`,
    /// `RECORDFLOW_TEMPERATURE`, `RECORDFLOW_MAX_TOKENS`,
    /// `RECORDFLOW_TIMEOUT_SECONDS`, `RECORDFLOW_RETRY_ATTEMPTS`,
    /// `RECORDFLOW_RETRY_DELAY_MS`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: env_or("RECORDFLOW_OLLAMA_URL", defaults.base_url),
            model: env_or("RECORDFLOW_MODEL", defaults.model),
            temperature: env_parsed("RECORDFLOW_TEMPERATURE", defaults.temperature),
            max_tokens: env_parsed("RECORDFLOW_MAX_TOKENS", defaults.max_tokens),
            timeout_secs: env_parsed("RECORDFLOW_TIMEOUT_SECONDS", defaults.timeout_secs),
            retry_attempts: env_parsed("RECORDFLOW_RETRY_ATTEMPTS", defaults.retry_attempts),
            retry_delay: Duration::from_millis(env_parsed(
                "RECORDFLOW_RETRY_DELAY_MS",
                defaults.retry_delay.as_millis() as u64,
            )),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// ProcessingConfig
// ═══════════════════════════════════════════════════════════

/// Settings for batch processing behavior.
#[derive(Debug, Clone)]
pub struct ProcessingConfig {
    /// Checkpoint the session every N completed documents (None = never).
    pub checkpoint_every: Option<usize>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            checkpoint_every: Some(10),
        }
    }
}

impl ProcessingConfig {
    /// Build from environment. `RECORDFLOW_CHECKPOINT_EVERY=0` disables
    /// checkpointing.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let every: usize = env_parsed(
            "RECORDFLOW_CHECKPOINT_EVERY",
            defaults.checkpoint_every.unwrap_or(0),
        );
        Self {
            checkpoint_every: if every == 0 { None } else { Some(every) },
        }
    }
}

fn env_or(key: &str, default: String) -> String {
    match env::var(key) {
        Ok(v) if !v.trim().is_empty() => v,
        _ => default,
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_data_dir_under_home() {
        let dir = app_data_dir();
        let home = dirs::home_dir().unwrap();
        assert!(dir.starts_with(home));
        assert!(dir.ends_with("Recordflow"));
    }

    #[test]
    fn sessions_dir_under_app_data() {
        let sessions = sessions_dir();
        assert!(sessions.starts_with(app_data_dir()));
        assert!(sessions.ends_with("sessions"));
    }

    #[test]
    fn model_config_defaults() {
        let config = ModelConfig::default();
        assert_eq!(config.base_url, "http://localhost:11434");
        assert_eq!(config.retry_attempts, 3);
        assert!((config.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(config.max_tokens, 800);
    }

    #[test]
    fn processing_config_defaults() {
        let config = ProcessingConfig::default();
        assert_eq!(config.checkpoint_every, Some(10));
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, env!("CARGO_PKG_VERSION"));
    }
}
