pub mod config;
pub mod models;
pub mod llm; // Model client: prompts, parsing, retry, Ollama transport
pub mod pipeline; // Two-stage analysis orchestrator
pub mod review; // Human review state machine + audit trail
pub mod session_store; // Durable session persistence (pause/resume)

use tracing_subscriber::EnvFilter;

/// Initialize tracing for binaries and integration harnesses embedding this
/// crate. Respects `RUST_LOG`; falls back to the crate default filter.
///
/// Call at most once per process.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);
}
