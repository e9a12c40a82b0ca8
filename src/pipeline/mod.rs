pub mod orchestrator;

pub use orchestrator::{run_batch, AnalysisPhase, BatchEvent, BatchOptions, BatchResult, CancellationToken};
