// file: src/pipeline/mod.rs
// description: pipeline module exports and public api
// reference: pipeline orchestration

mod batch;
mod orchestrator;
mod progress;

pub use batch::{BatchInput, BatchOutcome, BatchRunner, collect_inputs};
pub use orchestrator::{PipelineOrchestrator, RunOptions, Stage};
pub use progress::{BatchStats, ProgressTracker};
