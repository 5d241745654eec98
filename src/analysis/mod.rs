// file: src/analysis/mod.rs
// description: ai assessment of parsed alerts
// reference: internal module structure

pub mod client;
pub mod prompt;

pub use client::ChatCompletionAnalyzer;
pub use prompt::build_prompt;

use crate::error::Result;
use crate::models::{ExtractedRecord, PairIntel};
use futures::future::BoxFuture;

/// Turns a parsed record and its intel into free-text assessment. Failures
/// are reported to the caller, which shows them as the assessment text.
pub trait AlertAnalyzer: Send + Sync {
    fn analyze<'a>(
        &'a self,
        record: &'a ExtractedRecord,
        intel: Option<&'a PairIntel>,
    ) -> BoxFuture<'a, Result<String>>;
}
