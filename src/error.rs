// file: src/error.rs
// description: error taxonomy for the triage pipeline and result type alias
// reference: https://docs.rs/thiserror

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TriageError>;

#[derive(Error, Debug)]
pub enum TriageError {
    #[error("cannot parse log content")]
    ExtractionEmpty,

    #[error("Pattern for field {field} failed to compile ({pattern}): {message}")]
    RuleCompile {
        field: String,
        pattern: String,
        message: String,
    },

    #[error("Failed to read list file {path}: {source}")]
    ListRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Provider {provider} failed: {message}")]
    Provider { provider: String, message: String },

    #[error("No threat intelligence provider returned a result for {0}")]
    AllProvidersFailed(String),

    #[error("AI analysis failed: {0}")]
    AiCall(String),

    #[error("Missing configuration: {0}")]
    ConfigMissing(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl TriageError {
    pub fn provider(provider: &str, message: impl Into<String>) -> Self {
        TriageError::Provider {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    /// Whether this error ends a pipeline run. Everything else is recorded and skipped.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TriageError::ExtractionEmpty)
    }
}

impl From<serde_json::Error> for TriageError {
    fn from(e: serde_json::Error) -> Self {
        TriageError::Serialization(e.to_string())
    }
}
