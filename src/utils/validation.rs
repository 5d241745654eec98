// file: src/utils/validation.rs
// description: input validation helpers shared by configuration and pipeline
// reference: input validation patterns

use crate::error::{Result, TriageError};

pub struct Validator;

impl Validator {
    pub fn validate_content_not_empty(content: &str) -> Result<()> {
        if content.trim().is_empty() {
            return Err(TriageError::Validation("Content is empty".to_string()));
        }
        Ok(())
    }

    pub fn validate_url(url: &str) -> Result<()> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(TriageError::Validation(format!(
                "Invalid URL format: {}",
                url
            )));
        }
        Ok(())
    }

    /// Truncates on a character boundary, so multi-byte text never splits.
    pub fn truncate_text(text: &str, max_chars: usize) -> String {
        match text.char_indices().nth(max_chars) {
            Some((idx, _)) => format!("{}...", &text[..idx]),
            None => text.to_string(),
        }
    }

    /// Collapses embedded line breaks into single spaces.
    pub fn flatten_lines(text: &str) -> String {
        text.replace("\r\n", " ").replace(['\n', '\r'], " ")
    }
}
