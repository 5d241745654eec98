// file: src/models/result.rs
// description: aggregate output of one pipeline run
// reference: internal data structures

use crate::models::{ExtractedRecord, IpListAlerts, PairIntel};
use serde::{Deserialize, Serialize};

/// Callers distinguish `success == false` (nothing usable) from
/// `success == true` with an `error` (usable with caveats).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub success: bool,
    pub parsed_data: ExtractedRecord,
    /// `None` when the threat intelligence stage did not run.
    pub ti_result: Option<PairIntel>,
    pub ai_result: String,
    pub ip_list_alerts: IpListAlerts,
    pub formatted_output: String,
    pub table_output: String,
    pub error: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl PipelineResult {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Keeps the first error and files later ones as warnings.
    pub fn record_error(&mut self, error: impl Into<String>) {
        let error = error.into();
        if self.error.is_none() {
            self.error = Some(error);
        } else {
            self.warnings.push(error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_result() {
        let result = PipelineResult::failed("cannot parse log content");
        assert!(!result.success);
        assert!(result.parsed_data.is_empty());
        assert_eq!(result.error.as_deref(), Some("cannot parse log content"));
    }

    #[test]
    fn test_record_error_keeps_first() {
        let mut result = PipelineResult::default();
        result.record_error("threat intel failed");
        result.record_error("second");
        assert_eq!(result.error.as_deref(), Some("threat intel failed"));
        assert_eq!(result.warnings, vec!["second".to_string()]);
    }
}
