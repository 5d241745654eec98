// file: src/exporter/json.rs
// description: json export of pipeline results and analysis history

use crate::error::Result;
use crate::history::HistoryEntry;
use crate::models::PipelineResult;
use chrono::Utc;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone)]
pub struct JsonExporter {
    output_dir: PathBuf,
    pretty: bool,
}

#[derive(Debug, Serialize)]
pub struct ExportedResult<'a> {
    pub source: &'a str,
    #[serde(flatten)]
    pub result: &'a PipelineResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportManifest {
    pub exported_at: String,
    pub total_results: usize,
    pub failed_results: usize,
    pub files: Vec<String>,
}

impl JsonExporter {
    pub fn new(output_dir: impl Into<PathBuf>, pretty: bool) -> Result<Self> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir)?;
        Ok(Self { output_dir, pretty })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Writes one result as `<stem>.json` and returns the file name.
    pub fn export_result(&self, stem: &str, source: &str, result: &PipelineResult) -> Result<String> {
        let file_name = format!("{}.json", sanitize_stem(stem));
        self.write(&file_name, &ExportedResult { source, result })?;
        Ok(file_name)
    }

    pub fn write_manifest(&self, files: Vec<String>, failed_results: usize) -> Result<ExportManifest> {
        let manifest = ExportManifest {
            exported_at: Utc::now().to_rfc3339(),
            total_results: files.len(),
            failed_results,
            files,
        };
        self.write("manifest.json", &manifest)?;

        info!(
            "Export complete: {} results ({} failed) in {:?}",
            manifest.total_results, manifest.failed_results, self.output_dir
        );
        Ok(manifest)
    }

    pub fn export_history(&self, entries: &[HistoryEntry]) -> Result<PathBuf> {
        let file_name = format!("history_{}.json", Utc::now().format("%Y%m%d_%H%M%S"));
        let path = self.write(&file_name, &entries)?;
        info!("Exported {} history entries to {:?}", entries.len(), path);
        Ok(path)
    }

    fn write<T: Serialize + ?Sized>(&self, file_name: &str, value: &T) -> Result<PathBuf> {
        let contents = if self.pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        let path = self.output_dir.join(file_name);
        fs::write(&path, contents)?;
        Ok(path)
    }
}

fn sanitize_stem(stem: &str) -> String {
    let cleaned: String = stem
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "result".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExtractedRecord;
    use tempfile::tempdir;

    #[test]
    fn test_exporter_creation() {
        let dir = tempdir().unwrap();
        let exporter = JsonExporter::new(dir.path().join("nested"), true);
        assert!(exporter.is_ok());
        assert!(dir.path().join("nested").is_dir());
    }

    #[test]
    fn test_export_result_and_manifest() {
        let dir = tempdir().unwrap();
        let exporter = JsonExporter::new(dir.path(), false).unwrap();

        let mut parsed = ExtractedRecord::new();
        parsed.set("src_ip", "1.2.3.4");
        let result = PipelineResult {
            success: true,
            parsed_data: parsed,
            ..PipelineResult::default()
        };

        let file = exporter
            .export_result("alerts/a 1.log", "alerts/a 1.log", &result)
            .unwrap();
        assert_eq!(file, "alerts_a_1_log.json");

        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join(&file)).unwrap()).unwrap();
        assert_eq!(written["source"], "alerts/a 1.log");
        assert_eq!(written["parsed_data"]["fields"]["src_ip"], "1.2.3.4");

        let manifest = exporter.write_manifest(vec![file], 0).unwrap();
        assert_eq!(manifest.total_results, 1);
        assert!(dir.path().join("manifest.json").exists());
    }

    #[test]
    fn test_sanitize_stem() {
        assert_eq!(sanitize_stem(""), "result");
        assert_eq!(sanitize_stem("告警-01"), "告警-01");
    }
}
