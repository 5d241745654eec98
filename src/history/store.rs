// file: src/history/store.rs
// description: bounded json history of analysed alerts, newest first
// reference: https://docs.rs/tokio/latest/tokio/fs/index.html

use crate::config::HistoryConfig;
use crate::error::{Result, TriageError};
use crate::models::{ExtractedRecord, PairIntel, PipelineResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub detected_at: DateTime<Utc>,
    pub raw_text: String,
    /// SHA-256 of `raw_text`, hex encoded.
    pub content_hash: String,
    pub parsed_data: ExtractedRecord,
    #[serde(default)]
    pub ti_result: Option<PairIntel>,
    #[serde(default)]
    pub ai_result: String,
}

impl HistoryEntry {
    pub fn from_result(raw_text: &str, result: &PipelineResult) -> Self {
        Self {
            id: Uuid::new_v4(),
            detected_at: Utc::now(),
            raw_text: raw_text.to_string(),
            content_hash: content_hash(raw_text),
            parsed_data: result.parsed_data.clone(),
            ti_result: result.ti_result.clone(),
            ai_result: result.ai_result.clone(),
        }
    }
}

pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub struct HistoryStore {
    path: PathBuf,
    max_entries: usize,
    enabled: bool,
    entries: Vec<HistoryEntry>,
}

impl HistoryStore {
    /// Opens the store, loading any existing file.
    pub async fn open(path: impl Into<PathBuf>, max_entries: usize) -> Result<Self> {
        let mut store = Self {
            path: path.into(),
            max_entries: max_entries.max(1),
            enabled: true,
            entries: Vec::new(),
        };
        store.load().await?;
        Ok(store)
    }

    pub async fn from_config(config: &HistoryConfig) -> Result<Self> {
        let mut store = Self::open(&config.file, config.max_entries).await?;
        store.enabled = config.enabled;
        Ok(store)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub async fn load(&mut self) -> Result<()> {
        if !self.path.exists() {
            debug!("No history file at {:?}", self.path);
            return Ok(());
        }

        let contents = fs::read_to_string(&self.path).await?;
        if contents.trim().is_empty() {
            self.entries.clear();
            return Ok(());
        }

        self.entries = serde_json::from_str(&contents).map_err(|e| {
            TriageError::Serialization(format!(
                "Failed to parse history file {}: {}",
                self.path.display(),
                e
            ))
        })?;
        self.entries.truncate(self.max_entries);

        info!("Loaded {} history entries", self.entries.len());
        Ok(())
    }

    pub async fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await?;
        }

        let contents = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, contents).await?;

        debug!("Saved {} history entries", self.entries.len());
        Ok(())
    }

    /// Prepends an entry for `result`, trims to capacity and persists.
    /// Does nothing when history is disabled.
    pub async fn record(
        &mut self,
        raw_text: &str,
        result: &PipelineResult,
    ) -> Result<Option<&HistoryEntry>> {
        if !self.enabled {
            return Ok(None);
        }
        self.entries
            .insert(0, HistoryEntry::from_result(raw_text, result));
        self.entries.truncate(self.max_entries);
        self.save().await?;
        Ok(self.entries.first())
    }

    pub async fn clear(&mut self) -> Result<usize> {
        let removed = self.entries.len();
        self.entries.clear();
        self.save().await?;
        info!("Cleared {} history entries", removed);
        Ok(removed)
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Entries whose raw text hashes to the same value as `raw_text`.
    pub fn matching(&self, raw_text: &str) -> Vec<&HistoryEntry> {
        let hash = content_hash(raw_text);
        self.entries
            .iter()
            .filter(|entry| entry.content_hash == hash)
            .collect()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
