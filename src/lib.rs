// file: src/lib.rs
// description: library entry point and public api exports
// reference: rust library patterns
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/readme.md"))]

pub mod analysis;
pub mod config;
pub mod error;
pub mod exporter;
pub mod extractor;
pub mod history;
pub mod intel;
pub mod iplist;
pub mod models;
pub mod pipeline;
pub mod utils;

pub use analysis::{AlertAnalyzer, ChatCompletionAnalyzer};
pub use config::{
    AiConfig, Config, ExtractionConfig, HistoryConfig, ListsConfig, OutputConfig, QueryMode,
    RequestMode, ThreatIntelConfig,
};
pub use error::{Result, TriageError};
pub use exporter::{ExportManifest, JsonExporter, render_chat, render_intel, render_table};
pub use extractor::{ExtractionEngine, LogParser};
pub use history::{HistoryEntry, HistoryStore};
pub use intel::{IntelAggregator, ThreatBookProvider, ThreatIntelProvider};
pub use iplist::{FileListStore, IpList, IpListEntry, ListSource};
pub use models::{
    ExtractedRecord, IntelSlot, IpListAlerts, ListHit, ListKind, PairIntel, PipelineResult,
    ThreatRecord,
};
pub use pipeline::{BatchRunner, BatchStats, PipelineOrchestrator, RunOptions};
pub use utils::Validator;
