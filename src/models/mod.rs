// file: src/models/mod.rs
// description: data models module exports
// reference: internal module structure

pub mod lists;
pub mod record;
pub mod result;
pub mod threat;

pub use lists::{IpListAlerts, ListHit, ListKind};
pub use record::ExtractedRecord;
pub use result::PipelineResult;
pub use threat::{Confidence, IntelSlot, Location, PairIntel, Severity, ThreatRecord};
