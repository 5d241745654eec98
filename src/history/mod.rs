// file: src/history/mod.rs
// description: persisted analysis history
// reference: internal module structure

pub mod store;

pub use store::{HistoryEntry, HistoryStore, content_hash};
