// file: src/intel/mod.rs
// description: threat intelligence providers and aggregation
// reference: internal module structure

pub mod aggregator;
pub mod provider;
pub mod threatbook;

pub use aggregator::{IntelAggregator, PairReport, merge};
pub use provider::ThreatIntelProvider;
pub use threatbook::ThreatBookProvider;
