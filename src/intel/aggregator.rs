// file: src/intel/aggregator.rs
// description: fan-out of ip queries across providers and verdict merging
// reference: https://docs.rs/futures

use crate::config::{ProviderKind, QueryMode, ThreatIntelConfig};
use crate::error::{Result, TriageError};
use crate::extractor::patterns::first_ipv4;
use crate::intel::provider::ThreatIntelProvider;
use crate::intel::threatbook::ThreatBookProvider;
use crate::models::{IntelSlot, PairIntel, ThreatRecord};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Pair verdicts plus the per-ip failures that left a slot empty.
#[derive(Debug, Default)]
pub struct PairReport {
    pub intel: PairIntel,
    pub errors: Vec<TriageError>,
}

#[derive(Clone)]
pub struct IntelAggregator {
    providers: Vec<Arc<dyn ThreatIntelProvider>>,
    query_mode: QueryMode,
}

impl IntelAggregator {
    pub fn new(providers: Vec<Arc<dyn ThreatIntelProvider>>, query_mode: QueryMode) -> Self {
        Self {
            providers,
            query_mode,
        }
    }

    /// Builds every enabled provider in declaration order. Providers that
    /// are off or missing credentials are left out; if none remain the
    /// whole stage is unavailable.
    pub fn from_config(config: &ThreatIntelConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let mut providers: Vec<Arc<dyn ThreatIntelProvider>> = Vec::new();
        let mut skipped = Vec::new();

        for provider in config.providers.iter().filter(|p| p.enabled) {
            let built = match provider.kind {
                ProviderKind::ThreatBook => ThreatBookProvider::from_config(provider, timeout),
            };
            match built {
                Ok(built) => providers.push(Arc::new(built)),
                Err(e) => {
                    warn!("Threat intelligence provider unavailable: {}", e);
                    skipped.push(e.to_string());
                }
            }
        }

        if providers.is_empty() {
            let reason = if skipped.is_empty() {
                "no threat intelligence provider is enabled".to_string()
            } else {
                skipped.join("; ")
            };
            return Err(TriageError::ConfigMissing(reason));
        }

        info!("Threat intelligence ready with {} provider(s)", providers.len());
        Ok(Self::new(providers, config.query_mode))
    }

    pub fn query_mode(&self) -> QueryMode {
        self.query_mode
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Queries whichever sides the query mode includes. Excluded or missing
    /// sides stay `NotQueried`; sides where every provider failed are `NoResult`.
    pub async fn query_pair(&self, src_ip: Option<&str>, dst_ip: Option<&str>) -> PairReport {
        let src = src_ip.filter(|_| self.query_mode.includes_src());
        let dst = dst_ip.filter(|_| self.query_mode.includes_dst());

        let (src_slot, dst_slot) = futures::join!(self.query_slot(src), self.query_slot(dst));

        let mut report = PairReport::default();
        for (slot, target) in [
            (src_slot, &mut report.intel.src_ip_ti),
            (dst_slot, &mut report.intel.dst_ip_ti),
        ] {
            *target = match slot {
                None => IntelSlot::NotQueried,
                Some(Ok(record)) => {
                    report.intel.sources.extend(record.sources.iter().cloned());
                    IntelSlot::Found(record)
                }
                Some(Err(e)) => {
                    report.errors.push(e);
                    IntelSlot::NoResult
                }
            };
        }

        report
    }

    async fn query_slot(&self, ip: Option<&str>) -> Option<Result<ThreatRecord>> {
        let ip = ip.map(str::trim).filter(|ip| !ip.is_empty())?;
        Some(self.query_ip(ip).await)
    }

    /// Aggregated verdict for one candidate. A candidate without an IPv4
    /// address gets a neutral record and no network call.
    pub async fn query_ip(&self, candidate: &str) -> Result<ThreatRecord> {
        let Some(ip) = first_ipv4(candidate) else {
            debug!("No IPv4 address in '{}', skipping providers", candidate);
            return Ok(ThreatRecord::neutral(candidate.trim()));
        };

        let outcomes = join_all(self.providers.iter().map(|provider| async move {
            (provider.name().to_string(), provider.query(ip).await)
        }))
        .await;

        let mut results = Vec::new();
        let mut failures = Vec::new();
        for (name, outcome) in outcomes {
            match outcome {
                Ok(record) => results.push((name, record)),
                Err(e) => {
                    warn!("{}", e);
                    failures.push(e.to_string());
                }
            }
        }

        merge(ip, results).ok_or_else(|| {
            TriageError::AllProvidersFailed(format!("{} ({})", ip, failures.join("; ")))
        })
    }
}

/// Folds provider results, in declaration order, into one record: any
/// malicious verdict wins, labels and sources are unioned, and the other
/// fields keep the first known value.
pub fn merge(ip: &str, results: Vec<(String, ThreatRecord)>) -> Option<ThreatRecord> {
    if results.is_empty() {
        return None;
    }

    let mut merged = ThreatRecord::neutral(ip);
    for (source, record) in results {
        merged.is_malicious |= record.is_malicious;
        merged.labels.extend(record.labels);
        merged.sources.insert(source);

        if !merged.severity.is_known() {
            merged.severity = record.severity;
        }
        if !merged.confidence.is_known() {
            merged.confidence = record.confidence;
        }
        if merged.location.is_none() {
            merged.location = record.location.filter(|l| !l.is_empty());
        }
        if merged.raw.is_none() {
            merged.raw = record.raw.filter(|r| !r.is_null());
        }
    }

    Some(merged)
}
