// file: src/models/threat.rs
// description: threat intelligence verdicts per ip and per source/destination pair
// reference: threat intelligence reputation models

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
    #[default]
    Unknown,
}

impl Severity {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "critical" => Severity::Critical,
            "high" => Severity::High,
            "medium" => Severity::Medium,
            "low" => Severity::Low,
            "info" => Severity::Info,
            _ => Severity::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Info => "info",
            Severity::Unknown => "unknown",
        }
    }

    pub fn is_known(&self) -> bool {
        *self != Severity::Unknown
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
    #[default]
    Unknown,
}

impl Confidence {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "high" => Confidence::High,
            "medium" => Confidence::Medium,
            "low" => Confidence::Low,
            _ => Confidence::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
            Confidence::Unknown => "unknown",
        }
    }

    pub fn is_known(&self) -> bool {
        *self != Confidence::Unknown
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub country: Option<String>,
    pub province: Option<String>,
    pub city: Option<String>,
    pub carrier: Option<String>,
}

impl Location {
    pub fn is_empty(&self) -> bool {
        self.country.is_none()
            && self.province.is_none()
            && self.city.is_none()
            && self.carrier.is_none()
    }

    /// `country / province / city`, without the carrier.
    pub fn region(&self) -> String {
        [&self.country, &self.province, &self.city]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" / ")
    }

    pub fn describe(&self) -> String {
        let region = self.region();
        match self.carrier.as_deref().filter(|c| !c.is_empty()) {
            Some(carrier) if region.is_empty() => carrier.to_string(),
            Some(carrier) => format!("{} ({})", region, carrier),
            None => region,
        }
    }
}

/// Normalised verdict for one IP, from one provider or aggregated across several.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreatRecord {
    pub ip: String,
    pub is_malicious: bool,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub confidence: Confidence,
    #[serde(default)]
    pub labels: BTreeSet<String>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub raw: Option<Value>,
    /// Providers that contributed, filled in by aggregation.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub sources: BTreeSet<String>,
}

impl ThreatRecord {
    /// "Not malicious, nothing known" verdict.
    pub fn neutral(ip: &str) -> Self {
        Self {
            ip: ip.to_string(),
            is_malicious: false,
            severity: Severity::Unknown,
            confidence: Confidence::Unknown,
            labels: BTreeSet::new(),
            location: None,
            raw: None,
            sources: BTreeSet::new(),
        }
    }
}

/// Outcome of threat intelligence for one side of the pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "record", rename_all = "snake_case")]
pub enum IntelSlot {
    /// Excluded by query mode or no IP to query.
    #[default]
    NotQueried,
    /// Queried, but no provider produced a result.
    NoResult,
    Found(ThreatRecord),
}

impl IntelSlot {
    pub fn is_attempted(&self) -> bool {
        !matches!(self, IntelSlot::NotQueried)
    }

    pub fn record(&self) -> Option<&ThreatRecord> {
        match self {
            IntelSlot::Found(record) => Some(record),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PairIntel {
    pub src_ip_ti: IntelSlot,
    pub dst_ip_ti: IntelSlot,
    pub sources: BTreeSet<String>,
}

impl PairIntel {
    pub fn has_any_record(&self) -> bool {
        self.src_ip_ti.record().is_some() || self.dst_ip_ti.record().is_some()
    }
}
