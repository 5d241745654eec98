// file: src/extractor/mod.rs
// description: field extraction module exports and parse composition
// reference: internal module structure

pub mod engine;
pub mod kv;
pub mod patterns;
pub mod rules;

pub use engine::{CustomPatternLayer, ExtractionEngine};
pub use kv::parse_key_values;
pub use rules::{CompiledRule, PatternRule};

use crate::config::ExtractionConfig;
use crate::models::ExtractedRecord;
use tracing::debug;

/// Fields the key/value splitter may fill when nothing else found them.
pub const FALLBACK_FIELDS: [&str; 5] = ["src_ip", "dst_ip", "src_port", "dst_port", "protocol"];

/// Engine, custom-pattern layer and key/value fallback, applied in that order.
/// Each later layer only fills fields the earlier ones left empty.
#[derive(Debug, Clone)]
pub struct LogParser {
    engine: ExtractionEngine,
    custom: CustomPatternLayer,
}

impl LogParser {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            engine: ExtractionEngine::compile(config),
            custom: CustomPatternLayer::compile(config),
        }
    }

    pub fn engine(&self) -> &ExtractionEngine {
        &self.engine
    }

    pub fn parse(&self, text: &str) -> ExtractedRecord {
        let mut record = self.engine.extract(text);
        for warning in self.custom.warnings() {
            record.push_warning(warning.clone());
        }
        if text.is_empty() {
            return record;
        }

        if !self.custom.is_empty() {
            self.custom.fill(&mut record, text);
        }

        let kvs = parse_key_values(text);
        for field in FALLBACK_FIELDS {
            if let Some(value) = kvs.get(field)
                && record.fill_missing(field, value)
            {
                debug!("Filled '{}' from key/value fallback", field);
            }
        }

        record
    }

    /// Whether the text yields any field, through composition or the bare splitter.
    pub fn validate_log_format(&self, text: &str) -> bool {
        !self.parse(text).is_empty() || !parse_key_values(text).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuleConfig;
    use std::collections::BTreeMap;

    fn parser(core: &[(&str, &[&str])]) -> LogParser {
        let config = ExtractionConfig {
            core: core
                .iter()
                .map(|(field, patterns)| (field.to_string(), RuleConfig::regex(patterns)))
                .collect(),
            extra_fields: BTreeMap::new(),
            log_patterns: BTreeMap::new(),
            custom_patterns: BTreeMap::new(),
        };
        LogParser::new(&config)
    }

    #[test]
    fn test_fallback_fills_missing_fields_only() {
        let parser = parser(&[("src_ip", &[r"attacker=(\S+)"])]);
        let record = parser.parse("attacker=6.6.6.6\nsrc_ip:1.1.1.1; dst_ip:2.2.2.2; dst_port:22");

        assert_eq!(record.get("src_ip"), Some("6.6.6.6"));
        assert_eq!(record.get("dst_ip"), Some("2.2.2.2"));
        assert_eq!(record.get("dst_port"), Some("22"));
    }

    #[test]
    fn test_fallback_ignores_non_core_keys() {
        let parser = parser(&[]);
        let record = parser.parse("event:scan\nseverity=high");
        assert!(record.is_empty());
        assert!(parser.validate_log_format("event:scan"));
        assert!(!parser.validate_log_format("just prose"));
    }

    #[test]
    fn test_custom_layer_runs_before_fallback() {
        let mut config = ExtractionConfig::default();
        config.core.clear();
        config
            .custom_patterns
            .insert("protocol".to_string(), vec![r"over (\w+)".to_string()]);
        let parser = LogParser::new(&config);

        let record = parser.parse("traffic over QUIC\nprotocol:UDP");
        assert_eq!(record.get("protocol"), Some("QUIC"));
    }

    #[test]
    fn test_empty_text() {
        let parser = LogParser::new(&ExtractionConfig::default());
        assert!(parser.parse("").is_empty());
    }

    #[test]
    fn test_empty_text_keeps_compile_warnings() {
        let mut config = ExtractionConfig::default();
        config
            .core
            .insert("src_ip".to_string(), RuleConfig::regex(&["(["]));
        config
            .custom_patterns
            .insert("protocol".to_string(), vec!["(?P<".to_string()]);
        let parser = LogParser::new(&config);

        let record = parser.parse("");
        assert!(record.is_empty());
        assert_eq!(record.warnings.len(), 2);
    }
}
