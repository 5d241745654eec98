// file: src/extractor/engine.rs
// description: rule-driven field extraction over free-form alert text
// reference: https://docs.rs/regex

use crate::config::ExtractionConfig;
use crate::extractor::rules::{CompiledRule, PatternRule, first_match};
use crate::models::ExtractedRecord;
use regex::Regex;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Compiled core and extra-field rule groups. Immutable once built; rebuild it
/// when the configuration changes.
#[derive(Debug, Clone, Default)]
pub struct ExtractionEngine {
    core: Vec<CompiledRule>,
    extra: Vec<CompiledRule>,
    warnings: Vec<String>,
}

impl ExtractionEngine {
    pub fn compile(config: &ExtractionConfig) -> Self {
        let mut engine = Self::default();

        for (field, rule) in &config.core {
            let compiled = engine.compile_rule(&PatternRule::from_config(field, rule));
            engine.core.push(compiled);
        }

        for (field, rule) in &config.extra_fields {
            if !rule.enabled {
                debug!("Extra field '{}' is disabled, skipping", field);
                continue;
            }
            let compiled = engine.compile_rule(&PatternRule::from_config(field, rule));
            engine.extra.push(compiled);
        }

        debug!(
            "Compiled {} core and {} extra extraction rules",
            engine.core.len(),
            engine.extra.len()
        );
        engine
    }

    fn compile_rule(&mut self, rule: &PatternRule) -> CompiledRule {
        let (compiled, errors) = CompiledRule::compile(rule);
        self.warnings
            .extend(errors.into_iter().map(|e| e.to_string()));
        compiled
    }

    /// Compile-time warnings (dropped patterns).
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.core
            .iter()
            .chain(self.extra.iter())
            .map(|rule| rule.field.as_str())
    }

    /// Runs every rule against `text`. Fields are independent of each other;
    /// an extra field sharing a core field's name replaces the core value when it matches.
    pub fn extract(&self, text: &str) -> ExtractedRecord {
        let mut record = ExtractedRecord::new();
        for warning in &self.warnings {
            record.push_warning(warning.clone());
        }

        if text.is_empty() {
            return record;
        }

        for rule in self.core.iter().chain(self.extra.iter()) {
            if let Some(value) = rule.find(text) {
                record.set(&rule.field, &value);
            }
        }

        debug!("Extraction engine produced {} fields", record.len());
        record
    }
}

/// Secondary rule layer (`log_patterns` overlaid with `custom_patterns`) that
/// only fills fields still empty after the engine ran.
#[derive(Debug, Clone, Default)]
pub struct CustomPatternLayer {
    rules: BTreeMap<String, Vec<Regex>>,
    warnings: Vec<String>,
}

impl CustomPatternLayer {
    pub fn compile(config: &ExtractionConfig) -> Self {
        let mut merged: BTreeMap<&str, &Vec<String>> = BTreeMap::new();
        for (field, patterns) in &config.log_patterns {
            merged.insert(field.as_str(), patterns);
        }
        for (field, patterns) in &config.custom_patterns {
            merged.insert(field.as_str(), patterns);
        }

        let mut layer = Self::default();
        for (field, patterns) in merged {
            let mut compiled = Vec::with_capacity(patterns.len());
            for pattern in patterns {
                match Regex::new(pattern) {
                    Ok(regex) => compiled.push(regex),
                    Err(e) => {
                        warn!("Dropping custom pattern for '{}': {}", field, e);
                        layer.warnings.push(format!(
                            "Pattern for field {} failed to compile ({}): {}",
                            field, pattern, e
                        ));
                    }
                }
            }
            layer.rules.insert(field.to_string(), compiled);
        }
        layer
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn fill(&self, record: &mut ExtractedRecord, text: &str) {
        for (field, patterns) in &self.rules {
            if record.get(field).is_some_and(|v| !v.is_empty()) {
                continue;
            }
            if let Some(value) = first_match(patterns, text) {
                record.set(field, &value);
            }
        }
    }
}
