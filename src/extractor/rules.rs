// file: src/extractor/rules.rs
// description: pattern rule sets and their compiled form
// reference: https://docs.rs/regex

use crate::config::{MatchMode, RuleConfig};
use crate::error::{Result, TriageError};
use regex::Regex;
use tracing::warn;

/// Ordered patterns for one field, as configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternRule {
    pub field: String,
    pub mode: MatchMode,
    pub patterns: Vec<String>,
}

impl PatternRule {
    pub fn new(field: &str, mode: MatchMode, patterns: &[&str]) -> Self {
        Self {
            field: field.to_string(),
            mode,
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
        }
    }

    pub fn from_config(field: &str, rule: &RuleConfig) -> Self {
        Self::new(field, rule.mode, &rule.pattern_list())
    }
}

/// A rule whose valid patterns have been compiled, in configured order.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub field: String,
    patterns: Vec<Regex>,
}

impl CompiledRule {
    /// Invalid patterns are dropped and reported; they never fail the whole rule.
    pub fn compile(rule: &PatternRule) -> (Self, Vec<TriageError>) {
        let mut patterns = Vec::with_capacity(rule.patterns.len());
        let mut errors = Vec::new();

        for pattern in &rule.patterns {
            match compile_pattern(&rule.field, rule.mode, pattern) {
                Ok(regex) => patterns.push(regex),
                Err(e) => {
                    warn!("Dropping pattern: {}", e);
                    errors.push(e);
                }
            }
        }

        let compiled = Self {
            field: rule.field.clone(),
            patterns,
        };
        (compiled, errors)
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    pub fn find(&self, text: &str) -> Option<String> {
        first_match(&self.patterns, text)
    }
}

pub fn compile_pattern(field: &str, mode: MatchMode, pattern: &str) -> Result<Regex> {
    let source = match mode {
        MatchMode::Regex => pattern.to_string(),
        MatchMode::Fixed => regex::escape(pattern),
    };

    Regex::new(&source).map_err(|e| TriageError::RuleCompile {
        field: field.to_string(),
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

/// Tries each pattern in order against the whole text. The first pattern that
/// matches decides the outcome: its first capture group when it has one,
/// otherwise the full match. Later patterns are not consulted after a match.
pub fn first_match(patterns: &[Regex], text: &str) -> Option<String> {
    for regex in patterns {
        if let Some(caps) = regex.captures(text) {
            let value = if regex.captures_len() > 1 {
                caps.get(1)
            } else {
                caps.get(0)
            };
            return value
                .map(|m| m.as_str())
                .filter(|v| !v.is_empty())
                .map(str::to_string);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compiled(patterns: &[&str]) -> CompiledRule {
        let (rule, errors) =
            CompiledRule::compile(&PatternRule::new("field", MatchMode::Regex, patterns));
        assert!(errors.is_empty());
        rule
    }

    #[test]
    fn test_list_order_beats_document_order() {
        let rule = compiled(&[r"dst=(\S+)", r"src=(\S+)"]);
        let text = "src=1.1.1.1 dst=2.2.2.2";
        assert_eq!(rule.find(text).as_deref(), Some("2.2.2.2"));
    }

    #[test]
    fn test_first_group_or_full_match() {
        let grouped = compiled(&[r"port (\d+)/(\w+)"]);
        assert_eq!(grouped.find("port 443/tcp").as_deref(), Some("443"));

        let plain = compiled(&[r"TCP|UDP"]);
        assert_eq!(plain.find("proto UDP").as_deref(), Some("UDP"));
    }

    #[test]
    fn test_later_patterns_not_tried_after_match() {
        // First pattern matches but its group does not participate.
        let rule = compiled(&[r"id(?:=(\d+))?", r"id=(\d+)"]);
        assert_eq!(rule.find("id only"), None);
    }

    #[test]
    fn test_invalid_pattern_is_dropped() {
        let rule = PatternRule::new("src_ip", MatchMode::Regex, &[r"(unclosed", r"ip=(\S+)"]);
        let (compiled, errors) = CompiledRule::compile(&rule);
        assert_eq!(compiled.pattern_count(), 1);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], TriageError::RuleCompile { .. }));
        assert_eq!(compiled.find("ip=9.9.9.9").as_deref(), Some("9.9.9.9"));
    }

    #[test]
    fn test_fixed_mode_is_literal() {
        let rule = PatternRule::new("event_name", MatchMode::Fixed, &["SQL注入(攻击)"]);
        let (compiled, errors) = CompiledRule::compile(&rule);
        assert!(errors.is_empty());
        assert_eq!(
            compiled.find("检测到 SQL注入(攻击) 行为").as_deref(),
            Some("SQL注入(攻击)")
        );
        assert_eq!(compiled.find("SQL注入攻击"), None);
    }
}
