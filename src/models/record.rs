// file: src/models/record.rs
// description: extracted record produced by field extraction
// reference: internal data structures

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Field name to value mapping. A field is present only when some rule produced
/// a non-empty value; absence means "not found".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedRecord {
    pub fields: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ExtractedRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Stores `value` unless it is empty. Returns whether the field was set.
    pub fn set(&mut self, field: &str, value: &str) -> bool {
        if value.is_empty() {
            return false;
        }
        self.fields.insert(field.to_string(), value.to_string());
        true
    }

    /// Sets the field only when it is still absent.
    pub fn fill_missing(&mut self, field: &str, value: &str) -> bool {
        if self.contains(field) {
            return false;
        }
        self.set(field, value)
    }

    pub fn push_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Returns a new record with `extra` layered underneath: keys already
    /// present in `self` keep their value.
    pub fn merged_with<'a, I>(&self, extra: I) -> ExtractedRecord
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        let mut merged = self.clone();
        for (field, value) in extra {
            merged.fill_missing(field, value);
        }
        merged
    }
}
