// file: src/extractor/patterns.rs
// description: compiled regex patterns shared across extraction and enrichment
// reference: https://docs.rs/regex

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Loose dotted-quad candidate; octet ranges are not checked.
    pub static ref IPV4_CANDIDATE: Regex = Regex::new(
        r"(?:[0-9]{1,3}\.){3}[0-9]{1,3}"
    ).expect("IPV4_CANDIDATE regex is valid");
}

/// First IPv4-looking substring, used to strip text that extraction rules over-captured.
pub fn first_ipv4(text: &str) -> Option<&str> {
    IPV4_CANDIDATE.find(text).map(|m| m.as_str())
}
