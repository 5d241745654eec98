// file: src/iplist/matcher.rs
// description: ip membership and keyword search over allow/block lists
// reference: https://docs.rs/ipnet

use crate::iplist::entry::IpListEntry;
use std::net::IpAddr;
use tracing::debug;

/// A list as read from its store: raw text kept for search, parsed form for matching.
#[derive(Debug, Clone, Default)]
pub struct IpList {
    raw: Vec<String>,
    parsed: Vec<Option<IpListEntry>>,
}

impl IpList {
    pub fn new(entries: Vec<String>) -> Self {
        let parsed = entries
            .iter()
            .map(|raw| match IpListEntry::parse(raw) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    debug!("Skipping malformed list entry: {}", e);
                    None
                }
            })
            .collect();
        Self {
            raw: entries,
            parsed,
        }
    }

    pub fn entries(&self) -> &[String] {
        &self.raw
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// True on the first entry containing `ip`. An unparsable candidate is never a member.
    pub fn member(&self, ip: &str) -> bool {
        let Ok(candidate) = ip.trim().parse::<IpAddr>() else {
            return false;
        };
        self.parsed
            .iter()
            .flatten()
            .any(|entry| entry.contains(candidate))
    }

    pub fn search(&self, keyword: &str) -> Vec<&str> {
        search(&self.raw, keyword)
    }
}

/// One-shot membership test against unparsed entries.
pub fn member(ip: &str, entries: &[String]) -> bool {
    let Ok(candidate) = ip.trim().parse::<IpAddr>() else {
        return false;
    };
    entries
        .iter()
        .filter_map(|raw| IpListEntry::parse(raw).ok())
        .any(|entry| entry.contains(candidate))
}

/// Case-insensitive substring filter over the literal entry text.
pub fn search<'a>(entries: &'a [String], keyword: &str) -> Vec<&'a str> {
    let keyword = keyword.trim().to_lowercase();
    entries
        .iter()
        .map(String::as_str)
        .filter(|entry| keyword.is_empty() || entry.to_lowercase().contains(&keyword))
        .collect()
}
