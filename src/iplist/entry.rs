// file: src/iplist/entry.rs
// description: ip list entry parsing and canonical rendering
// reference: https://docs.rs/ipnet

use crate::error::{Result, TriageError};
use ipnet::IpNet;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

/// One list line: a single address, a CIDR block, or an inclusive range.
/// Shorthand ranges (`a.b.c.start-end`) parse into `Range`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpListEntry {
    Single(IpAddr),
    Cidr(IpNet),
    Range { start: IpAddr, end: IpAddr },
}

impl IpListEntry {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(invalid(raw, "empty entry"));
        }

        if raw.contains('/') {
            let net = IpNet::from_str(raw).map_err(|e| invalid(raw, &e.to_string()))?;
            return Ok(IpListEntry::Cidr(net.trunc()));
        }

        if let Some((start, end)) = raw.split_once('-') {
            let start = parse_addr(raw, start)?;
            let end = end.trim();
            let end = if end.contains('.') || end.contains(':') {
                parse_addr(raw, end)?
            } else {
                expand_last_octet(raw, start, end)?
            };

            if start.is_ipv4() != end.is_ipv4() {
                return Err(invalid(raw, "range endpoints differ in address family"));
            }
            if start > end {
                return Err(invalid(raw, "range start is after range end"));
            }
            return Ok(IpListEntry::Range { start, end });
        }

        Ok(IpListEntry::Single(parse_addr(raw, raw)?))
    }

    /// Cross-family checks are always false.
    pub fn contains(&self, ip: IpAddr) -> bool {
        match self {
            IpListEntry::Cidr(net) => net.contains(&ip),
            IpListEntry::Range { start, end } => {
                start.is_ipv4() == ip.is_ipv4() && *start <= ip && ip <= *end
            }
            IpListEntry::Single(addr) => *addr == ip,
        }
    }
}

impl fmt::Display for IpListEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpListEntry::Single(addr) => write!(f, "{}", addr),
            IpListEntry::Cidr(net) => write!(f, "{}", net),
            IpListEntry::Range { start, end } => write!(f, "{}-{}", start, end),
        }
    }
}

impl FromStr for IpListEntry {
    type Err = TriageError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Canonical form of an entry.
pub fn normalize(raw: &str) -> Result<String> {
    IpListEntry::parse(raw).map(|entry| entry.to_string())
}

/// Canonical form when the entry parses, otherwise the trimmed input unchanged.
pub fn normalize_lossy(raw: &str) -> String {
    normalize(raw).unwrap_or_else(|_| raw.trim().to_string())
}

pub fn validate_entry(raw: &str) -> bool {
    IpListEntry::parse(raw).is_ok()
}

fn parse_addr(entry: &str, text: &str) -> Result<IpAddr> {
    text.trim()
        .parse::<IpAddr>()
        .map_err(|e| invalid(entry, &format!("'{}': {}", text.trim(), e)))
}

fn expand_last_octet(entry: &str, start: IpAddr, last: &str) -> Result<IpAddr> {
    let IpAddr::V4(start) = start else {
        return Err(invalid(entry, "shorthand ranges are IPv4 only"));
    };
    let last: u8 = last
        .parse()
        .map_err(|_| invalid(entry, &format!("'{}' is not a valid last octet", last)))?;
    let [a, b, c, _] = start.octets();
    Ok(IpAddr::V4(Ipv4Addr::new(a, b, c, last)))
}

fn invalid(entry: &str, reason: &str) -> TriageError {
    TriageError::Validation(format!("invalid ip list entry '{}': {}", entry, reason))
}
