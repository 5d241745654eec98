// file: src/models/lists.rs
// description: allow/block list kinds and per-ip list hits
// reference: internal data structures

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListKind {
    Whitelist,
    Blacklist,
}

impl ListKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListKind::Whitelist => "whitelist",
            ListKind::Blacklist => "blacklist",
        }
    }
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListHit {
    pub kind: ListKind,
    pub ip: String,
}

impl ListHit {
    pub fn new(kind: ListKind, ip: &str) -> Self {
        Self {
            kind,
            ip: ip.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpListAlerts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_ip_status: Option<ListHit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dst_ip_status: Option<ListHit>,
}

impl IpListAlerts {
    pub fn is_empty(&self) -> bool {
        self.src_ip_status.is_none() && self.dst_ip_status.is_none()
    }
}
