// file: src/iplist/mod.rs
// description: allow/block list parsing, matching and storage
// reference: internal module structure

pub mod entry;
pub mod matcher;
pub mod store;

pub use entry::{IpListEntry, normalize, normalize_lossy, validate_entry};
pub use matcher::{IpList, member, search};
pub use store::{FileListStore, ListSource};
