// file: src/iplist/store.rs
// description: line-oriented whitelist/blacklist files
// reference: internal storage patterns

use crate::config::ListsConfig;
use crate::error::{Result, TriageError};
use crate::iplist::entry::{IpListEntry, normalize_lossy};
use crate::iplist::matcher::IpList;
use crate::models::ListKind;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Read access to list contents, as consumed by the pipeline.
pub trait ListSource: Send + Sync {
    fn load(&self, kind: ListKind) -> Result<Vec<String>>;

    fn load_list(&self, kind: ListKind) -> Result<IpList> {
        self.load(kind).map(IpList::new)
    }
}

/// One entry per line; blank lines and `#` comments are ignored. Rewrites
/// drop comments.
#[derive(Debug, Clone)]
pub struct FileListStore {
    whitelist_path: PathBuf,
    blacklist_path: PathBuf,
}

impl FileListStore {
    pub fn new(whitelist_path: impl Into<PathBuf>, blacklist_path: impl Into<PathBuf>) -> Self {
        Self {
            whitelist_path: whitelist_path.into(),
            blacklist_path: blacklist_path.into(),
        }
    }

    pub fn from_config(config: &ListsConfig) -> Self {
        Self::new(&config.whitelist_path, &config.blacklist_path)
    }

    pub fn path(&self, kind: ListKind) -> &Path {
        match kind {
            ListKind::Whitelist => &self.whitelist_path,
            ListKind::Blacklist => &self.blacklist_path,
        }
    }

    /// Returns whether the list changed. Adding an existing entry is a no-op.
    pub fn add(&self, kind: ListKind, entry: &str) -> Result<bool> {
        let entry = IpListEntry::parse(entry)?.to_string();
        let mut entries = self.load(kind)?;
        if entries.contains(&entry) {
            debug!("{} already contains {}", kind, entry);
            return Ok(false);
        }
        entries.push(entry);
        self.write(kind, &entries)?;
        Ok(true)
    }

    /// Returns whether the list changed. Removing a non-member is a no-op.
    pub fn remove(&self, kind: ListKind, entry: &str) -> Result<bool> {
        let entry = normalize_lossy(entry);
        let mut entries = self.load(kind)?;
        let before = entries.len();
        entries.retain(|existing| *existing != entry);
        if entries.len() == before {
            return Ok(false);
        }
        self.write(kind, &entries)?;
        Ok(true)
    }

    /// Adds every valid entry of a line file; returns how many were new.
    pub fn import(&self, kind: ListKind, source: &Path) -> Result<usize> {
        let mut added = 0;
        for line in read_entries(source)? {
            if IpListEntry::parse(&line).is_ok() && self.add(kind, &line)? {
                added += 1;
            }
        }
        info!("Imported {} entries into {}", added, kind);
        Ok(added)
    }

    pub fn export(&self, kind: ListKind, target: &Path) -> Result<usize> {
        let entries = self.load(kind)?;
        write_entries(target, &entries)?;
        info!("Exported {} {} entries to {}", entries.len(), kind, target.display());
        Ok(entries.len())
    }

    fn write(&self, kind: ListKind, entries: &[String]) -> Result<()> {
        write_entries(self.path(kind), entries)
    }
}

impl ListSource for FileListStore {
    /// A missing file is an empty list.
    fn load(&self, kind: ListKind) -> Result<Vec<String>> {
        let path = self.path(kind);
        if !path.exists() {
            debug!("List file {} does not exist", path.display());
            return Ok(Vec::new());
        }
        read_entries(path)
    }
}

fn read_entries(path: &Path) -> Result<Vec<String>> {
    let contents = fs::read_to_string(path).map_err(|source| TriageError::ListRead {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(normalize_lossy)
        .collect())
}

fn write_entries(path: &Path, entries: &[String]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let mut contents = String::new();
    for entry in entries.iter().map(|e| e.trim()).filter(|e| !e.is_empty()) {
        contents.push_str(entry);
        contents.push('\n');
    }
    fs::write(path, contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> FileListStore {
        FileListStore::new(
            dir.path().join("lists/whitelist.txt"),
            dir.path().join("lists/blocked.txt"),
        )
    }

    #[test]
    fn test_missing_file_is_empty_list() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        assert!(store.load(ListKind::Whitelist).unwrap().is_empty());
    }

    #[test]
    fn test_load_skips_comments_and_expands_shorthand() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        fs::create_dir_all(dir.path().join("lists")).unwrap();
        fs::write(
            store.path(ListKind::Blacklist),
            "# scanners\n\n192.168.1.1-100\n  45.9.0.0/16 \nnot an ip\n",
        )
        .unwrap();

        let entries = store.load(ListKind::Blacklist).unwrap();
        assert_eq!(
            entries,
            vec!["192.168.1.1-192.168.1.100", "45.9.0.0/16", "not an ip"]
        );

        let list = store.load_list(ListKind::Blacklist).unwrap();
        assert!(list.member("45.9.3.3"));
    }

    #[test]
    fn test_add_and_remove_are_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        assert!(store.add(ListKind::Whitelist, "10.0.0.1").unwrap());
        assert!(!store.add(ListKind::Whitelist, " 10.0.0.1 ").unwrap());
        assert!(store.add(ListKind::Whitelist, "10.1.1.1-20").unwrap());
        assert_eq!(
            store.load(ListKind::Whitelist).unwrap(),
            vec!["10.0.0.1", "10.1.1.1-10.1.1.20"]
        );

        assert!(store.remove(ListKind::Whitelist, "10.1.1.1-20").unwrap());
        assert!(!store.remove(ListKind::Whitelist, "10.1.1.1-20").unwrap());
        assert!(!store.remove(ListKind::Whitelist, "8.8.8.8").unwrap());
        assert_eq!(store.load(ListKind::Whitelist).unwrap(), vec!["10.0.0.1"]);
    }

    #[test]
    fn test_add_rejects_invalid_entry() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        assert!(store.add(ListKind::Blacklist, "evil.example").is_err());
    }

    #[test]
    fn test_import_and_export() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let source = dir.path().join("import.txt");
        fs::write(&source, "1.1.1.1\n# comment\nbad\n1.1.1.1\n2.2.2.0/24\n").unwrap();

        assert_eq!(store.import(ListKind::Blacklist, &source).unwrap(), 2);

        let target = dir.path().join("out/export.txt");
        assert_eq!(store.export(ListKind::Blacklist, &target).unwrap(), 2);
        assert_eq!(
            fs::read_to_string(target).unwrap(),
            "1.1.1.1\n2.2.2.0/24\n"
        );
    }

    #[test]
    fn test_unreadable_list_reports_list_read() {
        let dir = TempDir::new().unwrap();
        // A directory where a file is expected.
        let store = FileListStore::new(dir.path(), dir.path().join("blocked.txt"));
        let err = store.load(ListKind::Whitelist).unwrap_err();
        assert!(matches!(err, TriageError::ListRead { .. }));
    }
}
