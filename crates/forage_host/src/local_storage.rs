//! localStorage-like host API.
//!
//! A synchronous string-to-string area. Keys are enumerated by index in
//! key order.

use crate::error::{HostError, HostResult};
use fs2::FileExt;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// A localStorage-like host API.
pub trait LocalStorage: Send + Sync + Debug {
    /// Reads a value.
    fn get_item(&self, key: &str) -> HostResult<Option<String>>;

    /// Writes a value.
    ///
    /// Fails with [`HostError::QuotaExceeded`] when the area is full.
    fn set_item(&self, key: &str, value: &str) -> HostResult<()>;

    /// Removes a value. Removing a missing key succeeds.
    fn remove_item(&self, key: &str) -> HostResult<()>;

    /// Removes every value in the area.
    fn clear(&self) -> HostResult<()>;

    /// Returns the key at `index`, or `None` when out of range.
    fn key(&self, index: usize) -> HostResult<Option<String>>;

    /// Returns the number of keys.
    fn length(&self) -> HostResult<usize>;
}

/// An in-memory localStorage area.
///
/// Can be given a byte quota and can be switched into a blocked mode in
/// which every call fails, as a browser does in private browsing.
#[derive(Debug, Default)]
pub struct MemoryLocalStorage {
    entries: RwLock<BTreeMap<String, String>>,
    quota: Option<usize>,
    blocked: AtomicBool,
}

impl MemoryLocalStorage {
    /// Creates an empty, unlimited area.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an area holding at most `bytes` bytes of keys and values.
    #[must_use]
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            quota: Some(bytes),
            ..Self::default()
        }
    }

    /// Creates an area that refuses every call.
    #[must_use]
    pub fn blocked() -> Self {
        let area = Self::default();
        area.set_blocked(true);
        area
    }

    /// Blocks or unblocks the area.
    pub fn set_blocked(&self, blocked: bool) {
        self.blocked.store(blocked, Ordering::SeqCst);
    }

    /// Returns a copy of every entry.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.entries.read().clone()
    }

    fn check_access(&self) -> HostResult<()> {
        if self.blocked.load(Ordering::SeqCst) {
            return Err(HostError::SecurityError(
                "access to localStorage is denied".into(),
            ));
        }
        Ok(())
    }
}

fn used_bytes(entries: &BTreeMap<String, String>) -> usize {
    entries.iter().map(|(k, v)| k.len() + v.len()).sum()
}

impl LocalStorage for MemoryLocalStorage {
    fn get_item(&self, key: &str) -> HostResult<Option<String>> {
        self.check_access()?;
        Ok(self.entries.read().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> HostResult<()> {
        self.check_access()?;
        let mut entries = self.entries.write();
        if let Some(quota) = self.quota {
            let existing = entries.get(key).map_or(0, |v| key.len() + v.len());
            let needed = used_bytes(&entries) - existing + key.len() + value.len();
            if needed > quota {
                return Err(HostError::QuotaExceeded(format!(
                    "{needed} bytes exceeds quota of {quota}"
                )));
            }
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> HostResult<()> {
        self.check_access()?;
        self.entries.write().remove(key);
        Ok(())
    }

    fn clear(&self) -> HostResult<()> {
        self.check_access()?;
        self.entries.write().clear();
        Ok(())
    }

    fn key(&self, index: usize) -> HostResult<Option<String>> {
        self.check_access()?;
        Ok(self.entries.read().keys().nth(index).cloned())
    }

    fn length(&self) -> HostResult<usize> {
        self.check_access()?;
        Ok(self.entries.read().len())
    }
}

/// A localStorage area persisted as a JSON object in one file.
///
/// Every call takes an exclusive lock on the file, so several processes can
/// share the same area.
#[derive(Debug)]
pub struct FileLocalStorage {
    path: PathBuf,
}

impl FileLocalStorage {
    /// Opens (creating if needed) the area stored at `path`.
    pub fn open(path: impl AsRef<Path>) -> HostResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let area = Self { path };
        area.with_file(|_, _| Ok(()))?;
        Ok(area)
    }

    /// Returns the backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn with_file<T>(
        &self,
        f: impl FnOnce(&mut File, &mut BTreeMap<String, String>) -> HostResult<T>,
    ) -> HostResult<T> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;
        file.lock_exclusive()?;
        let result = read_entries(&mut file).and_then(|mut entries| f(&mut file, &mut entries));
        file.unlock()?;
        result
    }

    fn read<T>(&self, f: impl FnOnce(&BTreeMap<String, String>) -> T) -> HostResult<T> {
        self.with_file(|_, entries| Ok(f(entries)))
    }

    fn update(&self, f: impl FnOnce(&mut BTreeMap<String, String>)) -> HostResult<()> {
        self.with_file(|file, entries| {
            f(entries);
            write_entries(file, entries)
        })
    }
}

fn read_entries(file: &mut File) -> HostResult<BTreeMap<String, String>> {
    let mut text = String::new();
    file.seek(SeekFrom::Start(0))?;
    file.read_to_string(&mut text)?;
    if text.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    serde_json::from_str(&text).map_err(|e| HostError::Corrupted(e.to_string()))
}

fn write_entries(file: &mut File, entries: &BTreeMap<String, String>) -> HostResult<()> {
    let text = serde_json::to_string(entries).map_err(|e| HostError::Io(e.to_string()))?;
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(text.as_bytes())?;
    file.sync_data()?;
    Ok(())
}

impl LocalStorage for FileLocalStorage {
    fn get_item(&self, key: &str) -> HostResult<Option<String>> {
        self.read(|entries| entries.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> HostResult<()> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove_item(&self, key: &str) -> HostResult<()> {
        self.update(|entries| {
            entries.remove(key);
        })
    }

    fn clear(&self) -> HostResult<()> {
        self.update(BTreeMap::clear)
    }

    fn key(&self, index: usize) -> HostResult<Option<String>> {
        self.read(|entries| entries.keys().nth(index).cloned())
    }

    fn length(&self) -> HostResult<usize> {
        self.read(BTreeMap::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_area_basic_operations() {
        let area = MemoryLocalStorage::new();
        area.set_item("b", "2").unwrap();
        area.set_item("a", "1").unwrap();

        assert_eq!(area.get_item("a").unwrap(), Some("1".into()));
        assert_eq!(area.length().unwrap(), 2);
        assert_eq!(area.key(0).unwrap(), Some("a".into()));
        assert_eq!(area.key(2).unwrap(), None);

        area.remove_item("a").unwrap();
        assert_eq!(area.get_item("a").unwrap(), None);
        area.clear().unwrap();
        assert_eq!(area.length().unwrap(), 0);
    }

    #[test]
    fn quota_is_enforced() {
        let area = MemoryLocalStorage::with_quota(8);
        area.set_item("k", "1234567").unwrap();
        let err = area.set_item("k2", "x").unwrap_err();
        assert!(matches!(err, HostError::QuotaExceeded(_)));

        // Replacing an existing value only counts the difference.
        area.set_item("k", "7654321").unwrap();
    }

    #[test]
    fn blocked_area_refuses_access() {
        let area = MemoryLocalStorage::blocked();
        assert!(matches!(area.length(), Err(HostError::SecurityError(_))));
        area.set_blocked(false);
        assert_eq!(area.length().unwrap(), 0);
    }

    #[test]
    fn file_area_persists_between_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("area").join("localStorage.json");

        let area = FileLocalStorage::open(&path).unwrap();
        area.set_item("x", "1").unwrap();
        area.set_item("y", "2").unwrap();
        area.remove_item("y").unwrap();
        drop(area);

        let area = FileLocalStorage::open(&path).unwrap();
        assert_eq!(area.get_item("x").unwrap(), Some("1".into()));
        assert_eq!(area.length().unwrap(), 1);
        assert_eq!(area.key(0).unwrap(), Some("x".into()));
    }

    #[test]
    fn corrupted_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("localStorage.json");
        std::fs::write(&path, "not json").unwrap();

        let err = FileLocalStorage::open(&path).unwrap_err();
        assert!(matches!(err, HostError::Corrupted(_)));
    }
}
