//! In-memory key-value store for testing.

use crate::backend::{check_key, check_quota, KeyValueStore, StorageQuota};
use crate::error::StorageResult;
use parking_lot::RwLock;
use std::collections::HashMap;

/// An in-memory key-value store.
///
/// This store keeps all data in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Sessions that do not need persistence
///
/// A byte limit can be set to exercise quota handling.
///
/// # Example
///
/// ```rust
/// use clipdeck_storage::{KeyValueStore, MemoryKeyValueStore};
///
/// let store = MemoryKeyValueStore::new();
/// store.set("draft", b"hello").unwrap();
/// assert_eq!(store.get("draft").unwrap().as_deref(), Some(&b"hello"[..]));
/// ```
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
    limit: Option<u64>,
}

impl MemoryKeyValueStore {
    /// Creates an empty, unbounded store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store that holds at most `limit` bytes of values.
    #[must_use]
    pub fn with_limit(limit: u64) -> Self {
        Self {
            entries: RwLock::default(),
            limit: Some(limit),
        }
    }

    /// Returns the stored keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn used(entries: &HashMap<String, Vec<u8>>) -> u64 {
        entries.values().map(|v| v.len() as u64).sum()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        check_key(key)?;
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        check_key(key)?;
        let mut entries = self.entries.write();
        let old_len = entries.get(key).map_or(0, |v| v.len() as u64);
        check_quota(self.limit, Self::used(&entries), old_len, value.len() as u64)?;
        entries.insert(key.to_owned(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        check_key(key)?;
        self.entries.write().remove(key);
        Ok(())
    }

    fn quota(&self) -> StorageResult<StorageQuota> {
        let used = Self::used(&self.entries.read());
        Ok(match self.limit {
            Some(limit) => StorageQuota::limited(used, limit),
            None => StorageQuota::unbounded(used),
        })
    }
}
