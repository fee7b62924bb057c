//! File-based key-value store for persistent storage.

use crate::backend::{check_key, check_quota, KeyValueStore, StorageQuota};
use crate::error::{StorageError, StorageResult};
use parking_lot::Mutex;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const VALUE_EXT: &str = "kv";
const TEMP_EXT: &str = "tmp";

/// A directory-backed key-value store.
///
/// Each key is one file in the directory. Writes go to a temporary file
/// that is synced and then renamed over the old value, so a crash leaves
/// either the old or the new value, never a torn one.
///
/// # Example
///
/// ```no_run
/// use clipdeck_storage::{FileKeyValueStore, KeyValueStore};
/// use std::path::Path;
///
/// let store = FileKeyValueStore::open(Path::new("state")).unwrap();
/// store.set("clipdeck.offline_queue", b"...").unwrap();
/// ```
#[derive(Debug)]
pub struct FileKeyValueStore {
    dir: PathBuf,
    limit: Option<u64>,
    write_lock: Mutex<()>,
}

impl FileKeyValueStore {
    /// Opens or creates a store rooted at `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(dir: &Path) -> StorageResult<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            limit: None,
            write_lock: Mutex::new(()),
        })
    }

    /// Limits the total size of stored values to `limit` bytes.
    #[must_use]
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns the store directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Returns the stored keys, sorted.
    pub fn keys(&self) -> StorageResult<Vec<String>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(VALUE_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                keys.push(unescape_key(stem)?);
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn value_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{VALUE_EXT}", escape_key(key)))
    }

    fn used_bytes(&self) -> StorageResult<u64> {
        let mut used = 0;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if entry.path().extension().and_then(|e| e.to_str()) == Some(VALUE_EXT) {
                used += entry.metadata()?.len();
            }
        }
        Ok(used)
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        check_key(key)?;
        match fs::read(self.value_path(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        check_key(key)?;
        let _guard = self.write_lock.lock();

        let path = self.value_path(key);
        let old_len = match fs::metadata(&path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e.into()),
        };
        if self.limit.is_some() {
            check_quota(self.limit, self.used_bytes()?, old_len, value.len() as u64)?;
        }

        let temp = path.with_extension(TEMP_EXT);
        {
            let mut file = File::create(&temp)?;
            file.write_all(value)?;
            file.sync_all()?;
        }
        fs::rename(&temp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        check_key(key)?;
        let _guard = self.write_lock.lock();
        match fs::remove_file(self.value_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn quota(&self) -> StorageResult<StorageQuota> {
        let used = self.used_bytes()?;
        Ok(match self.limit {
            Some(limit) => StorageQuota::limited(used, limit),
            None => StorageQuota::unbounded(used),
        })
    }
}

/// Maps a key to a portable file stem: `[A-Za-z0-9_-]` pass through,
/// everything else becomes `%XX`.
fn escape_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

fn unescape_key(stem: &str) -> StorageResult<String> {
    let bytes = stem.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = stem
                .get(i + 1..i + 3)
                .ok_or_else(|| StorageError::Corrupted(format!("bad key file {stem}")))?;
            let byte = u8::from_str_radix(hex, 16)
                .map_err(|_| StorageError::Corrupted(format!("bad key file {stem}")))?;
            out.push(byte);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|_| StorageError::Corrupted(format!("bad key file {stem}")))
}
