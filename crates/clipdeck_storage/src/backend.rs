//! Key-value store trait definition.

use crate::error::{StorageError, StorageResult};

/// Space accounting for a [`KeyValueStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageQuota {
    /// Bytes currently stored.
    pub used_bytes: u64,
    /// Bytes that can still be written. `u64::MAX` when unbounded.
    pub available_bytes: u64,
}

impl StorageQuota {
    /// Quota for a store without a limit.
    #[must_use]
    pub const fn unbounded(used_bytes: u64) -> Self {
        Self {
            used_bytes,
            available_bytes: u64::MAX,
        }
    }

    /// Quota for a store limited to `limit` bytes.
    #[must_use]
    pub const fn limited(used_bytes: u64, limit: u64) -> Self {
        Self {
            used_bytes,
            available_bytes: limit.saturating_sub(used_bytes),
        }
    }
}

/// A durable key-value store for small blobs.
///
/// Stores are **opaque**: values are bytes and the store never interprets
/// them. Callers own the encoding. Stores hold drafts and the offline
/// mutation queue, so a `set` must either fully replace the previous value
/// or fail leaving it intact.
///
/// # Implementors
///
/// - [`super::MemoryKeyValueStore`] - For testing
/// - [`super::FileKeyValueStore`] - For persistent storage
pub trait KeyValueStore: Send + Sync {
    /// Reads the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or an I/O error occurs.
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::QuotaExceeded`] if the value does not fit.
    fn set(&self, key: &str, value: &[u8]) -> StorageResult<()>;

    /// Removes `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> StorageResult<()>;

    /// Reports used and available space.
    fn quota(&self) -> StorageResult<StorageQuota>;
}

/// Rejects keys no store can hold.
pub(crate) fn check_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("key is empty".into()));
    }
    Ok(())
}

/// Fails with [`StorageError::QuotaExceeded`] if replacing `old_len` bytes
/// with `new_len` bytes would go past `limit`.
pub(crate) fn check_quota(
    limit: Option<u64>,
    used: u64,
    old_len: u64,
    new_len: u64,
) -> StorageResult<()> {
    let Some(limit) = limit else {
        return Ok(());
    };
    let base = used.saturating_sub(old_len);
    if base.saturating_add(new_len) > limit {
        return Err(StorageError::QuotaExceeded {
            needed: new_len.saturating_sub(old_len),
            available: limit.saturating_sub(used),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limited_quota_saturates() {
        let quota = StorageQuota::limited(12, 10);
        assert_eq!(quota.available_bytes, 0);
        assert_eq!(StorageQuota::unbounded(3).available_bytes, u64::MAX);
    }

    #[test]
    fn replacement_counts_only_growth() {
        assert!(check_quota(Some(10), 8, 8, 10).is_ok());
        assert!(check_quota(Some(10), 8, 0, 3).is_err());
        assert!(check_quota(None, u64::MAX, 0, 1).is_ok());
    }

    #[test]
    fn empty_key_rejected() {
        assert!(matches!(check_key(""), Err(StorageError::InvalidKey(_))));
        assert!(check_key("clipdeck.draft").is_ok());
    }
}
