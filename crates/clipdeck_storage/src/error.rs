//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The write does not fit in the remaining quota.
    #[error("storage quota exceeded: need {needed} bytes, {available} available")]
    QuotaExceeded {
        /// Bytes the write would add.
        needed: u64,
        /// Bytes still available.
        available: u64,
    },

    /// The key cannot be stored.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Stored data could not be read back.
    #[error("storage corrupted: {0}")]
    Corrupted(String),
}

impl StorageError {
    /// Returns true if the error means the store is full.
    #[must_use]
    pub fn is_quota(&self) -> bool {
        matches!(self, Self::QuotaExceeded { .. })
    }
}
