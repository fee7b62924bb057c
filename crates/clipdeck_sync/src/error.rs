//! Error types for the sync engine.

use clipdeck_codec::CodecError;
use clipdeck_core::CoreError;
use clipdeck_storage::StorageError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Taxonomy every remote failure is mapped onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request is structurally wrong.
    Validation,
    /// The target does not exist.
    NotFound,
    /// The request clashes with existing state, e.g. a duplicate insert.
    Conflict,
    /// The service or local storage is out of space.
    QuotaExceeded,
    /// The service is temporarily unavailable; retried with backoff.
    ServiceUnavailable,
    /// The service could not be reached; routed to the offline queue.
    NetworkUnreachable,
    /// The client is offline; routed to the offline queue.
    Offline,
    /// Anything unrecognized; surfaced verbatim.
    Unknown,
}

impl ErrorKind {
    /// Returns true if the failure may go away on its own.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::ServiceUnavailable | Self::NetworkUnreachable | Self::Offline
        )
    }

    /// Returns true if the failure means "no connectivity".
    ///
    /// Such failures are never terminal: the mutation is kept and replayed
    /// on reconnect instead of retried in place.
    #[must_use]
    pub const fn is_connectivity(self) -> bool {
        matches!(self, Self::NetworkUnreachable | Self::Offline)
    }

    /// Stable lower-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::QuotaExceeded => "quota_exceeded",
            Self::ServiceUnavailable => "service_unavailable",
            Self::NetworkUnreachable => "network_unreachable",
            Self::Offline => "offline",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A remote failure after classification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ClassifiedError {
    /// Taxonomy entry.
    pub kind: ErrorKind,
    /// Whether retrying can help.
    pub retryable: bool,
    /// Suggested wait before the next attempt.
    pub retry_after: Option<Duration>,
    /// Human-readable message for display.
    pub message: String,
}

impl ClassifiedError {
    /// Creates a classified error with the kind's default retryability.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            retryable: kind.is_retryable(),
            retry_after: None,
            message: message.into(),
        }
    }
}

/// Errors surfaced by the sync engine.
#[derive(Error, Debug)]
pub enum SyncError {
    /// A remote call failed terminally.
    #[error("{0}")]
    Classified(ClassifiedError),

    /// A retryable failure persisted past the attempt cap.
    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Calls made, the first one included.
        attempts: u32,
        /// Classification of the final failure.
        last: ClassifiedError,
    },

    /// Local validation rejected the input before anything was applied.
    #[error("invalid input: {0}")]
    Core(#[from] CoreError),

    /// A snapshot failed a save precondition.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A size bound was hit.
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// The offline queue refused a new entry.
    #[error("offline queue is full ({max_entries} entries)")]
    QueueFull {
        /// Configured entry bound.
        max_entries: usize,
    },

    /// Persistence failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Encoding or decoding persisted state failed.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// A newer request for the same logical operation made this one stale.
    #[error("superseded by a newer request")]
    Superseded,
}

impl SyncError {
    /// Maps the error onto the failure taxonomy.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Classified(c) => c.kind,
            Self::RetriesExhausted { last, .. } => last.kind,
            Self::Core(CoreError::NotFound { .. }) => ErrorKind::NotFound,
            Self::Core(CoreError::DuplicateId { .. }) => ErrorKind::Conflict,
            Self::Core(CoreError::Codec(_)) => ErrorKind::Unknown,
            Self::Core(_) | Self::Validation(_) => ErrorKind::Validation,
            Self::QuotaExceeded(_) | Self::QueueFull { .. } => ErrorKind::QuotaExceeded,
            Self::Storage(e) if e.is_quota() => ErrorKind::QuotaExceeded,
            Self::Storage(_) | Self::Codec(_) | Self::Superseded => ErrorKind::Unknown,
        }
    }

    /// Returns true if the caller may try the same request again.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Classified(c) => c.retryable,
            _ => false,
        }
    }

    /// Classified view for display.
    #[must_use]
    pub fn classified(&self) -> ClassifiedError {
        match self {
            Self::Classified(c) => c.clone(),
            Self::RetriesExhausted { last, .. } => ClassifiedError {
                retryable: false,
                message: self.to_string(),
                ..last.clone()
            },
            other => ClassifiedError {
                kind: other.kind(),
                retryable: false,
                retry_after: None,
                message: other.to_string(),
            },
        }
    }
}

impl From<ClassifiedError> for SyncError {
    fn from(error: ClassifiedError) -> Self {
        Self::Classified(error)
    }
}
