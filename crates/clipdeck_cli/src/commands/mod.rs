//! CLI command implementations.

pub mod inspect;
pub mod offline;
pub mod verify;

/// Key suffix of persisted offline queues.
pub const OFFLINE_SUFFIX: &str = ".offline_queue";

/// Key suffix of auto-save drafts.
pub const DRAFT_SUFFIX: &str = ".draft";
