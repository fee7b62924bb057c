//! # Clipdeck Sync
//!
//! Optimistic mutation and recovery engine for Clipdeck.
//!
//! This crate provides:
//! - Error classification into a retryability taxonomy
//! - Retry with exponential backoff
//! - Optimistic mutations with exact rollback
//! - A durable offline queue replayed on reconnect
//! - Debounced auto-save of whole-project snapshots
//! - Cached, last-request-wins lookups
//! - A per-project session wiring all of the above
//!
//! ## Architecture
//!
//! Every feature is a thin caller of [`MutationExecutor`]:
//! 1. Apply the change to the local store (visible immediately)
//! 2. Diff the collection into remote steps and run them in order
//! 3. Commit, roll back, or hand the remaining steps to the [`OfflineQueue`]
//!
//! ## Key Invariants
//!
//! - Validation failures never touch local state
//! - A terminal failure reverts only its own change
//! - Connectivity failures never roll back
//! - Offline work is replayed strictly in order
//! - New work queues behind pending offline work
//!
//! No process-wide state exists: a [`ProjectSession`] is built explicitly
//! for each open project.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod autosave;
mod cancel;
mod classify;
mod config;
mod connectivity;
mod error;
mod executor;
mod lookup;
mod offline;
mod remote;
mod retry;
mod session;

pub use autosave::{AutoSavePipeline, SaveOutcome, SaveStatus, SnapshotValidator};
pub use cancel::{Supersession, Ticket};
pub use classify::ErrorClassifier;
pub use config::{
    AutoSaveConfig, ExhaustedRetryPolicy, OfflineQueueConfig, RetryConfig, SessionConfig,
    DEFAULT_DRAFT_KEY, DEFAULT_OFFLINE_KEY,
};
pub use connectivity::{Connectivity, ConnectivityWatch};
pub use error::{ClassifiedError, ErrorKind, SyncError, SyncResult};
pub use executor::{Enqueue, MutationExecutor, MutationOutcome, MutationState};
pub use lookup::CachedLookup;
pub use offline::{OfflineQueue, RejectedMutation, ReplayReport};
pub use remote::{perform_step, MockRemoteService, RemoteEntityService};
pub use retry::{RetryDecision, RetryScheduler};
pub use session::{ProjectSession, SessionStatus};
