//! # Clipdeck Protocol
//!
//! Remote protocol types for Clipdeck.
//!
//! This crate provides:
//! - `RemoteFailure`, the raw failure signal of a remote call
//! - `EntityRecord`/`EntityPatch`, the payloads of create and update
//! - `RemoteStep`, one call of a mutation, and `IdRemap` for placeholders
//! - `PendingMutation`/`OfflineLog`, the persisted offline queue
//! - `plan_steps`, diffing two collection states into remote steps
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod failure;
mod pending;
mod plan;
mod record;
mod step;

pub use failure::{FailureCategory, RemoteFailure};
pub use pending::{OfflineLog, PendingMutation, OFFLINE_LOG_VERSION};
pub use plan::plan_steps;
pub use record::{EntityKind, EntityPatch, EntityRecord, RemoteEntity};
pub use step::{IdRemap, Remap, RemoteAction, RemoteStep};
