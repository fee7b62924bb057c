//! # Clipdeck Storage
//!
//! Durable key-value storage for Clipdeck drafts and the offline queue.
//!
//! Stores are **opaque byte stores**: they do not interpret the data they
//! hold. Encoding belongs to the caller.
//!
//! ## Available Stores
//!
//! - [`MemoryKeyValueStore`] - For testing and ephemeral sessions
//! - [`FileKeyValueStore`] - For persistent storage, one file per key
//!
//! ## Example
//!
//! ```rust
//! use clipdeck_storage::{KeyValueStore, MemoryKeyValueStore};
//!
//! let store = MemoryKeyValueStore::with_limit(1024);
//! store.set("clipdeck.draft", b"hello").unwrap();
//! assert_eq!(store.quota().unwrap().used_bytes, 5);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::{KeyValueStore, StorageQuota};
pub use error::{StorageError, StorageResult};
pub use file::FileKeyValueStore;
pub use memory::MemoryKeyValueStore;
