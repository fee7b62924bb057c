//! # Clipdeck Core
//!
//! Data model and pure state algebra for Clipdeck.
//!
//! This crate provides:
//! - Segments, queue items and projects
//! - Ordered collections with contiguous order indices
//! - A single-writer store for optimistic state
//! - Split, merge, duplicate and queue operations
//! - A TTL result cache

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod algebra;
pub mod cache;
pub mod collection;
pub mod config;
mod entity;
mod error;
pub mod model;

pub use cache::{CacheStats, ResultCache};
pub use collection::{CollectionChange, Edit, Ordered, OrderedCollection, OrderedCollectionStore};
pub use config::CacheConfig;
pub use entity::EntityId;
pub use error::{CoreError, CoreResult};
pub use model::{
    Project, ProjectSnapshot, QueueItem, Segment, SegmentSettings, SegmentSummary, Visibility,
};
