//! # Clipdeck Testkit
//!
//! Test utilities for Clipdeck.
//!
//! This crate provides:
//! - Project fixtures with contiguous segments and a queue
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use clipdeck_testkit::prelude::*;
//!
//! #[test]
//! fn split_keeps_order() {
//!     let fixture = ProjectFixture::new(3).with_queue(&[0, 2]);
//!     let snapshot = fixture.snapshot();
//!     // ... test operations
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
