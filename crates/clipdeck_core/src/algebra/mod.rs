//! Pure operations producing the next collection state.
//!
//! Nothing here talks to remote storage. Each function validates its input
//! against the given collection and returns an [`Edit`](crate::collection::Edit)
//! that the executor then applies optimistically and persists.

pub mod queue;
pub mod segment;
