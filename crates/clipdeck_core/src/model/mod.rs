//! Domain model: segments, queue items and projects.

mod project;
mod queue_item;
mod segment;

pub use project::{Project, ProjectSnapshot, Visibility};
pub use queue_item::{QueueItem, SegmentSummary};
pub use segment::{Segment, SegmentSettings};
