//! Project fixtures.
//!
//! Provides ready-made projects with contiguous segments and a queue
//! referencing them, for tests that need realistic state quickly.

use chrono::{DateTime, Utc};
use clipdeck_core::{EntityId, OrderedCollection, Project, ProjectSnapshot, QueueItem, Segment};

/// Length in seconds of every fixture segment.
pub const FIXTURE_SEGMENT_SECONDS: f64 = 10.0;

/// Fixed timestamp used by fixtures so snapshots compare equal.
pub fn fixture_time() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).expect("Valid fixture timestamp")
}

/// A project with segments and a queue.
#[derive(Debug, Clone)]
pub struct ProjectFixture {
    /// The project.
    pub project: Project,
    /// Segments, back to back from zero.
    pub segments: OrderedCollection<Segment>,
    /// Queue items.
    pub queue: OrderedCollection<QueueItem>,
}

impl ProjectFixture {
    /// Creates a project with `segment_count` contiguous segments and an
    /// empty queue.
    pub fn new(segment_count: usize) -> Self {
        let now = fixture_time();
        let project = Project::new("fixture", now);
        let mut segments = OrderedCollection::new();
        for i in 0..segment_count {
            let start = i as f64 * FIXTURE_SEGMENT_SECONDS;
            let segment = Segment::new(
                project.id,
                format!("segment {i}"),
                start,
                start + FIXTURE_SEGMENT_SECONDS,
                now,
            )
            .expect("Valid fixture range");
            segments = segments.push(segment).expect("Fresh fixture id");
        }
        Self {
            project,
            segments,
            queue: OrderedCollection::new(),
        }
    }

    /// Queues the segments at `indexes`, in that order.
    ///
    /// # Panics
    ///
    /// Panics if an index is out of range.
    pub fn with_queue(mut self, indexes: &[usize]) -> Self {
        for index in indexes {
            let item = QueueItem::new(&self.segments.as_slice()[*index], fixture_time());
            self.queue = self.queue.push(item).expect("Fresh fixture id");
        }
        self
    }

    /// Id of the segment at `index`.
    pub fn segment_id(&self, index: usize) -> EntityId {
        self.segments.as_slice()[index].id
    }

    /// Whole-project snapshot.
    pub fn snapshot(&self) -> ProjectSnapshot {
        ProjectSnapshot::capture(&self.project, &self.segments, &self.queue)
    }
}
