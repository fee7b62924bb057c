//! Playback queue entries.

use crate::collection::Ordered;
use crate::entity::EntityId;
use crate::model::Segment;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Denormalized copy of the segment fields a queue row displays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentSummary {
    /// Segment title.
    pub title: String,
    /// Segment start in seconds.
    pub start_time: f64,
    /// Segment end in seconds.
    pub end_time: f64,
    /// Segment duration in seconds.
    pub duration: f64,
}

impl From<&Segment> for SegmentSummary {
    fn from(segment: &Segment) -> Self {
        Self {
            title: segment.title.clone(),
            start_time: segment.start_time,
            end_time: segment.end_time,
            duration: segment.duration(),
        }
    }
}

/// A segment placed in the project's playback queue.
///
/// Queue order is its own namespace: it is unrelated to the referenced
/// segment's `order`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    /// Queue item identity.
    pub id: EntityId,
    /// Owning project.
    pub project_id: EntityId,
    /// Referenced segment.
    pub segment_id: EntityId,
    /// Display copy of the referenced segment.
    pub segment: SegmentSummary,
    /// Position within the queue.
    pub order: u32,
    /// Number of times played; never decreases.
    pub play_count: u64,
    /// When the item was queued.
    pub added_at: DateTime<Utc>,
    /// When the item last played.
    pub last_played_at: Option<DateTime<Utc>>,
}

impl QueueItem {
    /// Creates a queue item for `segment`.
    #[must_use]
    pub fn new(segment: &Segment, now: DateTime<Utc>) -> Self {
        Self {
            id: EntityId::new(),
            project_id: segment.project_id,
            segment_id: segment.id,
            segment: SegmentSummary::from(segment),
            order: 0,
            play_count: 0,
            added_at: now,
            last_played_at: None,
        }
    }
}

impl Ordered for QueueItem {
    fn id(&self) -> EntityId {
        self.id
    }

    fn order(&self) -> u32 {
        self.order
    }

    fn set_order(&mut self, order: u32) {
        self.order = order;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_copies_segment_fields() {
        let now = Utc::now();
        let segment = Segment::new(EntityId::new(), "verse", 4.0, 9.5, now).unwrap();
        let item = QueueItem::new(&segment, now);

        assert_eq!(item.segment_id, segment.id);
        assert_eq!(item.project_id, segment.project_id);
        assert_eq!(item.segment.title, "verse");
        assert_eq!(item.segment.duration, 5.5);
        assert_eq!(item.play_count, 0);
        assert!(item.last_played_at.is_none());
    }
}
