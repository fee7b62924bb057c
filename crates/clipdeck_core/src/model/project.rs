//! Projects and whole-project snapshots.

use crate::collection::{Ordered, OrderedCollection};
use crate::entity::EntityId;
use crate::error::{CoreError, CoreResult};
use crate::model::{QueueItem, Segment};
use chrono::{DateTime, Utc};
use clipdeck_codec::Fingerprint;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Who can see a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Visibility {
    /// Owner only.
    #[default]
    Private,
    /// Anyone with the link.
    Unlisted,
    /// Listed publicly.
    Public,
}

/// Project metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Project identity.
    pub id: EntityId,
    /// Display name.
    pub name: String,
    /// Visibility.
    pub visibility: Visibility,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// Creates a private project.
    pub fn new(name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: EntityId::new(),
            name: name.into(),
            visibility: Visibility::Private,
            created_at: now,
            updated_at: now,
        }
    }
}

/// The whole state of one project, as saved by auto-save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    /// Project metadata.
    pub project: Project,
    /// Segments in order.
    pub segments: Vec<Segment>,
    /// Queue items in order.
    pub queue: Vec<QueueItem>,
}

impl ProjectSnapshot {
    /// Captures the given collections.
    pub fn capture(
        project: &Project,
        segments: &OrderedCollection<Segment>,
        queue: &OrderedCollection<QueueItem>,
    ) -> Self {
        Self {
            project: project.clone(),
            segments: segments.as_slice().to_vec(),
            queue: queue.as_slice().to_vec(),
        }
    }

    /// Checks every structural invariant of the snapshot.
    ///
    /// - both collections have contiguous, unique order values
    /// - every segment has a valid time range and belongs to the project
    /// - every queue item references a segment in the snapshot
    pub fn validate(&self) -> CoreResult<()> {
        check_contiguous(&self.segments, "segment")?;
        check_contiguous(&self.queue, "queue item")?;

        let mut segment_ids = HashSet::with_capacity(self.segments.len());
        for segment in &self.segments {
            Segment::validate_range(segment.start_time, segment.end_time)?;
            if segment.project_id != self.project.id {
                return Err(CoreError::invalid_argument(format!(
                    "segment {} belongs to project {}",
                    segment.id, segment.project_id
                )));
            }
            segment_ids.insert(segment.id);
        }

        for item in &self.queue {
            if !segment_ids.contains(&item.segment_id) {
                return Err(CoreError::invalid_argument(format!(
                    "queue item {} references missing segment {}",
                    item.id, item.segment_id
                )));
            }
        }

        Ok(())
    }

    /// Encodes the snapshot, returning its fingerprint and encoded bytes.
    pub fn fingerprint(&self) -> CoreResult<(Fingerprint, Vec<u8>)> {
        Ok(clipdeck_codec::fingerprint(self)?)
    }
}

fn check_contiguous<T: Ordered>(items: &[T], what: &str) -> CoreResult<()> {
    let mut seen = vec![false; items.len()];
    for item in items {
        let order = item.order() as usize;
        match seen.get_mut(order) {
            Some(slot) if !*slot => *slot = true,
            Some(_) => {
                return Err(CoreError::invalid_argument(format!(
                    "duplicate {what} order {order}"
                )))
            }
            None => {
                return Err(CoreError::invalid_argument(format!(
                    "{what} order {order} out of range for {} items",
                    items.len()
                )))
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_with(count: usize) -> ProjectSnapshot {
        let now = Utc::now();
        let project = Project::new("demo", now);
        let mut segments = OrderedCollection::new();
        for i in 0..count {
            let start = i as f64 * 10.0;
            let segment = Segment::new(project.id, format!("s{i}"), start, start + 5.0, now).unwrap();
            segments = segments.push(segment).unwrap();
        }
        let mut queue = OrderedCollection::new();
        if let Some(first) = segments.as_slice().first() {
            queue = queue.push(QueueItem::new(first, now)).unwrap();
        }
        ProjectSnapshot::capture(&project, &segments, &queue)
    }

    #[test]
    fn valid_snapshot_passes() {
        snapshot_with(3).validate().unwrap();
    }

    #[test]
    fn gap_in_order_is_rejected() {
        let mut snapshot = snapshot_with(3);
        snapshot.segments[2].order = 5;
        assert!(snapshot.validate().is_err());
    }

    #[test]
    fn duplicate_order_is_rejected() {
        let mut snapshot = snapshot_with(3);
        snapshot.segments[1].order = 0;
        assert!(snapshot.validate().is_err());
    }

    #[test]
    fn dangling_queue_reference_is_rejected() {
        let mut snapshot = snapshot_with(2);
        snapshot.queue[0].segment_id = EntityId::new();
        assert!(snapshot.validate().is_err());
    }

    #[test]
    fn fingerprint_tracks_structure() {
        let snapshot = snapshot_with(2);
        let (a, bytes) = snapshot.fingerprint().unwrap();
        assert_eq!(Fingerprint::of_bytes(&bytes), a);

        let same = snapshot.clone();
        assert_eq!(same.fingerprint().unwrap().0, a);

        let mut changed = snapshot;
        changed.segments[0].title.push('!');
        assert_ne!(changed.fingerprint().unwrap().0, a);
    }
}
