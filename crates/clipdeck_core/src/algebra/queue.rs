//! Queue operations.

use crate::collection::{CollectionChange, Edit, OrderedCollection};
use crate::entity::EntityId;
use crate::error::{CoreError, CoreResult};
use crate::model::{QueueItem, Segment, SegmentSummary};
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// Appends `segment` to the queue.
pub fn enqueue(
    queue: &OrderedCollection<QueueItem>,
    segment: &Segment,
    now: DateTime<Utc>,
) -> CoreResult<Edit<QueueItem>> {
    Edit::push(queue, QueueItem::new(segment, now))
}

/// Counts one playback of item `id`.
pub fn record_play(
    queue: &OrderedCollection<QueueItem>,
    id: EntityId,
    now: DateTime<Utc>,
) -> CoreResult<Edit<QueueItem>> {
    let mut item = queue.get(id).cloned().ok_or(CoreError::NotFound { id })?;
    item.play_count = item.play_count.saturating_add(1);
    item.last_played_at = Some(now);
    Edit::update(queue, vec![item])
}

/// Points every item referencing one of `old_segments` at `segment`.
///
/// Returns `None` when no item is affected.
pub fn retarget(
    queue: &OrderedCollection<QueueItem>,
    old_segments: &[EntityId],
    segment: &Segment,
) -> CoreResult<Option<Edit<QueueItem>>> {
    let old: HashSet<EntityId> = old_segments.iter().copied().collect();
    let items: Vec<QueueItem> = queue
        .iter()
        .filter(|item| old.contains(&item.segment_id))
        .map(|item| QueueItem {
            segment_id: segment.id,
            segment: SegmentSummary::from(segment),
            ..item.clone()
        })
        .collect();
    if items.is_empty() {
        return Ok(None);
    }
    Edit::update(queue, items).map(Some)
}

/// Refreshes denormalized copies after `segment` was edited.
pub fn refresh(
    queue: &OrderedCollection<QueueItem>,
    segment: &Segment,
) -> CoreResult<Option<Edit<QueueItem>>> {
    retarget(queue, &[segment.id], segment)
}

/// Removes every item referencing `segment_id`.
pub fn drop_segment(
    queue: &OrderedCollection<QueueItem>,
    segment_id: EntityId,
) -> CoreResult<Option<Edit<QueueItem>>> {
    let remove: Vec<EntityId> = queue
        .iter()
        .filter(|item| item.segment_id == segment_id)
        .map(|item| item.id)
        .collect();
    if remove.is_empty() {
        return Ok(None);
    }
    Edit::new(
        queue,
        CollectionChange::Splice {
            remove,
            insert: Vec::new(),
            at: 0,
        },
    )
    .map(Some)
}

/// Empties the queue.
pub fn clear(queue: &OrderedCollection<QueueItem>) -> CoreResult<Option<Edit<QueueItem>>> {
    if queue.is_empty() {
        return Ok(None);
    }
    Edit::new(
        queue,
        CollectionChange::Splice {
            remove: queue.ids(),
            insert: Vec::new(),
            at: 0,
        },
    )
    .map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Vec<Segment>, OrderedCollection<QueueItem>) {
        let now = Utc::now();
        let project = EntityId::new();
        let segments: Vec<Segment> = (0..3)
            .map(|i| Segment::new(project, format!("s{i}"), i as f64, i as f64 + 1.0, now).unwrap())
            .collect();
        let mut queue = OrderedCollection::new();
        for segment in &segments {
            queue = enqueue(&queue, segment, now).unwrap().next;
        }
        (segments, queue)
    }

    #[test]
    fn enqueue_appends_in_order() {
        let (segments, queue) = setup();
        assert_eq!(queue.len(), 3);
        queue.check_order().unwrap();
        assert_eq!(queue.as_slice()[2].segment_id, segments[2].id);
    }

    #[test]
    fn record_play_is_monotonic() {
        let (_, queue) = setup();
        let id = queue.ids()[1];
        let once = record_play(&queue, id, Utc::now()).unwrap().next;
        let twice = record_play(&once, id, Utc::now()).unwrap().next;
        let item = twice.get(id).unwrap();
        assert_eq!(item.play_count, 2);
        assert!(item.last_played_at.is_some());
    }

    #[test]
    fn move_last_to_front() {
        let (_, queue) = setup();
        let [a, b, c]: [EntityId; 3] = queue.ids().try_into().unwrap();
        let next = Edit::move_to(&queue, c, 0).unwrap().next;
        assert_eq!(next.ids(), vec![c, a, b]);
        let orders: Vec<u32> = next.iter().map(|i| i.order).collect();
        assert_eq!(orders, [0, 1, 2]);
    }

    #[test]
    fn retarget_rewrites_references() {
        let (segments, queue) = setup();
        let replacement = Segment::new(segments[0].project_id, "merged", 0.0, 2.0, Utc::now()).unwrap();
        let edit = retarget(&queue, &[segments[0].id, segments[1].id], &replacement)
            .unwrap()
            .unwrap();
        let targets: Vec<EntityId> = edit.next.iter().map(|i| i.segment_id).collect();
        assert_eq!(targets, [replacement.id, replacement.id, segments[2].id]);
        assert_eq!(edit.next.as_slice()[0].segment.title, "merged");

        assert!(retarget(&queue, &[EntityId::new()], &replacement).unwrap().is_none());
    }

    #[test]
    fn drop_segment_removes_references() {
        let (segments, queue) = setup();
        let next = drop_segment(&queue, segments[1].id).unwrap().unwrap().next;
        assert_eq!(next.len(), 2);
        next.check_order().unwrap();
        assert!(drop_segment(&next, segments[1].id).unwrap().is_none());
    }

    #[test]
    fn clear_empties() {
        let (_, queue) = setup();
        assert!(clear(&queue).unwrap().unwrap().next.is_empty());
        assert!(clear(&OrderedCollection::new()).unwrap().is_none());
    }
}
