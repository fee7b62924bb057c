//! Entity records exchanged with the remote service.

use clipdeck_core::{EntityId, Ordered, ProjectSnapshot, QueueItem, Segment};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of remote entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    /// A whole project, saved as a snapshot.
    Project,
    /// A segment.
    Segment,
    /// A queue item.
    QueueItem,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Project => "project",
            Self::Segment => "segment",
            Self::QueueItem => "queue_item",
        };
        f.write_str(name)
    }
}

/// A full entity as sent to or returned by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EntityRecord {
    /// Whole-project snapshot.
    Snapshot(ProjectSnapshot),
    /// A segment.
    Segment(Segment),
    /// A queue item.
    QueueItem(QueueItem),
}

impl EntityRecord {
    /// Kind of the record.
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Snapshot(_) => EntityKind::Project,
            Self::Segment(_) => EntityKind::Segment,
            Self::QueueItem(_) => EntityKind::QueueItem,
        }
    }

    /// Identity of the record.
    #[must_use]
    pub fn id(&self) -> EntityId {
        match self {
            Self::Snapshot(snapshot) => snapshot.project.id,
            Self::Segment(segment) => segment.id,
            Self::QueueItem(item) => item.id,
        }
    }

    /// Overwrites the identity, as the service does on create.
    pub fn set_id(&mut self, id: EntityId) {
        match self {
            Self::Snapshot(snapshot) => snapshot.project.id = id,
            Self::Segment(segment) => segment.id = id,
            Self::QueueItem(item) => item.id = id,
        }
    }
}

/// Partial update for an existing entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EntityPatch {
    /// Only the order index changed.
    Order(u32),
    /// Replace every field.
    Replace(EntityRecord),
}

impl EntityPatch {
    /// Applies the patch to `record`, keeping its identity.
    pub fn apply_to(&self, record: &mut EntityRecord) {
        match self {
            Self::Order(order) => match record {
                EntityRecord::Segment(segment) => segment.set_order(*order),
                EntityRecord::QueueItem(item) => item.set_order(*order),
                EntityRecord::Snapshot(_) => {}
            },
            Self::Replace(next) => {
                let id = record.id();
                *record = next.clone();
                record.set_id(id);
            }
        }
    }
}

/// A collection element the remote service stores one record at a time.
pub trait RemoteEntity: Ordered + PartialEq {
    /// Kind used in remote steps.
    const KIND: EntityKind;

    /// Wraps the entity in a record.
    fn to_record(&self) -> EntityRecord;

    /// Unwraps a record of this kind.
    fn from_record(record: EntityRecord) -> Option<Self>;
}

impl RemoteEntity for Segment {
    const KIND: EntityKind = EntityKind::Segment;

    fn to_record(&self) -> EntityRecord {
        EntityRecord::Segment(self.clone())
    }

    fn from_record(record: EntityRecord) -> Option<Self> {
        match record {
            EntityRecord::Segment(segment) => Some(segment),
            _ => None,
        }
    }
}

impl RemoteEntity for QueueItem {
    const KIND: EntityKind = EntityKind::QueueItem;

    fn to_record(&self) -> EntityRecord {
        EntityRecord::QueueItem(self.clone())
    }

    fn from_record(record: EntityRecord) -> Option<Self> {
        match record {
            EntityRecord::QueueItem(item) => Some(item),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn segment() -> Segment {
        Segment::new(EntityId::new(), "intro", 0.0, 4.0, Utc::now()).unwrap()
    }

    #[test]
    fn record_kind_and_id() {
        let seg = segment();
        let record = seg.to_record();
        assert_eq!(record.kind(), EntityKind::Segment);
        assert_eq!(record.id(), seg.id);
        assert_eq!(Segment::from_record(record.clone()), Some(seg));
        assert_eq!(QueueItem::from_record(record), None);
    }

    #[test]
    fn replace_patch_keeps_identity() {
        let original = segment();
        let mut record = original.to_record();
        let mut edited = segment();
        edited.title = "renamed".into();

        EntityPatch::Replace(edited.to_record()).apply_to(&mut record);
        let result = Segment::from_record(record).unwrap();
        assert_eq!(result.id, original.id);
        assert_eq!(result.title, "renamed");
    }

    #[test]
    fn order_patch() {
        let mut record = segment().to_record();
        EntityPatch::Order(5).apply_to(&mut record);
        assert_eq!(Segment::from_record(record).unwrap().order, 5);
    }

    #[test]
    fn kind_display() {
        assert_eq!(EntityKind::QueueItem.to_string(), "queue_item");
    }
}
