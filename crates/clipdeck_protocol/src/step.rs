//! Remote steps and placeholder id remapping.

use crate::record::{EntityKind, EntityPatch, EntityRecord};
use clipdeck_core::{EntityId, ProjectSnapshot, QueueItem, Segment};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What one remote call does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RemoteAction {
    /// Create `record`; the service assigns the authoritative id.
    Create {
        /// Record carrying a placeholder id.
        record: EntityRecord,
    },
    /// Patch entity `id`.
    Update {
        /// Target entity.
        id: EntityId,
        /// Patch to apply.
        patch: EntityPatch,
    },
    /// Delete entity `id`.
    Delete {
        /// Target entity.
        id: EntityId,
    },
}

/// One remote call of a mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteStep {
    /// Entity kind the call targets.
    pub kind: EntityKind,
    /// The call.
    pub action: RemoteAction,
}

impl RemoteStep {
    /// A create step.
    #[must_use]
    pub fn create(record: EntityRecord) -> Self {
        Self {
            kind: record.kind(),
            action: RemoteAction::Create { record },
        }
    }

    /// An update step.
    #[must_use]
    pub fn update(kind: EntityKind, id: EntityId, patch: EntityPatch) -> Self {
        Self {
            kind,
            action: RemoteAction::Update { id, patch },
        }
    }

    /// A delete step.
    #[must_use]
    pub fn delete(kind: EntityKind, id: EntityId) -> Self {
        Self {
            kind,
            action: RemoteAction::Delete { id },
        }
    }

    /// Id of the targeted entity.
    #[must_use]
    pub fn target_id(&self) -> EntityId {
        match &self.action {
            RemoteAction::Create { record } => record.id(),
            RemoteAction::Update { id, .. } | RemoteAction::Delete { id } => *id,
        }
    }

    /// Short name used in logs.
    #[must_use]
    pub fn verb(&self) -> &'static str {
        match self.action {
            RemoteAction::Create { .. } => "create",
            RemoteAction::Update { .. } => "update",
            RemoteAction::Delete { .. } => "delete",
        }
    }
}

/// Placeholder → authoritative id mapping.
///
/// Filled from `create` responses and applied to everything that may still
/// mention a placeholder: later steps, queued mutations and local records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRemap {
    ids: BTreeMap<EntityId, EntityId>,
}

impl IdRemap {
    /// Creates an empty mapping.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `placeholder` is now `authoritative`.
    ///
    /// Identity mappings are ignored.
    pub fn insert(&mut self, placeholder: EntityId, authoritative: EntityId) {
        if placeholder != authoritative {
            self.ids.insert(placeholder, authoritative);
        }
    }

    /// Merges another mapping into this one.
    pub fn extend(&mut self, other: &IdRemap) {
        for (from, to) in &other.ids {
            self.insert(*from, *to);
        }
    }

    /// Returns the authoritative id for `id`, or `id` itself.
    #[must_use]
    pub fn resolve(&self, id: EntityId) -> EntityId {
        self.ids.get(&id).copied().unwrap_or(id)
    }

    /// Number of mappings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns true if nothing was remapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Mappings in placeholder order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, EntityId)> + '_ {
        self.ids.iter().map(|(from, to)| (*from, *to))
    }

    fn fix(&self, id: &mut EntityId) {
        *id = self.resolve(*id);
    }
}

/// Values that may reference placeholder ids.
pub trait Remap {
    /// Replaces every placeholder id known to `remap`.
    fn remap(&mut self, remap: &IdRemap);
}

impl Remap for Segment {
    fn remap(&mut self, remap: &IdRemap) {
        remap.fix(&mut self.id);
        remap.fix(&mut self.project_id);
    }
}

impl Remap for QueueItem {
    fn remap(&mut self, remap: &IdRemap) {
        remap.fix(&mut self.id);
        remap.fix(&mut self.project_id);
        remap.fix(&mut self.segment_id);
    }
}

impl Remap for ProjectSnapshot {
    fn remap(&mut self, remap: &IdRemap) {
        remap.fix(&mut self.project.id);
        self.segments.iter_mut().for_each(|s| s.remap(remap));
        self.queue.iter_mut().for_each(|q| q.remap(remap));
    }
}

impl Remap for EntityRecord {
    fn remap(&mut self, remap: &IdRemap) {
        match self {
            Self::Snapshot(snapshot) => snapshot.remap(remap),
            Self::Segment(segment) => segment.remap(remap),
            Self::QueueItem(item) => item.remap(remap),
        }
    }
}

impl Remap for RemoteStep {
    fn remap(&mut self, remap: &IdRemap) {
        match &mut self.action {
            RemoteAction::Create { record } => record.remap(remap),
            RemoteAction::Update { id, patch } => {
                remap.fix(id);
                if let EntityPatch::Replace(record) = patch {
                    record.remap(remap);
                }
            }
            RemoteAction::Delete { id } => remap.fix(id),
        }
    }
}

impl<T: Remap> Remap for Vec<T> {
    fn remap(&mut self, remap: &IdRemap) {
        self.iter_mut().for_each(|item| item.remap(remap));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn remap_rewrites_queue_references() {
        let project = EntityId::new();
        let segment = Segment::new(project, "a", 0.0, 1.0, Utc::now()).unwrap();
        let item = QueueItem::new(&segment, Utc::now());

        let authoritative = EntityId::new();
        let mut remap = IdRemap::new();
        remap.insert(segment.id, authoritative);

        let mut steps = vec![
            RemoteStep::create(EntityRecord::QueueItem(item.clone())),
            RemoteStep::delete(EntityKind::Segment, segment.id),
        ];
        steps.remap(&remap);

        match &steps[0].action {
            RemoteAction::Create {
                record: EntityRecord::QueueItem(q),
            } => {
                assert_eq!(q.segment_id, authoritative);
                assert_eq!(q.id, item.id);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(steps[1].target_id(), authoritative);
    }

    #[test]
    fn identity_mapping_ignored() {
        let id = EntityId::new();
        let mut remap = IdRemap::new();
        remap.insert(id, id);
        assert!(remap.is_empty());
        assert_eq!(remap.resolve(id), id);
    }

    #[test]
    fn extend_merges() {
        let (a, b, c) = (EntityId::new(), EntityId::new(), EntityId::new());
        let mut first = IdRemap::new();
        first.insert(a, b);
        let mut second = IdRemap::new();
        second.insert(c, a);
        first.extend(&second);
        assert_eq!(first.len(), 2);
        assert_eq!(first.resolve(c), a);
    }

    #[test]
    fn step_helpers() {
        let id = EntityId::new();
        let step = RemoteStep::update(EntityKind::QueueItem, id, EntityPatch::Order(2));
        assert_eq!(step.verb(), "update");
        assert_eq!(step.target_id(), id);
    }
}
