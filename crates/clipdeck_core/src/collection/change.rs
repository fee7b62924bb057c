//! Data descriptions of collection mutations.

use super::{Ordered, OrderedCollection};
use crate::entity::EntityId;
use crate::error::CoreResult;
use std::collections::{HashMap, HashSet};

/// One mutation of an ordered collection.
///
/// A change is plain data so that it can be validated up front, applied to
/// whatever the live collection is at execution time, and reverted later
/// without keeping closures around.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectionChange<T> {
    /// Insert `item` at `index`.
    Insert {
        /// New item.
        item: T,
        /// Target position.
        index: usize,
    },
    /// Remove the item with `id`.
    Remove {
        /// Removed id.
        id: EntityId,
    },
    /// Move the item with `id` to `to`.
    Move {
        /// Moved id.
        id: EntityId,
        /// Target position.
        to: usize,
    },
    /// Reorder to the given permutation.
    Reindex {
        /// Ids in their new order.
        ids: Vec<EntityId>,
    },
    /// Replace items by id, keeping positions.
    Update {
        /// New versions.
        items: Vec<T>,
    },
    /// Remove some items and insert others at one position.
    Splice {
        /// Removed ids.
        remove: Vec<EntityId>,
        /// Inserted items.
        insert: Vec<T>,
        /// Insert position after removals.
        at: usize,
    },
}

impl<T: Ordered + PartialEq> CollectionChange<T> {
    /// Short name used in logs.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Insert { .. } => "insert",
            Self::Remove { .. } => "remove",
            Self::Move { .. } => "move",
            Self::Reindex { .. } => "reindex",
            Self::Update { .. } => "update",
            Self::Splice { .. } => "splice",
        }
    }

    /// Applies the change, failing on any invalid reference.
    pub fn apply(&self, collection: &OrderedCollection<T>) -> CoreResult<OrderedCollection<T>> {
        match self {
            Self::Insert { item, index } => collection.insert_at(item.clone(), *index),
            Self::Remove { id } => collection.remove_by_id(*id),
            Self::Move { id, to } => collection.move_by_id(*id, *to),
            Self::Reindex { ids } => collection.reindex(ids),
            Self::Update { items } => collection.update(items),
            Self::Splice { remove, insert, at } => collection.splice(remove, insert.clone(), *at),
        }
    }

    /// Undoes this change on `current`.
    ///
    /// `before` and `after` are the collections immediately around this
    /// change. If nothing else touched the collection since, `before` is
    /// restored verbatim. Otherwise only this change's own delta is
    /// reverted: ids that have since disappeared are skipped, positions are
    /// clamped, and items that a later change already overwrote are left
    /// alone.
    #[must_use]
    pub fn revert_on(
        &self,
        before: &OrderedCollection<T>,
        after: &OrderedCollection<T>,
        current: &OrderedCollection<T>,
    ) -> OrderedCollection<T> {
        if current == after {
            return before.clone();
        }

        let mut items = current.as_slice().to_vec();
        match self {
            Self::Insert { item, .. } => {
                items.retain(|existing| existing.id() != item.id());
            }
            Self::Remove { id } => {
                restore_removed(&mut items, before, &[*id]);
            }
            Self::Move { id, .. } => {
                if let (Some(from), Some(index)) = (
                    before.position(*id),
                    items.iter().position(|existing| existing.id() == *id),
                ) {
                    let moved = items.remove(index);
                    let to = from.min(items.len());
                    items.insert(to, moved);
                }
            }
            Self::Reindex { .. } => {
                rearrange(&mut items, &before.ids());
            }
            Self::Update { items: written } => {
                for ours in written {
                    let Some(original) = before.get(ours.id()) else {
                        continue;
                    };
                    if let Some(slot) = items.iter_mut().find(|existing| existing.id() == ours.id()) {
                        if same_ignoring_order(slot, ours) {
                            let order = slot.order();
                            *slot = original.clone();
                            slot.set_order(order);
                        }
                    }
                }
            }
            Self::Splice { remove, insert, .. } => {
                let inserted: HashSet<EntityId> = insert.iter().map(Ordered::id).collect();
                items.retain(|existing| !inserted.contains(&existing.id()));
                restore_removed(&mut items, before, remove);
            }
        }

        OrderedCollection::renumbered(items)
    }
}

fn same_ignoring_order<T: Ordered + PartialEq>(a: &T, b: &T) -> bool {
    let mut b = b.clone();
    b.set_order(a.order());
    *a == b
}

/// Reinserts items from `before` that are missing in `items`, at their old
/// positions (ascending, clamped to the current length).
fn restore_removed<T: Ordered>(items: &mut Vec<T>, before: &OrderedCollection<T>, ids: &[EntityId]) {
    let present: HashSet<EntityId> = items.iter().map(Ordered::id).collect();
    let mut missing: Vec<(usize, &T)> = ids
        .iter()
        .filter(|id| !present.contains(*id))
        .filter_map(|id| before.position(*id).map(|pos| (pos, &before.as_slice()[pos])))
        .collect();
    missing.sort_by_key(|(pos, _)| *pos);

    for (pos, item) in missing {
        let at = pos.min(items.len());
        items.insert(at, item.clone());
    }
}

/// Puts the items listed in `preferred` back into that relative order,
/// reusing the slots they currently occupy. Unlisted items stay put.
fn rearrange<T: Ordered>(items: &mut [T], preferred: &[EntityId]) {
    let rank: HashMap<EntityId, usize> = preferred
        .iter()
        .enumerate()
        .map(|(rank, id)| (*id, rank))
        .collect();

    let slots: Vec<usize> = items
        .iter()
        .enumerate()
        .filter(|(_, item)| rank.contains_key(&item.id()))
        .map(|(slot, _)| slot)
        .collect();

    let mut listed: Vec<T> = slots.iter().map(|slot| items[*slot].clone()).collect();
    listed.sort_by_key(|item| rank.get(&item.id()).copied().unwrap_or(usize::MAX));

    for (slot, item) in slots.into_iter().zip(listed) {
        items[slot] = item;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        id: EntityId,
        label: String,
        order: u32,
    }

    impl Ordered for Row {
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

    fn row(label: &str) -> Row {
        Row {
            id: EntityId::new(),
            label: label.into(),
            order: 0,
        }
    }

    fn labels(c: &OrderedCollection<Row>) -> Vec<String> {
        c.iter().map(|r| r.label.clone()).collect()
    }

    fn collection(labels: &[&str]) -> OrderedCollection<Row> {
        OrderedCollection::renumbered(labels.iter().map(|l| row(l)).collect())
    }

    #[test]
    fn revert_without_interference_restores_snapshot() {
        let before = collection(&["a", "b", "c"]);
        let change = CollectionChange::Move {
            id: before.ids()[2],
            to: 0,
        };
        let after = change.apply(&before).unwrap();
        let reverted = change.revert_on(&before, &after, &after);
        assert_eq!(reverted, before);
    }

    #[test]
    fn revert_insert_keeps_concurrent_insert() {
        let before = collection(&["a", "b"]);
        let ours = CollectionChange::Insert {
            item: row("mine"),
            index: 0,
        };
        let after = ours.apply(&before).unwrap();

        let theirs = CollectionChange::Insert {
            item: row("theirs"),
            index: 3,
        };
        let current = theirs.apply(&after).unwrap();

        let reverted = ours.revert_on(&before, &after, &current);
        assert_eq!(labels(&reverted), ["a", "b", "theirs"]);
        reverted.check_order().unwrap();
    }

    #[test]
    fn revert_remove_reinserts_at_old_position() {
        let before = collection(&["a", "b", "c"]);
        let b = before.ids()[1];
        let ours = CollectionChange::Remove { id: b };
        let after = ours.apply(&before).unwrap();
        let current = after.push(row("d")).unwrap();

        let reverted = ours.revert_on(&before, &after, &current);
        assert_eq!(labels(&reverted), ["a", "b", "c", "d"]);
    }

    #[test]
    fn revert_update_skips_superseded_items() {
        let before = collection(&["a", "b"]);
        let a = before.ids()[0];
        let mut first = before.get(a).unwrap().clone();
        first.label = "a1".into();
        let ours = CollectionChange::Update { items: vec![first] };
        let after = ours.apply(&before).unwrap();

        let mut second = after.get(a).unwrap().clone();
        second.label = "a2".into();
        let current = after.update(&[second]).unwrap();

        // A later write superseded ours: last applied wins.
        let reverted = ours.revert_on(&before, &after, &current);
        assert_eq!(labels(&reverted), ["a2", "b"]);
    }

    #[test]
    fn revert_reindex_restores_relative_order() {
        let before = collection(&["a", "b", "c"]);
        let ids = before.ids();
        let ours = CollectionChange::Reindex {
            ids: vec![ids[2], ids[1], ids[0]],
        };
        let after = ours.apply(&before).unwrap();
        let current = after.insert_at(row("x"), 1).unwrap();
        assert_eq!(labels(&current), ["c", "x", "b", "a"]);

        let reverted = ours.revert_on(&before, &after, &current);
        assert_eq!(labels(&reverted), ["a", "x", "b", "c"]);
    }

    #[test]
    fn revert_splice_swaps_back() {
        let before = collection(&["a", "b", "c"]);
        let b = before.ids()[1];
        let ours = CollectionChange::Splice {
            remove: vec![b],
            insert: vec![row("b1"), row("b2")],
            at: 1,
        };
        let after = ours.apply(&before).unwrap();
        let current = after.push(row("z")).unwrap();

        let reverted = ours.revert_on(&before, &after, &current);
        assert_eq!(labels(&reverted), ["a", "b", "c", "z"]);
        reverted.check_order().unwrap();
    }
}
