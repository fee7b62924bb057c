//! Ordered collections with contiguous order indices.
//!
//! An [`OrderedCollection`] is an immutable value: every operation returns a
//! new collection and leaves `self` untouched, so a pre-mutation snapshot can
//! be kept for rollback by simply holding on to the old value.
//!
//! # Invariants
//!
//! For a collection of `N` items, the `order` values are exactly
//! `{0, …, N-1}` and equal each item's position. Every constructor and
//! operation renumbers before returning.

mod change;
mod store;

pub use change::CollectionChange;
pub use store::OrderedCollectionStore;

use crate::entity::EntityId;
use crate::error::{CoreError, CoreResult};
use std::collections::HashSet;

/// An entity with an identity and a position.
pub trait Ordered: Clone {
    /// Returns the entity id.
    fn id(&self) -> EntityId;

    /// Returns the stored order index.
    fn order(&self) -> u32;

    /// Overwrites the stored order index.
    fn set_order(&mut self, order: u32);
}

/// An ordered sequence of entities.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedCollection<T> {
    items: Vec<T>,
}

impl<T> Default for OrderedCollection<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: Ordered> OrderedCollection<T> {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a collection from items in arbitrary order.
    ///
    /// Items are sorted by their stored `order` (stable for ties) and then
    /// renumbered, so gaps from a remote load are closed.
    pub fn from_items(mut items: Vec<T>) -> CoreResult<Self> {
        let mut seen = HashSet::with_capacity(items.len());
        for item in &items {
            if !seen.insert(item.id()) {
                return Err(CoreError::DuplicateId { id: item.id() });
            }
        }
        items.sort_by_key(|item| item.order());
        Ok(Self::renumbered(items))
    }

    /// Wraps items already in position order, renumbering them.
    pub(crate) fn renumbered(mut items: Vec<T>) -> Self {
        for (index, item) in items.iter_mut().enumerate() {
            item.set_order(index as u32);
        }
        Self { items }
    }

    /// Number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the collection has no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items in order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    /// Items in order, as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// Consumes the collection.
    #[must_use]
    pub fn into_vec(self) -> Vec<T> {
        self.items
    }

    /// Ids in order.
    #[must_use]
    pub fn ids(&self) -> Vec<EntityId> {
        self.items.iter().map(Ordered::id).collect()
    }

    /// Position of `id`, if present.
    #[must_use]
    pub fn position(&self, id: EntityId) -> Option<usize> {
        self.items.iter().position(|item| item.id() == id)
    }

    /// Looks up an item by id.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&T> {
        self.items.iter().find(|item| item.id() == id)
    }

    /// Returns true if `id` is present.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.position(id).is_some()
    }

    fn require(&self, id: EntityId) -> CoreResult<usize> {
        self.position(id).ok_or(CoreError::NotFound { id })
    }

    /// Inserts `item` at `index`, shifting items at `>= index` up by one.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `index > len`, `DuplicateId` if the id exists.
    pub fn insert_at(&self, item: T, index: usize) -> CoreResult<Self> {
        if index > self.items.len() {
            return Err(CoreError::invalid_argument(format!(
                "insert index {index} out of range for {} items",
                self.items.len()
            )));
        }
        if self.contains(item.id()) {
            return Err(CoreError::DuplicateId { id: item.id() });
        }
        let mut items = self.items.clone();
        items.insert(index, item);
        Ok(Self::renumbered(items))
    }

    /// Appends `item`.
    pub fn push(&self, item: T) -> CoreResult<Self> {
        self.insert_at(item, self.items.len())
    }

    /// Removes the item with `id`, shifting later items down by one.
    pub fn remove_by_id(&self, id: EntityId) -> CoreResult<Self> {
        let index = self.require(id)?;
        let mut items = self.items.clone();
        items.remove(index);
        Ok(Self::renumbered(items))
    }

    /// Moves the item with `id` so that it ends up at `new_index`.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id, `InvalidArgument` if
    /// `new_index >= len`.
    pub fn move_by_id(&self, id: EntityId, new_index: usize) -> CoreResult<Self> {
        let index = self.require(id)?;
        if new_index >= self.items.len() {
            return Err(CoreError::invalid_argument(format!(
                "move index {new_index} out of range for {} items",
                self.items.len()
            )));
        }
        let mut items = self.items.clone();
        let item = items.remove(index);
        items.insert(new_index, item);
        Ok(Self::renumbered(items))
    }

    /// Reorders the collection to match `ordered_ids`.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` unless `ordered_ids` is a permutation of the
    /// current ids.
    pub fn reindex(&self, ordered_ids: &[EntityId]) -> CoreResult<Self> {
        if ordered_ids.len() != self.items.len() {
            return Err(CoreError::invalid_argument(format!(
                "reindex expects {} ids, got {}",
                self.items.len(),
                ordered_ids.len()
            )));
        }
        let mut seen = HashSet::with_capacity(ordered_ids.len());
        let mut items = Vec::with_capacity(ordered_ids.len());
        for id in ordered_ids {
            if !seen.insert(*id) {
                return Err(CoreError::invalid_argument(format!(
                    "reindex lists {id} twice"
                )));
            }
            let item = self.get(*id).ok_or_else(|| {
                CoreError::invalid_argument(format!("reindex lists unknown id {id}"))
            })?;
            items.push(item.clone());
        }
        Ok(Self::renumbered(items))
    }

    /// Replaces items by id, keeping their positions.
    pub fn update(&self, updated: &[T]) -> CoreResult<Self> {
        let mut items = self.items.clone();
        for item in updated {
            let index = self.require(item.id())?;
            items[index] = item.clone();
        }
        Ok(Self::renumbered(items))
    }

    /// Removes `remove` and inserts `inserted` at `at` in a single step.
    ///
    /// `at` is an index into the collection after the removals.
    pub fn splice(&self, remove: &[EntityId], inserted: Vec<T>, at: usize) -> CoreResult<Self> {
        let mut removing = HashSet::with_capacity(remove.len());
        for id in remove {
            self.require(*id)?;
            if !removing.insert(*id) {
                return Err(CoreError::invalid_argument(format!(
                    "splice removes {id} twice"
                )));
            }
        }

        let mut items: Vec<T> = self
            .items
            .iter()
            .filter(|item| !removing.contains(&item.id()))
            .cloned()
            .collect();

        if at > items.len() {
            return Err(CoreError::invalid_argument(format!(
                "splice index {at} out of range for {} remaining items",
                items.len()
            )));
        }
        for item in &inserted {
            if items.iter().any(|existing| existing.id() == item.id()) {
                return Err(CoreError::DuplicateId { id: item.id() });
            }
        }

        items.splice(at..at, inserted);
        Ok(Self::renumbered(items))
    }

    /// Verifies the contiguous-order invariant.
    pub fn check_order(&self) -> CoreResult<()> {
        for (index, item) in self.items.iter().enumerate() {
            if item.order() as usize != index {
                return Err(CoreError::invalid_argument(format!(
                    "item {} has order {} at position {index}",
                    item.id(),
                    item.order()
                )));
            }
        }
        Ok(())
    }
}

/// A validated change together with the collection it produces.
#[derive(Debug, Clone, PartialEq)]
pub struct Edit<T> {
    /// The change, replayable against the live store.
    pub change: CollectionChange<T>,
    /// The collection after the change.
    pub next: OrderedCollection<T>,
}

impl<T: Ordered + PartialEq> Edit<T> {
    /// Validates `change` against `collection`.
    pub fn new(collection: &OrderedCollection<T>, change: CollectionChange<T>) -> CoreResult<Self> {
        let next = change.apply(collection)?;
        Ok(Self { change, next })
    }

    /// Insert edit.
    pub fn insert(collection: &OrderedCollection<T>, item: T, index: usize) -> CoreResult<Self> {
        Self::new(collection, CollectionChange::Insert { item, index })
    }

    /// Append edit.
    pub fn push(collection: &OrderedCollection<T>, item: T) -> CoreResult<Self> {
        let index = collection.len();
        Self::insert(collection, item, index)
    }

    /// Remove edit.
    pub fn remove(collection: &OrderedCollection<T>, id: EntityId) -> CoreResult<Self> {
        Self::new(collection, CollectionChange::Remove { id })
    }

    /// Move edit.
    pub fn move_to(collection: &OrderedCollection<T>, id: EntityId, to: usize) -> CoreResult<Self> {
        Self::new(collection, CollectionChange::Move { id, to })
    }

    /// Reindex edit.
    pub fn reindex(collection: &OrderedCollection<T>, ids: Vec<EntityId>) -> CoreResult<Self> {
        Self::new(collection, CollectionChange::Reindex { ids })
    }

    /// Update edit.
    pub fn update(collection: &OrderedCollection<T>, items: Vec<T>) -> CoreResult<Self> {
        Self::new(collection, CollectionChange::Update { items })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        id: EntityId,
        name: &'static str,
        order: u32,
    }

    impl Ordered for Item {
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

    fn item(name: &'static str) -> Item {
        Item {
            id: EntityId::new(),
            name,
            order: 99,
        }
    }

    fn names(c: &OrderedCollection<Item>) -> Vec<&'static str> {
        c.iter().map(|i| i.name).collect()
    }

    fn abc() -> (OrderedCollection<Item>, [EntityId; 3]) {
        let (a, b, c) = (item("A"), item("B"), item("C"));
        let ids = [a.id, b.id, c.id];
        let coll = OrderedCollection::new()
            .push(a)
            .unwrap()
            .push(b)
            .unwrap()
            .push(c)
            .unwrap();
        (coll, ids)
    }

    #[test]
    fn insert_shifts_following_items() {
        let (coll, _) = abc();
        let next = coll.insert_at(item("X"), 1).unwrap();
        assert_eq!(names(&next), ["A", "X", "B", "C"]);
        next.check_order().unwrap();
        // Input untouched
        assert_eq!(names(&coll), ["A", "B", "C"]);
    }

    #[test]
    fn insert_rejects_bad_index_and_duplicates() {
        let (coll, _) = abc();
        assert!(matches!(
            coll.insert_at(item("X"), 4),
            Err(CoreError::InvalidArgument { .. })
        ));
        let dup = coll.as_slice()[0].clone();
        assert!(matches!(
            coll.insert_at(dup, 0),
            Err(CoreError::DuplicateId { .. })
        ));
    }

    #[test]
    fn remove_closes_gap() {
        let (coll, [_, b, _]) = abc();
        let next = coll.remove_by_id(b).unwrap();
        assert_eq!(names(&next), ["A", "C"]);
        next.check_order().unwrap();
        assert!(matches!(
            next.remove_by_id(b),
            Err(CoreError::NotFound { .. })
        ));
    }

    #[test]
    fn move_last_to_front() {
        let (coll, [_, _, c]) = abc();
        let next = coll.move_by_id(c, 0).unwrap();
        assert_eq!(names(&next), ["C", "A", "B"]);
        let orders: Vec<u32> = next.iter().map(|i| i.order).collect();
        assert_eq!(orders, [0, 1, 2]);
    }

    #[test]
    fn move_rejects_out_of_range() {
        let (coll, [a, _, _]) = abc();
        assert!(coll.move_by_id(a, 3).is_err());
    }

    #[test]
    fn reindex_requires_permutation() {
        let (coll, [a, b, c]) = abc();
        let next = coll.reindex(&[b, c, a]).unwrap();
        assert_eq!(names(&next), ["B", "C", "A"]);

        assert!(coll.reindex(&[a, b]).is_err());
        assert!(coll.reindex(&[a, a, b]).is_err());
        assert!(coll.reindex(&[a, b, EntityId::new()]).is_err());
    }

    #[test]
    fn splice_replaces_in_place() {
        let (coll, [_, b, _]) = abc();
        let next = coll.splice(&[b], vec![item("B1"), item("B2")], 1).unwrap();
        assert_eq!(names(&next), ["A", "B1", "B2", "C"]);
        next.check_order().unwrap();
    }

    #[test]
    fn from_items_sorts_and_closes_gaps() {
        let mut a = item("A");
        a.order = 7;
        let mut b = item("B");
        b.order = 2;
        let coll = OrderedCollection::from_items(vec![a.clone(), b]).unwrap();
        assert_eq!(names(&coll), ["B", "A"]);
        coll.check_order().unwrap();

        assert!(OrderedCollection::from_items(vec![a.clone(), a]).is_err());
    }

    #[test]
    fn update_keeps_position() {
        let (coll, [_, b, _]) = abc();
        let mut changed = coll.get(b).unwrap().clone();
        changed.name = "B'";
        changed.order = 0;
        let next = coll.update(&[changed]).unwrap();
        assert_eq!(names(&next), ["A", "B'", "C"]);
        next.check_order().unwrap();
    }
}
