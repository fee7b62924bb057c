//! Single-writer holder of the live collection.

use super::{CollectionChange, Ordered, OrderedCollection};
use crate::error::CoreResult;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// The live, possibly optimistic, state of one ordered collection.
///
/// Readers only ever observe whole collections: every write swaps in a
/// fully computed value under the write lock, so no intermediate,
/// partially shifted state is visible. The lock is never held across an
/// `.await`.
#[derive(Debug)]
pub struct OrderedCollectionStore<T> {
    current: RwLock<OrderedCollection<T>>,
    version: AtomicU64,
}

impl<T: Ordered + PartialEq> OrderedCollectionStore<T> {
    /// Creates a store holding `initial`.
    #[must_use]
    pub fn new(initial: OrderedCollection<T>) -> Self {
        Self {
            current: RwLock::new(initial),
            version: AtomicU64::new(0),
        }
    }

    /// Returns the current collection.
    #[must_use]
    pub fn snapshot(&self) -> OrderedCollection<T> {
        self.current.read().clone()
    }

    /// Number of writes so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    /// Replaces the whole collection.
    pub fn replace(&self, next: OrderedCollection<T>) {
        *self.current.write() = next;
        self.version.fetch_add(1, Ordering::SeqCst);
    }

    /// Applies `change` atomically.
    ///
    /// Returns the collections before and after the change. On error the
    /// store is untouched.
    pub fn apply(
        &self,
        change: &CollectionChange<T>,
    ) -> CoreResult<(OrderedCollection<T>, OrderedCollection<T>)> {
        let mut guard = self.current.write();
        let before = guard.clone();
        let after = change.apply(&before)?;
        *guard = after.clone();
        self.version.fetch_add(1, Ordering::SeqCst);
        Ok((before, after))
    }

    /// Reverts `change` given the collections captured by [`Self::apply`].
    pub fn revert(
        &self,
        change: &CollectionChange<T>,
        before: &OrderedCollection<T>,
        after: &OrderedCollection<T>,
    ) -> OrderedCollection<T> {
        let mut guard = self.current.write();
        let reverted = change.revert_on(before, after, &guard);
        *guard = reverted.clone();
        self.version.fetch_add(1, Ordering::SeqCst);
        reverted
    }

    /// Rewrites items in place with `f`, keeping positions.
    ///
    /// Used to swap placeholder records for authoritative ones.
    pub fn rewrite(&self, mut f: impl FnMut(&mut T)) {
        let mut guard = self.current.write();
        let mut items = guard.as_slice().to_vec();
        items.iter_mut().for_each(&mut f);
        *guard = OrderedCollection::renumbered(items);
        self.version.fetch_add(1, Ordering::SeqCst);
    }
}

impl<T: Ordered + PartialEq> Default for OrderedCollectionStore<T> {
    fn default() -> Self {
        Self::new(OrderedCollection::new())
    }
}
