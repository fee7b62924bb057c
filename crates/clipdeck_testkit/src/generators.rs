//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random segments, collections and
//! edit sequences that maintain required invariants.

use crate::fixtures::fixture_time;
use clipdeck_core::{CoreResult, Edit, EntityId, OrderedCollection, Segment};
use proptest::prelude::*;
use proptest::sample::Index;

/// Strategy for generating valid segment ranges, in tenths of a second.
pub fn segment_range_strategy() -> impl Strategy<Value = (f64, f64)> {
    (0u32..36_000, 1u32..6_000).prop_map(|(start, len)| {
        (f64::from(start) / 10.0, f64::from(start + len) / 10.0)
    })
}

/// Strategy for generating segments of `project_id`.
pub fn segment_strategy(project_id: EntityId) -> impl Strategy<Value = Segment> {
    (
        segment_range_strategy(),
        prop::string::string_regex("[a-z][a-z ]{0,15}").expect("Invalid regex"),
    )
        .prop_map(move |((start, end), title)| {
            Segment::new(project_id, title, start, end, fixture_time()).expect("Valid range")
        })
}

/// Strategy for generating segment collections of up to `max_len` items.
pub fn segments_strategy(
    project_id: EntityId,
    max_len: usize,
) -> impl Strategy<Value = OrderedCollection<Segment>> {
    prop::collection::vec(segment_strategy(project_id), 0..=max_len).prop_map(|mut items| {
        for (order, item) in items.iter_mut().enumerate() {
            item.order = order as u32;
        }
        OrderedCollection::from_items(items).expect("Fresh ids are unique")
    })
}

/// Strategy for generating a split fraction strictly inside a segment.
pub fn split_fraction_strategy() -> impl Strategy<Value = f64> {
    (1u32..100).prop_map(|percent| f64::from(percent) / 100.0)
}

/// One positional edit of a collection.
///
/// Indexes are resolved against the collection's length when applied, so
/// any sequence of operations is meaningful on any collection.
#[derive(Debug, Clone)]
pub enum CollectionOp {
    /// Insert a fresh segment.
    Insert {
        /// Target position.
        index: Index,
    },
    /// Remove an item.
    Remove {
        /// Removed position.
        index: Index,
    },
    /// Move an item.
    Move {
        /// Source position.
        from: Index,
        /// Target position.
        to: Index,
    },
    /// Reverse the whole collection.
    Reverse,
}

/// Strategy for generating a single collection operation.
pub fn collection_op_strategy() -> impl Strategy<Value = CollectionOp> {
    prop_oneof![
        3 => any::<Index>().prop_map(|index| CollectionOp::Insert { index }),
        2 => any::<Index>().prop_map(|index| CollectionOp::Remove { index }),
        3 => (any::<Index>(), any::<Index>()).prop_map(|(from, to)| CollectionOp::Move { from, to }),
        1 => Just(CollectionOp::Reverse),
    ]
}

/// Strategy for generating a sequence of operations.
pub fn collection_ops_strategy(max_len: usize) -> impl Strategy<Value = Vec<CollectionOp>> {
    prop::collection::vec(collection_op_strategy(), 0..=max_len)
}

impl CollectionOp {
    /// Builds the edit this operation denotes on `segments`.
    ///
    /// Returns `None` for operations that need an item when the collection
    /// is empty.
    pub fn edit(
        &self,
        segments: &OrderedCollection<Segment>,
        project_id: EntityId,
    ) -> Option<CoreResult<Edit<Segment>>> {
        let len = segments.len();
        match self {
            Self::Insert { index } => {
                let segment =
                    Segment::new(project_id, "inserted", 0.0, 1.0, fixture_time()).ok()?;
                Some(Edit::insert(segments, segment, index.index(len + 1)))
            }
            Self::Remove { index } if len > 0 => {
                let id = segments.as_slice()[index.index(len)].id;
                Some(Edit::remove(segments, id))
            }
            Self::Move { from, to } if len > 0 => {
                let id = segments.as_slice()[from.index(len)].id;
                Some(Edit::move_to(segments, id, to.index(len)))
            }
            Self::Reverse => {
                let mut ids = segments.ids();
                ids.reverse();
                Some(Edit::reindex(segments, ids))
            }
            Self::Remove { .. } | Self::Move { .. } => None,
        }
    }
}
