//! Diffing two collection states into remote steps.

use crate::record::{EntityPatch, RemoteEntity};
use crate::step::RemoteStep;
use clipdeck_core::{EntityId, OrderedCollection};
use std::collections::HashMap;

/// Plans the remote calls that turn `before` into `after`.
///
/// Steps come in four groups, each in collection order:
///
/// 1. deletes for ids only in `before`
/// 2. creates for ids only in `after`
/// 3. full replacements for items whose fields changed
/// 4. order-only patches for items that merely moved
///
/// Deletes run first so a merge frees its inputs before the merged
/// record lands, and order patches run last because creates and
/// replacements already carry the final order.
#[must_use]
pub fn plan_steps<T: RemoteEntity>(
    before: &OrderedCollection<T>,
    after: &OrderedCollection<T>,
) -> Vec<RemoteStep> {
    let old: HashMap<EntityId, &T> = before.iter().map(|item| (item.id(), item)).collect();
    let new: HashMap<EntityId, &T> = after.iter().map(|item| (item.id(), item)).collect();

    let mut deletes = Vec::new();
    for item in before.iter() {
        if !new.contains_key(&item.id()) {
            deletes.push(RemoteStep::delete(T::KIND, item.id()));
        }
    }

    let mut creates = Vec::new();
    let mut replaces = Vec::new();
    let mut moves = Vec::new();
    for item in after.iter() {
        match old.get(&item.id()) {
            None => creates.push(RemoteStep::create(item.to_record())),
            Some(previous) if !same_fields(*previous, item) => replaces.push(RemoteStep::update(
                T::KIND,
                item.id(),
                EntityPatch::Replace(item.to_record()),
            )),
            Some(previous) if previous.order() != item.order() => moves.push(RemoteStep::update(
                T::KIND,
                item.id(),
                EntityPatch::Order(item.order()),
            )),
            Some(_) => {}
        }
    }

    deletes
        .into_iter()
        .chain(creates)
        .chain(replaces)
        .chain(moves)
        .collect()
}

fn same_fields<T: RemoteEntity>(a: &T, b: &T) -> bool {
    let mut b = b.clone();
    b.set_order(a.order());
    *a == b
}
