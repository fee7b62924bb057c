//! Property tests for ordered collections and segment algebra.

use clipdeck_core::algebra::segment;
use clipdeck_core::{EntityId, OrderedCollectionStore, Segment};
use clipdeck_testkit::prelude::*;
use proptest::prelude::*;

proptest! {
    #[test]
    fn orders_stay_contiguous(
        initial in segments_strategy(EntityId::new(), 6),
        ops in collection_ops_strategy(24),
    ) {
        let project_id = EntityId::new();
        let mut current = initial;
        for op in &ops {
            let Some(edit) = op.edit(&current, project_id) else { continue };
            let edit = edit.unwrap();
            prop_assert_eq!(&edit.change.apply(&current).unwrap(), &edit.next);
            current = edit.next;
            current.check_order().unwrap();
            for (index, item) in current.iter().enumerate() {
                prop_assert_eq!(item.order as usize, index);
            }
        }
    }

    #[test]
    fn revert_restores_untouched_store(
        initial in segments_strategy(EntityId::new(), 6),
        op in collection_op_strategy(),
    ) {
        let store = OrderedCollectionStore::new(initial.clone());
        let Some(edit) = op.edit(&initial, EntityId::new()) else { return Ok(()) };
        let edit = edit.unwrap();

        let (before, after) = store.apply(&edit.change).unwrap();
        prop_assert_eq!(&after, &edit.next);
        let reverted = store.revert(&edit.change, &before, &after);
        prop_assert_eq!(&reverted, &initial);
        prop_assert_eq!(store.snapshot(), initial);
    }

    #[test]
    fn revert_keeps_later_insert(
        initial in segments_strategy(EntityId::new(), 6),
        op in collection_op_strategy(),
    ) {
        let project_id = EntityId::new();
        let store = OrderedCollectionStore::new(initial.clone());
        let Some(edit) = op.edit(&initial, project_id) else { return Ok(()) };
        let edit = edit.unwrap();
        let (before, after) = store.apply(&edit.change).unwrap();

        let later = Segment::new(project_id, "later", 5.0, 6.0, fixture_time()).unwrap();
        let later_id = later.id;
        let push = clipdeck_core::Edit::push(&after, later).unwrap();
        store.apply(&push.change).unwrap();

        let reverted = store.revert(&edit.change, &before, &after);
        prop_assert!(reverted.contains(later_id));
        reverted.check_order().unwrap();
        prop_assert_eq!(reverted.len(), initial.len() + 1);
    }

    #[test]
    fn split_then_merge_restores_range(
        count in 1usize..6,
        pick in any::<prop::sample::Index>(),
        fraction in split_fraction_strategy(),
    ) {
        let fixture = ProjectFixture::new(count);
        let index = pick.index(count);
        let original = fixture.segments.as_slice()[index].clone();
        let at = original.start_time + fraction * original.duration();
        prop_assume!(original.contains_interior(at));

        let split = segment::split(&fixture.segments, original.id, at, fixture_time()).unwrap();
        prop_assert_eq!(split.next.len(), count + 1);
        let first = split.next.as_slice()[index].clone();
        let second = split.next.as_slice()[index + 1].clone();
        prop_assert_eq!(first.end_time, at);
        prop_assert_eq!(second.start_time, at);

        let merged = segment::merge(&split.next, &[second.id, first.id], fixture_time()).unwrap();
        prop_assert_eq!(merged.next.len(), count);
        let restored = &merged.next.as_slice()[index];
        prop_assert_eq!(restored.start_time, original.start_time);
        prop_assert_eq!(restored.end_time, original.end_time);
        prop_assert_eq!(restored.order, original.order);
        merged.next.check_order().unwrap();
    }
}

#[test]
fn split_at_boundary_is_rejected() {
    let fixture = ProjectFixture::new(2);
    let id = fixture.segment_id(1);
    for at in [10.0, 20.0, 25.0] {
        assert!(segment::split(&fixture.segments, id, at, fixture_time()).is_err());
    }
    assert!(segment::split(&fixture.segments, id, 15.0, fixture_time()).is_ok());
}
