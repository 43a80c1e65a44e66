//! Property coverage for `PathStore` (spec.md §4.A) beyond the fixed-example
//! unit tests already in `src/path_store.rs`: capacity/occupancy invariants
//! and the ancestor relation `includes`/`intersects` actually rely on,
//! driven over randomized sequences of adds and removals.

use proptest::prelude::*;

use wdm_subscription_client::ids::{PropertyPathHandle, TraitDataHandle, TraitPath};
use wdm_subscription_client::path_store::{PathFlags, PathStore};
use wdm_subscription_client::sink::NoRelationSchema;

fn path(h: u16, p: u32) -> TraitPath {
    TraitPath::new(TraitDataHandle(h), PropertyPathHandle(p))
}

fn schema() -> NoRelationSchema {
    NoRelationSchema::linear_chain()
}

#[test]
fn add_never_exceeds_capacity_and_reports_full_exactly_at_it() {
    let mut store = PathStore::new();
    for i in 0..PathStore::CAPACITY {
        assert!(!store.is_full());
        assert!(store.add(path(i as u16, 0), PathFlags::empty()));
    }
    assert!(store.is_full());
    assert!(!store.add(path(9999, 0), PathFlags::empty()));
    assert_eq!(store.num_items(), PathStore::CAPACITY);
}

#[test]
fn clear_resets_to_empty() {
    let mut store = PathStore::new();
    for i in 0..5u16 {
        store.add(path(i, 0), PathFlags::empty());
    }
    store.clear();
    assert!(store.is_empty());
    assert_eq!(store.num_items(), 0);
    assert_eq!(store.iter().count(), 0);
}

#[test]
fn remove_by_handle_drops_every_entry_for_that_handle_only() {
    let mut store = PathStore::new();
    store.add(path(1, 1), PathFlags::empty());
    store.add(path(1, 2), PathFlags::empty());
    store.add(path(2, 1), PathFlags::empty());

    store.remove_by_handle(TraitDataHandle(1));

    assert!(!store.contains_handle(TraitDataHandle(1)));
    assert!(store.contains_handle(TraitDataHandle(2)));
    assert_eq!(store.num_items(), 1);
}

#[test]
fn includes_is_not_symmetric_unlike_intersects() {
    // `includes` requires the resident entry to be the ancestor (or equal);
    // `intersects` accepts either direction. A root-at-0 entry includes a
    // deeper path, but the deeper path does not include the root.
    let schema = schema();
    let mut store = PathStore::new();
    store.add(path(1, 0), PathFlags::empty());

    assert!(store.includes(path(1, 50), &schema));
    assert!(store.intersects(path(1, 50), &schema));

    store.clear();
    store.add(path(1, 50), PathFlags::empty());
    assert!(!store.includes(path(1, 0), &schema));
    assert!(store.intersects(path(1, 0), &schema));
}

proptest! {
    /// `num_items` always equals the number of live (index, path, flags)
    /// triples `iter` yields, across arbitrary add/remove-by-index
    /// sequences (spec.md §3's `PathStore` invariant).
    #[test]
    fn num_items_tracks_iter_count_through_random_mutations(
        ops in prop::collection::vec((0u16..40, prop::bool::ANY), 0..60),
    ) {
        let mut store = PathStore::new();
        for (h, remove) in ops {
            if remove {
                let first_idx = store.iter().next().map(|(idx, _, _)| idx);
                if let Some(idx) = first_idx {
                    store.remove_at(idx);
                }
            } else {
                store.add(path(h, 0), PathFlags::empty());
            }
            prop_assert_eq!(store.num_items(), store.iter().count());
            prop_assert!(store.num_items() <= PathStore::CAPACITY);
        }
    }

    /// `add` never reports success while the store reports `is_full`, and
    /// never reports failure while it doesn't.
    #[test]
    fn add_success_matches_fullness_at_call_time(handles in prop::collection::vec(0u16..200, 0..40)) {
        let mut store = PathStore::new();
        for h in handles {
            let was_full = store.is_full();
            let ok = store.add(path(h, 0), PathFlags::empty());
            prop_assert_eq!(ok, !was_full);
        }
    }

    /// A path always includes itself once resident (reflexivity of the
    /// ancestor-or-equal relation `includes` is defined over).
    #[test]
    fn includes_is_reflexive(handle in 0u16..50, prop_path in 0u32..500) {
        let schema = schema();
        let mut store = PathStore::new();
        store.add(path(handle, prop_path), PathFlags::empty());
        prop_assert!(store.includes(path(handle, prop_path), &schema));
    }
}
