//! The two dirty-path stores (Pending/Dispatched) and per-trait-instance
//! bookkeeping that sit underneath the update engine (spec.md §4.G).
//! Reuses [`crate::path_store::PathStore`] rather than a second bespoke
//! container — both stores have the same shape (bounded set of
//! `(TraitPath, flags)`), they just mean different things to the engine.

use crate::ids::{PropertyPathHandle, TraitDataHandle, TraitPath};
use crate::path_store::{PathFlags, PathStore};
use crate::sink::SchemaRelation;
use alloc::vec::Vec;
use core::ops::{Deref, DerefMut};

/// Per-trait-instance state tracked once a trait has ever gone through
/// `SetUpdated` (spec.md §4.G `UpdatableTIContext`).
#[derive(Clone, Copy, Debug)]
pub struct UpdatableTIContext {
    pub trait_data_handle: TraitDataHandle,
    pub is_dirty: bool,
    /// Non-null while a dictionary-valued path is mid-encode across calls
    /// (spec.md §4.G dictionary overflow).
    pub next_dictionary_element_path_handle: PropertyPathHandle,
    /// Set when a notification touched a path overlapping this trait's
    /// in-flight update state (spec.md §4.G `CheckPotentialDataLoss`).
    pub potential_data_loss: bool,
}

impl UpdatableTIContext {
    fn new(trait_data_handle: TraitDataHandle) -> Self {
        Self {
            trait_data_handle,
            is_dirty: false,
            next_dictionary_element_path_handle: PropertyPathHandle::NULL,
            potential_data_loss: false,
        }
    }

    pub fn dictionary_in_progress(&self) -> bool {
        !self.next_dictionary_element_path_handle.is_null()
    }
}

/// Registry of [`UpdatableTIContext`], scanned round-robin from
/// `cur_processing_trait_instance_idx` (spec.md §4.G encoding order). A
/// plain `Vec` with linear scans — the number of updatable trait instances
/// on one subscription is small and this mirrors the original's flat array
/// of trait instance contexts.
#[derive(Clone, Debug, Default)]
pub struct TiContextTable {
    contexts: Vec<UpdatableTIContext>,
}

impl TiContextTable {
    pub fn new() -> Self {
        Self { contexts: Vec::new() }
    }

    pub fn get_or_create(&mut self, handle: TraitDataHandle) -> &mut UpdatableTIContext {
        if let Some(idx) = self.index_of(handle) {
            return &mut self.contexts[idx];
        }
        self.contexts.push(UpdatableTIContext::new(handle));
        self.contexts.last_mut().expect("just pushed")
    }

    fn index_of(&self, handle: TraitDataHandle) -> Option<usize> {
        self.contexts.iter().position(|c| c.trait_data_handle == handle)
    }

    pub fn get(&self, handle: TraitDataHandle) -> Option<&UpdatableTIContext> {
        self.index_of(handle).map(|i| &self.contexts[i])
    }

    pub fn get_mut(&mut self, handle: TraitDataHandle) -> Option<&mut UpdatableTIContext> {
        self.index_of(handle).map(move |i| &mut self.contexts[i])
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    pub fn at(&self, idx: usize) -> Option<&UpdatableTIContext> {
        self.contexts.get(idx)
    }

    pub fn at_mut(&mut self, idx: usize) -> Option<&mut UpdatableTIContext> {
        self.contexts.get_mut(idx)
    }

    /// First dirty trait at or after `start_idx`, wrapping once (spec.md
    /// §4.G: "scanning forward (modulo count) until a dirty trait is
    /// found").
    pub fn next_dirty(&self, start_idx: usize) -> Option<usize> {
        let len = self.contexts.len();
        if len == 0 {
            return None;
        }
        (0..len)
            .map(|i| (start_idx + i) % len)
            .find(|&idx| self.contexts[idx].is_dirty)
    }

    pub fn clear_dirty(&mut self, handle: TraitDataHandle) {
        if let Some(ctx) = self.get_mut(handle) {
            ctx.is_dirty = false;
        }
    }

    pub fn set_potential_data_loss(&mut self, handle: TraitDataHandle) {
        self.get_or_create(handle).potential_data_loss = true;
    }

    pub fn iter(&self) -> impl Iterator<Item = &UpdatableTIContext> {
        self.contexts.iter()
    }
}

/// Mutations the application has requested but that have not yet been sent
/// (spec.md §4.G). Wraps [`PathStore`] and additionally enforces the
/// per-handle collapse invariant on every insert.
#[derive(Clone, Debug, Default)]
pub struct PendingUpdateStore(PathStore);

impl PendingUpdateStore {
    pub fn new() -> Self {
        Self(PathStore::new())
    }

    pub fn inner(&self) -> &PathStore {
        &self.0
    }

    pub fn inner_mut(&mut self) -> &mut PathStore {
        &mut self.0
    }

    /// `AddItemPendingUpdateStore` (spec.md §4.G): add, then collapse
    /// redundant entries for the same trait handle. Returns `false` iff the
    /// store was full — the caller's contract is to log and drop silently.
    pub fn add_item(&mut self, path: TraitPath, flags: PathFlags, schema: &dyn SchemaRelation) -> bool {
        if !self.0.add(path, flags) {
            return false;
        }
        self.collapse(path.trait_data_handle, schema);
        true
    }

    /// First still-pending path for `handle`, removed from the store
    /// (lowest index first, so repeated calls always "restart the scan
    /// from index 0" as new entries can only occupy the lowest free slot).
    pub fn take_next_for_handle(&mut self, handle: TraitDataHandle) -> Option<(TraitPath, PathFlags)> {
        for i in 0..PathStore::CAPACITY {
            if let Some(path) = self.0.path_at(i) {
                if path.trait_data_handle == handle {
                    let flags = self.0.flags_at(i).unwrap_or_else(PathFlags::empty);
                    self.0.remove_at(i);
                    return Some((path, flags));
                }
            }
        }
        None
    }

    fn collapse(&mut self, handle: TraitDataHandle, schema: &dyn SchemaRelation) {
        let members: Vec<usize> = (0..PathStore::CAPACITY)
            .filter(|&i| self.0.path_at(i).map(|p| p.trait_data_handle) == Some(handle))
            .collect();

        if let Some(root_idx) = members
            .iter()
            .copied()
            .find(|&i| self.0.path_at(i).map(|p| p.is_root()).unwrap_or(false))
        {
            let mut merged = self.0.flags_at(root_idx).unwrap_or_else(PathFlags::empty);
            for &i in &members {
                if i == root_idx {
                    continue;
                }
                merged = merged | self.0.flags_at(i).unwrap_or_else(PathFlags::empty);
                self.0.remove_at(i);
            }
            self.0.set_flags_at(root_idx, merged);
            return;
        }

        let snapshot: Vec<(usize, TraitPath)> = members
            .into_iter()
            .filter_map(|i| self.0.path_at(i).map(|p| (i, p)))
            .collect();
        for &(i, pi) in &snapshot {
            if !self.0.is_valid(i) {
                continue;
            }
            for &(j, pj) in &snapshot {
                if i == j || !self.0.is_valid(j) {
                    continue;
                }
                if pi.property_path_handle != pj.property_path_handle
                    && schema.is_ancestor(pi.property_path_handle, pj.property_path_handle)
                {
                    self.0.remove_at(j);
                }
            }
        }
    }
}

impl Deref for PendingUpdateStore {
    type Target = PathStore;
    fn deref(&self) -> &PathStore {
        &self.0
    }
}

impl DerefMut for PendingUpdateStore {
    fn deref_mut(&mut self) -> &mut PathStore {
        &mut self.0
    }
}

/// Mutations already sent, awaiting an `UpdateResponse` (spec.md §4.G). No
/// collapsing here — entries arrive already deduplicated from
/// [`PendingUpdateStore`].
#[derive(Clone, Debug, Default)]
pub struct DispatchedUpdateStore(PathStore);

impl DispatchedUpdateStore {
    pub fn new() -> Self {
        Self(PathStore::new())
    }

    pub fn inner(&self) -> &PathStore {
        &self.0
    }

    pub fn inner_mut(&mut self) -> &mut PathStore {
        &mut self.0
    }
}

impl Deref for DispatchedUpdateStore {
    type Target = PathStore;
    fn deref(&self) -> &PathStore {
        &self.0
    }
}

impl DerefMut for DispatchedUpdateStore {
    fn deref_mut(&mut self) -> &mut PathStore {
        &mut self.0
    }
}

/// Scratch state threaded across successive `FormAndSendUpdate` calls
/// while one trait instance's paths are being drained (spec.md §4.G).
#[derive(Clone, Copy, Debug, Default)]
pub struct UpdateRequestContext {
    pub cur_processing_trait_instance_idx: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::PropertyPathHandle;
    use crate::sink::NoRelationSchema;

    fn path(h: u16, p: u32) -> TraitPath {
        TraitPath::new(TraitDataHandle(h), PropertyPathHandle(p))
    }

    #[test]
    fn root_add_collapses_siblings() {
        let schema = NoRelationSchema::linear_chain();
        let mut store = PendingUpdateStore::new();
        store.add_item(path(1, 5), PathFlags::empty(), &schema);
        store.add_item(path(1, 0), PathFlags::empty(), &schema);
        assert_eq!(store.inner().num_items(), 1);
        assert!(store.inner().contains(path(1, 0)));
    }

    #[test]
    fn ancestor_add_drops_descendant() {
        let schema = NoRelationSchema::linear_chain();
        let mut store = PendingUpdateStore::new();
        store.add_item(path(1, 10), PathFlags::empty(), &schema);
        store.add_item(path(1, 5), PathFlags::empty(), &schema);
        assert_eq!(store.inner().num_items(), 1);
        assert!(store.inner().contains(path(1, 5)));
    }

    #[test]
    fn unrelated_paths_both_survive() {
        let schema = NoRelationSchema::linear_chain();
        let mut store = PendingUpdateStore::new();
        store.add_item(path(1, 5), PathFlags::empty(), &schema);
        store.add_item(path(2, 5), PathFlags::empty(), &schema);
        assert_eq!(store.inner().num_items(), 2);
    }

    #[test]
    fn take_next_for_handle_scans_lowest_index() {
        let schema = NoRelationSchema::linear_chain();
        let mut store = PendingUpdateStore::new();
        store.add_item(path(1, 5), PathFlags::empty(), &schema);
        store.add_item(path(2, 5), PathFlags::empty(), &schema);
        let (p, _) = store.take_next_for_handle(TraitDataHandle(2)).unwrap();
        assert_eq!(p, path(2, 5));
        assert!(store.take_next_for_handle(TraitDataHandle(2)).is_none());
    }

    #[test]
    fn context_table_scans_forward_modulo_count() {
        let mut table = TiContextTable::new();
        table.get_or_create(TraitDataHandle(1));
        table.get_or_create(TraitDataHandle(2));
        table.get_or_create(TraitDataHandle(3)).is_dirty = true;
        assert_eq!(table.next_dirty(1), Some(2));
        assert_eq!(table.next_dirty(0), Some(2));
    }
}
