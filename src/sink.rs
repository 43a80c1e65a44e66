//! External collaborator contracts: the trait schema engine and the sink
//! catalog (spec.md §1, §3, §6).
//!
//! The schema engine (path↔tag mapping, ancestor/descendant queries) and the
//! trait-sink catalog are explicitly out of scope for this crate's CORE —
//! they are supplied by the embedder. What lives here is the *capability
//! interface* the client needs from them, following the teacher's Design
//! Notes pattern of "embedded-style polymorphism across sinks" replaced by
//! "a capability interface exposing only the operations the client uses".

use crate::error::ClientError;
use crate::ids::{PropertyPathHandle, TraitDataHandle, TraitPath};
use alloc::boxed::Box;
use alloc::vec::Vec;

/// Ancestor/descendant relation over property paths within one trait's
/// schema tree. An external collaborator (spec.md §1: "the trait schema
/// engine ... path↔tag mapping, parent/child queries").
pub trait SchemaRelation {
    /// `true` iff `a` and `b` are the same path, or one is an ancestor of
    /// the other.
    fn related(&self, a: PropertyPathHandle, b: PropertyPathHandle) -> bool;

    /// `true` iff `ancestor` is a (non-strict) ancestor of `descendant`.
    fn is_ancestor(&self, ancestor: PropertyPathHandle, descendant: PropertyPathHandle) -> bool;
}

/// An opaque payload handed to sinks to decode (the TLV codec itself is out
/// of scope; this crate only threads the bytes through).
pub type EncodedData<'a> = &'a [u8];

/// Capability interface for a read-only trait data sink (spec.md §3, §9).
pub trait TraitDataSink {
    /// Current locally known version of the mirrored trait data.
    fn get_version(&self) -> u64;

    /// Apply a decoded data element to local state. `is_partial` mirrors the
    /// wire element's partial-change flag (spec.md §4.E).
    fn apply_data(
        &mut self,
        path: TraitPath,
        version: u64,
        data: EncodedData<'_>,
        is_partial: bool,
    ) -> Result<(), ClientError>;
}

/// Additional capability required of sinks that can be locally mutated and
/// pushed back to the publisher (spec.md §3 `UpdatableTIContext`, §9).
pub trait TraitUpdatableDataSink: TraitDataSink {
    /// Whether `update_required_version` currently holds a meaningful value
    /// (spec.md §4.G: conditional `SetUpdated` rejects `!is_version_valid()`).
    fn is_version_valid(&self) -> bool;

    /// Record the version a conditional update is predicated on.
    fn set_update_required_version(&mut self, version: u64);

    /// Invalidate the cached `update_required_version` (spec.md §4.G: on
    /// per-path update failure, or once the sink catches up).
    fn clear_version(&mut self);

    /// Read the currently recorded `update_required_version`, if any.
    fn update_required_version(&self) -> Option<u64>;

    /// Whether this sink is the subject of an in-flight conditional
    /// `SetUpdated` (spec.md §4.G: "if the sink is conditional-updating").
    /// Distinct from [`Self::is_version_valid`]/[`Self::update_required_version`]
    /// being set: the original implementation's `IsConditionalUpdate()` is
    /// its own bit, not a derived check on the cached version.
    fn is_conditional_update(&self) -> bool;

    /// Mark the sink as conditional-updating (set alongside the first
    /// `set_update_required_version` call for a conditional `SetUpdated`).
    fn set_conditional_update(&mut self);

    /// Clear the conditional-updating bit, in step with [`Self::clear_version`].
    fn clear_conditional_update(&mut self);
}

/// Broadcastable lifecycle/administrative events a sink may observe
/// (spec.md §4.E step 3/6: `NotifyRequestBegin`/`NotifyRequestEnd`; §4.D:
/// `SubscriptionTerminated`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SinkBroadcastEvent {
    NotifyRequestBegin,
    NotifyRequestEnd,
    SubscriptionTerminated,
}

/// The sink catalog: maps [`TraitDataHandle`] to sink objects and supports
/// bulk operations (spec.md §3, §6). Object-safe so an embedder can store a
/// `Box<dyn SinkCatalog>` inside the client.
pub trait SinkCatalog {
    /// Resolve a handle to a mutable updatable-sink reference, if the trait
    /// instance at that handle supports updates.
    fn locate_updatable(&mut self, handle: TraitDataHandle) -> Option<&mut dyn TraitUpdatableDataSink>;

    /// Resolve a handle to a mutable read-only-sink reference.
    fn locate(&mut self, handle: TraitDataHandle) -> Option<&mut dyn TraitDataSink>;

    /// Resource id of the trait instance, used for schema validation and
    /// logging.
    fn get_resource_id(&self, handle: TraitDataHandle) -> Option<u64>;

    /// Instance id (distinguishes multiple instances of the same trait).
    fn get_instance_id(&self, handle: TraitDataHandle) -> Option<u64>;

    /// All handles currently registered, for iteration during flush/drain.
    fn handles(&self) -> Vec<TraitDataHandle>;

    /// Broadcast a lifecycle event to every sink in the catalog (spec.md
    /// §4.D, §4.E).
    fn dispatch_event(&mut self, event: SinkBroadcastEvent);
}

/// Schema stub used only by this crate's own unit/property tests: relates
/// paths by simple numeric ordering (`parent`'s handle < `child`'s handle),
/// which is sufficient to exercise [`crate::path_store::PathStore`] without
/// pulling in a real schema engine.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRelationSchema;

impl NoRelationSchema {
    pub fn linear_chain() -> Self {
        NoRelationSchema
    }
}

impl SchemaRelation for NoRelationSchema {
    fn related(&self, a: PropertyPathHandle, b: PropertyPathHandle) -> bool {
        a == b || self.is_ancestor(a, b) || self.is_ancestor(b, a)
    }

    fn is_ancestor(&self, ancestor: PropertyPathHandle, descendant: PropertyPathHandle) -> bool {
        ancestor.is_root() || ancestor.0 <= descendant.0
    }
}

pub(crate) type BoxedSinkCatalog = Box<dyn SinkCatalog>;
