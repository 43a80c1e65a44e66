//! Identity and addressing primitives for trait-structured data (spec.md §3).

use core::fmt;

/// Sentinel for "the trait instance itself", as opposed to a sub-property.
pub const ROOT_PROPERTY_PATH_HANDLE: u32 = 0;
/// Sentinel meaning "no path" / "no dictionary overflow in progress".
pub const NULL_PROPERTY_PATH_HANDLE: u32 = u32::MAX;

/// Numeric handle identifying a trait instance within a sink catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct TraitDataHandle(pub u16);

/// Numeric handle into the schema tree for a trait's sub-property.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct PropertyPathHandle(pub u32);

impl PropertyPathHandle {
    pub const ROOT: PropertyPathHandle = PropertyPathHandle(ROOT_PROPERTY_PATH_HANDLE);
    pub const NULL: PropertyPathHandle = PropertyPathHandle(NULL_PROPERTY_PATH_HANDLE);

    pub fn is_root(self) -> bool {
        self.0 == ROOT_PROPERTY_PATH_HANDLE
    }

    pub fn is_null(self) -> bool {
        self.0 == NULL_PROPERTY_PATH_HANDLE
    }
}

/// A `(trait handle, property path)` pair. Equality is purely structural —
/// ancestor/descendant reasoning is a property of the schema engine, which
/// this crate treats as an external collaborator (spec.md §1) exposed
/// through [`crate::sink::SchemaRelation`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct TraitPath {
    pub trait_data_handle: TraitDataHandle,
    pub property_path_handle: PropertyPathHandle,
}

impl TraitPath {
    pub fn new(trait_data_handle: TraitDataHandle, property_path_handle: PropertyPathHandle) -> Self {
        Self {
            trait_data_handle,
            property_path_handle,
        }
    }

    pub fn root(trait_data_handle: TraitDataHandle) -> Self {
        Self::new(trait_data_handle, PropertyPathHandle::ROOT)
    }

    pub fn is_root(&self) -> bool {
        self.property_path_handle.is_root()
    }
}

impl fmt::Display for TraitPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TraitPath({}:{})",
            self.trait_data_handle.0, self.property_path_handle.0
        )
    }
}

/// A schema version range a path may be requested at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VersionRange {
    pub min: u64,
    pub max: u64,
}

impl VersionRange {
    pub fn any() -> Self {
        Self { min: 0, max: u64::MAX }
    }

    pub fn contains(&self, version: u64) -> bool {
        version >= self.min && version <= self.max
    }
}

/// A [`TraitPath`] with a requested schema-version range (spec.md §3).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VersionedTraitPath {
    pub path: TraitPath,
    pub version_range: VersionRange,
}

impl VersionedTraitPath {
    pub fn new(path: TraitPath, version_range: VersionRange) -> Self {
        Self { path, version_range }
    }
}

/// A stable per-instance client identity, used only for logging/audit
/// correlation (spec.md §3: "stable integer id for logging").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub u32);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Client[{}]", self.0)
    }
}

/// Wire-level subscription identifier (spec.md §3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default, serde::Serialize, serde::Deserialize)]
pub struct SubscriptionId(pub u64);
