//! Typed arena handles for stacks and resources.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use super::resource_kind::ResourceKind;

/// Marker type for stacks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StackMarker {}

/// Marker type for resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceMarker {}

/// An index into one of the graph's arenas, typed by what it indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArenaId<T> {
    index: usize,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T> ArenaId<T> {
    pub(crate) fn new(index: usize) -> Self {
        ArenaId {
            index,
            _marker: PhantomData,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

impl<T> Display for ArenaId<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "#{}", self.index)
    }
}

/// A stack (deployment group) handle.
pub type StackId = ArenaId<StackMarker>;

/// A resource handle.
pub type ResourceId = ArenaId<ResourceMarker>;

/// The handle callers hold for a resource. Carries the kind so that binders
/// and descriptors can check kinds without consulting the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub id: ResourceId,
    pub kind: ResourceKind,
}

impl ResourceRef {
    pub(crate) fn new(id: ResourceId, kind: ResourceKind) -> Self {
        ResourceRef { id, kind }
    }

    pub fn is(&self, kind: ResourceKind) -> bool {
        self.kind == kind
    }
}

impl Display for ResourceRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}{}", self.kind.as_ref(), self.id)
    }
}
