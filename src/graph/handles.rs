//! Dense integer handles for nodes, edges, islands and articulation roots,
//! and the opaque references carried by edges and nodes.

use bevy::reflect::Reflect;
use derive_more::{Display, From};

use crate::data_structures::elem_pool::PoolHandle;

/// The integer type backing all handles.
#[cfg(not(feature = "u16-handles"))]
pub type RawHandle = u32;

/// The integer type backing all handles.
#[cfg(feature = "u16-handles")]
pub type RawHandle = u16;

macro_rules! define_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[repr(transparent)]
        #[derive(Clone, Copy, Debug, Display, PartialEq, Eq, PartialOrd, Ord, Hash, Reflect)]
        #[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
        #[display("{}({})", stringify!($name), _0)]
        pub struct $name(pub RawHandle);

        impl $name {
            /// The sentinel handle, with all bits set.
            pub const INVALID: Self = Self(RawHandle::MAX);

            /// Returns `true` if the handle is not [`INVALID`](Self::INVALID).
            #[inline]
            pub const fn is_valid(self) -> bool {
                self.0 != RawHandle::MAX
            }

            /// Returns the handle as an index.
            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }

            /// Converts the handle into an [`Option`], mapping [`INVALID`](Self::INVALID) to `None`.
            #[inline]
            pub const fn get(self) -> Option<Self> {
                if self.is_valid() { Some(self) } else { None }
            }
        }

        impl Default for $name {
            #[inline]
            fn default() -> Self {
                Self::INVALID
            }
        }

        impl From<Option<$name>> for $name {
            #[inline]
            fn from(value: Option<$name>) -> Self {
                value.unwrap_or(Self::INVALID)
            }
        }

        impl PoolHandle for $name {
            const INVALID: Self = Self::INVALID;

            #[inline]
            fn from_index(index: usize) -> Self {
                debug_assert!(index <= RawHandle::MAX as usize);
                Self(index as RawHandle)
            }

            #[inline]
            fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

define_handle! {
    /// A handle to a node: a rigid body, a kinematic body or an articulation link.
    NodeId
}

define_handle! {
    /// A handle to an edge: a contact manager, a constraint or an articulation joint.
    EdgeId
}

define_handle! {
    /// A handle to an island.
    ///
    /// Island handles are only stable within a single update. Merging and splitting
    /// may retire any handle, and which handle survives a merge is unspecified.
    IslandId
}

define_handle! {
    /// A handle into the side table of articulation roots.
    ArticulationRootId
}

/// An opaque reference to a narrow phase contact manager.
#[derive(Clone, Copy, Debug, Display, From, PartialEq, Eq, Hash, Reflect)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ContactManagerId(pub u32);

/// An opaque reference to a constraint (a joint).
#[derive(Clone, Copy, Debug, Display, From, PartialEq, Eq, Hash, Reflect)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ConstraintId(pub u32);

/// An opaque handle to a link of an articulation, owned by the articulation solver.
#[derive(Clone, Copy, Debug, Display, From, PartialEq, Eq, Hash, Reflect)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ArticulationLinkHandle(pub u32);

impl ArticulationLinkHandle {
    /// A placeholder for links whose handle has not been assigned yet.
    pub const PLACEHOLDER: Self = Self(u32::MAX);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_handles() {
        assert!(!NodeId::INVALID.is_valid());
        assert_eq!(NodeId::default(), NodeId::INVALID);
        assert_eq!(EdgeId(3).get(), Some(EdgeId(3)));
        assert_eq!(IslandId::INVALID.get(), None);
        assert_eq!(NodeId::from(None), NodeId::INVALID);
        assert_eq!(NodeId::from(Some(NodeId(2))), NodeId(2));
    }

    #[test]
    fn display() {
        assert_eq!(NodeId(4).to_string(), "NodeId(4)");
        assert_eq!(ContactManagerId(9).to_string(), "9");
    }
}
