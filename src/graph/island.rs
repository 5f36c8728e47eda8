use bevy::{prelude::Entity, reflect::Reflect};

use super::{ArticulationLinkHandle, EdgeId, NodeId};

/// A connected group of nodes and the edges between them.
///
/// The nodes and edges of an island form two intrusive singly linked lists, threaded
/// through the next-node and next-edge arrays of the node and edge managers.
/// The island only stores the head and tail of each list, so two islands can be
/// spliced together in O(1).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Reflect)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Island {
    /// The first node in the island, or [`NodeId::INVALID`] if the island has no nodes.
    pub start_node: NodeId,
    /// The last node in the island.
    pub end_node: NodeId,
    /// The first edge in the island, or [`EdgeId::INVALID`] if the island has no edges.
    pub start_edge: EdgeId,
    /// The last edge in the island.
    pub end_edge: EdgeId,
}

impl Island {
    /// An island with no nodes or edges.
    pub const EMPTY: Self = Self {
        start_node: NodeId::INVALID,
        end_node: NodeId::INVALID,
        start_edge: EdgeId::INVALID,
        end_edge: EdgeId::INVALID,
    };

    /// Returns `true` if the island has no nodes.
    #[inline]
    pub const fn has_no_nodes(&self) -> bool {
        !self.start_node.is_valid()
    }

    /// Returns `true` if the island has no edges.
    #[inline]
    pub const fn has_no_edges(&self) -> bool {
        !self.start_edge.is_valid()
    }
}

impl Default for Island {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// The side table entry for the root link of an articulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Reflect)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ArticulationRoot {
    /// The handle of the root link, used by the articulation solver.
    pub link: ArticulationLinkHandle,
    /// The articulation owning the root link.
    pub owner: Entity,
}

impl Default for ArticulationRoot {
    fn default() -> Self {
        Self {
            link: ArticulationLinkHandle::PLACEHOLDER,
            owner: Entity::PLACEHOLDER,
        }
    }
}
