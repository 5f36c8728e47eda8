use bevy::{prelude::Entity, reflect::Reflect};

use super::{ArticulationLinkHandle, ArticulationRootId, IslandId};

/// Flags describing the kind and state of a [`Node`].
#[repr(transparent)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Reflect)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[reflect(Debug, PartialEq)]
pub struct NodeFlags(u8);

bitflags::bitflags! {
    impl NodeFlags: u8 {
        /// Set if the node is a kinematic body. Mutually exclusive with [`ARTICULATED`](Self::ARTICULATED).
        const KINEMATIC = 1 << 0;
        /// Set if the node is a link of an articulation.
        const ARTICULATED = 1 << 1;
        /// Set if the node is the root link of an articulation.
        const ARTICULATED_ROOT = 1 << 2;
        /// Set if the node must not be put to sleep. Keeps its whole island awake.
        const NOT_READY_FOR_SLEEPING = 1 << 3;
        /// Set if the node belonged to a sleeping island at the last update.
        const IN_SLEEPING_ISLAND = 1 << 4;
        /// Set if the node has been removed but not yet detached from its island.
        const DELETED = 1 << 5;
        /// Set if the node was created since the last update.
        const NEW = 1 << 6;
    }
}

/// The owner of a [`Node`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Reflect)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum NodeOwner {
    /// The node has no owner yet.
    #[default]
    None,
    /// A rigid or kinematic body.
    RigidBody(Entity),
    /// A non-root articulation link.
    ArticulationLink(ArticulationLinkHandle),
    /// The root link of an articulation, described by an entry in the articulation root table.
    ArticulationRoot(ArticulationRootId),
}

/// A vertex of the interaction graph.
///
/// Nodes are linked into their island through the parallel next-node array of the
/// [`NodeManager`](super::NodeManager), so the record itself stays small.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Reflect)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Node {
    /// The island containing the node, or [`IslandId::INVALID`] if the node
    /// has not been assigned to an island yet.
    pub island: IslandId,
    /// The owner of the node.
    pub owner: NodeOwner,
    /// The kind and state flags of the node.
    pub flags: NodeFlags,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            island: IslandId::INVALID,
            owner: NodeOwner::None,
            flags: NodeFlags::empty(),
        }
    }
}

impl Node {
    /// Returns `true` if the node is a kinematic body.
    #[inline]
    pub const fn is_kinematic(&self) -> bool {
        self.flags.contains(NodeFlags::KINEMATIC)
    }

    /// Returns `true` if the node is an articulation link, including the root link.
    #[inline]
    pub const fn is_articulated(&self) -> bool {
        self.flags.contains(NodeFlags::ARTICULATED)
    }

    /// Returns `true` if the node is the root link of an articulation.
    #[inline]
    pub const fn is_articulation_root(&self) -> bool {
        self.flags.contains(NodeFlags::ARTICULATED_ROOT)
    }

    /// Returns `true` if the node may be put to sleep.
    #[inline]
    pub const fn is_ready_for_sleeping(&self) -> bool {
        !self.flags.contains(NodeFlags::NOT_READY_FOR_SLEEPING)
    }

    /// Returns `true` if the node belonged to a sleeping island at the last update.
    #[inline]
    pub const fn is_in_sleeping_island(&self) -> bool {
        self.flags.contains(NodeFlags::IN_SLEEPING_ISLAND)
    }

    /// Returns `true` if the node has been removed.
    #[inline]
    pub const fn is_deleted(&self) -> bool {
        self.flags.contains(NodeFlags::DELETED)
    }

    /// Returns `true` if the node was created since the last update.
    #[inline]
    pub const fn is_new(&self) -> bool {
        self.flags.contains(NodeFlags::NEW)
    }

    /// Returns `true` if the node is a free rigid body: neither kinematic nor articulated.
    #[inline]
    pub const fn is_rigid_body(&self) -> bool {
        !self.flags.intersects(NodeFlags::KINEMATIC.union(NodeFlags::ARTICULATED))
    }

    /// Sets or clears the kinematic flag.
    #[inline]
    pub fn set_kinematic(&mut self, is_kinematic: bool) {
        debug_assert!(!self.is_articulated() || !is_kinematic);
        self.flags.set(NodeFlags::KINEMATIC, is_kinematic);
    }

    /// Marks the node as awake and not ready for sleeping.
    #[inline]
    pub fn set_awake(&mut self) {
        self.flags.insert(NodeFlags::NOT_READY_FOR_SLEEPING);
        self.flags.remove(NodeFlags::IN_SLEEPING_ISLAND);
    }

    /// Marks the node as asleep and ready for sleeping.
    #[inline]
    pub fn set_asleep(&mut self) {
        self.flags.insert(NodeFlags::IN_SLEEPING_ISLAND);
        self.flags.remove(NodeFlags::NOT_READY_FOR_SLEEPING);
    }

    /// Returns the rigid body owning the node, if any.
    #[inline]
    pub const fn rigid_body(&self) -> Option<Entity> {
        match self.owner {
            NodeOwner::RigidBody(entity) => Some(entity),
            _ => None,
        }
    }

    /// Returns the articulation root table entry of a root link.
    #[inline]
    pub const fn articulation_root(&self) -> Option<ArticulationRootId> {
        match self.owner {
            NodeOwner::ArticulationRoot(id) => Some(id),
            _ => None,
        }
    }

    /// Returns the link handle of a non-root articulation link.
    #[inline]
    pub const fn articulation_link(&self) -> Option<ArticulationLinkHandle> {
        match self.owner {
            NodeOwner::ArticulationLink(link) => Some(link),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn awake_and_asleep_are_exclusive() {
        let mut node = Node::default();
        assert!(node.is_ready_for_sleeping());
        assert!(!node.is_in_sleeping_island());

        node.set_awake();
        assert!(!node.is_ready_for_sleeping());
        assert!(!node.is_in_sleeping_island());

        node.set_asleep();
        assert!(node.is_ready_for_sleeping());
        assert!(node.is_in_sleeping_island());
    }

    #[test]
    fn rigid_body_classification() {
        let mut node = Node::default();
        assert!(node.is_rigid_body());
        node.set_kinematic(true);
        assert!(!node.is_rigid_body());
        node.set_kinematic(false);
        node.flags.insert(NodeFlags::ARTICULATED);
        assert!(!node.is_rigid_body());
    }
}
