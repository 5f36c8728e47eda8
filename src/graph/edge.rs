use bevy::reflect::Reflect;

use super::{ConstraintId, ContactManagerId, NodeId};

/// The kind of interaction an [`Edge`] represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Reflect)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum EdgeKind {
    /// A potential contact, handled by a narrow phase contact manager.
    ContactManager,
    /// A constraint such as a joint.
    Constraint,
    /// A joint internal to an articulation, solved by the articulation itself.
    Articulation,
}

impl EdgeKind {
    /// The number of edge kinds.
    pub const COUNT: usize = 3;

    /// Returns a dense index for the kind, for per-kind counters.
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Self::ContactManager => 0,
            Self::Constraint => 1,
            Self::Articulation => 2,
        }
    }
}

/// The payload of an [`Edge`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Reflect)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum EdgeInteraction {
    /// A contact pair. The contact manager is `None` until the narrow phase provides one.
    ContactManager(Option<ContactManagerId>),
    /// A constraint. `None` until the constraint is assigned.
    Constraint(Option<ConstraintId>),
    /// An articulation joint.
    Articulation,
}

impl EdgeInteraction {
    /// Returns the empty payload for the given kind.
    #[inline]
    pub const fn empty(kind: EdgeKind) -> Self {
        match kind {
            EdgeKind::ContactManager => Self::ContactManager(None),
            EdgeKind::Constraint => Self::Constraint(None),
            EdgeKind::Articulation => Self::Articulation,
        }
    }

    /// Returns the kind of the payload.
    #[inline]
    pub const fn kind(&self) -> EdgeKind {
        match self {
            Self::ContactManager(_) => EdgeKind::ContactManager,
            Self::Constraint(_) => EdgeKind::Constraint,
            Self::Articulation => EdgeKind::Articulation,
        }
    }
}

/// Flags describing the state of an [`Edge`].
#[repr(transparent)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Reflect)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[reflect(Debug, PartialEq)]
pub struct EdgeFlags(u8);

bitflags::bitflags! {
    impl EdgeFlags: u8 {
        /// Set if the edge links its nodes into the same island.
        const CONNECTED = 1 << 0;
        /// Set if the edge was created since the last update.
        const CREATED = 1 << 1;
        /// Set if the edge has been removed but not yet detached from its island.
        const REMOVED = 1 << 2;
    }
}

/// An edge of the interaction graph between one or two [`Node`](super::Node)s.
///
/// A missing node is stored as [`NodeId::INVALID`] and stands for static geometry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Reflect)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Edge {
    /// The first node, or [`NodeId::INVALID`] for the world.
    pub node1: NodeId,
    /// The second node, or [`NodeId::INVALID`] for the world.
    pub node2: NodeId,
    /// The interaction payload.
    pub interaction: EdgeInteraction,
    /// The state flags.
    pub flags: EdgeFlags,
}

impl Default for Edge {
    fn default() -> Self {
        Self {
            node1: NodeId::INVALID,
            node2: NodeId::INVALID,
            interaction: EdgeInteraction::ContactManager(None),
            flags: EdgeFlags::empty(),
        }
    }
}

impl Edge {
    /// Returns the kind of the edge.
    #[inline]
    pub const fn kind(&self) -> EdgeKind {
        self.interaction.kind()
    }

    /// Returns `true` if the edge is connected.
    #[inline]
    pub const fn is_connected(&self) -> bool {
        self.flags.contains(EdgeFlags::CONNECTED)
    }

    /// Returns `true` if the edge was created since the last update.
    #[inline]
    pub const fn is_created(&self) -> bool {
        self.flags.contains(EdgeFlags::CREATED)
    }

    /// Returns `true` if the edge has been removed.
    #[inline]
    pub const fn is_removed(&self) -> bool {
        self.flags.contains(EdgeFlags::REMOVED)
    }

    /// Returns both endpoints of the edge.
    #[inline]
    pub const fn nodes(&self) -> [NodeId; 2] {
        [self.node1, self.node2]
    }

    /// Returns the contact manager of a contact edge, if one has been assigned.
    #[inline]
    pub const fn contact_manager(&self) -> Option<ContactManagerId> {
        match self.interaction {
            EdgeInteraction::ContactManager(cm) => cm,
            _ => None,
        }
    }

    /// Returns the constraint of a constraint edge, if one has been assigned.
    #[inline]
    pub const fn constraint(&self) -> Option<ConstraintId> {
        match self.interaction {
            EdgeInteraction::Constraint(constraint) => constraint,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_kinds() {
        for kind in [
            EdgeKind::ContactManager,
            EdgeKind::Constraint,
            EdgeKind::Articulation,
        ] {
            assert_eq!(EdgeInteraction::empty(kind).kind(), kind);
        }

        let edge = Edge {
            interaction: EdgeInteraction::ContactManager(Some(ContactManagerId(3))),
            ..Default::default()
        };
        assert_eq!(edge.contact_manager(), Some(ContactManagerId(3)));
        assert_eq!(edge.constraint(), None);
        assert_eq!(edge.nodes(), [NodeId::INVALID; 2]);
    }
}
