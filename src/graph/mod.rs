//! The interaction graph: [`Node`]s, [`Edge`]s, and the [`Island`]s they form.
//!
//! Islands own their nodes and edges through intrusive singly linked lists threaded
//! through the next-node and next-edge arrays of the [`NodeManager`] and [`EdgeManager`].
//! The [`IslandGraph`] bundles the pools and provides the list primitives the update
//! pipeline is built from.

mod edge;
mod handles;
mod island;
mod managers;
mod node;

pub use edge::{Edge, EdgeFlags, EdgeInteraction, EdgeKind};
pub use handles::{
    ArticulationLinkHandle, ArticulationRootId, ConstraintId, ContactManagerId, EdgeId, IslandId,
    NodeId, RawHandle,
};
pub use island::{ArticulationRoot, Island};
pub use managers::{ArticulationRootManager, EdgeManager, IslandPool, NodeBitmap, NodeManager};
pub use node::{Node, NodeFlags, NodeOwner};

/// The pools of the interaction graph.
#[derive(Clone, Debug, Default)]
pub struct IslandGraph {
    /// The nodes, their island links and bitmaps.
    pub nodes: NodeManager,
    /// The edges and their island links.
    pub edges: EdgeManager,
    /// The islands.
    pub islands: IslandPool,
    /// The side table of articulation roots.
    pub roots: ArticulationRootManager,
}

impl IslandGraph {
    /// Appends a node to the node list of an island and points the node at the island.
    pub fn add_node_to_island(&mut self, island_id: IslandId, node_id: NodeId) {
        debug_assert!(self.islands.is_live(island_id));
        self.nodes.next_node_ids[node_id.index()] = NodeId::INVALID;

        let island = self.islands.get_mut(island_id);
        if island.end_node.is_valid() {
            self.nodes.next_node_ids[island.end_node.index()] = node_id;
        } else {
            island.start_node = node_id;
        }
        island.end_node = node_id;

        self.nodes.get_mut(node_id).island = island_id;
    }

    /// Appends an edge to the edge list of an island.
    pub fn add_edge_to_island(&mut self, island_id: IslandId, edge_id: EdgeId) {
        debug_assert!(self.islands.is_live(island_id));
        self.edges.next_edge_ids[edge_id.index()] = EdgeId::INVALID;

        let island = self.islands.get_mut(island_id);
        if island.end_edge.is_valid() {
            self.edges.next_edge_ids[island.end_edge.index()] = edge_id;
        } else {
            island.start_edge = edge_id;
        }
        island.end_edge = edge_id;
    }

    /// Creates a new island containing only the given node.
    pub fn add_node_to_new_island(&mut self, node_id: NodeId) -> IslandId {
        let island_id = self.islands.get_new_island();
        debug_assert!(island_id.is_valid(), "island pool exhausted");
        self.add_node_to_island(island_id, node_id);
        island_id
    }

    /// Splices the node and edge lists of `other` onto the end of `root` and releases `other`.
    ///
    /// The island handles of the moved nodes are left untouched. The caller is expected
    /// to repoint them at `root`.
    pub fn join_islands(&mut self, root_id: IslandId, other_id: IslandId) {
        debug_assert_ne!(root_id, other_id);
        let other = *self.islands.get(other_id);
        let root = self.islands.get_mut(root_id);

        if other.start_node.is_valid() {
            if root.end_node.is_valid() {
                self.nodes.next_node_ids[root.end_node.index()] = other.start_node;
            } else {
                root.start_node = other.start_node;
            }
            root.end_node = other.end_node;
        }

        if other.start_edge.is_valid() {
            if root.end_edge.is_valid() {
                self.edges.next_edge_ids[root.end_edge.index()] = other.start_edge;
            } else {
                root.start_edge = other.start_edge;
            }
            root.end_edge = other.end_edge;
        }

        self.islands.release_island(other_id);
    }

    /// Points the nodes of `other` at `root`, then joins `other` into `root`.
    pub fn set_node_islands_and_join(&mut self, root_id: IslandId, other_id: IslandId) {
        let mut next = self.islands.get(other_id).start_node;
        while let Some(node_id) = next.get() {
            self.nodes.get_mut(node_id).island = root_id;
            next = self.nodes.next_node(node_id);
        }
        self.join_islands(root_id, other_id);
    }

    /// Unlinks all deleted nodes from the node list of an island and recomputes its tail.
    pub fn remove_deleted_nodes_from_island(&mut self, island_id: IslandId) {
        let mut start = self.islands.get(island_id).start_node;

        // Deleted nodes at the head of the list.
        while start.is_valid() && self.nodes.get(start).is_deleted() {
            let removed = start;
            start = self.nodes.next_node(removed);
            self.nodes.next_node_ids[removed.index()] = NodeId::INVALID;
        }

        let mut end = start;
        let mut kept = start;
        while kept.is_valid() {
            let mut next = self.nodes.next_node(kept);
            while next.is_valid() && self.nodes.get(next).is_deleted() {
                let removed = next;
                next = self.nodes.next_node(removed);
                self.nodes.next_node_ids[removed.index()] = NodeId::INVALID;
            }
            self.nodes.next_node_ids[kept.index()] = next;
            end = kept;
            kept = next;
        }

        let island = self.islands.get_mut(island_id);
        island.start_node = start;
        island.end_node = end;
    }

    /// Unlinks all edges that are no longer connected from the edge list of an island
    /// and recomputes its tail.
    pub fn remove_unconnected_edges_from_island(&mut self, island_id: IslandId) {
        let mut start = self.islands.get(island_id).start_edge;

        while start.is_valid() && !self.edges.get(start).is_connected() {
            let removed = start;
            start = self.edges.next_edge(removed);
            self.edges.next_edge_ids[removed.index()] = EdgeId::INVALID;
        }

        let mut end = start;
        let mut kept = start;
        while kept.is_valid() {
            let mut next = self.edges.next_edge(kept);
            while next.is_valid() && !self.edges.get(next).is_connected() {
                let removed = next;
                next = self.edges.next_edge(removed);
                self.edges.next_edge_ids[removed.index()] = EdgeId::INVALID;
            }
            self.edges.next_edge_ids[kept.index()] = next;
            end = kept;
            kept = next;
        }

        let island = self.islands.get_mut(island_id);
        island.start_edge = start;
        island.end_edge = end;
    }

    /// Returns an iterator over the nodes of an island, in list order.
    pub fn island_nodes(&self, island_id: IslandId) -> IslandNodes<'_> {
        IslandNodes {
            nodes: &self.nodes,
            next: self.islands.get(island_id).start_node,
        }
    }

    /// Returns an iterator over the edges of an island, in list order.
    pub fn island_edges(&self, island_id: IslandId) -> IslandEdges<'_> {
        IslandEdges {
            edges: &self.edges,
            next: self.islands.get(island_id).start_edge,
        }
    }

    /// Returns the island of the node, or [`IslandId::INVALID`] for a missing node.
    #[inline]
    pub fn node_island(&self, node_id: NodeId) -> IslandId {
        if node_id.is_valid() {
            self.nodes.get(node_id).island
        } else {
            IslandId::INVALID
        }
    }
}

/// An iterator over the nodes of an [`Island`].
#[derive(Clone)]
pub struct IslandNodes<'a> {
    nodes: &'a NodeManager,
    next: NodeId,
}

impl Iterator for IslandNodes<'_> {
    type Item = NodeId;

    #[inline]
    fn next(&mut self) -> Option<NodeId> {
        let current = self.next.get()?;
        self.next = self.nodes.next_node(current);
        Some(current)
    }
}

/// An iterator over the edges of an [`Island`].
#[derive(Clone)]
pub struct IslandEdges<'a> {
    edges: &'a EdgeManager,
    next: EdgeId,
}

impl Iterator for IslandEdges<'_> {
    type Item = EdgeId;

    #[inline]
    fn next(&mut self) -> Option<EdgeId> {
        let current = self.next.get()?;
        self.next = self.edges.next_edge(current);
        Some(current)
    }
}
