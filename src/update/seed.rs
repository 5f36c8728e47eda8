//! Seeding created nodes into islands and recycling deleted nodes and edges.

use crate::{
    data_structures::bit_vec::BitVec,
    graph::{EdgeId, IslandGraph, NodeFlags, NodeId},
};

/// Clears the new flag of created nodes and puts those that did not join an edge
/// into an island of their own.
pub(crate) fn process_created_nodes(graph: &mut IslandGraph, created_nodes: &[NodeId]) {
    for &node_id in created_nodes {
        let node = graph.nodes.get_mut(node_id);
        node.flags.remove(NodeFlags::NEW);

        // A node created and removed before the same update is never added.
        if !node.is_deleted() && !node.island.is_valid() {
            graph.add_node_to_new_island(node_id);
        }
    }
}

/// Returns deleted nodes to the pool, along with the root table entries of articulation roots.
pub(crate) fn release_deleted_nodes(
    graph: &mut IslandGraph,
    deleted_nodes: &[NodeId],
    changed_nodes: &mut BitVec,
) {
    for &node_id in deleted_nodes {
        let node = graph.nodes.get(node_id);
        debug_assert!(node.is_deleted());
        if let Some(root) = node.articulation_root() {
            graph.roots.release(root);
        }
        graph.nodes.release(node_id);
        changed_nodes.unset(node_id.index());
    }
}

/// Returns deleted edges to the pool.
pub(crate) fn release_deleted_edges(graph: &mut IslandGraph, deleted_edges: &[EdgeId]) {
    for &edge_id in deleted_edges {
        debug_assert!(graph.edges.get(edge_id).is_removed());
        graph.edges.release(edge_id);
    }
}
