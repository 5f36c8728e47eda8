//! Detaching deleted nodes and broken or deleted edges from their islands.

use crate::{
    data_structures::bit_vec::BitVec,
    graph::{EdgeFlags, EdgeId, IslandGraph, NodeId},
};

use super::work_buffers::KinematicProxies;

/// Unlinks deleted nodes from their islands.
///
/// `touched_islands` is scratch space. Islands left without nodes are added to `empty_islands`.
pub(crate) fn remove_deleted_nodes_from_islands(
    graph: &mut IslandGraph,
    deleted_nodes: &[NodeId],
    touched_islands: &mut BitVec,
    empty_islands: &mut BitVec,
) {
    touched_islands.clear();

    for &node_id in deleted_nodes {
        let node = graph.nodes.get(node_id);
        debug_assert!(node.is_deleted());

        // New nodes were never added to an island.
        if !node.is_new() && node.island.is_valid() {
            touched_islands.set(node.island.index());
        }
    }

    for island_index in touched_islands.ones() {
        let island_id = island_from_index(island_index);
        graph.remove_deleted_nodes_from_island(island_id);
        if !graph.islands.get(island_id).end_node.is_valid() {
            empty_islands.set(island_index);
        }
    }
}

/// Unlinks broken edges and connected deleted edges from their islands, marking the
/// islands they leave in `broken_islands`.
///
/// The endpoints of the edges are marked in `changed_nodes` if given. If `proxies` is given,
/// endpoints that are kinematic proxies mark the island of the proxy and are then pointed
/// back at their source kinematic.
pub(crate) fn remove_broken_edges_from_islands(
    graph: &mut IslandGraph,
    broken_edges: &[EdgeId],
    deleted_edges: &[EdgeId],
    proxies: Option<&KinematicProxies>,
    mut changed_nodes: Option<&mut BitVec>,
    broken_islands: &mut BitVec,
) {
    for &edge_id in broken_edges {
        let [node1, node2] = graph.edges.get(edge_id).nodes();
        let mut remapped = [node1, node2];

        for (slot, node_id) in [node1, node2].into_iter().enumerate() {
            if !node_id.is_valid() {
                continue;
            }
            if let Some(changed) = changed_nodes.as_deref_mut() {
                changed.set(node_id.index());
            }
            let island_id = graph.nodes.get(node_id).island;
            if island_id.is_valid() {
                broken_islands.set(island_id.index());
            }
            if let Some(source) = proxies.and_then(|proxies| proxies.source(node_id).get()) {
                remapped[slot] = source;
            }
        }

        let edge = graph.edges.get_mut(edge_id);
        edge.node1 = remapped[0];
        edge.node2 = remapped[1];
    }

    for &edge_id in deleted_edges {
        let edge = graph.edges.get_mut(edge_id);
        debug_assert!(edge.is_removed());
        if !edge.is_connected() {
            continue;
        }
        edge.flags.remove(EdgeFlags::CONNECTED);

        for node_id in edge.nodes() {
            if !node_id.is_valid() {
                continue;
            }
            if let Some(changed) = changed_nodes.as_deref_mut() {
                changed.set(node_id.index());
            }
            let island_id = graph.nodes.get(node_id).island;
            if island_id.is_valid() {
                broken_islands.set(island_id.index());
            }
        }
    }

    for island_index in broken_islands.ones() {
        let island_id = island_from_index(island_index);
        // Islands released earlier in the pass may still be marked.
        if graph.islands.is_live(island_id) {
            graph.remove_unconnected_edges_from_island(island_id);
        }
    }
}

/// Releases the islands left without nodes and drops them from `broken_islands`.
pub(crate) fn release_empty_islands(
    graph: &mut IslandGraph,
    empty_islands: &BitVec,
    broken_islands: &mut BitVec,
) {
    for island_index in empty_islands.ones() {
        let island_id = island_from_index(island_index);
        debug_assert!(graph.islands.get(island_id).has_no_nodes());
        // The edges of an island without nodes all lost an endpoint and have been unlinked.
        debug_assert!(graph.islands.get(island_id).has_no_edges());
        graph.islands.release_island(island_id);
        broken_islands.unset(island_index);
    }
}

#[inline]
pub(crate) fn island_from_index(index: usize) -> crate::graph::IslandId {
    crate::graph::IslandId(index as crate::graph::RawHandle)
}
