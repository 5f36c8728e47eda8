//! Merging islands across newly joined edges.

use crate::graph::{EdgeId, IslandGraph, IslandId, NodeId};

use super::{
    detach::island_from_index,
    work_buffers::{UpdateWorkBuffers, find_root_island},
};

/// Merges the islands of the endpoints of every joined edge and adds the edges to the merged islands.
///
/// Joined nodes that are not in an island yet get one of their own first. All islands touched by
/// a joined edge are collected in the process set of the buffers, which is used as scratch space,
/// and the union is tracked through the union links so that each node is repointed at its final
/// island only once. A broken island merged into another passes its broken mark on to the
/// surviving island.
pub(crate) fn process_joined_edges(
    graph: &mut IslandGraph,
    buffers: &mut UpdateWorkBuffers,
    joined_edges: &[EdgeId],
) {
    buffers.reset_union_links();

    for &edge_id in joined_edges {
        let edge = *graph.edges.get(edge_id);
        if edge.is_removed() {
            continue;
        }
        debug_assert!(edge.is_connected());

        for node_id in edge.nodes() {
            if !node_id.is_valid() {
                continue;
            }
            buffers.changed_nodes.set(node_id.index());

            let mut island_id = graph.nodes.get(node_id).island;
            if !island_id.is_valid() {
                debug_assert!(graph.nodes.get(node_id).is_new());
                island_id = graph.add_node_to_new_island(node_id);
                buffers.fit_islands(graph.islands.capacity());
            }
            buffers.process_islands.set(island_id.index());
        }
    }

    // Thread the nodes of all affected islands into one chain and record their start islands.
    let mut start_node = NodeId::INVALID;
    let mut prev_island = IslandId::INVALID;
    for island_index in buffers.process_islands.ones() {
        let island_id = island_from_index(island_index);
        debug_assert!(graph.islands.is_live(island_id));
        let island = *graph.islands.get(island_id);
        debug_assert!(island.start_node.is_valid());

        match prev_island.get() {
            Some(prev) => {
                let prev_end = graph.islands.get(prev).end_node;
                buffers.graph_next_nodes[prev_end.index()] = island.start_node;
            }
            None => start_node = island.start_node,
        }
        prev_island = island_id;

        let mut next = island.start_node;
        while next.is_valid() {
            let node_island = graph.nodes.get(next).island;
            debug_assert!(node_island.is_valid());
            buffers.graph_next_nodes[next.index()] = graph.nodes.next_node(next);
            buffers.graph_start_islands[next.index()] = node_island;
            buffers.graph_next_islands[node_island.index()] = IslandId::INVALID;
            next = graph.nodes.next_node(next);
        }
    }

    for &edge_id in joined_edges {
        let edge = *graph.edges.get(edge_id);
        if edge.is_removed() {
            continue;
        }

        let (root1, _) = find_root_island(
            &buffers.graph_start_islands,
            &buffers.graph_next_islands,
            edge.node1,
        );
        let (root2, _) = find_root_island(
            &buffers.graph_start_islands,
            &buffers.graph_next_islands,
            edge.node2,
        );

        match (root1.get(), root2.get()) {
            (Some(root1), Some(root2)) => {
                graph.add_edge_to_island(root1, edge_id);
                if root1 != root2 {
                    buffers.graph_next_islands[root2.index()] = root1;
                    graph.join_islands(root1, root2);
                    if buffers.broken_islands.get(root2.index()) {
                        buffers.broken_islands.set(root1.index());
                        buffers.broken_islands.unset(root2.index());
                    }
                }
            }
            (Some(root), None) | (None, Some(root)) => graph.add_edge_to_island(root, edge_id),
            (None, None) => debug_assert!(false, "joined {edge_id} has no endpoints"),
        }
    }

    // Point every visited node at the island its start island was merged into.
    let mut next = start_node;
    while next.is_valid() {
        let (root, _) = find_root_island(
            &buffers.graph_start_islands,
            &buffers.graph_next_islands,
            next,
        );
        graph.nodes.get_mut(next).island = root;
        next = buffers.graph_next_nodes[next.index()];
    }
}
