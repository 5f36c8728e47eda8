//! Rebuilding islands that lost an edge.
//!
//! A broken island is dissolved into one island per node, which are then re-merged along
//! the edges the island still has. The union is tracked through the union links of the
//! work buffers, always hanging the shorter chain below the longer one so that chains
//! stay short without path compression.

use crate::graph::{IslandGraph, IslandId, NodeId};

use super::{
    detach::island_from_index,
    work_buffers::{UpdateWorkBuffers, find_root_island},
};

/// Rebuilds every live island marked in the broken set of the buffers.
///
/// The rebuilt islands are removed from the process set, and the islands they split into
/// are added to it.
pub(crate) fn process_broken_edge_islands(graph: &mut IslandGraph, buffers: &mut UpdateWorkBuffers) {
    buffers.island_batch.clear();
    buffers.island_batch.extend(
        buffers
            .broken_islands
            .ones()
            .map(island_from_index)
            .filter(|&island_id| graph.islands.is_live(island_id)),
    );
    if buffers.island_batch.is_empty() {
        return;
    }

    buffers.reset_union_links();

    for batch_index in 0..buffers.island_batch.len() {
        let island_id = buffers.island_batch[batch_index];
        rebuild_island(graph, buffers, island_id);
    }
}

fn rebuild_island(graph: &mut IslandGraph, buffers: &mut UpdateWorkBuffers, island_id: IslandId) {
    let island = *graph.islands.get(island_id);
    graph.islands.release_island(island_id);
    buffers.process_islands.unset(island_id.index());

    // One island per node.
    let mut next = island.start_node;
    while next.is_valid() {
        let singleton = graph.islands.get_new_island();
        debug_assert!(singleton.is_valid(), "island pool exhausted");
        buffers.fit_islands(graph.islands.capacity());

        buffers.graph_next_nodes[next.index()] = graph.nodes.next_node(next);
        buffers.graph_start_islands[next.index()] = singleton;
        buffers.graph_next_islands[singleton.index()] = IslandId::INVALID;
        next = graph.nodes.next_node(next);
    }

    // Union the singletons along the remaining edges.
    let mut next_edge = island.start_edge;
    while let Some(edge_id) = next_edge.get() {
        next_edge = graph.edges.next_edge(edge_id);

        let edge = graph.edges.get(edge_id);
        debug_assert!(edge.is_connected() && !edge.is_removed());

        let (root1, depth1) = find_root_island(
            &buffers.graph_start_islands,
            &buffers.graph_next_islands,
            edge.node1,
        );
        let (root2, depth2) = find_root_island(
            &buffers.graph_start_islands,
            &buffers.graph_next_islands,
            edge.node2,
        );
        debug_assert!(root1.is_valid() || root2.is_valid());

        if root1.is_valid() && root2.is_valid() && root1 != root2 {
            if depth1 < depth2 {
                buffers.graph_next_islands[root1.index()] = root2;
            } else {
                buffers.graph_next_islands[root2.index()] = root1;
            }
        }
    }

    // Move every node to the root of its singleton.
    let mut next = island.start_node;
    while let Some(node_id) = next.get() {
        next = buffers.graph_next_nodes[node_id.index()];
        let (root, _) = find_root_island(
            &buffers.graph_start_islands,
            &buffers.graph_next_islands,
            node_id,
        );
        graph.add_node_to_island(root, node_id);
    }

    // Release the singletons that were merged away, and process the rest.
    let mut next = island.start_node;
    while let Some(node_id) = next.get() {
        next = buffers.graph_next_nodes[node_id.index()];
        let singleton = buffers.graph_start_islands[node_id.index()];
        if graph.islands.get(singleton).has_no_nodes() {
            debug_assert!(graph.islands.get(singleton).has_no_edges());
            graph.islands.release_island(singleton);
            buffers.process_islands.unset(singleton.index());
        } else {
            buffers.process_islands.set(singleton.index());
        }
    }

    // Every edge follows its nodes.
    let mut next_edge = island.start_edge;
    while let Some(edge_id) = next_edge.get() {
        next_edge = graph.edges.next_edge(edge_id);

        let [node1, node2] = graph.edges.get(edge_id).nodes();
        let owner: NodeId = if node1.is_valid() { node1 } else { node2 };
        let target = graph.nodes.get(owner).island;
        debug_assert!(!node2.is_valid() || graph.nodes.get(node2).island == target);
        graph.add_edge_to_island(target, edge_id);
    }
}
