//! Kinematic de-bridging.
//!
//! Kinematic bodies have no dynamics of their own, so they must not join two dynamic
//! islands into one. Before the islands are reported, every kinematic in an island being
//! processed is replaced by one proxy node per incident edge, and the islands are rebuilt
//! without it. After the solver has consumed the islands, the proxies are merged back into
//! their source kinematic.

use bevy::log::error;

use crate::{
    data_structures::bit_vec::BitVec,
    graph::{IslandGraph, IslandId, NodeBitmap, NodeFlags, NodeId, RawHandle},
};

use super::{
    detach::island_from_index,
    work_buffers::{KinematicProxies, UpdateWorkBuffers, find_root_island},
};

/// Collects the islands of the nodes in `nodes` into `islands`.
///
/// Kinematics that have been replaced by proxies are not in an island. If `proxies`
/// is given, the islands of their proxies are collected instead.
pub(crate) fn update_islands_to_process(
    graph: &IslandGraph,
    nodes: &BitVec,
    proxies: Option<&KinematicProxies>,
    islands: &mut BitVec,
) {
    for node_index in nodes.ones() {
        let node_id = NodeId(node_index as RawHandle);
        let node = graph.nodes.get(node_id);

        if let Some(island_id) = node.island.get() {
            islands.set(island_id.index());
        } else if node.is_kinematic()
            && let Some(proxies) = proxies
        {
            debug_assert!(proxies.has_proxies(node_id));
            for proxy in proxies.proxies(node_id) {
                let island_id = graph.nodes.get(proxy).island;
                if island_id.is_valid() {
                    islands.set(island_id.index());
                }
            }
        }
    }
}

/// Replaces every kinematic in an island of the process set with one proxy per incident edge.
///
/// The islands that held a kinematic are marked broken so that the rebuild splits them
/// along the kinematic. Kinematics without edges are put back into their island.
/// Returns the number of proxies created.
pub(crate) fn duplicate_kinematic_nodes(
    graph: &mut IslandGraph,
    buffers: &mut UpdateWorkBuffers,
) -> usize {
    buffers.proxies.reset(graph.nodes.capacity());
    buffers.kinematic_nodes.clear();
    buffers.scratch_islands.clear();

    buffers.node_batch.clear();
    buffers.node_batch.extend(
        graph
            .nodes
            .bitmap(NodeBitmap::Kinematic)
            .ones()
            .map(|index| NodeId(index as RawHandle)),
    );

    // Take the kinematics out of the islands being processed.
    for &kinematic in &buffers.node_batch {
        let node = graph.nodes.get_mut(kinematic);
        debug_assert!(node.is_kinematic());
        let Some(island_id) = node.island.get() else {
            continue;
        };
        if buffers.process_islands.get(island_id.index()) {
            node.flags.insert(NodeFlags::DELETED);
            buffers.scratch_islands.set(island_id.index());
            buffers.kinematic_nodes.set(kinematic.index());
        }
    }

    let mut proxy_count = 0;

    for island_index in buffers.scratch_islands.ones() {
        let island_id = island_from_index(island_index);
        graph.remove_deleted_nodes_from_island(island_id);

        let mut next_edge = graph.islands.get(island_id).start_edge;
        while let Some(edge_id) = next_edge.get() {
            next_edge = graph.edges.next_edge(edge_id);

            let nodes = graph.edges.get(edge_id).nodes();
            for (slot, kinematic) in nodes.into_iter().enumerate() {
                if !kinematic.is_valid() || !graph.nodes.get(kinematic).is_kinematic() {
                    continue;
                }
                debug_assert!(buffers.kinematic_nodes.get(kinematic.index()));

                let proxy = graph.nodes.allocate();
                if !proxy.is_valid() {
                    error!(
                        "Exceeded the island manager node limit while duplicating {kinematic}. Its contacts may bridge islands."
                    );
                    continue;
                }
                let node_capacity = graph.nodes.capacity();
                if graph.islands.capacity() < node_capacity {
                    graph.islands.resize(node_capacity);
                }
                buffers.proxies.fit(node_capacity);
                buffers.proxies.push(kinematic, proxy);

                let source = *graph.nodes.get(kinematic);
                let proxy_node = graph.nodes.get_mut(proxy);
                proxy_node.owner = source.owner;
                proxy_node.flags = source.flags.difference(NodeFlags::DELETED);
                graph.add_node_to_island(island_id, proxy);

                let edge = graph.edges.get_mut(edge_id);
                if slot == 0 {
                    edge.node1 = proxy;
                } else {
                    edge.node2 = proxy;
                }
                proxy_count += 1;
            }
        }
    }

    // Kinematics without edges go back into their island. The rest wait for the merge.
    for kinematic_index in buffers.kinematic_nodes.ones() {
        let kinematic = NodeId(kinematic_index as RawHandle);
        let node = graph.nodes.get_mut(kinematic);
        debug_assert!(node.is_deleted());
        node.flags.remove(NodeFlags::DELETED);

        if buffers.proxies.has_proxies(kinematic) {
            node.island = IslandId::INVALID;
        } else {
            let island_id = node.island;
            graph.add_node_to_island(island_id, kinematic);
        }
    }

    buffers.fit(graph.nodes.capacity(), graph.islands.capacity());
    buffers.broken_islands |= &buffers.scratch_islands;

    proxy_count
}

/// Removes every proxy from its island, points the edges back at the source kinematics and
/// joins all islands holding proxies of the same kinematic into one island containing it.
pub(crate) fn merge_kinematic_proxies_back_to_source(
    graph: &mut IslandGraph,
    buffers: &mut UpdateWorkBuffers,
) {
    let node_capacity = graph.nodes.capacity();
    buffers.fit(node_capacity, graph.islands.capacity());
    buffers.graph_start_islands.fill(IslandId::INVALID);
    buffers.graph_next_islands.fill(IslandId::INVALID);
    buffers.scratch_islands.clear();

    for kinematic_index in buffers.kinematic_nodes.ones() {
        let kinematic = NodeId(kinematic_index as RawHandle);
        for proxy in buffers.proxies.proxies(kinematic) {
            let node = graph.nodes.get_mut(proxy);
            node.flags.insert(NodeFlags::DELETED);
            let island_id = node.island;
            debug_assert!(graph.islands.is_live(island_id));
            buffers.graph_start_islands[proxy.index()] = island_id;
            buffers.scratch_islands.set(island_id.index());
        }
    }

    for island_index in buffers.scratch_islands.ones() {
        let island_id = island_from_index(island_index);
        graph.remove_deleted_nodes_from_island(island_id);

        let mut next_edge = graph.islands.get(island_id).start_edge;
        while let Some(edge_id) = next_edge.get() {
            next_edge = graph.edges.next_edge(edge_id);
            let edge = graph.edges.get_mut(edge_id);
            for endpoint in [&mut edge.node1, &mut edge.node2] {
                if let Some(source) = buffers.proxies.source(*endpoint).get() {
                    *endpoint = source;
                }
            }
        }
    }

    for kinematic_index in buffers.kinematic_nodes.ones() {
        let kinematic = NodeId(kinematic_index as RawHandle);
        let first_proxy = buffers.proxies.first_proxy(kinematic);
        if !first_proxy.is_valid() {
            continue;
        }

        let (first_island, _) = find_root_island(
            &buffers.graph_start_islands,
            &buffers.graph_next_islands,
            first_proxy,
        );
        graph.add_node_to_island(first_island, kinematic);

        for proxy in buffers.proxies.proxies(kinematic).skip(1) {
            let (island_id, _) = find_root_island(
                &buffers.graph_start_islands,
                &buffers.graph_next_islands,
                proxy,
            );
            if island_id != first_island && graph.islands.is_live(island_id) {
                graph.set_node_islands_and_join(first_island, island_id);
                buffers.graph_next_islands[island_id.index()] = first_island;
            }
        }
    }

    for kinematic_index in buffers.kinematic_nodes.ones() {
        let kinematic = NodeId(kinematic_index as RawHandle);
        for proxy in buffers.proxies.proxies(kinematic) {
            debug_assert!(graph.nodes.get(proxy).is_deleted());
            graph.nodes.release(proxy);
        }
    }

    buffers.proxies.reset(node_capacity);
    buffers.kinematic_nodes.clear();
}
