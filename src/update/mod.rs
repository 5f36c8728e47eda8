//! The island update pipeline.
//!
//! An update consumes the change queues and bitmaps recorded since the last update and
//! brings the islands up to date in a fixed sequence of stages, each of which only touches
//! islands already known to be affected:
//!
//! 1. Collect the nodes whose state changed.
//! 2. [Detach](detach) deleted nodes and broken or deleted edges from their islands,
//!    marking the islands that lost an edge as broken and releasing empty islands.
//! 3. [Merge](merge) islands across joined edges.
//! 4. [Seed](seed) created nodes without edges into islands of their own, and recycle
//!    deleted nodes and edges.
//! 5. [Replace kinematics with proxies](kinematics) in the islands being processed, so that
//!    kinematics never bridge two islands. The islands they were in count as broken.
//! 6. [Rebuild](rebuild) broken islands from their remaining edges.
//! 7. [Report](report) the islands of changed nodes: wake and sleep changes, and the solver
//!    arrays of awake islands.
//!
//! Awake islands with contact pairs that have not been through the narrow phase yet are held
//! back by the first pass. Once the narrow phase has run, the second pass removes the pairs
//! that turned out not to touch, rebuilds the islands they broke, and reports the held back
//! islands. Other edge events recorded between the passes wait for the next update.
//!
//! The proxies stay in place until [`merge_kinematic_proxies_back_to_source`] runs after the
//! solver has consumed the output.

mod detach;
mod kinematics;
mod merge;
mod rebuild;
mod report;
mod seed;
pub(crate) mod work_buffers;

pub(crate) use kinematics::merge_kinematic_proxies_back_to_source;
pub use work_buffers::{KinematicProxies, Proxies, UpdateWorkBuffers};

use crate::{
    changes::{EdgeChangeManager, NodeChangeManager},
    graph::{IslandGraph, NodeBitmap},
    output::IslandOutput,
};

/// The pass an island report belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum UpdatePass {
    First,
    Second,
}

/// Runs the first pass of an update.
///
/// `kinematic_count` is the number of kinematic nodes in the graph.
/// Returns the number of kinematic proxies created.
pub(crate) fn update_islands_main(
    graph: &mut IslandGraph,
    buffers: &mut UpdateWorkBuffers,
    node_changes: &NodeChangeManager,
    edge_changes: &EdgeChangeManager,
    output: &mut IslandOutput,
    kinematic_count: usize,
) -> usize {
    buffers.begin_update(graph.nodes.capacity(), graph.islands.capacity());

    // Nodes with state changes, nodes that keep their island awake, and created nodes.
    // Endpoints of modified edges are added as the edges are processed.
    buffers.changed_nodes |= graph.nodes.bitmap(NodeBitmap::NotReadyForSleepingChange);
    buffers.changed_nodes |= graph.nodes.bitmap(NodeBitmap::KinematicChange);
    buffers.changed_nodes |= graph.nodes.bitmap(NodeBitmap::NotReadyForSleeping);
    for &node_id in node_changes.created_nodes() {
        buffers.changed_nodes.set(node_id.index());
    }

    // Empty islands are only released once the edges are detached too.
    detach::remove_deleted_nodes_from_islands(
        graph,
        node_changes.deleted_nodes(),
        &mut buffers.broken_islands,
        &mut buffers.process_islands,
    );
    buffers.broken_islands.clear();
    detach::remove_broken_edges_from_islands(
        graph,
        edge_changes.broken_edges(),
        edge_changes.deleted_edges(),
        None,
        Some(&mut buffers.changed_nodes),
        &mut buffers.broken_islands,
    );
    detach::release_empty_islands(graph, &buffers.process_islands, &mut buffers.broken_islands);
    buffers.process_islands.clear();

    merge::process_joined_edges(graph, buffers, edge_changes.joined_edges());
    buffers.process_islands.clear();

    seed::process_created_nodes(graph, node_changes.created_nodes());
    seed::release_deleted_nodes(graph, node_changes.deleted_nodes(), &mut buffers.changed_nodes);
    seed::release_deleted_edges(graph, edge_changes.deleted_edges());
    buffers.fit(graph.nodes.capacity(), graph.islands.capacity());

    let mut proxy_count = 0;
    if kinematic_count > 0 {
        // Only kinematics in islands that are about to be reported are replaced.
        kinematics::update_islands_to_process(
            graph,
            &buffers.changed_nodes,
            None,
            &mut buffers.process_islands,
        );
        proxy_count = kinematics::duplicate_kinematic_nodes(graph, buffers);
        buffers.process_islands.clear();
    }

    rebuild::process_broken_edge_islands(graph, buffers);

    kinematics::update_islands_to_process(
        graph,
        &buffers.changed_nodes,
        Some(&buffers.proxies),
        &mut buffers.process_islands,
    );
    report::process_sleeping_islands(
        graph,
        &buffers.process_islands,
        output,
        UpdatePass::First,
    );

    proxy_count
}

/// Runs the second pass of an update over the islands held back by the first pass.
///
/// Only the broken edges of held back islands are handled here. They are the contact pairs
/// the narrow phase found not to be touching. Breaks in islands the first pass already
/// reported stay queued in `edge_changes` for the next update, like any joined edges.
pub(crate) fn update_islands_second_pass_main(
    graph: &mut IslandGraph,
    buffers: &mut UpdateWorkBuffers,
    edge_changes: &mut EdgeChangeManager,
    output: &mut IslandOutput,
) {
    buffers.fit(graph.nodes.capacity(), graph.islands.capacity());

    buffers.process_islands.clear();
    for &island_id in output.deferred_islands() {
        if graph.islands.is_live(island_id) {
            buffers.process_islands.set(island_id.index());
        }
    }

    let mut broken_edges = core::mem::take(&mut buffers.second_pass_breaks);
    broken_edges.clear();
    edge_changes.split_broken_edges(&mut broken_edges, |edge_id| {
        graph.edges.get(edge_id).nodes().into_iter().any(|node_id| {
            node_id.is_valid() && {
                let island_id = graph.nodes.get(node_id).island;
                island_id.is_valid() && buffers.process_islands.get(island_id.index())
            }
        })
    });

    buffers.broken_islands.clear();
    detach::remove_broken_edges_from_islands(
        graph,
        &broken_edges,
        &[],
        Some(&buffers.proxies),
        None,
        &mut buffers.broken_islands,
    );
    buffers.second_pass_breaks = broken_edges;

    rebuild::process_broken_edge_islands(graph, buffers);

    report::process_sleeping_islands(
        graph,
        &buffers.process_islands,
        output,
        UpdatePass::Second,
    );
}
