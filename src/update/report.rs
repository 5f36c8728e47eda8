//! Reporting sleep state changes and flattening awake islands for the solver.

use bevy::prelude::Entity;

use crate::{
    data_structures::bit_vec::BitVec,
    graph::{
        ArticulationLinkHandle, EdgeInteraction, IslandGraph, IslandId, Node, NodeFlags, NodeId,
    },
    output::{
        IndexedConstraint, IndexedContactManager, InteractionBody, IslandIndices, IslandOutput,
        NarrowPhaseContactManager, SolverArticulation, WakeSleepTarget,
    },
};

use super::{UpdatePass, detach::island_from_index};

/// Walks the islands in `islands_to_process` and reports them.
///
/// An island is asleep if all of its nodes are ready for sleeping. Its nodes that were awake
/// are reported in the sleep list. Otherwise the island is awake: its nodes that were asleep
/// are reported in the wake list, and its bodies, articulations, contact managers and
/// constraints are appended to the solver arrays.
///
/// In the first pass, an awake island with a contact pair that has no contact manager yet is
/// held back from the solver arrays, and the pair is queued for the narrow phase. The second
/// pass reports the held back islands once the narrow phase has run.
pub(crate) fn process_sleeping_islands(
    graph: &mut IslandGraph,
    islands_to_process: &BitVec,
    output: &mut IslandOutput,
    pass: UpdatePass,
) {
    match pass {
        UpdatePass::First => output.clear(),
        UpdatePass::Second => output.clear_wake_sleep(),
    }

    let node_capacity = graph.nodes.capacity();
    if output.solver_body_map.len() < node_capacity {
        output.solver_body_map.resize(node_capacity, u32::MAX);
    }

    for island_index in islands_to_process.ones() {
        let island_id = island_from_index(island_index);
        if !graph.islands.is_live(island_id) {
            continue;
        }

        let is_awake = graph
            .island_nodes(island_id)
            .any(|node_id| !graph.nodes.get(node_id).is_ready_for_sleeping());

        if !is_awake {
            report_sleeping_island(graph, island_id, output, pass);
            continue;
        }

        let start = IslandIndices {
            bodies: output.bodies.len() as u32,
            articulations: output.articulations.len() as u32,
            contact_managers: output.contact_managers.len() as u32,
            constraints: output.constraints.len() as u32,
            has_static_contact: false,
        };
        let kinematics_len = output.kinematics.len();

        let mut next = graph.islands.get(island_id).start_node;
        while let Some(node_id) = next.get() {
            next = graph.nodes.next_node(node_id);

            if pass == UpdatePass::First
                && graph.nodes.get(node_id).is_in_sleeping_island()
                && let Some(target) = wake_sleep_target(graph, graph.nodes.get(node_id))
            {
                graph
                    .nodes
                    .get_mut(node_id)
                    .flags
                    .remove(NodeFlags::IN_SLEEPING_ISLAND);
                output.bodies_to_wake.push(target);
            }

            let node = graph.nodes.get(node_id);
            if node.is_kinematic() {
                output.solver_body_map[node_id.index()] = output.kinematics.len() as u32;
                output
                    .kinematics
                    .push(node.rigid_body().unwrap_or(Entity::PLACEHOLDER));
            } else if !node.is_articulated() {
                output.solver_body_map[node_id.index()] = output.bodies.len() as u32;
                output
                    .bodies
                    .push(node.rigid_body().unwrap_or(Entity::PLACEHOLDER));
            } else if let Some(root_id) = node.articulation_root() {
                let root = graph.roots.get(root_id);
                output.articulations.push(SolverArticulation {
                    link: root.link,
                    owner: root.owner,
                });
            }
        }

        let mut has_static_contact = false;
        let mut needs_second_pass = false;

        let mut next_edge = graph.islands.get(island_id).start_edge;
        while let Some(edge_id) = next_edge.get() {
            next_edge = graph.edges.next_edge(edge_id);
            let edge = graph.edges.get(edge_id);

            let body1 = interaction_body(graph, &output.solver_body_map, edge.node1);
            let body2 = interaction_body(graph, &output.solver_body_map, edge.node2);
            has_static_contact |= body1 == InteractionBody::World || body2 == InteractionBody::World;

            // Kinematic and static geometry need no solving against each other.
            if !body1.is_dynamic() && !body2.is_dynamic() {
                continue;
            }

            match edge.interaction {
                EdgeInteraction::ContactManager(None) => {
                    // Both bodies were asleep, so the pair has not been through the narrow phase.
                    if pass == UpdatePass::First {
                        output
                            .narrow_phase_contact_managers
                            .push(NarrowPhaseContactManager {
                                edge: edge_id,
                                contact_manager: None,
                            });
                        needs_second_pass = true;
                    }
                }
                EdgeInteraction::ContactManager(Some(contact_manager)) => {
                    if !needs_second_pass {
                        output.contact_managers.push(IndexedContactManager {
                            contact_manager,
                            body1,
                            body2,
                        });
                    }
                }
                EdgeInteraction::Constraint(Some(constraint)) => {
                    if !needs_second_pass {
                        output.constraints.push(IndexedConstraint {
                            constraint,
                            body1,
                            body2,
                        });
                    }
                }
                // Articulation joints are solved by the articulation itself.
                EdgeInteraction::Constraint(None)
                | EdgeInteraction::Articulation => {}
            }
        }

        if needs_second_pass {
            output.bodies.truncate(start.bodies as usize);
            output.kinematics.truncate(kinematics_len);
            output.articulations.truncate(start.articulations as usize);
            output
                .contact_managers
                .truncate(start.contact_managers as usize);
            output.constraints.truncate(start.constraints as usize);
            output.deferred_islands.push(island_id);
        } else {
            output.island_indices.push(IslandIndices {
                has_static_contact,
                ..start
            });
        }
    }

    if pass == UpdatePass::Second {
        output.deferred_islands.clear();
    }
}

fn report_sleeping_island(
    graph: &mut IslandGraph,
    island_id: IslandId,
    output: &mut IslandOutput,
    pass: UpdatePass,
) {
    let mut next = graph.islands.get(island_id).start_node;
    while let Some(node_id) = next.get() {
        next = graph.nodes.next_node(node_id);

        let node = graph.nodes.get(node_id);
        debug_assert!(node.is_ready_for_sleeping());
        if pass == UpdatePass::First && node.is_in_sleeping_island() {
            continue;
        }
        if let Some(target) = wake_sleep_target(graph, node) {
            graph
                .nodes
                .get_mut(node_id)
                .flags
                .insert(NodeFlags::IN_SLEEPING_ISLAND);
            output.bodies_to_sleep.push(target);
        }
    }
}

/// Returns what to report when a node wakes up or falls asleep. Kinematics and non-root
/// articulation links are not reported.
fn wake_sleep_target(graph: &IslandGraph, node: &Node) -> Option<WakeSleepTarget> {
    if node.is_rigid_body() {
        node.rigid_body().map(WakeSleepTarget::RigidBody)
    } else if let Some(root_id) = node.articulation_root() {
        Some(WakeSleepTarget::Articulation(graph.roots.get(root_id).owner))
    } else {
        None
    }
}

fn interaction_body(graph: &IslandGraph, solver_body_map: &[u32], node_id: NodeId) -> InteractionBody {
    let Some(node_id) = node_id.get() else {
        return InteractionBody::World;
    };
    let node = graph.nodes.get(node_id);
    if node.is_kinematic() {
        InteractionBody::Kinematic(solver_body_map[node_id.index()])
    } else if !node.is_articulated() {
        InteractionBody::Body(solver_body_map[node_id.index()])
    } else if let Some(root_id) = node.articulation_root() {
        InteractionBody::Articulation(graph.roots.get(root_id).link)
    } else {
        InteractionBody::Articulation(
            node.articulation_link()
                .unwrap_or(ArticulationLinkHandle::PLACEHOLDER),
        )
    }
}
