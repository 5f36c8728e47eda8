//! The [`IslandManager`] resource, the public face of the crate.
//!
//! Mutating operations only record events. The islands themselves are brought up to date
//! once per step by [`IslandManager::update_islands`] and
//! [`IslandManager::update_islands_second_pass`], and the step is closed by
//! [`IslandManager::finalize_update`].

use bevy::{
    log::{error, trace, warn},
    prelude::{Entity, Resource},
};

use crate::{
    changes::{EdgeChangeManager, NodeChangeManager},
    config::IslandManagerConfig,
    data_structures::elem_pool::round_up,
    error::{IslandError, IslandValidationError},
    graph::{
        ArticulationLinkHandle, ArticulationRoot, ArticulationRootManager, ConstraintId,
        ContactManagerId, Edge, EdgeFlags, EdgeId, EdgeInteraction, EdgeKind, EdgeManager,
        IslandGraph, IslandId, IslandNodes, IslandPool, Node, NodeBitmap, NodeFlags, NodeId,
        NodeManager, NodeOwner, RawHandle,
    },
    output::IslandOutput,
    update::{self, UpdateWorkBuffers},
};

/// Partitions bodies and their interactions into islands, tracks which islands are asleep,
/// and flattens the awake islands for the solver.
///
/// Bodies are [nodes](Node) and interactions are [edges](Edge) between one or two nodes.
/// An edge with a single node is an interaction with static geometry. Connected edges join
/// their nodes into the same island, except that kinematic bodies never join two islands.
///
/// # Update cycle
///
/// Each step runs the following sequence:
///
/// 1. Record changes with the mutating operations.
/// 2. [`update_islands`](Self::update_islands) runs the first pass.
/// 3. The narrow phase processes
///    [`narrow_phase_contact_managers`](IslandOutput::narrow_phase_contact_managers), assigning
///    contact managers and calling [`set_edge_unconnected`](Self::set_edge_unconnected) for pairs
///    that are not touching.
/// 4. [`set_woken_pair_contact_managers`](Self::set_woken_pair_contact_managers) and
///    [`remove_sleeping_pair_contact_managers`](Self::remove_sleeping_pair_contact_managers).
/// 5. [`update_islands_second_pass`](Self::update_islands_second_pass) reports the islands
///    held back by the first pass.
/// 6. The solver consumes the [`output`](Self::output).
/// 7. [`finalize_update`](Self::finalize_update) closes the step.
///
/// Between steps 2 and 7, no operation other than assigning contact managers and
/// connecting or disconnecting edges may be performed. Only disconnected pairs of the
/// islands held back by the first pass take effect in the second pass. Every other
/// connection change takes effect in the next update.
///
/// # Invalid handles
///
/// Operations on handles that do not refer to a live node or edge are ignored with a warning,
/// and queries on them return `false` or `None`.
#[derive(Resource, Clone, Debug)]
pub struct IslandManager {
    graph: IslandGraph,
    node_changes: NodeChangeManager,
    edge_changes: EdgeChangeManager,
    buffers: UpdateWorkBuffers,
    output: IslandOutput,
    config: IslandManagerConfig,
    rigid_body_count: usize,
    kinematic_count: usize,
    articulation_count: usize,
    edge_counts: [usize; EdgeKind::COUNT],
    kinematic_proxy_count: usize,
    has_anything_changed: bool,
    performed_update: bool,
    everything_asleep: bool,
    update_count: u64,
}

impl Default for IslandManager {
    fn default() -> Self {
        Self::new(IslandManagerConfig::default())
    }
}

impl IslandManager {
    /// Creates a new [`IslandManager`] with pools sized according to the given configuration.
    pub fn new(config: IslandManagerConfig) -> Self {
        let granularity = config.capacity_granularity.max(1);
        let graph = IslandGraph {
            nodes: NodeManager::with_capacity(config.default_node_capacity, granularity),
            edges: EdgeManager::with_capacity(
                config.default_edge_capacity,
                1,
                config.edge_limit.map(|limit| limit as usize),
            ),
            islands: IslandPool::with_capacity(config.default_island_capacity, granularity),
            roots: ArticulationRootManager::with_capacity(
                config.default_articulation_root_capacity,
            ),
        };

        Self {
            graph,
            node_changes: NodeChangeManager::with_capacity(config.default_change_capacity),
            edge_changes: EdgeChangeManager::with_capacity(config.default_change_capacity),
            buffers: UpdateWorkBuffers::default(),
            output: IslandOutput::default(),
            config,
            rigid_body_count: 0,
            kinematic_count: 0,
            articulation_count: 0,
            edge_counts: [0; EdgeKind::COUNT],
            kinematic_proxy_count: 0,
            has_anything_changed: false,
            performed_update: false,
            everything_asleep: false,
            update_count: 0,
        }
    }

    /// Returns the configuration the manager was created with.
    #[inline]
    pub fn config(&self) -> &IslandManagerConfig {
        &self.config
    }

    /// Reserves room for the expected number of bodies.
    ///
    /// With a count of zero, the default capacities of the configuration are reserved.
    /// Otherwise the count is rounded up to the capacity granularity, and room is reserved
    /// for that many nodes and islands and twice as many edges. Never shrinks.
    pub fn preallocate(&mut self, body_count: usize) {
        let config = &self.config;
        let (nodes, edges, islands, node_changes, edge_changes) = if body_count == 0 {
            (
                config.default_node_capacity,
                config.default_edge_capacity,
                config.default_island_capacity,
                config.default_change_capacity,
                config.default_change_capacity,
            )
        } else {
            let bodies = round_up(body_count, config.capacity_granularity.max(1));
            (bodies, 2 * bodies, bodies, bodies, 2 * bodies)
        };

        self.graph.nodes.resize(nodes);
        self.graph.edges.resize(edges);
        self.graph.islands.resize(islands);
        self.node_changes.set_default_capacity(node_changes);
        self.edge_changes.set_default_capacity(edge_changes);
    }

    /// Returns the interaction graph.
    #[inline]
    pub fn graph(&self) -> &IslandGraph {
        &self.graph
    }

    /// Returns the results of the last update.
    ///
    /// The contents are only valid until the next update.
    #[inline]
    pub fn output(&self) -> &IslandOutput {
        &self.output
    }

    /// Returns the number of dynamic rigid bodies.
    #[inline]
    pub fn rigid_body_count(&self) -> usize {
        self.rigid_body_count
    }

    /// Returns the number of kinematic bodies.
    #[inline]
    pub fn kinematic_count(&self) -> usize {
        self.kinematic_count
    }

    /// Returns the number of articulations, counted by their root links.
    #[inline]
    pub fn articulation_count(&self) -> usize {
        self.articulation_count
    }

    /// Returns the number of live edges of the given kind.
    #[inline]
    pub fn edge_count(&self, kind: EdgeKind) -> usize {
        self.edge_counts[kind.index()]
    }

    /// Returns the number of islands.
    #[inline]
    pub fn island_count(&self) -> usize {
        self.graph.islands.len()
    }

    /// Returns the number of kinematic proxies created by the last update.
    #[inline]
    pub fn kinematic_proxy_count(&self) -> usize {
        self.kinematic_proxy_count
    }

    /// Returns the number of completed updates.
    #[inline]
    pub fn update_count(&self) -> u64 {
        self.update_count
    }

    /// Returns `true` if there were no awake islands at the end of the last update.
    #[inline]
    pub fn is_everything_asleep(&self) -> bool {
        self.everything_asleep
    }

    /// Returns `true` if the last call to [`update_islands`](Self::update_islands) did any work.
    #[inline]
    pub fn performed_update(&self) -> bool {
        self.performed_update
    }

    #[inline]
    fn is_live_node(&self, node_id: NodeId) -> bool {
        self.graph.nodes.is_allocated(node_id) && !self.graph.nodes.get(node_id).is_deleted()
    }

    #[inline]
    fn is_live_edge(&self, edge_id: EdgeId) -> bool {
        self.graph.edges.is_allocated(edge_id) && !self.graph.edges.get(edge_id).is_removed()
    }

    fn check_node(&self, node_id: NodeId, operation: &str) -> bool {
        let is_live = self.is_live_node(node_id);
        if !is_live {
            warn!("`{operation}` was called with {node_id}, which is not a live node. Ignoring.");
        }
        is_live
    }

    fn check_edge(&self, edge_id: EdgeId, operation: &str) -> bool {
        let is_live = self.is_live_edge(edge_id);
        if !is_live {
            warn!("`{operation}` was called with {edge_id}, which is not a live edge. Ignoring.");
        }
        is_live
    }

    /// Returns the node for the given handle, or `None` if it is not live.
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.is_live_node(node_id)
            .then(|| self.graph.nodes.get(node_id))
    }

    /// Returns the edge for the given handle, or `None` if it is not live.
    pub fn edge(&self, edge_id: EdgeId) -> Option<&Edge> {
        self.is_live_edge(edge_id)
            .then(|| self.graph.edges.get(edge_id))
    }

    /// Returns the island containing the node.
    ///
    /// Returns `None` for nodes created since the last update, and for kinematic nodes that
    /// are split into proxies between an update and [`finalize_update`](Self::finalize_update).
    pub fn node_island(&self, node_id: NodeId) -> Option<IslandId> {
        self.node(node_id).and_then(|node| node.island.get())
    }

    /// Returns an iterator over the nodes of a live island.
    pub fn island_nodes(&self, island_id: IslandId) -> Option<IslandNodes<'_>> {
        self.graph
            .islands
            .is_live(island_id)
            .then(|| self.graph.island_nodes(island_id))
    }

    fn allocate_node(&mut self, flags: NodeFlags, owner: NodeOwner) -> NodeId {
        let node_id = self.graph.nodes.allocate();
        if !node_id.is_valid() {
            error!(
                "Exceeded the island manager node limit of {}. The body will not take part in islands.",
                self.graph.nodes.capacity()
            );
            return node_id;
        }

        let node = self.graph.nodes.get_mut(node_id);
        node.flags = flags | NodeFlags::NEW;
        node.owner = owner;
        self.node_changes.add_created_node(node_id);
        self.has_anything_changed = true;
        node_id
    }

    /// Adds a node for a rigid body.
    ///
    /// The node carries no sleep state. Call [`set_awake`](Self::set_awake) or
    /// [`set_asleep`](Self::set_asleep) to initialize it.
    ///
    /// Returns [`NodeId::INVALID`] if the node pool is exhausted.
    pub fn add_rigid_node(&mut self, owner: Entity, is_kinematic: bool) -> NodeId {
        let flags = if is_kinematic {
            NodeFlags::KINEMATIC
        } else {
            NodeFlags::empty()
        };
        let node_id = self.allocate_node(flags, NodeOwner::RigidBody(owner));
        if node_id.is_valid() {
            if is_kinematic {
                self.graph.nodes.set_kinematic_bit(node_id, true);
                self.kinematic_count += 1;
            } else {
                self.rigid_body_count += 1;
            }
        }
        node_id
    }

    /// Adds a node for an articulation link.
    ///
    /// The owner is assigned later with [`set_articulation_link_owner`](Self::set_articulation_link_owner)
    /// or [`set_articulation_root_owner`](Self::set_articulation_root_owner).
    ///
    /// Returns [`NodeId::INVALID`] if the node pool is exhausted.
    pub fn add_articulation_link_node(&mut self) -> NodeId {
        self.allocate_node(NodeFlags::ARTICULATED, NodeOwner::None)
    }

    /// Assigns the link handle of a non-root articulation link.
    pub fn set_articulation_link_owner(&mut self, node_id: NodeId, link: ArticulationLinkHandle) {
        if !self.check_node(node_id, "set_articulation_link_owner") {
            return;
        }
        let node = self.graph.nodes.get_mut(node_id);
        debug_assert!(node.is_articulated() && !node.is_articulation_root());
        node.owner = NodeOwner::ArticulationLink(link);
        self.has_anything_changed = true;
    }

    /// Makes an articulation link the root of its articulation, recording the link handle
    /// and the articulation in the root table.
    pub fn set_articulation_root_owner(
        &mut self,
        node_id: NodeId,
        link: ArticulationLinkHandle,
        owner: Entity,
    ) {
        if !self.check_node(node_id, "set_articulation_root_owner") {
            return;
        }
        let root = ArticulationRoot { link, owner };
        let node = self.graph.nodes.get_mut(node_id);
        debug_assert!(node.is_articulated());

        if let Some(root_id) = node.articulation_root() {
            *self.graph.roots.get_mut(root_id) = root;
        } else {
            let root_id = self.graph.roots.insert(root);
            node.owner = NodeOwner::ArticulationRoot(root_id);
            node.flags.insert(NodeFlags::ARTICULATED_ROOT);
            self.articulation_count += 1;
        }
        self.has_anything_changed = true;
    }

    /// Removes a node.
    ///
    /// All edges referencing the node must be removed with [`remove_edge`](Self::remove_edge)
    /// before the next update.
    pub fn remove_node(&mut self, node_id: NodeId) {
        if !self.check_node(node_id, "remove_node") {
            return;
        }
        let node = self.graph.nodes.get_mut(node_id);
        if !node.is_articulated() {
            if node.is_kinematic() {
                self.kinematic_count -= 1;
            } else {
                self.rigid_body_count -= 1;
            }
        } else if node.is_articulation_root() {
            self.articulation_count -= 1;
        }

        node.flags.insert(NodeFlags::DELETED);
        self.node_changes.add_deleted_node(node_id);
        self.has_anything_changed = true;
    }

    /// Makes a rigid body node kinematic or dynamic.
    pub fn set_kinematic(&mut self, node_id: NodeId, is_kinematic: bool) {
        if !self.check_node(node_id, "set_kinematic") {
            return;
        }
        let node = self.graph.nodes.get_mut(node_id);
        if node.is_articulated() {
            warn!("Articulation links cannot be kinematic. Ignoring `set_kinematic` for {node_id}.");
            return;
        }
        if node.is_kinematic() == is_kinematic {
            return;
        }

        node.set_kinematic(is_kinematic);
        if is_kinematic {
            self.kinematic_count += 1;
            self.rigid_body_count -= 1;
        } else {
            self.kinematic_count -= 1;
            self.rigid_body_count += 1;
        }
        self.graph.nodes.set_kinematic_bit(node_id, is_kinematic);
        self.graph.nodes.toggle_kinematic_change(node_id);
        self.has_anything_changed = true;
    }

    /// Applies a sleep state change to a node, keeping the not-ready-for-sleeping bitmaps in sync.
    fn change_sleep_state(&mut self, node_id: NodeId, operation: &str, change: impl FnOnce(&mut Node)) {
        if !self.check_node(node_id, operation) {
            return;
        }
        let node = self.graph.nodes.get_mut(node_id);
        let old_flags = node.flags;
        change(node);
        let new_flags = node.flags;
        if old_flags == new_flags {
            return;
        }

        let is_not_ready = new_flags.contains(NodeFlags::NOT_READY_FOR_SLEEPING);
        if old_flags.contains(NodeFlags::NOT_READY_FOR_SLEEPING) != is_not_ready {
            self.graph.nodes.set_not_ready_bit(node_id, is_not_ready);
            self.graph.nodes.toggle_not_ready_change(node_id);
        }
        self.has_anything_changed = true;
    }

    /// Wakes a node up and keeps it from falling asleep.
    ///
    /// No wake report is produced for the node itself. The rest of its island is woken
    /// up by the next update.
    pub fn set_awake(&mut self, node_id: NodeId) {
        self.change_sleep_state(node_id, "set_awake", Node::set_awake);
    }

    /// Puts a node to sleep and marks it ready for sleeping.
    ///
    /// No sleep report is produced for the node itself.
    pub fn set_asleep(&mut self, node_id: NodeId) {
        self.change_sleep_state(node_id, "set_asleep", Node::set_asleep);
    }

    /// Allows the island of a node to fall asleep, as far as this node is concerned.
    pub fn notify_ready_for_sleeping(&mut self, node_id: NodeId) {
        self.change_sleep_state(node_id, "notify_ready_for_sleeping", |node| {
            node.flags.remove(NodeFlags::NOT_READY_FOR_SLEEPING);
        });
    }

    /// Keeps the island of a node awake.
    pub fn notify_not_ready_for_sleeping(&mut self, node_id: NodeId) {
        self.change_sleep_state(node_id, "notify_not_ready_for_sleeping", |node| {
            node.flags.insert(NodeFlags::NOT_READY_FOR_SLEEPING);
        });
    }

    /// Returns `true` if the node does not keep its island awake.
    pub fn is_ready_for_sleeping(&self, node_id: NodeId) -> bool {
        self.node(node_id)
            .is_some_and(|node| node.is_ready_for_sleeping())
    }

    /// Returns `true` if the node was in a sleeping island at the last update.
    pub fn is_in_sleeping_island(&self, node_id: NodeId) -> bool {
        self.node(node_id)
            .is_some_and(|node| node.is_in_sleeping_island())
    }

    /// Adds a connected edge of the given kind between one or two nodes.
    /// A missing node stands for static geometry.
    ///
    /// The payload starts out empty. Assign it with [`set_edge_contact_manager`](Self::set_edge_contact_manager)
    /// or [`set_edge_constraint`](Self::set_edge_constraint).
    pub fn try_add_edge(
        &mut self,
        kind: EdgeKind,
        node1: Option<NodeId>,
        node2: Option<NodeId>,
    ) -> Result<EdgeId, IslandError> {
        if node1.is_none() && node2.is_none() {
            return Err(IslandError::MissingEndpoints);
        }
        for node_id in [node1, node2].into_iter().flatten() {
            if !self.is_live_node(node_id) {
                return Err(IslandError::InvalidNode(node_id));
            }
        }
        debug_assert!(node1 != node2, "an edge cannot connect a node to itself");

        let edge_id = self.graph.edges.allocate();
        if !edge_id.is_valid() {
            return Err(IslandError::EdgePoolExhausted {
                capacity: self.graph.edges.capacity(),
            });
        }

        *self.graph.edges.get_mut(edge_id) = Edge {
            node1: node1.into(),
            node2: node2.into(),
            interaction: EdgeInteraction::empty(kind),
            flags: EdgeFlags::CREATED | EdgeFlags::CONNECTED,
        };
        self.edge_changes.add_created_edge(edge_id);
        self.edge_changes.add_joined_edge(edge_id);
        self.edge_counts[kind.index()] += 1;
        self.has_anything_changed = true;

        Ok(edge_id)
    }

    /// Adds a connected edge like [`try_add_edge`](Self::try_add_edge), logging failures.
    ///
    /// Returns `None` if the edge could not be added.
    pub fn add_edge(
        &mut self,
        kind: EdgeKind,
        node1: Option<NodeId>,
        node2: Option<NodeId>,
    ) -> Option<EdgeId> {
        match self.try_add_edge(kind, node1, node2) {
            Ok(edge_id) => Some(edge_id),
            Err(IslandError::EdgePoolExhausted { capacity }) => {
                error!(
                    "Exceeded the island manager edge limit of {capacity}. All subsequent rigid body contact and constraint pairs will be neglected."
                );
                None
            }
            Err(err) => {
                warn!("Could not add edge: {err}");
                None
            }
        }
    }

    fn set_edge_interaction(&mut self, edge_id: EdgeId, interaction: EdgeInteraction, operation: &str) {
        if !self.check_edge(edge_id, operation) {
            return;
        }
        let edge = self.graph.edges.get_mut(edge_id);
        self.edge_counts[edge.kind().index()] -= 1;
        self.edge_counts[interaction.kind().index()] += 1;
        edge.interaction = interaction;
        self.has_anything_changed = true;
    }

    /// Assigns the narrow phase contact manager of a contact edge.
    pub fn set_edge_contact_manager(&mut self, edge_id: EdgeId, contact_manager: ContactManagerId) {
        self.set_edge_interaction(
            edge_id,
            EdgeInteraction::ContactManager(Some(contact_manager)),
            "set_edge_contact_manager",
        );
    }

    /// Removes the contact manager of a contact edge.
    pub fn clear_edge_contact_manager(&mut self, edge_id: EdgeId) {
        self.set_edge_interaction(
            edge_id,
            EdgeInteraction::ContactManager(None),
            "clear_edge_contact_manager",
        );
    }

    /// Assigns the constraint of a constraint edge.
    pub fn set_edge_constraint(&mut self, edge_id: EdgeId, constraint: ConstraintId) {
        self.set_edge_interaction(
            edge_id,
            EdgeInteraction::Constraint(Some(constraint)),
            "set_edge_constraint",
        );
    }

    /// Makes an edge an articulation joint.
    pub fn set_edge_articulation_joint(&mut self, edge_id: EdgeId) {
        self.set_edge_interaction(
            edge_id,
            EdgeInteraction::Articulation,
            "set_edge_articulation_joint",
        );
    }

    /// Connects an edge. Does nothing if it is already connected.
    pub fn set_edge_connected(&mut self, edge_id: EdgeId) {
        if !self.check_edge(edge_id, "set_edge_connected") {
            return;
        }
        let edge = self.graph.edges.get_mut(edge_id);
        // New edges start out connected, so the narrow phase may report a touch twice.
        if !edge.is_connected() {
            edge.flags.insert(EdgeFlags::CONNECTED);
            self.edge_changes.add_joined_edge(edge_id);
            self.has_anything_changed = true;
        }
    }

    /// Disconnects an edge. Does nothing if it is already unconnected.
    pub fn set_edge_unconnected(&mut self, edge_id: EdgeId) {
        if !self.check_edge(edge_id, "set_edge_unconnected") {
            return;
        }
        let edge = self.graph.edges.get_mut(edge_id);
        if edge.is_connected() {
            edge.flags.remove(EdgeFlags::CONNECTED);
            self.edge_changes.add_broken_edge(edge_id);
            self.has_anything_changed = true;
        }
    }

    /// Removes an edge.
    ///
    /// Returns [`IslandError::InvalidEdge`] if the edge is not live, for example because it
    /// was already removed.
    pub fn try_remove_edge(&mut self, edge_id: EdgeId) -> Result<(), IslandError> {
        if !self.is_live_edge(edge_id) {
            return Err(IslandError::InvalidEdge(edge_id));
        }
        let edge = self.graph.edges.get_mut(edge_id);
        edge.flags.insert(EdgeFlags::REMOVED);
        self.edge_counts[edge.kind().index()] -= 1;
        self.edge_changes.add_deleted_edge(edge_id);
        self.has_anything_changed = true;
        Ok(())
    }

    /// Removes an edge, ignoring edges that are not live with a warning.
    ///
    /// See [`try_remove_edge`](Self::try_remove_edge) for a fallible version.
    pub fn remove_edge(&mut self, edge_id: EdgeId) {
        if let Err(err) = self.try_remove_edge(edge_id) {
            warn!("`remove_edge` failed: {err}. Ignoring.");
        }
    }

    /// Returns `true` if anything was recorded since the last update.
    fn has_pending_changes(&self) -> bool {
        self.has_anything_changed || !self.node_changes.is_empty() || !self.edge_changes.is_empty()
    }

    /// Runs the first pass of an update.
    ///
    /// Does no work, and clears the output, if everything was asleep after the last update
    /// and nothing has changed since.
    pub fn update_islands(&mut self) {
        if self.performed_update {
            warn!("`update_islands` was called before `finalize_update`. Finalizing the previous update first.");
            self.finalize_update();
        }

        self.edge_changes
            .cleanup_edge_events(&mut self.buffers.edge_event_counts, self.graph.edges.capacity());
        self.resize_buffers();
        self.clear_edge_created_flags();
        self.clear_deleted_node_state_changes();

        if self.everything_asleep && !self.has_pending_changes() {
            self.output.clear();
            self.performed_update = false;
            trace!("Island update {}: everything asleep, skipped", self.update_count);
            return;
        }
        self.performed_update = true;

        self.kinematic_proxy_count = update::update_islands_main(
            &mut self.graph,
            &mut self.buffers,
            &self.node_changes,
            &self.edge_changes,
            &mut self.output,
            self.kinematic_count,
        );
        debug_assert_eq!(self.validate(), Ok(()));

        trace!(
            "Island update {}: {} islands, {} awake, {} deferred, {} kinematic proxies",
            self.update_count,
            self.graph.islands.len(),
            self.output.island_count(),
            self.output.deferred_islands().len(),
            self.kinematic_proxy_count
        );

        self.node_changes.reset();
        self.edge_changes.reset();
        self.graph.nodes.clear_changes();
    }

    /// Fits the output buffers to the current body and edge counts, and keeps the island
    /// pool at least as large as the node pool.
    fn resize_buffers(&mut self) {
        self.output.fit(
            self.graph.nodes.used_count(),
            self.graph.edges.used_count(),
            self.config.buffer_slack,
        );

        let node_capacity = self.graph.nodes.capacity();
        if self.graph.islands.capacity() < node_capacity {
            self.graph.islands.resize(node_capacity);
        }
    }

    fn clear_edge_created_flags(&mut self) {
        for &edge_id in self.edge_changes.created_edges() {
            let edge = self.graph.edges.get_mut(edge_id);
            debug_assert!(edge.is_created());
            edge.flags.remove(EdgeFlags::CREATED);
        }
    }

    fn clear_deleted_node_state_changes(&mut self) {
        for &node_id in self.node_changes.deleted_nodes() {
            debug_assert!(self.graph.nodes.get(node_id).is_deleted());
            self.graph.nodes.delete_node(node_id);
        }
    }

    /// Copies the contact managers assigned by the narrow phase into
    /// [`narrow_phase_contact_managers`](IslandOutput::narrow_phase_contact_managers).
    pub fn set_woken_pair_contact_managers(&mut self) {
        let edges = &self.graph.edges;
        for pair in &mut self.output.narrow_phase_contact_managers {
            pair.contact_manager = edges.get(pair.edge).contact_manager();
        }
    }

    /// Drops the pairs the narrow phase did not assign a contact manager to from
    /// [`narrow_phase_contact_managers`](IslandOutput::narrow_phase_contact_managers).
    pub fn remove_sleeping_pair_contact_managers(&mut self) {
        let edges = &self.graph.edges;
        self.output
            .narrow_phase_contact_managers
            .retain(|pair| edges.get(pair.edge).contact_manager().is_some());
    }

    /// Runs the second pass of an update, reporting the islands held back by the first pass.
    ///
    /// Only the edges of held back islands that were disconnected since the first pass are
    /// processed. Edges connected or disconnected elsewhere since the first pass are left
    /// for the next update. The wake and sleep lists are replaced, while the solver arrays
    /// are appended to.
    pub fn update_islands_second_pass(&mut self) {
        if !self.performed_update {
            return;
        }
        debug_assert!(self.node_changes.is_empty());
        debug_assert!(self.edge_changes.created_edges().is_empty());
        debug_assert!(self.edge_changes.deleted_edges().is_empty());

        self.edge_changes.cleanup_edge_events(
            &mut self.buffers.edge_event_counts,
            self.graph.edges.capacity(),
        );

        let deferred = self.output.deferred_islands().len();
        update::update_islands_second_pass_main(
            &mut self.graph,
            &mut self.buffers,
            &mut self.edge_changes,
            &mut self.output,
        );
        debug_assert_eq!(self.validate(), Ok(()));

        let carried =
            self.edge_changes.joined_edges().len() + self.edge_changes.broken_edges().len();
        trace!(
            "Island update {} second pass: {} deferred islands, {} awake in total, {} edge events carried over",
            self.update_count,
            deferred,
            self.output.island_count(),
            carried
        );
    }

    /// Closes the update. Must be called after the solver has consumed the output.
    ///
    /// Kinematic proxies are merged back into their source nodes, and whether everything
    /// is asleep is recorded for the next update.
    pub fn finalize_update(&mut self) {
        if self.performed_update && !self.buffers.kinematic_nodes.is_empty() {
            update::merge_kinematic_proxies_back_to_source(&mut self.graph, &mut self.buffers);
        }

        // Without islands for the solver, the next update can be skipped if nothing changes.
        self.everything_asleep = self.output.island_indices().is_empty();
        self.has_anything_changed = false;
        self.performed_update = false;
        self.update_count += 1;
    }

    /// Checks the internal invariants of the islands and pools.
    pub fn validate(&self) -> Result<(), IslandValidationError> {
        let nodes = &self.graph.nodes;
        let edges = &self.graph.edges;
        let islands = &self.graph.islands;

        for island_id in islands.live_ids() {
            for node_id in self.graph.island_nodes(island_id) {
                let actual = nodes.get(node_id).island;
                if actual != island_id {
                    return Err(IslandValidationError::NodeIslandMismatch {
                        node: node_id,
                        island: island_id,
                        actual,
                    });
                }
            }

            for edge_id in self.graph.island_edges(island_id) {
                let edge = edges.get(edge_id);
                if edge.is_created() {
                    return Err(IslandValidationError::CreatedEdgeInIsland {
                        edge: edge_id,
                        island: island_id,
                    });
                }
                for node_id in edge.nodes().into_iter().filter(|node| node.is_valid()) {
                    let actual = nodes.get(node_id).island;
                    if actual != island_id {
                        return Err(IslandValidationError::EdgeEndpointMismatch {
                            edge: edge_id,
                            island: island_id,
                            node: node_id,
                            actual,
                        });
                    }
                }
            }
        }

        for index in 0..edges.capacity() {
            let edge_id = EdgeId(index as RawHandle);
            if edges.is_allocated(edge_id) && edges.get(edge_id).nodes() == [NodeId::INVALID; 2] {
                return Err(IslandValidationError::EdgeWithoutEndpoints(edge_id));
            }
        }

        let live = islands.live().count_ones();
        let free = islands.compute_free_count();
        // The element at the sentinel index is never handed out.
        let capacity = islands.capacity().min(IslandId::INVALID.index());
        if live + free != capacity {
            return Err(IslandValidationError::IslandAccounting {
                live,
                free,
                capacity,
            });
        }

        for (pool, counted, walked) in [
            ("node", nodes.free_count(), nodes.compute_free_count()),
            ("edge", edges.free_count(), edges.compute_free_count()),
            ("island", islands.free_count(), free),
            (
                "articulation root",
                self.graph.roots.free_count(),
                self.graph.roots.compute_free_count(),
            ),
        ] {
            if counted != walked {
                return Err(IslandValidationError::FreeListMismatch {
                    pool,
                    counted,
                    walked,
                });
            }
        }

        let (mut rigid_bodies, mut kinematics, mut articulations) = (0, 0, 0);
        for node_id in self.source_nodes() {
            let node = nodes.get(node_id);
            if node.is_articulation_root() {
                articulations += 1;
            } else if node.is_kinematic() {
                kinematics += 1;
            } else if !node.is_articulated() {
                rigid_bodies += 1;
            }
        }
        for (counter, expected, actual) in [
            ("rigid body", self.rigid_body_count, rigid_bodies),
            ("kinematic", self.kinematic_count, kinematics),
            ("articulation", self.articulation_count, articulations),
        ] {
            if expected != actual {
                return Err(IslandValidationError::CounterMismatch {
                    counter,
                    expected,
                    actual,
                });
            }
        }

        Ok(())
    }

    /// Returns an iterator over the live nodes that are not kinematic proxies.
    fn source_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        let nodes = &self.graph.nodes;
        (0..nodes.capacity())
            .map(|index| NodeId(index as RawHandle))
            .filter(move |&node_id| {
                nodes.is_allocated(node_id)
                    && !nodes.get(node_id).is_deleted()
                    && !self.buffers.proxies.source(node_id).is_valid()
            })
    }

    /// Returns `true` if the kinematic bitmap matches the kinematic flags of the live nodes.
    pub fn verify_kinematic_bitmap(&self) -> bool {
        let bitmap = self.graph.nodes.bitmap(NodeBitmap::Kinematic);
        self.source_nodes().all(|node_id| {
            bitmap.get(node_id.index()) == self.graph.nodes.get(node_id).is_kinematic()
        })
    }

    /// Returns `true` if the not-ready-for-sleeping bitmap matches the flags of the live nodes.
    pub fn verify_not_ready_for_sleeping_bitmap(&self) -> bool {
        let bitmap = self.graph.nodes.bitmap(NodeBitmap::NotReadyForSleeping);
        self.source_nodes().all(|node_id| {
            bitmap.get(node_id.index()) != self.graph.nodes.get(node_id).is_ready_for_sleeping()
        })
    }
}
