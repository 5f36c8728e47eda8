//! Queues of node and edge events recorded between updates.
//!
//! Mutating operations on the [`IslandManager`](crate::IslandManager) only append to these
//! queues. The update consumes them and resets them afterwards.

use crate::graph::{EdgeId, NodeId};

/// The created and deleted nodes since the last update.
#[derive(Clone, Debug, Default)]
pub struct NodeChangeManager {
    created: Vec<NodeId>,
    deleted: Vec<NodeId>,
    default_capacity: usize,
}

impl NodeChangeManager {
    /// Creates a new [`NodeChangeManager`] that shrinks back to `default_capacity` on reset.
    pub fn with_capacity(default_capacity: usize) -> Self {
        Self {
            created: Vec::with_capacity(default_capacity),
            deleted: Vec::with_capacity(default_capacity),
            default_capacity,
        }
    }

    /// Records a created node.
    #[inline]
    pub fn add_created_node(&mut self, node: NodeId) {
        self.created.push(node);
    }

    /// Records a deleted node.
    #[inline]
    pub fn add_deleted_node(&mut self, node: NodeId) {
        self.deleted.push(node);
    }

    /// Returns the nodes created since the last update.
    #[inline]
    pub fn created_nodes(&self) -> &[NodeId] {
        &self.created
    }

    /// Returns the nodes deleted since the last update.
    #[inline]
    pub fn deleted_nodes(&self) -> &[NodeId] {
        &self.deleted
    }

    /// Returns `true` if no node events are queued.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.deleted.is_empty()
    }

    /// Clears both queues, releasing storage grown past the default capacity.
    pub fn reset(&mut self) {
        for queue in [&mut self.created, &mut self.deleted] {
            queue.clear();
            queue.shrink_to(self.default_capacity);
        }
    }

    /// Changes the capacity the queues shrink back to, reserving it right away.
    pub fn set_default_capacity(&mut self, capacity: usize) {
        self.default_capacity = capacity;
        self.created.reserve(capacity.saturating_sub(self.created.len()));
        self.deleted.reserve(capacity.saturating_sub(self.deleted.len()));
    }
}

/// The created, deleted, joined and broken edges since the last update.
#[derive(Clone, Debug, Default)]
pub struct EdgeChangeManager {
    created: Vec<EdgeId>,
    deleted: Vec<EdgeId>,
    joined: Vec<EdgeId>,
    broken: Vec<EdgeId>,
    default_capacity: usize,
}

impl EdgeChangeManager {
    /// Creates a new [`EdgeChangeManager`] that shrinks back to `default_capacity` on reset.
    pub fn with_capacity(default_capacity: usize) -> Self {
        Self {
            created: Vec::with_capacity(default_capacity),
            deleted: Vec::with_capacity(default_capacity),
            joined: Vec::with_capacity(default_capacity),
            broken: Vec::with_capacity(default_capacity),
            default_capacity,
        }
    }

    /// Records a created edge.
    #[inline]
    pub fn add_created_edge(&mut self, edge: EdgeId) {
        self.created.push(edge);
    }

    /// Records a deleted edge.
    #[inline]
    pub fn add_deleted_edge(&mut self, edge: EdgeId) {
        self.deleted.push(edge);
    }

    /// Records an edge that became connected.
    #[inline]
    pub fn add_joined_edge(&mut self, edge: EdgeId) {
        self.joined.push(edge);
    }

    /// Records an edge that became unconnected.
    #[inline]
    pub fn add_broken_edge(&mut self, edge: EdgeId) {
        self.broken.push(edge);
    }

    /// Returns the edges created since the last update.
    #[inline]
    pub fn created_edges(&self) -> &[EdgeId] {
        &self.created
    }

    /// Returns the edges deleted since the last update.
    #[inline]
    pub fn deleted_edges(&self) -> &[EdgeId] {
        &self.deleted
    }

    /// Returns the edges that became connected since the last update.
    #[inline]
    pub fn joined_edges(&self) -> &[EdgeId] {
        &self.joined
    }

    /// Returns the edges that became unconnected since the last update.
    #[inline]
    pub fn broken_edges(&self) -> &[EdgeId] {
        &self.broken
    }

    /// Returns `true` if no edge events are queued.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.created.is_empty()
            && self.deleted.is_empty()
            && self.joined.is_empty()
            && self.broken.is_empty()
    }

    /// Collapses contradicting joined and broken events into at most one net event per edge.
    ///
    /// An edge broken and joined the same number of times loses all of its events.
    /// Otherwise only the first event in the direction of the imbalance survives.
    ///
    /// `counts` is indexed by edge and must be all zeros. It is left all zeros.
    pub fn cleanup_edge_events(&mut self, counts: &mut Vec<i32>, edge_capacity: usize) {
        if self.broken.is_empty() || self.joined.is_empty() {
            return;
        }

        if counts.len() < edge_capacity {
            counts.resize(edge_capacity, 0);
        }

        for edge in &self.broken {
            counts[edge.index()] -= 1;
        }
        for edge in &self.joined {
            counts[edge.index()] += 1;
        }

        // Zeroing a count when its event is kept drops the remaining events of that edge.
        // Net joined counts are left alone by the broken list, net broken ones by the joined list.
        self.broken.retain(|edge| {
            let count = &mut counts[edge.index()];
            let keep = *count < 0;
            if keep {
                *count = 0;
            }
            keep
        });
        self.joined.retain(|edge| {
            let count = &mut counts[edge.index()];
            let keep = *count > 0;
            if keep {
                *count = 0;
            }
            keep
        });

        debug_assert!(counts.iter().all(|&count| count == 0));
    }

    /// Moves the broken events of edges matching `take` into `out`, keeping the rest queued.
    ///
    /// The events left behind, and all joined events, are carried over to the next update.
    pub fn split_broken_edges(
        &mut self,
        out: &mut Vec<EdgeId>,
        mut take: impl FnMut(EdgeId) -> bool,
    ) {
        self.broken.retain(|&edge| {
            if take(edge) {
                out.push(edge);
                false
            } else {
                true
            }
        });
    }

    /// Clears all queues, releasing storage grown past the default capacity.
    pub fn reset(&mut self) {
        for queue in [
            &mut self.created,
            &mut self.deleted,
            &mut self.joined,
            &mut self.broken,
        ] {
            queue.clear();
            queue.shrink_to(self.default_capacity);
        }
    }

    /// Changes the capacity the queues shrink back to, reserving it right away.
    pub fn set_default_capacity(&mut self, capacity: usize) {
        self.default_capacity = capacity;
        for queue in [
            &mut self.created,
            &mut self.deleted,
            &mut self.joined,
            &mut self.broken,
        ] {
            queue.reserve(capacity.saturating_sub(queue.len()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balanced_events_cancel() {
        let mut changes = EdgeChangeManager::with_capacity(8);
        let mut counts = Vec::new();
        changes.add_broken_edge(EdgeId(1));
        changes.add_joined_edge(EdgeId(1));
        changes.add_joined_edge(EdgeId(2));

        changes.cleanup_edge_events(&mut counts, 4);
        assert!(changes.broken_edges().is_empty());
        assert_eq!(changes.joined_edges(), &[EdgeId(2)]);
        assert!(counts.iter().all(|&count| count == 0));
    }

    #[test]
    fn imbalance_keeps_single_net_event() {
        let mut changes = EdgeChangeManager::with_capacity(8);
        let mut counts = Vec::new();
        // Edge 0: broken, joined, broken. Net broken.
        changes.add_broken_edge(EdgeId(0));
        changes.add_joined_edge(EdgeId(0));
        changes.add_broken_edge(EdgeId(0));
        // Edge 3: joined, broken, joined. Net joined.
        changes.add_joined_edge(EdgeId(3));
        changes.add_broken_edge(EdgeId(3));
        changes.add_joined_edge(EdgeId(3));

        changes.cleanup_edge_events(&mut counts, 4);
        assert_eq!(changes.broken_edges(), &[EdgeId(0)]);
        assert_eq!(changes.joined_edges(), &[EdgeId(3)]);
        assert!(counts.iter().all(|&count| count == 0));
    }

    #[test]
    fn cleanup_needs_both_lists() {
        let mut changes = EdgeChangeManager::with_capacity(8);
        let mut counts = Vec::new();
        changes.add_broken_edge(EdgeId(0));
        changes.add_broken_edge(EdgeId(1));
        changes.cleanup_edge_events(&mut counts, 4);
        assert_eq!(changes.broken_edges().len(), 2);
    }

    #[test]
    fn reconnected_edge_keeps_its_join() {
        let mut changes = EdgeChangeManager::with_capacity(8);
        let mut counts = Vec::new();
        // Connected on creation, then disconnected and connected again.
        changes.add_joined_edge(EdgeId(1));
        changes.add_broken_edge(EdgeId(1));
        changes.add_joined_edge(EdgeId(1));
        changes.add_broken_edge(EdgeId(2));

        changes.cleanup_edge_events(&mut counts, 4);
        assert_eq!(changes.joined_edges(), &[EdgeId(1)]);
        assert_eq!(changes.broken_edges(), &[EdgeId(2)]);
        assert!(counts.iter().all(|&count| count == 0));
    }

    #[test]
    fn split_broken_edges_keeps_the_rest_queued() {
        let mut changes = EdgeChangeManager::with_capacity(8);
        changes.add_broken_edge(EdgeId(0));
        changes.add_broken_edge(EdgeId(1));
        changes.add_broken_edge(EdgeId(2));
        changes.add_joined_edge(EdgeId(3));

        let mut taken = Vec::new();
        changes.split_broken_edges(&mut taken, |edge| edge != EdgeId(1));
        assert_eq!(taken, vec![EdgeId(0), EdgeId(2)]);
        assert_eq!(changes.broken_edges(), &[EdgeId(1)]);
        assert_eq!(changes.joined_edges(), &[EdgeId(3)]);
    }

    #[test]
    fn reset_shrinks_to_default_capacity() {
        let mut changes = NodeChangeManager::with_capacity(4);
        for i in 0..1000 {
            changes.add_created_node(NodeId(i));
        }
        changes.add_deleted_node(NodeId(0));
        changes.reset();
        assert!(changes.created_nodes().is_empty());
        assert!(changes.deleted_nodes().is_empty());
        assert!(changes.created.capacity() < 1000);
    }
}
