use crate::{
    data_structures::bit_vec::BitVec,
    graph::{EdgeId, IslandId, NodeId},
};

/// Scratch state of the update pipeline, kept across updates to avoid reallocating.
///
/// Node-indexed buffers track the node pool capacity and island-indexed buffers track
/// the island pool capacity. Both are refitted at the start of every update and whenever
/// kinematic duplication grows the node pool.
#[derive(Clone, Debug, Default)]
pub struct UpdateWorkBuffers {
    /// Nodes whose own state or whose edges changed since the last update.
    pub(crate) changed_nodes: BitVec,
    /// Kinematic nodes that were replaced by proxies in this update.
    pub(crate) kinematic_nodes: BitVec,
    /// Islands that must be rebuilt from scratch because they lost an edge.
    pub(crate) broken_islands: BitVec,
    /// Islands that are reported at the end of the pass.
    pub(crate) process_islands: BitVec,
    /// Island scratch set, used for empty islands and islands holding kinematics.
    pub(crate) scratch_islands: BitVec,
    /// The union chain of nodes visited by a merge or rebuild.
    pub(crate) graph_next_nodes: Vec<NodeId>,
    /// The island each visited node started out in.
    pub(crate) graph_start_islands: Vec<IslandId>,
    /// The island each island was merged into, or [`IslandId::INVALID`] for roots.
    pub(crate) graph_next_islands: Vec<IslandId>,
    /// The kinematic proxies created by the current update.
    pub(crate) proxies: KinematicProxies,
    /// Signed per-edge event counts for edge event cleanup. All zeros between uses.
    pub(crate) edge_event_counts: Vec<i32>,
    /// Islands collected from a bitmap so that the bitmap can be modified while visiting them.
    pub(crate) island_batch: Vec<IslandId>,
    /// Nodes collected from a bitmap so that the bitmap can be modified while visiting them.
    pub(crate) node_batch: Vec<NodeId>,
    /// The broken edges handled by the second pass.
    pub(crate) second_pass_breaks: Vec<EdgeId>,
}

impl UpdateWorkBuffers {
    /// Clears the per-update sets and fits every buffer to the pool capacities.
    pub(crate) fn begin_update(&mut self, node_capacity: usize, island_capacity: usize) {
        self.changed_nodes.set_bit_count_and_clear(node_capacity);
        self.kinematic_nodes.set_bit_count_and_clear(node_capacity);
        self.broken_islands.set_bit_count_and_clear(island_capacity);
        self.process_islands.set_bit_count_and_clear(island_capacity);
        self.scratch_islands.set_bit_count_and_clear(island_capacity);
        self.fit(node_capacity, island_capacity);
    }

    /// Grows every buffer to the given capacities, preserving contents.
    pub(crate) fn fit(&mut self, node_capacity: usize, island_capacity: usize) {
        self.changed_nodes.grow(node_capacity);
        self.kinematic_nodes.grow(node_capacity);
        self.fit_islands(island_capacity);
        fit_links(&mut self.graph_next_nodes, node_capacity);
        fit_links(&mut self.graph_start_islands, node_capacity);
        self.proxies.fit(node_capacity);
    }

    /// Grows the island-indexed buffers to the given capacity, preserving contents.
    ///
    /// Called whenever an island is allocated mid-pass, since the island pool may grow.
    #[inline]
    pub(crate) fn fit_islands(&mut self, island_capacity: usize) {
        self.broken_islands.grow(island_capacity);
        self.process_islands.grow(island_capacity);
        self.scratch_islands.grow(island_capacity);
        fit_links(&mut self.graph_next_islands, island_capacity);
    }

    /// Resets the union scratch links to [`INVALID`](IslandId::INVALID).
    pub(crate) fn reset_union_links(&mut self) {
        self.graph_next_nodes.fill(NodeId::INVALID);
        self.graph_start_islands.fill(IslandId::INVALID);
        self.graph_next_islands.fill(IslandId::INVALID);
    }
}

#[inline]
fn fit_links<T: Copy + Default>(links: &mut Vec<T>, capacity: usize) {
    if links.len() < capacity {
        links.resize(capacity, T::default());
    }
}

/// Follows the union chain starting at the island of `node` and returns the root island
/// together with the length of the chain.
///
/// Returns [`IslandId::INVALID`] and a depth of zero for a missing node.
#[inline]
pub(crate) fn find_root_island(
    start_islands: &[IslandId],
    next_islands: &[IslandId],
    node: NodeId,
) -> (IslandId, usize) {
    let mut root = IslandId::INVALID;
    let mut depth = 0;
    if node.is_valid() {
        let mut next = start_islands[node.index()];
        while next.is_valid() {
            root = next;
            next = next_islands[next.index()];
            depth += 1;
        }
    }
    (root, depth)
}

/// The mapping between kinematic nodes and the proxy nodes standing in for them
/// during an update.
///
/// Each kinematic with proxies heads a singly linked list of its proxies,
/// threaded through the same `next` array.
#[derive(Clone, Debug, Default)]
pub struct KinematicProxies {
    source: Vec<NodeId>,
    next: Vec<NodeId>,
    last: Vec<NodeId>,
}

impl KinematicProxies {
    /// Removes all proxies and fits the mapping to the node capacity.
    pub(crate) fn reset(&mut self, node_capacity: usize) {
        for links in [&mut self.source, &mut self.next, &mut self.last] {
            links.clear();
            links.resize(node_capacity, NodeId::INVALID);
        }
    }

    /// Grows the mapping to the node capacity, preserving contents.
    pub(crate) fn fit(&mut self, node_capacity: usize) {
        for links in [&mut self.source, &mut self.next, &mut self.last] {
            fit_links(links, node_capacity);
        }
    }

    /// Appends a proxy to the proxy list of a kinematic.
    pub(crate) fn push(&mut self, kinematic: NodeId, proxy: NodeId) {
        self.source[proxy.index()] = kinematic;

        let tail = self.last[kinematic.index()].get().unwrap_or(kinematic);
        self.next[tail.index()] = proxy;
        self.next[proxy.index()] = NodeId::INVALID;
        self.last[kinematic.index()] = proxy;
    }

    /// Returns the kinematic a proxy stands in for, or [`NodeId::INVALID`] if `node` is not a proxy.
    #[inline]
    pub fn source(&self, node: NodeId) -> NodeId {
        self.source
            .get(node.index())
            .copied()
            .unwrap_or(NodeId::INVALID)
    }

    /// Returns the first proxy of a kinematic, or [`NodeId::INVALID`] if it has none.
    #[inline]
    pub fn first_proxy(&self, kinematic: NodeId) -> NodeId {
        self.next
            .get(kinematic.index())
            .copied()
            .unwrap_or(NodeId::INVALID)
    }

    /// Returns `true` if the kinematic has been replaced by proxies.
    #[inline]
    pub fn has_proxies(&self, kinematic: NodeId) -> bool {
        self.first_proxy(kinematic).is_valid()
    }

    /// Returns an iterator over the proxies of a kinematic.
    #[inline]
    pub fn proxies(&self, kinematic: NodeId) -> Proxies<'_> {
        Proxies {
            next_links: &self.next,
            next: self.first_proxy(kinematic),
        }
    }
}

/// An iterator over the proxies of a kinematic node.
#[derive(Clone)]
pub struct Proxies<'a> {
    next_links: &'a [NodeId],
    next: NodeId,
}

impl Iterator for Proxies<'_> {
    type Item = NodeId;

    #[inline]
    fn next(&mut self) -> Option<NodeId> {
        let current = self.next.get()?;
        self.next = self.next_links[current.index()];
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proxy_lists() {
        let mut proxies = KinematicProxies::default();
        proxies.reset(8);
        proxies.push(NodeId(0), NodeId(4));
        proxies.push(NodeId(1), NodeId(5));
        proxies.push(NodeId(0), NodeId(6));

        assert_eq!(
            proxies.proxies(NodeId(0)).collect::<Vec<_>>(),
            vec![NodeId(4), NodeId(6)]
        );
        assert_eq!(proxies.proxies(NodeId(1)).collect::<Vec<_>>(), vec![NodeId(5)]);
        assert_eq!(proxies.source(NodeId(6)), NodeId(0));
        assert_eq!(proxies.source(NodeId(0)), NodeId::INVALID);
        assert_eq!(proxies.source(NodeId(100)), NodeId::INVALID);
        assert!(!proxies.has_proxies(NodeId(2)));

        proxies.reset(8);
        assert!(!proxies.has_proxies(NodeId(0)));
    }

    #[test]
    fn root_chase_counts_depth() {
        let start = [IslandId(0), IslandId(1), IslandId(2)];
        let next = [IslandId::INVALID, IslandId(0), IslandId(1)];
        assert_eq!(find_root_island(&start, &next, NodeId(2)), (IslandId(0), 3));
        assert_eq!(find_root_island(&start, &next, NodeId(0)), (IslandId(0), 1));
        assert_eq!(
            find_root_island(&start, &next, NodeId::INVALID),
            (IslandId::INVALID, 0)
        );
    }
}
