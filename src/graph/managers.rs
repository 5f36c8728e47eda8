//! Pools of nodes, edges, islands and articulation roots, and the per-node bitmaps
//! that track kinematic and sleep readiness state.

use crate::data_structures::{bit_vec::BitVec, elem_pool::ElemPool};

use super::{
    ArticulationRoot, ArticulationRootId, Edge, EdgeId, Island, IslandId, Node, NodeId, RawHandle,
};

/// A per-node bitmap maintained by the [`NodeManager`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeBitmap {
    /// Nodes that are currently kinematic.
    Kinematic,
    /// Nodes whose kinematic state changed since the last update.
    KinematicChange,
    /// Nodes that are currently not ready for sleeping.
    NotReadyForSleeping,
    /// Nodes whose sleep readiness changed since the last update.
    NotReadyForSleepingChange,
}

impl NodeBitmap {
    const COUNT: usize = 4;

    const fn index(self) -> usize {
        match self {
            Self::Kinematic => 0,
            Self::KinematicChange => 1,
            Self::NotReadyForSleeping => 2,
            Self::NotReadyForSleepingChange => 3,
        }
    }
}

/// The pool of [`Node`]s, their next-node links, and the per-node bitmaps.
///
/// The next-node array threads the nodes of each island into a singly linked list.
/// All parallel arrays are kept at the capacity of the pool.
#[derive(Clone, Debug)]
pub struct NodeManager {
    pool: ElemPool<NodeId, Node>,
    pub(crate) next_node_ids: Vec<NodeId>,
    bitmaps: [BitVec; NodeBitmap::COUNT],
}

impl NodeManager {
    /// Creates a new [`NodeManager`] with the given initial capacity.
    pub fn with_capacity(capacity: usize, granularity: usize) -> Self {
        let mut manager = Self {
            pool: ElemPool::with_capacity(capacity, granularity),
            next_node_ids: Vec::new(),
            bitmaps: Default::default(),
        };
        manager.sync_capacity();
        manager
    }

    /// Returns the number of nodes the manager can hold without growing.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.pool.capacity()
    }

    /// Returns the number of allocated nodes.
    #[inline]
    pub fn used_count(&self) -> usize {
        self.pool.used_count()
    }

    /// Returns the number of free nodes.
    #[inline]
    pub fn free_count(&self) -> usize {
        self.pool.free_count()
    }

    /// Allocates a node, growing the pool if needed. Returns [`NodeId::INVALID`] at the handle limit.
    pub fn allocate(&mut self) -> NodeId {
        let id = self.pool.allocate();
        if id.is_valid() {
            self.sync_capacity();
            self.next_node_ids[id.index()] = NodeId::INVALID;
        }
        id
    }

    /// Releases a node back to the pool.
    pub fn release(&mut self, id: NodeId) {
        self.pool.release(id);
        self.next_node_ids[id.index()] = NodeId::INVALID;
    }

    /// Grows the pool and all parallel arrays to at least `capacity` nodes.
    pub fn resize(&mut self, capacity: usize) {
        self.pool.resize(capacity);
        self.sync_capacity();
    }

    fn sync_capacity(&mut self) {
        let capacity = self.pool.capacity();
        if self.next_node_ids.len() < capacity {
            self.next_node_ids.resize(capacity, NodeId::INVALID);
        }
        for bitmap in &mut self.bitmaps {
            bitmap.grow(capacity);
        }
    }

    /// Returns `true` if the handle refers to an allocated node.
    #[inline]
    pub fn is_allocated(&self, id: NodeId) -> bool {
        self.pool.is_allocated(id)
    }

    /// Returns the node for the given handle.
    #[inline]
    pub fn get(&self, id: NodeId) -> &Node {
        self.pool.get(id)
    }

    /// Returns the node for the given handle mutably.
    #[inline]
    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        self.pool.get_mut(id)
    }

    /// Returns the node for the given handle, or `None` if the handle is out of bounds.
    #[inline]
    pub fn try_get(&self, id: NodeId) -> Option<&Node> {
        self.pool.try_get(id)
    }

    /// Returns the next node in the island list after `id`.
    #[inline]
    pub fn next_node(&self, id: NodeId) -> NodeId {
        self.next_node_ids[id.index()]
    }

    /// Returns the given bitmap.
    #[inline]
    pub fn bitmap(&self, bitmap: NodeBitmap) -> &BitVec {
        &self.bitmaps[bitmap.index()]
    }

    #[inline]
    fn bitmap_mut(&mut self, bitmap: NodeBitmap) -> &mut BitVec {
        &mut self.bitmaps[bitmap.index()]
    }

    /// Sets or clears the kinematic bit of a node.
    pub fn set_kinematic_bit(&mut self, id: NodeId, is_kinematic: bool) {
        let bits = self.bitmap_mut(NodeBitmap::Kinematic);
        if is_kinematic {
            bits.set(id.index());
        } else {
            bits.unset(id.index());
        }
    }

    /// Sets or clears the not-ready-for-sleeping bit of a node.
    pub fn set_not_ready_bit(&mut self, id: NodeId, is_not_ready: bool) {
        let bits = self.bitmap_mut(NodeBitmap::NotReadyForSleeping);
        if is_not_ready {
            bits.set(id.index());
        } else {
            bits.unset(id.index());
        }
    }

    /// Records a kinematic state change of a node. Nodes created since the last update are skipped,
    /// as the update processes them anyway.
    ///
    /// The change bit toggles, so two changes in the same frame cancel out.
    pub fn toggle_kinematic_change(&mut self, id: NodeId) {
        if !self.get(id).is_new() {
            self.bitmap_mut(NodeBitmap::KinematicChange)
                .toggle(id.index());
        }
    }

    /// Records a sleep readiness change of a node, like [`toggle_kinematic_change`](Self::toggle_kinematic_change).
    pub fn toggle_not_ready_change(&mut self, id: NodeId) {
        if !self.get(id).is_new() {
            self.bitmap_mut(NodeBitmap::NotReadyForSleepingChange)
                .toggle(id.index());
        }
    }

    /// Clears both change bitmaps.
    pub fn clear_changes(&mut self) {
        self.bitmap_mut(NodeBitmap::KinematicChange).clear();
        self.bitmap_mut(NodeBitmap::NotReadyForSleepingChange)
            .clear();
    }

    /// Clears the bits of a deleted node in all bitmaps.
    pub fn delete_node(&mut self, id: NodeId) {
        for bitmap in &mut self.bitmaps {
            bitmap.unset(id.index());
        }
    }

    /// Walks the free list of the pool and counts its elements.
    pub fn compute_free_count(&self) -> usize {
        self.pool.compute_free_count()
    }
}

impl Default for NodeManager {
    fn default() -> Self {
        Self::with_capacity(0, 1)
    }
}

/// The pool of [`Edge`]s and their next-edge links.
#[derive(Clone, Debug)]
pub struct EdgeManager {
    pool: ElemPool<EdgeId, Edge>,
    pub(crate) next_edge_ids: Vec<EdgeId>,
}

impl EdgeManager {
    /// Creates a new [`EdgeManager`] with the given initial capacity.
    ///
    /// If `limit` is set, the pool never grows past it.
    pub fn with_capacity(capacity: usize, granularity: usize, limit: Option<usize>) -> Self {
        let mut pool = ElemPool::with_capacity(0, granularity);
        if let Some(limit) = limit {
            pool = pool.with_limit(limit);
        }
        pool.resize(capacity);

        let mut manager = Self {
            pool,
            next_edge_ids: Vec::new(),
        };
        manager.sync_capacity();
        manager
    }

    /// Returns the number of free edges.
    #[inline]
    pub fn free_count(&self) -> usize {
        self.pool.free_count()
    }

    /// Returns the number of edges the manager can hold without growing.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.pool.capacity()
    }

    /// Returns the number of allocated edges.
    #[inline]
    pub fn used_count(&self) -> usize {
        self.pool.used_count()
    }

    /// Returns the capacity limit of the pool.
    #[inline]
    pub fn limit(&self) -> usize {
        self.pool.limit()
    }

    /// Allocates an edge. Returns [`EdgeId::INVALID`] if the pool is exhausted.
    pub fn allocate(&mut self) -> EdgeId {
        let id = self.pool.allocate();
        if id.is_valid() {
            self.sync_capacity();
            self.next_edge_ids[id.index()] = EdgeId::INVALID;
        }
        id
    }

    /// Releases an edge back to the pool.
    pub fn release(&mut self, id: EdgeId) {
        self.pool.release(id);
        self.next_edge_ids[id.index()] = EdgeId::INVALID;
    }

    /// Grows the pool and the next-edge array to at least `capacity` edges.
    pub fn resize(&mut self, capacity: usize) {
        self.pool.resize(capacity);
        self.sync_capacity();
    }

    fn sync_capacity(&mut self) {
        let capacity = self.pool.capacity();
        if self.next_edge_ids.len() < capacity {
            self.next_edge_ids.resize(capacity, EdgeId::INVALID);
        }
    }

    /// Returns `true` if the handle refers to an allocated edge.
    #[inline]
    pub fn is_allocated(&self, id: EdgeId) -> bool {
        self.pool.is_allocated(id)
    }

    /// Returns the edge for the given handle.
    #[inline]
    pub fn get(&self, id: EdgeId) -> &Edge {
        self.pool.get(id)
    }

    /// Returns the edge for the given handle mutably.
    #[inline]
    pub fn get_mut(&mut self, id: EdgeId) -> &mut Edge {
        self.pool.get_mut(id)
    }

    /// Returns the edge for the given handle, or `None` if the handle is out of bounds.
    #[inline]
    pub fn try_get(&self, id: EdgeId) -> Option<&Edge> {
        self.pool.try_get(id)
    }

    /// Returns the next edge in the island list after `id`.
    #[inline]
    pub fn next_edge(&self, id: EdgeId) -> EdgeId {
        self.next_edge_ids[id.index()]
    }

    /// Walks the free list of the pool and counts its elements.
    pub fn compute_free_count(&self) -> usize {
        self.pool.compute_free_count()
    }
}

impl Default for EdgeManager {
    fn default() -> Self {
        Self::with_capacity(0, 1, None)
    }
}

/// The pool of [`Island`]s. The allocated islands are the live ones.
#[derive(Clone, Debug)]
pub struct IslandPool {
    pool: ElemPool<IslandId, Island>,
}

impl IslandPool {
    /// Creates a new [`IslandPool`] with the given initial capacity.
    pub fn with_capacity(capacity: usize, granularity: usize) -> Self {
        Self {
            pool: ElemPool::with_capacity(capacity, granularity),
        }
    }

    /// Returns the number of islands the pool can hold without growing.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.pool.capacity()
    }

    /// Returns the number of live islands.
    #[inline]
    pub fn len(&self) -> usize {
        self.pool.used_count()
    }

    /// Returns `true` if there are no live islands.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of free islands.
    #[inline]
    pub fn free_count(&self) -> usize {
        self.pool.free_count()
    }

    /// Grows the pool to at least `capacity` islands.
    pub fn resize(&mut self, capacity: usize) {
        self.pool.resize(capacity);
    }

    /// Allocates an empty island and marks it live.
    pub fn get_new_island(&mut self) -> IslandId {
        self.pool.allocate()
    }

    /// Releases an island and marks it dead.
    pub fn release_island(&mut self, id: IslandId) {
        debug_assert!(self.is_live(id), "released dead {id}");
        self.pool.release(id);
    }

    /// Returns `true` if the island is live.
    #[inline]
    pub fn is_live(&self, id: IslandId) -> bool {
        self.pool.is_allocated(id)
    }

    /// Returns the set of live islands.
    #[inline]
    pub fn live(&self) -> &BitVec {
        self.pool.allocated()
    }

    /// Returns an iterator over the handles of all live islands, in ascending order.
    pub fn live_ids(&self) -> impl Iterator<Item = IslandId> + '_ {
        self.live().ones().map(|index| IslandId(index as RawHandle))
    }

    /// Returns the island for the given handle.
    #[inline]
    pub fn get(&self, id: IslandId) -> &Island {
        self.pool.get(id)
    }

    /// Returns the island for the given handle mutably.
    #[inline]
    pub fn get_mut(&mut self, id: IslandId) -> &mut Island {
        self.pool.get_mut(id)
    }

    /// Walks the free list of the pool and counts its elements.
    pub fn compute_free_count(&self) -> usize {
        self.pool.compute_free_count()
    }
}

impl Default for IslandPool {
    fn default() -> Self {
        Self::with_capacity(0, 1)
    }
}

/// The side table of [`ArticulationRoot`]s, referenced by the owners of root link nodes.
#[derive(Clone, Debug, Default)]
pub struct ArticulationRootManager {
    pool: ElemPool<ArticulationRootId, ArticulationRoot>,
}

impl ArticulationRootManager {
    /// Creates a new [`ArticulationRootManager`] with the given initial capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pool: ElemPool::with_capacity(capacity, 1),
        }
    }

    /// Returns the number of allocated roots.
    #[inline]
    pub fn len(&self) -> usize {
        self.pool.used_count()
    }

    /// Returns `true` if no roots are allocated.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Allocates a root entry and initializes it.
    pub fn insert(&mut self, root: ArticulationRoot) -> ArticulationRootId {
        let id = self.pool.allocate();
        if id.is_valid() {
            *self.pool.get_mut(id) = root;
        }
        id
    }

    /// Releases a root entry.
    pub fn release(&mut self, id: ArticulationRootId) {
        self.pool.release(id);
    }

    /// Returns `true` if the handle refers to an allocated root entry.
    #[inline]
    pub fn is_allocated(&self, id: ArticulationRootId) -> bool {
        self.pool.is_allocated(id)
    }

    /// Returns the number of root entries the table can hold without growing.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.pool.capacity()
    }

    /// Returns the number of free root entries.
    #[inline]
    pub fn free_count(&self) -> usize {
        self.pool.free_count()
    }

    /// Walks the free list of the table and counts its elements.
    pub fn compute_free_count(&self) -> usize {
        self.pool.compute_free_count()
    }

    /// Returns the root entry for the given handle.
    #[inline]
    pub fn get(&self, id: ArticulationRootId) -> &ArticulationRoot {
        self.pool.get(id)
    }

    /// Returns the root entry for the given handle mutably.
    #[inline]
    pub fn get_mut(&mut self, id: ArticulationRootId) -> &mut ArticulationRoot {
        self.pool.get_mut(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeFlags;

    #[test]
    fn node_capacity_keeps_parallel_arrays_in_sync() {
        let mut nodes = NodeManager::with_capacity(1, 32);
        assert_eq!(nodes.capacity(), 32);
        for _ in 0..40 {
            assert!(nodes.allocate().is_valid());
        }
        assert_eq!(nodes.capacity(), 64);
        assert_eq!(nodes.next_node_ids.len(), 64);
        assert!(nodes.bitmap(NodeBitmap::Kinematic).bit_count() >= 64);
    }

    #[test]
    fn change_bits_toggle_and_skip_new_nodes() {
        let mut nodes = NodeManager::with_capacity(32, 32);
        let a = nodes.allocate();
        let b = nodes.allocate();
        nodes.get_mut(b).flags.insert(NodeFlags::NEW);

        nodes.toggle_not_ready_change(a);
        nodes.toggle_not_ready_change(b);
        let changes = nodes.bitmap(NodeBitmap::NotReadyForSleepingChange);
        assert!(changes.get(a.index()));
        assert!(!changes.get(b.index()));

        nodes.toggle_not_ready_change(a);
        assert!(
            !nodes
                .bitmap(NodeBitmap::NotReadyForSleepingChange)
                .get(a.index())
        );

        nodes.toggle_kinematic_change(a);
        nodes.set_kinematic_bit(a, true);
        nodes.set_not_ready_bit(a, true);
        nodes.delete_node(a);
        for bitmap in [
            NodeBitmap::Kinematic,
            NodeBitmap::KinematicChange,
            NodeBitmap::NotReadyForSleeping,
            NodeBitmap::NotReadyForSleepingChange,
        ] {
            assert!(!nodes.bitmap(bitmap).get(a.index()));
        }
    }

    #[test]
    fn island_liveness() {
        let mut islands = IslandPool::with_capacity(32, 32);
        let a = islands.get_new_island();
        let b = islands.get_new_island();
        assert!(islands.is_live(a) && islands.is_live(b));
        assert_eq!(islands.len(), 2);

        islands.release_island(a);
        assert!(!islands.is_live(a));
        assert!(!islands.is_live(IslandId::INVALID));
        assert_eq!(islands.live_ids().collect::<Vec<_>>(), vec![b]);
        assert_eq!(islands.get_new_island(), a);
    }

    #[test]
    fn edge_limit() {
        let mut edges = EdgeManager::with_capacity(2, 1, Some(3));
        for _ in 0..3 {
            assert!(edges.allocate().is_valid());
        }
        assert_eq!(edges.allocate(), EdgeId::INVALID);
        assert_eq!(edges.capacity(), 3);
    }
}
