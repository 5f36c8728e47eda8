use bevy::{
    prelude::{ReflectDefault, ReflectResource, Resource},
    reflect::Reflect,
};

/// Configures the initial sizes and growth policy of the [`IslandManager`](crate::IslandManager).
///
/// The pools grow on demand, so the capacities are only starting points. Changing the
/// resource after the [`IslandManagerPlugin`](crate::IslandManagerPlugin) has been built
/// has no effect on the existing manager.
#[derive(Reflect, Resource, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serialize", reflect(Serialize, Deserialize))]
#[reflect(Debug, Resource, Default, PartialEq)]
pub struct IslandManagerConfig {
    /// The initial capacity of the node pool.
    ///
    /// Default: `1024`
    pub default_node_capacity: usize,
    /// The initial capacity of the edge pool.
    ///
    /// Default: `1024`
    pub default_edge_capacity: usize,
    /// The initial capacity of the island pool.
    ///
    /// Default: `1024`
    pub default_island_capacity: usize,
    /// The initial capacity of the articulation root table.
    ///
    /// Default: `64`
    pub default_articulation_root_capacity: usize,
    /// The capacity the change queues shrink back to after every update.
    ///
    /// Default: `1024`
    pub default_change_capacity: usize,
    /// Node and island capacities are rounded up to a multiple of this, keeping the
    /// bit vectors over them aligned to whole blocks.
    ///
    /// Default: `32`
    pub capacity_granularity: usize,
    /// The extra room reserved when an output buffer grows. Buffers smaller than this
    /// are never shrunk.
    ///
    /// Default: `16384`
    pub buffer_slack: usize,
    /// The maximum number of edges. Once reached, new edges are dropped.
    /// `None` allows as many edges as the handle width can address.
    ///
    /// Default: `None`
    pub edge_limit: Option<u32>,
}

impl Default for IslandManagerConfig {
    fn default() -> Self {
        Self {
            default_node_capacity: 1024,
            default_edge_capacity: 1024,
            default_island_capacity: 1024,
            default_articulation_root_capacity: 64,
            default_change_capacity: 1024,
            capacity_granularity: 32,
            buffer_slack: 16384,
            edge_limit: None,
        }
    }
}
