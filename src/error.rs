//! Errors reported by the [`IslandManager`](crate::IslandManager).

use thiserror::Error;

use crate::graph::{EdgeId, IslandId, NodeId};

/// An error returned by a fallible [`IslandManager`](crate::IslandManager) operation.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum IslandError {
    /// The edge pool is full and cannot grow past its limit.
    #[error("the island manager edge pool is exhausted at {capacity} edges")]
    EdgePoolExhausted {
        /// The capacity of the edge pool.
        capacity: usize,
    },
    /// The node handle does not refer to a live node.
    #[error("{0} is not a live node")]
    InvalidNode(NodeId),
    /// The edge handle does not refer to a live edge.
    #[error("{0} is not a live edge")]
    InvalidEdge(EdgeId),
    /// Both endpoints of an edge are missing.
    #[error("an edge needs at least one node")]
    MissingEndpoints,
}

/// A broken invariant found by [`IslandManager::validate`](crate::IslandManager::validate).
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum IslandValidationError {
    /// A node in the node list of an island points at another island.
    #[error("{node} is listed in {island} but belongs to {actual}")]
    NodeIslandMismatch {
        /// The node.
        node: NodeId,
        /// The island listing the node.
        island: IslandId,
        /// The island the node points at.
        actual: IslandId,
    },
    /// An edge in the edge list of an island still carries the created flag.
    #[error("{edge} in {island} is still flagged as created")]
    CreatedEdgeInIsland {
        /// The edge.
        edge: EdgeId,
        /// The island listing the edge.
        island: IslandId,
    },
    /// An endpoint of an edge in an island belongs to another island.
    #[error("{edge} in {island} has endpoint {node} in {actual}")]
    EdgeEndpointMismatch {
        /// The edge.
        edge: EdgeId,
        /// The island listing the edge.
        island: IslandId,
        /// The endpoint in another island.
        node: NodeId,
        /// The island of the endpoint.
        actual: IslandId,
    },
    /// A live edge has no endpoints.
    #[error("{0} has no endpoints")]
    EdgeWithoutEndpoints(EdgeId),
    /// The live and free islands do not add up to the island capacity.
    #[error("{live} live and {free} free islands do not add up to the capacity of {capacity}")]
    IslandAccounting {
        /// The number of live islands.
        live: usize,
        /// The length of the free list.
        free: usize,
        /// The number of islands that can be handed out.
        capacity: usize,
    },
    /// The free counter of a pool does not match the length of its free list.
    #[error("the {pool} pool counts {counted} free elements but its free list has {walked}")]
    FreeListMismatch {
        /// The name of the pool.
        pool: &'static str,
        /// The free counter of the pool.
        counted: usize,
        /// The length of the free list.
        walked: usize,
    },
    /// A body counter does not match a recount of the nodes.
    #[error("the {counter} counter is {expected} but {actual} were found")]
    CounterMismatch {
        /// The name of the counter.
        counter: &'static str,
        /// The value of the counter.
        expected: usize,
        /// The number of nodes found.
        actual: usize,
    },
}
