//! # Constraint Islands
//!
//! **Constraint Islands** partitions the bodies of a rigid body simulation into *islands*,
//! groups of bodies connected through contacts, joints and articulations, and maintains
//! them incrementally as bodies and interactions come and go. It is built for the
//! [Bevy game engine](https://bevyengine.org/), but the [`IslandManager`] itself is a plain
//! data structure that can be driven by any host.
//!
//! Islands serve two purposes:
//!
//! - **Sleeping**: an island falls asleep once none of its bodies needs to be simulated,
//!   and wakes up as a whole as soon as one of them does.
//! - **Solving**: the awake islands are independent of each other, and are handed to the
//!   solver as flattened arrays of bodies, contact managers and constraints.
//!
//! ## Usage
//!
//! Add the [`IslandManagerPlugin`] and record changes to the [`IslandManager`] resource
//! in [`IslandSet::Prepare`]:
//!
//! ```no_run
//! use bevy::prelude::*;
//! use constraint_islands::prelude::*;
//!
//! fn main() {
//!     App::new()
//!         .add_plugins((MinimalPlugins, IslandManagerPlugin::default()))
//!         .add_systems(PostUpdate, spawn_pair.in_set(IslandSet::Prepare))
//!         .run();
//! }
//!
//! fn spawn_pair(mut commands: Commands, mut islands: ResMut<IslandManager>, mut done: Local<bool>) {
//!     if *done {
//!         return;
//!     }
//!     *done = true;
//!
//!     let a = islands.add_rigid_node(commands.spawn_empty().id(), false);
//!     let b = islands.add_rigid_node(commands.spawn_empty().id(), false);
//!     islands.set_awake(a);
//!     islands.set_awake(b);
//!
//!     let joint = islands.add_edge(EdgeKind::Constraint, Some(a), Some(b));
//!     if let Some(joint) = joint {
//!         islands.set_edge_constraint(joint, ConstraintId(0));
//!     }
//! }
//! ```
//!
//! The solver reads [`IslandManager::output`] between [`IslandSet::SecondPass`] and
//! [`IslandSet::Finalize`].
//!
//! ## Kinematic bodies
//!
//! Kinematic bodies are not affected by the bodies they touch, so they never join two islands
//! together. During an update, a kinematic body in contact with several islands is replaced by
//! one proxy per interaction, and the proxies are merged back into it when the update is
//! finalized.
//!
//! ## Features
//!
//! - `u16-handles`: use 16-bit handles for nodes, edges and islands.
//! - `serialize`: enables serialization of handles and output records with `serde`.

#![warn(missing_docs)]

pub mod changes;
pub mod config;
pub mod data_structures;
pub mod diagnostics;
pub mod error;
pub mod graph;
pub mod manager;
pub mod output;
pub mod plugin;
pub mod update;

/// Re-exports common types.
pub mod prelude {
    pub use crate::{
        config::IslandManagerConfig,
        diagnostics::IslandDiagnostics,
        error::{IslandError, IslandValidationError},
        graph::{
            ArticulationLinkHandle, ConstraintId, ContactManagerId, EdgeId, EdgeKind, IslandId,
            NodeId,
        },
        manager::IslandManager,
        output::{
            IndexedConstraint, IndexedContactManager, InteractionBody, IslandOutput, SolverIsland,
            WakeSleepTarget,
        },
        plugin::{IslandManagerPlugin, IslandSet},
    };
}

pub use config::IslandManagerConfig;
pub use error::{IslandError, IslandValidationError};
pub use manager::IslandManager;
pub use plugin::{IslandManagerPlugin, IslandSet};
