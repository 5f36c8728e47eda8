//! The results of an island update: wake and sleep reports, the contact pairs waiting
//! for the narrow phase, and the flattened per-island arrays consumed by the solver.
//!
//! The buffers are owned by the [`IslandManager`](crate::IslandManager) and reused
//! across updates. Their contents are only valid until the next update.

use bevy::{log::debug, prelude::Entity, reflect::Reflect};

use crate::graph::{ArticulationLinkHandle, ConstraintId, ContactManagerId, EdgeId, IslandId};

/// A body or articulation whose sleep state changed in an update.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Reflect)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum WakeSleepTarget {
    /// A rigid body.
    RigidBody(Entity),
    /// An articulation, reported once through its root link.
    Articulation(Entity),
}

/// A contact edge of a newly woken island that the narrow phase must evaluate
/// before the second pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Reflect)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct NarrowPhaseContactManager {
    /// The contact edge.
    pub edge: EdgeId,
    /// The contact manager of the edge. Filled in by
    /// [`IslandManager::set_woken_pair_contact_managers`](crate::IslandManager::set_woken_pair_contact_managers).
    pub contact_manager: Option<ContactManagerId>,
}

/// The root link of an awake articulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Reflect)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct SolverArticulation {
    /// The handle of the root link.
    pub link: ArticulationLinkHandle,
    /// The articulation.
    pub owner: Entity,
}

/// One endpoint of a solver interaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Reflect)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum InteractionBody {
    /// Static geometry.
    World,
    /// A dynamic body, as an index into [`IslandOutput::bodies`].
    Body(u32),
    /// A kinematic body, as an index into [`IslandOutput::kinematics`].
    Kinematic(u32),
    /// An articulation link.
    Articulation(ArticulationLinkHandle),
}

impl InteractionBody {
    /// Returns `true` if the endpoint has dynamics of its own.
    #[inline]
    pub const fn is_dynamic(&self) -> bool {
        matches!(self, Self::Body(_) | Self::Articulation(_))
    }
}

/// A contact manager with its endpoints resolved to solver indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Reflect)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct IndexedContactManager {
    /// The contact manager.
    pub contact_manager: ContactManagerId,
    /// The first endpoint.
    pub body1: InteractionBody,
    /// The second endpoint.
    pub body2: InteractionBody,
}

/// A constraint with its endpoints resolved to solver indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Reflect)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct IndexedConstraint {
    /// The constraint.
    pub constraint: ConstraintId,
    /// The first endpoint.
    pub body1: InteractionBody,
    /// The second endpoint.
    pub body2: InteractionBody,
}

/// The start offsets of an awake island in the flattened solver arrays.
///
/// An island ends where the next one starts, or at the end of the arrays.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Reflect)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct IslandIndices {
    /// The first index into [`IslandOutput::bodies`].
    pub bodies: u32,
    /// The first index into [`IslandOutput::articulations`].
    pub articulations: u32,
    /// The first index into [`IslandOutput::contact_managers`].
    pub contact_managers: u32,
    /// The first index into [`IslandOutput::constraints`].
    pub constraints: u32,
    /// Set if any edge of the island touches static geometry.
    pub has_static_contact: bool,
}

/// A view of one awake island in the flattened solver arrays.
#[derive(Clone, Copy, Debug)]
pub struct SolverIsland<'a> {
    /// The dynamic rigid bodies of the island.
    pub bodies: &'a [Entity],
    /// The articulations of the island, one per root link.
    pub articulations: &'a [SolverArticulation],
    /// The contact managers of the island.
    pub contact_managers: &'a [IndexedContactManager],
    /// The constraints of the island.
    pub constraints: &'a [IndexedConstraint],
    /// Set if any edge of the island touches static geometry.
    pub has_static_contact: bool,
}

/// The output buffers of the island manager.
#[derive(Clone, Debug, Default)]
pub struct IslandOutput {
    pub(crate) bodies_to_wake: Vec<WakeSleepTarget>,
    pub(crate) bodies_to_sleep: Vec<WakeSleepTarget>,
    pub(crate) narrow_phase_contact_managers: Vec<NarrowPhaseContactManager>,
    pub(crate) bodies: Vec<Entity>,
    pub(crate) kinematics: Vec<Entity>,
    pub(crate) articulations: Vec<SolverArticulation>,
    pub(crate) contact_managers: Vec<IndexedContactManager>,
    pub(crate) constraints: Vec<IndexedConstraint>,
    pub(crate) island_indices: Vec<IslandIndices>,
    pub(crate) deferred_islands: Vec<IslandId>,
    /// Maps nodes to their index in `bodies` or `kinematics`.
    pub(crate) solver_body_map: Vec<u32>,
}

impl IslandOutput {
    /// Returns the bodies that woke up in the last pass.
    #[inline]
    pub fn bodies_to_wake(&self) -> &[WakeSleepTarget] {
        &self.bodies_to_wake
    }

    /// Returns the bodies that fell asleep in the last pass.
    #[inline]
    pub fn bodies_to_sleep(&self) -> &[WakeSleepTarget] {
        &self.bodies_to_sleep
    }

    /// Returns the contact pairs of newly woken islands that need the narrow phase.
    #[inline]
    pub fn narrow_phase_contact_managers(&self) -> &[NarrowPhaseContactManager] {
        &self.narrow_phase_contact_managers
    }

    /// Returns the dynamic bodies of all awake islands.
    #[inline]
    pub fn bodies(&self) -> &[Entity] {
        &self.bodies
    }

    /// Returns the kinematic bodies touching awake islands.
    #[inline]
    pub fn kinematics(&self) -> &[Entity] {
        &self.kinematics
    }

    /// Returns the articulations of all awake islands.
    #[inline]
    pub fn articulations(&self) -> &[SolverArticulation] {
        &self.articulations
    }

    /// Returns the contact managers of all awake islands.
    #[inline]
    pub fn contact_managers(&self) -> &[IndexedContactManager] {
        &self.contact_managers
    }

    /// Returns the constraints of all awake islands.
    #[inline]
    pub fn constraints(&self) -> &[IndexedConstraint] {
        &self.constraints
    }

    /// Returns the start offsets of every awake island.
    #[inline]
    pub fn island_indices(&self) -> &[IslandIndices] {
        &self.island_indices
    }

    /// Returns the islands held back from the solver until the second pass.
    #[inline]
    pub fn deferred_islands(&self) -> &[IslandId] {
        &self.deferred_islands
    }

    /// Returns the number of awake islands handed to the solver.
    #[inline]
    pub fn island_count(&self) -> usize {
        self.island_indices.len()
    }

    /// Returns an iterator over the awake islands.
    pub fn solver_islands(&self) -> impl ExactSizeIterator<Item = SolverIsland<'_>> + '_ {
        let end = IslandIndices {
            bodies: self.bodies.len() as u32,
            articulations: self.articulations.len() as u32,
            contact_managers: self.contact_managers.len() as u32,
            constraints: self.constraints.len() as u32,
            has_static_contact: false,
        };

        self.island_indices
            .iter()
            .enumerate()
            .map(move |(i, start)| {
                let next = self.island_indices.get(i + 1).unwrap_or(&end);
                SolverIsland {
                    bodies: &self.bodies[start.bodies as usize..next.bodies as usize],
                    articulations: &self.articulations
                        [start.articulations as usize..next.articulations as usize],
                    contact_managers: &self.contact_managers
                        [start.contact_managers as usize..next.contact_managers as usize],
                    constraints: &self.constraints
                        [start.constraints as usize..next.constraints as usize],
                    has_static_contact: start.has_static_contact,
                }
            })
    }

    /// Clears the wake and sleep reports.
    pub(crate) fn clear_wake_sleep(&mut self) {
        self.bodies_to_wake.clear();
        self.bodies_to_sleep.clear();
    }

    /// Clears every output buffer.
    pub(crate) fn clear(&mut self) {
        self.clear_wake_sleep();
        self.narrow_phase_contact_managers.clear();
        self.bodies.clear();
        self.kinematics.clear();
        self.articulations.clear();
        self.contact_managers.clear();
        self.constraints.clear();
        self.island_indices.clear();
        self.deferred_islands.clear();
    }

    /// Reserves room for the given node and edge counts, shrinking buffers that have
    /// grown far beyond what is needed.
    pub(crate) fn fit(&mut self, node_count: usize, edge_count: usize, slack: usize) {
        fit(&mut self.bodies_to_wake, node_count, slack);
        fit(&mut self.bodies_to_sleep, node_count, slack);
        fit(&mut self.narrow_phase_contact_managers, edge_count, slack);
        fit(&mut self.bodies, node_count, slack);
        fit(&mut self.kinematics, node_count, slack);
        fit(&mut self.articulations, node_count, slack);
        fit(&mut self.contact_managers, edge_count, slack);
        fit(&mut self.constraints, edge_count, slack);
        fit(&mut self.island_indices, node_count, slack);
        fit(&mut self.deferred_islands, node_count, slack);
    }
}

/// Grows a buffer to `required + slack` when it is too small, and shrinks it back to
/// `required` once the requirement drops below half the capacity.
fn fit<T>(buffer: &mut Vec<T>, required: usize, slack: usize) {
    let capacity = buffer.capacity();
    if required > capacity {
        buffer.reserve_exact(required + slack - buffer.len());
        debug!(
            "Grew island output buffer from {capacity} to {}",
            buffer.capacity()
        );
    } else if required < capacity / 2 && required >= slack {
        buffer.shrink_to(required.max(buffer.len()));
        debug!(
            "Shrank island output buffer from {capacity} to {}",
            buffer.capacity()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_hysteresis() {
        let mut buffer: Vec<u32> = Vec::new();
        fit(&mut buffer, 10, 4);
        assert!(buffer.capacity() >= 14);

        // Within the hysteresis band nothing changes.
        let capacity = buffer.capacity();
        fit(&mut buffer, 8, 4);
        assert_eq!(buffer.capacity(), capacity);

        let mut large: Vec<u32> = Vec::with_capacity(1000);
        fit(&mut large, 10, 4);
        assert!(large.capacity() < 1000);

        // Below the slack the buffer is kept.
        let mut small: Vec<u32> = Vec::with_capacity(1000);
        fit(&mut small, 2, 4);
        assert_eq!(small.capacity(), 1000);
    }

    #[test]
    fn solver_island_views() {
        let e = |i| Entity::from_raw(i);
        let output = IslandOutput {
            bodies: vec![e(1), e(2), e(3)],
            contact_managers: vec![IndexedContactManager {
                contact_manager: ContactManagerId(7),
                body1: InteractionBody::Body(2),
                body2: InteractionBody::World,
            }],
            island_indices: vec![
                IslandIndices::default(),
                IslandIndices {
                    bodies: 2,
                    has_static_contact: true,
                    ..Default::default()
                },
            ],
            ..Default::default()
        };

        let islands: Vec<_> = output.solver_islands().collect();
        assert_eq!(islands.len(), 2);
        assert_eq!(islands[0].bodies, &[e(1), e(2)]);
        assert!(islands[0].contact_managers.is_empty());
        assert!(!islands[0].has_static_contact);
        assert_eq!(islands[1].bodies, &[e(3)]);
        assert_eq!(islands[1].contact_managers.len(), 1);
        assert!(islands[1].has_static_contact);
    }
}
