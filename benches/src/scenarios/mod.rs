//! Benchmark scenarios.
//!
//! Each scenario plays the host: it records body and interaction changes in
//! [`IslandSet::Prepare`], answers the narrow phase queries of the first pass, and solves
//! the awake islands in parallel before the update is finalized.

use bevy::prelude::*;
use constraint_islands::prelude::*;
use rayon::prelude::*;

use crate::Benchmark;

mod breaking_chain;
mod kinematic_fan;
mod pyramids;

/// All benchmarks.
pub const BENCHMARKS: &[Benchmark] = &[
    Benchmark::new("Many Pyramids", "pyramids", || pyramids::create_bench(20, 20)),
    Benchmark::new("Kinematic Fan", "kinematic_fan", || {
        kinematic_fan::create_bench(16, 64)
    }),
    Benchmark::new("Breaking Chain", "breaking_chain", || {
        breaking_chain::create_bench(4096)
    }),
];

/// The number of interactions solved in the last step.
#[derive(Resource, Default)]
pub struct SolvedInteractions(pub usize);

/// Creates an app with the island manager and the systems shared by all scenarios.
pub fn create_app() -> App {
    let mut app = App::new();
    app.add_plugins((MinimalPlugins, IslandManagerPlugin::default()));
    app.init_resource::<SolvedInteractions>();
    app.add_systems(
        PostUpdate,
        (
            touching_narrow_phase.in_set(IslandSet::NarrowPhase),
            solve_islands
                .after(IslandSet::SecondPass)
                .before(IslandSet::Finalize),
        ),
    );
    app
}

/// Treats every pair the first pass asks about as touching.
fn touching_narrow_phase(mut islands: ResMut<IslandManager>) {
    let edges: Vec<EdgeId> = islands
        .output()
        .narrow_phase_contact_managers()
        .iter()
        .map(|pair| pair.edge)
        .collect();
    for edge in edges {
        islands.set_edge_contact_manager(edge, ContactManagerId(edge.0 as u32));
    }
}

/// Visits every interaction of the awake islands, one island per task.
fn solve_islands(islands: Res<IslandManager>, mut solved: ResMut<SolvedInteractions>) {
    let solver_islands: Vec<SolverIsland> = islands.output().solver_islands().collect();
    solved.0 = solver_islands
        .par_iter()
        .map(|island| {
            let contacts = island
                .contact_managers
                .iter()
                .filter(|contact| contact.body1.is_dynamic() || contact.body2.is_dynamic())
                .count();
            let constraints = island
                .constraints
                .iter()
                .filter(|constraint| constraint.body1 != constraint.body2)
                .count();
            contacts + constraints
        })
        .sum();
}
