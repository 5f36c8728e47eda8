//! ECS integration: the [`IslandManagerPlugin`] and the [`IslandSet`] system sets.

use bevy::{
    ecs::{intern::Interned, schedule::ScheduleLabel},
    platform::time::Instant,
    prelude::*,
};

use crate::{
    config::IslandManagerConfig,
    diagnostics::{AppDiagnosticsExt, IslandDiagnostics, write_diagnostics},
    manager::IslandManager,
};

/// A plugin that runs the update cycle of the [`IslandManager`] every frame.
///
/// The [`IslandManager`] is created from the [`IslandManagerConfig`] resource when the plugin
/// is built, unless the app already has one. Timers and counters are recorded in
/// [`IslandDiagnostics`].
///
/// Hosts record body and interaction changes in [`IslandSet::Prepare`], run their narrow
/// phase in [`IslandSet::NarrowPhase`], and run their solver between
/// [`IslandSet::SecondPass`] and [`IslandSet::Finalize`].
pub struct IslandManagerPlugin {
    schedule: Interned<dyn ScheduleLabel>,
}

impl IslandManagerPlugin {
    /// Creates an [`IslandManagerPlugin`] that runs the update cycle in the given schedule.
    ///
    /// The default schedule is `PostUpdate`.
    pub fn new(schedule: impl ScheduleLabel) -> Self {
        Self {
            schedule: schedule.intern(),
        }
    }
}

impl Default for IslandManagerPlugin {
    fn default() -> Self {
        Self::new(PostUpdate)
    }
}

/// System sets for the steps of the island update cycle, run in order.
#[derive(SystemSet, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IslandSet {
    /// Bodies and interactions are added, removed and changed.
    Prepare,
    /// [`IslandManager::update_islands`] runs.
    FirstPass,
    /// The narrow phase processes the contact pairs of the islands held back by the first pass.
    NarrowPhase,
    /// The contact managers assigned by the narrow phase are collected, and
    /// [`IslandManager::update_islands_second_pass`] runs.
    SecondPass,
    /// [`IslandManager::finalize_update`] runs.
    Finalize,
}

impl Plugin for IslandManagerPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<IslandManagerConfig>()
            .register_type::<IslandManagerConfig>()
            .register_type::<IslandDiagnostics>();

        if !app.world().contains_resource::<IslandManager>() {
            let config = app.world().resource::<IslandManagerConfig>().clone();
            app.insert_resource(IslandManager::new(config));
        }

        app.register_island_diagnostics::<IslandDiagnostics>();

        app.configure_sets(
            self.schedule,
            (
                IslandSet::Prepare,
                IslandSet::FirstPass,
                IslandSet::NarrowPhase,
                IslandSet::SecondPass,
                IslandSet::Finalize,
            )
                .chain(),
        );

        app.add_systems(
            self.schedule,
            (
                run_first_pass.in_set(IslandSet::FirstPass),
                run_second_pass.in_set(IslandSet::SecondPass),
                finalize_island_update.in_set(IslandSet::Finalize),
                write_diagnostics::<IslandDiagnostics>.after(IslandSet::Finalize),
            ),
        );
    }
}

fn run_first_pass(
    mut manager: ResMut<IslandManager>,
    mut diagnostics: ResMut<IslandDiagnostics>,
) {
    let start = Instant::now();

    manager.update_islands();

    diagnostics.update_islands = start.elapsed();
    diagnostics.record_first_pass(&manager);
}

fn run_second_pass(
    mut manager: ResMut<IslandManager>,
    mut diagnostics: ResMut<IslandDiagnostics>,
) {
    let start = Instant::now();

    manager.set_woken_pair_contact_managers();
    manager.remove_sleeping_pair_contact_managers();
    manager.update_islands_second_pass();

    diagnostics.second_pass = start.elapsed();
    diagnostics.record_second_pass(&manager);
}

fn finalize_island_update(
    mut manager: ResMut<IslandManager>,
    mut diagnostics: ResMut<IslandDiagnostics>,
) {
    let start = Instant::now();
    manager.finalize_update();
    diagnostics.finalize = start.elapsed();
}
