//! Timers and counters for the island update.
//!
//! The [`IslandDiagnostics`] resource is filled in by the systems of the
//! [`IslandManagerPlugin`](crate::IslandManagerPlugin), and each of its values is written
//! to a Bevy [`Diagnostic`] with a path under `constraint_islands/`.

use core::time::Duration;

use bevy::{
    diagnostic::{Diagnostic, DiagnosticPath, Diagnostics, RegisterDiagnostic},
    prelude::*,
};

use crate::manager::IslandManager;

/// A trait for resources that expose timers and counters as [`Diagnostic`]s.
pub trait IslandDiagnosticPaths: Resource {
    /// Returns the diagnostic paths of the timers, along with their current values.
    fn timer_paths(&self) -> Vec<(&'static DiagnosticPath, Duration)> {
        Vec::new()
    }

    /// Returns the diagnostic paths of the counters, along with their current values.
    fn counter_paths(&self) -> Vec<(&'static DiagnosticPath, u32)> {
        Vec::new()
    }
}

/// An extension trait for registering [`IslandDiagnosticPaths`] resources.
pub trait AppDiagnosticsExt {
    /// Initializes the resource and registers a [`Diagnostic`] for each of its paths.
    ///
    /// The values are written to the diagnostics by [`write_diagnostics`].
    fn register_island_diagnostics<T: IslandDiagnosticPaths + Default>(&mut self) -> &mut Self;
}

impl AppDiagnosticsExt for App {
    fn register_island_diagnostics<T: IslandDiagnosticPaths + Default>(&mut self) -> &mut Self {
        self.init_resource::<T>();

        let resource = T::default();
        for (path, _) in resource.timer_paths() {
            self.register_diagnostic(Diagnostic::new(path.clone()).with_suffix("ms"));
        }
        for (path, _) in resource.counter_paths() {
            self.register_diagnostic(Diagnostic::new(path.clone()));
        }
        self
    }
}

/// Writes the timers and counters of a resource to the Bevy diagnostics.
pub fn write_diagnostics<T: IslandDiagnosticPaths>(resource: Res<T>, mut diagnostics: Diagnostics) {
    for (path, duration) in resource.timer_paths() {
        diagnostics.add_measurement(path, || duration.as_secs_f64() * 1000.0);
    }
    for (path, count) in resource.counter_paths() {
        diagnostics.add_measurement(path, || count as f64);
    }
}

/// Diagnostics for the island update.
#[derive(Resource, Debug, Default, Reflect)]
#[reflect(Resource, Debug)]
pub struct IslandDiagnostics {
    /// Time spent in the first pass of the update.
    pub update_islands: Duration,
    /// Time spent in the second pass of the update.
    pub second_pass: Duration,
    /// Time spent merging kinematic proxies back and closing the update.
    pub finalize: Duration,
    /// The number of islands.
    pub island_count: u32,
    /// The number of islands handed to the solver.
    pub awake_island_count: u32,
    /// The number of islands held back by the first pass.
    pub deferred_island_count: u32,
    /// The number of bodies and articulations woken up.
    pub bodies_woken: u32,
    /// The number of bodies and articulations put to sleep.
    pub bodies_slept: u32,
    /// The number of kinematic proxies created by the first pass.
    pub kinematic_proxy_count: u32,
}

impl IslandDiagnostics {
    /// Records the counters of the first pass.
    pub(crate) fn record_first_pass(&mut self, manager: &IslandManager) {
        let output = manager.output();
        self.island_count = manager.island_count() as u32;
        self.deferred_island_count = output.deferred_islands().len() as u32;
        self.kinematic_proxy_count = manager.kinematic_proxy_count() as u32;
        self.bodies_woken = output.bodies_to_wake().len() as u32;
        self.bodies_slept = output.bodies_to_sleep().len() as u32;
        self.awake_island_count = output.island_count() as u32;
    }

    /// Adds the wake and sleep reports of the second pass and updates the island counts.
    pub(crate) fn record_second_pass(&mut self, manager: &IslandManager) {
        let output = manager.output();
        self.island_count = manager.island_count() as u32;
        self.bodies_woken += output.bodies_to_wake().len() as u32;
        self.bodies_slept += output.bodies_to_sleep().len() as u32;
        self.awake_island_count = output.island_count() as u32;
    }
}

impl IslandDiagnosticPaths for IslandDiagnostics {
    fn timer_paths(&self) -> Vec<(&'static DiagnosticPath, Duration)> {
        vec![
            (Self::UPDATE_ISLANDS, self.update_islands),
            (Self::SECOND_PASS, self.second_pass),
            (Self::FINALIZE, self.finalize),
        ]
    }

    fn counter_paths(&self) -> Vec<(&'static DiagnosticPath, u32)> {
        vec![
            (Self::ISLAND_COUNT, self.island_count),
            (Self::AWAKE_ISLAND_COUNT, self.awake_island_count),
            (Self::DEFERRED_ISLAND_COUNT, self.deferred_island_count),
            (Self::BODIES_WOKEN, self.bodies_woken),
            (Self::BODIES_SLEPT, self.bodies_slept),
            (Self::KINEMATIC_PROXY_COUNT, self.kinematic_proxy_count),
        ]
    }
}

/// Generates `&'static DiagnosticPath` constants on a type.
macro_rules! impl_diagnostic_paths {
    ($(#[$meta:meta])* impl $name:ident { $($path:ident: $path_str:expr,)* }) => {
        #[expect(missing_docs)]
        impl $name {
            $(
                pub const $path: &'static DiagnosticPath = &DiagnosticPath::const_new($path_str);
            )*
        }
    };
}

impl_diagnostic_paths! {
    impl IslandDiagnostics {
        UPDATE_ISLANDS: "constraint_islands/update_islands",
        SECOND_PASS: "constraint_islands/second_pass",
        FINALIZE: "constraint_islands/finalize",
        ISLAND_COUNT: "constraint_islands/island_count",
        AWAKE_ISLAND_COUNT: "constraint_islands/awake_island_count",
        DEFERRED_ISLAND_COUNT: "constraint_islands/deferred_island_count",
        BODIES_WOKEN: "constraint_islands/bodies_woken",
        BODIES_SLEPT: "constraint_islands/bodies_slept",
        KINEMATIC_PROXY_COUNT: "constraint_islands/kinematic_proxy_count",
    }
}
