use bevy::prelude::*;
use constraint_islands::prelude::*;

use super::create_app;

/// The contact edges between neighboring blades.
#[derive(Resource, Default)]
struct BladeContacts(Vec<EdgeId>);

/// Kinematic hubs, each holding a fan of dynamic blades by joints. Neighboring blades touch
/// in pairs, and one of those contacts comes and goes every step.
///
/// Every hub bridges all of its blades, so each update replaces the hubs with proxies.
pub fn create_bench(fan_count: usize, blade_count: usize) -> App {
    let mut app = create_app();
    app.init_resource::<BladeContacts>();
    app.add_systems(
        Startup,
        move |commands: Commands, islands: ResMut<IslandManager>, contacts: ResMut<BladeContacts>| {
            setup(commands, islands, contacts, fan_count, blade_count)
        },
    );
    app.add_systems(PostUpdate, toggle_blade_contact.in_set(IslandSet::Prepare));
    app
}

fn setup(
    mut commands: Commands,
    mut islands: ResMut<IslandManager>,
    mut contacts: ResMut<BladeContacts>,
    fan_count: usize,
    blade_count: usize,
) {
    islands.preallocate(fan_count * (blade_count + 1));

    let mut constraint_id = 0;
    for _ in 0..fan_count {
        let hub = islands.add_rigid_node(commands.spawn_empty().id(), true);
        islands.set_awake(hub);

        let blades: Vec<NodeId> = (0..blade_count)
            .map(|_| {
                let blade = islands.add_rigid_node(commands.spawn_empty().id(), false);
                islands.set_awake(blade);
                blade
            })
            .collect();

        for &blade in &blades {
            if let Some(joint) = islands.add_edge(EdgeKind::Constraint, Some(hub), Some(blade)) {
                islands.set_edge_constraint(joint, ConstraintId(constraint_id));
                constraint_id += 1;
            }
        }

        for pair in blades.chunks_exact(2) {
            if let Some(contact) =
                islands.add_edge(EdgeKind::ContactManager, Some(pair[0]), Some(pair[1]))
            {
                contacts.0.push(contact);
            }
        }
    }
}

fn toggle_blade_contact(
    mut islands: ResMut<IslandManager>,
    contacts: Res<BladeContacts>,
    mut step: Local<usize>,
) {
    if contacts.0.is_empty() {
        return;
    }

    let contact = contacts.0[*step % contacts.0.len()];
    if islands.edge(contact).is_some_and(|edge| edge.is_connected()) {
        islands.set_edge_unconnected(contact);
    } else {
        islands.set_edge_connected(contact);
    }
    *step += 1;
}
