use bevy::prelude::*;
use constraint_islands::prelude::*;

use super::create_app;

/// The nodes of each pyramid, bottom row first.
#[derive(Resource, Default)]
struct Pyramids(Vec<Vec<NodeId>>);

/// Pyramids of boxes resting on the ground. One pyramid is disturbed every step while the
/// one disturbed before it is allowed to fall asleep again.
pub fn create_bench(pyramid_count: usize, base_count: usize) -> App {
    let mut app = create_app();
    app.init_resource::<Pyramids>();
    app.add_systems(
        Startup,
        move |commands: Commands, islands: ResMut<IslandManager>, pyramids: ResMut<Pyramids>| {
            setup(commands, islands, pyramids, pyramid_count, base_count)
        },
    );
    app.add_systems(PostUpdate, disturb_pyramids.in_set(IslandSet::Prepare));
    app
}

fn setup(
    mut commands: Commands,
    mut islands: ResMut<IslandManager>,
    mut pyramids: ResMut<Pyramids>,
    pyramid_count: usize,
    base_count: usize,
) {
    islands.preallocate(pyramid_count * base_count * (base_count + 1) / 2);

    for _ in 0..pyramid_count {
        let mut nodes = Vec::new();
        let mut below: Vec<NodeId> = Vec::new();

        for row in 0..base_count {
            let row_nodes: Vec<NodeId> = (row..base_count)
                .map(|_| {
                    let node = islands.add_rigid_node(commands.spawn_empty().id(), false);
                    islands.set_awake(node);
                    node
                })
                .collect();

            for (j, &node) in row_nodes.iter().enumerate() {
                if row == 0 {
                    islands.add_edge(EdgeKind::ContactManager, Some(node), None);
                } else {
                    islands.add_edge(EdgeKind::ContactManager, Some(node), Some(below[j]));
                    islands.add_edge(EdgeKind::ContactManager, Some(node), Some(below[j + 1]));
                }
                if let Some(&next) = row_nodes.get(j + 1) {
                    islands.add_edge(EdgeKind::ContactManager, Some(node), Some(next));
                }
            }

            nodes.extend_from_slice(&row_nodes);
            below = row_nodes;
        }

        pyramids.0.push(nodes);
    }
}

fn disturb_pyramids(
    mut islands: ResMut<IslandManager>,
    pyramids: Res<Pyramids>,
    mut step: Local<usize>,
) {
    let count = pyramids.0.len();
    if count == 0 {
        return;
    }

    if *step == 0 {
        for &node in pyramids.0.iter().flatten() {
            islands.notify_ready_for_sleeping(node);
        }
    } else {
        for &node in &pyramids.0[(*step - 1) % count] {
            islands.notify_ready_for_sleeping(node);
        }
    }

    if let Some(&top) = pyramids.0[*step % count].last() {
        islands.notify_not_ready_for_sleeping(top);
    }
    *step += 1;
}
