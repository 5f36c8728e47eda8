use bevy::prelude::*;
use constraint_islands::prelude::*;

use super::create_app;

/// The links of the chain, in order.
#[derive(Resource, Default)]
struct ChainLinks(Vec<EdgeId>);

/// A long chain of bodies held together by joints. Every step one link breaks and the link
/// broken in the previous step is repaired, splitting the chain and merging it back.
pub fn create_bench(body_count: usize) -> App {
    let mut app = create_app();
    app.init_resource::<ChainLinks>();
    app.add_systems(
        Startup,
        move |commands: Commands, islands: ResMut<IslandManager>, links: ResMut<ChainLinks>| {
            setup(commands, islands, links, body_count)
        },
    );
    app.add_systems(PostUpdate, break_and_repair.in_set(IslandSet::Prepare));
    app
}

fn setup(
    mut commands: Commands,
    mut islands: ResMut<IslandManager>,
    mut links: ResMut<ChainLinks>,
    body_count: usize,
) {
    islands.preallocate(body_count);

    let mut previous: Option<NodeId> = None;
    for i in 0..body_count {
        let body = islands.add_rigid_node(commands.spawn_empty().id(), false);
        islands.set_awake(body);

        // The first body hangs from static geometry.
        let anchor = if i == 0 { None } else { previous };
        if let Some(link) = islands.add_edge(EdgeKind::Constraint, Some(body), anchor) {
            islands.set_edge_constraint(link, ConstraintId(i as u32));
            links.0.push(link);
        }
        previous = Some(body);
    }
}

fn break_and_repair(
    mut islands: ResMut<IslandManager>,
    links: Res<ChainLinks>,
    mut broken: Local<Option<EdgeId>>,
    mut step: Local<usize>,
) {
    if links.0.is_empty() {
        return;
    }

    if let Some(link) = broken.take() {
        islands.set_edge_connected(link);
    }

    // Stride through the chain so that consecutive breaks land far apart.
    let index = step.wrapping_mul(7919) % links.0.len();
    let link = links.0[index];
    islands.set_edge_unconnected(link);
    *broken = Some(link);
    *step += 1;
}
