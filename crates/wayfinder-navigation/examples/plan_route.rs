use std::sync::Arc;

use nalgebra::{Matrix4, Vector3};
use wayfinder_navigation::map::{Disc, Field, Fields, Mapper, MapperConfig};
use wayfinder_navigation::{Agent, Navigator, Route, WorldPoint};

/// A 4m x 3m floor patch tiled with small discs at y = 0.
fn floor() -> Field {
    let mut discs = Vec::new();
    for i in 0..=40 {
        for j in 0..=30 {
            discs.push(Disc::new(Vector3::new(i as f32 * 0.1, 0.0, j as f32 * 0.1), 0.08));
        }
    }
    Field::new(Matrix4::identity(), discs)
}

/// A box top 0.6m above the floor, built from two triangles and placed by its anchor transform.
fn table(x: f32, z: f32) -> Field {
    let vertices = [
        Vector3::new(-0.3, 0.6, -0.8),
        Vector3::new(0.3, 0.6, -0.8),
        Vector3::new(0.3, 0.6, 0.8),
        Vector3::new(-0.3, 0.6, 0.8),
    ];
    let faces = [[0, 2, 1], [0, 3, 2]];
    let mut discs: Vec<Disc> = Field::from_triangles(Matrix4::identity(), &vertices, &faces).discs().to_vec();
    // Fill the top densely so the footprint has no gaps.
    for i in -3..=3 {
        for j in -8..=8 {
            discs.push(Disc::new(Vector3::new(i as f32 * 0.1, 0.6, j as f32 * 0.1), 0.08));
        }
    }
    Field::new(Matrix4::new_translation(&Vector3::new(x, 0.0, z)), discs)
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let fields = Fields::from([(1, floor()), (2, table(2.0, 1.2))]);
    let agent = Agent::new(WorldPoint::new(0.5, 1.2), 0.0);
    let goal = WorldPoint::new(3.5, 1.2);

    let mut mapper = Mapper::new(MapperConfig::default());
    let Some(grid) = mapper.update(&agent, &fields).unwrap() else {
        println!("Nothing to map.");
        return;
    };
    println!("{}", grid.space());

    let route = Route::plan(agent, goal, Arc::new(grid));
    println!("{route}");
    for (i, waypoint) in route.waypoints.iter().enumerate() {
        println!("  waypoint {i}: {waypoint}");
    }

    match Navigator::default().trajectory(&agent, &route.waypoints) {
        Some(trajectory) => println!("First leg: {trajectory}"),
        None => println!("Already at the goal (or no route)."),
    }
}
