use std::time::{Duration, Instant};

use wayfinder_control::{SteeringConfig, SteeringController};
use wayfinder_navigation::{Agent, Navigator, WorldPoint};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = SteeringConfig::default();
    let mut controller = SteeringController::new(config);
    controller.set_enabled(true);

    let navigator = Navigator::default();
    let waypoints = [WorldPoint::new(0.0, 0.0), WorldPoint::new(2.0, 0.0), WorldPoint::new(2.0, 2.0)];
    let mut agent = Agent::new(WorldPoint::ZERO, 0.0);

    println!("Steering along {} waypoints with {:?}", waypoints.len(), config);

    let start = Instant::now();
    let dt = 0.1;
    // Percent of full power to metres per second, and the wheel base of the simulated robot.
    let speed_scale = 0.01;
    let wheel_base = 0.2;

    for step in 0..200 {
        let now = start + Duration::from_secs_f32(step as f32 * dt);
        let trajectory = navigator.trajectory(&agent, &waypoints);
        let command = controller.update_at(trajectory, now);
        println!("Step {step:>3}: {} -> {command}", agent.position);

        let Some(trajectory) = trajectory else {
            println!("Arrived.");
            break;
        };
        let wayfinder_control::DriveState::Driving { speeds, .. } = controller.state() else {
            break;
        };
        let left = speeds.left * speed_scale;
        let right = speeds.right * speed_scale;
        let forward = (left + right) / 2.0;
        // Ground plane is (x, z) of a y-up frame, so a faster left wheel raises the heading.
        agent.heading += (left - right) / wheel_base * dt;
        agent.position = agent.position + agent.heading_vector() * (forward * dt);
        if step % 10 == 0 {
            println!("         {trajectory}");
        }
    }
}
