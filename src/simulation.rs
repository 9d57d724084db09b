use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use nalgebra::{Matrix4, Vector3};
use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use spin_sleep::SpinSleeper;
use tracing::{debug, info};

use wayfinder_control::{MotorCommand, MotorHub, WheelSpeeds};
use wayfinder_navigation::map::{Disc, Field, Fields};
use wayfinder_navigation::{Agent, WorldPoint, geometry::normalize_angle};

use crate::blackboard::{Blackboard, record_command, touch_pose};
use crate::bus::{PendingSlot, Topic};
use crate::mapping::MappingInput;

/// Simulated world, drive train and motor hub.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Random obstacle layout seed.
    pub seed: u64,
    /// Number of obstacles placed on the floor.
    pub obstacle_count: usize,
    /// Floor extent along x (m).
    pub area_width: f32,
    /// Floor extent along z (m).
    pub area_depth: f32,
    /// Obstacle footprint radius range (m).
    pub obstacle_radius_min: f32,
    pub obstacle_radius_max: f32,
    /// Obstacle top above the floor (m).
    pub obstacle_height: f32,
    /// Obstacles keep at least this distance from the start and the goal (m).
    pub clearance: f32,
    /// Spacing of the discs sampling every surface (m).
    pub sample_spacing: f32,
    /// Start pose.
    pub start: WorldPoint,
    pub start_heading: f32,
    /// Distance between the wheels (m).
    pub wheel_base: f32,
    /// Ground speed of a wheel at 1% power (m/s).
    pub speed_per_percent: f32,
    /// Pose integration step (ms).
    pub step_ms: u64,
    /// Period of field snapshots offered to the mapper (ms).
    pub perception_interval_ms: u64,
    /// Simulated hub round trip (ms).
    pub send_latency_ms: u64,
    /// Probability that the hub rejects a command.
    pub failure_rate: f32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            seed: 7,
            obstacle_count: 6,
            area_width: 5.0,
            area_depth: 5.0,
            obstacle_radius_min: 0.15,
            obstacle_radius_max: 0.35,
            obstacle_height: 0.5,
            clearance: 0.8,
            sample_spacing: 0.1,
            start: WorldPoint::new(0.5, 0.5),
            start_heading: 0.0,
            wheel_base: 0.2,
            speed_per_percent: 0.01,
            step_ms: 10,
            perception_interval_ms: 200,
            send_latency_ms: 5,
            failure_rate: 0.02,
        }
    }
}

/// Discs covering a circle of `radius` around the origin at height `y`.
fn sample_disc_patch(radius: f32, y: f32, spacing: f32) -> Vec<Disc> {
    let steps = (radius / spacing).ceil() as i32;
    let mut discs = Vec::new();
    for i in -steps..=steps {
        for j in -steps..=steps {
            let (x, z) = (i as f32 * spacing, j as f32 * spacing);
            if x.hypot(z) <= radius {
                discs.push(Disc::new(Vector3::new(x, y, z), spacing * 0.8));
            }
        }
    }
    discs
}

/// Floor patch plus seeded random obstacles, keyed by anchor id.
///
/// The floor is anchor 0 and obstacles follow from 1. Obstacles never land
/// within `clearance` of any point in `keep_clear`.
pub fn generate_fields(config: &SimulationConfig, keep_clear: &[WorldPoint]) -> Fields {
    let spacing = config.sample_spacing.max(0.01);
    let mut fields = Fields::new();

    let columns = (config.area_width / spacing).ceil() as i32;
    let rows = (config.area_depth / spacing).ceil() as i32;
    let floor = (0..=columns)
        .flat_map(|i| (0..=rows).map(move |j| (i, j)))
        .map(|(i, j)| Disc::new(Vector3::new(i as f32 * spacing, 0.0, j as f32 * spacing), spacing * 0.8));
    fields.insert(0, Field::new(Matrix4::identity(), floor));

    let mut rng = StdRng::seed_from_u64(config.seed);
    let radius_max = config.obstacle_radius_max.max(config.obstacle_radius_min);
    let mut id = 1;
    let mut attempts = 0;
    while id <= config.obstacle_count as u64 && attempts < config.obstacle_count * 100 {
        attempts += 1;
        let radius = rng.random_range(config.obstacle_radius_min..=radius_max);
        let center = WorldPoint::new(
            rng.random_range(radius..=(config.area_width - radius).max(radius)),
            rng.random_range(radius..=(config.area_depth - radius).max(radius)),
        );
        if keep_clear.iter().any(|p| p.distance(center) < config.clearance + radius) {
            continue;
        }
        let transform = Matrix4::new_translation(&Vector3::new(center.x, 0.0, center.y));
        fields.insert(id, Field::new(transform, sample_disc_patch(radius, config.obstacle_height, spacing)));
        debug!(id, %center, radius, "obstacle placed");
        id += 1;
    }
    fields
}

/// Advances `agent` by `dt` seconds at the given wheel speeds.
///
/// The ground plane is (x, z) of a y-up world, so a faster left wheel turns
/// the robot right, which raises the heading.
pub fn integrate(agent: &Agent, speeds: WheelSpeeds, config: &SimulationConfig, dt: f32) -> Agent {
    let v_l = speeds.left * config.speed_per_percent;
    let v_r = speeds.right * config.speed_per_percent;

    let v = (v_r + v_l) / 2.0;
    let omega = (v_l - v_r) / config.wheel_base;

    let heading = normalize_angle(agent.heading + omega * dt);
    Agent {
        position: agent.position + agent.heading_vector() * (v * dt),
        heading,
        ..*agent
    }
}

/// Why the simulated hub rejected a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubError {
    /// Random link failure.
    Dropped,
}

impl core::fmt::Display for HubError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            HubError::Dropped => write!(f, "command dropped by simulated link"),
        }
    }
}

impl core::error::Error for HubError {}

/// Motor hub that applies commands to the simulated drive train.
#[derive(Debug)]
pub struct SimulatedHub {
    applied: Arc<RwLock<WheelSpeeds>>,
    latency: Duration,
    failure_rate: f32,
    rng: Mutex<StdRng>,
    bb: Blackboard,
}

impl SimulatedHub {
    pub fn new(config: &SimulationConfig, bb: Blackboard) -> Self {
        SimulatedHub {
            applied: Arc::default(),
            latency: Duration::from_millis(config.send_latency_ms),
            failure_rate: config.failure_rate,
            rng: Mutex::new(StdRng::seed_from_u64(config.seed.wrapping_add(1))),
            bb,
        }
    }

    /// Wheel speeds currently applied to the drive train.
    pub fn applied(&self) -> Arc<RwLock<WheelSpeeds>> {
        Arc::clone(&self.applied)
    }
}

impl MotorHub for SimulatedHub {
    type Error = HubError;

    async fn send(&self, command: MotorCommand) -> Result<(), HubError> {
        let dropped = self.failure_rate > 0.0 && self.rng.lock().random::<f32>() < self.failure_rate;
        tokio::time::sleep(self.latency).await;
        if dropped {
            return Err(HubError::Dropped);
        }
        *self.applied.write() = match command {
            MotorCommand::Drive { left, right, .. } => WheelSpeeds::new(left as f32, right as f32),
            MotorCommand::Stop { .. } => WheelSpeeds::ZERO,
        };
        record_command(&self.bb, command);
        Ok(())
    }
}

/// Everything the simulation thread publishes to.
pub struct SimulationLinks {
    pub applied: Arc<RwLock<WheelSpeeds>>,
    pub agent: Topic<Option<Agent>>,
    pub mapping: Arc<PendingSlot<MappingInput>>,
    pub fields: Arc<Fields>,
    pub bb: Blackboard,
    pub shutdown: Arc<AtomicBool>,
}

/// Spawns the pose integrator and perception source thread.
pub fn spawn_simulation(config: SimulationConfig, links: SimulationLinks) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new().name("simulation".into()).spawn(move || {
        info!("Simulation thread started.");
        let sleeper = SpinSleeper::new(10_000);
        let step = Duration::from_millis(config.step_ms.max(1));
        let dt = step.as_secs_f32();
        let perception_every = (config.perception_interval_ms / config.step_ms.max(1)).max(1);

        let mut agent = Agent::new(config.start, config.start_heading);
        let mut tick: u64 = 0;
        while !links.shutdown.load(Ordering::Acquire) {
            let speeds = *links.applied.read();
            agent = integrate(&agent, speeds, &config, dt);
            links.agent.publish(Some(agent));
            touch_pose(&links.bb);

            if tick % perception_every == 0 {
                let input = MappingInput { agent, fields: Arc::clone(&links.fields) };
                if links.mapping.offer(input).is_some() {
                    debug!("Mapper busy, replaced pending snapshot.");
                }
            }
            tick += 1;
            sleeper.sleep(step);
        }
        info!(%agent, "Simulation thread stopped.");
    })
}
