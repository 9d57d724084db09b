mod blackboard; // brings `blackboard.rs` in as `crate::blackboard`
mod bus; // brings `bus.rs` in as `crate::bus`
mod mapping; // brings `mapping.rs` in as `crate::mapping`
mod settings; // brings `settings.rs` in as `crate::settings`
mod simulation; // brings `simulation.rs` in as `crate::simulation`

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use wayfinder_control::{
    Dispatcher, MotorCommand, MotorHub, SteeringController, run_dispatch_task, run_steering_task,
};
use wayfinder_navigation::{
    Agent, Mapper, Navigator, OccupancyGrid, RouterInputs, run_navigator_task, run_router_task,
};

use blackboard::{Blackboard, clear_fault, raise_fault, snapshot};
use bus::{PendingSlot, Topic};
use settings::Settings;
use simulation::{SimulatedHub, SimulationLinks};

const POSE_FAULT: &str = "pose timeout";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    info!("Wayfinder started.");
    let settings = settings::load_settings()?;
    run(settings).await
}

async fn run(settings: Settings) -> anyhow::Result<()> {
    let bb: Blackboard = Arc::default();
    let shutdown = Arc::new(AtomicBool::new(false));

    let agent_topic: Topic<Option<Agent>> = Topic::new(None);
    let grid_topic: Topic<Option<Arc<OccupancyGrid>>> = Topic::new(None);
    let mapping_inputs = Arc::new(PendingSlot::new());
    let (goal_tx, goal_rx) = watch::channel(settings.mission.goal);
    let (route_tx, route_rx) = watch::channel(None);
    let (trajectory_tx, trajectory_rx) = watch::channel(None);
    let (enabled_tx, enabled_rx) = watch::channel(settings.mission.enabled);
    let stop = MotorCommand::stop(settings.steering.left_port, settings.steering.right_port);
    let (command_tx, command_rx) = watch::channel(stop);

    let hub = Arc::new(SimulatedHub::new(&settings.simulation, bb.clone()));
    let mut keep_clear = vec![settings.simulation.start];
    keep_clear.extend(settings.mission.goal);
    let fields = Arc::new(simulation::generate_fields(&settings.simulation, &keep_clear));
    info!(fields = fields.len(), goal = ?settings.mission.goal, "Simulated world generated.");

    info!("Spawning mapping thread...");
    let mapping = mapping::spawn_mapping_worker(
        Mapper::new(settings.mapper_config()),
        Arc::clone(&mapping_inputs),
        grid_topic.clone(),
        settings.runtime.mapping_cooldown(),
    )?;

    info!("Spawning simulation thread...");
    let simulation = simulation::spawn_simulation(
        settings.simulation,
        SimulationLinks {
            applied: hub.applied(),
            agent: agent_topic.clone(),
            mapping: Arc::clone(&mapping_inputs),
            fields,
            bb: bb.clone(),
            shutdown: Arc::clone(&shutdown),
        },
    )?;

    let mut tasks = JoinSet::new();
    tasks.spawn(run_router_task(
        RouterInputs { agent: agent_topic.subscribe(), grid: grid_topic.subscribe(), goal: goal_rx },
        route_tx,
        settings.runtime.route_interval(),
    ));
    tasks.spawn(run_navigator_task(
        Navigator::new(settings.navigator),
        agent_topic.subscribe(),
        route_rx,
        trajectory_tx,
    ));
    tasks.spawn(run_steering_task(
        SteeringController::new(settings.steering),
        trajectory_rx,
        enabled_rx,
        command_tx,
    ));
    tasks.spawn(run_dispatch_task(Dispatcher::new(Arc::clone(&hub)), command_rx, settings.runtime.command_interval()));
    tasks.spawn(watchdog(bb.clone(), agent_topic.clone(), settings.runtime.pose_timeout(), settings.runtime.watchdog_interval()));

    let deadline = settings.mission.duration_secs.map(Duration::from_secs_f32);
    let result: anyhow::Result<()> = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down.");
            Ok(())
        }
        _ = sleep_or_forever(deadline) => {
            info!("Mission duration elapsed, shutting down.");
            Ok(())
        }
        Some(joined) = tasks.join_next() => {
            match joined {
                Ok(Ok(())) => {
                    warn!("A task finished early, shutting down.");
                    Ok(())
                }
                Ok(Err(e)) => {
                    error!("Task failed: {:?}", e);
                    Err(e)
                }
                Err(e) => {
                    error!("Task panicked or was cancelled: {:?}", e);
                    Err(e.into())
                }
            }
        }
    };

    enabled_tx.send_replace(false);
    goal_tx.send_replace(None);
    tasks.shutdown().await;
    if let Err(e) = hub.send(stop).await {
        warn!(error = %e, "Final stop command failed.");
    }

    shutdown.store(true, Ordering::Release);
    mapping_inputs.close();
    if simulation.join().is_err() {
        error!("Simulation thread panicked.");
    }
    if mapping.join().is_err() {
        error!("Mapping thread panicked.");
    }

    let state = snapshot(&bb);
    info!(faults = ?state.faults, last_command = ?state.last_command, "Wayfinder stopped.");
    result
}

async fn sleep_or_forever(deadline: Option<Duration>) {
    match deadline {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending().await,
    }
}

/// Clears the agent topic when the pose goes stale so the navigator stops
/// producing trajectories.
async fn watchdog(
    bb: Blackboard,
    agent: Topic<Option<Agent>>,
    timeout: Duration,
    period: Duration,
) -> anyhow::Result<()> {
    info!("Watchdog task started.");
    let mut tick = tokio::time::interval(period);
    loop {
        tick.tick().await;
        let age = snapshot(&bb).pose_age(Instant::now());
        if age > timeout {
            if raise_fault(&bb, POSE_FAULT) {
                warn!(?age, "Pose timeout! Dropping pose until it recovers.");
            }
            if agent.latest().is_some() {
                agent.publish(None);
            }
        } else if clear_fault(&bb, POSE_FAULT) {
            info!(?age, "Pose recovered.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wayfinder_navigation::WorldPoint;

    #[tokio::test(start_paused = true)]
    async fn test_watchdog_clears_stale_pose() {
        let bb: Blackboard = Arc::default();
        let agent: Topic<Option<Agent>> = Topic::new(Some(Agent::new(WorldPoint::ZERO, 0.0)));
        blackboard::touch_pose(&bb);
        bb.write().last_pose_ts = Some(Instant::now() - Duration::from_secs(1));

        let task = tokio::spawn(watchdog(bb.clone(), agent.clone(), Duration::from_millis(250), Duration::from_millis(25)));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(agent.latest(), None);
        assert_eq!(snapshot(&bb).faults, vec![POSE_FAULT.to_string()]);

        blackboard::touch_pose(&bb);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(snapshot(&bb).faults.is_empty());
        task.abort();
    }
}
