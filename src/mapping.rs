use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use spin_sleep::SpinSleeper;
use tracing::{debug, error, info};

use wayfinder_navigation::{Agent, Fields, Mapper, OccupancyGrid};

use crate::bus::{PendingSlot, Topic};

/// One snapshot for the mapping worker.
#[derive(Debug, Clone)]
pub struct MappingInput {
    pub agent: Agent,
    pub fields: Arc<Fields>,
}

/// Spawns the mapping worker.
///
/// The worker builds one grid per pending input and rests for `cooldown`
/// after each build. It exits once `inputs` is closed.
pub fn spawn_mapping_worker(
    mut mapper: Mapper,
    inputs: Arc<PendingSlot<MappingInput>>,
    grid: Topic<Option<Arc<OccupancyGrid>>>,
    cooldown: Duration,
) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new().name("mapping".into()).spawn(move || {
        info!("Mapping thread started.");
        let sleeper = SpinSleeper::new(100_000);
        while let Some(input) = inputs.take() {
            let started = Instant::now();
            match mapper.update(&input.agent, &input.fields) {
                Ok(Some(built)) => {
                    debug!(
                        width = built.width(),
                        height = built.height(),
                        elapsed = ?started.elapsed(),
                        "Grid built."
                    );
                    grid.publish(Some(Arc::new(built)));
                }
                Ok(None) => debug!("No geometry, keeping previous grid."),
                Err(e) => error!(error = %e, "Grid build failed."),
            }
            sleeper.sleep(cooldown);
        }
        info!("Mapping inputs closed, mapping thread stopping.");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Matrix4, Vector3};
    use wayfinder_navigation::WorldPoint;
    use wayfinder_navigation::map::{Disc, Field, MapperConfig};

    fn floor() -> Fields {
        let discs = (0..20).flat_map(|i| (0..20).map(move |j| Disc::new(Vector3::new(i as f32 * 0.1, 0.0, j as f32 * 0.1), 0.08)));
        Fields::from([(1, Field::new(Matrix4::identity(), discs))])
    }

    #[test]
    fn test_worker_publishes_grid_and_stops_on_close() {
        let inputs = Arc::new(PendingSlot::new());
        let grid: Topic<Option<Arc<OccupancyGrid>>> = Topic::new(None);
        let worker = spawn_mapping_worker(
            Mapper::new(MapperConfig::default()),
            Arc::clone(&inputs),
            grid.clone(),
            Duration::from_millis(1),
        )
        .unwrap();

        let agent = Agent::new(WorldPoint::new(1.0, 1.0), 0.0);
        inputs.offer(MappingInput { agent, fields: Arc::new(floor()) });

        let deadline = Instant::now() + Duration::from_secs(10);
        while grid.latest().is_none() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        let built = grid.latest().unwrap();
        assert_eq!((built.width(), built.height()), (100, 100));
        assert!(!built.is_blocked(built.to_grid(agent.position)));

        inputs.close();
        worker.join().unwrap();
    }

    #[test]
    fn test_empty_snapshot_keeps_previous_grid() {
        let inputs = Arc::new(PendingSlot::new());
        let grid: Topic<Option<Arc<OccupancyGrid>>> = Topic::new(None);
        let worker =
            spawn_mapping_worker(Mapper::default(), Arc::clone(&inputs), grid.clone(), Duration::ZERO).unwrap();

        inputs.offer(MappingInput { agent: Agent::new(WorldPoint::ZERO, 0.0), fields: Arc::new(Fields::new()) });
        inputs.close();
        worker.join().unwrap();
        assert!(grid.latest().is_none());
    }
}
