use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::geometry::WorldPoint;
use crate::planning::Route;
use crate::types::{Agent, Trajectory};

/// Distances that decide when a waypoint, and the whole route, count as reached.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct NavigatorConfig {
    /// Waypoints closer than this are skipped (m).
    pub waypoint_threshold: f32,
    /// Remaining route length at which the agent has arrived (m).
    pub arrival_threshold: f32,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        NavigatorConfig { waypoint_threshold: 0.25, arrival_threshold: 0.5 }
    }
}

/// Reduces a waypoint list to one relative steering target.
#[derive(Debug, Clone, Copy, Default)]
pub struct Navigator {
    config: NavigatorConfig,
}

impl Navigator {
    /// Creates a navigator.
    pub fn new(config: NavigatorConfig) -> Self {
        Navigator { config }
    }

    /// Trajectory toward the next waypoint that is not already reached.
    ///
    /// # Returns
    /// `None` when there is nothing to follow (fewer than two waypoints), when
    /// every waypoint is within reach, or when the route length still ahead of
    /// the agent is within the arrival threshold.
    pub fn trajectory(&self, agent: &Agent, waypoints: &[WorldPoint]) -> Option<Trajectory> {
        if waypoints.len() < 2 {
            return None;
        }

        let position = agent.position;
        let (index, &target) = waypoints
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, w)| position.distance(**w) >= self.config.waypoint_threshold)?;

        let remaining: f32 = waypoints[index - 1..].windows(2).map(|w| w[0].distance(w[1])).sum();
        if remaining <= self.config.arrival_threshold {
            return None;
        }

        let offset = target - position;
        let heading = agent.heading_vector();
        let bearing = match offset.normalized() {
            Some(direction) => heading.signed_angle_to(direction),
            None => 0.0,
        };
        Some(Trajectory::new(bearing, offset.length()))
    }
}

/// Recomputes the trajectory whenever the agent pose or the route changes.
///
/// A missing pose or route publishes `None`. The task ends when either input
/// sender is dropped.
pub async fn run_navigator_task(
    navigator: Navigator,
    mut agent_rx: watch::Receiver<Option<Agent>>,
    mut route_rx: watch::Receiver<Option<Arc<Route>>>,
    trajectory_tx: watch::Sender<Option<Trajectory>>,
) -> anyhow::Result<()> {
    info!("Navigator task started.");
    loop {
        tokio::select! {
            changed = agent_rx.changed() => if changed.is_err() { break },
            changed = route_rx.changed() => if changed.is_err() { break },
        }

        let agent = *agent_rx.borrow_and_update();
        let route = route_rx.borrow_and_update().clone();
        let trajectory = match (agent, route) {
            (Some(agent), Some(route)) => navigator.trajectory(&agent, &route.waypoints),
            _ => None,
        };
        debug!(?trajectory, "trajectory updated");
        trajectory_tx.send_replace(trajectory);
    }
    info!("Navigator inputs closed, stopping.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{CoordinateSpace, OccupancyGrid};
    use approx::assert_relative_eq;
    use core::f32::consts::FRAC_PI_2;
    use std::time::Duration;

    fn at(x: f32, y: f32, heading: f32) -> Agent {
        Agent::new(WorldPoint::new(x, y), heading)
    }

    #[test]
    fn test_bearing_to_waypoint() {
        let navigator = Navigator::default();
        let waypoints = [WorldPoint::new(0.0, 0.0), WorldPoint::new(0.0, 2.0)];
        let trajectory = navigator.trajectory(&at(0.0, 0.0, 0.0), &waypoints).unwrap();
        assert_relative_eq!(trajectory.heading, FRAC_PI_2, epsilon = 1e-6);
        assert_relative_eq!(trajectory.distance, 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_bearing_is_relative_to_heading() {
        let navigator = Navigator::default();
        let waypoints = [WorldPoint::new(0.0, 0.0), WorldPoint::new(0.0, 2.0)];
        let trajectory = navigator.trajectory(&at(0.0, 0.0, FRAC_PI_2), &waypoints).unwrap();
        assert_relative_eq!(trajectory.heading, 0.0, epsilon = 1e-6);

        let trajectory = navigator.trajectory(&at(0.0, 0.0, core::f32::consts::PI), &waypoints).unwrap();
        assert_relative_eq!(trajectory.heading, -FRAC_PI_2, epsilon = 1e-5);
    }

    #[test]
    fn test_too_few_waypoints() {
        let navigator = Navigator::default();
        assert_eq!(navigator.trajectory(&at(0.0, 0.0, 0.0), &[]), None);
        assert_eq!(navigator.trajectory(&at(0.0, 0.0, 0.0), &[WorldPoint::new(3.0, 0.0)]), None);
    }

    #[test]
    fn test_arrival_within_threshold() {
        let navigator = Navigator::default();
        let waypoints = [WorldPoint::new(0.0, 0.0), WorldPoint::new(0.4, 0.0)];
        assert_eq!(navigator.trajectory(&at(0.0, 0.0, 0.0), &waypoints), None);

        let waypoints = [WorldPoint::new(3.0, 3.7), WorldPoint::new(3.0, 4.0)];
        assert_eq!(navigator.trajectory(&at(3.0, 3.7, FRAC_PI_2), &waypoints), None);

        let waypoints = [WorldPoint::new(0.0, 0.0), WorldPoint::new(3.0, 0.0), WorldPoint::new(3.0, 4.0)];
        assert_eq!(navigator.trajectory(&at(3.0, 3.9, FRAC_PI_2), &waypoints[1..]), None);
    }

    #[test]
    fn test_reached_waypoints_are_skipped() {
        let navigator = Navigator::default();
        let waypoints = [WorldPoint::new(0.0, 0.0), WorldPoint::new(3.0, 0.0), WorldPoint::new(3.0, 4.0)];

        let trajectory = navigator.trajectory(&at(0.0, 0.0, 0.0), &waypoints).unwrap();
        assert_relative_eq!(trajectory.distance, 3.0, epsilon = 1e-6);
        assert_relative_eq!(trajectory.heading, 0.0, epsilon = 1e-6);

        let trajectory = navigator.trajectory(&at(2.9, 0.0, 0.0), &waypoints).unwrap();
        assert_relative_eq!(trajectory.distance, 0.1f32.hypot(4.0), epsilon = 1e-5);
        assert!(trajectory.heading > 1.5);
    }

    #[tokio::test]
    async fn test_navigator_task_follows_inputs() {
        let space = CoordinateSpace::new(WorldPoint::ZERO, WorldPoint::new(5.0, 5.0), 10.0, 0.0, 1.8).unwrap();
        let grid = Arc::new(OccupancyGrid::from_fn(50, 50, space, |_| 0.0).unwrap());
        let agent = at(1.0, 1.0, 0.0);
        let route = Route::plan(agent, WorldPoint::new(4.0, 1.0), grid);

        let (agent_tx, agent_rx) = watch::channel(None);
        let (route_tx, route_rx) = watch::channel(None);
        let (trajectory_tx, mut trajectory_rx) = watch::channel(None);
        let task = tokio::spawn(run_navigator_task(Navigator::default(), agent_rx, route_rx, trajectory_tx));

        agent_tx.send_replace(Some(agent));
        route_tx.send_replace(Some(Arc::new(route)));
        let trajectory = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                trajectory_rx.changed().await.unwrap();
                if let Some(t) = *trajectory_rx.borrow_and_update() {
                    return t;
                }
            }
        })
        .await
        .unwrap();
        assert_relative_eq!(trajectory.distance, 3.0, epsilon = 1e-5);

        agent_tx.send_replace(None);
        tokio::time::timeout(Duration::from_secs(5), async {
            while trajectory_rx.borrow_and_update().is_some() {
                trajectory_rx.changed().await.unwrap();
            }
        })
        .await
        .unwrap();

        drop(agent_tx);
        tokio::time::timeout(Duration::from_secs(5), task).await.unwrap().unwrap().unwrap();
    }
}
