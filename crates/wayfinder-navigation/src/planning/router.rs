use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

use super::route::Route;
use crate::geometry::WorldPoint;
use crate::map::OccupancyGrid;
use crate::types::Agent;

/// Latest-value inputs of the router.
pub struct RouterInputs {
    /// Current agent pose, `None` while unknown.
    pub agent: watch::Receiver<Option<Agent>>,
    /// Most recent occupancy grid.
    pub grid: watch::Receiver<Option<Arc<OccupancyGrid>>>,
    /// Operator goal, `None` when idle.
    pub goal: watch::Receiver<Option<WorldPoint>>,
}

/// Re-plans at most once per `period`, and only after an input changed.
///
/// The search runs on the blocking pool; producers are never blocked. A
/// missing agent, grid or goal publishes `None`. The task ends when any
/// input sender is dropped.
pub async fn run_router_task(
    mut inputs: RouterInputs,
    route_tx: watch::Sender<Option<Arc<Route>>>,
    period: Duration,
) -> anyhow::Result<()> {
    info!(?period, "Router task started.");
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let changed = [
            inputs.agent.has_changed(),
            inputs.grid.has_changed(),
            inputs.goal.has_changed(),
        ];
        if changed.iter().any(Result::is_err) {
            info!("Router inputs closed, stopping.");
            return Ok(());
        }
        if !changed.iter().any(|c| matches!(c, Ok(true))) {
            continue;
        }

        let agent = *inputs.agent.borrow_and_update();
        let grid = inputs.grid.borrow_and_update().clone();
        let goal = *inputs.goal.borrow_and_update();

        let route = match (agent, grid, goal) {
            (Some(agent), Some(grid), Some(goal)) => {
                let route = tokio::task::spawn_blocking(move || Route::plan(agent, goal, grid)).await?;
                debug!(%route, "route planned");
                Some(Arc::new(route))
            }
            _ => None,
        };
        route_tx.send_replace(route);
    }
}
