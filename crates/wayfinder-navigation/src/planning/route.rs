use std::fmt;
use std::sync::Arc;

use super::path_finder::PathFinder;
use crate::geometry::WorldPoint;
use crate::map::OccupancyGrid;
use crate::types::Agent;

/// A planned route and the inputs it was planned from.
#[derive(Debug, Clone)]
pub struct Route {
    /// Agent snapshot at planning time.
    pub agent: Agent,
    /// Requested goal.
    pub goal: WorldPoint,
    /// Grid the route was planned on.
    pub grid: Arc<OccupancyGrid>,
    /// Waypoints from the agent position to the goal; empty if the goal is unreachable.
    pub waypoints: Vec<WorldPoint>,
}

impl Route {
    /// Plans a route for `agent` to `goal` over `grid`.
    pub fn plan(agent: Agent, goal: WorldPoint, grid: Arc<OccupancyGrid>) -> Self {
        let waypoints = PathFinder::new(&grid).find_waypoints(agent.position, goal);
        Route { agent, goal, grid, waypoints }
    }

    /// True when no path was found.
    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    /// Length of the waypoint polyline (m).
    pub fn length(&self) -> f32 {
        self.waypoints.windows(2).map(|w| w[0].distance(w[1])).sum()
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Route {{ goal: {}, waypoints: {}, length: {:.2} m }}", self.goal, self.waypoints.len(), self.length())
    }
}
