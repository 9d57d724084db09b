use tracing::debug;

use super::astar::astar_search;
use crate::geometry::{GridPoint, WorldPoint};
use crate::map::OccupancyGrid;

/// Plans waypoint lists over one occupancy grid.
#[derive(Debug, Clone, Copy)]
pub struct PathFinder<'a> {
    grid: &'a OccupancyGrid,
}

impl<'a> PathFinder<'a> {
    /// Creates a path finder over `grid`.
    pub fn new(grid: &'a OccupancyGrid) -> Self {
        PathFinder { grid }
    }

    /// Cheapest cell path from `source` to `target`, excluding `source`.
    pub fn find_path(&self, source: GridPoint, target: GridPoint) -> Vec<GridPoint> {
        let result = astar_search(self.grid, source, target);
        debug!(%source, %target, %result, "grid search finished");
        result.into_path()
    }

    /// Drops every point of `path` before the farthest one visible from `source`.
    ///
    /// Visibility is tested from index 2 on, so the first step is only dropped
    /// when something beyond it is visible.
    pub fn smooth_path(&self, source: GridPoint, path: &[GridPoint]) -> Vec<GridPoint> {
        let mut next = 0;
        for (i, &point) in path.iter().enumerate().skip(2) {
            if self.grid.intersects(source, point).is_none() {
                next = i;
            }
        }
        path[next..].to_vec()
    }

    /// World-space waypoints from `source` to `target`.
    ///
    /// The list starts at `source` and ends exactly at `target`; it is empty
    /// when no path exists or both points fall in the same cell.
    pub fn find_waypoints(&self, source: WorldPoint, target: WorldPoint) -> Vec<WorldPoint> {
        let from = self.grid.to_grid(source);
        let to = self.grid.to_grid(target);

        let rough = self.find_path(from, to);
        if rough.is_empty() {
            return Vec::new();
        }
        let smoothed = self.smooth_path(from, &rough);

        match smoothed.split_last() {
            Some((_, [])) | None => vec![source, target],
            Some((_, inner)) => {
                let mut waypoints = Vec::with_capacity(inner.len() + 2);
                waypoints.push(source);
                waypoints.extend(inner.iter().map(|&cell| self.grid.to_world(cell)));
                waypoints.push(target);
                waypoints
            }
        }
    }
}
