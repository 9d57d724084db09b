#![warn(missing_docs)]

use std::fmt;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::space::CoordinateSpace;
use crate::error::NavigationError;
use crate::geometry::{GridPoint, WorldPoint};

/// Raw value of a cell that was never observed.
pub const UNKNOWN: f32 = -1.0;

/// Tunables for traversal cost and line-of-sight queries.
///
/// `min_move_cost` shapes the planner, `obstacle_threshold` decides what
/// blocks line of sight; the two are independent.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct GridCosts {
    /// Cost per cell of moving across perfectly free space, in `(0, 1]`.
    pub min_move_cost: f32,
    /// Raw cost at or above which a cell blocks line of sight.
    pub obstacle_threshold: f32,
}

impl Default for GridCosts {
    fn default() -> Self {
        GridCosts { min_move_cost: 0.05, obstacle_threshold: 0.2 }
    }
}

/// Immutable cost field produced by one mapping cycle.
///
/// Raw values are `-1` for unknown cells and `[0, 1]` for observed ones,
/// where `0` is free floor and `1` is impassable. The buffer is shared, so
/// clones are cheap.
#[derive(Debug, Clone)]
pub struct OccupancyGrid {
    width: usize,
    height: usize,
    space: CoordinateSpace,
    data: Arc<[f32]>,
    costs: GridCosts,
}

impl OccupancyGrid {
    /// Creates a grid over `data`, stored row-major.
    ///
    /// # Errors
    /// Returns `InvalidDimensions` for an empty or oversized grid and
    /// `BufferMismatch` when `data` does not hold `width * height` cells.
    pub fn new(width: usize, height: usize, space: CoordinateSpace, data: Vec<f32>) -> Result<Self, NavigationError> {
        if width == 0 || height == 0 {
            return Err(NavigationError::InvalidDimensions("Width and height must be non-zero"));
        }
        if width > i32::MAX as usize || height > i32::MAX as usize {
            return Err(NavigationError::InvalidDimensions("Grid dimensions exceed the cell coordinate range"));
        }
        match width.checked_mul(height) {
            Some(n) if n == data.len() => Ok(Self::from_parts(width, height, space, data.into())),
            Some(_) => Err(NavigationError::BufferMismatch("Data length must equal width * height")),
            None => Err(NavigationError::InvalidDimensions("Map dimensions too large, would cause overflow")),
        }
    }

    /// Creates a grid whose cells are initialized by `f`.
    ///
    /// # Errors
    /// Same as [`OccupancyGrid::new`].
    pub fn from_fn(
        width: usize,
        height: usize,
        space: CoordinateSpace,
        f: impl Fn(GridPoint) -> f32,
    ) -> Result<Self, NavigationError> {
        let data = (0..width * height)
            .map(|i| f(GridPoint::new((i % width) as i32, (i / width) as i32)))
            .collect();
        Self::new(width, height, space, data)
    }

    pub(crate) fn from_parts(width: usize, height: usize, space: CoordinateSpace, data: Arc<[f32]>) -> Self {
        debug_assert_eq!(data.len(), width * height);
        OccupancyGrid { width, height, space, data, costs: GridCosts::default() }
    }

    /// Replaces the cost tunables.
    #[must_use]
    pub fn with_costs(mut self, costs: GridCosts) -> Self {
        self.costs = costs;
        self
    }

    /// Width in cells.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in cells.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Coordinate space of the grid.
    pub fn space(&self) -> &CoordinateSpace {
        &self.space
    }

    /// Cost tunables in effect.
    pub fn costs(&self) -> &GridCosts {
        &self.costs
    }

    /// Raw row-major cell values.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// True if `cell` lies inside the grid.
    pub fn contains(&self, cell: GridPoint) -> bool {
        cell.x >= 0 && cell.y >= 0 && (cell.x as usize) < self.width && (cell.y as usize) < self.height
    }

    fn index(&self, cell: GridPoint) -> Option<usize> {
        self.contains(cell).then(|| cell.y as usize * self.width + cell.x as usize)
    }

    /// Raw value of `cell`, or `None` outside the grid.
    pub fn raw(&self, cell: GridPoint) -> Option<f32> {
        self.index(cell).map(|i| self.data[i])
    }

    /// True if `cell` is unknown or fully occupied. Out-of-bounds cells are not blocked, just absent.
    pub fn is_blocked(&self, cell: GridPoint) -> bool {
        self.raw(cell).is_some_and(|raw| raw < 0.0 || raw >= 1.0)
    }

    /// Planning cost of occupying `cell`, in `[0, 1]`.
    ///
    /// The occupancy is squared so half-occupied margins stay cheap relative
    /// to their cores; unknown cells cost the maximum.
    pub fn cost(&self, cell: GridPoint) -> Option<f32> {
        self.raw(cell).map(|raw| if raw < 0.0 { 1.0 } else { raw.min(1.0).powi(2) })
    }

    /// Cost of the move `from -> to`, or `None` if `to` is outside or blocked.
    pub fn edge_cost(&self, from: GridPoint, to: GridPoint) -> Option<f32> {
        let target = self.cost(to)?;
        if self.is_blocked(to) {
            return None;
        }
        let m = self.costs.min_move_cost;
        Some((m + target * (1.0 - m)).clamp(m, 1.0) * from.distance(to))
    }

    /// Lower bound on the cost of any path between two cells.
    pub fn heuristic(&self, from: GridPoint, to: GridPoint) -> f32 {
        from.distance(to) * self.costs.min_move_cost
    }

    /// The eight surrounding cells, unfiltered.
    pub fn neighbors(&self, cell: GridPoint) -> [GridPoint; 8] {
        GridPoint::DIRECTIONS.map(|d| cell + d)
    }

    /// Walks the line `from -> to` and returns the first cell (with its raw
    /// value) that blocks line of sight. `to` itself is not tested.
    pub fn intersects(&self, from: GridPoint, to: GridPoint) -> Option<(GridPoint, f32)> {
        let (mut x, mut y) = (from.x, from.y);
        let dx = (to.x - x).abs();
        let dy = -(to.y - y).abs();
        let sx = if x < to.x { 1 } else { -1 };
        let sy = if y < to.y { 1 } else { -1 };
        let mut err = dx + dy;

        while (x, y) != (to.x, to.y) {
            let cell = GridPoint::new(x, y);
            if let Some(raw) = self.raw(cell) {
                if raw < 0.0 || raw >= self.costs.obstacle_threshold {
                    return Some((cell, raw));
                }
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
        None
    }

    /// Cell containing a world point.
    pub fn to_grid(&self, point: WorldPoint) -> GridPoint {
        self.space.to_grid(point)
    }

    /// World position of a cell.
    pub fn to_world(&self, cell: GridPoint) -> WorldPoint {
        self.space.to_world(cell)
    }
}

impl fmt::Display for OccupancyGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "OccupancyGrid ({}x{}, scale: {} cells/m)", self.width, self.height, self.space.scale())?;
        for row in self.data.chunks(self.width).rev() {
            for &raw in row {
                let c = match raw {
                    r if r < 0.0 => '?',
                    r if r >= 1.0 => '#',
                    r if r >= self.costs.obstacle_threshold => '+',
                    _ => '.',
                };
                write!(f, "{c}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
