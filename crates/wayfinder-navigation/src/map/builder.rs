use nalgebra::Matrix4;
use tracing::{debug, trace};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::field::{Disc, Field};
use super::filter::{gaussian_blur, minimum_composite, minimum_filter};
use super::grid::{OccupancyGrid, UNKNOWN};
use super::space::CoordinateSpace;
use crate::error::NavigationError;
use crate::geometry::{GridPoint, WorldPoint};

/// Tunables for rasterization and the finishing pass.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct GridBuilderConfig {
    /// Surfaces at or above this height over the floor reference are ignored (m).
    pub ceiling_height: f32,
    /// Normalized height band around the floor that still counts as floor.
    pub floor_tolerance: f32,
    /// Radius of the minimum filter that removes spurious free cells (cells).
    pub erosion_radius: usize,
    /// Blur standard deviation as a multiple of the robot radius.
    pub margin_scale: f32,
}

impl Default for GridBuilderConfig {
    fn default() -> Self {
        GridBuilderConfig {
            ceiling_height: 1.8,
            floor_tolerance: 0.063,
            erosion_radius: 3,
            margin_scale: 2.0,
        }
    }
}

/// Rasterizes fields into a height buffer and finishes it into an [`OccupancyGrid`].
///
/// Two buffers are kept: the active one accumulates the current cycle while
/// the other holds the previous cycle. [`GridBuilder::reset`] swaps them.
/// The accumulation and scratch buffers are reallocated only when the
/// dimensions change; each [`GridBuilder::build`] allocates the cost field it
/// hands out.
#[derive(Debug)]
pub struct GridBuilder {
    width: usize,
    height: usize,
    space: CoordinateSpace,
    margin: f32,
    config: GridBuilderConfig,
    buffers: [Vec<f32>; 2],
    active: usize,
    scratch: [Vec<f32>; 3],
}

impl GridBuilder {
    /// Creates a builder with both buffers unknown.
    ///
    /// # Arguments
    /// * `width`, `height` - Grid dimensions in cells
    /// * `space` - Mapping from world to grid
    /// * `margin` - Robot radius (m); the obstacle margin grows with it
    /// * `config` - Rasterization tunables
    ///
    /// # Errors
    /// Returns `InvalidDimensions` for an empty or oversized grid.
    pub fn new(
        width: usize,
        height: usize,
        space: CoordinateSpace,
        margin: f32,
        config: GridBuilderConfig,
    ) -> Result<Self, NavigationError> {
        if width == 0 || height == 0 {
            return Err(NavigationError::InvalidDimensions("Width and height must be non-zero"));
        }
        if width > i32::MAX as usize || height > i32::MAX as usize {
            return Err(NavigationError::InvalidDimensions("Grid dimensions exceed the cell coordinate range"));
        }
        let len = width
            .checked_mul(height)
            .ok_or(NavigationError::InvalidDimensions("Map dimensions too large, would cause overflow"))?;

        Ok(GridBuilder {
            width,
            height,
            space,
            margin,
            config,
            buffers: [vec![UNKNOWN; len], vec![UNKNOWN; len]],
            active: 0,
            scratch: [vec![0.0; len], vec![0.0; len], vec![0.0; len]],
        })
    }

    /// Grid dimensions as `(width, height)`.
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Current coordinate space.
    pub fn space(&self) -> &CoordinateSpace {
        &self.space
    }

    /// Replaces the coordinate space for the next cycle.
    pub fn set_space(&mut self, space: CoordinateSpace) {
        self.space = space;
    }

    /// Updates the robot radius used for the obstacle margin.
    pub fn set_margin(&mut self, margin: f32) {
        self.margin = margin;
    }

    /// Starts a new cycle: swaps buffers and marks every active cell unknown.
    pub fn reset(&mut self) {
        self.active ^= 1;
        self.buffers[self.active].fill(UNKNOWN);
    }

    /// Height buffer being accumulated.
    pub fn current(&self) -> &[f32] {
        &self.buffers[self.active]
    }

    /// Height buffer of the previous cycle.
    pub fn previous(&self) -> &[f32] {
        &self.buffers[self.active ^ 1]
    }

    fn index(&self, cell: GridPoint) -> Option<usize> {
        let inside = cell.x >= 0 && cell.y >= 0 && (cell.x as usize) < self.width && (cell.y as usize) < self.height;
        inside.then(|| cell.y as usize * self.width + cell.x as usize)
    }

    /// Rasterizes every disc of `field`.
    pub fn add_field(&mut self, field: &Field) {
        for disc in field.discs() {
            self.add_disc(field.transform(), disc);
        }
    }

    /// Rasterizes one disc, placed in the world by `transform`.
    ///
    /// Discs below the floor reference, at or above the ceiling height, or
    /// with a degenerate radius leave the buffer untouched.
    pub fn add_disc(&mut self, transform: &Matrix4<f32>, disc: &Disc) {
        if disc.is_degenerate() {
            return;
        }
        let p = transform * disc.center;
        assert!(p.w != 0.0, "degenerate disc projection: homogeneous component is zero");

        let height = p.y / p.w - self.space.elevation_min();
        let ceiling = self.config.ceiling_height;
        if !(height >= 0.0 && height < ceiling) {
            trace!(height, "disc outside the floor-to-ceiling band");
            return;
        }

        let center = self.space.to_grid(WorldPoint::new(p.x / p.w, p.z / p.w));
        let radius = self.space.to_grid_length(disc.radius) + 1;
        self.fill_circle(center, radius, height / ceiling);
    }

    /// Fills a midpoint circle, keeping the larger value where cells overlap.
    pub fn fill_circle(&mut self, center: GridPoint, radius: i32, value: f32) {
        if radius <= 0 {
            return;
        }
        if radius == 1 {
            if let Some(i) = self.index(center) {
                self.buffers[self.active][i] = self.buffers[self.active][i].max(value);
            }
            return;
        }
        let (w, h) = (self.width as i32, self.height as i32);
        if center.x + radius < 0 || center.x - radius >= w || center.y + radius < 0 || center.y - radius >= h {
            return;
        }

        let mut d = 3 - 2 * radius;
        let mut y = radius;
        for x in 0..radius {
            self.fill_rows(center.x - x, center.x + x, center.y + y, center.y - y, value);
            self.fill_rows(center.x - y, center.x + y, center.y + x, center.y - x, value);
            if d <= 0 {
                d += 4 * x + 6;
            } else {
                y -= 1;
                d += 4 * (x - y) + 10;
            }
        }
    }

    /// Fills columns `[ax, bx)` of rows `ay` and `by`.
    fn fill_rows(&mut self, ax: i32, bx: i32, ay: i32, by: i32, value: f32) {
        let w = self.width as i32;
        let ux = ax.clamp(0, w) as usize;
        let vx = bx.clamp(0, w) as usize;
        for row in [ay, by] {
            if row < 0 || row >= self.height as i32 {
                continue;
            }
            let start = row as usize * self.width;
            for cell in &mut self.buffers[self.active][start + ux..start + vx] {
                *cell = cell.max(value);
            }
        }
    }

    /// Finishes the current cycle into an immutable grid.
    ///
    /// The floor height is sampled at `floor` (the robot's cell). Cells within
    /// the floor tolerance become free, other observed cells become occupied,
    /// and unobserved cells stay unknown. Occupied regions are then grown by
    /// the erosion radius and given a blurred margin proportional to the robot
    /// radius. The accumulation buffers are left untouched; the returned
    /// grid owns a freshly allocated cost field.
    pub fn build(&mut self, floor: GridPoint) -> OccupancyGrid {
        let (width, height) = (self.width, self.height);
        let floor_height = self
            .index(floor)
            .map(|i| self.buffers[self.active][i])
            .filter(|v| *v >= 0.0)
            .unwrap_or(0.0);

        let raw = &self.buffers[self.active];
        let [clearance, eroded, tmp] = &mut self.scratch;
        let tolerance = self.config.floor_tolerance;
        for (c, &v) in clearance.iter_mut().zip(raw.iter()) {
            *c = if !(0.0..1.0).contains(&v) || (v - floor_height).abs() > tolerance { 0.0 } else { 1.0 };
        }

        minimum_filter(clearance, eroded, tmp, width, height, self.config.erosion_radius);

        let sigma = self.space.to_grid_length(self.margin * self.config.margin_scale) as f32;
        let mut out = vec![0.0; width * height];
        gaussian_blur(eroded, &mut out, tmp, width, height, sigma);
        minimum_composite(&mut out, eroded);

        for (cell, &v) in out.iter_mut().zip(raw.iter()) {
            *cell = if v < 0.0 { UNKNOWN } else { 1.0 - *cell };
        }

        debug!(width, height, floor = %floor, floor_height, sigma, "occupancy grid built");
        OccupancyGrid::from_parts(width, height, self.space.clone(), out.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    const SCALE: f32 = 20.0;

    fn space() -> CoordinateSpace {
        CoordinateSpace::new(WorldPoint::ZERO, WorldPoint::new(5.0, 5.0), SCALE, 0.0, 1.8).unwrap()
    }

    fn builder() -> GridBuilder {
        GridBuilder::new(100, 100, space(), 0.15, GridBuilderConfig::default()).unwrap()
    }

    fn cell(builder: &GridBuilder, x: i32, y: i32) -> f32 {
        builder.current()[builder.index(GridPoint::new(x, y)).unwrap()]
    }

    fn floor_field(x_max: f32) -> Field {
        let mut discs = Vec::new();
        let mut x = 0.0;
        while x <= x_max {
            let mut z = 0.0;
            while z <= 5.0 {
                discs.push(Disc::new(Vector3::new(x, 0.0, z), 0.1));
                z += 0.1;
            }
            x += 0.1;
        }
        Field::new(Matrix4::identity(), discs)
    }

    #[test]
    fn test_invalid_dimensions() {
        assert!(matches!(
            GridBuilder::new(0, 10, space(), 0.15, GridBuilderConfig::default()),
            Err(NavigationError::InvalidDimensions(_))
        ));
    }

    #[test]
    fn test_reset_swaps_buffers() {
        let mut builder = builder();
        builder.fill_circle(GridPoint::new(50, 50), 4, 0.5);
        assert_eq!(cell(&builder, 50, 50), 0.5);

        builder.reset();
        assert!(builder.current().iter().all(|&v| v == UNKNOWN));
        assert_eq!(builder.previous()[50 * 100 + 50], 0.5);

        builder.reset();
        assert!(builder.current().iter().all(|&v| v == UNKNOWN));
        assert!(builder.previous().iter().all(|&v| v == UNKNOWN));
    }

    #[test]
    fn test_circle_is_filled_and_bounded() {
        let mut builder = builder();
        let center = GridPoint::new(40, 60);
        builder.fill_circle(center, 6, 0.3);
        for y in 0..100 {
            for x in 0..100 {
                let d = center.distance(GridPoint::new(x, y));
                let v = cell(&builder, x, y);
                if d <= 4.0 {
                    assert_eq!(v, 0.3, "inside cell ({x}, {y})");
                }
                if d > 7.0 {
                    assert_eq!(v, UNKNOWN, "outside cell ({x}, {y})");
                }
            }
        }
    }

    #[test]
    fn test_circle_max_blend_and_single_pixel() {
        let mut builder = builder();
        builder.fill_circle(GridPoint::new(10, 10), 5, 0.6);
        builder.fill_circle(GridPoint::new(12, 10), 5, 0.2);
        assert_eq!(cell(&builder, 11, 10), 0.6);
        assert_eq!(cell(&builder, 16, 10), 0.2);

        builder.fill_circle(GridPoint::new(80, 80), 1, 0.4);
        assert_eq!(cell(&builder, 80, 80), 0.4);
        assert_eq!(cell(&builder, 81, 80), UNKNOWN);
    }

    #[test]
    fn test_circle_clipped_at_edges() {
        let mut builder = builder();
        builder.fill_circle(GridPoint::new(-2, 99), 6, 0.5);
        builder.fill_circle(GridPoint::new(500, 500), 6, 0.5);
        builder.fill_circle(GridPoint::new(10, 10), 0, 0.5);
        assert_eq!(cell(&builder, 0, 99), 0.5);
        assert_eq!(cell(&builder, 10, 10), UNKNOWN);
    }

    #[test]
    fn test_disc_height_band() {
        let mut builder = builder();
        let identity = Matrix4::identity();
        builder.add_disc(&identity, &Disc::new(Vector3::new(1.0, 0.9, 1.0), 0.1));
        builder.add_disc(&identity, &Disc::new(Vector3::new(2.0, 1.8, 2.0), 0.1));
        builder.add_disc(&identity, &Disc::new(Vector3::new(3.0, -0.1, 3.0), 0.1));
        builder.add_disc(&identity, &Disc::new(Vector3::new(4.0, 0.5, 4.0), 0.0));

        assert_relative_eq!(cell(&builder, 20, 20), 0.5, epsilon = 1e-6);
        assert_eq!(cell(&builder, 40, 40), UNKNOWN);
        assert_eq!(cell(&builder, 60, 60), UNKNOWN);
        assert_eq!(cell(&builder, 80, 80), UNKNOWN);
    }

    #[test]
    fn test_build_classifies_floor_and_obstacles() {
        let mut builder = builder();
        builder.add_field(&floor_field(4.0));
        let obstacle = Field::new(Matrix4::identity(), [Disc::new(Vector3::new(1.0, 0.5, 1.0), 0.2)]);
        builder.add_field(&obstacle);
        let before = builder.current().to_vec();

        let grid = builder.build(builder.space().to_grid(WorldPoint::new(3.0, 3.0)));

        assert_eq!(grid.raw(GridPoint::new(20, 20)), Some(1.0));
        assert!(grid.raw(GridPoint::new(40, 60)).unwrap() < 1e-3);
        let margin = grid.raw(GridPoint::new(20, 33)).unwrap();
        assert!(margin > 0.0 && margin < 1.0, "margin cost {margin}");
        assert_eq!(grid.raw(GridPoint::new(95, 50)), Some(UNKNOWN));
        assert_eq!(builder.current(), &before[..]);
    }

    #[test]
    fn test_build_uses_floor_height_at_agent() {
        let mut builder = builder();
        let raised = Field::new(
            Matrix4::new_translation(&Vector3::new(0.0, 0.3, 0.0)),
            floor_field(5.0).discs().iter().copied(),
        );
        builder.add_field(&raised);
        let grid = builder.build(GridPoint::new(50, 50));
        assert!(grid.raw(GridPoint::new(50, 50)).unwrap() < 1e-3);

        let grid = builder.build(GridPoint::new(-5, -5));
        assert_eq!(grid.raw(GridPoint::new(50, 50)), Some(1.0));
    }
}
