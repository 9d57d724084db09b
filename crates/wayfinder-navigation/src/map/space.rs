use core::fmt;

use nalgebra::{Matrix3, Vector3};

use crate::error::NavigationError;
use crate::geometry::{GridPoint, WorldPoint};

/// Affine mapping between the world ground plane (meters) and grid cells.
///
/// The world-to-grid transform is the homogeneous composition
/// `translate(-grid_origin) * scale(scale) * translate(-world_min)`; the
/// grid-to-world transform is its exact inverse.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateSpace {
    world_min: WorldPoint,
    world_max: WorldPoint,
    scale: f32,
    elevation_min: f32,
    elevation_max: f32,
    grid_origin: GridPoint,
    world_to_grid: Matrix3<f32>,
    grid_to_world: Matrix3<f32>,
}

impl CoordinateSpace {
    /// Creates a coordinate space covering `world_min..=world_max`.
    ///
    /// # Arguments
    /// * `world_min`, `world_max` - Ground-plane extent in meters
    /// * `scale` - Grid cells per meter
    /// * `elevation_min`, `elevation_max` - Vertical extent in meters
    ///
    /// # Errors
    /// Returns a `NavigationError` if the scale is not positive and finite,
    /// the bounds are inverted or not finite, or the elevation range is empty.
    pub fn new(
        world_min: WorldPoint,
        world_max: WorldPoint,
        scale: f32,
        elevation_min: f32,
        elevation_max: f32,
    ) -> Result<Self, NavigationError> {
        if !(scale > 0.0 && scale.is_finite() && (1.0 / scale).is_finite()) {
            return Err(NavigationError::InvalidScale("Scale must be positive and finite"));
        }
        let finite = [world_min.x, world_min.y, world_max.x, world_max.y].iter().all(|v| v.is_finite());
        if !finite || world_min.x > world_max.x || world_min.y > world_max.y {
            return Err(NavigationError::InvalidBounds("World bounds must be finite and ordered"));
        }
        if !(elevation_max > elevation_min) || !elevation_max.is_finite() || !elevation_min.is_finite() {
            return Err(NavigationError::InvalidElevation("Elevation maximum must exceed the minimum"));
        }

        let mut space = CoordinateSpace {
            world_min,
            world_max,
            scale,
            elevation_min,
            elevation_max,
            grid_origin: GridPoint::default(),
            world_to_grid: Matrix3::identity(),
            grid_to_world: Matrix3::identity(),
        };
        space.update_transforms();
        Ok(space)
    }

    /// Returns a copy whose grid cell `(0, 0)` sits at `origin` of the
    /// unshifted grid.
    #[must_use]
    pub fn with_grid_origin(mut self, origin: GridPoint) -> Self {
        self.grid_origin = origin;
        self.update_transforms();
        self
    }

    fn update_transforms(&mut self) {
        let origin = self.grid_origin;
        self.world_to_grid = translation(-origin.x as f32, -origin.y as f32)
            * scaling(self.scale)
            * translation(-self.world_min.x, -self.world_min.y);
        self.grid_to_world = translation(self.world_min.x, self.world_min.y)
            * scaling(1.0 / self.scale)
            * translation(origin.x as f32, origin.y as f32);
    }

    /// Converts a world point to the nearest grid cell.
    pub fn to_grid(&self, point: WorldPoint) -> GridPoint {
        let (x, y) = project(&self.world_to_grid, point.x, point.y);
        GridPoint::new(x.round() as i32, y.round() as i32)
    }

    /// Converts a grid cell to its world position.
    pub fn to_world(&self, cell: GridPoint) -> WorldPoint {
        let (x, y) = project(&self.grid_to_world, cell.x as f32, cell.y as f32);
        WorldPoint::new(x, y)
    }

    /// Converts a length in meters to the nearest whole number of cells.
    pub fn to_grid_length(&self, length: f32) -> i32 {
        (length * self.scale).round() as i32
    }

    /// Converts a length in cells to meters.
    pub fn to_world_length(&self, length: i32) -> f32 {
        length as f32 / self.scale
    }

    /// Grid cells per meter.
    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Lower ground-plane corner of the mapped area.
    pub fn world_min(&self) -> WorldPoint {
        self.world_min
    }

    /// Upper ground-plane corner of the mapped area.
    pub fn world_max(&self) -> WorldPoint {
        self.world_max
    }

    /// Extent of the mapped area in meters.
    pub fn world_size(&self) -> WorldPoint {
        self.world_max - self.world_min
    }

    /// Grid origin offset.
    pub fn grid_origin(&self) -> GridPoint {
        self.grid_origin
    }

    /// Lowest elevation in the mapped volume; heights are measured from here.
    pub fn elevation_min(&self) -> f32 {
        self.elevation_min
    }

    /// Highest elevation in the mapped volume.
    pub fn elevation_max(&self) -> f32 {
        self.elevation_max
    }

    /// Vertical extent of the mapped volume, always positive.
    pub fn elevation_range(&self) -> f32 {
        self.elevation_max - self.elevation_min
    }
}

impl fmt::Display for CoordinateSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CoordinateSpace {{ world: {}..{}, scale: {} cells/m, elevation: {:.2}..{:.2} m, origin: {} }}",
            self.world_min, self.world_max, self.scale, self.elevation_min, self.elevation_max, self.grid_origin
        )
    }
}

fn translation(x: f32, y: f32) -> Matrix3<f32> {
    Matrix3::new(
        1.0, 0.0, x, //
        0.0, 1.0, y, //
        0.0, 0.0, 1.0,
    )
}

fn scaling(s: f32) -> Matrix3<f32> {
    Matrix3::new(
        s, 0.0, 0.0, //
        0.0, s, 0.0, //
        0.0, 0.0, 1.0,
    )
}

fn project(m: &Matrix3<f32>, x: f32, y: f32) -> (f32, f32) {
    let c = m * Vector3::new(x, y, 1.0);
    assert!(c.z != 0.0, "degenerate coordinate transform: homogeneous component is zero");
    (c.x / c.z, c.y / c.z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn space() -> CoordinateSpace {
        CoordinateSpace::new(WorldPoint::new(-2.0, -1.0), WorldPoint::new(3.0, 4.0), 20.0, 0.0, 1.8).unwrap()
    }

    #[test]
    fn test_invalid_space_creation() {
        let min = WorldPoint::ZERO;
        let max = WorldPoint::new(1.0, 1.0);
        assert!(matches!(CoordinateSpace::new(min, max, 0.0, 0.0, 1.0), Err(NavigationError::InvalidScale(_))));
        assert!(matches!(CoordinateSpace::new(min, max, -5.0, 0.0, 1.0), Err(NavigationError::InvalidScale(_))));
        assert!(matches!(CoordinateSpace::new(min, max, f32::NAN, 0.0, 1.0), Err(NavigationError::InvalidScale(_))));
        assert!(matches!(CoordinateSpace::new(max, min, 1.0, 0.0, 1.0), Err(NavigationError::InvalidBounds(_))));
        assert!(matches!(CoordinateSpace::new(min, max, 1.0, 1.0, 1.0), Err(NavigationError::InvalidElevation(_))));
    }

    #[test]
    fn test_world_min_maps_to_grid_origin() {
        let space = space();
        assert_eq!(space.to_grid(WorldPoint::new(-2.0, -1.0)), GridPoint::new(0, 0));
        assert_eq!(space.to_grid(WorldPoint::new(3.0, 4.0)), GridPoint::new(100, 100));
        let shifted = space.with_grid_origin(GridPoint::new(10, -5));
        assert_eq!(shifted.to_grid(WorldPoint::new(-2.0, -1.0)), GridPoint::new(-10, 5));
    }

    #[test]
    fn test_coordinate_round_trip_within_half_cell() {
        let space = space().with_grid_origin(GridPoint::new(3, 7));
        let half_cell = 0.5 / space.scale() + 1e-5;
        for i in 0..50 {
            for j in 0..50 {
                let p = WorldPoint::new(-2.0 + i as f32 * 0.0973, -1.0 + j as f32 * 0.1013);
                let back = space.to_world(space.to_grid(p));
                assert!((back.x - p.x).abs() <= half_cell, "x drift at {p}: {back}");
                assert!((back.y - p.y).abs() <= half_cell, "y drift at {p}: {back}");
            }
        }
    }

    #[test]
    fn test_cell_round_trip_is_exact() {
        let space = space();
        for cell in [GridPoint::new(0, 0), GridPoint::new(17, 93), GridPoint::new(-4, 250)] {
            assert_eq!(space.to_grid(space.to_world(cell)), cell);
        }
    }

    #[test]
    fn test_length_conversion() {
        let space = space();
        assert_eq!(space.to_grid_length(0.15), 3);
        assert_eq!(space.to_grid_length(0.0), 0);
        assert_relative_eq!(space.to_world_length(20), 1.0);
        assert_relative_eq!(space.elevation_range(), 1.8);
        assert_eq!(space.world_size(), WorldPoint::new(5.0, 5.0));
    }
}
