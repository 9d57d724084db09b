//! Point types shared by the grid, the planner and the navigator.

use core::f32::consts::PI;
use core::fmt;
use core::ops::{Add, Mul, Sub};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Represents a point in grid coordinates (cell indices).
///
/// Coordinates are signed: neighbours of edge cells and projections of points
/// outside the mapped area are valid `GridPoint`s that simply fall outside the
/// grid.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GridPoint {
    /// The x-coordinate (column index) in the grid.
    pub x: i32,
    /// The y-coordinate (row index) in the grid.
    pub y: i32,
}

impl GridPoint {
    /// The Moore neighbourhood, straight moves first.
    pub const DIRECTIONS: [GridPoint; 8] = [
        GridPoint::new(1, 0),
        GridPoint::new(-1, 0),
        GridPoint::new(0, 1),
        GridPoint::new(0, -1),
        GridPoint::new(1, 1),
        GridPoint::new(1, -1),
        GridPoint::new(-1, 1),
        GridPoint::new(-1, -1),
    ];

    /// Creates a new `GridPoint`.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`, in cells.
    pub fn distance(&self, other: GridPoint) -> f32 {
        let dx = (other.x - self.x) as f32;
        let dy = (other.y - self.y) as f32;
        dx.hypot(dy)
    }
}

impl Add for GridPoint {
    type Output = GridPoint;

    fn add(self, rhs: GridPoint) -> GridPoint {
        GridPoint::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl fmt::Display for GridPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.x, self.y)
    }
}

/// Represents a point in world coordinates (meters) on the ground plane.
#[derive(Debug, Default, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WorldPoint {
    /// The x-coordinate in meters.
    pub x: f32,
    /// The y-coordinate in meters.
    pub y: f32,
}

impl WorldPoint {
    /// The world origin.
    pub const ZERO: WorldPoint = WorldPoint::new(0.0, 0.0);

    /// Creates a new `WorldPoint`.
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Length of the vector from the origin to this point.
    pub fn length(&self) -> f32 {
        self.x.hypot(self.y)
    }

    /// Euclidean distance to `other`, in meters.
    pub fn distance(&self, other: WorldPoint) -> f32 {
        (other - *self).length()
    }

    /// Unit vector in the same direction, or `None` for a zero-length vector.
    pub fn normalized(&self) -> Option<WorldPoint> {
        let length = self.length();
        if length > 0.0 && length.is_finite() {
            Some(*self * (1.0 / length))
        } else {
            None
        }
    }

    /// Unit vector pointing along `heading` radians.
    pub fn from_heading(heading: f32) -> WorldPoint {
        WorldPoint::new(heading.cos(), heading.sin())
    }

    /// 2-D dot product.
    pub fn dot(&self, other: WorldPoint) -> f32 {
        self.x * other.x + self.y * other.y
    }

    /// z-component of the 3-D cross product of the two vectors.
    pub fn cross(&self, other: WorldPoint) -> f32 {
        self.x * other.y - self.y * other.x
    }

    /// Signed angle that rotates this vector onto `other`, in `[-PI, PI]`.
    pub fn signed_angle_to(&self, other: WorldPoint) -> f32 {
        self.cross(other).atan2(self.dot(other))
    }
}

impl Add for WorldPoint {
    type Output = WorldPoint;

    fn add(self, rhs: WorldPoint) -> WorldPoint {
        WorldPoint::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for WorldPoint {
    type Output = WorldPoint;

    fn sub(self, rhs: WorldPoint) -> WorldPoint {
        WorldPoint::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for WorldPoint {
    type Output = WorldPoint;

    fn mul(self, rhs: f32) -> WorldPoint {
        WorldPoint::new(self.x * rhs, self.y * rhs)
    }
}

impl fmt::Display for WorldPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3})", self.x, self.y)
    }
}

/// Normalize an angle to be within `[-PI, PI)`.
///
/// Angles at `PI` will be normalized to `-PI`.
pub fn normalize_angle(angle: f32) -> f32 {
    let a = angle % (2.0 * PI);
    if a >= PI {
        a - 2.0 * PI
    } else if a < -PI {
        a + 2.0 * PI
    } else {
        a
    }
}
