use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::geometry::WorldPoint;

/// Snapshot of the robot pose on the ground plane.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Agent {
    /// Position on the ground plane (m).
    pub position: WorldPoint,
    /// Height of the body origin above the world origin (m).
    pub elevation: f32,
    /// Heading (rad) in the ground-plane frame.
    pub heading: f32,
    /// Physical radius of the robot footprint (m).
    pub radius: f32,
}

impl Agent {
    /// Default footprint radius of the robot (m).
    pub const DEFAULT_RADIUS: f32 = 0.15;

    /// Creates an agent with the default footprint at zero elevation.
    pub const fn new(position: WorldPoint, heading: f32) -> Self {
        Agent { position, elevation: 0.0, heading, radius: Self::DEFAULT_RADIUS }
    }

    /// Unit vector along the heading.
    pub fn heading_vector(&self) -> WorldPoint {
        WorldPoint::from_heading(self.heading)
    }
}

impl fmt::Display for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Agent {{ position: {}, heading: {:.3} rad, radius: {:.2} m }}", self.position, self.heading, self.radius)
    }
}

/// Relative steering target: where to turn and how far to go.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Trajectory {
    /// Signed bearing to the target relative to the current heading (rad), in `[-PI, PI]`.
    pub heading: f32,
    /// Distance to the target (m), never negative.
    pub distance: f32,
}

impl Trajectory {
    /// No movement commanded.
    pub const ZERO: Trajectory = Trajectory { heading: 0.0, distance: 0.0 };

    /// Construct a new trajectory.
    pub const fn new(heading: f32, distance: f32) -> Self {
        Trajectory { heading, distance }
    }

    /// Returns true for the zero sentinel.
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl fmt::Display for Trajectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Trajectory {{ heading: {:.3} rad, distance: {:.3} m }}", self.heading, self.distance)
    }
}
