#![warn(missing_docs)]
#![doc = "Occupancy grid construction, route planning and waypoint following for a ground robot."]
#![doc = ""]
#![doc = "Sensed surfaces arrive as fields of discs. The [`map`] module rasterizes them into an"]
#![doc = "[`OccupancyGrid`], [`planning`] searches the grid for a smoothed route to a goal, and the"]
#![doc = "[`Navigator`] turns that route into a relative [`Trajectory`] for the steering controller."]

pub mod error;
pub mod geometry;
pub mod map;
pub mod navigator;
pub mod planning;
pub mod types;

pub use error::NavigationError;
pub use geometry::{GridPoint, WorldPoint};
pub use map::{CoordinateSpace, Field, Fields, GridBuilder, Mapper, MapperConfig, OccupancyGrid};
pub use navigator::{Navigator, NavigatorConfig, run_navigator_task};
pub use planning::{PathFinder, Route, RouterInputs, run_router_task};
pub use types::{Agent, Trajectory};
