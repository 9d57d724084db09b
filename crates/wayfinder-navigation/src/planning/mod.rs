//! Route planning: A* over the occupancy grid, line-of-sight smoothing and
//! the throttled re-planning task.

pub mod astar;
pub mod path_finder;
pub mod route;
pub mod router;

pub use astar::{PathResult, astar_search};
pub use path_finder::PathFinder;
pub use route::Route;
pub use router::{RouterInputs, run_router_task};
