//! Occupancy grid construction: coordinate mapping, field rasterization and
//! the finished cost field.

pub mod builder;
pub mod field;
pub mod filter;
pub mod grid;
pub mod mapper;
pub mod space;

pub use builder::{GridBuilder, GridBuilderConfig};
pub use field::{AnchorId, Disc, Field, Fields, Volume};
pub use grid::{GridCosts, OccupancyGrid, UNKNOWN};
pub use mapper::{Mapper, MapperConfig};
pub use space::CoordinateSpace;
