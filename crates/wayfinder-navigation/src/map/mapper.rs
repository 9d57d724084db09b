use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::builder::{GridBuilder, GridBuilderConfig};
use super::field::{Fields, Volume};
use super::grid::{GridCosts, OccupancyGrid};
use super::space::CoordinateSpace;
use crate::error::NavigationError;
use crate::geometry::{GridPoint, WorldPoint};
use crate::types::Agent;

/// Tunables for a mapping cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct MapperConfig {
    /// Cell edge length (m).
    pub resolution: f32,
    /// Grid dimensions are rounded up to a multiple of this many cells.
    pub size_step: usize,
    /// Rasterization tunables.
    pub builder: GridBuilderConfig,
    /// Cost tunables attached to every emitted grid.
    pub costs: GridCosts,
}

impl Default for MapperConfig {
    fn default() -> Self {
        MapperConfig {
            resolution: 0.05,
            size_step: 100,
            builder: GridBuilderConfig::default(),
            costs: GridCosts::default(),
        }
    }
}

/// Sizes the grid around every known field and runs one build per call.
///
/// Grid dimensions only ever grow; the builder and its buffers are kept for
/// as long as they do not.
#[derive(Debug, Default)]
pub struct Mapper {
    config: MapperConfig,
    dimensions: (usize, usize),
    builder: Option<GridBuilder>,
}

impl Mapper {
    /// Creates a mapper with no grid yet.
    pub fn new(config: MapperConfig) -> Self {
        Mapper { config, dimensions: (0, 0), builder: None }
    }

    /// The builder of the last cycle, if any.
    pub fn builder(&self) -> Option<&GridBuilder> {
        self.builder.as_ref()
    }

    /// Builds a grid from `fields` with the floor sampled under `agent`.
    ///
    /// Returns `Ok(None)` when no field holds any geometry.
    ///
    /// # Errors
    /// Propagates invalid configuration (resolution, dimensions) as a `NavigationError`.
    pub fn update(&mut self, agent: &Agent, fields: &Fields) -> Result<Option<OccupancyGrid>, NavigationError> {
        let mut bounds = Volume::empty();
        for field in fields.values().filter(|f| !f.is_empty()) {
            bounds.union(&field.world_bounds());
        }
        if bounds.is_empty() {
            debug!("no field geometry to map");
            return Ok(None);
        }

        let space = self.space_for(&bounds)?;
        let corners = [
            WorldPoint::new(bounds.min.x, bounds.min.z),
            WorldPoint::new(bounds.max.x, bounds.min.z),
            WorldPoint::new(bounds.min.x, bounds.max.z),
            WorldPoint::new(bounds.max.x, bounds.max.z),
        ]
        .map(|p| space.to_grid(p));
        let lo = corners.iter().fold(GridPoint::new(i32::MAX, i32::MAX), |a, c| GridPoint::new(a.x.min(c.x), a.y.min(c.y)));
        let hi = corners.iter().fold(GridPoint::new(i32::MIN, i32::MIN), |a, c| GridPoint::new(a.x.max(c.x), a.y.max(c.y)));

        let step = self.config.size_step.max(1);
        let width = ((hi.x - lo.x) as usize + 1).div_ceil(step) * step;
        let height = ((hi.y - lo.y) as usize + 1).div_ceil(step) * step;
        self.dimensions = (self.dimensions.0.max(width), self.dimensions.1.max(height));
        let space = space.with_grid_origin(lo);

        let builder = match self.builder.take() {
            Some(mut builder) if builder.dimensions() == self.dimensions => {
                builder.set_space(space);
                builder.set_margin(agent.radius);
                builder.reset();
                builder
            }
            _ => {
                debug!(width = self.dimensions.0, height = self.dimensions.1, "allocating grid builder");
                GridBuilder::new(self.dimensions.0, self.dimensions.1, space, agent.radius, self.config.builder)?
            }
        };
        let builder = self.builder.insert(builder);

        for field in fields.values() {
            builder.add_field(field);
        }
        let floor = builder.space().to_grid(agent.position);
        Ok(Some(builder.build(floor).with_costs(self.config.costs)))
    }

    fn space_for(&self, bounds: &Volume) -> Result<CoordinateSpace, NavigationError> {
        let elevation_min = bounds.min.y;
        let elevation_max = bounds.max.y.max(elevation_min + self.config.builder.ceiling_height);
        CoordinateSpace::new(
            WorldPoint::new(bounds.min.x, bounds.min.z),
            WorldPoint::new(bounds.max.x, bounds.max.z),
            1.0 / self.config.resolution,
            elevation_min,
            elevation_max,
        )
    }
}
