use std::time::Duration;

use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat, builder::DefaultState};
use serde::Deserialize;
use tracing::{error, info};

use wayfinder_control::SteeringConfig;
use wayfinder_navigation::map::GridCosts;
use wayfinder_navigation::{MapperConfig, NavigatorConfig, WorldPoint};

use crate::simulation::SimulationConfig;

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
const ENV_PREFIX: &str = "WAYFINDER";

/// Task periods and timeouts of the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Minimum time between two route plans (ms).
    pub route_interval_ms: u64,
    /// Motor command dispatch period (ms).
    pub command_interval_ms: u64,
    /// Pause after each grid build (ms).
    pub mapping_cooldown_ms: u64,
    /// Pose age after which the pose is considered lost (ms).
    pub pose_timeout_ms: u64,
    /// Watchdog check period (ms).
    pub watchdog_interval_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            route_interval_ms: 100,
            command_interval_ms: 100,
            mapping_cooldown_ms: 100,
            pose_timeout_ms: 250,
            watchdog_interval_ms: 25,
        }
    }
}

impl RuntimeConfig {
    pub fn route_interval(&self) -> Duration {
        Duration::from_millis(self.route_interval_ms)
    }

    pub fn command_interval(&self) -> Duration {
        Duration::from_millis(self.command_interval_ms)
    }

    pub fn mapping_cooldown(&self) -> Duration {
        Duration::from_millis(self.mapping_cooldown_ms)
    }

    pub fn pose_timeout(&self) -> Duration {
        Duration::from_millis(self.pose_timeout_ms)
    }

    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_millis(self.watchdog_interval_ms)
    }
}

/// What the robot is asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct MissionConfig {
    /// Goal on the ground plane, idle when absent.
    pub goal: Option<WorldPoint>,
    /// Whether the steering controller may drive.
    pub enabled: bool,
    /// Stop after this many seconds; run until interrupted when absent.
    pub duration_secs: Option<f32>,
}

/// Application settings, one section per component.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub mapper: MapperConfig,
    pub grid: GridCosts,
    pub navigator: NavigatorConfig,
    pub steering: SteeringConfig,
    pub runtime: RuntimeConfig,
    pub mission: MissionConfig,
    pub simulation: SimulationConfig,
}

impl Settings {
    /// Mapper configuration with the `[grid]` costs applied.
    pub fn mapper_config(&self) -> MapperConfig {
        MapperConfig { costs: self.grid, ..self.mapper }
    }
}

/// Loads `config/default.toml` (if present) overlaid with `WAYFINDER__*` variables.
pub fn load_settings() -> Result<Settings, ConfigError> {
    info!("Attempting to load configuration from {}", DEFAULT_CONFIG_PATH);

    let builder = Config::builder()
        .add_source(File::new(DEFAULT_CONFIG_PATH, FileFormat::Toml).required(false))
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    match deserialize(builder) {
        Ok(settings) => {
            info!("Successfully loaded configuration: {:?}", settings);
            Ok(settings)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            Err(e)
        }
    }
}

fn deserialize(builder: ConfigBuilder<DefaultState>) -> Result<Settings, ConfigError> {
    builder.build()?.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wayfinder_control::MotorPort;

    fn parse(toml: &str) -> Settings {
        deserialize(Config::builder().add_source(File::from_str(toml, FileFormat::Toml))).unwrap()
    }

    #[test]
    fn test_empty_source_gives_defaults() {
        let settings = parse("");
        assert_eq!(settings.mapper, MapperConfig::default());
        assert_eq!(settings.steering, SteeringConfig::default());
        assert_eq!(settings.runtime, RuntimeConfig::default());
        assert_eq!(settings.mission.goal, None);
    }

    #[test]
    fn test_shipped_file_matches_defaults() {
        let settings = parse(include_str!("../config/default.toml"));
        assert_eq!(settings.mapper, MapperConfig::default());
        assert_eq!(settings.grid, GridCosts::default());
        assert_eq!(settings.navigator, NavigatorConfig::default());
        assert_eq!(settings.steering, SteeringConfig::default());
        assert_eq!(settings.runtime, RuntimeConfig::default());
        assert_eq!(settings.simulation, SimulationConfig::default());
        assert!(settings.mission.enabled);
        assert_eq!(settings.mission.goal, Some(WorldPoint::new(4.5, 4.0)));
    }

    #[test]
    fn test_sections_override_defaults() {
        let settings = parse(
            r#"
            [mapper]
            resolution = 0.1

            [mapper.builder]
            ceiling_height = 1.2

            [grid]
            obstacle_threshold = 0.3

            [steering]
            max_speed = 40.0
            right_port = "B"

            [runtime]
            command_interval_ms = 50

            [mission]
            enabled = true
            goal = { x = 2.5, y = 1.0 }
            "#,
        );
        assert_eq!(settings.mapper.resolution, 0.1);
        assert_eq!(settings.mapper.size_step, 100);
        assert_eq!(settings.mapper.builder.ceiling_height, 1.2);
        assert_eq!(settings.mapper_config().costs.obstacle_threshold, 0.3);
        assert_eq!(settings.steering.max_speed, 40.0);
        assert_eq!(settings.steering.min_speed, 10.0);
        assert_eq!(settings.steering.right_port, MotorPort::B);
        assert_eq!(settings.runtime.command_interval(), Duration::from_millis(50));
        assert!(settings.mission.enabled);
        assert_eq!(settings.mission.goal, Some(WorldPoint::new(2.5, 1.0)));
    }
}
