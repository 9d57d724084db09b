use core::f32::consts::FRAC_PI_2;
use core::fmt;
use std::time::Instant;

use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use wayfinder_navigation::Trajectory;

use crate::motor::{MotorCommand, MotorPort, WheelSpeeds};
use crate::pid::Pid;

/// Tuning of the steering controller.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct SteeringConfig {
    /// Proportional gain on the bearing error.
    pub proportional_gain: f32,
    /// Integral gain on the bearing error.
    pub integral_gain: f32,
    /// Distance below which the forward speed ramps down (m).
    pub deceleration_distance: f32,
    /// Wheel speed when driving straight with room ahead (%).
    pub max_speed: f32,
    /// Wheel speed floor while driving (%).
    pub min_speed: f32,
    /// Port of the left drive motor.
    pub left_port: MotorPort,
    /// Port of the right drive motor.
    pub right_port: MotorPort,
}

impl Default for SteeringConfig {
    fn default() -> Self {
        SteeringConfig {
            proportional_gain: 0.2,
            integral_gain: 0.01,
            deceleration_distance: 1.0,
            max_speed: 30.0,
            min_speed: 10.0,
            left_port: MotorPort::A,
            right_port: MotorPort::E,
        }
    }
}

/// What the controller is currently doing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DriveState {
    /// Motors stopped; the PID is reset.
    Stopped,
    /// Following a trajectory.
    Driving {
        /// Trajectory the speeds were computed for.
        trajectory: Trajectory,
        /// Wheel speeds before rounding (%).
        speeds: WheelSpeeds,
    },
}

impl fmt::Display for DriveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriveState::Stopped => f.write_str("Stopped"),
            DriveState::Driving { trajectory, speeds } => write!(f, "Driving {{ {trajectory}, {speeds} }}"),
        }
    }
}

/// Wheel speeds for a control output and a remaining distance.
///
/// The control output is scaled by a quarter turn into `delta`. The wheel on
/// the inside of the turn runs at `1 - 2|delta|` of the forward speed, which
/// goes negative for sharp turns so the robot can pivot. Neither factor is
/// clamped; [`MotorCommand::drive`] bounds the final percentages.
///
/// # Arguments
/// * `control_variable` - PID output for the bearing error (positive turns right)
/// * `distance` - Distance to the target (m)
/// * `config` - Speed limits and deceleration distance
pub fn wheel_speeds(control_variable: f32, distance: f32, config: &SteeringConfig) -> WheelSpeeds {
    let delta = control_variable / FRAC_PI_2;
    let compensation = 1.0 - 2.0 * delta.abs();
    let (left, right) = if delta > 0.0 {
        (1.0, compensation)
    } else if delta < 0.0 {
        (compensation, 1.0)
    } else {
        (1.0, 1.0)
    };

    let speed_limit = if config.deceleration_distance > 0.0 {
        (distance.max(0.0) / config.deceleration_distance).min(1.0)
    } else {
        1.0
    };
    let speed = config.min_speed + (1.0 - delta.abs()) * speed_limit * (config.max_speed - config.min_speed);
    WheelSpeeds::new(speed * left, speed * right)
}

/// PI steering controller for a differential drive.
///
/// The controller is re-evaluated on every trajectory and on every change of
/// the enabled flag. It drives only while enabled and given a non-zero
/// trajectory; in every other case it stops and resets its PID.
#[derive(Debug, Clone)]
pub struct SteeringController {
    config: SteeringConfig,
    pid: Pid,
    enabled: bool,
    trajectory: Option<Trajectory>,
    state: DriveState,
}

impl SteeringController {
    /// Creates a disabled controller.
    pub fn new(config: SteeringConfig) -> Self {
        SteeringController {
            pid: Pid::new(config.proportional_gain, config.integral_gain),
            config,
            enabled: false,
            trajectory: None,
            state: DriveState::Stopped,
        }
    }

    /// Enables or disables driving and returns the resulting command.
    pub fn set_enabled(&mut self, enabled: bool) -> MotorCommand {
        self.set_enabled_at(enabled, Instant::now())
    }

    /// Like [`SteeringController::set_enabled`] with an explicit sample time.
    pub fn set_enabled_at(&mut self, enabled: bool, now: Instant) -> MotorCommand {
        if self.enabled != enabled {
            debug!(enabled, "steering enable changed");
        }
        self.enabled = enabled;
        self.evaluate(now)
    }

    /// Feeds a new trajectory and returns the resulting command.
    pub fn update(&mut self, trajectory: Option<Trajectory>) -> MotorCommand {
        self.update_at(trajectory, Instant::now())
    }

    /// Like [`SteeringController::update`] with an explicit sample time.
    pub fn update_at(&mut self, trajectory: Option<Trajectory>, now: Instant) -> MotorCommand {
        self.trajectory = trajectory;
        self.evaluate(now)
    }

    fn evaluate(&mut self, now: Instant) -> MotorCommand {
        self.state = match self.trajectory {
            Some(trajectory) if self.enabled && !trajectory.is_zero() => {
                let cv = self.pid.update_at(trajectory.heading, now);
                let speeds = wheel_speeds(cv, trajectory.distance, &self.config);
                DriveState::Driving { trajectory, speeds }
            }
            _ => {
                self.pid.reset();
                DriveState::Stopped
            }
        };
        self.command()
    }

    /// Motor command for the current state.
    pub fn command(&self) -> MotorCommand {
        match self.state {
            DriveState::Driving { speeds, .. } => {
                MotorCommand::drive(self.config.left_port, self.config.right_port, speeds)
            }
            DriveState::Stopped => MotorCommand::stop(self.config.left_port, self.config.right_port),
        }
    }

    /// Current state.
    pub fn state(&self) -> DriveState {
        self.state
    }

    /// Whether driving is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The bearing PID.
    pub fn pid(&self) -> &Pid {
        &self.pid
    }

    /// Controller configuration.
    pub fn config(&self) -> &SteeringConfig {
        &self.config
    }
}
