use core::fmt;
use std::future::Future;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Output port of the motor-driver hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MotorPort {
    /// Port A.
    A,
    /// Port B.
    B,
    /// Port C.
    C,
    /// Port D.
    D,
    /// Port E.
    E,
    /// Port F.
    F,
}

impl fmt::Display for MotorPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MotorPort::A => "A",
            MotorPort::B => "B",
            MotorPort::C => "C",
            MotorPort::D => "D",
            MotorPort::E => "E",
            MotorPort::F => "F",
        };
        f.write_str(name)
    }
}

/// Wheel speeds as signed percentages of full power, before rounding.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WheelSpeeds {
    /// Left wheel (%).
    pub left: f32,
    /// Right wheel (%).
    pub right: f32,
}

impl WheelSpeeds {
    /// Both wheels stopped.
    pub const ZERO: WheelSpeeds = WheelSpeeds { left: 0.0, right: 0.0 };

    /// Construct new wheel speeds.
    pub const fn new(left: f32, right: f32) -> Self {
        WheelSpeeds { left, right }
    }
}

impl fmt::Display for WheelSpeeds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WheelSpeeds {{ left: {:.1}%, right: {:.1}% }}", self.left, self.right)
    }
}

/// Command for the two drive motors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MotorCommand {
    /// Run both motors at the given speeds, in percent of full power.
    Drive {
        /// Port of the left motor.
        left_port: MotorPort,
        /// Port of the right motor.
        right_port: MotorPort,
        /// Left speed in `[-100, 100]`.
        left: i8,
        /// Right speed in `[-100, 100]`.
        right: i8,
    },
    /// Stop both motors.
    Stop {
        /// Port of the left motor.
        left_port: MotorPort,
        /// Port of the right motor.
        right_port: MotorPort,
    },
}

impl MotorCommand {
    /// Drive command with speeds rounded to whole percentages and clamped to `[-100, 100]`.
    pub fn drive(left_port: MotorPort, right_port: MotorPort, speeds: WheelSpeeds) -> Self {
        let percent = |v: f32| if v.is_finite() { v.round().clamp(-100.0, 100.0) as i8 } else { 0 };
        MotorCommand::Drive { left_port, right_port, left: percent(speeds.left), right: percent(speeds.right) }
    }

    /// Stop command.
    pub const fn stop(left_port: MotorPort, right_port: MotorPort) -> Self {
        MotorCommand::Stop { left_port, right_port }
    }

    /// True for [`MotorCommand::Stop`].
    pub fn is_stop(&self) -> bool {
        matches!(self, MotorCommand::Stop { .. })
    }
}

impl fmt::Display for MotorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotorCommand::Drive { left_port, right_port, left, right } => {
                write!(f, "Drive {{ {left_port}: {left}%, {right_port}: {right}% }}")
            }
            MotorCommand::Stop { left_port, right_port } => write!(f, "Stop {{ {left_port}, {right_port} }}"),
        }
    }
}

/// Transport to the motor-driver hub.
///
/// Implementations own the wire protocol; the dispatcher only guarantees that
/// at most one `send` is outstanding at a time.
pub trait MotorHub: Send + Sync + 'static {
    /// Error reported by a failed send.
    type Error: fmt::Display + Send + 'static;

    /// Deliver one command to the hub.
    fn send(&self, command: MotorCommand) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drive_rounds_and_clamps() {
        let command = MotorCommand::drive(MotorPort::A, MotorPort::E, WheelSpeeds::new(29.6, -150.0));
        assert_eq!(
            command,
            MotorCommand::Drive { left_port: MotorPort::A, right_port: MotorPort::E, left: 30, right: -100 }
        );
        let command = MotorCommand::drive(MotorPort::A, MotorPort::E, WheelSpeeds::new(f32::NAN, 12.4));
        assert_eq!(
            command,
            MotorCommand::Drive { left_port: MotorPort::A, right_port: MotorPort::E, left: 0, right: 12 }
        );
    }

    #[test]
    fn test_display() {
        let command = MotorCommand::drive(MotorPort::A, MotorPort::E, WheelSpeeds::new(30.0, 10.0));
        assert_eq!(command.to_string(), "Drive { A: 30%, E: 10% }");
        assert_eq!(MotorCommand::stop(MotorPort::B, MotorPort::C).to_string(), "Stop { B, C }");
        assert!(MotorCommand::stop(MotorPort::B, MotorPort::C).is_stop());
    }
}
