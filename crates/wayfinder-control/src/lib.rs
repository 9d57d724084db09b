#![warn(missing_docs)]
#![doc = "Steering and motor command dispatch for a differential-drive robot."]
#![doc = ""]
#![doc = "A [`SteeringController`] turns each [`Trajectory`](wayfinder_navigation::Trajectory) into a"]
#![doc = "[`MotorCommand`] with a PI loop on the bearing error, and a [`Dispatcher`] forwards the latest"]
#![doc = "command to a [`MotorHub`] on a fixed period with at most one send in flight."]

pub mod dispatch;
pub mod motor;
pub mod pid;
pub mod steering;

pub use dispatch::{Dispatcher, run_dispatch_task, run_steering_task};
pub use motor::{MotorCommand, MotorHub, MotorPort, WheelSpeeds};
pub use pid::Pid;
pub use steering::{DriveState, SteeringConfig, SteeringController, wheel_speeds};
