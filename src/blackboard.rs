use parking_lot::RwLock;
use std::{sync::Arc, time::Instant};

use wayfinder_control::MotorCommand;

/// Health state shared between threads and tasks.
#[derive(Clone, Debug)]
pub struct State {
    pub started: Instant,
    pub last_pose_ts: Option<Instant>,
    pub last_command: Option<MotorCommand>,
    pub faults: Vec<String>,
}

impl Default for State {
    fn default() -> Self {
        State { started: Instant::now(), last_pose_ts: None, last_command: None, faults: Vec::new() }
    }
}

impl State {
    /// Time since the last pose, or since start-up if none arrived yet.
    pub fn pose_age(&self, now: Instant) -> std::time::Duration {
        now.saturating_duration_since(self.last_pose_ts.unwrap_or(self.started))
    }
}

pub type Blackboard = Arc<RwLock<State>>;

pub fn snapshot(bb: &Blackboard) -> State {
    (*bb.read()).clone()
}

pub fn touch_pose(bb: &Blackboard) {
    bb.write().last_pose_ts = Some(Instant::now());
}

pub fn record_command(bb: &Blackboard, command: MotorCommand) {
    bb.write().last_command = Some(command);
}

pub fn raise_fault(bb: &Blackboard, msg: &str) -> bool {
    let mut g = bb.write();
    if g.faults.iter().any(|s| s == msg) {
        return false;
    }
    g.faults.push(msg.to_string());
    true
}

pub fn clear_fault(bb: &Blackboard, msg: &str) -> bool {
    let mut g = bb.write();
    let before = g.faults.len();
    g.faults.retain(|s| s != msg);
    g.faults.len() != before
}
