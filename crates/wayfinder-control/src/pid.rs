use std::time::Instant;

/// Proportional-integral controller driven by wall-clock time.
#[derive(Debug, Clone)]
pub struct Pid {
    kp: f32,
    ki: f32,
    control_variable: f32,
    integral: f32,
    last_update: Option<Instant>,
}

impl Pid {
    /// Creates a controller with the given gains.
    pub fn new(kp: f32, ki: f32) -> Self {
        Pid { kp, ki, control_variable: 0.0, integral: 0.0, last_update: None }
    }

    /// Clears the integral, the output and the time base.
    pub fn reset(&mut self) {
        self.control_variable = 0.0;
        self.integral = 0.0;
        self.last_update = None;
    }

    /// Feeds `error` sampled now.
    pub fn update(&mut self, error: f32) -> f32 {
        self.update_at(error, Instant::now())
    }

    /// Feeds `error` sampled at `now`.
    ///
    /// The first sample after a reset only starts the clock. Every later sample
    /// integrates `error * dt` and sets the output to `kp * error + ki * integral`.
    pub fn update_at(&mut self, error: f32, now: Instant) -> f32 {
        let Some(last) = self.last_update.replace(now) else {
            return self.control_variable;
        };
        let dt = now.saturating_duration_since(last).as_secs_f32();
        self.integral += error * dt;
        self.control_variable = self.kp * error + self.ki * self.integral;
        self.control_variable
    }

    /// Last output.
    pub fn control_variable(&self) -> f32 {
        self.control_variable
    }

    /// Accumulated integral of the error (error x seconds).
    pub fn integral(&self) -> f32 {
        self.integral
    }

    /// Timestamp of the last sample, `None` right after a reset.
    pub fn last_update(&self) -> Option<Instant> {
        self.last_update
    }
}
