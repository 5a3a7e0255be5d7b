use log::warn;
use serde::{Deserialize, Serialize};

use super::{ControlIo, Controller};
use crate::sensors::SamplingClock;
use crate::utils::allocator::{ActuatorId, SensorId};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
}

impl PidGains {
    pub fn new(kp: f32, ki: f32, kd: f32) -> Self {
        Self { kp, ki, kd }
    }
}

/// Feedback loop from one sensor channel to one actuator setpoint.
#[derive(Debug, Clone)]
pub struct PidController {
    name: String,
    sensor: SensorId,
    channel: usize,
    actuator: ActuatorId,
    gains: PidGains,
    target: f32,
    output_limit: f32,
    integral_limit: f32,
    clock: SamplingClock,
    running: bool,
    integral: f32,
    previous_error: Option<f32>,
    since_last: f32,
}

impl PidController {
    pub fn new(name: &str, sensor: SensorId, channel: usize, actuator: ActuatorId, gains: PidGains) -> Self {
        Self {
            name: name.to_string(),
            sensor,
            channel,
            actuator,
            gains,
            target: 0.0,
            output_limit: f32::INFINITY,
            integral_limit: f32::INFINITY,
            clock: SamplingClock::every_tick(),
            running: false,
            integral: 0.0,
            previous_error: None,
            since_last: 0.0,
        }
    }

    pub fn with_frequency(mut self, frequency: f32) -> Self {
        self.clock = SamplingClock::new(frequency);
        self
    }

    pub fn with_output_limit(mut self, limit: f32) -> Self {
        self.output_limit = limit.abs();
        self
    }

    pub fn with_integral_limit(mut self, limit: f32) -> Self {
        self.integral_limit = limit.abs();
        self
    }

    pub fn set_target(&mut self, target: f32) {
        self.target = target;
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    pub fn gains(&self) -> PidGains {
        self.gains
    }

    pub fn set_gains(&mut self, gains: PidGains) {
        self.gains = gains;
    }

    /// One PID evaluation over `dt` seconds of error history.
    pub fn compute(&mut self, measurement: f32, dt: f32) -> f32 {
        let error = self.target - measurement;
        self.integral = (self.integral + error * dt).clamp(-self.integral_limit, self.integral_limit);
        let derivative = match self.previous_error {
            Some(prev) if dt > 0.0 => (error - prev) / dt,
            _ => 0.0,
        };
        self.previous_error = Some(error);
        let output = self.gains.kp * error + self.gains.ki * self.integral + self.gains.kd * derivative;
        output.clamp(-self.output_limit, self.output_limit)
    }
}

impl Controller for PidController {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self) {
        self.running = true;
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn reset(&mut self) {
        self.integral = 0.0;
        self.previous_error = None;
        self.since_last = 0.0;
        self.clock.reset();
    }

    fn update(&mut self, io: &mut ControlIo<'_>, dt: f32) {
        if !self.running {
            return;
        }
        self.since_last += dt;
        if !self.clock.tick(dt) {
            return;
        }
        let period = std::mem::take(&mut self.since_last);
        let Some(measurement) = io.reading(self.sensor, self.channel) else {
            return;
        };
        let output = self.compute(measurement, period);
        if !io.set_setpoint(self.actuator, output) {
            warn!("Controller '{}' lost its actuator {}", self.name, self.actuator);
            self.running = false;
        }
    }
}
