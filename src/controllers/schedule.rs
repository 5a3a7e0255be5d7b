use super::{ControlIo, Controller};
use crate::utils::allocator::ActuatorId;

/// Open-loop controller replaying a piecewise-constant setpoint profile.
///
/// Times are relative to the moment the controller was started.
#[derive(Debug, Clone)]
pub struct ScheduleController {
    name: String,
    actuator: ActuatorId,
    points: Vec<(f64, f32)>,
    running: bool,
    elapsed: f64,
}

impl ScheduleController {
    /// Points are sorted by time; the value before the first point is zero.
    pub fn new(name: &str, actuator: ActuatorId, mut points: Vec<(f64, f32)>) -> Self {
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self {
            name: name.to_string(),
            actuator,
            points,
            running: false,
            elapsed: 0.0,
        }
    }

    pub fn value_at(&self, t: f64) -> f32 {
        self.points
            .iter()
            .take_while(|(time, _)| *time <= t)
            .last()
            .map_or(0.0, |(_, v)| *v)
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }
}

impl Controller for ScheduleController {
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
        self.elapsed = 0.0;
    }

    fn update(&mut self, io: &mut ControlIo<'_>, dt: f32) {
        if !self.running {
            return;
        }
        let value = self.value_at(self.elapsed);
        io.set_setpoint(self.actuator, value);
        self.elapsed += f64::from(dt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holds_last_passed_value() {
        let c = ScheduleController::new("s", ActuatorId::new(0, 0), vec![(1.0, 2.0), (0.5, 1.0)]);
        assert_eq!(c.value_at(0.0), 0.0);
        assert_eq!(c.value_at(0.5), 1.0);
        assert_eq!(c.value_at(0.9), 1.0);
        assert_eq!(c.value_at(10.0), 2.0);
    }
}
