//! Controllers read sensors and write actuator setpoints, never touching bodies directly.

pub mod pid;
pub mod schedule;

use crate::actuators::Actuator;
use crate::sensors::Sensor;
use crate::utils::allocator::{ActuatorId, Arena, SensorId};

pub use pid::{PidController, PidGains};
pub use schedule::ScheduleController;

/// The slice of a scene a controller may touch during one tick.
pub struct ControlIo<'a> {
    pub sensors: &'a Arena<Box<dyn Sensor>, SensorId>,
    pub actuators: &'a mut Arena<Box<dyn Actuator>, ActuatorId>,
    pub time: f64,
}

impl<'a> ControlIo<'a> {
    pub fn new(
        sensors: &'a Arena<Box<dyn Sensor>, SensorId>,
        actuators: &'a mut Arena<Box<dyn Actuator>, ActuatorId>,
        time: f64,
    ) -> Self {
        Self {
            sensors,
            actuators,
            time,
        }
    }

    /// Latest value of one sensor channel.
    pub fn reading(&self, sensor: SensorId, channel: usize) -> Option<f32> {
        self.sensors.get(sensor)?.reading(channel)
    }

    /// Returns false when the actuator no longer exists.
    pub fn set_setpoint(&mut self, actuator: ActuatorId, value: f32) -> bool {
        match self.actuators.get_mut(actuator) {
            Some(a) => {
                a.set_setpoint(value);
                true
            }
            None => false,
        }
    }
}

pub trait Controller: Send + Sync {
    fn name(&self) -> &str;

    fn start(&mut self);

    fn stop(&mut self);

    fn is_running(&self) -> bool;

    /// Clears internal state without changing the running flag.
    fn reset(&mut self);

    /// Runs one control tick. Stopped controllers do nothing.
    fn update(&mut self, io: &mut ControlIo<'_>, dt: f32);
}
