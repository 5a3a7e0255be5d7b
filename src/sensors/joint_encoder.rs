use super::{Sample, SamplingClock, Sensor, SensorHistory};
use crate::mount::Mount;
use crate::world::DynamicsWorld;

/// Measures position and velocity of an articulated joint.
///
/// Channels: `[position, velocity]`.
#[derive(Debug, Clone)]
pub struct JointEncoder {
    name: String,
    mount: Mount,
    clock: SamplingClock,
    history: SensorHistory,
}

impl JointEncoder {
    pub fn new(name: &str, frequency: f32, history_length: usize) -> Self {
        Self {
            name: name.to_string(),
            mount: Mount::Unattached,
            clock: SamplingClock::new(frequency),
            history: SensorHistory::new(history_length),
        }
    }

    pub fn position(&self) -> Option<f32> {
        self.reading(0)
    }

    pub fn velocity(&self) -> Option<f32> {
        self.reading(1)
    }
}

impl Sensor for JointEncoder {
    fn name(&self) -> &str {
        &self.name
    }

    fn mount(&self) -> Mount {
        self.mount
    }

    fn attach(&mut self, mount: Mount) {
        self.mount = mount;
    }

    fn channels(&self) -> usize {
        2
    }

    fn update(&mut self, world: &DynamicsWorld, time: f64, dt: f32) {
        if !self.clock.tick(dt) {
            return;
        }
        if let Some((position, velocity)) = self.mount.joint_state(world) {
            self.history.push(Sample {
                time,
                values: vec![position, velocity],
            });
        }
    }

    fn history(&self) -> &SensorHistory {
        &self.history
    }

    fn reset(&mut self) {
        self.history.clear();
        self.clock.reset();
    }
}
