//! Sensors read physical state once per tick and keep a bounded sample history.

pub mod joint_encoder;
pub mod odometry;

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::mount::Mount;
use crate::world::DynamicsWorld;

pub use joint_encoder::JointEncoder;
pub use odometry::Odometry;

/// One timestamped measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub time: f64,
    pub values: Vec<f32>,
}

/// Ring buffer of the most recent samples.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorHistory {
    capacity: usize,
    samples: VecDeque<Sample>,
}

impl SensorHistory {
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, sample: Sample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn last(&self) -> Option<&Sample> {
        self.samples.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> + '_ {
        self.samples.iter()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

/// Decides on which ticks a sensor or controller with a given rate runs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingClock {
    period: Option<f32>,
    elapsed: f32,
}

impl SamplingClock {
    /// Non-positive frequencies run on every tick.
    pub fn new(frequency: f32) -> Self {
        Self {
            period: (frequency > 0.0).then(|| 1.0 / frequency),
            elapsed: 0.0,
        }
    }

    pub fn every_tick() -> Self {
        Self::new(0.0)
    }

    pub fn tick(&mut self, dt: f32) -> bool {
        let Some(period) = self.period else {
            return true;
        };
        self.elapsed += dt;
        if self.elapsed + 1.0e-6 >= period {
            self.elapsed -= period;
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.elapsed = 0.0;
    }
}

pub trait Sensor: Send + Sync {
    fn name(&self) -> &str;

    fn mount(&self) -> Mount;

    fn attach(&mut self, mount: Mount);

    /// Number of values per sample.
    fn channels(&self) -> usize;

    /// Samples the world if the sampling clock fires. Never mutates physical state.
    fn update(&mut self, world: &DynamicsWorld, time: f64, dt: f32);

    fn history(&self) -> &SensorHistory;

    fn reset(&mut self);

    fn last_sample(&self) -> Option<&Sample> {
        self.history().last()
    }

    fn reading(&self, channel: usize) -> Option<f32> {
        self.last_sample()
            .and_then(|s| s.values.get(channel).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_drops_oldest_samples() {
        let mut history = SensorHistory::new(2);
        for i in 0..3 {
            history.push(Sample {
                time: i as f64,
                values: vec![i as f32],
            });
        }
        assert_eq!(history.len(), 2);
        assert_eq!(history.iter().next().map(|s| s.time), Some(1.0));
        assert_eq!(history.last().map(|s| s.values[0]), Some(2.0));
    }

    #[test]
    fn clock_fires_at_its_rate() {
        let mut clock = SamplingClock::new(2.0);
        let fired = (0..40).filter(|_| clock.tick(0.125)).count();
        assert_eq!(fired, 10);
        let mut always = SamplingClock::every_tick();
        assert!(always.tick(0.01));
    }
}
