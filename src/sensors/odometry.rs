use glam::{Quat, Vec3};

use super::{Sample, SamplingClock, Sensor, SensorHistory};
use crate::mount::Mount;
use crate::world::DynamicsWorld;

/// Ideal odometry of a body frame; with a long history it doubles as a
/// trajectory recorder.
///
/// Channels: position (3), orientation quaternion `xyzw` (4), linear velocity (3),
/// angular velocity (3).
#[derive(Debug, Clone)]
pub struct Odometry {
    name: String,
    mount: Mount,
    clock: SamplingClock,
    history: SensorHistory,
}

impl Odometry {
    pub fn new(name: &str, frequency: f32, history_length: usize) -> Self {
        Self {
            name: name.to_string(),
            mount: Mount::Unattached,
            clock: SamplingClock::new(frequency),
            history: SensorHistory::new(history_length),
        }
    }

    pub fn position(&self) -> Option<Vec3> {
        let v = &self.last_sample()?.values;
        Some(Vec3::new(v[0], v[1], v[2]))
    }

    pub fn orientation(&self) -> Option<Quat> {
        let v = &self.last_sample()?.values;
        Some(Quat::from_xyzw(v[3], v[4], v[5], v[6]))
    }

    pub fn linear_velocity(&self) -> Option<Vec3> {
        let v = &self.last_sample()?.values;
        Some(Vec3::new(v[7], v[8], v[9]))
    }

    pub fn angular_velocity(&self) -> Option<Vec3> {
        let v = &self.last_sample()?.values;
        Some(Vec3::new(v[10], v[11], v[12]))
    }

    /// Recorded positions, oldest first.
    pub fn trajectory(&self) -> Vec<(f64, Vec3)> {
        self.history
            .iter()
            .map(|s| (s.time, Vec3::new(s.values[0], s.values[1], s.values[2])))
            .collect()
    }
}

impl Sensor for Odometry {
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
        13
    }

    fn update(&mut self, world: &DynamicsWorld, time: f64, dt: f32) {
        if !self.clock.tick(dt) {
            return;
        }
        let (Some(frame), Some((linear, angular))) = (self.mount.frame(world), self.mount.twist(world)) else {
            return;
        };
        let mut values = Vec::with_capacity(13);
        values.extend_from_slice(&frame.position.to_array());
        values.extend_from_slice(&frame.rotation.to_array());
        values.extend_from_slice(&linear.to_array());
        values.extend_from_slice(&angular.to_array());
        self.history.push(Sample { time, values });
    }

    fn history(&self) -> &SensorHistory {
        &self.history
    }

    fn reset(&mut self) {
        self.history.clear();
        self.clock.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        collider::BodyRef,
        rigidbody::RigidBody,
        types::{MassProperties, Transform},
    };
    use crate::dynamics::solver::{ConstraintSolver, SolverParams, SolverType};
    use approx::assert_relative_eq;

    #[test]
    fn reports_pose_and_twist_of_mounted_frame() {
        let mut world = DynamicsWorld::new(ConstraintSolver::new(SolverType::Dantzig, SolverParams::default()));
        let mut body = RigidBody::dynamic(Transform::from_translation(Vec3::new(1.0, 2.0, 3.0)), MassProperties::default());
        body.set_velocity(Vec3::X, Vec3::Z);
        let handle = world.add_rigid_body(body);

        let mut odometry = Odometry::new("odom", 0.0, 4);
        odometry.attach(Mount::body(
            BodyRef::Rigid(handle),
            Transform::from_translation(Vec3::new(0.0, 1.0, 0.0)),
        ));
        odometry.update(&world, 0.5, 0.01);

        let position = odometry.position().expect("sample");
        assert_relative_eq!(position.y, 3.0, epsilon = 1e-6);
        // v + ω × r with r = +Y and ω = +Z
        let velocity = odometry.linear_velocity().expect("sample");
        assert_relative_eq!(velocity.x, 0.0, epsilon = 1e-6);
        assert_eq!(odometry.trajectory().len(), 1);
    }
}
