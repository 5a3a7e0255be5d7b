use glam::Vec3;

use super::Actuator;
use crate::mount::Mount;
use crate::world::DynamicsWorld;

/// Produces thrust along the local X axis of its body mount.
#[derive(Debug, Clone)]
pub struct Thruster {
    name: String,
    mount: Mount,
    max_thrust: f32,
    setpoint: f32,
}

impl Thruster {
    pub fn new(name: &str, max_thrust: f32) -> Self {
        Self {
            name: name.to_string(),
            mount: Mount::Unattached,
            max_thrust: max_thrust.abs(),
            setpoint: 0.0,
        }
    }

    pub fn thrust(&self) -> f32 {
        self.setpoint.clamp(-self.max_thrust, self.max_thrust)
    }
}

impl Actuator for Thruster {
    fn name(&self) -> &str {
        &self.name
    }

    fn mount(&self) -> Mount {
        self.mount
    }

    fn attach(&mut self, mount: Mount) {
        self.mount = mount;
    }

    fn setpoint(&self) -> f32 {
        self.setpoint
    }

    fn set_setpoint(&mut self, value: f32) {
        self.setpoint = value;
    }

    fn update(&mut self, world: &mut DynamicsWorld, _dt: f32) {
        let (Mount::Body { body, .. }, Some(frame)) = (self.mount, self.mount.frame(world)) else {
            return;
        };
        let force = frame.rotation * Vec3::X * self.thrust();
        world.apply_force_at(body, force, frame.position);
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
    use crate::dynamics::solver::ConstraintSolver;
    use approx::assert_relative_eq;
    use glam::Quat;

    #[test]
    fn thrust_follows_mount_orientation_and_saturates() {
        let mut world = DynamicsWorld::new(ConstraintSolver::default());
        let body = world.add_rigid_body(RigidBody::dynamic(Transform::IDENTITY, MassProperties::default()));
        let mut thruster = Thruster::new("prop", 5.0);
        thruster.attach(Mount::body(
            BodyRef::Rigid(body),
            Transform::from_rotation(Quat::from_rotation_z(std::f32::consts::FRAC_PI_2)),
        ));
        thruster.set_setpoint(20.0);
        thruster.update(&mut world, 0.01);
        let force = world.body(body).expect("body").accumulated_force();
        assert_relative_eq!(force.y, 5.0, epsilon = 1e-5);
        assert_relative_eq!(force.x, 0.0, epsilon = 1e-5);
    }
}
