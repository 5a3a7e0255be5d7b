use glam::Vec3;

use crate::core::{rigidbody::RigidBody, types::Velocity};
use crate::utils::math::angular_velocity_to_quat;

/// Semi-implicit Euler integrator for rigid bodies.
#[derive(Debug, Clone, Copy, Default)]
pub struct Integrator;

impl Integrator {
    /// Applies accumulated forces and gyroscopic coupling to the velocity.
    pub fn integrate_velocity(body: &mut RigidBody, dt: f32) {
        if body.is_static {
            return;
        }

        body.velocity.linear += body.accumulated_force() * body.inverse_mass() * dt;

        let inertia = body.inertia_world();
        let omega = body.velocity.angular;
        let gyroscopic = omega.cross(inertia * omega);
        body.velocity.angular +=
            body.inverse_inertia_world() * (body.accumulated_torque() - gyroscopic) * dt;

        body.velocity.linear *= (1.0 - body.linear_damping * dt).max(0.0);
        body.velocity.angular *= (1.0 - body.angular_damping * dt).max(0.0);
    }

    /// Advances the pose using the solved velocity plus any split-impulse correction.
    pub fn integrate_position(body: &mut RigidBody, push: Velocity, dt: f32) {
        if body.is_static {
            return;
        }

        let linear = body.velocity.linear + push.linear;
        let angular = body.velocity.angular + push.angular;
        body.transform.position += linear * dt;
        if angular.length_squared() > 1e-12 {
            body.transform.rotation =
                (angular_velocity_to_quat(angular, dt) * body.transform.rotation).normalize();
        }
    }

    pub fn kinetic_energy(body: &RigidBody) -> f32 {
        if body.is_static {
            return 0.0;
        }
        let v = body.velocity.linear;
        let w = body.velocity.angular;
        0.5 * body.mass_properties.mass * v.length_squared() + 0.5 * w.dot(body.inertia_world() * w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{MassProperties, Transform};
    use approx::assert_relative_eq;
    use glam::Mat3;

    #[test]
    fn constant_force_accelerates_body() {
        let mut body = RigidBody::dynamic(Transform::IDENTITY, MassProperties::new(2.0, Mat3::IDENTITY));
        body.apply_central_force(Vec3::new(4.0, 0.0, 0.0));
        Integrator::integrate_velocity(&mut body, 0.5);
        assert_relative_eq!(body.velocity.linear.x, 1.0);
        Integrator::integrate_position(&mut body, Velocity::default(), 0.5);
        assert_relative_eq!(body.transform.position.x, 0.5);
    }

    #[test]
    fn static_bodies_do_not_move() {
        let mut body = RigidBody::fixed(Transform::IDENTITY);
        body.velocity.linear = Vec3::ONE;
        Integrator::integrate_position(&mut body, Velocity::default(), 1.0);
        assert_eq!(body.transform.position, Vec3::ZERO);
    }
}
