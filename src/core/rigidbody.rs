use super::types::{MassProperties, Transform, Velocity};
use crate::utils::math::world_inertia;
use glam::{Mat3, Vec3};

/// Rigid body state stored by the dynamics world.
///
/// The frame of a rigid body is its center of mass.
#[derive(Debug, Clone)]
pub struct RigidBody {
    pub transform: Transform,
    /// Last transform published to observers through `synchronize_motion_states`.
    pub motion_state: Transform,
    pub velocity: Velocity,
    pub mass_properties: MassProperties,
    pub is_static: bool,
    pub linear_damping: f32,
    pub angular_damping: f32,
    inverse_mass: f32,
    inverse_inertia: Mat3,
    force: Vec3,
    torque: Vec3,
}

impl Default for RigidBody {
    fn default() -> Self {
        let mut body = Self {
            transform: Transform::IDENTITY,
            motion_state: Transform::IDENTITY,
            velocity: Velocity::default(),
            mass_properties: MassProperties::default(),
            is_static: false,
            linear_damping: 0.0,
            angular_damping: 0.0,
            inverse_mass: 1.0,
            inverse_inertia: Mat3::IDENTITY,
            force: Vec3::ZERO,
            torque: Vec3::ZERO,
        };
        body.recompute_inverses();
        body
    }
}

impl RigidBody {
    pub fn dynamic(transform: Transform, mass_properties: MassProperties) -> Self {
        let mut body = Self {
            transform,
            motion_state: transform,
            mass_properties,
            ..Self::default()
        };
        body.recompute_inverses();
        body
    }

    pub fn fixed(transform: Transform) -> Self {
        let mut body = Self {
            transform,
            motion_state: transform,
            mass_properties: MassProperties::new(0.0, Mat3::ZERO),
            is_static: true,
            ..Self::default()
        };
        body.recompute_inverses();
        body
    }

    pub fn inverse_mass(&self) -> f32 {
        self.inverse_mass
    }

    /// Inverse inertia tensor rotated into world frame.
    pub fn inverse_inertia_world(&self) -> Mat3 {
        if self.is_static {
            return Mat3::ZERO;
        }
        world_inertia(self.transform.rotation, self.inverse_inertia)
    }

    pub fn inertia_world(&self) -> Mat3 {
        world_inertia(self.transform.rotation, self.mass_properties.inertia)
    }

    pub fn set_velocity(&mut self, linear: Vec3, angular: Vec3) {
        self.velocity.linear = linear;
        self.velocity.angular = angular;
    }

    /// Velocity of a world-space point attached to the body.
    pub fn velocity_at_point(&self, point: Vec3) -> Vec3 {
        self.velocity.at_offset(point - self.transform.position)
    }

    pub fn apply_central_force(&mut self, force: Vec3) {
        if self.is_static {
            return;
        }
        self.force += force;
    }

    pub fn apply_torque(&mut self, torque: Vec3) {
        if self.is_static {
            return;
        }
        self.torque += torque;
    }

    /// Applies a world-space force at a world-space point.
    pub fn apply_force_at(&mut self, force: Vec3, point: Vec3) {
        if self.is_static {
            return;
        }
        self.force += force;
        self.torque += (point - self.transform.position).cross(force);
    }

    pub fn apply_impulse(&mut self, impulse: Vec3, point: Vec3) {
        if self.is_static {
            return;
        }
        self.velocity.linear += impulse * self.inverse_mass;
        let torque = (point - self.transform.position).cross(impulse);
        self.velocity.angular += self.inverse_inertia_world() * torque;
    }

    pub fn accumulated_force(&self) -> Vec3 {
        self.force
    }

    pub fn accumulated_torque(&self) -> Vec3 {
        self.torque
    }

    pub fn clear_forces(&mut self) {
        self.force = Vec3::ZERO;
        self.torque = Vec3::ZERO;
    }

    pub fn set_mass_properties(&mut self, props: MassProperties) {
        self.mass_properties = props;
        self.recompute_inverses();
    }

    fn recompute_inverses(&mut self) {
        if self.is_static {
            self.inverse_mass = 0.0;
            self.inverse_inertia = Mat3::ZERO;
            return;
        }
        self.inverse_mass = self.mass_properties.inverse_mass();
        self.inverse_inertia = self.mass_properties.inverse_inertia();
    }
}
