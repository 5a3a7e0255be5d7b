use glam::Vec3;

use super::{resolve_pair, BodyResolver, Joint};
use crate::core::{
    collider::BodyRef,
    constraints::{Constraint, ConstraintKind, HingeMotor},
};
use crate::entities::SettlingTolerance;
use crate::error::{Result, SimulationError};
use crate::utils::allocator::{BodyHandle, ConstraintHandle, EntityId};
use crate::world::DynamicsWorld;

/// Velocity gain (1/s) used to drive the joint toward its IC angle.
const IC_GAIN: f32 = 10.0;
/// Impulse budget of the IC motor per step (N·m·s).
const IC_MAX_IMPULSE: f32 = 10.0;

/// Hinge about a world axis through a world pivot.
///
/// With an IC angle set, the initial-conditions solver drives the hinge to that
/// angle with a velocity motor before the simulation starts.
#[derive(Debug, Clone)]
pub struct RevoluteJoint {
    name: String,
    a: EntityId,
    b: Option<EntityId>,
    pivot: Vec3,
    axis: Vec3,
    damping: f32,
    ic_angle: Option<f32>,
    bodies: Option<(BodyHandle, Option<BodyHandle>)>,
    constraint: Option<ConstraintHandle>,
}

impl RevoluteJoint {
    pub fn new(name: &str, a: EntityId, b: Option<EntityId>, pivot: Vec3, axis: Vec3) -> Self {
        Self {
            name: name.to_string(),
            a,
            b,
            pivot,
            axis: axis.normalize_or_zero(),
            damping: 0.0,
            ic_angle: None,
            bodies: None,
            constraint: None,
        }
    }

    pub fn with_damping(mut self, damping: f32) -> Self {
        self.damping = damping.max(0.0);
        self
    }

    pub fn with_ic_angle(mut self, angle: f32) -> Self {
        self.ic_angle = Some(angle);
        self
    }

    pub fn angle(&self, world: &DynamicsWorld) -> Option<f32> {
        world.hinge_angle(self.constraint?)
    }

    pub fn angular_velocity(&self, world: &DynamicsWorld) -> Option<f32> {
        world.hinge_velocity(self.constraint?)
    }

    fn world_axis(&self, world: &DynamicsWorld) -> Option<Vec3> {
        let (body_a, _) = self.bodies?;
        let constraint = world.constraint(self.constraint?)?;
        let ConstraintKind::Hinge { axis_a, .. } = constraint.kind else {
            return None;
        };
        world.body(body_a).map(|b| b.transform.rotation * axis_a)
    }
}

impl Joint for RevoluteJoint {
    fn name(&self) -> &str {
        &self.name
    }

    fn register(&mut self, world: &mut DynamicsWorld, bodies: &BodyResolver<'_>) -> Result<()> {
        if self.constraint.is_some() {
            return Err(SimulationError::AlreadyRegistered(self.name.clone()));
        }
        if self.axis == Vec3::ZERO {
            return Err(SimulationError::InvalidJoint {
                name: self.name.clone(),
                reason: "axis has zero length".into(),
            });
        }
        let (body_a, body_b) = resolve_pair(&self.name, self.a, self.b, bodies)?;
        let Some(xa) = world.body(body_a).map(|b| b.transform) else {
            return Err(SimulationError::InvalidMount(self.name.clone()));
        };
        let xb = body_b
            .and_then(|h| world.body(h))
            .map(|b| b.transform)
            .unwrap_or_default();
        let kind = ConstraintKind::Hinge {
            pivot_a: xa.inverse_transform_point(self.pivot),
            pivot_b: xb.inverse_transform_point(self.pivot),
            axis_a: xa.rotation.inverse() * self.axis,
            axis_b: xb.rotation.inverse() * self.axis,
            reference: xa.rotation.inverse() * xb.rotation,
            motor: None,
        };
        self.constraint = Some(world.add_constraint(Constraint::new(body_a, body_b, kind)));
        self.bodies = Some((body_a, body_b));
        Ok(())
    }

    fn unregister(&mut self, world: &mut DynamicsWorld) {
        if let Some(handle) = self.constraint.take() {
            world.remove_constraint(handle);
        }
        self.bodies = None;
    }

    fn constraint(&self) -> Option<ConstraintHandle> {
        self.constraint
    }

    fn apply_damping(&self, world: &mut DynamicsWorld) {
        if self.damping <= 0.0 {
            return;
        }
        let (Some((body_a, body_b)), Some(axis), Some(rate)) =
            (self.bodies, self.world_axis(world), self.angular_velocity(world))
        else {
            return;
        };
        let torque = axis * (self.damping * rate);
        world.apply_torque(BodyRef::Rigid(body_a), torque);
        if let Some(b) = body_b {
            world.apply_torque(BodyRef::Rigid(b), -torque);
        }
    }

    fn solve_position_ic(&mut self, world: &mut DynamicsWorld, tolerance: &SettlingTolerance) -> bool {
        let (Some(target), Some(handle)) = (self.ic_angle, self.constraint) else {
            return true;
        };
        let Some(angle) = world.hinge_angle(handle) else {
            return true;
        };
        let error = target - angle;
        if error.abs() > tolerance.angular {
            world.set_hinge_motor(
                handle,
                Some(HingeMotor {
                    target_velocity: IC_GAIN * error,
                    max_impulse: IC_MAX_IMPULSE,
                }),
            );
            return false;
        }
        let rate = world.hinge_velocity(handle).unwrap_or(0.0);
        if rate.abs() > tolerance.angular {
            // Hold until the hinge has stopped.
            world.set_hinge_motor(
                handle,
                Some(HingeMotor {
                    target_velocity: 0.0,
                    max_impulse: IC_MAX_IMPULSE,
                }),
            );
            return false;
        }
        world.set_hinge_motor(handle, None);
        true
    }
}
