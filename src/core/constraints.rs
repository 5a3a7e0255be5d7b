use crate::utils::allocator::BodyHandle;
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Velocity motor driving the relative rotation about a hinge axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HingeMotor {
    /// Target angular velocity of B relative to A about the hinge axis.
    pub target_velocity: f32,
    /// Largest impulse the motor may apply per step.
    pub max_impulse: f32,
}

/// Maximal-coordinate constraints between rigid bodies.
///
/// Pivots and axes are expressed in each body's center-of-mass frame. When
/// `body_b` is `None` the B-side quantities are in world space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ConstraintKind {
    /// Locks all six relative degrees of freedom.
    Fixed {
        pivot_a: Vec3,
        pivot_b: Vec3,
        /// Relative orientation `q_a⁻¹ q_b` to maintain.
        relative_rotation: Quat,
    },
    /// Ball-and-socket.
    Point { pivot_a: Vec3, pivot_b: Vec3 },
    Hinge {
        pivot_a: Vec3,
        pivot_b: Vec3,
        axis_a: Vec3,
        axis_b: Vec3,
        /// Relative orientation at zero hinge angle.
        reference: Quat,
        motor: Option<HingeMotor>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constraint {
    pub body_a: BodyHandle,
    pub body_b: Option<BodyHandle>,
    pub kind: ConstraintKind,
}

impl Constraint {
    pub fn new(body_a: BodyHandle, body_b: Option<BodyHandle>, kind: ConstraintKind) -> Self {
        Self {
            body_a,
            body_b,
            kind,
        }
    }

    pub fn bodies(&self) -> (BodyHandle, Option<BodyHandle>) {
        (self.body_a, self.body_b)
    }

    pub fn involves(&self, body: BodyHandle) -> bool {
        self.body_a == body || self.body_b == Some(body)
    }
}
