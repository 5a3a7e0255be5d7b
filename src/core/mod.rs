//! Core types describing bodies, colliders, constraints and shared data.

pub mod articulations;
pub mod collider;
pub mod constraints;
pub mod rigidbody;
pub mod types;

pub use articulations::{JointKind, Link, Multibody};
pub use collider::{BodyRef, Collider, ColliderShape, ColliderTag};
pub use constraints::{Constraint, ConstraintKind, HingeMotor};
pub use rigidbody::RigidBody;
pub use types::{Aabb, InertiaTensorExt, MassProperties, Transform, Velocity};
