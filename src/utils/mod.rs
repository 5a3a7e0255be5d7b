//! Utility helpers including math extensions, allocators and logging.

pub mod allocator;
pub mod logging;
pub mod math;

pub use allocator::{
    ActuatorId, Arena, ArenaId, BodyHandle, ColliderHandle, ConstraintHandle, ContactId,
    ControllerId, EntityId, GenerationalId, JointId, MultibodyHandle, SensorId,
};
pub use math::*;
