//! Simulated bodies owned by the simulation manager.
//!
//! Every entity implements [`Entity`]; per-tick behaviour is exposed through the
//! capability traits below so the pipeline never inspects concrete types.

pub mod articulated;
pub mod cable;
pub mod ghost;
pub mod solid;
pub mod static_entity;

use std::any::Any;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::core::{
    collider::BodyRef,
    types::{Aabb, Transform},
};
use crate::error::Result;
use crate::utils::allocator::EntityId;
use crate::world::DynamicsWorld;

pub use articulated::{ArticulatedEntity, ArticulatedJoint, ArticulatedJointKind};
pub use cable::CableEntity;
pub use ghost::{FluidProperties, GhostEntity};
pub use solid::SolidEntity;
pub use static_entity::StaticEntity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    Static,
    Solid,
    Articulated,
    Cable,
    Ghost,
}

/// Speed thresholds (SI) below which a body counts as settled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SettlingTolerance {
    pub linear: f32,
    pub angular: f32,
}

impl SettlingTolerance {
    pub fn admits(&self, linear: Vec3, angular: Vec3) -> bool {
        linear.length() <= self.linear && angular.length() <= self.angular
    }
}

/// Entities whose rigid bodies need gravity applied as an explicit force.
pub trait AppliesGravity {
    fn apply_gravity(&self, world: &mut DynamicsWorld);
}

/// Entities that apply passive damping forces every tick.
pub trait AppliesDamping {
    fn apply_damping(&self, world: &mut DynamicsWorld);
}

/// Entities that interact with overlapping bodies every tick (triggers, fluids).
pub trait PassiveInteraction {
    fn interact(&mut self, world: &mut DynamicsWorld, dt: f32);
}

/// Entities that can report whether they have come to rest.
pub trait SettlingCheck {
    fn is_settled(&self, world: &DynamicsWorld, tolerance: &SettlingTolerance) -> bool;
}

/// Uniform interface of every simulated body.
pub trait Entity: Send + Sync {
    fn name(&self) -> &str;

    fn entity_type(&self) -> EntityType;

    fn is_registered(&self) -> bool;

    /// Creates the entity's bodies and colliders in `world`, tagging colliders with `id`.
    ///
    /// Fails with `AlreadyRegistered` when called a second time.
    fn register(&mut self, world: &mut DynamicsWorld, id: EntityId) -> Result<()>;

    /// Removes everything `register` created.
    fn unregister(&mut self, world: &mut DynamicsWorld);

    /// World bounding box; empty for unbounded or unregistered entities.
    fn aabb(&self, world: &DynamicsWorld) -> Aabb;

    /// World transform of the entity's main frame.
    fn transform(&self, world: &DynamicsWorld) -> Transform;

    /// Material id of the given part, if the entity carries one.
    fn material(&self, _part: Option<usize>) -> Option<usize> {
        None
    }

    /// Body backing the given part.
    fn body(&self, _part: Option<usize>) -> Option<BodyRef> {
        None
    }

    fn as_gravity(&self) -> Option<&dyn AppliesGravity> {
        None
    }

    fn as_damping(&self) -> Option<&dyn AppliesDamping> {
        None
    }

    fn as_passive_mut(&mut self) -> Option<&mut dyn PassiveInteraction> {
        None
    }

    fn as_settling(&self) -> Option<&dyn SettlingCheck> {
        None
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<'a> dyn Entity + 'a {
    pub fn downcast_ref<T: Entity + 'static>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Entity + 'static>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}
