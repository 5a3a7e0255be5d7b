use std::any::Any;

use glam::Vec3;

use super::{Entity, EntityType};
use crate::core::{
    collider::{BodyRef, Collider, ColliderShape, ColliderTag},
    rigidbody::RigidBody,
    types::{Aabb, Transform},
};
use crate::error::{Result, SimulationError};
use crate::materials::Material;
use crate::utils::allocator::{BodyHandle, ColliderHandle, EntityId};
use crate::world::DynamicsWorld;

/// Immovable scenery: ground planes, walls, fixed obstacles.
#[derive(Debug, Clone)]
pub struct StaticEntity {
    name: String,
    shape: ColliderShape,
    material: usize,
    transform: Transform,
    body: Option<BodyHandle>,
    collider: Option<ColliderHandle>,
}

impl StaticEntity {
    pub fn new(name: &str, shape: ColliderShape, material: &Material, transform: Transform) -> Self {
        Self {
            name: name.to_string(),
            shape,
            material: material.id,
            transform,
            body: None,
            collider: None,
        }
    }

    /// Infinite ground plane whose normal is the local Z axis of `transform`.
    pub fn plane(name: &str, material: &Material, transform: Transform) -> Self {
        Self::new(name, ColliderShape::plane(Vec3::Z), material, transform)
    }

    pub fn shape(&self) -> &ColliderShape {
        &self.shape
    }

    pub fn material_id(&self) -> usize {
        self.material
    }
}

impl Entity for StaticEntity {
    fn name(&self) -> &str {
        &self.name
    }

    fn entity_type(&self) -> EntityType {
        EntityType::Static
    }

    fn is_registered(&self) -> bool {
        self.body.is_some()
    }

    fn register(&mut self, world: &mut DynamicsWorld, id: EntityId) -> Result<()> {
        if self.is_registered() {
            return Err(SimulationError::AlreadyRegistered(self.name.clone()));
        }
        let handle = world.add_rigid_body(RigidBody::fixed(self.transform));
        self.collider = Some(world.add_collider(
            Collider::new(BodyRef::Rigid(handle), self.shape).with_tag(ColliderTag::whole(id)),
        ));
        self.body = Some(handle);
        Ok(())
    }

    fn unregister(&mut self, world: &mut DynamicsWorld) {
        if let Some(handle) = self.body.take() {
            world.remove_rigid_body(handle);
        }
        self.collider = None;
    }

    fn aabb(&self, world: &DynamicsWorld) -> Aabb {
        if !self.shape.is_bounded() {
            return Aabb::EMPTY;
        }
        self.collider
            .and_then(|c| world.collider_aabb(c))
            .unwrap_or(Aabb::EMPTY)
    }

    fn transform(&self, _world: &DynamicsWorld) -> Transform {
        self.transform
    }

    fn material(&self, _part: Option<usize>) -> Option<usize> {
        Some(self.material)
    }

    fn body(&self, _part: Option<usize>) -> Option<BodyRef> {
        self.body.map(BodyRef::Rigid)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
