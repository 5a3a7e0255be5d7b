use std::any::Any;

use serde::{Deserialize, Serialize};

use super::{Entity, EntityType, PassiveInteraction};
use crate::core::{
    collider::{BodyRef, Collider, ColliderShape, ColliderTag},
    rigidbody::RigidBody,
    types::{Aabb, Transform},
};
use crate::error::{Result, SimulationError};
use crate::utils::allocator::{BodyHandle, ColliderHandle, EntityId};
use crate::world::DynamicsWorld;

/// Fluid filling a ghost volume.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FluidProperties {
    /// kg/m³
    pub density: f32,
    /// Linear drag coefficient (N·s/m).
    pub linear_drag: f32,
}

/// Non-colliding trigger volume.
///
/// Records the entities overlapping it every tick. With fluid properties set it
/// also pushes overlapping bodies with buoyancy and linear drag; a body counts as
/// submerged when its collider centre lies inside the volume.
#[derive(Debug, Clone)]
pub struct GhostEntity {
    name: String,
    shape: ColliderShape,
    transform: Transform,
    fluid: Option<FluidProperties>,
    body: Option<BodyHandle>,
    collider: Option<ColliderHandle>,
    overlapping: Vec<EntityId>,
}

impl GhostEntity {
    pub fn new(name: &str, shape: ColliderShape, transform: Transform) -> Self {
        Self {
            name: name.to_string(),
            shape,
            transform,
            fluid: None,
            body: None,
            collider: None,
            overlapping: Vec::new(),
        }
    }

    pub fn with_fluid(mut self, fluid: FluidProperties) -> Self {
        self.fluid = Some(fluid);
        self
    }

    pub fn fluid(&self) -> Option<FluidProperties> {
        self.fluid
    }

    /// Entities found inside the volume during the last tick.
    pub fn overlapping(&self) -> &[EntityId] {
        &self.overlapping
    }

    fn apply_fluid_forces(&self, world: &mut DynamicsWorld, fluid: FluidProperties, others: &[ColliderHandle]) {
        let gravity = world.gravity();
        for handle in others {
            let Some(collider) = world.collider(*handle) else {
                continue;
            };
            if world.body_is_static(collider.body) {
                continue;
            }
            let Some(placement) = world.collider_transform(collider) else {
                continue;
            };
            let center = placement.position;
            if !self.shape.contains_point(&self.transform, center) {
                continue;
            }
            let body = collider.body;
            let buoyancy = -gravity * fluid.density * collider.shape.volume();
            let drag = -fluid.linear_drag * world.point_velocity(body, center);
            world.apply_force_at(body, buoyancy + drag, center);
        }
    }
}

impl Entity for GhostEntity {
    fn name(&self) -> &str {
        &self.name
    }

    fn entity_type(&self) -> EntityType {
        EntityType::Ghost
    }

    fn is_registered(&self) -> bool {
        self.body.is_some()
    }

    fn register(&mut self, world: &mut DynamicsWorld, id: EntityId) -> Result<()> {
        if self.is_registered() {
            return Err(SimulationError::AlreadyRegistered(self.name.clone()));
        }
        let handle = world.add_rigid_body(RigidBody::fixed(self.transform));
        self.collider = Some(
            world.add_collider(
                Collider::new(BodyRef::Rigid(handle), self.shape)
                    .with_tag(ColliderTag::whole(id))
                    .as_trigger(),
            ),
        );
        self.body = Some(handle);
        Ok(())
    }

    fn unregister(&mut self, world: &mut DynamicsWorld) {
        if let Some(handle) = self.body.take() {
            world.remove_rigid_body(handle);
        }
        self.collider = None;
        self.overlapping.clear();
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

    fn body(&self, _part: Option<usize>) -> Option<BodyRef> {
        self.body.map(BodyRef::Rigid)
    }

    fn as_passive_mut(&mut self) -> Option<&mut dyn PassiveInteraction> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl PassiveInteraction for GhostEntity {
    fn interact(&mut self, world: &mut DynamicsWorld, _dt: f32) {
        let Some(collider) = self.collider else {
            return;
        };
        let others = world.overlapping_colliders(collider);
        self.overlapping = others
            .iter()
            .filter_map(|h| world.collider(*h).and_then(|c| c.tag))
            .map(|tag| tag.entity)
            .collect();
        self.overlapping.sort();
        self.overlapping.dedup();

        if let Some(fluid) = self.fluid {
            self.apply_fluid_forces(world, fluid, &others);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::solver::{ConstraintSolver, SolverParams, SolverType};
    use glam::{Mat3, Vec3};

    #[test]
    fn fluid_pushes_submerged_body_up() {
        let mut world = DynamicsWorld::new(ConstraintSolver::new(SolverType::Dantzig, SolverParams::default()));
        world.set_gravity(Vec3::new(0.0, 0.0, -9.81));
        let mut pool = GhostEntity::new("pool", ColliderShape::cuboid(Vec3::splat(2.0)), Transform::IDENTITY)
            .with_fluid(FluidProperties {
                density: 1000.0,
                linear_drag: 0.0,
            });
        pool.register(&mut world, EntityId::new(0, 0)).expect("register");

        let body = world.add_rigid_body(RigidBody::dynamic(
            Transform::IDENTITY,
            crate::core::types::MassProperties::new(1.0, Mat3::IDENTITY),
        ));
        world.add_collider(
            Collider::new(BodyRef::Rigid(body), ColliderShape::sphere(0.1)).with_tag(ColliderTag::whole(EntityId::new(1, 0))),
        );

        pool.interact(&mut world, 0.01);
        assert_eq!(pool.overlapping(), &[EntityId::new(1, 0)]);
        let force = world.body(body).expect("body").accumulated_force();
        assert!(force.z > 0.0);
    }
}
