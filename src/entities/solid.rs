use std::any::Any;

use glam::Vec3;
use log::warn;

use super::{AppliesGravity, Entity, EntityType, SettlingCheck, SettlingTolerance};
use crate::core::{
    collider::{BodyRef, Collider, ColliderShape, ColliderTag},
    rigidbody::RigidBody,
    types::{Aabb, MassProperties, Transform},
};
use crate::error::{Result, SimulationError};
use crate::materials::Material;
use crate::utils::allocator::{BodyHandle, ColliderHandle, EntityId};
use crate::world::DynamicsWorld;

/// A single dynamic rigid body with one collision shape.
///
/// The collision shape and mass properties are centred on the center of mass.
/// `cg_to_origin` locates the body's origin frame relative to it.
#[derive(Debug, Clone)]
pub struct SolidEntity {
    name: String,
    shape: ColliderShape,
    material: usize,
    mass_properties: MassProperties,
    cg_to_origin: Transform,
    origin: Transform,
    linear_damping: f32,
    angular_damping: f32,
    body: Option<BodyHandle>,
    collider: Option<ColliderHandle>,
}

impl SolidEntity {
    /// Creates a solid whose mass follows from the material density.
    pub fn new(name: &str, shape: ColliderShape, material: &Material) -> Self {
        if !shape.is_bounded() {
            warn!("Solid '{name}' uses an unbounded shape; it will have no mass");
        }
        Self {
            name: name.to_string(),
            shape,
            material: material.id,
            mass_properties: shape.mass_properties(material.density),
            cg_to_origin: Transform::IDENTITY,
            origin: Transform::IDENTITY,
            linear_damping: 0.0,
            angular_damping: 0.0,
            body: None,
            collider: None,
        }
    }

    /// Places the origin frame in the world.
    pub fn with_transform(mut self, origin: Transform) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_cg_offset(mut self, cg_to_origin: Transform) -> Self {
        self.cg_to_origin = cg_to_origin;
        self
    }

    pub fn with_mass_properties(mut self, mass_properties: MassProperties) -> Self {
        self.mass_properties = mass_properties;
        self
    }

    pub fn with_damping(mut self, linear: f32, angular: f32) -> Self {
        self.linear_damping = linear.max(0.0);
        self.angular_damping = angular.max(0.0);
        self
    }

    pub fn shape(&self) -> &ColliderShape {
        &self.shape
    }

    pub fn material_id(&self) -> usize {
        self.material
    }

    pub fn mass_properties(&self) -> MassProperties {
        self.mass_properties
    }

    pub fn cg_to_origin(&self) -> Transform {
        self.cg_to_origin
    }

    /// Center-of-mass frame implied by the configured origin placement.
    pub fn initial_cg_transform(&self) -> Transform {
        self.origin.combine(&self.cg_to_origin.inverse())
    }

    pub fn body_handle(&self) -> Option<BodyHandle> {
        self.body
    }

    pub fn linear_velocity(&self, world: &DynamicsWorld) -> Vec3 {
        self.body
            .and_then(|h| world.body(h))
            .map(|b| b.velocity.linear)
            .unwrap_or(Vec3::ZERO)
    }

    pub fn angular_velocity(&self, world: &DynamicsWorld) -> Vec3 {
        self.body
            .and_then(|h| world.body(h))
            .map(|b| b.velocity.angular)
            .unwrap_or(Vec3::ZERO)
    }
}

impl Entity for SolidEntity {
    fn name(&self) -> &str {
        &self.name
    }

    fn entity_type(&self) -> EntityType {
        EntityType::Solid
    }

    fn is_registered(&self) -> bool {
        self.body.is_some()
    }

    fn register(&mut self, world: &mut DynamicsWorld, id: EntityId) -> Result<()> {
        if self.is_registered() {
            return Err(SimulationError::AlreadyRegistered(self.name.clone()));
        }
        let mut body = RigidBody::dynamic(self.initial_cg_transform(), self.mass_properties);
        body.linear_damping = self.linear_damping;
        body.angular_damping = self.angular_damping;
        let handle = world.add_rigid_body(body);
        let collider = world.add_collider(
            Collider::new(BodyRef::Rigid(handle), self.shape).with_tag(ColliderTag::whole(id)),
        );
        self.body = Some(handle);
        self.collider = Some(collider);
        Ok(())
    }

    fn unregister(&mut self, world: &mut DynamicsWorld) {
        if let Some(handle) = self.body.take() {
            world.remove_rigid_body(handle);
        }
        self.collider = None;
    }

    fn aabb(&self, world: &DynamicsWorld) -> Aabb {
        self.collider
            .and_then(|c| world.collider_aabb(c))
            .filter(|_| self.shape.is_bounded())
            .unwrap_or(Aabb::EMPTY)
    }

    fn transform(&self, world: &DynamicsWorld) -> Transform {
        self.body
            .and_then(|h| world.body(h))
            .map(|b| b.transform.combine(&self.cg_to_origin))
            .unwrap_or(self.origin)
    }

    fn material(&self, _part: Option<usize>) -> Option<usize> {
        Some(self.material)
    }

    fn body(&self, _part: Option<usize>) -> Option<BodyRef> {
        self.body.map(BodyRef::Rigid)
    }

    fn as_gravity(&self) -> Option<&dyn AppliesGravity> {
        Some(self)
    }

    fn as_settling(&self) -> Option<&dyn SettlingCheck> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl AppliesGravity for SolidEntity {
    fn apply_gravity(&self, world: &mut DynamicsWorld) {
        let gravity = world.gravity();
        if let Some(body) = self.body.and_then(|h| world.body_mut(h)) {
            let mass = body.mass_properties.mass;
            body.apply_central_force(gravity * mass);
        }
    }
}

impl SettlingCheck for SolidEntity {
    fn is_settled(&self, world: &DynamicsWorld, tolerance: &SettlingTolerance) -> bool {
        tolerance.admits(self.linear_velocity(world), self.angular_velocity(world))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::solver::{ConstraintSolver, SolverParams, SolverType};
    use crate::materials::MaterialTable;
    use approx::assert_relative_eq;

    fn steel() -> Material {
        let mut table = MaterialTable::new();
        let id = table.create_material("steel", 1000.0, 0.5).expect("material");
        table.material(id).cloned().expect("material")
    }

    fn world() -> DynamicsWorld {
        let mut world = DynamicsWorld::new(ConstraintSolver::new(SolverType::Dantzig, SolverParams::default()));
        world.set_gravity(Vec3::new(0.0, 0.0, -9.81));
        world
    }

    #[test]
    fn mass_follows_density() {
        let solid = SolidEntity::new("cube", ColliderShape::cuboid(Vec3::splat(0.5)), &steel());
        assert_relative_eq!(solid.mass_properties().mass, 1000.0, epsilon = 1e-3);
    }

    #[test]
    fn registering_twice_fails() {
        let mut world = world();
        let mut solid = SolidEntity::new("ball", ColliderShape::sphere(0.1), &steel());
        let id = EntityId::new(0, 0);
        solid.register(&mut world, id).expect("first registration");
        assert_eq!(
            solid.register(&mut world, id),
            Err(SimulationError::AlreadyRegistered("ball".into()))
        );
        assert_eq!(world.bodies.len(), 1);
    }

    #[test]
    fn origin_frame_is_offset_from_center_of_mass() {
        let mut world = world();
        let mut solid = SolidEntity::new("ball", ColliderShape::sphere(0.1), &steel())
            .with_cg_offset(Transform::from_translation(Vec3::new(0.0, 0.0, -0.1)))
            .with_transform(Transform::from_translation(Vec3::new(1.0, 0.0, 0.0)));
        solid.register(&mut world, EntityId::new(0, 0)).expect("register");
        let body = world.body(solid.body_handle().expect("body")).expect("body");
        assert_relative_eq!(body.transform.position.z, 0.1, epsilon = 1e-6);
        assert_relative_eq!(solid.transform(&world).position.z, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn gravity_is_applied_as_force() {
        let mut world = world();
        let mut solid = SolidEntity::new("ball", ColliderShape::sphere(0.1), &steel());
        solid.register(&mut world, EntityId::new(0, 0)).expect("register");
        solid.apply_gravity(&mut world);
        let body = world.body(solid.body_handle().expect("body")).expect("body");
        let expected = -9.81 * solid.mass_properties().mass;
        assert_relative_eq!(body.accumulated_force().z, expected, epsilon = 1e-3);
    }
}
