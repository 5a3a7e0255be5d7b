use std::any::Any;

use glam::{Mat3, Quat, Vec3};

use super::{AppliesGravity, Entity, EntityType, SettlingCheck, SettlingTolerance};
use crate::core::{
    collider::{BodyRef, Collider, ColliderShape, ColliderTag},
    constraints::{Constraint, ConstraintKind},
    rigidbody::RigidBody,
    types::{Aabb, InertiaTensorExt, MassProperties, Transform},
};
use crate::error::{Result, SimulationError};
use crate::utils::allocator::{BodyHandle, ColliderHandle, ConstraintHandle, EntityId};
use crate::world::DynamicsWorld;

/// Flexible cable approximated by a chain of spherical nodes joined by
/// ball-and-socket constraints.
#[derive(Debug, Clone)]
pub struct CableEntity {
    name: String,
    start: Vec3,
    end: Vec3,
    nodes: usize,
    radius: f32,
    density: f32,
    bodies: Vec<BodyHandle>,
    colliders: Vec<ColliderHandle>,
    constraints: Vec<ConstraintHandle>,
}

impl CableEntity {
    /// `nodes` is clamped to at least two. Density is in kg/m³.
    pub fn new(name: &str, start: Vec3, end: Vec3, nodes: usize, radius: f32, density: f32) -> Self {
        Self {
            name: name.to_string(),
            start,
            end,
            nodes: nodes.max(2),
            radius: radius.max(f32::EPSILON),
            density,
            bodies: Vec::new(),
            colliders: Vec::new(),
            constraints: Vec::new(),
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes
    }

    fn segment_length(&self) -> f32 {
        (self.end - self.start).length() / self.nodes as f32
    }

    fn node_mass_properties(&self) -> MassProperties {
        let length = self.segment_length();
        let mass = self.density * std::f32::consts::PI * self.radius * self.radius * length;
        MassProperties::new(mass, Mat3::for_solid_cylinder(self.radius, length, mass))
    }

    /// World position of node `i`, if registered.
    pub fn node_position(&self, world: &DynamicsWorld, i: usize) -> Option<Vec3> {
        let handle = *self.bodies.get(i)?;
        world.body(handle).map(|b| b.transform.position)
    }
}

impl Entity for CableEntity {
    fn name(&self) -> &str {
        &self.name
    }

    fn entity_type(&self) -> EntityType {
        EntityType::Cable
    }

    fn is_registered(&self) -> bool {
        !self.bodies.is_empty()
    }

    fn register(&mut self, world: &mut DynamicsWorld, id: EntityId) -> Result<()> {
        if self.is_registered() {
            return Err(SimulationError::AlreadyRegistered(self.name.clone()));
        }
        let direction = (self.end - self.start).normalize_or_zero();
        let segment = self.segment_length();
        let rotation = Quat::from_rotation_arc(Vec3::Z, if direction == Vec3::ZERO { Vec3::Z } else { direction });
        let props = self.node_mass_properties();

        for i in 0..self.nodes {
            let center = self.start + direction * segment * (i as f32 + 0.5);
            let body = world.add_rigid_body(RigidBody::dynamic(Transform::new(center, rotation), props));
            self.colliders.push(world.add_collider(
                Collider::new(BodyRef::Rigid(body), ColliderShape::sphere(self.radius))
                    .with_tag(ColliderTag::part(id, i)),
            ));
            self.bodies.push(body);
        }

        let half = Vec3::Z * segment * 0.5;
        for pair in self.bodies.windows(2) {
            self.constraints.push(world.add_constraint(Constraint::new(
                pair[0],
                Some(pair[1]),
                ConstraintKind::Point {
                    pivot_a: half,
                    pivot_b: -half,
                },
            )));
        }
        Ok(())
    }

    fn unregister(&mut self, world: &mut DynamicsWorld) {
        for handle in self.constraints.drain(..) {
            world.remove_constraint(handle);
        }
        for handle in self.bodies.drain(..) {
            world.remove_rigid_body(handle);
        }
        self.colliders.clear();
    }

    fn aabb(&self, world: &DynamicsWorld) -> Aabb {
        self.colliders
            .iter()
            .filter_map(|c| world.collider_aabb(*c))
            .fold(Aabb::EMPTY, |acc, b| acc.union(&b))
    }

    fn transform(&self, world: &DynamicsWorld) -> Transform {
        self.bodies
            .first()
            .and_then(|h| world.body(*h))
            .map(|b| b.transform)
            .unwrap_or(Transform::from_translation(self.start))
    }

    fn body(&self, part: Option<usize>) -> Option<BodyRef> {
        self.bodies.get(part.unwrap_or(0)).copied().map(BodyRef::Rigid)
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

impl AppliesGravity for CableEntity {
    fn apply_gravity(&self, world: &mut DynamicsWorld) {
        let gravity = world.gravity();
        for handle in &self.bodies {
            if let Some(body) = world.body_mut(*handle) {
                let mass = body.mass_properties.mass;
                body.apply_central_force(gravity * mass);
            }
        }
    }
}

impl SettlingCheck for CableEntity {
    fn is_settled(&self, world: &DynamicsWorld, tolerance: &SettlingTolerance) -> bool {
        self.bodies
            .iter()
            .filter_map(|h| world.body(*h))
            .all(|b| tolerance.admits(b.velocity.linear, b.velocity.angular))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::solver::{ConstraintSolver, SolverParams, SolverType};
    use approx::assert_relative_eq;

    #[test]
    fn nodes_are_spread_along_the_cable_and_chained() {
        let mut world = DynamicsWorld::new(ConstraintSolver::new(SolverType::Dantzig, SolverParams::default()));
        let mut cable = CableEntity::new("tether", Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0), 4, 0.05, 1000.0);
        cable.register(&mut world, EntityId::new(0, 0)).expect("register");
        assert_eq!(world.bodies.len(), 4);
        assert_eq!(world.constraints.len(), 3);
        assert_relative_eq!(cable.node_position(&world, 0).expect("node").x, 0.25, epsilon = 1e-5);
        assert_relative_eq!(cable.node_position(&world, 3).expect("node").x, 1.75, epsilon = 1e-5);

        cable.unregister(&mut world);
        assert!(world.bodies.is_empty());
        assert!(world.constraints.is_empty());
    }
}
