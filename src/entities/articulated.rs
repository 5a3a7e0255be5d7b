use std::any::Any;

use glam::Vec3;
use log::warn;
use serde::{Deserialize, Serialize};

use super::{AppliesDamping, Entity, EntityType, SettlingCheck, SettlingTolerance, SolidEntity};
use crate::core::{
    articulations::{JointKind, Link, Multibody},
    collider::{BodyRef, Collider, ColliderTag},
    types::{Aabb, Transform},
};
use crate::error::{Result, SimulationError};
use crate::utils::allocator::{ColliderHandle, EntityId, MultibodyHandle};
use crate::world::DynamicsWorld;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArticulatedJointKind {
    Revolute,
    Prismatic,
    Fixed,
}

/// Joint of the kinematic tree. Pivot and axis are expressed in the entity frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticulatedJoint {
    pub name: String,
    pub kind: ArticulatedJointKind,
    pub parent: usize,
    pub child: usize,
    pub pivot: Vec3,
    pub axis: Vec3,
    pub limits: Option<(f32, f32)>,
    /// Viscous damping coefficient.
    pub damping: f32,
}

#[derive(Debug, Clone)]
struct ArticulatedLink {
    solid: SolidEntity,
    /// Center-of-mass frame in the entity frame.
    transform: Transform,
}

/// Tree of solids simulated in reduced coordinates.
///
/// Links and joints are described in the entity frame; the placement given at
/// registration maps that frame into the world.
#[derive(Debug, Clone)]
pub struct ArticulatedEntity {
    name: String,
    fixed_base: bool,
    links: Vec<ArticulatedLink>,
    joints: Vec<ArticulatedJoint>,
    placement: Transform,
    handle: Option<MultibodyHandle>,
    colliders: Vec<ColliderHandle>,
}

impl ArticulatedEntity {
    pub fn new(name: &str, base: SolidEntity, fixed_base: bool) -> Self {
        let transform = base.initial_cg_transform();
        Self {
            name: name.to_string(),
            fixed_base,
            links: vec![ArticulatedLink {
                solid: base,
                transform,
            }],
            joints: Vec::new(),
            placement: Transform::IDENTITY,
            handle: None,
            colliders: Vec::new(),
        }
    }

    pub fn set_placement(&mut self, placement: Transform) {
        self.placement = placement;
    }

    pub fn placement(&self) -> Transform {
        self.placement
    }

    pub fn is_fixed_base(&self) -> bool {
        self.fixed_base
    }

    /// Adds a link whose origin frame sits at `origin` in the entity frame.
    pub fn add_link(&mut self, solid: SolidEntity, origin: Transform) -> usize {
        let transform = origin.combine(&solid.cg_to_origin().inverse());
        self.links.push(ArticulatedLink { solid, transform });
        self.links.len() - 1
    }

    fn push_joint(
        &mut self,
        name: &str,
        kind: ArticulatedJointKind,
        parent: usize,
        child: usize,
        pivot: Vec3,
        axis: Vec3,
    ) -> usize {
        self.joints.push(ArticulatedJoint {
            name: name.to_string(),
            kind,
            parent,
            child,
            pivot,
            axis: axis.normalize_or_zero(),
            limits: None,
            damping: 0.0,
        });
        self.joints.len() - 1
    }

    pub fn add_revolute_joint(&mut self, name: &str, parent: usize, child: usize, pivot: Vec3, axis: Vec3) -> usize {
        self.push_joint(name, ArticulatedJointKind::Revolute, parent, child, pivot, axis)
    }

    pub fn add_prismatic_joint(&mut self, name: &str, parent: usize, child: usize, axis: Vec3) -> usize {
        let pivot = self
            .links
            .get(child)
            .map(|l| l.transform.position)
            .unwrap_or(Vec3::ZERO);
        self.push_joint(name, ArticulatedJointKind::Prismatic, parent, child, pivot, axis)
    }

    pub fn add_fixed_joint(&mut self, name: &str, parent: usize, child: usize, pivot: Vec3) -> usize {
        self.push_joint(name, ArticulatedJointKind::Fixed, parent, child, pivot, Vec3::ZERO)
    }

    /// Installs position limits; ignored unless `min < max`.
    pub fn set_joint_limits(&mut self, joint: usize, min: f32, max: f32) -> bool {
        if min >= max {
            warn!("Ignoring joint limits [{min}, {max}] on '{}': min must be below max", self.name);
            return false;
        }
        match self.joints.get_mut(joint) {
            Some(j) if j.kind != ArticulatedJointKind::Fixed => {
                j.limits = Some((min, max));
                true
            }
            _ => false,
        }
    }

    /// Sets viscous damping of a joint; applies to the live multibody on the next tick.
    pub fn set_joint_damping(&mut self, joint: usize, damping: f32) -> bool {
        match self.joints.get_mut(joint) {
            Some(j) => {
                j.damping = damping.max(0.0);
                true
            }
            None => false,
        }
    }

    pub fn num_links(&self) -> usize {
        self.links.len()
    }

    pub fn num_joints(&self) -> usize {
        self.joints.len()
    }

    pub fn link(&self, index: usize) -> Option<&SolidEntity> {
        self.links.get(index).map(|l| &l.solid)
    }

    pub fn link_index(&self, name: &str) -> Option<usize> {
        self.links.iter().position(|l| l.solid.name() == name)
    }

    /// Center-of-mass frame of a link as defined, in the entity frame.
    pub fn link_transform(&self, index: usize) -> Option<Transform> {
        self.links.get(index).map(|l| l.transform)
    }

    /// Live center-of-mass frame of a link.
    pub fn link_world_transform(&self, world: &DynamicsWorld, index: usize) -> Option<Transform> {
        let handle = self.handle?;
        world.body_transform(BodyRef::Link {
            multibody: handle,
            link: index,
        })
    }

    pub fn joint(&self, index: usize) -> Option<&ArticulatedJoint> {
        self.joints.get(index)
    }

    pub fn joint_index(&self, name: &str) -> Option<usize> {
        self.joints.iter().position(|j| j.name == name)
    }

    pub fn multibody_handle(&self) -> Option<MultibodyHandle> {
        self.handle
    }

    fn joint_coordinate(&self, world: &DynamicsWorld, joint: usize) -> Option<(MultibodyHandle, usize)> {
        let handle = self.handle?;
        let j = self.joints.get(joint)?;
        let mb = world.multibody(handle)?;
        let link = mb.links.get(j.child)?;
        (link.joint.dofs() > 0).then_some((handle, link.q_index))
    }

    pub fn joint_position(&self, world: &DynamicsWorld, joint: usize) -> Option<f32> {
        let (handle, k) = self.joint_coordinate(world, joint)?;
        world.multibody(handle).map(|mb| mb.q[k])
    }

    pub fn joint_velocity(&self, world: &DynamicsWorld, joint: usize) -> Option<f32> {
        let (handle, k) = self.joint_coordinate(world, joint)?;
        world.multibody(handle).map(|mb| mb.qd[k])
    }

    /// Adds a generalized force (torque for revolute, force for prismatic joints).
    pub fn apply_joint_force(&self, world: &mut DynamicsWorld, joint: usize, force: f32) -> bool {
        let Some((handle, k)) = self.joint_coordinate(world, joint) else {
            return false;
        };
        match world.multibody_mut(handle) {
            Some(mb) => {
                mb.joint_forces[k] += force;
                true
            }
            None => false,
        }
    }

    fn build_multibody(&self) -> Result<Multibody> {
        let place = |t: &Transform| self.placement.combine(t);
        let base = &self.links[0];
        let mut mb = Multibody::new(
            Link::base(base.solid.name(), base.solid.mass_properties()),
            place(&base.transform),
            self.fixed_base,
        );

        let unconnected = (1..self.links.len())
            .filter(|i| !self.joints.iter().any(|j| j.child == *i))
            .count();
        if unconnected > 0 {
            return Err(SimulationError::UnconnectedLinks {
                robot: self.name.clone(),
                count: unconnected,
            });
        }

        for (i, link) in self.links.iter().enumerate().skip(1) {
            let Some(joint) = self.joints.iter().find(|j| j.child == i) else {
                continue;
            };
            if joint.parent >= i {
                return Err(SimulationError::InvalidJoint {
                    name: joint.name.clone(),
                    reason: format!("parent link {} must precede child link {i}", joint.parent),
                });
            }
            let parent_x = place(&self.links[joint.parent].transform);
            let child_x = place(&link.transform);
            let frame = Transform::new(self.placement.transform_point(joint.pivot), parent_x.rotation);
            let axis = parent_x.rotation.inverse() * (self.placement.rotation * joint.axis);
            let kind = match joint.kind {
                ArticulatedJointKind::Revolute => JointKind::Revolute { axis },
                ArticulatedJointKind::Prismatic => JointKind::Prismatic { axis },
                ArticulatedJointKind::Fixed => JointKind::Fixed,
            };
            let added = mb.add_link(Link {
                name: link.solid.name().to_string(),
                parent: Some(joint.parent),
                joint: kind,
                q_index: 0,
                parent_to_joint: parent_x.inverse().combine(&frame),
                joint_to_link: frame.inverse().combine(&child_x),
                mass_properties: link.solid.mass_properties(),
                limits: joint.limits,
            });
            if added.is_none() {
                return Err(SimulationError::InvalidJoint {
                    name: joint.name.clone(),
                    reason: "parent link does not exist".into(),
                });
            }
        }
        Ok(mb)
    }
}

impl Entity for ArticulatedEntity {
    fn name(&self) -> &str {
        &self.name
    }

    fn entity_type(&self) -> EntityType {
        EntityType::Articulated
    }

    fn is_registered(&self) -> bool {
        self.handle.is_some()
    }

    fn register(&mut self, world: &mut DynamicsWorld, id: EntityId) -> Result<()> {
        if self.is_registered() {
            return Err(SimulationError::AlreadyRegistered(self.name.clone()));
        }
        let multibody = self.build_multibody()?;
        let handle = world.add_multibody(multibody);
        for (i, link) in self.links.iter().enumerate() {
            let body = BodyRef::Link {
                multibody: handle,
                link: i,
            };
            self.colliders.push(
                world.add_collider(Collider::new(body, *link.solid.shape()).with_tag(ColliderTag::part(id, i))),
            );
        }
        self.handle = Some(handle);
        Ok(())
    }

    fn unregister(&mut self, world: &mut DynamicsWorld) {
        if let Some(handle) = self.handle.take() {
            world.remove_multibody(handle);
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
        let cg_to_origin = self.links[0].solid.cg_to_origin();
        self.link_world_transform(world, 0)
            .unwrap_or_else(|| self.placement.combine(&self.links[0].transform))
            .combine(&cg_to_origin)
    }

    fn material(&self, part: Option<usize>) -> Option<usize> {
        self.links
            .get(part.unwrap_or(0))
            .map(|l| l.solid.material_id())
    }

    fn body(&self, part: Option<usize>) -> Option<BodyRef> {
        let link = part.unwrap_or(0);
        if link >= self.links.len() {
            return None;
        }
        self.handle.map(|multibody| BodyRef::Link { multibody, link })
    }

    fn as_damping(&self) -> Option<&dyn AppliesDamping> {
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

impl AppliesDamping for ArticulatedEntity {
    fn apply_damping(&self, world: &mut DynamicsWorld) {
        let Some(mb) = self.handle.and_then(|h| world.multibody_mut(h)) else {
            return;
        };
        for joint in self.joints.iter().filter(|j| j.damping > 0.0) {
            let Some(link) = mb.links.get(joint.child) else {
                continue;
            };
            if link.joint.dofs() == 0 {
                continue;
            }
            let k = link.q_index;
            mb.joint_forces[k] -= joint.damping * mb.qd[k];
        }
    }
}

impl SettlingCheck for ArticulatedEntity {
    fn is_settled(&self, world: &DynamicsWorld, tolerance: &SettlingTolerance) -> bool {
        let Some(mb) = self.handle.and_then(|h| world.multibody(h)) else {
            return true;
        };
        if !mb.fixed_base && !tolerance.admits(mb.base_velocity.linear, mb.base_velocity.angular) {
            return false;
        }
        mb.links.iter().all(|link| {
            let speed = |k: usize| mb.qd.get(k).map_or(0.0, |v| v.abs());
            match link.joint {
                JointKind::Revolute { .. } => speed(link.q_index) <= tolerance.angular,
                JointKind::Prismatic { .. } => speed(link.q_index) <= tolerance.linear,
                JointKind::Fixed => true,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::collider::ColliderShape;
    use crate::dynamics::solver::{ConstraintSolver, SolverParams, SolverType};
    use crate::materials::MaterialTable;
    use approx::assert_relative_eq;

    fn solid(name: &str) -> SolidEntity {
        let mut table = MaterialTable::new();
        let id = table.create_material("aluminium", 2700.0, 0.3).expect("material");
        let material = table.material(id).cloned().expect("material");
        SolidEntity::new(name, ColliderShape::cuboid(Vec3::new(0.25, 0.05, 0.05)), &material)
    }

    fn world() -> DynamicsWorld {
        DynamicsWorld::new(ConstraintSolver::new(SolverType::Dantzig, SolverParams::default()))
    }

    fn pendulum() -> ArticulatedEntity {
        let mut entity = ArticulatedEntity::new("pendulum", solid("base"), true);
        let arm = entity.add_link(solid("arm"), Transform::from_translation(Vec3::new(0.25, 0.0, 0.0)));
        entity.add_revolute_joint("shoulder", 0, arm, Vec3::ZERO, Vec3::Y);
        entity
    }

    #[test]
    fn registered_links_match_their_definition() {
        let mut world = world();
        let mut entity = pendulum();
        entity.set_placement(Transform::from_translation(Vec3::new(0.0, 0.0, 1.0)));
        entity.register(&mut world, EntityId::new(0, 0)).expect("register");
        let arm = entity.link_world_transform(&world, 1).expect("arm");
        assert_relative_eq!(arm.position.x, 0.25, epsilon = 1e-5);
        assert_relative_eq!(arm.position.z, 1.0, epsilon = 1e-5);
        assert_eq!(entity.joint_position(&world, 0), Some(0.0));
    }

    #[test]
    fn links_without_joints_cannot_be_registered() {
        let mut world = world();
        let mut entity = ArticulatedEntity::new("loose", solid("base"), true);
        entity.add_link(solid("orphan"), Transform::IDENTITY);
        assert!(matches!(
            entity.register(&mut world, EntityId::new(0, 0)),
            Err(SimulationError::UnconnectedLinks { count: 1, .. })
        ));
        assert!(world.multibodies.is_empty());
    }

    #[test]
    fn joint_damping_opposes_motion() {
        let mut world = world();
        let mut entity = pendulum();
        entity.set_joint_damping(0, 2.0);
        entity.register(&mut world, EntityId::new(0, 0)).expect("register");
        let handle = entity.multibody_handle().expect("handle");
        world.multibody_mut(handle).expect("mb").qd[0] = 1.5;
        entity.apply_damping(&mut world);
        assert_relative_eq!(world.multibody(handle).expect("mb").joint_forces[0], -3.0);
    }

    #[test]
    fn invalid_limits_are_ignored() {
        let mut entity = pendulum();
        assert!(!entity.set_joint_limits(0, 1.0, -1.0));
        assert!(entity.set_joint_limits(0, -1.0, 1.0));
        assert_eq!(entity.joint(0).and_then(|j| j.limits), Some((-1.0, 1.0)));
    }
}
