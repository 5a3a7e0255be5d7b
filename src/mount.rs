//! Attachment points of sensors and actuators.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::core::{collider::BodyRef, types::Transform};
use crate::utils::allocator::MultibodyHandle;
use crate::world::DynamicsWorld;

/// Where a sensor or actuator is attached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub enum Mount {
    #[default]
    Unattached,
    /// A frame rigidly attached to a body; `origin` is relative to its center of mass.
    Body { body: BodyRef, origin: Transform },
    /// The inbound joint of a multibody link.
    Joint { multibody: MultibodyHandle, link: usize },
}

impl Mount {
    pub fn body(body: BodyRef, origin: Transform) -> Self {
        Mount::Body { body, origin }
    }

    pub fn joint(multibody: MultibodyHandle, link: usize) -> Self {
        Mount::Joint { multibody, link }
    }

    pub fn is_attached(&self) -> bool {
        !matches!(self, Mount::Unattached)
    }

    /// World transform of a body mount.
    pub fn frame(&self, world: &DynamicsWorld) -> Option<Transform> {
        match self {
            Mount::Body { body, origin } => world.body_transform(*body).map(|t| t.combine(origin)),
            _ => None,
        }
    }

    /// Linear velocity of the mount point and angular velocity of its body.
    pub fn twist(&self, world: &DynamicsWorld) -> Option<(Vec3, Vec3)> {
        let Mount::Body { body, .. } = self else {
            return None;
        };
        let point = self.frame(world)?.position;
        let linear = world.point_velocity(*body, point);
        let angular = match body {
            BodyRef::Rigid(h) => world.body(*h)?.velocity.angular,
            BodyRef::Link { multibody, link } => world.multibody(*multibody)?.link_velocities.get(*link)?.angular,
        };
        Some((linear, angular))
    }

    /// Generalized coordinate index of a joint mount with one degree of freedom.
    pub fn joint_coordinate(&self, world: &DynamicsWorld) -> Option<(MultibodyHandle, usize)> {
        let Mount::Joint { multibody, link } = self else {
            return None;
        };
        let l = world.multibody(*multibody)?.links.get(*link)?;
        (l.joint.dofs() > 0).then_some((*multibody, l.q_index))
    }

    /// Position and velocity of a joint mount.
    pub fn joint_state(&self, world: &DynamicsWorld) -> Option<(f32, f32)> {
        let (handle, k) = self.joint_coordinate(world)?;
        let mb = world.multibody(handle)?;
        Some((mb.q[k], mb.qd[k]))
    }

    /// Adds a generalized force to a joint mount.
    pub fn apply_joint_force(&self, world: &mut DynamicsWorld, force: f32) -> bool {
        let Some((handle, k)) = self.joint_coordinate(world) else {
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
}
