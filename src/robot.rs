//! Assembly of a kinematic tree from a base link and a pool of detached links.

use glam::Vec3;
use log::info;

use crate::actuators::Actuator;
use crate::core::types::Transform;
use crate::entities::{ArticulatedEntity, Entity, SolidEntity};
use crate::error::{logged, Result, SimulationError};
use crate::sensors::Sensor;
use crate::simulation::SimulationManager;
use crate::utils::allocator::EntityId;

/// Where a robot-mounted sensor or actuator goes once the robot is registered.
#[derive(Debug, Clone, PartialEq)]
enum Attachment {
    Link { name: String, origin: Transform },
    Joint { name: String },
}

/// A robot under construction.
///
/// Links are defined once; each joint definition then moves one detached link
/// into the tree under an already attached parent.
pub struct Robot {
    name: String,
    fixed_base: bool,
    dynamics: Option<ArticulatedEntity>,
    detached: Vec<SolidEntity>,
    sensors: Vec<(Box<dyn Sensor>, Attachment)>,
    actuators: Vec<(Box<dyn Actuator>, Attachment)>,
}

impl Robot {
    pub fn new(name: &str, fixed_base: bool) -> Self {
        Self {
            name: name.to_string(),
            fixed_base,
            dynamics: None,
            detached: Vec::new(),
            sensors: Vec::new(),
            actuators: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_fixed_base(&self) -> bool {
        self.fixed_base
    }

    pub fn define_links(&mut self, base: SolidEntity, others: Vec<SolidEntity>) -> Result<()> {
        if self.dynamics.is_some() {
            return logged(Err(SimulationError::AlreadyDefined(self.name.clone())));
        }
        self.dynamics = Some(ArticulatedEntity::new(&self.name, base, self.fixed_base));
        self.detached = others;
        Ok(())
    }

    /// Finds `(parent link index, index into the detached pool)`.
    fn free_link_pair(&self, parent: &str, child: &str) -> Result<(usize, usize)> {
        let dynamics = self
            .dynamics
            .as_ref()
            .ok_or_else(|| SimulationError::LinksUndefined(self.name.clone()))?;
        if dynamics.link_index(child).is_some() {
            return Err(SimulationError::ChildNotFound(child.to_string()));
        }
        if self.detached.is_empty() {
            return Err(SimulationError::NoFreeLinks(self.name.clone()));
        }
        let parent_id = dynamics
            .link_index(parent)
            .ok_or_else(|| SimulationError::ParentNotJoined(parent.to_string()))?;
        let child_id = self
            .detached
            .iter()
            .position(|l| l.name() == child)
            .ok_or_else(|| SimulationError::ChildNotFound(child.to_string()))?;
        Ok((parent_id, child_id))
    }

    /// Moves the child into the tree; returns its link index and origin frame.
    fn attach_child(&mut self, parent: &str, child: &str, origin: Transform) -> Result<(usize, usize, Transform)> {
        let (parent_id, child_id) = self.free_link_pair(parent, child)?;
        let dynamics = self
            .dynamics
            .as_mut()
            .ok_or_else(|| SimulationError::LinksUndefined(self.name.clone()))?;
        let (parent_cg, parent_cg_to_origin) = match (dynamics.link_transform(parent_id), dynamics.link(parent_id)) {
            (Some(t), Some(solid)) => (t, solid.cg_to_origin()),
            _ => return Err(SimulationError::ParentNotJoined(parent.to_string())),
        };
        let link_origin = parent_cg.combine(&parent_cg_to_origin).combine(&origin);
        let solid = self.detached.remove(child_id);
        let index = dynamics.add_link(solid, link_origin);
        Ok((parent_id, index, link_origin))
    }

    fn install_limits(&mut self, joint: usize, limits: (f32, f32)) {
        if limits.0 < limits.1 {
            if let Some(dynamics) = self.dynamics.as_mut() {
                dynamics.set_joint_limits(joint, limits.0, limits.1);
            }
        }
    }

    /// `origin` places the child's origin relative to the parent's origin frame;
    /// `axis` is given in the child origin frame.
    pub fn define_revolute_joint(
        &mut self,
        name: &str,
        parent: &str,
        child: &str,
        origin: Transform,
        axis: Vec3,
        limits: (f32, f32),
    ) -> Result<()> {
        let (parent_id, child_id, link_origin) = logged(self.attach_child(parent, child, origin))?;
        let joint = self
            .dynamics
            .as_mut()
            .map(|d| d.add_revolute_joint(name, parent_id, child_id, link_origin.position, link_origin.rotation * axis))
            .ok_or_else(|| SimulationError::LinksUndefined(self.name.clone()))?;
        self.install_limits(joint, limits);
        Ok(())
    }

    pub fn define_prismatic_joint(
        &mut self,
        name: &str,
        parent: &str,
        child: &str,
        origin: Transform,
        axis: Vec3,
        limits: (f32, f32),
    ) -> Result<()> {
        let (parent_id, child_id, link_origin) = logged(self.attach_child(parent, child, origin))?;
        let joint = self
            .dynamics
            .as_mut()
            .map(|d| d.add_prismatic_joint(name, parent_id, child_id, link_origin.rotation * axis))
            .ok_or_else(|| SimulationError::LinksUndefined(self.name.clone()))?;
        self.install_limits(joint, limits);
        Ok(())
    }

    pub fn define_fixed_joint(&mut self, name: &str, parent: &str, child: &str, origin: Transform) -> Result<()> {
        let (parent_id, child_id, link_origin) = logged(self.attach_child(parent, child, origin))?;
        self.dynamics
            .as_mut()
            .map(|d| d.add_fixed_joint(name, parent_id, child_id, link_origin.position))
            .ok_or_else(|| SimulationError::LinksUndefined(self.name.clone()))?;
        Ok(())
    }

    /// Attached or detached link by name.
    pub fn get_link(&self, name: &str) -> Option<&SolidEntity> {
        self.dynamics
            .as_ref()
            .and_then(|d| d.link_index(name).and_then(|i| d.link(i)))
            .or_else(|| self.detached.iter().find(|l| l.name() == name))
    }

    /// Joint index by name.
    pub fn get_joint(&self, name: &str) -> Result<Option<usize>> {
        let dynamics = self
            .dynamics
            .as_ref()
            .ok_or_else(|| SimulationError::LinksUndefined(self.name.clone()))?;
        Ok(dynamics.joint_index(name))
    }

    pub fn detached_count(&self) -> usize {
        self.detached.len()
    }

    /// Articulated entity being assembled.
    pub fn dynamics(&self) -> Option<&ArticulatedEntity> {
        self.dynamics.as_ref()
    }

    pub fn add_link_sensor(&mut self, sensor: Box<dyn Sensor>, link: &str, origin: Transform) -> Result<()> {
        if self.get_link(link).is_none() {
            return logged(Err(SimulationError::UnknownLink(link.to_string())));
        }
        self.sensors.push((
            sensor,
            Attachment::Link {
                name: link.to_string(),
                origin,
            },
        ));
        Ok(())
    }

    pub fn add_joint_sensor(&mut self, sensor: Box<dyn Sensor>, joint: &str) -> Result<()> {
        logged(self.require_joint(joint))?;
        self.sensors.push((sensor, Attachment::Joint { name: joint.to_string() }));
        Ok(())
    }

    pub fn add_link_actuator(&mut self, actuator: Box<dyn Actuator>, link: &str, origin: Transform) -> Result<()> {
        if self.get_link(link).is_none() {
            return logged(Err(SimulationError::UnknownLink(link.to_string())));
        }
        self.actuators.push((
            actuator,
            Attachment::Link {
                name: link.to_string(),
                origin,
            },
        ));
        Ok(())
    }

    pub fn add_joint_actuator(&mut self, actuator: Box<dyn Actuator>, joint: &str) -> Result<()> {
        logged(self.require_joint(joint))?;
        self.actuators.push((actuator, Attachment::Joint { name: joint.to_string() }));
        Ok(())
    }

    fn require_joint(&self, joint: &str) -> Result<usize> {
        self.get_joint(joint)?
            .ok_or_else(|| SimulationError::UnknownJoint(joint.to_string()))
    }

    /// Registers the assembled robot and its sensors and actuators, consuming it.
    pub fn add_to_simulation(self, manager: &mut SimulationManager, origin: Transform) -> Result<EntityId> {
        if !self.detached.is_empty() {
            return logged(Err(SimulationError::UnconnectedLinks {
                robot: self.name.clone(),
                count: self.detached.len(),
            }));
        }
        let dynamics = self
            .dynamics
            .ok_or_else(|| SimulationError::LinksUndefined(self.name.clone()))?;
        let id = manager.add_articulated_entity(dynamics, origin)?;

        let mount = |manager: &SimulationManager, attachment: &Attachment| match attachment {
            Attachment::Link { name, origin } => manager.mount_on_link(id, name, *origin),
            Attachment::Joint { name } => manager.mount_on_joint(id, name),
        };
        for (mut sensor, attachment) in self.sensors {
            sensor.attach(mount(&*manager, &attachment)?);
            manager.add_boxed_sensor(sensor)?;
        }
        for (mut actuator, attachment) in self.actuators {
            actuator.attach(mount(&*manager, &attachment)?);
            manager.add_boxed_actuator(actuator)?;
        }
        info!("Robot '{}' added to the simulation", self.name);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::collider::ColliderShape;
    use crate::materials::MaterialTable;

    fn link(name: &str) -> SolidEntity {
        let mut table = MaterialTable::new();
        let id = table.create_material("steel", 7800.0, 0.2).expect("material");
        let material = table.material(id).cloned().expect("material");
        SolidEntity::new(name, ColliderShape::sphere(0.05), &material)
    }

    #[test]
    fn joints_require_defined_links() {
        let mut robot = Robot::new("arm", true);
        assert!(matches!(
            robot.define_fixed_joint("j", "base", "a", Transform::IDENTITY),
            Err(SimulationError::LinksUndefined(_))
        ));
        robot.define_links(link("base"), vec![link("a")]).expect("links");
        assert!(matches!(
            robot.define_links(link("base"), vec![]),
            Err(SimulationError::AlreadyDefined(_))
        ));
    }

    #[test]
    fn parent_must_already_be_attached() {
        let mut robot = Robot::new("arm", true);
        robot.define_links(link("base"), vec![link("a"), link("b")]).expect("links");
        assert!(matches!(
            robot.define_revolute_joint("j", "a", "b", Transform::IDENTITY, Vec3::Z, (0.0, 0.0)),
            Err(SimulationError::ParentNotJoined(_))
        ));
        robot
            .define_revolute_joint("j", "base", "a", Transform::IDENTITY, Vec3::Z, (0.0, 0.0))
            .expect("joint");
        assert_eq!(robot.detached_count(), 1);
        assert!(matches!(
            robot.define_revolute_joint("k", "base", "missing", Transform::IDENTITY, Vec3::Z, (0.0, 0.0)),
            Err(SimulationError::ChildNotFound(_))
        ));
    }

    #[test]
    fn inverted_limits_are_not_installed() {
        let mut robot = Robot::new("arm", true);
        robot.define_links(link("base"), vec![link("a")]).expect("links");
        robot
            .define_prismatic_joint("slide", "base", "a", Transform::IDENTITY, Vec3::X, (1.0, -1.0))
            .expect("joint");
        let joint = robot.dynamics().and_then(|d| d.joint(0)).expect("joint");
        assert_eq!(joint.limits, None);
        assert_eq!(robot.get_joint("slide").expect("defined"), Some(0));
    }
}
