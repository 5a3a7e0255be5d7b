use super::types::{MassProperties, Transform, Velocity};
use crate::utils::math::DenseMatrix;
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Type of joint connecting a link to its parent in reduced coordinates.
///
/// Axes are expressed in the joint frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum JointKind {
    /// 1-DOF rotational joint.
    Revolute { axis: Vec3 },
    /// 1-DOF translational joint.
    Prismatic { axis: Vec3 },
    /// 0-DOF rigid connection.
    Fixed,
}

impl JointKind {
    /// Returns the number of degrees of freedom for this joint type.
    pub fn dofs(&self) -> usize {
        match self {
            JointKind::Revolute { .. } | JointKind::Prismatic { .. } => 1,
            JointKind::Fixed => 0,
        }
    }

    /// Local transform across the joint at coordinate `q`.
    pub fn motion(&self, q: f32) -> Transform {
        match self {
            JointKind::Revolute { axis } => Transform::from_rotation(Quat::from_axis_angle(*axis, q)),
            JointKind::Prismatic { axis } => Transform::from_translation(*axis * q),
            JointKind::Fixed => Transform::IDENTITY,
        }
    }

    pub fn axis(&self) -> Option<Vec3> {
        match self {
            JointKind::Revolute { axis } | JointKind::Prismatic { axis } => Some(*axis),
            JointKind::Fixed => None,
        }
    }
}

/// A single node in the articulated body tree.
#[derive(Debug, Clone)]
pub struct Link {
    pub name: String,
    /// Index of the parent link. `None` only for the base link.
    pub parent: Option<usize>,
    /// Inbound joint; the base link carries `Fixed`.
    pub joint: JointKind,
    /// Offset of the joint coordinate in `q`/`qd` (meaningless for 0-DOF joints).
    pub q_index: usize,
    /// Joint frame relative to the parent's center-of-mass frame at q = 0.
    pub parent_to_joint: Transform,
    /// This link's center-of-mass frame relative to the joint frame.
    pub joint_to_link: Transform,
    pub mass_properties: MassProperties,
    pub limits: Option<(f32, f32)>,
}

impl Link {
    pub fn base(name: &str, mass_properties: MassProperties) -> Self {
        Self {
            name: name.into(),
            parent: None,
            joint: JointKind::Fixed,
            q_index: 0,
            parent_to_joint: Transform::IDENTITY,
            joint_to_link: Transform::IDENTITY,
            mass_properties,
            limits: None,
        }
    }
}

/// World-space placement of a joint computed by the last kinematics update.
#[derive(Debug, Clone, Copy, Default)]
pub struct JointFrame {
    pub pivot: Vec3,
    pub axis: Vec3,
}

/// A collection of links forming a tree structure for reduced-coordinate dynamics.
///
/// Generalized velocities are laid out as `[base linear, base angular]` (floating
/// base only, world frame, at the base center of mass) followed by one entry per
/// joint degree of freedom.
#[derive(Debug, Clone)]
pub struct Multibody {
    pub fixed_base: bool,
    pub base_transform: Transform,
    pub base_velocity: Velocity,
    /// Links ordered such that a parent always appears before its children.
    pub links: Vec<Link>,
    pub q: Vec<f32>,
    pub qd: Vec<f32>,
    /// Generalized joint forces accumulated this tick.
    pub joint_forces: Vec<f32>,
    /// World-space external forces/torques about each link's center of mass.
    pub link_forces: Vec<Vec3>,
    pub link_torques: Vec<Vec3>,

    pub world_transforms: Vec<Transform>,
    pub link_velocities: Vec<Velocity>,
    pub joint_frames: Vec<JointFrame>,
    pub motion_states: Vec<Transform>,
    /// Inverse joint-space inertia computed at the start of the current step.
    pub mass_matrix_inverse: Option<DenseMatrix>,
}

impl Multibody {
    pub fn new(base: Link, base_transform: Transform, fixed_base: bool) -> Self {
        let mut mb = Self {
            fixed_base,
            base_transform,
            base_velocity: Velocity::default(),
            links: Vec::new(),
            q: Vec::new(),
            qd: Vec::new(),
            joint_forces: Vec::new(),
            link_forces: Vec::new(),
            link_torques: Vec::new(),
            world_transforms: Vec::new(),
            link_velocities: Vec::new(),
            joint_frames: Vec::new(),
            motion_states: Vec::new(),
            mass_matrix_inverse: None,
        };
        mb.push_link(Link {
            parent: None,
            joint: JointKind::Fixed,
            ..base
        });
        mb
    }

    /// Adds a link to the multibody and allocates space for its DOFs.
    ///
    /// Returns `None` when the parent index does not refer to an existing link.
    pub fn add_link(&mut self, link: Link) -> Option<usize> {
        let parent = link.parent?;
        if parent >= self.links.len() {
            return None;
        }
        Some(self.push_link(link))
    }

    fn push_link(&mut self, mut link: Link) -> usize {
        let idx = self.links.len();
        link.q_index = self.q.len();
        for _ in 0..link.joint.dofs() {
            self.q.push(0.0);
            self.qd.push(0.0);
            self.joint_forces.push(0.0);
        }
        self.link_forces.push(Vec3::ZERO);
        self.link_torques.push(Vec3::ZERO);
        self.world_transforms.push(Transform::IDENTITY);
        self.link_velocities.push(Velocity::default());
        self.joint_frames.push(JointFrame::default());
        self.motion_states.push(Transform::IDENTITY);
        self.links.push(link);
        self.update_kinematics();
        idx
    }

    pub fn num_links(&self) -> usize {
        self.links.len()
    }

    pub fn base_dofs(&self) -> usize {
        if self.fixed_base {
            0
        } else {
            6
        }
    }

    /// Total number of generalized velocity coordinates.
    pub fn num_dofs(&self) -> usize {
        self.base_dofs() + self.qd.len()
    }

    pub fn generalized_velocity(&self) -> Vec<f32> {
        let mut u = Vec::with_capacity(self.num_dofs());
        if !self.fixed_base {
            u.extend_from_slice(&self.base_velocity.linear.to_array());
            u.extend_from_slice(&self.base_velocity.angular.to_array());
        }
        u.extend_from_slice(&self.qd);
        u
    }

    pub fn set_generalized_velocity(&mut self, u: &[f32]) {
        let offset = self.base_dofs();
        if !self.fixed_base {
            self.base_velocity.linear = Vec3::from_slice(&u[0..3]);
            self.base_velocity.angular = Vec3::from_slice(&u[3..6]);
        }
        let n = self.qd.len();
        self.qd.copy_from_slice(&u[offset..offset + n]);
    }

    /// Generalized index of the joint coordinate of `link`, if it has one.
    pub fn dof_index(&self, link: usize) -> Option<usize> {
        let l = self.links.get(link)?;
        if l.parent.is_none() || l.joint.dofs() == 0 {
            return None;
        }
        Some(self.base_dofs() + l.q_index)
    }

    pub fn clear_forces(&mut self) {
        self.joint_forces.iter_mut().for_each(|f| *f = 0.0);
        self.link_forces.iter_mut().for_each(|f| *f = Vec3::ZERO);
        self.link_torques.iter_mut().for_each(|t| *t = Vec3::ZERO);
    }

    pub fn apply_link_force_at(&mut self, link: usize, force: Vec3, point: Vec3) {
        if link >= self.links.len() {
            return;
        }
        let com = self.world_transforms[link].position;
        self.link_forces[link] += force;
        self.link_torques[link] += (point - com).cross(force);
    }

    pub fn apply_link_torque(&mut self, link: usize, torque: Vec3) {
        if let Some(t) = self.link_torques.get_mut(link) {
            *t += torque;
        }
    }

    /// Updates world transforms, joint frames and link velocities from the current state.
    pub fn update_kinematics(&mut self) {
        let base_velocity = if self.fixed_base {
            Velocity::default()
        } else {
            self.base_velocity
        };
        for i in 0..self.links.len() {
            let link = &self.links[i];
            let Some(p) = link.parent else {
                self.world_transforms[i] = self.base_transform;
                self.link_velocities[i] = base_velocity;
                self.joint_frames[i] = JointFrame {
                    pivot: self.base_transform.position,
                    axis: Vec3::ZERO,
                };
                continue;
            };

            let q = if link.joint.dofs() > 0 {
                self.q[link.q_index]
            } else {
                0.0
            };
            let qd = if link.joint.dofs() > 0 {
                self.qd[link.q_index]
            } else {
                0.0
            };

            let parent_x = self.world_transforms[p];
            let joint_x = parent_x.combine(&link.parent_to_joint);
            let axis = link
                .joint
                .axis()
                .map(|a| (joint_x.rotation * a).normalize_or_zero())
                .unwrap_or(Vec3::ZERO);
            let link_x = joint_x
                .combine(&link.joint.motion(q))
                .combine(&link.joint_to_link);

            let parent_v = self.link_velocities[p];
            let pivot = joint_x.position;
            let c_i = link_x.position;
            let d = c_i - parent_x.position;
            let mut velocity = Velocity::new(parent_v.linear + parent_v.angular.cross(d), parent_v.angular);
            match link.joint {
                JointKind::Revolute { .. } => {
                    velocity.angular += axis * qd;
                    velocity.linear += (axis * qd).cross(c_i - pivot);
                }
                JointKind::Prismatic { .. } => {
                    velocity.linear += axis * qd;
                }
                JointKind::Fixed => {}
            }

            self.world_transforms[i] = link_x;
            self.link_velocities[i] = velocity;
            self.joint_frames[i] = JointFrame { pivot, axis };
        }
    }

    /// Chain of link indices from `link` up to the base, inclusive.
    pub fn ancestry(&self, link: usize) -> Vec<usize> {
        let mut chain = Vec::new();
        let mut current = Some(link);
        while let Some(i) = current {
            chain.push(i);
            current = self.links.get(i).and_then(|l| l.parent);
        }
        chain
    }

    /// Columns of the linear velocity Jacobian of a world point rigidly attached to `link`.
    ///
    /// `columns[k]` is the point velocity produced by a unit generalized velocity `k`.
    pub fn point_jacobian(&self, link: usize, point: Vec3) -> Vec<Vec3> {
        let mut columns = vec![Vec3::ZERO; self.num_dofs()];
        if link >= self.links.len() {
            return columns;
        }
        if !self.fixed_base {
            let r = point - self.world_transforms[0].position;
            columns[0] = Vec3::X;
            columns[1] = Vec3::Y;
            columns[2] = Vec3::Z;
            columns[3] = Vec3::X.cross(r);
            columns[4] = Vec3::Y.cross(r);
            columns[5] = Vec3::Z.cross(r);
        }
        for i in self.ancestry(link) {
            let Some(k) = self.dof_index(i) else {
                continue;
            };
            let frame = self.joint_frames[i];
            columns[k] = match self.links[i].joint {
                JointKind::Revolute { .. } => frame.axis.cross(point - frame.pivot),
                JointKind::Prismatic { .. } => frame.axis,
                JointKind::Fixed => Vec3::ZERO,
            };
        }
        columns
    }

    /// Columns of the angular velocity Jacobian of `link`.
    pub fn angular_jacobian(&self, link: usize) -> Vec<Vec3> {
        let mut columns = vec![Vec3::ZERO; self.num_dofs()];
        if link >= self.links.len() {
            return columns;
        }
        if !self.fixed_base {
            columns[3] = Vec3::X;
            columns[4] = Vec3::Y;
            columns[5] = Vec3::Z;
        }
        for i in self.ancestry(link) {
            if let (Some(k), JointKind::Revolute { .. }) = (self.dof_index(i), self.links[i].joint) {
                columns[k] = self.joint_frames[i].axis;
            }
        }
        columns
    }

    /// Clamps joint coordinates into their limits, stopping motion into the stop.
    pub fn enforce_limits(&mut self) {
        for link in &self.links {
            let (Some((lo, hi)), 1) = (link.limits, link.joint.dofs()) else {
                continue;
            };
            let k = link.q_index;
            if self.q[k] < lo {
                self.q[k] = lo;
                if self.qd[k] < 0.0 {
                    self.qd[k] = 0.0;
                }
            } else if self.q[k] > hi {
                self.q[k] = hi;
                if self.qd[k] > 0.0 {
                    self.qd[k] = 0.0;
                }
            }
        }
    }

    pub fn synchronize_motion_states(&mut self) {
        self.motion_states.copy_from_slice(&self.world_transforms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::Mat3;

    fn pendulum() -> Multibody {
        let mut mb = Multibody::new(
            Link::base("base", MassProperties::new(1.0, Mat3::IDENTITY)),
            Transform::IDENTITY,
            true,
        );
        mb.add_link(Link {
            name: "arm".into(),
            parent: Some(0),
            joint: JointKind::Revolute { axis: Vec3::Z },
            q_index: 0,
            parent_to_joint: Transform::from_translation(Vec3::X),
            joint_to_link: Transform::from_translation(Vec3::X * 0.5),
            mass_properties: MassProperties::new(1.0, Mat3::IDENTITY * 0.1),
            limits: None,
        })
        .expect("parent exists");
        mb
    }

    #[test]
    fn generalized_velocity_writes_back_joint_rates() {
        let mut mb = pendulum();
        mb.set_generalized_velocity(&[1.5]);
        assert_relative_eq!(mb.qd[0], 1.5);
        assert_eq!(mb.generalized_velocity(), vec![1.5]);
    }

    #[test]
    fn revolute_rotates_child_about_pivot() {
        let mut mb = pendulum();
        mb.q[0] = std::f32::consts::FRAC_PI_2;
        mb.update_kinematics();
        let com = mb.world_transforms[1].position;
        assert_relative_eq!(com.x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(com.y, 0.5, epsilon = 1e-5);
    }

    #[test]
    fn jacobian_matches_kinematic_velocity() {
        let mut mb = pendulum();
        mb.qd[0] = 2.0;
        mb.update_kinematics();
        let com = mb.world_transforms[1].position;
        let jac = mb.point_jacobian(1, com);
        let v = jac[0] * mb.qd[0];
        assert_relative_eq!(v.y, mb.link_velocities[1].linear.y, epsilon = 1e-5);
    }

    #[test]
    fn limits_clamp_position_and_velocity() {
        let mut mb = pendulum();
        mb.links[1].limits = Some((-0.5, 0.5));
        mb.q[0] = 0.8;
        mb.qd[0] = 1.0;
        mb.enforce_limits();
        assert_relative_eq!(mb.q[0], 0.5);
        assert_relative_eq!(mb.qd[0], 0.0);
    }
}
