use crate::core::articulations::{JointKind, Multibody};
use crate::utils::math::DenseMatrix;
use glam::Vec3;

/// Diagonal regularization added when the joint-space inertia is not positive definite.
const ARMATURE: f32 = 1.0e-4;

/// Reduced-coordinate dynamics built on the recursive Newton-Euler algorithm.
pub struct MultibodySolver;

impl MultibodySolver {
    /// Generalized forces required to produce the generalized acceleration `udot`
    /// at generalized velocity `u`.
    ///
    /// When `external` is set, gravity and the accumulated link forces are included.
    /// Kinematics of `mb` must be up to date.
    pub fn inverse_dynamics(
        mb: &Multibody,
        u: &[f32],
        udot: &[f32],
        gravity: Vec3,
        external: bool,
    ) -> Vec<f32> {
        let n = mb.links.len();
        let base = mb.base_dofs();
        let mut omega = vec![Vec3::ZERO; n];
        let mut alpha = vec![Vec3::ZERO; n];
        let mut accel = vec![Vec3::ZERO; n];

        // Outward pass: link angular velocity and COM accelerations.
        for i in 0..n {
            let link = &mb.links[i];
            let Some(p) = link.parent else {
                if base == 6 {
                    omega[i] = Vec3::from_slice(&u[3..6]);
                    accel[i] = Vec3::from_slice(&udot[0..3]);
                    alpha[i] = Vec3::from_slice(&udot[3..6]);
                }
                continue;
            };
            let c_p = mb.world_transforms[p].position;
            let c_i = mb.world_transforms[i].position;
            let frame = mb.joint_frames[i];
            let (qd, qdd) = match mb.dof_index(i) {
                Some(k) => (u[k], udot[k]),
                None => (0.0, 0.0),
            };
            let w_p = omega[p];
            let al_p = alpha[p];
            let a_p = accel[p];

            match link.joint {
                JointKind::Revolute { .. } => {
                    let s = frame.axis;
                    let r_po = frame.pivot - c_p;
                    let r_oi = c_i - frame.pivot;
                    let w_i = w_p + s * qd;
                    let al_i = al_p + s * qdd + w_p.cross(s * qd);
                    let a_o = a_p + al_p.cross(r_po) + w_p.cross(w_p.cross(r_po));
                    omega[i] = w_i;
                    alpha[i] = al_i;
                    accel[i] = a_o + al_i.cross(r_oi) + w_i.cross(w_i.cross(r_oi));
                }
                JointKind::Prismatic { .. } => {
                    let s = frame.axis;
                    let d = c_i - c_p;
                    omega[i] = w_p;
                    alpha[i] = al_p;
                    accel[i] = a_p
                        + al_p.cross(d)
                        + w_p.cross(w_p.cross(d))
                        + 2.0 * w_p.cross(s * qd)
                        + s * qdd;
                }
                JointKind::Fixed => {
                    let d = c_i - c_p;
                    omega[i] = w_p;
                    alpha[i] = al_p;
                    accel[i] = a_p + al_p.cross(d) + w_p.cross(w_p.cross(d));
                }
            }
        }

        // Inward pass: joint force and torque (about the pivot) transmitted from the parent.
        let mut force = vec![Vec3::ZERO; n];
        let mut torque = vec![Vec3::ZERO; n];
        for i in 0..n {
            let link = &mb.links[i];
            let rotation = mb.world_transforms[i].rotation;
            let inertia = crate::utils::math::world_inertia(rotation, link.mass_properties.inertia);
            let m = link.mass_properties.mass;
            force[i] = m * accel[i];
            torque[i] = inertia * alpha[i] + omega[i].cross(inertia * omega[i]);
            if external {
                force[i] -= m * gravity + mb.link_forces[i];
                torque[i] -= mb.link_torques[i];
            }
        }
        for i in (0..n).rev() {
            let c_i = mb.world_transforms[i].position;
            let pivot = mb.joint_frames[i].pivot;
            // Children were folded into force[i]/torque[i] (about c_i) already.
            torque[i] -= (pivot - c_i).cross(force[i]);
            if let Some(p) = mb.links[i].parent {
                let c_p = mb.world_transforms[p].position;
                let f = force[i];
                let n_pivot = torque[i];
                force[p] += f;
                torque[p] += n_pivot + (pivot - c_p).cross(f);
            }
        }

        let mut tau = vec![0.0; mb.num_dofs()];
        if base == 6 {
            tau[0..3].copy_from_slice(&force[0].to_array());
            tau[3..6].copy_from_slice(&torque[0].to_array());
        }
        for i in 1..n {
            let Some(k) = mb.dof_index(i) else {
                continue;
            };
            let s = mb.joint_frames[i].axis;
            tau[k] = match mb.links[i].joint {
                JointKind::Revolute { .. } => s.dot(torque[i]),
                JointKind::Prismatic { .. } => s.dot(force[i]),
                JointKind::Fixed => 0.0,
            };
        }
        tau
    }

    /// Joint-space inertia matrix assembled column by column from unit accelerations.
    pub fn mass_matrix(mb: &Multibody) -> DenseMatrix {
        let dofs = mb.num_dofs();
        let zero = vec![0.0; dofs];
        let mut matrix = DenseMatrix::zeros(dofs, dofs);
        let mut unit = vec![0.0; dofs];
        for j in 0..dofs {
            unit[j] = 1.0;
            let column = Self::inverse_dynamics(mb, &zero, &unit, Vec3::ZERO, false);
            for (r, value) in column.into_iter().enumerate() {
                matrix[(r, j)] = value;
            }
            unit[j] = 0.0;
        }
        // Enforce symmetry lost to round-off.
        for r in 0..dofs {
            for c in (r + 1)..dofs {
                let avg = 0.5 * (matrix[(r, c)] + matrix[(c, r)]);
                matrix[(r, c)] = avg;
                matrix[(c, r)] = avg;
            }
        }
        matrix
    }

    /// Inverse of the joint-space inertia, regularized when needed.
    pub fn mass_matrix_inverse(mb: &Multibody) -> DenseMatrix {
        let mut matrix = Self::mass_matrix(mb);
        if let Some(inverse) = matrix.spd_inverse() {
            return inverse;
        }
        let dofs = matrix.rows();
        for k in 0..dofs {
            matrix[(k, k)] += ARMATURE;
        }
        matrix
            .spd_inverse()
            .unwrap_or_else(|| DenseMatrix::zeros(dofs, dofs))
    }

    /// Computes generalized accelerations from the applied joint forces, gravity and
    /// link forces. Caches the inverse mass matrix on the multibody for the solver.
    pub fn forward_dynamics(mb: &mut Multibody, gravity: Vec3) -> Vec<f32> {
        mb.update_kinematics();
        let dofs = mb.num_dofs();
        let u = mb.generalized_velocity();
        let zero = vec![0.0; dofs];
        let bias = Self::inverse_dynamics(mb, &u, &zero, gravity, true);

        let base = mb.base_dofs();
        let mut rhs: Vec<f32> = bias.iter().map(|b| -b).collect();
        for (k, f) in mb.joint_forces.iter().enumerate() {
            rhs[base + k] += f;
        }

        let inverse = Self::mass_matrix_inverse(mb);
        let udot = inverse.mul_vec(&rhs);
        mb.mass_matrix_inverse = Some(inverse);
        udot
    }

    /// Semi-implicit Euler velocity update for one multibody.
    pub fn integrate_velocities(mb: &mut Multibody, gravity: Vec3, dt: f32) {
        let udot = Self::forward_dynamics(mb, gravity);
        let mut u = mb.generalized_velocity();
        for (v, a) in u.iter_mut().zip(udot.iter()) {
            *v += a * dt;
        }
        mb.set_generalized_velocity(&u);
    }

    /// Position update using the (solver-corrected) generalized velocities.
    pub fn integrate_positions(mb: &mut Multibody, dt: f32) {
        if !mb.fixed_base {
            let v = mb.base_velocity;
            mb.base_transform.position += v.linear * dt;
            mb.base_transform.rotation = (crate::utils::math::angular_velocity_to_quat(v.angular, dt)
                * mb.base_transform.rotation)
                .normalize();
        }
        for k in 0..mb.q.len() {
            mb.q[k] += mb.qd[k] * dt;
        }
        mb.enforce_limits();
        mb.update_kinematics();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::articulations::Link;
    use crate::core::types::{MassProperties, Transform};
    use approx::assert_relative_eq;
    use glam::Mat3;

    fn point_pendulum(fixed: bool) -> Multibody {
        let mut mb = Multibody::new(
            Link::base("base", MassProperties::new(1.0, Mat3::IDENTITY * 0.1)),
            Transform::IDENTITY,
            fixed,
        );
        mb.add_link(Link {
            name: "bob".into(),
            parent: Some(0),
            joint: JointKind::Revolute { axis: Vec3::Z },
            q_index: 0,
            parent_to_joint: Transform::IDENTITY,
            joint_to_link: Transform::from_translation(Vec3::X),
            mass_properties: MassProperties::new(2.0, Mat3::ZERO),
            limits: None,
        })
        .expect("parent exists");
        mb
    }

    #[test]
    fn point_mass_pendulum_inertia() {
        let mb = point_pendulum(true);
        let m = MultibodySolver::mass_matrix(&mb);
        // m * l^2
        assert_relative_eq!(m[(0, 0)], 2.0, epsilon = 1e-5);
    }

    #[test]
    fn horizontal_pendulum_falls_with_gravity() {
        let mut mb = point_pendulum(true);
        let udot = MultibodySolver::forward_dynamics(&mut mb, Vec3::new(0.0, -9.81, 0.0));
        // tau = -m g l, M = m l^2 -> qdd = -g / l
        assert_relative_eq!(udot[0], -9.81, epsilon = 1e-3);
    }

    #[test]
    fn floating_base_free_fall() {
        let mut mb = point_pendulum(false);
        let udot = MultibodySolver::forward_dynamics(&mut mb, Vec3::new(0.0, -9.81, 0.0));
        assert_relative_eq!(udot[1], -9.81, epsilon = 1e-3);
        assert_relative_eq!(udot[6], 0.0, epsilon = 1e-3);
    }

    #[test]
    fn mass_matrix_is_symmetric() {
        let mut mb = point_pendulum(false);
        mb.q[0] = 0.4;
        mb.update_kinematics();
        let m = MultibodySolver::mass_matrix(&mb);
        for r in 0..m.rows() {
            for c in 0..m.cols() {
                assert_relative_eq!(m[(r, c)], m[(c, r)], epsilon = 1e-5);
            }
        }
    }
}
