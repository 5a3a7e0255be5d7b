//! Additional math helpers layered on top of `glam`.

use glam::{Mat3, Quat, Vec3};

/// Converts angular velocity vector (radians/sec) into a quaternion delta.
pub fn angular_velocity_to_quat(angular: Vec3, dt: f32) -> Quat {
    let angle = angular.length() * dt;
    if angle.abs() < 1e-9 {
        return Quat::IDENTITY;
    }
    let axis = angular.normalize();
    Quat::from_axis_angle(axis, angle)
}

/// Rotates a body-frame inertia tensor into world frame.
pub fn world_inertia(rotation: Quat, local: Mat3) -> Mat3 {
    let r = Mat3::from_quat(rotation);
    r * local * r.transpose()
}

/// Removes the component of `v` along the unit vector `normal`.
pub fn tangential(v: Vec3, normal: Vec3) -> Vec3 {
    v - normal * v.dot(normal)
}

/// Returns two unit vectors orthogonal to `n` and to each other.
pub fn orthonormal_basis(n: Vec3) -> (Vec3, Vec3) {
    let mut t1 = n.cross(Vec3::X);
    if t1.length_squared() <= 1e-6 {
        t1 = n.cross(Vec3::Y);
    }
    let t1 = t1.normalize_or_zero();
    let t2 = n.cross(t1).normalize_or_zero();
    (t1, t2)
}

/// Rotation angle of `q` around `axis` (swing-twist decomposition), in (-pi, pi].
pub fn twist_angle(q: Quat, axis: Vec3) -> f32 {
    let v = Vec3::new(q.x, q.y, q.z);
    let projected = axis * v.dot(axis);
    let twist = Quat::from_xyzw(projected.x, projected.y, projected.z, q.w);
    if twist.length_squared() < 1e-12 {
        return 0.0;
    }
    let twist = twist.normalize();
    let mut angle = 2.0 * twist.w.clamp(-1.0, 1.0).acos();
    if Vec3::new(twist.x, twist.y, twist.z).dot(axis) < 0.0 {
        angle = -angle;
    }
    if angle > std::f32::consts::PI {
        angle -= std::f32::consts::TAU;
    } else if angle < -std::f32::consts::PI {
        angle += std::f32::consts::TAU;
    }
    angle
}

/// Small dense row-major matrix used for joint-space dynamics.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl DenseMatrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n, n);
        for i in 0..n {
            m[(i, i)] = 1.0;
        }
        m
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn mul_vec(&self, v: &[f32]) -> Vec<f32> {
        debug_assert_eq!(v.len(), self.cols);
        (0..self.rows)
            .map(|r| {
                self.data[r * self.cols..(r + 1) * self.cols]
                    .iter()
                    .zip(v)
                    .map(|(a, b)| a * b)
                    .sum()
            })
            .collect()
    }

    /// Inverts a symmetric positive-definite matrix through its Cholesky factor.
    ///
    /// Returns `None` when the matrix is not square or not positive definite.
    pub fn spd_inverse(&self) -> Option<DenseMatrix> {
        if self.rows != self.cols {
            return None;
        }
        let n = self.rows;
        let mut l = DenseMatrix::zeros(n, n);
        for j in 0..n {
            let mut diag = self[(j, j)] as f64;
            for k in 0..j {
                diag -= (l[(j, k)] as f64).powi(2);
            }
            if diag <= 1e-12 {
                return None;
            }
            let ljj = diag.sqrt();
            l[(j, j)] = ljj as f32;
            for i in (j + 1)..n {
                let mut sum = self[(i, j)] as f64;
                for k in 0..j {
                    sum -= l[(i, k)] as f64 * l[(j, k)] as f64;
                }
                l[(i, j)] = (sum / ljj) as f32;
            }
        }

        let mut inverse = DenseMatrix::zeros(n, n);
        let mut column = vec![0.0f64; n];
        for c in 0..n {
            // forward substitution: L y = e_c
            for i in 0..n {
                let mut sum = if i == c { 1.0 } else { 0.0 };
                for k in 0..i {
                    sum -= l[(i, k)] as f64 * column[k];
                }
                column[i] = sum / l[(i, i)] as f64;
            }
            // back substitution: L^T x = y
            for i in (0..n).rev() {
                let mut sum = column[i];
                for k in (i + 1)..n {
                    sum -= l[(k, i)] as f64 * column[k];
                }
                column[i] = sum / l[(i, i)] as f64;
            }
            for (r, value) in column.iter().enumerate() {
                inverse[(r, c)] = *value as f32;
            }
        }
        Some(inverse)
    }
}

impl std::ops::Index<(usize, usize)> for DenseMatrix {
    type Output = f32;

    fn index(&self, (r, c): (usize, usize)) -> &f32 {
        &self.data[r * self.cols + c]
    }
}

impl std::ops::IndexMut<(usize, usize)> for DenseMatrix {
    fn index_mut(&mut self, (r, c): (usize, usize)) -> &mut f32 {
        &mut self.data[r * self.cols + c]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn spd_inverse_recovers_identity() {
        let mut m = DenseMatrix::zeros(3, 3);
        let values = [[4.0, 1.0, 0.5], [1.0, 3.0, 0.2], [0.5, 0.2, 2.0]];
        for (r, row) in values.iter().enumerate() {
            for (c, v) in row.iter().enumerate() {
                m[(r, c)] = *v;
            }
        }
        let inv = m.spd_inverse().expect("matrix is SPD");
        for c in 0..3 {
            let mut e = vec![0.0; 3];
            e[c] = 1.0;
            let col = inv.mul_vec(&e);
            let back = m.mul_vec(&col);
            for r in 0..3 {
                assert_relative_eq!(back[r], e[r], epsilon = 1e-4);
            }
        }
    }

    #[test]
    fn singular_matrix_has_no_spd_inverse() {
        let m = DenseMatrix::zeros(2, 2);
        assert!(m.spd_inverse().is_none());
    }

    #[test]
    fn twist_angle_extracts_rotation_about_axis() {
        let q = Quat::from_axis_angle(Vec3::Z, 0.7) * Quat::from_axis_angle(Vec3::X, 0.3);
        let twist = twist_angle(Quat::from_axis_angle(Vec3::Z, 0.7), Vec3::Z);
        assert_relative_eq!(twist, 0.7, epsilon = 1e-5);
        assert!(twist_angle(q, Vec3::Z).abs() > 0.5);
    }
}
