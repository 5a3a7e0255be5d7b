use glam::{Mat3, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Rigid placement (position and orientation) of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    pub fn from_translation(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
        }
    }

    pub fn from_rotation(rotation: Quat) -> Self {
        Self {
            position: Vec3::ZERO,
            rotation,
        }
    }

    /// Applies another transform on top of this one, returning the composition.
    pub fn combine(&self, other: &Transform) -> Transform {
        Transform {
            position: self.position + self.rotation * other.position,
            rotation: (self.rotation * other.rotation).normalize(),
        }
    }

    pub fn inverse(&self) -> Transform {
        let inv_rot = self.rotation.inverse();
        Transform {
            position: -(inv_rot * self.position),
            rotation: inv_rot,
        }
    }

    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.position + self.rotation * point
    }

    pub fn inverse_transform_point(&self, point: Vec3) -> Vec3 {
        self.rotation.inverse() * (point - self.position)
    }

    pub fn transform_vector(&self, vector: Vec3) -> Vec3 {
        self.rotation * vector
    }
}

impl std::ops::Mul for Transform {
    type Output = Transform;

    fn mul(self, rhs: Transform) -> Transform {
        self.combine(&rhs)
    }
}

/// Linear and angular velocity of a rigid body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    pub linear: Vec3,
    pub angular: Vec3,
}

impl Velocity {
    pub fn new(linear: Vec3, angular: Vec3) -> Self {
        Self { linear, angular }
    }

    /// Velocity of a point at world-space offset `r` from the center of mass.
    pub fn at_offset(&self, r: Vec3) -> Vec3 {
        self.linear + self.angular.cross(r)
    }
}

/// Determinant below this fraction of the cubed largest diagonal entry counts as singular.
const INERTIA_CONDITION_LIMIT: f32 = 1.0e-9;

/// Mass and body-frame inertia tensor about the center of mass.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MassProperties {
    pub mass: f32,
    pub inertia: Mat3,
}

impl Default for MassProperties {
    fn default() -> Self {
        Self {
            mass: 1.0,
            inertia: Mat3::IDENTITY,
        }
    }
}

impl MassProperties {
    pub fn new(mass: f32, inertia: Mat3) -> Self {
        Self { mass, inertia }
    }

    pub fn inverse_mass(&self) -> f32 {
        if self.mass.abs() < f32::EPSILON {
            0.0
        } else {
            1.0 / self.mass
        }
    }

    /// Zero for a singular tensor. Singularity is judged relative to the
    /// tensor's own scale so centimetre-sized bodies still rotate.
    pub fn inverse_inertia(&self) -> Mat3 {
        let scale = self
            .inertia
            .x_axis
            .x
            .abs()
            .max(self.inertia.y_axis.y.abs())
            .max(self.inertia.z_axis.z.abs());
        let det = self.inertia.determinant();
        if !(scale > 0.0 && det.is_finite()) || det.abs() <= INERTIA_CONDITION_LIMIT * scale * scale * scale {
            Mat3::ZERO
        } else {
            self.inertia.inverse()
        }
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Inverted box that any `union` replaces.
    pub const EMPTY: Aabb = Aabb {
        min: Vec3::splat(f32::MAX),
        max: Vec3::splat(-f32::MAX),
    };

    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_center(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.cmple(other.max).all() && other.min.cmple(self.max).all()
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        self.min.cmple(point).all() && point.cmple(self.max).all()
    }

    pub fn is_empty(&self) -> bool {
        self.min.cmpgt(self.max).any()
    }
}

/// Helper methods for inertia calculations.
pub trait InertiaTensorExt {
    fn for_solid_box(half_extents: Vec3, mass: f32) -> Mat3;
    fn for_solid_sphere(radius: f32, mass: f32) -> Mat3;
    fn for_solid_cylinder(radius: f32, height: f32, mass: f32) -> Mat3;
}

impl InertiaTensorExt for Mat3 {
    fn for_solid_box(half_extents: Vec3, mass: f32) -> Mat3 {
        let lx = half_extents.x * 2.0;
        let ly = half_extents.y * 2.0;
        let lz = half_extents.z * 2.0;
        let factor = mass / 12.0;
        Mat3::from_diagonal(Vec3::new(
            factor * (ly * ly + lz * lz),
            factor * (lx * lx + lz * lz),
            factor * (lx * lx + ly * ly),
        ))
    }

    fn for_solid_sphere(radius: f32, mass: f32) -> Mat3 {
        let value = 0.4 * mass * radius * radius;
        Mat3::from_diagonal(Vec3::splat(value))
    }

    /// Cylinder aligned with the local Z axis.
    fn for_solid_cylinder(radius: f32, height: f32, mass: f32) -> Mat3 {
        let side = mass * (3.0 * radius * radius + height * height) / 12.0;
        Mat3::from_diagonal(Vec3::new(side, side, 0.5 * mass * radius * radius))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn inverse_composes_to_identity() {
        let t = Transform::new(
            Vec3::new(1.0, -2.0, 0.5),
            Quat::from_axis_angle(Vec3::Y, 0.8),
        );
        let identity = t * t.inverse();
        assert_relative_eq!(identity.position.length(), 0.0, epsilon = 1e-5);
        assert!(identity.rotation.angle_between(Quat::IDENTITY) < 1e-4);
    }

    #[test]
    fn empty_aabb_is_replaced_by_union() {
        let b = Aabb::from_center(Vec3::ONE, Vec3::splat(0.5));
        let u = Aabb::EMPTY.union(&b);
        assert_eq!(u, b);
        assert!(Aabb::EMPTY.is_empty());
    }

    #[test]
    fn centimetre_bodies_keep_their_inverse_inertia() {
        let link = MassProperties::new(0.6, Mat3::from_diagonal(Vec3::new(1.7e-4, 8.6e-3, 8.6e-3)));
        let inverse = link.inverse_inertia();
        assert_relative_eq!(inverse.x_axis.x, 1.0 / 1.7e-4, max_relative = 1e-4);
        assert_relative_eq!(inverse.z_axis.z, 1.0 / 8.6e-3, max_relative = 1e-4);

        let ball = MassProperties::new(4.08, Mat3::from_diagonal(Vec3::splat(4.08e-3)));
        assert_relative_eq!(ball.inverse_inertia().y_axis.y, 1.0 / 4.08e-3, max_relative = 1e-4);
    }

    #[test]
    fn singular_inertia_inverts_to_zero() {
        let flat = MassProperties::new(1.0, Mat3::from_diagonal(Vec3::new(1.0, 1.0, 0.0)));
        assert_eq!(flat.inverse_inertia(), Mat3::ZERO);
        let none = MassProperties::new(0.0, Mat3::ZERO);
        assert_eq!(none.inverse_inertia(), Mat3::ZERO);
    }
}
