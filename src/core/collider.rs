use super::types::{Aabb, InertiaTensorExt, MassProperties, Transform};
use crate::utils::allocator::{BodyHandle, EntityId, MultibodyHandle};
use glam::{Mat3, Vec3};
use serde::{Deserialize, Serialize};

/// Half-size used for the bounding box of unbounded shapes.
const UNBOUNDED_EXTENT: f32 = 1.0e6;

/// Enumeration of supported collider geometries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ColliderShape {
    Sphere { radius: f32 },
    Box { half_extents: Vec3 },
    /// Infinite half-space; solid below the plane through the frame origin.
    Plane { normal: Vec3 },
}

impl ColliderShape {
    pub fn sphere(radius: f32) -> Self {
        ColliderShape::Sphere { radius }
    }

    pub fn cuboid(half_extents: Vec3) -> Self {
        ColliderShape::Box { half_extents }
    }

    pub fn plane(normal: Vec3) -> Self {
        ColliderShape::Plane {
            normal: normal.normalize_or_zero(),
        }
    }

    pub fn is_bounded(&self) -> bool {
        !matches!(self, ColliderShape::Plane { .. })
    }

    pub fn volume(&self) -> f32 {
        match self {
            ColliderShape::Sphere { radius } => 4.0 / 3.0 * std::f32::consts::PI * radius.powi(3),
            ColliderShape::Box { half_extents } => 8.0 * half_extents.x * half_extents.y * half_extents.z,
            ColliderShape::Plane { .. } => 0.0,
        }
    }

    pub fn mass_properties(&self, density: f32) -> MassProperties {
        let mass = self.volume() * density;
        let inertia = match self {
            ColliderShape::Sphere { radius } => Mat3::for_solid_sphere(*radius, mass),
            ColliderShape::Box { half_extents } => Mat3::for_solid_box(*half_extents, mass),
            ColliderShape::Plane { .. } => Mat3::ZERO,
        };
        MassProperties::new(mass, inertia)
    }

    pub fn aabb(&self, transform: &Transform) -> Aabb {
        match self {
            ColliderShape::Sphere { radius } => {
                Aabb::from_center(transform.position, Vec3::splat(*radius))
            }
            ColliderShape::Box { half_extents } => {
                let r = Mat3::from_quat(transform.rotation);
                let extent = Vec3::new(
                    r.x_axis.x.abs() * half_extents.x
                        + r.y_axis.x.abs() * half_extents.y
                        + r.z_axis.x.abs() * half_extents.z,
                    r.x_axis.y.abs() * half_extents.x
                        + r.y_axis.y.abs() * half_extents.y
                        + r.z_axis.y.abs() * half_extents.z,
                    r.x_axis.z.abs() * half_extents.x
                        + r.y_axis.z.abs() * half_extents.y
                        + r.z_axis.z.abs() * half_extents.z,
                );
                Aabb::from_center(transform.position, extent)
            }
            ColliderShape::Plane { .. } => {
                Aabb::from_center(transform.position, Vec3::splat(UNBOUNDED_EXTENT))
            }
        }
    }

    pub fn bounding_radius(&self) -> f32 {
        match self {
            ColliderShape::Sphere { radius } => *radius,
            ColliderShape::Box { half_extents } => half_extents.length(),
            ColliderShape::Plane { .. } => f32::INFINITY,
        }
    }

    /// Whether a world-space point lies inside the shape placed at `transform`.
    pub fn contains_point(&self, transform: &Transform, point: Vec3) -> bool {
        let local = transform.inverse_transform_point(point);
        match self {
            ColliderShape::Sphere { radius } => local.length_squared() <= radius * radius,
            ColliderShape::Box { half_extents } => local.abs().cmple(*half_extents).all(),
            ColliderShape::Plane { normal } => local.dot(*normal) <= 0.0,
        }
    }
}

/// Body that a collider moves with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BodyRef {
    Rigid(BodyHandle),
    Link {
        multibody: MultibodyHandle,
        link: usize,
    },
}

/// User data attached to a collider, resolved back to an entity by the simulation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColliderTag {
    pub entity: EntityId,
    /// Sub-part of the entity (link index for articulated entities, node for cables).
    pub part: Option<usize>,
}

impl ColliderTag {
    pub fn whole(entity: EntityId) -> Self {
        Self { entity, part: None }
    }

    pub fn part(entity: EntityId, part: usize) -> Self {
        Self {
            entity,
            part: Some(part),
        }
    }
}

/// Collider component attached to a rigid body or multibody link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collider {
    pub body: BodyRef,
    pub shape: ColliderShape,
    /// Placement relative to the body's center-of-mass frame.
    pub offset: Transform,
    /// Triggers report overlaps but never generate contacts.
    pub is_trigger: bool,
    pub tag: Option<ColliderTag>,
}

impl Collider {
    pub fn new(body: BodyRef, shape: ColliderShape) -> Self {
        Self {
            body,
            shape,
            offset: Transform::IDENTITY,
            is_trigger: false,
            tag: None,
        }
    }

    pub fn with_offset(mut self, offset: Transform) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_tag(mut self, tag: ColliderTag) -> Self {
        self.tag = Some(tag);
        self
    }

    pub fn as_trigger(mut self) -> Self {
        self.is_trigger = true;
        self
    }

    pub fn world_transform(&self, body_transform: &Transform) -> Transform {
        body_transform.combine(&self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::Quat;

    #[test]
    fn rotated_box_aabb_grows() {
        let shape = ColliderShape::cuboid(Vec3::new(1.0, 0.1, 0.1));
        let flat = shape.aabb(&Transform::IDENTITY);
        let turned = shape.aabb(&Transform::from_rotation(Quat::from_axis_angle(
            Vec3::Z,
            std::f32::consts::FRAC_PI_4,
        )));
        assert_relative_eq!(flat.max.x, 1.0);
        assert!(turned.max.y > flat.max.y);
    }

    #[test]
    fn sphere_mass_from_density() {
        let props = ColliderShape::sphere(1.0).mass_properties(3.0 / (4.0 * std::f32::consts::PI));
        assert_relative_eq!(props.mass, 1.0, epsilon = 1e-5);
    }
}
