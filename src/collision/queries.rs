use glam::Vec3;

use crate::{
    core::{
        collider::{ColliderShape, ColliderTag},
        types::Transform,
    },
    utils::allocator::ColliderHandle,
};

/// Result of a ray cast against colliders.
#[derive(Debug, Clone)]
pub struct RaycastHit {
    pub collider: ColliderHandle,
    pub tag: Option<ColliderTag>,
    pub point: Vec3,
    pub normal: Vec3,
    pub distance: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct RaycastQuery {
    pub origin: Vec3,
    pub direction: Vec3,
    pub max_distance: f32,
}

impl RaycastQuery {
    pub fn new(origin: Vec3, direction: Vec3, max_distance: f32) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
            max_distance,
        }
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Shape-level ray intersection tests.
pub struct Raycast;

impl Raycast {
    /// First intersection of the ray with `shape` placed at `transform`.
    ///
    /// Returns `(point, normal, distance)`; rays starting inside a shape are ignored.
    pub fn ray_shape(
        query: &RaycastQuery,
        shape: &ColliderShape,
        transform: &Transform,
    ) -> Option<(Vec3, Vec3, f32)> {
        if query.direction == Vec3::ZERO {
            return None;
        }
        match shape {
            ColliderShape::Sphere { radius } => {
                let t = Self::ray_sphere(query, transform.position, *radius)?;
                let point = query.at(t);
                Some((point, (point - transform.position).normalize_or_zero(), t))
            }
            ColliderShape::Box { half_extents } => {
                // Work in the box frame.
                let local = RaycastQuery {
                    origin: transform.inverse_transform_point(query.origin),
                    direction: transform.rotation.inverse() * query.direction,
                    max_distance: query.max_distance,
                };
                let (t, local_normal) = Self::ray_aabb(&local, *half_extents)?;
                Some((query.at(t), transform.transform_vector(local_normal), t))
            }
            ColliderShape::Plane { normal } => {
                let n = transform.transform_vector(*normal);
                let denom = query.direction.dot(n);
                if denom >= -f32::EPSILON {
                    return None;
                }
                let t = (transform.position - query.origin).dot(n) / denom;
                if t < 0.0 || t > query.max_distance {
                    return None;
                }
                Some((query.at(t), n, t))
            }
        }
    }

    fn ray_sphere(query: &RaycastQuery, center: Vec3, radius: f32) -> Option<f32> {
        let oc = query.origin - center;
        let b = oc.dot(query.direction);
        let c = oc.length_squared() - radius * radius;
        let discriminant = b * b - c;
        if discriminant < 0.0 {
            return None;
        }
        let t = -b - discriminant.sqrt();
        if t < 0.0 || t > query.max_distance {
            return None;
        }
        Some(t)
    }

    fn ray_aabb(query: &RaycastQuery, half_extents: Vec3) -> Option<(f32, Vec3)> {
        let mut t_min = 0.0;
        let mut t_max = query.max_distance;
        let mut normal = Vec3::ZERO;

        for i in 0..3 {
            let origin = query.origin[i];
            let dir = query.direction[i];
            let min = -half_extents[i];
            let max = half_extents[i];

            if dir.abs() < 1e-6 {
                if origin < min || origin > max {
                    return None;
                }
                continue;
            }
            let inv_dir = 1.0 / dir;
            let mut t1 = (min - origin) * inv_dir;
            let mut t2 = (max - origin) * inv_dir;
            // Entering through the face whose normal opposes the ray.
            let mut axis_normal = Vec3::ZERO;
            axis_normal[i] = -dir.signum();
            if t1 > t2 {
                std::mem::swap(&mut t1, &mut t2);
            }
            if t1 > t_min {
                t_min = t1;
                normal = axis_normal;
            }
            t_max = f32::min(t_max, t2);
            if t_min > t_max {
                return None;
            }
        }

        if normal == Vec3::ZERO {
            return None;
        }
        Some((t_min, normal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn ray_hits_sphere_front_face() {
        let query = RaycastQuery::new(Vec3::new(-5.0, 0.0, 0.0), Vec3::X, 100.0);
        let (point, normal, t) =
            Raycast::ray_shape(&query, &ColliderShape::sphere(1.0), &Transform::IDENTITY)
                .expect("hit");
        assert_relative_eq!(t, 4.0, epsilon = 1e-5);
        assert_relative_eq!(point.x, -1.0, epsilon = 1e-5);
        assert_relative_eq!(normal.x, -1.0, epsilon = 1e-5);
    }

    #[test]
    fn ray_hits_box_face_with_outward_normal() {
        let query = RaycastQuery::new(Vec3::new(0.0, 5.0, 0.0), -Vec3::Y, 100.0);
        let (_, normal, t) = Raycast::ray_shape(
            &query,
            &ColliderShape::cuboid(Vec3::splat(1.0)),
            &Transform::IDENTITY,
        )
        .expect("hit");
        assert_relative_eq!(t, 4.0, epsilon = 1e-5);
        assert_relative_eq!(normal.y, 1.0);
    }

    #[test]
    fn ray_parallel_to_plane_misses() {
        let query = RaycastQuery::new(Vec3::new(0.0, 0.0, 1.0), Vec3::X, 100.0);
        assert!(Raycast::ray_shape(&query, &ColliderShape::plane(Vec3::Z), &Transform::IDENTITY).is_none());
    }

    #[test]
    fn ray_beyond_max_distance_misses() {
        let query = RaycastQuery::new(Vec3::new(-5.0, 0.0, 0.0), Vec3::X, 2.0);
        assert!(Raycast::ray_shape(&query, &ColliderShape::sphere(1.0), &Transform::IDENTITY).is_none());
    }
}
