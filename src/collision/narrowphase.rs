use glam::{Mat3, Vec3};

use crate::collision::contact::ContactPoint;
use crate::core::{collider::ColliderShape, types::Transform};

/// Tolerance used when testing whether a vertex lies inside the other box.
const CONTAINMENT_SLOP: f32 = 1.0e-4;

/// Separating axis theorem for oriented box pairs.
pub struct SATAlgorithm;

impl SATAlgorithm {
    /// Returns the axis of minimum overlap (pointing from A towards B) and its depth.
    pub fn min_overlap_axis(
        half_extents_a: Vec3,
        transform_a: &Transform,
        half_extents_b: Vec3,
        transform_b: &Transform,
    ) -> Option<(Vec3, f32)> {
        let relative_pos = transform_b.position - transform_a.position;
        let axes_a = box_axes(transform_a);
        let axes_b = box_axes(transform_b);

        let mut test_axes = Vec::with_capacity(15);
        test_axes.extend_from_slice(&axes_a);
        test_axes.extend_from_slice(&axes_b);
        for axis_a in &axes_a {
            for axis_b in &axes_b {
                let axis = axis_a.cross(*axis_b);
                if axis.length_squared() > 1e-6 {
                    test_axes.push(axis.normalize());
                }
            }
        }

        let mut min_overlap = f32::MAX;
        let mut min_axis = Vec3::ZERO;
        for axis in test_axes {
            let extent_a = projected_extent(&axes_a, half_extents_a, axis);
            let extent_b = projected_extent(&axes_b, half_extents_b, axis);
            let projection = relative_pos.dot(axis);
            let overlap = (extent_a + extent_b) - projection.abs();
            if overlap <= 0.0 {
                return None;
            }
            if overlap < min_overlap {
                min_overlap = overlap;
                min_axis = if projection < 0.0 { -axis } else { axis };
            }
        }
        Some((min_axis, min_overlap))
    }
}

fn box_axes(transform: &Transform) -> [Vec3; 3] {
    let r = Mat3::from_quat(transform.rotation);
    [r.x_axis, r.y_axis, r.z_axis]
}

fn projected_extent(axes: &[Vec3; 3], half_extents: Vec3, axis: Vec3) -> f32 {
    axes[0].dot(axis).abs() * half_extents.x
        + axes[1].dot(axis).abs() * half_extents.y
        + axes[2].dot(axis).abs() * half_extents.z
}

fn box_vertices(half_extents: Vec3, transform: &Transform) -> [Vec3; 8] {
    let mut out = [Vec3::ZERO; 8];
    for (i, v) in out.iter_mut().enumerate() {
        let sign = Vec3::new(
            if i & 1 == 0 { -1.0 } else { 1.0 },
            if i & 2 == 0 { -1.0 } else { 1.0 },
            if i & 4 == 0 { -1.0 } else { 1.0 },
        );
        *v = transform.transform_point(sign * half_extents);
    }
    out
}

/// Narrow phase dispatcher producing contact points for a pair of placed shapes.
pub struct NarrowPhase;

impl NarrowPhase {
    /// Contact points between two shapes at their world placements.
    ///
    /// Normals point from B towards A. Plane-plane pairs never collide.
    pub fn collide(
        shape_a: &ColliderShape,
        transform_a: &Transform,
        shape_b: &ColliderShape,
        transform_b: &Transform,
    ) -> Vec<ContactPoint> {
        use ColliderShape::*;
        match (shape_a, shape_b) {
            (Sphere { radius: ra }, Sphere { radius: rb }) => {
                Self::sphere_sphere(transform_a.position, *ra, transform_b.position, *rb)
                    .into_iter()
                    .collect()
            }
            (Sphere { radius }, Plane { normal }) => Self::sphere_plane(
                transform_a.position,
                *radius,
                transform_b.position,
                transform_b.transform_vector(*normal),
            )
            .into_iter()
            .collect(),
            (Box { half_extents }, Plane { normal }) => Self::box_plane(
                *half_extents,
                transform_a,
                transform_b.position,
                transform_b.transform_vector(*normal),
            ),
            (Sphere { radius }, Box { half_extents }) => {
                Self::sphere_box(transform_a.position, *radius, *half_extents, transform_b)
                    .into_iter()
                    .collect()
            }
            (Box { half_extents: ha }, Box { half_extents: hb }) => {
                Self::box_box(*ha, transform_a, *hb, transform_b)
            }
            (Plane { .. }, Plane { .. }) => Vec::new(),
            (Plane { .. }, _) | (Box { .. }, Sphere { .. }) => {
                Self::collide(shape_b, transform_b, shape_a, transform_a)
                    .iter()
                    .map(ContactPoint::swapped)
                    .collect()
            }
        }
    }

    pub fn sphere_sphere(center_a: Vec3, ra: f32, center_b: Vec3, rb: f32) -> Option<ContactPoint> {
        let delta = center_a - center_b;
        let distance = delta.length();
        if distance > ra + rb {
            return None;
        }
        let normal = if distance > f32::EPSILON {
            delta / distance
        } else {
            Vec3::Y
        };
        Some(ContactPoint::new(
            center_a - normal * ra,
            center_b + normal * rb,
            normal,
            ra + rb - distance,
        ))
    }

    pub fn sphere_plane(center: Vec3, radius: f32, plane_point: Vec3, plane_normal: Vec3) -> Option<ContactPoint> {
        let distance = (center - plane_point).dot(plane_normal);
        if distance > radius {
            return None;
        }
        Some(ContactPoint::new(
            center - plane_normal * radius,
            center - plane_normal * distance,
            plane_normal,
            radius - distance,
        ))
    }

    pub fn box_plane(
        half_extents: Vec3,
        transform: &Transform,
        plane_point: Vec3,
        plane_normal: Vec3,
    ) -> Vec<ContactPoint> {
        box_vertices(half_extents, transform)
            .into_iter()
            .filter_map(|v| {
                let distance = (v - plane_point).dot(plane_normal);
                (distance <= 0.0).then(|| {
                    ContactPoint::new(v, v - plane_normal * distance, plane_normal, -distance)
                })
            })
            .collect()
    }

    pub fn sphere_box(
        center: Vec3,
        radius: f32,
        half_extents: Vec3,
        box_transform: &Transform,
    ) -> Option<ContactPoint> {
        let local = box_transform.inverse_transform_point(center);
        let closest = local.clamp(-half_extents, half_extents);

        let (surface_local, normal_local, depth) = if closest == local {
            // Center inside the box: push out through the nearest face.
            let penetration = half_extents - local.abs();
            let axis = if penetration.x <= penetration.y && penetration.x <= penetration.z {
                0
            } else if penetration.y <= penetration.z {
                1
            } else {
                2
            };
            let sign = if local[axis] >= 0.0 { 1.0 } else { -1.0 };
            let mut surface = local;
            surface[axis] = sign * half_extents[axis];
            let mut normal = Vec3::ZERO;
            normal[axis] = sign;
            (surface, normal, radius + penetration[axis])
        } else {
            let diff = local - closest;
            let distance = diff.length();
            if distance > radius {
                return None;
            }
            (closest, diff / distance, radius - distance)
        };

        let normal = box_transform.transform_vector(normal_local);
        Some(ContactPoint::new(
            center - normal * radius,
            box_transform.transform_point(surface_local),
            normal,
            depth,
        ))
    }

    pub fn box_box(
        half_extents_a: Vec3,
        transform_a: &Transform,
        half_extents_b: Vec3,
        transform_b: &Transform,
    ) -> Vec<ContactPoint> {
        let Some((axis_ab, overlap)) =
            SATAlgorithm::min_overlap_axis(half_extents_a, transform_a, half_extents_b, transform_b)
        else {
            return Vec::new();
        };
        let normal = -axis_ab;
        let verts_a = box_vertices(half_extents_a, transform_a);
        let verts_b = box_vertices(half_extents_b, transform_b);
        let top_b = verts_b.iter().map(|v| v.dot(normal)).fold(f32::MIN, f32::max);
        let bottom_a = verts_a.iter().map(|v| v.dot(normal)).fold(f32::MAX, f32::min);

        let inside = |shape_half: Vec3, transform: &Transform, p: Vec3| {
            let local = transform.inverse_transform_point(p);
            local.abs().cmple(shape_half + Vec3::splat(CONTAINMENT_SLOP)).all()
        };

        let mut points = Vec::new();
        for va in verts_a {
            let depth = top_b - va.dot(normal);
            if depth > 0.0 && inside(half_extents_b, transform_b, va) {
                points.push(ContactPoint::new(va, va + normal * depth, normal, depth));
            }
        }
        for vb in verts_b {
            let depth = vb.dot(normal) - bottom_a;
            if depth > 0.0 && inside(half_extents_a, transform_a, vb) {
                points.push(ContactPoint::new(vb - normal * depth, vb, normal, depth));
            }
        }

        if points.is_empty() {
            // Edge-edge: single point at A's deepest vertex.
            let deepest = verts_a
                .iter()
                .copied()
                .min_by(|x, y| x.dot(normal).total_cmp(&y.dot(normal)))
                .unwrap_or(transform_a.position);
            points.push(ContactPoint::new(
                deepest,
                deepest + normal * overlap,
                normal,
                overlap,
            ));
        }
        points
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::Quat;

    #[test]
    fn overlapping_spheres_normal_points_from_b_to_a() {
        let contacts = NarrowPhase::collide(
            &ColliderShape::sphere(1.0),
            &Transform::from_translation(Vec3::new(1.5, 0.0, 0.0)),
            &ColliderShape::sphere(1.0),
            &Transform::IDENTITY,
        );
        assert_eq!(contacts.len(), 1);
        assert_relative_eq!(contacts[0].normal.x, 1.0);
        assert_relative_eq!(contacts[0].depth, 0.5, epsilon = 1e-6);
    }

    #[test]
    fn separated_spheres_do_not_collide() {
        let contacts = NarrowPhase::collide(
            &ColliderShape::sphere(0.5),
            &Transform::from_translation(Vec3::new(3.0, 0.0, 0.0)),
            &ColliderShape::sphere(0.5),
            &Transform::IDENTITY,
        );
        assert!(contacts.is_empty());
    }

    #[test]
    fn resting_box_touches_plane_at_four_corners() {
        let contacts = NarrowPhase::collide(
            &ColliderShape::cuboid(Vec3::splat(0.5)),
            &Transform::from_translation(Vec3::new(0.0, 0.0, 0.49)),
            &ColliderShape::plane(Vec3::Z),
            &Transform::IDENTITY,
        );
        assert_eq!(contacts.len(), 4);
        for c in contacts {
            assert_relative_eq!(c.depth, 0.01, epsilon = 1e-5);
            assert_relative_eq!(c.normal.z, 1.0);
        }
    }

    #[test]
    fn plane_first_pair_is_swapped() {
        let contacts = NarrowPhase::collide(
            &ColliderShape::plane(Vec3::Z),
            &Transform::IDENTITY,
            &ColliderShape::sphere(1.0),
            &Transform::from_translation(Vec3::new(0.0, 0.0, 0.9)),
        );
        assert_eq!(contacts.len(), 1);
        assert_relative_eq!(contacts[0].normal.z, -1.0);
    }

    #[test]
    fn sphere_resting_on_box_face() {
        let contact = NarrowPhase::sphere_box(
            Vec3::new(0.0, 0.95, 0.0),
            0.5,
            Vec3::splat(0.5),
            &Transform::IDENTITY,
        )
        .expect("touching");
        assert_relative_eq!(contact.normal.y, 1.0, epsilon = 1e-6);
        assert_relative_eq!(contact.depth, 0.05, epsilon = 1e-5);
    }

    #[test]
    fn stacked_boxes_overlap_along_vertical_axis() {
        let top = Transform::new(Vec3::new(0.0, 0.0, 0.95), Quat::IDENTITY);
        let contacts = NarrowPhase::collide(
            &ColliderShape::cuboid(Vec3::splat(0.5)),
            &top,
            &ColliderShape::cuboid(Vec3::splat(0.5)),
            &Transform::IDENTITY,
        );
        assert!(!contacts.is_empty());
        for c in contacts {
            assert_relative_eq!(c.normal.z, 1.0, epsilon = 1e-5);
            assert_relative_eq!(c.depth, 0.05, epsilon = 1e-4);
        }
    }
}
