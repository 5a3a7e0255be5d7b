use glam::Vec3;

use crate::utils::allocator::ColliderHandle;

/// Geometric contact between two colliders.
///
/// `normal` points from B towards A; `depth` is positive when penetrating.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactPoint {
    pub world_on_a: Vec3,
    pub world_on_b: Vec3,
    /// Point on A relative to A's body center of mass (world orientation).
    pub local_on_a: Vec3,
    pub local_on_b: Vec3,
    pub normal: Vec3,
    pub depth: f32,
}

impl ContactPoint {
    pub fn new(world_on_a: Vec3, world_on_b: Vec3, normal: Vec3, depth: f32) -> Self {
        Self {
            world_on_a,
            world_on_b,
            local_on_a: Vec3::ZERO,
            local_on_b: Vec3::ZERO,
            normal,
            depth,
        }
    }

    /// Same contact seen from the other collider.
    pub fn swapped(&self) -> Self {
        Self {
            world_on_a: self.world_on_b,
            world_on_b: self.world_on_a,
            local_on_a: self.local_on_b,
            local_on_b: self.local_on_a,
            normal: -self.normal,
            depth: self.depth,
        }
    }

    pub fn midpoint(&self) -> Vec3 {
        0.5 * (self.world_on_a + self.world_on_b)
    }
}

/// Per-contact surface coefficients produced by the contact-added hook.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CombinedMaterial {
    pub friction: f32,
    pub rolling_friction: f32,
    pub restitution: f32,
    /// Tangential slip velocity attached as auxiliary data.
    pub slip: Option<Vec3>,
}

impl CombinedMaterial {
    pub const FRICTIONLESS: CombinedMaterial = CombinedMaterial {
        friction: 0.0,
        rolling_friction: 0.0,
        restitution: 0.0,
        slip: None,
    };
}

#[derive(Debug, Clone)]
pub struct ManifoldPoint {
    pub contact: ContactPoint,
    pub material: CombinedMaterial,
    pub normal_impulse: f32,
    pub tangent_impulse: [f32; 2],
}

/// Contact manifold storing collision contacts for a pair.
#[derive(Debug, Clone)]
pub struct ContactManifold {
    pub collider_a: ColliderHandle,
    pub collider_b: ColliderHandle,
    pub points: Vec<ManifoldPoint>,
}

impl ContactManifold {
    pub fn new(collider_a: ColliderHandle, collider_b: ColliderHandle) -> Self {
        Self {
            collider_a,
            collider_b,
            points: Vec::new(),
        }
    }

    pub fn max_depth(&self) -> f32 {
        self.points
            .iter()
            .map(|p| p.contact.depth)
            .fold(f32::NEG_INFINITY, f32::max)
    }

    pub fn total_normal_impulse(&self) -> f32 {
        self.points.iter().map(|p| p.normal_impulse).sum()
    }
}
