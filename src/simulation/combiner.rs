//! Pairwise surface resolution for freshly generated contact points.

use glam::Vec3;

use crate::collision::contact::CombinedMaterial;
use crate::config::FRICTION_SMOOTHING;
use crate::materials::Material;

/// Kinematics of a single contact point handed to a [`MaterialCombiner`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactKinematics {
    /// Contact normal, pointing from B to A.
    pub normal: Vec3,
    /// Velocity of A's body at the contact (zero for static bodies).
    pub velocity_a: Vec3,
    pub velocity_b: Vec3,
}

impl ContactKinematics {
    /// Tangential part of B's velocity relative to A.
    pub fn slip(&self) -> Vec3 {
        let relative = self.velocity_b - self.velocity_a;
        relative - self.normal * self.normal.dot(relative)
    }
}

/// Decides friction and restitution of a contact between two materials.
///
/// Runs synchronously inside the narrow phase; must not fail.
pub trait MaterialCombiner: Send + Sync {
    fn combine(&self, a: &Material, b: &Material, kinematics: &ContactKinematics) -> CombinedMaterial;
}

/// Smooth transition from static to dynamic friction as slip speed grows.
///
/// `μ = (μs − μd) / (σ·s² + 1) + μd`, with `s` the slip speed.
pub fn blended_friction(static_friction: f32, dynamic_friction: f32, slip_speed: f32, smoothing: f32) -> f32 {
    (static_friction - dynamic_friction) / (smoothing * slip_speed * slip_speed + 1.0) + dynamic_friction
}

/// Default combiner: blended friction from A's table row, product restitution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothFrictionCombiner {
    pub smoothing: f32,
}

impl Default for SmoothFrictionCombiner {
    fn default() -> Self {
        Self {
            smoothing: FRICTION_SMOOTHING,
        }
    }
}

impl MaterialCombiner for SmoothFrictionCombiner {
    fn combine(&self, a: &Material, b: &Material, kinematics: &ContactKinematics) -> CombinedMaterial {
        let slip = kinematics.slip();
        let (fs, fd) = a.friction_against(b.id);
        CombinedMaterial {
            friction: blended_friction(fs, fd, slip.length(), self.smoothing),
            rolling_friction: 0.0,
            restitution: a.restitution * b.restitution,
            slip: Some(slip),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::materials::MaterialTable;
    use approx::assert_relative_eq;

    #[test]
    fn friction_blend_is_static_at_rest_and_decays_to_dynamic() {
        assert_relative_eq!(blended_friction(0.8, 0.3, 0.0, 100.0), 0.8);
        let mut previous = f32::INFINITY;
        for i in 0..200 {
            let mu = blended_friction(0.8, 0.3, i as f32 * 0.05, 100.0);
            assert!(mu <= previous);
            assert!(mu >= 0.3);
            previous = mu;
        }
        assert_relative_eq!(previous, 0.3, epsilon = 1e-3);
    }

    #[test]
    fn combiner_uses_row_of_first_material() {
        let mut table = MaterialTable::new();
        let steel = table.create_material("steel", 7800.0, 0.5).expect("steel");
        let rubber = table.create_material("rubber", 1100.0, 0.8).expect("rubber");
        table
            .set_one_way_interaction("steel", "rubber", 0.9, 0.6)
            .expect("interaction");

        let kinematics = ContactKinematics {
            normal: Vec3::Z,
            velocity_a: Vec3::ZERO,
            velocity_b: Vec3::new(0.0, 0.0, -3.0),
        };
        let a = table.material(steel).expect("a");
        let b = table.material(rubber).expect("b");
        let combined = SmoothFrictionCombiner::default().combine(a, b, &kinematics);
        assert_relative_eq!(combined.friction, 0.9);
        assert_relative_eq!(combined.restitution, 0.4);
        assert_relative_eq!(combined.rolling_friction, 0.0);
        assert_eq!(combined.slip, Some(Vec3::ZERO));
    }
}
