//! Cameras and lights registered by rendering collaborators.
//!
//! The simulation only uses views for picking; everything else about them is
//! driven externally, so both are shared behind a lock.

use std::sync::Arc;

use glam::Vec3;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

pub type SharedView = Arc<RwLock<View>>;
pub type SharedLight = Arc<RwLock<Light>>;

/// Pinhole camera.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct View {
    pub eye: Vec3,
    pub direction: Vec3,
    pub up: Vec3,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    pub width: u32,
    pub height: u32,
    pub active: bool,
}

impl View {
    pub fn new(eye: Vec3, target: Vec3, up: Vec3, fov_y: f32, width: u32, height: u32) -> Self {
        Self {
            eye,
            direction: (target - eye).normalize_or(Vec3::X),
            up: up.normalize_or(Vec3::Z),
            fov_y,
            width: width.max(1),
            height: height.max(1),
            active: true,
        }
    }

    pub fn shared(self) -> SharedView {
        Arc::new(RwLock::new(self))
    }

    /// World-space ray through the centre of pixel `(x, y)`, origin top-left.
    pub fn ray(&self, x: u32, y: u32) -> (Vec3, Vec3) {
        let (w, h) = (self.width.max(1) as f32, self.height.max(1) as f32);
        let ndc_x = 2.0 * (x as f32 + 0.5) / w - 1.0;
        let ndc_y = 1.0 - 2.0 * (y as f32 + 0.5) / h;
        let half = (self.fov_y * 0.5).tan();

        let forward = self.direction.normalize_or(Vec3::X);
        let right = forward.cross(self.up).normalize_or(Vec3::Y);
        let up = right.cross(forward);
        let dir = forward + right * (ndc_x * half * w / h) + up * (ndc_y * half);
        (self.eye, dir.normalize())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Light {
    pub position: Vec3,
    pub direction: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    pub active: bool,
}

impl Light {
    pub fn shared(self) -> SharedLight {
        Arc::new(RwLock::new(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn centre_pixel_looks_along_view_direction() {
        let view = View::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y, 1.0, 101, 101);
        let (origin, dir) = view.ray(50, 50);
        assert_eq!(origin, Vec3::new(0.0, 0.0, 5.0));
        assert_relative_eq!(dir.z, -1.0, epsilon = 1e-5);
    }
}
