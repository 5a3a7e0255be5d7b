use log::warn;

use super::Actuator;
use crate::mount::Mount;
use crate::world::DynamicsWorld;

/// Ideal torque (or force, on prismatic joints) source with saturation.
#[derive(Debug, Clone)]
pub struct JointMotor {
    name: String,
    mount: Mount,
    max_effort: f32,
    setpoint: f32,
}

impl JointMotor {
    pub fn new(name: &str, max_effort: f32) -> Self {
        Self {
            name: name.to_string(),
            mount: Mount::Unattached,
            max_effort: max_effort.abs(),
            setpoint: 0.0,
        }
    }

    /// Effort actually applied, after saturation.
    pub fn effort(&self) -> f32 {
        self.setpoint.clamp(-self.max_effort, self.max_effort)
    }
}

impl Actuator for JointMotor {
    fn name(&self) -> &str {
        &self.name
    }

    fn mount(&self) -> Mount {
        self.mount
    }

    fn attach(&mut self, mount: Mount) {
        if !matches!(mount, Mount::Joint { .. }) {
            warn!("Joint motor '{}' attached to a non-joint mount", self.name);
        }
        self.mount = mount;
    }

    fn setpoint(&self) -> f32 {
        self.setpoint
    }

    fn set_setpoint(&mut self, value: f32) {
        self.setpoint = value;
    }

    fn update(&mut self, world: &mut DynamicsWorld, _dt: f32) {
        self.mount.apply_joint_force(world, self.effort());
    }
}
