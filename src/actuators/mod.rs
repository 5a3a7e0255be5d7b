//! Actuators turn setpoints into forces on bodies and joints.

pub mod dc_motor;
pub mod joint_motor;
pub mod thruster;

use crate::mount::Mount;
use crate::world::DynamicsWorld;

pub use dc_motor::{DcMotor, DcMotorParams};
pub use joint_motor::JointMotor;
pub use thruster::Thruster;

pub trait Actuator: Send + Sync {
    fn name(&self) -> &str;

    fn mount(&self) -> Mount;

    fn attach(&mut self, mount: Mount);

    fn setpoint(&self) -> f32;

    fn set_setpoint(&mut self, value: f32);

    /// Applies this tick's force or torque.
    fn update(&mut self, world: &mut DynamicsWorld, dt: f32);

    fn reset(&mut self) {
        self.set_setpoint(0.0);
    }
}
