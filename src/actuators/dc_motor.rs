use serde::{Deserialize, Serialize};

use super::Actuator;
use crate::mount::Mount;
use crate::world::DynamicsWorld;

/// Converts rad/s to rpm for the back-EMF constant.
const RAD_PER_SEC_TO_RPM: f32 = 9.5493;

/// Electrical and mechanical constants of a brushed DC motor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DcMotorParams {
    /// Armature resistance (Ω).
    pub resistance: f32,
    /// Armature inductance (H).
    pub inductance: f32,
    /// Back-EMF constant (V/rpm).
    pub back_emf: f32,
    /// Torque constant (N·m/A).
    pub torque_constant: f32,
    /// Viscous friction of the shaft (N·m·s/rad).
    pub friction: f32,
}

/// DC motor driving an articulated joint through an optional gearbox.
///
/// The setpoint is the supply voltage. Armature current is integrated with
/// explicit Euler and clamped to the stall current while the motor spins up.
#[derive(Debug, Clone)]
pub struct DcMotor {
    name: String,
    mount: Mount,
    params: DcMotorParams,
    gear_ratio: f32,
    gear_efficiency: f32,
    voltage: f32,
    current: f32,
    torque: f32,
}

impl DcMotor {
    pub fn new(name: &str, params: DcMotorParams) -> Self {
        Self {
            name: name.to_string(),
            mount: Mount::Unattached,
            params,
            gear_ratio: 1.0,
            gear_efficiency: 1.0,
            voltage: 0.0,
            current: 0.0,
            torque: 0.0,
        }
    }

    /// Non-positive ratios fall back to 1; efficiency is clamped into (0, 1].
    pub fn with_gearbox(mut self, ratio: f32, efficiency: f32) -> Self {
        self.gear_ratio = if ratio > 0.0 { ratio } else { 1.0 };
        self.gear_efficiency = if efficiency > 0.0 { efficiency.min(1.0) } else { 1.0 };
        self
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    pub fn torque(&self) -> f32 {
        self.torque
    }

    /// Shaft speed on the motor side of the gearbox.
    pub fn shaft_velocity(&self, world: &DynamicsWorld) -> f32 {
        self.mount
            .joint_state(world)
            .map(|(_, v)| v * self.gear_ratio)
            .unwrap_or(0.0)
    }
}

impl Actuator for DcMotor {
    fn name(&self) -> &str {
        &self.name
    }

    fn mount(&self) -> Mount {
        self.mount
    }

    fn attach(&mut self, mount: Mount) {
        self.mount = mount;
    }

    fn setpoint(&self) -> f32 {
        self.voltage
    }

    fn set_setpoint(&mut self, value: f32) {
        self.voltage = value;
    }

    fn update(&mut self, world: &mut DynamicsWorld, dt: f32) {
        let p = self.params;
        let omega = self.shaft_velocity(world);
        self.torque = (self.current * p.torque_constant - omega * p.friction) * self.gear_ratio * self.gear_efficiency;

        let di = (self.voltage - omega * p.back_emf * RAD_PER_SEC_TO_RPM - self.current * p.resistance) / p.inductance;
        self.current += di * dt;
        if p.resistance > 0.0 {
            let stall = self.voltage / p.resistance;
            if self.current.abs() > stall.abs() && self.current * self.voltage > 0.0 {
                self.current = stall;
            }
        }

        self.mount.apply_joint_force(world, self.torque);
    }

    fn reset(&mut self) {
        self.voltage = 0.0;
        self.current = 0.0;
        self.torque = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn motor() -> DcMotor {
        DcMotor::new(
            "drive",
            DcMotorParams {
                resistance: 1.0,
                inductance: 0.01,
                back_emf: 0.001,
                torque_constant: 0.05,
                friction: 0.0,
            },
        )
    }

    #[test]
    fn current_never_exceeds_stall_current() {
        let mut world = DynamicsWorld::new(crate::dynamics::solver::ConstraintSolver::default());
        let mut m = motor();
        m.set_setpoint(12.0);
        for _ in 0..100 {
            m.update(&mut world, 0.01);
        }
        assert!(m.current() <= 12.0 + 1e-4);
        assert_relative_eq!(m.current(), 12.0, epsilon = 1e-3);
        assert_relative_eq!(m.torque(), 0.6, epsilon = 1e-3);
    }

    #[test]
    fn gearbox_parameters_are_sanitised() {
        let m = motor().with_gearbox(-3.0, 2.0);
        assert_relative_eq!(m.gear_ratio, 1.0);
        assert_relative_eq!(m.gear_efficiency, 1.0);
    }
}
