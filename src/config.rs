//! Global configuration constants and the serialisable simulation configuration.

use std::fmt;
use std::str::FromStr;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::dynamics::solver::{SolverParams, SolverType};
use crate::error::SimulationError;

/// Standard gravity (m/s²).
pub const DEFAULT_GRAVITY_CONSTANT: f32 = 9.81;

/// Default number of physics sub-steps per simulated second.
pub const DEFAULT_STEPS_PER_SECOND: f32 = 200.0;

/// Upper bound on sub-steps a single `advance_simulation` call may run.
pub const MAX_SUBSTEPS: u32 = 1_000_000;

/// Default cell size for the broad-phase uniform grid.
pub const DEFAULT_BROADPHASE_CELL_SIZE: f32 = 5.0;

/// Time step used while settling initial conditions (seconds).
pub const DEFAULT_IC_TIME_STEP: f32 = 0.001;

/// Default settling tolerance for linear and angular speeds.
pub const DEFAULT_IC_TOLERANCE: f32 = 1.0e-6;

/// Simulated time that must pass before settling is checked (seconds).
pub const IC_WARMUP_TIME: f64 = 0.01;

/// Multiplier applied to the IC tolerances when judging whether bodies settled.
pub const IC_TOLERANCE_SCALE: f32 = 100.0;

/// Slip-speed smoothing constant of the static/dynamic friction blend.
pub const FRICTION_SMOOTHING: f32 = 100.0;

/// Unit system used for user-facing quantities. Internally everything is SI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitSystem {
    #[default]
    Mks,
    Cgs,
}

impl UnitSystem {
    fn length_factor(self) -> f32 {
        match self {
            UnitSystem::Mks => 1.0,
            UnitSystem::Cgs => 0.01,
        }
    }

    fn mass_factor(self) -> f32 {
        match self {
            UnitSystem::Mks => 1.0,
            UnitSystem::Cgs => 0.001,
        }
    }

    pub fn length_to_si(self, value: f32) -> f32 {
        value * self.length_factor()
    }

    pub fn length_from_si(self, value: f32) -> f32 {
        value / self.length_factor()
    }

    pub fn position_to_si(self, value: Vec3) -> Vec3 {
        value * self.length_factor()
    }

    pub fn position_from_si(self, value: Vec3) -> Vec3 {
        value / self.length_factor()
    }

    /// Linear velocity and acceleration scale like lengths.
    pub fn velocity_from_si(self, value: f32) -> f32 {
        self.length_from_si(value)
    }

    pub fn acceleration_to_si(self, value: f32) -> f32 {
        self.length_to_si(value)
    }

    pub fn mass_to_si(self, value: f32) -> f32 {
        value * self.mass_factor()
    }

    /// Density conversion (mass / length³).
    pub fn density_to_si(self, value: f32) -> f32 {
        value * self.mass_factor() / self.length_factor().powi(3)
    }

    pub fn force_to_si(self, value: f32) -> f32 {
        value * self.mass_factor() * self.length_factor()
    }

    pub fn torque_to_si(self, value: f32) -> f32 {
        self.force_to_si(value) * self.length_factor()
    }
}

/// World axis pointing "up"; gravity acts along its negative direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpAxis {
    #[default]
    Z,
    Y,
}

impl UpAxis {
    pub fn up(self) -> Vec3 {
        match self {
            UpAxis::Z => Vec3::Z,
            UpAxis::Y => Vec3::Y,
        }
    }

    pub fn gravity(self, constant: f32) -> Vec3 {
        -self.up() * constant
    }
}

/// Which broad-phase pairs are handed to the narrow phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollisionFilterMode {
    /// Every pair collides.
    #[default]
    Standard,
    /// Only pairs explicitly enabled (or with a contact record) collide.
    Inclusive,
    /// Every pair collides except those explicitly disabled.
    Exclusive,
}

impl FromStr for CollisionFilterMode {
    type Err = SimulationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(CollisionFilterMode::Standard),
            "inclusive" => Ok(CollisionFilterMode::Inclusive),
            "exclusive" => Ok(CollisionFilterMode::Exclusive),
            _ => Err(SimulationError::UnknownFilter(s.to_string())),
        }
    }
}

impl fmt::Display for CollisionFilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CollisionFilterMode::Standard => "standard",
            CollisionFilterMode::Inclusive => "inclusive",
            CollisionFilterMode::Exclusive => "exclusive",
        };
        f.write_str(name)
    }
}

/// Parameters of the initial-conditions settling loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IcSolverParams {
    pub use_gravity: bool,
    /// Settling step in seconds.
    pub time_step: f32,
    /// `u32::MAX` means unlimited.
    pub max_iterations: u32,
    /// Wall-clock budget in seconds; infinite means unlimited.
    pub max_time: f64,
    /// Linear speed tolerance in user units.
    pub linear_tolerance: f32,
    /// Angular speed tolerance (rad/s).
    pub angular_tolerance: f32,
}

impl Default for IcSolverParams {
    fn default() -> Self {
        Self::new(false, 0.0, 0, 0.0, 0.0, 0.0)
    }
}

impl IcSolverParams {
    /// Builds sanitised parameters: non-positive values fall back to the defaults.
    pub fn new(
        use_gravity: bool,
        time_step: f32,
        max_iterations: u32,
        max_time: f64,
        linear_tolerance: f32,
        angular_tolerance: f32,
    ) -> Self {
        Self {
            use_gravity,
            time_step,
            max_iterations,
            max_time,
            linear_tolerance,
            angular_tolerance,
        }
        .sanitized()
    }

    pub fn sanitized(self) -> Self {
        let positive = |v: f32, fallback: f32| {
            if v > f32::EPSILON && v.is_finite() {
                v
            } else {
                fallback
            }
        };
        Self {
            use_gravity: self.use_gravity,
            time_step: positive(self.time_step, DEFAULT_IC_TIME_STEP),
            max_iterations: if self.max_iterations > 0 {
                self.max_iterations
            } else {
                u32::MAX
            },
            max_time: if self.max_time > f64::from(f32::EPSILON) {
                self.max_time
            } else {
                f64::INFINITY
            },
            linear_tolerance: positive(self.linear_tolerance, DEFAULT_IC_TOLERANCE),
            angular_tolerance: positive(self.angular_tolerance, DEFAULT_IC_TOLERANCE),
        }
    }
}

/// Complete configuration of a simulation manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub unit_system: UnitSystem,
    pub up_axis: UpAxis,
    pub steps_per_second: f32,
    pub solver: SolverType,
    pub solver_params: SolverParams,
    pub collision_filter: CollisionFilterMode,
    /// Gravity constant in user units.
    pub gravity: f32,
    pub ic: IcSolverParams,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            unit_system: UnitSystem::default(),
            up_axis: UpAxis::default(),
            steps_per_second: DEFAULT_STEPS_PER_SECOND,
            solver: SolverType::default(),
            solver_params: SolverParams::default(),
            collision_filter: CollisionFilterMode::default(),
            gravity: DEFAULT_GRAVITY_CONSTANT,
            ic: IcSolverParams::default(),
        }
    }
}

impl SimulationConfig {
    pub fn with_unit_system(mut self, unit_system: UnitSystem) -> Self {
        self.unit_system = unit_system;
        self
    }

    pub fn with_up_axis(mut self, up_axis: UpAxis) -> Self {
        self.up_axis = up_axis;
        self
    }

    pub fn with_steps_per_second(mut self, steps: f32) -> Self {
        self.steps_per_second = steps;
        self
    }

    pub fn with_solver(mut self, solver: SolverType) -> Self {
        self.solver = solver;
        self
    }

    pub fn with_collision_filter(mut self, filter: CollisionFilterMode) -> Self {
        self.collision_filter = filter;
        self
    }

    pub fn with_gravity(mut self, gravity: f32) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn with_ic(mut self, ic: IcSolverParams) -> Self {
        self.ic = ic.sanitized();
        self
    }

    /// Fixed sub-step length in seconds.
    pub fn fixed_time_step(&self) -> f32 {
        1.0 / self.steps_per_second
    }

    /// Gravity vector in SI units.
    pub fn gravity_vector(&self) -> Vec3 {
        self.up_axis
            .gravity(self.unit_system.acceleration_to_si(self.gravity))
    }

    pub fn sanitized(mut self) -> Self {
        if !(self.steps_per_second > 0.0 && self.steps_per_second.is_finite()) {
            self.steps_per_second = DEFAULT_STEPS_PER_SECOND;
        }
        self.ic = self.ic.sanitized();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn non_positive_ic_params_fall_back_to_defaults() {
        let ic = IcSolverParams::new(true, -1.0, 0, 0.0, 0.0, -5.0);
        assert!(ic.use_gravity);
        assert_relative_eq!(ic.time_step, DEFAULT_IC_TIME_STEP);
        assert_eq!(ic.max_iterations, u32::MAX);
        assert!(ic.max_time.is_infinite());
        assert_relative_eq!(ic.linear_tolerance, DEFAULT_IC_TOLERANCE);
        assert_relative_eq!(ic.angular_tolerance, DEFAULT_IC_TOLERANCE);
    }

    #[test]
    fn gravity_points_down_the_up_axis() {
        let z_up = SimulationConfig::default();
        assert_relative_eq!(z_up.gravity_vector().z, -9.81);
        let y_up = SimulationConfig::default().with_up_axis(UpAxis::Y);
        assert_relative_eq!(y_up.gravity_vector().y, -9.81);
    }

    #[test]
    fn cgs_gravity_is_converted() {
        let cfg = SimulationConfig::default()
            .with_unit_system(UnitSystem::Cgs)
            .with_gravity(981.0);
        assert_relative_eq!(cfg.gravity_vector().z, -9.81, epsilon = 1e-4);
    }

    #[test]
    fn filter_names_parse() {
        assert_eq!("Inclusive".parse::<CollisionFilterMode>().ok(), Some(CollisionFilterMode::Inclusive));
        assert!(matches!(
            "fuzzy".parse::<CollisionFilterMode>(),
            Err(SimulationError::UnknownFilter(_))
        ));
    }
}
