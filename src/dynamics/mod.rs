//! Simulation dynamics: integration, reduced-coordinate multibodies and constraint solving.

pub mod integrator;
pub mod multibody;
pub mod solver;

pub use integrator::Integrator;
pub use multibody::MultibodySolver;
pub use solver::{ConstraintSolver, SolveReport, SolverParams, SolverType};
