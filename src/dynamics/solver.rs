use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::{
    core::{articulations::Multibody, rigidbody::RigidBody, types::Velocity},
    error::SimulationError,
    utils::allocator::{Arena, BodyHandle, MultibodyHandle},
};

/// Back-end used to solve the mixed linear complementarity problem of a step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SolverType {
    /// Projected Gauss-Seidel sweeps that stop once the largest impulse change is
    /// within the tolerance; counts a fallback when the budget runs out first.
    #[default]
    Dantzig,
    /// Fixed-budget projected Gauss-Seidel sweeps.
    ProjectedGaussSeidel,
    /// Projected Gauss-Seidel with twice the sweep budget, stopping on the
    /// complementarity residual; counts a fallback when it fails.
    Lemke,
}

impl FromStr for SolverType {
    type Err = SimulationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dantzig" => Ok(SolverType::Dantzig),
            "pgs" | "projected_gauss_seidel" | "projectedgaussseidel" | "gauss_seidel" => {
                Ok(SolverType::ProjectedGaussSeidel)
            }
            "lemke" => Ok(SolverType::Lemke),
            _ => Err(SimulationError::UnknownSolver(s.to_string())),
        }
    }
}

impl fmt::Display for SolverType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SolverType::Dantzig => "dantzig",
            SolverType::ProjectedGaussSeidel => "pgs",
            SolverType::Lemke => "lemke",
        };
        f.write_str(name)
    }
}

/// Global constraint solver settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverParams {
    pub iterations: u32,
    /// Fraction of position error removed per step through velocity bias.
    pub erp: f32,
    /// Resolve rigid-rigid penetration with pseudo-velocities that never reach the real velocity.
    pub split_impulse: bool,
    pub split_erp: f32,
    /// Convergence threshold for the Dantzig and Lemke back-ends.
    pub tolerance: f32,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            iterations: 100,
            erp: 0.5,
            split_impulse: true,
            split_erp: 1.0,
            tolerance: 1.0e-6,
        }
    }
}

/// One side of a constraint row: `J · u` is that side's contribution to the row velocity.
#[derive(Debug, Clone)]
pub enum JacobianSide {
    Rigid {
        body: BodyHandle,
        linear: Vec3,
        angular: Vec3,
    },
    Link {
        multibody: MultibodyHandle,
        jacobian: Vec<f32>,
        /// `M⁻¹ Jᵀ`
        response: Vec<f32>,
    },
}

impl JacobianSide {
    /// Row of a multibody link for a point velocity along `linear` plus link rotation along `angular`.
    pub fn link(
        multibody: MultibodyHandle,
        mb: &Multibody,
        link: usize,
        point: Vec3,
        linear: Vec3,
        angular: Vec3,
    ) -> Self {
        let jp = mb.point_jacobian(link, point);
        let jw = mb.angular_jacobian(link);
        let jacobian: Vec<f32> = jp
            .iter()
            .zip(jw.iter())
            .map(|(p, w)| linear.dot(*p) + angular.dot(*w))
            .collect();
        let response = match &mb.mass_matrix_inverse {
            Some(inverse) if inverse.rows() == jacobian.len() => inverse.mul_vec(&jacobian),
            _ => vec![0.0; jacobian.len()],
        };
        JacobianSide::Link {
            multibody,
            jacobian,
            response,
        }
    }

    pub fn negated(self) -> Self {
        match self {
            JacobianSide::Rigid {
                body,
                linear,
                angular,
            } => JacobianSide::Rigid {
                body,
                linear: -linear,
                angular: -angular,
            },
            JacobianSide::Link {
                multibody,
                jacobian,
                response,
            } => JacobianSide::Link {
                multibody,
                jacobian: jacobian.iter().map(|j| -j).collect(),
                response: response.iter().map(|r| -r).collect(),
            },
        }
    }

    pub fn is_link(&self) -> bool {
        matches!(self, JacobianSide::Link { .. })
    }
}

/// What produced a row, used to write impulses back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowSource {
    /// `direction` 0 is the normal, 1 and 2 the friction tangents.
    Contact {
        manifold: usize,
        point: usize,
        direction: usize,
    },
    Constraint { index: usize },
}

#[derive(Debug, Clone)]
pub struct SolverRow {
    pub a: Option<JacobianSide>,
    pub b: Option<JacobianSide>,
    /// Target row velocity.
    pub rhs: f32,
    /// Target pseudo-velocity for split-impulse position recovery.
    pub push_rhs: f32,
    pub lower: f32,
    pub upper: f32,
    /// Friction rows track `(normal row index, coefficient)`.
    pub friction: Option<(usize, f32)>,
    pub source: RowSource,
    pub impulse: f32,
    push_impulse: f32,
    inv_denominator: f32,
}

impl SolverRow {
    pub fn new(
        a: Option<JacobianSide>,
        b: Option<JacobianSide>,
        rhs: f32,
        lower: f32,
        upper: f32,
        source: RowSource,
    ) -> Self {
        Self {
            a,
            b,
            rhs,
            push_rhs: 0.0,
            lower,
            upper,
            friction: None,
            source,
            impulse: 0.0,
            push_impulse: 0.0,
            inv_denominator: 0.0,
        }
    }

    pub fn with_push(mut self, push_rhs: f32) -> Self {
        self.push_rhs = push_rhs;
        self
    }

    pub fn with_friction(mut self, normal_row: usize, coefficient: f32) -> Self {
        self.friction = Some((normal_row, coefficient));
        self
    }

    pub fn involves_link(&self) -> bool {
        self.a.as_ref().is_some_and(JacobianSide::is_link)
            || self.b.as_ref().is_some_and(JacobianSide::is_link)
    }
}

/// Mutable velocity state the solver works on.
pub struct SolverBodies<'a> {
    pub rigid: &'a mut Arena<RigidBody, BodyHandle>,
    /// Generalized velocities of every multibody taking part in a row.
    pub links: HashMap<MultibodyHandle, Vec<f32>>,
    /// Split-impulse pseudo-velocities.
    pub push: HashMap<BodyHandle, Velocity>,
}

impl<'a> SolverBodies<'a> {
    pub fn new(rigid: &'a mut Arena<RigidBody, BodyHandle>) -> Self {
        Self {
            rigid,
            links: HashMap::new(),
            push: HashMap::new(),
        }
    }

    fn side_velocity(&self, side: &JacobianSide) -> f32 {
        match side {
            JacobianSide::Rigid {
                body,
                linear,
                angular,
            } => self
                .rigid
                .get(*body)
                .map(|b| b.velocity.linear.dot(*linear) + b.velocity.angular.dot(*angular))
                .unwrap_or(0.0),
            JacobianSide::Link {
                multibody,
                jacobian,
                ..
            } => self
                .links
                .get(multibody)
                .map(|u| u.iter().zip(jacobian).map(|(a, b)| a * b).sum())
                .unwrap_or(0.0),
        }
    }

    fn side_push_velocity(&self, side: &JacobianSide) -> f32 {
        match side {
            JacobianSide::Rigid {
                body,
                linear,
                angular,
            } => self
                .push
                .get(body)
                .map(|p| p.linear.dot(*linear) + p.angular.dot(*angular))
                .unwrap_or(0.0),
            JacobianSide::Link { .. } => 0.0,
        }
    }

    fn side_denominator(&self, side: &JacobianSide) -> f32 {
        match side {
            JacobianSide::Rigid {
                body,
                linear,
                angular,
            } => self
                .rigid
                .get(*body)
                .map(|b| {
                    b.inverse_mass() * linear.length_squared()
                        + angular.dot(b.inverse_inertia_world() * *angular)
                })
                .unwrap_or(0.0),
            JacobianSide::Link {
                jacobian, response, ..
            } => jacobian.iter().zip(response).map(|(j, r)| j * r).sum(),
        }
    }

    fn apply_side(&mut self, side: &JacobianSide, impulse: f32) {
        match side {
            JacobianSide::Rigid {
                body,
                linear,
                angular,
            } => {
                if let Some(b) = self.rigid.get_mut(*body) {
                    if b.is_static {
                        return;
                    }
                    let dw = b.inverse_inertia_world() * *angular * impulse;
                    b.velocity.linear += *linear * b.inverse_mass() * impulse;
                    b.velocity.angular += dw;
                }
            }
            JacobianSide::Link {
                multibody,
                response,
                ..
            } => {
                if let Some(u) = self.links.get_mut(multibody) {
                    for (v, r) in u.iter_mut().zip(response) {
                        *v += r * impulse;
                    }
                }
            }
        }
    }

    fn apply_push_side(&mut self, side: &JacobianSide, impulse: f32) {
        if let JacobianSide::Rigid {
            body,
            linear,
            angular,
        } = side
        {
            let Some(b) = self.rigid.get(*body) else {
                return;
            };
            if b.is_static {
                return;
            }
            let dv = *linear * b.inverse_mass() * impulse;
            let dw = b.inverse_inertia_world() * *angular * impulse;
            let entry = self.push.entry(*body).or_default();
            entry.linear += dv;
            entry.angular += dw;
        }
    }

    fn row_velocity(&self, row: &SolverRow) -> f32 {
        row.a.as_ref().map_or(0.0, |s| self.side_velocity(s))
            + row.b.as_ref().map_or(0.0, |s| self.side_velocity(s))
    }

    fn row_push_velocity(&self, row: &SolverRow) -> f32 {
        row.a.as_ref().map_or(0.0, |s| self.side_push_velocity(s))
            + row.b.as_ref().map_or(0.0, |s| self.side_push_velocity(s))
    }

    fn apply_row(&mut self, row: &SolverRow, impulse: f32) {
        if let Some(side) = &row.a {
            self.apply_side(side, impulse);
        }
        if let Some(side) = &row.b {
            self.apply_side(side, impulse);
        }
    }

    fn apply_push_row(&mut self, row: &SolverRow, impulse: f32) {
        if let Some(side) = &row.a {
            self.apply_push_side(side, impulse);
        }
        if let Some(side) = &row.b {
            self.apply_push_side(side, impulse);
        }
    }
}

/// Outcome of one solve.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct SolveReport {
    pub iterations: u32,
    pub residual: f32,
    pub converged: bool,
    /// The selected back-end failed and the projected Gauss-Seidel result was kept.
    pub fallback: bool,
}

/// Sequential-impulse constraint solver shared by contacts and joints.
#[derive(Debug, Clone)]
pub struct ConstraintSolver {
    pub solver_type: SolverType,
    pub params: SolverParams,
}

impl Default for ConstraintSolver {
    fn default() -> Self {
        Self::new(SolverType::default(), SolverParams::default())
    }
}

impl ConstraintSolver {
    pub fn new(solver_type: SolverType, params: SolverParams) -> Self {
        Self {
            solver_type,
            params,
        }
    }

    pub fn solve(&self, rows: &mut [SolverRow], bodies: &mut SolverBodies) -> SolveReport {
        if rows.is_empty() {
            return SolveReport {
                converged: true,
                ..SolveReport::default()
            };
        }

        for row in rows.iter_mut() {
            let denominator = row.a.as_ref().map_or(0.0, |s| bodies.side_denominator(s))
                + row.b.as_ref().map_or(0.0, |s| bodies.side_denominator(s));
            row.inv_denominator = if denominator > 1e-9 {
                1.0 / denominator
            } else {
                0.0
            };
        }

        let iterations = self.params.iterations.max(1);
        let budget = match self.solver_type {
            SolverType::Lemke => iterations.saturating_mul(2),
            _ => iterations,
        };

        let mut report = SolveReport::default();
        for _ in 0..budget {
            let max_delta = Self::sweep(rows, bodies);
            report.iterations += 1;
            report.residual = match self.solver_type {
                SolverType::Lemke => Self::complementarity_residual(rows, bodies),
                _ => max_delta,
            };
            if self.solver_type != SolverType::ProjectedGaussSeidel
                && report.residual <= self.params.tolerance
            {
                report.converged = true;
                break;
            }
        }
        if self.solver_type == SolverType::ProjectedGaussSeidel {
            report.converged = true;
        }
        report.fallback = !report.converged;

        if self.params.split_impulse && rows.iter().any(|r| r.push_rhs > 0.0) {
            for _ in 0..iterations {
                if Self::push_sweep(rows, bodies) <= self.params.tolerance {
                    break;
                }
            }
        }
        report
    }

    fn sweep(rows: &mut [SolverRow], bodies: &mut SolverBodies) -> f32 {
        let mut max_delta = 0.0f32;
        for i in 0..rows.len() {
            if let Some((normal, mu)) = rows[i].friction {
                let limit = mu * rows[normal].impulse;
                rows[i].lower = -limit;
                rows[i].upper = limit;
            }
            let row = &mut rows[i];
            if row.inv_denominator == 0.0 {
                continue;
            }
            let velocity = bodies.row_velocity(row);
            let delta = (row.rhs - velocity) * row.inv_denominator;
            let updated = (row.impulse + delta).clamp(row.lower, row.upper);
            let applied = updated - row.impulse;
            row.impulse = updated;
            bodies.apply_row(row, applied);
            max_delta = max_delta.max(applied.abs());
        }
        max_delta
    }

    fn push_sweep(rows: &mut [SolverRow], bodies: &mut SolverBodies) -> f32 {
        let mut max_delta = 0.0f32;
        for row in rows.iter_mut() {
            if row.push_rhs <= 0.0 || row.inv_denominator == 0.0 {
                continue;
            }
            let velocity = bodies.row_push_velocity(row);
            let delta = (row.push_rhs - velocity) * row.inv_denominator;
            let updated = (row.push_impulse + delta).max(0.0);
            let applied = updated - row.push_impulse;
            row.push_impulse = updated;
            bodies.apply_push_row(row, applied);
            max_delta = max_delta.max(applied.abs());
        }
        max_delta
    }

    /// Largest violation of the row complementarity conditions.
    fn complementarity_residual(rows: &[SolverRow], bodies: &SolverBodies) -> f32 {
        const EPS: f32 = 1e-7;
        rows.iter()
            .filter(|r| r.inv_denominator > 0.0)
            .map(|row| {
                let error = row.rhs - bodies.row_velocity(row);
                if row.impulse <= row.lower + EPS {
                    error.max(0.0)
                } else if row.impulse >= row.upper - EPS {
                    (-error).max(0.0)
                } else {
                    error.abs()
                }
            })
            .fold(0.0, f32::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{MassProperties, Transform};
    use approx::assert_relative_eq;
    use glam::Mat3;

    fn falling_body(arena: &mut Arena<RigidBody, BodyHandle>, vz: f32) -> BodyHandle {
        let mut body = RigidBody::dynamic(Transform::IDENTITY, MassProperties::new(1.0, Mat3::IDENTITY));
        body.velocity.linear = Vec3::new(0.0, 0.0, vz);
        arena.insert(body)
    }

    fn contact_row(body: BodyHandle) -> SolverRow {
        SolverRow::new(
            Some(JacobianSide::Rigid {
                body,
                linear: Vec3::Z,
                angular: Vec3::ZERO,
            }),
            None,
            0.0,
            0.0,
            f32::INFINITY,
            RowSource::Contact {
                manifold: 0,
                point: 0,
                direction: 0,
            },
        )
    }

    #[test]
    fn contact_row_stops_approaching_body() {
        let mut arena = Arena::new();
        let body = falling_body(&mut arena, -2.0);
        let mut rows = vec![contact_row(body)];
        let solver = ConstraintSolver::new(SolverType::Dantzig, SolverParams::default());
        let mut bodies = SolverBodies::new(&mut arena);
        let report = solver.solve(&mut rows, &mut bodies);
        assert!(report.converged);
        assert_relative_eq!(rows[0].impulse, 2.0, epsilon = 1e-5);
        assert_relative_eq!(arena.get(body).map(|b| b.velocity.linear.z).unwrap_or(1.0), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn contact_row_never_pulls() {
        let mut arena = Arena::new();
        let body = falling_body(&mut arena, 3.0);
        let mut rows = vec![contact_row(body)];
        let solver = ConstraintSolver::new(SolverType::ProjectedGaussSeidel, SolverParams::default());
        solver.solve(&mut rows, &mut SolverBodies::new(&mut arena));
        assert_relative_eq!(rows[0].impulse, 0.0);
    }

    #[test]
    fn friction_is_bounded_by_normal_impulse() {
        let mut arena = Arena::new();
        let mut body = RigidBody::dynamic(Transform::IDENTITY, MassProperties::new(1.0, Mat3::IDENTITY));
        body.velocity.linear = Vec3::new(5.0, 0.0, -1.0);
        let handle = arena.insert(body);
        let mut rows = vec![
            contact_row(handle),
            SolverRow::new(
                Some(JacobianSide::Rigid {
                    body: handle,
                    linear: Vec3::X,
                    angular: Vec3::ZERO,
                }),
                None,
                0.0,
                0.0,
                0.0,
                RowSource::Contact {
                    manifold: 0,
                    point: 0,
                    direction: 1,
                },
            )
            .with_friction(0, 0.5),
        ];
        let solver = ConstraintSolver::new(SolverType::ProjectedGaussSeidel, SolverParams::default());
        solver.solve(&mut rows, &mut SolverBodies::new(&mut arena));
        assert_relative_eq!(rows[1].impulse, -0.5, epsilon = 1e-5);
        let vx = arena.get(handle).map(|b| b.velocity.linear.x).unwrap_or(0.0);
        assert_relative_eq!(vx, 4.5, epsilon = 1e-5);
    }

    #[test]
    fn unknown_solver_name_is_rejected() {
        assert_eq!("pgs".parse::<SolverType>().ok(), Some(SolverType::ProjectedGaussSeidel));
        assert!(matches!(
            "simplex".parse::<SolverType>(),
            Err(SimulationError::UnknownSolver(_))
        ));
    }
}
