use glam::{Quat, Vec3};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use std::collections::HashMap;

use crate::{
    collision::{
        broadphase::{BroadPhase, BroadPhaseProxy},
        contact::{CombinedMaterial, ContactManifold, ContactPoint, ManifoldPoint},
        narrowphase::NarrowPhase,
        queries::{Raycast, RaycastHit, RaycastQuery},
    },
    config::DEFAULT_BROADPHASE_CELL_SIZE,
    core::{
        articulations::Multibody,
        collider::{BodyRef, Collider, ColliderTag},
        constraints::{Constraint, ConstraintKind, HingeMotor},
        rigidbody::RigidBody,
        types::{Aabb, Transform, Velocity},
    },
    dynamics::{
        integrator::Integrator,
        multibody::MultibodySolver,
        solver::{ConstraintSolver, JacobianSide, RowSource, SolveReport, SolverBodies, SolverRow},
    },
    utils::{
        allocator::{Arena, BodyHandle, ColliderHandle, ConstraintHandle, MultibodyHandle},
        logging::ScopedTimer,
        math::{orthonormal_basis, twist_angle},
    },
};

/// Approach speed below which a contact is resting and restitution is ignored.
const RESTITUTION_VELOCITY_THRESHOLD: f32 = 0.2;

/// Penetration left uncorrected so resting contacts stay detected between steps.
const CONTACT_SLOP: f32 = 1.0e-4;

/// What the contact-added hook sees of one collider taking part in a contact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactSide {
    pub collider: ColliderHandle,
    pub tag: Option<ColliderTag>,
    /// World velocity of the body point at the contact (zero for static bodies).
    pub velocity: Vec3,
    pub is_static: bool,
}

/// Callbacks the world invokes synchronously while stepping.
pub trait WorldHooks {
    /// Runs at the start of every internal sub-step, before forces are integrated.
    fn pre_tick(&mut self, _world: &mut DynamicsWorld, _dt: f32) {}

    /// Runs after positions have been integrated.
    fn post_tick(&mut self, _world: &mut DynamicsWorld, _dt: f32) {}

    /// Pair filter consulted once per broad-phase pair.
    fn needs_collision(&self, _a: Option<ColliderTag>, _b: Option<ColliderTag>) -> bool {
        true
    }

    /// Surface coefficients for a freshly generated contact point.
    fn combine(&mut self, _contact: &ContactPoint, _a: &ContactSide, _b: &ContactSide) -> CombinedMaterial {
        CombinedMaterial::FRICTIONLESS
    }
}

/// Hooks that do nothing; contacts are frictionless and inelastic.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl WorldHooks for NoHooks {}

/// Central simulation container orchestrating all subsystems.
pub struct DynamicsWorld {
    pub bodies: Arena<RigidBody, BodyHandle>,
    pub multibodies: Arena<Multibody, MultibodyHandle>,
    pub colliders: Arena<Collider, ColliderHandle>,
    pub constraints: Arena<Constraint, ConstraintHandle>,
    pub solver: ConstraintSolver,
    pub gravity: Vec3,
    time_accumulated: f32,
    broadphase: BroadPhase,
    manifolds: Vec<ContactManifold>,
    last_report: SolveReport,
    fallbacks: u32,
}

impl DynamicsWorld {
    pub fn new(solver: ConstraintSolver) -> Self {
        Self {
            bodies: Arena::new(),
            multibodies: Arena::new(),
            colliders: Arena::new(),
            constraints: Arena::new(),
            solver,
            gravity: Vec3::ZERO,
            time_accumulated: 0.0,
            broadphase: BroadPhase::new(DEFAULT_BROADPHASE_CELL_SIZE),
            manifolds: Vec::new(),
            last_report: SolveReport::default(),
            fallbacks: 0,
        }
    }

    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = gravity;
    }

    pub fn gravity(&self) -> Vec3 {
        self.gravity
    }

    pub fn add_rigid_body(&mut self, body: RigidBody) -> BodyHandle {
        self.bodies.insert(body)
    }

    /// Removes a body together with its colliders and any constraint attached to it.
    pub fn remove_rigid_body(&mut self, handle: BodyHandle) -> Option<RigidBody> {
        let constraints: Vec<_> = self
            .constraints
            .iter()
            .filter(|(_, c)| c.involves(handle))
            .map(|(h, _)| h)
            .collect();
        for h in constraints {
            self.constraints.remove(h);
        }
        self.remove_colliders_of(|body| body == BodyRef::Rigid(handle));
        self.bodies.remove(handle)
    }

    pub fn body(&self, handle: BodyHandle) -> Option<&RigidBody> {
        self.bodies.get(handle)
    }

    pub fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut RigidBody> {
        self.bodies.get_mut(handle)
    }

    pub fn add_multibody(&mut self, multibody: Multibody) -> MultibodyHandle {
        self.multibodies.insert(multibody)
    }

    pub fn remove_multibody(&mut self, handle: MultibodyHandle) -> Option<Multibody> {
        self.remove_colliders_of(|body| matches!(body, BodyRef::Link { multibody, .. } if multibody == handle));
        self.multibodies.remove(handle)
    }

    pub fn multibody(&self, handle: MultibodyHandle) -> Option<&Multibody> {
        self.multibodies.get(handle)
    }

    pub fn multibody_mut(&mut self, handle: MultibodyHandle) -> Option<&mut Multibody> {
        self.multibodies.get_mut(handle)
    }

    pub fn add_collider(&mut self, collider: Collider) -> ColliderHandle {
        self.colliders.insert(collider)
    }

    pub fn remove_collider(&mut self, handle: ColliderHandle) -> Option<Collider> {
        self.colliders.remove(handle)
    }

    pub fn collider(&self, handle: ColliderHandle) -> Option<&Collider> {
        self.colliders.get(handle)
    }

    fn remove_colliders_of(&mut self, mut predicate: impl FnMut(BodyRef) -> bool) {
        let doomed: Vec<_> = self
            .colliders
            .iter()
            .filter(|(_, c)| predicate(c.body))
            .map(|(h, _)| h)
            .collect();
        for h in doomed {
            self.colliders.remove(h);
        }
    }

    pub fn add_constraint(&mut self, constraint: Constraint) -> ConstraintHandle {
        self.constraints.insert(constraint)
    }

    pub fn remove_constraint(&mut self, handle: ConstraintHandle) -> Option<Constraint> {
        self.constraints.remove(handle)
    }

    pub fn constraint(&self, handle: ConstraintHandle) -> Option<&Constraint> {
        self.constraints.get(handle)
    }

    pub fn clear_constraints(&mut self) {
        self.constraints.clear();
    }

    /// Drops every collider and body; constraints should be removed first.
    pub fn clear_bodies(&mut self) {
        self.colliders.clear();
        self.bodies.clear();
        self.multibodies.clear();
        self.manifolds.clear();
    }

    pub fn reset_accumulator(&mut self) {
        self.time_accumulated = 0.0;
    }

    /// Transform of a body's center-of-mass frame.
    pub fn body_transform(&self, body: BodyRef) -> Option<Transform> {
        match body {
            BodyRef::Rigid(h) => self.bodies.get(h).map(|b| b.transform),
            BodyRef::Link { multibody, link } => self
                .multibodies
                .get(multibody)
                .and_then(|mb| mb.world_transforms.get(link).copied()),
        }
    }

    pub fn collider_transform(&self, collider: &Collider) -> Option<Transform> {
        self.body_transform(collider.body)
            .map(|t| collider.world_transform(&t))
    }

    pub fn collider_aabb(&self, handle: ColliderHandle) -> Option<Aabb> {
        let collider = self.colliders.get(handle)?;
        let transform = self.collider_transform(collider)?;
        Some(collider.shape.aabb(&transform))
    }

    pub fn body_is_static(&self, body: BodyRef) -> bool {
        match body {
            BodyRef::Rigid(h) => self.bodies.get(h).map_or(true, |b| b.is_static),
            BodyRef::Link { multibody, link } => self
                .multibodies
                .get(multibody)
                .map_or(true, |mb| {
                    mb.fixed_base && mb.ancestry(link).iter().all(|i| mb.dof_index(*i).is_none())
                }),
        }
    }

    /// World velocity of a point rigidly attached to `body`.
    pub fn point_velocity(&self, body: BodyRef, point: Vec3) -> Vec3 {
        match body {
            BodyRef::Rigid(h) => self
                .bodies
                .get(h)
                .filter(|b| !b.is_static)
                .map(|b| b.velocity_at_point(point))
                .unwrap_or(Vec3::ZERO),
            BodyRef::Link { multibody, link } => self
                .multibodies
                .get(multibody)
                .map(|mb| {
                    let u = mb.generalized_velocity();
                    mb.point_jacobian(link, point)
                        .iter()
                        .zip(u.iter())
                        .map(|(column, v)| *column * *v)
                        .sum()
                })
                .unwrap_or(Vec3::ZERO),
        }
    }

    pub fn clear_forces(&mut self) {
        for body in self.bodies.values_mut() {
            body.clear_forces();
        }
        for mb in self.multibodies.values_mut() {
            mb.clear_forces();
        }
    }

    /// Applies a world-space force at a world-space point of any body.
    pub fn apply_force_at(&mut self, body: BodyRef, force: Vec3, point: Vec3) {
        match body {
            BodyRef::Rigid(h) => {
                if let Some(b) = self.bodies.get_mut(h) {
                    b.apply_force_at(force, point);
                }
            }
            BodyRef::Link { multibody, link } => {
                if let Some(mb) = self.multibodies.get_mut(multibody) {
                    mb.apply_link_force_at(link, force, point);
                }
            }
        }
    }

    pub fn apply_torque(&mut self, body: BodyRef, torque: Vec3) {
        match body {
            BodyRef::Rigid(h) => {
                if let Some(b) = self.bodies.get_mut(h) {
                    b.apply_torque(torque);
                }
            }
            BodyRef::Link { multibody, link } => {
                if let Some(mb) = self.multibodies.get_mut(multibody) {
                    mb.apply_link_torque(link, torque);
                }
            }
        }
    }

    /// Current angle of a hinge constraint relative to its reference orientation.
    pub fn hinge_angle(&self, handle: ConstraintHandle) -> Option<f32> {
        let constraint = self.constraints.get(handle)?;
        let ConstraintKind::Hinge {
            axis_a, reference, ..
        } = &constraint.kind
        else {
            return None;
        };
        let qa = self.bodies.get(constraint.body_a)?.transform.rotation;
        let qb = self.other_rotation(constraint.body_b);
        let relative = qa.inverse() * qb;
        Some(twist_angle(relative * reference.inverse(), *axis_a))
    }

    /// Relative angular velocity of B with respect to A about the hinge axis.
    pub fn hinge_velocity(&self, handle: ConstraintHandle) -> Option<f32> {
        let constraint = self.constraints.get(handle)?;
        let ConstraintKind::Hinge { axis_a, .. } = &constraint.kind else {
            return None;
        };
        let a = self.bodies.get(constraint.body_a)?;
        let wb = constraint
            .body_b
            .and_then(|h| self.bodies.get(h))
            .map(|b| b.velocity.angular)
            .unwrap_or(Vec3::ZERO);
        Some((wb - a.velocity.angular).dot(a.transform.rotation * *axis_a))
    }

    pub fn set_hinge_motor(&mut self, handle: ConstraintHandle, motor: Option<HingeMotor>) -> bool {
        match self.constraints.get_mut(handle).map(|c| &mut c.kind) {
            Some(ConstraintKind::Hinge { motor: slot, .. }) => {
                *slot = motor;
                true
            }
            _ => false,
        }
    }

    fn other_rotation(&self, body: Option<BodyHandle>) -> Quat {
        body.and_then(|h| self.bodies.get(h))
            .map(|b| b.transform.rotation)
            .unwrap_or(Quat::IDENTITY)
    }

    /// Closest non-trigger collider hit by the ray.
    pub fn ray_test(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<RaycastHit> {
        let query = RaycastQuery::new(origin, direction, max_distance);
        self.colliders
            .iter()
            .filter(|(_, c)| !c.is_trigger)
            .filter_map(|(handle, collider)| {
                let transform = self.collider_transform(collider)?;
                let (point, normal, distance) = Raycast::ray_shape(&query, &collider.shape, &transform)?;
                Some(RaycastHit {
                    collider: handle,
                    tag: collider.tag,
                    point,
                    normal,
                    distance,
                })
            })
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }

    /// Non-trigger colliders currently intersecting the given collider.
    pub fn overlapping_colliders(&self, handle: ColliderHandle) -> Vec<ColliderHandle> {
        let Some(collider) = self.colliders.get(handle) else {
            return Vec::new();
        };
        let Some(transform) = self.collider_transform(collider) else {
            return Vec::new();
        };
        let aabb = collider.shape.aabb(&transform);
        self.colliders
            .iter()
            .filter(|(h, other)| *h != handle && !other.is_trigger && other.body != collider.body)
            .filter_map(|(h, other)| {
                let other_transform = self.collider_transform(other)?;
                if !aabb.intersects(&other.shape.aabb(&other_transform)) {
                    return None;
                }
                let touching = !NarrowPhase::collide(&collider.shape, &transform, &other.shape, &other_transform)
                    .is_empty();
                touching.then_some(h)
            })
            .collect()
    }

    /// Contact manifolds produced by the last internal sub-step.
    pub fn manifolds(&self) -> &[ContactManifold] {
        &self.manifolds
    }

    pub fn last_solve_report(&self) -> SolveReport {
        self.last_report
    }

    /// Returns and resets the number of steps where the selected back-end fell back.
    pub fn take_fallbacks(&mut self) -> u32 {
        std::mem::take(&mut self.fallbacks)
    }

    /// Publishes the current body and link transforms as their motion states.
    pub fn synchronize_motion_states(&mut self) {
        for body in self.bodies.values_mut() {
            body.motion_state = body.transform;
        }
        for mb in self.multibodies.values_mut() {
            mb.synchronize_motion_states();
        }
    }

    /// Advances the simulation using a fixed timestep accumulator.
    ///
    /// Runs `floor(accumulated / fixed_dt)` sub-steps capped at `max_substeps`; the
    /// excess time is dropped. With `max_substeps == 0` a single step of `elapsed`
    /// is taken instead. Returns the number of sub-steps executed.
    pub fn step(
        &mut self,
        elapsed: f32,
        max_substeps: u32,
        fixed_dt: f32,
        hooks: &mut dyn WorldHooks,
    ) -> u32 {
        if max_substeps == 0 {
            if elapsed > 0.0 {
                self.internal_step(elapsed, hooks);
                return 1;
            }
            return 0;
        }
        if fixed_dt <= 0.0 {
            return 0;
        }

        self.time_accumulated += elapsed.max(0.0);
        let available = (self.time_accumulated / fixed_dt).floor() as u32;
        self.time_accumulated -= available as f32 * fixed_dt;
        if self.time_accumulated < 0.0 {
            self.time_accumulated = 0.0;
        }
        let substeps = available.min(max_substeps);
        for _ in 0..substeps {
            self.internal_step(fixed_dt, hooks);
        }
        substeps
    }

    fn internal_step(&mut self, dt: f32, hooks: &mut dyn WorldHooks) {
        hooks.pre_tick(self, dt);

        {
            let _timer = ScopedTimer::new("dynamics::velocities");
            for body in self.bodies.values_mut() {
                Integrator::integrate_velocity(body, dt);
            }
            self.integrate_multibody_velocities(dt);
        }

        let mut manifolds = {
            let _timer = ScopedTimer::new("collision::detect");
            self.detect_collisions(hooks)
        };

        let push = {
            let _timer = ScopedTimer::new("solver");
            self.solve(&mut manifolds, dt)
        };

        {
            let _timer = ScopedTimer::new("integrator::positions");
            for (handle, body) in self.bodies.iter_mut() {
                let correction = push.get(&handle).copied().unwrap_or_default();
                Integrator::integrate_position(body, correction, dt);
            }
            for mb in self.multibodies.values_mut() {
                MultibodySolver::integrate_positions(mb, dt);
            }
        }

        self.manifolds = manifolds;
        hooks.post_tick(self, dt);
    }

    #[cfg(feature = "parallel")]
    fn integrate_multibody_velocities(&mut self, dt: f32) {
        let gravity = self.gravity;
        let multibodies: Vec<&mut Multibody> = self.multibodies.values_mut().collect();
        multibodies
            .into_par_iter()
            .for_each(|mb| MultibodySolver::integrate_velocities(mb, gravity, dt));
    }

    #[cfg(not(feature = "parallel"))]
    fn integrate_multibody_velocities(&mut self, dt: f32) {
        let gravity = self.gravity;
        for mb in self.multibodies.values_mut() {
            MultibodySolver::integrate_velocities(mb, gravity, dt);
        }
    }

    fn same_multibody(a: BodyRef, b: BodyRef) -> bool {
        matches!(
            (a, b),
            (BodyRef::Link { multibody: ma, .. }, BodyRef::Link { multibody: mb, .. }) if ma == mb
        )
    }

    fn detect_collisions(&mut self, hooks: &mut dyn WorldHooks) -> Vec<ContactManifold> {
        if self.colliders.len() < 2 {
            return Vec::new();
        }

        let proxies: Vec<BroadPhaseProxy> = self
            .colliders
            .iter()
            .filter_map(|(handle, collider)| {
                let transform = self.collider_transform(collider)?;
                Some(BroadPhaseProxy {
                    handle,
                    aabb: collider.shape.aabb(&transform),
                    bounded: collider.shape.is_bounded(),
                })
            })
            .collect();
        let pairs = self.broadphase.potential_pairs(&proxies);

        let mut manifolds = Vec::new();
        for (handle_a, handle_b) in pairs {
            let (Some(collider_a), Some(collider_b)) =
                (self.colliders.get(handle_a), self.colliders.get(handle_b))
            else {
                continue;
            };
            if collider_a.is_trigger || collider_b.is_trigger {
                continue;
            }
            if collider_a.body == collider_b.body || Self::same_multibody(collider_a.body, collider_b.body) {
                continue;
            }
            let static_a = self.body_is_static(collider_a.body);
            let static_b = self.body_is_static(collider_b.body);
            if static_a && static_b {
                continue;
            }
            if !hooks.needs_collision(collider_a.tag, collider_b.tag) {
                continue;
            }

            let (Some(body_a), Some(body_b)) = (
                self.body_transform(collider_a.body),
                self.body_transform(collider_b.body),
            ) else {
                continue;
            };
            let transform_a = collider_a.world_transform(&body_a);
            let transform_b = collider_b.world_transform(&body_b);
            let points = NarrowPhase::collide(&collider_a.shape, &transform_a, &collider_b.shape, &transform_b);
            if points.is_empty() {
                continue;
            }

            let mut manifold = ContactManifold::new(handle_a, handle_b);
            for mut contact in points {
                contact.local_on_a = contact.world_on_a - body_a.position;
                contact.local_on_b = contact.world_on_b - body_b.position;
                let side_a = ContactSide {
                    collider: handle_a,
                    tag: collider_a.tag,
                    velocity: self.point_velocity(collider_a.body, contact.world_on_a),
                    is_static: static_a,
                };
                let side_b = ContactSide {
                    collider: handle_b,
                    tag: collider_b.tag,
                    velocity: self.point_velocity(collider_b.body, contact.world_on_b),
                    is_static: static_b,
                };
                let material = hooks.combine(&contact, &side_a, &side_b);
                manifold.points.push(ManifoldPoint {
                    contact,
                    material,
                    normal_impulse: 0.0,
                    tangent_impulse: [0.0; 2],
                });
            }
            manifolds.push(manifold);
        }
        manifolds
    }

    fn side_jacobian(&self, body: BodyRef, point: Vec3, direction: Vec3) -> Option<JacobianSide> {
        match body {
            BodyRef::Rigid(handle) => {
                let b = self.bodies.get(handle)?;
                if b.is_static {
                    return None;
                }
                Some(JacobianSide::Rigid {
                    body: handle,
                    linear: direction,
                    angular: (point - b.transform.position).cross(direction),
                })
            }
            BodyRef::Link { multibody, link } => {
                let mb = self.multibodies.get(multibody)?;
                Some(JacobianSide::link(multibody, mb, link, point, direction, Vec3::ZERO))
            }
        }
    }

    fn contact_rows(&self, manifolds: &[ContactManifold], dt: f32, rows: &mut Vec<SolverRow>) {
        let params = self.solver.params;
        for (mi, manifold) in manifolds.iter().enumerate() {
            let (Some(collider_a), Some(collider_b)) = (
                self.colliders.get(manifold.collider_a),
                self.colliders.get(manifold.collider_b),
            ) else {
                continue;
            };
            for (pi, point) in manifold.points.iter().enumerate() {
                let c = &point.contact;
                let n = c.normal;
                let side_a = self.side_jacobian(collider_a.body, c.world_on_a, n);
                let side_b = self
                    .side_jacobian(collider_b.body, c.world_on_b, n)
                    .map(JacobianSide::negated);
                let links = side_a.as_ref().is_some_and(JacobianSide::is_link)
                    || side_b.as_ref().is_some_and(JacobianSide::is_link);

                let approach = (self.point_velocity(collider_a.body, c.world_on_a)
                    - self.point_velocity(collider_b.body, c.world_on_b))
                .dot(n);
                let bounce = if approach < -RESTITUTION_VELOCITY_THRESHOLD {
                    -point.material.restitution * approach
                } else {
                    0.0
                };
                let depth = (c.depth - CONTACT_SLOP).max(0.0);
                let split = params.split_impulse && !links;
                let bias = if split { 0.0 } else { params.erp * depth / dt };
                let push = if split { params.split_erp * depth / dt } else { 0.0 };

                let normal_row = rows.len();
                rows.push(
                    SolverRow::new(
                        side_a,
                        side_b,
                        bounce + bias,
                        0.0,
                        f32::INFINITY,
                        RowSource::Contact {
                            manifold: mi,
                            point: pi,
                            direction: 0,
                        },
                    )
                    .with_push(push),
                );

                let mu = point.material.friction;
                if mu <= 0.0 {
                    continue;
                }
                let (t1, t2) = orthonormal_basis(n);
                for (k, tangent) in [t1, t2].into_iter().enumerate() {
                    let a = self.side_jacobian(collider_a.body, c.world_on_a, tangent);
                    let b = self
                        .side_jacobian(collider_b.body, c.world_on_b, tangent)
                        .map(JacobianSide::negated);
                    rows.push(
                        SolverRow::new(
                            a,
                            b,
                            0.0,
                            0.0,
                            0.0,
                            RowSource::Contact {
                                manifold: mi,
                                point: pi,
                                direction: k + 1,
                            },
                        )
                        .with_friction(normal_row, mu),
                    );
                }
            }
        }
    }

    fn rigid_side(&self, handle: BodyHandle, linear: Vec3, angular: Vec3) -> Option<JacobianSide> {
        let b = self.bodies.get(handle)?;
        (!b.is_static).then_some(JacobianSide::Rigid {
            body: handle,
            linear,
            angular,
        })
    }

    fn constraint_rows(&self, dt: f32, rows: &mut Vec<SolverRow>) {
        let erp = self.solver.params.erp;
        for (index, (_, constraint)) in self.constraints.iter().enumerate() {
            let Some(body_a) = self.bodies.get(constraint.body_a) else {
                continue;
            };
            let xa = body_a.transform;
            let xb = match constraint.body_b {
                Some(h) => match self.bodies.get(h) {
                    Some(b) => b.transform,
                    None => continue,
                },
                None => Transform::IDENTITY,
            };
            let source = RowSource::Constraint { index };

            let linear_lock = |pivot_a: Vec3, pivot_b: Vec3, rows: &mut Vec<SolverRow>| {
                let pa = xa.transform_point(pivot_a);
                let pb = xb.transform_point(pivot_b);
                let ra = pa - xa.position;
                let rb = pb - xb.position;
                let error = pa - pb;
                for axis in [Vec3::X, Vec3::Y, Vec3::Z] {
                    let a = self.rigid_side(constraint.body_a, axis, ra.cross(axis));
                    let b = constraint
                        .body_b
                        .and_then(|h| self.rigid_side(h, -axis, -rb.cross(axis)));
                    rows.push(SolverRow::new(
                        a,
                        b,
                        -erp * error.dot(axis) / dt,
                        f32::NEG_INFINITY,
                        f32::INFINITY,
                        source,
                    ));
                }
            };
            let angular_row = |axis: Vec3, rhs: f32, lower: f32, upper: f32| {
                let a = self.rigid_side(constraint.body_a, Vec3::ZERO, axis);
                let b = constraint
                    .body_b
                    .and_then(|h| self.rigid_side(h, Vec3::ZERO, -axis));
                SolverRow::new(a, b, rhs, lower, upper, source)
            };

            match &constraint.kind {
                ConstraintKind::Point { pivot_a, pivot_b } => linear_lock(*pivot_a, *pivot_b, rows),
                ConstraintKind::Fixed {
                    pivot_a,
                    pivot_b,
                    relative_rotation,
                } => {
                    linear_lock(*pivot_a, *pivot_b, rows);
                    let dq = xa.rotation * *relative_rotation * xb.rotation.inverse();
                    let sign = if dq.w < 0.0 { -1.0 } else { 1.0 };
                    let error = 2.0 * sign * Vec3::new(dq.x, dq.y, dq.z);
                    for axis in [Vec3::X, Vec3::Y, Vec3::Z] {
                        rows.push(angular_row(
                            axis,
                            -erp * error.dot(axis) / dt,
                            f32::NEG_INFINITY,
                            f32::INFINITY,
                        ));
                    }
                }
                ConstraintKind::Hinge {
                    pivot_a,
                    pivot_b,
                    axis_a,
                    axis_b,
                    motor,
                    ..
                } => {
                    linear_lock(*pivot_a, *pivot_b, rows);
                    let axis_a_world = (xa.rotation * *axis_a).normalize_or_zero();
                    let axis_b_world = (xb.rotation * *axis_b).normalize_or_zero();
                    let misalignment = axis_a_world.cross(axis_b_world);
                    let (t1, t2) = orthonormal_basis(axis_a_world);
                    for t in [t1, t2] {
                        rows.push(angular_row(
                            t,
                            erp * misalignment.dot(t) / dt,
                            f32::NEG_INFINITY,
                            f32::INFINITY,
                        ));
                    }
                    if let Some(motor) = motor {
                        rows.push(angular_row(
                            axis_a_world,
                            -motor.target_velocity,
                            -motor.max_impulse,
                            motor.max_impulse,
                        ));
                    }
                }
            }
        }
    }

    /// Solves contacts and constraints; returns split-impulse pseudo-velocities.
    fn solve(&mut self, manifolds: &mut [ContactManifold], dt: f32) -> HashMap<BodyHandle, Velocity> {
        let mut rows = Vec::new();
        self.constraint_rows(dt, &mut rows);
        self.contact_rows(manifolds, dt, &mut rows);
        if rows.is_empty() {
            self.last_report = SolveReport {
                converged: true,
                ..SolveReport::default()
            };
            return HashMap::new();
        }

        let mut links = HashMap::new();
        for row in &rows {
            for side in [&row.a, &row.b].into_iter().flatten() {
                if let JacobianSide::Link { multibody, .. } = side {
                    if let Some(mb) = self.multibodies.get(*multibody) {
                        links
                            .entry(*multibody)
                            .or_insert_with(|| mb.generalized_velocity());
                    }
                }
            }
        }

        let solver = self.solver.clone();
        let (report, links, push) = {
            let mut bodies = SolverBodies::new(&mut self.bodies);
            bodies.links = links;
            let report = solver.solve(&mut rows, &mut bodies);
            (report, bodies.links, bodies.push)
        };

        for (handle, u) in links {
            if let Some(mb) = self.multibodies.get_mut(handle) {
                mb.set_generalized_velocity(&u);
            }
        }
        for row in &rows {
            if let RowSource::Contact {
                manifold,
                point,
                direction,
            } = row.source
            {
                if let Some(p) = manifolds.get_mut(manifold).and_then(|m| m.points.get_mut(point)) {
                    match direction {
                        0 => p.normal_impulse = row.impulse,
                        d => p.tangent_impulse[d - 1] = row.impulse,
                    }
                }
            }
        }

        if report.fallback {
            self.fallbacks += 1;
        }
        self.last_report = report;
        push
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        articulations::{JointKind, Link},
        collider::ColliderShape,
        types::MassProperties,
    };
    use crate::dynamics::solver::{SolverParams, SolverType};
    use approx::assert_relative_eq;
    use glam::Mat3;

    fn world() -> DynamicsWorld {
        let mut world = DynamicsWorld::new(ConstraintSolver::new(
            SolverType::ProjectedGaussSeidel,
            SolverParams::default(),
        ));
        world.set_gravity(Vec3::new(0.0, 0.0, -9.81));
        world
    }

    fn ground(world: &mut DynamicsWorld) {
        let body = world.add_rigid_body(RigidBody::fixed(Transform::IDENTITY));
        world.add_collider(Collider::new(BodyRef::Rigid(body), ColliderShape::plane(Vec3::Z)));
    }

    struct Gravity;

    impl WorldHooks for Gravity {
        fn pre_tick(&mut self, world: &mut DynamicsWorld, _dt: f32) {
            let g = world.gravity();
            for body in world.bodies.values_mut() {
                let m = body.mass_properties.mass;
                body.apply_central_force(g * m);
            }
        }
    }

    #[test]
    fn accumulator_runs_whole_substeps_only() {
        let mut world = world();
        let mut hooks = NoHooks;
        assert_eq!(world.step(0.015, 10, 0.01, &mut hooks), 1);
        assert_eq!(world.step(0.006, 10, 0.01, &mut hooks), 1);
        assert_eq!(world.step(1.0, 5, 0.01, &mut hooks), 5);
    }

    #[test]
    fn rigid_bodies_ignore_world_gravity_without_hooks() {
        let mut world = world();
        let h = world.add_rigid_body(RigidBody::dynamic(
            Transform::from_translation(Vec3::Z),
            MassProperties::new(1.0, Mat3::IDENTITY),
        ));
        world.step(0.1, 10, 0.01, &mut NoHooks);
        assert_relative_eq!(world.body(h).map(|b| b.transform.position.z).unwrap_or(0.0), 1.0);
    }

    #[test]
    fn sphere_comes_to_rest_on_ground() {
        let mut world = world();
        ground(&mut world);
        let props = ColliderShape::sphere(0.5).mass_properties(1000.0);
        let h = world.add_rigid_body(RigidBody::dynamic(Transform::from_translation(Vec3::Z), props));
        world.add_collider(Collider::new(BodyRef::Rigid(h), ColliderShape::sphere(0.5)));
        let mut hooks = Gravity;
        for _ in 0..300 {
            world.step(0.005, 1, 0.005, &mut hooks);
        }
        let body = world.body(h).expect("body");
        assert_relative_eq!(body.transform.position.z, 0.5, epsilon = 0.02);
        assert!(body.velocity.linear.length() < 0.05);
    }

    struct BouncyGravity;

    impl WorldHooks for BouncyGravity {
        fn pre_tick(&mut self, world: &mut DynamicsWorld, dt: f32) {
            Gravity.pre_tick(world, dt);
        }

        fn combine(&mut self, _contact: &ContactPoint, _a: &ContactSide, _b: &ContactSide) -> CombinedMaterial {
            CombinedMaterial {
                friction: 0.5,
                restitution: 0.5,
                ..CombinedMaterial::FRICTIONLESS
            }
        }
    }

    #[test]
    fn bouncing_ball_settles_to_zero_velocity() {
        let mut world = world();
        ground(&mut world);
        let props = ColliderShape::sphere(0.1).mass_properties(1000.0);
        let h = world.add_rigid_body(RigidBody::dynamic(
            Transform::from_translation(Vec3::new(0.0, 0.0, 0.3)),
            props,
        ));
        world.add_collider(Collider::new(BodyRef::Rigid(h), ColliderShape::sphere(0.1)));
        let mut hooks = BouncyGravity;
        for _ in 0..2000 {
            world.step(0.001, 1, 0.001, &mut hooks);
        }
        for _ in 0..50 {
            world.step(0.001, 1, 0.001, &mut hooks);
            let body = world.body(h).expect("body");
            assert!(body.velocity.linear.length() < 1e-4, "{:?}", body.velocity);
            assert!(body.velocity.angular.length() < 1e-4);
            assert_relative_eq!(body.transform.position.z, 0.1, epsilon = 1e-3);
        }
    }

    #[test]
    fn resting_box_stays_still_under_gravity() {
        let mut world = world();
        ground(&mut world);
        let props = ColliderShape::cuboid(Vec3::splat(0.1)).mass_properties(700.0);
        let h = world.add_rigid_body(RigidBody::dynamic(
            Transform::from_translation(Vec3::new(0.0, 0.0, 0.1)),
            props,
        ));
        world.add_collider(Collider::new(BodyRef::Rigid(h), ColliderShape::cuboid(Vec3::splat(0.1))));
        let mut hooks = BouncyGravity;
        for _ in 0..200 {
            world.step(0.001, 1, 0.001, &mut hooks);
        }
        let body = world.body(h).expect("body");
        assert!(body.velocity.linear.length() < 1e-4, "{:?}", body.velocity);
        assert!(body.velocity.angular.length() < 1e-4);
    }

    #[test]
    fn fixed_base_pendulum_swings_under_gravity() {
        let mut world = world();
        let mut mb = Multibody::new(
            Link::base("base", MassProperties::new(1.0, Mat3::IDENTITY)),
            Transform::from_translation(Vec3::new(0.0, 0.0, 2.0)),
            true,
        );
        mb.add_link(Link {
            name: "arm".into(),
            parent: Some(0),
            joint: JointKind::Revolute { axis: Vec3::Y },
            q_index: 0,
            parent_to_joint: Transform::IDENTITY,
            joint_to_link: Transform::from_translation(Vec3::X),
            mass_properties: MassProperties::new(1.0, Mat3::IDENTITY * 0.01),
            limits: None,
        })
        .expect("parent exists");
        let h = world.add_multibody(mb);
        world.step(0.1, 10, 0.01, &mut NoHooks);
        let mb = world.multibody(h).expect("multibody");
        assert!(mb.q[0].abs() > 1e-3);
        assert!(mb.world_transforms[1].position.z < 2.0);
    }

    #[test]
    fn ray_test_reports_closest_hit() {
        let mut world = world();
        ground(&mut world);
        let h = world.add_rigid_body(RigidBody::dynamic(
            Transform::from_translation(Vec3::new(0.0, 0.0, 2.0)),
            MassProperties::default(),
        ));
        let sphere = world.add_collider(Collider::new(BodyRef::Rigid(h), ColliderShape::sphere(0.5)));
        let hit = world
            .ray_test(Vec3::new(0.0, 0.0, 10.0), -Vec3::Z, 100.0)
            .expect("hit");
        assert_eq!(hit.collider, sphere);
        assert_relative_eq!(hit.distance, 7.5, epsilon = 1e-4);
    }

    #[test]
    fn hinge_motor_spins_body() {
        let mut world = world();
        let h = world.add_rigid_body(RigidBody::dynamic(Transform::IDENTITY, MassProperties::default()));
        let c = world.add_constraint(Constraint::new(
            h,
            None,
            ConstraintKind::Hinge {
                pivot_a: Vec3::ZERO,
                pivot_b: Vec3::ZERO,
                axis_a: Vec3::Z,
                axis_b: Vec3::Z,
                reference: Quat::IDENTITY,
                motor: Some(HingeMotor {
                    target_velocity: -1.0,
                    max_impulse: 100.0,
                }),
            },
        ));
        world.step(0.1, 10, 0.01, &mut NoHooks);
        // B is the world, so A turns at +1 rad/s relative to it.
        let angle = world.hinge_angle(c).expect("hinge");
        assert_relative_eq!(angle, -0.1, epsilon = 1e-2);
    }
}
