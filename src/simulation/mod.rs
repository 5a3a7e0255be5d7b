//! The simulation manager: owns the dynamics world and every scene object,
//! settles initial conditions and drives the fixed-step tick pipeline.

pub mod combiner;
pub mod contacts;
pub mod ic;
pub mod pipeline;
pub mod scene;

use std::time::{Duration, Instant};

use glam::Vec3;
use log::{debug, error, info, warn};

use crate::actuators::Actuator;
use crate::config::{CollisionFilterMode, IcSolverParams, SimulationConfig, IC_TOLERANCE_SCALE, MAX_SUBSTEPS};
use crate::controllers::Controller;
use crate::core::{collider::BodyRef, types::Aabb, types::Transform};
use crate::dynamics::solver::ConstraintSolver;
use crate::entities::{ArticulatedEntity, Entity, SettlingTolerance};
use crate::error::{logged, Result, SimulationError};
use crate::joints::Joint;
use crate::materials::MaterialTable;
use crate::mount::Mount;
use crate::sensors::Sensor;
use crate::utils::allocator::{ActuatorId, ContactId, ControllerId, EntityId, JointId, SensorId};
use crate::utils::logging::{warn_if_slower_than_realtime, ScopedTimer};
use crate::views::{Light, SharedLight, SharedView, View};
use crate::world::DynamicsWorld;

use self::combiner::{MaterialCombiner, SmoothFrictionCombiner};
use self::contacts::{CollisionFilter, Contact};
use self::ic::{IcFailure, IcPhase};
use self::pipeline::TickHooks;
use self::scene::Scene;

/// Maximum distance of a picking ray (m).
const PICK_RANGE: f32 = 10_000.0;

/// Orchestrates a robotic scene on top of a [`DynamicsWorld`].
pub struct SimulationManager {
    config: SimulationConfig,
    world: Option<DynamicsWorld>,
    scene: Scene,
    combiner: Box<dyn MaterialCombiner>,
    phase: IcPhase,
    ic_iterations: u32,
    last_advance_us: Option<u64>,
    physics_time: Duration,
    mlcp_fallbacks: u64,
    views: Vec<SharedView>,
    lights: Vec<SharedLight>,
}

impl Default for SimulationManager {
    fn default() -> Self {
        Self::new(SimulationConfig::default())
    }
}

impl SimulationManager {
    /// Creates a manager without a world; call [`initialize`](Self::initialize) next.
    pub fn new(config: SimulationConfig) -> Self {
        let config = config.sanitized();
        Self {
            scene: Scene {
                filter: CollisionFilter::new(config.collision_filter),
                ..Scene::default()
            },
            config,
            world: None,
            combiner: Box::new(SmoothFrictionCombiner::default()),
            phase: IcPhase::NotStarted,
            ic_iterations: 0,
            last_advance_us: None,
            physics_time: Duration::ZERO,
            mlcp_fallbacks: 0,
            views: Vec::new(),
            lights: Vec::new(),
        }
    }

    /// Replaces the contact material rule.
    pub fn set_combiner(&mut self, combiner: Box<dyn MaterialCombiner>) {
        self.combiner = combiner;
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn world(&self) -> Option<&DynamicsWorld> {
        self.world.as_ref()
    }

    pub fn world_mut(&mut self) -> Option<&mut DynamicsWorld> {
        self.world.as_mut()
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    // ---- lifecycle ---------------------------------------------------------

    /// Builds a fresh dynamics world from the configuration.
    pub fn initialize(&mut self) {
        if self.world.is_some() {
            warn!("Simulation already initialized; destroying the previous scenario");
            self.destroy_scenario();
        }
        let mut world = DynamicsWorld::new(ConstraintSolver::new(self.config.solver, self.config.solver_params));
        world.set_gravity(self.config.gravity_vector());
        self.world = Some(world);
        self.scene.filter = CollisionFilter::new(self.config.collision_filter);
        self.scene.time = 0.0;
        self.phase = IcPhase::NotStarted;
        info!(
            "Simulation initialized: {} solver, {} collision filtering, {} steps/s",
            self.config.solver, self.config.collision_filter, self.config.steps_per_second
        );
    }

    pub fn is_initialized(&self) -> bool {
        self.world.is_some()
    }

    /// Tears down the world and every scene object. Safe without a world.
    pub fn destroy_scenario(&mut self) {
        if let Some(mut world) = self.world.take() {
            world.clear_constraints();
            world.clear_bodies();
        }
        self.scene.clear_objects();
        self.views.clear();
        self.lights.clear();
        self.scene.materials.clear();
        self.phase = IcPhase::NotStarted;
        self.ic_iterations = 0;
        self.last_advance_us = None;
        self.physics_time = Duration::ZERO;
        self.mlcp_fallbacks = 0;
        debug!("Scenario destroyed");
    }

    /// Destroys the scenario, builds a fresh world and runs `build` on it.
    pub fn restart_scenario<F>(&mut self, build: F) -> Result<()>
    where
        F: FnOnce(&mut SimulationManager) -> Result<()>,
    {
        self.destroy_scenario();
        self.initialize();
        logged(build(self))?;
        info!("Scenario built with {} entities", self.scene.entities.len());
        Ok(())
    }

    /// Resets timers, settles initial conditions and starts the controllers.
    pub fn start_simulation(&mut self) -> bool {
        if self.world.is_none() {
            error!("{}", SimulationError::NoWorld);
            return false;
        }
        self.scene.time = 0.0;
        self.last_advance_us = None;
        self.physics_time = Duration::ZERO;
        self.mlcp_fallbacks = 0;
        for controller in self.scene.controllers.values_mut() {
            controller.reset();
        }
        for sensor in self.scene.sensors.values_mut() {
            sensor.reset();
        }

        if !self.solve_ic_problem() {
            return false;
        }
        for controller in self.scene.controllers.values_mut() {
            controller.start();
        }
        true
    }

    /// Steps the scene with the settling tick until everything is at rest.
    ///
    /// Returns false when the iteration or wall-time budget runs out.
    pub fn solve_ic_problem(&mut self) -> bool {
        let Some(world) = self.world.as_mut() else {
            error!("{}", SimulationError::NoWorld);
            return false;
        };
        let ic = self.config.ic;
        let gravity = self.config.gravity_vector();
        let tolerance = SettlingTolerance {
            linear: self.config.unit_system.length_to_si(ic.linear_tolerance) * IC_TOLERANCE_SCALE,
            angular: ic.angular_tolerance * IC_TOLERANCE_SCALE,
        };

        world.set_gravity(if ic.use_gravity { gravity } else { Vec3::ZERO });
        world.reset_accumulator();
        self.scene.time = 0.0;
        self.phase = IcPhase::Settling;

        let start = Instant::now();
        let mut iterations: u64 = 0;
        let outcome = {
            let _timer = ScopedTimer::new("simulation::ic");
            let mut hooks = TickHooks::settling(&mut self.scene, &*self.combiner, ic.use_gravity, tolerance);
            loop {
                if iterations > u64::from(ic.max_iterations) {
                    break Err(IcFailure::IterationLimitExceeded);
                }
                if start.elapsed().as_secs_f64() > ic.max_time {
                    break Err(IcFailure::TimeLimitExceeded);
                }
                world.step(ic.time_step, 1, ic.time_step, &mut hooks);
                iterations += 1;
                if hooks.is_settled() {
                    break Ok(());
                }
            }
        };
        self.ic_iterations = u32::try_from(iterations).unwrap_or(u32::MAX);
        world.reset_accumulator();
        world.set_gravity(gravity);

        match outcome {
            Ok(()) => {
                world.synchronize_motion_states();
                self.scene.time = 0.0;
                self.phase = IcPhase::Solved;
                info!(
                    "IC problem solved with {} iterations in {:.3} s",
                    iterations,
                    start.elapsed().as_secs_f64()
                );
                true
            }
            Err(failure) => {
                self.phase = IcPhase::Failed(failure);
                match failure {
                    IcFailure::IterationLimitExceeded => {
                        error!("IC problem not solved! Reached maximum iteration count.")
                    }
                    IcFailure::TimeLimitExceeded => error!("IC problem not solved! Reached time limit."),
                }
                false
            }
        }
    }

    /// Advances the simulation to the wall-clock timestamp `time_us` (microseconds).
    ///
    /// The first call only records the timestamp. Timestamps are compared with
    /// wrap-around so a counter rolling over still yields a positive span.
    /// Returns the number of sub-steps run.
    pub fn advance_simulation(&mut self, time_us: u64) -> u32 {
        if !self.phase.is_solved() {
            return 0;
        }
        let Some(world) = self.world.as_mut() else {
            return 0;
        };
        let elapsed_us = match self.last_advance_us {
            Some(previous) => time_us.wrapping_sub(previous),
            None => 0,
        };
        self.last_advance_us = Some(time_us);

        let start = Instant::now();
        let steps = {
            let mut hooks = TickHooks::running(&mut self.scene, &*self.combiner);
            world.step(
                (elapsed_us as f64 / 1.0e6) as f32,
                MAX_SUBSTEPS,
                self.config.fixed_time_step(),
                &mut hooks,
            )
        };
        self.physics_time = start.elapsed();
        if steps > 0 {
            let simulated = Duration::from_secs_f64(f64::from(steps) * f64::from(self.config.fixed_time_step()));
            warn_if_slower_than_realtime(self.physics_time, simulated);
        }

        let fallbacks = world.take_fallbacks();
        if fallbacks > 0 {
            self.mlcp_fallbacks += u64::from(fallbacks);
            info!("MLCP solver failed {fallbacks} times");
        }
        steps
    }

    /// Stops every controller; the world keeps its state.
    pub fn stop_simulation(&mut self) {
        for controller in self.scene.controllers.values_mut() {
            controller.stop();
        }
        info!("Simulation stopped at t = {:.3} s", self.scene.time);
    }

    // ---- settings and diagnostics -----------------------------------------

    pub fn ic_phase(&self) -> IcPhase {
        self.phase
    }

    /// Steps taken by the last IC solve.
    pub fn ic_iterations(&self) -> u32 {
        self.ic_iterations
    }

    /// Simulated time in seconds.
    pub fn simulation_time(&self) -> f64 {
        self.scene.time
    }

    /// Wall-clock duration of the last `advance_simulation` step.
    pub fn physics_time(&self) -> Duration {
        self.physics_time
    }

    pub fn mlcp_fallbacks(&self) -> u64 {
        self.mlcp_fallbacks
    }

    pub fn steps_per_second(&self) -> f32 {
        self.config.steps_per_second
    }

    /// Non-positive rates are ignored.
    pub fn set_steps_per_second(&mut self, steps: f32) {
        if steps > 0.0 && steps.is_finite() {
            self.config.steps_per_second = steps;
        } else {
            warn!("Ignoring invalid step rate {steps}");
        }
    }

    /// Sets the gravity constant in user units.
    pub fn set_gravity(&mut self, gravity: f32) {
        self.config.gravity = gravity;
        let vector = self.config.gravity_vector();
        if let Some(world) = self.world.as_mut() {
            if !self.phase.is_settling() {
                world.set_gravity(vector);
            }
        }
    }

    pub fn gravity(&self) -> Vec3 {
        self.config.gravity_vector()
    }

    pub fn set_ic_solver_params(&mut self, params: IcSolverParams) {
        self.config.ic = params.sanitized();
    }

    pub fn ic_solver_params(&self) -> IcSolverParams {
        self.config.ic
    }

    pub fn materials(&self) -> &MaterialTable {
        &self.scene.materials
    }

    pub fn materials_mut(&mut self) -> &mut MaterialTable {
        &mut self.scene.materials
    }

    // ---- registration ------------------------------------------------------

    pub fn add_entity<E: Entity + 'static>(&mut self, entity: E) -> Result<EntityId> {
        self.add_boxed_entity(Box::new(entity))
    }

    /// Registers an entity with the world and takes ownership of it.
    pub fn add_boxed_entity(&mut self, entity: Box<dyn Entity>) -> Result<EntityId> {
        logged(self.register_entity(entity))
    }

    fn register_entity(&mut self, mut entity: Box<dyn Entity>) -> Result<EntityId> {
        let world = self.world.as_mut().ok_or(SimulationError::NoWorld)?;
        if entity.is_registered() {
            return Err(SimulationError::AlreadyRegistered(entity.name().to_string()));
        }
        if self.scene.entity_id(entity.name()).is_some() {
            return Err(SimulationError::DuplicateName(entity.name().to_string()));
        }
        let id = self.scene.entities.next_id();
        entity.register(world, id)?;
        debug!("Registered {:?} entity '{}' as {id}", entity.entity_type(), entity.name());
        Ok(self.scene.entities.insert(entity))
    }

    /// Places an articulated entity's frame at `origin` and registers it.
    pub fn add_articulated_entity(&mut self, mut entity: ArticulatedEntity, origin: Transform) -> Result<EntityId> {
        entity.set_placement(origin);
        self.add_entity(entity)
    }

    pub fn add_joint<J: Joint + 'static>(&mut self, joint: J) -> Result<JointId> {
        self.add_boxed_joint(Box::new(joint))
    }

    pub fn add_boxed_joint(&mut self, joint: Box<dyn Joint>) -> Result<JointId> {
        logged(self.register_joint(joint))
    }

    fn register_joint(&mut self, mut joint: Box<dyn Joint>) -> Result<JointId> {
        let world = self.world.as_mut().ok_or(SimulationError::NoWorld)?;
        if self.scene.joint_id(joint.name()).is_some() {
            return Err(SimulationError::DuplicateName(joint.name().to_string()));
        }
        let entities = &self.scene.entities;
        let resolve = |id: EntityId| match entities.get(id)?.body(None)? {
            BodyRef::Rigid(handle) => Some(handle),
            BodyRef::Link { .. } => None,
        };
        joint.register(world, &resolve)?;
        Ok(self.scene.joints.insert(joint))
    }

    pub fn add_sensor<S: Sensor + 'static>(&mut self, sensor: S) -> Result<SensorId> {
        self.add_boxed_sensor(Box::new(sensor))
    }

    pub fn add_boxed_sensor(&mut self, sensor: Box<dyn Sensor>) -> Result<SensorId> {
        if self.scene.sensor_id(sensor.name()).is_some() {
            return logged(Err(SimulationError::DuplicateName(sensor.name().to_string())));
        }
        Ok(self.scene.sensors.insert(sensor))
    }

    pub fn add_actuator<A: Actuator + 'static>(&mut self, actuator: A) -> Result<ActuatorId> {
        self.add_boxed_actuator(Box::new(actuator))
    }

    pub fn add_boxed_actuator(&mut self, actuator: Box<dyn Actuator>) -> Result<ActuatorId> {
        if self.scene.actuator_id(actuator.name()).is_some() {
            return logged(Err(SimulationError::DuplicateName(actuator.name().to_string())));
        }
        Ok(self.scene.actuators.insert(actuator))
    }

    pub fn add_controller<C: Controller + 'static>(&mut self, controller: C) -> Result<ControllerId> {
        if self.scene.controller_id(controller.name()).is_some() {
            return logged(Err(SimulationError::DuplicateName(controller.name().to_string())));
        }
        Ok(self.scene.controllers.insert(Box::new(controller)))
    }

    /// Starts monitoring a pair; an existing record for the unordered pair is returned as is.
    pub fn add_contact(&mut self, a: EntityId, b: EntityId, history_length: usize) -> Result<ContactId> {
        logged(self.require_entities(a, b))?;
        Ok(self.scene.contacts.add_contact(a, b, history_length))
    }

    pub fn check_contact(&self, a: EntityId, b: EntityId) -> bool {
        self.scene.contacts.check_contact(a, b)
    }

    pub fn contact(&self, a: EntityId, b: EntityId) -> Option<&Contact> {
        self.scene.contacts.contact(a, b)
    }

    /// Lets the pair collide under inclusive filtering, or lifts an exclusion.
    pub fn enable_collision_pair(&mut self, a: EntityId, b: EntityId) -> Result<()> {
        logged(self.require_entities(a, b))?;
        match self.scene.filter.mode {
            CollisionFilterMode::Inclusive => self.scene.filter.insert_pair(a, b),
            CollisionFilterMode::Exclusive => {
                self.scene.filter.remove_pair(a, b);
            }
            CollisionFilterMode::Standard => warn!("Collision pairs have no effect under standard filtering"),
        }
        Ok(())
    }

    /// Excludes the pair under exclusive filtering, or revokes an inclusion.
    pub fn disable_collision_pair(&mut self, a: EntityId, b: EntityId) -> Result<()> {
        logged(self.require_entities(a, b))?;
        match self.scene.filter.mode {
            CollisionFilterMode::Exclusive => self.scene.filter.insert_pair(a, b),
            CollisionFilterMode::Inclusive => {
                self.scene.filter.remove_pair(a, b);
            }
            CollisionFilterMode::Standard => warn!("Collision pairs have no effect under standard filtering"),
        }
        Ok(())
    }

    fn require_entities(&self, a: EntityId, b: EntityId) -> Result<()> {
        for id in [a, b] {
            if !self.scene.entities.contains(id) {
                return Err(SimulationError::UnknownEntity(id));
            }
        }
        Ok(())
    }

    // ---- mounts ------------------------------------------------------------

    /// Frame rigidly attached to one part of a registered entity.
    pub fn mount_on_entity(&self, entity: EntityId, part: Option<usize>, origin: Transform) -> Result<Mount> {
        logged(self.body_mount(entity, part, origin))
    }

    fn body_mount(&self, entity: EntityId, part: Option<usize>, origin: Transform) -> Result<Mount> {
        let e = self
            .scene
            .entities
            .get(entity)
            .ok_or(SimulationError::UnknownEntity(entity))?;
        let body = e
            .body(part)
            .ok_or_else(|| SimulationError::InvalidMount(format!("'{}' has no body for part {part:?}", e.name())))?;
        Ok(Mount::body(body, origin))
    }

    /// Frame attached to a named link of an articulated entity.
    pub fn mount_on_link(&self, entity: EntityId, link: &str, origin: Transform) -> Result<Mount> {
        logged(self.link_mount(entity, link, origin))
    }

    fn link_mount(&self, entity: EntityId, link: &str, origin: Transform) -> Result<Mount> {
        let index = self
            .articulated(entity)?
            .link_index(link)
            .ok_or_else(|| SimulationError::UnknownLink(link.to_string()))?;
        self.body_mount(entity, Some(index), origin)
    }

    /// The named joint of an articulated entity.
    pub fn mount_on_joint(&self, entity: EntityId, joint: &str) -> Result<Mount> {
        logged(self.joint_mount(entity, joint))
    }

    fn joint_mount(&self, entity: EntityId, joint: &str) -> Result<Mount> {
        let a = self.articulated(entity)?;
        let j = a
            .joint_index(joint)
            .and_then(|j| a.joint(j))
            .ok_or_else(|| SimulationError::UnknownJoint(joint.to_string()))?;
        let handle = a
            .multibody_handle()
            .ok_or_else(|| SimulationError::InvalidMount(format!("'{}' is not registered", a.name())))?;
        Ok(Mount::joint(handle, j.child))
    }

    fn articulated(&self, entity: EntityId) -> Result<&ArticulatedEntity> {
        let e = self
            .scene
            .entities
            .get(entity)
            .ok_or(SimulationError::UnknownEntity(entity))?;
        e.downcast_ref::<ArticulatedEntity>()
            .ok_or_else(|| SimulationError::InvalidMount(format!("'{}' is not articulated", e.name())))
    }

    pub fn attach_sensor(&mut self, sensor: SensorId, mount: Mount) -> bool {
        match self.scene.sensors.get_mut(sensor) {
            Some(s) => {
                s.attach(mount);
                true
            }
            None => false,
        }
    }

    pub fn attach_actuator(&mut self, actuator: ActuatorId, mount: Mount) -> bool {
        match self.scene.actuators.get_mut(actuator) {
            Some(a) => {
                a.attach(mount);
                true
            }
            None => false,
        }
    }

    // ---- lookups -----------------------------------------------------------

    pub fn entity(&self, id: EntityId) -> Option<&(dyn Entity + 'static)> {
        self.scene.entities.get(id).map(|e| e.as_ref())
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut (dyn Entity + 'static)> {
        let item = self.scene.entities.get_mut(id)?;
        Some(item.as_mut())
    }

    pub fn entity_id(&self, name: &str) -> Option<EntityId> {
        self.scene.entity_id(name)
    }

    pub fn entity_by_name(&self, name: &str) -> Option<&(dyn Entity + 'static)> {
        self.entity_id(name).and_then(|id| self.entity(id))
    }

    /// Entity by registration order.
    pub fn entity_at(&self, index: usize) -> Option<&(dyn Entity + 'static)> {
        self.scene.entities.nth(index).map(|(_, e)| e.as_ref())
    }

    pub fn entity_count(&self) -> usize {
        self.scene.entities.len()
    }

    pub fn joint(&self, id: JointId) -> Option<&dyn Joint> {
        self.scene.joints.get(id).map(|j| j.as_ref())
    }

    pub fn joint_by_name(&self, name: &str) -> Option<&dyn Joint> {
        self.scene.joint_id(name).and_then(|id| self.joint(id))
    }

    pub fn joint_at(&self, index: usize) -> Option<&dyn Joint> {
        self.scene.joints.nth(index).map(|(_, j)| j.as_ref())
    }

    pub fn joint_count(&self) -> usize {
        self.scene.joints.len()
    }

    pub fn sensor(&self, id: SensorId) -> Option<&dyn Sensor> {
        self.scene.sensors.get(id).map(|s| s.as_ref())
    }

    pub fn sensor_by_name(&self, name: &str) -> Option<&dyn Sensor> {
        self.scene.sensor_id(name).and_then(|id| self.sensor(id))
    }

    pub fn sensor_at(&self, index: usize) -> Option<&dyn Sensor> {
        self.scene.sensors.nth(index).map(|(_, s)| s.as_ref())
    }

    pub fn sensor_count(&self) -> usize {
        self.scene.sensors.len()
    }

    pub fn actuator(&self, id: ActuatorId) -> Option<&dyn Actuator> {
        self.scene.actuators.get(id).map(|a| a.as_ref())
    }

    pub fn actuator_mut(&mut self, id: ActuatorId) -> Option<&mut dyn Actuator> {
        let item = self.scene.actuators.get_mut(id)?;
        Some(item.as_mut())
    }

    pub fn actuator_by_name(&self, name: &str) -> Option<&dyn Actuator> {
        self.scene.actuator_id(name).and_then(|id| self.actuator(id))
    }

    pub fn actuator_at(&self, index: usize) -> Option<&dyn Actuator> {
        self.scene.actuators.nth(index).map(|(_, a)| a.as_ref())
    }

    pub fn actuator_count(&self) -> usize {
        self.scene.actuators.len()
    }

    pub fn controller(&self, id: ControllerId) -> Option<&dyn Controller> {
        self.scene.controllers.get(id).map(|c| c.as_ref())
    }

    pub fn controller_mut(&mut self, id: ControllerId) -> Option<&mut dyn Controller> {
        let item = self.scene.controllers.get_mut(id)?;
        Some(item.as_mut())
    }

    pub fn controller_by_name(&self, name: &str) -> Option<&dyn Controller> {
        self.scene.controller_id(name).and_then(|id| self.controller(id))
    }

    pub fn controller_at(&self, index: usize) -> Option<&dyn Controller> {
        self.scene.controllers.nth(index).map(|(_, c)| c.as_ref())
    }

    pub fn controller_count(&self) -> usize {
        self.scene.controllers.len()
    }

    pub fn contact_count(&self) -> usize {
        self.scene.contacts.len()
    }

    // ---- rendering support -------------------------------------------------

    /// Union of the bounding boxes of all bounded entities.
    pub fn world_aabb(&self) -> Aabb {
        let Some(world) = self.world.as_ref() else {
            return Aabb::EMPTY;
        };
        self.scene
            .entities
            .values()
            .map(|e| e.aabb(world))
            .fold(Aabb::EMPTY, |acc, b| acc.union(&b))
    }

    /// Entity under pixel `(x, y)` of the first active view.
    pub fn pick_entity(&self, x: u32, y: u32) -> Option<EntityId> {
        let Some(view) = self.views.iter().find(|v| v.read().active) else {
            warn!("No active view to pick from");
            return None;
        };
        let (origin, direction) = view.read().ray(x, y);
        self.pick_entity_along(origin, direction)
    }

    /// First entity hit by a ray.
    pub fn pick_entity_along(&self, origin: Vec3, direction: Vec3) -> Option<EntityId> {
        let hit = self.world.as_ref()?.ray_test(origin, direction, PICK_RANGE)?;
        hit.tag.map(|t| t.entity)
    }

    pub fn add_view(&mut self, view: View) -> SharedView {
        let shared = view.shared();
        self.views.push(shared.clone());
        shared
    }

    pub fn views(&self) -> &[SharedView] {
        &self.views
    }

    pub fn add_light(&mut self, light: Light) -> SharedLight {
        let shared = light.shared();
        self.lights.push(shared.clone());
        shared
    }

    pub fn lights(&self) -> &[SharedLight] {
        &self.lights
    }
}
