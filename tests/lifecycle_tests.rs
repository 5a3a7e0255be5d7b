use approx::assert_relative_eq;
use robosim::*;

fn zero_gravity_ic() -> SimulationConfig {
    SimulationConfig::default().with_ic(IcSolverParams::new(false, 0.001, 0, 0.0, 0.0, 0.0))
}

fn add_ball(sim: &mut SimulationManager, name: &str, position: Vec3) -> EntityId {
    let material = match sim.materials().material_by_name("steel") {
        Some(m) => m.clone(),
        None => {
            let id = sim
                .materials_mut()
                .create_material("steel", 7800.0, 0.2)
                .expect("material");
            sim.materials().material(id).cloned().expect("material")
        }
    };
    let ball = SolidEntity::new(name, ColliderShape::sphere(0.1), &material)
        .with_transform(Transform::from_translation(position));
    sim.add_entity(ball).expect("ball")
}

fn build_scene(sim: &mut SimulationManager) -> Result<()> {
    let ground = sim.materials_mut().create_material("ground", 2000.0, 0.1)?;
    let ground = sim.materials().material(ground).cloned().ok_or(SimulationError::UnknownMaterial("ground".into()))?;
    sim.add_entity(StaticEntity::plane("floor", &ground, Transform::IDENTITY))?;
    add_ball(sim, "ball", Vec3::new(0.0, 0.0, 1.0));
    Ok(())
}

#[test]
fn registration_requires_a_world() {
    let mut sim = SimulationManager::default();
    let material = Material {
        id: 0,
        name: "none".into(),
        density: 1.0,
        restitution: 0.0,
        static_friction: vec![0.5],
        dynamic_friction: vec![0.2],
    };
    let result = sim.add_entity(SolidEntity::new("ball", ColliderShape::sphere(0.1), &material));
    assert_eq!(result, Err(SimulationError::NoWorld));
    assert!(!sim.start_simulation());
}

#[test]
fn empty_scene_settles_on_first_check_after_warmup() {
    let mut sim = SimulationManager::new(zero_gravity_ic());
    sim.initialize();
    assert!(sim.start_simulation());
    assert_eq!(sim.ic_phase(), IcPhase::Solved);
    // Ten warm-up ticks of 1 ms, then the first settling check passes.
    assert_eq!(sim.ic_iterations(), 11);
    assert_relative_eq!(sim.simulation_time(), 0.0);
}

#[test]
fn resting_solid_settles_without_gravity() {
    let mut sim = SimulationManager::new(zero_gravity_ic());
    sim.initialize();
    add_ball(&mut sim, "ball", Vec3::new(0.0, 0.0, 2.0));
    assert!(sim.start_simulation());
    assert_eq!(sim.ic_iterations(), 11);
    assert_relative_eq!(sim.world().expect("world").gravity().z, -9.81, epsilon = 1e-5);
}

#[test]
fn ic_reports_exhausted_iteration_budget() {
    let config = SimulationConfig::default().with_ic(IcSolverParams::new(false, 0.001, 5, 0.0, 0.0, 0.0));
    let mut sim = SimulationManager::new(config);
    sim.initialize();
    assert!(!sim.start_simulation());
    assert_eq!(sim.ic_phase(), IcPhase::Failed(IcFailure::IterationLimitExceeded));
    assert_eq!(sim.advance_simulation(1_000_000), 0);
}

#[test]
fn advance_is_a_no_op_for_zero_elapsed_time() {
    let mut sim = SimulationManager::new(zero_gravity_ic());
    sim.initialize();
    assert!(sim.start_simulation());
    assert_eq!(sim.advance_simulation(1_000), 0);
    assert_eq!(sim.advance_simulation(1_000), 0);
    assert_relative_eq!(sim.simulation_time(), 0.0);
}

#[test]
fn advance_handles_timestamp_wraparound() {
    let mut sim = SimulationManager::new(zero_gravity_ic());
    sim.initialize();
    assert!(sim.start_simulation());
    assert_eq!(sim.advance_simulation(u64::MAX - 4_999), 0);
    // 5000 µs before the wrap plus 5000 µs after it: two 5 ms sub-steps.
    assert_eq!(sim.advance_simulation(5_000), 2);
    assert_relative_eq!(sim.simulation_time(), 0.01, epsilon = 1e-6);
}

#[test]
fn destroy_and_restart_give_a_fresh_world() {
    let mut sim = SimulationManager::new(zero_gravity_ic());
    sim.restart_scenario(build_scene).expect("build");
    assert_eq!(sim.entity_count(), 2);
    sim.add_view(View::new(Vec3::new(0.0, -5.0, 1.0), Vec3::ZERO, Vec3::Z, 1.0, 64, 48));
    assert!(sim.start_simulation());
    sim.advance_simulation(0);
    sim.advance_simulation(50_000);
    assert!(sim.simulation_time() > 0.0);

    sim.destroy_scenario();
    assert!(!sim.is_initialized());
    assert_eq!(sim.entity_count(), 0);
    assert!(sim.materials().is_empty());
    assert!(sim.views().is_empty());
    sim.destroy_scenario();

    sim.restart_scenario(build_scene).expect("rebuild");
    assert!(sim.is_initialized());
    assert_eq!(sim.entity_count(), 2);
    assert_eq!(sim.ic_phase(), IcPhase::NotStarted);
    assert_relative_eq!(sim.simulation_time(), 0.0);
    assert!(sim.entity_id("ball").is_some());
}

#[test]
fn entity_names_are_unique() {
    let mut sim = SimulationManager::new(zero_gravity_ic());
    sim.initialize();
    add_ball(&mut sim, "ball", Vec3::ZERO);
    let material = sim.materials().material_by_name("steel").cloned().expect("material");
    let duplicate = sim.add_entity(SolidEntity::new("ball", ColliderShape::sphere(0.1), &material));
    assert_eq!(duplicate, Err(SimulationError::DuplicateName("ball".into())));
}

#[test]
fn world_aabb_ignores_unbounded_ground() {
    let mut sim = SimulationManager::new(zero_gravity_ic());
    sim.restart_scenario(build_scene).expect("build");
    let aabb = sim.world_aabb();
    assert_relative_eq!(aabb.min.z, 0.9, epsilon = 1e-5);
    assert_relative_eq!(aabb.max.z, 1.1, epsilon = 1e-5);
}

#[test]
fn picking_returns_the_entity_under_the_ray() {
    let mut sim = SimulationManager::new(zero_gravity_ic());
    sim.restart_scenario(build_scene).expect("build");
    let ball = sim.entity_id("ball").expect("ball");
    assert_eq!(sim.pick_entity(10, 10), None);
    assert_eq!(sim.pick_entity_along(Vec3::new(0.0, -5.0, 1.0), Vec3::Y), Some(ball));

    sim.add_view(View::new(Vec3::new(0.0, -5.0, 1.0), Vec3::new(0.0, 0.0, 1.0), Vec3::Z, 0.8, 101, 101));
    assert_eq!(sim.pick_entity(50, 50), Some(ball));
}

fn gravity_ic(max_iterations: u32, max_time: f64) -> SimulationConfig {
    SimulationConfig::default().with_ic(IcSolverParams::new(true, 0.001, max_iterations, max_time, 0.0, 0.0))
}

fn floor_and_ball(sim: &mut SimulationManager, height: f32) -> EntityId {
    let ground = sim
        .materials_mut()
        .create_material("ground", 2000.0, 0.1)
        .expect("material");
    let ground = sim.materials().material(ground).cloned().expect("material");
    sim.add_entity(StaticEntity::plane("floor", &ground, Transform::IDENTITY))
        .expect("floor");
    add_ball(sim, "ball", Vec3::new(0.0, 0.0, height))
}

fn ball_height(sim: &SimulationManager, id: EntityId) -> f32 {
    let world = sim.world().expect("world");
    sim.entity(id).expect("ball").transform(world).position.z
}

#[test]
fn ball_resting_on_the_floor_settles_with_ic_gravity() {
    let mut sim = SimulationManager::new(gravity_ic(200_000, 60.0));
    sim.initialize();
    let ball = floor_and_ball(&mut sim, 0.1);
    assert!(sim.start_simulation());
    assert_eq!(sim.ic_phase(), IcPhase::Solved);
    assert!(sim.ic_iterations() < 100, "took {} iterations", sim.ic_iterations());
    assert_relative_eq!(ball_height(&sim, ball), 0.1, epsilon = 1e-3);
}

#[test]
fn dropped_ball_settles_on_the_floor_with_ic_gravity() {
    let mut sim = SimulationManager::new(gravity_ic(200_000, 60.0));
    sim.initialize();
    let ball = floor_and_ball(&mut sim, 0.5);
    assert!(sim.start_simulation());
    assert_eq!(sim.ic_phase(), IcPhase::Solved);
    // The ball needs roughly 0.28 s just to reach the floor.
    assert!(sim.ic_iterations() > 250);
    assert_relative_eq!(ball_height(&sim, ball), 0.1, epsilon = 1e-3);
    assert_relative_eq!(sim.simulation_time(), 0.0);
}

#[test]
fn ic_reports_exhausted_time_budget() {
    let mut sim = SimulationManager::new(gravity_ic(0, 1.0e-6));
    sim.initialize();
    floor_and_ball(&mut sim, 2.0);
    assert!(!sim.start_simulation());
    assert_eq!(sim.ic_phase(), IcPhase::Failed(IcFailure::TimeLimitExceeded));
    assert_eq!(sim.advance_simulation(0), 0);
    assert_eq!(sim.advance_simulation(1_000_000), 0);
}

#[test]
fn hinge_reaches_its_ic_angle_before_the_run_starts() {
    let mut sim = SimulationManager::new(zero_gravity_ic());
    sim.initialize();
    let wood = sim.materials_mut().create_material("wood", 700.0, 0.0).expect("material");
    let wood = sim.materials().material(wood).cloned().expect("material");
    let door = SolidEntity::new("door", ColliderShape::cuboid(Vec3::new(0.5, 0.1, 0.1)), &wood)
        .with_transform(Transform::from_translation(Vec3::new(0.5, 0.0, 1.0)));
    let door = sim.add_entity(door).expect("door");
    sim.add_joint(RevoluteJoint::new("door_hinge", door, None, Vec3::new(0.0, 0.0, 1.0), Vec3::Z).with_ic_angle(0.5))
        .expect("hinge");

    assert!(sim.start_simulation());
    assert_eq!(sim.ic_phase(), IcPhase::Solved);
    assert!(sim.ic_iterations() > 11);
    let world = sim.world().expect("world");
    let hinge = sim
        .joint_by_name("door_hinge")
        .and_then(|j| j.constraint())
        .expect("constraint");
    assert_relative_eq!(world.hinge_angle(hinge).expect("angle"), 0.5, epsilon = 1e-3);
    assert!(world.hinge_velocity(hinge).expect("rate").abs() < 1e-3);
}

#[test]
fn entities_downcast_to_their_concrete_type() {
    let mut sim = SimulationManager::new(zero_gravity_ic());
    sim.restart_scenario(build_scene).expect("build");
    let ball = sim.entity_id("ball").expect("ball");

    assert!(sim
        .entity_by_name("ball")
        .and_then(|e| e.downcast_ref::<SolidEntity>())
        .is_some());
    assert!(sim
        .entity_by_name("floor")
        .and_then(|e| e.downcast_ref::<SolidEntity>())
        .is_none());
    assert!(sim
        .entity_at(0)
        .and_then(|e| e.downcast_ref::<StaticEntity>())
        .is_some());
    assert!(sim
        .entity_mut(ball)
        .and_then(|e| e.downcast_mut::<SolidEntity>())
        .is_some());
}
