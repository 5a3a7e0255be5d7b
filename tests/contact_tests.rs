use approx::assert_relative_eq;
use robosim::simulation::combiner::blended_friction;
use robosim::*;

fn manager(filter: CollisionFilterMode) -> SimulationManager {
    let config = SimulationConfig::default()
        .with_collision_filter(filter)
        .with_ic(IcSolverParams::new(false, 0.001, 0, 0.0, 0.0, 0.0));
    let mut sim = SimulationManager::new(config);
    sim.initialize();
    for (name, density) in [("ground", 2000.0), ("wood", 700.0)] {
        sim.materials_mut()
            .create_material(name, density, 0.0)
            .expect("material");
    }
    sim
}

fn material(sim: &SimulationManager, name: &str) -> Material {
    sim.materials().material_by_name(name).cloned().expect("material")
}

fn add_floor(sim: &mut SimulationManager) -> EntityId {
    let ground = material(sim, "ground");
    sim.add_entity(StaticEntity::plane("floor", &ground, Transform::IDENTITY))
        .expect("floor")
}

fn add_crate(sim: &mut SimulationManager, name: &str, position: Vec3) -> EntityId {
    let wood = material(sim, "wood");
    let body = SolidEntity::new(name, ColliderShape::cuboid(Vec3::splat(0.1)), &wood)
        .with_transform(Transform::from_translation(position));
    sim.add_entity(body).expect("crate")
}

fn height(sim: &SimulationManager, id: EntityId) -> f32 {
    let world = sim.world().expect("world");
    sim.entity(id).expect("entity").transform(world).position.z
}

fn run_for(sim: &mut SimulationManager, seconds: u64) {
    sim.advance_simulation(0);
    for tick in 1..=seconds * 100 {
        sim.advance_simulation(tick * 10_000);
    }
}

#[test]
fn contact_records_are_shared_by_both_orderings() {
    let mut sim = manager(CollisionFilterMode::Standard);
    let floor = add_floor(&mut sim);
    let crate_id = add_crate(&mut sim, "crate", Vec3::new(0.0, 0.0, 0.1));

    let first = sim.add_contact(floor, crate_id, 8).expect("contact");
    let second = sim.add_contact(crate_id, floor, 32).expect("contact");
    assert_eq!(first, second);
    assert_eq!(sim.contact_count(), 1);
    assert!(sim.check_contact(crate_id, floor));

    let missing = EntityId::new(99, 0);
    assert_eq!(
        sim.add_contact(floor, missing, 8),
        Err(SimulationError::UnknownEntity(missing))
    );
}

#[test]
fn friction_decreases_with_slip_speed() {
    let speeds = [0.0, 0.05, 0.1, 0.5, 1.0, 10.0];
    let values: Vec<f32> = speeds.iter().map(|s| blended_friction(0.8, 0.3, *s, 100.0)).collect();
    assert_relative_eq!(values[0], 0.8);
    assert!(values.windows(2).all(|w| w[1] <= w[0]));
    assert_relative_eq!(values[5], 0.3, epsilon = 1e-3);
}

#[test]
fn resting_crate_records_contact_history() {
    let mut sim = manager(CollisionFilterMode::Standard);
    let floor = add_floor(&mut sim);
    let crate_id = add_crate(&mut sim, "crate", Vec3::new(0.0, 0.0, 0.1));
    sim.add_contact(crate_id, floor, 16).expect("contact");

    assert!(sim.start_simulation());
    run_for(&mut sim, 1);

    let contact = sim.contact(floor, crate_id).expect("contact");
    assert_eq!(contact.entities(), (crate_id, floor));
    assert_eq!(contact.history().count(), 16);
    let last = contact.last_event().expect("event");
    assert!(contact.is_active_at(last.time));
    assert!(last.normal.z > 0.9, "normal should point from the floor into the crate");
    assert!(last.impulse > 0.0);
    assert_relative_eq!(height(&sim, crate_id), 0.1, epsilon = 0.02);
}

#[test]
fn inclusive_filtering_only_collides_listed_pairs() {
    let mut sim = manager(CollisionFilterMode::Inclusive);
    let floor = add_floor(&mut sim);
    let held = add_crate(&mut sim, "held", Vec3::new(0.0, 0.0, 0.1));
    let dropped = add_crate(&mut sim, "dropped", Vec3::new(1.0, 0.0, 0.1));
    sim.enable_collision_pair(held, floor).expect("pair");

    assert!(sim.start_simulation());
    run_for(&mut sim, 1);

    assert_relative_eq!(height(&sim, held), 0.1, epsilon = 0.02);
    assert!(height(&sim, dropped) < -1.0);
}

#[test]
fn exclusive_filtering_skips_disabled_pairs() {
    let mut sim = manager(CollisionFilterMode::Exclusive);
    let floor = add_floor(&mut sim);
    let crate_id = add_crate(&mut sim, "crate", Vec3::new(0.0, 0.0, 0.1));
    sim.disable_collision_pair(floor, crate_id).expect("pair");

    assert!(sim.start_simulation());
    run_for(&mut sim, 1);
    assert!(height(&sim, crate_id) < -1.0);
}
