use approx::assert_relative_eq;
use robosim::*;

fn arm(sim: &mut SimulationManager) -> EntityId {
    let id = sim
        .materials_mut()
        .create_material("aluminium", 2700.0, 0.1)
        .expect("material");
    let material = sim.materials().material(id).cloned().expect("material");
    let link = |name: &str| SolidEntity::new(name, ColliderShape::sphere(0.05), &material);

    let mut robot = Robot::new("arm", true);
    robot
        .define_links(link("base"), vec![link("upper")])
        .expect("links");
    robot
        .define_revolute_joint(
            "shoulder",
            "base",
            "upper",
            Transform::from_translation(Vec3::new(0.3, 0.0, 0.0)),
            Vec3::Z,
            (0.0, 0.0),
        )
        .expect("shoulder");
    robot
        .add_joint_sensor(Box::new(JointEncoder::new("encoder", 0.0, 4)), "shoulder")
        .expect("encoder");
    robot
        .add_joint_actuator(Box::new(JointMotor::new("motor", 5.0)), "shoulder")
        .expect("motor");
    robot.add_to_simulation(sim, Transform::IDENTITY).expect("register")
}

fn manager() -> SimulationManager {
    let config = SimulationConfig::default()
        .with_gravity(0.0)
        .with_ic(IcSolverParams::new(false, 0.001, 0, 0.0, 0.0, 0.0));
    let mut sim = SimulationManager::new(config);
    sim.initialize();
    sim
}

#[test]
fn pid_drives_a_joint_to_its_target() {
    let mut sim = manager();
    arm(&mut sim);
    let encoder = sim.scene().sensor_id("encoder").expect("encoder");
    let motor = sim.scene().actuator_id("motor").expect("motor");
    let mut pid = PidController::new("hold", encoder, 0, motor, PidGains::new(2.0, 0.0, 0.5)).with_output_limit(5.0);
    pid.set_target(0.3);
    sim.add_controller(pid).expect("controller");

    assert!(sim.start_simulation());
    assert!(sim.controller_by_name("hold").is_some_and(|c| c.is_running()));
    sim.advance_simulation(0);
    for tick in 1..=300u64 {
        sim.advance_simulation(tick * 10_000);
    }

    let position = sim
        .sensor_by_name("encoder")
        .and_then(|s| s.reading(0))
        .expect("reading");
    assert_relative_eq!(position, 0.3, epsilon = 0.02);

    sim.stop_simulation();
    assert!(sim.controller_by_name("hold").is_some_and(|c| !c.is_running()));
}

#[test]
fn schedule_feeds_setpoints_over_time() {
    let mut sim = manager();
    arm(&mut sim);
    let motor = sim.scene().actuator_id("motor").expect("motor");
    sim.add_controller(ScheduleController::new("profile", motor, vec![(0.0, 1.0), (0.5, -1.0)]))
        .expect("controller");

    assert!(sim.start_simulation());
    sim.advance_simulation(0);
    sim.advance_simulation(250_000);
    assert_relative_eq!(sim.actuator(motor).expect("motor").setpoint(), 1.0);
    sim.advance_simulation(750_000);
    assert_relative_eq!(sim.actuator(motor).expect("motor").setpoint(), -1.0);
}

#[test]
fn duplicate_controller_names_are_rejected() {
    let mut sim = manager();
    arm(&mut sim);
    let motor = sim.scene().actuator_id("motor").expect("motor");
    sim.add_controller(ScheduleController::new("profile", motor, vec![(0.0, 1.0)]))
        .expect("controller");
    assert_eq!(
        sim.add_controller(ScheduleController::new("profile", motor, vec![])),
        Err(SimulationError::DuplicateName("profile".into()))
    );
}
