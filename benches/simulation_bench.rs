use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use robosim::*;
use std::hint::black_box;

fn scene_with_crates(count: usize) -> SimulationManager {
    let config = SimulationConfig::default().with_ic(IcSolverParams::new(false, 0.001, 0, 0.0, 0.0, 0.0));
    let mut sim = SimulationManager::new(config);
    sim.initialize();
    let id = sim
        .materials_mut()
        .create_material("wood", 700.0, 0.1)
        .expect("material");
    let wood = sim.materials().material(id).cloned().expect("material");
    sim.add_entity(StaticEntity::plane("floor", &wood, Transform::IDENTITY))
        .expect("floor");
    for i in 0..count {
        let position = Vec3::new((i % 16) as f32 * 0.3, (i / 16) as f32 * 0.3, 0.1);
        let body = SolidEntity::new(&format!("crate{i}"), ColliderShape::cuboid(Vec3::splat(0.1)), &wood)
            .with_transform(Transform::from_translation(position));
        sim.add_entity(body).expect("crate");
    }
    sim
}

fn chain_robot(sim: &mut SimulationManager, links: usize) {
    let id = sim
        .materials_mut()
        .create_material("steel", 7800.0, 0.2)
        .expect("material");
    let steel = sim.materials().material(id).cloned().expect("material");
    let link = |name: String| SolidEntity::new(&name, ColliderShape::sphere(0.04), &steel);

    let mut robot = Robot::new("chain", true);
    robot
        .define_links(link("link0".into()), (1..links).map(|i| link(format!("link{i}"))).collect())
        .expect("links");
    for i in 1..links {
        robot
            .define_revolute_joint(
                &format!("joint{i}"),
                &format!("link{}", i - 1),
                &format!("link{i}"),
                Transform::from_translation(Vec3::new(0.1, 0.0, 0.0)),
                Vec3::Y,
                (-1.0, 1.0),
            )
            .expect("joint");
        robot
            .add_joint_sensor(Box::new(JointEncoder::new(&format!("encoder{i}"), 0.0, 8)), &format!("joint{i}"))
            .expect("encoder");
    }
    robot
        .add_to_simulation(sim, Transform::from_translation(Vec3::new(0.0, 0.0, 2.0)))
        .expect("robot");
}

fn bench_advance(c: &mut Criterion) {
    let mut group = c.benchmark_group("advance_simulation");
    for &count in &[16usize, 64, 256] {
        group.bench_with_input(BenchmarkId::new("resting_crates", count), &count, |b, &count| {
            b.iter(|| {
                let mut sim = scene_with_crates(count);
                sim.start_simulation();
                sim.advance_simulation(0);
                black_box(sim.advance_simulation(black_box(100_000)));
            })
        });
    }
    for &links in &[4usize, 16] {
        group.bench_with_input(BenchmarkId::new("chain", links), &links, |b, &links| {
            b.iter(|| {
                let mut sim = scene_with_crates(0);
                chain_robot(&mut sim, links);
                sim.start_simulation();
                sim.advance_simulation(0);
                black_box(sim.advance_simulation(black_box(100_000)));
            })
        });
    }
    group.finish();
}

fn bench_ic(c: &mut Criterion) {
    c.bench_function("solve_ic_problem", |b| {
        b.iter(|| {
            let mut sim = scene_with_crates(64);
            black_box(sim.solve_ic_problem())
        })
    });
}

criterion_group!(benches, bench_advance, bench_ic);
criterion_main!(benches);
