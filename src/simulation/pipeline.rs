//! Per-tick behaviour driven by the dynamics world's step hooks.

use glam::Vec3;

use crate::collision::contact::{CombinedMaterial, ContactPoint};
use crate::config::{CollisionFilterMode, IC_WARMUP_TIME};
use crate::controllers::ControlIo;
use crate::core::collider::ColliderTag;
use crate::entities::SettlingTolerance;
use crate::materials::Material;
use crate::world::{ContactSide, DynamicsWorld, WorldHooks};

use super::combiner::{ContactKinematics, MaterialCombiner};
use super::ic::IcPhase;
use super::scene::Scene;

/// Hooks installed for the duration of one `DynamicsWorld::step` call.
pub struct TickHooks<'a> {
    scene: &'a mut Scene,
    combiner: &'a dyn MaterialCombiner,
    phase: IcPhase,
    ic_gravity: bool,
    tolerance: SettlingTolerance,
    settled: bool,
}

impl<'a> TickHooks<'a> {
    pub fn running(scene: &'a mut Scene, combiner: &'a dyn MaterialCombiner) -> Self {
        Self {
            scene,
            combiner,
            phase: IcPhase::Solved,
            ic_gravity: false,
            tolerance: SettlingTolerance {
                linear: 0.0,
                angular: 0.0,
            },
            settled: false,
        }
    }

    /// `tolerance` is already scaled and in SI units; joint IC predicates see the same values.
    pub fn settling(
        scene: &'a mut Scene,
        combiner: &'a dyn MaterialCombiner,
        use_gravity: bool,
        tolerance: SettlingTolerance,
    ) -> Self {
        Self {
            scene,
            combiner,
            phase: IcPhase::Settling,
            ic_gravity: use_gravity,
            tolerance,
            settled: false,
        }
    }

    /// Result of the last settling tick.
    pub fn is_settled(&self) -> bool {
        self.settled
    }

    fn settle_tick(&mut self, world: &mut DynamicsWorld, dt: f32) {
        world.clear_forces();
        let scene = &mut *self.scene;

        if self.ic_gravity {
            for entity in scene.entities.values() {
                if let Some(gravity) = entity.as_gravity() {
                    gravity.apply_gravity(world);
                }
            }
        }

        let mut settled = scene.time >= IC_WARMUP_TIME;
        if settled {
            settled = scene
                .entities
                .values()
                .filter_map(|e| e.as_settling())
                .all(|s| s.is_settled(world, &self.tolerance));
        }

        // Every joint keeps driving towards its target even once one reports failure.
        let joints_ready = scene
            .joints
            .values_mut()
            .fold(true, |ready, joint| joint.solve_position_ic(world, &self.tolerance) && ready);

        self.settled = settled && joints_ready;
        scene.time += f64::from(dt);
    }

    fn run_tick(&mut self, world: &mut DynamicsWorld, dt: f32) {
        world.clear_forces();
        let Scene {
            entities,
            joints,
            sensors,
            actuators,
            controllers,
            time,
            ..
        } = &mut *self.scene;

        for sensor in sensors.values_mut() {
            sensor.update(world, *time, dt);
        }

        {
            let mut io = ControlIo::new(sensors, actuators, *time);
            for controller in controllers.values_mut() {
                controller.update(&mut io, dt);
            }
        }

        for actuator in actuators.values_mut() {
            actuator.update(world, dt);
        }

        for joint in joints.values() {
            joint.apply_damping(world);
        }

        for entity in entities.values_mut() {
            if let Some(gravity) = entity.as_gravity() {
                gravity.apply_gravity(world);
            }
            if let Some(damping) = entity.as_damping() {
                damping.apply_damping(world);
            }
            if let Some(passive) = entity.as_passive_mut() {
                passive.interact(world, dt);
            }
        }

        *time += f64::from(dt);
    }

    fn material_of(&self, tag: Option<ColliderTag>) -> Option<&Material> {
        let tag = tag?;
        let entity = self.scene.entities.get(tag.entity)?;
        let id = entity.material(tag.part)?;
        self.scene.materials.material(id)
    }
}

impl WorldHooks for TickHooks<'_> {
    fn pre_tick(&mut self, world: &mut DynamicsWorld, dt: f32) {
        match self.phase {
            IcPhase::Settling => self.settle_tick(world, dt),
            IcPhase::Solved => self.run_tick(world, dt),
            IcPhase::NotStarted | IcPhase::Failed(_) => {}
        }
    }

    fn post_tick(&mut self, world: &mut DynamicsWorld, _dt: f32) {
        if !self.phase.is_solved() || self.scene.contacts.is_empty() {
            return;
        }
        let time = self.scene.time;
        for manifold in world.manifolds() {
            let entity_of = |h| world.collider(h).and_then(|c| c.tag).map(|t| t.entity);
            if let (Some(a), Some(b)) = (entity_of(manifold.collider_a), entity_of(manifold.collider_b)) {
                self.scene.contacts.record_manifold(a, b, manifold, time);
            }
        }
    }

    fn needs_collision(&self, a: Option<ColliderTag>, b: Option<ColliderTag>) -> bool {
        let ea = a.map(|t| t.entity);
        let eb = b.map(|t| t.entity);
        let has_contact = match (ea, eb) {
            (Some(x), Some(y)) => self.scene.contacts.check_contact(x, y),
            _ => false,
        };
        self.scene.filter.allows(ea, eb, has_contact)
    }

    fn combine(&mut self, contact: &ContactPoint, a: &ContactSide, b: &ContactSide) -> CombinedMaterial {
        let (Some(ma), Some(mb)) = (self.material_of(a.tag), self.material_of(b.tag)) else {
            return CombinedMaterial::FRICTIONLESS;
        };
        let velocity = |side: &ContactSide| if side.is_static { Vec3::ZERO } else { side.velocity };
        let kinematics = ContactKinematics {
            normal: contact.normal,
            velocity_a: velocity(a),
            velocity_b: velocity(b),
        };
        let mut combined = self.combiner.combine(ma, mb, &kinematics);
        if self.scene.filter.mode != CollisionFilterMode::Inclusive {
            combined.slip = None;
        }
        combined
    }
}
