use crate::actuators::Actuator;
use crate::controllers::Controller;
use crate::entities::Entity;
use crate::joints::Joint;
use crate::materials::MaterialTable;
use crate::sensors::Sensor;
use crate::utils::allocator::{ActuatorId, Arena, ControllerId, EntityId, JointId, SensorId};

use super::contacts::{CollisionFilter, ContactRegistry};

/// Everything a simulation manager owns besides the dynamics world.
#[derive(Default)]
pub struct Scene {
    pub entities: Arena<Box<dyn Entity>, EntityId>,
    pub joints: Arena<Box<dyn Joint>, JointId>,
    pub sensors: Arena<Box<dyn Sensor>, SensorId>,
    pub actuators: Arena<Box<dyn Actuator>, ActuatorId>,
    pub controllers: Arena<Box<dyn Controller>, ControllerId>,
    pub contacts: ContactRegistry,
    pub filter: CollisionFilter,
    pub materials: MaterialTable,
    /// Simulated time in seconds.
    pub time: f64,
}

impl Scene {
    pub fn entity_id(&self, name: &str) -> Option<EntityId> {
        self.entities
            .iter()
            .find(|(_, e)| e.name() == name)
            .map(|(id, _)| id)
    }

    pub fn joint_id(&self, name: &str) -> Option<JointId> {
        self.joints.iter().find(|(_, j)| j.name() == name).map(|(id, _)| id)
    }

    pub fn sensor_id(&self, name: &str) -> Option<SensorId> {
        self.sensors.iter().find(|(_, s)| s.name() == name).map(|(id, _)| id)
    }

    pub fn actuator_id(&self, name: &str) -> Option<ActuatorId> {
        self.actuators
            .iter()
            .find(|(_, a)| a.name() == name)
            .map(|(id, _)| id)
    }

    pub fn controller_id(&self, name: &str) -> Option<ControllerId> {
        self.controllers
            .iter()
            .find(|(_, c)| c.name() == name)
            .map(|(id, _)| id)
    }

    /// Drops scene objects in dependency order; materials are left to the caller.
    pub fn clear_objects(&mut self) {
        self.entities.clear();
        self.joints.clear();
        self.contacts.clear();
        self.filter.clear();
        self.sensors.clear();
        self.actuators.clear();
        self.controllers.clear();
        self.time = 0.0;
    }
}
