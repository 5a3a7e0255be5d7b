//! Robosim – fixed-step orchestration of articulated robotic scenes.
//!
//! The crate couples a compact rigid-body and multibody backend ([`world`],
//! [`dynamics`], [`collision`]) with an orchestration layer that settles initial
//! conditions, runs an ordered per-tick pipeline of sensors, controllers and
//! actuators, and resolves contact materials pairwise.

pub mod actuators;
pub mod collision;
pub mod config;
pub mod controllers;
pub mod core;
pub mod dynamics;
pub mod entities;
pub mod error;
pub mod joints;
pub mod materials;
pub mod mount;
pub mod robot;
pub mod sensors;
pub mod simulation;
pub mod utils;
pub mod views;
pub mod world;

pub use glam::{Mat3, Quat, Vec3};

pub use actuators::{Actuator, DcMotor, DcMotorParams, JointMotor, Thruster};
pub use config::{CollisionFilterMode, IcSolverParams, SimulationConfig, UnitSystem, UpAxis};
pub use controllers::{ControlIo, Controller, PidController, PidGains, ScheduleController};
pub use core::{
    collider::{BodyRef, Collider, ColliderShape, ColliderTag},
    types::{Aabb, MassProperties, Transform, Velocity},
};
pub use dynamics::solver::{SolverParams, SolverType};
pub use entities::{
    ArticulatedEntity, CableEntity, Entity, EntityType, FluidProperties, GhostEntity, SolidEntity, StaticEntity,
};
pub use error::{Result, SimulationError};
pub use joints::{FixedJoint, Joint, RevoluteJoint, SphericalJoint};
pub use materials::{Material, MaterialTable};
pub use mount::Mount;
pub use robot::Robot;
pub use sensors::{JointEncoder, Odometry, Sample, Sensor};
pub use simulation::{
    combiner::{MaterialCombiner, SmoothFrictionCombiner},
    ic::{IcFailure, IcPhase},
    SimulationManager,
};
pub use utils::allocator::{ActuatorId, ContactId, ControllerId, EntityId, JointId, SensorId};
pub use views::{Light, View};
pub use world::{DynamicsWorld, WorldHooks};
