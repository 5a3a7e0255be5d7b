//! Collision detection modules: broad-phase, narrow-phase, contact manifolds and queries.

pub mod broadphase;
pub mod contact;
pub mod narrowphase;
pub mod queries;

pub use broadphase::{BroadPhase, BroadPhaseProxy, SpatialGrid};
pub use contact::{CombinedMaterial, ContactManifold, ContactPoint, ManifoldPoint};
pub use narrowphase::NarrowPhase;
pub use queries::{Raycast, RaycastHit, RaycastQuery};
