//! Joints between entities, realised as maximal-coordinate constraints.

pub mod fixed;
pub mod revolute;
pub mod spherical;

use crate::entities::SettlingTolerance;
use crate::error::Result;
use crate::utils::allocator::{BodyHandle, ConstraintHandle, EntityId};
use crate::world::DynamicsWorld;

pub use fixed::FixedJoint;
pub use revolute::RevoluteJoint;
pub use spherical::SphericalJoint;

/// Maps an entity to the rigid body backing it.
pub type BodyResolver<'a> = dyn Fn(EntityId) -> Option<BodyHandle> + 'a;

pub trait Joint: Send + Sync {
    fn name(&self) -> &str;

    /// Creates the constraint; entities are resolved to bodies through `bodies`.
    fn register(&mut self, world: &mut DynamicsWorld, bodies: &BodyResolver<'_>) -> Result<()>;

    fn unregister(&mut self, world: &mut DynamicsWorld) {
        if let Some(handle) = self.constraint() {
            world.remove_constraint(handle);
        }
    }

    fn constraint(&self) -> Option<ConstraintHandle>;

    /// Applies passive damping forces to the connected bodies.
    fn apply_damping(&self, _world: &mut DynamicsWorld) {}

    /// Drives the joint toward its initial position; true once it is there.
    fn solve_position_ic(&mut self, _world: &mut DynamicsWorld, _tolerance: &SettlingTolerance) -> bool {
        true
    }
}

/// Resolves the two sides of a joint, failing with `InvalidJoint` when either is missing.
pub(crate) fn resolve_pair(
    name: &str,
    a: EntityId,
    b: Option<EntityId>,
    bodies: &BodyResolver<'_>,
) -> Result<(BodyHandle, Option<BodyHandle>)> {
    let missing = |id: EntityId| crate::error::SimulationError::InvalidJoint {
        name: name.to_string(),
        reason: format!("{id} is not a registered rigid entity"),
    };
    let body_a = bodies(a).ok_or_else(|| missing(a))?;
    let body_b = match b {
        Some(id) => Some(bodies(id).ok_or_else(|| missing(id))?),
        None => None,
    };
    Ok((body_a, body_b))
}
