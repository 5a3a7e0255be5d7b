use glam::Vec3;

use super::{resolve_pair, BodyResolver, Joint};
use crate::core::constraints::{Constraint, ConstraintKind};
use crate::error::{Result, SimulationError};
use crate::utils::allocator::{ConstraintHandle, EntityId};
use crate::world::DynamicsWorld;

/// Ball-and-socket joint about a world pivot.
#[derive(Debug, Clone)]
pub struct SphericalJoint {
    name: String,
    a: EntityId,
    b: Option<EntityId>,
    pivot: Vec3,
    constraint: Option<ConstraintHandle>,
}

impl SphericalJoint {
    pub fn new(name: &str, a: EntityId, b: Option<EntityId>, pivot: Vec3) -> Self {
        Self {
            name: name.to_string(),
            a,
            b,
            pivot,
            constraint: None,
        }
    }
}

impl Joint for SphericalJoint {
    fn name(&self) -> &str {
        &self.name
    }

    fn register(&mut self, world: &mut DynamicsWorld, bodies: &BodyResolver<'_>) -> Result<()> {
        if self.constraint.is_some() {
            return Err(SimulationError::AlreadyRegistered(self.name.clone()));
        }
        let (body_a, body_b) = resolve_pair(&self.name, self.a, self.b, bodies)?;
        let Some(xa) = world.body(body_a).map(|b| b.transform) else {
            return Err(SimulationError::InvalidMount(self.name.clone()));
        };
        let xb = body_b
            .and_then(|h| world.body(h))
            .map(|b| b.transform)
            .unwrap_or_default();
        let kind = ConstraintKind::Point {
            pivot_a: xa.inverse_transform_point(self.pivot),
            pivot_b: xb.inverse_transform_point(self.pivot),
        };
        self.constraint = Some(world.add_constraint(Constraint::new(body_a, body_b, kind)));
        Ok(())
    }

    fn constraint(&self) -> Option<ConstraintHandle> {
        self.constraint
    }
}
