use super::{resolve_pair, BodyResolver, Joint};
use crate::core::constraints::{Constraint, ConstraintKind};
use crate::error::{Result, SimulationError};
use crate::utils::allocator::{ConstraintHandle, EntityId};
use crate::world::DynamicsWorld;

/// Welds two solids (or a solid to the world) in their current relative pose.
#[derive(Debug, Clone)]
pub struct FixedJoint {
    name: String,
    a: EntityId,
    b: Option<EntityId>,
    constraint: Option<ConstraintHandle>,
}

impl FixedJoint {
    pub fn new(name: &str, a: EntityId, b: Option<EntityId>) -> Self {
        Self {
            name: name.to_string(),
            a,
            b,
            constraint: None,
        }
    }
}

impl Joint for FixedJoint {
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
        // Anchor at the midpoint between both frames.
        let anchor = (xa.position + xb.position) * 0.5;
        let kind = ConstraintKind::Fixed {
            pivot_a: xa.inverse_transform_point(anchor),
            pivot_b: xb.inverse_transform_point(anchor),
            relative_rotation: xa.rotation.inverse() * xb.rotation,
        };
        self.constraint = Some(world.add_constraint(Constraint::new(body_a, body_b, kind)));
        Ok(())
    }

    fn constraint(&self) -> Option<ConstraintHandle> {
        self.constraint
    }
}
