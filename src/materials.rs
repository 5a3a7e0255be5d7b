//! Named surface materials and their pairwise friction coefficients.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimulationError};

/// Static friction assigned to a pair until configured.
pub const DEFAULT_STATIC_FRICTION: f32 = 0.5;
/// Dynamic friction assigned to a pair until configured.
pub const DEFAULT_DYNAMIC_FRICTION: f32 = 0.2;

/// A surface material. `static_friction[j]` and `dynamic_friction[j]` hold the
/// coefficients this material uses against material `j`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub id: usize,
    pub name: String,
    /// Density in kg/m³.
    pub density: f32,
    pub restitution: f32,
    pub static_friction: Vec<f32>,
    pub dynamic_friction: Vec<f32>,
}

impl Material {
    /// Coefficients against material `other`, or the defaults when out of range.
    pub fn friction_against(&self, other: usize) -> (f32, f32) {
        (
            self.static_friction
                .get(other)
                .copied()
                .unwrap_or(DEFAULT_STATIC_FRICTION),
            self.dynamic_friction
                .get(other)
                .copied()
                .unwrap_or(DEFAULT_DYNAMIC_FRICTION),
        )
    }
}

/// Dense table of materials indexed by id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaterialTable {
    materials: Vec<Material>,
}

impl MaterialTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a material and returns its id. Every existing pair involving the new
    /// material starts with the default coefficients.
    pub fn create_material(&mut self, name: &str, density: f32, restitution: f32) -> Result<usize> {
        if self.material_id(name).is_some() {
            return Err(SimulationError::DuplicateMaterial(name.to_string()));
        }
        let id = self.materials.len();
        for material in &mut self.materials {
            material.static_friction.push(DEFAULT_STATIC_FRICTION);
            material.dynamic_friction.push(DEFAULT_DYNAMIC_FRICTION);
        }
        self.materials.push(Material {
            id,
            name: name.to_string(),
            density,
            restitution: restitution.clamp(0.0, 1.0),
            static_friction: vec![DEFAULT_STATIC_FRICTION; id + 1],
            dynamic_friction: vec![DEFAULT_DYNAMIC_FRICTION; id + 1],
        });
        debug!("Created material '{name}' with id {id}");
        Ok(id)
    }

    /// Sets the coefficients of a pair in both directions.
    pub fn set_interaction(
        &mut self,
        a: &str,
        b: &str,
        static_friction: f32,
        dynamic_friction: f32,
    ) -> Result<()> {
        self.set_one_way_interaction(a, b, static_friction, dynamic_friction)?;
        self.set_one_way_interaction(b, a, static_friction, dynamic_friction)
    }

    /// Sets only the coefficients `a` uses against `b`.
    ///
    /// Contacts read the row of the first body in the pair, so an asymmetric table
    /// makes friction depend on pair order.
    pub fn set_one_way_interaction(
        &mut self,
        a: &str,
        b: &str,
        static_friction: f32,
        dynamic_friction: f32,
    ) -> Result<()> {
        let ia = self.require(a)?;
        let ib = self.require(b)?;
        let (mut fs, mut fd) = (static_friction.max(0.0), dynamic_friction.max(0.0));
        if fd > fs {
            warn!("Dynamic friction {fd} exceeds static friction {fs} for '{a}'/'{b}'; swapping");
            std::mem::swap(&mut fs, &mut fd);
        }
        let material = &mut self.materials[ia];
        material.static_friction[ib] = fs;
        material.dynamic_friction[ib] = fd;
        Ok(())
    }

    fn require(&self, name: &str) -> Result<usize> {
        self.material_id(name)
            .ok_or_else(|| SimulationError::UnknownMaterial(name.to_string()))
    }

    pub fn material_id(&self, name: &str) -> Option<usize> {
        self.materials.iter().position(|m| m.name == name)
    }

    pub fn material(&self, id: usize) -> Option<&Material> {
        self.materials.get(id)
    }

    pub fn material_by_name(&self, name: &str) -> Option<&Material> {
        self.materials.iter().find(|m| m.name == name)
    }

    /// `(static, dynamic)` coefficients read from `a`'s row at `b`'s index.
    pub fn friction(&self, a: usize, b: usize) -> Option<(f32, f32)> {
        self.materials.get(a).map(|m| m.friction_against(b))
    }

    pub fn is_symmetric(&self) -> bool {
        self.materials.iter().all(|a| {
            self.materials
                .iter()
                .all(|b| a.friction_against(b.id) == b.friction_against(a.id))
        })
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Material> + '_ {
        self.materials.iter()
    }

    pub fn clear(&mut self) {
        self.materials.clear();
    }
}
