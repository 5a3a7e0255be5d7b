//! Error type shared by the orchestration layer.

use thiserror::Error;

use crate::utils::allocator::EntityId;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimulationError {
    #[error("no physics world exists; call initialize() first")]
    NoWorld,
    #[error("entity `{0}` is already registered with a world")]
    AlreadyRegistered(String),
    #[error("an object named `{0}` already exists")]
    DuplicateName(String),
    #[error("unknown entity {0}")]
    UnknownEntity(EntityId),
    #[error("unknown constraint solver `{0}`")]
    UnknownSolver(String),
    #[error("unknown collision filter `{0}`")]
    UnknownFilter(String),
    #[error("unknown material `{0}`")]
    UnknownMaterial(String),
    #[error("material `{0}` already exists")]
    DuplicateMaterial(String),

    #[error("robot `{0}` already has its links defined")]
    AlreadyDefined(String),
    #[error("robot `{0}` has no links defined")]
    LinksUndefined(String),
    #[error("robot `{0}` has no detached links left")]
    NoFreeLinks(String),
    #[error("parent link `{0}` is not part of the kinematic tree")]
    ParentNotJoined(String),
    #[error("child link `{0}` is not among the detached links")]
    ChildNotFound(String),
    #[error("robot `{robot}` still has {count} unconnected link(s)")]
    UnconnectedLinks { robot: String, count: usize },
    #[error("unknown link `{0}`")]
    UnknownLink(String),
    #[error("unknown joint `{0}`")]
    UnknownJoint(String),

    #[error("invalid joint `{name}`: {reason}")]
    InvalidJoint { name: String, reason: String },
    #[error("mount for `{0}` does not resolve to a body in the world")]
    InvalidMount(String),
}

pub type Result<T> = std::result::Result<T, SimulationError>;

/// Logs an error at `error` level before handing it back to the caller.
pub(crate) fn logged<T>(result: Result<T>) -> Result<T> {
    result.inspect_err(|e| log::error!("{e}"))
}
