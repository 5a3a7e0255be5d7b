//! Initial-conditions phase state.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IcFailure {
    IterationLimitExceeded,
    TimeLimitExceeded,
}

impl fmt::Display for IcFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IcFailure::IterationLimitExceeded => f.write_str("maximum iteration count reached"),
            IcFailure::TimeLimitExceeded => f.write_str("time limit reached"),
        }
    }
}

/// Selects which tick behaviour the pipeline runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IcPhase {
    #[default]
    NotStarted,
    /// Settling ticks; no sensors, controllers or actuators run.
    Settling,
    /// Regular ticks.
    Solved,
    Failed(IcFailure),
}

impl IcPhase {
    pub fn is_solved(&self) -> bool {
        matches!(self, IcPhase::Solved)
    }

    pub fn is_settling(&self) -> bool {
        matches!(self, IcPhase::Settling)
    }
}
