//! Core types for the taskmesh orchestration engine.
//!
//! This module defines the fundamental vocabulary shared by module
//! descriptors, the graph builder, and the runner:
//!
//! - [`Priority`]: scheduling hint attached to a module and passed through
//!   to the executor unchanged
//! - [`GroupMode`]: whether a sub-module group joins back into its owner or
//!   runs detached from the rest of the graph
//!
//! # Examples
//!
//! ```rust
//! use taskmesh::types::{GroupMode, Priority};
//!
//! assert_eq!(Priority::default(), Priority::Normal);
//! assert!(Priority::High > Priority::Normal);
//! assert_eq!(GroupMode::default(), GroupMode::Join);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scheduling hint for a module.
///
/// Priorities map onto the executor's ready-queue tiers: when several nodes
/// are runnable at once, `High` nodes are dequeued before `Normal`, and
/// `Normal` before `Low`. Within a tier, dequeue order is FIFO. A priority is
/// a hint, not a guarantee of global ordering: nodes on unrelated branches
/// may still interleave arbitrarily once dispatched.
///
/// Priorities are inherited directly from the descriptor by the materialized
/// node; no inheritance or aggregation across edges occurs.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Priority {
    /// Dequeued last among ready nodes.
    Low,
    /// The default tier.
    #[default]
    Normal,
    /// Dequeued first among ready nodes.
    High,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Normal => write!(f, "normal"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Execution mode for a sub-module group.
///
/// A module that owns a group is a *grouping unit*: when it is scheduled, the
/// group is expanded into a nested graph. `Join` runs the nested graph to
/// quiescence before the owning module's own body executes; `Detach` launches
/// it as independent work that the overall run still tracks, so
/// [`Graph::run`](crate::graphs::Graph::run) does not report completion until
/// detached groups have finished.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub enum GroupMode {
    /// The group must quiesce before the owning module's body runs.
    #[default]
    Join,
    /// The group runs independently of the owner's continuation.
    Detach,
}

impl fmt::Display for GroupMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Join => write!(f, "join"),
            Self::Detach => write!(f, "detach"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_ordering_matches_tiers() {
        assert!(Priority::High > Priority::Normal);
        assert!(Priority::Normal > Priority::Low);
    }

    #[test]
    fn defaults() {
        assert_eq!(Priority::default(), Priority::Normal);
        assert_eq!(GroupMode::default(), GroupMode::Join);
    }
}
