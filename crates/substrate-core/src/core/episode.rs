// crates/substrate-core/src/core/episode.rs
// ============================================================================
// Module: Substrate Episodes
// Description: Time-bounded interventions over one or more variables.
// Purpose: Model Episode per spec.md §3.
// Dependencies: crate::core::{identifiers, time}
// ============================================================================

//! ## Overview
//! An `Episode` is a structured, time-bounded intent over one or more
//! variables (see the GLOSSARY in `spec.md`). Status transitions are
//! restricted but reversion is permitted and recorded (`spec.md` §3).

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::ArtifactId;
use crate::core::identifiers::EpisodeId;
use crate::core::identifiers::NodeId;
use crate::core::identifiers::VariableId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Episode
// ============================================================================

/// The category of intervention.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpisodeKind {
    /// Intended to regulate a variable toward a target.
    Regulatory,
    /// Intended to explore/discover without a fixed target.
    Exploratory,
}

/// What an episode intends to do with a bound variable.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableIntent {
    /// Reduce variance around the current value.
    Stabilize,
    /// Raise the value.
    Increase,
    /// Lower the value.
    Decrease,
    /// Hold the value steady.
    Maintain,
    /// Probe behavior without a directional target.
    Probe,
    /// Broaden the range of observed values.
    Expand,
    /// Discover structure in the variable's behavior.
    Discover,
}

/// A single variable binding within an episode.
///
/// # Invariants
/// - `variable_id` should reference a variable on the same node as the
///   episode (enforced by Prism, not this type).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableBinding {
    /// The bound variable.
    pub variable_id: VariableId,
    /// The intent for this variable within the episode.
    pub intent: VariableIntent,
}

/// Lifecycle status of an episode.
///
/// # Invariants
/// - Legal transitions: `planned -> active`, `active -> completed`,
///   `active -> abandoned`. Reverting is permitted but recorded
///   (`spec.md` §3) — enforcement lives in Prism (§4.7), not this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpisodeStatus {
    /// Defined but not yet started.
    Planned,
    /// Currently running.
    Active,
    /// Finished successfully.
    Completed,
    /// Stopped before completion.
    Abandoned,
}

impl EpisodeStatus {
    /// Returns `true` when transitioning from `self` to `next` is one of the
    /// forward-progress transitions named in `spec.md` §3.
    #[must_use]
    pub fn is_forward_transition(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Planned, Self::Active)
                | (Self::Active, Self::Completed)
                | (Self::Active, Self::Abandoned)
        )
    }
}

/// A time-bounded intervention over one or more variables.
///
/// # Invariants
/// - `end`, if present, is `>= start` (not enforced by this type).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    /// Episode identifier.
    pub id: EpisodeId,
    /// Node this episode is scoped to.
    pub node_id: NodeId,
    /// Title.
    pub title: String,
    /// Episode kind.
    pub kind: EpisodeKind,
    /// Variable bindings.
    pub variable_bindings: Vec<VariableBinding>,
    /// Optional start time.
    pub start: Option<Timestamp>,
    /// Optional end time.
    pub end: Option<Timestamp>,
    /// Related artifact identifiers.
    pub related_artifact_ids: Vec<ArtifactId>,
    /// Lifecycle status.
    pub status: EpisodeStatus,
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planned_to_active_is_forward() {
        assert!(EpisodeStatus::Planned.is_forward_transition(EpisodeStatus::Active));
    }

    #[test]
    fn active_to_planned_is_not_forward() {
        assert!(!EpisodeStatus::Active.is_forward_transition(EpisodeStatus::Planned));
    }

    #[test]
    fn active_can_complete_or_abandon() {
        assert!(EpisodeStatus::Active.is_forward_transition(EpisodeStatus::Completed));
        assert!(EpisodeStatus::Active.is_forward_transition(EpisodeStatus::Abandoned));
    }
}
