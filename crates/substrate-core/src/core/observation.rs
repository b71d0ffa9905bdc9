// crates/substrate-core/src/core/observation.rs
// ============================================================================
// Module: Substrate Observations
// Description: Immutable, provenance-stamped sensory events.
// Purpose: Model the append-only observation log ingested by C2.
// Dependencies: crate::core::{identifiers, time}
// ============================================================================

//! ## Overview
//! Observations are the substrate's only input channel. Once appended, an
//! observation's core fields never change (`spec.md` §3, §8). `type` is a
//! hierarchical dotted string validated by [`is_valid_observation_type`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::NodeId;
use crate::core::identifiers::ObservationId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Observation Type Validation
// ============================================================================

/// Returns `true` when `candidate` matches
/// `^[a-z][a-z0-9_]*(\.[a-z][a-z0-9_]*)*$` (`spec.md` §3).
///
/// Implemented by hand (no regex dependency) since the grammar is a small,
/// fixed state machine: each dot-separated segment must start with a
/// lowercase letter and contain only lowercase letters, digits, or
/// underscores, and the whole string must not be empty or start/end with a
/// dot.
#[must_use]
pub fn is_valid_observation_type(candidate: &str) -> bool {
    if candidate.is_empty() {
        return false;
    }
    candidate.split('.').all(is_valid_segment) && !candidate.contains("..")
}

fn is_valid_segment(segment: &str) -> bool {
    let mut chars = segment.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !first.is_ascii_lowercase() {
        return false;
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

// ============================================================================
// SECTION: Provenance
// ============================================================================

/// Mandatory metadata recording who/what produced an observation.
///
/// # Invariants
/// - `source_id` is non-empty.
/// - `confidence`, if present, lies in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    /// The node that produced the observation (sensor, integration, human).
    pub source_id: NodeId,
    /// The node sponsoring an agent-originated observation, if any.
    pub sponsor_id: Option<NodeId>,
    /// Free-text method descriptor (e.g. `"manual_entry"`, `"routed"`).
    pub method: Option<String>,
    /// Confidence in `[0, 1]`.
    pub confidence: Option<f64>,
}

impl Provenance {
    /// Returns `true` when `confidence` is absent or within `[0, 1]`.
    #[must_use]
    pub fn has_valid_confidence(&self) -> bool {
        self.confidence.is_none_or(|c| (0.0 ..= 1.0).contains(&c))
    }
}

// ============================================================================
// SECTION: Observation
// ============================================================================

/// An immutable sensory event.
///
/// # Invariants
/// - Once appended, `id`, `node_id`, `type_`, `timestamp`, `payload`, and
///   `provenance` never change (`spec.md` §8). `tags` is the sole mutable
///   field (see the `tag_observation` effect, §4.6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Observation identifier.
    pub id: ObservationId,
    /// The node this observation is scoped to.
    pub node_id: NodeId,
    /// Hierarchical dotted type, e.g. `health.sleep`.
    #[serde(rename = "type")]
    pub type_: String,
    /// Observation timestamp.
    pub timestamp: Timestamp,
    /// Opaque payload, probed by the estimator (`spec.md` §4.3 step 5) and
    /// otherwise unconstrained.
    pub payload: serde_json::Value,
    /// Mandatory provenance.
    pub provenance: Provenance,
    /// Tags, enriched over time by the `tag_observation` effect.
    pub tags: Vec<String>,
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions are permitted.")]

    use super::*;

    #[test]
    fn accepts_hierarchical_types() {
        assert!(is_valid_observation_type("health.sleep"));
        assert!(is_valid_observation_type("health.sleep.rem"));
        assert!(is_valid_observation_type("a"));
        assert!(is_valid_observation_type("a1_b"));
    }

    #[test]
    fn rejects_boundary_cases_from_spec() {
        for candidate in ["", ".x", "x.", "X.y", "x..y", "1x.y"] {
            assert!(!is_valid_observation_type(candidate), "expected rejection of {candidate:?}");
        }
    }

    #[test]
    fn confidence_out_of_range_is_invalid() {
        let p = Provenance {
            source_id: NodeId::new("n1").unwrap(),
            sponsor_id: None,
            method: None,
            confidence: Some(1.5),
        };
        assert!(!p.has_valid_confidence());
    }

    #[test]
    fn missing_confidence_is_valid() {
        let p = Provenance {
            source_id: NodeId::new("n1").unwrap(),
            sponsor_id: None,
            method: None,
            confidence: None,
        };
        assert!(p.has_valid_confidence());
    }
}
