// crates/substrate-core/src/core/identifiers.rs
// ============================================================================
// Module: Substrate Identifiers
// Description: Canonical opaque identifiers for substrate entities.
// Purpose: Provide strongly typed, serializable identifiers with stable wire forms.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! All identifiers in the substrate are opaque strings (see `spec.md` §3). This
//! module wraps each entity's identifier in its own type so that, for example,
//! an `ObservationId` can never be passed where a `PolicyId` is expected. No
//! format is imposed beyond non-emptiness; callers (or a concrete `Repository`)
//! own id generation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Error returned when constructing an identifier from an empty string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("identifier must not be empty")]
pub struct EmptyIdentifierError;

// ============================================================================
// SECTION: Identifier Macro
// ============================================================================

/// Declares an opaque, string-backed identifier newtype.
macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier from an owned string.
            ///
            /// # Errors
            ///
            /// Returns [`EmptyIdentifierError`] when `value` is empty.
            pub fn new(value: impl Into<String>) -> Result<Self, EmptyIdentifierError> {
                let value = value.into();
                if value.is_empty() {
                    return Err(EmptyIdentifierError);
                }
                Ok(Self(value))
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consumes the identifier, returning the inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

opaque_id!(
    /// Identifies a `Node` (subject, object, or agent).
    ///
    /// # Invariants
    /// - Non-empty.
    NodeId
);

opaque_id!(
    /// Identifies an `Edge` between two nodes.
    ///
    /// # Invariants
    /// - Non-empty.
    EdgeId
);

opaque_id!(
    /// Identifies an immutable `Observation`.
    ///
    /// # Invariants
    /// - Non-empty. Stable once assigned; observations are never re-keyed.
    ObservationId
);

opaque_id!(
    /// Identifies a `Variable` (a regulated quantity on a node).
    ///
    /// # Invariants
    /// - Non-empty.
    VariableId
);

opaque_id!(
    /// Identifies an `Artifact`.
    ///
    /// # Invariants
    /// - Non-empty.
    ArtifactId
);

opaque_id!(
    /// Identifies an `Episode` (a time-bounded intervention).
    ///
    /// # Invariants
    /// - Non-empty.
    EpisodeId
);

opaque_id!(
    /// Identifies a `Policy`.
    ///
    /// # Invariants
    /// - Non-empty.
    PolicyId
);

opaque_id!(
    /// Identifies an `Entity` (event-sourced referent).
    ///
    /// # Invariants
    /// - Non-empty.
    EntityId
);

opaque_id!(
    /// Identifies an `EntityType`.
    ///
    /// # Invariants
    /// - Non-empty.
    EntityTypeId
);

opaque_id!(
    /// Identifies an `EntityEvent` within an entity's event list.
    ///
    /// # Invariants
    /// - Non-empty. Unique within its entity's event list.
    EntityEventId
);

opaque_id!(
    /// Identifies a `Grant` (explicit permission).
    ///
    /// # Invariants
    /// - Non-empty.
    GrantId
);

opaque_id!(
    /// Identifies an `ActionRun` (lifecycle record for a proposed action).
    ///
    /// # Invariants
    /// - Non-empty.
    ActionRunId
);

opaque_id!(
    /// Identifies an `AuditEntry`.
    ///
    /// # Invariants
    /// - Non-empty. Assigned by Prism at commit time.
    AuditEntryId
);

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::panic,
        reason = "Test-only assertions are permitted."
    )]

    use super::*;

    #[test]
    fn rejects_empty_identifier() {
        assert_eq!(NodeId::new(""), Err(EmptyIdentifierError));
    }

    #[test]
    fn round_trips_through_display_and_as_str() {
        let id = ObservationId::new("obs-1").unwrap();
        assert_eq!(id.as_str(), "obs-1");
        assert_eq!(id.to_string(), "obs-1");
    }

    #[test]
    fn distinct_types_do_not_coerce() {
        let node = NodeId::new("n1").unwrap();
        let policy = PolicyId::new("n1").unwrap();
        assert_eq!(node.as_str(), policy.as_str());
    }
}
