// crates/substrate-core/src/core/grant.rs
// ============================================================================
// Module: Substrate Grants
// Description: Explicit, scoped permissions between nodes.
// Purpose: Model Grant per spec.md §3; "active" semantics used by Prism (C7).
// Dependencies: crate::core::{identifiers, time}
// ============================================================================

//! ## Overview
//! A `Grant` is explicit permission from one node (the grantor) to another
//! (the grantee) over a resource. A grant is "active" iff it is not revoked
//! and has not expired (`spec.md` §3, §4.7).

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::GrantId;
use crate::core::identifiers::NodeId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Grant
// ============================================================================

/// A resource identifier: either a specific id or the wildcard `"*"`.
///
/// # Invariants
/// - `All` serializes as the literal string `"*"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceScope {
    /// Every resource of `resource_type`.
    All,
    /// A specific resource id.
    Id(String),
}

/// An explicit permission grant.
///
/// # Invariants
/// - "Active" means `revoked != Some(true)` and (`expires_at` is absent or
///   strictly in the future relative to the query time).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    /// Grant identifier.
    pub id: GrantId,
    /// The node receiving the permission.
    pub grantee_node_id: NodeId,
    /// The resource class this grant applies to (e.g. `"artifact"`).
    pub resource_type: String,
    /// The specific resource, or `ResourceScope::All`.
    pub resource_id: ResourceScope,
    /// Permitted scopes (e.g. `["read", "write"]`).
    pub scopes: Vec<String>,
    /// The node that issued the grant.
    pub grantor_node_id: NodeId,
    /// When the grant was issued.
    pub granted_at: Timestamp,
    /// Optional expiry.
    pub expires_at: Option<Timestamp>,
    /// Whether the grant has been revoked.
    pub revoked: Option<bool>,
}

impl Grant {
    /// Returns `true` when this grant is active at `now`.
    #[must_use]
    pub fn is_active(&self, now: Timestamp) -> bool {
        if self.revoked == Some(true) {
            return false;
        }
        self.expires_at.is_none_or(|expiry| now <= expiry)
    }

    /// Returns `true` when this grant covers `resource_type`/`resource_id`
    /// and includes `scope`.
    #[must_use]
    pub fn covers(&self, resource_type: &str, resource_id: &str, scope: &str) -> bool {
        if self.resource_type != resource_type {
            return false;
        }
        let resource_matches = match &self.resource_id {
            ResourceScope::All => true,
            ResourceScope::Id(id) => id == resource_id,
        };
        resource_matches && self.scopes.iter().any(|s| s == scope)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions are permitted.")]

    use super::*;

    fn grant(resource_id: ResourceScope, expires: Option<Timestamp>, revoked: Option<bool>) -> Grant {
        Grant {
            id: GrantId::new("g1").unwrap(),
            grantee_node_id: NodeId::new("n1").unwrap(),
            resource_type: "artifact".to_string(),
            resource_id,
            scopes: vec!["write".to_string()],
            grantor_node_id: NodeId::new("n0").unwrap(),
            granted_at: Timestamp::parse("2026-01-01T00:00:00Z").unwrap(),
            expires_at: expires,
            revoked,
        }
    }

    #[test]
    fn revoked_grant_is_inactive() {
        let now = Timestamp::parse("2026-07-28T00:00:00Z").unwrap();
        let g = grant(ResourceScope::All, None, Some(true));
        assert!(!g.is_active(now));
    }

    #[test]
    fn expired_grant_is_inactive() {
        let now = Timestamp::parse("2026-07-28T00:00:00Z").unwrap();
        let past = Timestamp::parse("2026-01-01T00:00:00Z").unwrap();
        let g = grant(ResourceScope::All, Some(past), None);
        assert!(!g.is_active(now));
    }

    #[test]
    fn wildcard_resource_covers_any_id() {
        let g = grant(ResourceScope::All, None, None);
        assert!(g.covers("artifact", "anything", "write"));
        assert!(!g.covers("artifact", "anything", "delete"));
        assert!(!g.covers("episode", "anything", "write"));
    }

    #[test]
    fn specific_resource_requires_exact_match() {
        let g = grant(ResourceScope::Id("a1".to_string()), None, None);
        assert!(g.covers("artifact", "a1", "write"));
        assert!(!g.covers("artifact", "a2", "write"));
    }
}
