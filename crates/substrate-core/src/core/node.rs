// crates/substrate-core/src/core/node.rs
// ============================================================================
// Module: Substrate Nodes
// Description: Node, Edge, and AgentDelegation types.
// Purpose: Model the authority/observation boundary that scopes the substrate.
// Dependencies: crate::core::{identifiers, time}
// ============================================================================

//! ## Overview
//! A `Node` is a boundary that scopes authority and observations (`spec.md`
//! §3). Nodes relate to each other through directed `Edge`s, and an `agent`
//! node may act on behalf of a `sponsor` node only within the bounds of an
//! [`AgentDelegation`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::EdgeId;
use crate::core::identifiers::NodeId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Node
// ============================================================================

/// A node's role in the substrate.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// A human or organization being regulated.
    Subject,
    /// A passive referent (device, location, external entity).
    Object,
    /// An actor that can propose and, within delegation, execute actions.
    Agent,
}

/// A boundary that scopes authority and observations.
///
/// # Invariants
/// - `id` is immutable once assigned.
/// - `created_at <= updated_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Node identifier.
    pub id: NodeId,
    /// Node role.
    pub kind: NodeKind,
    /// Display name.
    pub name: String,
    /// Optional free-text description.
    pub description: Option<String>,
    /// Creation timestamp.
    pub created_at: Timestamp,
    /// Last update timestamp.
    pub updated_at: Timestamp,
}

// ============================================================================
// SECTION: Edge
// ============================================================================

/// Kinds of directed relationship between two nodes.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// `from` follows `to` (e.g. a subscription-like relation).
    Follows,
    /// `from` is a member of `to`.
    MemberOf,
    /// `from` maintains `to` (e.g. a caregiver relation).
    Maintains,
    /// `from` feeds observations into `to`.
    Feeds,
    /// `from` shares data with `to`.
    SharesWith,
}

/// A directed relationship between two nodes.
///
/// # Invariants
/// - `from != to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// Edge identifier.
    pub id: EdgeId,
    /// Source node.
    pub from: NodeId,
    /// Target node.
    pub to: NodeId,
    /// Relationship kind.
    pub kind: EdgeKind,
    /// Creation timestamp.
    pub created_at: Timestamp,
}

// ============================================================================
// SECTION: Agent Delegation
// ============================================================================

/// Risk level associated with a proposed action (see [`crate::core::action_run`]).
///
/// # Invariants
/// - Ordered from least to most severe; `Ord` reflects severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Low risk; eligible for auto-approval.
    Low,
    /// Medium risk.
    Medium,
    /// High risk.
    High,
    /// Critical risk.
    Critical,
}

/// Constraints bounding what a delegated agent may do on a sponsor's behalf.
///
/// # Invariants
/// - `max_risk_level` caps auto-approval (§4.7); it does not grant approval
///   authority by itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationConstraints {
    /// Maximum risk level the agent may act at.
    pub max_risk_level: RiskLevel,
    /// Effect types the agent is permitted to trigger, by tag.
    pub allowed_effects: Vec<String>,
    /// Expiry; `None` means no explicit expiry.
    pub expires_at: Option<Timestamp>,
}

/// A delegation pairing an `agent` node with a `sponsor` node.
///
/// # Invariants
/// - An agent may not modify its own delegation.
/// - An agent may not grant authority to other agents.
/// - An agent may not approve above its `max_risk_level`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDelegation {
    /// The delegated agent.
    pub agent_id: NodeId,
    /// The sponsoring node the agent acts on behalf of.
    pub sponsor_id: NodeId,
    /// Scope strings (interpreted by policy/effect authors).
    pub scopes: Vec<String>,
    /// Constraints bounding the delegation.
    pub constraints: DelegationConstraints,
}

impl DelegationConstraints {
    /// Returns `true` when the delegation is still active at `now`.
    #[must_use]
    pub fn is_active(&self, now: Timestamp) -> bool {
        match self.expires_at {
            Some(expiry) => now <= expiry,
            None => true,
        }
    }

    /// Returns `true` when `risk` is within the delegation's cap.
    #[must_use]
    pub fn permits_risk(&self, risk: RiskLevel) -> bool {
        risk <= self.max_risk_level
    }

    /// Returns `true` when `effect_tag` is whitelisted.
    #[must_use]
    pub fn permits_effect(&self, effect_tag: &str) -> bool {
        self.allowed_effects.iter().any(|allowed| allowed == effect_tag)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions are permitted.")]

    use super::*;

    fn constraints(max: RiskLevel, expires: Option<Timestamp>) -> DelegationConstraints {
        DelegationConstraints {
            max_risk_level: max,
            allowed_effects: vec!["propose_action".to_string()],
            expires_at: expires,
        }
    }

    #[test]
    fn risk_cap_is_inclusive() {
        let c = constraints(RiskLevel::Medium, None);
        assert!(c.permits_risk(RiskLevel::Low));
        assert!(c.permits_risk(RiskLevel::Medium));
        assert!(!c.permits_risk(RiskLevel::High));
    }

    #[test]
    fn expired_delegation_is_inactive() {
        let now = Timestamp::parse("2026-07-28T00:00:00Z").unwrap();
        let past = Timestamp::parse("2026-01-01T00:00:00Z").unwrap();
        let c = constraints(RiskLevel::Low, Some(past));
        assert!(!c.is_active(now));
    }

    #[test]
    fn effect_whitelist_is_exact_match() {
        let c = constraints(RiskLevel::Low, None);
        assert!(c.permits_effect("propose_action"));
        assert!(!c.permits_effect("tag_observation"));
    }
}
