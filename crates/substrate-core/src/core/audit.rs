// crates/substrate-core/src/core/audit.rs
// ============================================================================
// Module: Substrate Audit Entries
// Description: Per-commit audit records written by Prism.
// Purpose: Model AuditEntry per spec.md §3, §4.7, §8.
// Dependencies: crate::core::{identifiers, node::NodeKind, time}
// ============================================================================

//! ## Overview
//! Every Prism operation attempt, success or failure, emits exactly one
//! [`AuditEntry`] (`spec.md` §4.7, §8). The entry carries the actor that
//! performed the operation and an optional [`CausedBy`] chain tracing the
//! operation back to the observation/policy/action run that triggered it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::ActionRunId;
use crate::core::identifiers::AuditEntryId;
use crate::core::identifiers::NodeId;
use crate::core::identifiers::ObservationId;
use crate::core::identifiers::PolicyId;
use crate::core::node::NodeKind;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Actor
// ============================================================================

/// How an actor came to perform an operation (`spec.md` §4.7).
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorMethod {
    /// A human-driven, direct operation.
    Manual,
    /// An operation issued by a policy effect during a reaction cycle.
    PolicyEffect,
    /// An operation issued while executing an approved `ActionRun`.
    ActionExecution,
    /// An operation issued through an external API caller.
    Api,
    /// An operation issued by the substrate itself (e.g. scheduled upkeep).
    System,
}

/// The node and role performing a Prism operation.
///
/// # Invariants
/// - `sponsor_id` is set only when `kind == NodeKind::Agent` acting under a
///   delegation (`spec.md` §3, §4.7).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// The node performing the operation.
    pub node_id: NodeId,
    /// The node's role.
    pub kind: NodeKind,
    /// Sponsoring node, when `node_id` is an agent acting under delegation.
    pub sponsor_id: Option<NodeId>,
    /// How the operation was initiated.
    pub method: ActorMethod,
}

// ============================================================================
// SECTION: Causality
// ============================================================================

/// Traces an operation back to the reaction cycle that produced it.
///
/// # Invariants
/// - All fields are optional; a manually issued operation may carry none of
///   them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CausedBy {
    /// The observation that triggered the reaction cycle, if any.
    pub observation_id: Option<ObservationId>,
    /// The policy whose effect produced this operation, if any.
    pub policy_id: Option<PolicyId>,
    /// The action run being executed, if any.
    pub action_run_id: Option<ActionRunId>,
    /// The effect tag that produced this operation, if any.
    pub effect_type: Option<String>,
}

// ============================================================================
// SECTION: Audit Entry
// ============================================================================

/// A single Prism operation attempt, recorded regardless of outcome.
///
/// # Invariants
/// - Exactly one `AuditEntry` is written per Prism operation attempt
///   (`spec.md` §4.7, §8).
/// - `success == false` implies no canon mutation occurred for this entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Audit entry identifier, assigned by Prism at commit time.
    pub id: AuditEntryId,
    /// When the operation was attempted.
    pub timestamp: Timestamp,
    /// The node the operation targeted.
    pub node_id: NodeId,
    /// Who performed the operation.
    pub actor: Actor,
    /// The operation kind (e.g. `"create_artifact"`, `"approve_action_run"`).
    pub operation_type: String,
    /// The resource class mutated (e.g. `"artifact"`).
    pub resource_type: String,
    /// The specific resource mutated, if applicable.
    pub resource_id: Option<String>,
    /// Opaque operation-specific detail, e.g. a diff or the effect payload.
    pub details: serde_json::Value,
    /// Causality chain back to the triggering reaction cycle.
    pub caused_by: Option<CausedBy>,
    /// Whether the operation committed successfully.
    pub success: bool,
    /// Error detail when `success == false`.
    pub error: Option<String>,
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions are permitted.")]

    use super::*;

    #[test]
    fn caused_by_default_is_empty() {
        let cb = CausedBy::default();
        assert!(cb.observation_id.is_none());
        assert!(cb.policy_id.is_none());
        assert!(cb.action_run_id.is_none());
        assert!(cb.effect_type.is_none());
    }

    #[test]
    fn failed_entry_carries_error_detail() {
        let entry = AuditEntry {
            id: AuditEntryId::new("a1").unwrap(),
            timestamp: Timestamp::parse("2026-01-01T00:00:00Z").unwrap(),
            node_id: NodeId::new("n1").unwrap(),
            actor: Actor {
                node_id: NodeId::new("n1").unwrap(),
                kind: NodeKind::Subject,
                sponsor_id: None,
                method: ActorMethod::Manual,
            },
            operation_type: "update_artifact".to_string(),
            resource_type: "artifact".to_string(),
            resource_id: Some("art-1".to_string()),
            details: serde_json::json!({}),
            caused_by: None,
            success: false,
            error: Some("authorization error".to_string()),
        };
        assert!(!entry.success);
        assert!(entry.error.is_some());
    }
}
