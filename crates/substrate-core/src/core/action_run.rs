// crates/substrate-core/src/core/action_run.rs
// ============================================================================
// Module: Substrate Action Runs
// Description: Lifecycle record for proposed, risk-gated actions.
// Purpose: Model ActionRun per spec.md §3; risk-gated auto-approval.
// Dependencies: crate::core::{identifiers, node::RiskLevel, policy, observation, time}
// ============================================================================

//! ## Overview
//! An `ActionRun` tracks a proposed action from `pending` through approval
//! (or rejection) to execution (or failure). Only `low`-risk actions may be
//! auto-approved (`spec.md` §3, §4.6).

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::ActionRunId;
use crate::core::identifiers::NodeId;
use crate::core::identifiers::ObservationId;
use crate::core::identifiers::PolicyId;
use crate::core::node::RiskLevel;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Status
// ============================================================================

/// Lifecycle status of an action run.
///
/// # Invariants
/// - Legal transitions: `pending -> approved|rejected`,
///   `approved -> executed|failed` (`spec.md` §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionRunStatus {
    /// Awaiting approval.
    Pending,
    /// Approved, awaiting execution.
    Approved,
    /// Rejected; terminal.
    Rejected,
    /// Executed successfully; terminal.
    Executed,
    /// Execution failed; terminal.
    Failed,
}

// ============================================================================
// SECTION: Proposal Provenance
// ============================================================================

/// Records which policy/observation pair proposed an action.
///
/// # Invariants
/// - None beyond referencing existing entities (enforced by Prism).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedBy {
    /// The policy that proposed the action.
    pub policy_id: PolicyId,
    /// The observation that triggered the evaluation cycle.
    pub observation_id: ObservationId,
}

// ============================================================================
// SECTION: Approval / Rejection / Execution
// ============================================================================

/// How an action run was approved.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalMethod {
    /// Approved automatically because its risk level permitted it.
    Auto,
    /// Approved by an explicit human/operator decision.
    Manual,
}

/// Approval record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approval {
    /// How approval was granted.
    pub method: ApprovalMethod,
    /// The node that approved (for `Manual`; the evaluating node for `Auto`).
    pub approved_by: NodeId,
    /// When approval occurred.
    pub approved_at: Timestamp,
}

/// Rejection record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    /// The node that rejected the action.
    pub rejected_by: NodeId,
    /// Optional reason.
    pub reason: Option<String>,
    /// When rejection occurred.
    pub rejected_at: Timestamp,
}

/// Execution outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Execution {
    /// When execution started.
    pub started_at: Timestamp,
    /// When execution finished (success or failure).
    pub finished_at: Timestamp,
    /// Whether execution succeeded.
    pub success: bool,
    /// Optional error detail on failure.
    pub error: Option<String>,
}

// ============================================================================
// SECTION: Action Run
// ============================================================================

/// Lifecycle record for a proposed action.
///
/// # Invariants
/// - Auto-approval is permitted only when `risk_level == RiskLevel::Low`
///   (`spec.md` §3, §8).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRun {
    /// Action run identifier.
    pub id: ActionRunId,
    /// Node this action run is scoped to.
    pub node_id: NodeId,
    /// What proposed this action.
    pub proposed_by: ProposedBy,
    /// Opaque action payload (interpreted by the effect handler).
    pub action: serde_json::Value,
    /// Declared risk level.
    pub risk_level: RiskLevel,
    /// Lifecycle status.
    pub status: ActionRunStatus,
    /// Approval record, once approved.
    pub approval: Option<Approval>,
    /// Rejection record, once rejected.
    pub rejection: Option<Rejection>,
    /// Execution record, once executed or failed.
    pub execution: Option<Execution>,
}

impl ActionRun {
    /// Returns `true` when `risk_level` is eligible for auto-approval
    /// (`spec.md` §3: "Auto-approval is permitted only for `low`").
    #[must_use]
    pub fn is_auto_approvable(&self) -> bool {
        self.risk_level == RiskLevel::Low
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn run(risk: RiskLevel) -> ActionRun {
        ActionRun {
            id: ActionRunId::new("ar1").unwrap(),
            node_id: NodeId::new("n1").unwrap(),
            proposed_by: ProposedBy {
                policy_id: PolicyId::new("p1").unwrap(),
                observation_id: ObservationId::new("o1").unwrap(),
            },
            action: serde_json::json!({ "actionType": "send_notification" }),
            risk_level: risk,
            status: ActionRunStatus::Pending,
            approval: None,
            rejection: None,
            execution: None,
        }
    }

    #[test]
    fn only_low_risk_is_auto_approvable() {
        assert!(run(RiskLevel::Low).is_auto_approvable());
        assert!(!run(RiskLevel::Medium).is_auto_approvable());
        assert!(!run(RiskLevel::High).is_auto_approvable());
        assert!(!run(RiskLevel::Critical).is_auto_approvable());
    }
}
