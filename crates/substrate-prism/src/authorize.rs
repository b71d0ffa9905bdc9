// crates/substrate-prism/src/authorize.rs
// ============================================================================
// Module: Prism Authorization
// Description: Per-ActorMethod authority checks plus the agent-delegation
//              overlay.
// Purpose: Implement spec.md §4.7's authorization rules ahead of mutation.
// Dependencies: substrate-core
// ============================================================================

//! ## Overview
//! [`authorize`] runs after validation and before the transaction opens. It
//! never mutates anything; a rejection here means Prism still writes exactly
//! one failed [`substrate_core::AuditEntry`] (`spec.md` §4.7), but the audit
//! write itself happens in [`crate::Prism::commit`], not here.

// ============================================================================
// SECTION: Imports
// ============================================================================

use substrate_core::Actor;
use substrate_core::ActorMethod;
use substrate_core::NodeId;
use substrate_core::NodeKind;
use substrate_core::Repository;
use substrate_core::RiskLevel;
use substrate_core::Timestamp;

use crate::PrismError;
use crate::operation::OperationPayload;

// ============================================================================
// SECTION: Scope
// ============================================================================

/// The grant scope string a payload requires (`spec.md` §4.7 "hold an active
/// grant with the required scope").
fn required_scope(payload: &OperationPayload) -> &'static str {
    match payload {
        OperationPayload::DeleteArtifact(_) | OperationPayload::RemoveEdge(_) | OperationPayload::RevokeGrant(_) => {
            "delete"
        }
        _ => "write",
    }
}

/// The existing resource id a payload targets, if it targets one (as opposed
/// to creating a fresh resource).
fn target_resource_id(payload: &OperationPayload) -> Option<&str> {
    match payload {
        OperationPayload::UpdateNode { id, .. } => Some(id.as_str()),
        OperationPayload::RemoveEdge(id) => Some(id.as_str()),
        OperationPayload::UpdateArtifact { id, .. }
        | OperationPayload::UpdateArtifactStatus { id, .. }
        | OperationPayload::DeleteArtifact(id) => Some(id.as_str()),
        OperationPayload::UpdateEpisodeStatus { id, .. } => Some(id.as_str()),
        OperationPayload::UpdateVariable { id, .. } => Some(id.as_str()),
        OperationPayload::UpdatePolicy { id, .. } => Some(id.as_str()),
        OperationPayload::ApproveActionRun { id, .. }
        | OperationPayload::RejectActionRun { id, .. }
        | OperationPayload::ExecuteActionRun { id, .. } => Some(id.as_str()),
        OperationPayload::AppendEntityEvent { entity_id, .. } => Some(entity_id.as_str()),
        OperationPayload::RevokeGrant(id) => Some(id.as_str()),
        _ => None,
    }
}

// ============================================================================
// SECTION: Authorization
// ============================================================================

/// Checks whether `actor` may perform `payload` against `node_id`
/// (`spec.md` §4.7).
///
/// # Errors
///
/// Returns [`PrismError::Authorization`] when the actor's method, grants, or
/// delegation do not cover the operation.
pub fn authorize(
    repository: &dyn Repository,
    actor: &Actor,
    node_id: &NodeId,
    payload: &OperationPayload,
    effect_type: Option<&str>,
    now: Timestamp,
) -> Result<(), PrismError> {
    check_method(repository, actor, node_id, payload, now)?;
    if actor.kind == NodeKind::Agent {
        check_delegation_overlay(repository, actor, payload, effect_type, now)?;
    }
    Ok(())
}

/// The base, method-specific authority check (`spec.md` §4.7).
fn check_method(
    repository: &dyn Repository,
    actor: &Actor,
    node_id: &NodeId,
    payload: &OperationPayload,
    now: Timestamp,
) -> Result<(), PrismError> {
    match actor.method {
        ActorMethod::System => Ok(()),
        ActorMethod::PolicyEffect | ActorMethod::ActionExecution => {
            if &actor.node_id == node_id {
                Ok(())
            } else {
                Err(PrismError::Authorization(format!(
                    "{:?} actor {} does not own node {node_id}",
                    actor.method, actor.node_id
                )))
            }
        }
        ActorMethod::Manual | ActorMethod::Api => {
            if &actor.node_id == node_id {
                return Ok(());
            }
            let scope = required_scope(payload);
            let resource_type = payload.resource_type();
            let resource_id = target_resource_id(payload).unwrap_or_default();
            let grants = repository.list_grants_for_grantee(&actor.node_id).map_err(PrismError::Repository)?;
            let covers = grants
                .iter()
                .any(|grant| grant.is_active(now) && grant.covers(resource_type, resource_id, scope));
            if covers {
                Ok(())
            } else {
                Err(PrismError::Authorization(format!(
                    "actor {} holds no active grant covering {resource_type}:{scope}",
                    actor.node_id
                )))
            }
        }
    }
}

/// The agent-delegation overlay (`spec.md` §4.7, §3).
fn check_delegation_overlay(
    repository: &dyn Repository,
    actor: &Actor,
    payload: &OperationPayload,
    effect_type: Option<&str>,
    now: Timestamp,
) -> Result<(), PrismError> {
    let delegation = repository
        .get_agent_delegation(&actor.node_id)
        .map_err(PrismError::Repository)?
        .ok_or_else(|| PrismError::Authorization(format!("agent {} has no delegation on record", actor.node_id)))?;
    if !delegation.constraints.is_active(now) {
        return Err(PrismError::Authorization(format!("agent {} delegation has expired", actor.node_id)));
    }
    if let Some(sponsor_id) = &actor.sponsor_id
        && sponsor_id != &delegation.sponsor_id
    {
        return Err(PrismError::Authorization(format!(
            "agent {} is not delegated by sponsor {sponsor_id}",
            actor.node_id
        )));
    }
    if let Some(tag) = effect_type
        && !delegation.constraints.permits_effect(tag)
    {
        return Err(PrismError::Authorization(format!(
            "agent {} delegation does not permit effect {tag}",
            actor.node_id
        )));
    }
    if let OperationPayload::CreateActionRun(draft) = payload
        && !delegation.constraints.permits_risk(draft.risk_level)
    {
        return Err(PrismError::Authorization(format!(
            "agent {} delegation caps risk below {:?}",
            actor.node_id, draft.risk_level
        )));
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions are permitted.")]

    use substrate_core::AgentDelegation;
    use substrate_core::DelegationConstraints;
    use substrate_core::Node;
    use substrate_store_memory::InMemoryStore;

    use super::*;
    use crate::operation::NodeDraft;

    fn node(id: &str, kind: NodeKind, now: Timestamp) -> Node {
        Node {
            id: NodeId::new(id).unwrap(),
            kind,
            name: id.to_string(),
            description: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn system_actor_is_always_authorized() {
        let store = InMemoryStore::new();
        let node_id = NodeId::new("n1").unwrap();
        let actor = Actor {
            node_id: NodeId::new("svc").unwrap(),
            kind: NodeKind::Object,
            sponsor_id: None,
            method: ActorMethod::System,
        };
        let payload = OperationPayload::CreateNode(NodeDraft {
            kind: NodeKind::Subject,
            name: "x".to_string(),
            description: None,
        });
        let now = Timestamp::parse("2026-01-01T00:00:00Z").unwrap();
        assert!(authorize(&store, &actor, &node_id, &payload, None, now).is_ok());
    }

    #[test]
    fn manual_actor_owning_node_is_authorized() {
        let store = InMemoryStore::new();
        let node_id = NodeId::new("n1").unwrap();
        let actor = Actor {
            node_id: node_id.clone(),
            kind: NodeKind::Subject,
            sponsor_id: None,
            method: ActorMethod::Manual,
        };
        let payload = OperationPayload::UpdateNode { id: node_id.clone(), name: "x".to_string(), description: None };
        let now = Timestamp::parse("2026-01-01T00:00:00Z").unwrap();
        assert!(authorize(&store, &actor, &node_id, &payload, None, now).is_ok());
    }

    #[test]
    fn manual_actor_without_grant_is_rejected() {
        let store = InMemoryStore::new();
        let node_id = NodeId::new("n1").unwrap();
        let actor = Actor {
            node_id: NodeId::new("outsider").unwrap(),
            kind: NodeKind::Subject,
            sponsor_id: None,
            method: ActorMethod::Manual,
        };
        let payload = OperationPayload::UpdateNode { id: node_id.clone(), name: "x".to_string(), description: None };
        let now = Timestamp::parse("2026-01-01T00:00:00Z").unwrap();
        let err = authorize(&store, &actor, &node_id, &payload, None, now).unwrap_err();
        assert!(matches!(err, PrismError::Authorization(_)));
    }

    #[test]
    fn agent_without_delegation_is_rejected() {
        let store = InMemoryStore::new();
        let node_id = NodeId::new("n1").unwrap();
        let actor = Actor {
            node_id: NodeId::new("agent1").unwrap(),
            kind: NodeKind::Agent,
            sponsor_id: Some(node_id.clone()),
            method: ActorMethod::PolicyEffect,
        };
        let payload = OperationPayload::UpdateNode { id: node_id.clone(), name: "x".to_string(), description: None };
        let now = Timestamp::parse("2026-01-01T00:00:00Z").unwrap();
        let err = authorize(&store, &actor, &node_id, &payload, None, now).unwrap_err();
        assert!(matches!(err, PrismError::Authorization(_)));
    }

    #[test]
    fn agent_delegation_caps_risk_on_create_action_run() {
        let store = InMemoryStore::new();
        let sponsor = node("sponsor", NodeKind::Subject, Timestamp::parse("2026-01-01T00:00:00Z").unwrap());
        store.create_node(sponsor.clone()).unwrap();
        let delegation = AgentDelegation {
            agent_id: NodeId::new("agent1").unwrap(),
            sponsor_id: sponsor.id.clone(),
            scopes: vec!["write".to_string()],
            constraints: DelegationConstraints {
                max_risk_level: RiskLevel::Low,
                allowed_effects: vec!["propose_action".to_string()],
                expires_at: None,
            },
        };
        store.set_agent_delegation(delegation).unwrap();
        let actor = Actor {
            node_id: NodeId::new("agent1").unwrap(),
            kind: NodeKind::Agent,
            sponsor_id: Some(sponsor.id.clone()),
            method: ActorMethod::PolicyEffect,
        };
        let payload = OperationPayload::CreateActionRun(crate::operation::ActionRunDraft {
            node_id: sponsor.id.clone(),
            proposed_by: substrate_core::ProposedBy {
                policy_id: substrate_core::PolicyId::new("p1").unwrap(),
                observation_id: substrate_core::ObservationId::new("o1").unwrap(),
            },
            action: serde_json::json!({}),
            risk_level: RiskLevel::High,
        });
        let now = Timestamp::parse("2026-01-01T00:00:00Z").unwrap();
        let err = authorize(&store, &actor, &sponsor.id, &payload, Some("propose_action"), now).unwrap_err();
        assert!(matches!(err, PrismError::Authorization(_)));
    }
}
