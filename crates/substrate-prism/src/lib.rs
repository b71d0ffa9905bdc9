// crates/substrate-prism/src/lib.rs
// ============================================================================
// Module: Substrate Prism
// Description: The single transactional commit boundary for canon mutation.
// Purpose: Implement C7 per spec.md §4.7: validate, authorize, mutate, and
//          audit every write to canon through one path.
// Dependencies: substrate-core, substrate-config, serde_json, thiserror, tracing, uuid
// ============================================================================

//! ## Overview
//! `Prism` is the only path that mutates canon (`spec.md` §1, §4.7). A
//! caller builds a [`operation::PrismOperation`] naming an actor, optional
//! causality, and an [`operation::OperationPayload`], then calls
//! [`Prism::commit`]. `commit` runs a fixed pipeline: validate the payload's
//! own invariants, [`authorize::authorize`] the actor against it, mutate
//! canon (inside a [`substrate_core::Repository::transaction`] unless
//! disabled), and write exactly one [`substrate_core::AuditEntry`] regardless
//! of outcome (`spec.md` §4.7, §8).
//!
//! Identity for newly created resources is minted here, once, via
//! [`ids::IdGenerator`] — no other crate in this workspace generates a canon
//! identifier. Entity event folding is likewise delegated to a caller-
//! supplied [`substrate_core::EntityStateReducer`], since the core has no
//! opinion on what any particular `EntityType`'s state looks like.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod authorize;
pub mod error;
pub mod ids;
pub mod operation;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cell::RefCell;

use substrate_config::SubstrateConfig;
use substrate_core::ActionRunId;
use substrate_core::ActionRunStatus;
use substrate_core::Actor;
use substrate_core::Approval;
use substrate_core::ApprovalMethod;
use substrate_core::Artifact;
use substrate_core::ArtifactId;
use substrate_core::AuditEntry;
use substrate_core::AuditEntryId;
use substrate_core::EdgeId;
use substrate_core::Entity;
use substrate_core::EntityEvent;
use substrate_core::EntityEventId;
use substrate_core::EntityId;
use substrate_core::EntityStateReducer;
use substrate_core::Episode;
use substrate_core::EpisodeId;
use substrate_core::GrantId;
use substrate_core::Node;
use substrate_core::NodeId;
use substrate_core::Observation;
use substrate_core::ObservationId;
use substrate_core::Policy;
use substrate_core::PolicyId;
use substrate_core::Provenance;
use substrate_core::Rejection;
use substrate_core::Repository;
use substrate_core::RepositoryError;
use substrate_core::Timestamp;
use substrate_core::Variable;
use substrate_core::VariableId;
use tracing::instrument;
use tracing::warn;

use crate::error::PrismError;
use crate::ids::IdGenerator;
use crate::operation::OperationEnvelope;
use crate::operation::OperationPayload;
use crate::operation::PrismOperation;

// ============================================================================
// SECTION: Commit Outcome
// ============================================================================

/// What [`Prism::commit`] hands back on success.
#[derive(Debug, Clone)]
pub struct CommitOutcome {
    /// The audit entry written for this attempt, when auditing is enabled
    /// (`SubstrateConfig::audit_enabled`).
    pub audit_entry: Option<AuditEntry>,
    /// The created or updated resource, as JSON (shape depends on the
    /// operation; e.g. the updated `Node`, or `{"artifact": ..., "revision":
    /// ...}` for an artifact update).
    pub result: serde_json::Value,
}

// ============================================================================
// SECTION: Prism
// ============================================================================

/// The commit boundary: validate, authorize, mutate, audit (`spec.md` §4.7).
pub struct Prism<'a> {
    /// Backing store mutated by `commit`.
    repository: &'a dyn Repository,
    /// Mints identifiers for newly created resources.
    ids: &'a dyn IdGenerator,
    /// Folds entity events into materialized state.
    reducer: &'a dyn EntityStateReducer,
    /// Ambient configuration (audit/transaction toggles).
    config: &'a SubstrateConfig,
}

impl<'a> Prism<'a> {
    /// Builds a `Prism` bound to a repository, id generator, entity-state
    /// reducer, and configuration.
    #[must_use]
    pub const fn new(
        repository: &'a dyn Repository,
        ids: &'a dyn IdGenerator,
        reducer: &'a dyn EntityStateReducer,
        config: &'a SubstrateConfig,
    ) -> Self {
        Self { repository, ids, reducer, config }
    }

    /// Attempts to commit `operation`, returning its result or the reason it
    /// was rejected. Writes exactly one `AuditEntry` for this attempt when
    /// `config.audit_enabled` (`spec.md` §4.7, §8).
    ///
    /// # Errors
    ///
    /// Returns [`PrismError`] when the payload's own invariants fail,
    /// authorization is rejected, or the repository mutation itself fails.
    #[instrument(
        skip(self, operation),
        fields(node_id = %operation.node_id, operation_type = operation.payload.operation_type())
    )]
    pub fn commit(&self, operation: PrismOperation, now: Timestamp) -> Result<CommitOutcome, PrismError> {
        let PrismOperation { node_id, envelope, payload } = operation;
        let effect_type = envelope.caused_by.as_ref().and_then(|caused_by| caused_by.effect_type.as_deref());

        if let Err(reason) = validate_payload(&payload) {
            return self.fail(&node_id, &envelope, &payload, now, reason);
        }
        if let Err(err) = authorize::authorize(self.repository, &envelope.actor, &node_id, &payload, effect_type, now)
        {
            return self.fail(&node_id, &envelope, &payload, now, err);
        }

        let outcome: RefCell<Option<serde_json::Value>> = RefCell::new(None);
        let failure: RefCell<Option<PrismError>> = RefCell::new(None);
        let mut attempt = |repo: &dyn Repository| -> Result<(), RepositoryError> {
            match apply_payload(repo, self.ids, self.reducer, &envelope.actor, &payload, now) {
                Ok(value) => {
                    *outcome.borrow_mut() = Some(value);
                    Ok(())
                }
                Err(err) => {
                    let marker = RepositoryError::Conflict(err.to_string());
                    *failure.borrow_mut() = Some(err);
                    Err(marker)
                }
            }
        };

        let attempt_result = if self.config.transactions_enabled {
            self.repository.transaction(&mut attempt)
        } else {
            attempt(self.repository)
        };

        match attempt_result {
            Ok(()) => {
                let value = outcome.into_inner().unwrap_or(serde_json::Value::Null);
                self.succeed(&node_id, &envelope, &payload, now, value)
            }
            Err(repo_err) => {
                let err = failure.into_inner().unwrap_or_else(|| PrismError::Repository(repo_err));
                self.fail(&node_id, &envelope, &payload, now, err)
            }
        }
    }

    /// Writes a failed audit entry (best-effort) and returns `err`.
    fn fail(
        &self,
        node_id: &NodeId,
        envelope: &OperationEnvelope,
        payload: &OperationPayload,
        now: Timestamp,
        err: PrismError,
    ) -> Result<CommitOutcome, PrismError> {
        if self.config.audit_enabled
            && let Ok(entry) = self.build_audit_entry(node_id, envelope, payload, now, false, Some(err.to_string()), None)
        {
            if let Err(audit_err) = self.repository.append_audit_entry(entry) {
                warn!(error = %audit_err, "failed to write audit entry for rejected operation");
            }
        }
        Err(err)
    }

    /// Writes a successful audit entry and returns the outcome.
    fn succeed(
        &self,
        node_id: &NodeId,
        envelope: &OperationEnvelope,
        payload: &OperationPayload,
        now: Timestamp,
        value: serde_json::Value,
    ) -> Result<CommitOutcome, PrismError> {
        let audit_entry = if self.config.audit_enabled {
            let entry = self.build_audit_entry(node_id, envelope, payload, now, true, None, Some(&value))?;
            Some(self.repository.append_audit_entry(entry)?)
        } else {
            None
        };
        Ok(CommitOutcome { audit_entry, result: value })
    }

    /// Assembles the `AuditEntry` for one commit attempt.
    fn build_audit_entry(
        &self,
        node_id: &NodeId,
        envelope: &OperationEnvelope,
        payload: &OperationPayload,
        now: Timestamp,
        success: bool,
        error: Option<String>,
        outcome: Option<&serde_json::Value>,
    ) -> Result<AuditEntry, PrismError> {
        Ok(AuditEntry {
            id: AuditEntryId::new(self.ids.generate())?,
            timestamp: now,
            node_id: node_id.clone(),
            actor: envelope.actor.clone(),
            operation_type: payload.operation_type().to_string(),
            resource_type: payload.resource_type().to_string(),
            resource_id: resource_id_for(payload, outcome),
            details: outcome.cloned().unwrap_or_else(|| serde_json::json!({})),
            caused_by: envelope.caused_by.clone(),
            success,
            error,
        })
    }
}

// ============================================================================
// SECTION: Causality Trace
// ============================================================================

/// Returns every audit entry on `node_id` directly caused by
/// `observation_id`, oldest first. Makes the audit trail's causality chain
/// queryable rather than only ever written — the "auditable engine" framing
/// this workspace is built around implies a caller can ask "what did this
/// observation cause", not just find it recorded somewhere in a full audit
/// dump.
///
/// This walks one hop of `CausedBy`: entries whose `caused_by.observation_id`
/// names `observation_id` directly. It does not follow a `route_observation`
/// copy onto another node back to further downstream effects, since the
/// routed copy is a new `Observation` with its own id and `Repository` only
/// exposes per-node audit listings — see `DESIGN.md` for the open question
/// this leaves unresolved.
///
/// # Errors
///
/// Returns [`PrismError::Repository`] if the underlying listing fails.
pub fn trace(repository: &dyn Repository, node_id: &NodeId, observation_id: &ObservationId) -> Result<Vec<AuditEntry>, PrismError> {
    let mut entries: Vec<AuditEntry> = repository
        .list_audit_entries_for_node(node_id)?
        .into_iter()
        .filter(|entry| entry.caused_by.as_ref().and_then(|caused_by| caused_by.observation_id.as_ref()) == Some(observation_id))
        .collect();
    entries.sort_by_key(|entry| entry.timestamp);
    Ok(entries)
}

// ============================================================================
// SECTION: Payload Validation
// ============================================================================

/// Stateless invariant checks a payload must satisfy before authorization
/// even runs (`spec.md` §3's type-level invariants).
fn validate_payload(payload: &OperationPayload) -> Result<(), PrismError> {
    if let OperationPayload::AddEdge(draft) = payload
        && draft.from == draft.to
    {
        return Err(PrismError::Conflict("edge endpoints must differ".to_string()));
    }
    if let OperationPayload::CreateEpisode(draft) = payload
        && let (Some(start), Some(end)) = (draft.start, draft.end)
        && end < start
    {
        return Err(PrismError::Conflict("episode end must not precede start".to_string()));
    }
    Ok(())
}

// ============================================================================
// SECTION: Payload Application
// ============================================================================

/// Performs the repository mutation(s) for one payload, returning the
/// created or updated resource as JSON.
#[allow(clippy::too_many_lines, reason = "One dispatch arm per OperationPayload variant reads best as a single match.")]
fn apply_payload(
    repo: &dyn Repository,
    ids: &dyn IdGenerator,
    reducer: &dyn EntityStateReducer,
    actor: &Actor,
    payload: &OperationPayload,
    now: Timestamp,
) -> Result<serde_json::Value, PrismError> {
    match payload {
        OperationPayload::CreateNode(draft) => {
            let node = Node {
                id: NodeId::new(ids.generate())?,
                kind: draft.kind,
                name: draft.name.clone(),
                description: draft.description.clone(),
                created_at: now,
                updated_at: now,
            };
            to_json(&repo.create_node(node)?)
        }
        OperationPayload::UpdateNode { id, name, description } => {
            let mut node = repo.get_node(id)?.ok_or_else(|| not_found("node", id))?;
            node.name.clone_from(name);
            node.description.clone_from(description);
            node.updated_at = now;
            to_json(&repo.update_node(node)?)
        }
        OperationPayload::AddEdge(draft) => {
            let edge = substrate_core::Edge {
                id: EdgeId::new(ids.generate())?,
                from: draft.from.clone(),
                to: draft.to.clone(),
                kind: draft.kind,
                created_at: now,
            };
            to_json(&repo.add_edge(edge)?)
        }
        OperationPayload::RemoveEdge(id) => {
            if repo.remove_edge(id)? {
                Ok(serde_json::json!({ "removed": true }))
            } else {
                Err(not_found("edge", id))
            }
        }
        OperationPayload::CreateArtifact(draft) => {
            let artifact = Artifact {
                id: ArtifactId::new(ids.generate())?,
                node_id: draft.node_id.clone(),
                title: draft.title.clone(),
                about: draft.about.clone(),
                notes: draft.notes.clone(),
                page: draft.page.clone(),
                status: draft.status,
                trunk_version: 1,
                entity_refs: draft.entity_refs.clone(),
            };
            to_json(&repo.create_artifact(artifact, actor.node_id.clone())?)
        }
        OperationPayload::UpdateArtifact { id, changes } => {
            let mut artifact = repo.get_artifact(id)?.ok_or_else(|| not_found("artifact", id))?;
            artifact.title.clone_from(&changes.title);
            artifact.about.clone_from(&changes.about);
            artifact.notes.clone_from(&changes.notes);
            artifact.page.clone_from(&changes.page);
            artifact.entity_refs.clone_from(&changes.entity_refs);
            let (artifact, revision) = repo.update_artifact(artifact, actor.node_id.clone(), changes.message.clone())?;
            Ok(serde_json::json!({ "artifact": to_json(&artifact)?, "revision": to_json(&revision)? }))
        }
        OperationPayload::UpdateArtifactStatus { id, status } => {
            let mut artifact = repo.get_artifact(id)?.ok_or_else(|| not_found("artifact", id))?;
            artifact.status = *status;
            let (artifact, revision) = repo.update_artifact(artifact, actor.node_id.clone(), None)?;
            Ok(serde_json::json!({ "artifact": to_json(&artifact)?, "revision": to_json(&revision)? }))
        }
        OperationPayload::DeleteArtifact(id) => {
            if repo.delete_artifact(id)? {
                Ok(serde_json::json!({ "deleted": true }))
            } else {
                Err(not_found("artifact", id))
            }
        }
        OperationPayload::CreateEpisode(draft) => {
            let episode = Episode {
                id: EpisodeId::new(ids.generate())?,
                node_id: draft.node_id.clone(),
                title: draft.title.clone(),
                kind: draft.kind,
                variable_bindings: draft.variable_bindings.clone(),
                start: draft.start,
                end: draft.end,
                related_artifact_ids: draft.related_artifact_ids.clone(),
                status: substrate_core::EpisodeStatus::Planned,
            };
            to_json(&repo.create_episode(episode)?)
        }
        OperationPayload::UpdateEpisodeStatus { id, status } => {
            let mut episode = repo.get_episode(id)?.ok_or_else(|| not_found("episode", id))?;
            let forward = episode.status.is_forward_transition(*status);
            episode.status = *status;
            let episode = repo.update_episode(episode)?;
            Ok(serde_json::json!({ "episode": to_json(&episode)?, "forwardTransition": forward }))
        }
        OperationPayload::CreateVariable(draft) => {
            let variable = variable_from_draft(VariableId::new(ids.generate())?, draft);
            to_json(&repo.create_variable(variable)?)
        }
        OperationPayload::UpdateVariable { id, draft } => {
            let variable = variable_from_draft(id.clone(), draft);
            to_json(&repo.update_variable(variable)?)
        }
        OperationPayload::CreatePolicy(draft) => {
            let policy = policy_from_draft(PolicyId::new(ids.generate())?, draft, now);
            to_json(&repo.create_policy(policy)?)
        }
        OperationPayload::UpdatePolicy { id, draft } => {
            let policy = policy_from_draft(id.clone(), draft, now);
            to_json(&repo.update_policy(policy)?)
        }
        OperationPayload::CreateActionRun(draft) => {
            let action_run = substrate_core::ActionRun {
                id: ActionRunId::new(ids.generate())?,
                node_id: draft.node_id.clone(),
                proposed_by: draft.proposed_by.clone(),
                action: draft.action.clone(),
                risk_level: draft.risk_level,
                status: ActionRunStatus::Pending,
                approval: None,
                rejection: None,
                execution: None,
            };
            let created = repo.create_action_run(action_run)?;
            if created.is_auto_approvable() {
                let approval = Approval { method: ApprovalMethod::Auto, approved_by: actor.node_id.clone(), approved_at: now };
                let approved = repo.approve_action_run(&created.id, approval)?.ok_or_else(|| not_found("action_run", &created.id))?;
                to_json(&approved)
            } else {
                to_json(&created)
            }
        }
        OperationPayload::ApproveActionRun { id, approved_by, method } => {
            let approval = Approval { method: *method, approved_by: approved_by.clone(), approved_at: now };
            match repo.approve_action_run(id, approval)? {
                Some(run) => to_json(&run),
                None => Err(not_found("action_run", id)),
            }
        }
        OperationPayload::RejectActionRun { id, rejected_by, reason } => {
            let rejection = Rejection { rejected_by: rejected_by.clone(), reason: reason.clone(), rejected_at: now };
            match repo.reject_action_run(id, rejection)? {
                Some(run) => to_json(&run),
                None => Err(not_found("action_run", id)),
            }
        }
        OperationPayload::ExecuteActionRun { id, execution } => {
            match repo.execute_action_run(id, execution.clone())? {
                Some(run) => to_json(&run),
                None => Err(not_found("action_run", id)),
            }
        }
        OperationPayload::CreateEntity(draft) => {
            let entity = Entity {
                id: EntityId::new(ids.generate())?,
                node_id: draft.node_id.clone(),
                type_id: draft.type_id.clone(),
                state: draft.initial_state.clone(),
                events: Vec::new(),
            };
            to_json(&repo.create_entity(entity)?)
        }
        OperationPayload::AppendEntityEvent { entity_id, event_type, data } => {
            let entity = repo.get_entity(entity_id)?.ok_or_else(|| not_found("entity", entity_id))?;
            let event = EntityEvent {
                id: EntityEventId::new(ids.generate())?,
                entity_id: entity_id.clone(),
                type_: event_type.clone(),
                data: data.clone(),
                timestamp: now,
                actor_node_id: actor.node_id.clone(),
            };
            let new_state = reducer.apply(&entity.type_id, &entity.state, &event);
            to_json(&repo.append_entity_event(entity_id, event, new_state)?)
        }
        OperationPayload::SetAgentDelegation(delegation) => to_json(&repo.set_agent_delegation(delegation.clone())?),
        OperationPayload::CreateGrant(draft) => {
            let grant = substrate_core::Grant {
                id: GrantId::new(ids.generate())?,
                grantee_node_id: draft.grantee_node_id.clone(),
                resource_type: draft.resource_type.clone(),
                resource_id: draft.resource_id.clone(),
                scopes: draft.scopes.clone(),
                grantor_node_id: draft.grantor_node_id.clone(),
                granted_at: now,
                expires_at: draft.expires_at,
                revoked: None,
            };
            to_json(&repo.create_grant(grant)?)
        }
        OperationPayload::RevokeGrant(id) => match repo.revoke_grant(id)? {
            Some(grant) => to_json(&grant),
            None => Err(not_found("grant", id)),
        },
        OperationPayload::RouteObservation { observation_id, to_node_id } => {
            let source = repo.get_observation(observation_id)?.ok_or_else(|| not_found("observation", observation_id))?;
            let mut tags = source.tags.clone();
            tags.push(format!("routed_from:{}", source.node_id));
            let routed = Observation {
                id: ObservationId::new(ids.generate())?,
                node_id: to_node_id.clone(),
                type_: source.type_.clone(),
                timestamp: source.timestamp,
                payload: source.payload.clone(),
                provenance: Provenance {
                    source_id: source.node_id.clone(),
                    sponsor_id: source.provenance.sponsor_id.clone(),
                    method: Some("routed".to_string()),
                    confidence: source.provenance.confidence,
                },
                tags,
            };
            to_json(&repo.append_observation(routed)?)
        }
    }
}

/// Builds a `Variable` from a draft and an id, shared by the create/update
/// handlers.
fn variable_from_draft(id: VariableId, draft: &operation::VariableDraft) -> Variable {
    Variable {
        id,
        node_id: draft.node_id.clone(),
        key: draft.key.clone(),
        title: draft.title.clone(),
        kind: draft.kind,
        unit: draft.unit.clone(),
        viable_range: draft.viable_range,
        preferred_range: draft.preferred_range,
        compute_specs: draft.compute_specs.clone(),
    }
}

/// Builds a `Policy` from a draft and an id, shared by the create/update
/// handlers.
fn policy_from_draft(id: PolicyId, draft: &operation::PolicyDraft, updated_at: Timestamp) -> Policy {
    Policy {
        id,
        node_id: draft.node_id.clone(),
        name: draft.name.clone(),
        priority: draft.priority,
        enabled: draft.enabled,
        triggers: draft.triggers.clone(),
        implementation: draft.implementation.clone(),
        updated_at,
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Serializes `value`, wrapping any (practically unreachable) failure as a
/// `PrismError::Conflict` rather than panicking.
fn to_json<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, PrismError> {
    serde_json::to_value(value).map_err(|err| PrismError::Conflict(format!("serialization error: {err}")))
}

/// Builds a `PrismError::NotFound` for `resource_type`/`resource_id`.
fn not_found(resource_type: &str, resource_id: impl std::fmt::Display) -> PrismError {
    PrismError::NotFound { resource_type: resource_type.to_string(), resource_id: resource_id.to_string() }
}

/// The resource id recorded on an `AuditEntry` for `payload`: the existing id
/// for mutations, or the freshly minted id pulled from `outcome` for creates.
fn resource_id_for(payload: &OperationPayload, outcome: Option<&serde_json::Value>) -> Option<String> {
    match payload {
        OperationPayload::CreateNode(_)
        | OperationPayload::AddEdge(_)
        | OperationPayload::CreateArtifact(_)
        | OperationPayload::CreateEpisode(_)
        | OperationPayload::CreateVariable(_)
        | OperationPayload::CreatePolicy(_)
        | OperationPayload::CreateActionRun(_)
        | OperationPayload::CreateEntity(_)
        | OperationPayload::CreateGrant(_) => {
            outcome.and_then(|value| value.get("id").and_then(serde_json::Value::as_str)).map(str::to_string)
        }
        OperationPayload::UpdateNode { id, .. } => Some(id.to_string()),
        OperationPayload::RemoveEdge(id) => Some(id.to_string()),
        OperationPayload::UpdateArtifact { id, .. }
        | OperationPayload::UpdateArtifactStatus { id, .. }
        | OperationPayload::DeleteArtifact(id) => Some(id.to_string()),
        OperationPayload::UpdateEpisodeStatus { id, .. } => Some(id.to_string()),
        OperationPayload::UpdateVariable { id, .. } => Some(id.to_string()),
        OperationPayload::UpdatePolicy { id, .. } => Some(id.to_string()),
        OperationPayload::ApproveActionRun { id, .. }
        | OperationPayload::RejectActionRun { id, .. }
        | OperationPayload::ExecuteActionRun { id, .. } => Some(id.to_string()),
        OperationPayload::AppendEntityEvent { entity_id, .. } => Some(entity_id.to_string()),
        OperationPayload::SetAgentDelegation(delegation) => Some(delegation.agent_id.to_string()),
        OperationPayload::RevokeGrant(id) => Some(id.to_string()),
        OperationPayload::RouteObservation { to_node_id, .. } => Some(to_node_id.to_string()),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions are permitted.")]

    use substrate_core::ActorMethod;
    use substrate_core::CausedBy;
    use substrate_core::NodeKind;
    use substrate_store_memory::InMemoryStore;

    use super::*;
    use crate::ids::UuidGenerator;
    use crate::operation::NodeDraft;

    struct NullReducer;

    impl EntityStateReducer for NullReducer {
        fn initial_state(&self, _type_id: &substrate_core::EntityTypeId) -> serde_json::Value {
            serde_json::json!({})
        }

        fn apply(
            &self,
            _type_id: &substrate_core::EntityTypeId,
            _state: &serde_json::Value,
            event: &EntityEvent,
        ) -> serde_json::Value {
            event.data.clone()
        }
    }

    fn now() -> Timestamp {
        Timestamp::parse("2026-01-01T00:00:00Z").unwrap()
    }

    fn system_actor() -> Actor {
        Actor { node_id: NodeId::new("system").unwrap(), kind: NodeKind::Object, sponsor_id: None, method: ActorMethod::System }
    }

    fn envelope() -> OperationEnvelope {
        OperationEnvelope { actor: system_actor(), caused_by: None }
    }

    fn harness() -> (InMemoryStore, UuidGenerator, NullReducer, SubstrateConfig) {
        (InMemoryStore::new(), UuidGenerator, NullReducer, SubstrateConfig::default())
    }

    #[test]
    fn create_node_commits_and_writes_audit_entry() {
        let (store, ids, reducer, config) = harness();
        let prism = Prism::new(&store, &ids, &reducer, &config);
        let op = PrismOperation {
            node_id: NodeId::new("anything").unwrap(),
            envelope: envelope(),
            payload: OperationPayload::CreateNode(NodeDraft { kind: NodeKind::Subject, name: "Alice".to_string(), description: None }),
        };
        let outcome = prism.commit(op, now()).unwrap();
        assert_eq!(outcome.result["name"], "Alice");
        let audit_entry = outcome.audit_entry.unwrap();
        assert!(audit_entry.success);
        assert_eq!(audit_entry.operation_type, "create_node");
        assert_eq!(store.list_nodes().unwrap().len(), 1);
    }

    #[test]
    fn rejected_authorization_still_writes_failed_audit_entry() {
        let (store, ids, reducer, config) = harness();
        let prism = Prism::new(&store, &ids, &reducer, &config);
        let node_id = NodeId::new("n1").unwrap();
        let outsider =
            Actor { node_id: NodeId::new("outsider").unwrap(), kind: NodeKind::Subject, sponsor_id: None, method: ActorMethod::Manual };
        let op = PrismOperation {
            node_id: node_id.clone(),
            envelope: OperationEnvelope { actor: outsider, caused_by: None },
            payload: OperationPayload::UpdateNode { id: node_id, name: "x".to_string(), description: None },
        };
        let err = prism.commit(op, now()).unwrap_err();
        assert!(matches!(err, PrismError::Authorization(_)));
        assert_eq!(store.list_audit_entries_for_node(&NodeId::new("n1").unwrap()).unwrap().len(), 1);
        let entries = store.list_audit_entries_for_node(&NodeId::new("n1").unwrap()).unwrap();
        assert!(!entries[0].success);
    }

    #[test]
    fn self_loop_edge_is_rejected_before_authorization() {
        let (store, ids, reducer, config) = harness();
        let prism = Prism::new(&store, &ids, &reducer, &config);
        let node_id = NodeId::new("n1").unwrap();
        let op = PrismOperation {
            node_id: node_id.clone(),
            envelope: envelope(),
            payload: OperationPayload::AddEdge(operation::EdgeDraft {
                from: node_id.clone(),
                to: node_id,
                kind: substrate_core::EdgeKind::Follows,
            }),
        };
        let err = prism.commit(op, now()).unwrap_err();
        assert!(matches!(err, PrismError::Conflict(_)));
    }

    #[test]
    fn low_risk_action_run_is_auto_approved() {
        let (store, ids, reducer, config) = harness();
        let prism = Prism::new(&store, &ids, &reducer, &config);
        let node_id = NodeId::new("n1").unwrap();
        store
            .create_node(Node { id: node_id.clone(), kind: NodeKind::Subject, name: "n1".to_string(), description: None, created_at: now(), updated_at: now() })
            .unwrap();
        let op = PrismOperation {
            node_id: node_id.clone(),
            envelope: envelope(),
            payload: OperationPayload::CreateActionRun(operation::ActionRunDraft {
                node_id,
                proposed_by: substrate_core::ProposedBy {
                    policy_id: PolicyId::new("p1").unwrap(),
                    observation_id: ObservationId::new("o1").unwrap(),
                },
                action: serde_json::json!({ "actionType": "send_notification" }),
                risk_level: substrate_core::RiskLevel::Low,
            }),
        };
        let outcome = prism.commit(op, now()).unwrap();
        assert_eq!(outcome.result["status"], "approved");
    }

    #[test]
    fn append_entity_event_folds_through_reducer() {
        let (store, ids, reducer, config) = harness();
        let prism = Prism::new(&store, &ids, &reducer, &config);
        let node_id = NodeId::new("n1").unwrap();
        let type_id = substrate_core::EntityTypeId::new("counter").unwrap();
        let entity = store
            .create_entity(Entity { id: EntityId::new("e1").unwrap(), node_id, type_id, state: serde_json::json!({}), events: Vec::new() })
            .unwrap();
        let op = PrismOperation {
            node_id: entity.node_id.clone(),
            envelope: envelope(),
            payload: OperationPayload::AppendEntityEvent {
                entity_id: entity.id.clone(),
                event_type: "observed".to_string(),
                data: serde_json::json!({ "count": 1 }),
            },
        };
        let outcome = prism.commit(op, now()).unwrap();
        assert_eq!(outcome.result["state"]["count"], 1);
    }

    #[test]
    fn route_observation_appends_copy_with_routed_provenance() {
        let (store, ids, reducer, config) = harness();
        let prism = Prism::new(&store, &ids, &reducer, &config);
        let source_node = NodeId::new("source").unwrap();
        let target_node = NodeId::new("target").unwrap();
        let observation = store
            .append_observation(Observation {
                id: ObservationId::new("o1").unwrap(),
                node_id: source_node.clone(),
                type_: "health.sleep".to_string(),
                timestamp: now(),
                payload: serde_json::json!({ "hours": 7 }),
                provenance: Provenance { source_id: source_node.clone(), sponsor_id: None, method: None, confidence: None },
                tags: Vec::new(),
            })
            .unwrap();
        let op = PrismOperation {
            node_id: target_node.clone(),
            envelope: OperationEnvelope {
                actor: system_actor(),
                caused_by: Some(CausedBy { effect_type: Some("route_observation".to_string()), ..CausedBy::default() }),
            },
            payload: OperationPayload::RouteObservation { observation_id: observation.id, to_node_id: target_node.clone() },
        };
        let outcome = prism.commit(op, now()).unwrap();
        assert_eq!(outcome.result["node_id"], target_node.to_string());
        assert_eq!(outcome.result["provenance"]["method"], "routed");
        assert!(outcome.result["tags"].as_array().unwrap().iter().any(|tag| tag == "routed_from:source"));
    }

    #[test]
    fn trace_returns_only_entries_caused_by_the_named_observation() {
        let (store, ids, reducer, config) = harness();
        let prism = Prism::new(&store, &ids, &reducer, &config);
        let node_id = NodeId::new("n1").unwrap();
        let triggering = ObservationId::new("o1").unwrap();
        let other = ObservationId::new("o2").unwrap();
        let caused_by_trigger =
            OperationEnvelope { actor: system_actor(), caused_by: Some(CausedBy { observation_id: Some(triggering.clone()), ..CausedBy::default() }) };
        let caused_by_other =
            OperationEnvelope { actor: system_actor(), caused_by: Some(CausedBy { observation_id: Some(other), ..CausedBy::default() }) };
        let uncaused = envelope();

        prism
            .commit(
                PrismOperation {
                    node_id: node_id.clone(),
                    envelope: caused_by_trigger,
                    payload: OperationPayload::CreateNode(NodeDraft { kind: NodeKind::Subject, name: "from trigger".to_string(), description: None }),
                },
                now(),
            )
            .unwrap();
        prism
            .commit(
                PrismOperation {
                    node_id: node_id.clone(),
                    envelope: caused_by_other,
                    payload: OperationPayload::CreateNode(NodeDraft { kind: NodeKind::Subject, name: "from other".to_string(), description: None }),
                },
                now(),
            )
            .unwrap();
        prism
            .commit(
                PrismOperation {
                    node_id: node_id.clone(),
                    envelope: uncaused,
                    payload: OperationPayload::CreateNode(NodeDraft { kind: NodeKind::Subject, name: "uncaused".to_string(), description: None }),
                },
                now(),
            )
            .unwrap();

        let traced = trace(&store, &node_id, &triggering).unwrap();
        assert_eq!(traced.len(), 1);
        assert_eq!(traced[0].details["name"], "from trigger");
    }

    #[test]
    fn disabling_audit_suppresses_entry_but_still_commits() {
        let (store, ids, reducer, mut config) = harness();
        config.audit_enabled = false;
        let prism = Prism::new(&store, &ids, &reducer, &config);
        let op = PrismOperation {
            node_id: NodeId::new("anything").unwrap(),
            envelope: envelope(),
            payload: OperationPayload::CreateNode(NodeDraft { kind: NodeKind::Object, name: "silent".to_string(), description: None }),
        };
        let outcome = prism.commit(op, now()).unwrap();
        assert!(outcome.audit_entry.is_none());
        assert_eq!(store.list_nodes().unwrap().len(), 1);
    }

    #[test]
    fn disabling_transactions_still_applies_mutation_directly() {
        let (store, ids, reducer, mut config) = harness();
        config.transactions_enabled = false;
        let prism = Prism::new(&store, &ids, &reducer, &config);
        let op = PrismOperation {
            node_id: NodeId::new("anything").unwrap(),
            envelope: envelope(),
            payload: OperationPayload::CreateNode(NodeDraft { kind: NodeKind::Object, name: "direct".to_string(), description: None }),
        };
        prism.commit(op, now()).unwrap();
        assert_eq!(store.list_nodes().unwrap().len(), 1);
    }
}
