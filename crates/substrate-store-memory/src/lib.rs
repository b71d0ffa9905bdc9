// crates/substrate-store-memory/src/lib.rs
// ============================================================================
// Module: Substrate In-Memory Store
// Description: A reference, in-process Repository implementation.
// Purpose: Exercise every other crate's tests without a real database (C1).
// Dependencies: substrate-core, serde_json, thiserror
// ============================================================================

//! ## Overview
//! `spec.md` §1 keeps concrete relational/filesystem backends out of scope,
//! but every other component needs *some* [`Repository`] to run its tests
//! against. `InMemoryStore` is that reference implementation: a single
//! [`Mutex`]-guarded snapshot of every entity class, with `transaction`
//! implemented by snapshotting the whole state before running the closure and
//! restoring it on `Err` — the simplest strategy that honors the trait's
//! all-or-nothing contract without a real write-ahead log.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Mutex;

use substrate_core::ActionRun;
use substrate_core::ActionRunId;
use substrate_core::ActionRunStatus;
use substrate_core::AgentDelegation;
use substrate_core::Approval;
use substrate_core::Artifact;
use substrate_core::ArtifactId;
use substrate_core::AuditEntry;
use substrate_core::AuditEntryId;
use substrate_core::Edge;
use substrate_core::EdgeId;
use substrate_core::Entity;
use substrate_core::EntityEvent;
use substrate_core::EntityId;
use substrate_core::EntityType;
use substrate_core::EntityTypeId;
use substrate_core::Episode;
use substrate_core::EpisodeId;
use substrate_core::EpisodeStatus;
use substrate_core::Execution;
use substrate_core::Grant;
use substrate_core::GrantId;
use substrate_core::Node;
use substrate_core::NodeId;
use substrate_core::Observation;
use substrate_core::ObservationFilter;
use substrate_core::ObservationId;
use substrate_core::Policy;
use substrate_core::PolicyId;
use substrate_core::Rejection;
use substrate_core::Clock;
use substrate_core::Repository;
use substrate_core::RepositoryError;
use substrate_core::Revision;
use substrate_core::SystemClock;
use substrate_core::Timestamp;
use substrate_core::Variable;
use substrate_core::VariableId;

// ============================================================================
// SECTION: State
// ============================================================================

#[derive(Debug, Clone, Default)]
struct StoreState {
    /// Nodes by id.
    nodes: HashMap<NodeId, Node>,
    /// Edges by id.
    edges: HashMap<EdgeId, Edge>,
    /// Agent delegations keyed by the delegated agent's node id.
    delegations: HashMap<NodeId, AgentDelegation>,
    /// Observations by id.
    observations: HashMap<ObservationId, Observation>,
    /// Variables by id.
    variables: HashMap<VariableId, Variable>,
    /// Artifacts by id.
    artifacts: HashMap<ArtifactId, Artifact>,
    /// Each artifact's revisions, in ascending version order.
    revisions: HashMap<ArtifactId, Vec<Revision>>,
    /// Episodes by id.
    episodes: HashMap<EpisodeId, Episode>,
    /// Policies by id.
    policies: HashMap<PolicyId, Policy>,
    /// Entity types by id.
    entity_types: HashMap<EntityTypeId, EntityType>,
    /// Entities by id.
    entities: HashMap<EntityId, Entity>,
    /// Grants by id.
    grants: HashMap<GrantId, Grant>,
    /// Action runs by id.
    action_runs: HashMap<ActionRunId, ActionRun>,
    /// Audit entries by id.
    audit_entries: HashMap<AuditEntryId, AuditEntry>,
}

/// An in-process, `Mutex`-backed [`Repository`] implementation.
///
/// # Invariants
/// - Every method call acquires the lock only for its own duration; no method
///   holds the lock across a call into another method.
pub struct InMemoryStore {
    /// Guarded entity storage.
    state: Mutex<StoreState>,
    /// Clock used to stamp revision `created_at` fields.
    clock: Box<dyn Clock>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Creates an empty store backed by the system clock, used to stamp
    /// revisions at write time (`spec.md` §3 does not include `created_at`
    /// on `Artifact` itself, only on each `Revision`).
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Box::new(SystemClock))
    }

    /// Creates an empty store backed by the given clock, for deterministic
    /// tests.
    #[must_use]
    pub fn with_clock(clock: Box<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            clock,
        }
    }

    /// Locks the guarded state, mapping mutex poisoning to a backend error.
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, StoreState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Backend("in-memory store mutex poisoned".to_string()))
    }
}

// ============================================================================
// SECTION: Observation Filtering
// ============================================================================

/// Returns `true` when `observation_type` satisfies both an optional exact
/// match and an optional prefix match.
fn matches_type_pattern(observation_type: &str, type_: Option<&str>, type_prefix: Option<&str>) -> bool {
    if let Some(exact) = type_
        && observation_type != exact
    {
        return false;
    }
    if let Some(prefix) = type_prefix
        && !observation_type.starts_with(prefix)
    {
        return false;
    }
    true
}

/// Resolves the inclusive lower bound of `filter`'s effective time window,
/// applying the default 24-hour window when neither `window` nor
/// `time_range` is set (`spec.md` §4.4).
fn window_start(filter: &ObservationFilter) -> Option<Timestamp> {
    if let Some(range) = &filter.time_range {
        return range.start;
    }
    if let Some(window) = &filter.window {
        return Some(filter.reference_time.minus_hours(window.hours));
    }
    if filter.uses_default_window() {
        return Some(filter.reference_time.minus_hours(ObservationFilter::DEFAULT_WINDOW_HOURS));
    }
    None
}

/// Resolves the inclusive upper bound of `filter`'s effective time window.
fn window_end(filter: &ObservationFilter) -> Option<Timestamp> {
    filter.time_range.as_ref().and_then(|range| range.end)
}

/// Renders an [`ActionRunStatus`] for error messages without reaching for
/// `{:?}` Debug formatting.
const fn action_run_status_label(status: ActionRunStatus) -> &'static str {
    match status {
        ActionRunStatus::Pending => "pending",
        ActionRunStatus::Approved => "approved",
        ActionRunStatus::Rejected => "rejected",
        ActionRunStatus::Executed => "executed",
        ActionRunStatus::Failed => "failed",
    }
}

// ============================================================================
// SECTION: Repository Implementation
// ============================================================================

impl Repository for InMemoryStore {
    // -- Nodes ---------------------------------------------------------
    fn create_node(&self, node: Node) -> Result<Node, RepositoryError> {
        let mut state = self.lock()?;
        if state.nodes.contains_key(&node.id) {
            return Err(RepositoryError::Conflict(format!("node already exists: {}", node.id)));
        }
        state.nodes.insert(node.id.clone(), node.clone());
        Ok(node)
    }

    fn get_node(&self, id: &NodeId) -> Result<Option<Node>, RepositoryError> {
        Ok(self.lock()?.nodes.get(id).cloned())
    }

    fn list_nodes(&self) -> Result<Vec<Node>, RepositoryError> {
        Ok(self.lock()?.nodes.values().cloned().collect())
    }

    fn update_node(&self, node: Node) -> Result<Node, RepositoryError> {
        let mut state = self.lock()?;
        if !state.nodes.contains_key(&node.id) {
            return Err(RepositoryError::Conflict(format!("node not found: {}", node.id)));
        }
        state.nodes.insert(node.id.clone(), node.clone());
        Ok(node)
    }

    // -- Edges -----------------------------------------------------------
    fn add_edge(&self, edge: Edge) -> Result<Edge, RepositoryError> {
        let mut state = self.lock()?;
        if state.edges.contains_key(&edge.id) {
            return Err(RepositoryError::Conflict(format!("edge already exists: {}", edge.id)));
        }
        state.edges.insert(edge.id.clone(), edge.clone());
        Ok(edge)
    }

    fn remove_edge(&self, id: &EdgeId) -> Result<bool, RepositoryError> {
        Ok(self.lock()?.edges.remove(id).is_some())
    }

    fn list_edges_from(&self, node_id: &NodeId) -> Result<Vec<Edge>, RepositoryError> {
        Ok(self
            .lock()?
            .edges
            .values()
            .filter(|edge| &edge.from == node_id)
            .cloned()
            .collect())
    }

    // -- Agent delegation --------------------------------------------------
    fn set_agent_delegation(&self, delegation: AgentDelegation) -> Result<AgentDelegation, RepositoryError> {
        let mut state = self.lock()?;
        state.delegations.insert(delegation.agent_id.clone(), delegation.clone());
        Ok(delegation)
    }

    fn get_agent_delegation(&self, agent_id: &NodeId) -> Result<Option<AgentDelegation>, RepositoryError> {
        Ok(self.lock()?.delegations.get(agent_id).cloned())
    }

    // -- Observations --------------------------------------------------
    fn append_observation(&self, observation: Observation) -> Result<Observation, RepositoryError> {
        let mut state = self.lock()?;
        if state.observations.contains_key(&observation.id) {
            return Err(RepositoryError::Conflict(format!(
                "observation already exists: {}",
                observation.id
            )));
        }
        state.observations.insert(observation.id.clone(), observation.clone());
        Ok(observation)
    }

    fn get_observation(&self, id: &ObservationId) -> Result<Option<Observation>, RepositoryError> {
        Ok(self.lock()?.observations.get(id).cloned())
    }

    fn query_observations(&self, filter: &ObservationFilter) -> Result<Vec<Observation>, RepositoryError> {
        let state = self.lock()?;
        let start = window_start(filter);
        let end = window_end(filter);
        let mut matched: Vec<Observation> = state
            .observations
            .values()
            .filter(|obs| filter.node_id.as_ref().is_none_or(|node_id| &obs.node_id == node_id))
            .filter(|obs| matches_type_pattern(&obs.type_, filter.type_.as_deref(), filter.type_prefix.as_deref()))
            .filter(|obs| start.is_none_or(|start| obs.timestamp >= start))
            .filter(|obs| end.is_none_or(|end| obs.timestamp <= end))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        let limit = filter.effective_limit();
        Ok(matched.into_iter().skip(filter.offset).take(limit).collect())
    }

    fn tag_observation(&self, id: &ObservationId, tags: &[String]) -> Result<Option<Observation>, RepositoryError> {
        let mut state = self.lock()?;
        let Some(observation) = state.observations.get_mut(id) else {
            return Ok(None);
        };
        for tag in tags {
            if !observation.tags.contains(tag) {
                observation.tags.push(tag.clone());
            }
        }
        Ok(Some(observation.clone()))
    }

    // -- Variables -------------------------------------------------------
    fn create_variable(&self, variable: Variable) -> Result<Variable, RepositoryError> {
        let mut state = self.lock()?;
        if state.variables.contains_key(&variable.id) {
            return Err(RepositoryError::Conflict(format!(
                "variable already exists: {}",
                variable.id
            )));
        }
        state.variables.insert(variable.id.clone(), variable.clone());
        Ok(variable)
    }

    fn get_variable(&self, id: &VariableId) -> Result<Option<Variable>, RepositoryError> {
        Ok(self.lock()?.variables.get(id).cloned())
    }

    fn list_variables_for_node(&self, node_id: &NodeId) -> Result<Vec<Variable>, RepositoryError> {
        Ok(self
            .lock()?
            .variables
            .values()
            .filter(|variable| &variable.node_id == node_id)
            .cloned()
            .collect())
    }

    fn update_variable(&self, variable: Variable) -> Result<Variable, RepositoryError> {
        let mut state = self.lock()?;
        if !state.variables.contains_key(&variable.id) {
            return Err(RepositoryError::Conflict(format!("variable not found: {}", variable.id)));
        }
        state.variables.insert(variable.id.clone(), variable.clone());
        Ok(variable)
    }

    // -- Artifacts + revisions --------------------------------------------
    fn create_artifact(&self, artifact: Artifact, author_id: NodeId) -> Result<Artifact, RepositoryError> {
        let mut state = self.lock()?;
        if state.artifacts.contains_key(&artifact.id) {
            return Err(RepositoryError::Conflict(format!(
                "artifact already exists: {}",
                artifact.id
            )));
        }
        let first_revision = Revision {
            artifact_id: artifact.id.clone(),
            version: 1,
            author_id,
            message: None,
            snapshot: artifact.snapshot(),
            created_at: self.clock.now(),
        };
        state.revisions.insert(artifact.id.clone(), vec![first_revision]);
        state.artifacts.insert(artifact.id.clone(), artifact.clone());
        Ok(artifact)
    }

    fn get_artifact(&self, id: &ArtifactId) -> Result<Option<Artifact>, RepositoryError> {
        Ok(self.lock()?.artifacts.get(id).cloned())
    }

    fn list_artifacts_for_node(&self, node_id: &NodeId) -> Result<Vec<Artifact>, RepositoryError> {
        Ok(self
            .lock()?
            .artifacts
            .values()
            .filter(|artifact| &artifact.node_id == node_id)
            .cloned()
            .collect())
    }

    fn update_artifact(
        &self,
        mut artifact: Artifact,
        author_id: NodeId,
        message: Option<String>,
    ) -> Result<(Artifact, Revision), RepositoryError> {
        let mut state = self.lock()?;
        if !state.artifacts.contains_key(&artifact.id) {
            return Err(RepositoryError::Conflict(format!("artifact not found: {}", artifact.id)));
        }
        let revisions = state.revisions.entry(artifact.id.clone()).or_default();
        let next_version = revisions.last().map_or(1, |last| last.version + 1);
        artifact.trunk_version = next_version;
        let revision = Revision {
            artifact_id: artifact.id.clone(),
            version: next_version,
            author_id,
            message,
            snapshot: artifact.snapshot(),
            created_at: self.clock.now(),
        };
        revisions.push(revision.clone());
        state.artifacts.insert(artifact.id.clone(), artifact.clone());
        Ok((artifact, revision))
    }

    fn delete_artifact(&self, id: &ArtifactId) -> Result<bool, RepositoryError> {
        let mut state = self.lock()?;
        state.revisions.remove(id);
        Ok(state.artifacts.remove(id).is_some())
    }

    fn list_revisions(&self, artifact_id: &ArtifactId) -> Result<Vec<Revision>, RepositoryError> {
        Ok(self.lock()?.revisions.get(artifact_id).cloned().unwrap_or_default())
    }

    // -- Episodes ----------------------------------------------------------
    fn create_episode(&self, episode: Episode) -> Result<Episode, RepositoryError> {
        let mut state = self.lock()?;
        if state.episodes.contains_key(&episode.id) {
            return Err(RepositoryError::Conflict(format!(
                "episode already exists: {}",
                episode.id
            )));
        }
        state.episodes.insert(episode.id.clone(), episode.clone());
        Ok(episode)
    }

    fn get_episode(&self, id: &EpisodeId) -> Result<Option<Episode>, RepositoryError> {
        Ok(self.lock()?.episodes.get(id).cloned())
    }

    fn list_episodes_for_node(&self, node_id: &NodeId) -> Result<Vec<Episode>, RepositoryError> {
        Ok(self
            .lock()?
            .episodes
            .values()
            .filter(|episode| &episode.node_id == node_id)
            .cloned()
            .collect())
    }

    fn list_active_episodes_for_node(&self, node_id: &NodeId) -> Result<Vec<Episode>, RepositoryError> {
        Ok(self
            .lock()?
            .episodes
            .values()
            .filter(|episode| &episode.node_id == node_id && episode.status == EpisodeStatus::Active)
            .cloned()
            .collect())
    }

    fn update_episode(&self, episode: Episode) -> Result<Episode, RepositoryError> {
        let mut state = self.lock()?;
        if !state.episodes.contains_key(&episode.id) {
            return Err(RepositoryError::Conflict(format!("episode not found: {}", episode.id)));
        }
        state.episodes.insert(episode.id.clone(), episode.clone());
        Ok(episode)
    }

    // -- Policies ------------------------------------------------------
    fn create_policy(&self, policy: Policy) -> Result<Policy, RepositoryError> {
        let mut state = self.lock()?;
        if state.policies.contains_key(&policy.id) {
            return Err(RepositoryError::Conflict(format!("policy already exists: {}", policy.id)));
        }
        state.policies.insert(policy.id.clone(), policy.clone());
        Ok(policy)
    }

    fn get_policy(&self, id: &PolicyId) -> Result<Option<Policy>, RepositoryError> {
        Ok(self.lock()?.policies.get(id).cloned())
    }

    fn list_policies_for_node(&self, node_id: &NodeId) -> Result<Vec<Policy>, RepositoryError> {
        Ok(self
            .lock()?
            .policies
            .values()
            .filter(|policy| &policy.node_id == node_id)
            .cloned()
            .collect())
    }

    fn update_policy(&self, policy: Policy) -> Result<Policy, RepositoryError> {
        let mut state = self.lock()?;
        if !state.policies.contains_key(&policy.id) {
            return Err(RepositoryError::Conflict(format!("policy not found: {}", policy.id)));
        }
        state.policies.insert(policy.id.clone(), policy.clone());
        Ok(policy)
    }

    // -- Entities ------------------------------------------------------
    fn create_entity_type(&self, entity_type: EntityType) -> Result<EntityType, RepositoryError> {
        let mut state = self.lock()?;
        if state.entity_types.contains_key(&entity_type.id) {
            return Err(RepositoryError::Conflict(format!(
                "entity type already exists: {}",
                entity_type.id
            )));
        }
        state.entity_types.insert(entity_type.id.clone(), entity_type.clone());
        Ok(entity_type)
    }

    fn get_entity_type(&self, id: &EntityTypeId) -> Result<Option<EntityType>, RepositoryError> {
        Ok(self.lock()?.entity_types.get(id).cloned())
    }

    fn list_entity_types(&self) -> Result<Vec<EntityType>, RepositoryError> {
        Ok(self.lock()?.entity_types.values().cloned().collect())
    }

    fn create_entity(&self, entity: Entity) -> Result<Entity, RepositoryError> {
        let mut state = self.lock()?;
        if state.entities.contains_key(&entity.id) {
            return Err(RepositoryError::Conflict(format!("entity already exists: {}", entity.id)));
        }
        state.entities.insert(entity.id.clone(), entity.clone());
        Ok(entity)
    }

    fn get_entity(&self, id: &EntityId) -> Result<Option<Entity>, RepositoryError> {
        Ok(self.lock()?.entities.get(id).cloned())
    }

    fn list_entities_for_node(&self, node_id: &NodeId) -> Result<Vec<Entity>, RepositoryError> {
        Ok(self
            .lock()?
            .entities
            .values()
            .filter(|entity| &entity.node_id == node_id)
            .cloned()
            .collect())
    }

    fn append_entity_event(
        &self,
        entity_id: &EntityId,
        event: EntityEvent,
        new_state: serde_json::Value,
    ) -> Result<Entity, RepositoryError> {
        let mut state = self.lock()?;
        let Some(entity) = state.entities.get_mut(entity_id) else {
            return Err(RepositoryError::Conflict(format!("entity not found: {entity_id}")));
        };
        entity.events.push(event);
        entity.state = new_state;
        Ok(entity.clone())
    }

    // -- Grants --------------------------------------------------------
    fn create_grant(&self, grant: Grant) -> Result<Grant, RepositoryError> {
        let mut state = self.lock()?;
        if state.grants.contains_key(&grant.id) {
            return Err(RepositoryError::Conflict(format!("grant already exists: {}", grant.id)));
        }
        state.grants.insert(grant.id.clone(), grant.clone());
        Ok(grant)
    }

    fn get_grant(&self, id: &GrantId) -> Result<Option<Grant>, RepositoryError> {
        Ok(self.lock()?.grants.get(id).cloned())
    }

    fn list_grants_for_grantee(&self, grantee_node_id: &NodeId) -> Result<Vec<Grant>, RepositoryError> {
        Ok(self
            .lock()?
            .grants
            .values()
            .filter(|grant| &grant.grantee_node_id == grantee_node_id)
            .cloned()
            .collect())
    }

    fn revoke_grant(&self, id: &GrantId) -> Result<Option<Grant>, RepositoryError> {
        let mut state = self.lock()?;
        let Some(grant) = state.grants.get_mut(id) else {
            return Ok(None);
        };
        grant.revoked = Some(true);
        Ok(Some(grant.clone()))
    }

    // -- Action runs -----------------------------------------------------
    fn create_action_run(&self, action_run: ActionRun) -> Result<ActionRun, RepositoryError> {
        let mut state = self.lock()?;
        if state.action_runs.contains_key(&action_run.id) {
            return Err(RepositoryError::Conflict(format!(
                "action run already exists: {}",
                action_run.id
            )));
        }
        state.action_runs.insert(action_run.id.clone(), action_run.clone());
        Ok(action_run)
    }

    fn get_action_run(&self, id: &ActionRunId) -> Result<Option<ActionRun>, RepositoryError> {
        Ok(self.lock()?.action_runs.get(id).cloned())
    }

    fn list_action_runs_for_node(&self, node_id: &NodeId) -> Result<Vec<ActionRun>, RepositoryError> {
        Ok(self
            .lock()?
            .action_runs
            .values()
            .filter(|run| &run.node_id == node_id)
            .cloned()
            .collect())
    }

    fn approve_action_run(&self, id: &ActionRunId, approval: Approval) -> Result<Option<ActionRun>, RepositoryError> {
        let mut state = self.lock()?;
        let Some(run) = state.action_runs.get_mut(id) else {
            return Ok(None);
        };
        if run.status != ActionRunStatus::Pending {
            return Err(RepositoryError::Conflict(format!(
                "action run {id} is not pending: {}",
                action_run_status_label(run.status)
            )));
        }
        run.status = ActionRunStatus::Approved;
        run.approval = Some(approval);
        Ok(Some(run.clone()))
    }

    fn reject_action_run(&self, id: &ActionRunId, rejection: Rejection) -> Result<Option<ActionRun>, RepositoryError> {
        let mut state = self.lock()?;
        let Some(run) = state.action_runs.get_mut(id) else {
            return Ok(None);
        };
        if run.status != ActionRunStatus::Pending {
            return Err(RepositoryError::Conflict(format!(
                "action run {id} is not pending: {}",
                action_run_status_label(run.status)
            )));
        }
        run.status = ActionRunStatus::Rejected;
        run.rejection = Some(rejection);
        Ok(Some(run.clone()))
    }

    fn execute_action_run(&self, id: &ActionRunId, execution: Execution) -> Result<Option<ActionRun>, RepositoryError> {
        let mut state = self.lock()?;
        let Some(run) = state.action_runs.get_mut(id) else {
            return Ok(None);
        };
        if run.status != ActionRunStatus::Approved {
            return Err(RepositoryError::Conflict(format!(
                "action run {id} is not approved: {}",
                action_run_status_label(run.status)
            )));
        }
        run.status = if execution.success {
            ActionRunStatus::Executed
        } else {
            ActionRunStatus::Failed
        };
        run.execution = Some(execution);
        Ok(Some(run.clone()))
    }

    // -- Audit -----------------------------------------------------------
    fn append_audit_entry(&self, entry: AuditEntry) -> Result<AuditEntry, RepositoryError> {
        let mut state = self.lock()?;
        state.audit_entries.insert(entry.id.clone(), entry.clone());
        Ok(entry)
    }

    fn get_audit_entry(&self, id: &AuditEntryId) -> Result<Option<AuditEntry>, RepositoryError> {
        Ok(self.lock()?.audit_entries.get(id).cloned())
    }

    fn list_audit_entries_for_node(&self, node_id: &NodeId) -> Result<Vec<AuditEntry>, RepositoryError> {
        let state = self.lock()?;
        let mut entries: Vec<AuditEntry> = state
            .audit_entries
            .values()
            .filter(|entry| &entry.node_id == node_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(entries)
    }

    // -- Transaction -------------------------------------------------------
    fn transaction(&self, f: &mut dyn FnMut(&dyn Repository) -> Result<(), RepositoryError>) -> Result<(), RepositoryError> {
        let snapshot = self.lock()?.clone();
        match f(self) {
            Ok(()) => Ok(()),
            Err(err) => {
                *self.lock()? = snapshot;
                Err(err)
            }
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions are permitted.")]

    use substrate_core::NodeKind;

    use super::*;

    fn node(id: &str) -> Node {
        let now = Timestamp::parse("2026-01-01T00:00:00Z").unwrap();
        Node {
            id: NodeId::new(id).unwrap(),
            kind: NodeKind::Subject,
            name: id.to_string(),
            description: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn duplicate_node_create_is_conflict() {
        let store = InMemoryStore::new();
        store.create_node(node("n1")).unwrap();
        let err = store.create_node(node("n1")).unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[test]
    fn missing_node_get_is_ok_none() {
        let store = InMemoryStore::new();
        assert_eq!(store.get_node(&NodeId::new("missing").unwrap()).unwrap(), None);
    }

    #[test]
    fn transaction_rolls_back_on_error() {
        let store = InMemoryStore::new();
        let result = store.transaction(&mut |repo| {
            repo.create_node(node("n1"))?;
            Err(RepositoryError::Backend("boom".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(store.list_nodes().unwrap().len(), 0);
    }

    #[test]
    fn transaction_commits_on_success() {
        let store = InMemoryStore::new();
        store
            .transaction(&mut |repo| {
                repo.create_node(node("n1"))?;
                Ok(())
            })
            .unwrap();
        assert_eq!(store.list_nodes().unwrap().len(), 1);
    }

    #[test]
    fn tag_observation_deduplicates() {
        let store = InMemoryStore::new();
        let obs = Observation {
            id: ObservationId::new("o1").unwrap(),
            node_id: NodeId::new("n1").unwrap(),
            type_: "health.sleep".to_string(),
            timestamp: Timestamp::parse("2026-01-01T00:00:00Z").unwrap(),
            payload: serde_json::json!({}),
            provenance: substrate_core::Provenance {
                source_id: NodeId::new("n1").unwrap(),
                sponsor_id: None,
                method: None,
                confidence: None,
            },
            tags: vec!["a".to_string()],
        };
        store.append_observation(obs.clone()).unwrap();
        let tagged = store
            .tag_observation(&obs.id, &["a".to_string(), "b".to_string()])
            .unwrap()
            .unwrap();
        assert_eq!(tagged.tags, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn artifact_update_appends_revision() {
        let store = InMemoryStore::new();
        let author = NodeId::new("n1").unwrap();
        let artifact = Artifact {
            id: ArtifactId::new("art1").unwrap(),
            node_id: author.clone(),
            title: "Draft".to_string(),
            about: "about".to_string(),
            notes: None,
            page: serde_json::json!({}),
            status: substrate_core::ArtifactStatus::Draft,
            trunk_version: 1,
            entity_refs: vec![],
        };
        store.create_artifact(artifact.clone(), author.clone()).unwrap();
        let mut updated = artifact.clone();
        updated.title = "Final".to_string();
        let (saved, revision) = store.update_artifact(updated, author, None).unwrap();
        assert_eq!(saved.trunk_version, 2);
        assert_eq!(revision.version, 2);
        assert_eq!(store.list_revisions(&artifact.id).unwrap().len(), 2);
    }
}
