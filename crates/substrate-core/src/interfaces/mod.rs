// crates/substrate-core/src/interfaces/mod.rs
// ============================================================================
// Module: Substrate Repository Interface
// Description: Backend-agnostic persistence contract for all canonical entities.
// Purpose: Define the Repository trait (C1) consumed by every other component.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! `Repository` is the persistence-agnostic CRUD-plus-transaction contract
//! described in `spec.md` §4.1 and §6. It is the sole abstraction every other
//! crate in this workspace programs against; `substrate-store-memory` is one
//! concrete, in-process implementation kept in this workspace to exercise
//! tests, but relational and filesystem implementations are equally valid
//! (`spec.md` §1 keeps those out of scope here).
//!
//! Failure modes follow `spec.md` §4.1: a missing resource is `Ok(None)`,
//! never an error; a unique-key collision or optimistic-concurrency conflict
//! is [`RepositoryError::Conflict`]; anything else from the backend surfaces
//! as [`RepositoryError::Backend`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::action_run::ActionRun;
use crate::core::action_run::Approval;
use crate::core::action_run::Execution;
use crate::core::action_run::Rejection;
use crate::core::artifact::Artifact;
use crate::core::artifact::Revision;
use crate::core::audit::AuditEntry;
use crate::core::entity::Entity;
use crate::core::entity::EntityEvent;
use crate::core::entity::EntityType;
use crate::core::episode::Episode;
use crate::core::grant::Grant;
use crate::core::identifiers::ActionRunId;
use crate::core::identifiers::ArtifactId;
use crate::core::identifiers::AuditEntryId;
use crate::core::identifiers::EdgeId;
use crate::core::identifiers::EntityId;
use crate::core::identifiers::EntityTypeId;
use crate::core::identifiers::EpisodeId;
use crate::core::identifiers::GrantId;
use crate::core::identifiers::NodeId;
use crate::core::identifiers::ObservationId;
use crate::core::identifiers::PolicyId;
use crate::core::identifiers::VariableId;
use crate::core::node::AgentDelegation;
use crate::core::node::Edge;
use crate::core::node::Node;
use crate::core::observation::Observation;
use crate::core::policy::Policy;
use crate::core::time::Timestamp;
use crate::core::variable::Variable;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Repository-level errors (`spec.md` §4.1).
///
/// # Invariants
/// - A missing resource is never represented here; it is `Ok(None)`.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Unique-key or optimistic-concurrency conflict; retryable.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Backend I/O or transport failure.
    #[error("backend error: {0}")]
    Backend(String),
}

// ============================================================================
// SECTION: Observation Query
// ============================================================================

/// An absolute time range used by [`ObservationFilter::time_range`].
///
/// # Invariants
/// - `start <= end` when both are present (not enforced by this type).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    /// Inclusive start.
    pub start: Option<Timestamp>,
    /// Inclusive end.
    pub end: Option<Timestamp>,
}

/// A relative window measured back from a reference time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelativeWindow {
    /// Hours back from the reference time.
    pub hours: f64,
}

/// The bounded I/O contract for `canon.queryObservations` (`spec.md` §4.4).
///
/// # Invariants
/// - `limit` is always applied by implementations: absent defaults to 100,
///   and any value above 1000 is clamped to 1000.
/// - When neither `window` nor `time_range` is set, implementations impose a
///   24-hour window ending at `reference_time`.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationFilter {
    /// Restrict to this node.
    pub node_id: Option<NodeId>,
    /// Exact observation type match.
    pub type_: Option<String>,
    /// Literal type-prefix match (not a trigger-style wildcard).
    pub type_prefix: Option<String>,
    /// Relative time window.
    pub window: Option<RelativeWindow>,
    /// Absolute time range.
    pub time_range: Option<TimeRange>,
    /// The instant `window` is measured back from; also used to impose the
    /// default 24-hour window.
    pub reference_time: Timestamp,
    /// Maximum items to return, before clamping.
    pub limit: Option<usize>,
    /// Number of matching items to skip before `limit` is applied.
    pub offset: usize,
}

impl ObservationFilter {
    /// The hard ceiling on `limit` (`spec.md` §4.4).
    pub const MAX_LIMIT: usize = 1000;
    /// The limit used when the caller does not specify one.
    pub const DEFAULT_LIMIT: usize = 100;
    /// The window, in hours, imposed when neither `window` nor `time_range`
    /// is specified.
    pub const DEFAULT_WINDOW_HOURS: f64 = 24.0;

    /// Returns the effective limit after applying the default and the 1000
    /// cap (`spec.md` §4.4, §8).
    #[must_use]
    pub fn effective_limit(&self) -> usize {
        self.limit.unwrap_or(Self::DEFAULT_LIMIT).min(Self::MAX_LIMIT)
    }

    /// Returns `true` when neither an explicit window nor time range was
    /// given, meaning the default 24-hour window applies.
    #[must_use]
    pub const fn uses_default_window(&self) -> bool {
        self.window.is_none() && self.time_range.is_none()
    }
}

// ============================================================================
// SECTION: Repository
// ============================================================================

/// Persistence-agnostic CRUD-plus-transaction contract for all canonical
/// entities (`spec.md` §4.1, §6).
///
/// Implementations must make `transaction` all-or-nothing: if the closure
/// returns `Err`, every mutation it made through `self` inside the closure is
/// rolled back before `transaction` returns.
#[allow(
    clippy::missing_errors_doc,
    reason = "Every method shares the same two-variant RepositoryError documented on the trait."
)]
pub trait Repository: Send + Sync {
    // -- Nodes ---------------------------------------------------------
    /// Creates a node.
    fn create_node(&self, node: Node) -> Result<Node, RepositoryError>;
    /// Fetches a node by id.
    fn get_node(&self, id: &NodeId) -> Result<Option<Node>, RepositoryError>;
    /// Lists all nodes.
    fn list_nodes(&self) -> Result<Vec<Node>, RepositoryError>;
    /// Replaces a node's stored fields.
    fn update_node(&self, node: Node) -> Result<Node, RepositoryError>;

    // -- Edges -----------------------------------------------------------
    /// Adds a directed edge.
    fn add_edge(&self, edge: Edge) -> Result<Edge, RepositoryError>;
    /// Removes an edge by id, returning whether it existed.
    fn remove_edge(&self, id: &EdgeId) -> Result<bool, RepositoryError>;
    /// Lists edges where `node_id` is the source.
    fn list_edges_from(&self, node_id: &NodeId) -> Result<Vec<Edge>, RepositoryError>;

    // -- Agent delegation --------------------------------------------------
    /// Creates or replaces the delegation for `agent_id`.
    fn set_agent_delegation(&self, delegation: AgentDelegation) -> Result<AgentDelegation, RepositoryError>;
    /// Fetches the active delegation record for an agent, if any.
    fn get_agent_delegation(&self, agent_id: &NodeId) -> Result<Option<AgentDelegation>, RepositoryError>;

    // -- Observations --------------------------------------------------
    /// Appends an immutable observation.
    fn append_observation(&self, observation: Observation) -> Result<Observation, RepositoryError>;
    /// Fetches an observation by id.
    fn get_observation(&self, id: &ObservationId) -> Result<Option<Observation>, RepositoryError>;
    /// Queries observations per the bounded filter contract.
    fn query_observations(&self, filter: &ObservationFilter) -> Result<Vec<Observation>, RepositoryError>;
    /// Enriches an observation's `tags` with the union of old and new,
    /// deduplicated (`spec.md` §4.6, §9 open question (a)).
    fn tag_observation(&self, id: &ObservationId, tags: &[String]) -> Result<Option<Observation>, RepositoryError>;

    // -- Variables -------------------------------------------------------
    /// Creates a variable.
    fn create_variable(&self, variable: Variable) -> Result<Variable, RepositoryError>;
    /// Fetches a variable by id.
    fn get_variable(&self, id: &VariableId) -> Result<Option<Variable>, RepositoryError>;
    /// Lists variables on a node.
    fn list_variables_for_node(&self, node_id: &NodeId) -> Result<Vec<Variable>, RepositoryError>;
    /// Replaces a variable's stored fields.
    fn update_variable(&self, variable: Variable) -> Result<Variable, RepositoryError>;

    // -- Artifacts + revisions --------------------------------------------
    /// Creates an artifact, writing its first revision (`version = 1`).
    fn create_artifact(&self, artifact: Artifact, author_id: NodeId) -> Result<Artifact, RepositoryError>;
    /// Fetches an artifact by id.
    fn get_artifact(&self, id: &ArtifactId) -> Result<Option<Artifact>, RepositoryError>;
    /// Lists artifacts on a node.
    fn list_artifacts_for_node(&self, node_id: &NodeId) -> Result<Vec<Artifact>, RepositoryError>;
    /// Replaces an artifact's mutable fields, writing exactly one new
    /// revision with `version = previous + 1` (`spec.md` §3, §8).
    fn update_artifact(
        &self,
        artifact: Artifact,
        author_id: NodeId,
        message: Option<String>,
    ) -> Result<(Artifact, Revision), RepositoryError>;
    /// Deletes an artifact and its revisions, returning whether it existed.
    fn delete_artifact(&self, id: &ArtifactId) -> Result<bool, RepositoryError>;
    /// Lists an artifact's revisions in ascending version order.
    fn list_revisions(&self, artifact_id: &ArtifactId) -> Result<Vec<Revision>, RepositoryError>;

    // -- Episodes ----------------------------------------------------------
    /// Creates an episode.
    fn create_episode(&self, episode: Episode) -> Result<Episode, RepositoryError>;
    /// Fetches an episode by id.
    fn get_episode(&self, id: &EpisodeId) -> Result<Option<Episode>, RepositoryError>;
    /// Lists episodes on a node.
    fn list_episodes_for_node(&self, node_id: &NodeId) -> Result<Vec<Episode>, RepositoryError>;
    /// Lists episodes on a node with `status == Active`, for context
    /// prefetching (`spec.md` §4.4).
    fn list_active_episodes_for_node(&self, node_id: &NodeId) -> Result<Vec<Episode>, RepositoryError>;
    /// Replaces an episode's stored fields.
    fn update_episode(&self, episode: Episode) -> Result<Episode, RepositoryError>;

    // -- Policies ------------------------------------------------------
    /// Creates a policy.
    fn create_policy(&self, policy: Policy) -> Result<Policy, RepositoryError>;
    /// Fetches a policy by id.
    fn get_policy(&self, id: &PolicyId) -> Result<Option<Policy>, RepositoryError>;
    /// Lists policies on a node.
    fn list_policies_for_node(&self, node_id: &NodeId) -> Result<Vec<Policy>, RepositoryError>;
    /// Replaces a policy's stored fields.
    fn update_policy(&self, policy: Policy) -> Result<Policy, RepositoryError>;

    // -- Entities ------------------------------------------------------
    /// Creates an entity type.
    fn create_entity_type(&self, entity_type: EntityType) -> Result<EntityType, RepositoryError>;
    /// Fetches an entity type by id.
    fn get_entity_type(&self, id: &EntityTypeId) -> Result<Option<EntityType>, RepositoryError>;
    /// Lists every entity type, for bundle export (`spec.md` §4.8).
    fn list_entity_types(&self) -> Result<Vec<EntityType>, RepositoryError>;
    /// Creates an entity.
    fn create_entity(&self, entity: Entity) -> Result<Entity, RepositoryError>;
    /// Fetches an entity by id.
    fn get_entity(&self, id: &EntityId) -> Result<Option<Entity>, RepositoryError>;
    /// Lists entities scoped to a node, for bundle export (`spec.md` §4.8).
    fn list_entities_for_node(&self, node_id: &NodeId) -> Result<Vec<Entity>, RepositoryError>;
    /// Appends an event to an entity and stores its recomputed `state`.
    /// Fails with [`RepositoryError::Conflict`] if the entity does not exist,
    /// matching `create_entity_event`'s spec'd failure mode (`spec.md` §4.6).
    fn append_entity_event(
        &self,
        entity_id: &EntityId,
        event: EntityEvent,
        new_state: serde_json::Value,
    ) -> Result<Entity, RepositoryError>;

    // -- Grants --------------------------------------------------------
    /// Creates a grant.
    fn create_grant(&self, grant: Grant) -> Result<Grant, RepositoryError>;
    /// Fetches a grant by id.
    fn get_grant(&self, id: &GrantId) -> Result<Option<Grant>, RepositoryError>;
    /// Lists grants issued to a grantee.
    fn list_grants_for_grantee(&self, grantee_node_id: &NodeId) -> Result<Vec<Grant>, RepositoryError>;
    /// Marks a grant revoked, returning the updated record.
    fn revoke_grant(&self, id: &GrantId) -> Result<Option<Grant>, RepositoryError>;

    // -- Action runs -----------------------------------------------------
    /// Creates a pending action run.
    fn create_action_run(&self, action_run: ActionRun) -> Result<ActionRun, RepositoryError>;
    /// Fetches an action run by id.
    fn get_action_run(&self, id: &ActionRunId) -> Result<Option<ActionRun>, RepositoryError>;
    /// Lists action runs on a node.
    fn list_action_runs_for_node(&self, node_id: &NodeId) -> Result<Vec<ActionRun>, RepositoryError>;
    /// Transitions a pending action run to `approved`.
    fn approve_action_run(&self, id: &ActionRunId, approval: Approval) -> Result<Option<ActionRun>, RepositoryError>;
    /// Transitions a pending action run to `rejected`.
    fn reject_action_run(&self, id: &ActionRunId, rejection: Rejection) -> Result<Option<ActionRun>, RepositoryError>;
    /// Transitions an approved action run to `executed` or `failed`.
    fn execute_action_run(&self, id: &ActionRunId, execution: Execution) -> Result<Option<ActionRun>, RepositoryError>;

    // -- Audit -----------------------------------------------------------
    /// Appends an audit entry. Always succeeds unless the backend itself
    /// fails; audit entries are never rejected for business reasons.
    fn append_audit_entry(&self, entry: AuditEntry) -> Result<AuditEntry, RepositoryError>;
    /// Fetches an audit entry by id.
    fn get_audit_entry(&self, id: &AuditEntryId) -> Result<Option<AuditEntry>, RepositoryError>;
    /// Lists audit entries for a node, newest first.
    fn list_audit_entries_for_node(&self, node_id: &NodeId) -> Result<Vec<AuditEntry>, RepositoryError>;

    // -- Transaction -------------------------------------------------------
    /// Runs `f` against `self`, committing every call it makes atomically.
    /// If `f` returns `Err`, all mutations it made are rolled back.
    fn transaction(
        &self,
        f: &mut dyn FnMut(&dyn Repository) -> Result<(), RepositoryError>,
    ) -> Result<(), RepositoryError>;
}
