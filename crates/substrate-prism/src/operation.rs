// crates/substrate-prism/src/operation.rs
// ============================================================================
// Module: Prism Operation Envelope
// Description: The typed operation surface Prism accepts, and its envelope.
// Purpose: Model the "complete set" of mutating operations from spec.md §4.7.
// Dependencies: substrate-core
// ============================================================================

//! ## Overview
//! Every mutation reaches canon exactly one way: as a [`PrismOperation`]
//! carrying an [`OperationEnvelope`] (actor + optional causality) and an
//! [`OperationPayload`] naming what to do. `Draft` types hold the fields a
//! caller supplies for a brand-new entity; Prism itself assigns the id and
//! stamps timestamps at commit time, so "who generates identity" stays a
//! single answer (`spec.md` §4.7's "Prism is the only path that mutates
//! canon").
//!
//! `spec.md` §4.7 also lists `surface` in its operation-class enumeration,
//! but surfaces are read-only projections explicitly out of scope (`spec.md`
//! §1); the `Repository` trait this workspace implements has no surface
//! collection to mutate, so no `OperationPayload` variant exists for it
//! either (see `DESIGN.md`).

// ============================================================================
// SECTION: Imports
// ============================================================================

use substrate_core::Actor;
use substrate_core::ActionRunId;
use substrate_core::AgentDelegation;
use substrate_core::ArtifactId;
use substrate_core::ArtifactStatus;
use substrate_core::BlockDocument;
use substrate_core::CausedBy;
use substrate_core::ComputeSpec;
use substrate_core::EdgeId;
use substrate_core::EdgeKind;
use substrate_core::EntityId;
use substrate_core::EntityTypeId;
use substrate_core::EpisodeId;
use substrate_core::EpisodeKind;
use substrate_core::EpisodeStatus;
use substrate_core::Execution;
use substrate_core::GrantId;
use substrate_core::NodeId;
use substrate_core::NodeKind;
use substrate_core::PolicyId;
use substrate_core::PolicyImplementation;
use substrate_core::ProposedBy;
use substrate_core::ResourceScope;
use substrate_core::RiskLevel;
use substrate_core::VariableId;
use substrate_core::VariableKind;
use substrate_core::VariableRange;

// ============================================================================
// SECTION: Envelope
// ============================================================================

/// Actor plus optional causality chain carried on every Prism operation
/// (`spec.md` §4.7 "Operation envelope").
#[derive(Debug, Clone)]
pub struct OperationEnvelope {
    /// Who is performing the operation and how.
    pub actor: Actor,
    /// What triggered it, if anything.
    pub caused_by: Option<CausedBy>,
}

// ============================================================================
// SECTION: Drafts
// ============================================================================

/// Fields supplied when creating a node; Prism assigns `id` and timestamps.
#[derive(Debug, Clone)]
pub struct NodeDraft {
    /// Node role.
    pub kind: NodeKind,
    /// Display name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
}

/// Fields supplied when adding an edge; Prism assigns `id` and `created_at`.
#[derive(Debug, Clone)]
pub struct EdgeDraft {
    /// Source node.
    pub from: NodeId,
    /// Target node.
    pub to: NodeId,
    /// Relationship kind.
    pub kind: EdgeKind,
}

/// Fields supplied when creating an artifact; Prism assigns `id` and writes
/// the first revision.
#[derive(Debug, Clone)]
pub struct ArtifactDraft {
    /// Node this artifact belongs to.
    pub node_id: NodeId,
    /// Title.
    pub title: String,
    /// Short description.
    pub about: String,
    /// Optional notes.
    pub notes: Option<String>,
    /// Block-structured body.
    pub page: BlockDocument,
    /// Initial lifecycle status.
    pub status: ArtifactStatus,
    /// Optional entity references.
    pub entity_refs: Vec<String>,
}

/// The mutable fields of an artifact a caller wants to replace; Prism merges
/// these onto the stored artifact and writes exactly one new revision.
#[derive(Debug, Clone)]
pub struct ArtifactChanges {
    /// New title.
    pub title: String,
    /// New about text.
    pub about: String,
    /// New notes.
    pub notes: Option<String>,
    /// New page body.
    pub page: BlockDocument,
    /// New entity references.
    pub entity_refs: Vec<String>,
    /// Optional revision message.
    pub message: Option<String>,
}

/// Fields supplied when creating an episode; Prism assigns `id`.
#[derive(Debug, Clone)]
pub struct EpisodeDraft {
    /// Node this episode belongs to.
    pub node_id: NodeId,
    /// Title.
    pub title: String,
    /// Episode kind.
    pub kind: EpisodeKind,
    /// Variable bindings.
    pub variable_bindings: Vec<substrate_core::VariableBinding>,
    /// Optional start time.
    pub start: Option<substrate_core::Timestamp>,
    /// Optional end time.
    pub end: Option<substrate_core::Timestamp>,
    /// Related artifact ids.
    pub related_artifact_ids: Vec<ArtifactId>,
}

/// Fields supplied when creating a variable; Prism assigns `id`.
#[derive(Debug, Clone)]
pub struct VariableDraft {
    /// Node this variable belongs to.
    pub node_id: NodeId,
    /// Unique-per-node key.
    pub key: String,
    /// Display title.
    pub title: String,
    /// Measurement kind.
    pub kind: VariableKind,
    /// Optional unit.
    pub unit: Option<String>,
    /// Hard viable range.
    pub viable_range: Option<VariableRange>,
    /// Soft preferred range.
    pub preferred_range: Option<VariableRange>,
    /// Ordered derivation rules.
    pub compute_specs: Vec<ComputeSpec>,
}

/// Fields supplied when creating a policy; Prism assigns `id` and
/// `updated_at`.
#[derive(Debug, Clone)]
pub struct PolicyDraft {
    /// Node this policy is scoped to.
    pub node_id: NodeId,
    /// Display name.
    pub name: String,
    /// Evaluation priority.
    pub priority: i64,
    /// Whether this policy is eligible for selection.
    pub enabled: bool,
    /// Trigger patterns.
    pub triggers: Vec<String>,
    /// Sandboxed implementation.
    pub implementation: PolicyImplementation,
}

/// Fields supplied when creating an entity; Prism assigns `id` and the
/// initial `state` via the caller-supplied `initial_state`.
#[derive(Debug, Clone)]
pub struct EntityDraft {
    /// Node this entity belongs to.
    pub node_id: NodeId,
    /// Entity type.
    pub type_id: EntityTypeId,
    /// Initial materialized state (before any events).
    pub initial_state: serde_json::Value,
}

/// Fields supplied when creating a grant; Prism assigns `id` and
/// `granted_at`.
#[derive(Debug, Clone)]
pub struct GrantDraft {
    /// The node receiving the permission.
    pub grantee_node_id: NodeId,
    /// Resource class.
    pub resource_type: String,
    /// Specific resource or wildcard.
    pub resource_id: ResourceScope,
    /// Permitted scopes.
    pub scopes: Vec<String>,
    /// Issuing node.
    pub grantor_node_id: NodeId,
    /// Optional expiry.
    pub expires_at: Option<substrate_core::Timestamp>,
}

/// Fields supplied when proposing an action; Prism assigns `id` and status.
#[derive(Debug, Clone)]
pub struct ActionRunDraft {
    /// Node this action run is scoped to.
    pub node_id: NodeId,
    /// What proposed this action.
    pub proposed_by: ProposedBy,
    /// Opaque action payload.
    pub action: serde_json::Value,
    /// Declared risk level.
    pub risk_level: RiskLevel,
}

// ============================================================================
// SECTION: Operation Payload
// ============================================================================

/// The complete set of mutations Prism accepts (`spec.md` §4.7).
#[derive(Debug, Clone)]
pub enum OperationPayload {
    /// Create a node.
    CreateNode(NodeDraft),
    /// Replace a node's mutable fields.
    UpdateNode { id: NodeId, name: String, description: Option<String> },
    /// Add a directed edge.
    AddEdge(EdgeDraft),
    /// Remove an edge.
    RemoveEdge(EdgeId),
    /// Create an artifact, writing its first revision.
    CreateArtifact(ArtifactDraft),
    /// Replace an artifact's mutable fields, writing one new revision.
    UpdateArtifact { id: ArtifactId, changes: ArtifactChanges },
    /// Transition an artifact's status, writing one new revision.
    UpdateArtifactStatus { id: ArtifactId, status: ArtifactStatus },
    /// Delete an artifact and its revisions.
    DeleteArtifact(ArtifactId),
    /// Create an episode.
    CreateEpisode(EpisodeDraft),
    /// Transition an episode's status.
    UpdateEpisodeStatus { id: EpisodeId, status: EpisodeStatus },
    /// Create a variable.
    CreateVariable(VariableDraft),
    /// Replace a variable's stored fields.
    UpdateVariable { id: VariableId, draft: VariableDraft },
    /// Create a policy.
    CreatePolicy(PolicyDraft),
    /// Replace a policy's stored fields.
    UpdatePolicy { id: PolicyId, draft: PolicyDraft },
    /// Create a pending action run.
    CreateActionRun(ActionRunDraft),
    /// Approve a pending action run.
    ApproveActionRun { id: ActionRunId, approved_by: NodeId, method: substrate_core::ApprovalMethod },
    /// Reject a pending action run.
    RejectActionRun { id: ActionRunId, rejected_by: NodeId, reason: Option<String> },
    /// Execute an approved action run.
    ExecuteActionRun { id: ActionRunId, execution: Execution },
    /// Create an entity.
    CreateEntity(EntityDraft),
    /// Append an event to an existing entity.
    AppendEntityEvent { entity_id: EntityId, event_type: String, data: serde_json::Value },
    /// Create or replace an agent's delegation.
    SetAgentDelegation(AgentDelegation),
    /// Create a grant.
    CreateGrant(GrantDraft),
    /// Revoke a grant.
    RevokeGrant(GrantId),
    /// Route a copy of an observation to another node
    /// (the `route_observation` effect, `spec.md` §4.6).
    RouteObservation { observation_id: substrate_core::ObservationId, to_node_id: NodeId },
}

/// A single request to mutate canon (`spec.md` §4.7).
#[derive(Debug, Clone)]
pub struct PrismOperation {
    /// The node the operation's authority check is scoped to: for creates,
    /// the node the new resource will belong to; for mutations, the node
    /// owning the existing resource.
    pub node_id: NodeId,
    /// Actor and causality.
    pub envelope: OperationEnvelope,
    /// What to do.
    pub payload: OperationPayload,
}

impl OperationPayload {
    /// The `operationType` string recorded on the resulting `AuditEntry`
    /// (`spec.md` §4.7).
    #[must_use]
    pub const fn operation_type(&self) -> &'static str {
        match self {
            Self::CreateNode(_) => "create_node",
            Self::UpdateNode { .. } => "update_node",
            Self::AddEdge(_) => "add_edge",
            Self::RemoveEdge(_) => "remove_edge",
            Self::CreateArtifact(_) => "create_artifact",
            Self::UpdateArtifact { .. } => "update_artifact",
            Self::UpdateArtifactStatus { .. } => "update_artifact_status",
            Self::DeleteArtifact(_) => "delete_artifact",
            Self::CreateEpisode(_) => "create_episode",
            Self::UpdateEpisodeStatus { .. } => "update_episode_status",
            Self::CreateVariable(_) => "create_variable",
            Self::UpdateVariable { .. } => "update_variable",
            Self::CreatePolicy(_) => "create_policy",
            Self::UpdatePolicy { .. } => "update_policy",
            Self::CreateActionRun(_) => "create_action_run",
            Self::ApproveActionRun { .. } => "approve_action_run",
            Self::RejectActionRun { .. } => "reject_action_run",
            Self::ExecuteActionRun { .. } => "execute_action_run",
            Self::CreateEntity(_) => "create_entity",
            Self::AppendEntityEvent { .. } => "append_entity_event",
            Self::SetAgentDelegation(_) => "set_agent_delegation",
            Self::CreateGrant(_) => "create_grant",
            Self::RevokeGrant(_) => "revoke_grant",
            Self::RouteObservation { .. } => "route_observation",
        }
    }

    /// The `resourceType` string recorded on the resulting `AuditEntry`.
    #[must_use]
    pub const fn resource_type(&self) -> &'static str {
        match self {
            Self::CreateNode(_) | Self::UpdateNode { .. } => "node",
            Self::AddEdge(_) | Self::RemoveEdge(_) => "edge",
            Self::CreateArtifact(_)
            | Self::UpdateArtifact { .. }
            | Self::UpdateArtifactStatus { .. }
            | Self::DeleteArtifact(_) => "artifact",
            Self::CreateEpisode(_) | Self::UpdateEpisodeStatus { .. } => "episode",
            Self::CreateVariable(_) | Self::UpdateVariable { .. } => "variable",
            Self::CreatePolicy(_) | Self::UpdatePolicy { .. } => "policy",
            Self::CreateActionRun(_)
            | Self::ApproveActionRun { .. }
            | Self::RejectActionRun { .. }
            | Self::ExecuteActionRun { .. } => "action_run",
            Self::CreateEntity(_) | Self::AppendEntityEvent { .. } => "entity",
            Self::SetAgentDelegation(_) => "agent_delegation",
            Self::CreateGrant(_) | Self::RevokeGrant(_) => "grant",
            Self::RouteObservation { .. } => "observation",
        }
    }
}
