// crates/substrate-core/src/lib.rs
// ============================================================================
// Module: Substrate Core Library
// Description: Canonical data model, error taxonomy, and Repository contract.
// Purpose: Dependency-light foundation shared by every substrate crate.
// Dependencies: serde, serde_json, serde_jcs, sha2, thiserror, time
// ============================================================================

//! ## Overview
//! `substrate-core` holds the canonical data model (`spec.md` §3), the
//! cross-cutting [`core::error::CoreError`] taxonomy (§7), and the
//! [`interfaces::Repository`] contract (C1, §4.1) that every other crate in
//! this workspace programs against. It performs no I/O and has no knowledge
//! of any concrete storage backend, sandboxing mechanism, or transport.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::action_run::ActionRun;
pub use core::action_run::ActionRunStatus;
pub use core::action_run::Approval;
pub use core::action_run::ApprovalMethod;
pub use core::action_run::Execution;
pub use core::action_run::ProposedBy;
pub use core::action_run::Rejection;
pub use core::artifact::Artifact;
pub use core::artifact::ArtifactSnapshot;
pub use core::artifact::ArtifactStatus;
pub use core::artifact::BlockDocument;
pub use core::artifact::Revision;
pub use core::audit::Actor;
pub use core::audit::ActorMethod;
pub use core::audit::AuditEntry;
pub use core::audit::CausedBy;
pub use core::effect::Effect;
pub use core::effect::EffectParseError;
pub use core::effect::LogLevel;
pub use core::entity::Entity;
pub use core::entity::EntityEvent;
pub use core::entity::EntityStateReducer;
pub use core::entity::EntityType;
pub use core::episode::Episode;
pub use core::episode::EpisodeKind;
pub use core::episode::EpisodeStatus;
pub use core::episode::VariableBinding;
pub use core::episode::VariableIntent;
pub use core::error::CoreError;
pub use core::grant::Grant;
pub use core::grant::ResourceScope;
pub use core::hashing::HashAlgorithm;
pub use core::hashing::HashDigest;
pub use core::hashing::HashError;
pub use core::hashing::canonical_json_bytes;
pub use core::hashing::hash_bytes;
pub use core::hashing::hash_canonical_json;
pub use core::identifiers::ActionRunId;
pub use core::identifiers::ArtifactId;
pub use core::identifiers::AuditEntryId;
pub use core::identifiers::EdgeId;
pub use core::identifiers::EmptyIdentifierError;
pub use core::identifiers::EntityEventId;
pub use core::identifiers::EntityId;
pub use core::identifiers::EntityTypeId;
pub use core::identifiers::EpisodeId;
pub use core::identifiers::GrantId;
pub use core::identifiers::NodeId;
pub use core::identifiers::ObservationId;
pub use core::identifiers::PolicyId;
pub use core::identifiers::VariableId;
pub use core::node::AgentDelegation;
pub use core::node::DelegationConstraints;
pub use core::node::Edge;
pub use core::node::EdgeKind;
pub use core::node::Node;
pub use core::node::NodeKind;
pub use core::node::RiskLevel;
pub use core::observation::Observation;
pub use core::observation::Provenance;
pub use core::observation::is_valid_observation_type;
pub use core::policy::Policy;
pub use core::policy::PolicyImplementation;
pub use core::policy::PolicyImplementationKind;
pub use core::time::Clock;
pub use core::time::FixedClock;
pub use core::time::SystemClock;
pub use core::time::Timestamp;
pub use core::time::TimestampParseError;
pub use core::variable::Aggregation;
pub use core::variable::ComputeSpec;
pub use core::variable::ComputeWindow;
pub use core::variable::Trend;
pub use core::variable::Variable;
pub use core::variable::VariableEstimate;
pub use core::variable::VariableKind;
pub use core::variable::VariableRange;
pub use interfaces::ObservationFilter;
pub use interfaces::RelativeWindow;
pub use interfaces::Repository;
pub use interfaces::RepositoryError;
pub use interfaces::TimeRange;
