// crates/substrate-core/src/core/policy.rs
// ============================================================================
// Module: Substrate Policies
// Description: Per-node rules evaluated over observations.
// Purpose: Model Policy per spec.md §3; trigger matching and evaluation live
//          in substrate-policy (C5).
// Dependencies: crate::core::identifiers
// ============================================================================

//! ## Overview
//! A `Policy` pairs a priority-ordered trigger list with sandboxed
//! implementation code. Policies are pure: they read the frozen context
//! (`substrate-context`) and return effects, never performing I/O
//! themselves (`spec.md` §3, §4.5).

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::NodeId;
use crate::core::identifiers::PolicyId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Policy Implementation
// ============================================================================

/// The kind of policy implementation. Currently only `sandboxed` (restricted
/// expression code, see `substrate-policy::lang`) is supported; the field
/// exists so a future implementation kind can be added without breaking the
/// wire format.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyImplementationKind {
    /// Restricted expression code executed by the substrate's own sandbox.
    Sandboxed,
}

/// A policy's implementation payload.
///
/// # Invariants
/// - `code` is source text in the restricted policy expression language
///   (`substrate-policy::lang`); it is never interpreted as a general-purpose
///   script (`spec.md` §1 non-goals).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyImplementation {
    /// Implementation kind.
    pub kind: PolicyImplementationKind,
    /// Source code.
    pub code: String,
}

// ============================================================================
// SECTION: Policy
// ============================================================================

/// A per-node rule evaluated over matching observations.
///
/// # Invariants
/// - `priority` determines evaluation order: lower values evaluate first,
///   ties broken by `id` (`spec.md` §4.5).
/// - Disabled policies (`enabled == false`) are never selected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Policy identifier.
    pub id: PolicyId,
    /// Node this policy is scoped to.
    pub node_id: NodeId,
    /// Display name.
    pub name: String,
    /// Evaluation priority; lower runs first.
    pub priority: i64,
    /// Whether this policy is eligible for selection.
    pub enabled: bool,
    /// Trigger patterns (`*`, `prefix.*`, or exact type strings).
    pub triggers: Vec<String>,
    /// Sandboxed implementation.
    pub implementation: PolicyImplementation,
    /// Last-updated timestamp, used as part of the compiled-policy cache key
    /// (`spec.md` §4.5, §5).
    pub updated_at: Timestamp,
}
