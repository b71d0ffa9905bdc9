// crates/substrate-core/src/core/variable.rs
// ============================================================================
// Module: Substrate Variables
// Description: Regulated-quantity specifications and derived estimates.
// Purpose: Define the canonical Variable/ComputeSpec/VariableEstimate types
//          shared by the estimator (C3) and context builder (C4).
// Dependencies: crate::core::{identifiers, time}
// ============================================================================

//! ## Overview
//! A `Variable` names a regulated quantity and describes how to derive it
//! from the observation log via one or more [`ComputeSpec`]s. A
//! [`VariableEstimate`] is the derived, non-canonical result — it is never
//! persisted as canon (`spec.md` §3).

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::NodeId;
use crate::core::identifiers::VariableId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Variable
// ============================================================================

/// The measurement kind of a variable.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableKind {
    /// A real-valued quantity.
    Continuous,
    /// A ranked, finite set of values.
    Ordinal,
    /// An unordered, finite set of values.
    Categorical,
    /// A two-valued quantity.
    Boolean,
}

/// A bound range with hard (`min`/`max`) and soft (`soft_min`/`soft_max`)
/// edges.
///
/// # Invariants
/// - When both a bound and its soft counterpart are present, the soft bound
///   lies within the hard bound (not enforced at construction; callers are
///   responsible, matching the original system's permissive spec authoring).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct VariableRange {
    /// Hard lower bound.
    pub min: Option<f64>,
    /// Hard upper bound.
    pub max: Option<f64>,
    /// Soft (preferred) lower bound.
    pub soft_min: Option<f64>,
    /// Soft (preferred) upper bound.
    pub soft_max: Option<f64>,
}

impl VariableRange {
    /// Returns `true` when `value` satisfies the hard bounds. An absent
    /// bound is always satisfied.
    #[must_use]
    pub fn contains_hard(&self, value: f64) -> bool {
        self.min.is_none_or(|min| value >= min) && self.max.is_none_or(|max| value <= max)
    }

    /// Returns `true` when `value` satisfies the soft bounds, falling back to
    /// the hard bounds where a soft bound is absent.
    #[must_use]
    pub fn contains_soft(&self, value: f64) -> bool {
        let lower = self.soft_min.or(self.min);
        let upper = self.soft_max.or(self.max);
        lower.is_none_or(|min| value >= min) && upper.is_none_or(|max| value <= max)
    }
}

/// Supported aggregations over matched observations (`spec.md` §4.3 step 6).
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// The most recent matching value.
    Latest,
    /// Sum of matching values.
    Sum,
    /// Arithmetic mean of matching values.
    Avg,
    /// Count of matching observations (not of extracted values).
    Count,
    /// Minimum matching value.
    Min,
    /// Maximum matching value.
    Max,
}

/// A time window used to bound the observations a `ComputeSpec` considers.
///
/// # Invariants
/// - At least one of `hours`/`count` is expected to be set by well-formed
///   specs, though neither is required by this type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct ComputeWindow {
    /// Relative window size in hours, measured back from the reference time.
    pub hours: Option<f64>,
    /// Maximum number of matching observations to consider, applied after
    /// the time window.
    pub count: Option<usize>,
}

/// A single derivation rule within a [`Variable`].
///
/// # Invariants
/// - `observation_type_patterns` is non-empty for a spec to ever match
///   anything; an empty list simply never matches.
/// - `confidence`, if present, lies in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputeSpec {
    /// Observation type patterns (`prefix.*` or exact) this spec draws from.
    pub observation_type_patterns: Vec<String>,
    /// Aggregation to apply over matched observations.
    pub aggregation: Aggregation,
    /// Optional time/count window.
    pub window: Option<ComputeWindow>,
    /// Optional confidence override (defaults to 1 when absent).
    pub confidence: Option<f64>,
}

/// A regulated quantity, derived (never stored) as a [`VariableEstimate`].
///
/// # Invariants
/// - `key` is unique per `node_id` (enforced by the `Repository`, not this
///   type).
/// - `compute_specs` is evaluated in order by the estimator, and all entries
///   are tried (`spec.md` §4.3 "multi-spec variable").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    /// Variable identifier.
    pub id: VariableId,
    /// Node this variable is scoped to.
    pub node_id: NodeId,
    /// Unique-per-node key, e.g. `"sleep_quality"`.
    pub key: String,
    /// Display title.
    pub title: String,
    /// Measurement kind.
    pub kind: VariableKind,
    /// Optional unit label.
    pub unit: Option<String>,
    /// Hard viable range.
    pub viable_range: Option<VariableRange>,
    /// Soft preferred range.
    pub preferred_range: Option<VariableRange>,
    /// Ordered derivation rules.
    pub compute_specs: Vec<ComputeSpec>,
}

// ============================================================================
// SECTION: Variable Estimate
// ============================================================================

/// Directional change in a variable's value between two estimates.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    /// Moving toward the preferred/better value.
    Improving,
    /// No meaningful change.
    Stable,
    /// Moving away from the preferred/better value.
    Degrading,
}

/// A derived, non-canonical estimate of a [`Variable`]'s current value.
///
/// # Invariants
/// - Never persisted as canon (`spec.md` §3); always recomputed or memoized
///   per evaluation cycle (`spec.md` §4.4).
/// - If `value` is `None`, `confidence` is `0.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableEstimate {
    /// The variable this estimate derives.
    pub variable_id: VariableId,
    /// Derived numeric value, or `None` if no observations contributed.
    pub value: Option<f64>,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// When this estimate was computed.
    pub computed_at: Timestamp,
    /// Whether `value` falls within the variable's viable range.
    pub in_viable_range: bool,
    /// Whether `value` falls within the variable's preferred range.
    pub in_preferred_range: bool,
    /// Normalized distance from the preferred center, in `[0, 1]`.
    pub deviation: f64,
    /// Directional trend relative to a prior estimate, if computed.
    pub trend: Option<Trend>,
}
