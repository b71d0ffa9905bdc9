// crates/substrate-context/src/lib.rs
// ============================================================================
// Module: Substrate Context Builder
// Description: Builds the frozen read snapshot handed to one policy evaluation.
// Purpose: Implement C4 per spec.md §4.4.
// Dependencies: substrate-core, substrate-estimator, serde_json, thiserror
// ============================================================================

//! ## Overview
//! [`build_context`] prefetches everything a single policy evaluation may
//! read — the node, its edges and incoming grants, active episodes, all
//! variables, up to the last 1000 observations within 7 days, and any
//! requested artifacts/entities — and hands back a [`PolicyContext`] that
//! only exposes read accessors. There is no mutable handle back into it: the
//! Rust equivalent of `spec.md` §4.4's "deep-frozen" requirement is simply
//! that nothing in this crate returns `&mut` into a built context.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cell::RefCell;
use std::collections::HashMap;

use substrate_core::Artifact;
use substrate_core::ArtifactId;
use substrate_core::Edge;
use substrate_core::Entity;
use substrate_core::EntityId;
use substrate_core::Episode;
use substrate_core::Grant;
use substrate_core::Node;
use substrate_core::NodeId;
use substrate_core::Observation;
use substrate_core::ObservationFilter;
use substrate_core::Policy;
use substrate_core::PolicyId;
use substrate_core::RelativeWindow;
use substrate_core::Repository;
use substrate_core::RepositoryError;
use substrate_core::Timestamp;
use substrate_core::Variable;
use substrate_core::VariableEstimate;
use substrate_core::VariableId;
use substrate_estimator::EstimatorError;
use substrate_estimator::estimate_variable;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Context-building failures (`spec.md` §4.4).
#[derive(Debug, Error)]
pub enum ContextError {
    /// The node named by the triggering observation does not exist.
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),
    /// A prefetch call failed at the backend. Missing artifacts/entities are
    /// not represented here — they are simply omitted from the built
    /// context, matching `Repository`'s "absence is `Ok(None)`" stance.
    #[error("underlying repository error: {0}")]
    Repository(#[from] RepositoryError),
}

// ============================================================================
// SECTION: Node View
// ============================================================================

/// The prefetched node, its outgoing edges, and its incoming grants
/// (`spec.md` §4.4 "node {id, kind, edges, grants}").
#[derive(Debug, Clone, PartialEq)]
pub struct NodeView {
    /// The node itself.
    pub node: Node,
    /// Edges where this node is the source.
    pub edges: Vec<Edge>,
    /// Grants issued to this node as grantee.
    pub grants: Vec<Grant>,
}

// ============================================================================
// SECTION: Context Inputs
// ============================================================================

/// The inputs that vary per evaluation of one policy (`spec.md` §4.4
/// "Inputs").
pub struct ContextInputs<'a> {
    /// The observation that triggered this evaluation.
    pub observation: &'a Observation,
    /// The policy about to be evaluated.
    pub policy: &'a Policy,
    /// Effects accumulated by earlier policies in this evaluation loop,
    /// represented as opaque JSON the way the sandboxed policy language
    /// sees them.
    pub prior_effects: Vec<serde_json::Value>,
    /// Artifact ids the caller wants prefetched in addition to the default
    /// set.
    pub requested_artifact_ids: &'a [ArtifactId],
    /// Entity ids the caller wants prefetched in addition to the default
    /// set.
    pub requested_entity_ids: &'a [EntityId],
}

// ============================================================================
// SECTION: Policy Context
// ============================================================================

/// The immutable read snapshot handed to one policy evaluation (`spec.md`
/// §4.4). Every accessor returns owned data or an immutable reference; there
/// is no way to mutate a built context.
pub struct PolicyContext {
    /// The triggering observation.
    observation: Observation,
    /// The evaluating node, its edges, and its incoming grants.
    node: NodeView,
    /// Effects accumulated so far in this evaluation loop.
    prior_effects: Vec<serde_json::Value>,
    /// Active episodes on the node.
    active_episodes: Vec<Episode>,
    /// All variables on the node.
    variables: Vec<Variable>,
    /// Observations on the node within the last 7 days, up to 1000,
    /// shared by both the estimator and `query_observations`.
    observation_pool: Vec<Observation>,
    /// Artifacts prefetched by request.
    artifacts: Vec<Artifact>,
    /// Entities prefetched by request.
    entities: Vec<Entity>,
    /// When this context was built.
    evaluated_at: Timestamp,
    /// The policy being evaluated.
    policy_id: PolicyId,
    /// The policy's priority, carried through for convenience.
    priority: i64,
    /// Per-cycle memoization of `get_variable_estimate`: `None` inside the
    /// option means "not yet computed", the inner `Option` is the cached
    /// estimate itself (absent for unknown variable ids).
    estimate_cache: RefCell<HashMap<VariableId, Option<VariableEstimate>>>,
}

/// Hours back from the evaluation instant the context prefetches
/// observations from (`spec.md` §4.4).
const PREFETCH_WINDOW_HOURS: f64 = 24.0 * 7.0;

/// Maximum observations prefetched into one context (`spec.md` §4.4).
const PREFETCH_OBSERVATION_LIMIT: usize = 1000;

impl PolicyContext {
    /// The triggering observation.
    #[must_use]
    pub const fn observation(&self) -> &Observation {
        &self.observation
    }

    /// The evaluating node, its edges, and its incoming grants.
    #[must_use]
    pub const fn node(&self) -> &NodeView {
        &self.node
    }

    /// Effects accumulated by earlier policies this evaluation cycle.
    #[must_use]
    pub fn prior_effects(&self) -> &[serde_json::Value] {
        &self.prior_effects
    }

    /// Active episodes on the node.
    #[must_use]
    pub fn active_episodes(&self) -> &[Episode] {
        &self.active_episodes
    }

    /// All variables on the node.
    #[must_use]
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    /// Artifacts prefetched for this evaluation.
    #[must_use]
    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    /// Entities prefetched for this evaluation.
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// When this context was built.
    #[must_use]
    pub const fn evaluated_at(&self) -> Timestamp {
        self.evaluated_at
    }

    /// The policy being evaluated.
    #[must_use]
    pub const fn policy_id(&self) -> &PolicyId {
        &self.policy_id
    }

    /// The policy's priority.
    #[must_use]
    pub const fn priority(&self) -> i64 {
        self.priority
    }

    /// Applies `filter` to the prefetched observation pool: `type_` exact
    /// match, `type_prefix` literal prefix, `window`/`time_range` bound the
    /// instant, results sorted descending by timestamp, `offset` then the
    /// effective limit applied (`spec.md` §4.4 "canon.queryObservations").
    ///
    /// This never reaches back to a repository — it only ever sees the
    /// observations already prefetched into this context, so it cannot
    /// surface results newer than `evaluated_at` or older than the 7-day
    /// prefetch window regardless of what `filter` requests.
    #[must_use]
    pub fn query_observations(&self, filter: &ObservationFilter) -> Vec<Observation> {
        let mut matched: Vec<&Observation> = self
            .observation_pool
            .iter()
            .filter(|obs| filter.type_.as_deref().is_none_or(|t| obs.type_ == t))
            .filter(|obs| filter.type_prefix.as_deref().is_none_or(|prefix| obs.type_.starts_with(prefix)))
            .collect();

        if filter.uses_default_window() {
            let start = filter.reference_time.minus_hours(ObservationFilter::DEFAULT_WINDOW_HOURS);
            matched.retain(|obs| obs.timestamp >= start);
        } else {
            if let Some(window) = filter.window {
                let start = filter.reference_time.minus_hours(window.hours);
                matched.retain(|obs| obs.timestamp >= start);
            }
            if let Some(range) = filter.time_range {
                if let Some(start) = range.start {
                    matched.retain(|obs| obs.timestamp >= start);
                }
                if let Some(end) = range.end {
                    matched.retain(|obs| obs.timestamp <= end);
                }
            }
        }

        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        matched.into_iter().skip(filter.offset).take(filter.effective_limit()).cloned().collect()
    }

    /// Returns the memoized estimate for `variable_id`, computing and
    /// caching it on first call (`spec.md` §4.4
    /// "estimates.getVariableEstimate"). Unknown variable ids return `None`
    /// and are cached as such. The context holds no prior
    /// [`substrate_core::VariableEstimate`] to compare against, so
    /// `estimate_variable` is always called with `previous: None`; any
    /// [`substrate_core::Trend`] on the result comes from its own fallback
    /// recomputation over the 24h-earlier slice of this same observation
    /// pool (`spec.md` §4.3).
    #[must_use]
    pub fn get_variable_estimate(&self, variable_id: &VariableId) -> Option<VariableEstimate> {
        if let Some(cached) = self.estimate_cache.borrow().get(variable_id) {
            return cached.clone();
        }

        let computed = self
            .variables
            .iter()
            .find(|variable| &variable.id == variable_id)
            .and_then(|variable| estimate_variable(variable, &self.observation_pool, self.evaluated_at, None).ok());

        self.estimate_cache.borrow_mut().insert(variable_id.clone(), computed.clone());
        computed
    }
}

// ============================================================================
// SECTION: Context Building
// ============================================================================

/// Prefetches everything `inputs.policy`'s evaluation may read and returns a
/// frozen [`PolicyContext`] (`spec.md` §4.4).
///
/// # Errors
///
/// Returns [`ContextError::NodeNotFound`] if the triggering observation
/// names a node that no longer exists, or [`ContextError::Repository`] if
/// any prefetch call fails at the backend.
pub fn build_context(repository: &dyn Repository, inputs: ContextInputs<'_>, now: Timestamp) -> Result<PolicyContext, ContextError> {
    let node_id = &inputs.observation.node_id;
    let node = repository.get_node(node_id)?.ok_or_else(|| ContextError::NodeNotFound(node_id.clone()))?;
    let edges = repository.list_edges_from(node_id)?;
    let grants = repository.list_grants_for_grantee(node_id)?;
    let active_episodes = repository.list_active_episodes_for_node(node_id)?;
    let variables = repository.list_variables_for_node(node_id)?;

    let filter = ObservationFilter {
        node_id: Some(node_id.clone()),
        type_: None,
        type_prefix: None,
        window: Some(RelativeWindow { hours: PREFETCH_WINDOW_HOURS }),
        time_range: None,
        reference_time: now,
        limit: Some(PREFETCH_OBSERVATION_LIMIT),
        offset: 0,
    };
    let observation_pool = repository.query_observations(&filter)?;

    let artifacts = inputs
        .requested_artifact_ids
        .iter()
        .filter_map(|id| repository.get_artifact(id).transpose())
        .collect::<Result<Vec<_>, _>>()?;
    let entities = inputs
        .requested_entity_ids
        .iter()
        .filter_map(|id| repository.get_entity(id).transpose())
        .collect::<Result<Vec<_>, _>>()?;

    Ok(PolicyContext {
        observation: inputs.observation.clone(),
        node: NodeView { node, edges, grants },
        prior_effects: inputs.prior_effects,
        active_episodes,
        variables,
        observation_pool,
        artifacts,
        entities,
        evaluated_at: now,
        policy_id: inputs.policy.id.clone(),
        priority: inputs.policy.priority,
        estimate_cache: RefCell::new(HashMap::new()),
    })
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions are permitted.")]

    use substrate_core::Aggregation;
    use substrate_core::ComputeSpec;
    use substrate_core::ComputeWindow;
    use substrate_core::NodeKind;
    use substrate_core::ObservationId;
    use substrate_core::PolicyImplementation;
    use substrate_core::PolicyImplementationKind;
    use substrate_core::Provenance;
    use substrate_core::VariableKind;
    use substrate_store_memory::InMemoryStore;

    use super::*;

    fn node(id: &str) -> Node {
        Node {
            id: NodeId::new(id).unwrap(),
            kind: NodeKind::Subject,
            name: "subject".to_string(),
            description: None,
            created_at: Timestamp::parse("2026-01-01T00:00:00Z").unwrap(),
            updated_at: Timestamp::parse("2026-01-01T00:00:00Z").unwrap(),
        }
    }

    fn observation(id: &str, node_id: &str, hours_ago: f64, now: Timestamp) -> Observation {
        Observation {
            id: ObservationId::new(id).unwrap(),
            node_id: NodeId::new(node_id).unwrap(),
            type_: "health.sleep".to_string(),
            timestamp: now.minus_hours(hours_ago),
            payload: serde_json::json!({ "hours": 7.5 }),
            provenance: Provenance {
                source_id: NodeId::new(node_id).unwrap(),
                sponsor_id: None,
                method: None,
                confidence: None,
            },
            tags: vec![],
        }
    }

    fn policy(id: &str, node_id: &str) -> Policy {
        Policy {
            id: PolicyId::new(id).unwrap(),
            node_id: NodeId::new(node_id).unwrap(),
            name: "p".to_string(),
            priority: 10,
            enabled: true,
            triggers: vec!["*".to_string()],
            implementation: PolicyImplementation {
                kind: PolicyImplementationKind::Sandboxed,
                code: "[]".to_string(),
            },
            updated_at: Timestamp::parse("2026-01-01T00:00:00Z").unwrap(),
        }
    }

    #[test]
    fn build_context_prefetches_node_and_observations() {
        let store = InMemoryStore::new();
        store.create_node(node("n1")).unwrap();
        let now = Timestamp::parse("2026-07-28T00:00:00Z").unwrap();
        store.append_observation(observation("o1", "n1", 1.0, now)).unwrap();
        let triggering = observation("o2", "n1", 0.0, now);
        let pol = policy("p1", "n1");

        let ctx = build_context(
            &store,
            ContextInputs {
                observation: &triggering,
                policy: &pol,
                prior_effects: vec![],
                requested_artifact_ids: &[],
                requested_entity_ids: &[],
            },
            now,
        )
        .unwrap();

        assert_eq!(ctx.node().node.id, NodeId::new("n1").unwrap());
        assert_eq!(ctx.query_observations(&ObservationFilter {
            node_id: None,
            type_: None,
            type_prefix: None,
            window: None,
            time_range: None,
            reference_time: now,
            limit: None,
            offset: 0,
        }).len(), 2);
    }

    #[test]
    fn missing_node_is_an_error() {
        let store = InMemoryStore::new();
        let now = Timestamp::parse("2026-07-28T00:00:00Z").unwrap();
        let triggering = observation("o1", "ghost", 0.0, now);
        let pol = policy("p1", "ghost");
        let err = build_context(
            &store,
            ContextInputs {
                observation: &triggering,
                policy: &pol,
                prior_effects: vec![],
                requested_artifact_ids: &[],
                requested_entity_ids: &[],
            },
            now,
        )
        .unwrap_err();
        assert!(matches!(err, ContextError::NodeNotFound(_)));
    }

    #[test]
    fn get_variable_estimate_memoizes_and_handles_unknown_ids() {
        let store = InMemoryStore::new();
        store.create_node(node("n1")).unwrap();
        let now = Timestamp::parse("2026-07-28T00:00:00Z").unwrap();
        let variable = Variable {
            id: VariableId::new("v1").unwrap(),
            node_id: NodeId::new("n1").unwrap(),
            key: "sleep".to_string(),
            title: "Sleep".to_string(),
            kind: VariableKind::Continuous,
            unit: None,
            viable_range: None,
            preferred_range: None,
            compute_specs: vec![ComputeSpec {
                observation_type_patterns: vec!["health.sleep".to_string()],
                aggregation: Aggregation::Avg,
                window: Some(ComputeWindow { hours: Some(168.0), count: None }),
                confidence: None,
            }],
        };
        store.create_variable(variable).unwrap();
        store.append_observation(observation("o1", "n1", 1.0, now)).unwrap();
        let triggering = observation("o2", "n1", 0.0, now);
        let pol = policy("p1", "n1");

        let ctx = build_context(
            &store,
            ContextInputs {
                observation: &triggering,
                policy: &pol,
                prior_effects: vec![],
                requested_artifact_ids: &[],
                requested_entity_ids: &[],
            },
            now,
        )
        .unwrap();

        let first = ctx.get_variable_estimate(&VariableId::new("v1").unwrap());
        let second = ctx.get_variable_estimate(&VariableId::new("v1").unwrap());
        assert_eq!(first, second);
        assert!(first.unwrap().value.is_some());

        let unknown = ctx.get_variable_estimate(&VariableId::new("ghost").unwrap());
        assert_eq!(unknown, None);
    }
}
