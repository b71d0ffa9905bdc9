// crates/substrate-policy/src/engine.rs
// ============================================================================
// Module: Policy Evaluation Engine
// Description: Trigger matching, policy selection/ordering, the compiled-
//              policy cache, and the per-observation evaluation loop.
// Purpose: Implement C5 per spec.md §4.5.
// Dependencies: substrate-core, substrate-context, crate::lang
// ============================================================================

//! ## Overview
//! `evaluate_policies` runs one reaction cycle for a triggering observation:
//! select the node's policies whose triggers match the observation's type,
//! order them by ascending priority (ties by policy id), and run each in
//! turn against a context built with the running `prior_effects` list. A
//! `suppress` effect halts the remainder of the cycle. A policy that fails
//! to compile, exhausts its fuel budget, or returns a malformed or unknown
//! effect is a policy-level failure — it is recorded and evaluation
//! continues with the next policy, mirroring `substrate_estimator`'s
//! per-variable failure isolation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use substrate_config::SubstrateConfig;
use substrate_context::ContextError;
use substrate_context::ContextInputs;
use substrate_context::build_context;
use substrate_core::Effect;
use substrate_core::Observation;
use substrate_core::Policy;
use substrate_core::PolicyId;
use substrate_core::Repository;
use substrate_core::Timestamp;
use thiserror::Error;
use tracing::instrument;
use tracing::warn;

use crate::lang::LangError;
use crate::lang::Program;

// ============================================================================
// SECTION: Trigger Matching
// ============================================================================

/// Returns `true` when `trigger` matches `observation_type` (`spec.md`
/// §4.5): `*` matches any type; `prefix.*` matches `prefix` itself or any
/// `prefix.<suffix>`; anything else matches only an exact type string.
#[must_use]
pub fn matches_trigger(trigger: &str, observation_type: &str) -> bool {
    if trigger == "*" {
        return true;
    }
    match trigger.strip_suffix(".*") {
        Some(prefix) => observation_type == prefix || observation_type.starts_with(&format!("{prefix}.")),
        None => trigger == observation_type,
    }
}

// ============================================================================
// SECTION: Selection
// ============================================================================

/// Selects and orders the policies eligible to react to `observation_type`:
/// enabled, with at least one matching trigger, ascending `priority`, ties
/// broken by ascending policy id (`spec.md` §4.5).
#[must_use]
pub fn select_policies<'a>(policies: &'a [Policy], observation_type: &str) -> Vec<&'a Policy> {
    let mut selected: Vec<&Policy> = policies
        .iter()
        .filter(|policy| policy.enabled)
        .filter(|policy| policy.triggers.iter().any(|trigger| matches_trigger(trigger, observation_type)))
        .collect();
    selected.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.as_str().cmp(b.id.as_str())));
    selected
}

// ============================================================================
// SECTION: Compiled Policy Cache
// ============================================================================

/// Caches parsed [`Program`]s keyed by `(policy id, updated_at)`
/// (`spec.md` §4.5 "Compilation is cached ... invalidated on update"): a
/// policy edit bumps `updated_at`, which is a different key, so the stale
/// entry is simply never looked up again rather than explicitly evicted.
/// The key is stored as strings rather than the domain types directly since
/// neither `PolicyId` nor `Timestamp` derives `Hash`.
#[derive(Default)]
pub struct PolicyCache {
    /// `(policy_id, updated_at.to_string())` -> compiled program.
    programs: Mutex<HashMap<(String, String), Arc<Program>>>,
}

impl PolicyCache {
    /// Builds an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the compiled program for `policy`, parsing and caching it on
    /// first use. A previous entry under a different `updated_at` is left
    /// in place rather than evicted; it simply stops being reachable.
    ///
    /// # Errors
    ///
    /// Returns [`LangError::Parse`] if `policy.implementation.code` does not
    /// parse.
    pub fn get_or_compile(&self, policy: &Policy) -> Result<Arc<Program>, LangError> {
        let key = (policy.id.to_string(), policy.updated_at.to_string());
        let mut programs = self.programs.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(cached) = programs.get(&key) {
            return Ok(Arc::clone(cached));
        }
        let program = Arc::new(Program::parse(&policy.implementation.code)?);
        programs.insert(key, Arc::clone(&program));
        Ok(program)
    }
}

// ============================================================================
// SECTION: Evaluation Errors
// ============================================================================

/// Failures that abort the whole evaluation cycle, as distinct from a
/// single policy's own failure (recorded per-policy; never aborts the
/// cycle, per `spec.md` §4.5's purity contract).
#[derive(Debug, Error)]
pub enum PolicyEngineError {
    /// The context for the evaluating node could not be built at all (e.g.
    /// the node itself is missing).
    #[error("context error: {0}")]
    Context(#[from] ContextError),
}

// ============================================================================
// SECTION: Evaluation Outcome
// ============================================================================

/// What happened when one selected policy's compiled program ran.
#[derive(Debug, Clone)]
pub struct PolicyEvaluation {
    /// The policy that ran.
    pub policy_id: PolicyId,
    /// Effects it produced, empty if it failed.
    pub effects: Vec<Effect>,
    /// Present when this policy failed (compile, fuel, or effect-shape
    /// errors) — the cycle continues regardless.
    pub error: Option<String>,
}

/// The result of running every selected policy against one observation.
#[derive(Debug, Clone, Default)]
pub struct EvaluationOutcome {
    /// Every effect produced by every policy that ran, in evaluation order,
    /// truncated at a `suppress` effect if one occurred.
    pub effects: Vec<Effect>,
    /// Per-policy evaluation record, in selection order.
    pub evaluations: Vec<PolicyEvaluation>,
    /// Whether a `suppress` effect halted the cycle early.
    pub suppressed: bool,
    /// The reason given by the `suppress` effect, if any.
    pub suppress_reason: Option<String>,
}

// ============================================================================
// SECTION: Evaluation Loop
// ============================================================================

/// Runs `spec.md` §4.5's reaction cycle for `observation` against `policies`
/// (already scoped to the observation's node by the caller).
///
/// # Errors
///
/// Returns [`PolicyEngineError`] only when the evaluating node's context
/// cannot be built at all; a single policy's own failure is recorded on its
/// [`PolicyEvaluation`] instead and does not abort the cycle.
#[instrument(skip(repository, cache, config, policies), fields(observation_id = %observation.id, candidates = policies.len()))]
pub fn evaluate_policies(
    repository: &dyn Repository,
    cache: &PolicyCache,
    config: &SubstrateConfig,
    observation: &Observation,
    policies: &[Policy],
    now: Timestamp,
) -> Result<EvaluationOutcome, PolicyEngineError> {
    let selected = select_policies(policies, &observation.type_);
    let mut prior_effects: Vec<serde_json::Value> = Vec::new();
    let mut outcome = EvaluationOutcome::default();

    for policy in selected {
        let ctx = build_context(
            repository,
            ContextInputs {
                observation,
                policy,
                prior_effects: prior_effects.clone(),
                requested_artifact_ids: &[],
                requested_entity_ids: &[],
            },
            now,
        )?;

        let program = match cache.get_or_compile(policy) {
            Ok(program) => program,
            Err(err) => {
                warn!(policy_id = %policy.id, error = %err, "policy failed to compile");
                outcome.evaluations.push(PolicyEvaluation { policy_id: policy.id.clone(), effects: Vec::new(), error: Some(err.to_string()) });
                continue;
            }
        };

        let raw_effects = match program.run(&ctx, config.max_policy_fuel_steps) {
            Ok(values) => values,
            Err(err) => {
                warn!(policy_id = %policy.id, error = %err, "policy evaluation failed");
                outcome.evaluations.push(PolicyEvaluation { policy_id: policy.id.clone(), effects: Vec::new(), error: Some(err.to_string()) });
                continue;
            }
        };

        let parsed = raw_effects.iter().map(Effect::from_json).collect::<Result<Vec<_>, _>>();
        let effects = match parsed {
            Ok(effects) => effects,
            Err(err) => {
                warn!(policy_id = %policy.id, error = %err, "policy returned a malformed or unknown effect");
                outcome.evaluations.push(PolicyEvaluation { policy_id: policy.id.clone(), effects: Vec::new(), error: Some(err.to_string()) });
                continue;
            }
        };

        outcome.evaluations.push(PolicyEvaluation { policy_id: policy.id.clone(), effects: effects.clone(), error: None });

        let mut halted = false;
        for effect in effects {
            prior_effects.push(effect.to_json());
            if let Effect::Suppress { reason } = &effect {
                outcome.suppressed = true;
                outcome.suppress_reason = Some(reason.clone());
                outcome.effects.push(effect);
                halted = true;
                break;
            }
            outcome.effects.push(effect);
        }
        if halted {
            break;
        }
    }

    Ok(outcome)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions are permitted.")]

    use substrate_core::NodeId;
    use substrate_core::NodeKind;
    use substrate_core::Observation;
    use substrate_core::ObservationId;
    use substrate_core::PolicyImplementation;
    use substrate_core::PolicyImplementationKind;
    use substrate_core::Provenance;
    use substrate_store_memory::InMemoryStore;

    use super::*;

    #[test]
    fn wildcard_trigger_matches_any_type() {
        assert!(matches_trigger("*", "health.sleep"));
        assert!(matches_trigger("*", "anything.at.all"));
    }

    #[test]
    fn prefix_trigger_matches_prefix_and_children() {
        assert!(matches_trigger("health.*", "health"));
        assert!(matches_trigger("health.*", "health.sleep"));
        assert!(!matches_trigger("health.*", "healthy"));
        assert!(!matches_trigger("health.*", "finance.spend"));
    }

    #[test]
    fn exact_trigger_matches_only_itself() {
        assert!(matches_trigger("health.sleep", "health.sleep"));
        assert!(!matches_trigger("health.sleep", "health.sleep.rem"));
    }

    fn policy(id: &str, priority: i64, code: &str) -> Policy {
        Policy {
            id: PolicyId::new(id).unwrap(),
            node_id: NodeId::new("n1").unwrap(),
            name: id.to_string(),
            priority,
            enabled: true,
            triggers: vec!["health.*".to_string()],
            implementation: PolicyImplementation { kind: PolicyImplementationKind::Sandboxed, code: code.to_string() },
            updated_at: Timestamp::parse("2026-01-01T00:00:00Z").unwrap(),
        }
    }

    fn log_effect(message: &str) -> String {
        format!(r#"{{"effects": ["array", {{"effect": "log", "level": "info", "message": {message:?}}}]}}"#)
    }

    #[test]
    fn selection_orders_by_priority_then_id() {
        let policies =
            vec![policy("b", 5, &log_effect("b")), policy("a", 5, &log_effect("a")), policy("first", 1, &log_effect("first"))];
        let selected = select_policies(&policies, "health.sleep");
        let ids: Vec<&str> = selected.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "a", "b"]);
    }

    #[test]
    fn disabled_policy_is_never_selected() {
        let mut disabled = policy("d", 1, &log_effect("d"));
        disabled.enabled = false;
        let policies = vec![disabled];
        assert!(select_policies(&policies, "health.sleep").is_empty());
    }

    fn setup_store() -> (InMemoryStore, Observation, Timestamp) {
        let store = InMemoryStore::new();
        let now = Timestamp::parse("2026-01-01T00:00:00Z").unwrap();
        store
            .create_node(substrate_core::Node {
                id: NodeId::new("n1").unwrap(),
                kind: NodeKind::Subject,
                name: "n1".to_string(),
                description: None,
                created_at: now,
                updated_at: now,
            })
            .unwrap();
        let observation = Observation {
            id: ObservationId::new("o1").unwrap(),
            node_id: NodeId::new("n1").unwrap(),
            type_: "health.sleep".to_string(),
            timestamp: now,
            payload: serde_json::json!({ "hours": 7.5 }),
            provenance: Provenance { source_id: NodeId::new("n1").unwrap(), sponsor_id: None, method: None, confidence: None },
            tags: vec![],
        };
        (store, observation, now)
    }

    #[test]
    fn evaluation_runs_selected_policies_and_collects_effects() {
        let (store, observation, now) = setup_store();
        let policies = vec![policy("p1", 1, &log_effect("from p1"))];
        let cache = PolicyCache::new();
        let config = SubstrateConfig { database_url: "memory://".to_string(), ..SubstrateConfig::default() };
        let outcome = evaluate_policies(&store, &cache, &config, &observation, &policies, now).unwrap();
        assert_eq!(outcome.effects.len(), 1);
        assert!(outcome.evaluations[0].error.is_none());
        assert!(!outcome.suppressed);
    }

    #[test]
    fn suppress_effect_halts_remaining_policies() {
        let (store, observation, now) = setup_store();
        let suppressing = r#"{"effects": ["array", {"effect": "suppress", "reason": "quiet hours"}]}"#;
        let policies = vec![policy("first", 1, suppressing), policy("second", 2, &log_effect("never runs"))];
        let cache = PolicyCache::new();
        let config = SubstrateConfig { database_url: "memory://".to_string(), ..SubstrateConfig::default() };
        let outcome = evaluate_policies(&store, &cache, &config, &observation, &policies, now).unwrap();
        assert!(outcome.suppressed);
        assert_eq!(outcome.suppress_reason.as_deref(), Some("quiet hours"));
        assert_eq!(outcome.evaluations.len(), 1);
    }

    #[test]
    fn malformed_policy_is_isolated_and_evaluation_continues() {
        let (store, observation, now) = setup_store();
        let policies = vec![policy("broken", 1, "{}"), policy("ok", 2, &log_effect("survived"))];
        let cache = PolicyCache::new();
        let config = SubstrateConfig { database_url: "memory://".to_string(), ..SubstrateConfig::default() };
        let outcome = evaluate_policies(&store, &cache, &config, &observation, &policies, now).unwrap();
        assert_eq!(outcome.evaluations.len(), 2);
        assert!(outcome.evaluations[0].error.is_some());
        assert!(outcome.evaluations[1].error.is_none());
        assert_eq!(outcome.effects.len(), 1);
    }

    #[test]
    fn cache_reuses_compiled_program_across_calls() {
        let policy = policy("cached", 1, &log_effect("cached"));
        let cache = PolicyCache::new();
        let first = cache.get_or_compile(&policy).unwrap();
        let second = cache.get_or_compile(&policy).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn cache_recompiles_after_updated_at_changes() {
        let mut policy = policy("cached", 1, &log_effect("v1"));
        let cache = PolicyCache::new();
        let first = cache.get_or_compile(&policy).unwrap();
        policy.updated_at = Timestamp::parse("2026-01-02T00:00:00Z").unwrap();
        policy.implementation.code = log_effect("v2");
        let second = cache.get_or_compile(&policy).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }
}
