// crates/substrate-effects/src/lib.rs
// ============================================================================
// Module: Substrate Effect Executor
// Description: Dispatches the effects a policy evaluation produced, routing
//              every mutation-bearing effect through Prism.
// Purpose: Implement C6 per spec.md §4.6.
// Dependencies: substrate-core, substrate-prism, serde_json, thiserror, tracing
// ============================================================================

//! ## Overview
//! `execute_effects` runs `spec.md` §4.6's dispatch loop over the effects one
//! reaction cycle produced: look up the handler for each effect's tag, run
//! it, capture `{effect, success, durationMs, data?, error?}`, and either
//! stop or continue depending on `continue_on_error`. The loop returns an
//! [`ExecutionReport`] aggregating `successCount`/`failureCount`/
//! `totalDurationMs` and whatever `suppress` state was reached.
//!
//! Every handler that mutates canon (`route_observation`,
//! `create_entity_event`, `propose_action`) builds a
//! `substrate_prism::operation::OperationPayload` and calls
//! [`substrate_prism::Prism::commit`] rather than writing to the
//! [`substrate_core::Repository`] directly — this crate has no other path
//! to canon. `tag_observation` is the one documented exception: it calls
//! `Repository::tag_observation` directly, since that method is already
//! idempotent and `spec.md` §9's open question (a) resolves observation tags
//! as the one field on an otherwise-immutable `Observation` that mutates in
//! place without its own audited operation. `suppress` and `log` never touch
//! the repository at all.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod packs;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Instant;

use serde_json::Value;
use substrate_core::Actor;
use substrate_core::CausedBy;
use substrate_core::Effect;
use substrate_core::NodeId;
use substrate_core::ObservationId;
use substrate_core::PolicyId;
use substrate_core::ProposedBy;
use substrate_core::Repository;
use substrate_core::RiskLevel;
use substrate_core::Timestamp;
use substrate_prism::Prism;
use substrate_prism::error::PrismError;
use substrate_prism::operation::ActionRunDraft;
use substrate_prism::operation::OperationEnvelope;
use substrate_prism::operation::OperationPayload;
use substrate_prism::operation::PrismOperation;
use thiserror::Error;
use tracing::debug;
use tracing::info;
use tracing::instrument;
use tracing::warn;

pub use packs::PackHandler;
pub use packs::PackRegistry;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Failures from running a single effect (`spec.md` §4.6, §7).
#[derive(Debug, Error)]
pub enum EffectError {
    /// The underlying Prism commit failed.
    #[error("{0}")]
    Prism(#[from] PrismError),
    /// The underlying repository call failed directly (the `tag_observation`
    /// bypass path).
    #[error("repository error: {0}")]
    Repository(String),
    /// `propose_action` was invoked without a policy id in its invocation
    /// (required by `ProposedBy`).
    #[error("propose_action requires a policy id")]
    MissingPolicyId,
    /// A `pack:<name>:<action>` effect named a pack with no registered
    /// handler.
    #[error("unknown pack: {0}")]
    UnknownPack(String),
}

// ============================================================================
// SECTION: Invocation
// ============================================================================

/// One effect paired with the policy that produced it, if any — the input
/// unit `execute_effects` dispatches. Pairing lives here rather than in
/// `substrate-policy` itself, since the executor only needs to know "which
/// policy proposed this" for `propose_action`'s audit trail, not the rest of
/// that crate's evaluation machinery.
#[derive(Debug, Clone)]
pub struct EffectInvocation {
    /// The effect to execute.
    pub effect: Effect,
    /// The policy that produced it, when known.
    pub policy_id: Option<PolicyId>,
}

// ============================================================================
// SECTION: Execution Context
// ============================================================================

/// Everything a handler (built-in or pack) needs to execute one effect.
pub struct ExecutionContext<'a> {
    /// Commits mutations to canon.
    pub prism: &'a Prism<'a>,
    /// Backing store, used only by the `tag_observation` bypass path.
    pub repository: &'a dyn Repository,
    /// The node this reaction cycle is scoped to.
    pub node_id: NodeId,
    /// The actor recorded on every synthesized Prism operation.
    pub actor: Actor,
    /// The observation that triggered this reaction cycle.
    pub observation_id: ObservationId,
    /// The policy that produced the effect currently being executed, if any.
    pub policy_id: Option<PolicyId>,
    /// The evaluation instant.
    pub now: Timestamp,
}

impl ExecutionContext<'_> {
    /// Builds the `caused_by` chain shared by every operation this cycle
    /// synthesizes, tagging it with `effect_type`.
    fn caused_by(&self, effect_type: &str) -> CausedBy {
        CausedBy {
            observation_id: Some(self.observation_id.clone()),
            policy_id: self.policy_id.clone(),
            action_run_id: None,
            effect_type: Some(effect_type.to_string()),
        }
    }
}

// ============================================================================
// SECTION: Result / Report
// ============================================================================

/// The outcome of executing one effect (`spec.md` §4.6).
#[derive(Debug, Clone)]
pub struct EffectResult {
    /// The effect that was executed.
    pub effect: Effect,
    /// Whether it succeeded.
    pub success: bool,
    /// Wall-clock time the handler took.
    pub duration_ms: u64,
    /// Opaque result data, when the handler produced any.
    pub data: Option<Value>,
    /// Error detail, when `success == false`.
    pub error: Option<String>,
}

/// The aggregate outcome of one `execute_effects` call (`spec.md` §4.6).
#[derive(Debug, Clone, Default)]
pub struct ExecutionReport {
    /// Per-effect results, in execution order.
    pub results: Vec<EffectResult>,
    /// Count of `results` with `success == true`.
    pub success_count: usize,
    /// Count of `results` with `success == false`.
    pub failure_count: usize,
    /// Sum of every result's `duration_ms`.
    pub total_duration_ms: u64,
    /// Whether a `suppress` effect was reached.
    pub suppressed: bool,
    /// The reason given by the `suppress` effect, if reached.
    pub suppress_reason: Option<String>,
}

// ============================================================================
// SECTION: Dispatch Loop
// ============================================================================

/// Runs every invocation in order, dispatching each effect to its handler.
/// Stops early on `suppress`, and — unless `continue_on_error` is set —
/// after the first failed effect (`spec.md` §4.6: `continueOnError` defaults
/// to `true`).
#[instrument(skip(prism, repository, packs, invocations), fields(node_id = %node_id, observation_id = %observation_id, count = invocations.len()))]
#[allow(clippy::too_many_arguments, reason = "Mirrors the fixed set of fields every synthesized Prism operation needs.")]
pub fn execute_effects(
    prism: &Prism<'_>,
    repository: &dyn Repository,
    packs: &PackRegistry,
    node_id: &NodeId,
    actor: &Actor,
    observation_id: &ObservationId,
    invocations: &[EffectInvocation],
    continue_on_error: bool,
    now: Timestamp,
) -> ExecutionReport {
    let mut report = ExecutionReport::default();

    for invocation in invocations {
        let ctx = ExecutionContext {
            prism,
            repository,
            node_id: node_id.clone(),
            actor: actor.clone(),
            observation_id: observation_id.clone(),
            policy_id: invocation.policy_id.clone(),
            now,
        };

        if let Effect::Suppress { reason } = &invocation.effect {
            report.suppressed = true;
            report.suppress_reason = Some(reason.clone());
            report.results.push(EffectResult {
                effect: invocation.effect.clone(),
                success: true,
                duration_ms: 0,
                data: None,
                error: None,
            });
            report.success_count += 1;
            break;
        }

        let started = Instant::now();
        let outcome = dispatch(&ctx, packs, &invocation.effect);
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let result = match outcome {
            Ok(data) => {
                report.success_count += 1;
                EffectResult { effect: invocation.effect.clone(), success: true, duration_ms, data: Some(data), error: None }
            }
            Err(err) => {
                warn!(effect = %invocation.effect.tag(), error = %err, "effect execution failed");
                report.failure_count += 1;
                EffectResult { effect: invocation.effect.clone(), success: false, duration_ms, data: None, error: Some(err.to_string()) }
            }
        };
        let failed = !result.success;
        report.total_duration_ms += result.duration_ms;
        report.results.push(result);

        if failed && !continue_on_error {
            break;
        }
    }

    report
}

/// Looks up and runs the handler for one effect.
fn dispatch(ctx: &ExecutionContext<'_>, packs: &PackRegistry, effect: &Effect) -> Result<Value, EffectError> {
    match effect {
        Effect::RouteObservation { to_node_id } => route_observation(ctx, to_node_id),
        Effect::CreateEntityEvent { entity_id, event_type, data } => create_entity_event(ctx, entity_id, event_type, data),
        Effect::ProposeAction { action } => propose_action(ctx, action),
        Effect::TagObservation { tags } => tag_observation(ctx, tags),
        Effect::Log { level, message } => {
            log_effect(*level, message);
            Ok(serde_json::json!({ "level": level.to_string(), "message": message }))
        }
        Effect::Suppress { .. } => unreachable!("suppress is handled by execute_effects before dispatch is called"),
        Effect::Pack { name, action, fields } => match packs.get(name) {
            Some(handler) => handler.handle(action, fields, ctx).map_err(EffectError::Repository),
            None => Err(EffectError::UnknownPack(name.clone())),
        },
    }
}

// ============================================================================
// SECTION: Built-in Handlers
// ============================================================================

/// `route_observation` (`spec.md` §4.6): append a copy of the triggering
/// observation under `to_node_id`. Fully implemented by
/// `OperationPayload::RouteObservation`; this handler only builds the
/// operation.
fn route_observation(ctx: &ExecutionContext<'_>, to_node_id: &NodeId) -> Result<Value, EffectError> {
    let op = PrismOperation {
        node_id: to_node_id.clone(),
        envelope: OperationEnvelope { actor: ctx.actor.clone(), caused_by: Some(ctx.caused_by("route_observation")) },
        payload: OperationPayload::RouteObservation { observation_id: ctx.observation_id.clone(), to_node_id: to_node_id.clone() },
    };
    Ok(ctx.prism.commit(op, ctx.now)?.result)
}

/// `create_entity_event` (`spec.md` §4.6): append an event to an existing
/// entity. Fails (via `Prism`'s `PrismError::NotFound`) if the entity does
/// not exist.
fn create_entity_event(ctx: &ExecutionContext<'_>, entity_id: &substrate_core::EntityId, event_type: &str, data: &Value) -> Result<Value, EffectError> {
    let op = PrismOperation {
        node_id: ctx.node_id.clone(),
        envelope: OperationEnvelope { actor: ctx.actor.clone(), caused_by: Some(ctx.caused_by("create_entity_event")) },
        payload: OperationPayload::AppendEntityEvent { entity_id: entity_id.clone(), event_type: event_type.to_string(), data: data.clone() },
    };
    Ok(ctx.prism.commit(op, ctx.now)?.result)
}

/// `propose_action` (`spec.md` §4.6): create a pending `ActionRun`,
/// auto-approved when its risk level is `low`. `action` carries its
/// `riskLevel` either as a top-level field or nested under `params`
/// (`spec.md` §4.6 describes the former; §8's scenario 5 example shows the
/// latter) — both are checked, top-level first, defaulting to `medium` when
/// neither parses, since auto-approval must never be the silent default for
/// an action that didn't declare itself low-risk.
fn propose_action(ctx: &ExecutionContext<'_>, action: &Value) -> Result<Value, EffectError> {
    let policy_id = ctx.policy_id.clone().ok_or(EffectError::MissingPolicyId)?;
    let risk_level = extract_risk_level(action);
    let op = PrismOperation {
        node_id: ctx.node_id.clone(),
        envelope: OperationEnvelope { actor: ctx.actor.clone(), caused_by: Some(ctx.caused_by("propose_action")) },
        payload: OperationPayload::CreateActionRun(ActionRunDraft {
            node_id: ctx.node_id.clone(),
            proposed_by: ProposedBy { policy_id, observation_id: ctx.observation_id.clone() },
            action: action.clone(),
            risk_level,
        }),
    };
    Ok(ctx.prism.commit(op, ctx.now)?.result)
}

/// Reads `action.riskLevel`, falling back to `action.params.riskLevel`.
fn extract_risk_level(action: &Value) -> RiskLevel {
    let top = action.get("riskLevel").and_then(Value::as_str);
    let nested = action.get("params").and_then(Value::as_object).and_then(|params| params.get("riskLevel")).and_then(Value::as_str);
    top.or(nested).and_then(parse_risk_level).unwrap_or(RiskLevel::Medium)
}

/// Parses a risk level string, matching `RiskLevel`'s `snake_case` wire form.
fn parse_risk_level(raw: &str) -> Option<RiskLevel> {
    match raw {
        "low" => Some(RiskLevel::Low),
        "medium" => Some(RiskLevel::Medium),
        "high" => Some(RiskLevel::High),
        "critical" => Some(RiskLevel::Critical),
        _ => None,
    }
}

/// `tag_observation` (`spec.md` §4.6, §9): union `tags` into the triggering
/// observation's existing tags, deduplicated. The one effect handler that
/// bypasses Prism, since `Repository::tag_observation` is already the
/// idempotent, directly-callable path for this field.
fn tag_observation(ctx: &ExecutionContext<'_>, tags: &[String]) -> Result<Value, EffectError> {
    let updated = ctx
        .repository
        .tag_observation(&ctx.observation_id, tags)
        .map_err(|err| EffectError::Repository(err.to_string()))?
        .ok_or_else(|| EffectError::Repository(format!("observation not found: {}", ctx.observation_id)))?;
    serde_json::to_value(&updated).map_err(|err| EffectError::Repository(err.to_string()))
}

/// `log` (`spec.md` §4.6): forward through `tracing`; never persisted.
fn log_effect(level: substrate_core::LogLevel, message: &str) {
    match level {
        substrate_core::LogLevel::Debug => debug!(%message, "policy log effect"),
        substrate_core::LogLevel::Info => info!(%message, "policy log effect"),
        substrate_core::LogLevel::Warn => warn!(%message, "policy log effect"),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions are permitted.")]

    use substrate_config::SubstrateConfig;
    use substrate_core::ActorMethod;
    use substrate_core::Node;
    use substrate_core::NodeKind;
    use substrate_core::Observation;
    use substrate_core::Provenance;
    use substrate_prism::ids::UuidGenerator;
    use substrate_store_memory::InMemoryStore;

    use super::*;

    struct NullReducer;

    impl substrate_core::EntityStateReducer for NullReducer {
        fn initial_state(&self, _type_id: &substrate_core::EntityTypeId) -> Value {
            serde_json::json!({})
        }

        fn apply(&self, _type_id: &substrate_core::EntityTypeId, _state: &Value, event: &substrate_core::EntityEvent) -> Value {
            event.data.clone()
        }
    }

    fn now() -> Timestamp {
        Timestamp::parse("2026-01-01T00:00:00Z").unwrap()
    }

    fn actor(node_id: &NodeId) -> Actor {
        Actor { node_id: node_id.clone(), kind: NodeKind::Subject, sponsor_id: None, method: ActorMethod::PolicyEffect }
    }

    fn setup() -> (InMemoryStore, NodeId, ObservationId) {
        let store = InMemoryStore::new();
        let node_id = NodeId::new("n1").unwrap();
        store
            .create_node(Node { id: node_id.clone(), kind: NodeKind::Subject, name: "n1".to_string(), description: None, created_at: now(), updated_at: now() })
            .unwrap();
        let observation_id = ObservationId::new("o1").unwrap();
        store
            .append_observation(Observation {
                id: observation_id.clone(),
                node_id: node_id.clone(),
                type_: "health.sleep".to_string(),
                timestamp: now(),
                payload: serde_json::json!({ "hours": 7 }),
                provenance: Provenance { source_id: node_id.clone(), sponsor_id: None, method: None, confidence: None },
                tags: vec!["existing".to_string()],
            })
            .unwrap();
        (store, node_id, observation_id)
    }

    #[test]
    fn route_observation_effect_appends_copy_through_prism() {
        let (store, node_id, observation_id) = setup();
        let target_node = NodeId::new("n2").unwrap();
        store
            .create_node(Node { id: target_node.clone(), kind: NodeKind::Subject, name: "n2".to_string(), description: None, created_at: now(), updated_at: now() })
            .unwrap();
        let ids = UuidGenerator;
        let reducer = NullReducer;
        let config = SubstrateConfig { database_url: "memory://".to_string(), ..SubstrateConfig::default() };
        let prism = Prism::new(&store, &ids, &reducer, &config);
        let packs = PackRegistry::new();

        let invocations = vec![EffectInvocation { effect: Effect::RouteObservation { to_node_id: target_node.clone() }, policy_id: None }];
        let report = execute_effects(&prism, &store, &packs, &node_id, &actor(&node_id), &observation_id, &invocations, true, now());

        assert_eq!(report.success_count, 1);
        assert_eq!(report.failure_count, 0);
        assert!(!store.query_observations(&substrate_core::ObservationFilter {
            node_id: Some(target_node),
            type_: None,
            type_prefix: None,
            window: None,
            time_range: None,
            reference_time: now(),
            limit: None,
            offset: 0,
        })
        .unwrap()
        .is_empty());
    }

    #[test]
    fn tag_observation_effect_bypasses_prism_and_dedupes() {
        let (store, node_id, observation_id) = setup();
        let ids = UuidGenerator;
        let reducer = NullReducer;
        let config = SubstrateConfig { database_url: "memory://".to_string(), ..SubstrateConfig::default() };
        let prism = Prism::new(&store, &ids, &reducer, &config);
        let packs = PackRegistry::new();

        let invocations = vec![EffectInvocation {
            effect: Effect::TagObservation { tags: vec!["existing".to_string(), "new".to_string()] },
            policy_id: None,
        }];
        let report = execute_effects(&prism, &store, &packs, &node_id, &actor(&node_id), &observation_id, &invocations, true, now());

        assert_eq!(report.success_count, 1);
        let observation = store.get_observation(&observation_id).unwrap().unwrap();
        assert_eq!(observation.tags.len(), 2);
    }

    #[test]
    fn propose_action_auto_approves_low_risk_from_nested_params() {
        let (store, node_id, observation_id) = setup();
        let ids = UuidGenerator;
        let reducer = NullReducer;
        let config = SubstrateConfig { database_url: "memory://".to_string(), ..SubstrateConfig::default() };
        let prism = Prism::new(&store, &ids, &reducer, &config);
        let packs = PackRegistry::new();

        let action = serde_json::json!({ "actionType": "send_notification", "params": { "riskLevel": "low" } });
        let invocations = vec![EffectInvocation {
            effect: Effect::ProposeAction { action },
            policy_id: Some(PolicyId::new("p1").unwrap()),
        }];
        let report = execute_effects(&prism, &store, &packs, &node_id, &actor(&node_id), &observation_id, &invocations, true, now());

        assert_eq!(report.success_count, 1);
        assert_eq!(report.results[0].data.as_ref().unwrap()["status"], "approved");
    }

    #[test]
    fn propose_action_defaults_to_medium_without_policy_id_fails() {
        let (store, node_id, observation_id) = setup();
        let ids = UuidGenerator;
        let reducer = NullReducer;
        let config = SubstrateConfig { database_url: "memory://".to_string(), ..SubstrateConfig::default() };
        let prism = Prism::new(&store, &ids, &reducer, &config);
        let packs = PackRegistry::new();

        let action = serde_json::json!({ "actionType": "send_notification" });
        let invocations = vec![EffectInvocation { effect: Effect::ProposeAction { action }, policy_id: None }];
        let report = execute_effects(&prism, &store, &packs, &node_id, &actor(&node_id), &observation_id, &invocations, true, now());

        assert_eq!(report.failure_count, 1);
        assert!(report.results[0].error.as_deref().unwrap().contains("policy id"));
    }

    #[test]
    fn suppress_halts_remaining_effects() {
        let (store, node_id, observation_id) = setup();
        let ids = UuidGenerator;
        let reducer = NullReducer;
        let config = SubstrateConfig { database_url: "memory://".to_string(), ..SubstrateConfig::default() };
        let prism = Prism::new(&store, &ids, &reducer, &config);
        let packs = PackRegistry::new();

        let invocations = vec![
            EffectInvocation { effect: Effect::Suppress { reason: "quiet hours".to_string() }, policy_id: None },
            EffectInvocation { effect: Effect::TagObservation { tags: vec!["never".to_string()] }, policy_id: None },
        ];
        let report = execute_effects(&prism, &store, &packs, &node_id, &actor(&node_id), &observation_id, &invocations, true, now());

        assert!(report.suppressed);
        assert_eq!(report.suppress_reason.as_deref(), Some("quiet hours"));
        assert_eq!(report.results.len(), 1);
    }

    #[test]
    fn unknown_pack_is_non_fatal_and_continues() {
        let (store, node_id, observation_id) = setup();
        let ids = UuidGenerator;
        let reducer = NullReducer;
        let config = SubstrateConfig { database_url: "memory://".to_string(), ..SubstrateConfig::default() };
        let prism = Prism::new(&store, &ids, &reducer, &config);
        let packs = PackRegistry::new();

        let invocations = vec![
            EffectInvocation {
                effect: Effect::Pack { name: "notify".to_string(), action: "slack".to_string(), fields: serde_json::Map::new() },
                policy_id: None,
            },
            EffectInvocation { effect: Effect::TagObservation { tags: vec!["after".to_string()] }, policy_id: None },
        ];
        let report = execute_effects(&prism, &store, &packs, &node_id, &actor(&node_id), &observation_id, &invocations, true, now());

        assert_eq!(report.failure_count, 1);
        assert_eq!(report.success_count, 1);
    }

    #[test]
    fn continue_on_error_false_stops_after_first_failure() {
        let (store, node_id, observation_id) = setup();
        let ids = UuidGenerator;
        let reducer = NullReducer;
        let config = SubstrateConfig { database_url: "memory://".to_string(), ..SubstrateConfig::default() };
        let prism = Prism::new(&store, &ids, &reducer, &config);
        let packs = PackRegistry::new();

        let invocations = vec![
            EffectInvocation {
                effect: Effect::Pack { name: "notify".to_string(), action: "slack".to_string(), fields: serde_json::Map::new() },
                policy_id: None,
            },
            EffectInvocation { effect: Effect::TagObservation { tags: vec!["unreached".to_string()] }, policy_id: None },
        ];
        let report = execute_effects(&prism, &store, &packs, &node_id, &actor(&node_id), &observation_id, &invocations, false, now());

        assert_eq!(report.results.len(), 1);
        assert_eq!(report.failure_count, 1);
    }
}
