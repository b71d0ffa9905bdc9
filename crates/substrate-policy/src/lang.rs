// crates/substrate-policy/src/lang.rs
// ============================================================================
// Module: Sandboxed Policy Expression Language
// Description: A restricted, JSON-encoded expression language and a fuel-
//              metered tree-walking interpreter for `Policy.implementation`.
// Purpose: Give C5 a purity-enforced substitute for an embedded scripting
//          engine, per spec.md §9 ("a restricted expression language or WASM
//          module is an acceptable substitute").
// Dependencies: substrate-core, substrate-context, serde_json
// ============================================================================

//! ## Overview
//! `Policy.implementation.code` (`kind: sandboxed`) is a JSON document parsed
//! into an [`Expr`] tree by [`Expr::from_json`], mirroring the hand-rolled,
//! non-`#[serde(tag)]` parsing `substrate_core::Effect::from_json` already
//! uses for the same reason: the shape isn't a single Rust enum a derive can
//! see ahead of time. Evaluating an `Expr` never touches the network, the
//! filesystem, or a clock other than the one already frozen onto the
//! [`PolicyContext`] it reads from; the only resource it can exhaust is fuel.
//!
//! A policy program is a JSON object `{"effects": <expr>}` whose `<expr>`
//! evaluates to a JSON array of effect objects (each still validated against
//! the closed tag set by the caller in `crate::engine`, not here).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cell::Cell;

use serde_json::Value;
use substrate_context::PolicyContext;
use substrate_core::ObservationFilter;
use substrate_core::RelativeWindow;
use substrate_core::TimeRange;
use substrate_core::Timestamp;
use substrate_core::VariableId;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Failures from parsing or evaluating a sandboxed policy program.
#[derive(Debug, Error, PartialEq)]
pub enum LangError {
    /// `code` was not valid JSON, or used an unrecognized operator tag.
    #[error("parse error: {0}")]
    Parse(String),
    /// An operator was applied to operands of the wrong shape.
    #[error("type error: {0}")]
    Type(String),
    /// A `ref` named a binding that is not in scope.
    #[error("unbound reference: {0}")]
    UnboundReference(String),
    /// Division or modulo by zero.
    #[error("division by zero")]
    DivisionByZero,
    /// The program exceeded its fuel budget (`spec.md` §4.5 "memory bound
    /// (implementation-defined)").
    #[error("policy exceeded its fuel budget")]
    FuelExhausted,
}

// ============================================================================
// SECTION: Fuel
// ============================================================================

/// A decrementing step counter shared across one program evaluation. Every
/// [`Expr`] node charges at least one unit before it runs; list- and
/// object-valued expressions charge one unit per element on top of that, so
/// a program cannot spend unbounded work building a single large value.
struct Fuel {
    /// Steps remaining before evaluation is aborted.
    remaining: Cell<u64>,
}

impl Fuel {
    /// Builds a fresh budget.
    const fn new(budget: u64) -> Self {
        Self { remaining: Cell::new(budget) }
    }

    /// Charges `amount` steps, failing if the budget is exhausted.
    fn charge(&self, amount: u64) -> Result<(), LangError> {
        let current = self.remaining.get();
        if current < amount {
            return Err(LangError::FuelExhausted);
        }
        self.remaining.set(current - amount);
        Ok(())
    }
}

// ============================================================================
// SECTION: Environment
// ============================================================================

/// A small, stack-discipline binding environment for `let`/`ref`. Shadowing
/// is permitted; leaving a `let`'s body pops its binding.
#[derive(Default)]
struct Env {
    /// Bindings in declaration order; lookup scans from the end.
    bindings: Vec<(String, Value)>,
}

impl Env {
    /// Looks up the innermost binding named `name`.
    fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.iter().rev().find(|(bound, _)| bound == name).map(|(_, value)| value)
    }

    /// Pushes a new binding, returning its stack depth so the caller can pop
    /// back to it.
    fn push(&mut self, name: String, value: Value) -> usize {
        self.bindings.push((name, value));
        self.bindings.len()
    }

    /// Truncates the binding stack back to `depth`.
    fn pop_to(&mut self, depth: usize) {
        self.bindings.truncate(depth);
    }
}

// ============================================================================
// SECTION: Expression Tree
// ============================================================================

/// One node of the sandboxed expression language.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A literal JSON value.
    Const(Value),
    /// A dotted-path read of the evaluation snapshot, e.g. `observation.type`.
    Var(String),
    /// A named local binding introduced by an enclosing `let`.
    Ref(String),
    /// `["get-estimate", variableIdExpr]` — `ctx.getVariableEstimate`.
    GetEstimate(Box<Expr>),
    /// `["query-observations", filterExpr]` — `ctx.queryObservations`.
    QueryObservations(Box<Expr>),
    /// `["if", cond, then, else]`.
    If(Box<Expr>, Box<Expr>, Box<Expr>),
    /// `["and", ...]` — short-circuits on the first falsy operand.
    And(Vec<Expr>),
    /// `["or", ...]` — short-circuits on the first truthy operand.
    Or(Vec<Expr>),
    /// `["not", expr]`.
    Not(Box<Expr>),
    /// `["eq", a, b]`.
    Eq(Box<Expr>, Box<Expr>),
    /// `["gt", a, b]`.
    Gt(Box<Expr>, Box<Expr>),
    /// `["gte", a, b]`.
    Gte(Box<Expr>, Box<Expr>),
    /// `["lt", a, b]`.
    Lt(Box<Expr>, Box<Expr>),
    /// `["lte", a, b]`.
    Lte(Box<Expr>, Box<Expr>),
    /// `["add", a, b]`.
    Add(Box<Expr>, Box<Expr>),
    /// `["sub", a, b]`.
    Sub(Box<Expr>, Box<Expr>),
    /// `["mul", a, b]`.
    Mul(Box<Expr>, Box<Expr>),
    /// `["div", a, b]`.
    Div(Box<Expr>, Box<Expr>),
    /// `["array", ...]` (alias `["list", ...]`) — builds a JSON array.
    Array(Vec<Expr>),
    /// A JSON object literal whose field values may themselves be `Expr`s.
    Object(Vec<(String, Expr)>),
    /// `["let", name, valueExpr, bodyExpr]`.
    Let(String, Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Parses one expression node from JSON. Arrays always dispatch on a
    /// leading string operator tag; objects parse every field value
    /// recursively (so a field may be a literal or a nested expression);
    /// every other JSON value is a literal constant.
    ///
    /// # Errors
    ///
    /// Returns [`LangError::Parse`] for an unrecognized operator tag or a
    /// malformed operator form (wrong arity, non-string tag).
    pub fn from_json(value: &Value) -> Result<Self, LangError> {
        match value {
            Value::Array(items) => Self::parse_form(items),
            Value::Object(map) => {
                let mut fields = Vec::with_capacity(map.len());
                for (key, field_value) in map {
                    fields.push((key.clone(), Self::from_json(field_value)?));
                }
                Ok(Self::Object(fields))
            }
            other => Ok(Self::Const(other.clone())),
        }
    }

    /// Parses an operator-tagged array form.
    fn parse_form(items: &[Value]) -> Result<Self, LangError> {
        let Some(Value::String(tag)) = items.first() else {
            return Err(LangError::Parse("array form must start with a string operator tag".to_string()));
        };
        let rest = &items[1 ..];
        match tag.as_str() {
            "const" => Ok(Self::Const(one(rest)?.clone())),
            "var" => Ok(Self::Var(one_str(rest)?)),
            "ref" => Ok(Self::Ref(one_str(rest)?)),
            "get-estimate" => Ok(Self::GetEstimate(Box::new(Self::from_json(one(rest)?)?))),
            "query-observations" => Ok(Self::QueryObservations(Box::new(Self::from_json(one(rest)?)?))),
            "not" => Ok(Self::Not(Box::new(Self::from_json(one(rest)?)?))),
            "and" => Ok(Self::And(parse_all(rest)?)),
            "or" => Ok(Self::Or(parse_all(rest)?)),
            "array" | "list" => Ok(Self::Array(parse_all(rest)?)),
            "if" => {
                let [cond, then_branch, else_branch] = three(rest)?;
                Ok(Self::If(
                    Box::new(Self::from_json(cond)?),
                    Box::new(Self::from_json(then_branch)?),
                    Box::new(Self::from_json(else_branch)?),
                ))
            }
            "let" => {
                let [name, bound, body] = three(rest)?;
                let Value::String(name) = name else {
                    return Err(LangError::Parse("let's first argument must be a binding name".to_string()));
                };
                Ok(Self::Let(name.clone(), Box::new(Self::from_json(bound)?), Box::new(Self::from_json(body)?)))
            }
            "eq" | "gt" | "gte" | "lt" | "lte" | "add" | "sub" | "mul" | "div" => {
                let [left, right] = two(rest)?;
                let left = Box::new(Self::from_json(left)?);
                let right = Box::new(Self::from_json(right)?);
                Ok(match tag.as_str() {
                    "eq" => Self::Eq(left, right),
                    "gt" => Self::Gt(left, right),
                    "gte" => Self::Gte(left, right),
                    "lt" => Self::Lt(left, right),
                    "lte" => Self::Lte(left, right),
                    "add" => Self::Add(left, right),
                    "sub" => Self::Sub(left, right),
                    "mul" => Self::Mul(left, right),
                    _ => Self::Div(left, right),
                })
            }
            other => Err(LangError::Parse(format!("unknown operator: {other}"))),
        }
    }
}

/// Extracts exactly one operand.
fn one(items: &[Value]) -> Result<&Value, LangError> {
    match items {
        [only] => Ok(only),
        _ => Err(LangError::Parse(format!("expected exactly 1 operand, got {}", items.len()))),
    }
}

/// Extracts exactly one string operand.
fn one_str(items: &[Value]) -> Result<String, LangError> {
    match one(items)? {
        Value::String(value) => Ok(value.clone()),
        _ => Err(LangError::Parse("expected a string operand".to_string())),
    }
}

/// Extracts exactly two operands.
fn two(items: &[Value]) -> Result<[&Value; 2], LangError> {
    match items {
        [a, b] => Ok([a, b]),
        _ => Err(LangError::Parse(format!("expected exactly 2 operands, got {}", items.len()))),
    }
}

/// Extracts exactly three operands.
fn three(items: &[Value]) -> Result<[&Value; 3], LangError> {
    match items {
        [a, b, c] => Ok([a, b, c]),
        _ => Err(LangError::Parse(format!("expected exactly 3 operands, got {}", items.len()))),
    }
}

/// Parses every item in `items` as an `Expr`.
fn parse_all(items: &[Value]) -> Result<Vec<Expr>, LangError> {
    items.iter().map(Expr::from_json).collect()
}

// ============================================================================
// SECTION: Evaluation
// ============================================================================

/// Truthiness for the sandbox: only JSON `null` and `false` are falsy.
fn is_truthy(value: &Value) -> bool {
    !matches!(value, Value::Null | Value::Bool(false))
}

/// Reads a dotted path (`"observation.payload.hours"`) out of a JSON value,
/// returning `Value::Null` for any missing segment.
fn read_path<'a>(root: &'a Value, path: &str) -> &'a Value {
    let mut current = root;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment).unwrap_or(&Value::Null),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|index| items.get(index)).unwrap_or(&Value::Null),
            _ => &Value::Null,
        };
    }
    current
}

/// Coerces a JSON value to `f64` for arithmetic/comparison operators.
fn as_number(value: &Value) -> Result<f64, LangError> {
    value.as_f64().ok_or_else(|| LangError::Type(format!("expected a number, got {value}")))
}

/// Builds an [`ObservationFilter`] from a JSON object produced by evaluating
/// a `query-observations` filter expression.
fn filter_from_json(value: &Value, reference_time: Timestamp) -> Result<ObservationFilter, LangError> {
    let object = value.as_object().ok_or_else(|| LangError::Type("query-observations filter must be an object".to_string()))?;
    let node_id = optional_id_field(object, "node_id")?;
    let type_ = object.get("type").and_then(Value::as_str).map(ToString::to_string);
    let type_prefix = object.get("type_prefix").and_then(Value::as_str).map(ToString::to_string);
    let window = object
        .get("window_hours")
        .and_then(Value::as_f64)
        .map(|hours| RelativeWindow { hours });
    let time_range = match (object.get("start"), object.get("end")) {
        (Some(start), Some(end)) => {
            let start = start.as_str().ok_or_else(|| LangError::Type("time_range.start must be a string".to_string()))?;
            let end = end.as_str().ok_or_else(|| LangError::Type("time_range.end must be a string".to_string()))?;
            let start = Timestamp::parse(start).map_err(|err| LangError::Type(err.to_string()))?;
            let end = Timestamp::parse(end).map_err(|err| LangError::Type(err.to_string()))?;
            Some(TimeRange { start, end })
        }
        _ => None,
    };
    let limit = object.get("limit").and_then(Value::as_u64).map(|value| value as usize);
    let offset = object.get("offset").and_then(Value::as_u64).map_or(0, |value| value as usize);
    Ok(ObservationFilter {
        node_id,
        type_,
        type_prefix,
        window,
        time_range,
        reference_time,
        limit,
        offset,
    })
}

/// Reads an optional node-id-shaped string field.
fn optional_id_field(
    object: &serde_json::Map<String, Value>,
    field: &str,
) -> Result<Option<substrate_core::NodeId>, LangError> {
    object
        .get(field)
        .and_then(Value::as_str)
        .map(|raw| substrate_core::NodeId::new(raw).map_err(|err| LangError::Type(err.to_string())))
        .transpose()
}

/// Evaluates `expr` against `snapshot` and `ctx`, charging `fuel` for every
/// node visited.
fn eval(expr: &Expr, snapshot: &Value, ctx: &PolicyContext, env: &mut Env, fuel: &Fuel) -> Result<Value, LangError> {
    fuel.charge(1)?;
    match expr {
        Expr::Const(value) => Ok(value.clone()),
        Expr::Var(path) => Ok(read_path(snapshot, path).clone()),
        Expr::Ref(name) => env.get(name).cloned().ok_or_else(|| LangError::UnboundReference(name.clone())),
        Expr::GetEstimate(inner) => {
            let id = eval(inner, snapshot, ctx, env, fuel)?;
            let id = id.as_str().ok_or_else(|| LangError::Type("get-estimate expects a string variable id".to_string()))?;
            let variable_id = VariableId::new(id).map_err(|err| LangError::Type(err.to_string()))?;
            let estimate = ctx.get_variable_estimate(&variable_id);
            Ok(estimate.map_or(Value::Null, |estimate| serde_json::to_value(estimate).unwrap_or(Value::Null)))
        }
        Expr::QueryObservations(inner) => {
            let filter_value = eval(inner, snapshot, ctx, env, fuel)?;
            let filter = filter_from_json(&filter_value, ctx.evaluated_at())?;
            fuel.charge(filter.effective_limit() as u64)?;
            let observations = ctx.query_observations(&filter);
            Ok(serde_json::to_value(observations).unwrap_or(Value::Null))
        }
        Expr::If(cond, then_branch, else_branch) => {
            if is_truthy(&eval(cond, snapshot, ctx, env, fuel)?) {
                eval(then_branch, snapshot, ctx, env, fuel)
            } else {
                eval(else_branch, snapshot, ctx, env, fuel)
            }
        }
        Expr::And(items) => {
            let mut last = Value::Bool(true);
            for item in items {
                last = eval(item, snapshot, ctx, env, fuel)?;
                if !is_truthy(&last) {
                    return Ok(last);
                }
            }
            Ok(last)
        }
        Expr::Or(items) => {
            let mut last = Value::Bool(false);
            for item in items {
                last = eval(item, snapshot, ctx, env, fuel)?;
                if is_truthy(&last) {
                    return Ok(last);
                }
            }
            Ok(last)
        }
        Expr::Not(inner) => Ok(Value::Bool(!is_truthy(&eval(inner, snapshot, ctx, env, fuel)?))),
        Expr::Eq(a, b) => Ok(Value::Bool(eval(a, snapshot, ctx, env, fuel)? == eval(b, snapshot, ctx, env, fuel)?)),
        Expr::Gt(a, b) => compare(a, b, snapshot, ctx, env, fuel, |x, y| x > y),
        Expr::Gte(a, b) => compare(a, b, snapshot, ctx, env, fuel, |x, y| x >= y),
        Expr::Lt(a, b) => compare(a, b, snapshot, ctx, env, fuel, |x, y| x < y),
        Expr::Lte(a, b) => compare(a, b, snapshot, ctx, env, fuel, |x, y| x <= y),
        Expr::Add(a, b) => arithmetic(a, b, snapshot, ctx, env, fuel, |x, y| Ok(x + y)),
        Expr::Sub(a, b) => arithmetic(a, b, snapshot, ctx, env, fuel, |x, y| Ok(x - y)),
        Expr::Mul(a, b) => arithmetic(a, b, snapshot, ctx, env, fuel, |x, y| Ok(x * y)),
        Expr::Div(a, b) => arithmetic(a, b, snapshot, ctx, env, fuel, |x, y| {
            if y == 0.0 { Err(LangError::DivisionByZero) } else { Ok(x / y) }
        }),
        Expr::Array(items) => {
            fuel.charge(items.len() as u64)?;
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(eval(item, snapshot, ctx, env, fuel)?);
            }
            Ok(Value::Array(values))
        }
        Expr::Object(fields) => {
            fuel.charge(fields.len() as u64)?;
            let mut map = serde_json::Map::with_capacity(fields.len());
            for (key, field_expr) in fields {
                map.insert(key.clone(), eval(field_expr, snapshot, ctx, env, fuel)?);
            }
            Ok(Value::Object(map))
        }
        Expr::Let(name, bound, body) => {
            let value = eval(bound, snapshot, ctx, env, fuel)?;
            let depth = env.push(name.clone(), value);
            let result = eval(body, snapshot, ctx, env, fuel);
            env.pop_to(depth - 1);
            result
        }
    }
}

/// Shared implementation for the four numeric comparison operators.
#[allow(clippy::too_many_arguments, reason = "Mirrors eval's own threaded state; splitting further adds indirection, not clarity.")]
fn compare(
    a: &Expr,
    b: &Expr,
    snapshot: &Value,
    ctx: &PolicyContext,
    env: &mut Env,
    fuel: &Fuel,
    op: fn(f64, f64) -> bool,
) -> Result<Value, LangError> {
    let left = as_number(&eval(a, snapshot, ctx, env, fuel)?)?;
    let right = as_number(&eval(b, snapshot, ctx, env, fuel)?)?;
    Ok(Value::Bool(op(left, right)))
}

/// Shared implementation for the four arithmetic operators.
#[allow(clippy::too_many_arguments, reason = "Mirrors eval's own threaded state; splitting further adds indirection, not clarity.")]
fn arithmetic(
    a: &Expr,
    b: &Expr,
    snapshot: &Value,
    ctx: &PolicyContext,
    env: &mut Env,
    fuel: &Fuel,
    op: fn(f64, f64) -> Result<f64, LangError>,
) -> Result<Value, LangError> {
    let left = as_number(&eval(a, snapshot, ctx, env, fuel)?)?;
    let right = as_number(&eval(b, snapshot, ctx, env, fuel)?)?;
    let result = op(left, right)?;
    serde_json::Number::from_f64(result).map(Value::Number).ok_or_else(|| LangError::Type("arithmetic result is not finite".to_string()))
}

// ============================================================================
// SECTION: Program Snapshot
// ============================================================================

/// Builds the JSON snapshot `var` paths read from: everything a policy is
/// entitled to see per `spec.md` §4.4 except the two on-demand accessors
/// (`get-estimate`, `query-observations`), which stay live calls into `ctx`
/// so their memoization/bounding behavior is preserved.
fn build_snapshot(ctx: &PolicyContext) -> Value {
    serde_json::json!({
        "observation": ctx.observation(),
        "node": ctx.node(),
        "prior_effects": ctx.prior_effects(),
        "active_episodes": ctx.active_episodes(),
        "variables": ctx.variables(),
        "artifacts": ctx.artifacts(),
        "entities": ctx.entities(),
        "evaluated_at": ctx.evaluated_at(),
        "policy_id": ctx.policy_id(),
        "priority": ctx.priority(),
    })
}

// ============================================================================
// SECTION: Public API
// ============================================================================

/// A parsed, ready-to-run policy program.
#[derive(Debug, Clone)]
pub struct Program {
    /// The expression that produces the policy's effect list.
    effects: Expr,
}

impl Program {
    /// Parses `code` (a JSON document) into a `Program`.
    ///
    /// # Errors
    ///
    /// Returns [`LangError::Parse`] when `code` is not valid JSON, lacks an
    /// `effects` field, or uses a malformed/unknown operator form.
    pub fn parse(code: &str) -> Result<Self, LangError> {
        let document: Value = serde_json::from_str(code).map_err(|err| LangError::Parse(err.to_string()))?;
        let effects_value = document
            .get("effects")
            .ok_or_else(|| LangError::Parse("policy program is missing its top-level \"effects\" field".to_string()))?;
        Ok(Self { effects: Expr::from_json(effects_value)? })
    }

    /// Runs the program against `ctx`, charging from a fresh budget of
    /// `fuel_budget` steps.
    ///
    /// # Errors
    ///
    /// Returns [`LangError::FuelExhausted`] if the program does not finish
    /// within budget, or any other [`LangError`] raised during evaluation.
    /// The result, on success, is always a JSON array (each element expected
    /// to be an effect object; validating that is the caller's job).
    pub fn run(&self, ctx: &PolicyContext, fuel_budget: u64) -> Result<Vec<Value>, LangError> {
        let snapshot = build_snapshot(ctx);
        let fuel = Fuel::new(fuel_budget);
        let mut env = Env::default();
        let result = eval(&self.effects, &snapshot, ctx, &mut env, &fuel)?;
        match result {
            Value::Array(items) => Ok(items),
            other => Err(LangError::Type(format!("policy program must evaluate to an array of effects, got {other}"))),
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions are permitted.")]

    use substrate_context::ContextInputs;
    use substrate_context::build_context;
    use substrate_core::NodeId;
    use substrate_core::NodeKind;
    use substrate_core::Observation;
    use substrate_core::ObservationId;
    use substrate_core::Policy;
    use substrate_core::PolicyImplementation;
    use substrate_core::PolicyImplementationKind;
    use substrate_core::Provenance;
    use substrate_store_memory::InMemoryStore;

    use super::*;

    fn test_policy() -> Policy {
        Policy {
            id: substrate_core::PolicyId::new("p1").unwrap(),
            node_id: NodeId::new("n1").unwrap(),
            name: "p".to_string(),
            priority: 10,
            enabled: true,
            triggers: vec!["*".to_string()],
            implementation: PolicyImplementation { kind: PolicyImplementationKind::Sandboxed, code: "{}".to_string() },
            updated_at: Timestamp::parse("2026-01-01T00:00:00Z").unwrap(),
        }
    }

    fn setup() -> (InMemoryStore, Observation, Timestamp) {
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
            provenance: Provenance {
                source_id: NodeId::new("n1").unwrap(),
                sponsor_id: None,
                method: None,
                confidence: None,
            },
            tags: vec![],
        };
        (store, observation, now)
    }

    #[test]
    fn reads_observation_payload_through_var() {
        let (store, observation, now) = setup();
        let policy = test_policy();
        let ctx = build_context(
            &store,
            ContextInputs {
                observation: &observation,
                policy: &policy,
                prior_effects: vec![],
                requested_artifact_ids: &[],
                requested_entity_ids: &[],
            },
            now,
        )
        .unwrap();
        let program = Program::parse(
            r#"{"effects": ["array", {"effect": "log", "level": "info", "message": ["var", "observation.type"]}] }"#,
        )
        .unwrap();
        let effects = program.run(&ctx, 10_000).unwrap();
        assert_eq!(effects.len(), 1);
        assert_eq!(effects[0]["message"], serde_json::json!("health.sleep"));
    }

    #[test]
    fn if_and_comparisons_select_a_branch() {
        let (store, observation, now) = setup();
        let policy = test_policy();
        let ctx = build_context(
            &store,
            ContextInputs {
                observation: &observation,
                policy: &policy,
                prior_effects: vec![],
                requested_artifact_ids: &[],
                requested_entity_ids: &[],
            },
            now,
        )
        .unwrap();
        let program = Program::parse(
            r#"{"effects": ["array",
                ["if", ["gt", ["var", "observation.payload.hours"], ["const", 6]],
                    {"effect": "tag_observation", "tags": ["const_ignored"]},
                    {"effect": "suppress", "reason": "too little sleep"}]
            ]}"#,
        )
        .unwrap();
        let effects = program.run(&ctx, 10_000).unwrap();
        assert_eq!(effects[0]["effect"], serde_json::json!("tag_observation"));
    }

    #[test]
    fn exhausted_fuel_is_reported() {
        let (store, observation, now) = setup();
        let policy = test_policy();
        let ctx = build_context(
            &store,
            ContextInputs {
                observation: &observation,
                policy: &policy,
                prior_effects: vec![],
                requested_artifact_ids: &[],
                requested_entity_ids: &[],
            },
            now,
        )
        .unwrap();
        let program = Program::parse(r#"{"effects": ["array", ["const", 1], ["const", 2], ["const", 3]] }"#).unwrap();
        let err = program.run(&ctx, 1).unwrap_err();
        assert_eq!(err, LangError::FuelExhausted);
    }

    #[test]
    fn unknown_operator_is_a_parse_error() {
        let err = Program::parse(r#"{"effects": ["bogus-op", 1]}"#).unwrap_err();
        assert!(matches!(err, LangError::Parse(_)));
    }

    #[test]
    fn let_and_ref_bind_a_local_value() {
        let (store, observation, now) = setup();
        let policy = test_policy();
        let ctx = build_context(
            &store,
            ContextInputs {
                observation: &observation,
                policy: &policy,
                prior_effects: vec![],
                requested_artifact_ids: &[],
                requested_entity_ids: &[],
            },
            now,
        )
        .unwrap();
        let program = Program::parse(
            r#"{"effects": ["let", "hours", ["var", "observation.payload.hours"], ["array", ["ref", "hours"]]] }"#,
        )
        .unwrap();
        let effects = program.run(&ctx, 10_000).unwrap();
        assert_eq!(effects, vec![serde_json::json!(7.5)]);
    }
}
