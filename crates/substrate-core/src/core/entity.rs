// crates/substrate-core/src/core/entity.rs
// ============================================================================
// Module: Substrate Entities
// Description: Event-sourced referents with materialized state.
// Purpose: Model Entity/EntityType/EntityEvent per spec.md §3.
// Dependencies: crate::core::{identifiers, time}
// ============================================================================

//! ## Overview
//! An `Entity` is a referent whose `state` is a pure function of its ordered,
//! append-only event list (`spec.md` §3, §8). The substrate core does not
//! know how to fold events into state for any particular `EntityType` — that
//! is supplied by the caller via [`EntityStateReducer`], matching the
//! teacher's backend-agnostic interface style (`decision-gate-core`'s
//! `EvidenceProvider`/`Dispatcher` traits).

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::EntityEventId;
use crate::core::identifiers::EntityId;
use crate::core::identifiers::EntityTypeId;
use crate::core::identifiers::NodeId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Entity Type
// ============================================================================

/// A named schema for a class of entities. Kept intentionally thin: callers
/// own how they interpret `schema`.
///
/// # Invariants
/// - None beyond non-empty identifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityType {
    /// Entity type identifier.
    pub id: EntityTypeId,
    /// Display name.
    pub name: String,
    /// Opaque schema description (interpreted by callers).
    pub schema: serde_json::Value,
}

// ============================================================================
// SECTION: Entity Event
// ============================================================================

/// A single append-only event in an entity's history.
///
/// # Invariants
/// - Never modified or removed once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityEvent {
    /// Event identifier.
    pub id: EntityEventId,
    /// Entity this event belongs to.
    pub entity_id: EntityId,
    /// Event type string (caller-defined vocabulary).
    #[serde(rename = "type")]
    pub type_: String,
    /// Opaque event data.
    pub data: serde_json::Value,
    /// When the event occurred.
    pub timestamp: Timestamp,
    /// The node that caused this event.
    pub actor_node_id: NodeId,
}

// ============================================================================
// SECTION: Entity
// ============================================================================

/// An event-sourced referent.
///
/// # Invariants
/// - `state` is a pure function of `events`, in order (`spec.md` §3, §8).
///   Replaying `events` onto an empty state in order reproduces `state`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Entity identifier.
    pub id: EntityId,
    /// Node this entity is scoped to.
    pub node_id: NodeId,
    /// Entity type.
    pub type_id: EntityTypeId,
    /// Materialized state, derived from `events`.
    pub state: serde_json::Value,
    /// Ordered event history.
    pub events: Vec<EntityEvent>,
}

// ============================================================================
// SECTION: State Reducer
// ============================================================================

/// Folds an entity's event list into materialized state.
///
/// Implementations must be pure and deterministic: the same event sequence
/// always yields the same state (`spec.md` §3, §8's replay law).
pub trait EntityStateReducer {
    /// Returns the initial state for a freshly created entity of `type_id`.
    fn initial_state(&self, type_id: &EntityTypeId) -> serde_json::Value;

    /// Folds `event` into `state`, returning the next state.
    fn apply(&self, type_id: &EntityTypeId, state: &serde_json::Value, event: &EntityEvent) -> serde_json::Value;
}

impl Entity {
    /// Replays `events` from the reducer's initial state, returning the
    /// state that should result. Used to verify the replay invariant in
    /// §8 and by `substrate-prism` when appending a new event.
    #[must_use]
    pub fn replay<R: EntityStateReducer>(
        type_id: &EntityTypeId,
        events: &[EntityEvent],
        reducer: &R,
    ) -> serde_json::Value {
        let mut state = reducer.initial_state(type_id);
        for event in events {
            state = reducer.apply(type_id, &state, event);
        }
        state
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions are permitted.")]

    use super::*;

    struct CounterReducer;

    impl EntityStateReducer for CounterReducer {
        fn initial_state(&self, _type_id: &EntityTypeId) -> serde_json::Value {
            serde_json::json!({ "count": 0 })
        }

        fn apply(
            &self,
            _type_id: &EntityTypeId,
            state: &serde_json::Value,
            _event: &EntityEvent,
        ) -> serde_json::Value {
            let count = state["count"].as_i64().unwrap_or(0);
            serde_json::json!({ "count": count + 1 })
        }
    }

    fn event(id: &str, ts: &str) -> EntityEvent {
        EntityEvent {
            id: EntityEventId::new(id).unwrap(),
            entity_id: EntityId::new("e1").unwrap(),
            type_: "incremented".to_string(),
            data: serde_json::json!({}),
            timestamp: Timestamp::parse(ts).unwrap(),
            actor_node_id: NodeId::new("n1").unwrap(),
        }
    }

    #[test]
    fn replay_is_pure_function_of_event_list() {
        let type_id = EntityTypeId::new("counter").unwrap();
        let events = vec![
            event("ev1", "2026-01-01T00:00:00Z"),
            event("ev2", "2026-01-01T00:01:00Z"),
            event("ev3", "2026-01-01T00:02:00Z"),
        ];
        let state = Entity::replay(&type_id, &events, &CounterReducer);
        assert_eq!(state["count"], 3);

        let state_again = Entity::replay(&type_id, &events, &CounterReducer);
        assert_eq!(state, state_again);
    }
}
