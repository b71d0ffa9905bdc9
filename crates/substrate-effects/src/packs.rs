// crates/substrate-effects/src/packs.rs
// ============================================================================
// Module: Pack Handler Registry
// Description: User-registered handlers for the open `pack:<name>:<action>`
//              effect extension form.
// Purpose: Implement spec.md §4.6's "unknown pack: non-fatal" dispatch rule.
// Dependencies: substrate-core
// ============================================================================

//! ## Overview
//! The closed effect tags (`route_observation`, `create_entity_event`, ...)
//! are dispatched by `crate::execute_effects` itself. `pack:<name>:<action>`
//! effects are dispatched to whatever [`PackHandler`] the caller registered
//! under `name` in a [`PackRegistry`]; a pack name with no registered
//! handler is a non-fatal per-effect failure, not a crate-level error
//! (`spec.md` §4.6).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;

use serde_json::Map;
use serde_json::Value;

use crate::ExecutionContext;

// ============================================================================
// SECTION: Pack Handler
// ============================================================================

/// Implements one namespaced extension pack's actions.
pub trait PackHandler: Send + Sync {
    /// Executes `action` with its `fields`, returning opaque result data or a
    /// human-readable error.
    fn handle(&self, action: &str, fields: &Map<String, Value>, ctx: &ExecutionContext<'_>) -> Result<Value, String>;
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Maps pack names to their handlers.
#[derive(Default)]
pub struct PackRegistry {
    handlers: HashMap<String, Box<dyn PackHandler>>,
}

impl PackRegistry {
    /// Builds an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under `name`, replacing any handler previously
    /// registered under the same name.
    pub fn register(&mut self, name: impl Into<String>, handler: Box<dyn PackHandler>) {
        self.handlers.insert(name.into(), handler);
    }

    /// Looks up the handler registered for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn PackHandler> {
        self.handlers.get(name).map(AsRef::as_ref)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoHandler;

    impl PackHandler for EchoHandler {
        fn handle(&self, action: &str, fields: &Map<String, Value>, _ctx: &ExecutionContext<'_>) -> Result<Value, String> {
            Ok(serde_json::json!({ "action": action, "fields": fields }))
        }
    }

    #[test]
    fn unregistered_pack_returns_none() {
        let registry = PackRegistry::new();
        assert!(registry.get("notify").is_none());
    }

    #[test]
    fn registered_pack_is_found_by_name() {
        let mut registry = PackRegistry::new();
        registry.register("notify", Box::new(EchoHandler));
        assert!(registry.get("notify").is_some());
        assert!(registry.get("other").is_none());
    }
}
