// crates/substrate-core/src/core/effect.rs
// ============================================================================
// Module: Substrate Effect Language
// Description: The wire-stable, closed-plus-extensible effect vocabulary.
// Purpose: Model the tagged effect records policies return (§4.5) and the
//          executor dispatches (§4.6), shared by substrate-policy and
//          substrate-effects.
// Dependencies: crate::core::{identifiers, node::RiskLevel}, serde_json
// ============================================================================

//! ## Overview
//! `spec.md` §6 fixes the effect wire format: a tagged record with an
//! `effect` discriminator. The closed built-in set is exactly
//! `route_observation | create_entity_event | propose_action |
//! tag_observation | suppress | log`; the open extension form is
//! `pack:<name>:<action>` carrying arbitrary additional fields. Because the
//! extension form's tag is not one of a fixed set of strings, `Effect` is
//! parsed and rendered by hand rather than through `#[serde(tag = "effect")]`
//! (which requires the tag values to be known at compile time).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

use crate::core::identifiers::EntityId;
use crate::core::identifiers::NodeId;

// ============================================================================
// SECTION: Log Level
// ============================================================================

/// Severity of a `log` effect (`spec.md` §4.6).
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Diagnostic detail.
    Debug,
    /// Routine information.
    Info,
    /// A condition worth an operator's attention.
    Warn,
}

impl LogLevel {
    /// Parses a level from its wire string.
    fn parse(text: &str) -> Option<Self> {
        match text {
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" => Some(Self::Warn),
            _ => None,
        }
    }

    /// Renders the level back to its wire string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Effect
// ============================================================================

/// A declarative instruction returned by a policy (`spec.md` §4.5, §6).
///
/// # Invariants
/// - `Effect::Pack`'s `name`/`action` render as the dynamic tag
///   `pack:<name>:<action>`; every other variant renders as one of the six
///   closed built-in tags.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Append a copy of the triggering observation under `to_node_id`.
    RouteObservation {
        /// Destination node.
        to_node_id: NodeId,
    },
    /// Append an event to an existing entity.
    CreateEntityEvent {
        /// Target entity.
        entity_id: EntityId,
        /// Event type string.
        event_type: String,
        /// Opaque event data.
        data: Value,
    },
    /// Propose a new action, pending approval unless auto-approved.
    ProposeAction {
        /// Opaque action payload; a `riskLevel` field of `"low"` makes it
        /// eligible for auto-approval (`spec.md` §4.6).
        action: Value,
    },
    /// Enrich the triggering observation with additional tags.
    TagObservation {
        /// Tags to union into the observation's existing tags.
        tags: Vec<String>,
    },
    /// Halt the remainder of this evaluation cycle.
    Suppress {
        /// Why evaluation was halted.
        reason: String,
    },
    /// Emit a structured log line; no persistence impact.
    Log {
        /// Severity.
        level: LogLevel,
        /// Message text.
        message: String,
    },
    /// A namespaced extension effect dispatched to a user-registered
    /// handler.
    Pack {
        /// Pack name.
        name: String,
        /// Action within the pack.
        action: String,
        /// Every field besides `effect`, passed through opaquely.
        fields: Map<String, Value>,
    },
}

/// Errors parsing a JSON value into an [`Effect`] (`spec.md` §4.5 step 3).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EffectParseError {
    /// The value was not a JSON object.
    #[error("effect must be a JSON object")]
    NotAnObject,
    /// The `effect` discriminator field was missing or not a string.
    #[error("effect is missing a string \"effect\" discriminator")]
    MissingDiscriminator,
    /// The discriminator did not match any closed tag or `pack:<name>:<action>`.
    #[error("unknown effect tag: {0}")]
    UnknownTag(String),
    /// A required field for the matched tag was missing or the wrong type.
    #[error("effect {tag} is missing or has a malformed field: {field}")]
    MalformedField {
        /// The effect tag being parsed.
        tag: String,
        /// The offending field name.
        field: String,
    },
}

impl Effect {
    /// Returns the wire tag for this effect (`spec.md` §6).
    #[must_use]
    pub fn tag(&self) -> String {
        match self {
            Self::RouteObservation { .. } => "route_observation".to_string(),
            Self::CreateEntityEvent { .. } => "create_entity_event".to_string(),
            Self::ProposeAction { .. } => "propose_action".to_string(),
            Self::TagObservation { .. } => "tag_observation".to_string(),
            Self::Suppress { .. } => "suppress".to_string(),
            Self::Log { .. } => "log".to_string(),
            Self::Pack { name, action, .. } => format!("pack:{name}:{action}"),
        }
    }

    /// Returns `true` when `tag` names one of the closed built-in effects or
    /// a well-formed `pack:<name>:<action>` extension tag.
    #[must_use]
    pub fn is_known_tag(tag: &str) -> bool {
        const BUILTINS: [&str; 6] = [
            "route_observation",
            "create_entity_event",
            "propose_action",
            "tag_observation",
            "suppress",
            "log",
        ];
        if BUILTINS.contains(&tag) {
            return true;
        }
        tag.strip_prefix("pack:").is_some_and(|rest| {
            let mut parts = rest.splitn(2, ':');
            matches!((parts.next(), parts.next()), (Some(name), Some(action)) if !name.is_empty() && !action.is_empty())
        })
    }

    /// Parses one JSON effect object, per the wire format in `spec.md` §6.
    ///
    /// # Errors
    ///
    /// Returns [`EffectParseError`] when `value` is not an object, lacks a
    /// recognized `effect` discriminator, or is missing a field the matched
    /// tag requires.
    pub fn from_json(value: &Value) -> Result<Self, EffectParseError> {
        let obj = value.as_object().ok_or(EffectParseError::NotAnObject)?;
        let tag = obj.get("effect").and_then(Value::as_str).ok_or(EffectParseError::MissingDiscriminator)?;

        match tag {
            "route_observation" => {
                let to_node_id = field_str(obj, tag, "toNodeId")?;
                Ok(Self::RouteObservation {
                    to_node_id: NodeId::new(to_node_id).map_err(|_| malformed(tag, "toNodeId"))?,
                })
            }
            "create_entity_event" => {
                let entity_id = field_str(obj, tag, "entityId")?;
                let event = obj.get("event").and_then(Value::as_object).ok_or_else(|| malformed(tag, "event"))?;
                let event_type = field_str(event, tag, "type")?;
                let data = event.get("data").cloned().unwrap_or(Value::Null);
                Ok(Self::CreateEntityEvent {
                    entity_id: EntityId::new(entity_id).map_err(|_| malformed(tag, "entityId"))?,
                    event_type: event_type.to_string(),
                    data,
                })
            }
            "propose_action" => {
                let action = obj.get("action").cloned().ok_or_else(|| malformed(tag, "action"))?;
                Ok(Self::ProposeAction { action })
            }
            "tag_observation" => {
                let tags = obj
                    .get("tags")
                    .and_then(Value::as_array)
                    .ok_or_else(|| malformed(tag, "tags"))?
                    .iter()
                    .map(|t| t.as_str().map(str::to_string))
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| malformed(tag, "tags"))?;
                Ok(Self::TagObservation { tags })
            }
            "suppress" => {
                let reason = field_str(obj, tag, "reason")?;
                Ok(Self::Suppress { reason: reason.to_string() })
            }
            "log" => {
                let level = field_str(obj, tag, "level")?;
                let message = field_str(obj, tag, "message")?;
                Ok(Self::Log {
                    level: LogLevel::parse(level).ok_or_else(|| malformed(tag, "level"))?,
                    message: message.to_string(),
                })
            }
            other => {
                let rest = other.strip_prefix("pack:").ok_or_else(|| EffectParseError::UnknownTag(other.to_string()))?;
                let mut parts = rest.splitn(2, ':');
                let (Some(name), Some(action)) = (parts.next(), parts.next()) else {
                    return Err(EffectParseError::UnknownTag(other.to_string()));
                };
                if name.is_empty() || action.is_empty() {
                    return Err(EffectParseError::UnknownTag(other.to_string()));
                }
                let mut fields = obj.clone();
                fields.remove("effect");
                Ok(Self::Pack {
                    name: name.to_string(),
                    action: action.to_string(),
                    fields,
                })
            }
        }
    }

    /// Renders this effect back to its JSON wire form.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::RouteObservation { to_node_id } => serde_json::json!({
                "effect": "route_observation",
                "toNodeId": to_node_id.as_str(),
            }),
            Self::CreateEntityEvent { entity_id, event_type, data } => serde_json::json!({
                "effect": "create_entity_event",
                "entityId": entity_id.as_str(),
                "event": { "type": event_type, "data": data },
            }),
            Self::ProposeAction { action } => serde_json::json!({
                "effect": "propose_action",
                "action": action,
            }),
            Self::TagObservation { tags } => serde_json::json!({
                "effect": "tag_observation",
                "tags": tags,
            }),
            Self::Suppress { reason } => serde_json::json!({
                "effect": "suppress",
                "reason": reason,
            }),
            Self::Log { level, message } => serde_json::json!({
                "effect": "log",
                "level": level.as_str(),
                "message": message,
            }),
            Self::Pack { name, action, fields } => {
                let mut map = fields.clone();
                map.insert("effect".to_string(), Value::String(format!("pack:{name}:{action}")));
                Value::Object(map)
            }
        }
    }
}

/// Builds an [`EffectParseError::MalformedField`] for `tag`/`field`.
fn malformed(tag: &str, field: &str) -> EffectParseError {
    EffectParseError::MalformedField {
        tag: tag.to_string(),
        field: field.to_string(),
    }
}

/// Reads a required string field out of a JSON object.
fn field_str<'a>(obj: &'a Map<String, Value>, tag: &str, field: &str) -> Result<&'a str, EffectParseError> {
    obj.get(field).and_then(Value::as_str).ok_or_else(|| malformed(tag, field))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions are permitted.")]

    use super::*;

    #[test]
    fn round_trips_tag_observation() {
        let effect = Effect::TagObservation { tags: vec!["sleep".to_string()] };
        let json = effect.to_json();
        let parsed = Effect::from_json(&json).unwrap();
        assert_eq!(effect, parsed);
    }

    #[test]
    fn round_trips_pack_effect() {
        let json = serde_json::json!({
            "effect": "pack:notify:slack",
            "channel": "#alerts",
        });
        let parsed = Effect::from_json(&json).unwrap();
        assert_eq!(parsed.tag(), "pack:notify:slack");
        assert_eq!(parsed.to_json()["channel"], "#alerts");
    }

    #[test]
    fn rejects_unknown_non_pack_tag() {
        let json = serde_json::json!({ "effect": "delete_everything" });
        assert_eq!(Effect::from_json(&json), Err(EffectParseError::UnknownTag("delete_everything".to_string())));
    }

    #[test]
    fn rejects_malformed_pack_tag_without_action() {
        let json = serde_json::json!({ "effect": "pack:notify" });
        assert!(matches!(Effect::from_json(&json), Err(EffectParseError::UnknownTag(_))));
    }

    #[test]
    fn is_known_tag_accepts_closed_set_and_pack_form() {
        assert!(Effect::is_known_tag("suppress"));
        assert!(Effect::is_known_tag("pack:notify:slack"));
        assert!(!Effect::is_known_tag("pack:notify"));
        assert!(!Effect::is_known_tag("do_something_else"));
    }

    #[test]
    fn suppress_round_trips() {
        let effect = Effect::Suppress { reason: "test".to_string() };
        let parsed = Effect::from_json(&effect.to_json()).unwrap();
        assert_eq!(effect, parsed);
    }
}
