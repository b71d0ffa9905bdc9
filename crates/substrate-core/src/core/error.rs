// crates/substrate-core/src/core/error.rs
// ============================================================================
// Module: Substrate Core Error Taxonomy
// Description: Cross-cutting error kinds shared by every substrate component.
// Purpose: Give callers driving a full reaction cycle one error type to match
//          on, per spec.md §7.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! `spec.md` §7 names nine error kinds independent of any one component.
//! Component crates define their own narrower `thiserror` enums and convert
//! into [`CoreError`] at the boundary (see `substrate-ingestion::error`,
//! `substrate-prism::error`, etc.) so a top-level caller can handle one type.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

// ============================================================================
// SECTION: Core Error
// ============================================================================

/// Cross-cutting error taxonomy (`spec.md` §7).
///
/// # Invariants
/// - Variants are stable for programmatic handling by callers.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed input, including a bad observation type.
    #[error("validation error on {field}: {reason}")]
    Validation {
        /// The field that failed validation.
        field: String,
        /// Why it failed.
        reason: String,
    },
    /// Missing or invalid provenance on an observation.
    #[error("provenance error: {0}")]
    Provenance(String),
    /// A referenced node/artifact/entity/etc. does not exist.
    #[error("{resource_type} not found: {resource_id}")]
    NotFound {
        /// The kind of resource that was missing.
        resource_type: String,
        /// The identifier that was looked up.
        resource_id: String,
    },
    /// Prism's authority check rejected an operation.
    #[error("authorization error: {0}")]
    Authorization(String),
    /// Unique-key or version conflict; retryable by the caller.
    #[error("conflict: {0}")]
    Conflict(String),
    /// A policy threw or exceeded its evaluation timeout.
    #[error("policy runtime error: {0}")]
    PolicyRuntime(String),
    /// An effect handler threw during dispatch.
    #[error("effect execution error: {0}")]
    EffectExecution(String),
    /// An effect tag has no registered handler.
    #[error("unknown effect type: {0}")]
    UnknownEffectType(String),
    /// Repository or transport failure; the enclosing operation is aborted.
    #[error("backend error: {0}")]
    Backend(String),
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::CoreError;

    #[test]
    fn not_found_renders_resource_context() {
        let err = CoreError::NotFound {
            resource_type: "node".to_string(),
            resource_id: "n1".to_string(),
        };
        assert_eq!(err.to_string(), "node not found: n1");
    }
}
