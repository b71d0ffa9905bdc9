// crates/substrate-prism/src/error.rs
// ============================================================================
// Module: Prism Errors
// Description: Failure taxonomy for the commit boundary.
// Purpose: Give callers of Prism::commit a single error type scoped to C7.
// Dependencies: substrate-core
// ============================================================================

//! ## Overview
//! Every [`PrismError`] variant maps onto one of `spec.md` §7's cross-cutting
//! kinds via `From<PrismError> for CoreError`; a failed `commit` always still
//! produces exactly one `AuditEntry` with `success: false` (`spec.md` §4.7,
//! §8), which is the caller's responsibility to read off the returned
//! [`crate::CommitOutcome`] rather than this error alone.

// ============================================================================
// SECTION: Imports
// ============================================================================

use substrate_core::CoreError;
use substrate_core::EmptyIdentifierError;
use substrate_core::RepositoryError;
use thiserror::Error;

// ============================================================================
// SECTION: Prism Error
// ============================================================================

/// Failures from [`crate::Prism::commit`] (`spec.md` §4.7, §7).
#[derive(Debug, Error)]
pub enum PrismError {
    /// The authority check rejected the operation.
    #[error("authorization error: {0}")]
    Authorization(String),
    /// A referenced resource does not exist.
    #[error("{resource_type} not found: {resource_id}")]
    NotFound {
        /// Resource class.
        resource_type: String,
        /// Resource identifier.
        resource_id: String,
    },
    /// The operation's preconditions on entity state were not met (e.g. an
    /// illegal status transition).
    #[error("conflict: {0}")]
    Conflict(String),
    /// The underlying repository failed.
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<EmptyIdentifierError> for PrismError {
    /// A freshly generated identifier was empty. `UuidGenerator` never
    /// produces one, but the conversion keeps id generation on the `?` path
    /// rather than reaching for `unwrap`.
    fn from(_err: EmptyIdentifierError) -> Self {
        Self::Conflict("generated identifier was empty".to_string())
    }
}

impl From<PrismError> for CoreError {
    fn from(err: PrismError) -> Self {
        match err {
            PrismError::Authorization(reason) => Self::Authorization(reason),
            PrismError::NotFound { resource_type, resource_id } => Self::NotFound { resource_type, resource_id },
            PrismError::Conflict(reason) => Self::Conflict(reason),
            PrismError::Repository(repo_err) => Self::Backend(repo_err.to_string()),
        }
    }
}
