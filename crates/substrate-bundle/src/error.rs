// crates/substrate-bundle/src/error.rs
// ============================================================================
// Module: Bundle Codec Errors
// Description: Failure taxonomy for export, import, and validation.
// Purpose: Give callers of C8 a single error type to match on.
// Dependencies: substrate-core, serde_json, std::io
// ============================================================================

//! ## Overview
//! `spec.md` §4.8 distinguishes "fail fast on structural errors" (a missing
//! required file or directory) from softer, collected warnings. A
//! [`BundleError`] covers the former — anything that stops export or import
//! outright. Validation (`validate_bundle`) never returns this error for
//! content problems; those are accumulated into its report instead.

// ============================================================================
// SECTION: Imports
// ============================================================================

use substrate_core::RepositoryError;
use thiserror::Error;

// ============================================================================
// SECTION: Bundle Error
// ============================================================================

/// Failures from export, import, or the structural half of validation
/// (`spec.md` §4.8, §7).
#[derive(Debug, Error)]
pub enum BundleError {
    /// Reading or writing the bundle directory failed.
    #[error("bundle io error: {0}")]
    Io(String),
    /// The bundle's directory skeleton is missing a required file or
    /// directory, or an identifier is not safe to use as a path component.
    #[error("bundle structural error: {0}")]
    Structural(String),
    /// A file's contents were not valid JSON/NDJSON for the record it names.
    #[error("bundle json error: {0}")]
    Json(String),
    /// The underlying repository failed.
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<std::io::Error> for BundleError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for BundleError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<substrate_core::HashError> for BundleError {
    fn from(err: substrate_core::HashError) -> Self {
        Self::Json(err.to_string())
    }
}
