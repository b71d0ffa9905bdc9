// crates/substrate-bundle/src/lib.rs
// ============================================================================
// Module: Substrate Bundle Codec
// Description: Deterministic directory-layout export/import/validate for the
//              entire canon held behind a Repository.
// Purpose: Implement C8 per spec.md §4.8.
// Dependencies: substrate-core, serde, serde_json, serde_jcs, thiserror, tracing
// ============================================================================

//! ## Overview
//! The bundle codec turns a [`substrate_core::Repository`]'s contents into a
//! portable directory tree and back. [`export_bundle`] writes it,
//! [`import_bundle`] reads it into a (possibly different) repository, and
//! [`validate_bundle`] checks the directory skeleton without touching a
//! repository at all. `crate::layout` fixes the tree shape every other
//! module in this crate agrees on; `crate::codec` is the one place that
//! reads or writes a record file, so the canonical-JSON and NDJSON rules
//! `spec.md` §4.8/§6 impose are enforced in a single place.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod codec;
pub mod error;
pub mod export;
pub mod import;
pub mod layout;
pub mod model;
pub mod validate;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use error::BundleError;
pub use export::ExportReport;
pub use export::export_bundle;
pub use import::ImportOptions;
pub use import::ImportReport;
pub use import::import_bundle;
pub use model::ArtifactMeta;
pub use model::NodeBundle;
pub use validate::ValidationReport;
pub use validate::validate_bundle;
