// crates/substrate-bundle/src/layout.rs
// ============================================================================
// Module: Bundle Directory Layout
// Description: Path constants and path-builders for the bundle's on-disk
//              directory layout.
// Purpose: Give export, import, and validation one shared map of the
//          directory skeleton named in spec.md §4.8.
// Dependencies: substrate-core, crate::error
// ============================================================================

//! ## Overview
//! `spec.md` §4.8 fixes the bundle's directory layout exactly:
//!
//! ```text
//! <root>/
//!   nodes/<nodeId>/
//!     node.json
//!     grants.json
//!     artifacts/<artifactId>/{about.md, notes.md?, page.json, revisions.ndjson}
//!     entities/<entityId>.json
//!     variables/<variableId>.json
//!     episodes/<episodeId>.json
//!     policies/<policyId>.json
//!   entity-types/<typeId>.json
//!   log/
//!     observations.ndjson
//!     action_runs.ndjson
//! ```
//!
//! Two deviations from the letter of `spec.md`'s tree, both recorded in
//! `DESIGN.md`:
//!
//! - `surfaces/<surfaceId>.json` and `layouts/<layoutId>.json` are named in
//!   `spec.md` but `spec.md` §1 keeps the presentation layer those
//!   directories would hold entirely out of core scope — the `Repository`
//!   trait (C1) exposes no surface/layout entity class at all. This codec
//!   never writes or reads those directories.
//! - `entity-types/<typeId>.json` lives at the bundle root rather than
//!   nested under `nodes/<nodeId>/`: [`substrate_core::core::entity::EntityType`]
//!   has no `node_id` field in this workspace's data model (entity types are
//!   a global vocabulary entities reference by id), so there is no node to
//!   nest it under.
//! - `policies/<policyId>.{json|ts}` is always written as `.json`: this
//!   workspace's sandboxed policy language (`substrate-policy::lang`) is
//!   itself JSON-encoded, never TypeScript source.
//! - An `artifact.json` file (not named in `spec.md`) sits alongside
//!   `about.md`/`notes.md`/`page.json`/`revisions.ndjson` to carry the
//!   artifact's remaining fields (`id`, `node_id`, `title`, `status`,
//!   `trunk_version`, `entity_refs`) that none of the named files have room
//!   for.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;

use substrate_core::ArtifactId;
use substrate_core::NodeId;

use crate::error::BundleError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Top-level directory holding one subdirectory per node.
pub const NODES_DIR: &str = "nodes";
/// Top-level directory holding the global entity-type vocabulary.
pub const ENTITY_TYPES_DIR: &str = "entity-types";
/// Top-level directory holding the two append-only logs.
pub const LOG_DIR: &str = "log";
/// Per-node file carrying the node record, its outgoing edges, and its
/// agent delegation, if any.
pub const NODE_FILE: &str = "node.json";
/// Per-node file carrying the grants issued to that node.
pub const GRANTS_FILE: &str = "grants.json";
/// Per-node directory of artifacts.
pub const ARTIFACTS_DIR: &str = "artifacts";
/// Per-node directory of entities.
pub const ENTITIES_DIR: &str = "entities";
/// Per-node directory of variables.
pub const VARIABLES_DIR: &str = "variables";
/// Per-node directory of episodes.
pub const EPISODES_DIR: &str = "episodes";
/// Per-node directory of policies.
pub const POLICIES_DIR: &str = "policies";
/// Per-artifact file carrying the fields not captured by the other
/// per-artifact files.
pub const ARTIFACT_META_FILE: &str = "artifact.json";
/// Per-artifact file carrying `about` as plain Markdown.
pub const ARTIFACT_ABOUT_FILE: &str = "about.md";
/// Per-artifact file carrying `notes` as plain Markdown, when present.
pub const ARTIFACT_NOTES_FILE: &str = "notes.md";
/// Per-artifact file carrying `page` as canonical JSON.
pub const ARTIFACT_PAGE_FILE: &str = "page.json";
/// Per-artifact file carrying the revision history as NDJSON.
pub const ARTIFACT_REVISIONS_FILE: &str = "revisions.ndjson";
/// Log file carrying every observation across every node.
pub const OBSERVATIONS_FILE: &str = "observations.ndjson";
/// Log file carrying every action run across every node.
pub const ACTION_RUNS_FILE: &str = "action_runs.ndjson";

// ============================================================================
// SECTION: Path Safety
// ============================================================================

/// Returns `id` unchanged if it is safe to use as a single path component —
/// non-empty, with no path separator and no `.`/`..` traversal segment.
///
/// # Errors
///
/// Returns [`BundleError::Structural`] when `id` is not a safe component.
pub fn safe_component(id: &str) -> Result<&str, BundleError> {
    let is_safe = !id.is_empty()
        && id != "."
        && id != ".."
        && !id.contains('/')
        && !id.contains('\\');
    if is_safe {
        Ok(id)
    } else {
        Err(BundleError::Structural(format!(
            "identifier is not a safe bundle path component: {id:?}"
        )))
    }
}

// ============================================================================
// SECTION: Path Builders
// ============================================================================

/// Returns `<root>/nodes`.
#[must_use]
pub fn nodes_dir(root: &Path) -> PathBuf {
    root.join(NODES_DIR)
}

/// Returns `<root>/nodes/<nodeId>`.
///
/// # Errors
///
/// Returns [`BundleError::Structural`] when `node_id` is not a safe
/// component.
pub fn node_dir(root: &Path, node_id: &NodeId) -> Result<PathBuf, BundleError> {
    Ok(nodes_dir(root).join(safe_component(node_id.as_str())?))
}

/// Returns `<root>/nodes/<nodeId>/node.json`.
pub fn node_file(node_dir: &Path) -> PathBuf {
    node_dir.join(NODE_FILE)
}

/// Returns `<root>/nodes/<nodeId>/grants.json`.
pub fn grants_file(node_dir: &Path) -> PathBuf {
    node_dir.join(GRANTS_FILE)
}

/// Returns `<root>/nodes/<nodeId>/artifacts`.
pub fn artifacts_dir(node_dir: &Path) -> PathBuf {
    node_dir.join(ARTIFACTS_DIR)
}

/// Returns `<root>/nodes/<nodeId>/artifacts/<artifactId>`.
///
/// # Errors
///
/// Returns [`BundleError::Structural`] when `artifact_id` is not a safe
/// component.
pub fn artifact_dir(node_dir: &Path, artifact_id: &ArtifactId) -> Result<PathBuf, BundleError> {
    Ok(artifacts_dir(node_dir).join(safe_component(artifact_id.as_str())?))
}

/// Returns `<root>/nodes/<nodeId>/entities`.
pub fn entities_dir(node_dir: &Path) -> PathBuf {
    node_dir.join(ENTITIES_DIR)
}

/// Returns `<root>/nodes/<nodeId>/variables`.
pub fn variables_dir(node_dir: &Path) -> PathBuf {
    node_dir.join(VARIABLES_DIR)
}

/// Returns `<root>/nodes/<nodeId>/episodes`.
pub fn episodes_dir(node_dir: &Path) -> PathBuf {
    node_dir.join(EPISODES_DIR)
}

/// Returns `<root>/nodes/<nodeId>/policies`.
pub fn policies_dir(node_dir: &Path) -> PathBuf {
    node_dir.join(POLICIES_DIR)
}

/// Returns `<root>/entity-types`.
#[must_use]
pub fn entity_types_dir(root: &Path) -> PathBuf {
    root.join(ENTITY_TYPES_DIR)
}

/// Returns `<root>/log`.
#[must_use]
pub fn log_dir(root: &Path) -> PathBuf {
    root.join(LOG_DIR)
}

/// Returns `<root>/log/observations.ndjson`.
#[must_use]
pub fn observations_file(root: &Path) -> PathBuf {
    log_dir(root).join(OBSERVATIONS_FILE)
}

/// Returns `<root>/log/action_runs.ndjson`.
#[must_use]
pub fn action_runs_file(root: &Path) -> PathBuf {
    log_dir(root).join(ACTION_RUNS_FILE)
}
