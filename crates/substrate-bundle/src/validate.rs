// crates/substrate-bundle/src/validate.rs
// ============================================================================
// Module: Bundle Structural Validation
// Description: Checks a bundle directory's skeleton without loading it.
// Purpose: Implement the validation half of C8 per spec.md §4.8.
// Dependencies: crate::layout
// ============================================================================

//! ## Overview
//! `validate_bundle` checks the directory skeleton `spec.md` §4.8 names,
//! without parsing any file contents. A missing `nodes/` directory is an
//! error; a missing `log/` directory is a warning (the log is append-only
//! and an empty one is a valid, if unusual, bundle). Unrecognized entries
//! at the bundle root or inside a node directory are warned on, not
//! rejected, so a bundle produced by a newer writer can still be read.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;

use tracing::instrument;
use tracing::warn;

use crate::error::BundleError;
use crate::layout;

// ============================================================================
// SECTION: Report
// ============================================================================

/// The known top-level entries a bundle root may contain.
const KNOWN_ROOT_ENTRIES: [&str; 3] = [layout::NODES_DIR, layout::ENTITY_TYPES_DIR, layout::LOG_DIR];

/// The known entries a `nodes/<nodeId>/` directory may contain.
const KNOWN_NODE_ENTRIES: [&str; 7] = [
    layout::NODE_FILE,
    layout::GRANTS_FILE,
    layout::ARTIFACTS_DIR,
    layout::ENTITIES_DIR,
    layout::VARIABLES_DIR,
    layout::EPISODES_DIR,
    layout::POLICIES_DIR,
];

/// Result of [`validate_bundle`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Structural problems that make the bundle unreadable.
    pub errors: Vec<String>,
    /// Non-fatal observations (missing optional parts, unknown extras).
    pub warnings: Vec<String>,
}

impl ValidationReport {
    /// A bundle is valid when it has no errors; warnings do not affect this.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

// ============================================================================
// SECTION: Validate
// ============================================================================

/// Checks the directory skeleton at `root` against `spec.md` §4.8's layout.
///
/// # Errors
///
/// Returns [`BundleError::Io`] if `root` cannot be read at all (e.g. it does
/// not exist). Structural problems within a readable tree are reported in
/// the returned [`ValidationReport`], not as an `Err`.
#[instrument(fields(root = %root.display()))]
pub fn validate_bundle(root: &Path) -> Result<ValidationReport, BundleError> {
    let mut report = ValidationReport::default();

    if !root.is_dir() {
        report.errors.push(format!("bundle root is not a directory: {}", root.display()));
        return Ok(report);
    }

    for name in list_entry_names(root)? {
        if !KNOWN_ROOT_ENTRIES.contains(&name.as_str()) {
            report.warnings.push(format!("unknown entry at bundle root: {name}"));
        }
    }

    let nodes_dir = layout::nodes_dir(root);
    if !nodes_dir.is_dir() {
        report
            .errors
            .push(format!("missing required directory: {}", nodes_dir.display()));
    } else {
        for node_dir in list_entry_paths(&nodes_dir)? {
            if !node_dir.is_dir() {
                report
                    .warnings
                    .push(format!("unexpected non-directory entry under nodes/: {}", node_dir.display()));
                continue;
            }
            validate_node_dir(&node_dir, &mut report)?;
        }
    }

    let log_dir = layout::log_dir(root);
    if !log_dir.is_dir() {
        report
            .warnings
            .push(format!("missing log directory: {}", log_dir.display()));
    } else {
        if !layout::observations_file(root).is_file() {
            report.warnings.push("missing log/observations.ndjson".to_string());
        }
        if !layout::action_runs_file(root).is_file() {
            report.warnings.push("missing log/action_runs.ndjson".to_string());
        }
        for name in list_entry_names(&log_dir)? {
            if name != layout::OBSERVATIONS_FILE && name != layout::ACTION_RUNS_FILE {
                report.warnings.push(format!("unknown entry in log/: {name}"));
            }
        }
    }

    for problem in &report.errors {
        warn!(problem = %problem, "bundle validation error");
    }

    Ok(report)
}

/// Checks one `nodes/<nodeId>/` directory: `node.json` must be present;
/// everything else named in `spec.md` §4.8's per-node layout is optional.
fn validate_node_dir(node_dir: &Path, report: &mut ValidationReport) -> Result<(), BundleError> {
    if !layout::node_file(node_dir).is_file() {
        report
            .errors
            .push(format!("missing required file: {}", layout::node_file(node_dir).display()));
    }

    for name in list_entry_names(node_dir)? {
        if !KNOWN_NODE_ENTRIES.contains(&name.as_str()) {
            report
                .warnings
                .push(format!("unknown entry under {}: {name}", node_dir.display()));
        }
    }

    Ok(())
}

// ============================================================================
// SECTION: Directory Listing
// ============================================================================

/// Returns the file-name (not full path) of every entry directly inside
/// `dir`, in filesystem-reported order.
fn list_entry_names(dir: &Path) -> Result<Vec<String>, BundleError> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}

/// Returns the full path of every entry directly inside `dir`.
fn list_entry_paths(dir: &Path) -> Result<Vec<std::path::PathBuf>, BundleError> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        paths.push(entry?.path());
    }
    Ok(paths)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions are permitted.")]

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn missing_nodes_directory_is_an_error() {
        let dir = tempdir().unwrap();
        let report = validate_bundle(dir.path()).unwrap();
        assert!(!report.is_valid());
        assert!(report.errors.iter().any(|e| e.contains("nodes")));
    }

    #[test]
    fn missing_log_directory_is_only_a_warning() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join(layout::NODES_DIR)).unwrap();
        let report = validate_bundle(dir.path()).unwrap();
        assert!(report.is_valid());
        assert!(report.warnings.iter().any(|w| w.contains("log")));
    }

    #[test]
    fn unknown_root_entry_is_a_warning_not_an_error() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join(layout::NODES_DIR)).unwrap();
        fs::write(dir.path().join("surfaces.json"), "{}").unwrap();
        let report = validate_bundle(dir.path()).unwrap();
        assert!(report.is_valid());
        assert!(report.warnings.iter().any(|w| w.contains("surfaces.json")));
    }

    #[test]
    fn node_missing_node_json_is_an_error() {
        let dir = tempdir().unwrap();
        let node_dir = dir.path().join(layout::NODES_DIR).join("n1");
        fs::create_dir_all(&node_dir).unwrap();
        let report = validate_bundle(dir.path()).unwrap();
        assert!(!report.is_valid());
        assert!(report.errors.iter().any(|e| e.contains("node.json")));
    }

    #[test]
    fn complete_minimal_bundle_is_valid_with_no_warnings() {
        let dir = tempdir().unwrap();
        let node_dir = dir.path().join(layout::NODES_DIR).join("n1");
        fs::create_dir_all(&node_dir).unwrap();
        fs::write(node_dir.join(layout::NODE_FILE), "{}").unwrap();
        let log_dir = dir.path().join(layout::LOG_DIR);
        fs::create_dir_all(&log_dir).unwrap();
        fs::write(log_dir.join(layout::OBSERVATIONS_FILE), "").unwrap();
        fs::write(log_dir.join(layout::ACTION_RUNS_FILE), "").unwrap();

        let report = validate_bundle(dir.path()).unwrap();
        assert!(report.is_valid());
        assert!(report.warnings.is_empty());
    }
}
