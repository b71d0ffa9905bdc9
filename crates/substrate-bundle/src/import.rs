// crates/substrate-bundle/src/import.rs
// ============================================================================
// Module: Bundle Import
// Description: Restores a bundle directory into a Repository.
// Purpose: Implement the import half of C8 per spec.md §4.8.
// Dependencies: substrate-core, crate::{codec, layout, model}, tracing
// ============================================================================

//! ## Overview
//! `import_bundle` validates the directory skeleton, then walks it in the
//! same order `export_bundle` writes it. For each record it decides, per
//! [`ImportOptions::skip_existing`], whether to insert it or leave the
//! existing record untouched; non-structural problems (a record that
//! already exists and `skip_existing` is `false`) are collected as warnings
//! rather than aborting the whole import. A missing `nodes/` directory is
//! the one structural error that fails fast (`spec.md` §4.8); a missing
//! `log/` directory is treated as an empty log, with a warning.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use substrate_core::ActionRun;
use substrate_core::Artifact;
use substrate_core::Entity;
use substrate_core::EntityType;
use substrate_core::Episode;
use substrate_core::Grant;
use substrate_core::Observation;
use substrate_core::Policy;
use substrate_core::Repository;
use substrate_core::RepositoryError;
use substrate_core::Revision;
use substrate_core::Variable;
use tracing::info;
use tracing::instrument;

use crate::codec::read_json;
use crate::codec::read_ndjson;
use crate::codec::read_text;
use crate::error::BundleError;
use crate::layout;
use crate::model::ArtifactMeta;
use crate::model::NodeBundle;

// ============================================================================
// SECTION: Options and Report
// ============================================================================

/// Controls how [`import_bundle`] handles a record that already exists in
/// the target repository.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportOptions {
    /// When `true`, a record whose id already exists is left untouched and
    /// silently skipped. When `false`, import still attempts to insert it;
    /// a resulting conflict is recorded as a warning rather than aborting.
    pub skip_existing: bool,
}

/// Per-entity-class counts and warnings produced by [`import_bundle`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Nodes inserted.
    pub nodes: usize,
    /// Entity types inserted.
    pub entity_types: usize,
    /// Entities inserted.
    pub entities: usize,
    /// Variables inserted.
    pub variables: usize,
    /// Episodes inserted.
    pub episodes: usize,
    /// Policies inserted.
    pub policies: usize,
    /// Artifacts inserted (each with its full revision history replayed).
    pub artifacts: usize,
    /// Revisions replayed across all inserted artifacts.
    pub revisions: usize,
    /// Grants inserted.
    pub grants: usize,
    /// Observations inserted.
    pub observations: usize,
    /// Action runs inserted.
    pub action_runs: usize,
    /// Non-fatal problems collected while importing (`spec.md` §4.8).
    pub warnings: Vec<String>,
}

// ============================================================================
// SECTION: Import
// ============================================================================

/// Imports the bundle rooted at `root` into `repository`.
///
/// # Errors
///
/// Returns [`BundleError::Structural`] when `root/nodes` is missing, or any
/// [`BundleError`] variant if reading a file or calling `repository` fails.
#[instrument(skip(repository), fields(root = %root.display()))]
pub fn import_bundle(
    repository: &dyn Repository,
    root: &Path,
    options: ImportOptions,
) -> Result<ImportReport, BundleError> {
    let nodes_dir = layout::nodes_dir(root);
    if !nodes_dir.is_dir() {
        return Err(BundleError::Structural(format!(
            "missing required directory: {}",
            nodes_dir.display()
        )));
    }

    let mut report = ImportReport::default();

    for path in list_files_sorted(&layout::entity_types_dir(root), "json")? {
        let entity_type: EntityType = read_json(&path)?;
        let exists = repository.get_entity_type(&entity_type.id)?.is_some();
        if create_or_skip(
            options.skip_existing,
            exists,
            || repository.create_entity_type(entity_type.clone()),
            &mut report.warnings,
            &format!("entity type {}", entity_type.id),
        )? {
            report.entity_types += 1;
        }
    }

    for node_dir in list_subdirs_sorted(&nodes_dir)? {
        import_node(repository, &node_dir, options, &mut report)?;
    }

    let log_dir = layout::log_dir(root);
    if !log_dir.is_dir() {
        report
            .warnings
            .push(format!("missing log directory: {} (no log imported)", log_dir.display()));
    } else {
        let observations_path = layout::observations_file(root);
        if observations_path.is_file() {
            let observations: Vec<Observation> = read_ndjson(&observations_path)?;
            for observation in observations {
                let exists = repository.get_observation(&observation.id)?.is_some();
                let id = observation.id.clone();
                if create_or_skip(
                    options.skip_existing,
                    exists,
                    || repository.append_observation(observation.clone()),
                    &mut report.warnings,
                    &format!("observation {id}"),
                )? {
                    report.observations += 1;
                }
            }
        }

        let action_runs_path = layout::action_runs_file(root);
        if action_runs_path.is_file() {
            let action_runs: Vec<ActionRun> = read_ndjson(&action_runs_path)?;
            for action_run in action_runs {
                let exists = repository.get_action_run(&action_run.id)?.is_some();
                let id = action_run.id.clone();
                if create_or_skip(
                    options.skip_existing,
                    exists,
                    || repository.create_action_run(action_run.clone()),
                    &mut report.warnings,
                    &format!("action run {id}"),
                )? {
                    report.action_runs += 1;
                }
            }
        }
    }

    info!(
        nodes = report.nodes,
        artifacts = report.artifacts,
        observations = report.observations,
        warnings = report.warnings.len(),
        "bundle import complete"
    );
    Ok(report)
}

/// Imports one `nodes/<nodeId>/` directory's worth of records.
fn import_node(
    repository: &dyn Repository,
    node_dir: &Path,
    options: ImportOptions,
    report: &mut ImportReport,
) -> Result<(), BundleError> {
    let bundle: NodeBundle = read_json(&layout::node_file(node_dir))?;

    let node_exists = repository.get_node(&bundle.node.id)?.is_some();
    if create_or_skip(
        options.skip_existing,
        node_exists,
        || repository.create_node(bundle.node.clone()),
        &mut report.warnings,
        &format!("node {}", bundle.node.id),
    )? {
        report.nodes += 1;
    }

    for edge in &bundle.edges {
        let exists = repository
            .list_edges_from(&bundle.node.id)?
            .iter()
            .any(|existing| existing.id == edge.id);
        let _ = create_or_skip(
            options.skip_existing,
            exists,
            || repository.add_edge(edge.clone()),
            &mut report.warnings,
            &format!("edge {}", edge.id),
        )?;
    }

    if let Some(delegation) = bundle.delegation {
        // `set_agent_delegation` creates-or-replaces; it never conflicts, so
        // `skip_existing` only matters when a delegation is already present.
        let already_present = repository.get_agent_delegation(&bundle.node.id)?.is_some();
        if !(options.skip_existing && already_present) {
            repository.set_agent_delegation(delegation)?;
        }
    }

    let grants_path = layout::grants_file(node_dir);
    if grants_path.is_file() {
        let grants: Vec<Grant> = read_json(&grants_path)?;
        for grant in grants {
            let exists = repository.get_grant(&grant.id)?.is_some();
            let id = grant.id.clone();
            if create_or_skip(
                options.skip_existing,
                exists,
                || repository.create_grant(grant.clone()),
                &mut report.warnings,
                &format!("grant {id}"),
            )? {
                report.grants += 1;
            }
        }
    }

    for path in list_files_sorted(&layout::entities_dir(node_dir), "json")? {
        let entity: Entity = read_json(&path)?;
        let exists = repository.get_entity(&entity.id)?.is_some();
        let id = entity.id.clone();
        if create_or_skip(
            options.skip_existing,
            exists,
            || repository.create_entity(entity.clone()),
            &mut report.warnings,
            &format!("entity {id}"),
        )? {
            report.entities += 1;
        }
    }

    for path in list_files_sorted(&layout::variables_dir(node_dir), "json")? {
        let variable: Variable = read_json(&path)?;
        let exists = repository.get_variable(&variable.id)?.is_some();
        let id = variable.id.clone();
        if create_or_skip(
            options.skip_existing,
            exists,
            || repository.create_variable(variable.clone()),
            &mut report.warnings,
            &format!("variable {id}"),
        )? {
            report.variables += 1;
        }
    }

    for path in list_files_sorted(&layout::episodes_dir(node_dir), "json")? {
        let episode: Episode = read_json(&path)?;
        let exists = repository.get_episode(&episode.id)?.is_some();
        let id = episode.id.clone();
        if create_or_skip(
            options.skip_existing,
            exists,
            || repository.create_episode(episode.clone()),
            &mut report.warnings,
            &format!("episode {id}"),
        )? {
            report.episodes += 1;
        }
    }

    for path in list_files_sorted(&layout::policies_dir(node_dir), "json")? {
        let policy: Policy = read_json(&path)?;
        let exists = repository.get_policy(&policy.id)?.is_some();
        let id = policy.id.clone();
        if create_or_skip(
            options.skip_existing,
            exists,
            || repository.create_policy(policy.clone()),
            &mut report.warnings,
            &format!("policy {id}"),
        )? {
            report.policies += 1;
        }
    }

    for artifact_dir in list_subdirs_sorted(&layout::artifacts_dir(node_dir))? {
        import_artifact(repository, &artifact_dir, options, report)?;
    }

    Ok(())
}

/// Replays one `artifacts/<artifactId>/` directory into `repository` by
/// reconstructing the artifact at version 1 via `create_artifact`, then
/// replaying each later revision via `update_artifact` in version order.
/// `Repository`'s operation set (§4.1) has no raw-revision-insert method,
/// so each replayed revision's `created_at` is stamped at import time
/// rather than preserved from the original export (documented in
/// `DESIGN.md`).
fn import_artifact(
    repository: &dyn Repository,
    artifact_dir: &Path,
    options: ImportOptions,
    report: &mut ImportReport,
) -> Result<(), BundleError> {
    let meta: ArtifactMeta = read_json(&artifact_dir.join(layout::ARTIFACT_META_FILE))?;
    let already_exists = repository.get_artifact(&meta.id)?.is_some();
    if options.skip_existing && already_exists {
        return Ok(());
    }

    let about = read_text(&artifact_dir.join(layout::ARTIFACT_ABOUT_FILE))?;
    let notes_path = artifact_dir.join(layout::ARTIFACT_NOTES_FILE);
    let notes = if notes_path.is_file() { Some(read_text(&notes_path)?) } else { None };
    let page = read_json(&artifact_dir.join(layout::ARTIFACT_PAGE_FILE))?;
    let mut revisions: Vec<Revision> = read_ndjson(&artifact_dir.join(layout::ARTIFACT_REVISIONS_FILE))?;
    revisions.sort_by_key(|revision| revision.version);

    let Some(first) = revisions.first() else {
        report
            .warnings
            .push(format!("artifact {} has no revisions, skipped", meta.id));
        return Ok(());
    };

    let initial = Artifact {
        id: meta.id.clone(),
        node_id: meta.node_id.clone(),
        title: first.snapshot.title.clone(),
        about: about.clone(),
        notes: notes.clone(),
        page,
        status: first.snapshot.status,
        trunk_version: 1,
        entity_refs: meta.entity_refs.clone(),
    };

    match repository.create_artifact(initial, first.author_id.clone()) {
        Ok(_) => {}
        Err(RepositoryError::Conflict(reason)) => {
            report.warnings.push(format!("artifact {}: {reason}", meta.id));
            return Ok(());
        }
        Err(other) => return Err(BundleError::Repository(other)),
    }
    report.artifacts += 1;
    report.revisions += 1;

    for revision in &revisions[1..] {
        let Some(mut current) = repository.get_artifact(&meta.id)? else {
            break;
        };
        current.title = revision.snapshot.title.clone();
        current.about = revision.snapshot.about.clone();
        current.notes = revision.snapshot.notes.clone();
        current.page = revision.snapshot.page.clone();
        current.status = revision.snapshot.status;
        repository.update_artifact(current, revision.author_id.clone(), revision.message.clone())?;
        report.revisions += 1;
    }

    Ok(())
}

// ============================================================================
// SECTION: Directory Listing
// ============================================================================

/// Returns every file directly inside `dir` whose extension matches `ext`,
/// sorted by path for deterministic import order. Returns an empty list
/// (not an error) if `dir` does not exist.
fn list_files_sorted(dir: &Path, ext: &str) -> Result<Vec<PathBuf>, BundleError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().and_then(|ext| ext.to_str()) == Some(ext))
        .collect();
    paths.sort();
    Ok(paths)
}

/// Returns every subdirectory directly inside `dir`, sorted by path for
/// deterministic import order. Returns an empty list (not an error) if
/// `dir` does not exist.
fn list_subdirs_sorted(dir: &Path) -> Result<Vec<PathBuf>, BundleError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    paths.sort();
    Ok(paths)
}

// ============================================================================
// SECTION: Create-Or-Skip
// ============================================================================

/// Applies `spec.md` §4.8's "decide per `skipExisting` whether to insert or
/// skip" rule to one record: skip silently if already present and
/// `skip_existing`; otherwise attempt `create`, converting a resulting
/// [`RepositoryError::Conflict`] into a collected warning instead of a
/// fatal error. Returns `true` when the record was inserted.
fn create_or_skip<T>(
    skip_existing: bool,
    already_exists: bool,
    create: impl FnOnce() -> Result<T, RepositoryError>,
    warnings: &mut Vec<String>,
    context: &str,
) -> Result<bool, BundleError> {
    if skip_existing && already_exists {
        return Ok(false);
    }
    match create() {
        Ok(_) => Ok(true),
        Err(RepositoryError::Conflict(reason)) => {
            warnings.push(format!("{context}: {reason}"));
            Ok(false)
        }
        Err(other) => Err(BundleError::Repository(other)),
    }
}
