// crates/substrate-bundle/src/export.rs
// ============================================================================
// Module: Bundle Export
// Description: Deterministic directory-layout export of the entire canon.
// Purpose: Implement the export half of C8 per spec.md §4.8.
// Dependencies: substrate-core, crate::{codec, layout, model}, tracing
// ============================================================================

//! ## Overview
//! `export_bundle` walks every repository in the fixed order `spec.md` §4.8
//! names — nodes, entity types, entities, variables, episodes, policies,
//! artifacts+revisions, grants, observations, action runs — and writes each
//! record as canonical JSON or NDJSON at the path `crate::layout` assigns it.
//! `surfaces`/`layouts` are skipped (see `crate::layout`'s module docs); no
//! `AuditEntry` is written, matching `spec.md` §4.8's export order list,
//! which never names audit entries as bundle content.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;

use substrate_core::ActionRun;
use substrate_core::Grant;
use substrate_core::NodeId;
use substrate_core::Observation;
use substrate_core::ObservationFilter;
use substrate_core::Repository;
use substrate_core::TimeRange;
use tracing::info;
use tracing::instrument;

use crate::codec::write_json;
use crate::codec::write_ndjson;
use crate::codec::write_text;
use crate::error::BundleError;
use crate::layout;
use crate::model::ArtifactMeta;
use crate::model::NodeBundle;

// ============================================================================
// SECTION: Export Report
// ============================================================================

/// Per-entity-class counts written by [`export_bundle`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportReport {
    /// Nodes written.
    pub nodes: usize,
    /// Entity types written.
    pub entity_types: usize,
    /// Entities written.
    pub entities: usize,
    /// Variables written.
    pub variables: usize,
    /// Episodes written.
    pub episodes: usize,
    /// Policies written.
    pub policies: usize,
    /// Artifacts written (each with its full revision history).
    pub artifacts: usize,
    /// Revisions written across all artifacts.
    pub revisions: usize,
    /// Grants written.
    pub grants: usize,
    /// Observations written.
    pub observations: usize,
    /// Action runs written.
    pub action_runs: usize,
}

// ============================================================================
// SECTION: Export
// ============================================================================

/// Exports every record reachable through `repository` into the directory
/// layout rooted at `root`, creating directories as needed.
///
/// # Errors
///
/// Returns [`BundleError::Repository`] if any repository call fails, or
/// [`BundleError::Io`]/[`BundleError::Json`] if writing a file fails.
#[instrument(skip(repository), fields(root = %root.display()))]
pub fn export_bundle(repository: &dyn Repository, root: &Path) -> Result<ExportReport, BundleError> {
    let mut report = ExportReport::default();

    let nodes = repository.list_nodes()?;
    report.nodes = nodes.len();

    for entity_type in repository.list_entity_types()? {
        let path = layout::entity_types_dir(root).join(format!("{}.json", entity_type.id));
        write_json(&path, &entity_type)?;
        report.entity_types += 1;
    }

    let mut all_observations: Vec<Observation> = Vec::new();
    let mut all_action_runs: Vec<ActionRun> = Vec::new();

    for node in &nodes {
        let node_dir = layout::node_dir(root, &node.id)?;

        let edges = repository.list_edges_from(&node.id)?;
        let delegation = repository.get_agent_delegation(&node.id)?;
        write_json(
            &layout::node_file(&node_dir),
            &NodeBundle {
                node: node.clone(),
                edges,
                delegation,
            },
        )?;

        let grants: Vec<Grant> = repository.list_grants_for_grantee(&node.id)?;
        report.grants += grants.len();
        write_json(&layout::grants_file(&node_dir), &grants)?;

        for entity in repository.list_entities_for_node(&node.id)? {
            let path = layout::entities_dir(&node_dir).join(format!("{}.json", entity.id));
            write_json(&path, &entity)?;
            report.entities += 1;
        }

        for variable in repository.list_variables_for_node(&node.id)? {
            let path = layout::variables_dir(&node_dir).join(format!("{}.json", variable.id));
            write_json(&path, &variable)?;
            report.variables += 1;
        }

        for episode in repository.list_episodes_for_node(&node.id)? {
            let path = layout::episodes_dir(&node_dir).join(format!("{}.json", episode.id));
            write_json(&path, &episode)?;
            report.episodes += 1;
        }

        for policy in repository.list_policies_for_node(&node.id)? {
            let path = layout::policies_dir(&node_dir).join(format!("{}.json", policy.id));
            write_json(&path, &policy)?;
            report.policies += 1;
        }

        for artifact in repository.list_artifacts_for_node(&node.id)? {
            let artifact_dir = layout::artifact_dir(&node_dir, &artifact.id)?;

            write_json(
                &artifact_dir.join(layout::ARTIFACT_META_FILE),
                &ArtifactMeta {
                    id: artifact.id.clone(),
                    node_id: artifact.node_id.clone(),
                    title: artifact.title.clone(),
                    status: artifact.status,
                    trunk_version: artifact.trunk_version,
                    entity_refs: artifact.entity_refs.clone(),
                },
            )?;
            write_text(&artifact_dir.join(layout::ARTIFACT_ABOUT_FILE), &artifact.about)?;
            if let Some(notes) = &artifact.notes {
                write_text(&artifact_dir.join(layout::ARTIFACT_NOTES_FILE), notes)?;
            }
            write_json(&artifact_dir.join(layout::ARTIFACT_PAGE_FILE), &artifact.page)?;

            let mut revisions = repository.list_revisions(&artifact.id)?;
            revisions.sort_by_key(|revision| revision.version);
            report.revisions += revisions.len();
            write_ndjson(&artifact_dir.join(layout::ARTIFACT_REVISIONS_FILE), &revisions)?;

            report.artifacts += 1;
        }

        all_observations.extend(query_all_observations_for_node(repository, &node.id)?);
        all_action_runs.extend(repository.list_action_runs_for_node(&node.id)?);
    }

    all_observations.sort_by_key(|observation| observation.timestamp);
    report.observations = all_observations.len();
    write_ndjson(&layout::observations_file(root), &all_observations)?;

    // `ActionRun` carries no single creation timestamp (`spec.md` §3); id
    // order is the closest deterministic proxy available (see DESIGN.md).
    all_action_runs.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
    report.action_runs = all_action_runs.len();
    write_ndjson(&layout::action_runs_file(root), &all_action_runs)?;

    info!(
        nodes = report.nodes,
        artifacts = report.artifacts,
        observations = report.observations,
        "bundle export complete"
    );
    Ok(report)
}

/// Fetches every observation on `node_id`, paginating past the bounded
/// `ObservationFilter` query contract (`spec.md` §4.4's 1000-item cap
/// applies per page, not per node) and disabling the implicit 24-hour
/// default window by supplying an unbounded `time_range`. `reference_time`
/// is unused once `time_range` is explicit, so a fixed instant satisfies
/// the filter's mandatory field without implying anything about it.
fn query_all_observations_for_node(
    repository: &dyn Repository,
    node_id: &NodeId,
) -> Result<Vec<Observation>, BundleError> {
    let mut out = Vec::new();
    let mut offset = 0;
    loop {
        let filter = ObservationFilter {
            node_id: Some(node_id.clone()),
            type_: None,
            type_prefix: None,
            window: None,
            time_range: Some(TimeRange { start: None, end: None }),
            reference_time: unbounded_query_reference_time(),
            limit: Some(ObservationFilter::MAX_LIMIT),
            offset,
        };
        let page = repository.query_observations(&filter)?;
        let page_len = page.len();
        out.extend(page);
        if page_len < ObservationFilter::MAX_LIMIT {
            break;
        }
        offset += page_len;
    }
    Ok(out)
}

/// A fixed instant used only to satisfy `ObservationFilter::reference_time`
/// when an explicit `time_range` already makes it irrelevant to filtering.
#[allow(
    clippy::unwrap_used,
    reason = "the literal is a fixed, valid RFC 3339 constant; parsing cannot fail"
)]
fn unbounded_query_reference_time() -> substrate_core::Timestamp {
    substrate_core::Timestamp::parse("1970-01-01T00:00:00Z").unwrap()
}
