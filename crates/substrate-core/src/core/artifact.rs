// crates/substrate-core/src/core/artifact.rs
// ============================================================================
// Module: Substrate Artifacts
// Description: Revisioned content and its immutable revision history.
// Purpose: Model Artifact/Revision per spec.md §3.
// Dependencies: crate::core::{identifiers, time}
// ============================================================================

//! ## Overview
//! An `Artifact` is revisioned content: every mutation produces exactly one
//! new [`Revision`] with `version = previous + 1` (`spec.md` §3, §8).
//! Revisions are immutable once written.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::ArtifactId;
use crate::core::identifiers::NodeId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Artifact
// ============================================================================

/// Lifecycle status of an artifact.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStatus {
    /// Being authored, not yet active.
    Draft,
    /// Actively maintained.
    Active,
    /// Published for external visibility.
    Published,
    /// No longer maintained.
    Archived,
}

/// A block-structured document body. Kept opaque to the core beyond being
/// valid JSON; renderers interpret the block schema.
pub type BlockDocument = serde_json::Value;

/// Revisioned content belonging to a node.
///
/// # Invariants
/// - `trunk_version >= 1`.
/// - After `N` updates, `trunk_version == N + 1` and exactly `N + 1`
///   revisions exist with consecutive versions `1..=N+1` (`spec.md` §8).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    /// Artifact identifier.
    pub id: ArtifactId,
    /// Node this artifact belongs to.
    pub node_id: NodeId,
    /// Title.
    pub title: String,
    /// Short description of what the artifact is about.
    pub about: String,
    /// Optional free-text notes.
    pub notes: Option<String>,
    /// Block-structured body.
    pub page: BlockDocument,
    /// Lifecycle status.
    pub status: ArtifactStatus,
    /// Monotonic trunk version, starting at 1.
    pub trunk_version: u32,
    /// Optional entity references (ids, interpreted by callers).
    pub entity_refs: Vec<String>,
}

// ============================================================================
// SECTION: Revision
// ============================================================================

/// An immutable snapshot of an artifact at a given version.
///
/// # Invariants
/// - `version >= 1`; revisions are never modified once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Revision {
    /// Artifact this revision belongs to.
    pub artifact_id: ArtifactId,
    /// Monotonic version number, starting at 1.
    pub version: u32,
    /// The node that authored this revision.
    pub author_id: NodeId,
    /// Optional commit-style message.
    pub message: Option<String>,
    /// Snapshot of the artifact's mutable fields at this version.
    pub snapshot: ArtifactSnapshot,
    /// When this revision was written.
    pub created_at: Timestamp,
}

/// The mutable subset of [`Artifact`] captured in each [`Revision`].
///
/// # Invariants
/// - None beyond those of its constituent fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactSnapshot {
    /// Title at this revision.
    pub title: String,
    /// About text at this revision.
    pub about: String,
    /// Notes at this revision.
    pub notes: Option<String>,
    /// Page body at this revision.
    pub page: BlockDocument,
    /// Status at this revision.
    pub status: ArtifactStatus,
}

impl Artifact {
    /// Returns a snapshot of this artifact's current mutable fields, for
    /// embedding in a new [`Revision`].
    #[must_use]
    pub fn snapshot(&self) -> ArtifactSnapshot {
        ArtifactSnapshot {
            title: self.title.clone(),
            about: self.about.clone(),
            notes: self.notes.clone(),
            page: self.page.clone(),
            status: self.status,
        }
    }
}
