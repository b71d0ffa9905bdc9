// crates/substrate-bundle/src/model.rs
// ============================================================================
// Module: Bundle File Records
// Description: Serialization shapes for bundle files with no one-to-one
//              canonical type.
// Purpose: Give node.json and artifact.json a stable wire shape.
// Dependencies: substrate-core
// ============================================================================

//! ## Overview
//! Most bundle files serialize a canonical type directly (`Variable`,
//! `Episode`, `Policy`, ...). Two files need a small wrapper because
//! `spec.md` §4.8's layout doesn't name a one-to-one canonical type for
//! them: `node.json` bundles a [`substrate_core::Node`] with its outgoing
//! edges and agent delegation (neither of which has its own named file in
//! the layout), and `artifact.json` carries the [`substrate_core::Artifact`]
//! fields that `about.md`/`notes.md`/`page.json` don't.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use substrate_core::AgentDelegation;
use substrate_core::ArtifactId;
use substrate_core::ArtifactStatus;
use substrate_core::Edge;
use substrate_core::Node;
use substrate_core::NodeId;

// ============================================================================
// SECTION: Node Bundle
// ============================================================================

/// The contents of `nodes/<nodeId>/node.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeBundle {
    /// The node record itself.
    pub node: Node,
    /// Edges where this node is the source.
    pub edges: Vec<Edge>,
    /// This node's agent delegation, if it is an agent acting under one.
    pub delegation: Option<AgentDelegation>,
}

// ============================================================================
// SECTION: Artifact Metadata
// ============================================================================

/// The contents of `nodes/<nodeId>/artifacts/<artifactId>/artifact.json`: the
/// [`substrate_core::Artifact`] fields not already carried by
/// `about.md`/`notes.md`/`page.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMeta {
    /// Artifact identifier.
    pub id: ArtifactId,
    /// Node this artifact belongs to.
    pub node_id: NodeId,
    /// Title.
    pub title: String,
    /// Lifecycle status.
    pub status: ArtifactStatus,
    /// Monotonic trunk version at export time.
    pub trunk_version: u32,
    /// Optional entity references.
    pub entity_refs: Vec<String>,
}
