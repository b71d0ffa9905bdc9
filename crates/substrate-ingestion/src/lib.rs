// crates/substrate-ingestion/src/lib.rs
// ============================================================================
// Module: Substrate Ingestion
// Description: Validation and append pipeline for incoming observations.
// Purpose: Implement C2: the sole entry point for new observations.
// Dependencies: substrate-core, thiserror, tracing
// ============================================================================

//! ## Overview
//! `spec.md` §4.2 names ingestion as the substrate's only write path for
//! observations. A single `ingest_observation` validates one observation and
//! appends it; `ingest_batch` validates every observation in a batch
//! fail-fast, reporting the offending index, before appending any of them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use substrate_core::CoreError;
use substrate_core::Observation;
use substrate_core::Repository;
use substrate_core::RepositoryError;
use substrate_core::is_valid_observation_type;
use thiserror::Error;
use tracing::info;
use tracing::instrument;
use tracing::warn;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Ingestion-specific errors (`spec.md` §4.2, §7).
#[derive(Debug, Error)]
pub enum IngestionError {
    /// The observation's `type` failed `^[a-z][a-z0-9_]*(\.[a-z][a-z0-9_]*)*$`.
    #[error("invalid observation type: {0}")]
    InvalidObservationType(String),
    /// `provenance.confidence` was outside `[0, 1]`.
    #[error("invalid provenance: {0}")]
    ProvenanceError(String),
    /// Fail-fast batch validation failure, reporting the first bad index.
    #[error("validation failed at batch index {index}: {reason}")]
    ValidationError {
        /// Zero-based index of the first invalid observation.
        index: usize,
        /// Human-readable reason.
        reason: String,
    },
    /// The underlying repository rejected the append.
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<IngestionError> for CoreError {
    fn from(err: IngestionError) -> Self {
        match err {
            IngestionError::InvalidObservationType(reason) => Self::Validation {
                field: "type".to_string(),
                reason,
            },
            IngestionError::ProvenanceError(reason) => Self::Provenance(reason),
            IngestionError::ValidationError { index, reason } => Self::Validation {
                field: format!("batch[{index}]"),
                reason,
            },
            IngestionError::Repository(repo_err) => Self::Backend(repo_err.to_string()),
        }
    }
}

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Validates a single observation's structural invariants (`spec.md` §3,
/// §4.2): a well-formed `type`, and provenance confidence within `[0, 1]`
/// when present. Does not check referential integrity (e.g. that `node_id`
/// exists) — that is left to the concrete `Repository`'s `Conflict`/`Backend`
/// surface, consistent with `spec.md` §4.1's "missing resource is `Ok(None)`"
/// stance rather than a validation failure.
///
/// # Errors
///
/// Returns [`IngestionError::InvalidObservationType`] or
/// [`IngestionError::ProvenanceError`] on the first violated constraint.
pub fn validate_observation(observation: &Observation) -> Result<(), IngestionError> {
    if !is_valid_observation_type(&observation.type_) {
        return Err(IngestionError::InvalidObservationType(observation.type_.clone()));
    }
    if !observation.provenance.has_valid_confidence() {
        let confidence = observation.provenance.confidence.unwrap_or_default();
        return Err(IngestionError::ProvenanceError(format!(
            "confidence must be in [0, 1], got {confidence}"
        )));
    }
    Ok(())
}

// ============================================================================
// SECTION: Ingestion
// ============================================================================

/// Validates and appends a single observation (`spec.md` §4.2).
///
/// # Errors
///
/// Returns [`IngestionError`] if validation fails or the repository rejects
/// the append.
#[instrument(skip(repository), fields(observation_id = %observation.id, node_id = %observation.node_id))]
pub fn ingest_observation(
    repository: &dyn Repository,
    observation: Observation,
) -> Result<Observation, IngestionError> {
    if let Err(err) = validate_observation(&observation) {
        warn!(error = %err, "observation failed validation");
        return Err(err);
    }
    let appended = repository.append_observation(observation)?;
    info!(observation_id = %appended.id, "observation ingested");
    Ok(appended)
}

/// Validates every observation in `batch`, fail-fast, before appending any of
/// them. If validation succeeds for the whole batch, every observation is
/// appended in order; if any observation fails validation, none are appended
/// and the error names the first offending index (`spec.md` §4.2).
///
/// # Errors
///
/// Returns [`IngestionError::ValidationError`] naming the first invalid
/// index, or an error from the repository if an append fails partway through
/// (in which case observations before the failure have already been
/// appended — callers that need atomicity should wrap this call in the
/// repository's `transaction`).
#[instrument(skip(repository, batch), fields(batch_len = batch.len()))]
pub fn ingest_batch(repository: &dyn Repository, batch: Vec<Observation>) -> Result<Vec<Observation>, IngestionError> {
    for (index, observation) in batch.iter().enumerate() {
        if let Err(err) = validate_observation(observation) {
            warn!(index, error = %err, "batch validation failed");
            return Err(IngestionError::ValidationError {
                index,
                reason: err.to_string(),
            });
        }
    }
    let mut appended = Vec::with_capacity(batch.len());
    for observation in batch {
        appended.push(repository.append_observation(observation)?);
    }
    info!(count = appended.len(), "batch ingested");
    Ok(appended)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions are permitted.")]

    use substrate_core::NodeId;
    use substrate_core::ObservationId;
    use substrate_core::Provenance;
    use substrate_core::Timestamp;
    use substrate_store_memory::InMemoryStore;

    use super::*;

    fn observation(id: &str, type_: &str, confidence: Option<f64>) -> Observation {
        Observation {
            id: ObservationId::new(id).unwrap(),
            node_id: NodeId::new("n1").unwrap(),
            type_: type_.to_string(),
            timestamp: Timestamp::parse("2026-01-01T00:00:00Z").unwrap(),
            payload: serde_json::json!({ "value": 1 }),
            provenance: Provenance {
                source_id: NodeId::new("n1").unwrap(),
                sponsor_id: None,
                method: Some("manual_entry".to_string()),
                confidence,
            },
            tags: vec![],
        }
    }

    #[test]
    fn ingests_valid_observation() {
        let store = InMemoryStore::new();
        let result = ingest_observation(&store, observation("o1", "health.sleep", Some(0.9)));
        assert!(result.is_ok());
    }

    #[test]
    fn rejects_invalid_type() {
        let store = InMemoryStore::new();
        let err = ingest_observation(&store, observation("o1", "Health.Sleep", None)).unwrap_err();
        assert!(matches!(err, IngestionError::InvalidObservationType(_)));
    }

    #[test]
    fn rejects_out_of_range_confidence() {
        let store = InMemoryStore::new();
        let err = ingest_observation(&store, observation("o1", "health.sleep", Some(1.5))).unwrap_err();
        assert!(matches!(err, IngestionError::ProvenanceError(_)));
    }

    #[test]
    fn batch_is_fail_fast_and_appends_nothing_on_failure() {
        let store = InMemoryStore::new();
        let batch = vec![
            observation("o1", "health.sleep", None),
            observation("o2", "Bad.Type", None),
            observation("o3", "health.sleep", None),
        ];
        let err = ingest_batch(&store, batch).unwrap_err();
        assert!(matches!(err, IngestionError::ValidationError { index: 1, .. }));
        let filter = substrate_core::ObservationFilter {
            node_id: None,
            type_: None,
            type_prefix: None,
            window: None,
            time_range: None,
            reference_time: Timestamp::parse("2026-01-02T00:00:00Z").unwrap(),
            limit: None,
            offset: 0,
        };
        assert_eq!(store.query_observations(&filter).unwrap().len(), 0);
    }

    #[test]
    fn batch_appends_all_on_success() {
        let store = InMemoryStore::new();
        let batch = vec![observation("o1", "health.sleep", None), observation("o2", "health.mood", None)];
        let appended = ingest_batch(&store, batch).unwrap();
        assert_eq!(appended.len(), 2);
    }
}
