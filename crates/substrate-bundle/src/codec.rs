// crates/substrate-bundle/src/codec.rs
// ============================================================================
// Module: Bundle File Codec
// Description: Canonical JSON and NDJSON read/write primitives.
// Purpose: Give export and import one shared, deterministic file format.
// Dependencies: substrate-core (canonical_json_bytes), serde, serde_json, std::fs
// ============================================================================

//! ## Overview
//! `spec.md` §4.8/§6 requires every JSON file to be UTF-8 with no BOM and
//! canonicalized with stable key order, and every NDJSON file to use `\n`
//! line terminators with a required trailing newline. This module is the one
//! place those two rules are implemented; `export`/`import` never touch
//! `std::fs` directly for record files.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::BundleError;

// ============================================================================
// SECTION: JSON Files
// ============================================================================

/// Writes `value` to `path` as canonical (RFC 8785) JSON, creating parent
/// directories as needed.
///
/// # Errors
///
/// Returns [`BundleError::Io`] on a filesystem failure or
/// [`BundleError::Json`] if `value` cannot be canonicalized.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), BundleError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let bytes = substrate_core::canonical_json_bytes(value)?;
    fs::write(path, bytes)?;
    Ok(())
}

/// Reads and parses a JSON file at `path`.
///
/// # Errors
///
/// Returns [`BundleError::Io`] if the file cannot be read or
/// [`BundleError::Json`] if its contents are not valid JSON for `T`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, BundleError> {
    let bytes = fs::read(path)?;
    let value = serde_json::from_slice(&bytes)?;
    Ok(value)
}

// ============================================================================
// SECTION: Markdown Files
// ============================================================================

/// Writes `text` verbatim to `path` (UTF-8, no BOM), creating parent
/// directories as needed.
///
/// # Errors
///
/// Returns [`BundleError::Io`] on a filesystem failure.
pub fn write_text(path: &Path, text: &str) -> Result<(), BundleError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, text)?;
    Ok(())
}

/// Reads a UTF-8 text file at `path`.
///
/// # Errors
///
/// Returns [`BundleError::Io`] on a filesystem failure or if the file is not
/// valid UTF-8.
pub fn read_text(path: &Path) -> Result<String, BundleError> {
    fs::read_to_string(path).map_err(BundleError::from)
}

// ============================================================================
// SECTION: NDJSON Files
// ============================================================================

/// Writes `records` to `path` as NDJSON: one canonical JSON object per line,
/// `\n` terminated, with a trailing newline after the last record
/// (`spec.md` §4.8, §6). An empty `records` writes an empty file.
///
/// # Errors
///
/// Returns [`BundleError::Io`] on a filesystem failure or
/// [`BundleError::Json`] if a record cannot be canonicalized.
pub fn write_ndjson<T: Serialize>(path: &Path, records: &[T]) -> Result<(), BundleError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut out = Vec::new();
    for record in records {
        out.extend_from_slice(&substrate_core::canonical_json_bytes(record)?);
        out.push(b'\n');
    }
    fs::write(path, out)?;
    Ok(())
}

/// Reads an NDJSON file at `path`, parsing one record per non-empty line.
///
/// # Errors
///
/// Returns [`BundleError::Io`] if the file cannot be read or
/// [`BundleError::Json`] if any line is not valid JSON for `T`.
pub fn read_ndjson<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, BundleError> {
    let text = fs::read_to_string(path)?;
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(BundleError::from))
        .collect()
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
    fn json_round_trips_with_stable_key_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("value.json");
        let a = serde_json::json!({"b": 1, "a": 2});
        write_json(&path, &a).unwrap();
        let bytes_a = fs::read(&path).unwrap();

        let b = serde_json::json!({"a": 2, "b": 1});
        write_json(&path, &b).unwrap();
        let bytes_b = fs::read(&path).unwrap();

        assert_eq!(bytes_a, bytes_b);
        let read_back: serde_json::Value = read_json(&path).unwrap();
        assert_eq!(read_back, a);
    }

    #[test]
    fn ndjson_round_trips_and_ends_with_newline() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.ndjson");
        let records = vec![serde_json::json!({"n": 1}), serde_json::json!({"n": 2})];
        write_ndjson(&path, &records).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.ends_with('\n'));
        assert_eq!(text.lines().count(), 2);

        let read_back: Vec<serde_json::Value> = read_ndjson(&path).unwrap();
        assert_eq!(read_back, records);
    }

    #[test]
    fn empty_ndjson_writes_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.ndjson");
        write_ndjson::<serde_json::Value>(&path, &[]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
        let read_back: Vec<serde_json::Value> = read_ndjson(&path).unwrap();
        assert!(read_back.is_empty());
    }
}
