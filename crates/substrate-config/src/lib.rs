// crates/substrate-config/src/lib.rs
// ============================================================================
// Module: Substrate Configuration
// Description: TOML-backed configuration surface for the substrate.
// Purpose: Load and validate the settings named in spec.md §6.
// Dependencies: substrate-core, serde, toml
// ============================================================================

//! ## Overview
//! `spec.md` §6 names a small configuration surface: a database connection
//! string (opaque to the core — owned by the concrete store), default policy
//! timeout, default action timeout, max policy memory, default observation
//! window, and an audit sink toggle. This crate loads that surface from TOML
//! (or environment overrides), failing closed with [`ConfigError`] rather
//! than panicking, mirroring the teacher's `decision-gate-config` crate.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Environment variable used to override the config file path.
pub const CONFIG_ENV_VAR: &str = "SUBSTRATE_CONFIG";
/// Default policy evaluation timeout, in milliseconds (`spec.md` §4.5, §5).
const DEFAULT_POLICY_TIMEOUT_MS: u64 = 500;
/// Default action execution timeout, in milliseconds (`spec.md` §5).
const DEFAULT_ACTION_TIMEOUT_MS: u64 = 30_000;
/// Default per-policy fuel/step budget, standing in for "max policy memory"
/// (`spec.md` §6) since this workspace's sandbox is a fuel-metered
/// interpreter rather than a process with addressable memory.
const DEFAULT_MAX_POLICY_FUEL_STEPS: u64 = 100_000;
/// Default observation window, in hours, used when a caller of
/// `canon.queryObservations` specifies neither `window` nor `timeRange`
/// (`spec.md` §4.4, §6).
const DEFAULT_OBSERVATION_WINDOW_HOURS: f64 = 24.0;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading/validation errors.
///
/// # Invariants
/// - Never panics; every failure path returns one of these variants.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("config io error: {0}")]
    Io(String),
    /// The config file was not valid TOML.
    #[error("config parse error: {0}")]
    Parse(String),
    /// The config parsed but failed semantic validation.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Substrate Config
// ============================================================================

/// The substrate's ambient configuration surface (`spec.md` §6).
///
/// # Invariants
/// - All durations are strictly positive once [`SubstrateConfig::validate`]
///   has succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubstrateConfig {
    /// Opaque connection string for the concrete `Repository` backend. The
    /// core never interprets this value; it is passed through to whichever
    /// store implementation the caller wires up.
    pub database_url: String,
    /// Default per-policy evaluation timeout, in milliseconds.
    #[serde(default = "default_policy_timeout_ms")]
    pub default_policy_timeout_ms: u64,
    /// Default per-action execution timeout, in milliseconds.
    #[serde(default = "default_action_timeout_ms")]
    pub default_action_timeout_ms: u64,
    /// Maximum interpreter fuel (proxy for "max policy memory") a single
    /// policy evaluation may consume before it is treated as a timeout.
    #[serde(default = "default_max_policy_fuel_steps")]
    pub max_policy_fuel_steps: u64,
    /// Default observation window, in hours, applied by
    /// `canon.queryObservations` when unspecified.
    #[serde(default = "default_observation_window_hours")]
    pub default_observation_window_hours: f64,
    /// Whether Prism writes audit entries (`spec.md` §4.7). Disabling this is
    /// intended for isolated testing only; production configurations should
    /// leave it enabled.
    #[serde(default = "default_audit_enabled")]
    pub audit_enabled: bool,
    /// Whether Prism wraps mutations in a transaction (`spec.md` §4.7).
    #[serde(default = "default_transactions_enabled")]
    pub transactions_enabled: bool,
}

impl Default for SubstrateConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            default_policy_timeout_ms: default_policy_timeout_ms(),
            default_action_timeout_ms: default_action_timeout_ms(),
            max_policy_fuel_steps: default_max_policy_fuel_steps(),
            default_observation_window_hours: default_observation_window_hours(),
            audit_enabled: default_audit_enabled(),
            transactions_enabled: default_transactions_enabled(),
        }
    }
}

impl SubstrateConfig {
    /// Loads configuration from `path`, or from the file named by
    /// [`CONFIG_ENV_VAR`] when `path` is `None`. Returns [`ConfigError::Io`]
    /// when neither is set and no path can be resolved.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read, is not valid
    /// TOML, or fails [`SubstrateConfig::validate`].
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let from_env = env::var(CONFIG_ENV_VAR)
                    .map_err(|_| ConfigError::Io(format!("{CONFIG_ENV_VAR} is not set and no path was given")))?;
                Path::new(&from_env).to_path_buf()
            }
        };
        let content = fs::read_to_string(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        let config: Self = toml::from_str(&content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates that every duration is strictly positive and
    /// `database_url` is non-empty.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] on the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_url.trim().is_empty() {
            return Err(ConfigError::Invalid("database_url must be non-empty".to_string()));
        }
        if self.default_policy_timeout_ms == 0 {
            return Err(ConfigError::Invalid("default_policy_timeout_ms must be > 0".to_string()));
        }
        if self.default_action_timeout_ms == 0 {
            return Err(ConfigError::Invalid("default_action_timeout_ms must be > 0".to_string()));
        }
        if self.max_policy_fuel_steps == 0 {
            return Err(ConfigError::Invalid("max_policy_fuel_steps must be > 0".to_string()));
        }
        if !(self.default_observation_window_hours > 0.0) {
            return Err(ConfigError::Invalid(
                "default_observation_window_hours must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Serde Defaults
// ============================================================================

const fn default_policy_timeout_ms() -> u64 {
    DEFAULT_POLICY_TIMEOUT_MS
}

const fn default_action_timeout_ms() -> u64 {
    DEFAULT_ACTION_TIMEOUT_MS
}

const fn default_max_policy_fuel_steps() -> u64 {
    DEFAULT_MAX_POLICY_FUEL_STEPS
}

const fn default_observation_window_hours() -> f64 {
    DEFAULT_OBSERVATION_WINDOW_HOURS
}

const fn default_audit_enabled() -> bool {
    true
}

const fn default_transactions_enabled() -> bool {
    true
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_values() {
        let config = SubstrateConfig {
            database_url: "memory://".to_string(),
            ..Default::default()
        };
        assert_eq!(config.default_policy_timeout_ms, 500);
        assert!((config.default_observation_window_hours - 24.0).abs() < f64::EPSILON);
        assert!(config.audit_enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_empty_database_url() {
        let config = SubstrateConfig::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_timeout() {
        let config = SubstrateConfig {
            database_url: "memory://".to_string(),
            default_policy_timeout_ms: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn parses_from_toml() {
        let toml_text = r#"
            database_url = "postgres://localhost/substrate"
            default_policy_timeout_ms = 750
        "#;
        let config: SubstrateConfig = toml::from_str(toml_text).expect("valid toml");
        assert_eq!(config.default_policy_timeout_ms, 750);
        assert_eq!(config.default_action_timeout_ms, DEFAULT_ACTION_TIMEOUT_MS);
        assert!(config.validate().is_ok());
    }
}
