// crates/substrate-core/src/core/time.rs
// ============================================================================
// Module: Substrate Time Model
// Description: UTC timestamp representation and the clock seam.
// Purpose: Keep "now" injectable so ingestion and policy evaluation stay testable.
// Dependencies: time, serde
// ============================================================================

//! ## Overview
//! `spec.md` §3 requires all timestamps to be UTC ISO-8601 with timezone. This
//! module wraps `time::OffsetDateTime` so the rest of the substrate never talks
//! to `time` directly, and defines a [`Clock`] seam: production code uses
//! [`SystemClock`], tests use [`FixedClock`]. The substrate core never reads
//! wall-clock time itself — every component that needs "now" takes a `&dyn
//! Clock`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Error returned when a timestamp fails to parse as strict RFC 3339.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid RFC 3339 timestamp: {0}")]
pub struct TimestampParseError(pub String);

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// A UTC timestamp, serialized as RFC 3339 text.
///
/// # Invariants
/// - Always normalized to UTC (offset zero) on construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(OffsetDateTime);

impl Timestamp {
    /// Wraps an `OffsetDateTime`, normalizing it to UTC.
    #[must_use]
    pub fn from_offset(value: OffsetDateTime) -> Self {
        Self(value.to_offset(time::UtcOffset::UTC))
    }

    /// Parses a strict RFC 3339 string.
    ///
    /// # Errors
    ///
    /// Returns [`TimestampParseError`] when `input` is not valid RFC 3339.
    pub fn parse(input: &str) -> Result<Self, TimestampParseError> {
        OffsetDateTime::parse(input, &Rfc3339)
            .map(Self::from_offset)
            .map_err(|err| TimestampParseError(err.to_string()))
    }

    /// Returns the underlying `OffsetDateTime`.
    #[must_use]
    pub const fn as_offset(&self) -> OffsetDateTime {
        self.0
    }

    /// Returns the number of whole seconds between `self` and `other`
    /// (positive when `self` is later).
    #[must_use]
    pub fn seconds_since(&self, other: Self) -> i64 {
        (self.0 - other.0).whole_seconds()
    }

    /// Returns `self` shifted backward by the given number of hours.
    #[must_use]
    pub fn minus_hours(&self, hours: f64) -> Self {
        let nanos = (hours * 3_600.0 * 1_000_000_000.0) as i64;
        Self::from_offset(self.0 - time::Duration::nanoseconds(nanos))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self.0.format(&Rfc3339).map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}

impl Serialize for Timestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let text = self.0.format(&Rfc3339).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&text)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Seam for obtaining the current time.
///
/// # Invariants
/// - `now()` must be monotonically non-decreasing within a single process for
///   [`SystemClock`]; [`FixedClock`] is explicitly allowed to stay constant.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> Timestamp;
}

/// Clock backed by the operating system's wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_offset(OffsetDateTime::now_utc())
    }
}

/// Clock that always returns the same instant; for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub Timestamp);

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions are permitted.")]

    use super::*;

    #[test]
    fn round_trips_rfc3339() {
        let ts = Timestamp::parse("2026-07-28T12:00:00Z").unwrap();
        assert_eq!(ts.to_string(), "2026-07-28T12:00:00Z");
    }

    #[test]
    fn rejects_malformed_timestamp() {
        assert!(Timestamp::parse("not-a-time").is_err());
    }

    #[test]
    fn minus_hours_moves_backward() {
        let now = Timestamp::parse("2026-07-28T12:00:00Z").unwrap();
        let earlier = now.minus_hours(24.0);
        assert_eq!(now.seconds_since(earlier), 24 * 3_600);
    }

    #[test]
    fn fixed_clock_is_constant() {
        let ts = Timestamp::parse("2026-01-01T00:00:00Z").unwrap();
        let clock = FixedClock(ts);
        assert_eq!(clock.now(), ts);
        assert_eq!(clock.now(), ts);
    }
}
