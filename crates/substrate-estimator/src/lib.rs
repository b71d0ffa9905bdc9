// crates/substrate-estimator/src/lib.rs
// ============================================================================
// Module: Substrate Estimator
// Description: Deterministic derivation of VariableEstimates from observations.
// Purpose: Implement C3 per spec.md §4.3.
// Dependencies: substrate-core, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Given a [`Variable`] and the observation list for its node, this crate
//! derives a [`VariableEstimate`] deterministically: filter by observation
//! type pattern, window by time and count, extract a numeric value from each
//! payload, aggregate, then compute range membership, deviation, and trend.
//! `spec.md` §4.3 says the estimator "never throws to the caller" — the one
//! genuine failure mode kept here, a variable with no [`ComputeSpec`]s at
//! all, is reported per-variable via [`EstimatorError`] rather than aborting
//! a whole evaluation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;

use substrate_core::Aggregation;
use substrate_core::ComputeSpec;
use substrate_core::Observation;
use substrate_core::Timestamp;
use substrate_core::Trend;
use substrate_core::Variable;
use substrate_core::VariableEstimate;
use substrate_core::VariableId;
use substrate_core::VariableRange;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Estimator-specific failure modes (`spec.md` §4.3, §7).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EstimatorError {
    /// A variable has no `ComputeSpec`s, so no estimate can be derived.
    #[error("variable has no compute specs")]
    NoComputeSpecs,
}

// ============================================================================
// SECTION: Observation-Type Pattern Matching
// ============================================================================

/// Returns `true` when `observation_type` matches `pattern`: exact match, or,
/// if `pattern` ends with `.*`, a prefix match on `prefix` or
/// `prefix.<suffix>` (`spec.md` §4.3 step 1).
fn matches_pattern(observation_type: &str, pattern: &str) -> bool {
    pattern.strip_suffix(".*").map_or_else(
        || observation_type == pattern,
        |prefix| observation_type == prefix || observation_type.starts_with(&format!("{prefix}.")),
    )
}

// ============================================================================
// SECTION: Value Extraction
// ============================================================================

/// Field names probed, in priority order, when a payload is an object
/// (`spec.md` §4.3 step 5).
const VALUE_FIELDS: [&str; 7] = ["value", "amount", "score", "hours", "minutes", "duration", "count"];

/// Extracts a numeric value from an observation payload: a bare number, or
/// the first matching field among [`VALUE_FIELDS`] on an object.
fn extract_numeric_value(payload: &serde_json::Value) -> Option<f64> {
    if let Some(number) = payload.as_f64() {
        return Some(number);
    }
    let object = payload.as_object()?;
    VALUE_FIELDS
        .iter()
        .find_map(|field| object.get(*field).and_then(serde_json::Value::as_f64))
}

// ============================================================================
// SECTION: Compute Spec Evaluation
// ============================================================================

/// The result of evaluating a single [`ComputeSpec`].
#[derive(Debug, Clone, Copy, PartialEq)]
struct ComputeSpecResult {
    /// Aggregated value, or `None` if nothing matched or no value extracted.
    value: Option<f64>,
    /// Confidence in `[0, 1]`.
    confidence: f64,
    /// Number of observations that matched the type pattern and window,
    /// before value extraction (used for the "most matches" tiebreak).
    matched_count: usize,
}

/// Evaluates one `ComputeSpec` against `observations`, following the six
/// steps in `spec.md` §4.3: filter by type pattern, window by time, sort
/// descending, apply the count limit, extract values, aggregate, then derive
/// confidence.
fn evaluate_compute_spec(spec: &ComputeSpec, observations: &[Observation], reference_time: Timestamp) -> ComputeSpecResult {
    let mut matched: Vec<&Observation> = observations
        .iter()
        .filter(|obs| spec.observation_type_patterns.iter().any(|pattern| matches_pattern(&obs.type_, pattern)))
        .collect();

    if let Some(hours) = spec.window.and_then(|window| window.hours) {
        let start = reference_time.minus_hours(hours);
        matched.retain(|obs| obs.timestamp >= start);
    }

    matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    let requested_count = spec.window.and_then(|window| window.count);
    if let Some(count) = requested_count {
        matched.truncate(count);
    }

    let matched_count = matched.len();
    if matched_count == 0 {
        return ComputeSpecResult {
            value: None,
            confidence: 0.0,
            matched_count: 0,
        };
    }

    let extracted: Vec<f64> = matched.iter().filter_map(|obs| extract_numeric_value(&obs.payload)).collect();

    let value = match spec.aggregation {
        Aggregation::Latest => extracted.first().copied(),
        Aggregation::Sum => (!extracted.is_empty()).then(|| extracted.iter().sum()),
        Aggregation::Avg => (!extracted.is_empty()).then(|| extracted.iter().sum::<f64>() / extracted.len() as f64),
        Aggregation::Min => extracted.iter().copied().reduce(f64::min),
        Aggregation::Max => extracted.iter().copied().reduce(f64::max),
        Aggregation::Count => Some(matched_count as f64),
    };

    let mut confidence = spec.confidence.unwrap_or(1.0);
    if let Some(requested) = requested_count
        && matched_count < requested
    {
        confidence *= matched_count as f64 / requested as f64;
    }
    if spec.aggregation != Aggregation::Count {
        let extraction_ratio = extracted.len() as f64 / matched_count as f64;
        confidence *= extraction_ratio;
    }
    if value.is_none() {
        confidence = 0.0;
    }

    ComputeSpecResult {
        value,
        confidence: confidence.clamp(0.0, 1.0),
        matched_count,
    }
}

/// Evaluates every `ComputeSpec` on `variable` and resolves a single
/// `(value, confidence)` pair: the highest-confidence result that produced a
/// value, or, if none did, the result with the most matches (`spec.md` §4.3
/// "Multi-spec variable").
fn resolve_value(variable: &Variable, observations: &[Observation], reference_time: Timestamp) -> (Option<f64>, f64) {
    let results: Vec<ComputeSpecResult> = variable
        .compute_specs
        .iter()
        .map(|spec| evaluate_compute_spec(spec, observations, reference_time))
        .collect();

    let best_with_value = results
        .iter()
        .filter(|result| result.value.is_some())
        .max_by(|a, b| a.confidence.total_cmp(&b.confidence));
    if let Some(best) = best_with_value {
        return (best.value, best.confidence);
    }

    results
        .iter()
        .max_by_key(|result| result.matched_count)
        .map_or((None, 0.0), |best| (best.value, best.confidence))
}

// ============================================================================
// SECTION: Range Membership, Deviation, Trend
// ============================================================================

/// The midpoint of a range's effective preferred bounds, falling back to
/// whichever bound is present when only one is set.
fn preferred_center(range: &VariableRange) -> Option<f64> {
    midpoint(range.soft_min.or(range.min), range.soft_max.or(range.max))
}

/// The midpoint of a range's hard bounds.
fn viable_center(range: &VariableRange) -> Option<f64> {
    midpoint(range.min, range.max)
}

/// Resolves a center from two optional bounds, falling back to whichever one
/// is present.
fn midpoint(lower: Option<f64>, upper: Option<f64>) -> Option<f64> {
    match (lower, upper) {
        (Some(low), Some(high)) => Some((low + high) / 2.0),
        (Some(low), None) => Some(low),
        (None, Some(high)) => Some(high),
        (None, None) => None,
    }
}

/// The larger half-span of the viable range to `center` (`spec.md` §4.3
/// deviation step: "normalize by the larger half-span of viable to center").
/// Used as the fallback normalizer on a side whose hard bound is absent.
fn viable_half_span(range: &VariableRange, center: f64) -> Option<f64> {
    match (range.min, range.max) {
        (Some(min), Some(max)) => Some((center - min).abs().max((max - center).abs())),
        (Some(min), None) => Some((center - min).abs()),
        (None, Some(max)) => Some((max - center).abs()),
        (None, None) => None,
    }
}

/// Deviation contribution for `value` on one side of the preferred band
/// (`value` already known to be past `band_edge` on this side). Inside the
/// viable range this scales to 0.5 exactly at `hard_bound` (the viable
/// boundary on this side); beyond it, the remainder scales up to 1.0 over
/// the full viable span. `opposite_bound` supplies the far viable bound for
/// that second stage; `fallback_span` (the larger viable half-span to
/// center) stands in when this side has no hard bound of its own.
fn band_edge_deviation(value: f64, band_edge: f64, hard_bound: Option<f64>, opposite_bound: Option<f64>, viable: &VariableRange, fallback_span: f64) -> f64 {
    let distance = (value - band_edge).abs();
    let inner_span = hard_bound.map_or(fallback_span, |bound| (band_edge - bound).abs());
    if inner_span <= 0.0 {
        return 0.0;
    }
    let ratio = (distance / inner_span).min(1.0);
    if viable.contains_hard(value) {
        return 0.5 * ratio;
    }
    let Some(bound) = hard_bound else { return 1.0 };
    let viable_span = opposite_bound.map_or(inner_span * 2.0, |opposite| (bound - opposite).abs());
    let excess = (value - bound).abs();
    let extra = if viable_span > 0.0 { (excess / viable_span).min(1.0) } else { 1.0 };
    (0.5 + 0.5 * extra).min(1.0)
}

/// Computes deviation in `[0, 1]`: 0 anywhere inside the preferred range (or,
/// absent one, exactly at the viable center), ≈0.5 at the viable boundary,
/// capped at 1 outside the viable range (`spec.md` §4.3).
fn compute_deviation(value: f64, viable: Option<VariableRange>, preferred: Option<VariableRange>) -> f64 {
    let Some(viable) = viable else { return 0.0 };
    let Some(center) = preferred.and_then(|range| preferred_center(&range)).or_else(|| viable_center(&viable)) else {
        return 0.0;
    };
    let fallback_span = viable_half_span(&viable, center).unwrap_or(0.0);

    let (band_low, band_high) = preferred.map_or((center, center), |range| {
        (range.soft_min.or(range.min).unwrap_or(center), range.soft_max.or(range.max).unwrap_or(center))
    });

    if value >= band_low && value <= band_high {
        return 0.0;
    }
    if value < band_low {
        band_edge_deviation(value, band_low, viable.min, viable.max, &viable, fallback_span)
    } else {
        band_edge_deviation(value, band_high, viable.max, viable.min, &viable, fallback_span)
    }
}

/// Computes the directional [`Trend`] between a previous and current value
/// (`spec.md` §4.3).
fn compute_trend(current: f64, previous: f64, viable: Option<VariableRange>, preferred: Option<VariableRange>) -> Trend {
    let viable_span = viable
        .and_then(|range| match (range.min, range.max) {
            (Some(min), Some(max)) => Some((max - min).abs()),
            _ => None,
        })
        .filter(|span| *span > 0.0)
        .unwrap_or(1.0);

    let normalized = (current - previous) / viable_span;
    if normalized.abs() < 0.01 {
        return Trend::Stable;
    }

    let center = preferred
        .and_then(|range| preferred_center(&range))
        .or_else(|| viable.and_then(|range| viable_center(&range)));
    match center {
        Some(center) => {
            if (current - center).abs() < (previous - center).abs() {
                Trend::Improving
            } else {
                Trend::Degrading
            }
        }
        None => {
            if current > previous {
                Trend::Improving
            } else {
                Trend::Degrading
            }
        }
    }
}

// ============================================================================
// SECTION: Public API
// ============================================================================

/// Default lookback, in hours, for recomputing a prior value when `trend` is
/// wanted but no previous estimate was supplied (`spec.md` §4.3 Trend: "a
/// supplied previous estimate or recomputation over an earlier observation
/// window, default 24h").
const DEFAULT_TREND_WINDOW_HOURS: f64 = 24.0;

/// Derives a single [`VariableEstimate`] for `variable` from `observations`
/// (already scoped to the variable's node), relative to `reference_time`.
/// `previous` supplies the prior estimate used to compute [`Trend`]; when
/// `None`, the prior value is instead recomputed by re-running the same
/// compute specs as of [`DEFAULT_TREND_WINDOW_HOURS`] earlier (`spec.md`
/// §4.3).
///
/// # Errors
///
/// Returns [`EstimatorError::NoComputeSpecs`] when `variable.compute_specs`
/// is empty; every other input, including an empty observation list,
/// produces a zero-confidence, valueless estimate rather than an error
/// (`spec.md` §4.3: "the estimator never throws to the caller").
pub fn estimate_variable(
    variable: &Variable,
    observations: &[Observation],
    reference_time: Timestamp,
    previous: Option<&VariableEstimate>,
) -> Result<VariableEstimate, EstimatorError> {
    if variable.compute_specs.is_empty() {
        return Err(EstimatorError::NoComputeSpecs);
    }

    let (value, confidence) = resolve_value(variable, observations, reference_time);
    let in_viable_range = value.is_some_and(|v| variable.viable_range.is_none_or(|range| range.contains_hard(v)));
    let in_preferred_range = value.is_some_and(|v| variable.preferred_range.is_none_or(|range| range.contains_soft(v)));
    let deviation = value.map_or(0.0, |v| compute_deviation(v, variable.viable_range, variable.preferred_range));
    let prior_value = previous.and_then(|estimate| estimate.value).or_else(|| {
        if value.is_none() {
            return None;
        }
        let earlier = reference_time.minus_hours(DEFAULT_TREND_WINDOW_HOURS);
        let as_of_earlier: Vec<Observation> = observations.iter().filter(|obs| obs.timestamp <= earlier).cloned().collect();
        resolve_value(variable, &as_of_earlier, earlier).0
    });
    let trend = match (value, prior_value) {
        (Some(current), Some(prior)) => Some(compute_trend(current, prior, variable.viable_range, variable.preferred_range)),
        _ => None,
    };

    Ok(VariableEstimate {
        variable_id: variable.id.clone(),
        value,
        confidence,
        computed_at: reference_time,
        in_viable_range,
        in_preferred_range,
        deviation,
        trend,
    })
}

/// Derives estimates for every variable in `variables`, each against its own
/// node's slice of `observations_by_node`. Returns a per-variable failure
/// map: most entries are `Ok`, even when zero-confidence, but a variable
/// with no compute specs reports `Err` without affecting any other entry
/// (`spec.md` §4.3).
#[must_use]
pub fn estimate_variables(
    variables: &[Variable],
    observations_by_node: &HashMap<substrate_core::NodeId, Vec<Observation>>,
    reference_time: Timestamp,
    previous: &HashMap<VariableId, VariableEstimate>,
) -> HashMap<VariableId, Result<VariableEstimate, EstimatorError>> {
    let empty = Vec::new();
    variables
        .iter()
        .map(|variable| {
            let observations = observations_by_node.get(&variable.node_id).unwrap_or(&empty);
            let result = estimate_variable(variable, observations, reference_time, previous.get(&variable.id));
            (variable.id.clone(), result)
        })
        .collect()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions are permitted.")]

    use substrate_core::ComputeWindow;
    use substrate_core::NodeId;
    use substrate_core::ObservationId;
    use substrate_core::Provenance;
    use substrate_core::VariableKind;

    use super::*;

    fn obs(id: &str, hours_ago: f64, value: f64, now: Timestamp) -> Observation {
        Observation {
            id: ObservationId::new(id).unwrap(),
            node_id: NodeId::new("n1").unwrap(),
            type_: "health.sleep".to_string(),
            timestamp: now.minus_hours(hours_ago),
            payload: serde_json::json!({ "hours": value }),
            provenance: Provenance {
                source_id: NodeId::new("n1").unwrap(),
                sponsor_id: None,
                method: None,
                confidence: None,
            },
            tags: vec![],
        }
    }

    fn sleep_variable() -> Variable {
        Variable {
            id: VariableId::new("v1").unwrap(),
            node_id: NodeId::new("n1").unwrap(),
            key: "sleep_quality".to_string(),
            title: "Sleep quality".to_string(),
            kind: VariableKind::Continuous,
            unit: Some("hours".to_string()),
            viable_range: Some(VariableRange {
                min: Some(6.0),
                max: Some(10.0),
                soft_min: None,
                soft_max: None,
            }),
            preferred_range: Some(VariableRange {
                min: None,
                max: None,
                soft_min: Some(7.0),
                soft_max: Some(9.0),
            }),
            compute_specs: vec![ComputeSpec {
                observation_type_patterns: vec!["health.sleep".to_string()],
                aggregation: Aggregation::Avg,
                window: Some(ComputeWindow {
                    hours: Some(168.0),
                    count: None,
                }),
                confidence: None,
            }],
        }
    }

    #[test]
    fn scenario_2_average_sleep_quality() {
        let now = Timestamp::parse("2026-07-28T00:00:00Z").unwrap();
        let observations = vec![obs("o1", 24.0, 7.0, now), obs("o2", 48.0, 8.0, now), obs("o3", 72.0, 6.0, now)];
        let estimate = estimate_variable(&sleep_variable(), &observations, now, None).unwrap();
        assert!((estimate.value.unwrap() - 7.0).abs() < f64::EPSILON);
        assert!(estimate.in_viable_range);
        assert!(estimate.in_preferred_range);
        assert!((estimate.deviation - 0.0).abs() < 1e-9);
        assert!((estimate.confidence - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn no_observations_yields_zero_confidence() {
        let now = Timestamp::parse("2026-07-28T00:00:00Z").unwrap();
        let estimate = estimate_variable(&sleep_variable(), &[], now, None).unwrap();
        assert_eq!(estimate.value, None);
        assert!((estimate.confidence - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn no_compute_specs_is_an_error() {
        let mut variable = sleep_variable();
        variable.compute_specs.clear();
        let now = Timestamp::parse("2026-07-28T00:00:00Z").unwrap();
        assert_eq!(estimate_variable(&variable, &[], now, None), Err(EstimatorError::NoComputeSpecs));
    }

    #[test]
    fn value_outside_viable_range_has_high_deviation() {
        let now = Timestamp::parse("2026-07-28T00:00:00Z").unwrap();
        let observations = vec![obs("o1", 1.0, 2.0, now)];
        let estimate = estimate_variable(&sleep_variable(), &observations, now, None).unwrap();
        assert!(!estimate.in_viable_range);
        assert!(estimate.deviation > 0.5);
    }

    #[test]
    fn trend_recomputed_from_earlier_window_when_no_previous_supplied() {
        let now = Timestamp::parse("2026-07-28T00:00:00Z").unwrap();
        let observations = vec![obs("o1", 50.0, 6.0, now), obs("o2", 2.0, 10.0, now)];
        let estimate = estimate_variable(&sleep_variable(), &observations, now, None).unwrap();
        assert!((estimate.value.unwrap() - 8.0).abs() < 1e-9);
        assert_eq!(estimate.trend, Some(Trend::Improving));
    }

    #[test]
    fn trend_stable_below_threshold() {
        let now = Timestamp::parse("2026-07-28T00:00:00Z").unwrap();
        let previous = VariableEstimate {
            variable_id: VariableId::new("v1").unwrap(),
            value: Some(7.0),
            confidence: 1.0,
            computed_at: now.minus_hours(24.0),
            in_viable_range: true,
            in_preferred_range: true,
            deviation: 0.0,
            trend: None,
        };
        let observations = vec![obs("o1", 1.0, 7.001, now)];
        let estimate = estimate_variable(&sleep_variable(), &observations, now, Some(&previous)).unwrap();
        assert_eq!(estimate.trend, Some(Trend::Stable));
    }

    #[test]
    fn matches_pattern_handles_wildcard_and_exact() {
        assert!(matches_pattern("health.sleep", "health.*"));
        assert!(matches_pattern("health", "health.*"));
        assert!(matches_pattern("health.sleep", "health.sleep"));
        assert!(!matches_pattern("health.mood", "health.sleep"));
    }

    #[test]
    fn extract_numeric_value_probes_field_priority() {
        assert_eq!(extract_numeric_value(&serde_json::json!(5.0)), Some(5.0));
        assert_eq!(extract_numeric_value(&serde_json::json!({ "amount": 3.0 })), Some(3.0));
        assert_eq!(extract_numeric_value(&serde_json::json!({ "unrelated": "x" })), None);
    }
}
