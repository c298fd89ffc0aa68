//! Windowed anomaly detection.
//!
//! Three independent passes run over the most recent readings: spike and
//! drop compare each interior point with the mean of its two neighbours, and
//! trend fits an ordinary-least-squares slope over the whole window. No
//! model, no training data; detection is purely local and statistical.
//!
//! The multipliers and slope cut-offs below are carried over unchanged from
//! the platform's rule set. They are calibration targets, not derived values.

use crate::models::{AnomalyFinding, AnomalyKind, Reading, Severity, Thresholds};

// ---

pub const DEFAULT_WINDOW: usize = 24;

const MIN_POINTS: usize = 3;
const MIN_TREND_POINTS: usize = 5;

const SPIKE_NEIGHBOR_FACTOR: f64 = 2.0;
const SPIKE_MAX_FACTOR: f64 = 1.5;
const DROP_NEIGHBOR_FACTOR: f64 = 0.5;
const DROP_MIN_FACTOR: f64 = 0.5;
const TREND_SLOPE: f64 = 0.1;
const STEEP_TREND_SLOPE: f64 = 0.3;

const NEIGHBOR_CONFIDENCE: u8 = 85;
const TREND_CONFIDENCE: u8 = 70;

/// Run all passes over `window` (oldest first).
///
/// Findings are ordered spike pass, then drop pass, then at most one trend
/// finding. Fewer than three readings yields an empty list.
pub fn detect(sensor_id: &str, thresholds: &Thresholds, window: &[Reading]) -> Vec<AnomalyFinding> {
    // ---
    if window.len() < MIN_POINTS {
        return Vec::new();
    }

    let values: Vec<f64> = window.iter().map(|r| r.value).collect();

    let mut findings = spikes(sensor_id, thresholds, window, &values);
    findings.extend(drops(sensor_id, thresholds, window, &values));
    findings.extend(trend(sensor_id, window, &values));

    tracing::debug!(
        sensor_id,
        points = values.len(),
        findings = findings.len(),
        "anomaly scan"
    );
    findings
}

fn spikes(
    sensor_id: &str,
    t: &Thresholds,
    window: &[Reading],
    values: &[f64],
) -> Vec<AnomalyFinding> {
    // ---
    interior(values)
        .filter(|&(_, v, avg)| v > SPIKE_NEIGHBOR_FACTOR * avg && v > SPIKE_MAX_FACTOR * t.max)
        .map(|(i, v, avg)| {
            let severity = if v > t.critical { Severity::Critical } else { Severity::High };
            let r = &window[i];
            AnomalyFinding {
                sensor_id: sensor_id.to_string(),
                metric: r.metric.clone(),
                kind: AnomalyKind::Spike,
                severity,
                description: format!(
                    "Sudden spike in {}: {} {} against neighbouring average {:.2}",
                    r.metric, v, r.unit, avg
                ),
                timestamp: r.timestamp,
                expected_value: avg,
                actual_value: v,
                confidence: NEIGHBOR_CONFIDENCE,
            }
        })
        .collect()
}

fn drops(
    sensor_id: &str,
    t: &Thresholds,
    window: &[Reading],
    values: &[f64],
) -> Vec<AnomalyFinding> {
    // ---
    interior(values)
        .filter(|&(_, v, avg)| v < DROP_NEIGHBOR_FACTOR * avg && v < DROP_MIN_FACTOR * t.min)
        .map(|(i, v, avg)| {
            let severity = if v < t.critical { Severity::Critical } else { Severity::High };
            let r = &window[i];
            AnomalyFinding {
                sensor_id: sensor_id.to_string(),
                metric: r.metric.clone(),
                kind: AnomalyKind::Drop,
                severity,
                description: format!(
                    "Sudden drop in {}: {} {} against neighbouring average {:.2}",
                    r.metric, v, r.unit, avg
                ),
                timestamp: r.timestamp,
                expected_value: avg,
                actual_value: v,
                confidence: NEIGHBOR_CONFIDENCE,
            }
        })
        .collect()
}

fn trend(sensor_id: &str, window: &[Reading], values: &[f64]) -> Option<AnomalyFinding> {
    // ---
    if values.len() < MIN_TREND_POINTS {
        return None;
    }

    let m = slope(values)?;
    if m.abs() <= TREND_SLOPE {
        return None;
    }

    let direction = if m > 0.0 { "increasing" } else { "decreasing" };
    let severity = if m.abs() > STEEP_TREND_SLOPE { Severity::High } else { Severity::Medium };
    let first = values[0];
    let last = values[values.len() - 1];
    let latest = &window[window.len() - 1];

    Some(AnomalyFinding {
        sensor_id: sensor_id.to_string(),
        metric: latest.metric.clone(),
        kind: AnomalyKind::Trend,
        severity,
        description: format!(
            "Sustained {} trend in {} over {} readings (slope {:.3} per reading)",
            direction,
            latest.metric,
            values.len(),
            m
        ),
        timestamp: latest.timestamp,
        expected_value: first,
        actual_value: last,
        confidence: TREND_CONFIDENCE,
    })
}

/// `(index, value, mean of neighbours)` for each interior point.
fn interior(values: &[f64]) -> impl Iterator<Item = (usize, f64, f64)> + '_ {
    values
        .windows(3)
        .enumerate()
        .map(|(i, w)| (i + 1, w[1], (w[0] + w[2]) / 2.0))
}

/// Closed-form least-squares slope of `values` against `0..n`.
/// `None` when the denominator vanishes (fewer than two points).
pub fn slope(values: &[f64]) -> Option<f64> {
    // ---
    let n = values.len() as f64;
    let (mut sx, mut sy, mut sxy, mut sxx) = (0.0, 0.0, 0.0, 0.0);
    for (i, &y) in values.iter().enumerate() {
        let x = i as f64;
        sx += x;
        sy += y;
        sxy += x * y;
        sxx += x * x;
    }

    let denom = n * sxx - sx * sx;
    if denom == 0.0 {
        return None;
    }
    Some((n * sxy - sx * sy) / denom)
}
