//! Reading buffer discipline and write-time alerting.
//!
//! Every ingested reading is appended to a bounded FIFO and checked against
//! the sensor's thresholds. Status updates are checked for low battery and
//! weak signal. All functions here are pure over the sensor value; callers
//! hold the per-sensor lock.

use std::collections::VecDeque;

use chrono::Utc;

use crate::models::{Alert, AlertType, Reading, Sensor, Severity, StatusPatch, Thresholds};

// ---

/// Maximum readings retained per sensor.
pub const BUFFER_CAPACITY: usize = 1000;

pub const LOW_BATTERY: u8 = 20;
pub const POOR_SIGNAL: u8 = 30;

/// Append `reading`, evicting the oldest entries until the buffer is back at
/// `capacity`.
pub fn push_bounded(buffer: &mut VecDeque<Reading>, reading: Reading, capacity: usize) {
    // ---
    buffer.push_back(reading);
    while buffer.len() > capacity {
        buffer.pop_front();
    }
}

/// Threshold check for a single value. Returns `None` when the value lies
/// within `[min, max]`.
pub fn check_threshold(thresholds: &Thresholds, value: f64, unit: &str) -> Option<Alert> {
    // ---
    if thresholds.contains(value) {
        return None;
    }

    let severity = if thresholds.is_beyond_critical(value) {
        Severity::Critical
    } else {
        Severity::High
    };

    let message = format!(
        "Value {} {} is outside normal range ({}-{} {})",
        value, unit, thresholds.min, thresholds.max, unit
    );
    Some(Alert::new(AlertType::Threshold, severity, message))
}

/// Append a reading to the sensor and raise a threshold alert if needed.
///
/// The trim and the threshold evaluation happen together so that callers
/// holding the sensor lock observe them as one step.
pub fn ingest_into(sensor: &mut Sensor, reading: Reading) -> Option<Alert> {
    // ---
    let alert = check_threshold(&sensor.thresholds, reading.value, &reading.unit);
    push_bounded(&mut sensor.readings, reading, BUFFER_CAPACITY);
    if let Some(alert) = &alert {
        sensor.alerts.push(alert.clone());
    }
    sensor.updated_at = Utc::now();
    alert
}

/// Alerts implied by the given battery and signal levels. Each qualifying
/// condition yields its own alert; prior unresolved alerts are not consulted.
pub fn status_alerts(battery_level: u8, signal_strength: u8) -> Vec<Alert> {
    // ---
    let mut alerts = Vec::new();
    if battery_level < LOW_BATTERY {
        alerts.push(Alert::new(
            AlertType::Battery,
            Severity::Critical,
            format!("Low battery level: {battery_level}%"),
        ));
    }
    if signal_strength < POOR_SIGNAL {
        alerts.push(Alert::new(
            AlertType::Signal,
            Severity::High,
            format!("Poor signal strength: {signal_strength}%"),
        ));
    }
    alerts
}

/// Apply a validated patch and append the resulting status alerts.
/// Returns the alerts that were appended.
pub fn apply_status_patch(sensor: &mut Sensor, patch: &StatusPatch) -> Vec<Alert> {
    // ---
    if let Some(status) = patch.status {
        sensor.status = status;
    }
    if let Some(level) = patch.battery_level {
        sensor.battery_level = level.clamp(0, 100) as u8;
    }
    if let Some(level) = patch.signal_strength {
        sensor.signal_strength = level.clamp(0, 100) as u8;
    }
    sensor.updated_at = Utc::now();

    let alerts = status_alerts(sensor.battery_level, sensor.signal_strength);
    sensor.alerts.extend(alerts.iter().cloned());
    alerts
}
