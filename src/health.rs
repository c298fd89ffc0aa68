//! Sensor health scoring and rule-based maintenance prediction.
//!
//! Both are plain functions over a `Sensor` snapshot. The prediction is a
//! fixed rule cascade; rule order matters because the later rule overwrites
//! the issue text while combining severity, probability and time-to-failure
//! monotonically.

use crate::alerting::{LOW_BATTERY, POOR_SIGNAL};
use crate::models::{
    HealthSummary, MaintenancePrediction, RiskLevel, Sensor, SensorHealth, SensorStatus, Severity,
};

// ---

const HEALTHY_DAYS: u32 = 365;
const SIGNAL_DAYS: u32 = 30;

/// Composite 0..=100 health score.
///
/// Starts at 100 and subtracts penalties for battery, signal, operational
/// status and each unresolved alert, clamping at 0.
pub fn health_score(sensor: &Sensor) -> u8 {
    // ---
    let mut score: i64 = 100;

    score -= match sensor.battery_level {
        b if b < LOW_BATTERY => 30,
        b if b < 50 => 15,
        _ => 0,
    };

    score -= match sensor.signal_strength {
        s if s < POOR_SIGNAL => 25,
        s if s < 70 => 10,
        _ => 0,
    };

    score -= match sensor.status {
        SensorStatus::Error => 50,
        SensorStatus::Maintenance => 20,
        SensorStatus::Active | SensorStatus::Inactive => 0,
    };

    score -= 5 * sensor.unresolved_alerts().count() as i64;

    score.clamp(0, 100) as u8
}

pub fn risk_level(score: u8) -> RiskLevel {
    match score {
        80..=u8::MAX => RiskLevel::Low,
        60..=79 => RiskLevel::Medium,
        40..=59 => RiskLevel::High,
        _ => RiskLevel::Critical,
    }
}

pub fn sensor_health(sensor: &Sensor) -> SensorHealth {
    let score = health_score(sensor);
    SensorHealth {
        sensor_id: sensor.sensor_id.clone(),
        health_score: score,
        risk_level: risk_level(score),
    }
}

/// Rule cascade over battery then signal.
pub fn predict_maintenance(sensor: &Sensor) -> MaintenancePrediction {
    // ---
    let mut prediction = MaintenancePrediction {
        sensor_id: sensor.sensor_id.clone(),
        issue: "No issues detected".to_string(),
        probability: 0,
        days_to_failure: HEALTHY_DAYS,
        severity: Severity::Low,
        recommendations: Vec::new(),
        confidence: 0,
    };

    if sensor.battery_level < LOW_BATTERY {
        prediction.issue = "Low battery level".to_string();
        prediction.probability = 90;
        prediction.days_to_failure = (u32::from(sensor.battery_level) / 2).max(1);
        prediction.severity = Severity::Critical;
        prediction
            .recommendations
            .push("Replace battery immediately".to_string());
        prediction.confidence = 95;
    }

    if sensor.signal_strength < POOR_SIGNAL {
        prediction.issue = "Poor signal strength".to_string();
        prediction.probability = prediction.probability.max(70);
        prediction.days_to_failure = prediction.days_to_failure.min(SIGNAL_DAYS);
        prediction.severity = if prediction.severity == Severity::Critical {
            Severity::Critical
        } else {
            Severity::High
        };
        prediction.recommendations.extend([
            "Check antenna connection".to_string(),
            "Move sensor closer to gateway".to_string(),
        ]);
        prediction.confidence = prediction.confidence.max(85);
    }

    prediction
}

/// Fold one sensor into an owner-level summary.
pub fn accumulate(summary: &mut HealthSummary, sensor: &Sensor) {
    // ---
    summary.total += 1;
    match sensor.status {
        SensorStatus::Active => summary.active += 1,
        SensorStatus::Maintenance => summary.maintenance_needed += 1,
        SensorStatus::Error => summary.error += 1,
        SensorStatus::Inactive => {}
    }
    if sensor.battery_level < LOW_BATTERY {
        summary.low_battery += 1;
    }
    if sensor.signal_strength < POOR_SIGNAL {
        summary.poor_signal += 1;
    }
    for alert in sensor.unresolved_alerts() {
        summary.unresolved_alerts += 1;
        if alert.severity == Severity::Critical {
            summary.critical_alerts += 1;
        }
    }
}
