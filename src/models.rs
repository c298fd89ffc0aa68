//! Data models for the telemetry engine.
//!
//! `Sensor` is the aggregate root: it owns its reading buffer and alert list.
//! The transient result types (`AnomalyFinding`, `MaintenancePrediction`,
//! `OptimizationResult`) are produced fresh per call and handed to the caller.

use std::{collections::VecDeque, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---

/// Implements `as_str`, `Display` and `FromStr` for a closed, lowercase enum
/// so it can be stored as TEXT and parsed back.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!("unknown {} '{}'", stringify!($name), other)),
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorType {
    Soil,
    Weather,
    Crop,
    Equipment,
    Water,
    Air,
}

text_enum!(SensorType {
    Soil => "soil",
    Weather => "weather",
    Crop => "crop",
    Equipment => "equipment",
    Water => "water",
    Air => "air",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorStatus {
    #[default]
    Active,
    Inactive,
    Maintenance,
    Error,
}

text_enum!(SensorStatus {
    Active => "active",
    Inactive => "inactive",
    Maintenance => "maintenance",
    Error => "error",
});

/// Reading quality tag. Defaults to `good` when the caller omits it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Excellent,
    #[default]
    Good,
    Fair,
    Poor,
}

text_enum!(Quality {
    Excellent => "excellent",
    Good => "good",
    Fair => "fair",
    Poor => "poor",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    Threshold,
    Battery,
    Signal,
    Maintenance,
    Anomaly,
}

text_enum!(AlertType {
    Threshold => "threshold",
    Battery => "battery",
    Signal => "signal",
    Maintenance => "maintenance",
    Anomaly => "anomaly",
});

/// Severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

text_enum!(Severity {
    Low => "low",
    Medium => "medium",
    High => "high",
    Critical => "critical",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalyKind {
    Spike,
    Drop,
    Trend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationKind {
    Irrigation,
    Fertilizer,
    Harvest,
}

/// Coarse risk bucket derived from a health score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

// ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_id: Option<String>,
}

/// Alerting bounds. `critical` sits outside `[min, max]` on the side whose
/// deviation is catastrophic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub min: f64,
    pub max: f64,
    pub critical: f64,
}

impl Thresholds {
    // ---
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// True when `value` lies past the critical bound, on whichever side of
    /// the normal range the critical bound was configured.
    pub fn is_beyond_critical(&self, value: f64) -> bool {
        if self.critical >= self.max {
            value > self.critical
        } else {
            value < self.critical
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceMetadata {
    pub manufacturer: String,
    pub model: String,
    pub firmware: String,
    pub installed_at: DateTime<Utc>,
    pub calibrated_at: DateTime<Utc>,
}

/// A single telemetry sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub unit: String,
    pub metric: String,
    pub quality: Quality,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub alert_type: AlertType,
    pub message: String,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
    pub resolved: bool,
}

impl Alert {
    // ---
    pub fn new(alert_type: AlertType, severity: Severity, message: impl Into<String>) -> Self {
        Alert {
            id: Uuid::new_v4(),
            alert_type,
            message: message.into(),
            severity,
            timestamp: Utc::now(),
            resolved: false,
        }
    }
}

/// Registered sensor together with its buffered readings and alerts.
#[derive(Debug, Clone, Serialize)]
pub struct Sensor {
    pub sensor_id: String,
    pub sensor_type: SensorType,
    pub location: Location,
    pub owner_id: String,
    pub status: SensorStatus,
    pub battery_level: u8,
    pub signal_strength: u8,
    pub thresholds: Thresholds,
    pub metadata: DeviceMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub readings: VecDeque<Reading>,
    #[serde(skip)]
    pub alerts: Vec<Alert>,
}

impl Sensor {
    // ---
    /// Build a freshly registered sensor from an already validated spec.
    pub fn from_spec(spec: SensorSpec) -> Self {
        let now = Utc::now();
        Sensor {
            sensor_id: spec.sensor_id,
            sensor_type: spec.sensor_type,
            location: spec.location,
            owner_id: spec.owner_id,
            status: SensorStatus::Active,
            battery_level: 100,
            signal_strength: 100,
            thresholds: spec.thresholds,
            metadata: spec.metadata,
            created_at: now,
            updated_at: now,
            readings: VecDeque::new(),
            alerts: Vec::new(),
        }
    }

    pub fn unresolved_alerts(&self) -> impl Iterator<Item = &Alert> {
        self.alerts.iter().filter(|a| !a.resolved)
    }

    /// Copy of the most recent `n` readings, oldest first.
    pub fn recent_readings(&self, n: usize) -> Vec<Reading> {
        let skip = self.readings.len().saturating_sub(n);
        self.readings.iter().skip(skip).cloned().collect()
    }
}

// --- Requests ---

/// Registration request. Every field is optional at the wire level so that
/// validation can report all missing fields at once.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SensorSpecRequest {
    pub sensor_id: Option<String>,
    pub sensor_type: Option<SensorType>,
    pub location: Option<Location>,
    pub owner_id: Option<String>,
    pub thresholds: Option<Thresholds>,
    pub metadata: Option<MetadataRequest>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetadataRequest {
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub firmware: Option<String>,
    pub installed_at: Option<DateTime<Utc>>,
    pub calibrated_at: Option<DateTime<Utc>>,
}

/// Validated registration input.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorSpec {
    pub sensor_id: String,
    pub sensor_type: SensorType,
    pub location: Location,
    pub owner_id: String,
    pub thresholds: Thresholds,
    pub metadata: DeviceMetadata,
}

/// Partial status update; only provided fields are applied.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusPatch {
    pub status: Option<SensorStatus>,
    pub battery_level: Option<i64>,
    pub signal_strength: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestRequest {
    pub value: f64,
    pub unit: String,
    pub metric: String,
    #[serde(default)]
    pub quality: Option<Quality>,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn contains(&self, loc: &Location) -> bool {
        (self.min_lat..=self.max_lat).contains(&loc.lat)
            && (self.min_lon..=self.max_lon).contains(&loc.lon)
    }
}

/// Owner-scoped sensor query.
#[derive(Debug, Clone, Default)]
pub struct SensorFilter {
    pub owner_id: Option<String>,
    pub sensor_type: Option<SensorType>,
    pub status: Option<SensorStatus>,
    pub bbox: Option<BoundingBox>,
}

impl SensorFilter {
    pub fn matches(&self, sensor: &Sensor) -> bool {
        self.owner_id.as_ref().map_or(true, |o| &sensor.owner_id == o)
            && self.sensor_type.map_or(true, |t| sensor.sensor_type == t)
            && self.status.map_or(true, |s| sensor.status == s)
            && self.bbox.map_or(true, |b| b.contains(&sensor.location))
    }
}

/// Reading query: newest `limit` readings inside the optional time range.
#[derive(Debug, Clone, Default)]
pub struct ReadingQuery {
    pub limit: usize,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl ReadingQuery {
    pub fn matches(&self, reading: &Reading) -> bool {
        self.start.map_or(true, |s| reading.timestamp >= s)
            && self.end.map_or(true, |e| reading.timestamp <= e)
    }
}

// --- Results ---

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyFinding {
    pub sensor_id: String,
    pub metric: String,
    pub kind: AnomalyKind,
    pub severity: Severity,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub expected_value: f64,
    pub actual_value: f64,
    pub confidence: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaintenancePrediction {
    pub sensor_id: String,
    pub issue: String,
    pub probability: u8,
    pub days_to_failure: u32,
    pub severity: Severity,
    pub recommendations: Vec<String>,
    pub confidence: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationResult {
    pub kind: OptimizationKind,
    pub current_efficiency: f64,
    pub optimized_efficiency: f64,
    pub improvement: f64,
    pub recommendations: Vec<String>,
    pub estimated_savings: f64,
    pub implementation_cost: f64,
    pub roi: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorHealth {
    pub sensor_id: String,
    pub health_score: u8,
    pub risk_level: RiskLevel,
}

/// Owner-level rollup across all of an owner's sensors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HealthSummary {
    pub total: usize,
    pub active: usize,
    pub maintenance_needed: usize,
    pub error: usize,
    pub low_battery: usize,
    pub poor_signal: usize,
    pub unresolved_alerts: usize,
    pub critical_alerts: usize,
}

// --- Farm history (read-only inputs to optimization) ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct HarvestRecord {
    pub owner_id: String,
    pub crop: String,
    pub harvested_at: DateTime<Utc>,
    pub quantity_kg: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ListingRecord {
    pub owner_id: String,
    pub crop: String,
    pub listed_at: DateTime<Utc>,
    pub price_per_kg: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct NutrientAnalysis {
    pub owner_id: String,
    pub field_id: Option<String>,
    pub analyzed_at: DateTime<Utc>,
    pub nitrogen: f64,
    pub phosphorus: f64,
    pub potassium: f64,
}
