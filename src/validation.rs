//! Input validation.
//!
//! Every check runs before any state is touched, and all failing fields are
//! collected into one `EngineError::Validation`.

use crate::error::{EngineError, EngineResult, FieldError};
use crate::models::{
    DeviceMetadata, IngestRequest, Location, MetadataRequest, SensorSpec, SensorSpecRequest,
    StatusPatch, Thresholds,
};

// ---

/// Validate a registration request and produce the typed spec.
pub fn validate_spec(req: SensorSpecRequest) -> EngineResult<SensorSpec> {
    // ---
    let mut errors = Vec::new();

    let sensor_id = required_text(&mut errors, "sensor_id", req.sensor_id);
    let owner_id = required_text(&mut errors, "owner_id", req.owner_id);

    if req.sensor_type.is_none() {
        errors.push(FieldError::new("sensor_type", "is required"));
    }

    match &req.location {
        Some(loc) => check_location(&mut errors, loc),
        None => errors.push(FieldError::new("location", "is required")),
    }

    match &req.thresholds {
        Some(t) => check_thresholds(&mut errors, t),
        None => errors.push(FieldError::new("thresholds", "is required")),
    }

    let metadata = match req.metadata {
        Some(m) => check_metadata(&mut errors, m),
        None => {
            errors.push(FieldError::new("metadata", "is required"));
            None
        }
    };

    match (
        sensor_id,
        owner_id,
        req.sensor_type,
        req.location,
        req.thresholds,
        metadata,
    ) {
        (
            Some(sensor_id),
            Some(owner_id),
            Some(sensor_type),
            Some(location),
            Some(thresholds),
            Some(metadata),
        ) if errors.is_empty() => {
            Ok(SensorSpec {
                sensor_id,
                sensor_type,
                location,
                owner_id,
                thresholds,
                metadata,
            })
        }
        _ => Err(EngineError::Validation(errors)),
    }
}

/// Battery and signal must lie in `0..=100` when provided.
pub fn validate_patch(patch: &StatusPatch) -> EngineResult<()> {
    // ---
    let mut errors = Vec::new();
    for (field, value) in [
        ("battery_level", patch.battery_level),
        ("signal_strength", patch.signal_strength),
    ] {
        if let Some(v) = value {
            if !(0..=100).contains(&v) {
                errors.push(FieldError::new(field, "must be between 0 and 100"));
            }
        }
    }
    into_result(errors)
}

pub fn validate_ingest(req: &IngestRequest) -> EngineResult<()> {
    // ---
    let mut errors = Vec::new();
    if !req.value.is_finite() {
        errors.push(FieldError::new("value", "must be a finite number"));
    }
    if req.unit.trim().is_empty() {
        errors.push(FieldError::new("unit", "is required"));
    }
    if req.metric.trim().is_empty() {
        errors.push(FieldError::new("metric", "is required"));
    }
    into_result(errors)
}

// ---

fn into_result(errors: Vec<FieldError>) -> EngineResult<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(EngineError::Validation(errors))
    }
}

fn required_text(
    errors: &mut Vec<FieldError>,
    field: &str,
    value: Option<String>,
) -> Option<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Some(v),
        _ => {
            errors.push(FieldError::new(field, "is required"));
            None
        }
    }
}

fn check_location(errors: &mut Vec<FieldError>, loc: &Location) {
    if !(-90.0..=90.0).contains(&loc.lat) {
        errors.push(FieldError::new("location.lat", "must be between -90 and 90"));
    }
    if !(-180.0..=180.0).contains(&loc.lon) {
        errors.push(FieldError::new("location.lon", "must be between -180 and 180"));
    }
    if loc.altitude.is_some_and(|a| !a.is_finite()) {
        errors.push(FieldError::new("location.altitude", "must be a finite number"));
    }
}

fn check_thresholds(errors: &mut Vec<FieldError>, t: &Thresholds) {
    if ![t.min, t.max, t.critical].iter().all(|v| v.is_finite()) {
        errors.push(FieldError::new("thresholds", "bounds must be finite numbers"));
        return;
    }
    if t.min >= t.max {
        errors.push(FieldError::new("thresholds.min", "must be less than max"));
    } else if t.contains(t.critical) {
        errors.push(FieldError::new(
            "thresholds.critical",
            "must lie outside the [min, max] range",
        ));
    }
}

fn check_metadata(errors: &mut Vec<FieldError>, m: MetadataRequest) -> Option<DeviceMetadata> {
    let manufacturer = required_text(errors, "metadata.manufacturer", m.manufacturer);
    let model = required_text(errors, "metadata.model", m.model);
    let firmware = required_text(errors, "metadata.firmware", m.firmware);
    if m.installed_at.is_none() {
        errors.push(FieldError::new("metadata.installed_at", "is required"));
    }
    if m.calibrated_at.is_none() {
        errors.push(FieldError::new("metadata.calibrated_at", "is required"));
    }

    Some(DeviceMetadata {
        manufacturer: manufacturer?,
        model: model?,
        firmware: firmware?,
        installed_at: m.installed_at?,
        calibrated_at: m.calibrated_at?,
    })
}
