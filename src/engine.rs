//! Telemetry engine: the inbound operation surface.
//!
//! The engine holds no state of its own. Its collaborators are injected at
//! construction, every call validates before touching storage, and the
//! analytics run as pure functions over a snapshot taken from the store.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::alerting::{BUFFER_CAPACITY, LOW_BATTERY, POOR_SIGNAL};
use crate::anomaly;
use crate::error::EngineResult;
use crate::health;
use crate::models::{
    Alert, AlertType, AnomalyFinding, HealthSummary, IngestRequest, MaintenancePrediction,
    OptimizationResult, Reading, ReadingQuery, Sensor, SensorFilter, SensorHealth,
    SensorSpecRequest, SensorType, StatusPatch,
};
use crate::optimize;
use crate::store::{HistorySource, SensorStore};
use crate::validation;

// ---

pub const DEFAULT_READING_LIMIT: usize = 100;

#[derive(Clone)]
pub struct TelemetryEngine {
    store: Arc<dyn SensorStore>,
    history: Arc<dyn HistorySource>,
    default_window: usize,
}

impl TelemetryEngine {
    // ---
    pub fn new(store: Arc<dyn SensorStore>, history: Arc<dyn HistorySource>) -> Self {
        TelemetryEngine {
            store,
            history,
            default_window: anomaly::DEFAULT_WINDOW,
        }
    }

    /// Override the detector window used when the caller does not pass one.
    pub fn with_default_window(mut self, window: usize) -> Self {
        self.default_window = window;
        self
    }

    // --- Registry ---

    pub async fn register(&self, req: SensorSpecRequest) -> EngineResult<Sensor> {
        // ---
        let spec = validation::validate_spec(req)?;
        let sensor = self.store.insert_sensor(Sensor::from_spec(spec)).await?;
        info!(
            sensor_id = %sensor.sensor_id,
            owner_id = %sensor.owner_id,
            sensor_type = %sensor.sensor_type,
            "sensor registered"
        );
        Ok(sensor)
    }

    pub async fn get_sensor(&self, sensor_id: &str) -> EngineResult<Sensor> {
        self.store.get_sensor(sensor_id).await
    }

    pub async fn list_sensors(&self, filter: &SensorFilter) -> EngineResult<Vec<Sensor>> {
        self.store.list_sensors(filter).await
    }

    pub async fn update_status(&self, sensor_id: &str, patch: StatusPatch) -> EngineResult<Sensor> {
        // ---
        validation::validate_patch(&patch)?;
        let sensor = self.store.update_status(sensor_id, &patch).await?;
        if sensor.battery_level < LOW_BATTERY || sensor.signal_strength < POOR_SIGNAL {
            warn!(
                sensor_id,
                battery = sensor.battery_level,
                signal = sensor.signal_strength,
                "status update raised device alerts"
            );
        }
        Ok(sensor)
    }

    pub async fn delete_sensor(&self, sensor_id: &str, owner_id: &str) -> EngineResult<()> {
        self.store.delete_sensor(sensor_id, owner_id).await?;
        info!(sensor_id, owner_id, "sensor deleted");
        Ok(())
    }

    // --- Readings & alerts ---

    /// Append a reading timestamped now. A threshold violation is recorded as
    /// an alert in the same step; the reading itself is still returned.
    pub async fn ingest(&self, sensor_id: &str, req: IngestRequest) -> EngineResult<Reading> {
        // ---
        validation::validate_ingest(&req)?;
        let reading = Reading {
            timestamp: Utc::now(),
            value: req.value,
            unit: req.unit,
            metric: req.metric,
            quality: req.quality.unwrap_or_default(),
        };

        match self.store.append_reading(sensor_id, reading.clone()).await? {
            Some(alert) => warn!(sensor_id, severity = %alert.severity, "{}", alert.message),
            None => debug!(
                sensor_id,
                value = reading.value,
                metric = %reading.metric,
                "reading ingested"
            ),
        }
        Ok(reading)
    }

    pub async fn list_readings(
        &self,
        sensor_id: &str,
        limit: Option<usize>,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> EngineResult<Vec<Reading>> {
        // ---
        let query = ReadingQuery {
            limit: limit.unwrap_or(DEFAULT_READING_LIMIT).min(BUFFER_CAPACITY),
            start,
            end,
        };
        self.store.readings(sensor_id, &query).await
    }

    pub async fn list_alerts(
        &self,
        sensor_id: &str,
        resolved: Option<bool>,
    ) -> EngineResult<Vec<Alert>> {
        self.store.alerts(sensor_id, resolved).await
    }

    pub async fn resolve_alert(&self, sensor_id: &str, index: usize) -> EngineResult<()> {
        self.store.resolve_alert(sensor_id, index).await?;
        info!(sensor_id, index, "alert resolved");
        Ok(())
    }

    // --- Analytics ---

    /// Scan the most recent `window` readings. With `persist`, each finding is
    /// also recorded as an `anomaly` alert on the sensor.
    pub async fn detect_anomalies(
        &self,
        sensor_id: &str,
        window: Option<usize>,
        persist: bool,
    ) -> EngineResult<Vec<AnomalyFinding>> {
        // ---
        let sensor = self.store.get_sensor(sensor_id).await?;
        let window = window.unwrap_or(self.default_window);
        let recent = sensor.recent_readings(window);
        let findings = anomaly::detect(&sensor.sensor_id, &sensor.thresholds, &recent);

        if persist && !findings.is_empty() {
            let alerts = findings
                .iter()
                .map(|f| Alert::new(AlertType::Anomaly, f.severity, f.description.clone()))
                .collect();
            self.store.append_alerts(sensor_id, alerts).await?;
            info!(sensor_id, count = findings.len(), "anomaly findings recorded as alerts");
        }
        Ok(findings)
    }

    pub async fn predict_maintenance(
        &self,
        sensor_id: &str,
    ) -> EngineResult<MaintenancePrediction> {
        let sensor = self.store.get_sensor(sensor_id).await?;
        Ok(health::predict_maintenance(&sensor))
    }

    pub async fn sensor_health(&self, sensor_id: &str) -> EngineResult<SensorHealth> {
        let sensor = self.store.get_sensor(sensor_id).await?;
        Ok(health::sensor_health(&sensor))
    }

    /// Best-effort rollup: a sensor whose snapshot cannot be loaded is logged
    /// and left out rather than failing the whole summary.
    pub async fn health_summary(&self, owner_id: &str) -> EngineResult<HealthSummary> {
        // ---
        let filter = SensorFilter {
            owner_id: Some(owner_id.to_string()),
            ..Default::default()
        };

        let mut summary = HealthSummary::default();
        for descriptor in self.store.list_sensors(&filter).await? {
            match self.store.get_sensor(&descriptor.sensor_id).await {
                Ok(sensor) => health::accumulate(&mut summary, &sensor),
                Err(e) => warn!(
                    sensor_id = %descriptor.sensor_id,
                    owner_id,
                    "excluding sensor from health summary: {}",
                    e
                ),
            }
        }
        Ok(summary)
    }

    // --- Optimization ---

    pub async fn optimize_irrigation(
        &self,
        owner_id: &str,
    ) -> EngineResult<Option<OptimizationResult>> {
        let soil = self.soil_sensors(owner_id).await?;
        Ok(optimize::optimize_irrigation(&soil))
    }

    pub async fn optimize_fertilizer(
        &self,
        owner_id: &str,
    ) -> EngineResult<Option<OptimizationResult>> {
        let soil = self.soil_sensors(owner_id).await?;
        let analyses = self.history.nutrient_analyses(owner_id).await?;
        Ok(optimize::optimize_fertilizer(&soil, &analyses))
    }

    pub async fn optimize_harvest(
        &self,
        owner_id: &str,
    ) -> EngineResult<Option<OptimizationResult>> {
        let harvests = self.history.harvests(owner_id).await?;
        let listings = self.history.listings(owner_id).await?;
        Ok(optimize::optimize_harvest(&harvests, &listings))
    }

    async fn soil_sensors(&self, owner_id: &str) -> EngineResult<Vec<Sensor>> {
        let filter = SensorFilter {
            owner_id: Some(owner_id.to_string()),
            sensor_type: Some(SensorType::Soil),
            ..Default::default()
        };
        self.store.list_sensors(&filter).await
    }
}
