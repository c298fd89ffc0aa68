//! In-memory store.
//!
//! The sensor map sits behind a `RwLock`; each sensor has its own `Mutex` so
//! writers to one sensor never block another. Readers clone a snapshot while
//! holding the sensor lock, so a concurrent trim cannot be observed halfway.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use super::{HistorySource, SensorStore};
use crate::alerting;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    Alert, HarvestRecord, ListingRecord, NutrientAnalysis, Reading, ReadingQuery, Sensor,
    SensorFilter, StatusPatch,
};

// ---

type SensorCell = Arc<Mutex<Sensor>>;

#[derive(Default)]
pub struct MemoryStore {
    sensors: RwLock<HashMap<String, SensorCell>>,
    harvests: RwLock<Vec<HarvestRecord>>,
    listings: RwLock<Vec<ListingRecord>>,
    analyses: RwLock<Vec<NutrientAnalysis>>,
}

impl MemoryStore {
    // ---
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_harvest(&self, record: HarvestRecord) {
        self.harvests.write().await.push(record);
    }

    pub async fn record_listing(&self, record: ListingRecord) {
        self.listings.write().await.push(record);
    }

    pub async fn record_nutrient_analysis(&self, record: NutrientAnalysis) {
        self.analyses.write().await.push(record);
    }

    async fn cell(&self, sensor_id: &str) -> EngineResult<SensorCell> {
        self.sensors
            .read()
            .await
            .get(sensor_id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(sensor_id.to_string()))
    }
}

fn descriptor(sensor: &Sensor) -> Sensor {
    Sensor {
        readings: Default::default(),
        alerts: Vec::new(),
        ..sensor.clone()
    }
}

#[async_trait]
impl SensorStore for MemoryStore {
    // ---
    async fn insert_sensor(&self, sensor: Sensor) -> EngineResult<Sensor> {
        let mut map = self.sensors.write().await;
        if map.contains_key(&sensor.sensor_id) {
            return Err(EngineError::DuplicateSensor(sensor.sensor_id));
        }
        map.insert(sensor.sensor_id.clone(), Arc::new(Mutex::new(sensor.clone())));
        Ok(sensor)
    }

    async fn get_sensor(&self, sensor_id: &str) -> EngineResult<Sensor> {
        let cell = self.cell(sensor_id).await?;
        let sensor = cell.lock().await.clone();
        Ok(sensor)
    }

    async fn list_sensors(&self, filter: &SensorFilter) -> EngineResult<Vec<Sensor>> {
        let cells: Vec<SensorCell> = self.sensors.read().await.values().cloned().collect();
        let mut out = Vec::new();
        for cell in cells {
            let sensor = cell.lock().await;
            if filter.matches(&sensor) {
                out.push(descriptor(&sensor));
            }
        }
        out.sort_by(|a, b| a.sensor_id.cmp(&b.sensor_id));
        Ok(out)
    }

    async fn update_status(&self, sensor_id: &str, patch: &StatusPatch) -> EngineResult<Sensor> {
        let cell = self.cell(sensor_id).await?;
        let mut sensor = cell.lock().await;
        alerting::apply_status_patch(&mut sensor, patch);
        Ok(descriptor(&sensor))
    }

    async fn append_reading(
        &self,
        sensor_id: &str,
        reading: Reading,
    ) -> EngineResult<Option<Alert>> {
        let cell = self.cell(sensor_id).await?;
        let mut sensor = cell.lock().await;
        Ok(alerting::ingest_into(&mut sensor, reading))
    }

    async fn append_alerts(&self, sensor_id: &str, alerts: Vec<Alert>) -> EngineResult<()> {
        let cell = self.cell(sensor_id).await?;
        cell.lock().await.alerts.extend(alerts);
        Ok(())
    }

    async fn readings(&self, sensor_id: &str, query: &ReadingQuery) -> EngineResult<Vec<Reading>> {
        let cell = self.cell(sensor_id).await?;
        let sensor = cell.lock().await;
        Ok(sensor
            .readings
            .iter()
            .rev()
            .filter(|r| query.matches(r))
            .take(query.limit)
            .cloned()
            .collect())
    }

    async fn alerts(&self, sensor_id: &str, resolved: Option<bool>) -> EngineResult<Vec<Alert>> {
        let cell = self.cell(sensor_id).await?;
        let sensor = cell.lock().await;
        Ok(sensor
            .alerts
            .iter()
            .filter(|a| resolved.map_or(true, |r| a.resolved == r))
            .cloned()
            .collect())
    }

    async fn resolve_alert(&self, sensor_id: &str, index: usize) -> EngineResult<()> {
        let cell = self.cell(sensor_id).await?;
        let mut sensor = cell.lock().await;
        match sensor.alerts.get_mut(index) {
            Some(alert) => {
                alert.resolved = true;
                Ok(())
            }
            None => Err(EngineError::AlertNotFound {
                sensor_id: sensor_id.to_string(),
                index,
            }),
        }
    }

    async fn delete_sensor(&self, sensor_id: &str, owner_id: &str) -> EngineResult<()> {
        let mut map = self.sensors.write().await;
        let owner = match map.get(sensor_id) {
            Some(cell) => cell.lock().await.owner_id.clone(),
            None => return Err(EngineError::NotFound(sensor_id.to_string())),
        };
        if owner != owner_id {
            return Err(EngineError::NotOwner {
                sensor_id: sensor_id.to_string(),
                owner_id: owner_id.to_string(),
            });
        }
        map.remove(sensor_id);
        Ok(())
    }
}

#[async_trait]
impl HistorySource for MemoryStore {
    // ---
    async fn harvests(&self, owner_id: &str) -> EngineResult<Vec<HarvestRecord>> {
        Ok(self
            .harvests
            .read()
            .await
            .iter()
            .filter(|h| h.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn listings(&self, owner_id: &str) -> EngineResult<Vec<ListingRecord>> {
        Ok(self
            .listings
            .read()
            .await
            .iter()
            .filter(|l| l.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn nutrient_analyses(&self, owner_id: &str) -> EngineResult<Vec<NutrientAnalysis>> {
        Ok(self
            .analyses
            .read()
            .await
            .iter()
            .filter(|a| a.owner_id == owner_id)
            .cloned()
            .collect())
    }
}
