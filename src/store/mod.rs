//! Persistence collaborators.
//!
//! `SensorStore` owns sensors with their readings and alerts; every mutating
//! method is atomic per sensor. `HistorySource` is a read-only view of farm
//! records used by optimization. Two backends implement both: an in-memory
//! store and PostgreSQL.

use async_trait::async_trait;

use crate::error::EngineResult;
use crate::models::{
    Alert, HarvestRecord, ListingRecord, NutrientAnalysis, Reading, ReadingQuery, Sensor,
    SensorFilter, StatusPatch,
};

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

// ---

#[async_trait]
pub trait SensorStore: Send + Sync {
    // ---
    /// Persist a newly registered sensor. Fails with `DuplicateSensor` when
    /// the ID is taken.
    async fn insert_sensor(&self, sensor: Sensor) -> EngineResult<Sensor>;

    /// Full snapshot: descriptor, buffered readings and alerts.
    async fn get_sensor(&self, sensor_id: &str) -> EngineResult<Sensor>;

    /// Descriptors only; `readings` and `alerts` are left empty.
    async fn list_sensors(&self, filter: &SensorFilter) -> EngineResult<Vec<Sensor>>;

    /// Apply a validated patch and append the resulting status alerts.
    async fn update_status(&self, sensor_id: &str, patch: &StatusPatch) -> EngineResult<Sensor>;

    /// Append a reading, trim the buffer, and persist any threshold alert,
    /// all under the sensor's lock.
    async fn append_reading(
        &self,
        sensor_id: &str,
        reading: Reading,
    ) -> EngineResult<Option<Alert>>;

    async fn append_alerts(&self, sensor_id: &str, alerts: Vec<Alert>) -> EngineResult<()>;

    /// Newest `query.limit` readings within the range, newest first.
    async fn readings(&self, sensor_id: &str, query: &ReadingQuery) -> EngineResult<Vec<Reading>>;

    /// Alerts in creation order, optionally filtered on `resolved`.
    async fn alerts(&self, sensor_id: &str, resolved: Option<bool>) -> EngineResult<Vec<Alert>>;

    /// Mark the alert at `index` (creation order) resolved.
    async fn resolve_alert(&self, sensor_id: &str, index: usize) -> EngineResult<()>;

    /// Remove a sensor and all of its readings and alerts.
    async fn delete_sensor(&self, sensor_id: &str, owner_id: &str) -> EngineResult<()>;
}

#[async_trait]
pub trait HistorySource: Send + Sync {
    async fn harvests(&self, owner_id: &str) -> EngineResult<Vec<HarvestRecord>>;
    async fn listings(&self, owner_id: &str) -> EngineResult<Vec<ListingRecord>>;
    async fn nutrient_analyses(&self, owner_id: &str) -> EngineResult<Vec<NutrientAnalysis>>;
}
