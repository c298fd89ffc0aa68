//! PostgreSQL store.
//!
//! Per-sensor serialization uses `SELECT ... FOR UPDATE` on the sensor row
//! inside a transaction, so append, trim and alert insertion commit together.
//! Reading order is insertion order (`seq`), not timestamp order.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use super::{HistorySource, SensorStore};
use crate::alerting::{self, BUFFER_CAPACITY};
use crate::error::{EngineError, EngineResult};
use crate::models::{
    Alert, DeviceMetadata, HarvestRecord, ListingRecord, Location, NutrientAnalysis, Reading,
    ReadingQuery, Sensor, SensorFilter, StatusPatch, Thresholds,
};

// ---

const SENSOR_COLUMNS: &str = r#"
    sensor_id, sensor_type, lat, lon, altitude, field_id, owner_id, status,
    battery_level, signal_strength, min_value, max_value, critical_value,
    manufacturer, model, firmware, installed_at, calibrated_at, created_at, updated_at
"#;

#[derive(Debug, sqlx::FromRow)]
struct SensorRow {
    sensor_id: String,
    sensor_type: String,
    lat: f64,
    lon: f64,
    altitude: Option<f64>,
    field_id: Option<String>,
    owner_id: String,
    status: String,
    battery_level: i16,
    signal_strength: i16,
    min_value: f64,
    max_value: f64,
    critical_value: f64,
    manufacturer: String,
    model: String,
    firmware: String,
    installed_at: DateTime<Utc>,
    calibrated_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct ReadingRow {
    ts: DateTime<Utc>,
    value: f64,
    unit: String,
    metric: String,
    quality: String,
}

#[derive(Debug, sqlx::FromRow)]
struct AlertRow {
    id: Uuid,
    alert_type: String,
    message: String,
    severity: String,
    ts: DateTime<Utc>,
    resolved: bool,
}

fn parse<T: FromStr<Err = String>>(s: &str) -> EngineResult<T> {
    s.parse().map_err(EngineError::Corrupt)
}

fn level(v: i16) -> EngineResult<u8> {
    u8::try_from(v).map_err(|_| EngineError::Corrupt(format!("level {v} out of range")))
}

impl TryFrom<SensorRow> for Sensor {
    type Error = EngineError;

    fn try_from(row: SensorRow) -> EngineResult<Self> {
        Ok(Sensor {
            sensor_type: parse(&row.sensor_type)?,
            status: parse(&row.status)?,
            battery_level: level(row.battery_level)?,
            signal_strength: level(row.signal_strength)?,
            location: Location {
                lat: row.lat,
                lon: row.lon,
                altitude: row.altitude,
                field_id: row.field_id,
            },
            thresholds: Thresholds {
                min: row.min_value,
                max: row.max_value,
                critical: row.critical_value,
            },
            metadata: DeviceMetadata {
                manufacturer: row.manufacturer,
                model: row.model,
                firmware: row.firmware,
                installed_at: row.installed_at,
                calibrated_at: row.calibrated_at,
            },
            sensor_id: row.sensor_id,
            owner_id: row.owner_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
            readings: Default::default(),
            alerts: Vec::new(),
        })
    }
}

impl TryFrom<ReadingRow> for Reading {
    type Error = EngineError;

    fn try_from(row: ReadingRow) -> EngineResult<Self> {
        Ok(Reading {
            timestamp: row.ts,
            value: row.value,
            unit: row.unit,
            metric: row.metric,
            quality: parse(&row.quality)?,
        })
    }
}

impl TryFrom<AlertRow> for Alert {
    type Error = EngineError;

    fn try_from(row: AlertRow) -> EngineResult<Self> {
        Ok(Alert {
            id: row.id,
            alert_type: parse(&row.alert_type)?,
            message: row.message,
            severity: parse(&row.severity)?,
            timestamp: row.ts,
            resolved: row.resolved,
        })
    }
}

// ---

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    // ---
    pub fn new(pool: PgPool) -> Self {
        PgStore { pool }
    }

    /// Lock the sensor row for the rest of the transaction.
    async fn lock_sensor(
        tx: &mut Transaction<'_, Postgres>,
        sensor_id: &str,
    ) -> EngineResult<Sensor> {
        let sql = format!("SELECT {SENSOR_COLUMNS} FROM sensors WHERE sensor_id = $1 FOR UPDATE");
        let row: Option<SensorRow> = sqlx::query_as(&sql)
            .bind(sensor_id)
            .fetch_optional(&mut **tx)
            .await?;
        row.ok_or_else(|| EngineError::NotFound(sensor_id.to_string()))?
            .try_into()
    }

    async fn ensure_exists(&self, sensor_id: &str) -> EngineResult<()> {
        let found: Option<(String,)> =
            sqlx::query_as("SELECT sensor_id FROM sensors WHERE sensor_id = $1")
                .bind(sensor_id)
                .fetch_optional(&self.pool)
                .await?;
        found
            .map(|_| ())
            .ok_or_else(|| EngineError::NotFound(sensor_id.to_string()))
    }

    async fn insert_alerts(
        tx: &mut Transaction<'_, Postgres>,
        sensor_id: &str,
        alerts: &[Alert],
    ) -> EngineResult<()> {
        for alert in alerts {
            sqlx::query(
                r#"
                INSERT INTO alerts (id, sensor_id, alert_type, message, severity, ts, resolved)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(alert.id)
            .bind(sensor_id)
            .bind(alert.alert_type.as_str())
            .bind(&alert.message)
            .bind(alert.severity.as_str())
            .bind(alert.timestamp)
            .bind(alert.resolved)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl SensorStore for PgStore {
    // ---
    async fn insert_sensor(&self, sensor: Sensor) -> EngineResult<Sensor> {
        let result = sqlx::query(&format!(
            "INSERT INTO sensors ({SENSOR_COLUMNS}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, \
              $11, $12, $13, $14, $15, $16, $17, $18, $19, $20) \
             ON CONFLICT (sensor_id) DO NOTHING"
        ))
        .bind(&sensor.sensor_id)
        .bind(sensor.sensor_type.as_str())
        .bind(sensor.location.lat)
        .bind(sensor.location.lon)
        .bind(sensor.location.altitude)
        .bind(&sensor.location.field_id)
        .bind(&sensor.owner_id)
        .bind(sensor.status.as_str())
        .bind(i16::from(sensor.battery_level))
        .bind(i16::from(sensor.signal_strength))
        .bind(sensor.thresholds.min)
        .bind(sensor.thresholds.max)
        .bind(sensor.thresholds.critical)
        .bind(&sensor.metadata.manufacturer)
        .bind(&sensor.metadata.model)
        .bind(&sensor.metadata.firmware)
        .bind(sensor.metadata.installed_at)
        .bind(sensor.metadata.calibrated_at)
        .bind(sensor.created_at)
        .bind(sensor.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(EngineError::DuplicateSensor(sensor.sensor_id));
        }
        Ok(sensor)
    }

    async fn get_sensor(&self, sensor_id: &str) -> EngineResult<Sensor> {
        // Repeatable read gives the readings and alerts one consistent snapshot.
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
            .execute(&mut *tx)
            .await?;

        let sql = format!("SELECT {SENSOR_COLUMNS} FROM sensors WHERE sensor_id = $1");
        let row: Option<SensorRow> = sqlx::query_as(&sql)
            .bind(sensor_id)
            .fetch_optional(&mut *tx)
            .await?;
        let mut sensor: Sensor = row
            .ok_or_else(|| EngineError::NotFound(sensor_id.to_string()))?
            .try_into()?;

        let readings: Vec<ReadingRow> = sqlx::query_as(
            r#"
            SELECT ts, value, unit, metric, quality
              FROM readings
             WHERE sensor_id = $1
             ORDER BY seq
            "#,
        )
        .bind(sensor_id)
        .fetch_all(&mut *tx)
        .await?;

        let alerts: Vec<AlertRow> = sqlx::query_as(
            r#"
            SELECT id, alert_type, message, severity, ts, resolved
              FROM alerts
             WHERE sensor_id = $1
             ORDER BY seq
            "#,
        )
        .bind(sensor_id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        sensor.readings = readings
            .into_iter()
            .map(Reading::try_from)
            .collect::<EngineResult<_>>()?;
        sensor.alerts = alerts
            .into_iter()
            .map(Alert::try_from)
            .collect::<EngineResult<_>>()?;
        Ok(sensor)
    }

    async fn list_sensors(&self, filter: &SensorFilter) -> EngineResult<Vec<Sensor>> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {SENSOR_COLUMNS} FROM sensors WHERE TRUE"));

        if let Some(owner) = &filter.owner_id {
            qb.push(" AND owner_id = ").push_bind(owner.clone());
        }
        if let Some(t) = filter.sensor_type {
            qb.push(" AND sensor_type = ").push_bind(t.as_str());
        }
        if let Some(s) = filter.status {
            qb.push(" AND status = ").push_bind(s.as_str());
        }
        if let Some(b) = filter.bbox {
            qb.push(" AND lat BETWEEN ").push_bind(b.min_lat).push(" AND ").push_bind(b.max_lat);
            qb.push(" AND lon BETWEEN ").push_bind(b.min_lon).push(" AND ").push_bind(b.max_lon);
        }
        qb.push(" ORDER BY sensor_id");

        let rows: Vec<SensorRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(Sensor::try_from).collect()
    }

    async fn update_status(&self, sensor_id: &str, patch: &StatusPatch) -> EngineResult<Sensor> {
        let mut tx = self.pool.begin().await?;
        let mut sensor = Self::lock_sensor(&mut tx, sensor_id).await?;
        let alerts = alerting::apply_status_patch(&mut sensor, patch);

        sqlx::query(
            r#"
            UPDATE sensors
               SET status = $2, battery_level = $3, signal_strength = $4, updated_at = $5
             WHERE sensor_id = $1
            "#,
        )
        .bind(sensor_id)
        .bind(sensor.status.as_str())
        .bind(i16::from(sensor.battery_level))
        .bind(i16::from(sensor.signal_strength))
        .bind(sensor.updated_at)
        .execute(&mut *tx)
        .await?;

        Self::insert_alerts(&mut tx, sensor_id, &alerts).await?;
        tx.commit().await?;

        sensor.alerts.clear();
        Ok(sensor)
    }

    async fn append_reading(
        &self,
        sensor_id: &str,
        reading: Reading,
    ) -> EngineResult<Option<Alert>> {
        let mut tx = self.pool.begin().await?;
        let sensor = Self::lock_sensor(&mut tx, sensor_id).await?;
        let alert = alerting::check_threshold(&sensor.thresholds, reading.value, &reading.unit);

        sqlx::query(
            r#"
            INSERT INTO readings (sensor_id, ts, value, unit, metric, quality)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(sensor_id)
        .bind(reading.timestamp)
        .bind(reading.value)
        .bind(&reading.unit)
        .bind(&reading.metric)
        .bind(reading.quality.as_str())
        .execute(&mut *tx)
        .await?;

        // Drop everything at or below the first reading past capacity.
        sqlx::query(
            r#"
            DELETE FROM readings
             WHERE sensor_id = $1
               AND seq <= (
                   SELECT seq FROM readings
                    WHERE sensor_id = $1
                    ORDER BY seq DESC
                   OFFSET $2 LIMIT 1
               )
            "#,
        )
        .bind(sensor_id)
        .bind(BUFFER_CAPACITY as i64)
        .execute(&mut *tx)
        .await?;

        if let Some(alert) = &alert {
            Self::insert_alerts(&mut tx, sensor_id, std::slice::from_ref(alert)).await?;
        }

        sqlx::query("UPDATE sensors SET updated_at = $2 WHERE sensor_id = $1")
            .bind(sensor_id)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(alert)
    }

    async fn append_alerts(&self, sensor_id: &str, alerts: Vec<Alert>) -> EngineResult<()> {
        let mut tx = self.pool.begin().await?;
        Self::lock_sensor(&mut tx, sensor_id).await?;
        Self::insert_alerts(&mut tx, sensor_id, &alerts).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn readings(&self, sensor_id: &str, query: &ReadingQuery) -> EngineResult<Vec<Reading>> {
        self.ensure_exists(sensor_id).await?;
        let rows: Vec<ReadingRow> = sqlx::query_as(
            r#"
            SELECT ts, value, unit, metric, quality
              FROM readings
             WHERE sensor_id = $1
               AND ($2::timestamptz IS NULL OR ts >= $2)
               AND ($3::timestamptz IS NULL OR ts <= $3)
             ORDER BY seq DESC
             LIMIT $4
            "#,
        )
        .bind(sensor_id)
        .bind(query.start)
        .bind(query.end)
        .bind(query.limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Reading::try_from).collect()
    }

    async fn alerts(&self, sensor_id: &str, resolved: Option<bool>) -> EngineResult<Vec<Alert>> {
        self.ensure_exists(sensor_id).await?;
        let rows: Vec<AlertRow> = sqlx::query_as(
            r#"
            SELECT id, alert_type, message, severity, ts, resolved
              FROM alerts
             WHERE sensor_id = $1
               AND ($2::boolean IS NULL OR resolved = $2)
             ORDER BY seq
            "#,
        )
        .bind(sensor_id)
        .bind(resolved)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Alert::try_from).collect()
    }

    async fn resolve_alert(&self, sensor_id: &str, index: usize) -> EngineResult<()> {
        let mut tx = self.pool.begin().await?;
        Self::lock_sensor(&mut tx, sensor_id).await?;
        let result = sqlx::query(
            r#"
            UPDATE alerts SET resolved = TRUE
             WHERE seq = (
                   SELECT seq FROM alerts
                    WHERE sensor_id = $1
                    ORDER BY seq
                   OFFSET $2 LIMIT 1
             )
            "#,
        )
        .bind(sensor_id)
        .bind(index as i64)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        if result.rows_affected() == 0 {
            return Err(EngineError::AlertNotFound {
                sensor_id: sensor_id.to_string(),
                index,
            });
        }
        Ok(())
    }

    async fn delete_sensor(&self, sensor_id: &str, owner_id: &str) -> EngineResult<()> {
        let mut tx = self.pool.begin().await?;
        let sensor = Self::lock_sensor(&mut tx, sensor_id).await?;
        if sensor.owner_id != owner_id {
            return Err(EngineError::NotOwner {
                sensor_id: sensor_id.to_string(),
                owner_id: owner_id.to_string(),
            });
        }
        // Readings and alerts go with the sensor via ON DELETE CASCADE.
        sqlx::query("DELETE FROM sensors WHERE sensor_id = $1")
            .bind(sensor_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl HistorySource for PgStore {
    // ---
    async fn harvests(&self, owner_id: &str) -> EngineResult<Vec<HarvestRecord>> {
        Ok(sqlx::query_as(
            r#"
            SELECT owner_id, crop, harvested_at, quantity_kg
              FROM harvests
             WHERE owner_id = $1
             ORDER BY harvested_at
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn listings(&self, owner_id: &str) -> EngineResult<Vec<ListingRecord>> {
        Ok(sqlx::query_as(
            r#"
            SELECT owner_id, crop, listed_at, price_per_kg
              FROM listings
             WHERE owner_id = $1
             ORDER BY listed_at
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn nutrient_analyses(&self, owner_id: &str) -> EngineResult<Vec<NutrientAnalysis>> {
        Ok(sqlx::query_as(
            r#"
            SELECT owner_id, field_id, analyzed_at, nitrogen, phosphorus, potassium
              FROM nutrient_analyses
             WHERE owner_id = $1
             ORDER BY analyzed_at
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?)
    }
}
