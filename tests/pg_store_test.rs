//! PostgreSQL store tests against a live database at `DATABASE_URL`.
//!
//! Run with `cargo test --test pg_store_test -- --ignored` after pointing
//! `DATABASE_URL` at a scratch database. Sensor IDs are random per run.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use sqlx::postgres::PgPoolOptions;

use sensorflow_telemetry::models::{
    IngestRequest, Location, MetadataRequest, SensorSpecRequest, SensorType, Severity, Thresholds,
};
use sensorflow_telemetry::{schema, EngineError, PgStore, TelemetryEngine};

async fn engine() -> Result<TelemetryEngine> {
    // ---
    let db_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = PgPoolOptions::new()
        .max_connections(8)
        .connect(&db_url)
        .await?;
    schema::create_schema(&pool).await?;

    let store = Arc::new(PgStore::new(pool));
    Ok(TelemetryEngine::new(store.clone(), store))
}

fn unique_id(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4())
}

fn spec(sensor_id: &str) -> SensorSpecRequest {
    // ---
    let installed = Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap();
    SensorSpecRequest {
        sensor_id: Some(sensor_id.to_string()),
        sensor_type: Some(SensorType::Soil),
        location: Some(Location {
            lat: 44.9,
            lon: -93.2,
            altitude: None,
            field_id: None,
        }),
        owner_id: Some("pg-owner".to_string()),
        thresholds: Some(Thresholds {
            min: 20.0,
            max: 80.0,
            critical: 15.0,
        }),
        metadata: Some(MetadataRequest {
            manufacturer: Some("Acme".to_string()),
            model: Some("SM-1".to_string()),
            firmware: Some("2.1.0".to_string()),
            installed_at: Some(installed),
            calibrated_at: Some(installed),
        }),
    }
}

fn value(v: f64) -> IngestRequest {
    IngestRequest {
        value: v,
        unit: "%".to_string(),
        metric: "moisture".to_string(),
        quality: None,
    }
}

#[tokio::test]
#[ignore = "requires a PostgreSQL database at DATABASE_URL"]
async fn buffer_keeps_last_thousand_in_order() -> Result<()> {
    // ---
    let engine = engine().await?;
    let sensor_id = unique_id("pg-buffer");
    engine.register(spec(&sensor_id)).await?;

    // All in range, so no alerts; distinct values expose ordering.
    let series = |i: usize| 20.0 + i as f64 * 0.05;
    for i in 0..1005 {
        engine.ingest(&sensor_id, value(series(i))).await?;
    }

    let sensor = engine.get_sensor(&sensor_id).await?;
    let kept: Vec<f64> = sensor.readings.iter().map(|r| r.value).collect();
    let expected: Vec<f64> = (5..1005).map(series).collect();
    assert_eq!(kept.len(), 1000);
    assert_eq!(kept, expected);
    assert!(sensor.alerts.is_empty());

    let newest = engine.list_readings(&sensor_id, Some(3), None, None).await?;
    let newest: Vec<f64> = newest.iter().map(|r| r.value).collect();
    assert_eq!(newest, vec![series(1004), series(1003), series(1002)]);

    engine.delete_sensor(&sensor_id, "pg-owner").await?;
    Ok(())
}

#[tokio::test]
#[ignore = "requires a PostgreSQL database at DATABASE_URL"]
async fn resolve_alert_by_creation_index() -> Result<()> {
    // ---
    let engine = engine().await?;
    let sensor_id = unique_id("pg-alerts");
    engine.register(spec(&sensor_id)).await?;

    engine.ingest(&sensor_id, value(90.0)).await?;
    engine.ingest(&sensor_id, value(10.0)).await?;

    let alerts = engine.list_alerts(&sensor_id, None).await?;
    assert_eq!(alerts.len(), 2);
    assert_eq!(alerts[0].severity, Severity::High);
    assert_eq!(alerts[1].severity, Severity::Critical);

    engine.resolve_alert(&sensor_id, 1).await?;
    let alerts = engine.list_alerts(&sensor_id, None).await?;
    assert!(!alerts[0].resolved);
    assert!(alerts[1].resolved);

    let open = engine.list_alerts(&sensor_id, Some(false)).await?;
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].severity, Severity::High);

    let err = engine.resolve_alert(&sensor_id, 2).await.unwrap_err();
    assert!(matches!(err, EngineError::AlertNotFound { index: 2, .. }));

    engine.delete_sensor(&sensor_id, "pg-owner").await?;
    Ok(())
}

#[tokio::test]
#[ignore = "requires a PostgreSQL database at DATABASE_URL"]
async fn duplicate_registration_is_rejected() -> Result<()> {
    // ---
    let engine = engine().await?;
    let sensor_id = unique_id("pg-dup");
    engine.register(spec(&sensor_id)).await?;

    let err = engine.register(spec(&sensor_id)).await.unwrap_err();
    assert!(matches!(err, EngineError::DuplicateSensor(ref id) if *id == sensor_id));

    engine.delete_sensor(&sensor_id, "pg-owner").await?;
    let err = engine.get_sensor(&sensor_id).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
    Ok(())
}

#[tokio::test]
#[ignore = "requires a PostgreSQL database at DATABASE_URL"]
async fn concurrent_ingest_loses_nothing() -> Result<()> {
    // ---
    let engine = engine().await?;
    let sensor_id = unique_id("pg-concurrent");
    engine.register(spec(&sensor_id)).await?;

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let engine = engine.clone();
        let sensor_id = sensor_id.clone();
        tasks.push(tokio::spawn(async move {
            for i in 0..50 {
                // Every fifth reading is out of range.
                let v = if i % 5 == 0 { 95.0 } else { 50.0 };
                engine.ingest(&sensor_id, value(v)).await?;
            }
            Ok::<_, EngineError>(())
        }));
    }
    for task in tasks {
        task.await??;
    }

    let sensor = engine.get_sensor(&sensor_id).await?;
    assert_eq!(sensor.readings.len(), 200);
    assert_eq!(sensor.alerts.len(), 40);

    engine.delete_sensor(&sensor_id, "pg-owner").await?;
    Ok(())
}
