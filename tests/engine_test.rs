use std::sync::Arc;

use anyhow::Result;
use chrono::{TimeZone, Utc};

use sensorflow_telemetry::models::{
    AlertType, AnomalyKind, HarvestRecord, IngestRequest, Location, MetadataRequest, Quality,
    SensorSpecRequest, SensorStatus, SensorType, Severity, StatusPatch, Thresholds,
};
use sensorflow_telemetry::{EngineError, MemoryStore, TelemetryEngine};

fn engine() -> (TelemetryEngine, Arc<MemoryStore>) {
    // ---
    let store = Arc::new(MemoryStore::new());
    (TelemetryEngine::new(store.clone(), store.clone()), store)
}

fn spec(sensor_id: &str, owner_id: &str, sensor_type: SensorType) -> SensorSpecRequest {
    // ---
    let installed = Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap();
    SensorSpecRequest {
        sensor_id: Some(sensor_id.to_string()),
        sensor_type: Some(sensor_type),
        location: Some(Location {
            lat: 44.9,
            lon: -93.2,
            altitude: None,
            field_id: Some("north".to_string()),
        }),
        owner_id: Some(owner_id.to_string()),
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
async fn registration_defaults_and_duplicates() -> Result<()> {
    // ---
    let (engine, _) = engine();
    let sensor = engine.register(spec("S1", "farmer-1", SensorType::Soil)).await?;

    assert_eq!(sensor.status, SensorStatus::Active);
    assert_eq!(sensor.battery_level, 100);
    assert_eq!(sensor.signal_strength, 100);
    assert!(sensor.readings.is_empty());
    assert!(sensor.alerts.is_empty());

    let err = engine.register(spec("S1", "farmer-2", SensorType::Air)).await.unwrap_err();
    assert!(matches!(err, EngineError::DuplicateSensor(_)));
    Ok(())
}

#[tokio::test]
async fn buffer_keeps_exactly_the_last_thousand() -> Result<()> {
    // ---
    let (engine, _) = engine();
    engine.register(spec("S1", "farmer-1", SensorType::Soil)).await?;

    for i in 0..1200 {
        engine.ingest("S1", value(20.0 + (i % 60) as f64)).await?;
    }

    let sensor = engine.get_sensor("S1").await?;
    assert_eq!(sensor.readings.len(), 1000);
    let expected: Vec<f64> = (200..1200).map(|i| 20.0 + (i % 60) as f64).collect();
    let actual: Vec<f64> = sensor.readings.iter().map(|r| r.value).collect();
    assert_eq!(actual, expected);

    // All values were inside [20, 80].
    assert!(sensor.alerts.is_empty());
    Ok(())
}

#[tokio::test]
async fn threshold_alerts_on_ingest() -> Result<()> {
    // ---
    let (engine, _) = engine();
    engine.register(spec("S1", "farmer-1", SensorType::Soil)).await?;

    let reading = engine.ingest("S1", value(50.0)).await?;
    assert_eq!(reading.quality, Quality::Good);
    assert!(engine.list_alerts("S1", None).await?.is_empty());

    engine.ingest("S1", value(85.0)).await?;
    engine.ingest("S1", value(10.0)).await?;

    let alerts = engine.list_alerts("S1", None).await?;
    assert_eq!(alerts.len(), 2);
    assert!(alerts.iter().all(|a| a.alert_type == AlertType::Threshold));
    assert_eq!(alerts[0].severity, Severity::High);
    assert_eq!(alerts[0].message, "Value 85 % is outside normal range (20-80 %)");
    assert_eq!(alerts[1].severity, Severity::Critical);
    Ok(())
}

#[tokio::test]
async fn invalid_reading_is_not_appended() -> Result<()> {
    // ---
    let (engine, _) = engine();
    engine.register(spec("S1", "farmer-1", SensorType::Soil)).await?;

    let mut bad = value(f64::INFINITY);
    bad.unit.clear();
    let err = engine.ingest("S1", bad).await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(ref f) if f.len() == 2));

    let sensor = engine.get_sensor("S1").await?;
    assert!(sensor.readings.is_empty());
    assert!(sensor.alerts.is_empty());

    let err = engine.ingest("missing", value(50.0)).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
    Ok(())
}

#[tokio::test]
async fn status_update_raises_device_alerts() -> Result<()> {
    // ---
    let (engine, _) = engine();
    engine.register(spec("S1", "farmer-1", SensorType::Soil)).await?;

    let patch = StatusPatch {
        battery_level: Some(15),
        signal_strength: Some(25),
        ..Default::default()
    };
    let sensor = engine.update_status("S1", patch).await?;
    assert_eq!(sensor.battery_level, 15);

    let kinds: Vec<_> = engine
        .list_alerts("S1", Some(false))
        .await?
        .into_iter()
        .map(|a| (a.alert_type, a.severity))
        .collect();
    assert_eq!(
        kinds,
        vec![(AlertType::Battery, Severity::Critical), (AlertType::Signal, Severity::High)]
    );

    let err = engine
        .update_status(
            "S1",
            StatusPatch {
                battery_level: Some(120),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
    Ok(())
}

#[tokio::test]
async fn spike_scenario_over_default_window() -> Result<()> {
    // ---
    let (engine, _) = engine();
    engine.register(spec("S1", "farmer-1", SensorType::Soil)).await?;

    for _ in 0..23 {
        engine.ingest("S1", value(50.0)).await?;
    }
    engine.ingest("S1", value(130.0)).await?;
    engine.ingest("S1", value(52.0)).await?;

    let findings = engine.detect_anomalies("S1", Some(24), false).await?;
    let spikes: Vec<_> = findings.iter().filter(|f| f.kind == AnomalyKind::Spike).collect();
    assert_eq!(spikes.len(), 1);
    assert_eq!(spikes[0].actual_value, 130.0);
    assert_eq!(spikes[0].expected_value, 51.0);
    assert_eq!(findings[0].kind, AnomalyKind::Spike);
    Ok(())
}

#[tokio::test]
async fn moderate_excursion_alerts_but_is_not_a_spike() -> Result<()> {
    // ---
    let (engine, _) = engine();
    engine.register(spec("S1", "farmer-1", SensorType::Soil)).await?;

    for _ in 0..23 {
        engine.ingest("S1", value(50.0)).await?;
    }
    engine.ingest("S1", value(95.0)).await?;
    engine.ingest("S1", value(52.0)).await?;

    let findings = engine.detect_anomalies("S1", None, false).await?;
    assert!(findings.iter().all(|f| f.kind != AnomalyKind::Spike));

    let alerts = engine.list_alerts("S1", None).await?;
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].severity, Severity::High);
    Ok(())
}

#[tokio::test]
async fn detect_on_short_buffer_is_empty() -> Result<()> {
    // ---
    let (engine, _) = engine();
    engine.register(spec("S1", "farmer-1", SensorType::Soil)).await?;
    engine.ingest("S1", value(50.0)).await?;
    engine.ingest("S1", value(500.0)).await?;

    assert!(engine.detect_anomalies("S1", None, true).await?.is_empty());
    assert!(engine
        .list_alerts("S1", None)
        .await?
        .iter()
        .all(|a| a.alert_type != AlertType::Anomaly));
    Ok(())
}

#[tokio::test]
async fn trend_findings_can_be_persisted_as_alerts() -> Result<()> {
    // ---
    let (engine, _) = engine();
    engine.register(spec("S1", "farmer-1", SensorType::Soil)).await?;
    for i in 0..10 {
        engine.ingest("S1", value(30.0 + 0.5 * i as f64)).await?;
    }

    let findings = engine.detect_anomalies("S1", Some(10), true).await?;
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].kind, AnomalyKind::Trend);
    assert_eq!(findings[0].severity, Severity::High);

    let alerts = engine.list_alerts("S1", None).await?;
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].alert_type, AlertType::Anomaly);
    assert_eq!(alerts[0].severity, Severity::High);
    Ok(())
}

#[tokio::test]
async fn maintenance_prediction_from_status() -> Result<()> {
    // ---
    let (engine, _) = engine();
    engine.register(spec("S1", "farmer-1", SensorType::Soil)).await?;
    engine
        .update_status(
            "S1",
            StatusPatch {
                battery_level: Some(10),
                signal_strength: Some(90),
                ..Default::default()
            },
        )
        .await?;

    let p = engine.predict_maintenance("S1").await?;
    assert_eq!(p.issue, "Low battery level");
    assert_eq!(p.severity, Severity::Critical);
    assert_eq!(p.days_to_failure, 5);
    assert_eq!(p.confidence, 95);

    engine
        .update_status(
            "S1",
            StatusPatch {
                battery_level: Some(90),
                signal_strength: Some(10),
                ..Default::default()
            },
        )
        .await?;
    let p = engine.predict_maintenance("S1").await?;
    assert_eq!(p.issue, "Poor signal strength");
    assert_eq!(p.severity, Severity::High);
    assert_eq!(p.confidence, 85);
    Ok(())
}

#[tokio::test]
async fn resolve_alert_restores_health() -> Result<()> {
    // ---
    let (engine, _) = engine();
    engine.register(spec("S1", "farmer-1", SensorType::Soil)).await?;
    engine.ingest("S1", value(90.0)).await?;
    assert_eq!(engine.sensor_health("S1").await?.health_score, 95);

    engine.resolve_alert("S1", 0).await?;
    assert_eq!(engine.sensor_health("S1").await?.health_score, 100);
    assert!(engine.list_alerts("S1", Some(false)).await?.is_empty());
    assert_eq!(engine.list_alerts("S1", Some(true)).await?.len(), 1);

    let err = engine.resolve_alert("S1", 5).await.unwrap_err();
    assert!(matches!(err, EngineError::AlertNotFound { .. }));
    Ok(())
}

#[tokio::test]
async fn owner_health_summary() -> Result<()> {
    // ---
    let (engine, _) = engine();
    engine.register(spec("S1", "farmer-1", SensorType::Soil)).await?;
    engine.register(spec("S2", "farmer-1", SensorType::Weather)).await?;
    engine.register(spec("S3", "farmer-1", SensorType::Water)).await?;
    engine.register(spec("X1", "farmer-2", SensorType::Soil)).await?;

    engine
        .update_status(
            "S1",
            StatusPatch {
                battery_level: Some(5),
                ..Default::default()
            },
        )
        .await?;
    engine
        .update_status(
            "S2",
            StatusPatch {
                status: Some(SensorStatus::Maintenance),
                signal_strength: Some(20),
                ..Default::default()
            },
        )
        .await?;
    engine
        .update_status(
            "S3",
            StatusPatch {
                status: Some(SensorStatus::Error),
                ..Default::default()
            },
        )
        .await?;
    engine.ingest("S3", value(60.0)).await?;
    engine.ingest("X1", value(5.0)).await?;

    let summary = engine.health_summary("farmer-1").await?;
    assert_eq!(summary.total, 3);
    assert_eq!(summary.active, 1);
    assert_eq!(summary.maintenance_needed, 1);
    assert_eq!(summary.error, 1);
    assert_eq!(summary.low_battery, 1);
    assert_eq!(summary.poor_signal, 1);
    assert_eq!(summary.unresolved_alerts, 2);
    assert_eq!(summary.critical_alerts, 1);

    assert_eq!(engine.health_summary("nobody").await?.total, 0);
    Ok(())
}

#[tokio::test]
async fn optimization_per_owner() -> Result<()> {
    // ---
    let (engine, store) = engine();
    assert!(engine.optimize_irrigation("farmer-1").await?.is_none());
    assert!(engine.optimize_fertilizer("farmer-1").await?.is_none());
    assert!(engine.optimize_harvest("farmer-1").await?.is_none());

    engine.register(spec("S1", "farmer-1", SensorType::Soil)).await?;
    engine.register(spec("W1", "farmer-1", SensorType::Weather)).await?;

    let irrigation = engine.optimize_irrigation("farmer-1").await?.expect("soil sensor present");
    assert!((irrigation.improvement - 15.0).abs() < 1e-9);
    assert!((irrigation.estimated_savings - 7.5).abs() < 1e-9);
    assert!((irrigation.roi - 0.18).abs() < 1e-9);

    assert!(engine.optimize_fertilizer("farmer-1").await?.is_some());

    store
        .record_harvest(HarvestRecord {
            owner_id: "farmer-1".to_string(),
            crop: "wheat".to_string(),
            harvested_at: Utc.with_ymd_and_hms(2024, 8, 1, 0, 0, 0).unwrap(),
            quantity_kg: 3200.0,
        })
        .await;
    let harvest = engine.optimize_harvest("farmer-1").await?.expect("harvest history present");
    assert!((harvest.roi - 0.12).abs() < 1e-9);

    assert!(engine.optimize_harvest("farmer-2").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn concurrent_ingest_loses_nothing() -> Result<()> {
    // ---
    let (engine, _) = engine();
    engine.register(spec("S1", "farmer-1", SensorType::Soil)).await?;

    let mut tasks = Vec::new();
    for worker in 0..8 {
        let engine = engine.clone();
        tasks.push(tokio::spawn(async move {
            for i in 0..50 {
                let v = if i % 10 == 0 { 95.0 } else { 40.0 + worker as f64 };
                engine.ingest("S1", value(v)).await?;
            }
            Ok::<_, EngineError>(())
        }));
    }
    for task in tasks {
        task.await??;
    }

    let sensor = engine.get_sensor("S1").await?;
    assert_eq!(sensor.readings.len(), 400);
    assert_eq!(sensor.alerts.len(), 40);
    Ok(())
}

#[tokio::test]
async fn delete_requires_owner() -> Result<()> {
    // ---
    let (engine, _) = engine();
    engine.register(spec("S1", "farmer-1", SensorType::Soil)).await?;
    engine.ingest("S1", value(90.0)).await?;

    let err = engine.delete_sensor("S1", "farmer-2").await.unwrap_err();
    assert!(matches!(err, EngineError::NotOwner { .. }));

    engine.delete_sensor("S1", "farmer-1").await?;
    assert!(matches!(engine.get_sensor("S1").await, Err(EngineError::NotFound(_))));
    assert!(matches!(
        engine.delete_sensor("S1", "farmer-1").await,
        Err(EngineError::NotFound(_))
    ));
    Ok(())
}
