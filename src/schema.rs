//! Database schema management for `sensorflow-telemetry`.
//!
//! Ensures required tables and indexes exist before serving requests.
//! Applied once on startup from `main.rs` when the PostgreSQL store is used.

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Create or update the database schema (idempotent).
///
/// Creates `sensors` (the aggregate root), its child tables `readings` and
/// `alerts` (cascading on delete), and the read-only farm history tables
/// consumed by optimization. Safe to call on every startup.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sensors (
            sensor_id         TEXT PRIMARY KEY,
            sensor_type       TEXT             NOT NULL,
            lat               DOUBLE PRECISION NOT NULL,
            lon               DOUBLE PRECISION NOT NULL,
            altitude          DOUBLE PRECISION,
            field_id          TEXT,
            owner_id          TEXT             NOT NULL,
            status            TEXT             NOT NULL,
            battery_level     SMALLINT         NOT NULL,
            signal_strength   SMALLINT         NOT NULL,
            min_value         DOUBLE PRECISION NOT NULL,
            max_value         DOUBLE PRECISION NOT NULL,
            critical_value    DOUBLE PRECISION NOT NULL,
            manufacturer      TEXT             NOT NULL,
            model             TEXT             NOT NULL,
            firmware          TEXT             NOT NULL,
            installed_at      TIMESTAMPTZ      NOT NULL,
            calibrated_at     TIMESTAMPTZ      NOT NULL,
            created_at        TIMESTAMPTZ      NOT NULL,
            updated_at        TIMESTAMPTZ      NOT NULL,
            CHECK (min_value < max_value),
            CHECK (battery_level BETWEEN 0 AND 100),
            CHECK (signal_strength BETWEEN 0 AND 100)
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Buffered readings; `seq` preserves arrival order
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS readings (
            seq        BIGSERIAL PRIMARY KEY,
            sensor_id  TEXT             NOT NULL REFERENCES sensors (sensor_id) ON DELETE CASCADE,
            ts         TIMESTAMPTZ      NOT NULL,
            value      DOUBLE PRECISION NOT NULL,
            unit       TEXT             NOT NULL,
            metric     TEXT             NOT NULL,
            quality    TEXT             NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS alerts (
            seq         BIGSERIAL PRIMARY KEY,
            id          UUID        NOT NULL UNIQUE,
            sensor_id   TEXT        NOT NULL REFERENCES sensors (sensor_id) ON DELETE CASCADE,
            alert_type  TEXT        NOT NULL,
            message     TEXT        NOT NULL,
            severity    TEXT        NOT NULL,
            ts          TIMESTAMPTZ NOT NULL,
            resolved    BOOLEAN     NOT NULL DEFAULT FALSE
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Farm history, written by the wider platform
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS harvests (
            id            SERIAL PRIMARY KEY,
            owner_id      TEXT             NOT NULL,
            crop          TEXT             NOT NULL,
            harvested_at  TIMESTAMPTZ      NOT NULL,
            quantity_kg   DOUBLE PRECISION NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS listings (
            id            SERIAL PRIMARY KEY,
            owner_id      TEXT             NOT NULL,
            crop          TEXT             NOT NULL,
            listed_at     TIMESTAMPTZ      NOT NULL,
            price_per_kg  DOUBLE PRECISION NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS nutrient_analyses (
            id           SERIAL PRIMARY KEY,
            owner_id     TEXT             NOT NULL,
            field_id     TEXT,
            analyzed_at  TIMESTAMPTZ      NOT NULL,
            nitrogen     DOUBLE PRECISION NOT NULL,
            phosphorus   DOUBLE PRECISION NOT NULL,
            potassium    DOUBLE PRECISION NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Indexes for owner-scoped and per-sensor queries
    for ddl in [
        "CREATE INDEX IF NOT EXISTS idx_sensors_owner ON sensors (owner_id)",
        "CREATE INDEX IF NOT EXISTS idx_sensors_owner_type ON sensors (owner_id, sensor_type)",
        "CREATE INDEX IF NOT EXISTS idx_readings_sensor_seq ON readings (sensor_id, seq)",
        "CREATE INDEX IF NOT EXISTS idx_alerts_sensor_seq ON alerts (sensor_id, seq)",
        "CREATE INDEX IF NOT EXISTS idx_harvests_owner ON harvests (owner_id)",
        "CREATE INDEX IF NOT EXISTS idx_listings_owner ON listings (owner_id)",
        "CREATE INDEX IF NOT EXISTS idx_nutrient_analyses_owner ON nutrient_analyses (owner_id)",
    ] {
        sqlx::query(ddl).execute(&mut *tx).await?;
    }

    tx.commit().await?;
    Ok(())
}
