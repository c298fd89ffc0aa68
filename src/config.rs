//! Configuration loader for the `sensorflow-telemetry` service.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). By consolidating configuration logic here, we
//! avoid scattering `env::var` calls throughout the codebase.
//!
use std::env;

use anyhow::{anyhow, Result};

/// Parse an optional integer environment variable with a default value.
macro_rules! parse_env_u32 {
    ($var_name:expr, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<u32>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// PostgreSQL connection string. `None` selects the in-memory store.
    pub db_url: Option<String>,

    /// Maximum number of database connections in the pool.
    pub db_pool_max: u32,

    /// TCP port the HTTP server binds on all interfaces.
    pub bind_port: u16,

    /// Anomaly window used when a request does not name one.
    pub anomaly_window: u32,
}

/// Load configuration from environment variables with defaults.
///
/// Optional:
/// - `DATABASE_URL` – PostgreSQL connection string (default: in-memory store)
/// - `DB_POOL_MAX` – max DB connections (default: 5)
/// - `BIND_PORT` – HTTP port (default: 8080)
/// - `ANOMALY_WINDOW` – default detector window (default: 24)
///
/// Returns an error if any variable is present but invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let db_url = env::var("DATABASE_URL").ok().filter(|v| !v.trim().is_empty());
    let db_pool_max = parse_env_u32!("DB_POOL_MAX", 5);
    let bind_port = u16::try_from(parse_env_u32!("BIND_PORT", 8080))
        .map_err(|e| anyhow!("Invalid BIND_PORT: {}", e))?;
    let anomaly_window = parse_env_u32!("ANOMALY_WINDOW", 24);

    Ok(Config {
        db_url,
        db_pool_max,
        bind_port,
        anomaly_window,
    })
}

/// Mask the password portion of a connection URL.
fn mask_db_url(db_url: &str) -> String {
    // ---
    if let Some(at_pos) = db_url.rfind('@') {
        if let Some(colon_pos) = db_url[..at_pos].rfind(':') {
            return format!("{}:****{}", &db_url[..colon_pos], &db_url[at_pos..]);
        }
    }
    db_url.to_string()
}

impl Config {
    /// Log the loaded configuration for debugging purposes.
    ///
    /// Masks the database password while showing all configuration values
    /// that were loaded.
    pub fn log_config(&self) {
        // ---
        let store = match &self.db_url {
            Some(url) => mask_db_url(url),
            None => "<unset: in-memory store>".to_string(),
        };

        tracing::info!("Configuration loaded:");
        tracing::info!("  DATABASE_URL   : {}", store);
        tracing::info!("  DB_POOL_MAX    : {}", self.db_pool_max);
        tracing::info!("  BIND_PORT      : {}", self.bind_port);
        tracing::info!("  ANOMALY_WINDOW : {}", self.anomaly_window);
    }
}
