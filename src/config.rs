//! Configuration loader for the `kwh-rollup` service.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). Only the `serve` and `import` commands need it;
//! the batch `aggregate` command takes its paths from the command line.
use std::{env, net::SocketAddr, time::Duration};

use anyhow::{anyhow, bail, Result};

/// Parse an optional integer environment variable with a default value.
macro_rules! parse_env_u64 {
    ($var_name:expr, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<u64>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse a required string environment variable.
macro_rules! require_env {
    ($var_name:expr) => {
        env::var($var_name)
            .map_err(|_| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

/// Longest accepted aggregation interval, in seconds (366 days).
pub const MAX_INTERVAL_SECS: u64 = 366 * 86_400;

/// Turn an interval variable into a period, rejecting 0 and anything above
/// `MAX_INTERVAL_SECS`.
pub fn interval_from_secs(var_name: &str, secs: u64) -> Result<Duration> {
    // ---
    if secs == 0 || secs > MAX_INTERVAL_SECS {
        bail!(
            "{} must be between 1 and {}, got {}",
            var_name,
            MAX_INTERVAL_SECS,
            secs
        );
    }
    Ok(Duration::from_secs(secs))
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// SQLite connection string, e.g. `sqlite://energy.db`.
    pub db_url: String,

    /// Maximum number of database connections in the pool.
    pub db_pool_max: u32,

    /// How long a write waits on a locked database before failing.
    pub db_busy_timeout: Duration,

    /// Address the HTTP server binds to.
    pub bind_addr: SocketAddr,

    /// Period of the hourly aggregation cycle.
    pub hourly_interval: Duration,

    /// Period of the daily aggregation cycle.
    pub daily_interval: Duration,
}

impl Config {
    // ---
    /// Defaults for everything except the database URL.
    pub fn with_db_url(db_url: impl Into<String>) -> Self {
        Self {
            db_url: db_url.into(),
            db_pool_max: 5,
            db_busy_timeout: Duration::from_secs(5),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            hourly_interval: Duration::from_secs(3600),
            daily_interval: Duration::from_secs(86_400),
        }
    }
}

/// Load configuration from environment variables with defaults.
///
/// Required:
/// - `DATABASE_URL` – SQLite connection string
///
/// Optional:
/// - `DB_POOL_MAX` – max DB connections (default: 5)
/// - `DB_BUSY_TIMEOUT_SECS` – write lock wait ceiling (default: 5)
/// - `BIND_ADDR` – HTTP listen address (default: `0.0.0.0:8080`)
/// - `HOURLY_INTERVAL_SECS` – hourly cycle period (default: 3600)
/// - `DAILY_INTERVAL_SECS` – daily cycle period (default: 86400)
///
/// Intervals must lie in `1..=MAX_INTERVAL_SECS`.
///
/// Returns an error if any required variable is missing or invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let defaults = Config::with_db_url(require_env!("DATABASE_URL"));

    let db_pool_max = u32::try_from(parse_env_u64!(
        "DB_POOL_MAX",
        u64::from(defaults.db_pool_max)
    ))
    .map_err(|e| anyhow!("Invalid DB_POOL_MAX: {}", e))?;
    let busy_secs = parse_env_u64!("DB_BUSY_TIMEOUT_SECS", defaults.db_busy_timeout.as_secs());
    let hourly_secs = parse_env_u64!("HOURLY_INTERVAL_SECS", defaults.hourly_interval.as_secs());
    let daily_secs = parse_env_u64!("DAILY_INTERVAL_SECS", defaults.daily_interval.as_secs());

    let bind_addr = match env::var("BIND_ADDR") {
        Ok(v) => v
            .parse::<SocketAddr>()
            .map_err(|e| anyhow!("Invalid BIND_ADDR: {}", e))?,
        Err(_) => defaults.bind_addr,
    };

    if db_pool_max == 0 {
        bail!("DB_POOL_MAX must be > 0");
    }
    let hourly_interval = interval_from_secs("HOURLY_INTERVAL_SECS", hourly_secs)?;
    let daily_interval = interval_from_secs("DAILY_INTERVAL_SECS", daily_secs)?;

    Ok(Config {
        db_url: defaults.db_url,
        db_pool_max,
        db_busy_timeout: Duration::from_secs(busy_secs),
        bind_addr,
        hourly_interval,
        daily_interval,
    })
}

impl Config {
    /// Log the loaded configuration for debugging purposes.
    pub fn log_config(&self) {
        // ---
        tracing::info!("Configuration loaded:");
        tracing::info!("  DATABASE_URL         : {}", self.db_url);
        tracing::info!("  DB_POOL_MAX          : {}", self.db_pool_max);
        tracing::info!("  DB_BUSY_TIMEOUT_SECS : {}", self.db_busy_timeout.as_secs());
        tracing::info!("  BIND_ADDR            : {}", self.bind_addr);
        tracing::info!("  HOURLY_INTERVAL_SECS : {}", self.hourly_interval.as_secs());
        tracing::info!("  DAILY_INTERVAL_SECS  : {}", self.daily_interval.as_secs());
    }
}
