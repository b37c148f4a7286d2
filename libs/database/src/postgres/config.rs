use std::time::Duration;

use sea_orm::ConnectOptions;
use tracing::log::LevelFilter;

#[cfg(feature = "config")]
use core_config::{env_or_default, env_required, ConfigError, FromEnv};

const DEFAULT_MAX_CONNECTIONS: u32 = 100;
const DEFAULT_MIN_CONNECTIONS: u32 = 5;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(8);

/// Pool sizing and timeouts for a PostgreSQL connection.
///
/// Construct directly for tests and tools, or load from the environment with
/// the `config` feature:
///
/// ```ignore
/// use core_config::FromEnv;
/// use database::postgres::{connect_from_config, PostgresConfig};
///
/// let db = connect_from_config(PostgresConfig::from_env()?).await?;
/// ```
#[derive(Clone, Debug)]
pub struct PostgresConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
    pub sqlx_logging: bool,
    /// SeaORM logs queries through `log`, so the level is a `log::LevelFilter`.
    pub sqlx_logging_level: LevelFilter,
}

impl PostgresConfig {
    /// Pool defaults for the given URL: 5-100 connections, 8s timeouts.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Translate into the SeaORM connect options the pool is built from.
    pub fn into_connect_options(self) -> ConnectOptions {
        let mut options = ConnectOptions::new(&self.url);
        options
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .connect_timeout(self.connect_timeout)
            .acquire_timeout(self.acquire_timeout)
            .idle_timeout(self.idle_timeout)
            .max_lifetime(self.max_lifetime)
            .sqlx_logging(self.sqlx_logging)
            .sqlx_logging_level(self.sqlx_logging_level);
        options
    }
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: DEFAULT_MIN_CONNECTIONS,
            connect_timeout: DEFAULT_TIMEOUT,
            acquire_timeout: DEFAULT_TIMEOUT,
            idle_timeout: DEFAULT_TIMEOUT,
            max_lifetime: DEFAULT_TIMEOUT,
            sqlx_logging: true,
            sqlx_logging_level: LevelFilter::Info,
        }
    }
}

#[cfg(feature = "config")]
fn pool_knob<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    env_or_default(key, default)
        .parse()
        .map_err(|e: T::Err| ConfigError::ParseError {
            key: key.to_string(),
            details: e.to_string(),
        })
}

#[cfg(feature = "config")]
fn timeout_knob(key: &str) -> Result<Duration, ConfigError> {
    Ok(Duration::from_secs(pool_knob(key, "8")?))
}

/// Settings read from the environment:
///
/// - `DATABASE_URL` (required)
/// - `DB_MAX_CONNECTIONS` / `DB_MIN_CONNECTIONS` (default 100 / 5)
/// - `DB_CONNECT_TIMEOUT_SECS`, `DB_ACQUIRE_TIMEOUT_SECS`,
///   `DB_IDLE_TIMEOUT_SECS`, `DB_MAX_LIFETIME_SECS` (default 8)
/// - `DB_SQLX_LOGGING` (default true)
#[cfg(feature = "config")]
impl FromEnv for PostgresConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            url: env_required("DATABASE_URL")?,
            max_connections: pool_knob("DB_MAX_CONNECTIONS", "100")?,
            min_connections: pool_knob("DB_MIN_CONNECTIONS", "5")?,
            connect_timeout: timeout_knob("DB_CONNECT_TIMEOUT_SECS")?,
            acquire_timeout: timeout_knob("DB_ACQUIRE_TIMEOUT_SECS")?,
            idle_timeout: timeout_knob("DB_IDLE_TIMEOUT_SECS")?,
            max_lifetime: timeout_knob("DB_MAX_LIFETIME_SECS")?,
            sqlx_logging: pool_knob("DB_SQLX_LOGGING", "true")?,
            sqlx_logging_level: LevelFilter::Info,
        })
    }
}
