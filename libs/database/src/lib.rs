//! Connection plumbing for the PostgreSQL and Redis backends.
//!
//! Each backend sits behind a cargo feature so binaries only compile the
//! drivers they speak:
//!
//! - `postgres` (default): SeaORM pool setup plus [`BaseRepository`]
//! - `redis` (default): `ConnectionManager` setup for the stream layer
//! - `config`: `FromEnv` loaders for both backends
//!
//! ```ignore
//! use core_config::FromEnv;
//! use database::postgres::{connect_from_config_with_retry, PostgresConfig};
//!
//! let config = PostgresConfig::from_env()?;
//! let db = connect_from_config_with_retry(config, None).await?;
//! ```

pub mod retry;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "postgres")]
mod repository;

#[cfg(feature = "redis")]
pub mod redis;

pub use retry::{retry, retry_with_backoff, RetryConfig};

#[cfg(feature = "postgres")]
pub use repository::{BaseRepository, UuidEntity};
