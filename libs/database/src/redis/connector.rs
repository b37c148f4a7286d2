use redis::aio::ConnectionManager;
use redis::Client;
use tracing::info;

use super::RedisConfig;
use crate::retry::{retry, retry_with_backoff, RetryConfig};

/// Connect and return a [`ConnectionManager`].
///
/// The manager reconnects on its own after drops, which is what lets the
/// stream workers treat connection errors as transient. The connection is
/// verified with a PING before it is handed out.
pub async fn connect(url: &str) -> redis::RedisResult<ConnectionManager> {
    let client = Client::open(url)?;
    let manager = ConnectionManager::new(client).await?;

    let mut probe = manager.clone();
    let _: String = redis::cmd("PING").query_async(&mut probe).await?;

    info!("Connected to Redis");
    Ok(manager)
}

/// [`connect`] with the URL taken from a [`RedisConfig`].
pub async fn connect_from_config(config: RedisConfig) -> redis::RedisResult<ConnectionManager> {
    connect(&config.url).await
}

/// Connect, retrying while Redis comes up. `None` uses the default budget.
pub async fn connect_from_config_with_retry(
    config: RedisConfig,
    retry_config: Option<RetryConfig>,
) -> redis::RedisResult<ConnectionManager> {
    let attempt = || connect(&config.url);

    match retry_config {
        Some(budget) => retry_with_backoff(attempt, budget).await,
        None => retry(attempt).await,
    }
}
