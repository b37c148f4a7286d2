//! Throwaway Redis for integration tests.

use redis::aio::ConnectionManager;
use redis::Client;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::redis::Redis;

/// A Redis container scoped to one test.
///
/// Dropping the value stops and removes the container.
pub struct TestRedis {
    _container: ContainerAsync<Redis>,
    connection_string: String,
}

impl TestRedis {
    /// Starts Redis and waits until it answers PING.
    pub async fn new() -> Self {
        let image = Redis::default().with_tag("8-alpine");
        let container = image.start().await.expect("Redis container failed to start");

        let host_port = container
            .get_host_port_ipv4(6379)
            .await
            .expect("no mapped port for 6379");

        let connection_string = format!("redis://127.0.0.1:{host_port}");

        let redis = Self {
            _container: container,
            connection_string,
        };

        // Readiness probe; also surfaces a broken container immediately
        let mut conn = redis.connection_manager().await;
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .expect("Redis container did not answer PING");
        assert_eq!(pong, "PONG");

        tracing::info!(port = host_port, "Test Redis ready");
        redis
    }

    /// A fresh `ConnectionManager`, the connection type the stream workers
    /// and producers take.
    pub async fn connection_manager(&self) -> ConnectionManager {
        let client =
            Client::open(self.connection_string.clone()).expect("Failed to create Redis client");

        ConnectionManager::new(client)
            .await
            .expect("Failed to create connection manager")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redis::AsyncCommands;

    #[tokio::test]
    async fn round_trips_a_key() {
        let server = TestRedis::new().await;
        let mut conn = server.connection_manager().await;

        conn.set::<_, _, ()>("smoke", "it works").await.unwrap();
        let value: String = conn.get("smoke").await.unwrap();
        assert_eq!(value, "it works");
    }

    #[tokio::test]
    async fn stream_appends_get_monotonic_ids() {
        let server = TestRedis::new().await;
        let mut conn = server.connection_manager().await;

        let id1: String = conn.xadd("test:stream", "*", &[("job", "one")]).await.unwrap();
        let id2: String = conn.xadd("test:stream", "*", &[("job", "two")]).await.unwrap();

        assert!(id1 < id2);
        let len: usize = conn.xlen("test:stream").await.unwrap();
        assert_eq!(len, 2);
    }
}
