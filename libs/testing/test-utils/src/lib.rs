//! Container-backed test infrastructure shared across the workspace.
//!
//! Integration tests get throwaway backing services per test:
//! [`TestDatabase`] starts PostgreSQL and applies the workspace migrations,
//! [`TestRedis`] starts Redis. Both tear their container down on drop.
//! [`TestDataBuilder`] derives deterministic ids and names from the test
//! name so runs are reproducible and tests never collide on data. Redis
//! support sits behind the `redis` feature.
//!
//! ```no_run
//! use test_utils::{TestDataBuilder, TestDatabase};
//!
//! # async fn example() {
//! let db = TestDatabase::new().await;
//! let builder = TestDataBuilder::from_test_name("create_task");
//! let user_id = builder.user_id();
//! let title = builder.name("task", "main");
//! # }
//! ```

use uuid::Uuid;

#[cfg(feature = "postgres")]
mod postgres;

#[cfg(feature = "redis")]
mod redis;

#[cfg(feature = "postgres")]
pub use postgres::TestDatabase;

#[cfg(feature = "redis")]
pub use redis::TestRedis;

/// Deterministic test data keyed on a seed.
///
/// Two builders with the same seed produce identical data; builders from
/// different test names produce disjoint data.
pub struct TestDataBuilder {
    seed: u64,
}

impl TestDataBuilder {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Hashes the test name into a seed. The usual entry point.
    pub fn from_test_name(name: &str) -> Self {
        use std::hash::{DefaultHasher, Hash, Hasher};

        let mut h = DefaultHasher::new();
        name.hash(&mut h);
        Self::new(h.finish())
    }

    /// A user id that is stable for this seed.
    pub fn user_id(&self) -> Uuid {
        Uuid::from_u64_pair(self.seed, self.seed)
    }

    /// A name like `test-task-12345-main`: greppable in a shared database
    /// and unique per seed.
    pub fn name(&self, prefix: &str, suffix: &str) -> String {
        format!("test-{prefix}-{}-{suffix}", self.seed)
    }
}
