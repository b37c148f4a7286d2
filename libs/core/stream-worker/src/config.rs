//! Tuning knobs for a stream worker.

use uuid::Uuid;

use crate::registry::StreamDef;

const DEFAULT_MAX_LENGTH: i64 = 100_000;
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
const DEFAULT_BATCH_SIZE: usize = 10;
const DEFAULT_BLOCK_MS: u64 = 5000;
const DEFAULT_CLAIM_TIMEOUT_MS: u64 = 30_000;

/// Everything a [`StreamWorker`](crate::StreamWorker) needs to know about
/// its stream: names, read cadence, and concurrency.
///
/// Fields are public; the builder methods cover the knobs callers tune in
/// practice.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub stream_name: String,
    pub consumer_group: String,
    /// Identifies this process within the consumer group. Must be unique
    /// across live consumers or they will steal each other's deliveries.
    pub consumer_id: String,
    /// Where exhausted and malformed entries land.
    pub dlq_stream: String,
    /// Approximate cap (`MAXLEN ~`) applied when requeueing.
    pub max_length: i64,
    /// Sleep between empty reads when not blocking.
    pub poll_interval_ms: u64,
    /// Entries fetched per `XREADGROUP`.
    pub batch_size: usize,
    /// `BLOCK` timeout for reads; `None` switches to polling.
    pub blocking_timeout_ms: Option<u64>,
    /// Jobs processed in parallel per batch.
    pub max_concurrent_jobs: usize,
    /// Idle time before another consumer's pending entry may be claimed.
    pub claim_timeout_ms: u64,
}

fn fresh_consumer_id() -> String {
    format!("worker-{}", Uuid::new_v4())
}

impl WorkerConfig {
    pub fn new(stream_name: impl Into<String>, consumer_group: impl Into<String>) -> Self {
        let stream_name = stream_name.into();
        Self {
            dlq_stream: format!("{stream_name}:dlq"),
            stream_name,
            consumer_group: consumer_group.into(),
            consumer_id: fresh_consumer_id(),
            max_length: DEFAULT_MAX_LENGTH,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            batch_size: DEFAULT_BATCH_SIZE,
            blocking_timeout_ms: Some(DEFAULT_BLOCK_MS),
            max_concurrent_jobs: 1,
            claim_timeout_ms: DEFAULT_CLAIM_TIMEOUT_MS,
        }
    }

    /// Builds a config from a [`StreamDef`], taking names and limits from
    /// the definition so producers and workers cannot drift apart.
    ///
    /// The consumer id is freshly generated per call.
    pub fn from_stream_def<S: StreamDef>() -> Self {
        Self {
            dlq_stream: S::DLQ_STREAM.to_string(),
            max_length: S::MAX_LENGTH,
            poll_interval_ms: S::POLL_INTERVAL_MS,
            batch_size: S::BATCH_SIZE,
            claim_timeout_ms: S::CLAIM_TIMEOUT_MS,
            ..Self::new(S::STREAM_NAME, S::CONSUMER_GROUP)
        }
    }

    pub fn with_consumer_id(mut self, id: impl Into<String>) -> Self {
        self.consumer_id = id.into();
        self
    }

    pub fn with_blocking(mut self, timeout_ms: Option<u64>) -> Self {
        self.blocking_timeout_ms = timeout_ms;
        self
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Floors at 1; a worker that processes nothing is a misconfiguration.
    pub fn with_max_concurrent_jobs(mut self, count: usize) -> Self {
        self.max_concurrent_jobs = count.max(1);
        self
    }

    pub fn is_blocking(&self) -> bool {
        self.blocking_timeout_ms.is_some()
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::new("jobs:pending", "job_workers")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AuditStream;

    impl StreamDef for AuditStream {
        const STREAM_NAME: &'static str = "audit:log";
        const CONSUMER_GROUP: &'static str = "audit_workers";
        const DLQ_STREAM: &'static str = "audit:log:dlq";
        const MAX_LENGTH: i64 = 500;
        const BATCH_SIZE: usize = 25;
        const CLAIM_TIMEOUT_MS: u64 = 5_000;
    }

    #[test]
    fn stream_def_constants_flow_into_config() {
        let config = WorkerConfig::from_stream_def::<AuditStream>();

        assert_eq!(config.stream_name, "audit:log");
        assert_eq!(config.consumer_group, "audit_workers");
        assert_eq!(config.dlq_stream, "audit:log:dlq");
        assert_eq!(config.max_length, 500);
        assert_eq!(config.batch_size, 25);
        assert_eq!(config.claim_timeout_ms, 5_000);
        assert!(config.is_blocking());
    }

    #[test]
    fn each_config_gets_its_own_consumer_id() {
        let a = WorkerConfig::from_stream_def::<AuditStream>();
        let b = WorkerConfig::from_stream_def::<AuditStream>();

        assert!(a.consumer_id.starts_with("worker-"));
        assert_ne!(a.consumer_id, b.consumer_id);
    }

    #[test]
    fn builders_override_defaults() {
        let config = WorkerConfig::new("invoices", "billing")
            .with_consumer_id("billing-7")
            .with_batch_size(32)
            .with_max_concurrent_jobs(6)
            .with_blocking(None);

        assert_eq!(config.consumer_id, "billing-7");
        assert_eq!(config.batch_size, 32);
        assert_eq!(config.max_concurrent_jobs, 6);
        assert!(!config.is_blocking());
    }

    #[test]
    fn dlq_name_is_derived_from_stream() {
        let config = WorkerConfig::new("reminders", "notification_sink");
        assert_eq!(config.dlq_stream, "reminders:dlq");
    }

    #[test]
    fn concurrency_never_drops_below_one() {
        let config = WorkerConfig::default().with_max_concurrent_jobs(0);
        assert_eq!(config.max_concurrent_jobs, 1);
    }
}
