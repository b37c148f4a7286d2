//! Redis Streams worker framework with at-least-once delivery.
//!
//! A [`StreamWorker`] reads jobs from a stream through a consumer group,
//! hands them to a [`StreamProcessor`], and acks on success. Failures are
//! categorized: transient ones are requeued with backoff and a bumped retry
//! count, permanent ones and retry-exhausted jobs land in a per-stream dead
//! letter queue. Payloads that will not even deserialize are dead-lettered
//! verbatim so nothing is silently dropped.
//!
//! Consumer groups give horizontal scaling; abandoned pending entries are
//! reclaimed from crashed consumers. Prometheus metrics and axum health/DLQ
//! admin routers are included so every worker binary exposes the same
//! operational surface.
//!
//! Wiring a worker takes a job type, a stream definition, and a processor:
//!
//! ```ignore
//! struct EmailJobs;
//! impl StreamDef for EmailJobs {
//!     const STREAM_NAME: &'static str = "email:send";
//!     const CONSUMER_GROUP: &'static str = "email_senders";
//!     const DLQ_STREAM: &'static str = "email:send:dlq";
//! }
//!
//! StreamWorker::new(redis, SendEmail, WorkerConfig::from_stream_def::<EmailJobs>())
//!     .run(shutdown_rx)
//!     .await?;
//! ```

mod config;
mod consumer;
mod dlq;
mod error;
mod health;
pub mod metrics;
mod producer;
mod registry;
mod worker;

pub use config::WorkerConfig;
pub use consumer::{RawEvent, StreamConsumer, StreamInfo};
pub use dlq::{DlqEntry, DlqManager, DlqStats};
pub use error::{ErrorCategory, StreamError};
pub use health::{full_admin_router, HealthState};
pub use metrics::{init_metrics, render_metrics, StreamMetrics};
pub use producer::StreamProducer;
pub use registry::{MessageKey, StreamDef, StreamJob};
pub use worker::{StreamProcessor, StreamWorker};
