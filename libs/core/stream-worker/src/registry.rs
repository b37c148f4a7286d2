//! Contracts between domains and the worker machinery.
//!
//! A domain describes its stream once as a [`StreamDef`] and its payload as a
//! [`StreamJob`]; producers, workers, and DLQs are then configured from those
//! two implementations instead of loose strings.

use serde::{de::DeserializeOwned, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Field keys under which payloads travel in stream entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(Display, AsRefStr, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum MessageKey {
    /// A JSON-serialized job on a source stream.
    Job,
    /// A serialized DLQ entry, payload plus failure metadata.
    Data,
}

/// Compile-time description of one stream and its consumer group.
///
/// Implementors only name the stream, the group, and the DLQ; the tuning
/// consts have defaults that most streams keep.
///
/// # Example
///
/// ```rust,ignore
/// pub struct RemindersStream;
///
/// impl StreamDef for RemindersStream {
///     const STREAM_NAME: &'static str = "reminders";
///     const CONSUMER_GROUP: &'static str = "notification_sink";
///     const DLQ_STREAM: &'static str = "reminders:dlq";
/// }
/// ```
pub trait StreamDef: Send + Sync {
    /// Redis key of the stream.
    const STREAM_NAME: &'static str;

    /// Consumer group reading this stream.
    const CONSUMER_GROUP: &'static str;

    /// Redis key of the stream's dead letter queue.
    const DLQ_STREAM: &'static str;

    /// Approximate cap enforced with `MAXLEN ~` on every append.
    const MAX_LENGTH: i64 = 100_000;

    /// Entries fetched per read.
    const BATCH_SIZE: usize = 10;

    /// Sleep between reads when the worker polls instead of blocking.
    const POLL_INTERVAL_MS: u64 = 1000;

    /// Idle time after which a pending entry counts as abandoned and may be
    /// claimed by another consumer.
    const CLAIM_TIMEOUT_MS: u64 = 30_000;
}

/// Payload carried on a stream, with the retry bookkeeping the worker needs.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Clone, Serialize, Deserialize)]
/// struct ReminderDueEvent {
///     event_id: Uuid,
///     task_id: Uuid,
///     retry_count: u32,
/// }
///
/// impl StreamJob for ReminderDueEvent {
///     fn job_id(&self) -> String {
///         self.event_id.to_string()
///     }
///
///     fn retry_count(&self) -> u32 {
///         self.retry_count
///     }
///
///     fn with_retry(&self) -> Self {
///         Self {
///             retry_count: self.retry_count + 1,
///             ..self.clone()
///         }
///     }
/// }
/// ```
pub trait StreamJob: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Stable ID used for logging and idempotency tracking.
    fn job_id(&self) -> String;

    /// Retries already spent on this job.
    fn retry_count(&self) -> u32;

    /// Copy of the job with one more retry on the clock.
    fn with_retry(&self) -> Self;

    /// Retry budget before the job is dead-lettered.
    fn max_retries(&self) -> u32 {
        3
    }

    fn exceeded_max_retries(&self, max_retries: u32) -> bool {
        self.retry_count() >= max_retries
    }
}
