//! Publishing side of a Redis Stream.
//!
//! `StreamProducer` appends JSON-serialized jobs to a single stream with
//! `XADD`. Every append carries `MAXLEN ~` so a stream with no live
//! consumer cannot grow Redis without bound.
//!
//! ```ignore
//! let producer = StreamProducer::new(redis, "tasks:events");
//! let entry_id = producer.send(&envelope).await?;
//! ```

use std::sync::Arc;

use redis::aio::ConnectionManager;
use redis::streams::StreamMaxlen;
use redis::AsyncCommands;
use serde::Serialize;
use tracing::debug;

use crate::error::StreamError;
use crate::registry::{MessageKey, StreamDef};

const DEFAULT_MAX_LENGTH: i64 = 100_000;

/// Appends jobs to one Redis Stream.
///
/// Cheap to clone; clones share the underlying connection manager.
#[derive(Clone)]
pub struct StreamProducer {
    redis: Arc<ConnectionManager>,
    stream: String,
    maxlen: i64,
}

impl StreamProducer {
    pub fn new(redis: ConnectionManager, stream: impl Into<String>) -> Self {
        Self::from_arc(Arc::new(redis), stream)
    }

    /// Shares an already-wrapped connection manager instead of re-wrapping it.
    pub fn from_arc(redis: Arc<ConnectionManager>, stream: impl Into<String>) -> Self {
        Self {
            redis,
            stream: stream.into(),
            maxlen: DEFAULT_MAX_LENGTH,
        }
    }

    /// Targets the stream a [`StreamDef`] names, with that stream's cap.
    ///
    /// Producers built this way stay consistent with workers built from the
    /// same definition.
    pub fn from_arc_with_stream_def<S: StreamDef>(redis: Arc<ConnectionManager>) -> Self {
        Self::from_arc(redis, S::STREAM_NAME).with_max_length(S::MAX_LENGTH)
    }

    /// Overrides the approximate length cap applied on every append.
    pub fn with_max_length(mut self, cap: i64) -> Self {
        self.maxlen = cap;
        self
    }

    fn conn(&self) -> ConnectionManager {
        (*self.redis).clone()
    }

    /// Serializes `job` and appends it, returning the entry id Redis assigned.
    ///
    /// The payload lands under the field name consumers read back, and the
    /// `~` trim means the stream may briefly exceed its cap.
    pub async fn send<T: Serialize>(&self, job: &T) -> Result<String, StreamError> {
        let payload = serde_json::to_string(job)?;

        let entry_id: String = self
            .conn()
            .xadd_maxlen(
                &self.stream,
                StreamMaxlen::Approx(self.maxlen as usize),
                "*",
                &[(MessageKey::Job.as_ref(), payload.as_str())],
            )
            .await?;

        debug!(stream = %self.stream, entry_id = %entry_id, "Enqueued job");
        Ok(entry_id)
    }
}
