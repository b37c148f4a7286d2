//! Per-stream dead letter queues.
//!
//! Handles failed jobs that have exceeded their retry limits, plus payloads
//! that could not be deserialized at all. Each source stream has its own DLQ
//! stream so poisoned events from one topic never block another.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::streams::{StreamId, StreamMaxlen, StreamRangeReply};
use redis::{AsyncCommands, RedisResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::StreamError;
use crate::registry::{MessageKey, StreamJob};

// DLQs are trimmed harder than source streams; they hold failures, not work
const DLQ_MAX_LENGTH: i64 = 10_000;

/// Appends to and administers one stream's dead letters.
#[derive(Clone)]
pub struct DlqManager {
    redis: Arc<ConnectionManager>,
    source_stream: String,
    dlq_stream: String,
    maxlen: i64,
}

impl DlqManager {
    pub fn new(
        redis: Arc<ConnectionManager>,
        source_stream: impl Into<String>,
        dlq_stream: impl Into<String>,
    ) -> Self {
        Self {
            redis,
            source_stream: source_stream.into(),
            dlq_stream: dlq_stream.into(),
            maxlen: DLQ_MAX_LENGTH,
        }
    }

    fn conn(&self) -> ConnectionManager {
        (*self.redis).clone()
    }

    /// Dead-letter a job that will not be retried again.
    pub async fn move_to_dlq<J: StreamJob>(
        &self,
        job: &J,
        reason: &str,
        source_id: &str,
    ) -> Result<String, StreamError> {
        let entry = DlqEntry::for_job(job, reason, source_id)?;
        let entry_id = self.append(&entry).await?;

        info!(
            job_id = %entry.job_id,
            dlq_id = %entry_id,
            error = %reason,
            retry_count = entry.retry_count,
            "Moved job to DLQ"
        );

        Ok(entry_id)
    }

    /// Dead-letter a payload that failed to deserialize.
    ///
    /// The payload is preserved verbatim as a JSON string so nothing is lost.
    pub async fn move_raw(
        &self,
        payload: &str,
        reason: &str,
        source_id: &str,
    ) -> Result<String, StreamError> {
        let entry_id = self
            .append(&DlqEntry::for_raw(payload, reason, source_id))
            .await?;

        info!(
            stream_id = %source_id,
            dlq_id = %entry_id,
            error = %reason,
            "Moved malformed payload to DLQ"
        );

        Ok(entry_id)
    }

    async fn append(&self, entry: &DlqEntry) -> Result<String, StreamError> {
        let data = serde_json::to_string(entry)?;
        let mut conn = self.conn();

        let id: String = conn
            .xadd_maxlen(
                &self.dlq_stream,
                StreamMaxlen::Approx(self.maxlen as usize),
                "*",
                &[(MessageKey::Data.as_ref(), data.as_str())],
            )
            .await?;

        Ok(id)
    }

    /// Length and boundary entry IDs, for the admin stats endpoint.
    pub async fn stats(&self) -> Result<DlqStats, StreamError> {
        let mut conn = self.conn();

        Ok(DlqStats {
            stream_name: self.dlq_stream.clone(),
            length: conn.xlen(&self.dlq_stream).await.unwrap_or(0),
            oldest_entry_id: self.boundary_id(&mut conn, false).await,
            newest_entry_id: self.boundary_id(&mut conn, true).await,
        })
    }

    /// Entry ID at one end of the DLQ, if the stream is non-empty.
    async fn boundary_id(&self, conn: &mut ConnectionManager, newest: bool) -> Option<String> {
        let range: RedisResult<StreamRangeReply> = if newest {
            conn.xrevrange_count(&self.dlq_stream, "+", "-", 1).await
        } else {
            conn.xrange_count(&self.dlq_stream, "-", "+", 1).await
        };

        range
            .ok()
            .and_then(|reply| reply.ids.into_iter().next())
            .map(|entry| entry.id)
    }

    /// List DLQ entries with their stream IDs, oldest first.
    ///
    /// Pass the last seen entry ID as `start` to paginate.
    pub async fn list(
        &self,
        limit: usize,
        start: Option<&str>,
    ) -> Result<Vec<(String, DlqEntry)>, StreamError> {
        let mut conn = self.conn();

        let range: StreamRangeReply = conn
            .xrange_count(&self.dlq_stream, start.unwrap_or("-"), "+", limit)
            .await?;

        Ok(range
            .ids
            .into_iter()
            .filter_map(|entry| {
                let parsed = Self::parse_entry(&entry)?;
                Some((entry.id, parsed))
            })
            .collect())
    }

    /// Look up one DLQ entry by its stream ID.
    pub async fn get(&self, dlq_id: &str) -> Result<Option<DlqEntry>, StreamError> {
        let mut conn = self.conn();

        let range: StreamRangeReply = conn
            .xrange_count(&self.dlq_stream, dlq_id, dlq_id, 1)
            .await?;

        Ok(range.ids.first().and_then(Self::parse_entry))
    }

    /// Requeue a DLQ entry back onto the source stream.
    ///
    /// The job's retry count is reset so it gets a fresh set of retries, and
    /// the DLQ entry is deleted. Returns false if the entry does not exist.
    pub async fn requeue(&self, dlq_id: &str) -> Result<bool, StreamError> {
        let Some(entry) = self.get(dlq_id).await? else {
            return Ok(false);
        };

        let payload = Self::requeue_payload(&entry)?;
        let mut conn = self.conn();

        let stream_id: String = conn
            .xadd(
                &self.source_stream,
                "*",
                &[(MessageKey::Job.as_ref(), payload.as_str())],
            )
            .await?;

        let _: i64 = conn.xdel(&self.dlq_stream, &[dlq_id]).await?;

        info!(
            dlq_id = %dlq_id,
            job_id = %entry.job_id,
            stream = %self.source_stream,
            stream_id = %stream_id,
            "Requeued DLQ entry"
        );

        Ok(true)
    }

    /// Requeue the oldest `count` DLQ entries. Returns how many were requeued.
    pub async fn requeue_oldest(&self, count: usize) -> Result<usize, StreamError> {
        let entries = self.list(count, None).await?;
        let mut requeued = 0;

        for (dlq_id, _entry) in entries {
            if self.requeue(&dlq_id).await? {
                requeued += 1;
            }
        }

        Ok(requeued)
    }

    /// Drop `dlq_id` from the DLQ without requeueing it.
    pub async fn delete(&self, id: &str) -> Result<bool, StreamError> {
        let mut conn = self.conn();

        let removed: i64 = conn.xdel(&self.dlq_stream, &[id]).await?;
        debug!(dlq_id = %id, removed = %removed, "Deleted DLQ entry");

        Ok(removed > 0)
    }

    /// Empty the DLQ. Returns how many entries were dropped.
    pub async fn purge(&self) -> Result<i64, StreamError> {
        let mut conn = self.conn();

        let purged: i64 = conn.xlen(&self.dlq_stream).await?;
        if purged == 0 {
            return Ok(0);
        }

        let _: i64 = conn.xtrim(&self.dlq_stream, StreamMaxlen::Equals(0)).await?;

        info!(count = purged, "Purged DLQ");
        Ok(purged)
    }

    fn parse_entry(entry: &StreamId) -> Option<DlqEntry> {
        match entry.map.get(MessageKey::Data.as_ref()) {
            Some(redis::Value::BulkString(bytes)) => serde_json::from_slice(bytes).ok(),
            Some(redis::Value::SimpleString(text)) => serde_json::from_str(text).ok(),
            _ => None,
        }
    }

    /// Rebuild the job payload for requeueing, resetting the retry count.
    fn requeue_payload(entry: &DlqEntry) -> Result<String, StreamError> {
        match &entry.job_data {
            // Raw payloads are preserved verbatim
            Value::String(raw) => Ok(raw.clone()),
            Value::Object(map) => {
                let mut map = map.clone();
                if map.contains_key("retry_count") {
                    map.insert("retry_count".to_string(), Value::from(0));
                }
                Ok(serde_json::to_string(&Value::Object(map))?)
            }
            other => Ok(serde_json::to_string(other)?),
        }
    }
}

/// One dead-lettered payload, stored as JSON under the stream's `data` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqEntry {
    /// Job ID, or the stream entry ID when the payload never deserialized
    pub job_id: String,

    /// The job as JSON, or the verbatim payload string for malformed entries
    pub job_data: Value,

    /// What failed, as reported by the processor or the deserializer
    pub error: String,

    /// Entry ID the payload had on the source stream
    pub original_stream_id: String,

    /// Retries spent before dead-lettering
    pub retry_count: u32,

    /// When the move happened
    pub failed_at: DateTime<Utc>,
}

impl DlqEntry {
    fn for_job<J: StreamJob>(job: &J, reason: &str, source_id: &str) -> Result<Self, StreamError> {
        Ok(Self {
            job_id: job.job_id(),
            job_data: serde_json::to_value(job)?,
            error: reason.to_string(),
            original_stream_id: source_id.to_string(),
            retry_count: job.retry_count(),
            failed_at: Utc::now(),
        })
    }

    /// The entry ID doubles as the job ID; a payload that never deserialized
    /// has no other identity.
    fn for_raw(payload: &str, reason: &str, source_id: &str) -> Self {
        Self {
            job_id: source_id.to_string(),
            job_data: Value::String(payload.to_string()),
            error: reason.to_string(),
            original_stream_id: source_id.to_string(),
            retry_count: 0,
            failed_at: Utc::now(),
        }
    }
}

/// Point-in-time shape of a DLQ, as served by the admin endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqStats {
    pub stream_name: String,
    pub length: i64,
    pub oldest_entry_id: Option<String>,
    pub newest_entry_id: Option<String>,
}
