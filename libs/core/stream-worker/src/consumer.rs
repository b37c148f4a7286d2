//! Consumer-group reads against a Redis Stream.
//!
//! `StreamConsumer` owns the XREADGROUP/XACK/XCLAIM plumbing and hands the
//! worker raw entries. Deserialization stays out of this layer on purpose:
//! the worker needs the raw payload to dead-letter malformed entries
//! instead of silently skipping them.

use std::sync::Arc;

use redis::aio::ConnectionManager;
use redis::streams::{
    StreamClaimReply, StreamId, StreamPendingCountReply, StreamPendingReply, StreamReadOptions,
    StreamReadReply,
};
use redis::{AsyncCommands, RedisResult};
use tracing::{debug, info, warn};

use crate::config::WorkerConfig;
use crate::error::StreamError;
use crate::registry::MessageKey;

/// An undeserialized stream entry.
///
/// `payload` is the value of the `job` field; entries that lack the field
/// surface with an empty payload so the worker can dead-letter them.
#[derive(Debug, Clone)]
pub struct RawEvent {
    /// Redis entry id, e.g. `1234567890123-0`.
    pub id: String,
    pub payload: String,
}

impl RawEvent {
    fn from_stream_id(entry: StreamId) -> Self {
        let payload = match entry.map.get(MessageKey::Job.as_ref()) {
            Some(redis::Value::BulkString(bytes)) => String::from_utf8_lossy(bytes).to_string(),
            Some(redis::Value::SimpleString(text)) => text.clone(),
            _ => {
                warn!(
                    stream_id = %entry.id,
                    fields = ?entry.map.keys().collect::<Vec<_>>(),
                    "Entry has no usable job field"
                );
                String::new()
            }
        };
        Self {
            id: entry.id,
            payload,
        }
    }
}

/// Length and backlog of a stream, for readiness checks and gauges.
#[derive(Debug, Clone)]
pub struct StreamInfo {
    pub length: i64,
    pub pending_count: i64,
}

/// Reads entries from one stream on behalf of one consumer-group member.
///
/// Cheap to clone; every method checks out its own multiplexed connection.
#[derive(Clone)]
pub struct StreamConsumer {
    redis: Arc<ConnectionManager>,
    config: WorkerConfig,
}

impl StreamConsumer {
    pub fn new(redis: Arc<ConnectionManager>, config: WorkerConfig) -> Self {
        Self { redis, config }
    }

    fn conn(&self) -> ConnectionManager {
        (*self.redis).clone()
    }

    /// Creates the consumer group, and the stream itself if it does not
    /// exist yet. Safe to call from every worker replica on startup.
    pub async fn init_consumer_group(&self) -> Result<(), StreamError> {
        let mut conn = self.conn();

        let created: RedisResult<()> = conn
            .xgroup_create_mkstream(&self.config.stream_name, &self.config.consumer_group, "0")
            .await;

        match created {
            Ok(()) => {
                info!(
                    stream = %self.config.stream_name,
                    group = %self.config.consumer_group,
                    "Created consumer group"
                );
                Ok(())
            }
            // Another replica got there first
            Err(e) if e.to_string().contains("BUSYGROUP") => Ok(()),
            Err(e) => Err(StreamError::Redis(e)),
        }
    }

    /// Re-reads entries this consumer was delivered but never acked,
    /// e.g. after a crash mid-batch. Does not block.
    pub async fn read_pending(&self, count: usize) -> Result<Vec<RawEvent>, StreamError> {
        self.read_group("0", None, count).await
    }

    /// Reads entries nobody in the group has seen, blocking up to the
    /// configured timeout when the stream is idle.
    pub async fn read_new(&self, count: usize) -> Result<Vec<RawEvent>, StreamError> {
        self.read_group(">", self.config.blocking_timeout_ms, count)
            .await
    }

    async fn read_group(
        &self,
        cursor: &str,
        block_ms: Option<u64>,
        count: usize,
    ) -> Result<Vec<RawEvent>, StreamError> {
        let mut conn = self.conn();

        let mut opts = StreamReadOptions::default()
            .group(&self.config.consumer_group, &self.config.consumer_id)
            .count(count);
        if let Some(ms) = block_ms {
            opts = opts.block(ms as usize);
        }

        // Nil reply on blocking timeout decodes as None
        let reply: RedisResult<Option<StreamReadReply>> = conn
            .xread_options(&[&self.config.stream_name], &[cursor], &opts)
            .await;

        match reply {
            Ok(Some(reply)) => Ok(Self::flatten(reply)),
            Ok(None) => Ok(Vec::new()),
            // Group missing; the worker recreates it and retries the read
            Err(e) if is_nogroup(&e) => Ok(Vec::new()),
            Err(e) => Err(StreamError::Redis(e)),
        }
    }

    /// Acknowledges one entry, removing it from this group's pending list.
    pub async fn ack(&self, stream_id: &str) -> Result<(), StreamError> {
        let mut conn = self.conn();
        let _: i64 = conn
            .xack(
                &self.config.stream_name,
                &self.config.consumer_group,
                &[stream_id],
            )
            .await?;
        debug!(stream_id = %stream_id, "Acked");
        Ok(())
    }

    /// Takes over entries another consumer read but left unacked longer
    /// than the claim timeout. Claimed entries re-enter this consumer's
    /// pending list, so a second crash still cannot lose them.
    pub async fn claim_abandoned(&self, count: usize) -> Result<Vec<RawEvent>, StreamError> {
        let mut conn = self.conn();

        let pending: RedisResult<StreamPendingCountReply> = conn
            .xpending_count(
                &self.config.stream_name,
                &self.config.consumer_group,
                "-",
                "+",
                count,
            )
            .await;

        let rows = match pending {
            Ok(reply) => reply.ids,
            Err(e) if is_nogroup(&e) => return Ok(Vec::new()),
            Err(e) => return Err(StreamError::Redis(e)),
        };

        let stale: Vec<String> = rows
            .into_iter()
            .filter(|row| row.last_delivered_ms as u64 > self.config.claim_timeout_ms)
            .map(|row| row.id)
            .collect();

        if stale.is_empty() {
            return Ok(Vec::new());
        }

        let claimed: StreamClaimReply = conn
            .xclaim(
                &self.config.stream_name,
                &self.config.consumer_group,
                &self.config.consumer_id,
                self.config.claim_timeout_ms,
                &stale,
            )
            .await?;

        let events: Vec<RawEvent> = claimed
            .ids
            .into_iter()
            .map(RawEvent::from_stream_id)
            .collect();
        if !events.is_empty() {
            warn!(
                count = events.len(),
                stream = %self.config.stream_name,
                "Claimed abandoned entries"
            );
        }
        Ok(events)
    }

    /// Snapshot of stream length and group backlog. A missing group reads
    /// as zero pending rather than an error.
    pub async fn stream_info(&self) -> Result<StreamInfo, StreamError> {
        let mut conn = self.conn();

        let length: i64 = conn.xlen(&self.config.stream_name).await?;
        let pending: RedisResult<StreamPendingReply> = conn
            .xpending(&self.config.stream_name, &self.config.consumer_group)
            .await;

        Ok(StreamInfo {
            length,
            pending_count: pending.map(|reply| reply.count() as i64).unwrap_or(0),
        })
    }

    fn flatten(reply: StreamReadReply) -> Vec<RawEvent> {
        reply
            .keys
            .into_iter()
            .flat_map(|stream| stream.ids)
            .map(RawEvent::from_stream_id)
            .collect()
    }
}

fn is_nogroup(err: &redis::RedisError) -> bool {
    err.to_string().contains("NOGROUP")
}
