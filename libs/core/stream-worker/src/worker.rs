//! The `StreamProcessor` trait and the generic `StreamWorker` run loop.
//!
//! The worker owns the full delivery lifecycle: reading batches from the
//! consumer group, deserializing payloads, dispatching to the processor, and
//! mapping outcomes to acknowledgements, retries, or dead-lettering.
//!
//! Outcome mapping:
//! - `Ok(())` - acknowledge
//! - transient error, retries left - wait out the backoff, requeue with an
//!   incremented retry count, acknowledge the original entry
//! - transient error, retries exhausted - move to DLQ, acknowledge
//! - permanent error - move to DLQ immediately, acknowledge
//! - undeserializable payload - move the raw payload to DLQ, acknowledge

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::WorkerConfig;
use crate::consumer::{RawEvent, StreamConsumer};
use crate::dlq::DlqManager;
use crate::error::{ErrorCategory, StreamError};
use crate::metrics::StreamMetrics;
use crate::producer::StreamProducer;
use crate::registry::StreamJob;

/// Longest pause between read attempts while Redis is unreachable.
const MAX_READ_PAUSE_SECS: u64 = 30;

/// Domain logic plugged into a [`StreamWorker`].
///
/// Implementations see fully deserialized jobs; the transport, retry, and
/// dead-letter machinery stays on the worker side.
///
/// ```ignore
/// #[async_trait]
/// impl StreamProcessor<ReminderDueEvent> for ReminderProcessor {
///     async fn process(&self, event: &ReminderDueEvent) -> Result<(), StreamError> {
///         self.channel.deliver(event).await
///     }
///
///     fn name(&self) -> &'static str {
///         "ReminderProcessor"
///     }
/// }
/// ```
#[async_trait]
pub trait StreamProcessor<J: StreamJob>: Send + Sync {
    /// Handle one job.
    ///
    /// The returned error's [`ErrorCategory`] decides what happens next:
    /// transient failures are requeued with backoff until the retry budget
    /// runs out, permanent ones go straight to the DLQ.
    async fn process(&self, job: &J) -> Result<(), StreamError>;

    /// Name used in logs and as the `processor` metric label.
    fn name(&self) -> &'static str;

    /// Startup probe. A failure is logged but does not stop the worker.
    async fn health_check(&self) -> Result<bool, StreamError> {
        Ok(true)
    }
}

/// Drives a [`StreamProcessor`] against one stream's consumer group.
///
/// A worker owns the whole delivery path for its stream: group creation,
/// batch reads, redelivery of abandoned entries, bounded-concurrency
/// dispatch, retry requeues, and dead-lettering. [`StreamWorker::run`]
/// loops until the shutdown channel flips to `true`.
pub struct StreamWorker<J, P>
where
    J: StreamJob,
    P: StreamProcessor<J>,
{
    config: WorkerConfig,
    consumer: StreamConsumer,
    /// Requeue path for retried jobs, pointed back at the source stream
    producer: StreamProducer,
    dlq: DlqManager,
    processor: Arc<P>,
    /// Caps jobs inside `process` at `max_concurrent_jobs`
    semaphore: Arc<Semaphore>,
    metrics: StreamMetrics,
    _marker: PhantomData<J>,
}

impl<J, P> StreamWorker<J, P>
where
    J: StreamJob + 'static,
    P: StreamProcessor<J> + 'static,
{
    /// Wire up the consumer, requeue producer, and DLQ for `config`'s stream.
    pub fn new(redis: ConnectionManager, processor: P, config: WorkerConfig) -> Self {
        let redis = Arc::new(redis);
        let processor = Arc::new(processor);
        let metrics = StreamMetrics::new(config.stream_name.clone(), processor.name());

        Self {
            consumer: StreamConsumer::new(redis.clone(), config.clone()),
            producer: StreamProducer::from_arc(redis.clone(), config.stream_name.clone())
                .with_max_length(config.max_length),
            dlq: DlqManager::new(redis, config.stream_name.clone(), config.dlq_stream.clone()),
            processor,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_jobs)),
            metrics,
            config,
            _marker: PhantomData,
        }
    }

    /// Read and process until `shutdown` carries `true`.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), StreamError> {
        info!(
            processor = %self.processor.name(),
            stream = %self.config.stream_name,
            group = %self.config.consumer_group,
            consumer_id = %self.config.consumer_id,
            "Stream worker starting"
        );

        self.consumer.init_consumer_group().await?;

        if !matches!(self.processor.health_check().await, Ok(true)) {
            warn!(
                processor = %self.processor.name(),
                "Processor health check failed at startup"
            );
        }

        self.drain_own_pending().await;

        let blocking = self.config.is_blocking();
        if blocking {
            info!(
                block_ms = ?self.config.blocking_timeout_ms,
                batch_size = %self.config.batch_size,
                max_concurrent_jobs = %self.config.max_concurrent_jobs,
                "Reads block server-side; no poll sleep"
            );
        } else {
            info!(
                poll_ms = %self.config.poll_interval_ms,
                batch_size = %self.config.batch_size,
                max_concurrent_jobs = %self.config.max_concurrent_jobs,
                "Sleeping between polls"
            );
        }

        let poll_pause = Duration::from_millis(self.config.poll_interval_ms);
        let claim_every = Duration::from_millis(self.config.claim_timeout_ms * 2);
        let mut last_claim_at = Instant::now();
        let mut read_errors: u32 = 0;

        while !*shutdown.borrow() {
            match self.consumer.read_new(self.config.batch_size).await {
                Ok(events) => {
                    if read_errors > 0 {
                        info!(failed_reads = %read_errors, "Stream reads recovered");
                        read_errors = 0;
                    }
                    if !events.is_empty() {
                        self.dispatch(events).await;
                    }
                }
                Err(e) => {
                    read_errors += 1;
                    self.pause_after_read_error(&e, read_errors).await;
                    continue;
                }
            }

            if last_claim_at.elapsed() >= claim_every {
                self.claim_and_refresh().await;
                last_claim_at = Instant::now();
            }

            // In blocking mode XREADGROUP already waited server-side
            if !blocking {
                tokio::select! {
                    _ = shutdown.changed() => {}
                    _ = tokio::time::sleep(poll_pause) => {}
                }
            }
        }

        info!("Shutdown signal received, stream worker stopped");
        Ok(())
    }

    /// Redeliver entries this consumer left unacknowledged in a previous run.
    async fn drain_own_pending(&self) {
        loop {
            match self.consumer.read_pending(self.config.batch_size).await {
                Ok(batch) if batch.is_empty() => return,
                Ok(batch) => {
                    info!(count = batch.len(), "Redelivering entries from a previous run");
                    self.dispatch(batch).await;
                }
                Err(e) => {
                    warn!(error = %e, "Could not read own pending entries");
                    return;
                }
            }
        }
    }

    /// Back off after a failed read, recreating the group if it vanished.
    async fn pause_after_read_error(&self, error: &StreamError, read_errors: u32) {
        if error.is_nogroup() {
            warn!("Consumer group vanished, recreating");
            if let Err(group_err) = self.consumer.init_consumer_group().await {
                error!(error = %group_err, "Could not recreate consumer group");
            }
        } else if error.is_connection_error() {
            let pause_secs = 2u64.pow(read_errors.min(5)).min(MAX_READ_PAUSE_SECS);
            warn!(
                error = %error,
                failed_reads = %read_errors,
                pause_secs = %pause_secs,
                "Redis unreachable, pausing reads"
            );
            tokio::time::sleep(Duration::from_secs(pause_secs)).await;
        } else {
            error!(error = %error, "Stream read failed");
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }

    /// Take over entries other consumers abandoned, then refresh depth gauges.
    async fn claim_and_refresh(&self) {
        match self.consumer.claim_abandoned(self.config.batch_size).await {
            Ok(claimed) if !claimed.is_empty() => {
                for _ in &claimed {
                    self.metrics.message_claimed();
                }
                self.dispatch(claimed).await;
            }
            Ok(_) => {}
            Err(e) => debug!(error = %e, "Claim cycle failed"),
        }

        if let Ok(info) = self.consumer.stream_info().await {
            self.metrics.stream_depth(info.length);
            self.metrics.pending_count(info.pending_count);
        }
    }

    /// Deserialize a batch and process the jobs, bounded by the semaphore.
    ///
    /// Payloads that fail to deserialize never reach the processor; they are
    /// dead-lettered verbatim and acknowledged here.
    async fn dispatch(&self, events: Vec<RawEvent>) {
        let mut join_set: JoinSet<()> = JoinSet::new();

        for event in events {
            self.metrics.job_received();

            let job: J = match serde_json::from_str(&event.payload) {
                Ok(job) => job,
                Err(e) => {
                    self.handle_malformed(&event, &e.to_string()).await;
                    continue;
                }
            };

            let semaphore = Arc::clone(&self.semaphore);
            let processor = Arc::clone(&self.processor);
            let consumer = self.consumer.clone();
            let producer = self.producer.clone();
            let dlq = self.dlq.clone();
            let metrics = self.metrics.clone();
            let entry_id = event.id;

            join_set.spawn(async move {
                let elapsed;
                let result = {
                    // Hold the permit only while the processor runs; retry
                    // backoff sleeps must not starve other jobs
                    let _permit = semaphore.acquire().await.expect("Semaphore closed");
                    let start = Instant::now();
                    let result = processor.process(&job).await;
                    elapsed = start.elapsed();
                    result
                };

                match result {
                    Ok(()) => {
                        metrics.job_processed(elapsed);
                        if let Err(e) = consumer.ack(&entry_id).await {
                            error!(entry_id = %entry_id, error = %e, "Failed to ACK entry");
                        }
                    }
                    Err(e) => {
                        metrics.job_failed(e.category().as_str());
                        warn!(
                            entry_id = %entry_id,
                            job_id = %job.job_id(),
                            retry_count = %job.retry_count(),
                            error = %e,
                            error_category = ?e.category(),
                            "Processor returned an error"
                        );

                        if let Err(handler_err) = Self::handle_failure(
                            &job, e, &entry_id, &consumer, &producer, &dlq, &metrics,
                        )
                        .await
                        {
                            // Leave the entry pending; the claim cycle redelivers it
                            error!(
                                entry_id = %entry_id,
                                error = %handler_err,
                                "Failed to handle job error"
                            );
                        }
                    }
                }
            });
        }

        // Wait for the batch to complete
        while join_set.join_next().await.is_some() {}
    }

    /// Map a processing failure to a retry requeue or a DLQ move.
    async fn handle_failure(
        job: &J,
        failure: StreamError,
        entry_id: &str,
        consumer: &StreamConsumer,
        producer: &StreamProducer,
        dlq: &DlqManager,
        metrics: &StreamMetrics,
    ) -> Result<(), StreamError> {
        let dead_letter_reason = if failure.category() == ErrorCategory::Permanent {
            Some("permanent error")
        } else if job.exceeded_max_retries(job.max_retries()) {
            Some("retry budget spent")
        } else {
            None
        };

        if let Some(reason) = dead_letter_reason {
            warn!(
                job_id = %job.job_id(),
                retry_count = %job.retry_count(),
                reason = %reason,
                "Dead-lettering job"
            );
            metrics.job_moved_to_dlq();
            dlq.move_to_dlq(job, &failure.to_string(), entry_id).await?;
            consumer.ack(entry_id).await?;
            return Ok(());
        }

        let delay_ms = failure.backoff_delay_ms(job.retry_count());
        metrics.job_retried();
        info!(
            job_id = %job.job_id(),
            next_attempt = %(job.retry_count() + 1),
            delay_ms = %delay_ms,
            "Requeueing after backoff"
        );
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;

        producer.send(&job.with_retry()).await?;
        consumer.ack(entry_id).await?;
        Ok(())
    }

    /// Dead-letter a payload that failed to deserialize.
    async fn handle_malformed(&self, event: &RawEvent, error: &str) {
        warn!(
            stream_id = %event.id,
            error = %error,
            "Undeserializable payload, dead-lettering verbatim"
        );
        self.metrics.job_failed("malformed");

        match self.dlq.move_raw(&event.payload, error, &event.id).await {
            Ok(_) => {
                self.metrics.job_moved_to_dlq();
                if let Err(e) = self.consumer.ack(&event.id).await {
                    error!(stream_id = %event.id, error = %e, "Failed to ACK malformed entry");
                }
            }
            Err(e) => {
                // Leave the entry pending; the claim cycle retries the DLQ move
                error!(
                    stream_id = %event.id,
                    error = %e,
                    "Failed to move malformed payload to DLQ"
                );
            }
        }
    }
}
