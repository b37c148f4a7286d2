//! Event publishing to Redis streams.
//!
//! The task service publishes lifecycle events and the reminder scheduler
//! publishes due reminders through [`EventPublisher`]. The trait exists so
//! services can be tested without Redis.

use std::sync::Arc;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use stream_worker::StreamProducer;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::events::{ReminderDueEvent, TaskEventEnvelope};
use crate::streams::{RemindersStream, TaskEventsStream};

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Stream transport error: {0}")]
    Transport(String),
}

/// Publisher for task lifecycle and reminder events
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a task lifecycle event to the task-events stream.
    async fn publish_task_event(&self, envelope: &TaskEventEnvelope) -> Result<(), PublishError>;

    /// Publish a due reminder to the reminders stream.
    async fn publish_reminder(&self, event: &ReminderDueEvent) -> Result<(), PublishError>;
}

/// Whether event publishing is enabled for this process.
///
/// `EVENTS_ENABLED=false` (or `0`) turns publishing into a no-op so the CRUD
/// path keeps working when Redis is down or absent.
fn events_enabled() -> bool {
    let value = core_config::env_or_default("EVENTS_ENABLED", "true");
    !matches!(value.to_ascii_lowercase().as_str(), "false" | "0")
}

/// Redis Streams implementation of [`EventPublisher`].
pub struct StreamEventPublisher {
    task_events: StreamProducer,
    reminders: StreamProducer,
    enabled: bool,
}

impl StreamEventPublisher {
    /// Create a publisher for both domain streams over one shared connection.
    pub fn new(redis: ConnectionManager) -> Self {
        let redis = Arc::new(redis);
        Self {
            task_events: StreamProducer::from_arc_with_stream_def::<TaskEventsStream>(
                redis.clone(),
            ),
            reminders: StreamProducer::from_arc_with_stream_def::<RemindersStream>(redis),
            enabled: events_enabled(),
        }
    }

    /// Override the `EVENTS_ENABLED` kill-switch (used in tests).
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

#[async_trait]
impl EventPublisher for StreamEventPublisher {
    #[instrument(
        skip(self, envelope),
        fields(event_id = %envelope.event_id, event_type = ?envelope.event_type)
    )]
    async fn publish_task_event(&self, envelope: &TaskEventEnvelope) -> Result<(), PublishError> {
        if !self.enabled {
            debug!("Event publishing disabled, dropping task event");
            return Ok(());
        }

        let message_id = self
            .task_events
            .send(envelope)
            .await
            .map_err(|e| PublishError::Transport(e.to_string()))?;

        debug!(%message_id, "Published task event");
        Ok(())
    }

    #[instrument(skip(self, event), fields(event_id = %event.event_id, task_id = %event.task_id))]
    async fn publish_reminder(&self, event: &ReminderDueEvent) -> Result<(), PublishError> {
        if !self.enabled {
            debug!("Event publishing disabled, dropping reminder");
            return Ok(());
        }

        let message_id = self
            .reminders
            .send(event)
            .await
            .map_err(|e| PublishError::Transport(e.to_string()))?;

        debug!(%message_id, "Published reminder");
        Ok(())
    }
}
