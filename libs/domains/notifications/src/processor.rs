//! Reminder processor for stream workers.
//!
//! This module provides the `ReminderProcessor` that implements
//! `StreamProcessor<ReminderDueEvent>`: every reminder event is delivered
//! through the configured channel exactly once per `event_id`.

use std::sync::Arc;

use async_trait::async_trait;
use domain_tasks::{ProcessedEventStore, ReminderDueEvent, RemindersStream};
use stream_worker::{StreamDef, StreamError, StreamProcessor};
use tracing::{debug, info, warn};

use crate::channel::NotificationChannel;
use crate::models::Notification;

/// Delivers reminder notifications from the reminders stream.
///
/// Delivery is at-least-once, so every send is guarded by a processed-event
/// marker keyed on the event's `event_id`. The marker is written after the
/// channel accepted the notification: a crash in between redelivers the event
/// instead of silently dropping the reminder.
pub struct ReminderProcessor<C: NotificationChannel> {
    channel: Arc<C>,
    store: Arc<dyn ProcessedEventStore>,
}

impl<C: NotificationChannel + 'static> ReminderProcessor<C> {
    pub fn new(channel: C, store: Arc<dyn ProcessedEventStore>) -> Self {
        Self {
            channel: Arc::new(channel),
            store,
        }
    }

    /// Create a processor with an Arc-wrapped channel.
    pub fn with_arcs(channel: Arc<C>, store: Arc<dyn ProcessedEventStore>) -> Self {
        Self { channel, store }
    }
}

#[async_trait]
impl<C: NotificationChannel + 'static> StreamProcessor<ReminderDueEvent> for ReminderProcessor<C> {
    async fn process(&self, event: &ReminderDueEvent) -> Result<(), StreamError> {
        let consumer = RemindersStream::CONSUMER_GROUP;

        if self
            .store
            .is_handled(consumer, event.event_id)
            .await
            .map_err(|e| StreamError::transient(e.to_string()))?
        {
            debug!(event_id = %event.event_id, "Reminder already delivered; acking duplicate");
            return Ok(());
        }

        let notification = Notification::from_reminder(event);

        self.channel
            .send(&notification)
            .await
            .map_err(|e| StreamError::transient(e.to_string()))?;

        info!(
            event_id = %event.event_id,
            task_id = %event.task_id,
            user_id = %event.user_id,
            channel = %self.channel.name(),
            "Delivered reminder notification"
        );

        let newly = self
            .store
            .mark_handled(consumer, event.event_id)
            .await
            .map_err(|e| StreamError::transient(e.to_string()))?;
        if !newly {
            warn!(
                event_id = %event.event_id,
                "Idempotency marker already present after send; concurrent delivery suspected"
            );
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "ReminderProcessor"
    }

    async fn health_check(&self) -> Result<bool, StreamError> {
        self.channel
            .health_check()
            .await
            .map_err(|e| StreamError::transient(e.to_string()))
    }
}

impl<C: NotificationChannel> Clone for ReminderProcessor<C> {
    fn clone(&self) -> Self {
        Self {
            channel: Arc::clone(&self.channel),
            store: Arc::clone(&self.store),
        }
    }
}
