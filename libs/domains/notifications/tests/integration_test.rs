//! Integration tests for the notifications domain
//!
//! Tests cover:
//! - Idempotent delivery against the real processed-event store
//! - Channel failures leaving no marker so redelivery can retry

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use domain_notifications::{
    Notification, NotificationChannel, NotificationError, NotificationResult, ReminderProcessor,
};
use domain_tasks::{EventType, PgProcessedEventStore, ProcessedEventStore, ReminderDueEvent};
use stream_worker::StreamProcessor;
use test_utils::{TestDataBuilder, TestDatabase};
use uuid::Uuid;

/// Channel that records every delivered notification.
#[derive(Default)]
struct RecordingChannel {
    sent: Mutex<Vec<Notification>>,
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    async fn send(&self, notification: &Notification) -> NotificationResult<()> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }

    async fn health_check(&self) -> NotificationResult<bool> {
        Ok(true)
    }
}

/// Channel that refuses every delivery.
struct FailingChannel;

#[async_trait]
impl NotificationChannel for FailingChannel {
    async fn send(&self, _notification: &Notification) -> NotificationResult<()> {
        Err(NotificationError::ChannelError(
            "delivery endpoint unavailable".to_string(),
        ))
    }

    fn name(&self) -> &'static str {
        "failing"
    }

    async fn health_check(&self) -> NotificationResult<bool> {
        Ok(false)
    }
}

fn reminder_event(builder: &TestDataBuilder, suffix: &str) -> ReminderDueEvent {
    ReminderDueEvent {
        event_id: Uuid::now_v7(),
        event_type: EventType::ReminderDue,
        task_id: Uuid::now_v7(),
        title: builder.name("reminder", suffix),
        due_at: Some(Utc.with_ymd_and_hms(2025, 7, 1, 9, 0, 0).unwrap()),
        remind_at: Some(Utc.with_ymd_and_hms(2025, 6, 30, 18, 0, 0).unwrap()),
        user_id: builder.user_id(),
        timestamp: Utc::now(),
        retry_count: 0,
    }
}

// ============================================================
// Idempotent delivery
// ============================================================

#[tokio::test]
async fn test_redelivered_reminder_notifies_once() {
    let db = TestDatabase::new().await;
    let builder = TestDataBuilder::from_test_name("redelivered_reminder");

    let channel = Arc::new(RecordingChannel::default());
    let store = Arc::new(PgProcessedEventStore::new(db.connection()));
    let processor = ReminderProcessor::with_arcs(Arc::clone(&channel), store);

    let event = reminder_event(&builder, "rent");

    // The bus may deliver the same event any number of times.
    processor.process(&event).await.unwrap();
    processor.process(&event).await.unwrap();
    processor.process(&event).await.unwrap();

    let sent = channel.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].task_id, event.task_id);
    assert_eq!(sent[0].user_id, event.user_id);
    assert_eq!(
        sent[0].message,
        format!(
            "Reminder: Task '{}' is due on 2025-07-01 09:00 (reminder set for 2025-06-30 18:00)",
            event.title
        )
    );
}

#[tokio::test]
async fn test_distinct_events_each_notify() {
    let db = TestDatabase::new().await;
    let builder = TestDataBuilder::from_test_name("distinct_events");

    let channel = Arc::new(RecordingChannel::default());
    let store = Arc::new(PgProcessedEventStore::new(db.connection()));
    let processor = ReminderProcessor::with_arcs(Arc::clone(&channel), store);

    processor
        .process(&reminder_event(&builder, "first"))
        .await
        .unwrap();
    processor
        .process(&reminder_event(&builder, "second"))
        .await
        .unwrap();

    assert_eq!(channel.sent.lock().unwrap().len(), 2);
}

// ============================================================
// Failure handling
// ============================================================

#[tokio::test]
async fn test_channel_failure_leaves_no_marker_so_retry_delivers() {
    let db = TestDatabase::new().await;
    let builder = TestDataBuilder::from_test_name("channel_failure_retry");

    let store: Arc<dyn ProcessedEventStore> =
        Arc::new(PgProcessedEventStore::new(db.connection()));
    let event = reminder_event(&builder, "flaky");

    // First delivery attempt fails at the channel.
    let failing = ReminderProcessor::new(FailingChannel, Arc::clone(&store));
    failing.process(&event).await.unwrap_err();

    // The redelivered event must still go out once the channel recovers.
    let channel = Arc::new(RecordingChannel::default());
    let recovered = ReminderProcessor::with_arcs(Arc::clone(&channel), store);
    recovered.process(&event).await.unwrap();
    recovered.process(&event).await.unwrap();

    assert_eq!(channel.sent.lock().unwrap().len(), 1);
}
