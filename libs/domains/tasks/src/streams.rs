//! Stream definitions for the tasks domain.
//!
//! This module defines Redis stream configuration for task lifecycle events
//! and due reminders.

use stream_worker::StreamDef;

/// Task lifecycle events stream definition.
///
/// Every task mutation publishes an event envelope here. The recurrence
/// worker consumes it to materialize the next occurrence of completed
/// recurring tasks.
pub struct TaskEventsStream;

impl StreamDef for TaskEventsStream {
    /// Stream name for task lifecycle events.
    const STREAM_NAME: &'static str = "task-events";

    /// Consumer group for the recurrence worker.
    const CONSUMER_GROUP: &'static str = "recurrence_materializer";

    /// Dead letter queue for events that could not be materialized.
    const DLQ_STREAM: &'static str = "task-events:dlq";

    /// Maximum stream length (100k entries).
    const MAX_LENGTH: i64 = 100_000;
}

/// Due reminders stream definition.
///
/// The reminder scheduler publishes one event per claimed reminder; the
/// notification worker consumes and delivers them.
pub struct RemindersStream;

impl StreamDef for RemindersStream {
    /// Stream name for due reminders.
    const STREAM_NAME: &'static str = "reminders";

    /// Consumer group for the notification worker.
    const CONSUMER_GROUP: &'static str = "notification_sink";

    /// Dead letter queue for undeliverable reminders.
    const DLQ_STREAM: &'static str = "reminders:dlq";

    /// Shorter max length for reminders (they should be consumed quickly).
    const MAX_LENGTH: i64 = 10_000;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_events_stream_def() {
        assert_eq!(TaskEventsStream::STREAM_NAME, "task-events");
        assert_eq!(TaskEventsStream::CONSUMER_GROUP, "recurrence_materializer");
        assert_eq!(TaskEventsStream::DLQ_STREAM, "task-events:dlq");
        assert_eq!(TaskEventsStream::MAX_LENGTH, 100_000);
    }

    #[test]
    fn test_reminders_stream_def() {
        assert_eq!(RemindersStream::STREAM_NAME, "reminders");
        assert_eq!(RemindersStream::CONSUMER_GROUP, "notification_sink");
        assert_eq!(RemindersStream::DLQ_STREAM, "reminders:dlq");
        assert_eq!(RemindersStream::MAX_LENGTH, 10_000);
    }
}
