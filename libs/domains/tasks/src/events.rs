//! Task lifecycle event envelopes.
//!
//! This module defines the payloads published to the `task-events` and
//! `reminders` streams. Envelopes carry a full task snapshot so consumers
//! never have to read the database to interpret an event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stream_worker::{StreamDef, StreamJob};
use uuid::Uuid;

use crate::models::Task;
use crate::streams::{RemindersStream, TaskEventsStream};

/// Event types emitted by the task service and the reminder scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "task.created")]
    TaskCreated,
    #[serde(rename = "task.updated")]
    TaskUpdated,
    #[serde(rename = "task.completed")]
    TaskCompleted,
    #[serde(rename = "task.deleted")]
    TaskDeleted,
    #[serde(rename = "reminder.due")]
    ReminderDue,
}

impl EventType {
    /// The stream this event type is published to.
    pub fn topic(&self) -> &'static str {
        match self {
            EventType::TaskCreated
            | EventType::TaskUpdated
            | EventType::TaskCompleted
            | EventType::TaskDeleted => TaskEventsStream::STREAM_NAME,
            EventType::ReminderDue => RemindersStream::STREAM_NAME,
        }
    }
}

fn is_zero(count: &u32) -> bool {
    *count == 0
}

/// Envelope for a task lifecycle event.
///
/// This is the job type that flows through the task-events stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEventEnvelope {
    /// Unique event ID, also the idempotency key for consumers.
    pub event_id: Uuid,
    /// What happened to the task.
    pub event_type: EventType,
    /// ID of the affected task.
    pub task_id: Uuid,
    /// Full snapshot of the task at publish time.
    pub task_data: Task,
    /// Owner of the task.
    pub user_id: Uuid,
    /// Publish timestamp (UTC).
    pub timestamp: DateTime<Utc>,
    /// Current retry count.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub retry_count: u32,
}

impl TaskEventEnvelope {
    /// Create a new envelope around a task snapshot.
    pub fn new(event_type: EventType, task: &Task) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            event_type,
            task_id: task.id,
            task_data: task.clone(),
            user_id: task.user_id,
            timestamp: Utc::now(),
            retry_count: 0,
        }
    }
}

impl StreamJob for TaskEventEnvelope {
    fn job_id(&self) -> String {
        self.event_id.to_string()
    }

    fn retry_count(&self) -> u32 {
        self.retry_count
    }

    fn with_retry(&self) -> Self {
        Self {
            event_id: self.event_id, // Keep same ID for retries
            retry_count: self.retry_count + 1,
            ..self.clone()
        }
    }

    fn max_retries(&self) -> u32 {
        3
    }
}

/// Event published when a task's reminder comes due.
///
/// This is the job type that flows through the reminders stream. It carries
/// only what the notification needs, not the full task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderDueEvent {
    /// Unique event ID, also the idempotency key for consumers.
    pub event_id: Uuid,
    /// Always [`EventType::ReminderDue`].
    pub event_type: EventType,
    /// ID of the task whose reminder fired.
    pub task_id: Uuid,
    /// Task title at claim time.
    pub title: String,
    pub due_at: Option<DateTime<Utc>>,
    pub remind_at: Option<DateTime<Utc>>,
    /// Owner of the task.
    pub user_id: Uuid,
    /// Publish timestamp (UTC).
    pub timestamp: DateTime<Utc>,
    /// Current retry count.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub retry_count: u32,
}

impl ReminderDueEvent {
    /// Create a reminder event from a claimed task.
    pub fn new(task: &Task) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            event_type: EventType::ReminderDue,
            task_id: task.id,
            title: task.title.clone(),
            due_at: task.due_at,
            remind_at: task.remind_at,
            user_id: task.user_id,
            timestamp: Utc::now(),
            retry_count: 0,
        }
    }
}

impl StreamJob for ReminderDueEvent {
    fn job_id(&self) -> String {
        self.event_id.to_string()
    }

    fn retry_count(&self) -> u32 {
        self.retry_count
    }

    fn with_retry(&self) -> Self {
        Self {
            event_id: self.event_id, // Keep same ID for retries
            retry_count: self.retry_count + 1,
            ..self.clone()
        }
    }

    fn max_retries(&self) -> u32 {
        3
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Recurrence, TaskPriority};

    fn sample_task() -> Task {
        Task {
            id: Uuid::now_v7(),
            title: "Pay rent".to_string(),
            description: String::new(),
            completed: true,
            priority: TaskPriority::High,
            tags: vec![],
            due_at: Some(Utc::now()),
            remind_at: Some(Utc::now()),
            reminder_dispatched: false,
            recurrence: Recurrence::Monthly,
            parent_task_id: None,
            user_id: Uuid::now_v7(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_event_type_topics() {
        assert_eq!(EventType::TaskCreated.topic(), "task-events");
        assert_eq!(EventType::TaskCompleted.topic(), "task-events");
        assert_eq!(EventType::ReminderDue.topic(), "reminders");
    }

    #[test]
    fn test_envelope_carries_full_snapshot() {
        let task = sample_task();
        let envelope = TaskEventEnvelope::new(EventType::TaskCompleted, &task);

        assert_eq!(envelope.task_id, task.id);
        assert_eq!(envelope.user_id, task.user_id);
        assert_eq!(envelope.task_data, task);
        assert_eq!(envelope.retry_count, 0);
    }

    #[test]
    fn test_envelope_stream_job() {
        let envelope = TaskEventEnvelope::new(EventType::TaskUpdated, &sample_task());

        assert_eq!(envelope.job_id(), envelope.event_id.to_string());
        assert_eq!(envelope.max_retries(), 3);

        let retry = envelope.with_retry();
        assert_eq!(retry.retry_count(), 1);
        assert_eq!(retry.event_id, envelope.event_id); // Same ID for retries
    }

    #[test]
    fn test_envelope_wire_format() {
        let envelope = TaskEventEnvelope::new(EventType::TaskCompleted, &sample_task());
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&envelope).unwrap()).unwrap();

        assert_eq!(json["event_type"], "task.completed");
        assert!(json["event_id"].is_string());
        assert!(json["task_id"].is_string());
        assert!(json["task_data"].is_object());
        assert!(json["timestamp"].is_string());
        // retry_count is omitted on first publish
        assert!(json.get("retry_count").is_none());

        let retried = envelope.with_retry();
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&retried).unwrap()).unwrap();
        assert_eq!(json["retry_count"], 1);
    }

    #[test]
    fn test_reminder_event_from_task() {
        let task = sample_task();
        let event = ReminderDueEvent::new(&task);

        assert_eq!(event.event_type, EventType::ReminderDue);
        assert_eq!(event.task_id, task.id);
        assert_eq!(event.title, task.title);
        assert_eq!(event.due_at, task.due_at);
        assert_eq!(event.remind_at, task.remind_at);

        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&event).unwrap()).unwrap();
        assert_eq!(json["event_type"], "reminder.due");
        assert_eq!(json["title"], task.title);
    }
}
