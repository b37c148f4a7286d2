//! Recurrence materializer for stream workers.
//!
//! This module provides the `RecurrenceProcessor` that implements
//! `StreamProcessor<TaskEventEnvelope>`: when a recurring task is completed,
//! it creates the next occurrence exactly once per event.

use std::sync::Arc;

use async_trait::async_trait;
use stream_worker::{StreamDef, StreamError, StreamProcessor};
use tracing::{debug, info, warn};

use crate::error::TaskError;
use crate::events::{EventType, TaskEventEnvelope};
use crate::models::CreateTask;
use crate::processed::ProcessedEventStore;
use crate::recurrence::{next_due_date, shifted_remind_at};
use crate::repository::TaskRepository;
use crate::service::TaskService;
use crate::streams::TaskEventsStream;

/// Materializes the next occurrence of completed recurring tasks.
///
/// Delivery is at-least-once, so every materialization is guarded by a
/// processed-event marker keyed on the envelope's `event_id`. The marker is
/// written after the child task exists: a crash in between redelivers the
/// event instead of silently dropping the occurrence.
pub struct RecurrenceProcessor<R: TaskRepository> {
    service: Arc<TaskService<R>>,
    store: Arc<dyn ProcessedEventStore>,
}

impl<R: TaskRepository + 'static> RecurrenceProcessor<R> {
    pub fn new(service: TaskService<R>, store: Arc<dyn ProcessedEventStore>) -> Self {
        Self {
            service: Arc::new(service),
            store,
        }
    }

    /// Build the next occurrence from the completed task snapshot.
    ///
    /// The child inherits title, description, tags, priority, and the
    /// recurrence rule. Its reminder keeps the parent's lead time relative
    /// to the due date, and `parent_task_id` links it back to the completed
    /// occurrence.
    fn next_occurrence(envelope: &TaskEventEnvelope) -> Option<CreateTask> {
        let task = &envelope.task_data;

        // Tasks without a due date step from the completion event's timestamp.
        let base = task.due_at.unwrap_or(envelope.timestamp);
        let next_due = next_due_date(base, task.recurrence)?;

        let remind_at = match (task.due_at, task.remind_at) {
            (Some(due), Some(remind)) => Some(shifted_remind_at(due, remind, next_due)),
            _ => None,
        };

        Some(CreateTask {
            title: task.title.clone(),
            description: task.description.clone(),
            priority: task.priority,
            tags: task.tags.clone(),
            due_at: Some(next_due),
            remind_at,
            recurrence: task.recurrence,
            parent_task_id: Some(task.id),
            user_id: task.user_id,
        })
    }
}

#[async_trait]
impl<R: TaskRepository + 'static> StreamProcessor<TaskEventEnvelope> for RecurrenceProcessor<R> {
    async fn process(&self, envelope: &TaskEventEnvelope) -> Result<(), StreamError> {
        // Cheap filters first: only completions of recurring tasks matter.
        if envelope.event_type != EventType::TaskCompleted {
            debug!(
                event_id = %envelope.event_id,
                event_type = ?envelope.event_type,
                "Ignoring non-completion event"
            );
            return Ok(());
        }
        if !envelope.task_data.recurrence.is_recurring() {
            debug!(
                event_id = %envelope.event_id,
                task_id = %envelope.task_id,
                "Completed task is not recurring"
            );
            return Ok(());
        }

        let consumer = TaskEventsStream::CONSUMER_GROUP;

        if self
            .store
            .is_handled(consumer, envelope.event_id)
            .await
            .map_err(|e| StreamError::transient(e.to_string()))?
        {
            debug!(event_id = %envelope.event_id, "Event already materialized; acking duplicate");
            return Ok(());
        }

        let Some(input) = Self::next_occurrence(envelope) else {
            // Recurrence filter passed, so only calendar overflow lands here.
            return Err(StreamError::permanent(
                "Recurrence step produced no next due date",
            ));
        };
        let next_due = input.due_at;

        let child = self.service.create_task(input).await.map_err(|e| match e {
            TaskError::Validation(msg) => {
                StreamError::permanent(format!("Invalid next occurrence: {}", msg))
            }
            other => StreamError::transient(other.to_string()),
        })?;

        info!(
            event_id = %envelope.event_id,
            parent_task_id = %envelope.task_id,
            child_task_id = %child.id,
            next_due = ?next_due,
            "Materialized next occurrence"
        );

        let newly = self
            .store
            .mark_handled(consumer, envelope.event_id)
            .await
            .map_err(|e| StreamError::transient(e.to_string()))?;
        if !newly {
            warn!(
                event_id = %envelope.event_id,
                "Idempotency marker already present after create; concurrent delivery suspected"
            );
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "RecurrenceProcessor"
    }

    async fn health_check(&self) -> Result<bool, StreamError> {
        self.service
            .count_tasks()
            .await
            .map(|_| true)
            .map_err(|e| StreamError::transient(e.to_string()))
    }
}

impl<R: TaskRepository> Clone for RecurrenceProcessor<R> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            store: Arc::clone(&self.store),
        }
    }
}
