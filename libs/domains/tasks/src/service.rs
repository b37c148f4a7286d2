use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use crate::error::{TaskError, TaskResult};
use crate::events::{EventType, TaskEventEnvelope};
use crate::models::{CreateTask, Task, TaskFilter, UpdateTask};
use crate::publisher::EventPublisher;
use crate::repository::TaskRepository;

/// Task operations behind validation and event publishing.
///
/// Wraps a repository with validation and event publishing. Events are
/// published only after the database write commits, and a publish failure
/// never fails the operation: consumers are built for at-least-once
/// delivery, not for phantom events about writes that never happened.
pub struct TaskService<R: TaskRepository> {
    repository: Arc<R>,
    publisher: Option<Arc<dyn EventPublisher>>,
}

impl<R: TaskRepository> Clone for TaskService<R> {
    fn clone(&self) -> Self {
        Self {
            repository: self.repository.clone(),
            publisher: self.publisher.clone(),
        }
    }
}

impl<R: TaskRepository> TaskService<R> {
    /// Create a service without event publishing (tests, offline tools).
    pub fn new(repository: R) -> Self {
        Self {
            repository: Arc::new(repository),
            publisher: None,
        }
    }

    /// Create a service that publishes lifecycle events.
    pub fn with_publisher(repository: R, publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            repository: Arc::new(repository),
            publisher: Some(publisher),
        }
    }

    /// Validate and persist a new task, emitting `task.created`.
    #[instrument(skip_all, fields(title = %input.title))]
    pub async fn create_task(&self, input: CreateTask) -> TaskResult<Task> {
        input.validate().map_err(|e| TaskError::Validation(e.to_string()))?;

        let task = self.repository.create(input).await?;
        self.publish(EventType::TaskCreated, &task).await;
        Ok(task)
    }

    #[instrument(skip_all, fields(task_id = %id))]
    pub async fn get_task(&self, id: Uuid) -> TaskResult<Task> {
        self.repository.get_by_id(id).await?.ok_or(TaskError::NotFound(id))
    }

    pub async fn list_tasks(&self, filter: TaskFilter) -> TaskResult<Vec<Task>> {
        self.repository.list(filter).await
    }

    /// Apply a partial update to an existing task.
    ///
    /// A `false -> true` flip of `completed` emits `task.completed`;
    /// every other change (including re-completing an already completed
    /// task) emits `task.updated`.
    #[instrument(skip_all, fields(task_id = %id))]
    pub async fn update_task(&self, id: Uuid, input: UpdateTask) -> TaskResult<Task> {
        input.validate().map_err(|e| TaskError::Validation(e.to_string()))?;

        let previous = self
            .repository
            .get_by_id(id)
            .await?
            .ok_or(TaskError::NotFound(id))?;

        let task = self.repository.update(id, input).await?;

        let event_type = if !previous.completed && task.completed {
            EventType::TaskCompleted
        } else {
            EventType::TaskUpdated
        };
        self.publish(event_type, &task).await;
        Ok(task)
    }

    /// Delete a task. The `task.deleted` event carries the last snapshot
    /// taken before the row was removed.
    #[instrument(skip_all, fields(task_id = %id))]
    pub async fn delete_task(&self, id: Uuid) -> TaskResult<()> {
        let snapshot = self
            .repository
            .get_by_id(id)
            .await?
            .ok_or(TaskError::NotFound(id))?;

        let deleted = self.repository.delete(id).await?;
        if !deleted {
            return Err(TaskError::NotFound(id));
        }

        self.publish(EventType::TaskDeleted, &snapshot).await;
        Ok(())
    }

    /// Completion shorthand over [`TaskService::update_task`].
    pub async fn complete_task(&self, id: Uuid) -> TaskResult<Task> {
        self.update_task(id, UpdateTask::completed(true)).await
    }

    pub async fn uncomplete_task(&self, id: Uuid) -> TaskResult<Task> {
        self.update_task(id, UpdateTask::completed(false)).await
    }

    pub async fn count_tasks(&self) -> TaskResult<usize> {
        self.repository.count().await
    }

    pub async fn count_tasks_by_user(&self, user_id: Uuid) -> TaskResult<usize> {
        self.repository.count_by_user(user_id).await
    }

    /// Publish a lifecycle event. Failures are logged, never propagated.
    async fn publish(&self, event_type: EventType, task: &Task) {
        let Some(publisher) = &self.publisher else {
            return;
        };

        let envelope = TaskEventEnvelope::new(event_type, task);
        if let Err(e) = publisher.publish_task_event(&envelope).await {
            tracing::warn!(
                event_id = %envelope.event_id,
                task_id = %task.id,
                error = %e,
                "Failed to publish task event; operation already committed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Recurrence, TaskPriority};
    use crate::publisher::{MockEventPublisher, PublishError};
    use crate::repository::MockTaskRepository;
    use chrono::Utc;

    fn sample_task(completed: bool) -> Task {
        Task {
            id: Uuid::now_v7(),
            title: "Water plants".to_string(),
            description: String::new(),
            completed,
            priority: TaskPriority::Medium,
            tags: vec![],
            due_at: None,
            remind_at: None,
            reminder_dispatched: false,
            recurrence: Recurrence::None,
            parent_task_id: None,
            user_id: Uuid::now_v7(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn create_input() -> CreateTask {
        CreateTask {
            title: "Water plants".to_string(),
            description: String::new(),
            priority: TaskPriority::default(),
            tags: vec![],
            due_at: None,
            remind_at: None,
            recurrence: Recurrence::default(),
            parent_task_id: None,
            user_id: Uuid::now_v7(),
        }
    }

    #[tokio::test]
    async fn test_create_task_rejects_invalid_input() {
        // No expectations: the repository must not be touched.
        let service = TaskService::new(MockTaskRepository::new());

        let result = service
            .create_task(CreateTask {
                title: String::new(),
                ..create_input()
            })
            .await;

        assert!(matches!(result, Err(TaskError::Validation(_))));
    }

    #[tokio::test]
    async fn test_create_task_publishes_created_event() {
        let task = sample_task(false);

        let mut repo = MockTaskRepository::new();
        let created = task.clone();
        repo.expect_create()
            .times(1)
            .returning(move |_| Ok(created.clone()));

        let mut publisher = MockEventPublisher::new();
        publisher
            .expect_publish_task_event()
            .withf(|envelope| envelope.event_type == EventType::TaskCreated)
            .times(1)
            .returning(|_| Ok(()));

        let service = TaskService::with_publisher(repo, Arc::new(publisher));
        let result = service.create_task(create_input()).await.unwrap();

        assert_eq!(result.id, task.id);
    }

    #[tokio::test]
    async fn test_completion_transition_emits_task_completed() {
        let before = sample_task(false);
        let mut after = before.clone();
        after.completed = true;

        let mut repo = MockTaskRepository::new();
        let previous = before.clone();
        repo.expect_get_by_id()
            .returning(move |_| Ok(Some(previous.clone())));
        let updated = after.clone();
        repo.expect_update()
            .returning(move |_, _| Ok(updated.clone()));

        let mut publisher = MockEventPublisher::new();
        publisher
            .expect_publish_task_event()
            .withf(|envelope| envelope.event_type == EventType::TaskCompleted)
            .times(1)
            .returning(|_| Ok(()));

        let service = TaskService::with_publisher(repo, Arc::new(publisher));
        service.complete_task(before.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_recompleting_emits_task_updated() {
        let already_done = sample_task(true);

        let mut repo = MockTaskRepository::new();
        let previous = already_done.clone();
        repo.expect_get_by_id()
            .returning(move |_| Ok(Some(previous.clone())));
        let updated = already_done.clone();
        repo.expect_update()
            .returning(move |_, _| Ok(updated.clone()));

        let mut publisher = MockEventPublisher::new();
        publisher
            .expect_publish_task_event()
            .withf(|envelope| envelope.event_type == EventType::TaskUpdated)
            .times(1)
            .returning(|_| Ok(()));

        let service = TaskService::with_publisher(repo, Arc::new(publisher));
        service.complete_task(already_done.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_publishes_final_snapshot() {
        let task = sample_task(false);
        let task_id = task.id;

        let mut repo = MockTaskRepository::new();
        let snapshot = task.clone();
        repo.expect_get_by_id()
            .returning(move |_| Ok(Some(snapshot.clone())));
        repo.expect_delete().returning(|_| Ok(true));

        let mut publisher = MockEventPublisher::new();
        publisher
            .expect_publish_task_event()
            .withf(move |envelope| {
                envelope.event_type == EventType::TaskDeleted && envelope.task_id == task_id
            })
            .times(1)
            .returning(|_| Ok(()));

        let service = TaskService::with_publisher(repo, Arc::new(publisher));
        service.delete_task(task_id).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_missing_task_is_not_found() {
        let mut repo = MockTaskRepository::new();
        repo.expect_get_by_id().returning(|_| Ok(None));

        let service = TaskService::new(repo);
        let result = service.delete_task(Uuid::now_v7()).await;

        assert!(matches!(result, Err(TaskError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_publish_failure_does_not_fail_operation() {
        let task = sample_task(false);

        let mut repo = MockTaskRepository::new();
        let created = task.clone();
        repo.expect_create()
            .returning(move |_| Ok(created.clone()));

        let mut publisher = MockEventPublisher::new();
        publisher
            .expect_publish_task_event()
            .returning(|_| Err(PublishError::Transport("redis down".to_string())));

        let service = TaskService::with_publisher(repo, Arc::new(publisher));
        let result = service.create_task(create_input()).await;

        assert!(result.is_ok());
    }
}
