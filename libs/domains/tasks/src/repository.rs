use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::TaskResult;
use crate::models::{CreateTask, Task, TaskFilter, UpdateTask};

/// Persistence boundary for tasks.
///
/// `TaskService` talks to this trait only, so tests swap in a mock and the
/// scheduler binary shares the same interface as CRUD.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn create(&self, input: CreateTask) -> TaskResult<Task>;

    async fn get_by_id(&self, id: Uuid) -> TaskResult<Option<Task>>;

    async fn list(&self, filter: TaskFilter) -> TaskResult<Vec<Task>>;

    /// Partial update; `None` fields in `input` keep their stored value.
    async fn update(&self, id: Uuid, input: UpdateTask) -> TaskResult<Task>;

    /// Returns `false` when no row matched `id`.
    async fn delete(&self, id: Uuid) -> TaskResult<bool>;

    async fn count(&self) -> TaskResult<usize>;

    async fn count_by_user(&self, user_id: Uuid) -> TaskResult<usize>;

    /// Find open tasks whose reminder is due at or before `now` and has not
    /// been dispatched yet, oldest reminder first.
    async fn find_due_reminders(&self, now: DateTime<Utc>, limit: u64) -> TaskResult<Vec<Task>>;

    /// Atomically claim a task's reminder for dispatch.
    ///
    /// Flips `reminder_dispatched` from `false` to `true` in a single
    /// conditional update. Returns `false` when another scheduler instance
    /// already claimed it (or the task vanished), so exactly one caller
    /// ever wins a given reminder.
    async fn claim_reminder(&self, id: Uuid) -> TaskResult<bool>;
}
