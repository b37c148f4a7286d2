//! sea-orm backed [`TaskRepository`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use database::BaseRepository;
use sea_orm::sea_query::Expr;
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use uuid::Uuid;

use crate::{
    entity,
    error::{TaskError, TaskResult},
    models::{CreateTask, Task, TaskFilter, UpdateTask},
    repository::TaskRepository,
};

pub struct PgTaskRepository {
    base: BaseRepository<entity::Entity>,
}

impl PgTaskRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }
}

#[async_trait]
impl TaskRepository for PgTaskRepository {
    async fn create(&self, input: CreateTask) -> TaskResult<Task> {
        let row: entity::ActiveModel = input.into();
        let model = self.base.insert(row).await?;

        tracing::info!(task_id = %model.id, "Task created");
        Ok(model.into())
    }

    async fn get_by_id(&self, id: Uuid) -> TaskResult<Option<Task>> {
        Ok(self.base.find_by_id(id).await?.map(Into::into))
    }

    async fn list(&self, filter: TaskFilter) -> TaskResult<Vec<Task>> {
        let mut query = entity::Entity::find();

        if let Some(completed) = filter.completed {
            query = query.filter(entity::Column::Completed.eq(completed));
        }
        if let Some(priority) = filter.priority {
            query = query.filter(entity::Column::Priority.eq(priority));
        }
        if let Some(recurrence) = filter.recurrence {
            query = query.filter(entity::Column::Recurrence.eq(recurrence));
        }
        if let Some(user_id) = filter.user_id {
            query = query.filter(entity::Column::UserId.eq(user_id));
        }

        let models = query
            .order_by_desc(entity::Column::CreatedAt)
            .limit(filter.limit.unwrap_or(50))
            .offset(filter.offset.unwrap_or(0))
            .all(self.base.db())
            .await?;

        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn update(&self, id: Uuid, input: UpdateTask) -> TaskResult<Task> {
        let model = self.base.find_by_id(id).await?.ok_or(TaskError::NotFound(id))?;

        let mut merged: Task = model.into();
        merged.apply_update(input);

        // Write back only the updatable columns. `reminder_dispatched` is
        // owned by the reminder scheduler and must never be overwritten here,
        // even with the value read above, or a concurrent claim would revert.
        let write_back = entity::ActiveModel {
            id: Set(merged.id),
            title: Set(merged.title.clone()),
            description: Set(merged.description.clone()),
            completed: Set(merged.completed),
            priority: Set(merged.priority),
            tags: Set(merged.tags.clone()),
            due_at: Set(merged.due_at.map(Into::into)),
            remind_at: Set(merged.remind_at.map(Into::into)),
            recurrence: Set(merged.recurrence),
            updated_at: Set(merged.updated_at.into()),
            ..Default::default()
        };

        let updated = self.base.update(write_back).await?;

        tracing::info!(task_id = %id, "Task updated");
        Ok(updated.into())
    }

    async fn delete(&self, id: Uuid) -> TaskResult<bool> {
        let deleted = self.base.delete_by_id(id).await?;

        if deleted > 0 {
            tracing::info!(task_id = %id, "Task deleted");
        }
        Ok(deleted > 0)
    }

    async fn count(&self) -> TaskResult<usize> {
        let total = entity::Entity::find().count(self.base.db()).await?;
        Ok(total as usize)
    }

    async fn count_by_user(&self, user_id: Uuid) -> TaskResult<usize> {
        let total = entity::Entity::find()
            .filter(entity::Column::UserId.eq(user_id))
            .count(self.base.db())
            .await?;
        Ok(total as usize)
    }

    async fn find_due_reminders(&self, now: DateTime<Utc>, limit: u64) -> TaskResult<Vec<Task>> {
        let models = entity::Entity::find()
            .filter(entity::Column::RemindAt.lte(now))
            .filter(entity::Column::ReminderDispatched.eq(false))
            .filter(entity::Column::Completed.eq(false))
            .order_by_asc(entity::Column::RemindAt)
            .limit(limit)
            .all(self.base.db())
            .await?;

        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn claim_reminder(&self, id: Uuid) -> TaskResult<bool> {
        // Conditional update: only one caller can flip the flag, so the
        // reminder is published at most once across scheduler instances.
        let result = entity::Entity::update_many()
            .col_expr(entity::Column::ReminderDispatched, Expr::value(true))
            .filter(entity::Column::Id.eq(id))
            .filter(entity::Column::ReminderDispatched.eq(false))
            .exec(self.base.db())
            .await?;

        let claimed = result.rows_affected == 1;
        if claimed {
            tracing::info!(task_id = %id, "Claimed reminder for dispatch");
        } else {
            tracing::debug!(task_id = %id, "Reminder already claimed");
        }
        Ok(claimed)
    }
}
