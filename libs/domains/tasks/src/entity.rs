//! sea-orm entity for the `tasks` table.

use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::Set;
use serde::{Deserialize, Serialize};

use crate::models::{CreateTask, Recurrence, Task, TaskPriority};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tasks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub completed: bool,
    pub priority: TaskPriority,
    pub tags: Vec<String>,
    pub due_at: Option<DateTimeWithTimeZone>,
    pub remind_at: Option<DateTimeWithTimeZone>,
    /// Flipped once by the reminder scheduler's claim; never written by CRUD.
    pub reminder_dispatched: bool,
    pub recurrence: Recurrence,
    /// Set on tasks materialized from a recurring parent.
    pub parent_task_id: Option<Uuid>,
    pub user_id: Uuid,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Task {
    fn from(row: Model) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            completed: row.completed,
            priority: row.priority,
            tags: row.tags,
            due_at: row.due_at.map(Into::into),
            remind_at: row.remind_at.map(Into::into),
            reminder_dispatched: row.reminder_dispatched,
            recurrence: row.recurrence,
            parent_task_id: row.parent_task_id,
            user_id: row.user_id,
            created_at: row.created_at.into(),
            updated_at: row.updated_at.into(),
        }
    }
}

impl From<CreateTask> for ActiveModel {
    fn from(create: CreateTask) -> Self {
        let now = chrono::Utc::now();
        ActiveModel {
            id: Set(Uuid::now_v7()),
            title: Set(create.title),
            description: Set(create.description),
            completed: Set(false),
            priority: Set(create.priority),
            tags: Set(create.tags),
            due_at: Set(create.due_at.map(Into::into)),
            remind_at: Set(create.remind_at.map(Into::into)),
            reminder_dispatched: Set(false),
            recurrence: Set(create.recurrence),
            parent_task_id: Set(create.parent_task_id),
            user_id: Set(create.user_id),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
    }
}
