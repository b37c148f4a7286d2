//! Task domain models
//!
//! Plain domain types used by services, workers, and the event envelope.
//! Database rows live in [`crate::entity`] and convert into these via `From`.

use chrono::{DateTime, Utc};
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;
use validator::Validate;

/// Urgency of a task. Serialized lowercase in JSON, on the wire, and in
/// the database enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "task_priority")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TaskPriority {
    #[sea_orm(string_value = "low")]
    Low,
    #[default]
    #[sea_orm(string_value = "medium")]
    Medium,
    #[sea_orm(string_value = "high")]
    High,
    #[sea_orm(string_value = "urgent")]
    Urgent,
}

/// Recurrence rule attached to a task.
///
/// `None` marks a one-shot task. Any other value makes the recurrence worker
/// materialize the next occurrence when the task is completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "task_recurrence")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Recurrence {
    #[default]
    #[sea_orm(string_value = "none")]
    None,
    #[sea_orm(string_value = "daily")]
    Daily,
    #[sea_orm(string_value = "weekly")]
    Weekly,
    #[sea_orm(string_value = "monthly")]
    Monthly,
}

impl Recurrence {
    /// Whether completing a task with this rule spawns a next occurrence.
    pub fn is_recurring(&self) -> bool {
        !matches!(self, Recurrence::None)
    }
}

/// Task domain model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub completed: bool,
    pub priority: TaskPriority,
    pub tags: Vec<String>,
    pub due_at: Option<DateTime<Utc>>,
    pub remind_at: Option<DateTime<Utc>>,
    /// Set once by the reminder scheduler when the reminder is claimed.
    /// Never reverts to `false`.
    pub reminder_dispatched: bool,
    pub recurrence: Recurrence,
    /// Completed occurrence this task was materialized from, if any.
    pub parent_task_id: Option<Uuid>,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Apply a partial update in place, bumping `updated_at`.
    ///
    /// `reminder_dispatched`, `parent_task_id`, and `user_id` are not
    /// updatable through this path.
    pub fn apply_update(&mut self, update: UpdateTask) {
        if let Some(title) = update.title {
            self.title = title;
        }
        if let Some(description) = update.description {
            self.description = description;
        }
        if let Some(completed) = update.completed {
            self.completed = completed;
        }
        if let Some(priority) = update.priority {
            self.priority = priority;
        }
        if let Some(tags) = update.tags {
            self.tags = tags;
        }
        if let Some(due_at) = update.due_at {
            self.due_at = due_at;
        }
        if let Some(remind_at) = update.remind_at {
            self.remind_at = remind_at;
        }
        if let Some(recurrence) = update.recurrence {
            self.recurrence = recurrence;
        }
        self.updated_at = Utc::now();
    }
}

/// Input for creating a task
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateTask {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,
    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub tags: Vec<String>,
    pub due_at: Option<DateTime<Utc>>,
    pub remind_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub recurrence: Recurrence,
    /// Only set by the recurrence worker when materializing an occurrence.
    #[serde(default)]
    pub parent_task_id: Option<Uuid>,
    pub user_id: Uuid,
}

/// Partial update for a task.
///
/// Outer `Option` means "leave unchanged"; for the nullable timestamps the
/// inner `Option` distinguishes "set" from "clear".
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct UpdateTask {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: Option<String>,
    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,
    pub completed: Option<bool>,
    pub priority: Option<TaskPriority>,
    pub tags: Option<Vec<String>>,
    pub due_at: Option<Option<DateTime<Utc>>>,
    pub remind_at: Option<Option<DateTime<Utc>>>,
    pub recurrence: Option<Recurrence>,
}

impl UpdateTask {
    /// Shorthand for flipping only the completion flag.
    pub fn completed(value: bool) -> Self {
        Self {
            completed: Some(value),
            ..Self::default()
        }
    }
}

fn default_page_size() -> Option<u64> {
    Some(50)
}

/// Filters for listing tasks. All criteria are ANDed together.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskFilter {
    pub completed: Option<bool>,
    pub priority: Option<TaskPriority>,
    pub recurrence: Option<Recurrence>,
    pub user_id: Option<Uuid>,
    #[serde(default = "default_page_size")]
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}
