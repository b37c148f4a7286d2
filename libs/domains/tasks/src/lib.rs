//! Task management domain.
//!
//! Everything tasks: validated CRUD, lifecycle events on Redis Streams,
//! materialization of recurring tasks, and due-reminder scheduling.
//!
//! The pieces fit together like this:
//!
//! ```text
//! TaskService ──writes──▶ TaskRepository (Postgres)
//!      │
//!      └─publishes─▶ task-events ──▶ RecurrenceProcessor ─▶ next occurrence
//!
//! ReminderScheduler ──claims due rows──▶ reminders stream ─▶ notifications
//! ```
//!
//! A service without a publisher still works; it just mutates rows silently.
//!
//! ```rust,no_run
//! use domain_tasks::{PgTaskRepository, StreamEventPublisher, TaskService};
//! use std::sync::Arc;
//!
//! # fn wire(db: sea_orm::DatabaseConnection, redis: redis::aio::ConnectionManager) {
//! let publisher = Arc::new(StreamEventPublisher::new(redis));
//! let service = TaskService::with_publisher(PgTaskRepository::new(db), publisher);
//! # }
//! ```

pub mod entity;
pub mod error;
pub mod events;
pub mod models;
pub mod postgres;
pub mod processed;
pub mod processor;
pub mod publisher;
pub mod recurrence;
pub mod repository;
pub mod scheduler;
pub mod service;
pub mod streams;

pub use error::{TaskError, TaskResult};
pub use events::{EventType, ReminderDueEvent, TaskEventEnvelope};
pub use models::{CreateTask, Recurrence, Task, TaskFilter, TaskPriority, UpdateTask};
pub use postgres::PgTaskRepository;
pub use processed::{PgProcessedEventStore, ProcessedEventStore};
pub use processor::RecurrenceProcessor;
pub use publisher::{EventPublisher, PublishError, StreamEventPublisher};
pub use repository::TaskRepository;
pub use scheduler::{ReminderScheduler, TickSummary};
pub use service::TaskService;
pub use streams::{RemindersStream, TaskEventsStream};
