//! Reminder notification delivery.
//!
//! Consumes `reminder.due` events off the reminders stream and hands each one
//! to a [`NotificationChannel`]. Delivery is idempotent: the processor records
//! every handled `event_id` and silently skips redeliveries, so a crashed
//! worker can replay its pending entries without double-notifying anyone.
//!
//! ```text
//! reminders stream ─▶ ReminderProcessor ─▶ NotificationChannel
//!                          │ (skip if event_id already processed)
//!                          └─▶ ProcessedEventStore (Postgres)
//! ```
//!
//! The crate ships with [`LogChannel`], which "delivers" by writing a
//! structured log line. Real channels (email, push) implement the same trait.
//!
//! ```rust,ignore
//! use domain_notifications::{LogChannel, ReminderProcessor};
//!
//! let processor = ReminderProcessor::new(LogChannel, store);
//! let worker = StreamWorker::new(redis, processor, config);
//! worker.run(shutdown_rx).await?;
//! ```

pub mod channel;
pub mod error;
pub mod models;
pub mod processor;

pub use channel::{LogChannel, NotificationChannel};
pub use error::{NotificationError, NotificationResult};
pub use models::Notification;
pub use processor::ReminderProcessor;
