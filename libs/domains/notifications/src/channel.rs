//! Delivery channels for reminder notifications.
//!
//! This module contains the `NotificationChannel` trait and the log-backed
//! channel the sink ships with. Email and push delivery plug in here.

use async_trait::async_trait;
use tracing::info;

use crate::error::NotificationResult;
use crate::models::Notification;

/// Trait for notification delivery channels.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Deliver a notification.
    async fn send(&self, notification: &Notification) -> NotificationResult<()>;

    /// Get the channel name for logging.
    fn name(&self) -> &'static str;

    /// Check if the channel is healthy/configured.
    async fn health_check(&self) -> NotificationResult<bool>;
}

/// Channel that records notifications through a structured log call.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogChannel;

#[async_trait]
impl NotificationChannel for LogChannel {
    async fn send(&self, notification: &Notification) -> NotificationResult<()> {
        info!(
            task_id = %notification.task_id,
            user_id = %notification.user_id,
            due_at = ?notification.due_at,
            message = %notification.message,
            "Reminder notification"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }

    async fn health_check(&self) -> NotificationResult<bool> {
        Ok(true)
    }
}
