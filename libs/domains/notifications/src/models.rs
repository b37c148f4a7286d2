//! Data models for the notifications domain.

use chrono::{DateTime, Utc};
use domain_tasks::ReminderDueEvent;
use uuid::Uuid;

/// A reminder notification ready for delivery through a channel.
#[derive(Debug, Clone)]
pub struct Notification {
    /// Task the reminder belongs to.
    pub task_id: Uuid,
    /// User the notification is addressed to.
    pub user_id: Uuid,
    /// Task title at the time the reminder fired.
    pub title: String,
    /// Human-readable notification text.
    pub message: String,
    pub due_at: Option<DateTime<Utc>>,
    pub remind_at: Option<DateTime<Utc>>,
}

impl Notification {
    /// Build a notification from a reminder event.
    pub fn from_reminder(event: &ReminderDueEvent) -> Self {
        Self {
            task_id: event.task_id,
            user_id: event.user_id,
            title: event.title.clone(),
            message: reminder_message(&event.title, event.due_at, event.remind_at),
            due_at: event.due_at,
            remind_at: event.remind_at,
        }
    }
}

/// Compose the reminder text, skipping date clauses the task never set.
fn reminder_message(
    title: &str,
    due_at: Option<DateTime<Utc>>,
    remind_at: Option<DateTime<Utc>>,
) -> String {
    let mut message = format!("Reminder: Task '{}' is due", title);

    if let Some(due) = due_at {
        message.push_str(&format!(" on {}", due.format("%Y-%m-%d %H:%M")));
    }
    if let Some(remind) = remind_at {
        message.push_str(&format!(
            " (reminder set for {})",
            remind.format("%Y-%m-%d %H:%M")
        ));
    }

    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use domain_tasks::EventType;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_message_with_both_dates() {
        let message = reminder_message(
            "Pay rent",
            Some(utc(2025, 7, 1, 9, 0)),
            Some(utc(2025, 6, 30, 18, 30)),
        );

        assert_eq!(
            message,
            "Reminder: Task 'Pay rent' is due on 2025-07-01 09:00 \
             (reminder set for 2025-06-30 18:30)"
        );
    }

    #[test]
    fn test_message_falls_back_when_dates_missing() {
        assert_eq!(
            reminder_message("Pay rent", None, None),
            "Reminder: Task 'Pay rent' is due"
        );
        assert_eq!(
            reminder_message("Pay rent", Some(utc(2025, 7, 1, 9, 0)), None),
            "Reminder: Task 'Pay rent' is due on 2025-07-01 09:00"
        );
        assert_eq!(
            reminder_message("Pay rent", None, Some(utc(2025, 6, 30, 18, 30))),
            "Reminder: Task 'Pay rent' is due (reminder set for 2025-06-30 18:30)"
        );
    }

    #[test]
    fn test_notification_from_reminder_event() {
        let event = ReminderDueEvent {
            event_id: Uuid::now_v7(),
            event_type: EventType::ReminderDue,
            task_id: Uuid::now_v7(),
            title: "Water plants".to_string(),
            due_at: Some(utc(2025, 6, 8, 9, 0)),
            remind_at: Some(utc(2025, 6, 8, 8, 0)),
            user_id: Uuid::now_v7(),
            timestamp: Utc::now(),
            retry_count: 0,
        };

        let notification = Notification::from_reminder(&event);

        assert_eq!(notification.task_id, event.task_id);
        assert_eq!(notification.user_id, event.user_id);
        assert_eq!(notification.title, "Water plants");
        assert_eq!(
            notification.message,
            "Reminder: Task 'Water plants' is due on 2025-06-08 09:00 \
             (reminder set for 2025-06-08 08:00)"
        );
    }
}
