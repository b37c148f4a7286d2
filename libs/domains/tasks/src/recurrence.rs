//! Recurrence date stepping.
//!
//! Pure helpers for computing when the next occurrence of a recurring task
//! is due. Calendar math lives here so the materializer stays small.

use chrono::{DateTime, Duration, Months, Utc};

use crate::models::Recurrence;

/// Step a due date forward by one recurrence interval.
///
/// Returns `None` for [`Recurrence::None`]. Monthly steps clamp to the last
/// day of shorter months (Jan 31 -> Feb 28, or Feb 29 in leap years).
pub fn next_due_date(current: DateTime<Utc>, recurrence: Recurrence) -> Option<DateTime<Utc>> {
    match recurrence {
        Recurrence::None => None,
        Recurrence::Daily => Some(current + Duration::days(1)),
        Recurrence::Weekly => Some(current + Duration::weeks(1)),
        Recurrence::Monthly => current.checked_add_months(Months::new(1)),
    }
}

/// Shift a reminder to keep its offset from the due date.
///
/// If a task was due at 09:00 with a reminder at 08:00, the next occurrence
/// keeps the one-hour lead regardless of the recurrence interval.
pub fn shifted_remind_at(
    due_at: DateTime<Utc>,
    remind_at: DateTime<Utc>,
    next_due: DateTime<Utc>,
) -> DateTime<Utc> {
    next_due - (due_at - remind_at)
}
