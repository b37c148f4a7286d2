//! Reminder scan-and-claim tick.
//!
//! Each tick scans for tasks whose reminder came due, claims every hit with
//! a conditional update, and publishes one `reminder.due` event per claim.
//! The claim commits before the publish, so a reminder is published at most
//! once; the price is that a claim followed by a publish failure is lost
//! (logged, never refired) rather than duplicated.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::instrument;

use crate::error::TaskResult;
use crate::events::ReminderDueEvent;
use crate::publisher::EventPublisher;
use crate::repository::TaskRepository;

/// Outcome counters for one scheduler tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickSummary {
    /// Tasks matched by the due-reminder scan.
    pub scanned: usize,
    /// Claims won by this instance.
    pub claimed: usize,
    /// Reminders successfully published.
    pub published: usize,
    /// Claims another scheduler instance won first.
    pub lost_races: usize,
    /// Claims whose publish failed; these reminders are lost.
    pub publish_failures: usize,
}

/// Scans due reminders and dispatches them to the reminders stream.
pub struct ReminderScheduler<R: TaskRepository> {
    repository: Arc<R>,
    publisher: Arc<dyn EventPublisher>,
    batch_limit: u64,
}

impl<R: TaskRepository> ReminderScheduler<R> {
    pub fn new(repository: R, publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            repository: Arc::new(repository),
            publisher,
            batch_limit: 100,
        }
    }

    /// Cap the number of reminders scanned per tick.
    pub fn with_batch_limit(mut self, batch_limit: u64) -> Self {
        self.batch_limit = batch_limit;
        self
    }

    /// Run one scan-claim-publish cycle.
    ///
    /// Safe to run concurrently with other instances: the conditional claim
    /// makes every reminder fire exactly once across the fleet.
    #[instrument(skip(self))]
    pub async fn run_tick(&self) -> TaskResult<TickSummary> {
        let now = Utc::now();
        let due = self
            .repository
            .find_due_reminders(now, self.batch_limit)
            .await?;

        let mut summary = TickSummary {
            scanned: due.len(),
            ..TickSummary::default()
        };

        for task in due {
            if !self.repository.claim_reminder(task.id).await? {
                summary.lost_races += 1;
                continue;
            }
            summary.claimed += 1;

            let event = ReminderDueEvent::new(&task);
            match self.publisher.publish_reminder(&event).await {
                Ok(()) => summary.published += 1,
                Err(e) => {
                    summary.publish_failures += 1;
                    tracing::error!(
                        task_id = %task.id,
                        event_id = %event.event_id,
                        error = %e,
                        "Reminder claimed but publish failed; it will not refire"
                    );
                }
            }
        }

        if summary.scanned > 0 {
            tracing::info!(
                scanned = summary.scanned,
                claimed = summary.claimed,
                published = summary.published,
                lost_races = summary.lost_races,
                publish_failures = summary.publish_failures,
                "Reminder tick complete"
            );
        }
        Ok(summary)
    }
}
