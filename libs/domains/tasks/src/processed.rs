//! Consumer-side idempotency markers.
//!
//! Delivery from Redis streams is at-least-once, so every consumer records
//! which event IDs it already handled. The marker write is a single
//! `INSERT .. ON CONFLICT DO NOTHING`, which makes it safe under concurrent
//! redelivery: exactly one writer observes "newly inserted".

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::ActiveValue::Set;
use sea_orm::{DatabaseConnection, EntityTrait};
use uuid::Uuid;

use crate::error::TaskResult;

pub mod processed_events {
    use sea_orm::entity::prelude::*;

    /// Sea-ORM Entity for the `processed_events` table
    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "processed_events")]
    pub struct Model {
        /// Consumer group that handled the event.
        #[sea_orm(primary_key, auto_increment = false)]
        pub consumer: String,
        /// Event ID from the envelope.
        #[sea_orm(primary_key, auto_increment = false)]
        pub event_id: Uuid,
        pub processed_at: DateTimeWithTimeZone,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

/// Store for per-consumer processed-event markers
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProcessedEventStore: Send + Sync {
    /// Whether `consumer` already handled `event_id`.
    async fn is_handled(&self, consumer: &str, event_id: Uuid) -> TaskResult<bool>;

    /// Record that `consumer` handled `event_id`.
    ///
    /// Returns `true` when the marker was newly inserted, `false` when a
    /// concurrent (or earlier) handler got there first.
    async fn mark_handled(&self, consumer: &str, event_id: Uuid) -> TaskResult<bool>;
}

pub struct PgProcessedEventStore {
    db: DatabaseConnection,
}

impl PgProcessedEventStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProcessedEventStore for PgProcessedEventStore {
    async fn is_handled(&self, consumer: &str, event_id: Uuid) -> TaskResult<bool> {
        let found = processed_events::Entity::find_by_id((consumer.to_string(), event_id))
            .one(&self.db)
            .await?;

        Ok(found.is_some())
    }

    async fn mark_handled(&self, consumer: &str, event_id: Uuid) -> TaskResult<bool> {
        let model = processed_events::ActiveModel {
            consumer: Set(consumer.to_string()),
            event_id: Set(event_id),
            processed_at: Set(Utc::now().into()),
        };

        let rows = processed_events::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([
                    processed_events::Column::Consumer,
                    processed_events::Column::EventId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        Ok(rows == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    #[tokio::test]
    async fn test_mark_handled_reports_first_writer() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                },
            ])
            .into_connection();

        let store = PgProcessedEventStore::new(db);
        let event_id = Uuid::now_v7();

        assert!(store
            .mark_handled("recurrence_materializer", event_id)
            .await
            .unwrap());
        assert!(!store
            .mark_handled("recurrence_materializer", event_id)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_is_handled_checks_marker_row() {
        let event_id = Uuid::now_v7();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([
                vec![processed_events::Model {
                    consumer: "recurrence_materializer".to_string(),
                    event_id,
                    processed_at: Utc::now().into(),
                }],
                vec![],
            ])
            .into_connection();

        let store = PgProcessedEventStore::new(db);

        assert!(store
            .is_handled("recurrence_materializer", event_id)
            .await
            .unwrap());
        assert!(!store
            .is_handled("recurrence_materializer", event_id)
            .await
            .unwrap());
    }
}
