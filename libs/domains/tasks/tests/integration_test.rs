//! Integration tests for the tasks domain
//!
//! Tests cover:
//! - CRUD round-trips against real Postgres
//! - Reminder claim semantics under concurrency
//! - Recurrence materialization driven by completion events
//! - The scheduler tick publishing to a real Redis stream
//! - The full loop: service publish -> stream worker -> next occurrence

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, TimeZone, Utc};
use domain_tasks::{
    CreateTask, EventType, PgProcessedEventStore, PgTaskRepository, ProcessedEventStore,
    Recurrence, RecurrenceProcessor, ReminderScheduler, StreamEventPublisher, Task, TaskError,
    TaskEventEnvelope, TaskEventsStream, TaskFilter, TaskPriority, TaskRepository, TaskService,
    UpdateTask,
};
use stream_worker::{StreamProcessor, StreamWorker, WorkerConfig};
use test_utils::{TestDataBuilder, TestDatabase, TestRedis};
use tokio::sync::watch;
use uuid::Uuid;

fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

fn task_input(builder: &TestDataBuilder, suffix: &str) -> CreateTask {
    CreateTask {
        title: builder.name("task", suffix),
        description: String::new(),
        priority: TaskPriority::Medium,
        tags: vec!["integration".to_string()],
        due_at: None,
        remind_at: None,
        recurrence: Recurrence::None,
        parent_task_id: None,
        user_id: builder.user_id(),
    }
}

async fn children_of(repo: &PgTaskRepository, user_id: Uuid, parent_id: Uuid) -> Vec<Task> {
    repo.list(TaskFilter {
        user_id: Some(user_id),
        ..TaskFilter::default()
    })
    .await
    .unwrap()
    .into_iter()
    .filter(|t| t.parent_task_id == Some(parent_id))
    .collect()
}

// ============================================================
// CRUD round-trips
// ============================================================

#[tokio::test]
async fn test_task_crud_round_trip() {
    let db = TestDatabase::new().await;
    let builder = TestDataBuilder::from_test_name("crud_round_trip");
    let service = TaskService::new(PgTaskRepository::new(db.connection()));

    let created = service
        .create_task(task_input(&builder, "main"))
        .await
        .unwrap();
    assert!(!created.completed);
    assert!(!created.reminder_dispatched);
    assert_eq!(created.parent_task_id, None);

    let fetched = service.get_task(created.id).await.unwrap();
    assert_eq!(fetched.title, created.title);
    assert_eq!(fetched.tags, vec!["integration".to_string()]);

    let updated = service
        .update_task(
            created.id,
            UpdateTask {
                title: Some(builder.name("task", "renamed")),
                priority: Some(TaskPriority::Urgent),
                ..UpdateTask::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.title, builder.name("task", "renamed"));
    assert_eq!(updated.priority, TaskPriority::Urgent);

    let completed = service.complete_task(created.id).await.unwrap();
    assert!(completed.completed);

    service.delete_task(created.id).await.unwrap();
    let missing = service.get_task(created.id).await;
    assert!(matches!(missing, Err(TaskError::NotFound(_))));
}

#[tokio::test]
async fn test_list_filters_by_user_and_completion() {
    let db = TestDatabase::new().await;
    let builder = TestDataBuilder::from_test_name("list_filters");
    let other = TestDataBuilder::from_test_name("list_filters_other_user");
    let service = TaskService::new(PgTaskRepository::new(db.connection()));

    let mine_open = service
        .create_task(task_input(&builder, "open"))
        .await
        .unwrap();
    let mine_done = service
        .create_task(task_input(&builder, "done"))
        .await
        .unwrap();
    service.complete_task(mine_done.id).await.unwrap();
    service
        .create_task(task_input(&other, "other"))
        .await
        .unwrap();

    let open = service
        .list_tasks(TaskFilter {
            user_id: Some(builder.user_id()),
            completed: Some(false),
            ..TaskFilter::default()
        })
        .await
        .unwrap();

    assert_eq!(open.len(), 1);
    assert_eq!(open[0].id, mine_open.id);

    assert_eq!(
        service.count_tasks_by_user(builder.user_id()).await.unwrap(),
        2
    );
}

// ============================================================
// Reminder claim semantics
// ============================================================

#[tokio::test]
async fn test_find_due_reminders_skips_future_completed_and_dispatched() {
    let db = TestDatabase::new().await;
    let builder = TestDataBuilder::from_test_name("due_scan");
    let repo = PgTaskRepository::new(db.connection());
    let service = TaskService::new(PgTaskRepository::new(db.connection()));
    let past = Utc::now() - Duration::minutes(5);

    let due = service
        .create_task(CreateTask {
            remind_at: Some(past),
            ..task_input(&builder, "due")
        })
        .await
        .unwrap();
    service
        .create_task(CreateTask {
            remind_at: Some(Utc::now() + Duration::hours(1)),
            ..task_input(&builder, "future")
        })
        .await
        .unwrap();
    let done = service
        .create_task(CreateTask {
            remind_at: Some(past),
            ..task_input(&builder, "completed")
        })
        .await
        .unwrap();
    service.complete_task(done.id).await.unwrap();
    let dispatched = service
        .create_task(CreateTask {
            remind_at: Some(past),
            ..task_input(&builder, "dispatched")
        })
        .await
        .unwrap();
    assert!(repo.claim_reminder(dispatched.id).await.unwrap());

    let found = repo.find_due_reminders(Utc::now(), 100).await.unwrap();
    let ids: Vec<Uuid> = found.iter().map(|t| t.id).collect();

    assert_eq!(ids, vec![due.id]);
}

#[tokio::test]
async fn test_racing_claims_have_exactly_one_winner() {
    let db = TestDatabase::new().await;
    let builder = TestDataBuilder::from_test_name("claim_race");
    let repo = Arc::new(PgTaskRepository::new(db.connection()));
    let service = TaskService::new(PgTaskRepository::new(db.connection()));

    let task = service
        .create_task(CreateTask {
            remind_at: Some(Utc::now() - Duration::minutes(1)),
            ..task_input(&builder, "contested")
        })
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let repo = Arc::clone(&repo);
        let id = task.id;
        handles.push(tokio::spawn(
            async move { repo.claim_reminder(id).await },
        ));
    }

    let results = futures::future::join_all(handles).await;
    let wins = results
        .into_iter()
        .map(|r| r.unwrap().unwrap())
        .filter(|claimed| *claimed)
        .count();

    assert_eq!(wins, 1);
    assert!(service.get_task(task.id).await.unwrap().reminder_dispatched);
}

#[tokio::test]
async fn test_user_update_cannot_revert_a_claim() {
    let db = TestDatabase::new().await;
    let builder = TestDataBuilder::from_test_name("claim_vs_update");
    let repo = PgTaskRepository::new(db.connection());
    let service = TaskService::new(PgTaskRepository::new(db.connection()));

    let task = service
        .create_task(CreateTask {
            remind_at: Some(Utc::now() - Duration::minutes(1)),
            ..task_input(&builder, "claimed")
        })
        .await
        .unwrap();
    assert!(repo.claim_reminder(task.id).await.unwrap());

    // A plain update writes through the same row but must leave the flag set.
    let after = service
        .update_task(
            task.id,
            UpdateTask {
                title: Some(builder.name("task", "edited")),
                ..UpdateTask::default()
            },
        )
        .await
        .unwrap();

    assert!(after.reminder_dispatched);
}

// ============================================================
// Processed-event markers
// ============================================================

#[tokio::test]
async fn test_processed_event_marker_admits_one_writer() {
    let db = TestDatabase::new().await;
    let store = Arc::new(PgProcessedEventStore::new(db.connection()));
    let event_id = Uuid::now_v7();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            store.mark_handled("recurrence_materializer", event_id).await
        }));
    }

    let results = futures::future::join_all(handles).await;
    let first_writers = results
        .into_iter()
        .map(|r| r.unwrap().unwrap())
        .filter(|newly| *newly)
        .count();

    assert_eq!(first_writers, 1);
    assert!(store
        .is_handled("recurrence_materializer", event_id)
        .await
        .unwrap());
    // A different consumer has its own marker space.
    assert!(!store
        .is_handled("notification_sink", event_id)
        .await
        .unwrap());
}

// ============================================================
// Recurrence materialization
// ============================================================

#[tokio::test]
async fn test_completion_materializes_weekly_occurrence() {
    let db = TestDatabase::new().await;
    let builder = TestDataBuilder::from_test_name("weekly_step");
    let repo = PgTaskRepository::new(db.connection());
    let service = TaskService::new(PgTaskRepository::new(db.connection()));
    let store = Arc::new(PgProcessedEventStore::new(db.connection()));

    let parent = service
        .create_task(CreateTask {
            due_at: Some(utc(2025, 6, 1, 9)),
            remind_at: Some(utc(2025, 6, 1, 8)),
            recurrence: Recurrence::Weekly,
            priority: TaskPriority::High,
            ..task_input(&builder, "weekly")
        })
        .await
        .unwrap();
    let parent = service.complete_task(parent.id).await.unwrap();

    let processor =
        RecurrenceProcessor::new(TaskService::new(PgTaskRepository::new(db.connection())), store);
    let envelope = TaskEventEnvelope::new(EventType::TaskCompleted, &parent);
    processor.process(&envelope).await.unwrap();

    let children = children_of(&repo, builder.user_id(), parent.id).await;
    assert_eq!(children.len(), 1);

    let child = &children[0];
    assert_eq!(child.title, parent.title);
    assert_eq!(child.priority, TaskPriority::High);
    assert_eq!(child.tags, parent.tags);
    assert_eq!(child.recurrence, Recurrence::Weekly);
    assert!(!child.completed);
    assert!(!child.reminder_dispatched);
    assert_eq!(child.due_at, Some(utc(2025, 6, 8, 9)));
    assert_eq!(child.remind_at, Some(utc(2025, 6, 8, 8)));
}

#[tokio::test]
async fn test_redelivered_completion_creates_one_child() {
    let db = TestDatabase::new().await;
    let builder = TestDataBuilder::from_test_name("redelivery");
    let repo = PgTaskRepository::new(db.connection());
    let service = TaskService::new(PgTaskRepository::new(db.connection()));
    let store = Arc::new(PgProcessedEventStore::new(db.connection()));

    let parent = service
        .create_task(CreateTask {
            due_at: Some(utc(2025, 6, 1, 9)),
            recurrence: Recurrence::Daily,
            ..task_input(&builder, "daily")
        })
        .await
        .unwrap();
    let parent = service.complete_task(parent.id).await.unwrap();

    let processor =
        RecurrenceProcessor::new(TaskService::new(PgTaskRepository::new(db.connection())), store);
    let envelope = TaskEventEnvelope::new(EventType::TaskCompleted, &parent);

    // Same envelope delivered twice, as after a worker crash before ack.
    processor.process(&envelope).await.unwrap();
    processor.process(&envelope).await.unwrap();

    let children = children_of(&repo, builder.user_id(), parent.id).await;
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].due_at, Some(utc(2025, 6, 2, 9)));
}

#[tokio::test]
async fn test_monthly_materialization_clamps_to_month_end() {
    let db = TestDatabase::new().await;
    let builder = TestDataBuilder::from_test_name("monthly_clamp");
    let repo = PgTaskRepository::new(db.connection());
    let service = TaskService::new(PgTaskRepository::new(db.connection()));
    let store = Arc::new(PgProcessedEventStore::new(db.connection()));

    let parent = service
        .create_task(CreateTask {
            due_at: Some(utc(2025, 1, 31, 9)),
            recurrence: Recurrence::Monthly,
            ..task_input(&builder, "monthly")
        })
        .await
        .unwrap();
    let parent = service.complete_task(parent.id).await.unwrap();

    let processor =
        RecurrenceProcessor::new(TaskService::new(PgTaskRepository::new(db.connection())), store);
    processor
        .process(&TaskEventEnvelope::new(EventType::TaskCompleted, &parent))
        .await
        .unwrap();

    let children = children_of(&repo, builder.user_id(), parent.id).await;
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].due_at, Some(utc(2025, 2, 28, 9)));
}

#[tokio::test]
async fn test_non_recurring_completion_creates_nothing() {
    let db = TestDatabase::new().await;
    let builder = TestDataBuilder::from_test_name("one_shot");
    let repo = PgTaskRepository::new(db.connection());
    let service = TaskService::new(PgTaskRepository::new(db.connection()));
    let store = Arc::new(PgProcessedEventStore::new(db.connection()));

    let parent = service
        .create_task(task_input(&builder, "one_shot"))
        .await
        .unwrap();
    let parent = service.complete_task(parent.id).await.unwrap();

    let processor =
        RecurrenceProcessor::new(TaskService::new(PgTaskRepository::new(db.connection())), store);
    processor
        .process(&TaskEventEnvelope::new(EventType::TaskCompleted, &parent))
        .await
        .unwrap();

    assert!(children_of(&repo, builder.user_id(), parent.id)
        .await
        .is_empty());
    assert_eq!(service.count_tasks_by_user(builder.user_id()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_materializing_for_deleted_parent_fails_transiently() {
    let db = TestDatabase::new().await;
    let builder = TestDataBuilder::from_test_name("deleted_parent");
    let service = TaskService::new(PgTaskRepository::new(db.connection()));
    let store = Arc::new(PgProcessedEventStore::new(db.connection()));

    let parent = service
        .create_task(CreateTask {
            due_at: Some(utc(2025, 6, 1, 9)),
            recurrence: Recurrence::Weekly,
            ..task_input(&builder, "vanishing")
        })
        .await
        .unwrap();
    let parent = service.complete_task(parent.id).await.unwrap();
    let envelope = TaskEventEnvelope::new(EventType::TaskCompleted, &parent);

    // Parent row is gone before the event is processed; the self-FK on
    // parent_task_id rejects the child.
    service.delete_task(parent.id).await.unwrap();

    let processor =
        RecurrenceProcessor::new(TaskService::new(PgTaskRepository::new(db.connection())), store);
    let err = processor.process(&envelope).await.unwrap_err();

    assert_eq!(err.category(), stream_worker::ErrorCategory::Transient);
}

// ============================================================
// Scheduler ticks against real Redis
// ============================================================

#[tokio::test]
async fn test_scheduler_two_ticks_publish_each_reminder_once() {
    let db = TestDatabase::new().await;
    let redis = TestRedis::new().await;
    let builder = TestDataBuilder::from_test_name("two_ticks");
    let service = TaskService::new(PgTaskRepository::new(db.connection()));

    for suffix in ["first", "second"] {
        service
            .create_task(CreateTask {
                remind_at: Some(Utc::now() - Duration::minutes(2)),
                due_at: Some(Utc::now() + Duration::hours(1)),
                ..task_input(&builder, suffix)
            })
            .await
            .unwrap();
    }
    service
        .create_task(CreateTask {
            remind_at: Some(Utc::now() + Duration::hours(2)),
            ..task_input(&builder, "future")
        })
        .await
        .unwrap();

    let publisher =
        StreamEventPublisher::new(redis.connection_manager().await).with_enabled(true);
    let scheduler = ReminderScheduler::new(
        PgTaskRepository::new(db.connection()),
        Arc::new(publisher),
    );

    let first = scheduler.run_tick().await.unwrap();
    assert_eq!(first.scanned, 2);
    assert_eq!(first.claimed, 2);
    assert_eq!(first.published, 2);
    assert_eq!(first.lost_races, 0);

    // Everything due was claimed, so the next tick has nothing to do.
    let second = scheduler.run_tick().await.unwrap();
    assert_eq!(second.scanned, 0);
    assert_eq!(second.published, 0);

    let mut conn = redis.connection_manager().await;
    let len: i64 = redis::AsyncCommands::xlen(&mut conn, "reminders")
        .await
        .unwrap();
    assert_eq!(len, 2);
}

// ============================================================
// Full loop: publish -> worker -> materialized occurrence
// ============================================================

#[tokio::test]
async fn test_completion_event_drives_worker_to_materialize() {
    let db = TestDatabase::new().await;
    let redis = TestRedis::new().await;
    let builder = TestDataBuilder::from_test_name("full_loop");

    let publisher =
        StreamEventPublisher::new(redis.connection_manager().await).with_enabled(true);
    let service = TaskService::with_publisher(
        PgTaskRepository::new(db.connection()),
        Arc::new(publisher),
    );

    let processor = RecurrenceProcessor::new(
        service.clone(),
        Arc::new(PgProcessedEventStore::new(db.connection())),
    );
    let config = WorkerConfig::from_stream_def::<TaskEventsStream>()
        .with_consumer_id("full-loop-worker")
        .with_blocking(Some(200));
    let worker = StreamWorker::new(redis.connection_manager().await, processor, config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(async move { worker.run(shutdown_rx).await });

    let parent = service
        .create_task(CreateTask {
            due_at: Some(utc(2025, 6, 1, 9)),
            remind_at: Some(utc(2025, 6, 1, 8)),
            recurrence: Recurrence::Daily,
            ..task_input(&builder, "loop")
        })
        .await
        .unwrap();
    service.complete_task(parent.id).await.unwrap();

    // Wait for the worker to pick up the completion event and create the child.
    let repo = PgTaskRepository::new(db.connection());
    let mut children = Vec::new();
    for _ in 0..100 {
        children = children_of(&repo, builder.user_id(), parent.id).await;
        if !children.is_empty() {
            break;
        }
        tokio::time::sleep(StdDuration::from_millis(100)).await;
    }

    shutdown_tx.send(true).unwrap();
    handle.await.unwrap().unwrap();

    assert_eq!(children.len(), 1);
    assert_eq!(children[0].due_at, Some(utc(2025, 6, 2, 9)));
    assert_eq!(children[0].remind_at, Some(utc(2025, 6, 2, 8)));
    assert_eq!(children[0].recurrence, Recurrence::Daily);
}
