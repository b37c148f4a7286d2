use sea_orm_migration::sea_query::extension::postgres::Type;
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create task_priority enum
        manager
            .create_type(
                Type::create()
                    .as_enum(TaskPriority::Enum)
                    .values([
                        TaskPriority::Low,
                        TaskPriority::Medium,
                        TaskPriority::High,
                        TaskPriority::Urgent,
                    ])
                    .to_owned(),
            )
            .await?;

        // Create task_recurrence enum
        manager
            .create_type(
                Type::create()
                    .as_enum(TaskRecurrence::Enum)
                    .values([
                        TaskRecurrence::None,
                        TaskRecurrence::Daily,
                        TaskRecurrence::Weekly,
                        TaskRecurrence::Monthly,
                    ])
                    .to_owned(),
            )
            .await?;

        // Create tasks table
        manager
            .create_table(
                Table::create()
                    .table(Tasks::Table)
                    .if_not_exists()
                    .col(pk_uuid(Tasks::Id))
                    .col(string(Tasks::Title))
                    .col(text(Tasks::Description).default(""))
                    .col(boolean(Tasks::Completed).default(false))
                    .col(
                        ColumnDef::new(Tasks::Priority)
                            .enumeration(
                                TaskPriority::Enum,
                                [
                                    TaskPriority::Low,
                                    TaskPriority::Medium,
                                    TaskPriority::High,
                                    TaskPriority::Urgent,
                                ],
                            )
                            .not_null()
                            .default("medium"),
                    )
                    .col(
                        ColumnDef::new(Tasks::Tags)
                            .array(ColumnType::Text)
                            .not_null()
                            .default(Expr::cust("'{}'::text[]")),
                    )
                    .col(timestamp_with_time_zone_null(Tasks::DueAt))
                    .col(timestamp_with_time_zone_null(Tasks::RemindAt))
                    .col(boolean(Tasks::ReminderDispatched).default(false))
                    .col(
                        ColumnDef::new(Tasks::Recurrence)
                            .enumeration(
                                TaskRecurrence::Enum,
                                [
                                    TaskRecurrence::None,
                                    TaskRecurrence::Daily,
                                    TaskRecurrence::Weekly,
                                    TaskRecurrence::Monthly,
                                ],
                            )
                            .not_null()
                            .default("none"),
                    )
                    .col(uuid_null(Tasks::ParentTaskId))
                    .col(uuid(Tasks::UserId))
                    .col(
                        timestamp_with_time_zone(Tasks::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(Tasks::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tasks_parent_task_id")
                            .from(Tasks::Table, Tasks::ParentTaskId)
                            .to(Tasks::Table, Tasks::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // Create indexes
        manager
            .create_index(
                Index::create()
                    .name("idx_tasks_user_id")
                    .table(Tasks::Table)
                    .col(Tasks::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_tasks_parent_task_id")
                    .table(Tasks::Table)
                    .col(Tasks::ParentTaskId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_tasks_created_at")
                    .table(Tasks::Table)
                    .col(Tasks::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // Partial index backing the reminder scheduler scan: only open tasks
        // with an unclaimed reminder are ever matched.
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE INDEX idx_tasks_due_reminders
                    ON tasks (remind_at)
                    WHERE reminder_dispatched = FALSE AND completed = FALSE
                "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Tasks::Table).to_owned())
            .await?;

        manager
            .drop_type(Type::drop().name(TaskRecurrence::Enum).to_owned())
            .await?;

        manager
            .drop_type(Type::drop().name(TaskPriority::Enum).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Tasks {
    Table,
    Id,
    Title,
    Description,
    Completed,
    Priority,
    Tags,
    DueAt,
    RemindAt,
    ReminderDispatched,
    Recurrence,
    ParentTaskId,
    UserId,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum TaskPriority {
    #[sea_orm(iden = "task_priority")]
    Enum,
    #[sea_orm(iden = "low")]
    Low,
    #[sea_orm(iden = "medium")]
    Medium,
    #[sea_orm(iden = "high")]
    High,
    #[sea_orm(iden = "urgent")]
    Urgent,
}

#[derive(DeriveIden)]
enum TaskRecurrence {
    #[sea_orm(iden = "task_recurrence")]
    Enum,
    #[sea_orm(iden = "none")]
    None,
    #[sea_orm(iden = "daily")]
    Daily,
    #[sea_orm(iden = "weekly")]
    Weekly,
    #[sea_orm(iden = "monthly")]
    Monthly,
}
