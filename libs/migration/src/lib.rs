//! Schema migrations, applied in filename-timestamp order.
//!
//! Test containers and app startup both run these through [`Migrator`], so
//! the schema in CI is always the schema in production.

pub use sea_orm_migration::prelude::*;

mod m20250301_000000_create_tasks;
mod m20250301_000001_create_processed_events;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000000_create_tasks::Migration),
            Box::new(m20250301_000001_create_processed_events::Migration),
        ]
    }
}
