//! Recurrence Worker Service - Entry Point
//!
//! Background worker that materializes recurring task occurrences from the
//! task-events Redis stream.

#[tokio::main]
async fn main() -> eyre::Result<()> {
    taskflow_recurrence_worker::run().await
}
