//! Notification Worker Service - Entry Point
//!
//! Background worker that delivers reminder notifications from the reminders
//! Redis stream.

#[tokio::main]
async fn main() -> eyre::Result<()> {
    taskflow_notification_worker::run().await
}
