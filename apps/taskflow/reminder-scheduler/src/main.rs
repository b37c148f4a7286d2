//! Reminder Scheduler
//!
//! Scans for tasks whose reminder came due, claims each one with a
//! conditional update, and publishes a `reminder.due` event per claim.
//! Can run a single tick or as a periodic service.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use core_config::tracing::{init_tracing, install_color_eyre};
use core_config::{Environment, FromEnv};
use database::postgres::{connect_from_config_with_retry, PostgresConfig};
use database::redis::RedisConfig;
use domain_tasks::{PgTaskRepository, ReminderScheduler, StreamEventPublisher};
use eyre::{Result, WrapErr};
use tokio::signal;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "reminder-scheduler")]
#[command(about = "Scan for due task reminders and publish reminder events")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single scan-claim-publish tick and print a JSON summary
    Scan,

    /// Run periodic ticks until shutdown
    Run {
        /// Seconds between ticks
        #[arg(long, default_value_t = 60)]
        interval_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    install_color_eyre();

    let environment = Environment::from_env();
    init_tracing(&environment);

    let cli = Cli::parse();

    // Connect to PostgreSQL with retry logic
    let pg_config =
        PostgresConfig::from_env().wrap_err("Failed to load PostgreSQL configuration")?;
    info!("Connecting to PostgreSQL...");
    let db = connect_from_config_with_retry(pg_config, None)
        .await
        .wrap_err("Failed to connect to PostgreSQL")?;

    // Connect to Redis with retry logic
    let redis_config = RedisConfig::from_env().wrap_err("Failed to load Redis configuration")?;
    info!("Connecting to Redis...");
    let redis = database::redis::connect_from_config_with_retry(redis_config, None)
        .await
        .wrap_err("Failed to connect to Redis")?;

    let publisher = Arc::new(StreamEventPublisher::new(redis));
    let scheduler = Arc::new(ReminderScheduler::new(
        PgTaskRepository::new(db),
        publisher,
    ));

    match cli.command {
        Commands::Scan => {
            let summary = scheduler.run_tick().await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }

        Commands::Run { interval_secs } => {
            run_periodic(scheduler, interval_secs).await?;
        }
    }

    Ok(())
}

/// Run ticks on a fixed interval until a shutdown signal arrives.
///
/// Each tick runs in its own task behind a single-flight flag: when a tick
/// outlasts the interval, the next one is skipped instead of piling up.
/// Other scheduler processes stay safe regardless, since the per-reminder
/// claim in the store is the real serialization point.
async fn run_periodic(
    scheduler: Arc<ReminderScheduler<PgTaskRepository>>,
    interval_secs: u64,
) -> Result<()> {
    let in_flight = Arc::new(AtomicBool::new(false));

    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = shutdown_signal().await {
            error!("Error waiting for shutdown signal: {}", e);
        }
        let _ = shutdown_tx.send(true);
    });

    info!(interval_secs = %interval_secs, "Reminder scheduler running");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if in_flight
                    .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                    .is_err()
                {
                    warn!("Previous tick still running, skipping this interval");
                    continue;
                }

                let scheduler = Arc::clone(&scheduler);
                let in_flight = Arc::clone(&in_flight);
                tokio::spawn(async move {
                    if let Err(e) = scheduler.run_tick().await {
                        error!(error = %e, "Scheduler tick failed");
                    }
                    in_flight.store(false, Ordering::SeqCst);
                });
            }
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    info!("Received shutdown signal, stopping scheduler");
                    break;
                }
            }
        }
    }

    Ok(())
}

/// Wait for a shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() -> Result<()> {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        },
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        },
    }

    Ok(())
}
