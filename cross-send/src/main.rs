//! cross-send - Background scheduler for scheduled posts
//!
//! Checks the schedule every poll interval and publishes posts whose time has
//! come. Each post is attempted once and then removed from the schedule.

use std::time::Duration;

use clap::Parser;
use libcrosscast::service::CrosscastService;
use libcrosscast::{CrosscastError, Result};
use tokio::sync::watch;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "cross-send")]
#[command(version)]
#[command(about = "Background scheduler for scheduled posts")]
#[command(long_about = "\
cross-send - Background scheduler for scheduled posts

DESCRIPTION:
    cross-send is a long-running process that watches the Crosscast
    schedule and publishes posts when their time comes. A post whose time
    passed while cross-send was not running is published on the first check.

    Every scheduled post is attempted exactly once. Whatever the outcome on
    each platform, the post is then removed from the schedule and the
    per-platform results are logged.

USAGE:
    # Run in foreground (logs to stderr)
    cross-send

    # Check every 30 seconds
    cross-send --poll-interval 30

    # Publish whatever is due, then exit
    cross-send --once

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (waits for posts already being published)

CONFIGURATION:
    Configuration file: ~/.config/crosscast/config.toml

    [scheduling]
    poll_interval = 60  # seconds between checks

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
    2 - Configuration error
")]
struct Cli {
    /// Poll interval in seconds (overrides config)
    #[arg(long, value_name = "SECONDS")]
    poll_interval: Option<u64>,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Process due posts once and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    libcrosscast::logging::init_default(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let service = CrosscastService::new().await?;

    let mut scheduler = service.scheduler();
    if let Some(seconds) = cli.poll_interval {
        if seconds == 0 {
            return Err(CrosscastError::InvalidInput(
                "Poll interval must be at least 1 second".to_string(),
            ));
        }
        scheduler = scheduler.with_period(Duration::from_secs(seconds));
    }

    if cli.once {
        let count = scheduler.tick().await?;
        let reports = scheduler.drain().await;
        info!(
            "cross-send: dispatched {} scheduled post(s), {} removed",
            count,
            reports.iter().filter(|r| r.removed).count()
        );
        return Ok(());
    }

    info!("cross-send starting");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let signals = tokio::spawn(wait_for_shutdown(shutdown_tx));

    let reports = scheduler.run(shutdown_rx).await;
    signals.abort();

    info!(
        "cross-send stopped after finishing {} in-flight post(s)",
        reports.len()
    );
    Ok(())
}

/// Flip the shutdown flag on SIGINT or SIGTERM
#[cfg(unix)]
async fn wait_for_shutdown(shutdown: watch::Sender<bool>) {
    use futures::StreamExt;
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook_tokio::Signals;

    let mut signals = match Signals::new([SIGINT, SIGTERM]) {
        Ok(signals) => signals,
        Err(e) => {
            // Keep the sender alive; dropping it would stop the scheduler
            error!("Signal setup failed: {}", e);
            std::future::pending::<()>().await;
            return;
        }
    };
    let handle = signals.handle();

    if let Some(signal) = signals.next().await {
        info!("Received signal {}, stopping gracefully...", signal);
        let _ = shutdown.send(true);
    }
    handle.close();
}

#[cfg(not(unix))]
async fn wait_for_shutdown(shutdown: watch::Sender<bool>) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("Received Ctrl-C, stopping gracefully...");
            let _ = shutdown.send(true);
        }
        Err(e) => {
            error!("Signal setup failed: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
