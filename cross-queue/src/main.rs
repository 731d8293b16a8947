//! cross-queue - Manage scheduled posts
//!
//! Unix-style tool for the scheduled post queue.

use chrono::Utc;
use clap::{Parser, Subcommand};
use libcrosscast::scheduling::{format_time_until, parse_schedule};
use libcrosscast::service::CrosscastService;
use libcrosscast::{CrosscastError, PlatformId, Result, ScheduledJob};

#[derive(Parser, Debug)]
#[command(name = "cross-queue")]
#[command(version)]
#[command(about = "Manage scheduled posts")]
#[command(long_about = "\
cross-queue - Manage scheduled posts

DESCRIPTION:
    cross-queue lists, cancels, reschedules, or immediately publishes posts
    waiting in the Crosscast schedule. Scheduled posts are published by
    cross-send when their time comes.

COMMANDS:
    list        List all scheduled posts, soonest first
    cancel      Cancel a scheduled post
    reschedule  Move a post to a different time
    now         Publish a scheduled post immediately

USAGE EXAMPLES:
    # List all scheduled posts
    cross-queue list

    # List posts in JSON format
    cross-queue list --format json

    # Cancel a specific post
    cross-queue cancel <JOB_ID>

    # Reschedule a post
    cross-queue reschedule <JOB_ID> \"tomorrow 3pm\"

    # Publish a scheduled post now
    cross-queue now <JOB_ID>

CONFIGURATION:
    Configuration file: ~/.config/crosscast/config.toml
    Database location: ~/.local/share/crosscast/crosscast.db

    Override with environment variables:
        CROSSCAST_CONFIG    - Path to config file
        CROSSCAST_DB_PATH   - Path to database file

EXIT CODES:
    0 - Success
    1 - Operation failed
    2 - Database or configuration error
    3 - Invalid input (unknown job ID, bad time format, etc.)
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List scheduled posts
    List {
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Only posts targeting this platform
        #[arg(short, long)]
        platform: Option<PlatformId>,
    },

    /// Cancel a scheduled post
    Cancel {
        /// Job ID to cancel
        job_id: String,
    },

    /// Reschedule a post
    Reschedule {
        /// Job ID to reschedule
        job_id: String,

        /// New schedule time (e.g., "tomorrow 3pm", "2h")
        time: String,
    },

    /// Publish immediately
    Now {
        /// Job ID to publish now
        job_id: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    libcrosscast::logging::init_default(cli.verbose);

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let service = CrosscastService::new().await?;

    match cli.command {
        Commands::List { format, platform } => cmd_list(&service, &format, platform).await,
        Commands::Cancel { job_id } => cmd_cancel(&service, &job_id).await,
        Commands::Reschedule { job_id, time } => cmd_reschedule(&service, &job_id, &time).await,
        Commands::Now { job_id } => cmd_now(&service, &job_id).await,
    }
}

/// List scheduled posts
async fn cmd_list(
    service: &CrosscastService,
    format: &str,
    platform: Option<PlatformId>,
) -> Result<i32> {
    if format != "text" && format != "json" {
        return Err(CrosscastError::InvalidInput(format!(
            "Invalid format '{}'. Must be 'text' or 'json'",
            format
        )));
    }

    let mut jobs = service.queue().all().await?;
    if let Some(platform) = platform {
        jobs.retain(|job| job.platforms.publish_targets().contains(&platform));
    }

    if format == "json" {
        output_list_json(&jobs)?;
    } else {
        output_list_text(&jobs);
    }

    Ok(0)
}

fn output_list_json(jobs: &[ScheduledJob]) -> Result<()> {
    let json: Vec<serde_json::Value> = jobs
        .iter()
        .map(|job| {
            serde_json::json!({
                "id": job.id,
                "content": job.post.common,
                "platforms": job.platforms.publish_targets(),
                "images": job.post.images.len(),
                "scheduledTime": job.scheduled_time,
                "created": job.created,
            })
        })
        .collect();

    let rendered = serde_json::to_string_pretty(&json)
        .map_err(|e| CrosscastError::InvalidInput(format!("Failed to render JSON: {}", e)))?;
    println!("{}", rendered);
    Ok(())
}

fn output_list_text(jobs: &[ScheduledJob]) {
    let now = Utc::now();

    for job in jobs {
        let platforms: Vec<&str> = job
            .platforms
            .publish_targets()
            .iter()
            .map(|p| p.as_str())
            .collect();

        println!(
            "{} | {} | {} | {}",
            job.id,
            truncate_content(&job.post.common, 50),
            platforms.join(","),
            format_time_until(job.scheduled_time, now)
        );
    }
}

/// Truncate on a character boundary, adding an ellipsis
fn truncate_content(content: &str, max_chars: usize) -> String {
    let single_line = content.replace('\n', " ");
    if single_line.chars().count() <= max_chars {
        single_line
    } else {
        let cut: String = single_line.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

async fn cmd_cancel(service: &CrosscastService, job_id: &str) -> Result<i32> {
    service.queue().cancel(job_id).await?;
    println!("Cancelled {}", job_id);
    Ok(0)
}

async fn cmd_reschedule(service: &CrosscastService, job_id: &str, time: &str) -> Result<i32> {
    let now = Utc::now();
    let at = parse_schedule(time, now)?;
    let job = service.queue().reschedule(job_id, at, now).await?;

    println!(
        "Rescheduled as {} ({})",
        job.id,
        format_time_until(job.scheduled_time, now)
    );
    Ok(0)
}

async fn cmd_now(service: &CrosscastService, job_id: &str) -> Result<i32> {
    let report = service.dispatch_now(job_id).await?;

    let mut failed = 0;
    for outcome in &report.outcomes {
        let mark = if outcome.success { "ok" } else { "FAILED" };
        println!("{}: {} - {}", outcome.platform, mark, outcome.message);
        if !outcome.success {
            failed += 1;
        }
    }

    if !report.removed {
        eprintln!(
            "Warning: job {} was published but could not be removed from the schedule",
            report.job_id
        );
    }

    Ok(if failed == 0 && report.removed { 0 } else { 1 })
}
