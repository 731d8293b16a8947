//! cross-post - Publish one post to several platforms at once

use std::io::{IsTerminal, Read};
use std::path::PathBuf;

use chrono::Utc;
use clap::Parser;
use libcrosscast::scheduling::{format_time_until, parse_schedule};
use libcrosscast::service::{CrosscastService, PostReport};
use libcrosscast::types::{Enablement, MediaItem, PlatformId, PlatformToggle, Post};
use libcrosscast::{CrosscastError, OutcomeRecord, Result};

#[derive(Parser, Debug)]
#[command(name = "cross-post")]
#[command(version)]
#[command(about = "Publish one post to Bluesky, Tumblr, Mastodon and Instagram")]
#[command(long_about = "\
cross-post - Publish one post to several platforms at once

DESCRIPTION:
    Composes a post from a common text, optional per-platform overrides and
    image files, validates it against every enabled platform, then posts it
    immediately, saves it as a draft, or schedules it for cross-send.

    Instagram is export-only unless --instagram-direct is given: the post is
    written to instagram-post-YYYY-MM-DD.json for manual posting.

USAGE EXAMPLES:
    # Post to the default platforms
    cross-post \"Hello everywhere\"

    # Read text from stdin, post to two platforms
    echo \"Hello\" | cross-post --platform bluesky,mastodon

    # Longer text for Mastodon, with an image
    cross-post \"Short\" --mastodon-text \"A longer version\" --image photo.jpg

    # Schedule for later
    cross-post \"Good morning\" --schedule \"tomorrow 9am\"

    # Save as a draft
    cross-post \"Work in progress\" --draft

CONFIGURATION:
    Configuration file: ~/.config/crosscast/config.toml
    Credentials:        cross-config set <platform>

    Override with environment variables:
        CROSSCAST_CONFIG    - Path to config file
        CROSSCAST_DB_PATH   - Path to database file

EXIT CODES:
    0 - Success on every platform
    1 - Posting failed on at least one platform
    2 - Authentication or configuration error
    3 - Invalid input (empty post, text too long, bad schedule time)
")]
struct Cli {
    /// Common text (reads from stdin if not provided)
    content: Option<String>,

    /// Target platforms, comma-separated (default: [defaults] platforms)
    #[arg(short, long, value_delimiter = ',')]
    platform: Vec<PlatformId>,

    /// Bluesky-specific text
    #[arg(long, value_name = "TEXT")]
    bluesky_text: Option<String>,

    /// Tumblr-specific text (markdown)
    #[arg(long, value_name = "TEXT")]
    tumblr_text: Option<String>,

    /// Mastodon-specific text
    #[arg(long, value_name = "TEXT")]
    mastodon_text: Option<String>,

    /// Instagram caption
    #[arg(long, value_name = "TEXT")]
    instagram_text: Option<String>,

    /// Attach an image (repeatable)
    #[arg(short, long, value_name = "FILE")]
    image: Vec<PathBuf>,

    /// Publish to Instagram through the Graph API instead of exporting
    #[arg(long)]
    instagram_direct: bool,

    /// Directory for the Instagram export file
    #[arg(long, value_name = "DIR", default_value = ".")]
    export_dir: PathBuf,

    /// Save as draft without posting
    #[arg(short, long, conflicts_with = "schedule")]
    draft: bool,

    /// Schedule instead of posting now (e.g. "2h", "tomorrow 3pm", "2025-11-20 15:00")
    #[arg(short, long, value_name = "TIME")]
    schedule: Option<String>,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
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
    if cli.format != "text" && cli.format != "json" {
        return Err(CrosscastError::InvalidInput(format!(
            "Invalid format '{}'. Must be 'text' or 'json'",
            cli.format
        )));
    }

    let service = CrosscastService::new().await?;
    let post = build_post(&cli, service.config().media.max_upload_bytes)?;
    let enablement = build_enablement(&cli, &service);
    let now = Utc::now();

    if cli.draft {
        let draft = service.drafts().save(&post, &enablement, now).await?;
        if cli.format == "json" {
            print_json(&serde_json::json!({ "draft": draft.id }));
        } else {
            println!("Saved draft {}", draft.id);
        }
        return Ok(0);
    }

    if let Some(when) = &cli.schedule {
        let at = parse_schedule(when, now)?;
        let job = service.schedule(&post, &enablement, at, now).await?;
        if cli.format == "json" {
            print_json(&serde_json::json!({
                "scheduled": job.id,
                "scheduledTime": job.scheduled_time,
            }));
        } else {
            println!(
                "Scheduled {} for {} ({})",
                job.id,
                job.scheduled_time.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M"),
                format_time_until(job.scheduled_time, now)
            );
        }
        return Ok(0);
    }

    let report = service
        .post_now(&post, &enablement, Some(&cli.export_dir), now)
        .await?;
    print_report(&report, &cli.format);

    Ok(if report.all_succeeded() { 0 } else { 1 })
}

fn build_post(cli: &Cli, max_upload_bytes: u64) -> Result<Post> {
    let common = match &cli.content {
        Some(text) => text.clone(),
        None if !std::io::stdin().is_terminal() => {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer).map_err(|e| {
                CrosscastError::InvalidInput(format!("Failed to read stdin: {}", e))
            })?;
            buffer.trim_end().to_string()
        }
        None => String::new(),
    };

    let mut post = Post::new(common);
    let overrides = [
        (PlatformId::Bluesky, &cli.bluesky_text),
        (PlatformId::Tumblr, &cli.tumblr_text),
        (PlatformId::Mastodon, &cli.mastodon_text),
        (PlatformId::Instagram, &cli.instagram_text),
    ];
    for (platform, text) in overrides {
        if let Some(text) = text {
            post.set_override(platform, text.clone());
        }
    }

    for path in &cli.image {
        post.images.push(MediaItem::from_path(path, max_upload_bytes)?);
    }

    Ok(post)
}

fn build_enablement(cli: &Cli, service: &CrosscastService) -> Enablement {
    let mut enablement = if cli.platform.is_empty() {
        service.default_enablement()
    } else {
        Enablement::only(&cli.platform)
    };

    if cli.instagram_direct && enablement.instagram.enabled {
        enablement.instagram = PlatformToggle::on();
    }
    enablement
}

fn print_report(report: &PostReport, format: &str) {
    if format == "json" {
        print_json(&serde_json::json!({
            "outcomes": report.outcomes,
            "export": report.export_path,
        }));
        return;
    }

    for outcome in &report.outcomes {
        print_outcome(outcome);
    }
    if let Some(path) = &report.export_path {
        println!("instagram: exported to {}", path.display());
    }
}

fn print_outcome(outcome: &OutcomeRecord) {
    let mark = if outcome.success { "ok" } else { "FAILED" };
    println!("{}: {} - {}", outcome.platform, mark, outcome.message);
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => tracing::error!("Failed to render JSON: {}", e),
    }
}
