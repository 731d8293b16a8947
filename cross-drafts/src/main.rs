//! cross-drafts - Manage saved drafts

use std::path::PathBuf;

use chrono::{Local, Utc};
use clap::{Parser, Subcommand};
use libcrosscast::scheduling::parse_schedule;
use libcrosscast::service::CrosscastService;
use libcrosscast::{CrosscastError, Draft, PlatformId, Result};

#[derive(Parser, Debug)]
#[command(name = "cross-drafts")]
#[command(version)]
#[command(about = "Manage saved drafts")]
#[command(long_about = "\
cross-drafts - Manage saved drafts

DESCRIPTION:
    Drafts are posts saved with `cross-post --draft`, together with the
    platforms that were enabled at the time. A draft can be inspected,
    deleted, published, or moved to the schedule.

USAGE EXAMPLES:
    # List drafts, newest first
    cross-drafts list

    # Show one draft in full
    cross-drafts show <DRAFT_ID>

    # Publish a draft now (it is deleted once any platform accepts it)
    cross-drafts publish <DRAFT_ID>

    # Schedule a draft
    cross-drafts schedule <DRAFT_ID> \"tomorrow 9am\"

EXIT CODES:
    0 - Success
    1 - Posting failed on at least one platform
    2 - Database or configuration error
    3 - Invalid input (unknown draft ID, validation failure)
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
    /// List drafts, newest first
    List {
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show one draft
    Show {
        draft_id: String,

        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Delete a draft
    Delete { draft_id: String },

    /// Publish a draft now
    Publish {
        draft_id: String,

        /// Directory for the Instagram export file
        #[arg(long, value_name = "DIR", default_value = ".")]
        export_dir: PathBuf,
    },

    /// Move a draft to the schedule
    Schedule {
        draft_id: String,

        /// When to publish (e.g. "2h", "tomorrow 3pm")
        time: String,
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
        Commands::List { format } => {
            check_format(&format)?;
            let drafts = service.drafts().list().await?;
            if format == "json" {
                print_json(&drafts)?;
            } else {
                for draft in &drafts {
                    println!("{}", summary_line(draft));
                }
            }
            Ok(0)
        }
        Commands::Show { draft_id, format } => {
            check_format(&format)?;
            let draft = service
                .drafts()
                .get(&draft_id)
                .await?
                .ok_or_else(|| CrosscastError::InvalidInput(format!("Draft not found: {}", draft_id)))?;
            if format == "json" {
                print_json(&draft)?;
            } else {
                print_draft(&draft);
            }
            Ok(0)
        }
        Commands::Delete { draft_id } => {
            service.drafts().delete(&draft_id).await?;
            println!("Deleted draft {}", draft_id);
            Ok(0)
        }
        Commands::Publish {
            draft_id,
            export_dir,
        } => {
            let report = service
                .publish_draft(&draft_id, Some(&export_dir), Utc::now())
                .await?;
            for outcome in &report.outcomes {
                let mark = if outcome.success { "ok" } else { "FAILED" };
                println!("{}: {} - {}", outcome.platform, mark, outcome.message);
            }
            if let Some(path) = &report.export_path {
                println!("instagram: exported to {}", path.display());
            }
            Ok(if report.all_succeeded() { 0 } else { 1 })
        }
        Commands::Schedule { draft_id, time } => {
            let now = Utc::now();
            let at = parse_schedule(&time, now)?;
            let (post, enablement) = service.drafts().load(&draft_id).await?;
            let job = service.schedule(&post, &enablement, at, now).await?;
            service.drafts().delete(&draft_id).await?;
            println!("Scheduled draft {} as {}", draft_id, job.id);
            Ok(0)
        }
    }
}

fn check_format(format: &str) -> Result<()> {
    if format != "text" && format != "json" {
        return Err(CrosscastError::InvalidInput(format!(
            "Invalid format '{}'. Must be 'text' or 'json'",
            format
        )));
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|e| CrosscastError::InvalidInput(format!("Failed to render JSON: {}", e)))?;
    println!("{}", rendered);
    Ok(())
}

fn summary_line(draft: &Draft) -> String {
    let preview: String = draft.post.common.replace('\n', " ").chars().take(50).collect();
    format!(
        "{} | {} | {} | {} image(s)",
        draft.id,
        draft.created.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
        preview,
        draft.post.images.len()
    )
}

fn print_draft(draft: &Draft) {
    println!("id:       {}", draft.id);
    println!(
        "created:  {}",
        draft.created.with_timezone(&Local).format("%Y-%m-%d %H:%M")
    );
    println!("text:     {}", draft.post.common);
    for platform in PlatformId::ALL {
        let toggle = draft.platforms.get(platform);
        let mode = match (toggle.enabled, toggle.export_only) {
            (false, _) => "off",
            (true, true) => "export",
            (true, false) => "on",
        };
        let text = draft.post.override_for(platform);
        if text.is_empty() {
            println!("{:<9} {}", format!("{}:", platform), mode);
        } else {
            println!("{:<9} {} | {}", format!("{}:", platform), mode, text);
        }
    }
    for item in &draft.post.images {
        println!("image:    {} ({} bytes)", item.file_name, item.size());
    }
}
