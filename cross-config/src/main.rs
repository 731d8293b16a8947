//! cross-config - Platform credentials and preferences
//!
//! Manages the credential blob shared by every cross-* tool: show it
//! redacted, set one platform, export it to a file, import it on another
//! machine, and read or change the theme preference.

use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use libcrosscast::credentials::{Credentials, EXPORT_FILE_NAME};
use libcrosscast::service::CrosscastService;
use libcrosscast::{CrosscastError, PlatformId, Theme};

#[derive(Parser)]
#[command(name = "cross-config")]
#[command(version)]
#[command(about = "Manage Crosscast platform credentials and preferences", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show configured platforms (secrets are masked)
    Show,

    /// Store credentials for a platform
    Set {
        /// Platform name (bluesky, tumblr, mastodon, instagram)
        platform: PlatformId,

        /// Read values from stdin, one per line, instead of prompting
        #[arg(long)]
        stdin: bool,
    },

    /// Write all credentials to a JSON file
    Export {
        /// Destination file
        #[arg(default_value = EXPORT_FILE_NAME)]
        file: PathBuf,
    },

    /// Replace all credentials with a previously exported file
    Import {
        /// File produced by `cross-config export`
        file: PathBuf,
    },

    /// Show or set the colour theme
    Theme {
        /// dark or light; omit to print the current theme
        theme: Option<Theme>,

        /// Switch to the other theme
        #[arg(long, conflicts_with = "theme")]
        toggle: bool,
    },
}

/// One credential field as prompted
struct Field {
    label: &'static str,
    secret: bool,
    optional: bool,
}

const fn field(label: &'static str, secret: bool, optional: bool) -> Field {
    Field {
        label,
        secret,
        optional,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    libcrosscast::logging::init_default(cli.verbose);

    if let Err(e) = run_command(cli.command).await {
        eprintln!("Error: {:#}", e);
        let code = e
            .downcast_ref::<CrosscastError>()
            .map(CrosscastError::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}

async fn run_command(command: Commands) -> Result<()> {
    let service = CrosscastService::new().await?;

    match command {
        Commands::Show => show_credentials(&service),
        Commands::Set { platform, stdin } => set_credentials(&service, platform, stdin).await,
        Commands::Export { file } => {
            service.credentials().export_to_file(&file)?;
            println!("Exported credentials to {}", file.display());
            eprintln!("This file contains secrets; keep it private.");
            Ok(())
        }
        Commands::Import { file } => {
            service.credentials().import_from_file(&file).await?;
            println!("Imported credentials from {}", file.display());
            Ok(())
        }
        Commands::Theme { theme, toggle } => {
            let current = if toggle {
                service.toggle_theme().await?
            } else if let Some(theme) = theme {
                service.set_theme(theme).await?;
                theme
            } else {
                service.theme().await?
            };
            println!("{}", current.as_str());
            Ok(())
        }
    }
}

fn show_credentials(service: &CrosscastService) -> Result<()> {
    let creds = service.credentials().get();

    for platform in PlatformId::ALL {
        let status = if creds.is_configured(platform) {
            "configured"
        } else {
            "not configured"
        };
        println!("{} ({})", platform.display_name(), status);

        for (label, value, secret) in describe(&creds, platform) {
            println!("  {:<22} {}", label, display_value(value, secret));
        }
    }
    Ok(())
}

fn display_value(value: &str, secret: bool) -> String {
    if value.is_empty() {
        "-".to_string()
    } else if secret {
        "********".to_string()
    } else {
        value.to_string()
    }
}

fn describe(creds: &Credentials, platform: PlatformId) -> Vec<(&'static str, &str, bool)> {
    match platform {
        PlatformId::Bluesky => vec![
            ("username", creds.bluesky.username.as_str(), false),
            ("app password", creds.bluesky.app_password.as_str(), true),
        ],
        PlatformId::Tumblr => vec![
            ("blog", creds.tumblr.blog_identifier.as_str(), false),
            ("api key", creds.tumblr.api_key.as_str(), true),
        ],
        PlatformId::Mastodon => vec![
            ("instance", creds.mastodon.instance_url.as_str(), false),
            ("access token", creds.mastodon.access_token.as_str(), true),
        ],
        PlatformId::Instagram => vec![
            ("business account id", creds.instagram.business_account_id.as_str(), false),
            ("access token", creds.instagram.access_token.as_str(), true),
            ("app id", creds.instagram.app_id.as_str(), false),
            ("app secret", creds.instagram.app_secret.as_str(), true),
            ("facebook page id", creds.instagram.facebook_page_id.as_str(), false),
        ],
    }
}

fn fields(platform: PlatformId) -> Vec<Field> {
    match platform {
        PlatformId::Bluesky => vec![
            field("Bluesky handle (e.g. alice.bsky.social)", false, false),
            field("Bluesky app password", true, false),
        ],
        PlatformId::Tumblr => vec![
            field("Tumblr blog (e.g. myblog.tumblr.com)", false, false),
            field("Tumblr API key", true, false),
        ],
        PlatformId::Mastodon => vec![
            field("Mastodon instance (e.g. mastodon.social)", false, false),
            field("Mastodon access token", true, false),
        ],
        PlatformId::Instagram => vec![
            field("Instagram business account id", false, false),
            field("Instagram access token", true, false),
            field("Facebook app id (optional)", false, true),
            field("Facebook app secret (optional)", true, true),
            field("Facebook page id (optional)", false, true),
        ],
    }
}

async fn set_credentials(
    service: &CrosscastService,
    platform: PlatformId,
    use_stdin: bool,
) -> Result<()> {
    let values = if use_stdin || !io::stdin().is_terminal() {
        read_stdin_values(platform)?
    } else {
        prompt_values(platform)?
    };

    service
        .credentials()
        .update(|creds| apply(creds, platform, values))
        .await?;

    println!("Saved {} credentials", platform.display_name());
    Ok(())
}

fn read_stdin_values(platform: PlatformId) -> Result<Vec<String>> {
    let fields = fields(platform);
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    let mut values = Vec::with_capacity(fields.len());
    for field in &fields {
        let value = match lines.next() {
            Some(line) => line.context("Failed to read stdin")?.trim().to_string(),
            None => String::new(),
        };
        check_required(field, &value)?;
        values.push(value);
    }
    Ok(values)
}

fn prompt_values(platform: PlatformId) -> Result<Vec<String>> {
    let fields = fields(platform);
    let mut values = Vec::with_capacity(fields.len());

    for field in &fields {
        let value = if field.secret {
            rpassword::prompt_password(format!("{}: ", field.label))
                .context("Failed to read secret")?
        } else {
            print!("{}: ", field.label);
            io::stdout().flush()?;
            let mut input = String::new();
            io::stdin().read_line(&mut input)?;
            input
        };
        let value = value.trim().to_string();
        check_required(field, &value)?;
        values.push(value);
    }
    Ok(values)
}

fn check_required(field: &Field, value: &str) -> Result<()> {
    if value.is_empty() && !field.optional {
        return Err(CrosscastError::InvalidInput(format!("{} cannot be empty", field.label)).into());
    }
    Ok(())
}

/// Write prompted values into the matching credential fields
fn apply(creds: &mut Credentials, platform: PlatformId, values: Vec<String>) {
    let mut values = values.into_iter();
    let mut next = || values.next().unwrap_or_default();

    match platform {
        PlatformId::Bluesky => {
            creds.bluesky.username = next();
            creds.bluesky.app_password = next();
        }
        PlatformId::Tumblr => {
            creds.tumblr.blog_identifier = next();
            creds.tumblr.api_key = next();
        }
        PlatformId::Mastodon => {
            creds.mastodon.instance_url = next();
            creds.mastodon.access_token = next();
        }
        PlatformId::Instagram => {
            creds.instagram.business_account_id = next();
            creds.instagram.access_token = next();
            creds.instagram.app_id = next();
            creds.instagram.app_secret = next();
            creds.instagram.facebook_page_id = next();
        }
    }
}
