//! Configuration management for Crosscast
//!
//! Application settings live in a TOML file. Platform credentials are not
//! part of this file; they belong to the [`crate::credentials::CredentialStore`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result};
use crate::types::PlatformId;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduling: SchedulingConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub endpoints: EndpointsConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "~/.local/share/crosscast/crosscast.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SchedulingConfig {
    /// Seconds between scheduler ticks
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
}

fn default_poll_interval() -> u64 {
    60
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaConfig {
    #[serde(default = "default_max_width")]
    pub max_width: u32,
    #[serde(default = "default_instagram_max_width")]
    pub instagram_max_width: u32,
    /// JPEG quality, 1..=100
    #[serde(default = "default_quality")]
    pub quality: u8,
    /// Raw attachments larger than this are rejected before normalization
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

fn default_max_width() -> u32 {
    1200
}

fn default_instagram_max_width() -> u32 {
    1080
}

fn default_quality() -> u8 {
    80
}

fn default_max_upload_bytes() -> u64 {
    5 * 1024 * 1024
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            max_width: default_max_width(),
            instagram_max_width: default_instagram_max_width(),
            quality: default_quality(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl MediaConfig {
    /// Width bound for a given platform
    pub fn max_width_for(&self, platform: PlatformId) -> u32 {
        match platform {
            PlatformId::Instagram => self.instagram_max_width,
            _ => self.max_width,
        }
    }
}

/// Base URLs for platform APIs
///
/// Mastodon is absent: its instance URL is part of the credentials.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EndpointsConfig {
    #[serde(default = "default_bluesky_endpoint")]
    pub bluesky: String,
    #[serde(default = "default_tumblr_endpoint")]
    pub tumblr: String,
    #[serde(default = "default_instagram_endpoint")]
    pub instagram: String,
}

fn default_bluesky_endpoint() -> String {
    "https://bsky.social".to_string()
}

fn default_tumblr_endpoint() -> String {
    "https://api.tumblr.com".to_string()
}

fn default_instagram_endpoint() -> String {
    "https://graph.facebook.com/v18.0".to_string()
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            bluesky: default_bluesky_endpoint(),
            tumblr: default_tumblr_endpoint(),
            instagram: default_instagram_endpoint(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DefaultsConfig {
    #[serde(default = "default_platforms")]
    pub platforms: Vec<PlatformId>,
}

fn default_platforms() -> Vec<PlatformId> {
    PlatformId::ALL.to_vec()
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            platforms: default_platforms(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            scheduling: SchedulingConfig::default(),
            media: MediaConfig::default(),
            endpoints: EndpointsConfig::default(),
            defaults: DefaultsConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location
    ///
    /// A missing file yields the built-in defaults. `CROSSCAST_DB_PATH`
    /// overrides the database path either way.
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        let mut config = if config_path.exists() {
            Self::load_from_path(&config_path)?
        } else {
            tracing::debug!(
                "No config file at {}, using defaults",
                config_path.display()
            );
            Self::default()
        };

        if let Ok(db_path) = std::env::var("CROSSCAST_DB_PATH") {
            config.database.path = db_path;
        }

        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.scheduling.poll_interval == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scheduling.poll_interval".to_string(),
                reason: "must be at least 1 second".to_string(),
            }
            .into());
        }

        if !(1..=100).contains(&self.media.quality) {
            return Err(ConfigError::InvalidValue {
                field: "media.quality".to_string(),
                reason: format!("{} is outside 1..=100", self.media.quality),
            }
            .into());
        }

        if self.media.max_width == 0 || self.media.instagram_max_width == 0 {
            return Err(ConfigError::InvalidValue {
                field: "media.max_width".to_string(),
                reason: "must be greater than zero".to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// Database path with `~` expanded
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.database.path).to_string())
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("CROSSCAST_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("crosscast").join("config.toml"))
}
