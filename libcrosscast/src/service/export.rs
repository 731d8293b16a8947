//! Manual export for export-only platforms
//!
//! Instead of a network publish, an Instagram post is written to
//! `instagram-post-YYYY-MM-DD.json` for the user to post by hand.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StorageError};
use crate::service::validation::validate_export;
use crate::types::{MediaItem, PlatformId, Post};

/// Body of the export file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportBundle {
    pub caption: String,
    pub images: Vec<MediaItem>,
    pub timestamp: DateTime<Utc>,
}

impl ExportBundle {
    pub fn new(post: &Post, now: DateTime<Utc>) -> Self {
        Self {
            caption: post.effective_text(PlatformId::Instagram).to_string(),
            images: post.snapshot().images,
            timestamp: now,
        }
    }
}

pub fn export_file_name(now: DateTime<Utc>) -> String {
    format!("instagram-post-{}.json", now.format("%Y-%m-%d"))
}

/// Write the export file into `dir`, returning its path
///
/// A second export on the same day overwrites the first.
pub fn write_instagram_export(post: &Post, dir: &Path, now: DateTime<Utc>) -> Result<PathBuf> {
    validate_export(post)?;

    let bundle = ExportBundle::new(post, now);
    let json = serde_json::to_string_pretty(&bundle).map_err(|source| {
        StorageError::Serialization {
            key: "instagram export".to_string(),
            source,
        }
    })?;

    std::fs::create_dir_all(dir).map_err(StorageError::Io)?;
    let path = dir.join(export_file_name(now));
    std::fs::write(&path, json).map_err(StorageError::Io)?;

    tracing::info!("Instagram export written to {}", path.display());
    Ok(path)
}
