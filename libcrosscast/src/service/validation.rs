//! Pre-flight validation
//!
//! Runs before any network activity. A post is rejected outright when no
//! platform would receive it, when a targeted platform would receive nothing,
//! when text exceeds a platform's limit, or when credentials are missing.
//! Nothing is dispatched if any check fails.

use crate::credentials::Credentials;
use crate::error::{CrosscastError, Result};
use crate::types::{Enablement, PlatformId, Post};

/// Per-platform check result
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformValidation {
    pub platform: PlatformId,
    /// Unicode scalar values in the effective text
    pub characters: usize,
    pub limit: Option<usize>,
    pub errors: Vec<String>,
}

impl PlatformValidation {
    pub fn valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Characters left before the limit; negative when over
    pub fn remaining(&self) -> Option<i64> {
        self.limit
            .map(|limit| limit as i64 - self.characters as i64)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    /// Errors not tied to a platform
    pub errors: Vec<String>,
    /// One entry per publish target, in declaration order
    pub platforms: Vec<PlatformValidation>,
}

impl ValidationReport {
    pub fn valid(&self) -> bool {
        self.errors.is_empty() && self.platforms.iter().all(PlatformValidation::valid)
    }

    /// All error messages, general ones first
    pub fn messages(&self) -> Vec<String> {
        self.errors
            .iter()
            .cloned()
            .chain(self.platforms.iter().flat_map(|p| p.errors.iter().cloned()))
            .collect()
    }

    /// `Ok` if valid, else a `Validation` error carrying every message
    pub fn into_result(self) -> Result<()> {
        if self.valid() {
            Ok(())
        } else {
            Err(CrosscastError::Validation(self.messages().join("; ")))
        }
    }
}

/// Character count as shown by the composer counters
pub fn character_count(text: &str) -> usize {
    text.chars().count()
}

/// Check a post against the enabled platforms and available credentials
pub fn check(post: &Post, enablement: &Enablement, credentials: &Credentials) -> ValidationReport {
    let targets = enablement.publish_targets();
    let mut errors = Vec::new();

    if targets.is_empty() {
        errors.push(
            "Please enable at least one posting platform (Bluesky, Tumblr, or Mastodon)".to_string(),
        );
    }

    let platforms = targets
        .into_iter()
        .map(|platform| check_platform(post, platform, credentials))
        .collect();

    ValidationReport { errors, platforms }
}

fn check_platform(post: &Post, platform: PlatformId, credentials: &Credentials) -> PlatformValidation {
    let name = platform.display_name();
    let text = post.effective_text(platform);
    let characters = character_count(text);
    let limit = platform.character_limit();
    let mut errors = Vec::new();

    if platform == PlatformId::Instagram && !post.has_media() {
        errors.push("Instagram requires at least one image".to_string());
    } else if !post.has_content_for(platform) {
        errors.push(format!("Please enter some content for {}", name));
    }

    if let Some(limit) = limit {
        if characters > limit {
            errors.push(format!(
                "{} text is {} characters; the limit is {}",
                name, characters, limit
            ));
        }
    }

    if !credentials.is_configured(platform) {
        errors.push(format!(
            "Please provide your {} credentials (cross-config set {})",
            name, platform
        ));
    }

    PlatformValidation {
        platform,
        characters,
        limit,
        errors,
    }
}

/// [`check`], converted to a `Result`
pub fn validate(post: &Post, enablement: &Enablement, credentials: &Credentials) -> Result<()> {
    check(post, enablement, credentials).into_result()
}

/// Content check for the manual export path
pub fn validate_export(post: &Post) -> Result<()> {
    if !post.has_media() {
        return Err(CrosscastError::Validation(
            "Instagram requires at least one image".to_string(),
        ));
    }
    Ok(())
}
