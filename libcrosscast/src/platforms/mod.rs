//! Platform adapters
//!
//! Each adapter implements [`Platform::send`], the platform-specific
//! authentication and publish sequence. The shared [`publish`] wrapper turns
//! that into the uniform contract: it checks for content before any network
//! call, normalizes media per platform, reports progress, and converts every
//! failure into a failed [`OutcomeRecord`]. `publish` always resolves.
//!
//! ```no_run
//! use libcrosscast::config::MediaConfig;
//! use libcrosscast::credentials::MastodonCredentials;
//! use libcrosscast::platforms::{mastodon::MastodonClient, publish};
//! use libcrosscast::service::events::EventBus;
//! use libcrosscast::types::Post;
//!
//! # async fn example() {
//! let client = MastodonClient::new(MastodonCredentials {
//!     instance_url: "mastodon.social".to_string(),
//!     access_token: "token".to_string(),
//! });
//! let outcome = publish(&client, &Post::new("Hello"), &MediaConfig::default(), &EventBus::default()).await;
//! println!("{}: {}", outcome.platform, outcome.message);
//! # }
//! ```

use async_trait::async_trait;
use serde_json::Value;

use crate::config::MediaConfig;
use crate::error::Result;
use crate::media::{self, NormalizedImage};
use crate::service::events::EventBus;
use crate::types::{OutcomeRecord, PlatformId, Post};

pub mod bluesky;
pub mod http;
pub mod instagram;
pub mod mastodon;
pub mod tumblr;

// Available outside tests so integration tests can use it
pub mod mock;

/// One destination's publish protocol
#[async_trait]
pub trait Platform: Send + Sync {
    fn id(&self) -> PlatformId;

    /// Attachments beyond this count are dropped before upload
    fn max_media(&self) -> Option<usize> {
        None
    }

    /// Text-only posts are rejected outright
    fn requires_media(&self) -> bool {
        false
    }

    /// Authenticate (if needed), upload media, and create the post
    ///
    /// `text` is the effective text; `media` is already normalized and
    /// truncated. Returns the platform's response payload.
    ///
    /// # Errors
    ///
    /// Any [`crate::error::PlatformError`]. Callers go through [`publish`],
    /// which turns errors into failed outcomes.
    async fn send(&self, text: &str, media: &[NormalizedImage], events: &EventBus)
        -> Result<Value>;
}

/// Run one adapter under the uniform outcome contract
pub async fn publish(
    platform: &dyn Platform,
    post: &Post,
    media_config: &MediaConfig,
    events: &EventBus,
) -> OutcomeRecord {
    let id = platform.id();
    let name = id.display_name();
    let text = post.effective_text(id);

    if platform.requires_media() && !post.has_media() {
        return fail(events, id, format!("{} requires at least one image", name));
    }
    if text.trim().is_empty() && !post.has_media() {
        return fail(events, id, "No content to post".to_string());
    }

    events.progress(id, false, format!("Posting to {}...", name));

    let mut items: Vec<_> = post.images.iter().collect();
    if let Some(limit) = platform.max_media() {
        if items.len() > limit {
            tracing::debug!(
                platform = %id,
                attached = items.len(),
                limit,
                "Dropping attachments over the platform limit"
            );
            items.truncate(limit);
        }
    }

    let max_width = media_config.max_width_for(id);
    let mut prepared = Vec::with_capacity(items.len());
    let mut skipped = Vec::new();
    for item in items {
        let source = item.clone();
        let quality = media_config.quality;
        let result = tokio::task::spawn_blocking(move || media::normalize(&source, max_width, quality))
            .await
            .unwrap_or_else(|e| Err(crate::error::MediaError::Decode(e.to_string())));

        match result {
            Ok(image) => prepared.push(image),
            Err(e) => {
                tracing::warn!(platform = %id, "Skipping attachment: {}", e);
                skipped.push(e.to_string());
            }
        }
    }

    let notes = if skipped.is_empty() {
        String::new()
    } else {
        format!(" (skipped {} image(s): {})", skipped.len(), skipped.join("; "))
    };

    if platform.requires_media() && prepared.is_empty() {
        return fail(events, id, format!("{} requires at least one image{}", name, notes));
    }
    if text.trim().is_empty() && prepared.is_empty() {
        return fail(events, id, format!("No content to post{}", notes));
    }

    match platform.send(text, &prepared, events).await {
        Ok(data) => {
            let message = format!("Posted successfully to {}{}", name, notes);
            tracing::info!(platform = %id, "{}", message);
            events.progress(id, true, message.clone());
            OutcomeRecord::succeeded(id, message, Some(data))
        }
        Err(e) => fail(events, id, format!("Error: {}{}", e, notes)),
    }
}

fn fail(events: &EventBus, id: PlatformId, message: String) -> OutcomeRecord {
    tracing::warn!(platform = %id, "{}", message);
    events.progress(id, false, message.clone());
    OutcomeRecord::failed(id, message)
}
