//! Core types for Crosscast

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{CrosscastError, MediaError};

// ============================================================================
// Platforms
// ============================================================================

/// The fixed set of destinations, in declaration order.
///
/// Declaration order is significant: outcome lists are always reported in this
/// order, and `Ord` follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformId {
    Bluesky,
    Tumblr,
    Mastodon,
    Instagram,
}

impl PlatformId {
    pub const ALL: [PlatformId; 4] = [
        PlatformId::Bluesky,
        PlatformId::Tumblr,
        PlatformId::Mastodon,
        PlatformId::Instagram,
    ];

    /// Lowercase identifier used in persisted blobs and on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformId::Bluesky => "bluesky",
            PlatformId::Tumblr => "tumblr",
            PlatformId::Mastodon => "mastodon",
            PlatformId::Instagram => "instagram",
        }
    }

    /// Human-facing name for status messages
    pub fn display_name(&self) -> &'static str {
        match self {
            PlatformId::Bluesky => "Bluesky",
            PlatformId::Tumblr => "Tumblr",
            PlatformId::Mastodon => "Mastodon",
            PlatformId::Instagram => "Instagram",
        }
    }

    /// Maximum post length in characters, or `None` when the platform has no hard limit
    pub fn character_limit(&self) -> Option<usize> {
        match self {
            PlatformId::Bluesky => Some(300),
            PlatformId::Tumblr => None,
            PlatformId::Mastodon => Some(500),
            PlatformId::Instagram => Some(2200),
        }
    }
}

impl fmt::Display for PlatformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlatformId {
    type Err = CrosscastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bluesky" => Ok(PlatformId::Bluesky),
            "tumblr" => Ok(PlatformId::Tumblr),
            "mastodon" => Ok(PlatformId::Mastodon),
            "instagram" => Ok(PlatformId::Instagram),
            other => Err(CrosscastError::InvalidInput(format!(
                "Unknown platform '{}'. Valid platforms: bluesky, tumblr, mastodon, instagram",
                other
            ))),
        }
    }
}

/// Per-platform switch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformToggle {
    pub enabled: bool,
    #[serde(default)]
    pub export_only: bool,
}

impl PlatformToggle {
    pub fn on() -> Self {
        Self {
            enabled: true,
            export_only: false,
        }
    }

    pub fn off() -> Self {
        Self {
            enabled: false,
            export_only: false,
        }
    }

    pub fn export() -> Self {
        Self {
            enabled: true,
            export_only: true,
        }
    }
}

/// Platform enablement set
///
/// One field per platform so every platform is always present and matches are
/// exhaustive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enablement {
    pub bluesky: PlatformToggle,
    pub tumblr: PlatformToggle,
    pub mastodon: PlatformToggle,
    pub instagram: PlatformToggle,
}

impl Default for Enablement {
    fn default() -> Self {
        Self {
            bluesky: PlatformToggle::on(),
            tumblr: PlatformToggle::on(),
            mastodon: PlatformToggle::on(),
            instagram: PlatformToggle::export(),
        }
    }
}

impl Enablement {
    /// Everything disabled
    pub fn none() -> Self {
        Self {
            bluesky: PlatformToggle::off(),
            tumblr: PlatformToggle::off(),
            mastodon: PlatformToggle::off(),
            instagram: PlatformToggle {
                enabled: false,
                export_only: true,
            },
        }
    }

    /// Enable exactly the listed platforms; Instagram stays export-only
    pub fn only(platforms: &[PlatformId]) -> Self {
        let mut enablement = Self::none();
        for platform in platforms {
            enablement.get_mut(*platform).enabled = true;
        }
        enablement
    }

    pub fn get(&self, platform: PlatformId) -> &PlatformToggle {
        match platform {
            PlatformId::Bluesky => &self.bluesky,
            PlatformId::Tumblr => &self.tumblr,
            PlatformId::Mastodon => &self.mastodon,
            PlatformId::Instagram => &self.instagram,
        }
    }

    pub fn get_mut(&mut self, platform: PlatformId) -> &mut PlatformToggle {
        match platform {
            PlatformId::Bluesky => &mut self.bluesky,
            PlatformId::Tumblr => &mut self.tumblr,
            PlatformId::Mastodon => &mut self.mastodon,
            PlatformId::Instagram => &mut self.instagram,
        }
    }

    /// Platforms the orchestrator posts to, in declaration order
    pub fn publish_targets(&self) -> Vec<PlatformId> {
        PlatformId::ALL
            .into_iter()
            .filter(|p| {
                let toggle = self.get(*p);
                toggle.enabled && !toggle.export_only
            })
            .collect()
    }

    /// Platforms routed to the manual export path
    pub fn export_targets(&self) -> Vec<PlatformId> {
        PlatformId::ALL
            .into_iter()
            .filter(|p| {
                let toggle = self.get(*p);
                toggle.enabled && toggle.export_only
            })
            .collect()
    }

    /// Independent copy for storing in a draft or scheduled job
    pub fn snapshot(&self) -> Enablement {
        Enablement {
            bluesky: self.bluesky,
            tumblr: self.tumblr,
            mastodon: self.mastodon,
            instagram: self.instagram,
        }
    }
}

// ============================================================================
// Media
// ============================================================================

/// Supported image MIME types for attachments
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ImageMimeType {
    #[serde(rename = "image/jpeg")]
    Jpeg,
    #[serde(rename = "image/png")]
    Png,
    #[serde(rename = "image/gif")]
    Gif,
    #[serde(rename = "image/webp")]
    WebP,
}

impl ImageMimeType {
    /// Parse MIME type from a MIME string (e.g., "image/jpeg")
    pub fn from_mime_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/gif" => Some(Self::Gif),
            "image/webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Detect MIME type from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "gif" => Some(Self::Gif),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::WebP => "image/webp",
        }
    }
}

impl fmt::Display for ImageMimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An attached image
///
/// Holds the raw source bytes exactly as the user attached them. Platform
/// adapters never modify these bytes; each publish derives its own normalized
/// copy through [`crate::media::normalize`].
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub id: String,
    pub file_name: String,
    pub mime_type: ImageMimeType,
    /// SHA-256 of the raw bytes (hex encoded)
    pub hash: String,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

impl MediaItem {
    /// Attach raw bytes, enforcing the image-type and size bounds
    ///
    /// # Errors
    ///
    /// Returns `MediaError::UnsupportedType` for non-image MIME types and
    /// `MediaError::TooLarge` when the payload exceeds `max_bytes`.
    pub fn from_bytes(
        file_name: &str,
        mime_type: &str,
        data: Vec<u8>,
        max_bytes: u64,
    ) -> std::result::Result<Self, MediaError> {
        let mime = ImageMimeType::from_mime_str(mime_type)
            .ok_or_else(|| MediaError::UnsupportedType(mime_type.to_string()))?;

        let size = data.len() as u64;
        if size > max_bytes {
            return Err(MediaError::TooLarge {
                size,
                limit: max_bytes,
            });
        }

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            file_name: file_name.to_string(),
            mime_type: mime,
            hash: hex_sha256(&data),
            data,
        })
    }

    /// Attach an image file from disk; the MIME type comes from the extension
    pub fn from_path(path: &Path, max_bytes: u64) -> std::result::Result<Self, MediaError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let mime = ImageMimeType::from_extension(ext)
            .ok_or_else(|| MediaError::UnsupportedType(format!("file extension '.{}'", ext)))?;

        let size = std::fs::metadata(path)
            .map_err(|e| MediaError::Decode(format!("{}: {}", path.display(), e)))?
            .len();
        if size > max_bytes {
            return Err(MediaError::TooLarge {
                size,
                limit: max_bytes,
            });
        }

        let data = std::fs::read(path)
            .map_err(|e| MediaError::Decode(format!("{}: {}", path.display(), e)))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());

        Self::from_bytes(&file_name, mime.as_str(), data, max_bytes)
    }

    /// Data URL for previews
    pub fn preview_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.data))
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

impl fmt::Debug for MediaItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaItem")
            .field("id", &self.id)
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("size", &self.data.len())
            .field("hash", &self.hash)
            .finish()
    }
}

fn hex_sha256(data: &[u8]) -> String {
    Sha256::digest(data)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Posts
// ============================================================================

/// A post: common text, optional per-platform overrides, attached images
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Post {
    #[serde(default)]
    pub common: String,
    #[serde(default)]
    pub bluesky: String,
    #[serde(default)]
    pub tumblr: String,
    #[serde(default)]
    pub mastodon: String,
    #[serde(default)]
    pub instagram: String,
    #[serde(default)]
    pub images: Vec<MediaItem>,
}

impl Post {
    pub fn new(common: impl Into<String>) -> Self {
        Self {
            common: common.into(),
            ..Default::default()
        }
    }

    pub fn override_for(&self, platform: PlatformId) -> &str {
        match platform {
            PlatformId::Bluesky => &self.bluesky,
            PlatformId::Tumblr => &self.tumblr,
            PlatformId::Mastodon => &self.mastodon,
            PlatformId::Instagram => &self.instagram,
        }
    }

    pub fn set_override(&mut self, platform: PlatformId, text: impl Into<String>) {
        let text = text.into();
        match platform {
            PlatformId::Bluesky => self.bluesky = text,
            PlatformId::Tumblr => self.tumblr = text,
            PlatformId::Mastodon => self.mastodon = text,
            PlatformId::Instagram => self.instagram = text,
        }
    }

    /// The text actually sent to `platform`: its override if non-empty, else the common text
    pub fn effective_text(&self, platform: PlatformId) -> &str {
        let text = self.override_for(platform);
        if text.trim().is_empty() {
            &self.common
        } else {
            text
        }
    }

    pub fn has_media(&self) -> bool {
        !self.images.is_empty()
    }

    /// Whether there is anything to send to `platform`
    pub fn has_content_for(&self, platform: PlatformId) -> bool {
        !self.effective_text(platform).trim().is_empty() || self.has_media()
    }

    /// Independent deep copy for storing in a draft or scheduled job
    pub fn snapshot(&self) -> Post {
        Post {
            common: self.common.clone(),
            bluesky: self.bluesky.clone(),
            tumblr: self.tumblr.clone(),
            mastodon: self.mastodon.clone(),
            instagram: self.instagram.clone(),
            images: self
                .images
                .iter()
                .map(|item| MediaItem {
                    id: item.id.clone(),
                    file_name: item.file_name.clone(),
                    mime_type: item.mime_type,
                    hash: item.hash.clone(),
                    data: item.data.to_vec(),
                })
                .collect(),
        }
    }

    /// Remove every image (the "clear form" path)
    pub fn clear_media(&mut self) {
        self.images.clear();
    }

    /// Remove one image by id, returning whether anything was removed
    pub fn remove_media(&mut self, id: &str) -> bool {
        let before = self.images.len();
        self.images.retain(|item| item.id != id);
        self.images.len() != before
    }
}

// ============================================================================
// Outcomes, jobs, drafts
// ============================================================================

/// Uniform per-platform result of a publish attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub platform: PlatformId,
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl OutcomeRecord {
    pub fn succeeded(
        platform: PlatformId,
        message: impl Into<String>,
        data: Option<serde_json::Value>,
    ) -> Self {
        Self {
            platform,
            success: true,
            message: message.into(),
            data,
        }
    }

    pub fn failed(platform: PlatformId, message: impl Into<String>) -> Self {
        Self {
            platform,
            success: false,
            message: message.into(),
            data: None,
        }
    }
}

/// A post waiting for its trigger time
///
/// The post and enablement are snapshots taken at scheduling time and never
/// change afterwards; editing is delete-then-recreate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledJob {
    pub id: String,
    pub post: Post,
    pub platforms: Enablement,
    pub scheduled_time: DateTime<Utc>,
    pub created: DateTime<Utc>,
}

impl ScheduledJob {
    pub fn new(
        post: &Post,
        platforms: &Enablement,
        scheduled_time: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            post: post.snapshot(),
            platforms: platforms.snapshot(),
            scheduled_time,
            created: now,
        }
    }

    /// Due since `scheduled_time`, not at it
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_time <= now
    }
}

/// A saved, untriggered post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub id: String,
    pub post: Post,
    pub platforms: Enablement,
    pub created: DateTime<Utc>,
}

impl Draft {
    pub fn new(post: &Post, platforms: &Enablement, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            post: post.snapshot(),
            platforms: platforms.snapshot(),
            created: now,
        }
    }
}

/// Persisted colour scheme preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Dark,
    Light,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Light => "light",
        }
    }

    pub fn toggled(&self) -> Theme {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }
}

impl FromStr for Theme {
    type Err = CrosscastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dark" => Ok(Theme::Dark),
            "light" => Ok(Theme::Light),
            other => Err(CrosscastError::InvalidInput(format!(
                "Invalid theme '{}'. Must be 'dark' or 'light'",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn image(name: &str) -> MediaItem {
        MediaItem::from_bytes(name, "image/png", vec![1, 2, 3, 4], 1024).unwrap()
    }

    #[test]
    fn test_effective_text_prefers_override() {
        let mut post = Post::new("common text");
        post.bluesky = "short version".to_string();

        assert_eq!(post.effective_text(PlatformId::Bluesky), "short version");
        assert_eq!(post.effective_text(PlatformId::Mastodon), "common text");
    }

    #[test]
    fn test_effective_text_ignores_cleared_override() {
        let mut post = Post::new("common text");
        post.tumblr = "   ".to_string();

        assert_eq!(post.effective_text(PlatformId::Tumblr), "common text");
    }

    #[test]
    fn test_has_content_for_media_only() {
        let mut post = Post::default();
        assert!(!post.has_content_for(PlatformId::Bluesky));

        post.images.push(image("a.png"));
        assert!(post.has_content_for(PlatformId::Bluesky));
    }

    #[test]
    fn test_snapshot_is_independent() {
        let mut live = Post::new("hello");
        live.images.push(image("a.png"));

        let stored = live.snapshot();
        live.common.push_str(" world");
        live.images[0].data[0] = 99;
        live.images.push(image("b.png"));

        assert_eq!(stored.common, "hello");
        assert_eq!(stored.images.len(), 1);
        assert_eq!(stored.images[0].data[0], 1);
    }

    #[test]
    fn test_remove_media_by_id() {
        let mut post = Post::new("x");
        let first = image("a.png");
        let first_id = first.id.clone();
        post.images.push(first);
        post.images.push(image("b.png"));

        assert!(post.remove_media(&first_id));
        assert!(!post.remove_media(&first_id));
        assert_eq!(post.images.len(), 1);
    }

    #[test]
    fn test_default_enablement_keeps_instagram_export_only() {
        let enablement = Enablement::default();

        assert_eq!(
            enablement.publish_targets(),
            vec![PlatformId::Bluesky, PlatformId::Tumblr, PlatformId::Mastodon]
        );
        assert_eq!(enablement.export_targets(), vec![PlatformId::Instagram]);
    }

    #[test]
    fn test_enablement_only() {
        let enablement = Enablement::only(&[PlatformId::Mastodon, PlatformId::Instagram]);

        assert_eq!(enablement.publish_targets(), vec![PlatformId::Mastodon]);
        assert_eq!(enablement.export_targets(), vec![PlatformId::Instagram]);
    }

    #[test]
    fn test_enablement_serializes_like_platform_status() {
        let json = serde_json::to_value(Enablement::default()).unwrap();
        assert_eq!(json["instagram"]["exportOnly"], true);
        assert_eq!(json["bluesky"]["enabled"], true);

        let parsed: Enablement =
            serde_json::from_str(r#"{"bluesky":{"enabled":true},"tumblr":{"enabled":false},"mastodon":{"enabled":false},"instagram":{"enabled":true,"exportOnly":true}}"#)
                .unwrap();
        assert!(!parsed.bluesky.export_only);
        assert_eq!(parsed.publish_targets(), vec![PlatformId::Bluesky]);
    }

    #[test]
    fn test_media_item_rejects_non_image() {
        let result = MediaItem::from_bytes("notes.txt", "text/plain", vec![0; 10], 1024);
        assert_eq!(
            result.unwrap_err(),
            MediaError::UnsupportedType("text/plain".to_string())
        );
    }

    #[test]
    fn test_media_item_rejects_oversized_input() {
        let result = MediaItem::from_bytes("big.jpg", "image/jpeg", vec![0; 2048], 1024);
        assert!(matches!(
            result,
            Err(MediaError::TooLarge {
                size: 2048,
                limit: 1024
            })
        ));
    }

    #[test]
    fn test_media_item_serializes_bytes_as_base64() {
        let item = image("a.png");
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["data"], "AQIDBA==");
        assert_eq!(json["mimeType"], "image/png");

        let back: MediaItem = serde_json::from_value(json).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn test_media_item_debug_omits_bytes() {
        let item = image("a.png");
        let debug = format!("{:?}", item);
        assert!(debug.contains("size: 4"));
        assert!(!debug.contains("data"));
    }

    #[test]
    fn test_scheduled_job_due_semantics() {
        let now = Utc::now();
        let past = ScheduledJob::new(&Post::new("x"), &Enablement::default(), now - Duration::hours(1), now);
        let exact = ScheduledJob::new(&Post::new("x"), &Enablement::default(), now, now);
        let future = ScheduledJob::new(&Post::new("x"), &Enablement::default(), now + Duration::minutes(1), now);

        assert!(past.is_due(now));
        assert!(exact.is_due(now));
        assert!(!future.is_due(now));
    }

    #[test]
    fn test_scheduled_job_serializes_iso_timestamp() {
        let now = DateTime::parse_from_rfc3339("2025-06-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let job = ScheduledJob::new(&Post::new("x"), &Enablement::default(), now, now);

        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["scheduledTime"], "2025-06-01T12:00:00Z");
    }

    #[test]
    fn test_platform_id_parsing() {
        assert_eq!("Bluesky".parse::<PlatformId>().unwrap(), PlatformId::Bluesky);
        assert_eq!(" mastodon ".parse::<PlatformId>().unwrap(), PlatformId::Mastodon);
        assert!("nostr".parse::<PlatformId>().is_err());
    }

    #[test]
    fn test_platform_declaration_order() {
        let mut shuffled = vec![PlatformId::Mastodon, PlatformId::Bluesky, PlatformId::Tumblr];
        shuffled.sort();
        assert_eq!(
            shuffled,
            vec![PlatformId::Bluesky, PlatformId::Tumblr, PlatformId::Mastodon]
        );
    }

    #[test]
    fn test_theme_round_trip() {
        assert_eq!("dark".parse::<Theme>().unwrap(), Theme::Dark);
        assert_eq!(Theme::Dark.toggled(), Theme::Light);
        assert_eq!(serde_json::to_string(&Theme::Light).unwrap(), "\"light\"");
    }
}
