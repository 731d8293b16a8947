//! Bluesky (AT Protocol) adapter
//!
//! Every publish opens a fresh session with the handle and app password, uploads
//! each image as a blob, then writes one `app.bsky.feed.post` record that embeds
//! the blob references. At most four images are attached.

use async_trait::async_trait;
use chrono::SecondsFormat;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::credentials::BlueskyCredentials;
use crate::error::{PlatformError, Result};
use crate::media::NormalizedImage;
use crate::platforms::http::{self, json_response, transport_error};
use crate::platforms::Platform;
use crate::service::events::EventBus;
use crate::types::PlatformId;

pub const DEFAULT_SERVICE: &str = "https://bsky.social";
pub const MAX_IMAGES: usize = 4;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Session {
    access_jwt: String,
    did: String,
}

pub struct BlueskyClient {
    http: reqwest::Client,
    service: String,
    credentials: BlueskyCredentials,
}

impl BlueskyClient {
    /// `service` is the PDS base URL, e.g. `https://bsky.social`
    pub fn new(service: &str, credentials: BlueskyCredentials) -> Self {
        Self {
            http: http::client(),
            service: service.trim_end_matches('/').to_string(),
            credentials,
        }
    }

    fn xrpc(&self, method: &str) -> String {
        format!("{}/xrpc/{}", self.service, method)
    }

    async fn create_session(&self) -> std::result::Result<Session, PlatformError> {
        const STEP: &str = "Bluesky login";

        let response = self
            .http
            .post(self.xrpc("com.atproto.server.createSession"))
            .json(&json!({
                "identifier": self.credentials.username,
                "password": self.credentials.app_password,
            }))
            .send()
            .await
            .map_err(|e| transport_error(STEP, e))?;

        let body = json_response(STEP, response).await?;
        serde_json::from_value(body)
            .map_err(|e| PlatformError::Authentication(format!("{}: malformed session: {}", STEP, e)))
    }

    async fn upload_blob(
        &self,
        session: &Session,
        image: &NormalizedImage,
    ) -> std::result::Result<Value, PlatformError> {
        const STEP: &str = "Bluesky blob upload";

        let response = self
            .http
            .post(self.xrpc("com.atproto.repo.uploadBlob"))
            .bearer_auth(&session.access_jwt)
            .header(reqwest::header::CONTENT_TYPE, image.mime_type())
            .body(image.data.clone())
            .send()
            .await
            .map_err(|e| transport_error(STEP, e))?;

        let body = json_response(STEP, response)
            .await
            .map_err(|e| match e {
                PlatformError::Posting(msg) | PlatformError::Validation(msg) => PlatformError::Upload(msg),
                other => other,
            })?;

        body.get("blob")
            .cloned()
            .ok_or_else(|| PlatformError::Upload(format!("{}: response missing 'blob'", STEP)))
    }
}

/// The post record sent to `createRecord`
fn post_record(text: &str, blobs: Vec<Value>, created_at: &str) -> Value {
    let mut record = json!({
        "$type": "app.bsky.feed.post",
        "text": text,
        "createdAt": created_at,
    });

    if !blobs.is_empty() {
        let images: Vec<Value> = blobs
            .into_iter()
            .enumerate()
            .map(|(i, blob)| json!({ "image": blob, "alt": format!("Image {}", i + 1) }))
            .collect();
        record["embed"] = json!({
            "$type": "app.bsky.embed.images",
            "images": images,
        });
    }

    record
}

#[async_trait]
impl Platform for BlueskyClient {
    fn id(&self) -> PlatformId {
        PlatformId::Bluesky
    }

    fn max_media(&self) -> Option<usize> {
        Some(MAX_IMAGES)
    }

    async fn send(&self, text: &str, media: &[NormalizedImage], events: &EventBus) -> Result<Value> {
        const STEP: &str = "Bluesky post";

        let session = self.create_session().await?;
        tracing::debug!(did = %session.did, "Bluesky session created");

        let mut blobs = Vec::with_capacity(media.len());
        for (i, image) in media.iter().take(MAX_IMAGES).enumerate() {
            events.progress(
                PlatformId::Bluesky,
                false,
                format!("Uploading image {} of {}...", i + 1, media.len().min(MAX_IMAGES)),
            );
            blobs.push(self.upload_blob(&session, image).await?);
        }

        let created_at = chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let response = self
            .http
            .post(self.xrpc("com.atproto.repo.createRecord"))
            .bearer_auth(&session.access_jwt)
            .json(&json!({
                "repo": session.did,
                "collection": "app.bsky.feed.post",
                "record": post_record(text, blobs, &created_at),
            }))
            .send()
            .await
            .map_err(|e| transport_error(STEP, e))?;

        Ok(json_response(STEP, response).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_only_record_has_no_embed() {
        let record = post_record("hello", vec![], "2025-01-01T00:00:00.000Z");
        assert_eq!(record["text"], "hello");
        assert_eq!(record["$type"], "app.bsky.feed.post");
        assert!(record.get("embed").is_none());
    }

    #[test]
    fn test_record_embeds_blobs_with_alt_text() {
        let blobs = vec![json!({"ref": "a"}), json!({"ref": "b"})];
        let record = post_record("pics", blobs, "2025-01-01T00:00:00.000Z");

        assert_eq!(record["embed"]["$type"], "app.bsky.embed.images");
        assert_eq!(record["embed"]["images"][0]["alt"], "Image 1");
        assert_eq!(record["embed"]["images"][1]["image"]["ref"], "b");
    }

    #[test]
    fn test_service_trailing_slash_trimmed() {
        let client = BlueskyClient::new("https://pds.example/", BlueskyCredentials::default());
        assert_eq!(
            client.xrpc("com.atproto.server.createSession"),
            "https://pds.example/xrpc/com.atproto.server.createSession"
        );
    }
}
