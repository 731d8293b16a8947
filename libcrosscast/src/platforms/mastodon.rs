//! Mastodon adapter
//!
//! Works with Mastodon and other servers implementing its REST API. The
//! access token is already valid, so there is no login call: each image is
//! uploaded as a media attachment, then one status references every
//! attachment id.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde_json::{json, Value};

use crate::credentials::MastodonCredentials;
use crate::error::{PlatformError, Result};
use crate::media::NormalizedImage;
use crate::platforms::http::{self, json_response, required_str, transport_error};
use crate::platforms::Platform;
use crate::service::events::EventBus;
use crate::types::PlatformId;

pub struct MastodonClient {
    http: reqwest::Client,
    /// Normalized, e.g. `https://mastodon.social`
    instance_url: String,
    access_token: String,
}

impl MastodonClient {
    pub fn new(credentials: MastodonCredentials) -> Self {
        Self {
            http: http::client(),
            instance_url: credentials.normalized_instance_url(),
            access_token: credentials.access_token,
        }
    }

    pub fn instance_url(&self) -> &str {
        &self.instance_url
    }

    async fn upload_attachment(
        &self,
        index: usize,
        image: &NormalizedImage,
    ) -> std::result::Result<String, PlatformError> {
        const STEP: &str = "Mastodon media upload";

        let part = Part::bytes(image.data.clone())
            .file_name(image.file_name.clone())
            .mime_str(image.mime_type())
            .map_err(|e| PlatformError::Upload(format!("{}: {}", STEP, e)))?;
        let form = Form::new()
            .part("file", part)
            .text("description", format!("Image {}", index + 1));

        let response = self
            .http
            .post(format!("{}/api/v2/media", self.instance_url))
            .bearer_auth(&self.access_token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| transport_error(STEP, e))?;

        let body = json_response(STEP, response)
            .await
            .map_err(|e| match e {
                PlatformError::Posting(msg) | PlatformError::Validation(msg) => PlatformError::Upload(msg),
                other => other,
            })?;

        required_str(STEP, &body, "id").map_err(|e| PlatformError::Upload(e.to_string()))
    }
}

fn status_body(text: &str, media_ids: &[String]) -> Value {
    let mut body = json!({ "status": text });
    if !media_ids.is_empty() {
        body["media_ids"] = json!(media_ids);
    }
    body
}

#[async_trait]
impl Platform for MastodonClient {
    fn id(&self) -> PlatformId {
        PlatformId::Mastodon
    }

    async fn send(&self, text: &str, media: &[NormalizedImage], events: &EventBus) -> Result<Value> {
        const STEP: &str = "Mastodon status";

        let mut media_ids = Vec::with_capacity(media.len());
        for (i, image) in media.iter().enumerate() {
            events.progress(
                PlatformId::Mastodon,
                false,
                format!("Uploading image {} of {}...", i + 1, media.len()),
            );
            media_ids.push(self.upload_attachment(i, image).await?);
        }

        let response = self
            .http
            .post(format!("{}/api/v1/statuses", self.instance_url))
            .bearer_auth(&self.access_token)
            .json(&status_body(text, &media_ids))
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
    fn test_instance_url_gets_scheme() {
        let client = MastodonClient::new(MastodonCredentials {
            instance_url: "mastodon.social/".to_string(),
            access_token: "t".to_string(),
        });
        assert_eq!(client.instance_url(), "https://mastodon.social");
    }

    #[test]
    fn test_status_body_omits_empty_media() {
        let body = status_body("hello", &[]);
        assert_eq!(body["status"], "hello");
        assert!(body.get("media_ids").is_none());

        let body = status_body("pics", &["1".to_string(), "2".to_string()]);
        assert_eq!(body["media_ids"], json!(["1", "2"]));
    }
}
