//! Tumblr adapter
//!
//! Authenticates with a static API key, no session. The post type follows the
//! content: `photo` when images are attached, `text` otherwise. All images go
//! in the same multipart request as `data[N]` parts.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde_json::Value;

use crate::credentials::TumblrCredentials;
use crate::error::{PlatformError, Result};
use crate::media::NormalizedImage;
use crate::platforms::http::{self, json_response, transport_error};
use crate::platforms::Platform;
use crate::service::events::EventBus;
use crate::types::PlatformId;

pub const DEFAULT_API: &str = "https://api.tumblr.com";

pub struct TumblrClient {
    http: reqwest::Client,
    api_base: String,
    credentials: TumblrCredentials,
}

impl TumblrClient {
    pub fn new(api_base: &str, credentials: TumblrCredentials) -> Self {
        Self {
            http: http::client(),
            api_base: api_base.trim_end_matches('/').to_string(),
            credentials,
        }
    }

    fn post_url(&self) -> String {
        format!(
            "{}/v2/blog/{}/post",
            self.api_base,
            self.credentials.blog_identifier.trim()
        )
    }
}

/// `photo` if there is anything to attach, `text` otherwise
pub fn post_type(media: &[NormalizedImage]) -> &'static str {
    if media.is_empty() {
        "text"
    } else {
        "photo"
    }
}

fn build_form(text: &str, media: &[NormalizedImage]) -> std::result::Result<Form, PlatformError> {
    let kind = post_type(media);
    let mut form = Form::new()
        .text("type", kind)
        .text("format", "markdown")
        .text("body", text.to_string());

    if kind == "photo" {
        form = form.text("caption", text.to_string());
    }

    for (i, image) in media.iter().enumerate() {
        let part = Part::bytes(image.data.clone())
            .file_name(image.file_name.clone())
            .mime_str(image.mime_type())
            .map_err(|e| PlatformError::Upload(format!("Tumblr image {}: {}", i + 1, e)))?;
        form = form.part(format!("data[{}]", i), part);
    }

    Ok(form)
}

#[async_trait]
impl Platform for TumblrClient {
    fn id(&self) -> PlatformId {
        PlatformId::Tumblr
    }

    async fn send(&self, text: &str, media: &[NormalizedImage], events: &EventBus) -> Result<Value> {
        const STEP: &str = "Tumblr post";

        if !media.is_empty() {
            events.progress(
                PlatformId::Tumblr,
                false,
                format!("Uploading {} image(s)...", media.len()),
            );
        }

        let response = self
            .http
            .post(self.post_url())
            .query(&[("api_key", self.credentials.api_key.as_str())])
            .multipart(build_form(text, media)?)
            .send()
            .await
            .map_err(|e| transport_error(STEP, e))?;

        let body = json_response(STEP, response).await?;
        Ok(body.get("response").cloned().unwrap_or(body))
    }
}
