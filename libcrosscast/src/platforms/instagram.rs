//! Instagram Graph API adapter
//!
//! Only used when Instagram is enabled without export-only mode. The protocol
//! has three steps, each of which can fail with a structured Graph error:
//!
//! 1. upload each image to `/{account}/media`, collecting container ids
//! 2. create one container: a single `IMAGE`, or a `CAROUSEL` of the ids
//! 3. `/{account}/media_publish` with the container's `creation_id`
//!
//! A `{"error": {...}}` body is reported as [`PlatformError::Api`] even on an
//! HTTP 200, so it stays distinct from transport failures.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Response;
use serde_json::{json, Value};

use crate::credentials::InstagramCredentials;
use crate::error::{PlatformError, Result};
use crate::media::NormalizedImage;
use crate::platforms::http::{self, required_str, status_error, transport_error};
use crate::platforms::Platform;
use crate::service::events::EventBus;
use crate::types::PlatformId;

pub const DEFAULT_GRAPH_API: &str = "https://graph.facebook.com/v18.0";

const UPLOAD_STEP: &str = "Instagram upload";
const CONTAINER_STEP: &str = "Instagram container";
const PUBLISH_STEP: &str = "Instagram publish";

pub struct InstagramClient {
    http: reqwest::Client,
    graph_base: String,
    credentials: InstagramCredentials,
}

impl InstagramClient {
    pub fn new(graph_base: &str, credentials: InstagramCredentials) -> Self {
        Self {
            http: http::client(),
            graph_base: graph_base.trim_end_matches('/').to_string(),
            credentials,
        }
    }

    fn account_url(&self, edge: &str) -> String {
        format!(
            "{}/{}/{}",
            self.graph_base,
            self.credentials.business_account_id.trim(),
            edge
        )
    }

    async fn upload_image(&self, image: &NormalizedImage) -> std::result::Result<String, PlatformError> {
        let part = Part::bytes(image.data.clone())
            .file_name(image.file_name.clone())
            .mime_str(image.mime_type())
            .map_err(|e| PlatformError::Upload(format!("{}: {}", UPLOAD_STEP, e)))?;

        let response = self
            .http
            .post(self.account_url("media"))
            .bearer_auth(&self.credentials.access_token)
            .multipart(Form::new().part("image", part))
            .send()
            .await
            .map_err(|e| transport_error(UPLOAD_STEP, e))?;

        let body = graph_response(UPLOAD_STEP, response).await?;
        required_str(UPLOAD_STEP, &body, "id")
    }

    async fn create_container(
        &self,
        caption: &str,
        image_ids: &[String],
    ) -> std::result::Result<String, PlatformError> {
        let response = self
            .http
            .post(self.account_url("media"))
            .bearer_auth(&self.credentials.access_token)
            .json(&container_body(caption, image_ids))
            .send()
            .await
            .map_err(|e| transport_error(CONTAINER_STEP, e))?;

        let body = graph_response(CONTAINER_STEP, response).await?;
        required_str(CONTAINER_STEP, &body, "id")
    }

    async fn publish_container(&self, creation_id: &str) -> std::result::Result<Value, PlatformError> {
        let response = self
            .http
            .post(self.account_url("media_publish"))
            .bearer_auth(&self.credentials.access_token)
            .json(&json!({ "creation_id": creation_id }))
            .send()
            .await
            .map_err(|e| transport_error(PUBLISH_STEP, e))?;

        graph_response(PUBLISH_STEP, response).await
    }
}

/// Single image or carousel, depending on how many uploads there are
fn container_body(caption: &str, image_ids: &[String]) -> Value {
    match image_ids {
        [single] => json!({
            "image_url": single,
            "caption": caption,
            "media_type": "IMAGE",
        }),
        many => json!({
            "media_type": "CAROUSEL",
            "children": many,
            "caption": caption,
        }),
    }
}

/// Structured Graph error, if the body carries one
fn graph_error(step: &str, body: &Value) -> Option<PlatformError> {
    let error = body.get("error")?;
    Some(PlatformError::Api {
        step: step.to_string(),
        code: error.get("code").and_then(Value::as_i64).unwrap_or(0),
        message: error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string(),
    })
}

async fn graph_response(step: &str, response: Response) -> std::result::Result<Value, PlatformError> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| transport_error(step, e))?;

    let body: Option<Value> = serde_json::from_str(&text).ok();
    if let Some(err) = body.as_ref().and_then(|b| graph_error(step, b)) {
        return Err(err);
    }
    if !status.is_success() {
        return Err(status_error(step, status, &text));
    }

    body.ok_or_else(|| PlatformError::Posting(format!("{}: unreadable response", step)))
}

#[async_trait]
impl Platform for InstagramClient {
    fn id(&self) -> PlatformId {
        PlatformId::Instagram
    }

    fn requires_media(&self) -> bool {
        true
    }

    async fn send(&self, text: &str, media: &[NormalizedImage], events: &EventBus) -> Result<Value> {
        if media.is_empty() {
            return Err(PlatformError::Validation(
                "Instagram requires at least one image".to_string(),
            )
            .into());
        }

        let mut image_ids = Vec::with_capacity(media.len());
        for (i, image) in media.iter().enumerate() {
            events.progress(
                PlatformId::Instagram,
                false,
                format!("Uploading image {} of {}...", i + 1, media.len()),
            );
            image_ids.push(self.upload_image(image).await?);
        }

        let creation_id = self.create_container(text, &image_ids).await?;
        tracing::debug!(%creation_id, "Instagram container created");

        events.progress(PlatformId::Instagram, false, "Publishing...");
        Ok(self.publish_container(&creation_id).await?)
    }
}
