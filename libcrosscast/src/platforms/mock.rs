//! Configurable mock platform
//!
//! Simulates successes, failures, delays, and panics without network access.
//! Clones share their call log, so a test can keep one handle and hand another
//! to the publisher.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::time::sleep;

use crate::error::{PlatformError, Result};
use crate::media::NormalizedImage;
use crate::platforms::Platform;
use crate::service::events::EventBus;
use crate::types::PlatformId;

#[derive(Debug, Clone)]
pub enum MockBehavior {
    Succeed,
    Fail(PlatformError),
    Panic(String),
}

#[derive(Debug, Clone)]
pub struct MockConfig {
    pub platform: PlatformId,
    pub behavior: MockBehavior,
    /// Simulated network latency
    pub delay: Duration,
    pub max_media: Option<usize>,
    pub requires_media: bool,
}

impl MockConfig {
    pub fn new(platform: PlatformId) -> Self {
        Self {
            platform,
            behavior: MockBehavior::Succeed,
            delay: Duration::ZERO,
            max_media: None,
            requires_media: false,
        }
    }
}

#[derive(Debug, Default)]
struct CallLog {
    texts: Vec<String>,
    media_counts: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct MockPlatform {
    config: MockConfig,
    log: Arc<Mutex<CallLog>>,
}

impl MockPlatform {
    pub fn new(config: MockConfig) -> Self {
        Self {
            config,
            log: Arc::new(Mutex::new(CallLog::default())),
        }
    }

    pub fn success(platform: PlatformId) -> Self {
        Self::new(MockConfig::new(platform))
    }

    /// Fails every send with `PlatformError::Posting(error)`
    pub fn failure(platform: PlatformId, error: &str) -> Self {
        Self::failing_with(platform, PlatformError::Posting(error.to_string()))
    }

    pub fn failing_with(platform: PlatformId, error: PlatformError) -> Self {
        let mut config = MockConfig::new(platform);
        config.behavior = MockBehavior::Fail(error);
        Self::new(config)
    }

    /// Panics inside `send`
    pub fn panicking(platform: PlatformId, message: &str) -> Self {
        let mut config = MockConfig::new(platform);
        config.behavior = MockBehavior::Panic(message.to_string());
        Self::new(config)
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.config.delay = delay;
        self
    }

    pub fn with_max_media(mut self, limit: usize) -> Self {
        self.config.max_media = Some(limit);
        self
    }

    pub fn requiring_media(mut self) -> Self {
        self.config.requires_media = true;
        self
    }

    pub fn call_count(&self) -> usize {
        self.lock().texts.len()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.lock().texts.clone()
    }

    pub fn sent_media_counts(&self) -> Vec<usize> {
        self.lock().media_counts.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CallLog> {
        self.log.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Platform for MockPlatform {
    fn id(&self) -> PlatformId {
        self.config.platform
    }

    fn max_media(&self) -> Option<usize> {
        self.config.max_media
    }

    fn requires_media(&self) -> bool {
        self.config.requires_media
    }

    async fn send(&self, text: &str, media: &[NormalizedImage], events: &EventBus) -> Result<Value> {
        {
            let mut log = self.lock();
            log.texts.push(text.to_string());
            log.media_counts.push(media.len());
        }

        events.progress(self.config.platform, false, "Mock sending...");

        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }

        match &self.config.behavior {
            MockBehavior::Succeed => Ok(json!({
                "id": format!("mock-{}", uuid::Uuid::new_v4()),
                "platform": self.config.platform.as_str(),
                "media": media.len(),
            })),
            MockBehavior::Fail(error) => Err(error.clone().into()),
            MockBehavior::Panic(message) => panic!("{}", message),
        }
    }
}
