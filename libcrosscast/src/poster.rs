//! Multi-platform publish orchestration
//!
//! [`Publisher::post_to_all`] fans one post out to every platform that is
//! enabled and not export-only. Adapters run concurrently; a failure, hang,
//! or panic in one never keeps the others from running or being reported.
//! Outcomes always come back in platform declaration order.

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use futures::FutureExt;
use tracing::{info, warn};

use crate::config::{Config, MediaConfig};
use crate::credentials::{load_stored, Credentials};
use crate::error::{PlatformError, Result};
use crate::platforms::{
    bluesky::BlueskyClient, instagram::InstagramClient, mastodon::MastodonClient, publish,
    tumblr::TumblrClient, Platform,
};
use crate::service::events::{Event, EventBus};
use crate::storage::KvStore;
use crate::types::{Enablement, OutcomeRecord, PlatformId, Post};

/// Adapter registry plus the settings every publish needs
#[derive(Clone)]
pub struct Publisher {
    platforms: BTreeMap<PlatformId, Arc<dyn Platform>>,
    media: MediaConfig,
    events: EventBus,
}

impl Publisher {
    pub fn new(platforms: Vec<Arc<dyn Platform>>, media: MediaConfig, events: EventBus) -> Self {
        let platforms = platforms.into_iter().map(|p| (p.id(), p)).collect();
        Self {
            platforms,
            media,
            events,
        }
    }

    /// Build adapters for every platform with credentials present
    pub fn from_credentials(credentials: &Credentials, config: &Config, events: EventBus) -> Self {
        Self::new(create_platforms(credentials, config), config.media.clone(), events)
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn has_adapter(&self, platform: PlatformId) -> bool {
        self.platforms.contains_key(&platform)
    }

    /// Publish to every enabled, non-export-only platform
    ///
    /// Returns exactly one outcome per such platform, in declaration order.
    /// An empty target set yields an empty list; callers validate beforehand.
    pub async fn post_to_all(&self, post: &Post, enablement: &Enablement) -> Vec<OutcomeRecord> {
        let targets = enablement.publish_targets();
        if targets.is_empty() {
            return Vec::new();
        }

        info!("Publishing to: {}", join_names(&targets));
        self.events.emit(Event::PublishStarted {
            platforms: targets.clone(),
        });

        let futures: Vec<_> = targets
            .iter()
            .map(|&platform| self.dispatch_one(platform, post))
            .collect();

        // join_all preserves input order, which is declaration order
        let outcomes = join_all(futures).await;

        let succeeded = outcomes.iter().filter(|o| o.success).count();
        info!(
            "Publish finished: {}/{} platforms succeeded",
            succeeded,
            outcomes.len()
        );
        self.events.emit(Event::PublishCompleted {
            outcomes: outcomes.clone(),
        });

        outcomes
    }

    async fn dispatch_one(&self, platform: PlatformId, post: &Post) -> OutcomeRecord {
        let Some(adapter) = self.platforms.get(&platform) else {
            let err = PlatformError::NotConfigured(format!(
                "{} has no credentials; run 'cross-config set {}'",
                platform.display_name(),
                platform
            ));
            warn!(%platform, "{}", err);
            self.events.progress(platform, false, format!("Error: {}", err));
            return OutcomeRecord::failed(platform, format!("Error: {}", err));
        };

        let run = publish(adapter.as_ref(), post, &self.media, &self.events);
        match AssertUnwindSafe(run).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                warn!(%platform, "Adapter panicked: {}", reason);
                let message = format!("Error: adapter crashed: {}", reason);
                self.events.progress(platform, false, message.clone());
                OutcomeRecord::failed(platform, message)
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn join_names(platforms: &[PlatformId]) -> String {
    platforms
        .iter()
        .map(|p| p.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Hands out the publisher for one scheduler pass
#[async_trait]
pub trait PublisherSource: Send + Sync {
    async fn publisher(&self) -> Result<Publisher>;
}

/// A fixed adapter set
#[async_trait]
impl PublisherSource for Publisher {
    async fn publisher(&self) -> Result<Publisher> {
        Ok(self.clone())
    }
}

/// Builds adapters from whatever credentials are stored at call time
///
/// A long-running process sees credentials saved or imported by other
/// processes after it started.
pub struct StoredCredentialsPublisher {
    store: Arc<dyn KvStore>,
    config: Config,
    events: EventBus,
}

impl StoredCredentialsPublisher {
    pub fn new(store: Arc<dyn KvStore>, config: Config, events: EventBus) -> Self {
        Self {
            store,
            config,
            events,
        }
    }
}

#[async_trait]
impl PublisherSource for StoredCredentialsPublisher {
    async fn publisher(&self) -> Result<Publisher> {
        let credentials = load_stored(self.store.as_ref()).await?;
        Ok(Publisher::from_credentials(
            &credentials,
            &self.config,
            self.events.clone(),
        ))
    }
}

/// Create adapters for every platform whose credentials are present
///
/// Platforms without credentials are skipped; dispatching to one yields a
/// `NotConfigured` outcome.
pub fn create_platforms(credentials: &Credentials, config: &Config) -> Vec<Arc<dyn Platform>> {
    let mut platforms: Vec<Arc<dyn Platform>> = Vec::new();

    for platform in PlatformId::ALL {
        if !credentials.is_configured(platform) {
            tracing::debug!(%platform, "No credentials, adapter not created");
            continue;
        }

        let adapter: Arc<dyn Platform> = match platform {
            PlatformId::Bluesky => Arc::new(BlueskyClient::new(
                &config.endpoints.bluesky,
                credentials.bluesky.clone(),
            )),
            PlatformId::Tumblr => Arc::new(TumblrClient::new(
                &config.endpoints.tumblr,
                credentials.tumblr.clone(),
            )),
            PlatformId::Mastodon => Arc::new(MastodonClient::new(credentials.mastodon.clone())),
            PlatformId::Instagram => Arc::new(InstagramClient::new(
                &config.endpoints.instagram,
                credentials.instagram.clone(),
            )),
        };
        platforms.push(adapter);
    }

    platforms
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{BlueskyCredentials, MastodonCredentials};

    #[test]
    fn test_create_platforms_skips_unconfigured() {
        let credentials = Credentials {
            bluesky: BlueskyCredentials {
                username: "a".to_string(),
                app_password: "b".to_string(),
            },
            mastodon: MastodonCredentials {
                instance_url: "example.social".to_string(),
                access_token: "t".to_string(),
            },
            ..Default::default()
        };

        let ids: Vec<PlatformId> = create_platforms(&credentials, &Config::default())
            .iter()
            .map(|p| p.id())
            .collect();
        assert_eq!(ids, vec![PlatformId::Bluesky, PlatformId::Mastodon]);
    }

    #[tokio::test]
    async fn test_stored_credentials_publisher_sees_later_saves() {
        let kv: Arc<dyn KvStore> = Arc::new(crate::storage::MemoryStore::new());
        let source =
            StoredCredentialsPublisher::new(Arc::clone(&kv), Config::default(), EventBus::default());
        assert!(!source.publisher().await.unwrap().has_adapter(PlatformId::Mastodon));

        crate::credentials::CredentialStore::load(Arc::clone(&kv))
            .await
            .unwrap()
            .update(|c| {
                c.mastodon = MastodonCredentials {
                    instance_url: "example.social".to_string(),
                    access_token: "t".to_string(),
                }
            })
            .await
            .unwrap();

        assert!(source.publisher().await.unwrap().has_adapter(PlatformId::Mastodon));
    }

    #[test]
    fn test_panic_message_variants() {
        let s: Box<dyn std::any::Any + Send> = Box::new("static");
        let owned: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        let other: Box<dyn std::any::Any + Send> = Box::new(7u8);

        assert_eq!(panic_message(s.as_ref()), "static");
        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(other.as_ref()), "unknown panic");
    }
}
