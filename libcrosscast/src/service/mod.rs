//! Service facade
//!
//! `CrosscastService` owns the application state (configuration, persistence,
//! credentials, drafts, schedule, event bus) and is passed explicitly to
//! whatever drives it. There is no global state.
//!
//! ```no_run
//! use libcrosscast::service::CrosscastService;
//! use libcrosscast::types::{Enablement, Post};
//!
//! # async fn example() -> libcrosscast::Result<()> {
//! let service = CrosscastService::new().await?;
//! let report = service
//!     .post_now(&Post::new("Hello everywhere"), &Enablement::default(), None, chrono::Utc::now())
//!     .await?;
//! for outcome in report.outcomes {
//!     println!("{}: {}", outcome.platform, outcome.message);
//! }
//! # Ok(())
//! # }
//! ```

pub mod draft;
pub mod events;
pub mod export;
pub mod validation;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use self::draft::DraftStore;
use self::events::{EventBus, EventReceiver};
use crate::config::Config;
use crate::credentials::CredentialStore;
use crate::error::Result;
use crate::poster::{Publisher, StoredCredentialsPublisher};
use crate::queue::ScheduleStore;
use crate::scheduler::{DispatchReport, Scheduler};
use crate::storage::{load_json, save_json, KvStore, SqliteStore, THEME_KEY};
use crate::types::{Enablement, OutcomeRecord, PlatformId, Post, ScheduledJob, Theme};

/// Result of an immediate publish
#[derive(Debug, Clone, Default)]
pub struct PostReport {
    /// One per publish target, in declaration order
    pub outcomes: Vec<OutcomeRecord>,
    /// Written when Instagram is enabled in export-only mode
    pub export_path: Option<PathBuf>,
}

impl PostReport {
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.success)
    }

    pub fn any_succeeded(&self) -> bool {
        self.outcomes.iter().any(|o| o.success)
    }
}

pub struct CrosscastService {
    config: Config,
    store: Arc<dyn KvStore>,
    credentials: CredentialStore,
    drafts: DraftStore,
    queue: Arc<ScheduleStore>,
    event_bus: EventBus,
}

impl CrosscastService {
    /// Load configuration from the default location and open the database
    pub async fn new() -> Result<Self> {
        let config = Config::load()?;
        Self::from_config(config).await
    }

    pub async fn from_config(config: Config) -> Result<Self> {
        let store = SqliteStore::new(&config.database.path).await?;
        Self::with_store(config, Arc::new(store)).await
    }

    /// Build on an explicit persistence provider
    pub async fn with_store(config: Config, store: Arc<dyn KvStore>) -> Result<Self> {
        let credentials = CredentialStore::load(Arc::clone(&store)).await?;
        let drafts = DraftStore::new(Arc::clone(&store));
        let queue = Arc::new(ScheduleStore::new(Arc::clone(&store)));

        Ok(Self {
            config,
            store,
            credentials,
            drafts,
            queue,
            event_bus: EventBus::new(100),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn drafts(&self) -> &DraftStore {
        &self.drafts
    }

    pub fn queue(&self) -> &Arc<ScheduleStore> {
        &self.queue
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.event_bus.subscribe()
    }

    /// Publisher over adapters built from the current credentials
    pub fn publisher(&self) -> Publisher {
        Publisher::from_credentials(&self.credentials.get(), &self.config, self.event_bus.clone())
    }

    /// Enablement from `[defaults] platforms`; Instagram stays export-only
    pub fn default_enablement(&self) -> Enablement {
        Enablement::only(&self.config.defaults.platforms)
    }

    /// Validate, write the Instagram export if requested, then publish
    ///
    /// Validation failures return an error before any network call or export.
    pub async fn post_now(
        &self,
        post: &Post,
        enablement: &Enablement,
        export_dir: Option<&Path>,
        now: DateTime<Utc>,
    ) -> Result<PostReport> {
        validation::validate(post, enablement, &self.credentials.get())?;

        let export_path = match export_dir {
            Some(dir) if enablement.export_targets().contains(&PlatformId::Instagram) => {
                Some(export::write_instagram_export(post, dir, now)?)
            }
            _ => None,
        };

        let outcomes = self.publisher().post_to_all(post, enablement).await;
        Ok(PostReport {
            outcomes,
            export_path,
        })
    }

    /// Validate and store a scheduled job
    pub async fn schedule(
        &self,
        post: &Post,
        enablement: &Enablement,
        at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<ScheduledJob> {
        validation::validate(post, enablement, &self.credentials.get())?;
        if at <= now {
            tracing::warn!("Scheduled time {} is in the past; the post is due now", at);
        }
        self.queue.schedule(post, enablement, at, now).await
    }

    /// Publish one scheduled job immediately, then remove it
    ///
    /// Once publishing has started the outcomes are always returned. A failed
    /// removal is logged and reported through `removed`; the job stays claimed.
    pub async fn dispatch_now(&self, id: &str) -> Result<DispatchReport> {
        let job = self.queue.claim(id).await?;
        let outcomes = self
            .publisher()
            .post_to_all(&job.post, &job.platforms)
            .await;

        let removed = match self.queue.complete(&job.id).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(job = %job.id, "Published but could not remove job: {}", e);
                false
            }
        };

        Ok(DispatchReport {
            job_id: job.id,
            outcomes,
            removed,
        })
    }

    /// Publish a draft; it is deleted once at least one platform accepted it
    pub async fn publish_draft(
        &self,
        id: &str,
        export_dir: Option<&Path>,
        now: DateTime<Utc>,
    ) -> Result<PostReport> {
        let (post, enablement) = self.drafts.load(id).await?;
        let report = self.post_now(&post, &enablement, export_dir, now).await?;

        if report.any_succeeded() {
            self.drafts.delete(id).await?;
        }
        Ok(report)
    }

    /// Scheduler over this service's queue
    ///
    /// Credentials are re-read from the store at every pass.
    pub fn scheduler(&self) -> Scheduler {
        let source = StoredCredentialsPublisher::new(
            Arc::clone(&self.store),
            self.config.clone(),
            self.event_bus.clone(),
        );
        Scheduler::new(Arc::clone(&self.queue), source).with_period(
            std::time::Duration::from_secs(self.config.scheduling.poll_interval),
        )
    }

    /// Saved theme, light if none
    pub async fn theme(&self) -> Result<Theme> {
        Ok(load_json(self.store.as_ref(), THEME_KEY)
            .await?
            .unwrap_or(Theme::Light))
    }

    pub async fn set_theme(&self, theme: Theme) -> Result<()> {
        save_json(self.store.as_ref(), THEME_KEY, &theme).await
    }

    pub async fn toggle_theme(&self) -> Result<Theme> {
        let next = self.theme().await?.toggled();
        self.set_theme(next).await?;
        Ok(next)
    }
}
