//! Crosscast - write once, publish to Bluesky, Tumblr, Mastodon and Instagram
//!
//! This library holds the composition model, the platform adapters, the
//! publish orchestrator, and the schedule/draft stores shared by the
//! `cross-*` command line tools.

pub mod config;
pub mod credentials;
pub mod error;
pub mod logging;
pub mod media;
pub mod platforms;
pub mod poster;
pub mod queue;
pub mod scheduler;
pub mod scheduling;
pub mod service;
pub mod storage;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use credentials::{CredentialStore, Credentials};
pub use error::{CrosscastError, Result};
pub use poster::Publisher;
pub use queue::ScheduleStore;
pub use scheduler::Scheduler;
pub use service::CrosscastService;
pub use storage::{KvStore, MemoryStore, SqliteStore};
pub use types::{Draft, Enablement, OutcomeRecord, PlatformId, Post, ScheduledJob, Theme};
