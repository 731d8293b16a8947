//! Progress events
//!
//! An in-process broadcast bus standing in for the status sink. Adapters
//! report per-attempt progress keyed by platform; any number of subscribers
//! (CLI output, logs) may listen.
//!
//! If nobody is subscribed, events are dropped. Lagging subscribers lose the
//! oldest events first and never block emitters.
//!
//! ```
//! use libcrosscast::service::events::{Event, EventBus};
//! use libcrosscast::types::PlatformId;
//!
//! let bus = EventBus::new(100);
//! let mut receiver = bus.subscribe();
//! bus.emit(Event::PlatformProgress {
//!     platform: PlatformId::Mastodon,
//!     success: true,
//!     message: "Uploading image 1".to_string(),
//! });
//! assert!(receiver.try_recv().is_ok());
//! ```

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::types::{OutcomeRecord, PlatformId};

pub type EventReceiver = broadcast::Receiver<Event>;

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    /// `capacity` is the per-subscriber buffer
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Non-blocking; an event with no receivers is simply dropped
    pub fn emit(&self, event: Event) {
        let _ = self.sender.send(event);
    }

    /// Convenience for the common progress case
    pub fn progress(&self, platform: PlatformId, success: bool, message: impl Into<String>) {
        self.emit(Event::PlatformProgress {
            platform,
            success,
            message: message.into(),
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A fan-out began
    PublishStarted { platforms: Vec<PlatformId> },

    /// Transient per-attempt status for one platform
    PlatformProgress {
        platform: PlatformId,
        success: bool,
        message: String,
    },

    /// A fan-out finished; outcomes are in declaration order
    PublishCompleted { outcomes: Vec<OutcomeRecord> },
}
