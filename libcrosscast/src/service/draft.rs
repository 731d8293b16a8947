//! Drafts
//!
//! Saved, untriggered posts kept as one JSON array under the `drafts` key.
//! Same write discipline as the schedule store: read the durable array, edit
//! a copy, write it back. A failed write changes nothing.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::error::{CrosscastError, Result};
use crate::storage::{load_json, save_json, KvStore, DRAFTS_KEY};
use crate::types::{Draft, Enablement, Post};

pub struct DraftStore {
    store: Arc<dyn KvStore>,
    write_lock: Mutex<()>,
}

impl DraftStore {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    async fn read(&self) -> Result<Vec<Draft>> {
        Ok(load_json(self.store.as_ref(), DRAFTS_KEY)
            .await?
            .unwrap_or_default())
    }

    /// Snapshot `post` and `platforms` into a new draft
    pub async fn save(
        &self,
        post: &Post,
        platforms: &Enablement,
        now: DateTime<Utc>,
    ) -> Result<Draft> {
        let draft = Draft::new(post, platforms, now);

        let _guard = self.write_lock.lock().await;
        let mut drafts = self.read().await?;
        drafts.push(draft.clone());
        save_json(self.store.as_ref(), DRAFTS_KEY, &drafts).await?;

        tracing::info!(draft = %draft.id, "Draft saved");
        Ok(draft)
    }

    /// Every draft, newest first
    pub async fn list(&self) -> Result<Vec<Draft>> {
        let mut drafts = self.read().await?;
        drafts.sort_by(|a, b| b.created.cmp(&a.created));
        Ok(drafts)
    }

    pub async fn get(&self, id: &str) -> Result<Option<Draft>> {
        Ok(self.read().await?.into_iter().find(|d| d.id == id))
    }

    /// Deep copy of a draft's post and platforms for editing
    ///
    /// The draft itself stays saved.
    pub async fn load(&self, id: &str) -> Result<(Post, Enablement)> {
        let draft = self
            .get(id)
            .await?
            .ok_or_else(|| CrosscastError::InvalidInput(format!("Draft not found: {}", id)))?;
        Ok((draft.post.snapshot(), draft.platforms.snapshot()))
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut drafts = self.read().await?;
        let before = drafts.len();
        drafts.retain(|d| d.id != id);
        if drafts.len() == before {
            return Err(CrosscastError::InvalidInput(format!(
                "Draft not found: {}",
                id
            )));
        }
        save_json(self.store.as_ref(), DRAFTS_KEY, &drafts).await?;

        tracing::info!(draft = %id, "Draft deleted");
        Ok(())
    }
}
