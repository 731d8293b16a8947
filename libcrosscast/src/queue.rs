//! Schedule store
//!
//! A durable queue of [`ScheduledJob`]s kept as one JSON array under the
//! `scheduled` key. Every mutation reads the durable snapshot, edits a copy,
//! and writes the whole array back before returning. A failed write leaves the
//! durable queue exactly as it was.
//!
//! Jobs being dispatched are *claimed*. A claimed job cannot be cancelled or
//! rescheduled and is never handed out twice by [`ScheduleStore::claim_due`].

use std::collections::HashSet;
use std::sync::{Arc, Mutex as StdMutex};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::error::{CrosscastError, Result};
use crate::storage::{load_json, save_json, KvStore, SCHEDULED_KEY};
use crate::types::{Enablement, Post, ScheduledJob};

pub struct ScheduleStore {
    store: Arc<dyn KvStore>,
    /// Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
    claimed: StdMutex<HashSet<String>>,
}

impl ScheduleStore {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
            claimed: StdMutex::new(HashSet::new()),
        }
    }

    async fn read(&self) -> Result<Vec<ScheduledJob>> {
        Ok(load_json(self.store.as_ref(), SCHEDULED_KEY)
            .await?
            .unwrap_or_default())
    }

    /// Read-modify-write under the write lock
    async fn mutate<T, F>(&self, edit: F) -> Result<T>
    where
        F: FnOnce(&mut Vec<ScheduledJob>) -> Result<T>,
    {
        let _guard = self.write_lock.lock().await;
        let mut jobs = self.read().await?;
        let result = edit(&mut jobs)?;
        save_json(self.store.as_ref(), SCHEDULED_KEY, &jobs).await?;
        Ok(result)
    }

    pub async fn insert(&self, job: ScheduledJob) -> Result<()> {
        let id = job.id.clone();
        let at = job.scheduled_time;
        self.mutate(move |jobs| {
            if jobs.iter().any(|j| j.id == job.id) {
                return Err(CrosscastError::InvalidInput(format!(
                    "Scheduled job {} already exists",
                    job.id
                )));
            }
            jobs.push(job);
            Ok(())
        })
        .await?;

        tracing::info!(job = %id, scheduled_for = %at.to_rfc3339(), "Scheduled job stored");
        Ok(())
    }

    /// Snapshot `post` and `platforms` into a new job
    pub async fn schedule(
        &self,
        post: &Post,
        platforms: &Enablement,
        at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<ScheduledJob> {
        let job = ScheduledJob::new(post, platforms, at, now);
        self.insert(job.clone()).await?;
        Ok(job)
    }

    /// Delete a job unconditionally; returns whether it existed
    ///
    /// This is the dispatcher's path. User-facing cancellation goes through
    /// [`ScheduleStore::cancel`].
    pub async fn remove(&self, id: &str) -> Result<bool> {
        self.mutate(|jobs| {
            let before = jobs.len();
            jobs.retain(|j| j.id != id);
            Ok(jobs.len() != before)
        })
        .await
    }

    /// User cancellation; refused once dispatch has started
    ///
    /// The claim check and the removal happen under the write lock, so a job
    /// is either cancelled or handed to dispatch, never both.
    pub async fn cancel(&self, id: &str) -> Result<()> {
        self.mutate(|jobs| {
            if self.is_claimed(id) {
                return Err(CrosscastError::InvalidInput(format!(
                    "Job {} is already being published and can no longer be cancelled",
                    id
                )));
            }
            let before = jobs.len();
            jobs.retain(|j| j.id != id);
            if jobs.len() == before {
                return Err(CrosscastError::InvalidInput(format!(
                    "Scheduled job not found: {}",
                    id
                )));
            }
            Ok(())
        })
        .await?;

        tracing::info!(job = %id, "Scheduled job cancelled");
        Ok(())
    }

    /// Take a job out of the queue for editing
    ///
    /// The returned job is a deep copy and is no longer scheduled; the caller
    /// reschedules it once edited.
    pub async fn take_for_edit(&self, id: &str) -> Result<ScheduledJob> {
        let job = self.get(id).await?.ok_or_else(|| {
            CrosscastError::InvalidInput(format!("Scheduled job not found: {}", id))
        })?;
        self.cancel(id).await?;
        Ok(ScheduledJob {
            post: job.post.snapshot(),
            platforms: job.platforms.snapshot(),
            ..job
        })
    }

    /// Delete-then-recreate at a new time; the new job gets a new id
    pub async fn reschedule(
        &self,
        id: &str,
        at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<ScheduledJob> {
        let replacement = self
            .mutate(|jobs| {
                if self.is_claimed(id) {
                    return Err(CrosscastError::InvalidInput(format!(
                        "Job {} is already being published and can no longer be changed",
                        id
                    )));
                }
                let index = jobs.iter().position(|j| j.id == id).ok_or_else(|| {
                    CrosscastError::InvalidInput(format!("Scheduled job not found: {}", id))
                })?;
                let old = jobs.remove(index);
                let job = ScheduledJob::new(&old.post, &old.platforms, at, now);
                jobs.push(job.clone());
                Ok(job)
            })
            .await?;

        tracing::info!(old = %id, new = %replacement.id, "Scheduled job rescheduled");
        Ok(replacement)
    }

    pub async fn get(&self, id: &str) -> Result<Option<ScheduledJob>> {
        Ok(self.read().await?.into_iter().find(|j| j.id == id))
    }

    /// Every job, soonest first
    pub async fn all(&self) -> Result<Vec<ScheduledJob>> {
        let mut jobs = self.read().await?;
        jobs.sort_by_key(|j| j.scheduled_time);
        Ok(jobs)
    }

    /// Jobs whose trigger time is at or before `now`, claimed or not
    pub async fn due_items(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledJob>> {
        Ok(self
            .read()
            .await?
            .into_iter()
            .filter(|j| j.is_due(now))
            .collect())
    }

    /// Due jobs not yet claimed, now claimed by the caller
    ///
    /// Each returned job must eventually be passed to [`ScheduleStore::complete`].
    pub async fn claim_due(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledJob>> {
        let _guard = self.write_lock.lock().await;
        let due = self.due_items(now).await?;
        let mut claimed = self.claimed.lock().unwrap_or_else(|e| e.into_inner());
        Ok(due
            .into_iter()
            .filter(|job| claimed.insert(job.id.clone()))
            .collect())
    }

    /// Claim one job for immediate dispatch, due or not
    pub async fn claim(&self, id: &str) -> Result<ScheduledJob> {
        let _guard = self.write_lock.lock().await;
        let job = self.get(id).await?.ok_or_else(|| {
            CrosscastError::InvalidInput(format!("Scheduled job not found: {}", id))
        })?;

        let mut claimed = self.claimed.lock().unwrap_or_else(|e| e.into_inner());
        if !claimed.insert(job.id.clone()) {
            return Err(CrosscastError::InvalidInput(format!(
                "Job {} is already being published",
                id
            )));
        }
        Ok(job)
    }

    pub fn is_claimed(&self, id: &str) -> bool {
        self.claimed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(id)
    }

    pub fn claimed_count(&self) -> usize {
        self.claimed.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Remove a dispatched job
    ///
    /// On success the claim is released. If the removal write fails the claim
    /// is kept, so this process will not dispatch the job again.
    pub async fn complete(&self, id: &str) -> Result<()> {
        self.remove(id).await?;
        self.claimed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id);
        Ok(())
    }
}
