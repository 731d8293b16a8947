//! Scheduler loop
//!
//! Two states: idle, and checking (a due-item pass is running). A pass claims
//! every due job and spawns one dispatch task per job, then returns without
//! waiting for them. Each dispatch runs the publisher and then removes the job
//! whatever the outcome: scheduled posts are attempted at most once.
//!
//! The clock and tick period are injected, so tests drive time with
//! [`ManualClock`] and call [`Scheduler::tick`] directly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::poster::{Publisher, PublisherSource};
use crate::queue::ScheduleStore;
use crate::types::{OutcomeRecord, ScheduledJob};

pub const DEFAULT_PERIOD: Duration = Duration::from_secs(60);

/// Wall-clock source
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: StdMutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: StdMutex::new(start),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Local notification emitter
///
/// Fire-and-forget. Errors (e.g. permission denied) are logged by the caller
/// and otherwise ignored.
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, body: &str) -> std::result::Result<(), String>;
}

/// Writes notifications to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, body: &str) -> std::result::Result<(), String> {
        info!("{}: {}", title, body);
        Ok(())
    }
}

/// What happened to one dispatched job
#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub job_id: String,
    pub outcomes: Vec<OutcomeRecord>,
    /// False if the removal write failed; the job stays claimed in this process
    pub removed: bool,
}

impl DispatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }
}

pub struct Scheduler {
    queue: Arc<ScheduleStore>,
    source: Arc<dyn PublisherSource>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    period: Duration,
    tasks: StdMutex<JoinSet<DispatchReport>>,
    checking: AtomicBool,
}

/// Resets the checking flag when a pass ends, including on early return
struct CheckingGuard<'a>(&'a AtomicBool);

impl Drop for CheckingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Scheduler {
    /// `source` is asked for a publisher at every pass, before jobs are claimed
    pub fn new(queue: Arc<ScheduleStore>, source: impl PublisherSource + 'static) -> Self {
        Self {
            queue,
            source: Arc::new(source),
            clock: Arc::new(SystemClock),
            notifier: Arc::new(LogNotifier),
            period: DEFAULT_PERIOD,
            tasks: StdMutex::new(JoinSet::new()),
            checking: AtomicBool::new(false),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_checking(&self) -> bool {
        self.checking.load(Ordering::SeqCst)
    }

    /// Dispatch tasks spawned but not yet reaped
    pub fn in_flight(&self) -> usize {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// One due-item pass
    ///
    /// Returns how many jobs were handed to dispatch. A tick that arrives while
    /// another pass is still checking does nothing.
    pub async fn tick(&self) -> Result<usize> {
        if self.checking.swap(true, Ordering::SeqCst) {
            debug!("Previous check still running, skipping tick");
            return Ok(0);
        }
        let _guard = CheckingGuard(&self.checking);

        self.reap_finished();

        let publisher = self.source.publisher().await?;
        let now = self.clock.now();
        let due = self.queue.claim_due(now).await?;
        if due.is_empty() {
            debug!("No scheduled posts due");
            return Ok(0);
        }

        info!("Found {} scheduled post(s) due", due.len());
        let count = due.len();
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        for job in due {
            tasks.spawn(dispatch(
                self.queue.clone(),
                publisher.clone(),
                self.notifier.clone(),
                job,
            ));
        }

        Ok(count)
    }

    /// Log and discard dispatch tasks that have already finished
    fn reap_finished(&self) {
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        while let Some(result) = tasks.try_join_next() {
            log_joined(result);
        }
    }

    /// Wait for every in-flight dispatch
    pub async fn drain(&self) -> Vec<DispatchReport> {
        let mut tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(|e| e.into_inner()));

        let mut reports = Vec::new();
        while let Some(result) = tasks.join_next().await {
            if let Some(report) = log_joined(result) {
                reports.push(report);
            }
        }
        reports
    }

    /// Tick immediately, then every period until `shutdown` flips to true
    ///
    /// In-flight dispatches are joined before returning.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Vec<DispatchReport> {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Scheduler running, checking every {}s", self.period.as_secs());

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick().await {
                        error!("Scheduled post check failed: {}", e);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Shutdown requested, waiting for in-flight posts");
                        break;
                    }
                }
            }
        }

        self.drain().await
    }
}

fn log_joined(result: std::result::Result<DispatchReport, tokio::task::JoinError>) -> Option<DispatchReport> {
    match result {
        Ok(report) => {
            debug!(job = %report.job_id, removed = report.removed, "Dispatch finished");
            Some(report)
        }
        Err(e) => {
            error!("Dispatch task failed: {}", e);
            None
        }
    }
}

async fn dispatch(
    queue: Arc<ScheduleStore>,
    publisher: Publisher,
    notifier: Arc<dyn Notifier>,
    job: ScheduledJob,
) -> DispatchReport {
    info!(job = %job.id, "Publishing scheduled post");

    let skipped = job.platforms.export_targets();
    if !skipped.is_empty() {
        debug!(job = %job.id, ?skipped, "Export-only platforms are not published by the scheduler");
    }

    let outcomes = publisher.post_to_all(&job.post, &job.platforms).await;
    let succeeded = outcomes.iter().filter(|o| o.success).count();

    for outcome in outcomes.iter().filter(|o| !o.success) {
        warn!(job = %job.id, platform = %outcome.platform, "{}", outcome.message);
    }

    let body = format!(
        "Posted to {} of {} platform(s)",
        succeeded,
        outcomes.len()
    );
    if let Err(e) = notifier.notify("Scheduled post published", &body) {
        debug!("Notification not shown: {}", e);
    }

    let removed = match queue.complete(&job.id).await {
        Ok(()) => true,
        Err(e) => {
            error!(job = %job.id, "Failed to remove dispatched job: {}", e);
            false
        }
    };

    DispatchReport {
        job_id: job.id,
        outcomes,
        removed,
    }
}
