//! Scheduler loop tests with an injected clock

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use libcrosscast::config::MediaConfig;
use libcrosscast::platforms::mock::MockPlatform;
use libcrosscast::platforms::Platform;
use libcrosscast::scheduler::ManualClock;
use libcrosscast::service::events::EventBus;
use libcrosscast::types::{Enablement, PlatformId, Post};
use libcrosscast::{MemoryStore, Publisher, ScheduleStore, Scheduler};
use tokio::sync::watch;

fn start() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2025-05-01T09:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

struct Harness {
    kv: Arc<MemoryStore>,
    queue: Arc<ScheduleStore>,
    clock: Arc<ManualClock>,
    scheduler: Scheduler,
}

fn harness(mocks: &[MockPlatform]) -> Harness {
    let kv = Arc::new(MemoryStore::new());
    let queue = Arc::new(ScheduleStore::new(kv.clone()));
    let clock = Arc::new(ManualClock::new(start()));
    let platforms: Vec<Arc<dyn Platform>> = mocks
        .iter()
        .map(|m| Arc::new(m.clone()) as Arc<dyn Platform>)
        .collect();
    let publisher = Publisher::new(platforms, MediaConfig::default(), EventBus::default());
    let scheduler = Scheduler::new(queue.clone(), publisher).with_clock(clock.clone());

    Harness {
        kv,
        queue,
        clock,
        scheduler,
    }
}

#[tokio::test]
async fn test_due_job_dispatched_once_and_removed() {
    let bluesky = MockPlatform::success(PlatformId::Bluesky);
    let h = harness(&[bluesky.clone()]);

    let job = h
        .queue
        .schedule(
            &Post::new("scheduled"),
            &Enablement::only(&[PlatformId::Bluesky]),
            start() + chrono::Duration::minutes(10),
            start(),
        )
        .await
        .unwrap();

    // Not yet due
    assert_eq!(h.scheduler.tick().await.unwrap(), 0);
    assert_eq!(bluesky.call_count(), 0);

    h.clock.advance(chrono::Duration::minutes(10));
    assert_eq!(h.scheduler.tick().await.unwrap(), 1);

    let reports = h.scheduler.drain().await;
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].job_id, job.id);
    assert!(reports[0].removed);
    assert_eq!(reports[0].succeeded(), 1);

    assert!(h.queue.get(&job.id).await.unwrap().is_none());
    assert!(!h.queue.is_claimed(&job.id));

    // Further ticks find nothing
    h.clock.advance(chrono::Duration::minutes(1));
    assert_eq!(h.scheduler.tick().await.unwrap(), 0);
    h.scheduler.drain().await;
    assert_eq!(bluesky.call_count(), 1);
}

#[tokio::test]
async fn test_failed_job_is_still_removed() {
    let tumblr = MockPlatform::failure(PlatformId::Tumblr, "blog not found");
    let h = harness(&[tumblr.clone()]);

    let job = h
        .queue
        .schedule(
            &Post::new("will fail"),
            &Enablement::only(&[PlatformId::Tumblr]),
            start() - chrono::Duration::hours(1),
            start(),
        )
        .await
        .unwrap();

    assert_eq!(h.scheduler.tick().await.unwrap(), 1);
    let reports = h.scheduler.drain().await;

    assert_eq!(reports[0].succeeded(), 0);
    assert!(!reports[0].outcomes[0].success);
    assert!(h.queue.get(&job.id).await.unwrap().is_none());
    assert_eq!(tumblr.call_count(), 1);
}

#[tokio::test]
async fn test_in_flight_job_not_redispatched_by_next_tick() {
    let mastodon =
        MockPlatform::success(PlatformId::Mastodon).with_delay(Duration::from_millis(150));
    let h = harness(&[mastodon.clone()]);

    let job = h
        .queue
        .schedule(
            &Post::new("slow"),
            &Enablement::only(&[PlatformId::Mastodon]),
            start(),
            start(),
        )
        .await
        .unwrap();

    assert_eq!(h.scheduler.tick().await.unwrap(), 1);
    assert!(h.queue.is_claimed(&job.id));

    // Still present but claimed, so a second pass skips it
    assert_eq!(h.scheduler.tick().await.unwrap(), 0);
    assert!(h.queue.cancel(&job.id).await.is_err());

    h.scheduler.drain().await;
    assert_eq!(mastodon.call_count(), 1);
    assert!(h.queue.all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_removal_keeps_claim() {
    let bluesky = MockPlatform::success(PlatformId::Bluesky).with_delay(Duration::from_millis(50));
    let h = harness(&[bluesky.clone()]);

    let job = h
        .queue
        .schedule(
            &Post::new("sticky"),
            &Enablement::only(&[PlatformId::Bluesky]),
            start(),
            start(),
        )
        .await
        .unwrap();

    assert_eq!(h.scheduler.tick().await.unwrap(), 1);
    h.kv.fail_writes(true);
    let reports = h.scheduler.drain().await;
    h.kv.fail_writes(false);

    assert!(!reports[0].removed);
    assert!(h.queue.get(&job.id).await.unwrap().is_some());
    assert!(h.queue.is_claimed(&job.id));

    // Claimed jobs are never picked up again by this process
    assert_eq!(h.scheduler.tick().await.unwrap(), 0);
    h.scheduler.drain().await;
    assert_eq!(bluesky.call_count(), 1);
}

#[tokio::test]
async fn test_only_due_jobs_are_dispatched() {
    let bluesky = MockPlatform::success(PlatformId::Bluesky);
    let h = harness(&[bluesky.clone()]);
    let enablement = Enablement::only(&[PlatformId::Bluesky]);

    let due = h
        .queue
        .schedule(&Post::new("due"), &enablement, start(), start())
        .await
        .unwrap();
    let later = h
        .queue
        .schedule(
            &Post::new("later"),
            &enablement,
            start() + chrono::Duration::days(1),
            start(),
        )
        .await
        .unwrap();

    assert_eq!(h.scheduler.tick().await.unwrap(), 1);
    h.scheduler.drain().await;

    assert!(h.queue.get(&due.id).await.unwrap().is_none());
    assert!(h.queue.get(&later.id).await.unwrap().is_some());
    assert_eq!(bluesky.sent_texts(), vec!["due".to_string()]);
}

#[tokio::test]
async fn test_run_stops_on_shutdown_and_drains() {
    let bluesky = MockPlatform::success(PlatformId::Bluesky);
    let h = harness(&[bluesky.clone()]);

    h.queue
        .schedule(
            &Post::new("on start"),
            &Enablement::only(&[PlatformId::Bluesky]),
            start(),
            start(),
        )
        .await
        .unwrap();

    let scheduler = Arc::new(h.scheduler.with_period(Duration::from_secs(3600)));
    let (tx, rx) = watch::channel(false);

    let runner = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.run(rx).await })
    };

    // The first interval tick fires immediately
    tokio::time::sleep(Duration::from_millis(100)).await;
    tx.send(true).unwrap();

    let reports = tokio::time::timeout(Duration::from_secs(5), runner)
        .await
        .expect("scheduler did not stop")
        .unwrap();

    let dispatched: usize = reports.len();
    assert!(dispatched <= 1);
    assert_eq!(bluesky.call_count(), 1);
    assert!(h.queue.all().await.unwrap().is_empty());
}
