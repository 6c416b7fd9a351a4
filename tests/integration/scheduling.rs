//! Scheduled firing and manual trigger integration tests.

use relance::testing::{RecordingHandler, SlowJob};
use relance::{
    Event, EventBus, Job, JobContext, JobError, JobRegistry, OverlapPolicy, Schedule, Scheduler,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::common;

struct CountingJob {
    name: String,
    runs: AtomicUsize,
}

impl CountingJob {
    fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            runs: AtomicUsize::new(0),
        })
    }

    fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Job for CountingJob {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, _ctx: &JobContext) -> Result<(), JobError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

async fn scheduler_with(jobs: Vec<Arc<dyn Job>>) -> (Scheduler, Arc<RecordingHandler>) {
    let mut registry = JobRegistry::new();
    for job in jobs {
        registry.register(job);
    }

    let event_bus = Arc::new(EventBus::new());
    let handler = RecordingHandler::new();
    event_bus.register(handler.clone()).await;

    let scheduler = Scheduler::new(Arc::new(registry))
        .with_event_bus(event_bus)
        .with_tick_interval(Duration::from_millis(50));

    (scheduler, handler)
}

#[tokio::test]
async fn test_interval_entry_fires_repeatedly() {
    let job = CountingJob::new("ticker");
    let (mut scheduler, _handler) = scheduler_with(vec![job.clone()]).await;
    scheduler
        .schedule_job("ticker", Schedule::new("@every 1s").unwrap())
        .unwrap();

    let (handle, task) = scheduler.start().await;
    tokio::time::sleep(Duration::from_millis(3500)).await;
    handle.shutdown().await.unwrap();
    task.await.unwrap();

    assert!(
        job.runs() >= 2,
        "expected at least two fires in 3.5s, got {}",
        job.runs()
    );
}

#[tokio::test]
async fn test_manual_trigger_emits_completion_event() {
    let job = CountingJob::new("once");
    let (scheduler, handler) = scheduler_with(vec![job.clone()]).await;

    let (handle, task) = scheduler.start().await;
    let run_id = handle.trigger("once").await.unwrap();

    let event = common::wait_for_completion(&handler, "once", Duration::from_secs(2)).await;
    match event {
        Event::JobCompleted {
            run_id: completed_run,
            success,
            attempts,
            ..
        } => {
            assert_eq!(completed_run, run_id);
            assert!(success);
            assert_eq!(attempts, 1);
        }
        other => panic!("unexpected event {:?}", other),
    }

    handle.shutdown().await.unwrap();
    task.await.unwrap();
}

#[tokio::test]
async fn test_slow_entry_does_not_starve_fast_entry() {
    let slow = Arc::new(SlowJob::new("slow", Duration::from_secs(30)));
    let fast = CountingJob::new("fast");
    let (mut scheduler, _handler) =
        scheduler_with(vec![slow as Arc<dyn Job>, fast.clone()]).await;
    scheduler
        .schedule_job("slow", Schedule::new("@every 1s").unwrap())
        .unwrap();
    scheduler
        .schedule_job("fast", Schedule::new("@every 1s").unwrap())
        .unwrap();
    let scheduler = scheduler.with_shutdown_timeout(Duration::from_millis(100));

    let (handle, task) = scheduler.start().await;
    tokio::time::sleep(Duration::from_millis(2500)).await;
    handle.shutdown().await.unwrap();
    task.await.unwrap();

    assert!(fast.runs() >= 1, "fast entry starved by slow one");
}

#[tokio::test]
async fn test_overlap_skip_emits_skip_events() {
    let slow = Arc::new(SlowJob::new("busy", Duration::from_secs(30)));
    let (mut scheduler, handler) = scheduler_with(vec![slow as Arc<dyn Job>]).await;
    scheduler
        .schedule_job_with(
            "busy",
            Schedule::new("@every 1s").unwrap(),
            OverlapPolicy::Skip,
            None,
            HashMap::new(),
        )
        .unwrap();
    let scheduler = scheduler.with_shutdown_timeout(Duration::from_millis(100));

    let (handle, task) = scheduler.start().await;
    tokio::time::sleep(Duration::from_millis(3500)).await;

    // One fire starts the run, later fires land while it is still going.
    assert_eq!(common::trigger_count(&handler, "busy").await, 1);
    assert!(
        handler
            .count_matching(|e| matches!(e, Event::JobSkipped { .. }))
            .await
            >= 1
    );

    handle.shutdown().await.unwrap();
    task.await.unwrap();
}

#[tokio::test]
async fn test_overlap_allow_stacks_runs() {
    let slow = Arc::new(SlowJob::new("stacking", Duration::from_secs(30)));
    let (mut scheduler, handler) = scheduler_with(vec![slow as Arc<dyn Job>]).await;
    scheduler
        .schedule_job("stacking", Schedule::new("@every 1s").unwrap())
        .unwrap();
    let scheduler = scheduler.with_shutdown_timeout(Duration::from_millis(100));

    let (handle, task) = scheduler.start().await;
    tokio::time::sleep(Duration::from_millis(3500)).await;

    assert!(common::trigger_count(&handler, "stacking").await >= 2);

    handle.shutdown().await.unwrap();
    task.await.unwrap();
}

#[tokio::test]
async fn test_pause_and_resume() {
    let job = CountingJob::new("pausable");
    let (mut scheduler, _handler) = scheduler_with(vec![job.clone()]).await;
    scheduler
        .schedule_job("pausable", Schedule::new("@every 1s").unwrap())
        .unwrap();

    let (handle, task) = scheduler.start().await;
    handle.pause().await.unwrap();

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(job.runs(), 0, "paused scheduler fired a job");

    handle.resume().await.unwrap();
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert!(job.runs() >= 1, "resumed scheduler never fired");

    handle.shutdown().await.unwrap();
    task.await.unwrap();
}
