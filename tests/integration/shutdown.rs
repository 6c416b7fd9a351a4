//! Graceful shutdown integration tests.
//!
//! Verify the scheduler waits for in-flight runs before exiting, and gives
//! up once the shutdown timeout passes.

use relance::testing::{RecordingHandler, SlowJob};
use relance::{EventBus, Job, JobRegistry, Scheduler, SchedulerState};
use std::sync::Arc;
use std::time::Duration;

use crate::common;

async fn scheduler_with_slow_job(
    sleep: Duration,
    shutdown_timeout: Duration,
) -> (Scheduler, Arc<SlowJob>, Arc<RecordingHandler>) {
    let slow = Arc::new(SlowJob::new("slow", sleep));
    let mut registry = JobRegistry::new();
    registry.register(slow.clone() as Arc<dyn Job>);

    let event_bus = Arc::new(EventBus::new());
    let handler = RecordingHandler::new();
    event_bus.register(handler.clone()).await;

    let scheduler = Scheduler::new(Arc::new(registry))
        .with_event_bus(event_bus)
        .with_shutdown_timeout(shutdown_timeout);

    (scheduler, slow, handler)
}

#[tokio::test]
async fn test_shutdown_waits_for_in_flight_run() {
    let (scheduler, slow, handler) =
        scheduler_with_slow_job(Duration::from_millis(300), Duration::from_secs(5)).await;

    let (handle, task) = scheduler.start().await;
    handle.trigger("slow").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    handle.shutdown().await.unwrap();
    task.await.unwrap();

    assert_eq!(slow.completed().await, 1, "run was cut short by shutdown");
    assert_eq!(common::completion_count(&handler, "slow").await, 1);
}

#[tokio::test]
async fn test_shutdown_timeout_abandons_stuck_run() {
    let (scheduler, slow, _handler) =
        scheduler_with_slow_job(Duration::from_secs(60), Duration::from_millis(200)).await;

    let (handle, task) = scheduler.start().await;
    handle.trigger("slow").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let start = tokio::time::Instant::now();
    handle.shutdown().await.unwrap();
    task.await.unwrap();

    assert!(
        start.elapsed() < Duration::from_secs(5),
        "shutdown did not honor its timeout"
    );
    assert_eq!(slow.completed().await, 0);
}

#[tokio::test]
async fn test_shutdown_with_nothing_running_is_immediate() {
    let (scheduler, _slow, _handler) =
        scheduler_with_slow_job(Duration::from_secs(60), Duration::from_secs(30)).await;

    let (handle, task) = scheduler.start().await;

    let start = tokio::time::Instant::now();
    handle.shutdown().await.unwrap();
    task.await.unwrap();

    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(handle.state().await, SchedulerState::Stopped);
}

#[tokio::test]
async fn test_commands_fail_after_shutdown() {
    let (scheduler, _slow, _handler) =
        scheduler_with_slow_job(Duration::from_secs(60), Duration::from_secs(30)).await;

    let (handle, task) = scheduler.start().await;
    handle.shutdown().await.unwrap();
    task.await.unwrap();

    // The command channel is gone once the loop exits.
    assert!(handle.trigger("slow").await.is_err());
}
