//! Common test utilities shared across integration tests.

use relance::Event;
use relance::testing::RecordingHandler;
use std::time::Duration;

/// Wait for a job's completion event, polling the recording handler.
///
/// More reliable than fixed sleeps since execution time can vary. Polls
/// every 10ms and panics if the timeout is reached first.
pub async fn wait_for_completion(
    handler: &RecordingHandler,
    job: &str,
    timeout: Duration,
) -> Event {
    let start = tokio::time::Instant::now();
    loop {
        let found = handler
            .events()
            .await
            .into_iter()
            .find(|e| matches!(e, Event::JobCompleted { job_id, .. } if job_id.as_str() == job));
        if let Some(event) = found {
            return event;
        }
        if start.elapsed() > timeout {
            panic!("Timeout waiting for job '{}' to complete", job);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Count completion events for a job.
#[allow(dead_code)]
pub async fn completion_count(handler: &RecordingHandler, job: &str) -> usize {
    handler
        .count_matching(
            |e| matches!(e, Event::JobCompleted { job_id, .. } if job_id.as_str() == job),
        )
        .await
}

/// Count trigger events for a job.
#[allow(dead_code)]
pub async fn trigger_count(handler: &RecordingHandler, job: &str) -> usize {
    handler
        .count_matching(
            |e| matches!(e, Event::JobTriggered { job_id, .. } if job_id.as_str() == job),
        )
        .await
}
