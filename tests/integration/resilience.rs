//! Retry, panic isolation, and fallback integration tests.

use relance::testing::{FailingJob, PanickingJob, RecordingHandler};
use relance::{
    Event, EventBus, Job, JobContext, JobError, JobExecutor, RetryPolicy, Strategy, StrategyError,
    try_in_order,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

async fn executor() -> (Arc<JobExecutor>, Arc<RecordingHandler>) {
    let event_bus = Arc::new(EventBus::new());
    let handler = RecordingHandler::new();
    event_bus.register(handler.clone()).await;
    (Arc::new(JobExecutor::new(4, event_bus)), handler)
}

#[tokio::test]
async fn test_flaky_job_recovers_within_retry_budget() {
    let (executor, handler) = executor().await;
    let job = Arc::new(
        FailingJob::new("flaky", 2)
            .with_retry_policy(RetryPolicy::fixed(3, Duration::from_millis(10))),
    );

    let outcome = executor
        .run_with_retry(job.clone(), JobContext::empty("flaky"))
        .await;

    assert!(outcome.success);
    assert_eq!(outcome.attempts, 3);
    assert_eq!(job.call_count().await, 3);
    assert_eq!(
        handler
            .count_matching(|e| matches!(e, Event::AttemptFailed { .. }))
            .await,
        2
    );
}

#[tokio::test]
async fn test_exhausted_retries_carry_last_error() {
    let (executor, _handler) = executor().await;
    let job = Arc::new(
        FailingJob::with_error("doomed", 10, "still broken")
            .with_retry_policy(RetryPolicy::fixed(3, Duration::from_millis(10))),
    );

    let outcome = executor
        .run_with_retry(job, JobContext::empty("doomed"))
        .await;

    assert!(!outcome.success);
    assert_eq!(outcome.attempts, 3);
    assert!(outcome.error.unwrap().contains("still broken"));
}

#[tokio::test]
async fn test_panicking_job_counts_as_failed_attempt() {
    let (executor, handler) = executor().await;
    let job = Arc::new(PanickingJob::new("exploder", "boom"));

    let outcome = executor
        .run_with_policy(
            job,
            JobContext::empty("exploder"),
            RetryPolicy::fixed(2, Duration::from_millis(10)),
        )
        .await;

    assert!(!outcome.success);
    assert_eq!(outcome.attempts, 2);
    assert!(outcome.error.unwrap().contains("boom"));
    // The executor loop survived both panics.
    assert_eq!(
        handler
            .count_matching(|e| matches!(e, Event::JobCompleted { .. }))
            .await,
        1
    );
}

struct ScriptedStrategy {
    label: String,
    succeed: bool,
    calls: AtomicUsize,
}

impl ScriptedStrategy {
    fn new(label: &str, succeed: bool) -> Arc<Self> {
        Arc::new(Self {
            label: label.to_string(),
            succeed,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait::async_trait]
impl Strategy for ScriptedStrategy {
    fn label(&self) -> &str {
        &self.label
    }

    async fn attempt(&self) -> Result<(), StrategyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.succeed {
            Ok(())
        } else {
            Err(StrategyError {
                reason: format!("{} refused", self.label),
            })
        }
    }
}

#[tokio::test]
async fn test_fallback_stops_at_first_success() {
    let a = ScriptedStrategy::new("a", false);
    let b = ScriptedStrategy::new("b", true);
    let c = ScriptedStrategy::new("c", true);
    let strategies: Vec<Arc<dyn Strategy>> = vec![a.clone(), b.clone(), c.clone()];

    let outcome = try_in_order(&strategies).await.unwrap();

    assert_eq!(outcome.winner, "b");
    assert_eq!(outcome.strategies_tried, 2);
    assert_eq!(a.calls.load(Ordering::SeqCst), 1);
    assert_eq!(b.calls.load(Ordering::SeqCst), 1);
    assert_eq!(c.calls.load(Ordering::SeqCst), 0, "winner short-circuits");
}

#[tokio::test]
async fn test_fallback_failure_reports_last_strategy() {
    let strategies: Vec<Arc<dyn Strategy>> = vec![
        ScriptedStrategy::new("first", false),
        ScriptedStrategy::new("second", false),
    ];

    let err = try_in_order(&strategies).await.unwrap_err();
    let message = err.to_string();
    assert!(message.contains("second"));
    assert!(message.contains("refused"));
}

/// A job whose attempt runs a fallback chain, the way the boundary jobs do.
struct FallbackJob {
    strategies: Vec<Arc<dyn Strategy>>,
}

#[async_trait::async_trait]
impl Job for FallbackJob {
    fn name(&self) -> &str {
        "fallback_job"
    }

    async fn run(&self, _ctx: &JobContext) -> Result<(), JobError> {
        try_in_order(&self.strategies)
            .await
            .map(|_| ())
            .map_err(|e| JobError::Failed(e.to_string()))
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(2, Duration::from_millis(10))
    }
}

#[tokio::test]
async fn test_retry_reruns_whole_fallback_chain() {
    let (executor, _handler) = executor().await;
    let a = ScriptedStrategy::new("a", false);
    let b = ScriptedStrategy::new("b", false);
    let job = Arc::new(FallbackJob {
        strategies: vec![a.clone(), b.clone()],
    });

    let outcome = executor
        .run_with_retry(job, JobContext::empty("fallback_job"))
        .await;

    assert!(!outcome.success);
    assert_eq!(outcome.attempts, 2);
    // Each attempt walks the chain from the top.
    assert_eq!(a.calls.load(Ordering::SeqCst), 2);
    assert_eq!(b.calls.load(Ordering::SeqCst), 2);
}
