//! Testing utilities for users of the library.
//!
//! This module provides helpers for testing job scheduling and resilience:
//!
//! - [`FailingJob`]: fails N times then succeeds
//! - [`PanickingJob`]: panics on every run
//! - [`SlowJob`]: sleeps for a configurable duration
//! - [`RecordingHandler`]: captures emitted events for assertions

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::core::job::{Job, JobContext, JobError};
use crate::core::retry::RetryPolicy;
use crate::events::{Event, EventHandler};

/// A job that fails a configurable number of times before succeeding.
///
/// Useful for testing retry logic. The failure counting is protected by a
/// mutex so behavior stays deterministic under concurrent runs.
///
/// # Example
///
/// ```
/// use relance::testing::FailingJob;
///
/// // Fails 2 times, then succeeds on the 3rd attempt
/// let job = FailingJob::new("flaky", 2);
/// ```
pub struct FailingJob {
    name: String,
    state: Mutex<FailingJobState>,
    total_failures: u32,
    error_message: String,
    retry_policy: RetryPolicy,
}

struct FailingJobState {
    failures_remaining: u32,
    call_count: u32,
}

impl FailingJob {
    /// Create a job that fails `fail_count` times then succeeds.
    pub fn new(name: impl Into<String>, fail_count: u32) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(FailingJobState {
                failures_remaining: fail_count,
                call_count: 0,
            }),
            total_failures: fail_count,
            error_message: "intentional test failure".to_string(),
            retry_policy: RetryPolicy::none(),
        }
    }

    /// Create a job that fails with a custom error message.
    pub fn with_error(
        name: impl Into<String>,
        fail_count: u32,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error_message: message.into(),
            ..Self::new(name, fail_count)
        }
    }

    /// Set the retry policy this job declares.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Number of times this job has been called.
    pub async fn call_count(&self) -> u32 {
        self.state.lock().await.call_count
    }

    /// Reset the failure counter for reuse.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.failures_remaining = self.total_failures;
        state.call_count = 0;
    }
}

#[async_trait]
impl Job for FailingJob {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, _ctx: &JobContext) -> Result<(), JobError> {
        let mut state = self.state.lock().await;
        state.call_count += 1;
        if state.failures_remaining > 0 {
            state.failures_remaining -= 1;
            Err(JobError::Failed(self.error_message.clone()))
        } else {
            Ok(())
        }
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.retry_policy.clone()
    }
}

/// A job that panics on every run, for testing panic isolation.
pub struct PanickingJob {
    name: String,
    message: String,
}

impl PanickingJob {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl Job for PanickingJob {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, _ctx: &JobContext) -> Result<(), JobError> {
        panic!("{}", self.message.clone());
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::none()
    }
}

/// A job that sleeps for a fixed duration, for testing overlap policies and
/// graceful shutdown.
pub struct SlowJob {
    name: String,
    sleep: Duration,
    completed: Mutex<u32>,
}

impl SlowJob {
    pub fn new(name: impl Into<String>, sleep: Duration) -> Self {
        Self {
            name: name.into(),
            sleep,
            completed: Mutex::new(0),
        }
    }

    /// Number of runs that slept all the way through.
    pub async fn completed(&self) -> u32 {
        *self.completed.lock().await
    }
}

#[async_trait]
impl Job for SlowJob {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, _ctx: &JobContext) -> Result<(), JobError> {
        tokio::time::sleep(self.sleep).await;
        *self.completed.lock().await += 1;
        Ok(())
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::none()
    }
}

/// Event handler that records every event it sees.
///
/// # Example
///
/// ```
/// use relance::testing::RecordingHandler;
///
/// let handler = RecordingHandler::new();
/// // register with an EventBus, then assert on handler.events().await
/// ```
pub struct RecordingHandler {
    events: Mutex<Vec<Event>>,
}

impl RecordingHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
        })
    }

    /// All events seen so far, in emission order.
    pub async fn events(&self) -> Vec<Event> {
        self.events.lock().await.clone()
    }

    /// Count of events matching a predicate.
    pub async fn count_matching(&self, predicate: impl Fn(&Event) -> bool) -> usize {
        self.events.lock().await.iter().filter(|e| predicate(e)).count()
    }
}

#[async_trait]
impl EventHandler for RecordingHandler {
    async fn handle(&self, event: &Event) {
        self.events.lock().await.push(event.clone());
    }
}
