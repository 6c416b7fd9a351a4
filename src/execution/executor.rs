//! The retry loop around a job invocation.
//!
//! `JobExecutor` runs a job to its terminal outcome: bounded attempts with a
//! fixed delay between failures, a semaphore cap on concurrent runs, and one
//! event per attempt and per terminal outcome. Each attempt executes in its
//! own task so a panicking job is recorded as a failed attempt instead of
//! taking the runner down with it.

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::warn;

use super::panic_message;
use crate::core::job::{Job, JobContext, JobError};
use crate::core::retry::RetryPolicy;
use crate::core::types::{JobId, RunId};
use crate::events::{Event, EventBus};

/// Terminal outcome of one run of a job.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// The job that ran.
    pub job_id: JobId,
    /// Identifier of this run.
    pub run_id: RunId,
    /// Whether any attempt succeeded.
    pub success: bool,
    /// Number of attempts made.
    pub attempts: u32,
    /// Wall time across all attempts and delays.
    pub duration: std::time::Duration,
    /// Reason from the final attempt when the run failed.
    pub error: Option<String>,
}

impl RunOutcome {
    fn success(job_id: JobId, run_id: RunId, attempts: u32, duration: std::time::Duration) -> Self {
        Self {
            job_id,
            run_id,
            success: true,
            attempts,
            duration,
            error: None,
        }
    }

    fn failure(
        job_id: JobId,
        run_id: RunId,
        attempts: u32,
        duration: std::time::Duration,
        error: String,
    ) -> Self {
        Self {
            job_id,
            run_id,
            success: false,
            attempts,
            duration,
            error: Some(error),
        }
    }
}

/// Runs jobs under their retry policies with a cap on concurrent runs.
pub struct JobExecutor {
    max_concurrency: usize,
    semaphore: Arc<Semaphore>,
    events: Arc<EventBus>,
}

impl JobExecutor {
    /// Create an executor allowing up to `max_concurrency` simultaneous runs.
    pub fn new(max_concurrency: usize, events: Arc<EventBus>) -> Self {
        Self {
            max_concurrency,
            semaphore: Arc::new(Semaphore::new(max_concurrency)),
            events,
        }
    }

    /// The configured concurrency cap.
    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Currently free run slots.
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Run a job under its own declared retry policy.
    pub async fn run_with_retry(&self, job: Arc<dyn Job>, ctx: JobContext) -> RunOutcome {
        let policy = job.retry_policy();
        self.run_with_policy(job, ctx, policy).await
    }

    /// Run a job under an explicit retry policy (config overrides).
    pub async fn run_with_policy(
        &self,
        job: Arc<dyn Job>,
        ctx: JobContext,
        policy: RetryPolicy,
    ) -> RunOutcome {
        let job_id = ctx.job_id().clone();
        let run_id = *ctx.run_id();
        let start = Instant::now();

        let _permit = self.semaphore.acquire().await.expect("semaphore closed");

        let mut attempts = 0u32;
        loop {
            attempts += 1;
            self.events
                .emit(Event::attempt_started(
                    job_id.clone(),
                    run_id,
                    attempts,
                    policy.max_attempts,
                ))
                .await;

            // One task per attempt: a panic inside the job is captured from
            // the join error rather than unwinding through the runner.
            let attempt_job = Arc::clone(&job);
            let attempt_ctx = ctx.clone();
            let joined = tokio::spawn(async move { attempt_job.run(&attempt_ctx).await }).await;

            let error: JobError = match joined {
                Ok(Ok(())) => {
                    self.events
                        .emit(Event::job_completed(
                            job_id.clone(),
                            run_id,
                            true,
                            attempts,
                            start.elapsed(),
                            None,
                        ))
                        .await;
                    return RunOutcome::success(job_id, run_id, attempts, start.elapsed());
                }
                Ok(Err(e)) => e,
                Err(join_err) => JobError::Panicked(panic_message(join_err)),
            };

            warn!(
                job_id = %job_id,
                run_id = %run_id,
                attempt = attempts,
                max_attempts = policy.max_attempts,
                error = %error,
                "Job attempt failed"
            );
            self.events
                .emit(Event::attempt_failed(
                    job_id.clone(),
                    run_id,
                    attempts,
                    policy.max_attempts,
                    error.to_string(),
                ))
                .await;

            if policy.should_retry(attempts) {
                sleep(policy.delay).await;
            } else {
                let reason = error.to_string();
                self.events
                    .emit(Event::job_completed(
                        job_id.clone(),
                        run_id,
                        false,
                        attempts,
                        start.elapsed(),
                        Some(reason.clone()),
                    ))
                    .await;
                return RunOutcome::failure(job_id, run_id, attempts, start.elapsed(), reason);
            }
        }
    }
}
