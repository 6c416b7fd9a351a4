//! Scheduler engine implementation.
//!
//! The scheduler holds a set of armed entries, each pairing a registry job
//! with a schedule. A tick loop fires entries whose next occurrence has
//! passed, dispatches each run onto its own task so a slow job never blocks
//! the loop, and re-arms the entry from the current time. Commands arrive
//! over a channel from [`SchedulerHandle`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{RwLock, mpsc, oneshot};
use tokio::task::JoinHandle;

use chrono::{DateTime, Utc};

use crate::config::{Config, ConfigError, OverlapPolicy};
use crate::core::job::{Job, JobContext};
use crate::core::retry::RetryPolicy;
use crate::core::schedule::Schedule;
use crate::core::types::{JobId, RunId};
use crate::events::{Event, EventBus};
use crate::execution::JobExecutor;
use crate::jobs::JobRegistry;

/// Buffer size for the command channel between SchedulerHandle and Scheduler.
const COMMAND_CHANNEL_BUFFER: usize = 32;

/// Default cap on simultaneous job runs.
const DEFAULT_MAX_CONCURRENT_RUNS: usize = 4;

/// Upper bound when counting occurrences folded into one late fire.
const MAX_MISSED_SCAN: usize = 100;

/// Errors that can occur in the scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Job not found in the registry.
    #[error("job not found: {0}")]
    JobNotFound(String),

    /// Entry configuration did not resolve.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Channel error.
    #[error("channel error: {0}")]
    ChannelError(String),
}

/// State of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Scheduler is stopped.
    Stopped,
    /// Scheduler is running.
    Running,
    /// Scheduler is paused.
    Paused,
}

/// Commands that can be sent to the scheduler.
enum SchedulerCommand {
    /// Trigger a job manually.
    Trigger {
        job_id: JobId,
        response: oneshot::Sender<Result<RunId, SchedulerError>>,
    },
    /// Pause the scheduler.
    Pause { response: oneshot::Sender<()> },
    /// Resume the scheduler.
    Resume { response: oneshot::Sender<()> },
    /// Shutdown the scheduler.
    Shutdown { response: oneshot::Sender<()> },
}

/// Handle for controlling the scheduler.
#[derive(Clone)]
pub struct SchedulerHandle {
    command_tx: mpsc::Sender<SchedulerCommand>,
    state: Arc<RwLock<SchedulerState>>,
}

impl SchedulerHandle {
    /// Send a command carrying a result channel and wait for the answer.
    async fn request<T>(
        &self,
        build_command: impl FnOnce(oneshot::Sender<Result<T, SchedulerError>>) -> SchedulerCommand,
        operation: &str,
    ) -> Result<T, SchedulerError>
    where
        T: Send + 'static,
    {
        let (response_tx, response_rx) = oneshot::channel();
        self.command_tx
            .send(build_command(response_tx))
            .await
            .map_err(|_| {
                SchedulerError::ChannelError(format!("failed to send {} command", operation))
            })?;

        response_rx.await.map_err(|_| {
            SchedulerError::ChannelError(format!("failed to receive {} response", operation))
        })?
    }

    /// Send a fire-and-acknowledge command.
    async fn signal(
        &self,
        build_command: impl FnOnce(oneshot::Sender<()>) -> SchedulerCommand,
        operation: &str,
    ) -> Result<(), SchedulerError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.command_tx
            .send(build_command(response_tx))
            .await
            .map_err(|_| {
                SchedulerError::ChannelError(format!("failed to send {} command", operation))
            })?;

        response_rx.await.map_err(|_| {
            SchedulerError::ChannelError(format!("failed to receive {} response", operation))
        })
    }

    /// Trigger a job manually. Works even while paused, and bypasses the
    /// entry's overlap policy.
    pub async fn trigger(&self, job_id: impl Into<JobId>) -> Result<RunId, SchedulerError> {
        let job_id = job_id.into();
        self.request(
            |response| SchedulerCommand::Trigger { job_id, response },
            "trigger",
        )
        .await
    }

    /// Pause scheduled firing. Manual triggers still work.
    pub async fn pause(&self) -> Result<(), SchedulerError> {
        self.signal(|response| SchedulerCommand::Pause { response }, "pause")
            .await
    }

    /// Resume scheduled firing after a pause.
    pub async fn resume(&self) -> Result<(), SchedulerError> {
        self.signal(|response| SchedulerCommand::Resume { response }, "resume")
            .await
    }

    /// Shut down, waiting for in-flight runs up to the shutdown timeout.
    pub async fn shutdown(&self) -> Result<(), SchedulerError> {
        self.signal(
            |response| SchedulerCommand::Shutdown { response },
            "shutdown",
        )
        .await
    }

    /// Get the current scheduler state.
    pub async fn state(&self) -> SchedulerState {
        *self.state.read().await
    }

    /// Check if the scheduler is running.
    pub async fn is_running(&self) -> bool {
        *self.state.read().await == SchedulerState::Running
    }

    /// Check if the scheduler is paused.
    pub async fn is_paused(&self) -> bool {
        *self.state.read().await == SchedulerState::Paused
    }
}

/// One armed schedule entry.
struct Entry {
    job_id: JobId,
    job: Arc<dyn Job>,
    schedule: Schedule,
    retry: Option<RetryPolicy>,
    overlap: OverlapPolicy,
    params: HashMap<String, serde_yaml::Value>,
    next_fire: DateTime<Utc>,
}

type RunningMap = HashMap<RunId, (JobId, JoinHandle<()>)>;

/// Time-driven job runner.
pub struct Scheduler {
    registry: Arc<JobRegistry>,
    executor: Arc<JobExecutor>,
    event_bus: Arc<EventBus>,
    entries: Vec<Entry>,
    tick_interval: Duration,
    shutdown_timeout: Duration,
    running: Arc<RwLock<RunningMap>>,
}

impl Scheduler {
    /// Create a scheduler over a job registry, with no entries armed yet.
    pub fn new(registry: Arc<JobRegistry>) -> Self {
        let event_bus = Arc::new(EventBus::new());
        Self {
            registry,
            executor: Arc::new(JobExecutor::new(
                DEFAULT_MAX_CONCURRENT_RUNS,
                Arc::clone(&event_bus),
            )),
            event_bus,
            entries: Vec::new(),
            tick_interval: Duration::from_secs(1),
            shutdown_timeout: Duration::from_secs(30),
            running: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Build a scheduler from a validated configuration file. Entries naming
    /// jobs the registry does not know are skipped with a warning rather
    /// than failing startup.
    pub fn from_config(config: &Config, registry: Arc<JobRegistry>) -> Result<Self, ConfigError> {
        let mut scheduler = Self::new(registry)
            .with_max_concurrent_runs(config.max_concurrent_runs)
            .with_tick_interval(config.tick_interval())
            .with_shutdown_timeout(config.shutdown_timeout());

        for entry in &config.jobs {
            if !entry.enabled {
                tracing::info!(job = %entry.name, "Entry disabled, not arming");
                continue;
            }
            let Some(job) = scheduler.registry.get(&entry.name) else {
                tracing::warn!(job = %entry.name, "Unknown job in configuration, skipping entry");
                continue;
            };
            let schedule = config.schedule_for(entry)?;
            scheduler.entries.push(Entry {
                job_id: JobId::from(entry.name.as_str()),
                job,
                schedule,
                retry: config.retry_for(entry),
                overlap: entry.overlap,
                params: entry.params.clone(),
                next_fire: DateTime::<Utc>::MAX_UTC,
            });
        }
        Ok(scheduler)
    }

    /// Arm a registry job on a schedule with default overlap and retry.
    pub fn schedule_job(
        &mut self,
        name: impl Into<JobId>,
        schedule: Schedule,
    ) -> Result<(), SchedulerError> {
        self.schedule_job_with(name, schedule, OverlapPolicy::Allow, None, HashMap::new())
    }

    /// Arm a registry job with explicit overlap, retry, and parameters.
    pub fn schedule_job_with(
        &mut self,
        name: impl Into<JobId>,
        schedule: Schedule,
        overlap: OverlapPolicy,
        retry: Option<RetryPolicy>,
        params: HashMap<String, serde_yaml::Value>,
    ) -> Result<(), SchedulerError> {
        let job_id = name.into();
        let job = self
            .registry
            .get(job_id.as_str())
            .ok_or_else(|| SchedulerError::JobNotFound(job_id.to_string()))?;
        self.entries.push(Entry {
            job_id,
            job,
            schedule,
            retry,
            overlap,
            params,
            next_fire: DateTime::<Utc>::MAX_UTC,
        });
        Ok(())
    }

    /// Replace the event bus. Rebuilds the executor so attempt events land
    /// on the new bus too.
    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.executor = Arc::new(JobExecutor::new(
            self.executor.max_concurrency(),
            Arc::clone(&event_bus),
        ));
        self.event_bus = event_bus;
        self
    }

    /// Set the cap on simultaneous job runs.
    pub fn with_max_concurrent_runs(mut self, max: usize) -> Self {
        self.executor = Arc::new(JobExecutor::new(max, Arc::clone(&self.event_bus)));
        self
    }

    /// Set the tick interval.
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Set the graceful shutdown timeout.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Get the event bus.
    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// Names of armed entries, in arming order.
    pub fn armed_jobs(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.job_id.as_str()).collect()
    }

    /// Start the scheduler and return a handle for controlling it.
    pub async fn start(self) -> (SchedulerHandle, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_BUFFER);
        let state = Arc::new(RwLock::new(SchedulerState::Running));

        let handle = SchedulerHandle {
            command_tx,
            state: Arc::clone(&state),
        };

        let scheduler_task = tokio::spawn(async move {
            self.run(command_rx, state).await;
        });

        (handle, scheduler_task)
    }

    /// Main scheduler loop.
    async fn run(
        mut self,
        mut command_rx: mpsc::Receiver<SchedulerCommand>,
        state: Arc<RwLock<SchedulerState>>,
    ) {
        self.arm_all(Utc::now()).await;
        self.event_bus.emit(Event::scheduler_started()).await;
        tracing::info!(entries = self.entries.len(), "Scheduler started");

        let mut interval = tokio::time::interval(self.tick_interval);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if *state.read().await == SchedulerState::Running {
                        self.check_due(Utc::now()).await;
                    }

                    // Clean up finished run handles
                    self.cleanup_finished().await;
                }

                Some(command) = command_rx.recv() => {
                    match command {
                        SchedulerCommand::Trigger { job_id, response } => {
                            let result = self.trigger_job(&job_id).await;
                            let _ = response.send(result);
                        }
                        SchedulerCommand::Pause { response } => {
                            let mut s = state.write().await;
                            *s = SchedulerState::Paused;
                            tracing::info!("Scheduler paused");
                            let _ = response.send(());
                        }
                        SchedulerCommand::Resume { response } => {
                            let mut s = state.write().await;
                            *s = SchedulerState::Running;
                            drop(s);
                            // Re-arm from now so fires that landed during the
                            // pause are skipped instead of bursting.
                            self.arm_all(Utc::now()).await;
                            tracing::info!("Scheduler resumed, entries re-armed from now");
                            let _ = response.send(());
                        }
                        SchedulerCommand::Shutdown { response } => {
                            let mut s = state.write().await;
                            *s = SchedulerState::Stopped;
                            drop(s);

                            self.await_running_runs().await;
                            self.event_bus.emit(Event::scheduler_stopped()).await;
                            tracing::info!("Scheduler stopped");

                            let _ = response.send(());
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Compute every entry's next fire strictly after `now`.
    async fn arm_all(&mut self, now: DateTime<Utc>) {
        for entry in &mut self.entries {
            match entry.schedule.next_after(now) {
                Ok(next) => {
                    entry.next_fire = next;
                    self.event_bus
                        .emit(Event::job_armed(entry.job_id.clone(), next))
                        .await;
                }
                Err(e) => {
                    tracing::warn!(job = %entry.job_id, error = %e, "Schedule yields no future occurrence, entry disarmed");
                    entry.next_fire = DateTime::<Utc>::MAX_UTC;
                }
            }
        }
    }

    /// Fire every entry whose next occurrence has passed. Dispatch is
    /// non-blocking, so several due entries all start in the same pass.
    async fn check_due(&mut self, now: DateTime<Utc>) {
        let executor = Arc::clone(&self.executor);
        let event_bus = Arc::clone(&self.event_bus);
        let running = Arc::clone(&self.running);

        for entry in &mut self.entries {
            if entry.next_fire > now {
                continue;
            }

            // A late loop may have stepped over several occurrences. They
            // collapse into this one fire.
            let mut folded = 0usize;
            let mut cursor = entry.next_fire;
            while folded < MAX_MISSED_SCAN {
                match entry.schedule.next_after(cursor) {
                    Ok(next) if next <= now => {
                        folded += 1;
                        cursor = next;
                    }
                    _ => break,
                }
            }
            if folded > 0 {
                tracing::warn!(
                    job = %entry.job_id,
                    missed = folded,
                    "Missed occurrences collapse into a single run"
                );
            }

            let already_running = running
                .read()
                .await
                .values()
                .any(|(job_id, _)| *job_id == entry.job_id);

            if entry.overlap == OverlapPolicy::Skip && already_running {
                tracing::info!(job = %entry.job_id, "Previous run still in flight, skipping fire");
                event_bus
                    .emit(Event::job_skipped(
                        entry.job_id.clone(),
                        "previous run still in flight",
                    ))
                    .await;
            } else {
                let run_id = RunId::new();
                event_bus
                    .emit(Event::job_triggered(entry.job_id.clone(), run_id))
                    .await;
                dispatch_run(
                    &executor,
                    &running,
                    Arc::clone(&entry.job),
                    entry.job_id.clone(),
                    run_id,
                    entry.params.clone(),
                    entry.retry.clone(),
                )
                .await;
            }

            // Re-arm from now regardless of whether the fire dispatched.
            match entry.schedule.next_after(now) {
                Ok(next) => {
                    entry.next_fire = next;
                    event_bus
                        .emit(Event::job_armed(entry.job_id.clone(), next))
                        .await;
                }
                Err(e) => {
                    tracing::warn!(job = %entry.job_id, error = %e, "Schedule exhausted, entry disarmed");
                    entry.next_fire = DateTime::<Utc>::MAX_UTC;
                }
            }
        }
    }

    /// Trigger a registry job now. Uses the entry's parameters and retry
    /// override when one is armed, the job's own defaults otherwise.
    async fn trigger_job(&self, job_id: &JobId) -> Result<RunId, SchedulerError> {
        let job = self
            .registry
            .get(job_id.as_str())
            .ok_or_else(|| SchedulerError::JobNotFound(job_id.to_string()))?;

        let entry = self.entries.iter().find(|e| e.job_id == *job_id);
        let params = entry.map(|e| e.params.clone()).unwrap_or_default();
        let retry = entry.and_then(|e| e.retry.clone());

        let run_id = RunId::new();
        self.event_bus
            .emit(Event::job_triggered(job_id.clone(), run_id))
            .await;
        dispatch_run(
            &self.executor,
            &self.running,
            job,
            job_id.clone(),
            run_id,
            params,
            retry,
        )
        .await;

        Ok(run_id)
    }

    /// Clean up finished run handles.
    async fn cleanup_finished(&self) {
        let mut running = self.running.write().await;
        running.retain(|_, (_, handle)| !handle.is_finished());
    }

    /// Wait for in-flight runs to finish, up to the shutdown timeout.
    async fn await_running_runs(&self) {
        let count = self.running.read().await.len();
        if count == 0 {
            tracing::info!("No in-flight runs to wait for during shutdown");
            return;
        }

        tracing::info!(
            in_flight = count,
            timeout = ?self.shutdown_timeout,
            "Graceful shutdown, waiting for in-flight runs"
        );

        let start = tokio::time::Instant::now();
        let deadline = start + self.shutdown_timeout;

        loop {
            let mut running = self.running.write().await;
            running.retain(|_, (_, handle)| !handle.is_finished());
            let remaining = running.len();
            drop(running);

            if remaining == 0 {
                tracing::info!(elapsed = ?start.elapsed(), "All in-flight runs completed");
                break;
            }

            if tokio::time::Instant::now() >= deadline {
                tracing::warn!(
                    remaining,
                    timeout = ?self.shutdown_timeout,
                    "Shutdown timeout exceeded with runs still in flight"
                );
                break;
            }

            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

/// Spawn one run onto its own task and track its handle. The task removes
/// itself from the running map when the run finishes.
async fn dispatch_run(
    executor: &Arc<JobExecutor>,
    running: &Arc<RwLock<RunningMap>>,
    job: Arc<dyn Job>,
    job_id: JobId,
    run_id: RunId,
    params: HashMap<String, serde_yaml::Value>,
    retry: Option<RetryPolicy>,
) {
    let ctx = JobContext::new(job_id.clone(), run_id, params);
    let executor = Arc::clone(executor);
    let running_map = Arc::clone(running);

    let handle = tokio::spawn(async move {
        let _outcome = match retry {
            Some(policy) => executor.run_with_policy(job, ctx, policy).await,
            None => executor.run_with_retry(job, ctx).await,
        };
        running_map.write().await.remove(&run_id);
    });

    running.write().await.insert(run_id, (job_id, handle));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::job::JobError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

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

    #[async_trait]
    impl Job for CountingJob {
        fn name(&self) -> &str {
            &self.name
        }

        async fn run(&self, _ctx: &JobContext) -> Result<(), JobError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct SleepyJob {
        name: String,
        sleep: Duration,
        started: AtomicUsize,
        finished: AtomicUsize,
    }

    impl SleepyJob {
        fn new(name: &str, sleep: Duration) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                sleep,
                started: AtomicUsize::new(0),
                finished: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Job for SleepyJob {
        fn name(&self) -> &str {
            &self.name
        }

        async fn run(&self, _ctx: &JobContext) -> Result<(), JobError> {
            self.started.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.sleep).await;
            self.finished.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn registry_with(jobs: Vec<Arc<dyn Job>>) -> Arc<JobRegistry> {
        let mut registry = JobRegistry::new();
        for job in jobs {
            registry.register(job);
        }
        Arc::new(registry)
    }

    fn fast(mut scheduler: Scheduler) -> Scheduler {
        scheduler = scheduler.with_tick_interval(Duration::from_millis(50));
        scheduler
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let scheduler = Scheduler::new(registry_with(vec![]));
        let (handle, task) = scheduler.start().await;

        assert!(handle.is_running().await);
        handle.shutdown().await.unwrap();
        assert_eq!(handle.state().await, SchedulerState::Stopped);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_scheduled_entry_fires() {
        let job = CountingJob::new("counter");
        let mut scheduler = Scheduler::new(registry_with(vec![job.clone()]));
        scheduler
            .schedule_job("counter", Schedule::new("@every 1s").unwrap())
            .unwrap();
        let scheduler = fast(scheduler);

        let (handle, task) = scheduler.start().await;
        tokio::time::sleep(Duration::from_millis(2500)).await;
        handle.shutdown().await.unwrap();
        task.await.unwrap();

        assert!(job.runs() >= 1, "expected at least one fire, got {}", job.runs());
    }

    #[tokio::test]
    async fn test_manual_trigger_runs_once() {
        let job = CountingJob::new("counter");
        let scheduler = Scheduler::new(registry_with(vec![job.clone()]));

        let (handle, task) = scheduler.start().await;
        handle.trigger("counter").await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.shutdown().await.unwrap();
        task.await.unwrap();

        assert_eq!(job.runs(), 1);
    }

    #[tokio::test]
    async fn test_trigger_unknown_job_fails() {
        let scheduler = Scheduler::new(registry_with(vec![]));
        let (handle, task) = scheduler.start().await;

        let err = handle.trigger("ghost").await.unwrap_err();
        assert!(matches!(err, SchedulerError::JobNotFound(_)));

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_pause_stops_scheduled_fires() {
        let job = CountingJob::new("counter");
        let mut scheduler = Scheduler::new(registry_with(vec![job.clone()]));
        scheduler
            .schedule_job("counter", Schedule::new("@every 1s").unwrap())
            .unwrap();
        let scheduler = fast(scheduler);

        let (handle, task) = scheduler.start().await;
        handle.pause().await.unwrap();
        assert!(handle.is_paused().await);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(job.runs(), 0);

        handle.resume().await.unwrap();
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert!(job.runs() >= 1);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_manual_trigger_works_while_paused() {
        let job = CountingJob::new("counter");
        let scheduler = Scheduler::new(registry_with(vec![job.clone()]));

        let (handle, task) = scheduler.start().await;
        handle.pause().await.unwrap();
        handle.trigger("counter").await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(job.runs(), 1);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_overlap_skip_holds_to_one_run() {
        let job = SleepyJob::new("slow", Duration::from_secs(10));
        let mut scheduler = Scheduler::new(registry_with(vec![job.clone()]));
        scheduler
            .schedule_job_with(
                "slow",
                Schedule::new("@every 1s").unwrap(),
                OverlapPolicy::Skip,
                None,
                HashMap::new(),
            )
            .unwrap();
        let scheduler = fast(scheduler).with_shutdown_timeout(Duration::from_millis(100));

        let (handle, task) = scheduler.start().await;
        tokio::time::sleep(Duration::from_millis(3500)).await;

        assert_eq!(job.started.load(Ordering::SeqCst), 1);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_slow_job_does_not_block_other_entries() {
        let slow = SleepyJob::new("slow", Duration::from_secs(10));
        let quick = CountingJob::new("quick");
        let mut scheduler =
            Scheduler::new(registry_with(vec![slow.clone() as Arc<dyn Job>, quick.clone()]));
        scheduler
            .schedule_job("slow", Schedule::new("@every 1s").unwrap())
            .unwrap();
        scheduler
            .schedule_job("quick", Schedule::new("@every 1s").unwrap())
            .unwrap();
        let scheduler = fast(scheduler).with_shutdown_timeout(Duration::from_millis(100));

        let (handle, task) = scheduler.start().await;
        tokio::time::sleep(Duration::from_millis(2500)).await;

        assert!(slow.started.load(Ordering::SeqCst) >= 1);
        assert!(quick.runs() >= 1, "quick job starved by slow one");

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_graceful_shutdown_waits_for_in_flight_run() {
        let job = SleepyJob::new("slow", Duration::from_millis(400));
        let scheduler = Scheduler::new(registry_with(vec![job.clone()]))
            .with_shutdown_timeout(Duration::from_secs(5));

        let (handle, task) = scheduler.start().await;
        handle.trigger("slow").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.shutdown().await.unwrap();
        task.await.unwrap();

        assert_eq!(job.finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_from_config_skips_unknown_jobs() {
        let yaml = r#"
jobs:
  - name: counter
    schedule: "@hourly"
  - name: ghost
    schedule: "@daily"
"#;
        let config = Config::parse(yaml).unwrap();
        let registry = registry_with(vec![CountingJob::new("counter")]);
        let scheduler = Scheduler::from_config(&config, registry).unwrap();

        assert_eq!(scheduler.armed_jobs(), vec!["counter"]);
    }

    #[tokio::test]
    async fn test_from_config_honors_disabled_entries() {
        let yaml = r#"
jobs:
  - name: counter
    schedule: "@hourly"
    enabled: false
"#;
        let config = Config::parse(yaml).unwrap();
        let registry = registry_with(vec![CountingJob::new("counter")]);
        let scheduler = Scheduler::from_config(&config, registry).unwrap();

        assert!(scheduler.armed_jobs().is_empty());
    }
}
