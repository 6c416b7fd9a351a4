//! Lifecycle events and event handling.
//!
//! The event bus is the engine's injected log surface: the scheduler and
//! executor emit structured events, and whoever constructs the engine decides
//! where they go (the CLI attaches a handler that renders them through
//! `tracing`). Handlers must tolerate concurrent runs emitting interleaved
//! events.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::core::types::{JobId, RunId};

/// Lifecycle events emitted by the scheduler and the retry executor.
#[derive(Debug, Clone)]
pub enum Event {
    /// The scheduling loop started.
    SchedulerStarted { timestamp: Instant },

    /// The scheduling loop stopped.
    SchedulerStopped { timestamp: Instant },

    /// A job was armed with its next fire time.
    JobArmed {
        job_id: JobId,
        next_fire: DateTime<Utc>,
        timestamp: Instant,
    },

    /// A due job was dispatched for execution.
    JobTriggered {
        job_id: JobId,
        run_id: RunId,
        timestamp: Instant,
    },

    /// A due trigger was dropped without dispatching.
    JobSkipped {
        job_id: JobId,
        reason: String,
        timestamp: Instant,
    },

    /// One attempt of a run began.
    AttemptStarted {
        job_id: JobId,
        run_id: RunId,
        /// 1-indexed attempt number.
        attempt: u32,
        /// Total attempts the policy allows.
        max_attempts: u32,
        timestamp: Instant,
    },

    /// One attempt of a run failed.
    AttemptFailed {
        job_id: JobId,
        run_id: RunId,
        attempt: u32,
        max_attempts: u32,
        error: String,
        timestamp: Instant,
    },

    /// A run reached its terminal outcome.
    JobCompleted {
        job_id: JobId,
        run_id: RunId,
        success: bool,
        attempts: u32,
        duration: Duration,
        /// Reason from the final attempt when the run failed.
        error: Option<String>,
        timestamp: Instant,
    },
}

impl Event {
    /// Get the timestamp of the event.
    pub fn timestamp(&self) -> Instant {
        match self {
            Event::SchedulerStarted { timestamp }
            | Event::SchedulerStopped { timestamp }
            | Event::JobArmed { timestamp, .. }
            | Event::JobTriggered { timestamp, .. }
            | Event::JobSkipped { timestamp, .. }
            | Event::AttemptStarted { timestamp, .. }
            | Event::AttemptFailed { timestamp, .. }
            | Event::JobCompleted { timestamp, .. } => *timestamp,
        }
    }

    /// Create a SchedulerStarted event.
    pub fn scheduler_started() -> Self {
        Event::SchedulerStarted {
            timestamp: Instant::now(),
        }
    }

    /// Create a SchedulerStopped event.
    pub fn scheduler_stopped() -> Self {
        Event::SchedulerStopped {
            timestamp: Instant::now(),
        }
    }

    /// Create a JobArmed event.
    pub fn job_armed(job_id: JobId, next_fire: DateTime<Utc>) -> Self {
        Event::JobArmed {
            job_id,
            next_fire,
            timestamp: Instant::now(),
        }
    }

    /// Create a JobTriggered event.
    pub fn job_triggered(job_id: JobId, run_id: RunId) -> Self {
        Event::JobTriggered {
            job_id,
            run_id,
            timestamp: Instant::now(),
        }
    }

    /// Create a JobSkipped event.
    pub fn job_skipped(job_id: JobId, reason: impl Into<String>) -> Self {
        Event::JobSkipped {
            job_id,
            reason: reason.into(),
            timestamp: Instant::now(),
        }
    }

    /// Create an AttemptStarted event.
    pub fn attempt_started(job_id: JobId, run_id: RunId, attempt: u32, max_attempts: u32) -> Self {
        Event::AttemptStarted {
            job_id,
            run_id,
            attempt,
            max_attempts,
            timestamp: Instant::now(),
        }
    }

    /// Create an AttemptFailed event.
    pub fn attempt_failed(
        job_id: JobId,
        run_id: RunId,
        attempt: u32,
        max_attempts: u32,
        error: impl Into<String>,
    ) -> Self {
        Event::AttemptFailed {
            job_id,
            run_id,
            attempt,
            max_attempts,
            error: error.into(),
            timestamp: Instant::now(),
        }
    }

    /// Create a JobCompleted event.
    pub fn job_completed(
        job_id: JobId,
        run_id: RunId,
        success: bool,
        attempts: u32,
        duration: Duration,
        error: Option<String>,
    ) -> Self {
        Event::JobCompleted {
            job_id,
            run_id,
            success,
            attempts,
            duration,
            error,
            timestamp: Instant::now(),
        }
    }
}

/// Handler for receiving lifecycle events.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle an event.
    async fn handle(&self, event: &Event);
}

/// Event bus for distributing events to registered handlers.
pub struct EventBus {
    handlers: RwLock<Vec<Arc<dyn EventHandler>>>,
}

impl EventBus {
    /// Create a new event bus with no handlers.
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// Register an event handler.
    pub async fn register(&self, handler: Arc<dyn EventHandler>) {
        let mut handlers = self.handlers.write().await;
        handlers.push(handler);
    }

    /// Emit an event to all registered handlers.
    pub async fn emit(&self, event: Event) {
        let handlers = self.handlers.read().await;
        for handler in handlers.iter() {
            handler.handle(&event).await;
        }
    }

    /// Get the number of registered handlers.
    pub async fn handler_count(&self) -> usize {
        self.handlers.read().await.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
