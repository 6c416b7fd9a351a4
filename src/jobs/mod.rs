//! Built-in jobs and the name registry.
//!
//! The registry is populated once at startup and read-only afterwards.
//! Configuration entries whose name does not resolve here are skipped with a
//! warning at wiring time; an unknown name is never a runtime crash.

mod alias;
mod reservation;

pub use alias::{AliasCommandsJob, CompletionPolicy};
pub use reservation::{
    last_friday_of_next_month, BotState, Credentials, GuestDetails, HttpReservationSession,
    ReservationJob, ReservationSession, Slot,
};

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::job::Job;

/// Static name-to-capability lookup.
pub struct JobRegistry {
    jobs: HashMap<String, Arc<dyn Job>>,
}

impl JobRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            jobs: HashMap::new(),
        }
    }

    /// Registry holding the built-in job set.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(AliasCommandsJob::new()));
        registry.register(Arc::new(ReservationJob::with_session(Arc::new(
            HttpReservationSession::default(),
        ))));
        registry
    }

    /// Add a job. Intended for startup wiring only; once the registry is
    /// shared it is never mutated.
    pub fn register(&mut self, job: Arc<dyn Job>) {
        self.jobs.insert(job.name().to_string(), job);
    }

    /// Pure lookup by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Job>> {
        self.jobs.get(name).cloned()
    }

    /// Whether a job with this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.jobs.contains_key(name)
    }

    /// Registered job names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.jobs.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered jobs.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
