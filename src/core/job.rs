//! The job capability boundary.
//!
//! A [`Job`] is a named, independently schedulable unit of work. The engine
//! treats it as opaque: invoke `run`, get success or a failure reason back.
//! Jobs enforce their own internal timeouts and must tolerate being invoked
//! again after a failed attempt.

use async_trait::async_trait;
use serde_yaml::Value;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

use super::retry::RetryPolicy;
use super::types::{JobId, RunId};

/// Failure of a single job attempt.
#[derive(Debug, Error)]
pub enum JobError {
    /// The job reported a failure.
    #[error("{0}")]
    Failed(String),

    /// A bounded step did not finish in time.
    #[error("step '{step}' timed out after {timeout:?}")]
    Timeout {
        /// Which step of the job hit its bound.
        step: String,
        /// The configured bound.
        timeout: Duration,
    },

    /// An external command exited unsuccessfully.
    #[error("command '{command}' failed (exit code {code:?})")]
    CommandFailed {
        command: String,
        code: Option<i32>,
    },

    /// A required environment variable is not set.
    #[error("missing environment variable: {0}")]
    MissingEnv(String),

    /// A remote session step failed.
    #[error("session error: {0}")]
    Session(String),

    /// The attempt panicked; captured rather than propagated.
    #[error("job panicked: {0}")]
    Panicked(String),

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-run information and pass-through parameters handed to a job.
#[derive(Debug, Clone)]
pub struct JobContext {
    job_id: JobId,
    run_id: RunId,
    params: HashMap<String, Value>,
}

impl JobContext {
    /// Create a context for one run of a job.
    pub fn new(job_id: JobId, run_id: RunId, params: HashMap<String, Value>) -> Self {
        Self {
            job_id,
            run_id,
            params,
        }
    }

    /// Context with no parameters, for manual triggers and tests.
    pub fn empty(job_id: impl Into<JobId>) -> Self {
        Self::new(job_id.into(), RunId::new(), HashMap::new())
    }

    /// The job this run belongs to.
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// The identifier of this run.
    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Raw parameter value, if present.
    pub fn raw_param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    /// Typed parameter lookup. Returns `None` when the key is absent or the
    /// value does not deserialize to `T`.
    pub fn param<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.params
            .get(key)
            .and_then(|v| serde_yaml::from_value(v.clone()).ok())
    }
}

/// An executable unit of scheduled work.
#[async_trait]
pub trait Job: Send + Sync {
    /// Registry name of the job.
    fn name(&self) -> &str;

    /// Execute one attempt.
    async fn run(&self, ctx: &JobContext) -> Result<(), JobError>;

    /// Retry policy applied around `run`. Config may override per entry.
    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
    }

    /// Optional human-readable description for listings.
    fn description(&self) -> Option<&str> {
        None
    }
}
