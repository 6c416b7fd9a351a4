//! Retry policy for job execution.
//!
//! Bounded attempts with a fixed delay between failures.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default number of total attempts for a scheduled job.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default delay between failed attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(30);

/// How a failing job invocation is retried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one. `max_attempts = 3`
    /// means at most 3 invocations separated by 2 delays. Never less than 1.
    pub max_attempts: u32,

    /// Fixed delay inserted between failed attempts.
    #[serde(with = "serde_duration")]
    pub delay: Duration,
}

impl RetryPolicy {
    /// A policy that runs the job exactly once.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
        }
    }

    /// Fixed-delay policy with the given total attempt budget.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Whether another attempt is allowed after `attempts_made` have failed.
    pub fn should_retry(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY)
    }
}

/// Serde helper: delays are written as integer seconds in config files.
mod serde_duration {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
