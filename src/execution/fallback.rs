//! Ordered fallback execution.
//!
//! A [`Strategy`] is one of several alternative ways to accomplish the same
//! step. [`try_in_order`] walks strategies in declared order and stops at the
//! first success. A strategy that fails, or panics, is isolated and the next
//! one is tried; when every strategy has failed, the overall failure carries
//! the last strategy's reason. Strategies are never retried here; retry
//! belongs to the policy wrapping the whole job.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use super::panic_message;
use crate::core::job::JobError;

/// Failure of a single strategy.
#[derive(Debug, Clone, Error)]
#[error("{reason}")]
pub struct StrategyError {
    /// Why this strategy failed.
    pub reason: String,
}

impl StrategyError {
    /// Create a failure with the given reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl From<JobError> for StrategyError {
    fn from(err: JobError) -> Self {
        Self::new(err.to_string())
    }
}

/// One alternative way of performing a step.
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Identifies the strategy in logs and outcome attribution.
    fn label(&self) -> &str;

    /// Make one try. Never called twice in the same sequencer pass.
    async fn attempt(&self) -> Result<(), StrategyError>;
}

/// Successful result of a fallback pass.
#[derive(Debug, Clone)]
pub struct FallbackOutcome {
    /// Label of the strategy that succeeded.
    pub winner: String,
    /// How many strategies were invoked, including the winner.
    pub strategies_tried: usize,
}

/// All strategies of a pass failed.
#[derive(Debug, Error)]
pub enum FallbackError {
    /// The strategy list was empty.
    #[error("no strategies to try")]
    Empty,

    /// Every strategy failed; the reason is the last one's.
    #[error("all {tried} strategies failed, last ({label}): {last}")]
    AllFailed {
        tried: usize,
        label: String,
        last: StrategyError,
    },
}

/// Try each strategy in order until one succeeds.
///
/// Each strategy runs in its own task so a panic inside one is captured as
/// that strategy's failure rather than tearing down the caller.
pub async fn try_in_order(
    strategies: &[Arc<dyn Strategy>],
) -> Result<FallbackOutcome, FallbackError> {
    let mut last: Option<(String, StrategyError)> = None;

    for (index, strategy) in strategies.iter().enumerate() {
        let label = strategy.label().to_string();
        debug!(strategy = %label, position = index + 1, "Trying strategy");

        let task = Arc::clone(strategy);
        let joined = tokio::spawn(async move { task.attempt().await }).await;

        let failure = match joined {
            Ok(Ok(())) => {
                debug!(strategy = %label, "Strategy succeeded");
                return Ok(FallbackOutcome {
                    winner: label,
                    strategies_tried: index + 1,
                });
            }
            Ok(Err(e)) => e,
            Err(join_err) => StrategyError::new(format!(
                "strategy panicked: {}",
                panic_message(join_err)
            )),
        };

        warn!(strategy = %label, error = %failure, "Strategy failed, falling through");
        last = Some((label, failure));
    }

    match last {
        Some((label, failure)) => Err(FallbackError::AllFailed {
            tried: strategies.len(),
            label,
            last: failure,
        }),
        None => Err(FallbackError::Empty),
    }
}
