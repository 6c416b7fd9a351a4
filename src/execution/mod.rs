//! Execution engine: the retry loop, fallback sequencing, and external
//! command invocation.

mod command;
mod executor;
mod fallback;

pub use command::{CommandOutput, ShellCommand};
pub use executor::{JobExecutor, RunOutcome};
pub use fallback::{try_in_order, FallbackError, FallbackOutcome, Strategy, StrategyError};

/// Render a join error's panic payload for logs and failure reasons.
pub(crate) fn panic_message(err: tokio::task::JoinError) -> String {
    if !err.is_panic() {
        return "task was cancelled".to_string();
    }
    let payload = err.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "opaque panic payload".to_string()
    }
}
