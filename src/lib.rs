pub mod config;
pub mod core;
pub mod events;
pub mod execution;
pub mod jobs;
pub mod scheduler;
pub mod testing;

pub use config::{Config, ConfigError, JobEntry, OverlapPolicy, RetryConfig};
pub use core::job::{Job, JobContext, JobError};
pub use core::retry::RetryPolicy;
pub use core::schedule::{Schedule, ScheduleError};
pub use core::types::{JobId, RunId};
pub use events::{Event, EventBus, EventHandler};
pub use execution::{
    CommandOutput, FallbackError, FallbackOutcome, JobExecutor, RunOutcome, ShellCommand, Strategy,
    StrategyError, try_in_order,
};
pub use jobs::{AliasCommandsJob, CompletionPolicy, JobRegistry, ReservationJob, ReservationSession};
pub use scheduler::{Scheduler, SchedulerError, SchedulerHandle, SchedulerState};
