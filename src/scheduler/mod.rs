//! Time-driven scheduling loop.
//!
//! Arms configured job entries, fires them when their schedules come due,
//! and exposes a command handle for manual triggers, pause, resume, and
//! graceful shutdown.

mod engine;

pub use engine::{Scheduler, SchedulerError, SchedulerHandle, SchedulerState};
