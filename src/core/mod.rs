//! Core types: identifiers, schedules, retry policies, and the job
//! capability boundary.

pub mod job;
pub mod retry;
pub mod schedule;
pub mod types;
