//! Configuration loading and parsing.
//!
//! YAML-based configuration for the runner: global defaults plus the
//! scheduled job entries.

mod yaml;

pub use yaml::{Config, ConfigError, JobEntry, OverlapPolicy, RetryConfig, ScheduleConfig};
