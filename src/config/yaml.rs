//! YAML configuration parsing.
//!
//! Parses the runner configuration file: global settings plus the list of
//! scheduled job entries. Schedules and timezones are validated eagerly so a
//! bad file is rejected at load time, not at the first fire.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::core::retry::RetryPolicy;
use crate::core::schedule::{Schedule, ScheduleError};

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse YAML.
    #[error("YAML parse error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A job entry's schedule did not parse.
    #[error("invalid schedule for job '{job}': {source}")]
    InvalidSchedule {
        job: String,
        #[source]
        source: ScheduleError,
    },
}

/// Runner configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default timezone for schedules without their own.
    pub timezone: Option<String>,
    /// Default retry policy for jobs without their own.
    pub default_retry: Option<RetryConfig>,
    /// Scheduler tick interval in seconds.
    pub tick_interval_secs: u64,
    /// How long a graceful shutdown waits for in-flight runs.
    pub shutdown_timeout_secs: u64,
    /// Maximum job runs in flight at once.
    pub max_concurrent_runs: usize,
    /// Scheduled job entries.
    pub jobs: Vec<JobEntry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timezone: None,
            default_retry: None,
            tick_interval_secs: 1,
            shutdown_timeout_secs: 30,
            max_concurrent_runs: 4,
            jobs: Vec::new(),
        }
    }
}

/// One scheduled job entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEntry {
    /// Registry name of the job to run.
    pub name: String,
    /// When to run it.
    pub schedule: ScheduleConfig,
    /// Retry policy override for this entry.
    pub retry: Option<RetryConfig>,
    /// What to do when a fire lands while a previous run is still going.
    #[serde(default)]
    pub overlap: OverlapPolicy,
    /// Whether the entry is armed.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Parameters passed to the job on each run.
    #[serde(default)]
    pub params: HashMap<String, serde_yaml::Value>,
}

fn default_true() -> bool {
    true
}

/// Overlap handling for a job entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Start the new run alongside the old one.
    #[default]
    Allow,
    /// Skip the fire and wait for the next one.
    Skip,
}

/// Schedule configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScheduleConfig {
    /// Simple cron expression or shortcut string.
    Simple(String),
    /// Detailed schedule with timezone.
    Detailed {
        /// Cron expression or shortcut.
        cron: String,
        /// Timezone for the schedule.
        timezone: Option<String>,
    },
}

impl ScheduleConfig {
    /// Get the cron expression.
    pub fn cron(&self) -> &str {
        match self {
            ScheduleConfig::Simple(s) => s,
            ScheduleConfig::Detailed { cron, .. } => cron,
        }
    }

    /// Get the timezone, if specified.
    pub fn timezone(&self) -> Option<&str> {
        match self {
            ScheduleConfig::Simple(_) => None,
            ScheduleConfig::Detailed { timezone, .. } => timezone.as_deref(),
        }
    }
}

/// Retry policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay between attempts in seconds.
    pub delay_secs: u64,
}

impl RetryConfig {
    /// Convert to an executor policy.
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.max_attempts, Duration::from_secs(self.delay_secs))
    }
}

impl Config {
    /// Load and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate configuration from a YAML string.
    pub fn parse(yaml: &str) -> Result<Config, ConfigError> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "tick_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.max_concurrent_runs == 0 {
            return Err(ConfigError::InvalidConfig(
                "max_concurrent_runs must be at least 1".to_string(),
            ));
        }
        if let Some(tz) = &self.timezone {
            if tz.parse::<chrono_tz::Tz>().is_err() {
                return Err(ConfigError::InvalidConfig(format!(
                    "unknown timezone '{}'",
                    tz
                )));
            }
        }
        if let Some(retry) = &self.default_retry {
            validate_retry(retry, "default_retry")?;
        }

        let mut seen = HashSet::new();
        for entry in &self.jobs {
            if entry.name.is_empty() {
                return Err(ConfigError::InvalidConfig(
                    "job entry with empty name".to_string(),
                ));
            }
            if !seen.insert(entry.name.as_str()) {
                return Err(ConfigError::InvalidConfig(format!(
                    "duplicate job entry '{}'",
                    entry.name
                )));
            }
            if let Some(retry) = &entry.retry {
                validate_retry(retry, &entry.name)?;
            }
            // Parses the schedule, including entry or global timezone.
            self.schedule_for(entry)?;
        }
        Ok(())
    }

    /// Build the schedule for an entry. Timezone precedence is entry, then
    /// global default, then UTC.
    pub fn schedule_for(&self, entry: &JobEntry) -> Result<Schedule, ConfigError> {
        let tz = entry
            .schedule
            .timezone()
            .or(self.timezone.as_deref());
        let result = match tz {
            Some(tz) => Schedule::with_timezone(entry.schedule.cron(), tz),
            None => Schedule::new(entry.schedule.cron()),
        };
        result.map_err(|source| ConfigError::InvalidSchedule {
            job: entry.name.clone(),
            source,
        })
    }

    /// Retry policy override for an entry, falling back to the global
    /// default. `None` means the job's own policy applies.
    pub fn retry_for(&self, entry: &JobEntry) -> Option<RetryPolicy> {
        entry
            .retry
            .as_ref()
            .or(self.default_retry.as_ref())
            .map(RetryConfig::to_policy)
    }

    /// Scheduler tick interval.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    /// Graceful shutdown budget.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

fn validate_retry(retry: &RetryConfig, context: &str) -> Result<(), ConfigError> {
    if retry.max_attempts == 0 {
        return Err(ConfigError::InvalidConfig(format!(
            "{}: max_attempts must be at least 1",
            context
        )));
    }
    Ok(())
}
