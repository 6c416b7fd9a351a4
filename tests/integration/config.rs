//! Configuration loading and wiring integration tests.

use relance::{Config, ConfigError, JobRegistry, OverlapPolicy, Scheduler};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;

fn write_config(yaml: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn test_load_and_wire_builtin_jobs() {
    let file = write_config(
        r#"
timezone: America/Los_Angeles
tick_interval_secs: 1
max_concurrent_runs: 2
jobs:
  - name: alias_commands
    schedule: "0 9 * * *"
    overlap: skip
  - name: reservation
    schedule:
      cron: "0 9 1 * *"
      timezone: America/New_York
    retry:
      max_attempts: 3
      delay_secs: 30
"#,
    );

    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.jobs[0].overlap, OverlapPolicy::Skip);

    let registry = Arc::new(JobRegistry::builtin());
    let scheduler = Scheduler::from_config(&config, registry).unwrap();
    assert_eq!(scheduler.armed_jobs(), vec!["alias_commands", "reservation"]);
}

#[tokio::test]
async fn test_entry_retry_override_is_applied() {
    let file = write_config(
        r#"
jobs:
  - name: alias_commands
    schedule: "@daily"
    retry:
      max_attempts: 7
      delay_secs: 2
"#,
    );

    let config = Config::load(file.path()).unwrap();
    let retry = config.retry_for(&config.jobs[0]).unwrap();
    assert_eq!(retry.max_attempts, 7);
    assert_eq!(retry.delay, Duration::from_secs(2));
}

#[tokio::test]
async fn test_bad_cron_is_rejected_with_the_job_named() {
    let file = write_config(
        r#"
jobs:
  - name: broken
    schedule: "99 99 * * *"
"#,
    );

    let err = Config::load(file.path()).unwrap_err();
    match err {
        ConfigError::InvalidSchedule { job, .. } => assert_eq!(job, "broken"),
        other => panic!("expected InvalidSchedule, got {}", other),
    }
}

#[tokio::test]
async fn test_malformed_yaml_is_rejected() {
    let file = write_config("jobs: [not, {valid: ");
    assert!(matches!(
        Config::load(file.path()).unwrap_err(),
        ConfigError::YamlError(_)
    ));
}

#[tokio::test]
async fn test_unknown_entry_does_not_stop_startup() {
    let file = write_config(
        r#"
jobs:
  - name: no_such_job
    schedule: "@daily"
  - name: alias_commands
    schedule: "@daily"
"#,
    );

    let config = Config::load(file.path()).unwrap();
    let scheduler = Scheduler::from_config(&config, Arc::new(JobRegistry::builtin())).unwrap();
    assert_eq!(scheduler.armed_jobs(), vec!["alias_commands"]);
}
