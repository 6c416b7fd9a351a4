//! The alias-command sequence job.
//!
//! Runs a fixed, ordered list of shell aliases. Aliases only exist once a
//! shell profile has been sourced, so each command is attempted through a
//! fallback chain: one strategy per profile file present on disk
//! (`source <profile> && <command>`), then a bare execution as the final
//! resort. A command whose whole chain fails is logged and the job moves on
//! to the next command.
//!
//! Completion is governed by an explicit [`CompletionPolicy`]. The default is
//! `BestEffort`: the run reports success once the list is exhausted, whatever
//! the per-command outcomes were.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::core::job::{Job, JobContext, JobError};
use crate::core::retry::RetryPolicy;
use crate::execution::{try_in_order, ShellCommand, Strategy, StrategyError};

/// Aliases the job runs, in order. Repeats are deliberate.
const DEFAULT_COMMANDS: [&str; 6] = [
    "runclwest",
    "rundajob",
    "runsajob",
    "runcleast",
    "rundajob",
    "runsajob",
];

/// Candidate profile files, tried in this order.
const SHELL_PROFILES: [&str; 4] = [".zshrc", ".bash_profile", ".bashrc", ".profile"];

/// Bound on a single command invocation.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(300);

/// What the job reports once the command list is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionPolicy {
    /// Per-command failures are logged, never surfaced; the run succeeds.
    BestEffort,
    /// The run fails if any command's fallback chain failed.
    AllMustSucceed,
}

/// Sources a shell profile before running the command.
struct SourcedStrategy {
    label: String,
    profile: PathBuf,
    command: String,
    timeout: Duration,
}

#[async_trait]
impl Strategy for SourcedStrategy {
    fn label(&self) -> &str {
        &self.label
    }

    async fn attempt(&self) -> Result<(), StrategyError> {
        let script = format!(
            "source {} 2>/dev/null && {}",
            self.profile.display(),
            self.command
        );
        ShellCommand::bash(script)
            .timeout(self.timeout)
            .run()
            .await?;
        Ok(())
    }
}

/// Final resort: run the command without sourcing anything.
struct DirectStrategy {
    command: String,
    timeout: Duration,
}

#[async_trait]
impl Strategy for DirectStrategy {
    fn label(&self) -> &str {
        "direct"
    }

    async fn attempt(&self) -> Result<(), StrategyError> {
        ShellCommand::bash(&self.command)
            .timeout(self.timeout)
            .run()
            .await?;
        Ok(())
    }
}

/// The alias-command sequence job.
pub struct AliasCommandsJob {
    commands: Vec<String>,
    profiles: Vec<PathBuf>,
    command_timeout: Duration,
    completion: CompletionPolicy,
}

impl AliasCommandsJob {
    /// Job with the default command list, the user's home profiles, and
    /// best-effort completion.
    pub fn new() -> Self {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/".to_string());
        let profiles = SHELL_PROFILES
            .iter()
            .map(|p| PathBuf::from(&home).join(p))
            .collect();
        Self {
            commands: DEFAULT_COMMANDS.iter().map(|s| s.to_string()).collect(),
            profiles,
            command_timeout: COMMAND_TIMEOUT,
            completion: CompletionPolicy::BestEffort,
        }
    }

    /// Replace the command list.
    pub fn with_commands<I, S>(mut self, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.commands = commands.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the candidate profile files.
    pub fn with_profiles<I, P>(mut self, profiles: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.profiles = profiles.into_iter().map(Into::into).collect();
        self
    }

    /// Change the per-command timeout.
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Change the completion policy.
    pub fn with_completion(mut self, policy: CompletionPolicy) -> Self {
        self.completion = policy;
        self
    }

    /// Build the fallback chain for one command: every profile present on
    /// disk, then bare execution.
    fn strategies_for(&self, command: &str) -> Vec<Arc<dyn Strategy>> {
        let mut strategies: Vec<Arc<dyn Strategy>> = Vec::new();
        for profile in &self.profiles {
            if !profile.exists() {
                continue;
            }
            strategies.push(Arc::new(SourcedStrategy {
                label: format!("source {}", profile.display()),
                profile: profile.clone(),
                command: command.to_string(),
                timeout: self.command_timeout,
            }));
        }
        strategies.push(Arc::new(DirectStrategy {
            command: command.to_string(),
            timeout: self.command_timeout,
        }));
        strategies
    }
}

impl Default for AliasCommandsJob {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Job for AliasCommandsJob {
    fn name(&self) -> &str {
        "alias_commands"
    }

    fn description(&self) -> Option<&str> {
        Some("run the alias command list through shell-profile fallback")
    }

    fn retry_policy(&self) -> RetryPolicy {
        // The job is best-effort internally; retrying the whole list would
        // re-run commands that already succeeded.
        RetryPolicy::none()
    }

    async fn run(&self, ctx: &JobContext) -> Result<(), JobError> {
        let commands: Vec<String> = ctx
            .param("commands")
            .unwrap_or_else(|| self.commands.clone());

        let mut failed = 0usize;
        for command in &commands {
            let strategies = self.strategies_for(command);
            match try_in_order(&strategies).await {
                Ok(outcome) => {
                    info!(
                        command = %command,
                        strategy = %outcome.winner,
                        "Command succeeded"
                    );
                }
                Err(e) => {
                    failed += 1;
                    warn!(command = %command, error = %e, "Command failed, continuing");
                }
            }
        }

        match self.completion {
            CompletionPolicy::BestEffort => Ok(()),
            CompletionPolicy::AllMustSucceed if failed == 0 => Ok(()),
            CompletionPolicy::AllMustSucceed => Err(JobError::Failed(format!(
                "{} of {} commands failed",
                failed,
                commands.len()
            ))),
        }
    }
}
