//! External command execution.
//!
//! [`ShellCommand`] runs a program with captured output and a hard timeout.
//! The alias-command job builds its fallback strategies on top of this; it is
//! also usable directly for ad-hoc command jobs.
//!
//! When the timeout elapses the subprocess future is dropped, which terminates
//! the child. Commands needing graceful cleanup should handle signals
//! themselves or use shorter timeouts with a retry policy above.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::core::job::JobError;

/// Captured result of a finished command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Decoded stdout (lossy UTF-8).
    pub stdout: String,
    /// Decoded stderr (lossy UTF-8).
    pub stderr: String,
    /// Process exit code, if the process exited normally.
    pub code: Option<i32>,
}

/// A single external command invocation with bounded runtime.
#[derive(Debug, Clone)]
pub struct ShellCommand {
    program: String,
    args: Vec<String>,
    env: Vec<(String, String)>,
    working_dir: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl ShellCommand {
    /// Start building a command for the given program.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            working_dir: None,
            timeout: None,
        }
    }

    /// Convenience constructor for `bash -c <script>`.
    pub fn bash(script: impl Into<String>) -> Self {
        Self::new("bash").arg("-c").arg(script)
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add an environment variable for the child process.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Set the working directory.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Bound the command's runtime.
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// The program this command runs.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Run to completion, capturing output.
    ///
    /// A non-zero exit status is a [`JobError::CommandFailed`]; hitting the
    /// timeout is a [`JobError::Timeout`] attributed to the program name.
    pub async fn run(&self) -> Result<CommandOutput, JobError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        if let Some(ref dir) = self.working_dir {
            cmd.current_dir(dir);
        }
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let output = match self.timeout {
            Some(limit) => timeout(limit, cmd.output())
                .await
                .map_err(|_| JobError::Timeout {
                    step: self.program.clone(),
                    timeout: limit,
                })??,
            None => cmd.output().await?,
        };

        let result = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            code: output.status.code(),
        };

        if output.status.success() {
            Ok(result)
        } else {
            Err(JobError::CommandFailed {
                command: self.render(),
                code: result.code,
            })
        }
    }

    /// Human-readable rendering for logs and errors.
    pub fn render(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}
