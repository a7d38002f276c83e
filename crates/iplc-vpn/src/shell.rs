//! Shell Execution
//!
//! Runs external commands and normalizes their result into a
//! [`ProcessOutcome`]. Two modes are supported:
//!
//! - [`ExecMode::Checked`]: a non-zero exit status is an error
//!   ([`ShellError::NonZeroExit`]) carrying the captured output
//! - [`ExecMode::Tolerant`]: a non-zero exit status is a normal outcome

use async_trait::async_trait;
use std::fmt;
use std::process::Stdio;
use tracing::debug;

/// A program and its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    /// Program to execute
    pub program: String,
    /// Arguments, in order
    pub args: Vec<String>,
}

impl CommandLine {
    /// Create a command with no arguments
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Full argument vector, program first
    pub fn argv(&self) -> Vec<&str> {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect()
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.argv().join(" "))
    }
}

/// How a non-zero exit status is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    /// Non-zero exit is an error
    Checked,
    /// Non-zero exit is a normal outcome
    Tolerant,
}

/// Normalized result of running a command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// Did the command succeed (or fail in a tolerated way)?
    pub succeeded: bool,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
}

impl ProcessOutcome {
    /// Create a successful outcome
    pub fn success(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            succeeded: true,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// Create a failed outcome
    pub fn failure(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// Stdout followed by stderr, verbatim
    pub fn output(&self) -> String {
        format!("{}{}", self.stdout, self.stderr)
    }
}

/// Shell errors
#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    #[error("Failed to run {program}: {reason}")]
    Spawn { program: String, reason: String },

    #[error("{program} exited with status {}", exit_label(.status))]
    NonZeroExit {
        program: String,
        status: Option<i32>,
        stdout: String,
        stderr: String,
    },
}

fn exit_label(status: &Option<i32>) -> String {
    status.map(|c| c.to_string()).unwrap_or_else(|| "unknown".to_string())
}

/// Capability to run an external command
#[async_trait]
pub trait Shell: Send + Sync {
    /// Run `cmd` to completion and capture its output
    async fn run(&self, cmd: &CommandLine, mode: ExecMode) -> Result<ProcessOutcome, ShellError>;
}

/// Runs commands on the local system
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemShell;

#[async_trait]
impl Shell for SystemShell {
    async fn run(&self, cmd: &CommandLine, mode: ExecMode) -> Result<ProcessOutcome, ShellError> {
        debug!("Running: {}", cmd);

        let output = tokio::process::Command::new(&cmd.program)
            .args(&cmd.args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ShellError::Spawn {
                program: cmd.program.clone(),
                reason: e.to_string(),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if output.status.success() {
            return Ok(ProcessOutcome::success(stdout, stderr));
        }

        match mode {
            ExecMode::Checked => Err(ShellError::NonZeroExit {
                program: cmd.program.clone(),
                status: output.status.code(),
                stdout,
                stderr,
            }),
            ExecMode::Tolerant => {
                debug!("{} exited with {} (tolerated)", cmd.program, output.status);
                Ok(ProcessOutcome::success(stdout, stderr))
            }
        }
    }
}
