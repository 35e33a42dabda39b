//! Command runner port
//!
//! Defines how the application layer runs shell commands for tasks and
//! quality gates. The adapter owns the process; the use cases only see the
//! captured result.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors raised when a command could not be run at all.
///
/// A command that ran and exited non-zero is not an error; see
/// [`CommandOutput::exit_code`].
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Failed to spawn `{command}`: {message}")]
    Spawn { command: String, message: String },

    #[error("I/O error while running command: {0}")]
    Io(String),
}

/// What to run and under which constraints.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSpec {
    pub command: String,
    pub working_dir: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
    /// Hard limit; the process is killed when it expires
    pub timeout: Duration,
}

impl CommandSpec {
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            working_dir: None,
            env: BTreeMap::new(),
            timeout,
        }
    }

    pub fn with_working_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.working_dir = dir;
        self
    }

    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }
}

/// Result of a command that was started.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CommandOutput {
    /// `None` when the process was killed (timeout or signal)
    pub exit_code: Option<i32>,
    /// Interleaved stdout and stderr; partial when `timed_out`
    pub output: String,
    pub timed_out: bool,
    pub duration: Duration,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Port for running shell commands.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command to completion or until its timeout expires.
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError>;
}
