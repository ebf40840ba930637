// src/auth/runner.rs
use crate::error::KubeError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// One external command run: program, arguments and extra environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandInvocation {
    pub program: String,
    pub args: Vec<String>,
    /// Added on top of the inherited process environment.
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    NotFound,
    TimedOut,
    Io(String),
}

impl CommandError {
    /// Maps a launch failure to `ExecPluginFailure`, appending `install_hint`
    /// when the executable could not be found.
    pub fn into_kube_error(self, program: &str, install_hint: Option<&str>) -> KubeError {
        let (stderr, timed_out) = match self {
            CommandError::NotFound => {
                let mut message = format!("executable '{}' was not found", program);
                if let Some(hint) = install_hint {
                    message.push('\n');
                    message.push_str(hint.trim());
                }
                (message, false)
            }
            CommandError::TimedOut => (String::new(), true),
            CommandError::Io(reason) => (reason, false),
        };
        KubeError::ExecPluginFailure {
            command: program.to_string(),
            exit_code: None,
            stderr,
            timed_out,
        }
    }
}

impl From<io::Error> for CommandError {
    fn from(error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => CommandError::NotFound,
            _ => CommandError::Io(error.to_string()),
        }
    }
}

/// Launches credential helper processes. Swappable so callers control how
/// (and whether) OS processes are spawned.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, invocation: &CommandInvocation) -> Result<CommandOutput, CommandError>;
}

/// Runs commands with tokio, killing any child that outlives `timeout`.
#[derive(Debug, Clone)]
pub struct TokioCommandRunner {
    timeout: Duration,
}

impl TokioCommandRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, invocation: &CommandInvocation) -> Result<CommandOutput, CommandError> {
        let child = Command::new(&invocation.program)
            .args(&invocation.args)
            .envs(&invocation.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| CommandError::TimedOut)??;

        Ok(CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}
