//! Process invocation for the external tools (`pg_dump`, `psql`, `tailscale`, `pgrep`).
//!
//! Everything that shells out goes through [`ProcessRunner`], so tests can
//! substitute a recording fake and assert on the exact argument vectors.

use crate::error::ApiError;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;

/// A single external command: program, arguments, extra environment and time bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub timeout: Duration,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Value following `flag` in the argument list, if any.
    pub fn flag_value(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// stdout followed by stderr, trimmed. Used as diagnostic text.
    pub fn combined(&self) -> String {
        let stdout = self.stdout.trim();
        let stderr = self.stderr.trim();
        match (stdout.is_empty(), stderr.is_empty()) {
            (true, _) => stderr.to_string(),
            (false, true) => stdout.to_string(),
            (false, false) => format!("{}\n{}", stdout, stderr),
        }
    }
}

#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run to completion. A nonzero exit is not an error here; callers inspect
    /// [`CommandOutput::exit_code`]. Errors mean the process could not be run
    /// at all or exceeded its time bound.
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, ApiError>;
}

/// Runs commands on the host with `tokio::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, ApiError> {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args);
        for (k, v) in &invocation.env {
            cmd.env(k, v);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        // Dropping the output future on timeout must not leave the child behind.
        cmd.kill_on_drop(true);

        let start = Instant::now();
        let output = match tokio::time::timeout(invocation.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ApiError::ToolUnavailable(format!(
                    "{} is not installed",
                    invocation.program
                )));
            }
            Ok(Err(e)) => {
                return Err(ApiError::Internal(format!(
                    "Failed to execute {}: {}",
                    invocation.program, e
                )));
            }
            Err(_) => {
                return Err(ApiError::Timeout(format!(
                    "{} timed out after {} seconds",
                    invocation.program,
                    invocation.timeout.as_secs()
                )));
            }
        };

        let exit_code = output.status.code().unwrap_or(-1);
        tracing::debug!(
            program = %invocation.program,
            exit_code,
            duration_ms = start.elapsed().as_millis() as u64,
            "Command finished"
        );

        Ok(CommandOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}
