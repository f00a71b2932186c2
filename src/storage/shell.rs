//! Privileged command interface used by the appliance data store.
//!
//! The appliance store never talks to the appliance directly. It hands
//! configuration commands to a [`PrivilegedShell`] and parses the text that
//! comes back. [`LocalShell`] runs them through a local program (by default
//! `tmsh`); tests substitute a scripted shell.

use anyhow::{Context, Result};
use futures::future::BoxFuture;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

use crate::constants::SHELL_COMMAND_TIMEOUT;
use crate::core::DeclkitError;

/// Something that can run one configuration command and return its output.
pub trait PrivilegedShell: Send + Sync {
    /// Run `command` and return its standard output.
    ///
    /// # Errors
    ///
    /// [`DeclkitError::ShellCommandFailed`] when the command reports failure.
    fn run<'a>(&'a self, command: &'a str) -> BoxFuture<'a, Result<String>>;
}

/// Runs commands through a local program, writing each command to its stdin.
///
/// Commands go through stdin rather than argv because a full collection
/// replacement can exceed the per-argument length limit.
///
/// ```rust,no_run
/// use declkit::storage::{LocalShell, PrivilegedShell};
///
/// # async fn example() -> anyhow::Result<()> {
/// let shell = LocalShell::new("tmsh");
/// let listing = shell.run("list ltm data-group internal /declkit/dataStore").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct LocalShell {
    program: String,
    args: Vec<String>,
    timeout_duration: Duration,
}

impl Default for LocalShell {
    fn default() -> Self {
        Self::new("tmsh")
    }
}

impl LocalShell {
    /// Shell running `program` with no extra arguments and the default timeout.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout_duration: SHELL_COMMAND_TIMEOUT,
        }
    }

    /// Add arguments passed to the program on every invocation.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the per-command timeout.
    #[must_use]
    pub const fn timeout(mut self, duration: Duration) -> Self {
        self.timeout_duration = duration;
        self
    }

    /// The program commands are run through.
    pub fn program(&self) -> &str {
        &self.program
    }

    async fn execute(&self, command: &str) -> Result<String> {
        tracing::debug!(target: "store", "Executing command: {} <<< {}", self.program, summarize(command));

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start '{}'", self.program))?;

        if let Some(mut stdin) = child.stdin.take() {
            let sent = async {
                stdin.write_all(command.as_bytes()).await?;
                stdin.write_all(b"\n").await?;
                stdin.shutdown().await
            }
            .await;
            match sent {
                Ok(()) => {}
                // The exit status below is what decides success.
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                    tracing::trace!(target: "store", "'{}' closed stdin early", self.program);
                }
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("Failed to send command to '{}'", self.program));
                }
            }
        }

        let Ok(output) = timeout(self.timeout_duration, child.wait_with_output()).await else {
            tracing::warn!(
                target: "store",
                "Command timed out after {} seconds: {}",
                self.timeout_duration.as_secs(),
                summarize(command)
            );
            return Err(DeclkitError::ShellCommandFailed {
                command: summarize(command),
                stderr: format!("timed out after {} seconds", self.timeout_duration.as_secs()),
            }
            .into());
        };
        let output = output.with_context(|| format!("Failed to run '{}'", self.program))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::debug!(target: "store", "Command failed with exit code: {:?}", output.status.code());
            let stderr = if stderr.trim().is_empty() {
                stdout
            } else {
                stderr.into_owned()
            };
            return Err(DeclkitError::ShellCommandFailed {
                command: summarize(command),
                stderr,
            }
            .into());
        }

        Ok(stdout)
    }
}

impl PrivilegedShell for LocalShell {
    fn run<'a>(&'a self, command: &'a str) -> BoxFuture<'a, Result<String>> {
        Box::pin(self.execute(command))
    }
}

/// First line of a command, shortened for logs and error messages.
pub(crate) fn summarize(command: &str) -> String {
    const LIMIT: usize = 120;
    let line = command.lines().next().unwrap_or_default();
    if line.len() <= LIMIT {
        return line.to_string();
    }
    let mut end = LIMIT;
    while !line.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &line[..end])
}
