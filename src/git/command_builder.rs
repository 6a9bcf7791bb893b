//! Type-safe git command builder for consistent command execution
//!
//! A fluent API for building and executing git commands, ensuring consistent
//! error handling, timeouts, and logging across the source-management layer.

use anyhow::{Context, Result};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::core::MeetError;
use crate::git::git_program;

/// Builder for constructing and executing git commands.
///
/// Commands are created with a 5-minute default timeout and captured output.
/// A working directory set with [`current_dir`](Self::current_dir) is passed
/// via `git -C`, making the invocation independent of the process's own
/// working directory.
pub struct GitCommand {
    /// Arguments to pass to git (e.g. ["clone", url, path])
    args: Vec<String>,

    /// Working directory, passed as `git -C <dir>`
    current_dir: Option<std::path::PathBuf>,

    /// Maximum duration to wait for completion (None = no timeout)
    timeout_duration: Option<Duration>,

    /// For clone commands, the URL for better error messages
    clone_url: Option<String>,
}

impl Default for GitCommand {
    fn default() -> Self {
        Self {
            args: Vec::new(),
            current_dir: None,
            timeout_duration: Some(Duration::from_secs(300)),
            clone_url: None,
        }
    }
}

impl GitCommand {
    /// Creates a new git command builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the working directory for command execution.
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Adds multiple arguments to the command.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set a custom timeout for the command (None for no timeout).
    pub const fn with_timeout(mut self, duration: Option<Duration>) -> Self {
        self.timeout_duration = duration;
        self
    }

    /// Execute the command and return its captured output.
    ///
    /// A non-zero exit status is mapped to [`MeetError::GitCloneFailed`] for
    /// clone invocations and [`MeetError::GitCommandError`] otherwise.
    pub async fn execute(self) -> Result<GitCommandOutput> {
        let program = git_program()?;
        let mut cmd = Command::new(&program);

        let mut full_args = Vec::new();
        if let Some(ref dir) = self.current_dir {
            full_args.push("-C".to_string());
            full_args.push(dir.display().to_string());
        }
        full_args.extend(self.args.clone());
        cmd.args(&full_args);

        tracing::debug!(target: "git", "Executing command: git {}", full_args.join(" "));

        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.stdin(Stdio::null());

        let output_future = cmd.output();
        let output = if let Some(duration) = self.timeout_duration {
            match timeout(duration, output_future).await {
                Ok(result) => {
                    result.context(format!("Failed to execute git {}", full_args.join(" ")))?
                }
                Err(_) => {
                    tracing::warn!(
                        target: "git",
                        "Command timed out after {}s: git {}",
                        duration.as_secs(),
                        full_args.join(" ")
                    );
                    return Err(MeetError::GitCommandError {
                        operation: self.operation_name(&full_args),
                        stderr: format!(
                            "git command timed out after {} seconds",
                            duration.as_secs()
                        ),
                    }
                    .into());
                }
            }
        } else {
            output_future.await.context(format!("Failed to execute git {}", full_args.join(" ")))?
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            tracing::debug!(
                target: "git",
                "Command failed with exit code {:?}: {}",
                output.status.code(),
                stderr.trim()
            );

            let operation = self.operation_name(&full_args);
            let error = if operation == "clone" {
                MeetError::GitCloneFailed {
                    url: self.clone_url.unwrap_or_else(|| "unknown".to_string()),
                    reason: stderr.trim().to_string(),
                }
            } else {
                MeetError::GitCommandError {
                    operation,
                    stderr: stderr.clone(),
                }
            };
            return Err(error.into());
        }

        if !stdout.is_empty() {
            tracing::trace!(target: "git", "{}", stdout.trim());
        }

        Ok(GitCommandOutput {
            stdout,
            stderr,
        })
    }

    /// Execute the command and return only stdout as a trimmed string.
    pub async fn execute_stdout(self) -> Result<String> {
        let output = self.execute().await?;
        Ok(output.stdout.trim().to_string())
    }

    /// Execute the command and check for success, discarding output.
    pub async fn execute_success(self) -> Result<()> {
        self.execute().await?;
        Ok(())
    }

    // First effective argument, skipping a leading -C <dir> pair.
    fn operation_name(&self, full_args: &[String]) -> String {
        let start = if full_args.first().map(String::as_str) == Some("-C") && full_args.len() > 2 {
            2
        } else {
            0
        };
        full_args.get(start).cloned().unwrap_or_else(|| "unknown".to_string())
    }
}

/// Output from a git command.
pub struct GitCommandOutput {
    /// Standard output from the git command
    pub stdout: String,
    /// Standard error output from the git command
    pub stderr: String,
}

// Convenience builders for the operations the source layer needs.
impl GitCommand {
    /// Create a clone command.
    pub fn clone(url: &str, target: impl AsRef<Path>) -> Self {
        let mut cmd = Self::new().args([
            "clone",
            url,
            &target.as_ref().display().to_string(),
        ]);
        cmd.clone_url = Some(url.to_string());
        cmd
    }

    /// Create a fast-forward-only pull command.
    ///
    /// Dep definitions are read from the checked-out working tree, so a sync
    /// has to advance the checkout, not just the remote-tracking refs.
    pub fn pull() -> Self {
        Self::new().args(["pull", "--ff-only"])
    }

    /// Create a porcelain status command.
    ///
    /// Output is one line per modified tracked file or untracked file; an
    /// empty output means the working tree is clean.
    pub fn status_porcelain() -> Self {
        Self::new().args(["status", "--porcelain"])
    }

}
