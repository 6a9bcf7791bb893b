//! Shell runner for met?/meet procedures.
//!
//! Dep definitions carry their probes and meeting steps as shell snippets;
//! this module is the one place that executes them. Caller-supplied dep
//! arguments are bound as environment variables of the child process - they
//! are never interpolated into the script text, so an argument value cannot
//! change what the script does structurally.
//!
//! A script that runs and exits non-zero is a normal outcome (an unmet
//! probe, a failed meet step); only spawn failures and timeouts are errors.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::core::MeetError;

/// Default wall-clock limit for one met?/meet invocation.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Builder for one shell invocation.
#[derive(Debug)]
pub struct ShellCommand {
    script: String,
    env: BTreeMap<String, String>,
    current_dir: Option<std::path::PathBuf>,
    timeout_duration: Option<Duration>,
}

/// Captured result of a shell invocation.
#[derive(Debug)]
pub struct ShellOutput {
    /// Whether the script exited with status 0
    pub success: bool,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
}

impl ShellCommand {
    /// Creates a runner for the given script text.
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            env: BTreeMap::new(),
            current_dir: None,
            timeout_duration: Some(DEFAULT_TIMEOUT),
        }
    }

    /// Binds environment variables for the child process.
    pub fn envs(mut self, vars: &BTreeMap<String, String>) -> Self {
        self.env.extend(vars.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Sets the working directory for the script.
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Overrides the default timeout (None disables it).
    pub const fn with_timeout(mut self, duration: Option<Duration>) -> Self {
        self.timeout_duration = duration;
        self
    }

    /// Runs the script, capturing output.
    ///
    /// Returns [`MeetError::ShellCommandError`] only when the process could
    /// not be run at all or exceeded the timeout; a non-zero exit is reported
    /// through [`ShellOutput::success`].
    pub async fn execute(self) -> Result<ShellOutput> {
        let (program, flag) = shell_program();
        let mut cmd = Command::new(program);
        cmd.arg(flag).arg(&self.script);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        if let Some(ref dir) = self.current_dir {
            cmd.current_dir(dir);
        }

        tracing::debug!(target: "shell", "Executing: {}", self.script);

        let output_future = cmd.output();
        let output = if let Some(duration) = self.timeout_duration {
            match timeout(duration, output_future).await {
                Ok(result) => result.context("Failed to spawn shell")?,
                Err(_) => {
                    return Err(MeetError::ShellCommandError {
                        reason: format!(
                            "timed out after {} seconds: {}",
                            duration.as_secs(),
                            self.script
                        ),
                    }
                    .into());
                }
            }
        } else {
            output_future.await.context("Failed to spawn shell")?
        };

        let result = ShellOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };
        tracing::debug!(
            target: "shell",
            "Exited {} ({})",
            output.status.code().map_or_else(|| "signal".to_string(), |c| c.to_string()),
            if result.success { "ok" } else { "failed" }
        );
        Ok(result)
    }
}

/// The system shell and its command flag.
fn shell_program() -> (&'static str, &'static str) {
    if cfg!(windows) {
        ("cmd", "/C")
    } else {
        ("sh", "-c")
    }
}
