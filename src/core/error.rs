//! Error handling for meet
//!
//! The error system follows two principles:
//! 1. **Strongly-typed errors** for the failure modes callers branch on
//! 2. **User-facing messages** that state the refusal and its reason, never a
//!    silent no-op
//!
//! Most functions return `anyhow::Result` and attach context with
//! `.context(...)`; the variants below are the distinguished cases. Per-dep
//! failures are isolated (logged and reported); only [`MeetError::SourceLoad`]
//! escapes to the top of a run, where it aborts the batch.

use thiserror::Error;

/// The main error type for meet operations.
///
/// Each variant represents a specific failure mode with the context needed to
/// report it. Source-mutation failures ([`SourceExists`], [`SourceUnreadable`],
/// [`SourceHasLocalChanges`]) always leave the manifest and the clones
/// unchanged.
///
/// [`SourceExists`]: MeetError::SourceExists
/// [`SourceUnreadable`]: MeetError::SourceUnreadable
/// [`SourceHasLocalChanges`]: MeetError::SourceHasLocalChanges
#[derive(Error, Debug)]
pub enum MeetError {
    /// A `process` call was made while one is already active on this task.
    ///
    /// Exclusivity is logical, per task instance - not an OS-level lock. The
    /// error is fatal to the new call only; the in-flight run is unaffected.
    #[error("A task is already running.")]
    TaskRunning,

    /// A dep source failed to load or parse.
    ///
    /// Caught at the top of `Task::process`: the run is logged as failed but
    /// the process does not crash. One broken source aborts the whole batch.
    // The field cannot be called `source`: thiserror reserves that name for
    // the underlying cause.
    #[error("Failed to load source '{source_name}' from {path}: {reason}")]
    SourceLoad {
        /// Name of the source that failed to load
        source_name: String,
        /// Path of the offending file or directory
        path: String,
        /// Why loading failed (parse error, unreadable clone, ...)
        reason: String,
    },

    /// `sources add` target name is already registered.
    #[error("Source '{name}' is already registered")]
    SourceExists {
        /// The conflicting source name
        name: String,
    },

    /// A named source is not in the manifest.
    #[error("Source '{name}' is not registered")]
    SourceNotFound {
        /// The unknown source name
        name: String,
    },

    /// `sources add` target could not be cloned.
    ///
    /// The manifest is unchanged and any partial clone has been removed.
    #[error("Cannot read source at {uri}: {reason}")]
    SourceUnreadable {
        /// The remote URI that could not be cloned
        uri: String,
        /// The underlying git failure
        reason: String,
    },

    /// `sources remove` target has uncommitted or untracked changes.
    ///
    /// This is a hard safety gate: the clone and the manifest entry are left
    /// exactly as they were. `sources clear` bypasses it.
    #[error("Source '{name}' has local changes or untracked files - not removing")]
    SourceHasLocalChanges {
        /// The source that was refused removal
        name: String,
    },

    /// The manifest and the filesystem disagree about a source.
    ///
    /// Every registered source must have a valid clone at its path. This is a
    /// consistency error to surface, not a state to silently heal.
    #[error("Source store is inconsistent: {reason}")]
    StoreInconsistent {
        /// Description of the mismatch
        reason: String,
    },

    /// Git operation failed during execution.
    #[error("Git operation failed: {operation}")]
    GitCommandError {
        /// The git operation that failed (e.g. "clone", "fetch", "status")
        operation: String,
        /// The error output from the git command
        stderr: String,
    },

    /// Git executable not found in PATH.
    #[error("Git is not installed or not found in PATH")]
    GitNotFound,

    /// Git repository clone failed.
    #[error("Failed to clone {url}: {reason}")]
    GitCloneFailed {
        /// The repository URL that failed to clone
        url: String,
        /// The reason for the clone failure
        reason: String,
    },

    /// A met?/meet shell invocation could not be executed at all.
    ///
    /// A script that runs and exits non-zero is a normal "unmet" outcome, not
    /// this error; this covers spawn failures and timeouts.
    #[error("Shell command failed to run: {reason}")]
    ShellCommandError {
        /// Why the shell process could not run
        reason: String,
    },

    /// The source manifest could not be parsed.
    #[error("Invalid source manifest {path}: {reason}")]
    ManifestParseError {
        /// Path to the manifest file
        path: String,
        /// Specific reason for the parsing failure
        reason: String,
    },

    /// Configuration error (data directory, options).
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration error
        message: String,
    },

    /// I/O error wrapper.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_reason() {
        let e = MeetError::SourceHasLocalChanges {
            name: "core".into(),
        };
        assert_eq!(e.to_string(), "Source 'core' has local changes or untracked files - not removing");

        let e = MeetError::SourceUnreadable {
            uri: "https://example.invalid/x.git".into(),
            reason: "repository not found".into(),
        };
        assert!(e.to_string().contains("https://example.invalid/x.git"));
        assert!(e.to_string().contains("repository not found"));

        // Clone failures surface git's own stderr, not just the URL.
        let e = MeetError::GitCloneFailed {
            url: "https://example.invalid/x.git".into(),
            reason: "fatal: could not read from remote".into(),
        };
        assert!(e.to_string().contains("could not read from remote"));
    }

    #[test]
    fn test_source_load_names_the_source_and_has_no_cause() {
        let e = MeetError::SourceLoad {
            source_name: "core".into(),
            path: "/data/sources/core/bad.toml".into(),
            reason: "expected string".into(),
        };
        assert_eq!(
            e.to_string(),
            "Failed to load source 'core' from /data/sources/core/bad.toml: expected string"
        );
        // The source name is plain data, not a chained underlying error.
        assert!(std::error::Error::source(&e).is_none());
    }

    #[test]
    fn test_task_running_is_downcastable_through_anyhow() {
        let err: anyhow::Error = MeetError::TaskRunning.into();
        assert!(matches!(err.downcast_ref::<MeetError>(), Some(MeetError::TaskRunning)));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let e: MeetError = io.into();
        assert!(matches!(e, MeetError::IoError(_)));
    }
}
