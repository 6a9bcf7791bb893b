//! Git operations wrapper using the system git command.
//!
//! Dep sources are plain git clones, so the operations needed here are few:
//! clone a remote into a deterministic path, pull updates, decide whether a
//! working tree is dirty, and validate that a directory really is a clone.
//! Everything shells out to the system `git` via [`GitCommand`], the same way
//! cargo does - no libgit2 binding to keep in sync with user configuration,
//! credential helpers, and SSH agents.

pub mod command_builder;

pub use command_builder::{GitCommand, GitCommandOutput};

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::core::MeetError;

/// A local git repository.
///
/// The constructor does not verify the path; use [`is_git_repo`](Self::is_git_repo)
/// before operating on a directory of unknown provenance.
#[derive(Debug, Clone)]
pub struct GitRepo {
    path: PathBuf,
}

impl GitRepo {
    /// Creates a handle for an existing local repository.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Clones a repository from `url` into `target`.
    ///
    /// On failure any partially-created target directory is removed, so a
    /// failed clone leaves no trace on disk.
    pub async fn clone(url: &str, target: impl AsRef<Path>) -> Result<Self> {
        let target = target.as_ref();
        match GitCommand::clone(url, target).execute_success().await {
            Ok(()) => Ok(Self::new(target)),
            Err(e) => {
                if target.exists() {
                    let _ = tokio::fs::remove_dir_all(target).await;
                }
                Err(e)
            }
        }
    }

    /// Pulls updates from the configured remote, fast-forward only, so the
    /// checked-out files advance along with the refs.
    pub async fn pull(&self) -> Result<()> {
        GitCommand::pull().current_dir(&self.path).execute_success().await
    }

    /// Returns true if the path contains a git repository.
    pub fn is_git_repo(&self) -> bool {
        self.path.join(".git").exists()
    }

    /// Returns true if the working tree has uncommitted modifications to
    /// tracked files or any untracked files.
    ///
    /// Both count as "local changes" for the removal safety gate: porcelain
    /// status prints one line per dirty path, so any output at all means the
    /// tree is not clean.
    pub async fn has_local_changes(&self) -> Result<bool> {
        let status =
            GitCommand::status_porcelain().current_dir(&self.path).execute_stdout().await?;
        Ok(!status.is_empty())
    }

    /// The local filesystem path of this repository.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Returns the git executable to run, erroring if none is installed.
pub fn git_program() -> Result<PathBuf> {
    which::which("git").map_err(|_| MeetError::GitNotFound.into())
}

/// Returns true if git is installed and runnable.
pub fn is_git_installed() -> bool {
    git_program().is_ok()
}

/// Validates that git is available, with a typed error if not.
pub fn ensure_git_available() -> Result<()> {
    git_program().map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_git_is_installed() {
        assert!(is_git_installed());
        assert!(ensure_git_available().is_ok());
    }

    #[test]
    fn test_is_git_repo_false_for_plain_dir() {
        let temp = TempDir::new().unwrap();
        assert!(!GitRepo::new(temp.path()).is_git_repo());
    }

    #[tokio::test]
    async fn test_clone_failure_leaves_no_target() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("clone");
        let missing = temp.path().join("nonexistent.git");
        let result = GitRepo::clone(&missing.display().to_string(), &target).await;
        assert!(result.is_err());
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn test_init_status_and_dirty_detection() {
        let temp = TempDir::new().unwrap();
        GitCommand::new()
            .args(["init", "-q"])
            .current_dir(temp.path())
            .execute_success()
            .await
            .unwrap();
        let repo = GitRepo::new(temp.path());
        assert!(repo.is_git_repo());
        assert!(!repo.has_local_changes().await.unwrap());

        std::fs::write(temp.path().join("untracked.txt"), "x").unwrap();
        assert!(repo.has_local_changes().await.unwrap());
    }
}
