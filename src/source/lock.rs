//! File locking for source manifest mutation.
//!
//! The manifest is the one resource multiple meet processes can touch at the
//! same time (overlapping `sources add`/`remove` invocations). Every
//! read-modify-write of it happens under an exclusive OS file lock so that
//! concurrent mutations serialize instead of losing updates. The lock is
//! released when the [`StoreLock`] is dropped.

use anyhow::{Context, Result};
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::utils::ensure_dir;

/// An exclusive lock over the source store.
pub struct StoreLock {
    _file: File,
    path: PathBuf,
}

impl StoreLock {
    /// Acquires the store lock, blocking until any other holder releases it.
    ///
    /// The lock file is `store.lock` inside the data directory. Locking is
    /// performed on a blocking thread so the tokio runtime is never stalled
    /// by the wait.
    pub async fn acquire(data_dir: &Path) -> Result<Self> {
        ensure_dir(data_dir)?;
        let lock_path = data_dir.join("store.lock");
        let path_for_task = lock_path.clone();

        let file = tokio::task::spawn_blocking(move || -> Result<File> {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&path_for_task)
                .with_context(|| {
                    format!("Failed to open lock file: {}", path_for_task.display())
                })?;
            file.lock_exclusive()
                .with_context(|| format!("Failed to lock {}", path_for_task.display()))?;
            Ok(file)
        })
        .await
        .context("Failed to spawn blocking task for lock acquisition")??;

        Ok(Self {
            _file: file,
            path: lock_path,
        })
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        #[allow(unstable_name_collisions)]
        if let Err(e) = self._file.unlock() {
            tracing::warn!(target: "source", "Failed to unlock {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;
    use tokio::sync::Barrier;

    #[tokio::test]
    async fn test_acquire_and_release() {
        let temp = TempDir::new().unwrap();
        let lock = StoreLock::acquire(temp.path()).await.unwrap();
        assert!(temp.path().join("store.lock").exists());
        drop(lock);
        // The lock file itself is left in place.
        assert!(temp.path().join("store.lock").exists());
    }

    #[tokio::test]
    async fn test_second_holder_blocks() {
        let temp = TempDir::new().unwrap();
        let dir = Arc::new(temp.path().to_path_buf());
        let barrier = Arc::new(Barrier::new(2));

        let dir1 = dir.clone();
        let barrier1 = barrier.clone();
        let holder = tokio::spawn(async move {
            let _lock = StoreLock::acquire(&dir1).await.unwrap();
            barrier1.wait().await;
            tokio::time::sleep(Duration::from_millis(100)).await;
        });

        let waiter = tokio::spawn(async move {
            barrier.wait().await;
            let start = Instant::now();
            let _lock = StoreLock::acquire(&dir).await.unwrap();
            assert!(start.elapsed() >= Duration::from_millis(50));
        });

        holder.await.unwrap();
        waiter.await.unwrap();
    }
}
