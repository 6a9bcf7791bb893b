//! Source repository management.
//!
//! A source is a named git repository of dep definitions. The registered set
//! lives in a flat manifest (`sources.toml`) of `{name, uri}` entries, and
//! each source is cloned into a deterministic path under `sources/<name>`.
//! The manifest and the filesystem must stay consistent: every entry has a
//! valid clone, and a clone without an entry is crash debris from an
//! interrupted add.
//!
//! # Safety properties
//!
//! - `add` clones first and commits the manifest entry second, so a crash in
//!   between leaves at most an orphaned directory, never a dangling entry
//! - `remove` refuses to delete a clone with uncommitted changes to tracked
//!   files or with untracked files present - local edits are never lost by
//!   accident; `clear` is the explicit, unconditional escape hatch
//! - every manifest read-modify-write runs under an exclusive file lock
//!   ([`StoreLock`]) and the rewrite itself is atomic (temp file + rename)

pub mod lock;

pub use lock::StoreLock;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::Paths;
use crate::core::MeetError;
use crate::git::GitRepo;
use crate::utils::{ensure_dir, write_atomic};

/// One registered dep source: a name and the remote it synchronizes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Unique key; also the clone directory name
    pub name: String,
    /// Remote URI (https, ssh, file://, or a local path)
    pub uri: String,
}

impl Source {
    /// Creates a new source entry.
    #[must_use]
    pub fn new(name: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uri: uri.into(),
        }
    }

    /// The deterministic clone path for this source.
    #[must_use]
    pub fn path(&self, sources_dir: &Path) -> PathBuf {
        sources_dir.join(&self.name)
    }
}

/// On-disk manifest shape: a list of `[[sources]]` tables.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Manifest {
    #[serde(default)]
    sources: Vec<Source>,
}

/// The catalog of registered sources and their clones.
///
/// Reads (`count`, `sources`, `get`) are served from the loaded manifest;
/// mutations (`add`, `remove`, `clear`) re-read the manifest under the store
/// lock before acting, so concurrent processes serialize correctly.
#[derive(Debug)]
pub struct SourceStore {
    data_dir: PathBuf,
    manifest_path: PathBuf,
    sources_dir: PathBuf,
    sources: Vec<Source>,
}

impl SourceStore {
    /// Opens the store, loading the manifest (a missing manifest is an empty
    /// catalog, not an error).
    pub fn open(paths: &Paths) -> Result<Self> {
        let manifest_path = paths.manifest_path();
        let sources = Self::load_manifest(&manifest_path)?;
        Ok(Self {
            data_dir: paths.data_dir().clone(),
            manifest_path,
            sources_dir: paths.sources_dir(),
            sources,
        })
    }

    fn load_manifest(path: &Path) -> Result<Vec<Source>> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let manifest: Manifest = toml::from_str(&text).map_err(|e| MeetError::ManifestParseError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(manifest.sources)
    }

    fn save(&self) -> Result<()> {
        let manifest = Manifest {
            sources: self.sources.clone(),
        };
        let text = toml::to_string_pretty(&manifest).context("Failed to serialize manifest")?;
        write_atomic(&self.manifest_path, &text)
    }

    /// Number of registered sources.
    #[must_use]
    pub fn count(&self) -> usize {
        self.sources.len()
    }

    /// All registered sources, in registration order.
    #[must_use]
    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    /// Looks up a source by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Source> {
        self.sources.iter().find(|s| s.name == name)
    }

    /// The clone path for a source.
    #[must_use]
    pub fn source_path(&self, source: &Source) -> PathBuf {
        source.path(&self.sources_dir)
    }

    /// Registers a source: clone the remote, then commit the manifest entry.
    ///
    /// Fails with [`MeetError::SourceExists`] for a duplicate name and
    /// [`MeetError::SourceUnreadable`] when the remote cannot be cloned; in
    /// both cases the manifest is unchanged and no clone is left behind. A
    /// leftover directory at the target path that no manifest entry claims is
    /// debris from an interrupted add and is removed before cloning.
    pub async fn add(&mut self, name: &str, uri: &str) -> Result<()> {
        let _lock = StoreLock::acquire(&self.data_dir).await?;
        self.sources = Self::load_manifest(&self.manifest_path)?;

        if self.get(name).is_some() {
            return Err(MeetError::SourceExists {
                name: name.to_string(),
            }
            .into());
        }

        // `~/deps` and friends are allowed for local sources.
        let uri = shellexpand::tilde(uri).into_owned();
        ensure_dir(&self.sources_dir)?;

        let source = Source::new(name, uri.clone());
        let target = self.source_path(&source);
        if target.exists() {
            tokio::fs::remove_dir_all(&target)
                .await
                .with_context(|| format!("Failed to clear stale clone at {}", target.display()))?;
        }

        if let Err(e) = GitRepo::clone(&uri, &target).await {
            return Err(MeetError::SourceUnreadable {
                uri,
                reason: root_cause(&e),
            }
            .into());
        }
        tracing::info!(target: "source", "Cloned '{}' from {}", name, uri);

        self.sources.push(source);
        self.save()
    }

    /// Deregisters a source and deletes its clone.
    ///
    /// Refused with [`MeetError::SourceHasLocalChanges`] when the working
    /// tree has uncommitted modifications or untracked files; the manifest
    /// and the clone are then left untouched.
    pub async fn remove(&mut self, name: &str) -> Result<()> {
        let _lock = StoreLock::acquire(&self.data_dir).await?;
        self.sources = Self::load_manifest(&self.manifest_path)?;

        let source = self
            .get(name)
            .ok_or_else(|| MeetError::SourceNotFound {
                name: name.to_string(),
            })?
            .clone();

        let path = self.source_path(&source);
        if path.exists() {
            let repo = GitRepo::new(&path);
            if repo.is_git_repo() && repo.has_local_changes().await? {
                return Err(MeetError::SourceHasLocalChanges {
                    name: name.to_string(),
                }
                .into());
            }
            tokio::fs::remove_dir_all(&path)
                .await
                .with_context(|| format!("Failed to remove {}", path.display()))?;
        }

        self.sources.retain(|s| s.name != name);
        self.save()?;
        tracing::info!(target: "source", "Removed source '{}'", name);
        Ok(())
    }

    /// Deletes every clone and empties the manifest, unconditionally.
    ///
    /// Bypasses the local-changes gate; this is the explicit bulk
    /// destruction the per-source gate protects against reaching by
    /// accident.
    pub async fn clear(&mut self) -> Result<()> {
        let _lock = StoreLock::acquire(&self.data_dir).await?;
        self.sources = Self::load_manifest(&self.manifest_path)?;

        for source in &self.sources {
            let path = self.source_path(source);
            if path.exists() {
                tokio::fs::remove_dir_all(&path)
                    .await
                    .with_context(|| format!("Failed to remove {}", path.display()))?;
            }
        }
        self.sources.clear();
        self.save()?;
        tracing::info!(target: "source", "Cleared all sources");
        Ok(())
    }

    /// Pulls updates for every registered source so the dep files on disk
    /// match the remote.
    pub async fn sync_all(&self) -> Result<()> {
        for source in &self.sources {
            let path = self.source_path(source);
            let repo = GitRepo::new(&path);
            if repo.is_git_repo() {
                repo.pull().await.with_context(|| format!("Failed to sync '{}'", source.name))?;
            }
        }
        Ok(())
    }

    /// Verifies the manifest/filesystem invariant, both directions.
    ///
    /// Every registered source must have a git clone at its path, and every
    /// directory under `sources/` must belong to a registered source (an
    /// orphan is debris from an interrupted add). Violations are reported,
    /// never healed.
    pub fn check_consistency(&self) -> Result<()> {
        for source in &self.sources {
            let path = self.source_path(source);
            if !GitRepo::new(&path).is_git_repo() {
                return Err(MeetError::StoreInconsistent {
                    reason: format!(
                        "source '{}' is registered but {} is not a git clone",
                        source.name,
                        path.display()
                    ),
                }
                .into());
            }
        }

        if self.sources_dir.is_dir() {
            for entry in std::fs::read_dir(&self.sources_dir)
                .with_context(|| format!("Failed to read {}", self.sources_dir.display()))?
            {
                let entry = entry?;
                let name = entry.file_name().to_string_lossy().into_owned();
                if entry.path().is_dir() && self.get(&name).is_none() {
                    return Err(MeetError::StoreInconsistent {
                        reason: format!(
                            "{} exists but no source named '{}' is registered",
                            entry.path().display(),
                            name
                        ),
                    }
                    .into());
                }
            }
        }
        Ok(())
    }
}

fn root_cause(err: &anyhow::Error) -> String {
    err.root_cause().to_string().trim().to_string()
}
