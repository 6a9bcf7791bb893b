//! Configuration: data-directory layout and per-run options.
//!
//! Everything meet persists lives under a single data directory:
//!
//! ```text
//! ~/.meet/
//!   sources.toml     source manifest (name -> remote URI)
//!   sources/<name>/  one clone per registered source
//!   logs/<src>/<dep> per-dep run logs
//!   reports/         spooled run reports, sent.jsonl, bugs/
//!   vars/            legacy persisted vars, cleaned on each run
//! ```
//!
//! The location can be overridden with `MEET_DATA_DIR` (essential for
//! testing). There are no process-wide singletons: [`Paths`] and
//! [`RunOptions`] are constructed per invocation and passed explicitly to the
//! components that need them.

use anyhow::Result;
use std::path::PathBuf;

/// Resolved filesystem layout for one invocation.
#[derive(Debug, Clone)]
pub struct Paths {
    data_dir: PathBuf,
}

impl Paths {
    /// Resolves the data directory: `MEET_DATA_DIR` if set, else `~/.meet`.
    pub fn new() -> Result<Self> {
        if let Ok(dir) = std::env::var("MEET_DATA_DIR") {
            return Ok(Self::with_data_dir(PathBuf::from(dir)));
        }
        let home = dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?;
        Ok(Self::with_data_dir(home.join(".meet")))
    }

    /// Uses an explicit data directory (used by tests and embedding code).
    #[must_use]
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
        }
    }

    /// Root data directory.
    #[must_use]
    pub fn data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    /// The source manifest file.
    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.data_dir.join("sources.toml")
    }

    /// Parent directory of all source clones.
    #[must_use]
    pub fn sources_dir(&self) -> PathBuf {
        self.data_dir.join("sources")
    }

    /// Prefix under which per-dep logs are written.
    #[must_use]
    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    /// Spool directory for queued run reports.
    #[must_use]
    pub fn reports_dir(&self) -> PathBuf {
        self.data_dir.join("reports")
    }

    /// Legacy persisted-vars directory, removed at the start of each run.
    #[must_use]
    pub fn vars_dir(&self) -> PathBuf {
        self.data_dir.join("vars")
    }
}

/// Immutable snapshot of the options governing one run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Verbose/debug mode: full log paths in failure messages.
    pub debug: bool,
    /// Whether bug reports are filed for processed deps.
    pub reportable: bool,
}
