//! Run reporting: spooled outcome records and bug reports.
//!
//! Every processed dep produces a [`RunReport`]. Reports are never delivered
//! on the critical path of a run: they are spooled to disk as individual JSON
//! files, and a detached background task drains the spool through a
//! [`ReportSink`] at the start of the next run. Delivery failures leave the
//! spool file in place to be retried later; spooling failures are logged and
//! swallowed.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::dep::Dep;
use crate::utils::ensure_dir;

/// One dep outcome, recorded after its meeting cycle finished.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Engine version that produced this report
    pub tool_version: String,
    /// When the dep finished processing
    pub run_at: DateTime<Utc>,
    /// Coarse host description (os/arch), no hostnames or usernames
    pub host: String,
    /// Source-qualified dep name
    pub dep_name: String,
    /// Remote URI of the source that declared the dep
    pub source_uri: String,
    /// Whether the dep ended the run met
    pub result: bool,
}

impl RunReport {
    /// Builds a report for one processed dep.
    #[must_use]
    pub fn for_dep(dep: &Dep, result: bool) -> Self {
        Self {
            tool_version: crate::VERSION.to_string(),
            run_at: Utc::now(),
            host: host_description(),
            dep_name: dep.contextual_name(),
            source_uri: dep.source_uri.clone(),
            result,
        }
    }
}

/// Where a drained report goes.
///
/// Delivery is synchronous and infallible-or-retry: an `Err` keeps the spool
/// file for the next drain.
pub trait ReportSink: Send + Sync {
    /// Delivers one report.
    fn deliver(&self, report: &RunReport) -> Result<()>;
}

/// Sink that appends reports to a local JSON-lines file.
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    /// Creates a sink appending to `path`.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
        }
    }
}

impl ReportSink for FileSink {
    fn deliver(&self, report: &RunReport) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            ensure_dir(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        let line = serde_json::to_string(report).context("Failed to serialize report")?;
        writeln!(file, "{line}")
            .with_context(|| format!("Failed to append to {}", self.path.display()))?;
        Ok(())
    }
}

/// The on-disk report spool.
///
/// Spool files are `<uuid>.json`, one report each, written atomically enough
/// for a single-writer spool (create + write + close before any drain sees
/// the name pattern it scans for).
#[derive(Debug, Clone)]
pub struct ReportQueue {
    spool_dir: PathBuf,
}

impl ReportQueue {
    /// Creates a queue rooted at the given spool directory.
    #[must_use]
    pub fn new(spool_dir: PathBuf) -> Self {
        Self {
            spool_dir,
        }
    }

    /// Spools one report. Best-effort: failures are logged, never returned -
    /// reporting must not fail a run.
    pub async fn queue(&self, report: &RunReport) {
        if let Err(e) = self.write_spool_file(report) {
            tracing::debug!(target: "report", "Failed to spool report: {e:#}");
        }
    }

    fn write_spool_file(&self, report: &RunReport) -> Result<()> {
        ensure_dir(&self.spool_dir)?;
        let path = self.spool_dir.join(format!("{}.json", Uuid::new_v4()));
        let text = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
        std::fs::write(&path, text)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::debug!(target: "report", "Spooled report at {}", path.display());
        Ok(())
    }

    /// Spool file paths, oldest-name first (drain order is not significant,
    /// but determinism keeps tests honest).
    fn spool_files(&self) -> Vec<PathBuf> {
        let Ok(entries) = std::fs::read_dir(&self.spool_dir) else {
            return Vec::new();
        };
        let mut files: Vec<PathBuf> = entries
            .filter_map(std::result::Result::ok)
            .map(|e| e.path())
            .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("json"))
            .collect();
        files.sort();
        files
    }

    /// Drains the spool through `sink`.
    ///
    /// Each delivered report's spool file is deleted; a failed delivery or an
    /// unreadable spool file is logged and left behind for the next drain.
    /// Never returns an error - this runs detached.
    pub async fn post_reports(&self, sink: &dyn ReportSink) {
        for path in self.spool_files() {
            match read_report(&path) {
                Ok(report) => match sink.deliver(&report) {
                    Ok(()) => {
                        if let Err(e) = std::fs::remove_file(&path) {
                            tracing::debug!(
                                target: "report",
                                "Failed to remove delivered spool file {}: {}",
                                path.display(),
                                e
                            );
                        }
                    }
                    Err(e) => {
                        tracing::debug!(target: "report", "Failed to deliver report: {e:#}");
                    }
                },
                Err(e) => {
                    tracing::debug!(
                        target: "report",
                        "Skipping unreadable spool file {}: {e:#}",
                        path.display()
                    );
                }
            }
        }
    }

    /// Number of spooled, undelivered reports.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.spool_files().len()
    }
}

fn read_report(path: &Path) -> Result<RunReport> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Coarse runtime description carried in reports. Deliberately contains no
/// hostname or username.
#[must_use]
pub fn host_description() -> String {
    format!("{}/{}", std::env::consts::OS, std::env::consts::ARCH)
}

/// Files a local bug report for one processed dep: the outcome record plus
/// the full per-dep log, under `reports/bugs/`.
pub fn file_bug_report(
    dep: &Dep,
    result: bool,
    log_path: &Path,
    reports_dir: &Path,
) -> Result<PathBuf> {
    let bugs_dir = reports_dir.join("bugs");
    ensure_dir(&bugs_dir)?;

    let report = RunReport::for_dep(dep, result);
    let log = std::fs::read_to_string(log_path).unwrap_or_default();
    let body = serde_json::json!({
        "report": report,
        "log": log,
    });

    let path = bugs_dir.join(format!("{}.json", Uuid::new_v4()));
    let text = serde_json::to_string_pretty(&body).context("Failed to serialize bug report")?;
    std::fs::write(&path, text).with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::info!(target: "report", "Filed bug report at {}", path.display());
    Ok(path)
}
