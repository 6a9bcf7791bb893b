//! Dep definitions and dep-file loading.
//!
//! A dep is a named, idempotent unit of system configuration: an ordered list
//! of requirement names, a fixed set of accepted parameters, an optional
//! `met` probe, and an optional `meet` block. Deps are declared in TOML files
//! anywhere inside a source clone:
//!
//! ```toml
//! [[deps]]
//! name = "curl"
//! requires = ["build-tools"]
//! params = ["version"]
//! met = "command -v curl"
//! meet = "sudo apt-get install -y curl"
//! ```
//!
//! Deps are loaded when their source is scanned and are immutable afterwards;
//! the registry hands out `Arc<Dep>` clones.

pub mod registry;

pub use registry::{DepRegistry, Resolution};

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use walkdir::WalkDir;

use crate::core::MeetError;
use crate::source::Source;

/// On-disk shape of one dep file.
#[derive(Debug, Default, Deserialize)]
struct DepFile {
    #[serde(default)]
    deps: Vec<DepSpec>,
}

/// One `[[deps]]` table.
#[derive(Debug, Deserialize)]
struct DepSpec {
    name: String,
    #[serde(default)]
    requires: Vec<String>,
    #[serde(default)]
    params: Vec<String>,
    met: Option<String>,
    meet: Option<String>,
}

/// A loaded dep definition.
///
/// The parameter set is fixed here, at definition time; the task layer drops
/// runtime arguments outside it rather than forwarding them silently.
#[derive(Debug)]
pub struct Dep {
    /// Dep name, unique within its declaring source
    pub name: String,
    /// Name of the source that declared this dep
    pub source_name: String,
    /// Remote URI of the declaring source (carried into run reports)
    pub source_uri: String,
    /// Requirement dep names, processed in order before this dep
    pub requires: Vec<String>,
    /// Accepted parameter names
    pub params: Vec<String>,
    /// Shell probe; exit 0 means the dep is already met
    pub met: Option<String>,
    /// Shell block that brings the system to the met state
    pub meet: Option<String>,
}

impl Dep {
    /// Source-qualified name, also the per-dep log key: `source/name`.
    #[must_use]
    pub fn contextual_name(&self) -> String {
        format!("{}/{}", self.source_name, self.name)
    }

    /// Whether the dep declares the given parameter.
    #[must_use]
    pub fn accepts_param(&self, key: &str) -> bool {
        self.params.iter().any(|p| p == key)
    }
}

/// Loads every dep declared inside one source clone.
///
/// Scans recursively for `*.toml` files in a sorted order (so load order and
/// duplicate detection are deterministic). A file that fails to parse, or a
/// dep name declared twice within the source, is a
/// [`MeetError::SourceLoad`].
pub fn load_source_deps(source: &Source, clone_path: &Path) -> Result<Vec<Arc<Dep>>> {
    if !clone_path.is_dir() {
        return Err(MeetError::SourceLoad {
            source_name: source.name.clone(),
            path: clone_path.display().to_string(),
            reason: "clone directory is missing".to_string(),
        }
        .into());
    }

    let mut deps: Vec<Arc<Dep>> = Vec::new();
    let walker = WalkDir::new(clone_path)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git");

    for entry in walker {
        let entry = entry.with_context(|| format!("Failed to scan {}", clone_path.display()))?;
        if !entry.file_type().is_file()
            || entry.path().extension().and_then(|s| s.to_str()) != Some("toml")
        {
            continue;
        }

        let text = std::fs::read_to_string(entry.path())
            .with_context(|| format!("Failed to read {}", entry.path().display()))?;
        let file: DepFile = toml::from_str(&text).map_err(|e| MeetError::SourceLoad {
            source_name: source.name.clone(),
            path: entry.path().display().to_string(),
            reason: e.to_string(),
        })?;

        for spec in file.deps {
            if deps.iter().any(|d| d.name == spec.name) {
                return Err(MeetError::SourceLoad {
                    source_name: source.name.clone(),
                    path: entry.path().display().to_string(),
                    reason: format!("dep '{}' is declared more than once", spec.name),
                }
                .into());
            }
            deps.push(Arc::new(Dep {
                name: spec.name,
                source_name: source.name.clone(),
                source_uri: source.uri.clone(),
                requires: spec.requires,
                params: spec.params,
                met: spec.met,
                meet: spec.meet,
            }));
        }
    }

    tracing::debug!(target: "dep", "Loaded {} deps from source '{}'", deps.len(), source.name);
    Ok(deps)
}
