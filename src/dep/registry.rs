//! Dep name resolution across all registered sources.
//!
//! The registry is a read-only index built once per run from the source
//! store. Lookup accepts either a source-qualified name (`core/curl`) or a
//! bare name (`curl`); bare names search sources in registration order, first
//! match wins. A miss never falls through silently: callers receive a ranked
//! suggestion list computed from the full set of known names.

use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use strsim::levenshtein;

use crate::dep::{Dep, load_source_deps};
use crate::source::SourceStore;

/// Maximum Levenshtein distance, as a percentage of the query length, for a
/// name to qualify as a suggestion.
const SIMILARITY_THRESHOLD_PERCENT: usize = 50;

/// How many suggestions to surface on a miss.
const MAX_SUGGESTIONS: usize = 3;

/// Outcome of a name lookup.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// Exact match.
    Found(Arc<Dep>),
    /// No such dep; the nearest known names, best first (possibly empty).
    NotFound {
        /// Ranked candidate names
        suggestions: Vec<String>,
    },
}

/// Index of every dep loaded from every registered source.
#[derive(Debug, Default)]
pub struct DepRegistry {
    /// All deps in source-registration order, then file order
    deps: Vec<Arc<Dep>>,
    /// Qualified `source/name` -> dep
    by_contextual: HashMap<String, Arc<Dep>>,
}

impl DepRegistry {
    /// Builds the registry by scanning every registered source clone.
    ///
    /// Resolution is read-only afterwards; loading is the only moment source
    /// state is touched. Any source that fails to load aborts the build with
    /// a [`MeetError::SourceLoad`](crate::core::MeetError::SourceLoad).
    pub fn load(store: &SourceStore) -> Result<Self> {
        let mut registry = Self::default();
        for source in store.sources() {
            let deps = load_source_deps(source, &store.source_path(source))?;
            for dep in deps {
                registry.by_contextual.insert(dep.contextual_name(), dep.clone());
                registry.deps.push(dep);
            }
        }
        tracing::debug!(target: "dep", "Registry holds {} deps", registry.deps.len());
        Ok(registry)
    }

    /// Number of known deps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.deps.len()
    }

    /// True when no source declared any dep.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deps.is_empty()
    }

    /// Exact lookup: `source/name` qualified, or bare name in registration
    /// order.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<Arc<Dep>> {
        if name.contains('/') {
            return self.by_contextual.get(name).cloned();
        }
        self.deps.iter().find(|d| d.name == name).cloned()
    }

    /// Looks up a dep, or ranks the nearest known names on a miss.
    #[must_use]
    pub fn find_or_suggest(&self, name: &str) -> Resolution {
        match self.find(name) {
            Some(dep) => Resolution::Found(dep),
            None => Resolution::NotFound {
                suggestions: suggest(name, &self.known_names()),
            },
        }
    }

    /// Every resolvable name: bare names plus qualified forms.
    #[must_use]
    pub fn known_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.deps.iter().map(|d| d.name.clone()).collect();
        names.extend(self.by_contextual.keys().cloned());
        names.sort();
        names.dedup();
        names
    }
}

/// Ranks `candidates` by edit distance to `query`.
///
/// Pure function: candidates within half the query's length, closest first,
/// capped at three. An exact match never appears (an exact match would have
/// resolved).
#[must_use]
pub fn suggest(query: &str, candidates: &[String]) -> Vec<String> {
    let mut scored: Vec<(String, usize)> = candidates
        .iter()
        .map(|c| (c.clone(), levenshtein(query, c)))
        .filter(|(_, dist)| *dist > 0 && *dist <= query.len() * SIMILARITY_THRESHOLD_PERCENT / 100)
        .collect();
    scored.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
    scored.into_iter().take(MAX_SUGGESTIONS).map(|(name, _)| name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_suggest_ranks_by_distance() {
        let candidates = names(&["rbenv", "rbenv-build", "curl", "postgres"]);
        let suggestions = suggest("rbnv", &candidates);
        assert_eq!(suggestions.first().map(String::as_str), Some("rbenv"));
    }

    #[test]
    fn test_suggest_never_returns_exact_match() {
        let candidates = names(&["curl", "curly"]);
        let suggestions = suggest("curl", &candidates);
        assert!(!suggestions.contains(&"curl".to_string()));
    }

    #[test]
    fn test_suggest_respects_threshold() {
        let candidates = names(&["completely-unrelated"]);
        assert!(suggest("curl", &candidates).is_empty());
    }

    #[test]
    fn test_suggest_caps_at_three() {
        let candidates = names(&["dep1", "dep2", "dep3", "dep4", "dep5"]);
        assert_eq!(suggest("dep0", &candidates).len(), 3);
    }
}
