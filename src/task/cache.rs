//! Per-run memoization of expensive idempotent probes.
//!
//! A dep's meeting procedure may ask the same question ("is X installed?")
//! several times while nested requirements resolve within one run. The run
//! cache memoizes those answers for a bounded window and nothing more: it is
//! explicitly scoped, never shared across tasks, and never persisted.
//!
//! Activation is a wrapper the caller places around part of a run, not an
//! always-on global: outside an enabled scope, [`RunCache::cached`] is a
//! plain passthrough with no memoization side effect. Scopes nest - entering
//! a scope saves the previous activation state and entries, and leaving it
//! restores them exactly, on success and on failure alike.

use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;

/// Saved cache state, restored when a scope ends.
///
/// Returned by [`RunCache::enter`] and consumed by [`RunCache::exit`]; the
/// async meet path uses this pair directly because a closure cannot span an
/// `.await`.
#[must_use = "a cache scope must be closed with RunCache::exit"]
pub struct CacheScope {
    was_active: bool,
    saved: HashMap<String, Value>,
}

/// The per-run memoized value store.
#[derive(Debug, Default)]
pub struct RunCache {
    active: bool,
    entries: HashMap<String, Value>,
}

impl RunCache {
    /// Creates an inactive cache with no entries.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a caching scope is currently active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Opens a caching scope: activates caching with a fresh, empty map.
    pub fn enter(&mut self) -> CacheScope {
        CacheScope {
            was_active: std::mem::replace(&mut self.active, true),
            saved: std::mem::take(&mut self.entries),
        }
    }

    /// Closes a scope, restoring the activation state and entries saved at
    /// [`enter`](Self::enter).
    pub fn exit(&mut self, scope: CacheScope) {
        self.active = scope.was_active;
        self.entries = scope.saved;
    }

    /// Runs `body` with caching enabled and a fresh map, restoring the prior
    /// state afterwards - including when `body` returns an error.
    pub fn with_enabled<R>(&mut self, body: impl FnOnce(&mut Self) -> R) -> R {
        let scope = self.enter();
        let result = body(self);
        self.exit(scope);
        result
    }

    /// Memoizing lookup.
    ///
    /// - caching disabled: `compute` runs and its value is returned, nothing
    ///   is stored
    /// - `key` cached: the stored value is returned and `on_hit` (if any) is
    ///   invoked with it - recomputation is skipped but the caller can still
    ///   log the hit
    /// - otherwise: `compute` runs, the value is stored under `key`
    pub fn cached(
        &mut self,
        key: &str,
        on_hit: Option<&mut dyn FnMut(&Value)>,
        compute: impl FnOnce() -> Value,
    ) -> Value {
        if !self.active {
            return compute();
        }
        if let Some(value) = self.entries.get(key) {
            if let Some(hit) = on_hit {
                hit(value);
            }
            return value.clone();
        }
        let value = compute();
        self.entries.insert(key.to_string(), value.clone());
        value
    }

    /// Async-compute variant of [`cached`](Self::cached) for probes that
    /// await (shell invocations). Same semantics; the compute future is only
    /// created on a miss.
    pub async fn cached_with<F, Fut>(
        &mut self,
        key: &str,
        on_hit: impl FnOnce(&Value),
        compute: F,
    ) -> anyhow::Result<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<Value>>,
    {
        if !self.active {
            return compute().await;
        }
        if let Some(value) = self.entries.get(key) {
            on_hit(value);
            return Ok(value.clone());
        }
        let value = compute().await?;
        self.entries.insert(key.to_string(), value.clone());
        Ok(value)
    }

    /// Overwrites a cached value (used when a probe is deliberately re-run
    /// fresh after a meet block).
    pub fn store(&mut self, key: &str, value: Value) {
        if self.active {
            self.entries.insert(key.to_string(), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_disabled_cache_always_computes() {
        let mut cache = RunCache::new();
        let mut calls = 0;
        for _ in 0..3 {
            let v = cache.cached("k", None, || {
                calls += 1;
                json!(true)
            });
            assert_eq!(v, json!(true));
        }
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_memoizes_within_enabled_scope() {
        let mut cache = RunCache::new();
        cache.with_enabled(|cache| {
            let mut calls = 0;
            let first = cache.cached("probe", None, || {
                calls += 1;
                json!("installed")
            });
            let second = cache.cached("probe", None, || {
                calls += 1;
                json!("never evaluated")
            });
            assert_eq!(calls, 1);
            assert_eq!(first, second);
        });
    }

    #[test]
    fn test_on_hit_fires_only_on_hits() {
        let mut cache = RunCache::new();
        cache.with_enabled(|cache| {
            let mut hits = Vec::new();
            cache.cached("k", Some(&mut |v: &Value| hits.push(v.clone())), || json!(1));
            assert!(hits.is_empty());
            cache.cached("k", Some(&mut |v: &Value| hits.push(v.clone())), || json!(2));
            assert_eq!(hits, vec![json!(1)]);
        });
    }

    #[test]
    fn test_nested_scopes_restore_outer_state() {
        let mut cache = RunCache::new();
        cache.with_enabled(|cache| {
            cache.cached("outer", None, || json!("outer-value"));

            cache.with_enabled(|cache| {
                // Inner scope starts empty: the outer entry is not visible.
                let mut calls = 0;
                cache.cached("outer", None, || {
                    calls += 1;
                    json!("inner-value")
                });
                assert_eq!(calls, 1);
            });

            // Outer entry is back after the inner scope closes.
            let v = cache.cached("outer", None, || json!("recomputed"));
            assert_eq!(v, json!("outer-value"));
        });
        assert!(!cache.is_active());
    }

    #[test]
    fn test_failing_inner_body_still_restores() {
        let mut cache = RunCache::new();
        cache.with_enabled(|cache| {
            cache.cached("k", None, || json!("kept"));
            let result: Result<(), &str> = cache.with_enabled(|_| Err("boom"));
            assert!(result.is_err());
            let v = cache.cached("k", None, || json!("recomputed"));
            assert_eq!(v, json!("kept"));
        });
        assert!(!cache.is_active());
    }

    #[tokio::test]
    async fn test_cached_with_memoizes_async_compute() {
        let mut cache = RunCache::new();
        let scope = cache.enter();
        let v1 = cache.cached_with("k", |_| {}, || async { Ok(json!(7)) }).await.unwrap();
        let mut hit = false;
        let v2 = cache
            .cached_with("k", |_| hit = true, || async { Ok(json!(8)) })
            .await
            .unwrap();
        assert_eq!(v1, v2);
        assert!(hit);
        cache.exit(scope);
        assert!(!cache.is_active());
    }

    #[test]
    fn test_store_is_noop_when_disabled() {
        let mut cache = RunCache::new();
        cache.store("k", json!(1));
        cache.with_enabled(|cache| {
            let mut calls = 0;
            cache.cached("k", None, || {
                calls += 1;
                json!(2)
            });
            assert_eq!(calls, 1);
        });
    }
}
