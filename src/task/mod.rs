//! Run orchestration: the meet loop.
//!
//! A [`Task`] is one orchestrated run of one or more deps. It owns the
//! run-exclusivity flag and the per-run state (memoization cache, call stack,
//! open dep log), resolves each requested name through the registry, binds
//! caller arguments against the dep's declared parameters, and drives the
//! met?/meet cycle with a durable per-dep log. Outcomes are queued as run
//! reports for the detached background flush.
//!
//! Failure isolation: a dep that fails to meet (or errors) stops the batch
//! but never crashes it; the one exception is a source that fails to load,
//! which is caught at the top of [`Task::process`] and aborts the whole run
//! as a logged failure.

pub mod cache;

pub use cache::{CacheScope, RunCache};

use anyhow::{Context, Result};
use colored::Colorize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::future::Future;
use std::io::Write;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::{Paths, RunOptions};
use crate::core::MeetError;
use crate::dep::{Dep, DepRegistry, Resolution};
use crate::report::{FileSink, ReportQueue, RunReport, file_bug_report};
use crate::shell::ShellCommand;
use crate::source::SourceStore;
use crate::utils::ensure_dir;

/// One orchestrated run of one or more deps.
pub struct Task {
    opts: RunOptions,
    paths: Paths,
    running: AtomicBool,
}

/// Per-run mutable state, created inside `process` and owned exclusively by
/// that call: never shared across concurrent tasks.
struct RunState {
    cache: RunCache,
    callstack: Vec<String>,
    log: Option<DepLog>,
}

impl RunState {
    fn new() -> Self {
        Self {
            cache: RunCache::new(),
            callstack: Vec::new(),
            log: None,
        }
    }

    /// Appends a line to the open dep log (if any) and the debug trace.
    fn log_line(&mut self, text: &str) {
        tracing::debug!(target: "task", "{}", text);
        if let Some(log) = self.log.as_mut() {
            log.line(text);
        }
    }
}

/// An open per-dep log file, flushed line by line so a crash mid-run still
/// leaves everything written so far on disk.
struct DepLog {
    file: std::fs::File,
    path: PathBuf,
}

impl DepLog {
    fn open(path: &PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            ensure_dir(parent)?;
        }
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to open log at {}", path.display()))?;
        Ok(Self {
            file,
            path: path.clone(),
        })
    }

    fn line(&mut self, text: &str) {
        if writeln!(self.file, "{text}").and_then(|()| self.file.flush()).is_err() {
            tracing::warn!(target: "task", "Failed to write log at {}", self.path.display());
        }
    }
}

/// Resets the running flag on every exit path out of `process`.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Task {
    /// Creates a task with an immutable snapshot of the run options.
    #[must_use]
    pub fn new(opts: RunOptions, paths: Paths) -> Self {
        Self {
            opts,
            paths,
            running: AtomicBool::new(false),
        }
    }

    /// Whether a `process` call is currently in flight on this task.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Processes `dep_names` strictly in order, returning whether every one
    /// of them met.
    ///
    /// - a second call while one is in flight fails fast with
    ///   [`MeetError::TaskRunning`], leaving the first run unaffected
    /// - the batch short-circuits on the first dep that does not meet;
    ///   later names are not attempted (already-met deps are not rolled back)
    /// - a source that fails to load is caught here: the failure is logged
    ///   and the run returns `Ok(false)` instead of propagating
    pub async fn process(
        &self,
        dep_names: &[String],
        with_args: &BTreeMap<String, String>,
    ) -> Result<bool> {
        if self.running.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_err()
        {
            return Err(MeetError::TaskRunning.into());
        }
        let _guard = RunningGuard(&self.running);

        self.cleanup_saved_vars();

        // Flush previously spooled reports in the background. The flush runs
        // detached, is never awaited, and touches only the report spool.
        let queue = ReportQueue::new(self.paths.reports_dir());
        let flush_queue = queue.clone();
        let sink = FileSink::new(self.paths.reports_dir().join("sent.jsonl"));
        tokio::spawn(async move {
            flush_queue.post_reports(&sink).await;
        });

        let registry = match self.load_registry() {
            Ok(registry) => registry,
            Err(e)
                if matches!(
                    e.downcast_ref::<MeetError>(),
                    Some(MeetError::SourceLoad { .. } | MeetError::ManifestParseError { .. })
                ) =>
            {
                tracing::error!(target: "task", "{e:#}");
                eprintln!("{}", format!("{e:#}").red());
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        let mut run = RunState::new();
        for name in dep_names {
            if !self.process_dep(&mut run, &registry, &queue, name, with_args).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn load_registry(&self) -> Result<DepRegistry> {
        let store = SourceStore::open(&self.paths)?;
        DepRegistry::load(&store)
    }

    /// Resolves and meets a single requested dep, with its own log and cache
    /// scope. Returns `Ok(false)` for every isolated failure mode: unknown
    /// name, unmet result, or an error inside the meeting procedure.
    async fn process_dep(
        &self,
        run: &mut RunState,
        registry: &DepRegistry,
        queue: &ReportQueue,
        name: &str,
        with_args: &BTreeMap<String, String>,
    ) -> Result<bool> {
        let dep = match registry.find_or_suggest(name) {
            Resolution::Found(dep) => dep,
            Resolution::NotFound {
                suggestions,
            } => {
                if suggestions.is_empty() {
                    eprintln!("{}", format!("Dep '{name}' not found.").red());
                } else {
                    let list = quoted_list(&suggestions);
                    eprintln!(
                        "{}",
                        format!("Dep '{name}' not found. Did you mean {list}?").red()
                    );
                }
                return Ok(false);
            }
        };

        let args = self.task_args_for(&dep, with_args);
        let log_path = self.log_path_for(&dep);

        run.log = Some(DepLog::open(&log_path)?);
        run.log_line(&runtime_banner());

        let scope = run.cache.enter();
        let outcome = self.meet_dep(run, registry, dep.clone(), &args).await;
        run.cache.exit(scope);
        run.log = None;

        let met = match outcome {
            Ok(met) => met,
            Err(e) => {
                tracing::error!(target: "task", "Dep '{}' errored: {e:#}", dep.name);
                false
            }
        };

        if met {
            println!("{} {}", dep.contextual_name(), "met".green());
        } else {
            println!("{} {}", dep.contextual_name(), "unmet".red());
            eprintln!(
                "You can view {} log at '{}'.",
                if self.opts.debug { "the" } else { "a more detailed" },
                log_path.display()
            );
        }

        queue.queue(&RunReport::for_dep(&dep, met)).await;
        if self.opts.reportable {
            if let Err(e) = file_bug_report(&dep, met, &log_path, &self.paths.reports_dir()) {
                tracing::warn!(target: "report", "Failed to file bug report: {e:#}");
            }
        }
        Ok(met)
    }

    /// Binds caller arguments to the dep's declared parameters.
    ///
    /// Unknown keys are dropped with a warning that names exactly which keys
    /// were ignored; known keys pass through untouched.
    fn task_args_for(
        &self,
        dep: &Dep,
        with_args: &BTreeMap<String, String>,
    ) -> BTreeMap<String, String> {
        let (accepted, ignored) = partition_args(dep, with_args);
        if !ignored.is_empty() {
            let warning = unexpected_args_warning(&dep.name, &ignored);
            tracing::warn!(target: "task", "{}", warning);
            eprintln!("{}", warning.yellow());
        }
        accepted
    }

    /// Path of the persistent log for one dep: `<logPrefix>/<source>/<name>`.
    #[must_use]
    pub fn log_path_for(&self, dep: &Dep) -> PathBuf {
        self.paths.log_dir().join(dep.contextual_name())
    }

    /// Drives one dep's meeting cycle: requirements first (recursively), then
    /// the cached met? probe, then the meet block with a fresh confirmation.
    ///
    /// Requirements receive no caller arguments; those bind only to the dep
    /// they were addressed to.
    fn meet_dep<'a>(
        &'a self,
        run: &'a mut RunState,
        registry: &'a DepRegistry,
        dep: Arc<Dep>,
        args: &'a BTreeMap<String, String>,
    ) -> Pin<Box<dyn Future<Output = Result<bool>> + Send + 'a>> {
        Box::pin(async move {
            let ctx = dep.contextual_name();
            if run.callstack.contains(&ctx) {
                let chain = format!("{} -> {}", run.callstack.join(" -> "), ctx);
                run.log_line(&format!("Dependency cycle: {chain}"));
                tracing::error!(target: "task", "Dependency cycle: {}", chain);
                return Ok(false);
            }

            run.callstack.push(ctx);
            let result = self.meet_dep_inner(run, registry, &dep, args).await;
            run.callstack.pop();
            result
        })
    }

    async fn meet_dep_inner(
        &self,
        run: &mut RunState,
        registry: &DepRegistry,
        dep: &Arc<Dep>,
        args: &BTreeMap<String, String>,
    ) -> Result<bool> {
        for req in &dep.requires {
            match registry.find_or_suggest(req) {
                Resolution::Found(required) => {
                    if !self.meet_dep(run, registry, required, &BTreeMap::new()).await? {
                        run.log_line(&format!(
                            "'{}' requires '{}', which is unmet.",
                            dep.name, req
                        ));
                        return Ok(false);
                    }
                }
                Resolution::NotFound {
                    suggestions,
                } => {
                    let mut message =
                        format!("'{}' requires '{}', which doesn't exist.", dep.name, req);
                    if !suggestions.is_empty() {
                        message.push_str(&format!(" Did you mean {}?", quoted_list(&suggestions)));
                    }
                    run.log_line(&message);
                    eprintln!("{}", message.red());
                    return Ok(false);
                }
            }
        }

        // Initial probe, memoized for this run.
        if let Some(script) = dep.met.clone() {
            let probe = self.run_met_probe(run, dep, &script, args).await?;
            if probe {
                run.log_line(&format!("'{}' is already met.", dep.name));
                return Ok(true);
            }
            run.log_line(&format!("'{}' is unmet.", dep.name));
        }

        let Some(meet_script) = dep.meet.clone() else {
            if dep.met.is_none() {
                // Neither block: nothing to check, nothing to do.
                run.log_line(&format!("'{}' is trivially met.", dep.name));
                return Ok(true);
            }
            run.log_line(&format!("'{}' is unmet and has no meet block.", dep.name));
            return Ok(false);
        };

        run.log_line(&format!("Meeting '{}'...", dep.name));
        let out = ShellCommand::new(meet_script).envs(args).execute().await?;
        log_shell_output(run, &out.stdout, &out.stderr);
        if !out.success {
            run.log_line(&format!("'{}' failed to meet.", dep.name));
            return Ok(false);
        }

        // Confirm with a fresh probe; the pre-meet answer is stale by
        // construction, so the cache entry is overwritten, not consulted.
        if let Some(script) = dep.met.clone() {
            let out = ShellCommand::new(script).envs(args).execute().await?;
            log_shell_output(run, &out.stdout, &out.stderr);
            run.cache.store(&met_cache_key(dep), probe_value(out.success));
            if !out.success {
                run.log_line(&format!(
                    "'{}' met block ran, but the dep is still unmet.",
                    dep.name
                ));
                return Ok(false);
            }
        }
        run.log_line(&format!("'{}' met.", dep.name));
        Ok(true)
    }

    /// Runs the met? probe through the run cache.
    async fn run_met_probe(
        &self,
        run: &mut RunState,
        dep: &Arc<Dep>,
        script: &str,
        args: &BTreeMap<String, String>,
    ) -> Result<bool> {
        let key = met_cache_key(dep);
        let script = script.to_string();
        let env = args.clone();
        let mut was_hit = false;
        let value = run
            .cache
            .cached_with(
                &key,
                |_| was_hit = true,
                || async move {
                    let out = ShellCommand::new(script).envs(&env).execute().await?;
                    Ok(json!({
                        "success": out.success,
                        "stdout": out.stdout,
                        "stderr": out.stderr,
                    }))
                },
            )
            .await?;

        if was_hit {
            run.log_line(&format!("'{}' met? (cached)", dep.name));
        } else {
            let stdout = value["stdout"].as_str().unwrap_or("").to_string();
            let stderr = value["stderr"].as_str().unwrap_or("").to_string();
            log_shell_output(run, &stdout, &stderr);
        }
        Ok(value["success"].as_bool().unwrap_or(false))
    }

    /// Removes persisted variable state from older releases. Idempotent
    /// schema-migration hygiene; failures here never block a run.
    fn cleanup_saved_vars(&self) {
        let vars = self.paths.vars_dir();
        if vars.exists() {
            if let Err(e) = std::fs::remove_dir_all(&vars) {
                tracing::debug!(target: "task", "Failed to clean {}: {}", vars.display(), e);
            }
        }
    }
}

fn met_cache_key(dep: &Dep) -> String {
    format!("met? {}", dep.contextual_name())
}

fn probe_value(success: bool) -> Value {
    json!({ "success": success })
}

fn log_shell_output(run: &mut RunState, stdout: &str, stderr: &str) {
    for line in stdout.lines().chain(stderr.lines()) {
        run.log_line(line);
    }
}

/// The first line of every per-dep log: engine version and runtime.
#[must_use]
pub fn runtime_banner() -> String {
    format!(
        "# meet {} ({} {})",
        crate::VERSION,
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

/// Splits caller arguments into those the dep declares and those it would
/// reject.
fn partition_args(
    dep: &Dep,
    with_args: &BTreeMap<String, String>,
) -> (BTreeMap<String, String>, Vec<String>) {
    let mut accepted = BTreeMap::new();
    let mut ignored = Vec::new();
    for (key, value) in with_args {
        if dep.accepts_param(key) {
            accepted.insert(key.clone(), value.clone());
        } else {
            ignored.push(key.clone());
        }
    }
    (accepted, ignored)
}

/// Plural-aware warning naming exactly the ignored argument keys.
fn unexpected_args_warning(dep_name: &str, ignored: &[String]) -> String {
    format!(
        "Ignoring unexpected argument{} {}, which the dep '{}' would reject.",
        if ignored.len() > 1 { "s" } else { "" },
        quoted_list(ignored),
        dep_name
    )
}

fn quoted_list(items: &[String]) -> String {
    items.iter().map(|i| format!("'{i}'")).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dep_with_params(params: &[&str]) -> Dep {
        Dep {
            name: "sample".to_string(),
            source_name: "test".to_string(),
            source_uri: "https://example.com/deps.git".to_string(),
            requires: Vec::new(),
            params: params.iter().map(|p| (*p).to_string()).collect(),
            met: None,
            meet: None,
        }
    }

    #[test]
    fn test_partition_args_drops_undeclared_keys() {
        let dep = dep_with_params(&["a", "b"]);
        let mut with_args = BTreeMap::new();
        with_args.insert("a".to_string(), "1".to_string());
        with_args.insert("c".to_string(), "2".to_string());

        let (accepted, ignored) = partition_args(&dep, &with_args);
        assert_eq!(accepted.get("a").map(String::as_str), Some("1"));
        assert!(!accepted.contains_key("c"));
        assert_eq!(ignored, vec!["c".to_string()]);
    }

    #[test]
    fn test_unexpected_args_warning_singular() {
        let warning = unexpected_args_warning("sample", &["c".to_string()]);
        assert_eq!(
            warning,
            "Ignoring unexpected argument 'c', which the dep 'sample' would reject."
        );
    }

    #[test]
    fn test_unexpected_args_warning_plural() {
        let warning = unexpected_args_warning("sample", &["c".to_string(), "d".to_string()]);
        assert_eq!(
            warning,
            "Ignoring unexpected arguments 'c', 'd', which the dep 'sample' would reject."
        );
    }

    #[test]
    fn test_runtime_banner_names_the_version() {
        let banner = runtime_banner();
        assert!(banner.starts_with("# meet "));
        assert!(banner.contains(crate::VERSION));
    }

    #[test]
    fn test_log_path_mirrors_contextual_name() {
        let paths = crate::config::Paths::with_data_dir(PathBuf::from("/tmp/meet-test"));
        let task = Task::new(RunOptions::default(), paths);
        let dep = dep_with_params(&[]);
        assert_eq!(
            task.log_path_for(&dep),
            PathBuf::from("/tmp/meet-test/logs/test/sample")
        );
    }
}
