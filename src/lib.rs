//! meet - declarative system provisioning
//!
//! `meet` executes named "deps": idempotent system-configuration units with
//! requirements, parameters, and a meeting procedure. Dep definitions live in
//! git repositories ("sources") registered by name; the engine clones and
//! synchronizes them, resolves dep names across all sources (with fuzzy
//! suggestions on a miss), and drives the met?/meet cycle against the live
//! machine, memoizing expensive probes within a run and keeping a durable
//! per-dep log of everything that happened.
//!
//! # Architecture Overview
//!
//! - Dep sources are plain git repositories containing `*.toml` dep files;
//!   the registered set is recorded in a flat manifest (`~/.meet/sources.toml`)
//!   that is kept consistent with the clones on disk
//! - A run ([`task::Task::process`]) is single-flight per task instance:
//!   dep names are processed strictly in order and the batch short-circuits
//!   on the first dep that fails to meet
//! - Run outcomes are spooled as [`report::RunReport`] records and flushed by
//!   a detached background task, decoupled from the run's critical path
//!
//! # Core Modules
//!
//! - [`task`] - Run orchestration: exclusivity, per-dep logging, the run cache
//! - [`dep`] - Dep definitions, loading, and name resolution with suggestions
//! - [`source`] - Source registration, cloning, and safe removal
//! - [`report`] - Outcome reports, spooling, and best-effort delivery
//!
//! # Supporting Modules
//!
//! - [`cli`] - Command-line interface (`meet <dep...>`, `meet sources ...`)
//! - [`config`] - Data-directory layout and per-run options
//! - [`core`] - Error types shared across the crate
//! - [`git`] - Git operations wrapper using the system git command
//! - [`shell`] - Shell runner for met?/meet procedures
//! - [`utils`] - Filesystem helpers
//!
//! # Dep Files
//!
//! Each source repository holds one or more TOML files declaring deps:
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
//! # Command-Line Usage
//!
//! ```bash
//! # Register a dep source
//! meet sources add core https://github.com/example/meet-deps.git
//!
//! # Meet one or more deps, in order
//! meet curl rbenv --set version=3.3.0
//!
//! # Inspect and manage sources
//! meet sources list
//! meet sources remove core
//! meet sources clear
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod dep;
pub mod git;
pub mod report;
pub mod shell;
pub mod source;
pub mod task;
pub mod utils;

/// Tool version reported in log banners and run reports.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
