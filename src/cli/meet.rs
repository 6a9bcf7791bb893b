//! The default command: meet one or more deps.

use anyhow::{Result, bail};
use clap::Args;
use std::collections::BTreeMap;

use crate::config::{Paths, RunOptions};
use crate::task::Task;

/// Arguments for a meet run.
#[derive(Args, Debug, Default)]
pub struct MeetCommand {
    /// Dep names to meet, processed strictly in order
    #[arg(value_name = "DEP")]
    pub deps: Vec<String>,

    /// Bind an argument for the named deps (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = super::parse_key_value)]
    pub set: Vec<(String, String)>,

    /// File a local bug report for each processed dep
    #[arg(long)]
    pub report: bool,
}

impl MeetCommand {
    /// Runs the deps through a fresh [`Task`].
    ///
    /// An unmet batch is an error so the process exits non-zero; partial
    /// progress (deps met before the failure) is kept, not rolled back.
    pub async fn execute(self, paths: &Paths, debug: bool) -> Result<()> {
        if self.deps.is_empty() {
            bail!("No deps named. Try 'meet <dep>...' or 'meet --help'.");
        }

        // Later bindings win, matching shell variable semantics.
        let args: BTreeMap<String, String> = self.set.into_iter().collect();

        let opts = RunOptions {
            debug,
            reportable: self.report,
        };
        let task = Task::new(opts, paths.clone());
        if task.process(&self.deps, &args).await? {
            Ok(())
        } else {
            bail!("Not all deps were met.")
        }
    }
}
