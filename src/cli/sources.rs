//! Source catalog management: add, remove, clear, list, update.

use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;

use crate::config::Paths;
use crate::source::SourceStore;

/// `meet sources <operation>`.
#[derive(Args, Debug)]
pub struct SourcesCommand {
    #[command(subcommand)]
    command: SourcesSubcommand,
}

#[derive(Subcommand, Debug)]
enum SourcesSubcommand {
    /// Register a source: clone it and record it in the manifest
    Add {
        /// Unique source name (also the clone directory name)
        name: String,
        /// Remote URI (https, ssh, or a local path)
        uri: String,
    },
    /// Deregister a source and delete its clone.
    ///
    /// Refused if the clone has uncommitted changes or untracked files.
    Remove {
        /// Name of the source to remove
        name: String,
    },
    /// Delete every source clone and empty the manifest, unconditionally
    Clear,
    /// List registered sources
    List,
    /// Fetch updates for every registered source
    Update,
}

impl SourcesCommand {
    /// Executes the selected catalog operation.
    pub async fn execute(self, paths: &Paths) -> Result<()> {
        crate::git::ensure_git_available()?;
        let mut store = SourceStore::open(paths)?;
        match self.command {
            SourcesSubcommand::Add {
                name,
                uri,
            } => {
                store.add(&name, &uri).await?;
                println!("{} source '{}'", "Added".green(), name);
            }
            SourcesSubcommand::Remove {
                name,
            } => {
                store.remove(&name).await?;
                println!("{} source '{}'", "Removed".green(), name);
            }
            SourcesSubcommand::Clear => {
                let count = store.count();
                store.clear().await?;
                println!("{} {} source(s)", "Cleared".green(), count);
            }
            SourcesSubcommand::List => {
                // Surface manifest/filesystem drift, but still list.
                if let Err(e) = store.check_consistency() {
                    eprintln!("{}", format!("warning: {e:#}").yellow());
                }
                if store.sources().is_empty() {
                    println!("No sources registered.");
                } else {
                    for source in store.sources() {
                        println!("{}  {}", source.name.bold(), source.uri.dimmed());
                    }
                }
            }
            SourcesSubcommand::Update => {
                store.sync_all().await?;
                println!("{} {} source(s)", "Synced".green(), store.count());
            }
        }
        Ok(())
    }
}
