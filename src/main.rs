//! meet CLI entry point
//!
//! Parses command-line arguments, initializes logging, and dispatches to the
//! requested command. A run in which any dep fails to meet (or a source fails
//! to load) exits non-zero.

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use meet::cli;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    // --debug takes precedence over RUST_LOG; default is warnings only.
    let filter = if cli.debug() {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(true).try_init();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute().await {
        Ok(()) => Ok(()),
        Err(e) => {
            eprintln!("{} {e:#}", "error:".red().bold());
            std::process::exit(1);
        }
    }
}
