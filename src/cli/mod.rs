//! Command-line interface.
//!
//! The default invocation meets deps: `meet <dep>... [--set KEY=VALUE]...`.
//! Source catalog management lives under the `sources` subcommand:
//!
//! ```bash
//! meet sources add core https://github.com/org/core-deps.git
//! meet sources list
//! meet curl rbenv --set version=3.3.0
//! ```
//!
//! Each command module owns its argument structure and execution logic; this
//! module only parses and dispatches.

mod meet;
mod sources;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::config::Paths;

/// Top-level argument structure.
///
/// `args_conflicts_with_subcommands` lets bare dep names be the default
/// command while `sources` remains a real subcommand: `meet curl` meets,
/// `meet sources list` lists.
#[derive(Parser, Debug)]
#[command(
    name = "meet",
    about = "Declarative system provisioning: describe deps, meet them idempotently",
    version,
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    meet: meet::MeetCommand,

    /// Verbose output: full shell transcripts and debug-level tracing
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage the catalog of dep sources
    Sources(sources::SourcesCommand),
}

impl Cli {
    /// Whether `--debug` was given (read before logging is initialized).
    #[must_use]
    pub const fn debug(&self) -> bool {
        self.debug
    }

    /// Dispatches to the selected command.
    pub async fn execute(self) -> Result<()> {
        let paths = Paths::new()?;
        match self.command {
            Some(Commands::Sources(cmd)) => cmd.execute(&paths).await,
            None => self.meet.execute(&paths, self.debug).await,
        }
    }
}

/// Parses one `--set KEY=VALUE` binding.
fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{s}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_structure_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_bare_names_parse_as_meet() {
        let cli = Cli::try_parse_from(["meet", "curl", "rbenv"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.meet.deps, vec!["curl", "rbenv"]);
    }

    #[test]
    fn test_set_bindings_parse() {
        let cli =
            Cli::try_parse_from(["meet", "rbenv", "--set", "version=3.3.0", "--set", "a=b=c"])
                .unwrap();
        assert_eq!(
            cli.meet.set,
            vec![
                ("version".to_string(), "3.3.0".to_string()),
                ("a".to_string(), "b=c".to_string())
            ]
        );
    }

    #[test]
    fn test_malformed_set_binding_rejected() {
        assert!(Cli::try_parse_from(["meet", "rbenv", "--set", "no-equals"]).is_err());
        assert!(Cli::try_parse_from(["meet", "rbenv", "--set", "=value"]).is_err());
    }

    #[test]
    fn test_sources_subcommand_parses() {
        let cli =
            Cli::try_parse_from(["meet", "sources", "add", "core", "https://example.com/d.git"])
                .unwrap();
        assert!(matches!(cli.command, Some(Commands::Sources(_))));
    }

    #[test]
    fn test_debug_flag_is_global() {
        let cli = Cli::try_parse_from(["meet", "sources", "list", "--debug"]).unwrap();
        assert!(cli.debug());
    }
}
