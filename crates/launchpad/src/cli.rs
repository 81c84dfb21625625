//! Command-line interface definitions for the launcher.

use clap::{Parser, Subcommand};

/// Selects the launcher backend for the current allocation.
#[derive(Parser, Debug)]
#[command(name = "launchpad", disable_help_subcommand = true)]
pub(crate) struct Cli {
    /// Command to run; defaults to `select`.
    #[command(subcommand)]
    pub(crate) command: Option<CliCommand>,
}

impl Cli {
    pub(crate) fn command(&self) -> CliCommand {
        self.command.unwrap_or(CliCommand::Select)
    }
}

/// Structured subcommands.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CliCommand {
    /// Runs discovery and prints the selected backend.
    Select,
    /// Lists registered backends with their parameters.
    Backends {
        /// Emits a JSON document instead of text.
        #[arg(long)]
        json: bool,
    },
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::bare(&["launchpad"], CliCommand::Select)]
    #[case::select(&["launchpad", "select"], CliCommand::Select)]
    #[case::backends(&["launchpad", "backends"], CliCommand::Backends { json: false })]
    #[case::backends_json(&["launchpad", "backends", "--json"], CliCommand::Backends { json: true })]
    fn parses_commands(#[case] args: &[&str], #[case] expected: CliCommand) {
        let cli = Cli::try_parse_from(args).expect("valid command line");
        assert_eq!(cli.command(), expected);
    }

    #[test]
    fn rejects_unknown_commands() {
        assert!(Cli::try_parse_from(["launchpad", "launch"]).is_err());
    }
}
