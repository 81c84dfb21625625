//! Runtime for the `launchpad` binary.
//!
//! The binary answers one question for the job it runs in: which launcher
//! backend should start the runtime daemons here? It loads configuration,
//! installs structured telemetry, registers the built-in backends, and runs
//! the selection lifecycle from [`launchpad_plm`] against the process
//! environment.
//!
//! Two commands are available:
//!
//! - `select` (the default) prints `selected <name> (priority P)` and exits
//!   successfully, or prints that no launcher is available and fails.
//! - `backends` lists the registered backends with their parameters, as text
//!   or, with `--json`, as a JSON document.
//!
//! Configuration flags (`--config-path`, `--log-filter`, `--log-format`,
//! `--launcher`, `--params`) must precede the command. Diagnostics go to
//! stderr; stdout carries only command output.

use std::ffi::OsString;
use std::io::{self, Write};
use std::process::ExitCode;

use clap::Parser;
use launchpad_plm::{ComponentRegistry, EnvironmentProbe, PlmError, SystemEnvironment};
use thiserror::Error;

mod bootstrap;
mod cli;
mod config;
mod health;
mod report;
mod telemetry;

pub use bootstrap::{
    BootstrapError, Bootstrapped, ConfigLoader, Discovery, OrthoConfigLoader, Prepared,
    StaticConfigLoader, bootstrap_with, discover, prepare,
};
pub use health::{SelectionReporter, StructuredSelectionReporter};
pub use telemetry::{TelemetryError, TelemetryHandle};

use cli::{Cli, CliCommand};
use config::{command_arguments, split_config_arguments};
use report::{BackendListing, write_selection};

/// Builds the registry of candidate backends.
pub type RegistryFactory<'a> = &'a dyn Fn() -> Result<ComponentRegistry, PlmError>;

/// Collaborators used by [`run_with`].
pub struct Runtime<'a> {
    /// Loads configuration from the configuration flags.
    pub loader: &'a dyn ConfigLoader,
    /// Environment the backends probe.
    pub env: &'a dyn EnvironmentProbe,
    /// Receives bootstrap and selection events.
    pub reporter: &'a dyn SelectionReporter,
    /// Supplies the backends to choose from.
    pub registry: RegistryFactory<'a>,
}

impl Runtime<'_> {
    fn execute<W: Write>(&self, args: &[OsString], stdout: &mut W) -> Result<ExitCode, AppError> {
        let split = split_config_arguments(args);
        let cli = Cli::try_parse_from(command_arguments(args, &split))
            .map_err(AppError::CliUsage)?;
        let bootstrapped = bootstrap_with(self.loader, &split.config_arguments, self.reporter)?;
        let registry = (self.registry)()
            .map_err(|source| BootstrapError::Discovery { source })
            .inspect_err(|error| self.reporter.bootstrap_failed(error))?;

        match cli.command() {
            CliCommand::Select => {
                let discovery =
                    discover(bootstrapped.config(), registry, self.env, self.reporter)?;
                write_selection(stdout, discovery.outcome())?;
                Ok(if discovery.outcome().is_selected() {
                    ExitCode::SUCCESS
                } else {
                    ExitCode::FAILURE
                })
            }
            CliCommand::Backends { json } => {
                let prepared = prepare(bootstrapped.config(), registry, self.env)
                    .inspect_err(|error| self.reporter.bootstrap_failed(error))?;
                let listing = BackendListing::from_prepared(&prepared);
                if json {
                    listing.write_json(stdout)?;
                } else {
                    listing.write_text(stdout)?;
                }
                Ok(ExitCode::SUCCESS)
            }
        }
    }
}

/// Runs the launcher against the process environment and built-in backends.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    let builtin = ComponentRegistry::builtin;
    let runtime = Runtime {
        loader: &OrthoConfigLoader,
        env: &SystemEnvironment,
        reporter: &StructuredSelectionReporter,
        registry: &builtin,
    };
    run_with(&runtime, args, stdout, stderr)
}

/// Runs the launcher with substituted collaborators.
#[must_use]
pub fn run_with<I, W, E>(runtime: &Runtime<'_>, args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    let args: Vec<OsString> = args.into_iter().collect();
    match runtime.execute(&args, stdout) {
        Ok(exit_code) => exit_code,
        Err(AppError::CliUsage(error)) if !error.use_stderr() => {
            // `--help` and `--version` belong on stdout.
            match write!(stdout, "{error}") {
                Ok(()) => ExitCode::SUCCESS,
                Err(_) => ExitCode::FAILURE,
            }
        }
        Err(error) => {
            drop(writeln!(stderr, "{error}"));
            ExitCode::FAILURE
        }
    }
}

#[derive(Debug, Error)]
enum AppError {
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
    #[error("failed to serialise backend report: {0}")]
    SerialiseReport(serde_json::Error),
    #[error("failed to write output: {0}")]
    WriteOutput(io::Error),
}
