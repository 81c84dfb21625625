//! Launcher entrypoint.
//!
//! Delegates to [`launchpad::run`], which loads configuration, installs
//! telemetry, and runs the requested command against the process
//! environment.

use std::io::{self, StderrLock, StdoutLock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout: StdoutLock<'_> = io::stdout().lock();
    let mut stderr: StderrLock<'_> = io::stderr().lock();
    launchpad::run(std::env::args_os(), &mut stdout, &mut stderr)
}
