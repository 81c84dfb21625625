//! Tracing subscriber installation for the launcher.
//!
//! The subscriber is process-wide, so only the first call to [`initialise`]
//! decides the filter and output format. Diagnostics are written to stderr.

use std::io::{self, IsTerminal};

use launchpad_config::{Config, LogFormat};
use once_cell::sync::OnceCell;
use tracing::subscriber::{self, SetGlobalDefaultError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::UtcTime;

static INSTALLED_FORMAT: OnceCell<LogFormat> = OnceCell::new();

/// Proof that the global subscriber is in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryHandle {
    format: LogFormat,
}

impl TelemetryHandle {
    /// Output format of the installed subscriber.
    ///
    /// This is the format of the first successful initialisation, which may
    /// differ from the configuration passed to a later call.
    #[must_use]
    pub const fn format(self) -> LogFormat {
        self.format
    }
}

/// Failures while installing the subscriber.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// `log_filter` is not a valid `EnvFilter` directive.
    #[error("log filter '{directive}' is invalid: {message}")]
    Filter {
        /// Directive as configured.
        directive: String,
        /// Parser diagnostic.
        message: String,
    },
    /// Some other subscriber already owns the global slot.
    #[error("global tracing subscriber already set: {0}")]
    Subscriber(#[source] SetGlobalDefaultError),
}

/// Installs the global subscriber described by `config` on first use.
///
/// # Errors
///
/// Returns [`TelemetryError::Filter`] when `log_filter` does not parse and
/// [`TelemetryError::Subscriber`] when a foreign subscriber is already
/// installed.
pub fn initialise(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    INSTALLED_FORMAT
        .get_or_try_init(|| install(config).map(|()| config.log_format()))
        .map(|format| TelemetryHandle { format: *format })
}

fn parse_filter(directive: &str) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(directive).map_err(|error| TelemetryError::Filter {
        directive: directive.to_owned(),
        message: error.to_string(),
    })
}

fn install(config: &Config) -> Result<(), TelemetryError> {
    let filter = parse_filter(config.log_filter())?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_timer(UtcTime::rfc_3339());

    let outcome = match config.log_format() {
        LogFormat::Json => {
            subscriber::set_global_default(builder.json().flatten_event(true).finish())
        }
        LogFormat::Compact => subscriber::set_global_default(builder.compact().finish()),
    };
    outcome.map_err(TelemetryError::Subscriber)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unparsable_filters_name_the_directive() {
        let error = parse_filter("launchpad=[").expect_err("filter should not parse");
        assert!(matches!(
            error,
            TelemetryError::Filter { ref directive, .. } if directive == "launchpad=["
        ));
    }

    #[test]
    fn later_initialisation_keeps_the_first_format() {
        let first = initialise(&Config::default()).expect("first initialisation");
        let compact = Config {
            log_format: LogFormat::Compact,
            ..Config::default()
        };
        let second = initialise(&compact).expect("second initialisation");
        assert_eq!(second.format(), first.format());
    }
}
