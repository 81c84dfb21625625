//! Shared configuration for the launchpad binary.
//!
//! Values are layered by `ortho_config`: built-in defaults, then an optional
//! configuration file (`--config-path` or `LAUNCHPAD_CONFIG_PATH`), then
//! `LAUNCHPAD_*` environment variables, then command-line flags. Later layers
//! win; list values such as `params` are appended across layers.
//!
//! Backend parameters have their own channel: `LAUNCHPAD_MCA_<name>`
//! variables are read directly by the parameter store, while `params`
//! entries here become explicit overrides that outrank them.

mod defaults;
mod logging;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_LOG_FILTER, default_log_filter, default_log_filter_string, default_log_format,
};
pub use logging::{LogFormat, LogFormatParseError};

/// Runtime configuration for the launchpad binary.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "LAUNCHPAD")]
pub struct Config {
    /// Tracing filter expression, e.g. `info` or `launchpad_plm=debug`.
    #[serde(default = "default_log_filter_string")]
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Output format for diagnostics written to stderr.
    #[serde(default = "default_log_format")]
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
    /// Backend selection directive: `a,b` to include, `^a,b` to exclude.
    #[serde(default)]
    pub launcher: Option<String>,
    /// Backend parameter overrides as `name=value` entries.
    #[serde(default)]
    #[ortho_config(merge_strategy = "append")]
    pub params: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            launcher: None,
            params: Vec::new(),
        }
    }
}

impl Config {
    /// Tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Diagnostic output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Backend selection directive, when one was configured.
    ///
    /// Blank directives are treated as absent.
    #[must_use]
    pub fn launcher(&self) -> Option<&str> {
        self.launcher
            .as_deref()
            .map(str::trim)
            .filter(|directive| !directive.is_empty())
    }

    /// Backend parameter overrides in the order they were supplied.
    #[must_use]
    pub fn params(&self) -> &[String] {
        &self.params
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.log_filter(), DEFAULT_LOG_FILTER);
        assert_eq!(config.log_format(), LogFormat::Json);
        assert_eq!(config.launcher(), None);
        assert!(config.params().is_empty());
    }

    #[rstest]
    #[case(None, None)]
    #[case(Some("   "), None)]
    #[case(Some(" ^ssh "), Some("^ssh"))]
    fn launcher_ignores_blank_directives(
        #[case] configured: Option<&str>,
        #[case] expected: Option<&str>,
    ) {
        let config = Config {
            launcher: configured.map(str::to_owned),
            ..Config::default()
        };
        assert_eq!(config.launcher(), expected);
    }
}
