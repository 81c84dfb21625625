//! Behavioural tests for configuration layering.

use std::cell::RefCell;
use std::ffi::OsString;
use std::fs;
use std::sync::{Mutex, MutexGuard, PoisonError};

use launchpad_config::{Config, LogFormat, default_log_filter};
use once_cell::sync::Lazy;
use ortho_config::OrthoConfig;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tempfile::TempDir;

static ENV_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

const CLEARED_VARIABLES: [&str; 5] = [
    "LAUNCHPAD_CONFIG_PATH",
    "LAUNCHPAD_LAUNCHER",
    "LAUNCHPAD_LOG_FILTER",
    "LAUNCHPAD_LOG_FORMAT",
    "LAUNCHPAD_PARAMS",
];

struct Harness {
    temp_dir: TempDir,
    cli_args: RefCell<Vec<OsString>>,
    env_overrides: RefCell<Vec<(String, Option<OsString>)>>,
    loaded: RefCell<Option<Config>>,
    error: RefCell<Option<String>>,
    _guard: MutexGuard<'static, ()>,
}

impl Harness {
    fn new() -> Self {
        let guard = ENV_MUTEX.lock().unwrap_or_else(PoisonError::into_inner);
        let temp_dir = match TempDir::new() {
            Ok(dir) => dir,
            Err(error) => panic!("failed to create temporary directory: {error}"),
        };
        let harness = Self {
            temp_dir,
            cli_args: RefCell::new(vec![OsString::from("launchpad")]),
            env_overrides: RefCell::new(Vec::new()),
            loaded: RefCell::new(None),
            error: RefCell::new(None),
            _guard: guard,
        };
        for key in CLEARED_VARIABLES {
            harness.remove_env(key);
        }
        harness
    }

    fn write_config(&self, contents: &str) {
        let path = self.temp_dir.path().join("launchpad.toml");
        if let Err(error) = fs::write(&path, contents) {
            panic!("failed to write configuration: {error}");
        }
        let mut args = self.cli_args.borrow_mut();
        args.push(OsString::from("--config-path"));
        args.push(path.into_os_string());
    }

    fn set_env(&self, key: &str, value: &str) {
        let previous = std::env::var_os(key);
        // Environment mutation is `unsafe` in edition 2024. The mutex guard
        // serialises access and `Drop` restores the previous values.
        unsafe { std::env::set_var(key, value) };
        self.env_overrides
            .borrow_mut()
            .push((key.to_owned(), previous));
    }

    fn remove_env(&self, key: &str) {
        let previous = std::env::var_os(key);
        unsafe { std::env::remove_var(key) };
        self.env_overrides
            .borrow_mut()
            .push((key.to_owned(), previous));
    }

    fn push_cli_arg(&self, arg: impl Into<OsString>) {
        self.cli_args.borrow_mut().push(arg.into());
    }

    fn load(&self) {
        if self.loaded.borrow().is_some() || self.error.borrow().is_some() {
            return;
        }
        let args = self.cli_args.borrow().clone();
        match Config::load_from_iter(args) {
            Ok(config) => *self.loaded.borrow_mut() = Some(config),
            Err(error) => *self.error.borrow_mut() = Some(error.to_string()),
        }
    }

    fn config(&self) -> Config {
        self.load();
        if let Some(error) = self.error.borrow().as_ref() {
            panic!("configuration failed to load: {error}");
        }
        match self.loaded.borrow().as_ref() {
            Some(config) => config.clone(),
            None => panic!("configuration was not loaded"),
        }
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        let mut overrides = self.env_overrides.borrow_mut();
        while let Some((key, value)) = overrides.pop() {
            match value {
                Some(os_value) => unsafe { std::env::set_var(&key, os_value) },
                None => unsafe { std::env::remove_var(&key) },
            }
        }
    }
}

#[fixture]
fn harness() -> Harness {
    Harness::new()
}

#[given("a configuration file setting the launcher to \"{directive}\"")]
fn given_configuration_file(harness: &Harness, directive: String) {
    harness.write_config(&format!("launcher = \"{directive}\"\n"));
}

#[given("the environment sets the launcher to \"{directive}\"")]
fn given_environment_override(harness: &Harness, directive: String) {
    harness.set_env("LAUNCHPAD_LAUNCHER", &directive);
}

#[when("the CLI sets the launcher to \"{directive}\"")]
fn when_cli_launcher(harness: &Harness, directive: String) {
    harness.push_cli_arg("--launcher");
    harness.push_cli_arg(directive);
}

#[when("the CLI sets the parameter \"{entry}\"")]
fn when_cli_parameter(harness: &Harness, entry: String) {
    harness.push_cli_arg("--params");
    harness.push_cli_arg(entry);
}

#[when("the CLI sets the log format to \"{format}\"")]
fn when_cli_log_format(harness: &Harness, format: String) {
    harness.push_cli_arg("--log-format");
    harness.push_cli_arg(format);
}

#[when("the configuration loads without overrides")]
fn when_load_without_overrides(harness: &Harness) {
    harness.load();
}

#[then("loading the configuration resolves the launcher to \"{directive}\"")]
fn then_resolved_launcher(harness: &Harness, directive: String) {
    assert_eq!(harness.config().launcher(), Some(directive.as_str()));
}

#[then("loading the configuration yields {count} parameter overrides")]
fn then_parameter_count(harness: &Harness, count: usize) {
    let config = harness.config();
    assert_eq!(config.params().len(), count, "params: {:?}", config.params());
}

#[then("loading the configuration applies the built-in defaults")]
fn then_defaults_applied(harness: &Harness) {
    let config = harness.config();
    assert_eq!(config.log_filter(), default_log_filter());
    assert_eq!(config.log_format(), LogFormat::Json);
    assert_eq!(config.launcher(), None);
    assert!(config.params().is_empty());
}

#[then("loading the configuration fails")]
fn then_loading_fails(harness: &Harness) {
    harness.load();
    assert!(
        harness.error.borrow().is_some(),
        "configuration loaded unexpectedly: {:?}",
        harness.loaded.borrow()
    );
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "Built-in defaults apply without overrides"
)]
fn defaults_apply(#[from(harness)] harness: Harness) {
    drop(harness);
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "A configuration file sets the launcher directive"
)]
fn file_sets_launcher(#[from(harness)] harness: Harness) {
    drop(harness);
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "The environment overrides the configuration file"
)]
fn environment_overrides_file(#[from(harness)] harness: Harness) {
    drop(harness);
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "The command line overrides the environment"
)]
fn cli_overrides_environment(#[from(harness)] harness: Harness) {
    drop(harness);
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "Parameter overrides are collected from the command line"
)]
fn cli_collects_parameters(#[from(harness)] harness: Harness) {
    drop(harness);
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "An unknown log format is rejected"
)]
fn unknown_log_format_rejected(#[from(harness)] harness: Harness) {
    drop(harness);
}
