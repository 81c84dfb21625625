//! Launcher bootstrap: configuration, telemetry, and backend discovery.

use std::ffi::OsString;
use std::sync::Arc;

use launchpad_config::Config;
use launchpad_plm::{
    ComponentRegistry, EnvironmentProbe, EnvironmentSource, FilterError, LifecycleManager,
    OverrideSource, ParameterError, ParameterStore, PlmError, SelectionFilter, SelectionOutcome,
};
use ortho_config::{OrthoConfig, OrthoError};
use thiserror::Error;

use crate::health::SelectionReporter;
use crate::telemetry::{self, TelemetryError, TelemetryHandle};

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader {
    /// Loads configuration from the configuration flags in `args`.
    ///
    /// # Errors
    ///
    /// Returns the loader's error when any layer fails to parse.
    fn load(&self, args: &[OsString]) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load_from_iter`].
#[derive(Debug, Default, Clone, Copy)]
pub struct OrthoConfigLoader;

impl ConfigLoader for OrthoConfigLoader {
    fn load(&self, args: &[OsString]) -> Result<Config, Arc<OrthoError>> {
        Config::load_from_iter(args.iter().cloned())
    }
}

/// Loader that ignores the arguments and returns a fixed configuration.
#[derive(Debug, Default, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Creates a loader returning `config`.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self, _args: &[OsString]) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Errors surfaced while bootstrapping or discovering backends.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// The launcher directive could not be parsed.
    #[error("invalid launcher directive: {source}")]
    Filter {
        /// Underlying parse error.
        #[source]
        source: FilterError,
    },
    /// A parameter override was malformed or had the wrong type.
    #[error("invalid backend parameter: {source}")]
    Parameters {
        /// Underlying parameter error.
        #[source]
        source: ParameterError,
    },
    /// Backend registration or the lifecycle itself failed.
    #[error("backend discovery failed: {source}")]
    Discovery {
        /// Underlying lifecycle error.
        #[source]
        source: PlmError,
    },
}

/// Configuration and telemetry ready for a command to run.
#[derive(Debug)]
pub struct Bootstrapped {
    config: Config,
    telemetry: TelemetryHandle,
}

impl Bootstrapped {
    /// Resolved configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Telemetry handle, primarily useful for testing.
    #[must_use]
    pub const fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }
}

/// Loads configuration and installs telemetry.
///
/// # Errors
///
/// Returns [`BootstrapError::Configuration`] or
/// [`BootstrapError::Telemetry`]; the reporter is told in both cases.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    config_arguments: &[OsString],
    reporter: &dyn SelectionReporter,
) -> Result<Bootstrapped, BootstrapError> {
    let config = loader
        .load(config_arguments)
        .map_err(|source| BootstrapError::Configuration { source })
        .inspect_err(|error| reporter.bootstrap_failed(error))?;
    let telemetry = telemetry::initialise(&config)
        .map_err(|source| BootstrapError::Telemetry { source })
        .inspect_err(|error| reporter.bootstrap_failed(error))?;
    reporter.bootstrap_succeeded(&config);
    Ok(Bootstrapped { config, telemetry })
}

/// Backends with their parameters declared and resolved, ready to open.
#[derive(Debug)]
pub struct Prepared {
    manager: LifecycleManager,
    store: ParameterStore,
}

impl Prepared {
    /// Lifecycle manager holding every registered backend.
    #[must_use]
    pub const fn manager(&self) -> &LifecycleManager {
        &self.manager
    }

    /// Parameter store with external values applied.
    #[must_use]
    pub const fn store(&self) -> &ParameterStore {
        &self.store
    }
}

/// Registers backend parameters and applies environment and override values.
///
/// Overrides from `config.params()` outrank `LAUNCHPAD_MCA_*` variables.
///
/// # Errors
///
/// Returns [`BootstrapError::Discovery`] for registration conflicts and
/// [`BootstrapError::Parameters`] for malformed or mistyped values.
pub fn prepare(
    config: &Config,
    registry: ComponentRegistry,
    env: &dyn EnvironmentProbe,
) -> Result<Prepared, BootstrapError> {
    let mut manager = LifecycleManager::new(registry);
    let mut store = ParameterStore::new();
    manager
        .register_parameters(&mut store)
        .map_err(|source| BootstrapError::Discovery { source })?;

    let environment = EnvironmentSource::new(env);
    let overrides = OverrideSource::parse(config.params())
        .map_err(|source| BootstrapError::Parameters { source })?;
    store
        .resolve(&[&environment, &overrides])
        .map_err(|source| BootstrapError::Parameters { source })?;
    Ok(Prepared { manager, store })
}

/// Outcome of a discovery round together with the manager that owns the
/// winner.
///
/// Dropping a `Discovery` closes the winning backend.
#[derive(Debug)]
pub struct Discovery {
    prepared: Prepared,
    outcome: SelectionOutcome,
}

impl Discovery {
    /// Winner, or [`SelectionOutcome::NoEligibleBackend`].
    #[must_use]
    pub const fn outcome(&self) -> &SelectionOutcome {
        &self.outcome
    }

    /// Lifecycle manager after selection.
    #[must_use]
    pub const fn manager(&self) -> &LifecycleManager {
        self.prepared.manager()
    }
}

/// Runs the full selection lifecycle against `env`.
///
/// # Errors
///
/// Returns a [`BootstrapError`] for an invalid directive, invalid parameter
/// values, or a registration conflict. An environment with no eligible
/// backend is reported through [`Discovery::outcome`], not as an error.
pub fn discover(
    config: &Config,
    registry: ComponentRegistry,
    env: &dyn EnvironmentProbe,
    reporter: &dyn SelectionReporter,
) -> Result<Discovery, BootstrapError> {
    run_discovery(config, registry, env, reporter)
        .inspect_err(|error| reporter.bootstrap_failed(error))
}

fn run_discovery(
    config: &Config,
    registry: ComponentRegistry,
    env: &dyn EnvironmentProbe,
    reporter: &dyn SelectionReporter,
) -> Result<Discovery, BootstrapError> {
    let filter = SelectionFilter::from_directive(config.launcher())
        .map_err(|source| BootstrapError::Filter { source })?;
    reporter.discovery_starting(registry.len());
    let mut prepared = prepare(config, registry, env)?;
    let outcome = prepared
        .manager
        .discover(&mut prepared.store, env, &filter)
        .map_err(|source| BootstrapError::Discovery { source })?;
    for failure in prepared.manager.open_failures() {
        reporter.backend_open_failed(failure);
    }
    reporter.selection_completed(&outcome);
    Ok(Discovery { prepared, outcome })
}
