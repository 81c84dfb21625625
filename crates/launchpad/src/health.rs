//! Structured reporting for bootstrap and backend selection events.

use std::sync::Arc;

use launchpad_config::Config;
use launchpad_plm::{BackendOpenError, SelectionOutcome};

use crate::bootstrap::BootstrapError;

/// Observer trait used to surface selection events to telemetry sinks.
#[cfg_attr(test, mockall::automock)]
pub trait SelectionReporter: Send + Sync {
    /// Invoked once configuration and telemetry are ready.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when any bootstrap or discovery step fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked before backends are opened.
    fn discovery_starting(&self, candidates: usize);

    /// Invoked for each backend whose `open` failed.
    fn backend_open_failed(&self, error: &BackendOpenError);

    /// Invoked once the winner, or the lack of one, is known.
    fn selection_completed(&self, outcome: &SelectionOutcome);
}

impl<T> SelectionReporter for Arc<T>
where
    T: SelectionReporter + ?Sized,
{
    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn discovery_starting(&self, candidates: usize) {
        (**self).discovery_starting(candidates);
    }

    fn backend_open_failed(&self, error: &BackendOpenError) {
        (**self).backend_open_failed(error);
    }

    fn selection_completed(&self, outcome: &SelectionOutcome) {
        (**self).selection_completed(outcome);
    }
}

/// Default reporter that records events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredSelectionReporter;

impl StructuredSelectionReporter {
    /// Builds a new reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl SelectionReporter for StructuredSelectionReporter {
    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: "launchpad::health",
            event = "bootstrap_succeeded",
            log_filter = %config.log_filter(),
            log_format = %config.log_format(),
            launcher = ?config.launcher(),
            overrides = config.params().len(),
            "launcher bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: "launchpad::health",
            event = "bootstrap_failed",
            error = %error,
            "launcher bootstrap failed"
        );
    }

    fn discovery_starting(&self, candidates: usize) {
        tracing::info!(
            target: "launchpad::health",
            event = "discovery_starting",
            candidates,
            "discovering launcher backends"
        );
    }

    fn backend_open_failed(&self, error: &BackendOpenError) {
        tracing::warn!(
            target: "launchpad::health",
            event = "backend_open_failed",
            backend = %error.backend,
            message = %error.message(),
            error = ?error,
            "launcher backend unavailable"
        );
    }

    fn selection_completed(&self, outcome: &SelectionOutcome) {
        match outcome.selection() {
            Some(selection) => tracing::info!(
                target: "launchpad::health",
                event = "selection_completed",
                backend = %selection.descriptor(),
                priority = selection.priority(),
                "launcher backend selected"
            ),
            None => tracing::warn!(
                target: "launchpad::health",
                event = "selection_empty",
                "no launcher backend available for this environment"
            ),
        }
    }
}
