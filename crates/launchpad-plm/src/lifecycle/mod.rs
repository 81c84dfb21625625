//! Lifecycle orchestration for launcher backends.
//!
//! The [`LifecycleManager`] owns every registered backend and drives it
//! through a fixed sequence:
//!
//! 1. [`register_parameters`](LifecycleManager::register_parameters) declares
//!    each backend's options. A conflict here aborts startup.
//! 2. [`open`](LifecycleManager::open) opens every backend the selection
//!    filter allows. A failed open is logged and the backend is treated as
//!    not eligible; the remaining backends are unaffected.
//! 3. [`query`](LifecycleManager::query) asks every opened backend whether the
//!    environment suits it. All results are gathered before anything is
//!    selected.
//! 4. [`select`](LifecycleManager::select) arbitrates and immediately closes
//!    every backend except the winner.
//!
//! The winner stays open until [`shutdown`](LifecycleManager::shutdown) or the
//! manager is dropped. Calling a step out of order returns
//! [`PlmError::OutOfOrder`].

use std::fmt;

use crate::backend::{BackendDescriptor, Eligibility, LauncherBackend, PLM_FRAMEWORK};
use crate::environment::EnvironmentProbe;
use crate::error::{BackendOpenError, PlmError};
use crate::filter::SelectionFilter;
use crate::params::ParameterStore;
use crate::registry::{ComponentRegistry, RegisteredBackend};
use crate::selector::{self, SelectionOutcome};

/// Where a single backend is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendState {
    /// Parameters not yet declared.
    Unregistered,
    /// Parameters declared; not opened.
    Registered,
    /// Opened; not yet queried.
    Opened,
    /// `open` failed; excluded from the query round.
    OpenFailed,
    /// Excluded by the selection filter; never opened.
    Skipped,
    /// Queried and eligible at the given priority.
    Eligible(i32),
    /// Queried and not eligible.
    Ineligible,
    /// Closed.
    Closed,
}

impl BackendState {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unregistered => "unregistered",
            Self::Registered => "registered",
            Self::Opened => "opened",
            Self::OpenFailed => "open_failed",
            Self::Skipped => "skipped",
            Self::Eligible(_) => "eligible",
            Self::Ineligible => "ineligible",
            Self::Closed => "closed",
        }
    }

    /// Returns `true` for backends that opened successfully and are not yet
    /// closed.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Opened | Self::Eligible(_) | Self::Ineligible)
    }
}

impl fmt::Display for BackendState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eligible(priority) => write!(f, "eligible({priority})"),
            other => f.write_str(other.as_str()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Unregistered,
    Registered,
    Opened,
    Queried,
    Selected,
    ShutDown,
}

impl Phase {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Unregistered => "unregistered",
            Self::Registered => "registered",
            Self::Opened => "opened",
            Self::Queried => "queried",
            Self::Selected => "selected",
            Self::ShutDown => "shut down",
        }
    }
}

struct Slot {
    descriptor: BackendDescriptor,
    backend: Box<dyn LauncherBackend>,
    state: BackendState,
    eligibility: Eligibility,
}

impl Slot {
    fn close(&mut self) {
        if self.state == BackendState::Closed {
            return;
        }
        self.backend.close();
        tracing::debug!(
            target: "launchpad_plm::lifecycle",
            event = "backend_closed",
            backend = %self.descriptor.name(),
            previous = %self.state,
            "backend closed"
        );
        self.state = BackendState::Closed;
        self.eligibility = Eligibility::Ineligible;
    }
}

/// Drives registered backends from registration to selection.
///
/// # Example
///
/// ```
/// use launchpad_plm::{
///     ComponentRegistry, LifecycleManager, ParameterStore, SelectionFilter, StaticEnvironment,
/// };
///
/// let registry = ComponentRegistry::builtin().expect("built-in backends");
/// let mut manager = LifecycleManager::new(registry);
/// let mut store = ParameterStore::new();
/// manager.register_parameters(&mut store).expect("no conflicts");
///
/// let env = StaticEnvironment::new().with_var("SLURM_JOBID", "1234");
/// let outcome = manager
///     .discover(&mut store, &env, &SelectionFilter::All)
///     .expect("lifecycle runs in order");
/// assert_eq!(outcome.selected_name(), Some("slurm"));
/// assert_eq!(manager.active_count(), 1);
/// ```
pub struct LifecycleManager {
    slots: Vec<Slot>,
    phase: Phase,
    open_failures: Vec<BackendOpenError>,
    outcome: Option<SelectionOutcome>,
}

impl fmt::Debug for LifecycleManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleManager")
            .field("phase", &self.phase)
            .field("states", &self.states().collect::<Vec<_>>())
            .field("outcome", &self.outcome)
            .finish_non_exhaustive()
    }
}

impl LifecycleManager {
    /// Takes ownership of the registry; its order is preserved.
    #[must_use]
    pub fn new(registry: ComponentRegistry) -> Self {
        let slots = registry
            .into_entries()
            .into_iter()
            .map(|RegisteredBackend { descriptor, backend }| Slot {
                descriptor,
                backend,
                state: BackendState::Unregistered,
                eligibility: Eligibility::Ineligible,
            })
            .collect();
        Self {
            slots,
            phase: Phase::Unregistered,
            open_failures: Vec::new(),
            outcome: None,
        }
    }

    /// Declares every backend's parameters in registration order.
    ///
    /// # Errors
    ///
    /// Returns [`PlmError::RegistrationConflict`] for the first backend whose
    /// declarations clash, and [`PlmError::OutOfOrder`] when called twice.
    pub fn register_parameters(&mut self, store: &mut ParameterStore) -> Result<(), PlmError> {
        self.expect_phase(Phase::Unregistered, "register")?;
        for slot in &mut self.slots {
            let mut scope = store.scope(PLM_FRAMEWORK, slot.descriptor.param_component());
            slot.backend
                .register_parameters(&mut scope)
                .map_err(|source| PlmError::RegistrationConflict {
                    backend: slot.descriptor.name().to_owned(),
                    source,
                })?;
            slot.state = BackendState::Registered;
            tracing::debug!(
                target: "launchpad_plm::lifecycle",
                event = "parameters_registered",
                backend = %slot.descriptor.name(),
                "backend parameters registered"
            );
        }
        self.phase = Phase::Registered;
        Ok(())
    }

    /// Opens every backend the filter allows and freezes the store.
    ///
    /// Open failures are recorded (see
    /// [`open_failures`](Self::open_failures)) rather than returned.
    ///
    /// # Errors
    ///
    /// Returns [`PlmError::OutOfOrder`] unless parameters were registered.
    pub fn open(
        &mut self,
        store: &mut ParameterStore,
        filter: &SelectionFilter,
    ) -> Result<(), PlmError> {
        self.expect_phase(Phase::Registered, "open")?;
        store.freeze();
        for name in filter.names() {
            if !self.slots.iter().any(|slot| slot.descriptor.name() == name) {
                tracing::warn!(
                    target: "launchpad_plm::lifecycle",
                    event = "unknown_backend",
                    backend = %name,
                    directive = %filter,
                    "launcher directive names an unknown backend"
                );
            }
        }
        for slot in &mut self.slots {
            if !filter.allows(slot.descriptor.name()) {
                slot.state = BackendState::Skipped;
                tracing::debug!(
                    target: "launchpad_plm::lifecycle",
                    event = "backend_skipped",
                    backend = %slot.descriptor.name(),
                    directive = %filter,
                    "backend excluded by launcher directive"
                );
                continue;
            }
            match slot.backend.open(store) {
                Ok(()) => {
                    slot.state = BackendState::Opened;
                    tracing::debug!(
                        target: "launchpad_plm::lifecycle",
                        event = "backend_opened",
                        backend = %slot.descriptor.name(),
                        "backend opened"
                    );
                }
                Err(error) => {
                    slot.state = BackendState::OpenFailed;
                    tracing::warn!(
                        target: "launchpad_plm::lifecycle",
                        event = "backend_open_failed",
                        backend = %slot.descriptor.name(),
                        message = %error.message(),
                        error = ?error,
                        "backend failed to open; excluding it from selection"
                    );
                    self.open_failures.push(error);
                }
            }
        }
        self.phase = Phase::Opened;
        Ok(())
    }

    /// Queries every opened backend against `env`.
    ///
    /// # Errors
    ///
    /// Returns [`PlmError::OutOfOrder`] unless backends were opened.
    pub fn query(
        &mut self,
        env: &dyn EnvironmentProbe,
        store: &ParameterStore,
    ) -> Result<(), PlmError> {
        self.expect_phase(Phase::Opened, "query")?;
        for slot in &mut self.slots {
            if slot.state != BackendState::Opened {
                continue;
            }
            slot.eligibility = slot.backend.query(env, store);
            slot.state = slot
                .eligibility
                .priority()
                .map_or(BackendState::Ineligible, BackendState::Eligible);
            tracing::debug!(
                target: "launchpad_plm::lifecycle",
                event = "backend_queried",
                backend = %slot.descriptor.name(),
                state = %slot.state,
                "backend queried"
            );
        }
        self.phase = Phase::Queried;
        Ok(())
    }

    /// Selects the winner and closes every other backend.
    ///
    /// # Errors
    ///
    /// Returns [`PlmError::OutOfOrder`] unless every backend was queried.
    pub fn select(&mut self) -> Result<SelectionOutcome, PlmError> {
        self.expect_phase(Phase::Queried, "select")?;
        let outcome = selector::select(
            self.slots
                .iter()
                .map(|slot| (&slot.descriptor, &slot.eligibility)),
        );
        let winner = outcome.selection().map(|selection| selection.position());
        for (position, slot) in self.slots.iter_mut().enumerate() {
            if Some(position) != winner {
                slot.close();
            }
        }
        match outcome.selection() {
            Some(selection) => tracing::info!(
                target: "launchpad_plm::lifecycle",
                event = "backend_selected",
                backend = %selection.descriptor(),
                priority = selection.priority(),
                "launcher backend selected"
            ),
            None => tracing::info!(
                target: "launchpad_plm::lifecycle",
                event = "no_eligible_backend",
                candidates = self.slots.len(),
                "no launcher backend is eligible in this environment"
            ),
        }
        self.phase = Phase::Selected;
        self.outcome = Some(outcome.clone());
        Ok(outcome)
    }

    /// Runs open, query, and select in one call.
    ///
    /// # Errors
    ///
    /// Returns [`PlmError::OutOfOrder`] unless parameters were registered.
    pub fn discover(
        &mut self,
        store: &mut ParameterStore,
        env: &dyn EnvironmentProbe,
        filter: &SelectionFilter,
    ) -> Result<SelectionOutcome, PlmError> {
        self.open(store, filter)?;
        self.query(env, store)?;
        self.select()
    }

    /// Closes every backend that is still open, including the winner.
    ///
    /// Safe to call more than once.
    pub fn shutdown(&mut self) {
        if self.phase == Phase::ShutDown {
            return;
        }
        for slot in &mut self.slots {
            slot.close();
        }
        self.phase = Phase::ShutDown;
    }

    /// The outcome computed by [`select`](Self::select), once available.
    #[must_use]
    pub const fn outcome(&self) -> Option<&SelectionOutcome> {
        self.outcome.as_ref()
    }

    /// Errors reported by backends whose `open` failed.
    #[must_use]
    pub fn open_failures(&self) -> &[BackendOpenError] {
        &self.open_failures
    }

    /// Every backend with its current state, in registration order.
    pub fn states(&self) -> impl Iterator<Item = (&BackendDescriptor, BackendState)> {
        self.slots.iter().map(|slot| (&slot.descriptor, slot.state))
    }

    /// Current state of the named backend.
    #[must_use]
    pub fn state(&self, name: &str) -> Option<BackendState> {
        self.slots
            .iter()
            .find(|slot| slot.descriptor.name() == name)
            .map(|slot| slot.state)
    }

    /// Number of backends that are opened and not closed.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.state.is_active())
            .count()
    }

    /// Descriptors in registration order.
    pub fn descriptors(&self) -> impl Iterator<Item = &BackendDescriptor> {
        self.slots.iter().map(|slot| &slot.descriptor)
    }

    fn expect_phase(&self, expected: Phase, operation: &'static str) -> Result<(), PlmError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(PlmError::OutOfOrder {
                operation,
                phase: self.phase.as_str(),
            })
        }
    }
}

impl Drop for LifecycleManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}
