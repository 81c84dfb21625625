//! Scripted backends for exercising the lifecycle without a real cluster.
//!
//! Available to this crate's tests and, through the `test-support` feature,
//! to downstream crates.

use std::sync::{Arc, Mutex, PoisonError};

use crate::backend::{
    BackendDescriptor, BackendVersion, DaemonLaunch, Eligibility, LaunchCommand, LaunchModule,
    LauncherBackend,
};
use crate::environment::EnvironmentProbe;
use crate::error::{BackendOpenError, LaunchError, ParameterError};
use crate::params::{ParameterScope, ParameterStore};

/// Lifecycle call observed on a [`ScriptedBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// `register_parameters` ran.
    Register(String),
    /// `open` ran.
    Open(String),
    /// `query` ran.
    Query(String),
    /// `close` ran.
    Close(String),
}

/// Shared log of lifecycle calls across several scripted backends.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl CallLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every recorded call in order.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of `close` calls recorded for `name`.
    #[must_use]
    pub fn close_count(&self, name: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Close(backend) if backend == name))
            .count()
    }

    fn push(&self, call: Call) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }
}

/// Module returned by scripted backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedModule {
    backend: String,
}

impl ScriptedModule {
    /// Creates a module reporting `backend` as its origin.
    #[must_use]
    pub fn named(backend: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
        }
    }
}

impl LaunchModule for ScriptedModule {
    fn backend(&self) -> &str {
        self.backend.as_str()
    }

    fn launch_commands(&self, request: &DaemonLaunch) -> Result<Vec<LaunchCommand>, LaunchError> {
        if request.nodes().is_empty() {
            return Err(LaunchError::EmptyAllocation {
                backend: self.backend.clone(),
            });
        }
        Ok(vec![LaunchCommand::new(
            self.backend.clone(),
            request.daemon_argv().collect(),
        )])
    }
}

#[derive(Debug, Clone)]
enum Signal {
    Always,
    Variable(String),
}

/// Backend whose eligibility, priority, and failures are scripted.
#[derive(Debug, Clone)]
pub struct ScriptedBackend {
    name: String,
    priority: i32,
    signal: Signal,
    fail_open: bool,
    duplicate_parameter: bool,
    open: bool,
    log: CallLog,
}

impl ScriptedBackend {
    /// Creates an always-eligible backend at `priority`.
    #[must_use]
    pub fn new(name: impl Into<String>, priority: i32) -> Self {
        Self {
            name: name.into(),
            priority,
            signal: Signal::Always,
            fail_open: false,
            duplicate_parameter: false,
            open: false,
            log: CallLog::new(),
        }
    }

    /// Makes eligibility depend on `variable` being set.
    #[must_use]
    pub fn signalled_by(mut self, variable: impl Into<String>) -> Self {
        self.signal = Signal::Variable(variable.into());
        self
    }

    /// Makes `open` fail.
    #[must_use]
    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Makes `register_parameters` declare the same name twice.
    #[must_use]
    pub fn with_duplicate_parameter(mut self) -> Self {
        self.duplicate_parameter = true;
        self
    }

    /// Records calls into `log`.
    #[must_use]
    pub fn logging_to(mut self, log: &CallLog) -> Self {
        self.log = log.clone();
        self
    }

    /// Returns `true` between a successful `open` and the next `close`.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.open
    }
}

impl LauncherBackend for ScriptedBackend {
    fn descriptor(&self) -> BackendDescriptor {
        BackendDescriptor::new(self.name.clone(), BackendVersion::new(0, 0, 1))
    }

    fn register_parameters(
        &mut self,
        scope: &mut ParameterScope<'_>,
    ) -> Result<(), ParameterError> {
        self.log.push(Call::Register(self.name.clone()));
        scope.flag("verbose", "Scripted verbosity", false)?;
        if self.duplicate_parameter {
            scope.flag("verbose", "Scripted verbosity", false)?;
        }
        Ok(())
    }

    fn open(&mut self, _params: &ParameterStore) -> Result<(), BackendOpenError> {
        self.log.push(Call::Open(self.name.clone()));
        if self.fail_open {
            return Err(BackendOpenError::new(
                self.name.clone(),
                "scripted open failure",
            ));
        }
        self.open = true;
        Ok(())
    }

    fn query(&self, env: &dyn EnvironmentProbe, _params: &ParameterStore) -> Eligibility {
        self.log.push(Call::Query(self.name.clone()));
        let eligible = match &self.signal {
            Signal::Always => true,
            Signal::Variable(variable) => env.var(variable).is_some(),
        };
        if eligible {
            Eligibility::eligible(
                self.priority,
                Arc::new(ScriptedModule {
                    backend: self.name.clone(),
                }),
            )
        } else {
            Eligibility::Ineligible
        }
    }

    fn close(&mut self) {
        self.log.push(Call::Close(self.name.clone()));
        self.open = false;
    }
}
