//! Launcher for IBM Spectrum LSF allocations.
//!
//! Eligible whenever `LSB_JOBID` is set. All daemons are started with one
//! `blaunch` invocation.

use std::sync::Arc;

use crate::backend::{
    BackendDescriptor, BackendVersion, DaemonLaunch, Eligibility, LaunchCommand, LaunchModule,
    LauncherBackend,
};
use crate::environment::EnvironmentProbe;
use crate::error::{BackendOpenError, LaunchError, ParameterError};
use crate::params::{ParameterScope, ParameterStore};

use super::require_nodes;

/// Priority reported when running inside an LSF allocation.
pub const LSF_PRIORITY: i32 = 75;

const NAME: &str = "lsf";
const LSF_SIGNAL: &str = "LSB_JOBID";

/// LSF launcher backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct LsfBackend;

impl LsfBackend {
    /// Creates the backend.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl LauncherBackend for LsfBackend {
    fn descriptor(&self) -> BackendDescriptor {
        BackendDescriptor::new(NAME, BackendVersion::crate_version())
    }

    fn register_parameters(
        &mut self,
        _scope: &mut ParameterScope<'_>,
    ) -> Result<(), ParameterError> {
        Ok(())
    }

    fn open(&mut self, _params: &ParameterStore) -> Result<(), BackendOpenError> {
        Ok(())
    }

    fn query(&self, env: &dyn EnvironmentProbe, _params: &ParameterStore) -> Eligibility {
        if env.is_set(LSF_SIGNAL) {
            Eligibility::eligible(LSF_PRIORITY, Arc::new(LsfModule))
        } else {
            Eligibility::Ineligible
        }
    }

    fn close(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LsfModule;

impl LaunchModule for LsfModule {
    fn backend(&self) -> &str {
        NAME
    }

    fn launch_commands(&self, request: &DaemonLaunch) -> Result<Vec<LaunchCommand>, LaunchError> {
        let nodes = require_nodes(NAME, request)?;
        let mut args = vec!["-z".to_owned(), nodes.join(" ")];
        args.extend(request.daemon_argv());
        Ok(vec![LaunchCommand::new("blaunch".to_owned(), args)])
    }
}
