//! Launcher for PBS/Torque batch allocations.
//!
//! Eligible when both `PBS_ENVIRONMENT` and `PBS_JOBID` are set. Each daemon
//! is started on its node through `pbsdsh`.

use std::sync::Arc;

use crate::backend::{
    BackendDescriptor, BackendVersion, DaemonLaunch, Eligibility, LaunchCommand, LaunchModule,
    LauncherBackend,
};
use crate::environment::EnvironmentProbe;
use crate::error::{BackendOpenError, LaunchError, ParameterError};
use crate::params::{ParameterScope, ParameterStore};

use super::require_nodes;

/// Priority reported when running inside a PBS allocation.
pub const PBS_PRIORITY: i32 = 75;

const NAME: &str = "pbs";
const SIGNALS: [&str; 2] = ["PBS_ENVIRONMENT", "PBS_JOBID"];

/// PBS launcher backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct PbsBackend;

impl PbsBackend {
    /// Creates the backend.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl LauncherBackend for PbsBackend {
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
        if !SIGNALS.iter().all(|signal| env.is_set(signal)) {
            return Eligibility::Ineligible;
        }
        Eligibility::eligible(PBS_PRIORITY, Arc::new(PbsModule))
    }

    fn close(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PbsModule;

impl LaunchModule for PbsModule {
    fn backend(&self) -> &str {
        NAME
    }

    fn launch_commands(&self, request: &DaemonLaunch) -> Result<Vec<LaunchCommand>, LaunchError> {
        let nodes = require_nodes(NAME, request)?;
        Ok(nodes
            .iter()
            .map(|node| {
                let mut args = vec!["-h".to_owned(), node.clone()];
                args.extend(request.daemon_argv());
                LaunchCommand::new("pbsdsh".to_owned(), args)
            })
            .collect())
    }
}
