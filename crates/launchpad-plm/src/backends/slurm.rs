//! Launcher for allocations managed by the Slurm workload manager.
//!
//! Eligible whenever `SLURM_JOBID` is set. Daemons are started with a single
//! `srun` step spanning every allocated node.

use std::sync::Arc;

use crate::backend::{
    BackendDescriptor, BackendVersion, DaemonLaunch, Eligibility, LaunchCommand, LaunchModule,
    LauncherBackend,
};
use crate::environment::EnvironmentProbe;
use crate::error::{BackendOpenError, LaunchError, ParameterError};
use crate::params::{ParamHandle, ParameterScope, ParameterStore};

use super::require_nodes;

/// Priority reported when running inside a Slurm allocation.
pub const SLURM_PRIORITY: i32 = 75;

const SLURM_SIGNAL: &str = "SLURM_JOBID";
const NAME: &str = "slurm";

/// `srun` options the module sets itself.
const MANAGED_OPTIONS: [&str; 6] = [
    "--nodes",
    "--nodelist",
    "--ntasks-per-node",
    "-N",
    "-w",
    "--kill-on-bad-exit",
];

#[derive(Debug, Clone, Copy)]
struct SlurmParams {
    args: ParamHandle<String>,
    warning: ParamHandle<bool>,
}

/// Slurm launcher backend.
#[derive(Debug, Default)]
pub struct SlurmBackend {
    params: Option<SlurmParams>,
}

impl SlurmBackend {
    /// Creates the backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LauncherBackend for SlurmBackend {
    fn descriptor(&self) -> BackendDescriptor {
        BackendDescriptor::new(NAME, BackendVersion::crate_version()).checkpoint_ready()
    }

    fn register_parameters(
        &mut self,
        scope: &mut ParameterScope<'_>,
    ) -> Result<(), ParameterError> {
        let args = scope.string("args", "Custom arguments to srun", None)?;
        let warning = scope.flag(
            "warning",
            "Warn when custom srun arguments override options the launcher sets",
            true,
        )?;
        self.params = Some(SlurmParams { args, warning });
        Ok(())
    }

    fn open(&mut self, _params: &ParameterStore) -> Result<(), BackendOpenError> {
        Ok(())
    }

    fn query(&self, env: &dyn EnvironmentProbe, params: &ParameterStore) -> Eligibility {
        if !env.is_set(SLURM_SIGNAL) {
            return Eligibility::Ineligible;
        }
        tracing::debug!(
            target: "launchpad_plm::backends::slurm",
            event = "available",
            job_id = ?env.var(SLURM_SIGNAL),
            "plm:slurm available for selection"
        );
        let (custom_args, warn_on_override) = self.params.map_or((Vec::new(), true), |handles| {
            let args = params
                .get(handles.args)
                .map(|text| text.split_whitespace().map(str::to_owned).collect())
                .unwrap_or_default();
            (args, params.get(handles.warning).unwrap_or(true))
        });
        Eligibility::eligible(
            SLURM_PRIORITY,
            Arc::new(SlurmModule {
                custom_args,
                warn_on_override,
            }),
        )
    }

    fn close(&mut self) {}
}

/// Builds `srun` command lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SlurmModule {
    custom_args: Vec<String>,
    warn_on_override: bool,
}

impl SlurmModule {
    #[cfg(test)]
    pub(super) const fn for_tests(custom_args: Vec<String>) -> Self {
        Self {
            custom_args,
            warn_on_override: true,
        }
    }

    pub(super) fn overridden_options(&self) -> Vec<&str> {
        self.custom_args
            .iter()
            .map(String::as_str)
            .filter(|arg| MANAGED_OPTIONS.iter().any(|option| overrides(arg, option)))
            .collect()
    }
}

/// Long options match exactly or as `--option=value`; short options also
/// match with the value attached, as in `-N4`.
fn overrides(arg: &str, option: &str) -> bool {
    let Some(rest) = arg.strip_prefix(option) else {
        return false;
    };
    rest.is_empty() || rest.starts_with('=') || !option.starts_with("--")
}

impl LaunchModule for SlurmModule {
    fn backend(&self) -> &str {
        NAME
    }

    fn launch_commands(&self, request: &DaemonLaunch) -> Result<Vec<LaunchCommand>, LaunchError> {
        let nodes = require_nodes(NAME, request)?;
        if self.warn_on_override {
            let overridden = self.overridden_options();
            if !overridden.is_empty() {
                tracing::warn!(
                    target: "launchpad_plm::backends::slurm",
                    event = "custom_args_override",
                    options = ?overridden,
                    "custom srun arguments override options set by the launcher"
                );
            }
        }
        let mut args = vec![
            "--ntasks-per-node=1".to_owned(),
            "--kill-on-bad-exit".to_owned(),
            format!("--nodes={}", nodes.len()),
            format!("--nodelist={}", nodes.join(",")),
        ];
        args.extend(self.custom_args.iter().cloned());
        args.extend(request.daemon_argv());
        Ok(vec![LaunchCommand::new("srun".to_owned(), args)])
    }
}
