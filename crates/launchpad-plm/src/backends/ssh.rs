//! Remote-shell launcher used when no resource manager is detected.
//!
//! Always eligible, at a low priority, so any resource-manager backend that
//! recognises the environment wins over it. `open` resolves the launch agent
//! from the `agent` parameter, a colon-separated list such as `ssh : rsh`
//! whose first non-empty entry is used. An empty list fails `open`, which
//! removes the backend from selection, as does a `num_concurrent` below one.

use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::backend::{
    BackendDescriptor, BackendVersion, DaemonLaunch, Eligibility, LaunchCommand, LaunchModule,
    LauncherBackend,
};
use crate::environment::EnvironmentProbe;
use crate::error::{BackendOpenError, LaunchError, ParameterError};
use crate::params::{ParamHandle, ParameterScope, ParameterStore};

use super::require_nodes;

/// Priority reported by the remote-shell launcher.
pub const SSH_PRIORITY: i32 = 10;

const NAME: &str = "ssh";
const DEFAULT_AGENT: &str = "ssh : rsh";
const DEFAULT_NUM_CONCURRENT: i64 = 128;

#[derive(Debug, Clone, Copy)]
struct SshParams {
    agent: ParamHandle<String>,
    args: ParamHandle<String>,
    num_concurrent: ParamHandle<i64>,
}

/// Launch agent resolved during `open`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Agent {
    program: String,
    args: Vec<String>,
    max_concurrent: NonZeroUsize,
}

/// Remote-shell launcher backend.
#[derive(Debug, Default)]
pub struct SshBackend {
    params: Option<SshParams>,
    agent: Option<Agent>,
}

impl SshBackend {
    /// Creates the backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn resolve_agent(&self, params: &ParameterStore) -> Option<Agent> {
        let agent_list = self
            .params
            .and_then(|handles| params.get(handles.agent))
            .unwrap_or_else(|| DEFAULT_AGENT.to_owned());
        let extra: Vec<String> = self
            .params
            .and_then(|handles| params.get(handles.args))
            .map(|text| text.split_whitespace().map(str::to_owned).collect())
            .unwrap_or_default();

        let mut words = agent_list
            .split(':')
            .map(str::trim)
            .find(|entry| !entry.is_empty())?
            .split_whitespace()
            .map(str::to_owned);
        let program = words.next()?;
        let mut args: Vec<String> = words.collect();
        args.extend(extra);
        Some(Agent {
            program,
            args,
            max_concurrent: NonZeroUsize::MIN,
        })
    }

    fn resolve_num_concurrent(&self, params: &ParameterStore) -> Option<NonZeroUsize> {
        let configured = self
            .params
            .and_then(|handles| params.get(handles.num_concurrent))
            .unwrap_or(DEFAULT_NUM_CONCURRENT);
        usize::try_from(configured).ok().and_then(NonZeroUsize::new)
    }
}

impl LauncherBackend for SshBackend {
    fn descriptor(&self) -> BackendDescriptor {
        BackendDescriptor::new(NAME, BackendVersion::crate_version())
    }

    fn register_parameters(
        &mut self,
        scope: &mut ParameterScope<'_>,
    ) -> Result<(), ParameterError> {
        let agent = scope.string(
            "agent",
            "Colon-separated remote-shell agents; the first entry is used",
            Some(DEFAULT_AGENT),
        )?;
        let args = scope.string("args", "Extra arguments passed to the agent", None)?;
        let num_concurrent = scope.integer(
            "num_concurrent",
            "Most agent processes started at once",
            DEFAULT_NUM_CONCURRENT,
        )?;
        self.params = Some(SshParams {
            agent,
            args,
            num_concurrent,
        });
        Ok(())
    }

    fn open(&mut self, params: &ParameterStore) -> Result<(), BackendOpenError> {
        let max_concurrent = self
            .resolve_num_concurrent(params)
            .ok_or_else(|| BackendOpenError::new(NAME, "num_concurrent must be at least 1"))?;
        let mut agent = self
            .resolve_agent(params)
            .ok_or_else(|| BackendOpenError::new(NAME, "no remote-shell agent configured"))?;
        agent.max_concurrent = max_concurrent;
        tracing::debug!(
            target: "launchpad_plm::backends::ssh",
            event = "agent_resolved",
            agent = %agent.program,
            max_concurrent = max_concurrent.get(),
            "remote-shell agent resolved"
        );
        self.agent = Some(agent);
        Ok(())
    }

    fn query(&self, _env: &dyn EnvironmentProbe, _params: &ParameterStore) -> Eligibility {
        match &self.agent {
            Some(agent) => Eligibility::eligible(
                SSH_PRIORITY,
                Arc::new(SshModule {
                    agent: agent.clone(),
                }),
            ),
            None => Eligibility::Ineligible,
        }
    }

    fn close(&mut self) {
        self.agent = None;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SshModule {
    agent: Agent,
}

impl LaunchModule for SshModule {
    fn backend(&self) -> &str {
        NAME
    }

    fn launch_commands(&self, request: &DaemonLaunch) -> Result<Vec<LaunchCommand>, LaunchError> {
        let nodes = require_nodes(NAME, request)?;
        Ok(nodes
            .iter()
            .map(|node| {
                let mut args = self.agent.args.clone();
                args.push(node.clone());
                args.extend(request.daemon_argv());
                LaunchCommand::new(self.agent.program.clone(), args)
            })
            .collect())
    }

    fn max_concurrent(&self) -> Option<NonZeroUsize> {
        Some(self.agent.max_concurrent)
    }
}
