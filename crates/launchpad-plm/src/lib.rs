//! Launcher backend selection for the launchpad runtime.
//!
//! A job launcher has to start its daemons differently depending on which
//! resource manager, if any, granted the allocation. This crate hosts the
//! launcher backends and picks exactly one of them per run:
//!
//! - [`ComponentRegistry`] lists the candidate backends in preference order.
//! - [`LifecycleManager`] takes them through parameter registration, open,
//!   environment query, and selection, closing every loser as soon as the
//!   winner is known.
//! - [`select`] arbitrates between query results: highest priority wins and
//!   ties go to the backend registered first.
//!
//! Backends never read the process environment directly. They receive an
//! [`EnvironmentProbe`], so selection can be exercised against a
//! [`StaticEnvironment`] in tests and against [`SystemEnvironment`] in
//! production.
//!
//! Configurable backend options live in a [`ParameterStore`]. Values are
//! resolved from `LAUNCHPAD_MCA_*` environment variables and explicit
//! overrides before any backend is opened.

pub mod backend;
pub mod backends;
pub mod environment;
pub mod error;
pub mod filter;
pub mod lifecycle;
pub mod params;
pub mod registry;
pub mod selector;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use backend::{
    BackendDescriptor, BackendFlags, BackendVersion, DaemonLaunch, Eligibility, LaunchCommand,
    LaunchModule, LauncherBackend, PLM_FRAMEWORK,
};
pub use backends::{
    LSF_PRIORITY, LsfBackend, PBS_PRIORITY, PbsBackend, SLURM_PRIORITY, SSH_PRIORITY,
    SlurmBackend, SshBackend,
};
pub use environment::{EnvironmentProbe, StaticEnvironment, SystemEnvironment};
pub use error::{BackendOpenError, FilterError, LaunchError, ParameterError, PlmError};
pub use filter::SelectionFilter;
pub use lifecycle::{BackendState, LifecycleManager};
pub use params::{
    EnvironmentSource, OverrideSource, PARAM_ENV_PREFIX, ParamEntry, ParamHandle, ParamKind,
    ParamOrigin, ParamValue, ParameterScope, ParameterSource, ParameterStore,
};
pub use registry::ComponentRegistry;
pub use selector::{Selection, SelectionOutcome, select};

#[cfg(test)]
mod tests;
