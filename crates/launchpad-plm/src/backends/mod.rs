//! Launcher backends compiled into the runtime.
//!
//! Registration order is the preference order used to break priority ties:
//! resource-manager launchers first, the remote-shell fallback last.

mod lsf;
mod pbs;
mod slurm;
mod ssh;

pub use self::lsf::{LSF_PRIORITY, LsfBackend};
pub use self::pbs::{PBS_PRIORITY, PbsBackend};
pub use self::slurm::{SLURM_PRIORITY, SlurmBackend};
pub use self::ssh::{SSH_PRIORITY, SshBackend};

use crate::backend::DaemonLaunch;
use crate::error::{LaunchError, PlmError};
use crate::registry::ComponentRegistry;

impl ComponentRegistry {
    /// Registry holding every built-in backend: `slurm`, `pbs`, `lsf`, `ssh`.
    ///
    /// # Errors
    ///
    /// Returns [`PlmError::DuplicateBackend`] only if two built-ins share a
    /// name.
    pub fn builtin() -> Result<Self, PlmError> {
        Self::new()
            .with(SlurmBackend::new())?
            .with(PbsBackend::new())?
            .with(LsfBackend::new())?
            .with(SshBackend::new())
    }
}

fn require_nodes<'a>(backend: &str, request: &'a DaemonLaunch) -> Result<&'a [String], LaunchError> {
    match request.nodes() {
        [] => Err(LaunchError::EmptyAllocation {
            backend: backend.to_owned(),
        }),
        nodes => Ok(nodes),
    }
}

#[cfg(test)]
mod tests;
