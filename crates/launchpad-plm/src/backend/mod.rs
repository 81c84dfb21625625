//! The launcher backend contract.
//!
//! Every pluggable launcher implements [`LauncherBackend`]. The lifecycle
//! manager drives each implementation through parameter registration, open,
//! query, and close; the backend that wins selection hands its
//! [`LaunchModule`] to the rest of the launch pipeline.

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;

use serde::Serialize;

use crate::environment::EnvironmentProbe;
use crate::error::{BackendOpenError, LaunchError, ParameterError};
use crate::params::{ParameterScope, ParameterStore};

/// Framework name shared by every launcher backend.
pub const PLM_FRAMEWORK: &str = "plm";

/// Version triple of a backend implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct BackendVersion {
    /// Major version.
    pub major: u32,
    /// Minor version.
    pub minor: u32,
    /// Release number.
    pub release: u32,
}

impl BackendVersion {
    /// Builds a version triple.
    #[must_use]
    pub const fn new(major: u32, minor: u32, release: u32) -> Self {
        Self {
            major,
            minor,
            release,
        }
    }

    /// Version of the backends compiled into this crate.
    #[must_use]
    pub fn crate_version() -> Self {
        let parse = |text: &str| text.parse().unwrap_or(0);
        Self::new(
            parse(env!("CARGO_PKG_VERSION_MAJOR")),
            parse(env!("CARGO_PKG_VERSION_MINOR")),
            parse(env!("CARGO_PKG_VERSION_PATCH")),
        )
    }
}

impl fmt::Display for BackendVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.release)
    }
}

/// Metadata flags advertised by a backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct BackendFlags {
    /// The backend can participate in checkpoint/restart.
    pub checkpoint_ready: bool,
}

/// Identity of a backend, fixed at registration.
///
/// # Example
///
/// ```
/// use launchpad_plm::{BackendDescriptor, BackendVersion};
///
/// let descriptor = BackendDescriptor::new("slurm", BackendVersion::new(1, 2, 0))
///     .checkpoint_ready();
/// assert_eq!(descriptor.name(), "slurm");
/// assert_eq!(descriptor.to_string(), "plm:slurm 1.2.0");
/// assert!(descriptor.flags().checkpoint_ready);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct BackendDescriptor {
    framework: &'static str,
    name: String,
    version: BackendVersion,
    flags: BackendFlags,
}

impl BackendDescriptor {
    /// Creates a descriptor in the launcher framework with no flags set.
    #[must_use]
    pub fn new(name: impl Into<String>, version: BackendVersion) -> Self {
        Self {
            framework: PLM_FRAMEWORK,
            name: name.into(),
            version,
            flags: BackendFlags::default(),
        }
    }

    /// Marks the backend as checkpoint/restart capable.
    #[must_use]
    pub fn checkpoint_ready(mut self) -> Self {
        self.flags.checkpoint_ready = true;
        self
    }

    /// Framework the backend belongs to.
    #[must_use]
    pub const fn framework(&self) -> &'static str {
        self.framework
    }

    /// Component name, unique within the registry.
    #[must_use]
    pub const fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Component segment used in parameter names: the name in lowercase
    /// with dashes turned into underscores.
    #[must_use]
    pub fn param_component(&self) -> String {
        self.name.to_ascii_lowercase().replace('-', "_")
    }

    /// Implementation version.
    #[must_use]
    pub const fn version(&self) -> BackendVersion {
        self.version
    }

    /// Metadata flags.
    #[must_use]
    pub const fn flags(&self) -> BackendFlags {
        self.flags
    }
}

impl fmt::Display for BackendDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} {}", self.framework, self.name, self.version)
    }
}

/// Daemon start request handed to a runtime module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonLaunch {
    program: String,
    args: Vec<String>,
    nodes: Vec<String>,
}

impl DaemonLaunch {
    /// Describes the daemon to start on each allocated node.
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>, nodes: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            nodes,
        }
    }

    /// Daemon executable.
    #[must_use]
    pub const fn program(&self) -> &str {
        self.program.as_str()
    }

    /// Daemon arguments.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Allocated node names.
    #[must_use]
    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    /// Daemon program followed by its arguments.
    pub fn daemon_argv(&self) -> impl Iterator<Item = String> + '_ {
        std::iter::once(self.program.clone()).chain(self.args.iter().cloned())
    }
}

/// A command line the launch pipeline would execute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaunchCommand {
    program: String,
    args: Vec<String>,
}

impl LaunchCommand {
    /// Creates a command.
    #[must_use]
    pub const fn new(program: String, args: Vec<String>) -> Self {
        Self { program, args }
    }

    /// Program to execute.
    #[must_use]
    pub const fn program(&self) -> &str {
        self.program.as_str()
    }

    /// Arguments passed to the program.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl fmt::Display for LaunchCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Runtime object a selected backend hands to the launch pipeline.
pub trait LaunchModule: fmt::Debug + Send + Sync {
    /// Name of the backend that produced this module.
    fn backend(&self) -> &str;

    /// Builds the commands that start the daemon set for an allocation.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError::EmptyAllocation`] when no nodes are given.
    fn launch_commands(&self, request: &DaemonLaunch) -> Result<Vec<LaunchCommand>, LaunchError>;

    /// Most launch commands the pipeline may run at once; `None` means no
    /// limit.
    fn max_concurrent(&self) -> Option<NonZeroUsize> {
        None
    }
}

/// Outcome of a single backend query.
#[derive(Debug, Clone)]
pub enum Eligibility {
    /// The environment does not match this backend.
    Ineligible,
    /// The backend can run here.
    Eligible {
        /// Preference weight; higher wins.
        priority: i32,
        /// Module that performs launching if this backend is selected.
        module: Arc<dyn LaunchModule>,
    },
}

impl Eligibility {
    /// Builds an eligible result.
    #[must_use]
    pub fn eligible(priority: i32, module: Arc<dyn LaunchModule>) -> Self {
        Self::Eligible { priority, module }
    }

    /// Returns the priority when eligible.
    #[must_use]
    pub const fn priority(&self) -> Option<i32> {
        match self {
            Self::Ineligible => None,
            Self::Eligible { priority, .. } => Some(*priority),
        }
    }

    /// Returns `true` when the backend reported eligibility.
    #[must_use]
    pub const fn is_eligible(&self) -> bool {
        matches!(self, Self::Eligible { .. })
    }
}

/// Contract every launcher backend implements.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use launchpad_plm::{
///     BackendDescriptor, BackendOpenError, BackendVersion, DaemonLaunch, Eligibility,
///     EnvironmentProbe, LaunchCommand, LaunchError, LaunchModule, LauncherBackend,
///     ParameterError, ParameterScope, ParameterStore,
/// };
///
/// #[derive(Debug)]
/// struct LocalModule;
///
/// impl LaunchModule for LocalModule {
///     fn backend(&self) -> &str {
///         "local"
///     }
///
///     fn launch_commands(&self, request: &DaemonLaunch) -> Result<Vec<LaunchCommand>, LaunchError> {
///         Ok(vec![LaunchCommand::new(request.program().into(), request.args().to_vec())])
///     }
/// }
///
/// struct Local;
///
/// impl LauncherBackend for Local {
///     fn descriptor(&self) -> BackendDescriptor {
///         BackendDescriptor::new("local", BackendVersion::new(0, 1, 0))
///     }
///
///     fn register_parameters(&mut self, _scope: &mut ParameterScope<'_>) -> Result<(), ParameterError> {
///         Ok(())
///     }
///
///     fn open(&mut self, _params: &ParameterStore) -> Result<(), BackendOpenError> {
///         Ok(())
///     }
///
///     fn query(&self, _env: &dyn EnvironmentProbe, _params: &ParameterStore) -> Eligibility {
///         Eligibility::eligible(1, Arc::new(LocalModule))
///     }
///
///     fn close(&mut self) {}
/// }
/// ```
pub trait LauncherBackend: Send {
    /// Identity recorded by the registry.
    fn descriptor(&self) -> BackendDescriptor;

    /// Declares configurable options. Called exactly once.
    ///
    /// # Errors
    ///
    /// Returns a [`ParameterError`] for duplicate or malformed declarations.
    fn register_parameters(&mut self, scope: &mut ParameterScope<'_>)
    -> Result<(), ParameterError>;

    /// Performs initialisation that does not depend on being selected.
    ///
    /// # Errors
    ///
    /// Returns a [`BackendOpenError`]; the backend is then treated as not
    /// eligible.
    fn open(&mut self, params: &ParameterStore) -> Result<(), BackendOpenError>;

    /// Reports whether the surrounding environment matches this backend.
    ///
    /// Must not mutate launcher state; repeated calls in the same environment
    /// return the same result.
    fn query(&self, env: &dyn EnvironmentProbe, params: &ParameterStore) -> Eligibility;

    /// Releases anything acquired in `open`.
    ///
    /// Must be idempotent and safe to call when `open` never ran or failed.
    fn close(&mut self);
}
