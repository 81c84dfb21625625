//! Environment probes used by backends to detect resource-manager signals.
//!
//! Backends never call [`std::env`] directly. They read through an
//! [`EnvironmentProbe`] so tests can simulate arbitrary cluster environments
//! without mutating the process environment.

use std::collections::BTreeMap;
use std::env;

/// Read-only view over environment variables.
#[cfg_attr(test, mockall::automock)]
pub trait EnvironmentProbe {
    /// Returns the value of `key`, or `None` when it is unset or not valid
    /// UTF-8.
    fn var(&self, key: &str) -> Option<String>;

    /// Returns `true` when `key` is present, whatever its value.
    fn is_set(&self, key: &str) -> bool {
        self.var(key).is_some()
    }
}

/// Probe backed by the real process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemEnvironment;

impl EnvironmentProbe for SystemEnvironment {
    fn var(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }

    fn is_set(&self, key: &str) -> bool {
        env::var_os(key).is_some()
    }
}

/// Probe backed by an in-memory map.
///
/// # Example
///
/// ```
/// use launchpad_plm::{EnvironmentProbe, StaticEnvironment};
///
/// let env = StaticEnvironment::new().with_var("SLURM_JOBID", "4242");
/// assert!(env.is_set("SLURM_JOBID"));
/// assert!(!env.is_set("PBS_JOBID"));
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StaticEnvironment {
    vars: BTreeMap<String, String>,
}

impl StaticEnvironment {
    /// Creates an empty environment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the environment with `key` set to `value`.
    #[must_use]
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Sets `key` to `value`.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    /// Removes `key`, returning its previous value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.vars.remove(key)
    }
}

impl<K, V> FromIterator<(K, V)> for StaticEnvironment
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

impl EnvironmentProbe for StaticEnvironment {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

impl<T> EnvironmentProbe for &T
where
    T: EnvironmentProbe + ?Sized,
{
    fn var(&self, key: &str) -> Option<String> {
        (**self).var(key)
    }

    fn is_set(&self, key: &str) -> bool {
        (**self).is_set(key)
    }
}
