//! Ordered registry of compiled-in launcher backends.
//!
//! The [`ComponentRegistry`] records every backend in the order it was
//! registered. That order is the tie-break key during selection: when two
//! eligible backends share a priority, the one registered first wins.
//! Duplicate names are rejected. Once the registry is handed to the
//! [`LifecycleManager`](crate::LifecycleManager) it is never mutated again.

use std::fmt;

use crate::backend::{BackendDescriptor, LauncherBackend};
use crate::error::PlmError;

/// A backend together with the descriptor captured at registration.
pub(crate) struct RegisteredBackend {
    pub(crate) descriptor: BackendDescriptor,
    pub(crate) backend: Box<dyn LauncherBackend>,
}

impl fmt::Debug for RegisteredBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredBackend")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// Registry of launcher backends in registration order.
///
/// # Example
///
/// ```
/// use launchpad_plm::ComponentRegistry;
///
/// let registry = ComponentRegistry::builtin().expect("built-in backends register");
/// let names: Vec<&str> = registry.enumerate().map(|d| d.name()).collect();
/// assert_eq!(names, ["slurm", "pbs", "lsf", "ssh"]);
/// ```
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    backends: Vec<RegisteredBackend>,
}

impl ComponentRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a backend after validating its descriptor.
    ///
    /// Names are limited to ASCII letters, digits, `-` and `_`, and must map
    /// to a parameter component no other backend uses.
    ///
    /// # Errors
    ///
    /// Returns [`PlmError::InvalidDescriptor`] for a blank or malformed name
    /// or a parameter component collision, and [`PlmError::DuplicateBackend`]
    /// when the name is already taken.
    pub fn register(&mut self, backend: Box<dyn LauncherBackend>) -> Result<(), PlmError> {
        let descriptor = backend.descriptor();
        validate_name(descriptor.name())?;
        if self.get(descriptor.name()).is_some() {
            return Err(PlmError::DuplicateBackend {
                name: descriptor.name().to_owned(),
            });
        }
        let component = descriptor.param_component();
        if let Some(existing) = self
            .enumerate()
            .find(|existing| existing.param_component() == component)
        {
            return Err(PlmError::InvalidDescriptor {
                message: format!(
                    "backend '{}' shares parameter component '{component}' with '{}'",
                    descriptor.name(),
                    existing.name()
                ),
            });
        }
        tracing::debug!(
            target: "launchpad_plm::registry",
            event = "backend_registered",
            backend = %descriptor,
            position = self.backends.len(),
            "backend registered"
        );
        self.backends.push(RegisteredBackend {
            descriptor,
            backend,
        });
        Ok(())
    }

    /// Builder-style variant of [`ComponentRegistry::register`].
    ///
    /// # Errors
    ///
    /// Propagates the errors of [`ComponentRegistry::register`].
    pub fn with(mut self, backend: impl LauncherBackend + 'static) -> Result<Self, PlmError> {
        self.register(Box::new(backend))?;
        Ok(self)
    }

    /// Descriptors in registration order.
    pub fn enumerate(&self) -> impl ExactSizeIterator<Item = &BackendDescriptor> {
        self.backends.iter().map(|entry| &entry.descriptor)
    }

    /// Looks up a descriptor by backend name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&BackendDescriptor> {
        self.enumerate().find(|descriptor| descriptor.name() == name)
    }

    /// Returns the number of registered backends.
    #[must_use]
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Returns `true` when no backends are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub(crate) fn into_entries(self) -> Vec<RegisteredBackend> {
        self.backends
    }
}

fn validate_name(name: &str) -> Result<(), PlmError> {
    if name.trim().is_empty() {
        return Err(PlmError::InvalidDescriptor {
            message: "backend name must not be empty".to_owned(),
        });
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(PlmError::InvalidDescriptor {
            message: format!(
                "backend name '{name}' may only contain ASCII letters, digits, '-' and '_'"
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests;
