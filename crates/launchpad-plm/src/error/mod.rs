//! Domain errors raised while registering, opening, and selecting backends.
//!
//! All errors use `thiserror`-derived enums with structured context so callers
//! can inspect the failure programmatically. Only
//! [`PlmError::RegistrationConflict`] is meant to abort startup; open failures
//! are recovered by the lifecycle manager and "no eligible backend" is a
//! [`SelectionOutcome`](crate::SelectionOutcome) value rather than an error.

use thiserror::Error;

use crate::params::{ParamKind, ParamOrigin};

/// Errors raised by the parameter store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParameterError {
    /// A parameter with the same full name was already declared.
    #[error("parameter '{name}' is already registered")]
    Duplicate {
        /// Full parameter name.
        name: String,
    },

    /// The declared name is empty or contains unsupported characters.
    #[error("parameter name '{name}' is malformed: {reason}")]
    MalformedName {
        /// Offending name as supplied.
        name: String,
        /// Why the name was rejected.
        reason: &'static str,
    },

    /// An external source supplied a value that does not parse as the
    /// declared type.
    #[error("invalid {kind} value '{value}' for parameter '{name}' from {origin}")]
    InvalidValue {
        /// Full parameter name.
        name: String,
        /// Raw value that failed to parse.
        value: String,
        /// Declared parameter type.
        kind: ParamKind,
        /// Source that supplied the value.
        origin: ParamOrigin,
    },

    /// The store was frozen before the write was attempted.
    #[error("parameter '{name}' is read-only once backends are opened")]
    ReadOnly {
        /// Full parameter name.
        name: String,
    },

    /// A `name=value` override entry could not be split.
    #[error("malformed parameter override '{entry}': expected name=value")]
    MalformedOverride {
        /// Entry as supplied.
        entry: String,
    },
}

/// Errors surfaced by the registry and lifecycle manager.
#[derive(Debug, Error)]
pub enum PlmError {
    /// A backend declared a duplicate or malformed parameter. Fatal.
    #[error("backend '{backend}' failed to register parameters: {source}")]
    RegistrationConflict {
        /// Backend whose registration failed.
        backend: String,
        /// Underlying parameter error.
        #[source]
        source: ParameterError,
    },

    /// Two backends share the same component name.
    #[error("backend '{name}' is already registered")]
    DuplicateBackend {
        /// Conflicting backend name.
        name: String,
    },

    /// A backend descriptor failed validation.
    #[error("invalid backend descriptor: {message}")]
    InvalidDescriptor {
        /// Description of the validation failure.
        message: String,
    },

    /// A parameter store operation failed outside registration.
    #[error(transparent)]
    Parameter(#[from] ParameterError),

    /// A lifecycle operation was invoked in the wrong phase.
    #[error("cannot {operation} backends while the lifecycle is {phase}")]
    OutOfOrder {
        /// Operation that was attempted.
        operation: &'static str,
        /// Phase the manager was in.
        phase: &'static str,
    },
}

/// Error reported by a backend whose `open` step failed.
#[derive(Debug, Error)]
#[error("backend {backend} failed to open: {message}")]
pub struct BackendOpenError {
    /// Name of the backend that failed.
    pub backend: String,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl BackendOpenError {
    /// Builds an error without an underlying source.
    #[must_use]
    pub fn new(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Builds an error that wraps an underlying source.
    #[must_use]
    pub fn with_source(
        backend: impl Into<String>,
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            backend: backend.into(),
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Human-readable message describing the failure.
    #[must_use]
    pub fn message(&self) -> &str {
        self.message.as_str()
    }
}

/// Errors raised by a runtime module while building launch commands.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LaunchError {
    /// The allocation contained no nodes to launch on.
    #[error("backend '{backend}' cannot launch onto an empty allocation")]
    EmptyAllocation {
        /// Backend that rejected the request.
        backend: String,
    },
}

/// Error returned when a selection directive mixes include and exclude forms.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("launcher directive '{directive}' mixes included and excluded backends")]
pub struct FilterError {
    directive: String,
}

impl FilterError {
    /// Creates an error for the offending directive.
    #[must_use]
    pub fn new(directive: impl Into<String>) -> Self {
        Self {
            directive: directive.into(),
        }
    }

    /// Returns the directive that failed to parse.
    #[must_use]
    pub fn directive(&self) -> &str {
        self.directive.as_str()
    }
}
