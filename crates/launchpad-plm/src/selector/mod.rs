//! Priority arbitration among eligible backends.
//!
//! [`select`] takes every query result in registration order and returns the
//! single winner: the eligible backend with the highest priority, with ties
//! going to the one registered first. Ineligible results never take part in
//! the comparison.

use std::fmt;
use std::sync::Arc;

use crate::backend::{BackendDescriptor, Eligibility, LaunchModule};

/// The backend chosen for this runtime.
#[derive(Clone)]
pub struct Selection {
    descriptor: BackendDescriptor,
    position: usize,
    priority: i32,
    module: Arc<dyn LaunchModule>,
}

impl Selection {
    /// Descriptor of the winning backend.
    #[must_use]
    pub const fn descriptor(&self) -> &BackendDescriptor {
        &self.descriptor
    }

    /// Registration index of the winner.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Priority the winner reported.
    #[must_use]
    pub const fn priority(&self) -> i32 {
        self.priority
    }

    /// Runtime module that performs launching.
    #[must_use]
    pub fn module(&self) -> Arc<dyn LaunchModule> {
        Arc::clone(&self.module)
    }
}

impl fmt::Debug for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selection")
            .field("descriptor", &self.descriptor)
            .field("position", &self.position)
            .field("priority", &self.priority)
            .field("module", &self.module.backend())
            .finish()
    }
}

/// Result of a full discovery round.
#[derive(Debug, Clone, Default)]
pub enum SelectionOutcome {
    /// Exactly one backend won.
    Selected(Selection),
    /// No backend reported eligibility.
    #[default]
    NoEligibleBackend,
}

impl SelectionOutcome {
    /// Returns the winning selection, if any.
    #[must_use]
    pub const fn selection(&self) -> Option<&Selection> {
        match self {
            Self::Selected(selection) => Some(selection),
            Self::NoEligibleBackend => None,
        }
    }

    /// Name of the winning backend, if any.
    #[must_use]
    pub fn selected_name(&self) -> Option<&str> {
        self.selection().map(|selection| selection.descriptor.name())
    }

    /// Returns `true` when a backend was selected.
    #[must_use]
    pub const fn is_selected(&self) -> bool {
        matches!(self, Self::Selected(_))
    }
}

/// Picks the winning backend from query results in registration order.
///
/// # Example
///
/// ```
/// use launchpad_plm::{BackendDescriptor, BackendVersion, Eligibility, select};
///
/// let version = BackendVersion::new(1, 0, 0);
/// let results = vec![
///     (BackendDescriptor::new("pbs", version), Eligibility::Ineligible),
/// ];
/// let outcome = select(results.iter().map(|(d, e)| (d, e)));
/// assert!(!outcome.is_selected());
/// ```
pub fn select<'a, I>(results: I) -> SelectionOutcome
where
    I: IntoIterator<Item = (&'a BackendDescriptor, &'a Eligibility)>,
{
    let mut best: Option<Selection> = None;
    for (position, (descriptor, eligibility)) in results.into_iter().enumerate() {
        let Eligibility::Eligible { priority, module } = eligibility else {
            continue;
        };
        // Strictly greater keeps the earliest registration on ties.
        let better = best
            .as_ref()
            .is_none_or(|current| *priority > current.priority);
        if better {
            best = Some(Selection {
                descriptor: descriptor.clone(),
                position,
                priority: *priority,
                module: Arc::clone(module),
            });
        }
    }
    best.map_or(SelectionOutcome::NoEligibleBackend, SelectionOutcome::Selected)
}
