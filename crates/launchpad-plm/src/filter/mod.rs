//! Operator directive restricting which backends take part in selection.
//!
//! A directive is a comma-separated list of backend names. A leading `^`
//! turns the whole list into an exclusion list:
//!
//! - `slurm,ssh` opens and queries only `slurm` and `ssh`;
//! - `^pbs,lsf` opens and queries everything except `pbs` and `lsf`;
//! - an empty directive allows every backend.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::FilterError;

/// Parsed launcher directive.
///
/// # Example
///
/// ```
/// use launchpad_plm::SelectionFilter;
///
/// let filter: SelectionFilter = "^pbs,lsf".parse().expect("valid directive");
/// assert!(filter.allows("slurm"));
/// assert!(!filter.allows("pbs"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SelectionFilter {
    /// Every backend participates.
    #[default]
    All,
    /// Only the named backends participate.
    Include(BTreeSet<String>),
    /// Every backend except the named ones participates.
    Exclude(BTreeSet<String>),
}

impl SelectionFilter {
    /// Parses an optional directive, treating `None` as [`SelectionFilter::All`].
    ///
    /// # Errors
    ///
    /// Returns [`FilterError`] when include and exclude forms are mixed.
    pub fn from_directive(directive: Option<&str>) -> Result<Self, FilterError> {
        directive.map_or(Ok(Self::All), str::parse)
    }

    /// Returns `true` when `name` may be opened and queried.
    #[must_use]
    pub fn allows(&self, name: &str) -> bool {
        match self {
            Self::All => true,
            Self::Include(names) => names.contains(name),
            Self::Exclude(names) => !names.contains(name),
        }
    }

    /// Names mentioned by the directive.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        let names = match self {
            Self::All => None,
            Self::Include(names) | Self::Exclude(names) => Some(names),
        };
        names.into_iter().flatten().map(String::as_str)
    }
}

impl FromStr for SelectionFilter {
    type Err = FilterError;

    fn from_str(directive: &str) -> Result<Self, Self::Err> {
        let trimmed = directive.trim();
        let (exclude, list) = match trimmed.strip_prefix('^') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let mut names = BTreeSet::new();
        for raw in list.split(',') {
            let name = raw.trim();
            if name.is_empty() {
                continue;
            }
            if name.starts_with('^') {
                return Err(FilterError::new(directive));
            }
            names.insert(name.to_owned());
        }
        if names.is_empty() {
            return Ok(Self::All);
        }
        Ok(if exclude {
            Self::Exclude(names)
        } else {
            Self::Include(names)
        })
    }
}

impl fmt::Display for SelectionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (prefix, names) = match self {
            Self::All => return f.write_str("*"),
            Self::Include(names) => ("", names),
            Self::Exclude(names) => ("^", names),
        };
        let joined: Vec<&str> = names.iter().map(String::as_str).collect();
        write!(f, "{prefix}{}", joined.join(","))
    }
}
