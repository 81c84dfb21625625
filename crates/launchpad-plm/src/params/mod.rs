//! Typed parameter storage shared by every launcher backend.
//!
//! Backends declare their configurable options through a component-scoped
//! [`ParameterScope`] during registration and keep the typed [`ParamHandle`]s
//! they receive. External configuration is applied with
//! [`ParameterStore::resolve`] between registration and open, after which the
//! store is frozen and only read.
//!
//! Parameters are addressed externally by their full name,
//! `<framework>_<component>_<name>`, for example `plm_slurm_args`.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::marker::PhantomData;

use serde::Serialize;

use crate::environment::EnvironmentProbe;
use crate::error::ParameterError;

/// Prefix for environment variables that set parameters.
pub const PARAM_ENV_PREFIX: &str = "LAUNCHPAD_MCA_";

/// Declared type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    /// Free-form text.
    String,
    /// Boolean switch.
    Bool,
    /// Signed integer.
    Int,
}

impl ParamKind {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Bool => "bool",
            Self::Int => "integer",
        }
    }

    fn parse(self, raw: &str) -> Option<ParamValue> {
        match self {
            Self::String => Some(ParamValue::Str(raw.to_owned())),
            Self::Bool => parse_bool(raw).map(ParamValue::Bool),
            Self::Int => raw.trim().parse().ok().map(ParamValue::Int),
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Current or default value of a parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// No value; only string parameters may be unset.
    Unset,
    /// Text value.
    Str(String),
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unset => f.write_str("<unset>"),
            Self::Str(value) => f.write_str(value),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
        }
    }
}

/// Where the current value of a parameter came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamOrigin {
    /// Declared default.
    Default,
    /// `LAUNCHPAD_MCA_*` environment variable.
    Environment,
    /// Explicit override from configuration or the command line.
    Override,
}

impl ParamOrigin {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Environment => "environment",
            Self::Override => "override",
        }
    }
}

impl fmt::Display for ParamOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for String {}
    impl Sealed for bool {}
    impl Sealed for i64 {}
}

/// Rust types a parameter can be read as.
pub trait ParamType: sealed::Sealed + Sized {
    /// Parameter kind stored for this type.
    const KIND: ParamKind;

    /// Extracts a value of this type, returning `None` when unset.
    fn extract(value: &ParamValue) -> Option<Self>;
}

impl ParamType for String {
    const KIND: ParamKind = ParamKind::String;

    fn extract(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::Str(text) => Some(text.clone()),
            _ => None,
        }
    }
}

impl ParamType for bool {
    const KIND: ParamKind = ParamKind::Bool;

    fn extract(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::Bool(flag) => Some(*flag),
            _ => None,
        }
    }
}

impl ParamType for i64 {
    const KIND: ParamKind = ParamKind::Int;

    fn extract(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::Int(number) => Some(*number),
            _ => None,
        }
    }
}

/// Typed reference to a declared parameter.
pub struct ParamHandle<T> {
    index: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ParamHandle<T> {
    const fn new(index: usize) -> Self {
        Self {
            index,
            _marker: PhantomData,
        }
    }
}

impl<T> Clone for ParamHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ParamHandle<T> {}

impl<T> fmt::Debug for ParamHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ParamHandle").field(&self.index).finish()
    }
}

/// A declared parameter with its current value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParamEntry {
    full_name: String,
    component: String,
    description: String,
    kind: ParamKind,
    default: ParamValue,
    value: ParamValue,
    origin: ParamOrigin,
}

impl ParamEntry {
    /// Externally visible name, `<framework>_<component>_<name>`.
    #[must_use]
    pub const fn full_name(&self) -> &str {
        self.full_name.as_str()
    }

    /// Component that declared the parameter.
    #[must_use]
    pub const fn component(&self) -> &str {
        self.component.as_str()
    }

    /// Help text supplied at declaration.
    #[must_use]
    pub const fn description(&self) -> &str {
        self.description.as_str()
    }

    /// Declared type.
    #[must_use]
    pub const fn kind(&self) -> ParamKind {
        self.kind
    }

    /// Declared default.
    #[must_use]
    pub const fn default_value(&self) -> &ParamValue {
        &self.default
    }

    /// Current value.
    #[must_use]
    pub const fn value(&self) -> &ParamValue {
        &self.value
    }

    /// Where the current value came from.
    #[must_use]
    pub const fn origin(&self) -> ParamOrigin {
        self.origin
    }
}

/// Storage for every parameter declared by the registered backends.
///
/// One store belongs to one runtime instance; nothing here is global.
///
/// # Example
///
/// ```
/// use launchpad_plm::{OverrideSource, ParameterStore};
///
/// let mut store = ParameterStore::new();
/// let args = store
///     .scope("plm", "slurm")
///     .string("args", "Custom arguments to srun", None)
///     .expect("declare args");
///
/// let overrides = OverrideSource::parse(["plm_slurm_args=--exclusive"]).expect("parse");
/// store.resolve(&[&overrides]).expect("resolve");
/// assert_eq!(store.get(args).as_deref(), Some("--exclusive"));
/// ```
#[derive(Debug, Default, Clone)]
pub struct ParameterStore {
    entries: Vec<ParamEntry>,
    by_name: HashMap<String, usize>,
    frozen: bool,
}

impl ParameterStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a registrar that declares parameters for one component.
    pub fn scope(
        &mut self,
        framework: impl Into<String>,
        component: impl Into<String>,
    ) -> ParameterScope<'_> {
        ParameterScope {
            store: self,
            framework: framework.into(),
            component: component.into(),
        }
    }

    /// Reads the current value behind `handle`, or `None` when unset.
    #[must_use]
    pub fn get<T: ParamType>(&self, handle: ParamHandle<T>) -> Option<T> {
        self.entries
            .get(handle.index)
            .and_then(|entry| T::extract(&entry.value))
    }

    /// Looks up a parameter by its full name.
    #[must_use]
    pub fn entry(&self, full_name: &str) -> Option<&ParamEntry> {
        self.by_name
            .get(full_name)
            .and_then(|index| self.entries.get(*index))
    }

    /// All parameters in declaration order.
    #[must_use]
    pub fn entries(&self) -> &[ParamEntry] {
        &self.entries
    }

    /// Parameters declared by `component`, in declaration order.
    pub fn entries_for<'a>(&'a self, component: &str) -> impl Iterator<Item = &'a ParamEntry> {
        self.entries
            .iter()
            .filter(move |entry| entry.component == component)
    }

    /// Returns the number of declared parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when nothing has been declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sets a parameter from raw text, parsing it as the declared type.
    ///
    /// Returns `Ok(false)` when no parameter has that name.
    ///
    /// # Errors
    ///
    /// Returns [`ParameterError::ReadOnly`] once the store is frozen and
    /// [`ParameterError::InvalidValue`] when `raw` does not parse.
    pub fn set_from_str(
        &mut self,
        full_name: &str,
        raw: &str,
        origin: ParamOrigin,
    ) -> Result<bool, ParameterError> {
        let Some(index) = self.by_name.get(full_name).copied() else {
            return Ok(false);
        };
        if self.frozen {
            return Err(ParameterError::ReadOnly {
                name: full_name.to_owned(),
            });
        }
        let Some(entry) = self.entries.get_mut(index) else {
            return Ok(false);
        };
        let value = entry
            .kind
            .parse(raw)
            .ok_or_else(|| ParameterError::InvalidValue {
                name: full_name.to_owned(),
                value: raw.to_owned(),
                kind: entry.kind,
                origin,
            })?;
        entry.value = value;
        entry.origin = origin;
        Ok(true)
    }

    /// Applies external sources in ascending order of precedence.
    ///
    /// Every declared parameter is looked up in each source; later sources
    /// win. Names a source offers that match no declared parameter are
    /// logged and otherwise ignored.
    ///
    /// # Errors
    ///
    /// Returns the first [`ParameterError`] raised while applying a value.
    pub fn resolve(&mut self, sources: &[&dyn ParameterSource]) -> Result<(), ParameterError> {
        let names: Vec<String> = self
            .entries
            .iter()
            .map(|entry| entry.full_name.clone())
            .collect();
        for source in sources {
            for name in &names {
                if let Some(raw) = source.lookup(name) {
                    self.set_from_str(name, &raw, source.origin())?;
                    tracing::debug!(
                        target: "launchpad_plm::params",
                        event = "parameter_set",
                        parameter = %name,
                        origin = %source.origin(),
                        "parameter resolved from external source"
                    );
                }
            }
            for offered in source.names() {
                if !self.by_name.contains_key(&offered) {
                    tracing::warn!(
                        target: "launchpad_plm::params",
                        event = "unknown_parameter",
                        parameter = %offered,
                        origin = %source.origin(),
                        "ignoring value for unknown parameter"
                    );
                }
            }
        }
        Ok(())
    }

    /// Makes the store read-only.
    pub const fn freeze(&mut self) {
        self.frozen = true;
    }

    /// Returns `true` once [`ParameterStore::freeze`] has been called.
    #[must_use]
    pub const fn is_frozen(&self) -> bool {
        self.frozen
    }

    fn declare(
        &mut self,
        full_name: String,
        component: &str,
        description: &str,
        kind: ParamKind,
        default: ParamValue,
    ) -> Result<usize, ParameterError> {
        if self.frozen {
            return Err(ParameterError::ReadOnly { name: full_name });
        }
        if self.by_name.contains_key(&full_name) {
            return Err(ParameterError::Duplicate { name: full_name });
        }
        let index = self.entries.len();
        self.entries.push(ParamEntry {
            full_name: full_name.clone(),
            component: component.to_owned(),
            description: description.to_owned(),
            kind,
            value: default.clone(),
            default,
            origin: ParamOrigin::Default,
        });
        self.by_name.insert(full_name, index);
        Ok(index)
    }
}

/// Registrar for the parameters of a single component.
#[derive(Debug)]
pub struct ParameterScope<'a> {
    store: &'a mut ParameterStore,
    framework: String,
    component: String,
}

impl ParameterScope<'_> {
    /// Declares a string parameter, unset unless `default` is given.
    ///
    /// # Errors
    ///
    /// Returns [`ParameterError::MalformedName`] or
    /// [`ParameterError::Duplicate`].
    pub fn string(
        &mut self,
        name: &str,
        description: &str,
        default: Option<&str>,
    ) -> Result<ParamHandle<String>, ParameterError> {
        let value = default.map_or(ParamValue::Unset, |text| ParamValue::Str(text.to_owned()));
        self.declare(name, description, ParamKind::String, value)
    }

    /// Declares a boolean parameter.
    ///
    /// # Errors
    ///
    /// Returns [`ParameterError::MalformedName`] or
    /// [`ParameterError::Duplicate`].
    pub fn flag(
        &mut self,
        name: &str,
        description: &str,
        default: bool,
    ) -> Result<ParamHandle<bool>, ParameterError> {
        self.declare(name, description, ParamKind::Bool, ParamValue::Bool(default))
    }

    /// Declares an integer parameter.
    ///
    /// # Errors
    ///
    /// Returns [`ParameterError::MalformedName`] or
    /// [`ParameterError::Duplicate`].
    pub fn integer(
        &mut self,
        name: &str,
        description: &str,
        default: i64,
    ) -> Result<ParamHandle<i64>, ParameterError> {
        self.declare(name, description, ParamKind::Int, ParamValue::Int(default))
    }

    fn declare<T>(
        &mut self,
        name: &str,
        description: &str,
        kind: ParamKind,
        default: ParamValue,
    ) -> Result<ParamHandle<T>, ParameterError> {
        for part in [self.framework.as_str(), self.component.as_str(), name] {
            validate_name_part(part)?;
        }
        let full_name = format!("{}_{}_{name}", self.framework, self.component);
        let index = self
            .store
            .declare(full_name, &self.component, description, kind, default)?;
        Ok(ParamHandle::new(index))
    }
}

fn validate_name_part(part: &str) -> Result<(), ParameterError> {
    let reason = if part.is_empty() {
        Some("name must not be empty")
    } else if !part
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        Some("only lowercase ASCII letters, digits, and underscores are allowed")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(ParameterError::MalformedName {
            name: part.to_owned(),
            reason,
        }),
        None => Ok(()),
    }
}

/// External supplier of parameter values.
pub trait ParameterSource {
    /// Origin recorded for values taken from this source.
    fn origin(&self) -> ParamOrigin;

    /// Returns the raw value for `full_name`, if the source has one.
    fn lookup(&self, full_name: &str) -> Option<String>;

    /// Names this source offers values for, used to flag unknown
    /// parameters. Sources that cannot enumerate return nothing.
    fn names(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Reads `LAUNCHPAD_MCA_<full_name>` variables through a probe.
#[derive(Debug, Clone)]
pub struct EnvironmentSource<P> {
    probe: P,
    prefix: String,
}

impl<P> EnvironmentSource<P> {
    /// Creates a source using [`PARAM_ENV_PREFIX`].
    #[must_use]
    pub fn new(probe: P) -> Self {
        Self::with_prefix(probe, PARAM_ENV_PREFIX)
    }

    /// Creates a source with a custom variable prefix.
    #[must_use]
    pub fn with_prefix(probe: P, prefix: impl Into<String>) -> Self {
        Self {
            probe,
            prefix: prefix.into(),
        }
    }
}

impl<P: EnvironmentProbe> ParameterSource for EnvironmentSource<P> {
    fn origin(&self) -> ParamOrigin {
        ParamOrigin::Environment
    }

    fn lookup(&self, full_name: &str) -> Option<String> {
        self.probe.var(&format!("{}{full_name}", self.prefix))
    }
}

/// Explicit `name=value` overrides from configuration.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OverrideSource {
    values: BTreeMap<String, String>,
}

impl OverrideSource {
    /// Parses `name=value` entries. Later entries for the same name win.
    ///
    /// # Errors
    ///
    /// Returns [`ParameterError::MalformedOverride`] for entries without `=`
    /// or with an empty name.
    pub fn parse<I, S>(entries: I) -> Result<Self, ParameterError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut values = BTreeMap::new();
        for entry in entries {
            let text = entry.as_ref();
            match text.split_once('=') {
                Some((name, value)) if !name.trim().is_empty() => {
                    values.insert(name.trim().to_owned(), value.to_owned());
                }
                _ => {
                    return Err(ParameterError::MalformedOverride {
                        entry: text.to_owned(),
                    });
                }
            }
        }
        Ok(Self { values })
    }
}

impl ParameterSource for OverrideSource {
    fn origin(&self) -> ParamOrigin {
        ParamOrigin::Override
    }

    fn lookup(&self, full_name: &str) -> Option<String> {
        self.values.get(full_name).cloned()
    }

    fn names(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }
}
