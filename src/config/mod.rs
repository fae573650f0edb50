//! Server option sets and config file rendering.
//!
//! A Redis config file is plain text, one directive per line:
//! `<dash-separated-key> <value>\n`. List-valued options (like `save`) render
//! as one line per element under the same key. The rendered text is the
//! byte-for-byte contract the server consumes, so insertion order and
//! spacing are part of the public API, not an implementation detail.

mod defaults;

use indexmap::IndexMap;

use crate::error::{Error, Result};


/// Build a single configuration file line.
///
/// Underscores in the key are transposed to dashes; the value is appended
/// verbatim after a single space. No escaping, no validation: option values
/// are opaque to this crate.
pub fn build_config_line(key: &str, value: &str) -> String {
    format!("{} {}", key.replace('_', "-"), value)
}

/// Value of a single server option: a scalar or an ordered list of scalars.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Scalar(String),
    List(Vec<String>),
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        Self::Scalar(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        Self::Scalar(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        Self::Scalar(value.to_string())
    }
}

impl From<Vec<String>> for OptionValue {
    fn from(values: Vec<String>) -> Self {
        Self::List(values)
    }
}

impl From<Vec<&str>> for OptionValue {
    fn from(values: Vec<&str>) -> Self {
        Self::List(values.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for OptionValue {
    fn from(values: &[&str]) -> Self {
        Self::List(values.iter().map(|v| (*v).to_string()).collect())
    }
}

/// Ordered mapping of server option names to values.
///
/// Insertion order is preserved and survives [`OptionSet::resolve`]:
/// overriding an existing key keeps its original position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionSet {
    entries: IndexMap<String, OptionValue>,
}

impl OptionSet {
    /// Create an empty option set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an option. Replacing keeps the key's position.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<OptionValue>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Builder-style [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.set(key, value);
        self
    }

    /// Look up an option by key.
    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.entries.get(key)
    }

    /// Look up a scalar option by key. Returns `None` for absent keys and
    /// for list-valued options.
    pub fn scalar(&self, key: &str) -> Option<&str> {
        match self.entries.get(key) {
            Some(OptionValue::Scalar(s)) => Some(s),
            _ => None,
        }
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge `overrides` into a copy of `defaults`.
    ///
    /// Keys present in both keep the default's position with the override's
    /// value; keys only in `overrides` are appended in their own order.
    /// Neither input is mutated.
    pub fn resolve(defaults: &OptionSet, overrides: &OptionSet) -> OptionSet {
        let mut resolved = defaults.clone();
        for (key, value) in &overrides.entries {
            resolved.entries.insert(key.clone(), value.clone());
        }
        resolved
    }

    /// Render the full config file text, one newline-terminated line per
    /// scalar and per list element, in insertion order.
    pub fn render(&self) -> String {
        let mut text = String::new();
        for (key, value) in &self.entries {
            match value {
                OptionValue::Scalar(v) => {
                    text.push_str(&build_config_line(key, v));
                    text.push('\n');
                },
                OptionValue::List(items) => {
                    for item in items {
                        text.push_str(&build_config_line(key, item));
                        text.push('\n');
                    }
                },
            }
        }
        text
    }

    /// Build an option set from a parsed TOML value.
    ///
    /// The value must be a table; entries may be strings, integers, floats,
    /// booleans, or arrays of those. Anything else fails with
    /// [`Error::InvalidOverrides`] before any side effect.
    pub fn from_toml(value: &toml::Value) -> Result<OptionSet> {
        let table = value.as_table().ok_or_else(|| {
            Error::invalid_overrides(format!("expected a table, got {}", value.type_str()))
        })?;

        let mut opts = OptionSet::new();
        for (key, entry) in table {
            match entry {
                toml::Value::Array(items) => {
                    let items = items
                        .iter()
                        .map(|item| toml_scalar(key, item))
                        .collect::<Result<Vec<_>>>()?;
                    opts.set(key.clone(), OptionValue::List(items));
                },
                other => {
                    opts.set(key.clone(), toml_scalar(key, other)?);
                },
            }
        }
        Ok(opts)
    }
}

fn toml_scalar(key: &str, value: &toml::Value) -> Result<String> {
    match value {
        toml::Value::String(s) => Ok(s.clone()),
        toml::Value::Integer(i) => Ok(i.to_string()),
        toml::Value::Float(f) => Ok(f.to_string()),
        toml::Value::Boolean(b) => Ok(b.to_string()),
        other => Err(Error::invalid_overrides(format!(
            "option '{key}' has unsupported value type {}",
            other.type_str()
        ))),
    }
}

/// Immutable handle to the process-wide default server option set.
///
/// Instances resolve their overrides against a `ServerDefaults` copy and
/// never mutate it. Replacing the defaults wholesale produces a new handle
/// rather than mutating shared state.
#[derive(Debug, Clone)]
pub struct ServerDefaults {
    opts: OptionSet,
}

impl ServerDefaults {
    /// Stock defaults with artifact paths derived from the current
    /// process id.
    pub fn standard() -> Self {
        Self::for_pid(std::process::id())
    }

    /// Stock defaults with artifact paths derived from an explicit pid.
    /// Useful for deterministic output in tests.
    pub fn for_pid(pid: u32) -> Self {
        Self {
            opts: defaults::stock_options(pid),
        }
    }

    /// Administrative wholesale replacement of the default option set.
    pub fn replace(opts: OptionSet) -> Self {
        Self { opts }
    }

    /// The default options, in their defined order.
    pub fn options(&self) -> &OptionSet {
        &self.opts
    }
}

impl Default for ServerDefaults {
    fn default() -> Self {
        Self::standard()
    }
}

pub(crate) use defaults::generated_config_path;
