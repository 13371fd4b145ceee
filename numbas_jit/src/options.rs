//! Compiler options attached to proxies and dispatchers.
//!
//! Options are an ordered name → value map, handed unchanged to the
//! backend. Which names mean something is up to the backend; the map itself
//! only stores and merges them.

use numbas_core::{NumbasError, NumbasResult};
use std::collections::BTreeMap;
use std::fmt;

/// A single option value.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    /// Boolean flag.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Float.
    Float(f64),
    /// String.
    Str(String),
}

impl OptionValue {
    /// Kind name used in error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
        }
    }
}

impl From<bool> for OptionValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for OptionValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for OptionValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for OptionValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{:?}", v),
            Self::Str(v) => write!(f, "{:?}", v),
        }
    }
}

// =============================================================================
// Option Map
// =============================================================================

/// Ordered option map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JitOptions {
    values: BTreeMap<String, OptionValue>,
}

impl JitOptions {
    /// Empty options; the backend applies its defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.set(name, value);
        self
    }

    /// Set one option.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<OptionValue>) {
        self.values.insert(name.into(), value.into());
    }

    /// Raw option value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.values.get(name)
    }

    /// Boolean option, or `default` when unset. A value of another kind is
    /// a `CompileError`.
    pub fn bool_or(&self, name: &str, default: bool) -> NumbasResult<bool> {
        match self.values.get(name) {
            None => Ok(default),
            Some(OptionValue::Bool(b)) => Ok(*b),
            Some(other) => Err(NumbasError::compile(format!(
                "option '{}' expects a bool, got {} {}",
                name,
                other.kind(),
                other
            ))),
        }
    }

    /// Overwrite entries with those from `other`, keeping the rest.
    pub fn merge(&mut self, other: &JitOptions) {
        for (name, value) in &other.values {
            self.values.insert(name.clone(), value.clone());
        }
    }

    /// Option names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// `(name, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of options set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if no option is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<OptionValue>> FromIterator<(K, V)> for JitOptions {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut options = Self::new();
        for (k, v) in iter {
            options.set(k, v);
        }
        options
    }
}

impl<K: Into<String>, V: Into<OptionValue>, const N: usize> From<[(K, V); N]> for JitOptions {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl fmt::Display for JitOptions {
    /// `name=value` pairs, comma separated.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", name, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_overwrites_and_keeps() {
        let mut base = JitOptions::from([("nopython", true), ("fold_constants", true)]);
        base.merge(&JitOptions::new().with("nopython", false).with("level", 2i64));
        assert_eq!(base.get("nopython"), Some(&OptionValue::Bool(false)));
        assert_eq!(base.get("fold_constants"), Some(&OptionValue::Bool(true)));
        assert_eq!(base.get("level"), Some(&OptionValue::Int(2)));
        assert_eq!(base.len(), 3);
    }

    #[test]
    fn test_bool_or() {
        let options = JitOptions::new().with("nopython", "yes");
        assert!(options.bool_or("fastmath", true).unwrap());
        assert!(options.bool_or("nopython", true).unwrap_err().is_compile_error());
    }

    #[test]
    fn test_display_is_ordered() {
        let options = JitOptions::new().with("z", 1.5).with("a", true).with("m", "x");
        assert_eq!(options.to_string(), "a=True, m=\"x\", z=1.5");
        assert_eq!(options.names().collect::<Vec<_>>(), vec!["a", "m", "z"]);
    }
}
