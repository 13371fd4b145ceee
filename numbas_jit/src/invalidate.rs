//! Run-before invalidation.
//!
//! [`delete_before`] and [`reset_before`] name one or more specializable
//! methods. Applied to an instance, they evict or reset those methods'
//! state; wrapped around a native method, they do so before every call:
//!
//! ```text
//! class.define("set_x", Arc::new(reset_before("f").wrap(set_x)));
//! obj.set_x(20)   // resets obj.f, then runs set_x
//! ```
//!
//! Invalidation is best effort. A name that does not resolve, resolves to
//! something other than a specializable method, or has nothing to drop is
//! skipped and logged at `debug`.

use crate::bound::BoundMethod;
use crate::introspect;
use numbas_core::NumbasResult;
use numbas_runtime::{NativeMethod, Object};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

// =============================================================================
// Method Names
// =============================================================================

/// One or more method names.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MethodNames(Vec<String>);

impl MethodNames {
    /// Names in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Number of names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if there are no names.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for MethodNames {
    fn from(name: &str) -> Self {
        Self(vec![name.to_string()])
    }
}

impl From<String> for MethodNames {
    fn from(name: String) -> Self {
        Self(vec![name])
    }
}

impl From<Vec<String>> for MethodNames {
    fn from(names: Vec<String>) -> Self {
        Self(names)
    }
}

impl From<&[&str]> for MethodNames {
    fn from(names: &[&str]) -> Self {
        names.iter().copied().collect()
    }
}

impl<const N: usize> From<[&str; N]> for MethodNames {
    fn from(names: [&str; N]) -> Self {
        names.into_iter().collect()
    }
}

impl<'a> FromIterator<&'a str> for MethodNames {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        Self(iter.into_iter().map(str::to_string).collect())
    }
}

// =============================================================================
// InvalidateBefore
// =============================================================================

/// What to do with each named method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invalidation {
    /// Evict the binding from the proxy cache.
    Delete,
    /// Drop the specialization, keeping the binding.
    Reset,
}

impl Invalidation {
    fn run(self, bound: &Arc<BoundMethod>) -> NumbasResult<()> {
        match self {
            Self::Delete => introspect::delete_binding(bound),
            Self::Reset => bound.dispatcher().try_reset(),
        }
    }
}

impl fmt::Display for Invalidation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Delete => "delete",
            Self::Reset => "reset",
        })
    }
}

/// Invalidate the named methods before running something else.
#[derive(Debug, Clone)]
pub struct InvalidateBefore {
    action: Invalidation,
    names: MethodNames,
}

/// Evict the named methods' bindings.
pub fn delete_before(names: impl Into<MethodNames>) -> InvalidateBefore {
    InvalidateBefore {
        action: Invalidation::Delete,
        names: names.into(),
    }
}

/// Reset the named methods' specializations.
pub fn reset_before(names: impl Into<MethodNames>) -> InvalidateBefore {
    InvalidateBefore {
        action: Invalidation::Reset,
        names: names.into(),
    }
}

impl InvalidateBefore {
    /// The action applied to each name.
    #[must_use]
    pub fn action(&self) -> Invalidation {
        self.action
    }

    /// The targeted method names.
    #[must_use]
    pub fn names(&self) -> &MethodNames {
        &self.names
    }

    /// Invalidate every named method of `instance`.
    pub fn apply(&self, instance: &Arc<Object>) {
        for name in self.names.iter() {
            let result = instance
                .get_attr(name)
                .and_then(|value| BoundMethod::expect(&value))
                .and_then(|bound| self.action.run(&bound));
            if let Err(err) = result {
                debug!(
                    action = %self.action,
                    method = name,
                    instance = %instance.id(),
                    %err,
                    "invalidation skipped"
                );
            }
        }
    }

    /// Wrap `method` so every call invalidates first.
    #[must_use]
    pub fn wrap(self, method: NativeMethod) -> NativeMethod {
        let name = method.name().to_string();
        let (min_args, max_args) = method.arity();
        NativeMethod::new(name, min_args, max_args, move |instance, args| {
            self.apply(instance);
            method.call_on(instance, args)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_names_conversions() {
        assert_eq!(MethodNames::from("f").len(), 1);
        assert_eq!(MethodNames::from(["f", "g"]).iter().collect::<Vec<_>>(), vec!["f", "g"]);
        let slice: &[&str] = &["a", "b", "c"];
        assert_eq!(MethodNames::from(slice).len(), 3);
        assert!(MethodNames::from(Vec::new()).is_empty());
    }

    #[test]
    fn test_constructors() {
        let d = delete_before(["f", "g"]);
        assert_eq!(d.action(), Invalidation::Delete);
        assert_eq!(d.names().len(), 2);
        assert_eq!(reset_before("f").action(), Invalidation::Reset);
        assert_eq!(Invalidation::Reset.to_string(), "reset");
    }
}
