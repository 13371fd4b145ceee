//! Module namespaces.
//!
//! A [`Scope`] maps names to values and may have a parent. Lookups walk the
//! chain; writes only touch the scope written to. A child scope therefore
//! overlays its parent without changing what other users of the parent see.

use crate::value::Value;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

/// A namespace with an optional parent.
pub struct Scope {
    name: String,
    vars: RwLock<FxHashMap<String, Value>>,
    parent: Option<Arc<Scope>>,
}

impl Scope {
    /// Create a root scope.
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            vars: RwLock::new(FxHashMap::default()),
            parent: None,
        })
    }

    /// Create a scope that overlays `parent`.
    pub fn child(parent: &Arc<Scope>, name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            vars: RwLock::new(FxHashMap::default()),
            parent: Some(Arc::clone(parent)),
        })
    }

    /// Scope name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parent scope.
    #[must_use]
    pub fn parent(&self) -> Option<&Arc<Scope>> {
        self.parent.as_ref()
    }

    /// Bind `name` in this scope.
    pub fn set(&self, name: impl Into<String>, value: Value) {
        let _old = self.vars.write().insert(name.into(), value);
    }

    /// Bind many names at once.
    pub fn extend(&self, vars: impl IntoIterator<Item = (String, Value)>) {
        let mut guard = self.vars.write();
        let replaced: Vec<_> = vars
            .into_iter()
            .filter_map(|(k, v)| guard.insert(k, v))
            .collect();
        drop(guard);
        drop(replaced);
    }

    /// Look `name` up through the scope chain.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Value> {
        let mut scope = self;
        loop {
            if let Some(value) = scope.vars.read().get(name) {
                return Some(value.clone());
            }
            scope = scope.parent.as_deref()?;
        }
    }

    /// True if `name` resolves anywhere in the chain.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// True if `name` is bound in this scope itself.
    #[must_use]
    pub fn contains_local(&self, name: &str) -> bool {
        self.vars.read().contains_key(name)
    }

    /// Names bound in this scope itself, sorted.
    #[must_use]
    pub fn local_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.vars.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("name", &self.name)
            .field("names", &self.local_names())
            .field("parent", &self.parent.as_ref().map(|p| p.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_overlays_parent() {
        let module = Scope::new("module");
        module.set("g", Value::Int(1));
        module.set("h", Value::Int(2));

        let child = Scope::child(&module, "overlay");
        child.set("g", Value::Int(10));

        assert_eq!(child.get("g"), Some(Value::Int(10)));
        assert_eq!(child.get("h"), Some(Value::Int(2)));
        assert_eq!(module.get("g"), Some(Value::Int(1)));
        assert!(!module.contains("__x"));
        assert!(child.contains_local("g"));
        assert!(!child.contains_local("h"));
    }

    #[test]
    fn test_extend_and_names() {
        let scope = Scope::new("m");
        scope.extend([("b".to_string(), Value::None), ("a".to_string(), Value::None)]);
        assert_eq!(scope.local_names(), vec!["a", "b"]);
        assert_eq!(scope.get("zz"), None);
    }
}
