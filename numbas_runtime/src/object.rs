//! Class instances.
//!
//! An [`Object`] is a class reference plus an attribute dictionary. Lookup
//! follows Python's order for non-data descriptors:
//!
//! ```text
//! obj.name
//!   1. instance dictionary
//!   2. class descriptor table  -> descriptor.get(obj)
//!   3. class attributes
//!   4. AttributeError
//! ```
//!
//! Identity is an [`ObjectId`] allocated from a global counter. Ids are never
//! reused, so caches keyed by id cannot confuse a dead instance with a new
//! one that happens to live at the same address.

use crate::class::Class;
use crate::value::Value;
use numbas_core::{NumbasError, NumbasResult};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

// =============================================================================
// Object Identity
// =============================================================================

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Stable, never reused instance identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    fn next() -> Self {
        Self(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw id.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// =============================================================================
// Object
// =============================================================================

/// A class instance.
pub struct Object {
    id: ObjectId,
    class: Arc<Class>,
    attrs: RwLock<FxHashMap<String, Value>>,
}

impl Object {
    /// Create an instance with an empty dictionary.
    #[must_use]
    pub fn new(class: &Arc<Class>) -> Arc<Self> {
        Self::with_attrs(class, std::iter::empty::<(String, Value)>())
    }

    /// Create an instance with initial attributes.
    pub fn with_attrs<K: Into<String>>(
        class: &Arc<Class>,
        attrs: impl IntoIterator<Item = (K, Value)>,
    ) -> Arc<Self> {
        let attrs = attrs.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Arc::new(Self {
            id: ObjectId::next(),
            class: Arc::clone(class),
            attrs: RwLock::new(attrs),
        })
    }

    /// Instance id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Owning class.
    #[inline]
    #[must_use]
    pub fn class(&self) -> &Arc<Class> {
        &self.class
    }

    /// Look up an attribute.
    pub fn get_attr(self: &Arc<Self>, name: &str) -> NumbasResult<Value> {
        if let Some(value) = self.attrs.read().get(name) {
            return Ok(value.clone());
        }
        if let Some(descriptor) = self.class.descriptor(name) {
            return descriptor.get(self);
        }
        self.class
            .class_attr(name)
            .ok_or_else(|| NumbasError::attribute_error(self.class.name(), name))
    }

    /// Set an instance attribute, shadowing any class-level binding.
    pub fn set_attr(&self, name: impl Into<String>, value: Value) {
        // The old value may be the last reference to another object; drop it
        // after the guard is gone.
        let _old = self.attrs.write().insert(name.into(), value);
    }

    /// Remove an instance attribute.
    pub fn del_attr(&self, name: &str) -> NumbasResult<()> {
        let removed = self.attrs.write().remove(name);
        match removed {
            Some(_) => Ok(()),
            None => Err(NumbasError::attribute_error(self.class.name(), name)),
        }
    }

    /// True if `name` is in the instance dictionary.
    #[must_use]
    pub fn has_own_attr(&self, name: &str) -> bool {
        self.attrs.read().contains_key(name)
    }

    /// Resolve a dotted path such as `["a", "b", "c"]` starting at this
    /// object, like `operator.attrgetter("a.b.c")`.
    pub fn resolve_path<S: AsRef<str>>(self: &Arc<Self>, path: &[S]) -> NumbasResult<Value> {
        let Some((first, rest)) = path.split_first() else {
            return Ok(Value::Object(Arc::clone(self)));
        };
        let mut value = self.get_attr(first.as_ref())?;
        for part in rest {
            value = value.get_attr(part.as_ref())?;
        }
        Ok(value)
    }

    /// Look up `name` and call it with `args`.
    pub fn call_method(self: &Arc<Self>, name: &str, args: &[Value]) -> NumbasResult<Value> {
        self.get_attr(name)?.call(args)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("id", &self.id)
            .field("class", &self.class.name())
            .finish_non_exhaustive()
    }
}

impl Drop for Object {
    fn drop(&mut self) {
        self.class.instance_dropped(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::NativeMethod;
    use crate::scope::Scope;

    fn point_class() -> Arc<Class> {
        Class::new("Point", Scope::new("test"))
    }

    #[test]
    fn test_ids_are_unique() {
        let class = point_class();
        let a = Object::new(&class);
        let b = Object::new(&class);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_lookup_order() {
        let class = point_class();
        class.set_class_attr("x", Value::Int(1));
        class.set_class_attr("y", Value::Int(2));
        class.define(
            "x",
            Arc::new(NativeMethod::new("x", 0, 0, |_, _| Ok(Value::Int(10)))),
        );

        let obj = Object::with_attrs(&class, [("y", Value::Int(20))]);
        // Instance dict wins over class attrs.
        assert_eq!(obj.get_attr("y").unwrap(), Value::Int(20));
        // Descriptors win over class attrs.
        assert!(matches!(obj.get_attr("x").unwrap(), Value::Callable(_)));
        assert_eq!(obj.call_method("x", &[]).unwrap(), Value::Int(10));
    }

    #[test]
    fn test_missing_attribute() {
        let obj = Object::new(&point_class());
        let err = obj.get_attr("z").unwrap_err();
        assert_eq!(err.to_string(), "AttributeError: 'Point' object has no attribute 'z'");
        assert!(obj.del_attr("z").is_err());
    }

    #[test]
    fn test_resolve_path() {
        let class = point_class();
        let inner = Object::with_attrs(&class, [("v", Value::Float(2.5))]);
        let outer = Object::with_attrs(&class, [("inner", Value::Object(inner))]);
        assert_eq!(outer.resolve_path(&["inner", "v"]).unwrap(), Value::Float(2.5));
        assert!(outer.resolve_path(&["inner", "w"]).is_err());
        assert!(outer.resolve_path(&["inner", "v", "w"]).is_err());
    }

    #[test]
    fn test_set_and_delete() {
        let obj = Object::new(&point_class());
        obj.set_attr("x", Value::Int(1));
        assert!(obj.has_own_attr("x"));
        obj.del_attr("x").unwrap();
        assert!(!obj.has_own_attr("x"));
    }
}
