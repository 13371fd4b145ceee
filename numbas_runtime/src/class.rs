//! Classes, descriptors and native methods.
//!
//! A [`Class`] owns three tables:
//!
//! ```text
//! Class
//! ├── name
//! ├── scope        module namespace methods are defined in
//! ├── attrs        class attributes (plain values)
//! └── descriptors  name -> Arc<dyn Descriptor>
//! ```
//!
//! Descriptors produce the value an instance sees for a name. They are also
//! the only class-level state told about instance destruction, through
//! [`Descriptor::instance_dropped`].

use crate::callable::{Callable, check_arity};
use crate::object::{Object, ObjectId};
use crate::scope::Scope;
use crate::value::Value;
use numbas_core::{NumbasError, NumbasResult};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::trace;

// =============================================================================
// Descriptor
// =============================================================================

/// Class-level attribute that binds to instances on lookup.
pub trait Descriptor: Send + Sync + fmt::Debug {
    /// Value seen by `instance.<name>`.
    fn get(&self, instance: &Arc<Object>) -> NumbasResult<Value>;

    /// Called once when an instance of the owning class is destroyed.
    ///
    /// Runs inside the instance's `Drop`; implementations must not block on
    /// locks that may be held while instances are dropped.
    fn instance_dropped(&self, _id: ObjectId) {}

    /// Upcast for downcasting by reference.
    fn as_any(&self) -> &dyn Any;

    /// Upcast for downcasting an `Arc`.
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

// =============================================================================
// Class
// =============================================================================

/// A class: name, defining scope, attributes and descriptors.
pub struct Class {
    name: String,
    scope: Arc<Scope>,
    attrs: RwLock<FxHashMap<String, Value>>,
    descriptors: RwLock<FxHashMap<String, Arc<dyn Descriptor>>>,
}

impl Class {
    /// Create a class whose methods are defined in `scope`.
    pub fn new(name: impl Into<String>, scope: Arc<Scope>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            scope,
            attrs: RwLock::new(FxHashMap::default()),
            descriptors: RwLock::new(FxHashMap::default()),
        })
    }

    /// Class name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Module scope the class (and its methods) live in.
    #[inline]
    #[must_use]
    pub fn scope(&self) -> &Arc<Scope> {
        &self.scope
    }

    /// Install a descriptor, returning the one it replaces.
    pub fn define(
        &self,
        name: impl Into<String>,
        descriptor: Arc<dyn Descriptor>,
    ) -> Option<Arc<dyn Descriptor>> {
        self.descriptors.write().insert(name.into(), descriptor)
    }

    /// Install a native method.
    pub fn define_native(
        &self,
        name: impl Into<String>,
        arity: usize,
        func: impl Fn(&Arc<Object>, &[Value]) -> NumbasResult<Value> + Send + Sync + 'static,
    ) {
        let name = name.into();
        let method = NativeMethod::new(name.clone(), arity, arity, func);
        let _old = self.define(name, Arc::new(method));
    }

    /// Descriptor installed under `name`.
    #[must_use]
    pub fn descriptor(&self, name: &str) -> Option<Arc<dyn Descriptor>> {
        self.descriptors.read().get(name).cloned()
    }

    /// Names of all installed descriptors.
    #[must_use]
    pub fn descriptor_names(&self) -> Vec<String> {
        self.descriptors.read().keys().cloned().collect()
    }

    /// Set a class attribute.
    pub fn set_class_attr(&self, name: impl Into<String>, value: Value) {
        let _old = self.attrs.write().insert(name.into(), value);
    }

    /// Class attribute.
    #[must_use]
    pub fn class_attr(&self, name: &str) -> Option<Value> {
        self.attrs.read().get(name).cloned()
    }

    /// Create an instance with initial attributes.
    pub fn instantiate<K: Into<String>>(
        self: &Arc<Self>,
        attrs: impl IntoIterator<Item = (K, Value)>,
    ) -> Arc<Object> {
        Object::with_attrs(self, attrs)
    }

    /// On-destroy hook: notify every descriptor.
    pub(crate) fn instance_dropped(&self, id: ObjectId) {
        trace!(class = %self.name, instance = %id, "instance dropped");
        let descriptors: Vec<_> = self.descriptors.read().values().cloned().collect();
        for descriptor in descriptors {
            descriptor.instance_dropped(id);
        }
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.name)
            .field("scope", &self.scope.name())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Native Methods
// =============================================================================

type MethodFn = dyn Fn(&Arc<Object>, &[Value]) -> NumbasResult<Value> + Send + Sync;

/// A method implemented in Rust.
pub struct NativeMethod {
    name: String,
    min_args: usize,
    max_args: usize,
    func: Arc<MethodFn>,
}

impl NativeMethod {
    /// Wrap `func`; the argument counts exclude the instance.
    pub fn new(
        name: impl Into<String>,
        min_args: usize,
        max_args: usize,
        func: impl Fn(&Arc<Object>, &[Value]) -> NumbasResult<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            min_args,
            max_args,
            func: Arc::new(func),
        }
    }

    /// Method name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Accepted argument counts, excluding the instance.
    #[must_use]
    pub fn arity(&self) -> (usize, usize) {
        (self.min_args, self.max_args)
    }

    /// Call with an explicit instance.
    pub fn call_on(&self, instance: &Arc<Object>, args: &[Value]) -> NumbasResult<Value> {
        check_arity(&self.name, args, self.min_args, self.max_args)?;
        (self.func)(instance, args)
    }
}

impl fmt::Debug for NativeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeMethod")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl Descriptor for NativeMethod {
    fn get(&self, instance: &Arc<Object>) -> NumbasResult<Value> {
        Ok(Value::Callable(Arc::new(BoundNative {
            name: self.name.clone(),
            min_args: self.min_args,
            max_args: self.max_args,
            func: Arc::clone(&self.func),
            instance: Arc::downgrade(instance),
        })))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// A native method bound to an instance.
///
/// The instance is held weakly: a bound method captured by a cache keyed on
/// that same instance must not keep it alive.
pub struct BoundNative {
    name: String,
    min_args: usize,
    max_args: usize,
    func: Arc<MethodFn>,
    instance: Weak<Object>,
}

impl fmt::Debug for BoundNative {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundNative")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl Callable for BoundNative {
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, args: &[Value]) -> NumbasResult<Value> {
        let instance = self.instance.upgrade().ok_or_else(|| {
            NumbasError::runtime(
                numbas_core::RuntimeErrorKind::ReferenceError,
                format!("instance bound to '{}' no longer exists", self.name),
            )
        })?;
        check_arity(&self.name, args, self.min_args, self.max_args)?;
        (self.func)(&instance, args)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct DropCounter(AtomicUsize);

    impl Descriptor for DropCounter {
        fn get(&self, _instance: &Arc<Object>) -> NumbasResult<Value> {
            Ok(Value::Int(self.0.load(Ordering::SeqCst) as i64))
        }

        fn instance_dropped(&self, _id: ObjectId) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
            self
        }
    }

    #[test]
    fn test_on_destroy_hook() {
        let class = Class::new("C", Scope::new("test"));
        let counter = Arc::new(DropCounter::default());
        class.define("dropped", counter.clone());

        let a = class.instantiate::<&str>([]);
        let b = class.instantiate::<&str>([]);
        drop(a);
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
        assert_eq!(b.get_attr("dropped").unwrap(), Value::Int(1));
        drop(b);
        assert_eq!(counter.0.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_native_method_binds_weakly() {
        let class = Class::new("C", Scope::new("test"));
        class.define_native("get_x", 0, |obj, _| obj.get_attr("x"));

        let obj = class.instantiate([("x", Value::Int(7))]);
        let bound = obj.get_attr("get_x").unwrap();
        assert_eq!(bound.call(&[]).unwrap(), Value::Int(7));
        assert!(bound.call(&[Value::None]).is_err());

        drop(obj);
        let err = bound.call(&[]).unwrap_err();
        assert!(err.is_kind(numbas_core::RuntimeErrorKind::ReferenceError));
    }

    #[test]
    fn test_define_replaces() {
        let class = Class::new("C", Scope::new("test"));
        assert!(class.define("m", Arc::new(DropCounter::default())).is_none());
        assert!(class.define("m", Arc::new(DropCounter::default())).is_some());
        assert_eq!(class.descriptor_names(), vec!["m".to_string()]);
    }
}
