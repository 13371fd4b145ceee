//! Class-level proxies.
//!
//! A [`Proxy`] is installed on a class as a [`Descriptor`]. Looking the
//! method up on an instance returns that instance's [`BoundMethod`],
//! creating it on first access:
//!
//! ```text
//! Proxy
//! ├── method    parsed definition + defining scope (shared)
//! ├── options   copied into each new Dispatcher
//! └── cache     ObjectId -> (Weak<Object>, Arc<BoundMethod>)
//! ```
//!
//! The cache never owns an instance. Entries are removed when the instance
//! is dropped (through [`Descriptor::instance_dropped`]), and entries whose
//! instance is already gone are purged before the table grows.

use crate::backend::Backend;
use crate::bound::BoundMethod;
use crate::config::JitConfig;
use crate::dispatcher::Dispatcher;
use crate::method::Method;
use crate::options::JitOptions;
use numbas_core::{NumbasError, NumbasResult, RuntimeErrorKind};
use numbas_runtime::{Class, Descriptor, Object, ObjectId, Value};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

type CacheEntry = (Weak<Object>, Arc<BoundMethod>);

/// Per-method factory and cache of bound methods.
pub struct Proxy {
    method: Arc<Method>,
    options: RwLock<JitOptions>,
    backend: Arc<dyn Backend>,
    config: JitConfig,
    cache: Mutex<FxHashMap<ObjectId, CacheEntry>>,
    this: Weak<Proxy>,
}

impl Proxy {
    /// Create a proxy for `method`.
    pub fn new(
        method: Method,
        options: JitOptions,
        backend: Arc<dyn Backend>,
        config: JitConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            method: Arc::new(method),
            options: RwLock::new(options),
            backend,
            config,
            cache: Mutex::new(FxHashMap::default()),
            this: this.clone(),
        })
    }

    /// The proxied method.
    #[inline]
    #[must_use]
    pub fn method(&self) -> &Arc<Method> {
        &self.method
    }

    /// Method name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        self.method.name()
    }

    // =========================================================================
    // Binding
    // =========================================================================

    /// The bound method for `instance`, created on first access.
    ///
    /// Binding never compiles.
    pub fn get(&self, instance: &Arc<Object>) -> Arc<BoundMethod> {
        if self.config.disable_jit {
            return Arc::new(self.bind(instance));
        }

        let id = instance.id();
        let mut cache = self.cache.lock();
        if let Some((_, bound)) = cache.get(&id) {
            trace!(method = self.name(), instance = %id, "binding hit");
            return Arc::clone(bound);
        }

        let purged = if cache.len() == cache.capacity() {
            purge_dead(&mut cache)
        } else {
            Vec::new()
        };
        let bound = Arc::new(self.bind(instance));
        cache.insert(id, (Arc::downgrade(instance), Arc::clone(&bound)));
        drop(cache);
        drop(purged);

        trace!(method = self.name(), instance = %id, "bound");
        bound
    }

    fn bind(&self, instance: &Arc<Object>) -> BoundMethod {
        let dispatcher = Dispatcher::new(
            Arc::clone(&self.method),
            self.options(),
            Arc::clone(&self.backend),
            self.config.clone(),
        );
        BoundMethod::new(dispatcher, instance, self.this.clone())
    }

    /// Run the unspecialized method with live attribute lookup.
    pub fn call_generic(&self, instance: &Arc<Object>, args: &[Value]) -> NumbasResult<Value> {
        self.method.call_generic(instance, args)
    }

    // =========================================================================
    // Eviction
    // =========================================================================

    /// Remove `instance`'s binding. Returns `false` if there was none.
    pub fn evict(&self, instance: &Object) -> bool {
        self.evict_id(instance.id())
    }

    /// Remove the binding for `id`. Returns `false` if there was none.
    pub fn evict_id(&self, id: ObjectId) -> bool {
        let removed = self.cache.lock().remove(&id);
        let evicted = removed.is_some();
        drop(removed);
        if evicted {
            debug!(method = self.name(), instance = %id, "binding evicted");
        }
        evicted
    }

    /// Remove `bound` if it is still the cached binding for its instance.
    pub fn evict_binding(&self, bound: &BoundMethod) -> NumbasResult<()> {
        let id = bound.instance_id();
        let mut cache = self.cache.lock();
        let cached = cache
            .get(&id)
            .is_some_and(|(_, b)| std::ptr::eq(Arc::as_ptr(b), bound));
        let removed = if cached { cache.remove(&id) } else { None };
        drop(cache);

        if removed.is_none() {
            return Err(NumbasError::runtime(
                RuntimeErrorKind::KeyError,
                format!("binding of '{}' to instance {} is not cached", self.name(), id),
            ));
        }
        drop(removed);
        debug!(method = self.name(), instance = %id, "binding deleted");
        Ok(())
    }

    /// Number of cached bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    /// True if no binding is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }

    /// True if `instance` has a cached binding.
    #[must_use]
    pub fn contains(&self, instance: &Object) -> bool {
        self.cache.lock().contains_key(&instance.id())
    }

    // =========================================================================
    // Options
    // =========================================================================

    /// Options new bindings start from.
    #[must_use]
    pub fn options(&self) -> JitOptions {
        self.options.read().clone()
    }

    /// Merge `options` into the proxy options. Existing bindings keep the
    /// options they were created with.
    pub fn set_options(&self, options: &JitOptions) {
        self.options.write().merge(options);
    }

    /// Downcast a class descriptor.
    #[must_use]
    pub fn from_descriptor(descriptor: Arc<dyn Descriptor>) -> Option<Arc<Proxy>> {
        descriptor.into_any().downcast::<Proxy>().ok()
    }

    /// The proxy installed on `class` under `name`.
    pub fn of(class: &Class, name: &str) -> NumbasResult<Arc<Proxy>> {
        let descriptor = class
            .descriptor(name)
            .ok_or_else(|| NumbasError::attribute_error(class.name(), name))?;
        Self::from_descriptor(descriptor).ok_or_else(|| {
            NumbasError::type_error(format!(
                "'{}.{}' is not a specializable method",
                class.name(),
                name
            ))
        })
    }
}

/// Remove entries whose instance is gone. The caller drops the result
/// after releasing the lock.
fn purge_dead(cache: &mut FxHashMap<ObjectId, CacheEntry>) -> Vec<CacheEntry> {
    let dead: Vec<ObjectId> = cache
        .iter()
        .filter(|(_, (instance, _))| instance.strong_count() == 0)
        .map(|(id, _)| *id)
        .collect();
    dead.iter().filter_map(|id| cache.remove(id)).collect()
}

impl Descriptor for Proxy {
    fn get(&self, instance: &Arc<Object>) -> NumbasResult<Value> {
        Ok(Value::Callable(self.get(instance)))
    }

    fn instance_dropped(&self, id: ObjectId) {
        let removed = self.cache.lock().remove(&id);
        if removed.is_some() {
            debug!(method = self.name(), instance = %id, "instance dropped; binding evicted");
        }
        drop(removed);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("method", &self.method.name())
            .field("backend", &self.backend.name())
            .field("options", &*self.options.read())
            .field("bindings", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ClosureBackend;
    use numbas_parser::parse_function;
    use numbas_runtime::{Callable, Scope};

    fn install(class: &Arc<Class>, src: &str, config: JitConfig) -> Arc<Proxy> {
        let method = Method::new(parse_function(src).unwrap(), Arc::clone(class.scope()));
        let proxy = Proxy::new(method, JitOptions::new(), Arc::new(ClosureBackend), config);
        class.define(proxy.name().to_string(), proxy.clone());
        proxy
    }

    #[test]
    fn test_binding_is_cached_per_instance() {
        let class = Class::new("Foo", Scope::new("m"));
        let proxy = install(&class, "def f(self):\n    return self.x\n", JitConfig::default());
        let a = class.instantiate([("x", Value::Int(1))]);
        let b = class.instantiate([("x", Value::Int(2))]);

        let a1 = proxy.get(&a);
        let a2 = proxy.get(&a);
        let b1 = proxy.get(&b);
        assert!(Arc::ptr_eq(&a1, &a2));
        assert!(!Arc::ptr_eq(&a1, &b1));
        assert_eq!(proxy.len(), 2);
        assert!(!a1.dispatcher().is_compiled());
    }

    #[test]
    fn test_lookup_through_instance() {
        let class = Class::new("Foo", Scope::new("m"));
        install(&class, "def f(self, n):\n    return self.x * n\n", JitConfig::default());
        let obj = class.instantiate([("x", Value::Int(3))]);
        assert_eq!(obj.call_method("f", &[Value::Int(4)]).unwrap(), Value::Int(12));
    }

    #[test]
    fn test_drop_evicts() {
        let class = Class::new("Foo", Scope::new("m"));
        let proxy = install(&class, "def f(self):\n    return self.x\n", JitConfig::default());
        let obj = class.instantiate([("x", Value::Int(1))]);
        let bound = proxy.get(&obj);
        bound.call(&[]).unwrap();
        assert_eq!(proxy.len(), 1);

        drop(obj);
        assert!(proxy.is_empty());
        assert!(bound.call(&[]).unwrap_err().is_kind(RuntimeErrorKind::ReferenceError));
    }

    #[test]
    fn test_evict_binding_checks_identity() {
        let class = Class::new("Foo", Scope::new("m"));
        let proxy = install(&class, "def f(self):\n    return 0\n", JitConfig::default());
        let obj = class.instantiate::<&str>([]);

        let old = proxy.get(&obj);
        proxy.evict_binding(&old).unwrap();
        assert!(proxy.evict_binding(&old).unwrap_err().is_kind(RuntimeErrorKind::KeyError));

        let new = proxy.get(&obj);
        assert!(!Arc::ptr_eq(&old, &new));
        assert!(proxy.evict_binding(&old).is_err());
        assert!(proxy.contains(&obj));
    }

    #[test]
    fn test_options_copied_at_binding() {
        let class = Class::new("Foo", Scope::new("m"));
        let proxy = install(&class, "def f(self):\n    return 0\n", JitConfig::default());
        let a = class.instantiate::<&str>([]);
        let early = proxy.get(&a);

        proxy.set_options(&JitOptions::new().with("fold_constants", false));
        let b = class.instantiate::<&str>([]);
        let late = proxy.get(&b);

        assert!(early.dispatcher().options().is_empty());
        assert_eq!(late.dispatcher().options().get("fold_constants"), Some(&false.into()));
    }

    #[test]
    fn test_disabled_does_not_cache() {
        let class = Class::new("Foo", Scope::new("m"));
        let config = JitConfig {
            disable_jit: true,
            ..JitConfig::default()
        };
        let proxy = install(&class, "def f(self):\n    return self.x\n", config);
        let obj = class.instantiate([("x", Value::Int(7))]);
        assert_eq!(obj.call_method("f", &[]).unwrap(), Value::Int(7));
        assert!(proxy.is_empty());
    }

    #[test]
    fn test_of_rejects_non_proxies() {
        let class = Class::new("Foo", Scope::new("m"));
        class.define_native("g", 0, |_, _| Ok(Value::None));
        install(&class, "def f(self):\n    return 0\n", JitConfig::default());

        assert!(Proxy::of(&class, "f").is_ok());
        assert!(Proxy::of(&class, "g").unwrap_err().is_kind(RuntimeErrorKind::TypeError));
        assert!(Proxy::of(&class, "h").unwrap_err().is_kind(RuntimeErrorKind::AttributeError));
    }
}
