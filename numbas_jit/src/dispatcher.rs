//! Per-instance dispatch.
//!
//! A [`Dispatcher`] owns at most one [`Specialization`] for its
//! (method, instance) pair.
//!
//! ```text
//! call(instance, args)
//!   lock state
//!   ├── Some(spec) -> clone compiled            (cache hit)
//!   └── None       -> rewrite + compile, store  (first call / after reset)
//!   unlock
//!   compiled(args)
//! ```
//!
//! The lock is held across compilation so concurrent first calls compile
//! once. It is released before the compiled callable runs, which lets the
//! callable re-enter the same dispatcher.

use crate::backend::Backend;
use crate::config::JitConfig;
use crate::method::Method;
use crate::options::JitOptions;
use crate::rewrite::{self, InProgress, Specialization};
use numbas_core::{NumbasError, NumbasResult, RuntimeErrorKind};
use numbas_runtime::{Callable, Object, Value};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Compiled state for one (method, instance) pair.
pub struct Dispatcher {
    method: Arc<Method>,
    options: RwLock<JitOptions>,
    backend: Arc<dyn Backend>,
    config: JitConfig,
    state: Mutex<Option<Specialization>>,
}

impl Dispatcher {
    pub(crate) fn new(
        method: Arc<Method>,
        options: JitOptions,
        backend: Arc<dyn Backend>,
        config: JitConfig,
    ) -> Self {
        Self {
            method,
            options: RwLock::new(options),
            backend,
            config,
            state: Mutex::new(None),
        }
    }

    /// Call the specialization for `instance`, compiling it first if needed.
    pub fn call(&self, instance: &Arc<Object>, args: &[Value]) -> NumbasResult<Value> {
        if self.config.disable_jit {
            return self.method.call_generic(instance, args);
        }
        let compiled = self.compiled(instance)?;
        compiled.call(args)
    }

    /// The compiled callable, compiling it first if needed.
    pub fn compiled(&self, instance: &Arc<Object>) -> NumbasResult<Arc<dyn Callable>> {
        let mut state = self.state.lock();
        if let Some(spec) = state.as_ref() {
            trace!(method = self.method.name(), instance = %instance.id(), "specialization hit");
            return Ok(Arc::clone(spec.compiled()));
        }

        let options = self.options();
        let spec = rewrite::specialize(
            instance,
            &self.method,
            &options,
            self.backend.as_ref(),
            &mut InProgress::new(self.config.max_depth),
        )?;
        let compiled = Arc::clone(spec.compiled());
        *state = Some(spec);
        Ok(compiled)
    }

    /// Drop the specialization. Returns `false` if there was none.
    pub fn reset(&self) -> bool {
        let old = self.state.lock().take();
        let had_spec = old.is_some();
        drop(old);
        if had_spec {
            debug!(method = self.method.name(), "specialization reset");
        }
        had_spec
    }

    /// Like [`Dispatcher::reset`], failing with an `AttributeError` when
    /// there was nothing to reset.
    pub fn try_reset(&self) -> NumbasResult<()> {
        if self.reset() {
            Ok(())
        } else {
            Err(NumbasError::runtime(
                RuntimeErrorKind::AttributeError,
                format!("'{}' has no specialization to reset", self.method.name()),
            ))
        }
    }

    /// True if a specialization is cached.
    #[must_use]
    pub fn is_compiled(&self) -> bool {
        self.state.lock().is_some()
    }

    /// The cached specialization.
    #[must_use]
    pub fn specialization(&self) -> Option<Specialization> {
        self.state.lock().clone()
    }

    /// Source of the cached specialization.
    #[must_use]
    pub fn source(&self) -> Option<Arc<str>> {
        self.state.lock().as_ref().map(|spec| Arc::clone(spec.source()))
    }

    /// Options used for the next compilation.
    #[must_use]
    pub fn options(&self) -> JitOptions {
        self.options.read().clone()
    }

    /// Merge `options` into this dispatcher's options. A cached
    /// specialization is kept until reset.
    pub fn set_options(&self, options: &JitOptions) {
        self.options.write().merge(options);
    }

    /// The method being specialized.
    #[inline]
    #[must_use]
    pub fn method(&self) -> &Arc<Method> {
        &self.method
    }

    /// The backend specializations are compiled with.
    #[inline]
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("method", &self.method.name())
            .field("backend", &self.backend.name())
            .field("options", &*self.options.read())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ClosureBackend;
    use numbas_parser::parse_function;
    use numbas_runtime::{Class, Scope};

    fn dispatcher(src: &str, scope: &Arc<Scope>, config: JitConfig) -> Dispatcher {
        let method = Method::new(parse_function(src).unwrap(), Arc::clone(scope));
        Dispatcher::new(
            Arc::new(method),
            JitOptions::new(),
            Arc::new(ClosureBackend),
            config,
        )
    }

    #[test]
    fn test_compile_once_then_reuse() {
        let class = Class::new("Foo", Scope::new("m"));
        let obj = class.instantiate([("x", Value::Int(10))]);
        let d = dispatcher("def f(self, n):\n    return self.x + n\n", class.scope(), JitConfig::default());

        assert!(!d.is_compiled());
        assert_eq!(d.call(&obj, &[Value::Int(5)]).unwrap(), Value::Int(15));
        let first = d.source().unwrap();

        obj.set_attr("x", Value::Int(20));
        assert_eq!(d.call(&obj, &[Value::Int(5)]).unwrap(), Value::Int(15));
        assert!(Arc::ptr_eq(&first, &d.source().unwrap()));

        assert!(d.reset());
        assert!(d.source().is_none());
        assert_eq!(d.call(&obj, &[Value::Int(5)]).unwrap(), Value::Int(25));
        assert!(!Arc::ptr_eq(&first, &d.source().unwrap()));
    }

    #[test]
    fn test_failed_compile_leaves_state_empty() {
        let class = Class::new("Foo", Scope::new("m"));
        let obj = class.instantiate::<&str>([]);
        let d = dispatcher("def f(self):\n    return self.x\n", class.scope(), JitConfig::default());

        assert!(d.call(&obj, &[]).is_err());
        assert!(!d.is_compiled());
        assert!(d.try_reset().unwrap_err().is_kind(RuntimeErrorKind::AttributeError));

        obj.set_attr("x", Value::Int(1));
        assert_eq!(d.call(&obj, &[]).unwrap(), Value::Int(1));
    }

    #[test]
    fn test_disabled_runs_generic() {
        let class = Class::new("Foo", Scope::new("m"));
        let obj = class.instantiate([("x", Value::Int(1))]);
        let config = JitConfig {
            disable_jit: true,
            ..JitConfig::default()
        };
        let d = dispatcher("def f(self):\n    return self.x\n", class.scope(), config);

        assert_eq!(d.call(&obj, &[]).unwrap(), Value::Int(1));
        obj.set_attr("x", Value::Int(2));
        assert_eq!(d.call(&obj, &[]).unwrap(), Value::Int(2));
        assert!(!d.is_compiled());
    }

    #[test]
    fn test_options_are_per_dispatcher() {
        let class = Class::new("Foo", Scope::new("m"));
        let obj = class.instantiate([("x", Value::Int(1))]);
        let d = dispatcher("def f(self):\n    return self.x\n", class.scope(), JitConfig::default());

        d.set_options(&JitOptions::new().with("bogus", true));
        assert!(d.call(&obj, &[]).unwrap_err().is_compile_error());
        assert!(!d.is_compiled());
    }
}
