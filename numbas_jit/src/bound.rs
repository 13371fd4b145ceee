//! Bound call targets.
//!
//! `instance.method` evaluates to a [`BoundMethod`]: the instance's
//! [`Dispatcher`] plus weak references to the instance and the owning
//! [`Proxy`]. Both references are weak because the proxy's cache stores
//! the bound method itself.

use crate::dispatcher::Dispatcher;
use crate::proxy::Proxy;
use numbas_core::{NumbasError, NumbasResult, RuntimeErrorKind};
use numbas_runtime::{Callable, Object, ObjectId, Value};
use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

/// A specializable method bound to one instance.
pub struct BoundMethod {
    dispatcher: Arc<Dispatcher>,
    instance: Weak<Object>,
    instance_id: ObjectId,
    proxy: Weak<Proxy>,
}

impl BoundMethod {
    pub(crate) fn new(dispatcher: Dispatcher, instance: &Arc<Object>, proxy: Weak<Proxy>) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            instance: Arc::downgrade(instance),
            instance_id: instance.id(),
            proxy,
        }
    }

    /// Downcast a value produced by attribute lookup.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Arc<BoundMethod>> {
        match value {
            Value::Callable(f) => Arc::clone(f).into_any().downcast::<BoundMethod>().ok(),
            _ => None,
        }
    }

    /// Like [`BoundMethod::from_value`], failing with a `TypeError`.
    pub fn expect(value: &Value) -> NumbasResult<Arc<BoundMethod>> {
        Self::from_value(value).ok_or_else(|| {
            NumbasError::type_error(format!(
                "expected a specializable bound method, got {} object",
                value.type_name()
            ))
        })
    }

    /// The per-instance dispatcher.
    #[inline]
    #[must_use]
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Id of the bound instance, valid even after the instance is gone.
    #[inline]
    #[must_use]
    pub fn instance_id(&self) -> ObjectId {
        self.instance_id
    }

    /// The bound instance.
    pub fn instance(&self) -> NumbasResult<Arc<Object>> {
        self.instance.upgrade().ok_or_else(|| {
            NumbasError::runtime(
                RuntimeErrorKind::ReferenceError,
                format!(
                    "instance {} bound to '{}' no longer exists",
                    self.instance_id,
                    self.dispatcher.method().name()
                ),
            )
        })
    }

    /// The owning proxy.
    pub fn proxy(&self) -> NumbasResult<Arc<Proxy>> {
        self.proxy.upgrade().ok_or_else(|| {
            NumbasError::runtime(
                RuntimeErrorKind::ReferenceError,
                format!("proxy of '{}' no longer exists", self.dispatcher.method().name()),
            )
        })
    }
}

impl fmt::Debug for BoundMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundMethod")
            .field("method", &self.dispatcher.method().name())
            .field("instance", &self.instance_id)
            .field("compiled", &self.dispatcher.is_compiled())
            .finish()
    }
}

impl Callable for BoundMethod {
    fn name(&self) -> &str {
        self.dispatcher.method().name()
    }

    fn call(&self, args: &[Value]) -> NumbasResult<Value> {
        let instance = self.instance()?;
        self.dispatcher.call(&instance, args)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
