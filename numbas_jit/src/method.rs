//! Specializable methods.
//!
//! A [`Method`] is the parsed definition plus the scope it was defined in.
//! It is shared by the proxy and every dispatcher created from it, and is
//! never mutated: each specialization clones the definition and rewrites
//! the clone.

use crate::backend::{Backend, ClosureBackend, Function};
use crate::options::JitOptions;
use numbas_core::NumbasResult;
use numbas_parser::FunctionDef;
use numbas_runtime::{Callable, Object, Scope, Value};
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_METHOD_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a [`Method`], used to detect cyclic specialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodId(u64);

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m{}", self.0)
    }
}

/// A parsed method and its defining scope.
pub struct Method {
    id: MethodId,
    def: FunctionDef,
    scope: Arc<Scope>,
    /// Object-mode compilation of the unmodified method, built on first use.
    generic: Mutex<Option<Arc<dyn Callable>>>,
}

impl Method {
    /// Wrap a parsed definition.
    #[must_use]
    pub fn new(def: FunctionDef, scope: Arc<Scope>) -> Self {
        Self {
            id: MethodId(NEXT_METHOD_ID.fetch_add(1, Ordering::Relaxed)),
            def,
            scope,
            generic: Mutex::new(None),
        }
    }

    /// Method identity.
    #[inline]
    #[must_use]
    pub fn id(&self) -> MethodId {
        self.id
    }

    /// Method name as written.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.def.name
    }

    /// Parsed definition.
    #[inline]
    #[must_use]
    pub fn def(&self) -> &FunctionDef {
        &self.def
    }

    /// Scope free names resolve in.
    #[inline]
    #[must_use]
    pub fn scope(&self) -> &Arc<Scope> {
        &self.scope
    }

    /// Run the unmodified method on `instance` with live attribute lookup.
    pub fn call_generic(&self, instance: &Arc<Object>, args: &[Value]) -> NumbasResult<Value> {
        let generic = self.generic()?;
        let mut full: SmallVec<[Value; 4]> = SmallVec::with_capacity(args.len() + 1);
        full.push(Value::Object(Arc::clone(instance)));
        full.extend(args.iter().cloned());
        generic.call(&full)
    }

    fn generic(&self) -> NumbasResult<Arc<dyn Callable>> {
        let mut slot = self.generic.lock();
        if let Some(generic) = slot.as_ref() {
            return Ok(Arc::clone(generic));
        }
        let mut def = self.def.clone();
        def.decorator_list.clear();
        let function = Function::new(def, Arc::clone(&self.scope));
        let options = JitOptions::new().with("nopython", false);
        let compiled = ClosureBackend.compile(&function, &options)?;
        *slot = Some(Arc::clone(&compiled));
        Ok(compiled)
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("id", &self.id)
            .field("name", &self.def.name)
            .field("scope", &self.scope.name())
            .finish_non_exhaustive()
    }
}
