//! Entry point: marking methods specializable.

use crate::backend::{Backend, ClosureBackend};
use crate::config::JitConfig;
use crate::method::Method;
use crate::options::JitOptions;
use crate::proxy::Proxy;
use numbas_core::NumbasResult;
use numbas_parser::{FunctionDef, dedent, parse_function};
use numbas_runtime::Class;
use std::sync::Arc;
use tracing::debug;

/// A backend plus configuration. Installs proxies on classes.
#[derive(Debug, Clone)]
pub struct Jit {
    backend: Arc<dyn Backend>,
    config: JitConfig,
}

impl Default for Jit {
    fn default() -> Self {
        Self::new(Arc::new(ClosureBackend))
    }
}

impl Jit {
    /// Use `backend` with the process configuration.
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            config: JitConfig::global().clone(),
        }
    }

    /// Replace the configuration.
    #[must_use]
    pub fn with_config(mut self, config: JitConfig) -> Self {
        self.config = config;
        self
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &JitConfig {
        &self.config
    }

    /// Active backend.
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Parse `source` as a method of `class` and install a proxy for it.
    ///
    /// `source` may be indented as a whole; the first line's indentation
    /// is stripped from every line.
    pub fn specialize(
        &self,
        class: &Arc<Class>,
        source: &str,
        options: JitOptions,
    ) -> NumbasResult<Arc<Proxy>> {
        let def = parse_function(&dedent(source))?;
        Ok(self.specialize_def(class, def, options))
    }

    /// Install a proxy for an already parsed method.
    pub fn specialize_def(
        &self,
        class: &Arc<Class>,
        def: FunctionDef,
        options: JitOptions,
    ) -> Arc<Proxy> {
        let name = def.name.clone();
        let method = Method::new(def, Arc::clone(class.scope()));
        let proxy = Proxy::new(
            method,
            options,
            Arc::clone(&self.backend),
            self.config.clone(),
        );
        let _replaced = class.define(name.clone(), proxy.clone());
        debug!(
            class = class.name(),
            method = %name,
            options = %proxy.options(),
            backend = self.backend.name(),
            "installed proxy"
        );
        proxy
    }
}

/// [`Jit::specialize`] with the default backend and configuration.
pub fn specialize(class: &Arc<Class>, source: &str, options: JitOptions) -> NumbasResult<Arc<Proxy>> {
    Jit::default().specialize(class, source, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use numbas_runtime::{Scope, Value};

    #[test]
    fn test_indented_source() {
        let class = Class::new("Foo", Scope::new("m"));
        let src = "    def f(self, n):\n        return self.x + n\n";
        let proxy = specialize(&class, src, JitOptions::new()).unwrap();
        assert_eq!(proxy.name(), "f");

        let obj = class.instantiate([("x", Value::Int(1))]);
        assert_eq!(obj.call_method("f", &[Value::Int(2)]).unwrap(), Value::Int(3));
    }

    #[test]
    fn test_syntax_error_installs_nothing() {
        let class = Class::new("Foo", Scope::new("m"));
        assert!(specialize(&class, "def f(self:\n    pass\n", JitOptions::new()).is_err());
        assert!(class.descriptor("f").is_none());
    }

    #[test]
    fn test_respecialize_replaces_proxy() {
        let class = Class::new("Foo", Scope::new("m"));
        let jit = Jit::default().with_config(JitConfig::default());
        let first = jit.specialize(&class, "def f(self):\n    return 1\n", JitOptions::new()).unwrap();
        let second = jit.specialize(&class, "def f(self):\n    return 2\n", JitOptions::new()).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));

        let obj = class.instantiate::<&str>([]);
        assert_eq!(obj.call_method("f", &[]).unwrap(), Value::Int(2));
    }
}
