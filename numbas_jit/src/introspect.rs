//! Cache control and inspection by bound method.
//!
//! Every accessor takes the value `instance.method` evaluated to. Passing
//! anything else is a `TypeError`.

use crate::bound::BoundMethod;
use crate::options::JitOptions;
use crate::proxy::Proxy;
use numbas_core::{NumbasError, NumbasResult, RuntimeErrorKind};
use numbas_runtime::{Class, Value};
use std::sync::Arc;

/// The proxy that produced `binding`.
pub fn get_proxy(binding: &Value) -> NumbasResult<Arc<Proxy>> {
    BoundMethod::expect(binding)?.proxy()
}

/// The proxy installed on `class` under `name`.
pub fn proxy_of(class: &Class, name: &str) -> NumbasResult<Arc<Proxy>> {
    Proxy::of(class, name)
}

/// Evict `binding` from its proxy's cache.
///
/// Fails with a `KeyError` if it is no longer the cached binding.
pub fn delete(binding: &Value) -> NumbasResult<()> {
    let bound = BoundMethod::expect(binding)?;
    delete_binding(&bound)
}

pub(crate) fn delete_binding(bound: &BoundMethod) -> NumbasResult<()> {
    let proxy = bound.proxy().map_err(|_| {
        NumbasError::runtime(
            RuntimeErrorKind::KeyError,
            format!("binding of '{}' is not cached", bound.dispatcher().method().name()),
        )
    })?;
    proxy.evict_binding(bound)
}

/// Drop `binding`'s specialization; the next call recompiles.
///
/// Fails with an `AttributeError` if nothing is compiled.
pub fn reset(binding: &Value) -> NumbasResult<()> {
    BoundMethod::expect(binding)?.dispatcher().try_reset()
}

/// Options of the proxy behind `binding`.
pub fn get_proxy_options(binding: &Value) -> NumbasResult<JitOptions> {
    Ok(get_proxy(binding)?.options())
}

/// Merge `options` into the proxy behind `binding`.
pub fn set_proxy_options(binding: &Value, options: &JitOptions) -> NumbasResult<()> {
    get_proxy(binding)?.set_options(options);
    Ok(())
}

/// Options of `binding`'s dispatcher.
pub fn get_dispatcher_options(binding: &Value) -> NumbasResult<JitOptions> {
    Ok(BoundMethod::expect(binding)?.dispatcher().options())
}

/// Merge `options` into `binding`'s dispatcher.
pub fn set_dispatcher_options(binding: &Value, options: &JitOptions) -> NumbasResult<()> {
    BoundMethod::expect(binding)?.dispatcher().set_options(options);
    Ok(())
}

/// Source of `binding`'s current specialization.
///
/// Fails with an `AttributeError` if nothing is compiled.
pub fn get_source(binding: &Value) -> NumbasResult<Arc<str>> {
    let bound = BoundMethod::expect(binding)?;
    bound.dispatcher().source().ok_or_else(|| {
        NumbasError::runtime(
            RuntimeErrorKind::AttributeError,
            format!("'{}' has not been specialized", bound.dispatcher().method().name()),
        )
    })
}

/// Print [`get_source`] to stdout.
pub fn print_source(binding: &Value) -> NumbasResult<()> {
    println!("{}", get_source(binding)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_bindings_are_type_errors() {
        for value in [Value::Int(1), Value::None, Value::tuple([])] {
            assert!(get_proxy(&value).unwrap_err().is_kind(RuntimeErrorKind::TypeError));
            assert!(delete(&value).unwrap_err().is_kind(RuntimeErrorKind::TypeError));
            assert!(reset(&value).unwrap_err().is_kind(RuntimeErrorKind::TypeError));
            assert!(get_source(&value).unwrap_err().is_kind(RuntimeErrorKind::TypeError));
        }
        let builtin = numbas_runtime::builtins::lookup("abs").unwrap();
        assert!(get_dispatcher_options(&builtin).is_err());
    }

    #[test]
    fn test_delete_evicts_only_the_cached_binding() {
        let class = Class::new("Foo", numbas_runtime::Scope::new("m"));
        let proxy = crate::Jit::default()
            .with_config(crate::JitConfig::default())
            .specialize(&class, "def f(self):\n    return self.x\n", JitOptions::new())
            .unwrap();
        let obj = class.instantiate([("x", Value::Int(1))]);

        let binding = obj.get_attr("f").unwrap();
        assert!(proxy.contains(&obj));
        delete(&binding).unwrap();
        assert!(!proxy.contains(&obj));
        assert!(delete(&binding).unwrap_err().is_kind(RuntimeErrorKind::KeyError));

        let fresh = obj.get_attr("f").unwrap();
        assert!(!fresh.is_same(&binding));
        delete(&fresh).unwrap();
    }
}
