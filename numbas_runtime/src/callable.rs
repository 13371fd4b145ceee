//! The callable protocol and native functions.

use crate::value::Value;
use numbas_core::{NumbasError, NumbasResult};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

bitflags::bitflags! {
    /// Properties a compiler may rely on when it sees a callable constant.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CallableFlags: u8 {
        /// No side effects; calls with constant arguments may be folded.
        const PURE = 1 << 0;
        /// Safe to call from `nopython` code: takes and returns plain
        /// values and never touches instance attributes.
        const NOPYTHON = 1 << 1;
        /// Produced by a compiler backend.
        const COMPILED = 1 << 2;
    }
}

/// Anything that can be invoked with positional arguments.
pub trait Callable: Send + Sync + fmt::Debug {
    /// Name used in error messages and reprs.
    fn name(&self) -> &str;

    /// Invoke with positional arguments.
    fn call(&self, args: &[Value]) -> NumbasResult<Value>;

    /// Compiler-visible properties.
    fn flags(&self) -> CallableFlags {
        CallableFlags::empty()
    }

    /// Upcast for downcasting by reference.
    fn as_any(&self) -> &dyn Any;

    /// Upcast for downcasting an `Arc`.
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// Check a positional argument count against `min..=max`.
pub fn check_arity(name: &str, args: &[Value], min: usize, max: usize) -> NumbasResult<()> {
    let n = args.len();
    if (min..=max).contains(&n) {
        return Ok(());
    }
    let expected = if min == max {
        format!("exactly {}", min)
    } else if max == usize::MAX {
        format!("at least {}", min)
    } else {
        format!("from {} to {}", min, max)
    };
    Err(NumbasError::type_error(format!(
        "{}() takes {} positional argument{} but {} {} given",
        name,
        expected,
        if min == max && min == 1 { "" } else { "s" },
        n,
        if n == 1 { "was" } else { "were" }
    )))
}

// =============================================================================
// Native Functions
// =============================================================================

type NativeFn = dyn Fn(&[Value]) -> NumbasResult<Value> + Send + Sync;

/// A function implemented in Rust.
pub struct NativeFunction {
    name: String,
    min_args: usize,
    max_args: usize,
    flags: CallableFlags,
    func: Box<NativeFn>,
}

impl NativeFunction {
    /// Wrap `func`, accepting between `min_args` and `max_args` arguments.
    pub fn new(
        name: impl Into<String>,
        min_args: usize,
        max_args: usize,
        func: impl Fn(&[Value]) -> NumbasResult<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            min_args,
            max_args,
            flags: CallableFlags::empty(),
            func: Box::new(func),
        }
    }

    /// Mark the function pure and callable from `nopython` code.
    #[must_use]
    pub fn pure(mut self) -> Self {
        self.flags |= CallableFlags::PURE | CallableFlags::NOPYTHON;
        self
    }

    /// Wrap into a value.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Callable(Arc::new(self))
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

impl Callable for NativeFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, args: &[Value]) -> NumbasResult<Value> {
        check_arity(&self.name, args, self.min_args, self.max_args)?;
        (self.func)(args)
    }

    fn flags(&self) -> CallableFlags {
        self.flags
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

    fn double() -> NativeFunction {
        NativeFunction::new("double", 1, 1, |args| {
            Ok(Value::Int(args[0].expect_int("x")? * 2))
        })
    }

    #[test]
    fn test_native_call() {
        assert_eq!(double().call(&[Value::Int(4)]).unwrap(), Value::Int(8));
    }

    #[test]
    fn test_arity_message() {
        let err = double().call(&[]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "TypeError: double() takes exactly 1 positional argument but 0 were given"
        );
        let err = check_arity("f", &[Value::None, Value::None, Value::None], 1, 2).unwrap_err();
        assert!(err.to_string().contains("from 1 to 2"));
    }

    #[test]
    fn test_flags() {
        assert!(double().flags().is_empty());
        let f = double().pure();
        assert!(f.flags().contains(CallableFlags::PURE | CallableFlags::NOPYTHON));
    }

    #[test]
    fn test_downcast() {
        let f: Arc<dyn Callable> = Arc::new(double());
        assert!(f.as_any().is::<NativeFunction>());
        assert!(f.into_any().downcast::<NativeFunction>().is_ok());
    }
}
