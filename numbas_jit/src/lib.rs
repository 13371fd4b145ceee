//! # Numbas JIT
//!
//! Lazy per-instance method specialization.
//!
//! A method marked specializable gets a [`Proxy`] on its class. Looking the
//! method up on an instance returns a [`BoundMethod`]; its first call
//! rewrites the method so that every `self.a.b` chain becomes a snapshot
//! constant, compiles the result with a [`Backend`] and caches it on the
//! instance's [`Dispatcher`]. Later calls go straight to the compiled code.
//!
//! ```text
//! obj.f(5)
//!   Proxy::get(obj)          -> BoundMethod (cached per instance)
//!   Dispatcher::call         -> cached? call : rewrite + compile + call
//! ```
//!
//! Snapshots do not follow the instance. Callers invalidate explicitly with
//! [`introspect::reset`], [`introspect::delete`] or the
//! [`reset_before`]/[`delete_before`] wrappers.
//!
//! ```
//! use numbas_jit::{JitOptions, introspect, specialize};
//! use numbas_runtime::{Class, Scope, Value};
//!
//! let class = Class::new("Foo", Scope::new("example"));
//! specialize(&class, "def f(self, n):\n    return self.x + n\n", JitOptions::new())?;
//!
//! let obj = class.instantiate([("x", Value::Int(10))]);
//! assert_eq!(obj.call_method("f", &[Value::Int(5)])?, Value::Int(15));
//!
//! obj.set_attr("x", Value::Int(20));
//! assert_eq!(obj.call_method("f", &[Value::Int(5)])?, Value::Int(15));
//!
//! introspect::reset(&obj.get_attr("f")?)?;
//! assert_eq!(obj.call_method("f", &[Value::Int(5)])?, Value::Int(25));
//! # Ok::<(), numbas_core::NumbasError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod bound;
pub mod config;
pub mod dispatcher;
pub mod introspect;
pub mod invalidate;
pub mod jit;
pub mod method;
pub mod options;
pub mod proxy;
pub mod rewrite;

pub use backend::{Backend, ClosureBackend, CompiledFunction, Function};
pub use bound::BoundMethod;
pub use config::JitConfig;
pub use dispatcher::Dispatcher;
pub use invalidate::{InvalidateBefore, Invalidation, MethodNames, delete_before, reset_before};
pub use jit::{Jit, specialize};
pub use method::{Method, MethodId};
pub use options::{JitOptions, OptionValue};
pub use proxy::Proxy;
pub use rewrite::Specialization;
