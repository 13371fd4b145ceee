//! Compile adapter.
//!
//! A [`Backend`] turns a closed [`Function`] plus [`JitOptions`] into a
//! callable. The specializer never looks inside the result; it only calls
//! it. [`ClosureBackend`] is the reference implementation.

mod closure;

pub use closure::{ClosureBackend, CompiledFunction};

use crate::options::JitOptions;
use numbas_core::NumbasResult;
use numbas_parser::FunctionDef;
use numbas_runtime::{Callable, Scope};
use std::fmt;
use std::sync::Arc;

/// A function ready for compilation.
#[derive(Debug, Clone)]
pub struct Function {
    /// Function definition. Its decorators are ignored.
    pub def: FunctionDef,
    /// Namespace free names resolve in.
    pub scope: Arc<Scope>,
    /// Emitted source text of `def`.
    pub source: Arc<str>,
}

impl Function {
    /// Bundle a definition with its namespace, emitting its source.
    #[must_use]
    pub fn new(def: FunctionDef, scope: Arc<Scope>) -> Self {
        let source: Arc<str> = numbas_parser::unparse_function(&def).into();
        Self { def, scope, source }
    }

    /// Function name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.def.name
    }
}

/// A compiler for closed functions.
pub trait Backend: Send + Sync + fmt::Debug {
    /// Backend name, for logs.
    fn name(&self) -> &str;

    /// Compile `function` under `options`.
    ///
    /// Unknown option names and option values of the wrong kind are
    /// compile errors.
    fn compile(&self, function: &Function, options: &JitOptions) -> NumbasResult<Arc<dyn Callable>>;
}
