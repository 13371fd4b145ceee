//! Source rewriter: turns a method plus an instance into a closed function.
//!
//! # Pipeline
//!
//! ```text
//! def f(self, n):                 def __fn_f(n):
//!     return self.a.b * n    ==>      return __a_b * n
//!                                 overlay scope: __a_b = <snapshot of self.a.b>
//! ```
//!
//! 1. Designator pass: the first parameter names the instance. It is
//!    removed, the function is renamed `__fn_<name>` and its decorators
//!    are stripped.
//! 2. Attribute pass: every attribute chain rooted at the designator is
//!    resolved on the instance and replaced by a flat identifier. A chain
//!    that resolves to another specializable method is specialized first
//!    and the compiled result is bound instead.
//! 3. Bind and compile: identifiers are bound in a child of the method's
//!    scope and the function is handed to the backend.

use crate::backend::{Backend, Function};
use crate::bound::BoundMethod;
use crate::method::{Method, MethodId};
use crate::options::JitOptions;
use numbas_core::{NumbasError, NumbasResult};
use numbas_parser::{Expr, ExprKind, FunctionDef, Stmt, StmtKind, unparse_expr};
use numbas_runtime::{Callable, Object, ObjectId, Scope, Value};
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;
use tracing::{debug, trace};

/// Prefix of the renamed function.
pub const FN_PREFIX: &str = "__fn_";

// =============================================================================
// Specialization
// =============================================================================

/// A compiled specialization and the source it was compiled from.
#[derive(Debug, Clone)]
pub struct Specialization {
    compiled: Arc<dyn Callable>,
    source: Arc<str>,
}

impl Specialization {
    /// The compiled callable.
    #[inline]
    #[must_use]
    pub fn compiled(&self) -> &Arc<dyn Callable> {
        &self.compiled
    }

    /// The rewritten source.
    #[inline]
    #[must_use]
    pub fn source(&self) -> &Arc<str> {
        &self.source
    }
}

// =============================================================================
// Recursion Guard
// =============================================================================

/// Specializations currently being built, outermost first.
#[derive(Debug)]
pub(crate) struct InProgress {
    frames: Vec<(MethodId, ObjectId)>,
    max_depth: usize,
}

impl InProgress {
    pub(crate) fn new(max_depth: usize) -> Self {
        Self {
            frames: Vec::new(),
            max_depth,
        }
    }

    fn enter(&mut self, method: &Method, instance: ObjectId) -> NumbasResult<()> {
        let key = (method.id(), instance);
        if self.frames.contains(&key) {
            return Err(NumbasError::recursion(format!(
                "cyclic specialization of '{}' on instance {}",
                method.name(),
                instance
            )));
        }
        if self.frames.len() >= self.max_depth {
            return Err(NumbasError::recursion(format!(
                "maximum specialization depth ({}) exceeded while specializing '{}'",
                self.max_depth,
                method.name()
            )));
        }
        self.frames.push(key);
        Ok(())
    }

    fn exit(&mut self) {
        self.frames.pop();
    }
}

// =============================================================================
// Entry Point
// =============================================================================

/// Specialize `method` for `instance` and compile it with `backend`.
pub(crate) fn specialize(
    instance: &Arc<Object>,
    method: &Method,
    options: &JitOptions,
    backend: &dyn Backend,
    in_progress: &mut InProgress,
) -> NumbasResult<Specialization> {
    in_progress.enter(method, instance.id())?;
    let result = specialize_inner(instance, method, options, backend, in_progress);
    in_progress.exit();
    result
}

fn specialize_inner(
    instance: &Arc<Object>,
    method: &Method,
    options: &JitOptions,
    backend: &dyn Backend,
    in_progress: &mut InProgress,
) -> NumbasResult<Specialization> {
    let mut def = method.def().clone();
    let used = collect_names(&def);
    let designator = strip_designator(&mut def)?;

    let mut rewriter = Rewriter {
        instance,
        designator,
        idents: FxHashMap::default(),
        used,
        namespace: Vec::new(),
        in_progress,
    };
    for default in &mut def.args.defaults {
        rewriter.expr(default)?;
    }
    rewriter.block(&mut def.body)?;

    let bound: Vec<String> = rewriter.namespace.iter().map(|(k, _)| k.clone()).collect();
    let scope = Scope::child(method.scope(), format!("<{} {}>", def.name, instance.id()));
    scope.extend(rewriter.namespace);

    let function = Function::new(def, scope);
    trace!(source = %function.source, "rewritten method");

    let compiled = backend.compile(&function, options)?;
    debug!(
        method = method.name(),
        instance = %instance.id(),
        backend = backend.name(),
        ?bound,
        "compiled specialization"
    );
    Ok(Specialization {
        compiled,
        source: function.source,
    })
}

/// Designator pass. Returns the designator name.
fn strip_designator(def: &mut FunctionDef) -> NumbasResult<String> {
    if def.args.args.is_empty() {
        return Err(NumbasError::type_error(format!(
            "{}() takes no parameters; the first parameter must name the instance",
            def.name
        )));
    }
    let had_default = def.args.defaults.len() == def.args.args.len();
    let designator = def.args.args.remove(0).arg;
    if had_default {
        def.args.defaults.remove(0);
    }
    def.name = format!("{}{}", FN_PREFIX, def.name);
    def.decorator_list.clear();
    Ok(designator)
}

// =============================================================================
// Attribute Pass
// =============================================================================

struct Rewriter<'a> {
    instance: &'a Arc<Object>,
    designator: String,
    /// Attribute path (designator excluded) to identifier.
    idents: FxHashMap<Vec<String>, String>,
    /// Every name the function mentions, plus identifiers handed out.
    used: FxHashSet<String>,
    /// Identifier to bound value, in binding order.
    namespace: Vec<(String, Value)>,
    in_progress: &'a mut InProgress,
}

impl Rewriter<'_> {
    fn block(&mut self, body: &mut [Stmt]) -> NumbasResult<()> {
        body.iter_mut().try_for_each(|stmt| self.stmt(stmt))
    }

    fn stmt(&mut self, stmt: &mut Stmt) -> NumbasResult<()> {
        match &mut stmt.kind {
            StmtKind::Expr(value) => self.expr(value),
            StmtKind::Assign { targets, value } => {
                for target in targets.iter_mut() {
                    self.target(target)?;
                }
                self.expr(value)
            }
            StmtKind::AugAssign { target, value, .. } => {
                self.target(target)?;
                self.expr(value)
            }
            StmtKind::Return(value) => match value {
                Some(value) => self.expr(value),
                None => Ok(()),
            },
            StmtKind::If { test, body, orelse } | StmtKind::While { test, body, orelse } => {
                self.expr(test)?;
                self.block(body)?;
                self.block(orelse)
            }
            StmtKind::For {
                target,
                iter,
                body,
                orelse,
            } => {
                self.target(target)?;
                self.expr(iter)?;
                self.block(body)?;
                self.block(orelse)
            }
            StmtKind::Pass | StmtKind::Break | StmtKind::Continue | StmtKind::FunctionDef(_) => {
                Ok(())
            }
        }
    }

    /// Assignment targets may not write through the instance.
    fn target(&mut self, target: &mut Expr) -> NumbasResult<()> {
        if self.writes_instance(target) {
            return Err(NumbasError::type_error(format!(
                "cannot assign to '{}' in a specialized method",
                unparse_expr(target)
            )));
        }
        match &mut target.kind {
            ExprKind::Tuple(elts) => elts.iter_mut().try_for_each(|e| self.target(e)),
            ExprKind::Attribute { value, .. } => self.expr(value),
            ExprKind::Subscript { value, index } => {
                self.expr(value)?;
                self.expr(index)
            }
            _ => Ok(()),
        }
    }

    fn writes_instance(&self, target: &Expr) -> bool {
        match &target.kind {
            ExprKind::Name(id) => *id == self.designator,
            ExprKind::Attribute { value, .. } | ExprKind::Subscript { value, .. } => {
                self.writes_instance(value)
            }
            _ => false,
        }
    }

    fn expr(&mut self, expr: &mut Expr) -> NumbasResult<()> {
        if let Some(path) = self.instance_path(expr) {
            let ident = self.bind(path)?;
            expr.kind = ExprKind::Name(ident);
            return Ok(());
        }
        match &mut expr.kind {
            ExprKind::Name(id) if *id == self.designator => Err(NumbasError::type_error(format!(
                "'{}' can only appear as the root of an attribute chain in a specialized method",
                id
            ))),
            ExprKind::Int(_)
            | ExprKind::Float(_)
            | ExprKind::Bool(_)
            | ExprKind::None
            | ExprKind::Name(_) => Ok(()),
            ExprKind::Tuple(elts) => elts.iter_mut().try_for_each(|e| self.expr(e)),
            ExprKind::BinOp { left, right, .. } => {
                self.expr(left)?;
                self.expr(right)
            }
            ExprKind::UnaryOp { operand, .. } => self.expr(operand),
            ExprKind::BoolOp { values, .. } => values.iter_mut().try_for_each(|e| self.expr(e)),
            ExprKind::Compare {
                left, comparators, ..
            } => {
                self.expr(left)?;
                comparators.iter_mut().try_for_each(|e| self.expr(e))
            }
            ExprKind::IfExp { test, body, orelse } => {
                self.expr(test)?;
                self.expr(body)?;
                self.expr(orelse)
            }
            ExprKind::Attribute { value, .. } => self.expr(value),
            ExprKind::Subscript { value, index } => {
                self.expr(value)?;
                self.expr(index)
            }
            ExprKind::Call { func, args } => {
                self.expr(func)?;
                args.iter_mut().try_for_each(|e| self.expr(e))
            }
        }
    }

    /// Path below the designator if `expr` is a chain rooted at it.
    fn instance_path(&self, expr: &Expr) -> Option<Vec<String>> {
        if !matches!(expr.kind, ExprKind::Attribute { .. }) {
            return None;
        }
        let chain = expr.attribute_chain()?;
        let (root, path) = chain.split_first()?;
        (*root == self.designator).then(|| path.iter().map(|s| s.to_string()).collect())
    }

    /// Identifier for `path`, resolving and binding it on first sight.
    fn bind(&mut self, path: Vec<String>) -> NumbasResult<String> {
        if let Some(ident) = self.idents.get(&path) {
            return Ok(ident.clone());
        }

        let value = self.instance.resolve_path(path.as_slice())?;
        let value = match BoundMethod::from_value(&value) {
            Some(bound) => Value::Callable(self.specialize_nested(&bound)?),
            None => value,
        };

        let ident = self.fresh_ident(&path);
        self.namespace.push((ident.clone(), value));
        self.idents.insert(path, ident.clone());
        Ok(ident)
    }

    fn specialize_nested(&mut self, bound: &BoundMethod) -> NumbasResult<Arc<dyn Callable>> {
        let instance = bound.instance()?;
        let dispatcher = bound.dispatcher();
        let options = dispatcher.options();
        let nested = specialize(
            &instance,
            dispatcher.method(),
            &options,
            dispatcher.backend().as_ref(),
            self.in_progress,
        )?;
        Ok(Arc::clone(nested.compiled()))
    }

    fn fresh_ident(&mut self, path: &[String]) -> String {
        let base = format!("__{}", path.join("_"));
        let mut ident = base.clone();
        let mut n = 1usize;
        while self.used.contains(&ident) {
            ident = format!("{}_{}", base, n);
            n += 1;
        }
        self.used.insert(ident.clone());
        ident
    }
}

// =============================================================================
// Name Collection
// =============================================================================

/// Every identifier a definition mentions: parameters and names.
fn collect_names(def: &FunctionDef) -> FxHashSet<String> {
    fn expr(e: &Expr, out: &mut FxHashSet<String>) {
        match &e.kind {
            ExprKind::Name(id) => {
                out.insert(id.clone());
            }
            ExprKind::Int(_) | ExprKind::Float(_) | ExprKind::Bool(_) | ExprKind::None => {}
            ExprKind::Tuple(elts) | ExprKind::BoolOp { values: elts, .. } => {
                elts.iter().for_each(|e| expr(e, out));
            }
            ExprKind::BinOp { left, right, .. } => {
                expr(left, out);
                expr(right, out);
            }
            ExprKind::UnaryOp { operand, .. } => expr(operand, out),
            ExprKind::Compare {
                left, comparators, ..
            } => {
                expr(left, out);
                comparators.iter().for_each(|e| expr(e, out));
            }
            ExprKind::IfExp { test, body, orelse } => {
                expr(test, out);
                expr(body, out);
                expr(orelse, out);
            }
            ExprKind::Attribute { value, .. } => expr(value, out),
            ExprKind::Subscript { value, index } => {
                expr(value, out);
                expr(index, out);
            }
            ExprKind::Call { func, args } => {
                expr(func, out);
                args.iter().for_each(|e| expr(e, out));
            }
        }
    }

    fn block(body: &[Stmt], out: &mut FxHashSet<String>) {
        for stmt in body {
            match &stmt.kind {
                StmtKind::Expr(e) => expr(e, out),
                StmtKind::Assign { targets, value } => {
                    targets.iter().for_each(|t| expr(t, out));
                    expr(value, out);
                }
                StmtKind::AugAssign { target, value, .. } => {
                    expr(target, out);
                    expr(value, out);
                }
                StmtKind::Return(value) => {
                    if let Some(value) = value {
                        expr(value, out);
                    }
                }
                StmtKind::If { test, body, orelse } | StmtKind::While { test, body, orelse } => {
                    expr(test, out);
                    block(body, out);
                    block(orelse, out);
                }
                StmtKind::For {
                    target,
                    iter,
                    body,
                    orelse,
                } => {
                    expr(target, out);
                    expr(iter, out);
                    block(body, out);
                    block(orelse, out);
                }
                StmtKind::FunctionDef(def) => {
                    out.insert(def.name.clone());
                    out.extend(def.args.names().map(str::to_string));
                    block(&def.body, out);
                }
                StmtKind::Pass | StmtKind::Break | StmtKind::Continue => {}
            }
        }
    }

    let mut names: FxHashSet<String> = def.args.names().map(str::to_string).collect();
    def.args.defaults.iter().for_each(|e| expr(e, &mut names));
    block(&def.body, &mut names);
    names
}
