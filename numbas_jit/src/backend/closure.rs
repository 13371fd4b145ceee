//! Reference backend: lowers the AST to a tree of closures.
//!
//! # Lowering
//!
//! ```text
//! FunctionDef
//!   ├── locals     parameters + every assigned name -> frame slot
//!   ├── free names resolved once, at compile time:
//!   │              function scope chain, then builtins
//!   └── body       Stmt -> Box<dyn Fn(&mut Frame) -> Flow>
//!                  Expr -> Box<dyn Fn(&mut Frame) -> Value>
//! ```
//!
//! Free names are frozen when the function is compiled. Rebinding a global
//! afterwards does not affect an existing compiled function, which is what
//! makes snapshot constants behave as constants.
//!
//! # Options
//!
//! | name             | kind | default | effect |
//! |------------------|------|---------|--------|
//! | `nopython`       | bool | `true`  | reject object constants, object-mode callables and attribute access on runtime values |
//! | `fold_constants` | bool | `true`  | evaluate pure operations on constant operands at compile time |

use super::{Backend, Function};
use crate::options::JitOptions;
use numbas_core::{NumbasError, NumbasResult, RuntimeErrorKind, Span};
use numbas_parser::{BoolOp, CmpOp, Expr, ExprKind, FunctionDef, Stmt, StmtKind};
use numbas_runtime::callable::check_arity;
use numbas_runtime::{Callable, CallableFlags, Scope, Value, builtins, ops};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

const OPT_NOPYTHON: &str = "nopython";
const OPT_FOLD_CONSTANTS: &str = "fold_constants";

// =============================================================================
// Runtime Structures
// =============================================================================

/// Local variable storage for one call.
struct Frame {
    slots: Vec<Option<Value>>,
}

impl Frame {
    fn new(size: usize) -> Self {
        Self {
            slots: vec![None; size],
        }
    }

    #[inline]
    fn load(&self, slot: usize, name: &str) -> NumbasResult<Value> {
        self.slots[slot].clone().ok_or_else(|| {
            NumbasError::runtime(
                RuntimeErrorKind::NameError,
                format!("local variable '{}' referenced before assignment", name),
            )
        })
    }

    #[inline]
    fn store(&mut self, slot: usize, value: Value) {
        self.slots[slot] = Some(value);
    }
}

/// How a statement finished.
enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

type ExprFn = Box<dyn Fn(&mut Frame) -> NumbasResult<Value> + Send + Sync>;
type StmtFn = Box<dyn Fn(&mut Frame) -> NumbasResult<Flow> + Send + Sync>;
type StoreFn = Box<dyn Fn(&mut Frame, Value) -> NumbasResult<()> + Send + Sync>;

/// An expression after lowering: known at compile time, or not.
enum Lowered {
    Const(Value),
    Dyn(ExprFn),
}

// =============================================================================
// Backend
// =============================================================================

/// Closure-tree compiler.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClosureBackend;

#[derive(Debug, Clone, Copy)]
struct Settings {
    nopython: bool,
    fold_constants: bool,
}

impl Settings {
    fn from_options(options: &JitOptions) -> NumbasResult<Self> {
        if let Some(unknown) = options
            .names()
            .find(|n| *n != OPT_NOPYTHON && *n != OPT_FOLD_CONSTANTS)
        {
            return Err(NumbasError::compile(format!(
                "unrecognized option '{}'",
                unknown
            )));
        }
        Ok(Self {
            nopython: options.bool_or(OPT_NOPYTHON, true)?,
            fold_constants: options.bool_or(OPT_FOLD_CONSTANTS, true)?,
        })
    }
}

impl Backend for ClosureBackend {
    fn name(&self) -> &str {
        "closure"
    }

    fn compile(&self, function: &Function, options: &JitOptions) -> NumbasResult<Arc<dyn Callable>> {
        let settings = Settings::from_options(options)?;
        let compiled = CompiledFunction::lower(&function.def, &function.scope, settings)?;
        trace!(
            function = %compiled.name,
            slots = compiled.nslots,
            nopython = settings.nopython,
            "lowered function"
        );
        Ok(Arc::new(compiled))
    }
}

// =============================================================================
// Compiled Function
// =============================================================================

/// Output of [`ClosureBackend`].
pub struct CompiledFunction {
    name: String,
    nparams: usize,
    defaults: Vec<Value>,
    nslots: usize,
    body: StmtFn,
    flags: CallableFlags,
}

impl CompiledFunction {
    fn lower(def: &FunctionDef, scope: &Scope, settings: Settings) -> NumbasResult<Self> {
        let locals = collect_locals(def);
        let mut lowering = Lowering {
            scope,
            settings,
            locals,
            loop_depth: 0,
        };

        // Defaults are evaluated once, at definition time.
        let mut defaults = Vec::with_capacity(def.args.defaults.len());
        for default in &def.args.defaults {
            let f = lowering.expr_fn(default)?;
            let mut frame = Frame::new(lowering.locals.len());
            defaults.push(f(&mut frame)?);
        }

        let body = lowering.block(&def.body)?;
        let mut flags = CallableFlags::COMPILED;
        if settings.nopython {
            flags |= CallableFlags::NOPYTHON;
        }

        Ok(Self {
            name: def.name.clone(),
            nparams: def.args.args.len(),
            defaults,
            nslots: lowering.locals.len(),
            body,
            flags,
        })
    }

    /// Number of positional parameters.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.nparams
    }
}

impl fmt::Debug for CompiledFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledFunction")
            .field("name", &self.name)
            .field("nparams", &self.nparams)
            .field("nslots", &self.nslots)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

impl Callable for CompiledFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, args: &[Value]) -> NumbasResult<Value> {
        let required = self.nparams - self.defaults.len();
        check_arity(&self.name, args, required, self.nparams)?;

        let mut frame = Frame::new(self.nslots);
        for (slot, arg) in args.iter().enumerate() {
            frame.store(slot, arg.clone());
        }
        for slot in args.len()..self.nparams {
            frame.store(slot, self.defaults[slot - required].clone());
        }

        match (self.body)(&mut frame)? {
            Flow::Return(value) => Ok(value),
            Flow::Normal | Flow::Break | Flow::Continue => Ok(Value::None),
        }
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

// =============================================================================
// Local Analysis
// =============================================================================

/// Map every local name to a slot. Parameters come first, in order.
fn collect_locals(def: &FunctionDef) -> FxHashMap<String, usize> {
    fn target(expr: &Expr, out: &mut FxHashMap<String, usize>) {
        match &expr.kind {
            ExprKind::Name(id) => {
                let next = out.len();
                out.entry(id.clone()).or_insert(next);
            }
            ExprKind::Tuple(elts) => elts.iter().for_each(|e| target(e, out)),
            _ => {}
        }
    }

    fn block(body: &[Stmt], out: &mut FxHashMap<String, usize>) {
        for stmt in body {
            match &stmt.kind {
                StmtKind::Assign { targets, .. } => targets.iter().for_each(|t| target(t, out)),
                StmtKind::AugAssign { target: t, .. } => target(t, out),
                StmtKind::For {
                    target: t,
                    body,
                    orelse,
                    ..
                } => {
                    target(t, out);
                    block(body, out);
                    block(orelse, out);
                }
                StmtKind::If { body, orelse, .. } | StmtKind::While { body, orelse, .. } => {
                    block(body, out);
                    block(orelse, out);
                }
                _ => {}
            }
        }
    }

    let mut locals = FxHashMap::default();
    for name in def.args.names() {
        let next = locals.len();
        locals.entry(name.to_string()).or_insert(next);
    }
    block(&def.body, &mut locals);
    locals
}

// =============================================================================
// Lowering
// =============================================================================

struct Lowering<'a> {
    scope: &'a Scope,
    settings: Settings,
    locals: FxHashMap<String, usize>,
    loop_depth: usize,
}

impl Lowering<'_> {
    // === Statements ===

    fn block(&mut self, body: &[Stmt]) -> NumbasResult<StmtFn> {
        let stmts = body
            .iter()
            .map(|stmt| self.stmt(stmt))
            .collect::<NumbasResult<Vec<_>>>()?;
        Ok(Box::new(move |frame| {
            for stmt in &stmts {
                match stmt(frame)? {
                    Flow::Normal => {}
                    flow => return Ok(flow),
                }
            }
            Ok(Flow::Normal)
        }))
    }

    fn stmt(&mut self, stmt: &Stmt) -> NumbasResult<StmtFn> {
        match &stmt.kind {
            StmtKind::Expr(value) => {
                let value = self.expr_fn(value)?;
                Ok(Box::new(move |frame| {
                    value(frame)?;
                    Ok(Flow::Normal)
                }))
            }
            StmtKind::Assign { targets, value } => {
                let value = self.expr_fn(value)?;
                let stores = targets
                    .iter()
                    .map(|t| self.store(t))
                    .collect::<NumbasResult<Vec<_>>>()?;
                Ok(Box::new(move |frame| {
                    let v = value(frame)?;
                    for store in &stores {
                        store(frame, v.clone())?;
                    }
                    Ok(Flow::Normal)
                }))
            }
            StmtKind::AugAssign { target, op, value } => self.aug_assign(target, *op, value),
            StmtKind::Return(value) => {
                let value = value.as_deref().map(|v| self.expr_fn(v)).transpose()?;
                Ok(Box::new(move |frame| {
                    let v = match &value {
                        Some(f) => f(frame)?,
                        None => Value::None,
                    };
                    Ok(Flow::Return(v))
                }))
            }
            StmtKind::Pass => Ok(Box::new(|_| Ok(Flow::Normal))),
            StmtKind::Break | StmtKind::Continue => {
                if self.loop_depth == 0 {
                    let what = if matches!(stmt.kind, StmtKind::Break) {
                        "'break' outside loop"
                    } else {
                        "'continue' not properly in loop"
                    };
                    return Err(NumbasError::compile_at(what, stmt.span));
                }
                if matches!(stmt.kind, StmtKind::Break) {
                    Ok(Box::new(|_| Ok(Flow::Break)))
                } else {
                    Ok(Box::new(|_| Ok(Flow::Continue)))
                }
            }
            StmtKind::If { test, body, orelse } => {
                let test = self.expr(test)?;
                let body = self.block(body)?;
                let orelse = self.block(orelse)?;
                match test {
                    Lowered::Const(v) if self.settings.fold_constants => {
                        Ok(if v.is_truthy() { body } else { orelse })
                    }
                    test => {
                        let test = self.materialize(test, stmt.span)?;
                        Ok(Box::new(move |frame| {
                            if test(frame)?.is_truthy() {
                                body(frame)
                            } else {
                                orelse(frame)
                            }
                        }))
                    }
                }
            }
            StmtKind::While { test, body, orelse } => {
                let test = self.expr_fn(test)?;
                let body = self.loop_body(body)?;
                let orelse = self.block(orelse)?;
                Ok(Box::new(move |frame| {
                    while test(frame)?.is_truthy() {
                        match body(frame)? {
                            Flow::Break => return Ok(Flow::Normal),
                            Flow::Return(v) => return Ok(Flow::Return(v)),
                            Flow::Normal | Flow::Continue => {}
                        }
                    }
                    orelse(frame)
                }))
            }
            StmtKind::For {
                target,
                iter,
                body,
                orelse,
            } => self.for_loop(target, iter, body, orelse),
            StmtKind::FunctionDef(def) => Err(NumbasError::compile_at(
                format!("nested function '{}' is not supported", def.name),
                stmt.span,
            )),
        }
    }

    fn loop_body(&mut self, body: &[Stmt]) -> NumbasResult<StmtFn> {
        self.loop_depth += 1;
        let body = self.block(body);
        self.loop_depth -= 1;
        body
    }

    fn for_loop(&mut self, target: &Expr, iter: &Expr, body: &[Stmt], orelse: &[Stmt]) -> NumbasResult<StmtFn> {
        let store = self.store(target)?;

        if let Some(range_args) = self.range_call(iter) {
            if range_args.is_empty() || range_args.len() > 3 {
                return Err(NumbasError::compile_at(
                    format!("range expected 1 to 3 arguments, got {}", range_args.len()),
                    iter.span,
                ));
            }
            let args = range_args
                .iter()
                .map(|a| self.expr_fn(a))
                .collect::<NumbasResult<Vec<_>>>()?;
            let body = self.loop_body(body)?;
            let orelse = self.block(orelse)?;

            // Counted loop: no range tuple is materialized.
            return Ok(Box::new(move |frame| {
                let values = args
                    .iter()
                    .map(|a| a(frame))
                    .collect::<NumbasResult<SmallVec<[Value; 3]>>>()?;
                let (start, stop, step) = builtins::range_args(&values)?;
                let count = builtins::range_len(start, stop, step)?;
                let mut i = start;
                for _ in 0..count {
                    store(frame, Value::Int(i))?;
                    match body(frame)? {
                        Flow::Break => return Ok(Flow::Normal),
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                        Flow::Normal | Flow::Continue => {}
                    }
                    i = i.wrapping_add(step);
                }
                orelse(frame)
            }));
        }

        let iter = self.expr_fn(iter)?;
        let body = self.loop_body(body)?;
        let orelse = self.block(orelse)?;
        Ok(Box::new(move |frame| {
            let items = builtins::iterate(&iter(frame)?)?;
            for item in items.iter() {
                store(frame, item.clone())?;
                match body(frame)? {
                    Flow::Break => return Ok(Flow::Normal),
                    Flow::Return(v) => return Ok(Flow::Return(v)),
                    Flow::Normal | Flow::Continue => {}
                }
            }
            orelse(frame)
        }))
    }

    /// Arguments of `range(...)` if `iter` calls the builtin `range`.
    fn range_call<'e>(&self, iter: &'e Expr) -> Option<&'e [Expr]> {
        if let ExprKind::Call { func, args } = &iter.kind
            && let ExprKind::Name(id) = &func.kind
            && !self.locals.contains_key(id)
            && let Some(Value::Callable(f)) = self.global(id)
            && let Some(Value::Callable(range)) = builtins::lookup("range")
            && std::ptr::addr_eq(Arc::as_ptr(&f), Arc::as_ptr(&range))
        {
            return Some(args.as_slice());
        }
        None
    }

    fn aug_assign(&mut self, target: &Expr, op: numbas_parser::BinOp, value: &Expr) -> NumbasResult<StmtFn> {
        let rhs = self.expr_fn(value)?;
        match &target.kind {
            ExprKind::Name(id) => {
                let slot = self.slot(id, target.span)?;
                let name: Arc<str> = id.as_str().into();
                Ok(Box::new(move |frame| {
                    let current = frame.load(slot, &name)?;
                    let r = rhs(frame)?;
                    frame.store(slot, ops::binary(op, &current, &r)?);
                    Ok(Flow::Normal)
                }))
            }
            ExprKind::Attribute { value, attr } => {
                self.reject_in_nopython(
                    format!("cannot assign to attribute '{}' in nopython mode", attr),
                    target.span,
                )?;
                let base = self.expr_fn(value)?;
                let attr = attr.clone();
                Ok(Box::new(move |frame| {
                    let obj = base(frame)?;
                    let current = obj.get_attr(&attr)?;
                    let r = rhs(frame)?;
                    set_attr(&obj, &attr, ops::binary(op, &current, &r)?)?;
                    Ok(Flow::Normal)
                }))
            }
            _ => Err(NumbasError::compile_at(
                "item assignment is not supported",
                target.span,
            )),
        }
    }

    /// Build the store for an assignment target.
    fn store(&mut self, target: &Expr) -> NumbasResult<StoreFn> {
        match &target.kind {
            ExprKind::Name(id) => {
                let slot = self.slot(id, target.span)?;
                Ok(Box::new(move |frame, v| {
                    frame.store(slot, v);
                    Ok(())
                }))
            }
            ExprKind::Tuple(elts) => {
                let stores = elts
                    .iter()
                    .map(|e| self.store(e))
                    .collect::<NumbasResult<Vec<_>>>()?;
                Ok(Box::new(move |frame, v| {
                    let items = unpack(&v, stores.len())?;
                    for (store, item) in stores.iter().zip(items.iter()) {
                        store(frame, item.clone())?;
                    }
                    Ok(())
                }))
            }
            ExprKind::Attribute { value, attr } => {
                self.reject_in_nopython(
                    format!("cannot assign to attribute '{}' in nopython mode", attr),
                    target.span,
                )?;
                let base = self.expr_fn(value)?;
                let attr = attr.clone();
                Ok(Box::new(move |frame, v| set_attr(&base(frame)?, &attr, v)))
            }
            ExprKind::Subscript { .. } => Err(NumbasError::compile_at(
                "item assignment is not supported",
                target.span,
            )),
            _ => Err(NumbasError::compile_at("cannot assign to expression", target.span)),
        }
    }

    fn slot(&self, id: &str, span: Span) -> NumbasResult<usize> {
        self.locals
            .get(id)
            .copied()
            .ok_or_else(|| NumbasError::compile_at(format!("'{}' is not a local", id), span))
    }

    // === Expressions ===

    /// Lower and materialize.
    fn expr_fn(&self, expr: &Expr) -> NumbasResult<ExprFn> {
        let lowered = self.expr(expr)?;
        self.materialize(lowered, expr.span)
    }

    /// Lower, reporting whether the operand was a compile-time constant.
    fn operand(&self, expr: &Expr) -> NumbasResult<(ExprFn, bool)> {
        let lowered = self.expr(expr)?;
        let is_const = matches!(lowered, Lowered::Const(_));
        Ok((self.materialize(lowered, expr.span)?, is_const))
    }

    /// Turn a lowered expression into a closure. Constants are checked
    /// against `nopython` here, where they become runtime values.
    fn materialize(&self, lowered: Lowered, span: Span) -> NumbasResult<ExprFn> {
        match lowered {
            Lowered::Dyn(f) => Ok(f),
            Lowered::Const(v) => {
                if self.settings.nopython && !nopython_value(&v) {
                    return Err(NumbasError::compile_at(
                        format!(
                            "cannot use {} of type '{}' in nopython mode",
                            v,
                            v.type_name()
                        ),
                        span,
                    ));
                }
                Ok(Box::new(move |_| Ok(v.clone())))
            }
        }
    }

    /// Wrap a pure operation, folding it when all operands are constants.
    fn pure_op(&self, all_const: bool, f: ExprFn) -> Lowered {
        if all_const
            && self.settings.fold_constants
            && let Ok(v) = f(&mut Frame::new(0))
        {
            return Lowered::Const(v);
        }
        Lowered::Dyn(f)
    }

    fn global(&self, id: &str) -> Option<Value> {
        self.scope.get(id).or_else(|| builtins::lookup(id))
    }

    fn reject_in_nopython(&self, message: String, span: Span) -> NumbasResult<()> {
        if self.settings.nopython {
            Err(NumbasError::compile_at(message, span))
        } else {
            Ok(())
        }
    }

    fn expr(&self, expr: &Expr) -> NumbasResult<Lowered> {
        let lowered = match &expr.kind {
            ExprKind::Int(v) => Lowered::Const(Value::Int(*v)),
            ExprKind::Float(v) => Lowered::Const(Value::Float(*v)),
            ExprKind::Bool(v) => Lowered::Const(Value::Bool(*v)),
            ExprKind::None => Lowered::Const(Value::None),
            ExprKind::Name(id) => {
                if let Some(&slot) = self.locals.get(id) {
                    let name: Arc<str> = id.as_str().into();
                    Lowered::Dyn(Box::new(move |frame| frame.load(slot, &name)))
                } else {
                    let value = self.global(id).ok_or_else(|| {
                        NumbasError::compile_at(format!("name '{}' is not defined", id), expr.span)
                    })?;
                    Lowered::Const(value)
                }
            }
            ExprKind::Tuple(elts) => {
                let mut all_const = true;
                let mut items = Vec::with_capacity(elts.len());
                for elt in elts {
                    let (f, c) = self.operand(elt)?;
                    all_const &= c;
                    items.push(f);
                }
                self.pure_op(
                    all_const,
                    Box::new(move |frame| {
                        let values = items
                            .iter()
                            .map(|f| f(frame))
                            .collect::<NumbasResult<Vec<_>>>()?;
                        Ok(Value::tuple(values))
                    }),
                )
            }
            ExprKind::BinOp { left, op, right } => {
                let (l, lc) = self.operand(left)?;
                let (r, rc) = self.operand(right)?;
                let op = *op;
                self.pure_op(
                    lc && rc,
                    Box::new(move |frame| {
                        let a = l(frame)?;
                        let b = r(frame)?;
                        ops::binary(op, &a, &b)
                    }),
                )
            }
            ExprKind::UnaryOp { op, operand } => {
                let (f, c) = self.operand(operand)?;
                let op = *op;
                self.pure_op(c, Box::new(move |frame| ops::unary(op, &f(frame)?)))
            }
            ExprKind::BoolOp { op, values } => {
                let mut all_const = true;
                let mut fs = Vec::with_capacity(values.len());
                for value in values {
                    let (f, c) = self.operand(value)?;
                    all_const &= c;
                    fs.push(f);
                }
                let stop_on = *op == BoolOp::Or;
                self.pure_op(
                    all_const,
                    Box::new(move |frame| {
                        let mut last = Value::None;
                        for f in &fs {
                            last = f(frame)?;
                            if last.is_truthy() == stop_on {
                                break;
                            }
                        }
                        Ok(last)
                    }),
                )
            }
            ExprKind::Compare {
                left,
                ops: cmp_ops,
                comparators,
            } => {
                let (first, mut all_const) = self.operand(left)?;
                let mut rest: Vec<(CmpOp, ExprFn)> = Vec::with_capacity(comparators.len());
                for (op, right) in cmp_ops.iter().zip(comparators) {
                    let (f, c) = self.operand(right)?;
                    all_const &= c;
                    rest.push((*op, f));
                }
                self.pure_op(
                    all_const,
                    Box::new(move |frame| {
                        let mut left = first(frame)?;
                        for (op, right) in &rest {
                            let right = right(frame)?;
                            if !ops::compare(*op, &left, &right)? {
                                return Ok(Value::Bool(false));
                            }
                            left = right;
                        }
                        Ok(Value::Bool(true))
                    }),
                )
            }
            ExprKind::IfExp { test, body, orelse } => {
                let (t, tc) = self.operand(test)?;
                let (b, bc) = self.operand(body)?;
                let (o, oc) = self.operand(orelse)?;
                self.pure_op(
                    tc && bc && oc,
                    Box::new(move |frame| {
                        if t(frame)?.is_truthy() {
                            b(frame)
                        } else {
                            o(frame)
                        }
                    }),
                )
            }
            ExprKind::Subscript { value, index } => {
                let (v, vc) = self.operand(value)?;
                let (i, ic) = self.operand(index)?;
                self.pure_op(
                    vc && ic,
                    Box::new(move |frame| {
                        let container = v(frame)?;
                        ops::subscript(&container, &i(frame)?)
                    }),
                )
            }
            ExprKind::Attribute { value, attr } => match self.expr(value)? {
                // Globals are frozen, so attributes of constants are too.
                Lowered::Const(base) => Lowered::Const(base.get_attr(attr).map_err(|e| {
                    NumbasError::compile_at(e.to_string(), expr.span)
                })?),
                Lowered::Dyn(base) => {
                    self.reject_in_nopython(
                        format!(
                            "attribute access '.{}' on a runtime value is not supported in nopython mode",
                            attr
                        ),
                        expr.span,
                    )?;
                    let attr = attr.clone();
                    Lowered::Dyn(Box::new(move |frame| base(frame)?.get_attr(&attr)))
                }
            },
            ExprKind::Call { func, args } => self.call(func, args, expr.span)?,
        };
        Ok(lowered)
    }

    fn call(&self, func: &Expr, args: &[Expr], span: Span) -> NumbasResult<Lowered> {
        let callee = self.expr(func)?;
        let mut all_const = true;
        let mut arg_fns = Vec::with_capacity(args.len());
        for arg in args {
            let (f, c) = self.operand(arg)?;
            all_const &= c;
            arg_fns.push(f);
        }

        match callee {
            Lowered::Const(Value::Callable(target)) => {
                let flags = target.flags();
                if self.settings.nopython && !flags.contains(CallableFlags::NOPYTHON) {
                    return Err(NumbasError::compile_at(
                        format!("cannot call object-mode function '{}' in nopython mode", target.name()),
                        span,
                    ));
                }
                let call: ExprFn = Box::new(move |frame| {
                    let values = arg_fns
                        .iter()
                        .map(|f| f(frame))
                        .collect::<NumbasResult<SmallVec<[Value; 4]>>>()?;
                    target.call(&values)
                });
                if flags.contains(CallableFlags::PURE) {
                    Ok(self.pure_op(all_const, call))
                } else {
                    Ok(Lowered::Dyn(call))
                }
            }
            Lowered::Const(other) => Err(NumbasError::compile_at(
                format!("'{}' object is not callable", other.type_name()),
                span,
            )),
            Lowered::Dyn(callee) => Ok(Lowered::Dyn(Box::new(move |frame| {
                let target = callee(frame)?;
                let values = arg_fns
                    .iter()
                    .map(|f| f(frame))
                    .collect::<NumbasResult<SmallVec<[Value; 4]>>>()?;
                target.call(&values)
            }))),
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Plain data, or a callable that is itself safe for `nopython` code.
fn nopython_value(v: &Value) -> bool {
    match v {
        Value::None | Value::Bool(_) | Value::Int(_) | Value::Float(_) => true,
        Value::Tuple(items) => items.iter().all(nopython_value),
        Value::Callable(f) => f.flags().contains(CallableFlags::NOPYTHON),
        Value::Object(_) => false,
    }
}

fn unpack(v: &Value, n: usize) -> NumbasResult<Arc<[Value]>> {
    let items = builtins::iterate(v)
        .map_err(|_| NumbasError::type_error(format!("cannot unpack non-iterable {} object", v.type_name())))?;
    match items.len() {
        len if len < n => Err(NumbasError::value_error(format!(
            "not enough values to unpack (expected {}, got {})",
            n, len
        ))),
        len if len > n => Err(NumbasError::value_error(format!(
            "too many values to unpack (expected {})",
            n
        ))),
        _ => Ok(items),
    }
}

fn set_attr(target: &Value, attr: &str, value: Value) -> NumbasResult<()> {
    match target {
        Value::Object(obj) => {
            obj.set_attr(attr, value);
            Ok(())
        }
        other => Err(NumbasError::attribute_error(other.type_name(), attr)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use numbas_parser::parse_function;

    fn compile_with(src: &str, scope: &Arc<Scope>, options: JitOptions) -> NumbasResult<Arc<dyn Callable>> {
        let def = parse_function(src).unwrap();
        ClosureBackend.compile(&Function::new(def, Arc::clone(scope)), &options)
    }

    fn compile(src: &str) -> Arc<dyn Callable> {
        compile_with(src, &Scope::new("test"), JitOptions::new()).unwrap()
    }

    fn call(f: &Arc<dyn Callable>, args: &[i64]) -> Value {
        let args: Vec<Value> = args.iter().map(|&a| Value::Int(a)).collect();
        f.call(&args).unwrap()
    }

    #[test]
    fn test_arithmetic_and_return() {
        let f = compile("def f(a, b):\n    return a * b + 1\n");
        assert_eq!(call(&f, &[3, 4]), Value::Int(13));
        assert!(f.flags().contains(CallableFlags::COMPILED | CallableFlags::NOPYTHON));
    }

    #[test]
    fn test_defaults_and_arity() {
        let f = compile("def f(a, b=-2):\n    return a - b\n");
        assert_eq!(call(&f, &[1]), Value::Int(3));
        assert_eq!(call(&f, &[1, 1]), Value::Int(0));
        let err = f.call(&[]).unwrap_err();
        assert!(err.is_kind(RuntimeErrorKind::TypeError));
    }

    #[test]
    fn test_counted_loop_with_else() {
        let src = "def f(n):\n    s = 0\n    for i in range(n):\n        if i == 5:\n            break\n        s += i\n    else:\n        s = -s\n    return s\n";
        let f = compile(src);
        assert_eq!(call(&f, &[3]), Value::Int(-3));
        assert_eq!(call(&f, &[10]), Value::Int(10));
    }

    #[test]
    fn test_range_with_negative_step() {
        let f = compile("def f():\n    s = 0\n    for i in range(10, 0, -3):\n        s = s * 100 + i\n    return s\n");
        assert_eq!(call(&f, &[]), Value::Int(10070401));
    }

    #[test]
    fn test_while_continue() {
        let src = "def f(n):\n    k = 0\n    while n > 0:\n        n -= 1\n        if n % 2:\n            continue\n        k += 1\n    return k\n";
        assert_eq!(call(&compile(src), &[6]), Value::Int(3));
    }

    #[test]
    fn test_tuple_unpacking_and_iteration() {
        let src = "def f():\n    t = (1, 2), (3, 4)\n    s = 0\n    for a, b in t:\n        s += a * b\n    return s\n";
        assert_eq!(call(&compile(src), &[]), Value::Int(14));
        let bad = compile("def f():\n    a, b = (1, 2, 3)\n");
        assert!(bad.call(&[]).unwrap_err().is_kind(RuntimeErrorKind::ValueError));
    }

    #[test]
    fn test_short_circuit_and_chains() {
        let f = compile("def f(a):\n    return a != 0 and 10 // a or -1\n");
        assert_eq!(call(&f, &[0]), Value::Int(-1));
        assert_eq!(call(&f, &[5]), Value::Int(2));
        let g = compile("def g(x):\n    return 0 < x <= 10\n");
        assert_eq!(call(&g, &[10]), Value::Bool(true));
        assert_eq!(call(&g, &[11]), Value::Bool(false));
    }

    #[test]
    fn test_unbound_local() {
        let f = compile("def f(c):\n    if c:\n        y = 1\n    return y\n");
        assert_eq!(call(&f, &[1]), Value::Int(1));
        assert!(f.call(&[Value::Int(0)]).unwrap_err().is_kind(RuntimeErrorKind::NameError));
    }

    #[test]
    fn test_globals_are_frozen_at_compile_time() {
        let scope = Scope::new("m");
        scope.set("K", Value::Int(2));
        let f = compile_with("def f(x):\n    return K * x\n", &scope, JitOptions::new()).unwrap();
        scope.set("K", Value::Int(100));
        assert_eq!(call(&f, &[5]), Value::Int(10));
    }

    #[test]
    fn test_unknown_name_is_compile_error() {
        let err = compile_with("def f():\n    return nope\n", &Scope::new("m"), JitOptions::new())
            .unwrap_err();
        assert!(err.is_compile_error());
        assert!(err.to_string().contains("name 'nope' is not defined"));
    }

    #[test]
    fn test_math_module_resolves_statically() {
        let f = compile("def f(x):\n    return math.sqrt(x) + math.pi * 0\n");
        assert_eq!(f.call(&[Value::Int(16)]).unwrap(), Value::Float(4.0));
    }

    #[test]
    fn test_options() {
        let scope = Scope::new("m");
        let src = "def f():\n    return 1\n";
        let err = compile_with(src, &scope, JitOptions::new().with("parallel", true)).unwrap_err();
        assert!(err.to_string().contains("unrecognized option 'parallel'"));
        let err = compile_with(src, &scope, JitOptions::new().with("nopython", 1i64)).unwrap_err();
        assert!(err.is_compile_error());
        let f = compile_with(src, &scope, JitOptions::new().with("nopython", false)).unwrap();
        assert!(!f.flags().contains(CallableFlags::NOPYTHON));
    }

    #[test]
    fn test_nopython_rejects_object_operations() {
        let src = "def f(o):\n    return o.x\n";
        let scope = Scope::new("m");
        assert!(compile_with(src, &scope, JitOptions::new()).unwrap_err().is_compile_error());

        let f = compile_with(src, &scope, JitOptions::new().with("nopython", false)).unwrap();
        let class = numbas_runtime::Class::new("P", Scope::new("m"));
        let obj = class.instantiate([("x", Value::Int(3))]);
        assert_eq!(f.call(&[Value::Object(obj)]).unwrap(), Value::Int(3));

        let assign = "def g(o):\n    o.x = 1\n";
        assert!(compile_with(assign, &scope, JitOptions::new()).is_err());
    }

    #[test]
    fn test_nopython_rejects_object_constants() {
        let scope = Scope::new("m");
        let class = numbas_runtime::Class::new("P", Scope::new("m"));
        scope.set("OBJ", Value::Object(class.instantiate::<&str>([])));
        let err = compile_with("def f():\n    return OBJ\n", &scope, JitOptions::new()).unwrap_err();
        assert!(err.to_string().contains("nopython"));
    }

    #[test]
    fn test_constant_folding() {
        // A folded division by zero would be a compile-time failure; it must
        // stay a runtime error instead.
        let f = compile("def f(c):\n    if c:\n        return 1 // 0\n    return 2 ** 10\n");
        assert_eq!(call(&f, &[0]), Value::Int(1024));
        assert!(f.call(&[Value::Int(1)]).is_err());
    }

    #[test]
    fn test_break_outside_loop() {
        let err = compile_with("def f():\n    break\n", &Scope::new("m"), JitOptions::new()).unwrap_err();
        assert!(err.is_compile_error());
    }
}
