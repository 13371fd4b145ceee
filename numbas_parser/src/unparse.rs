//! Source emitter.
//!
//! Turns an AST back into canonical source text: four-space indentation,
//! single spaces around binary operators, and only the parentheses the
//! operator precedence requires. The output re-parses to an equal tree
//! (modulo spans) and carries no trailing newline.

use crate::ast::{
    Arguments, BinOp, BoolOp, Expr, ExprKind, FunctionDef, Module, Stmt, StmtKind, UnaryOp,
};
use std::fmt::Write as _;

const INDENT: &str = "    ";

/// Binding strength of an expression as seen by the emitter, loosest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Prec {
    Tuple,
    Test,
    Or,
    And,
    Not,
    Cmp,
    BitOr,
    BitXor,
    BitAnd,
    Shift,
    Arith,
    Term,
    Factor,
    Power,
    Atom,
}

impl Prec {
    fn next(self) -> Self {
        match self {
            Self::Tuple => Self::Test,
            Self::Test => Self::Or,
            Self::Or => Self::And,
            Self::And => Self::Not,
            Self::Not => Self::Cmp,
            Self::Cmp => Self::BitOr,
            Self::BitOr => Self::BitXor,
            Self::BitXor => Self::BitAnd,
            Self::BitAnd => Self::Shift,
            Self::Shift => Self::Arith,
            Self::Arith => Self::Term,
            Self::Term => Self::Factor,
            Self::Factor => Self::Power,
            Self::Power | Self::Atom => Self::Atom,
        }
    }

    fn of_binop(op: BinOp) -> Self {
        match op {
            BinOp::BitOr => Self::BitOr,
            BinOp::BitXor => Self::BitXor,
            BinOp::BitAnd => Self::BitAnd,
            BinOp::LShift | BinOp::RShift => Self::Shift,
            BinOp::Add | BinOp::Sub => Self::Arith,
            BinOp::Mult | BinOp::Div | BinOp::FloorDiv | BinOp::Mod => Self::Term,
            BinOp::Pow => Self::Power,
        }
    }

    fn of_expr(expr: &Expr) -> Self {
        match &expr.kind {
            ExprKind::Tuple(_) => Self::Tuple,
            ExprKind::IfExp { .. } => Self::Test,
            ExprKind::BoolOp { op: BoolOp::Or, .. } => Self::Or,
            ExprKind::BoolOp { op: BoolOp::And, .. } => Self::And,
            ExprKind::UnaryOp { op: UnaryOp::Not, .. } => Self::Not,
            ExprKind::UnaryOp { .. } => Self::Factor,
            ExprKind::Compare { .. } => Self::Cmp,
            ExprKind::BinOp { op, .. } => Self::of_binop(*op),
            _ => Self::Atom,
        }
    }
}

/// Emit a whole module.
#[must_use]
pub fn unparse(module: &Module) -> String {
    let mut emitter = Emitter::default();
    emitter.block(&module.body);
    emitter.finish()
}

/// Emit a single function definition.
#[must_use]
pub fn unparse_function(def: &FunctionDef) -> String {
    let mut emitter = Emitter::default();
    emitter.function_def(def);
    emitter.finish()
}

/// Emit a single expression.
#[must_use]
pub fn unparse_expr(expr: &Expr) -> String {
    let mut emitter = Emitter::default();
    emitter.expr(expr, Prec::Test);
    emitter.out
}

#[derive(Default)]
struct Emitter {
    out: String,
    depth: usize,
}

impl Emitter {
    fn finish(self) -> String {
        self.out
    }

    /// Start a new line at the current depth.
    fn line(&mut self) {
        if !self.out.is_empty() {
            self.out.push('\n');
        }
        for _ in 0..self.depth {
            self.out.push_str(INDENT);
        }
    }

    fn write(&mut self, s: &str) {
        self.out.push_str(s);
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn block(&mut self, body: &[Stmt]) {
        for stmt in body {
            self.stmt(stmt);
        }
    }

    fn indented(&mut self, body: &[Stmt]) {
        self.depth += 1;
        if body.is_empty() {
            self.line();
            self.write("pass");
        } else {
            self.block(body);
        }
        self.depth -= 1;
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::FunctionDef(def) => self.function_def(def),
            StmtKind::Expr(value) => {
                self.line();
                self.expr(value, Prec::Test);
            }
            StmtKind::Assign { targets, value } => {
                self.line();
                for target in targets {
                    self.expr(target, Prec::Tuple);
                    self.write(" = ");
                }
                self.expr(value, Prec::Test);
            }
            StmtKind::AugAssign { target, op, value } => {
                self.line();
                self.expr(target, Prec::Test);
                let _ = write!(self.out, " {}= ", op.as_str());
                self.expr(value, Prec::Test);
            }
            StmtKind::Return(value) => {
                self.line();
                self.write("return");
                if let Some(value) = value {
                    self.write(" ");
                    self.expr(value, Prec::Test);
                }
            }
            StmtKind::Pass => {
                self.line();
                self.write("pass");
            }
            StmtKind::Break => {
                self.line();
                self.write("break");
            }
            StmtKind::Continue => {
                self.line();
                self.write("continue");
            }
            StmtKind::If { test, body, orelse } => {
                self.line();
                self.write("if ");
                self.expr(test, Prec::Test);
                self.write(":");
                self.indented(body);

                // Collapse `else: if` into `elif`.
                let mut orelse = orelse.as_slice();
                while let [
                    Stmt {
                        kind: StmtKind::If { test, body, orelse: next },
                        ..
                    },
                ] = orelse
                {
                    self.line();
                    self.write("elif ");
                    self.expr(test, Prec::Test);
                    self.write(":");
                    self.indented(body);
                    orelse = next.as_slice();
                }
                self.else_clause(orelse);
            }
            StmtKind::While { test, body, orelse } => {
                self.line();
                self.write("while ");
                self.expr(test, Prec::Test);
                self.write(":");
                self.indented(body);
                self.else_clause(orelse);
            }
            StmtKind::For {
                target,
                iter,
                body,
                orelse,
            } => {
                self.line();
                self.write("for ");
                self.expr(target, Prec::Tuple);
                self.write(" in ");
                self.expr(iter, Prec::Test);
                self.write(":");
                self.indented(body);
                self.else_clause(orelse);
            }
        }
    }

    fn else_clause(&mut self, orelse: &[Stmt]) {
        if !orelse.is_empty() {
            self.line();
            self.write("else:");
            self.indented(orelse);
        }
    }

    fn function_def(&mut self, def: &FunctionDef) {
        for decorator in &def.decorator_list {
            self.line();
            self.write("@");
            self.expr(decorator, Prec::Test);
        }
        self.line();
        let _ = write!(self.out, "def {}(", def.name);
        self.arguments(&def.args);
        self.write(")");
        if let Some(returns) = &def.returns {
            self.write(" -> ");
            self.expr(returns, Prec::Test);
        }
        self.write(":");
        self.indented(&def.body);
    }

    fn arguments(&mut self, args: &Arguments) {
        let first_default = args.first_default();
        for (i, arg) in args.args.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            self.write(&arg.arg);
            if let Some(annotation) = &arg.annotation {
                self.write(": ");
                self.expr(annotation, Prec::Test);
            }
            if let Some(default) = i.checked_sub(first_default).and_then(|d| args.defaults.get(d)) {
                self.write(if arg.annotation.is_some() { " = " } else { "=" });
                self.expr(default, Prec::Test);
            }
        }
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    /// Emit `expr` in a context that binds at least as tight as `ctx`.
    fn expr(&mut self, expr: &Expr, ctx: Prec) {
        if let ExprKind::Tuple(elts) = &expr.kind {
            let parens = elts.is_empty() || ctx > Prec::Tuple;
            if parens {
                self.write("(");
            }
            self.items(elts);
            if elts.len() == 1 {
                self.write(",");
            }
            if parens {
                self.write(")");
            }
            return;
        }

        let parens = Prec::of_expr(expr) < ctx;
        if parens {
            self.write("(");
        }
        self.expr_inner(expr);
        if parens {
            self.write(")");
        }
    }

    fn items(&mut self, elts: &[Expr]) {
        for (i, elt) in elts.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            self.expr(elt, Prec::Test);
        }
    }

    fn expr_inner(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Int(v) => {
                let _ = write!(self.out, "{}", v);
            }
            ExprKind::Float(v) => self.float(*v),
            ExprKind::Bool(true) => self.write("True"),
            ExprKind::Bool(false) => self.write("False"),
            ExprKind::None => self.write("None"),
            ExprKind::Name(id) => self.write(id),
            ExprKind::Tuple(elts) => self.items(elts),
            ExprKind::BinOp { left, op, right } => {
                let prec = Prec::of_binop(*op);
                // `**` is right-associative.
                let (lp, rp) = if *op == BinOp::Pow {
                    (prec.next(), prec)
                } else {
                    (prec, prec.next())
                };
                self.expr(left, lp);
                let _ = write!(self.out, " {} ", op.as_str());
                self.expr(right, rp);
            }
            ExprKind::UnaryOp { op, operand } => {
                self.write(op.as_str());
                let prec = if *op == UnaryOp::Not {
                    Prec::Not
                } else {
                    Prec::Factor
                };
                self.expr(operand, prec);
            }
            ExprKind::BoolOp { op, values } => {
                let prec = if *op == BoolOp::Or { Prec::Or } else { Prec::And };
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        let _ = write!(self.out, " {} ", op.as_str());
                    }
                    self.expr(value, prec.next());
                }
            }
            ExprKind::Compare {
                left,
                ops,
                comparators,
            } => {
                self.expr(left, Prec::Cmp.next());
                for (op, right) in ops.iter().zip(comparators) {
                    let _ = write!(self.out, " {} ", op.as_str());
                    self.expr(right, Prec::Cmp.next());
                }
            }
            ExprKind::IfExp { test, body, orelse } => {
                self.expr(body, Prec::Test.next());
                self.write(" if ");
                self.expr(test, Prec::Test.next());
                self.write(" else ");
                self.expr(orelse, Prec::Test);
            }
            ExprKind::Attribute { value, attr } => {
                self.expr(value, Prec::Atom);
                // `1.real` would lex as a float.
                if matches!(value.kind, ExprKind::Int(_)) {
                    self.write(" ");
                }
                self.write(".");
                self.write(attr);
            }
            ExprKind::Subscript { value, index } => {
                self.expr(value, Prec::Atom);
                self.write("[");
                match &index.kind {
                    ExprKind::Tuple(elts) if !elts.is_empty() => {
                        self.items(elts);
                        if elts.len() == 1 {
                            self.write(",");
                        }
                    }
                    _ => self.expr(index, Prec::Test),
                }
                self.write("]");
            }
            ExprKind::Call { func, args } => {
                self.expr(func, Prec::Atom);
                self.write("(");
                self.items(args);
                self.write(")");
            }
        }
    }

    fn float(&mut self, v: f64) {
        if v.is_nan() {
            self.write("(1e309 - 1e309)");
        } else if v.is_infinite() {
            self.write(if v > 0.0 { "1e309" } else { "-1e309" });
        } else {
            let _ = write!(self.out, "{:?}", v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse, parse_expression, parse_function};

    fn roundtrip_expr(src: &str) -> String {
        unparse_expr(&parse_expression(src).unwrap())
    }

    #[test]
    fn test_minimal_parentheses() {
        assert_eq!(roundtrip_expr("(a + b) * c"), "(a + b) * c");
        assert_eq!(roundtrip_expr("a + (b * c)"), "a + b * c");
        assert_eq!(roundtrip_expr("a - (b - c)"), "a - (b - c)");
        assert_eq!(roundtrip_expr("(a - b) - c"), "a - b - c");
    }

    #[test]
    fn test_power_associativity() {
        assert_eq!(roundtrip_expr("a ** b ** c"), "a ** b ** c");
        assert_eq!(roundtrip_expr("(a ** b) ** c"), "(a ** b) ** c");
        assert_eq!(roundtrip_expr("-a ** 2"), "-a ** 2");
        assert_eq!(roundtrip_expr("(-a) ** 2"), "(-a) ** 2");
    }

    #[test]
    fn test_boolean_and_conditional() {
        assert_eq!(roundtrip_expr("not (a and b)"), "not (a and b)");
        assert_eq!(roundtrip_expr("(a or b) and c"), "(a or b) and c");
        assert_eq!(roundtrip_expr("a if b else c if d else e"), "a if b else c if d else e");
        assert_eq!(roundtrip_expr("(a if b else c) + 1"), "(a if b else c) + 1");
    }

    #[test]
    fn test_tuples() {
        assert_eq!(roundtrip_expr("()"), "()");
        assert_eq!(roundtrip_expr("(a,)"), "(a,)");
        assert_eq!(roundtrip_expr("f((a, b))"), "f((a, b))");
        assert_eq!(roundtrip_expr("x[i, j]"), "x[i, j]");
    }

    #[test]
    fn test_literals() {
        assert_eq!(roundtrip_expr("0x10"), "16");
        assert_eq!(roundtrip_expr("2.5e3"), "2500.0");
        assert_eq!(roundtrip_expr("None is not True"), "None is not True");
    }

    #[test]
    fn test_function_layout() {
        let src = "@jit\ndef f(self,n:int,k = 2)->float:\n  if n<0:\n    return 0\n  elif n==0: return 1\n  else:\n    for i,w in self.w:\n      k+=w\n  return self.x*n+k\n";
        let expected = "@jit\ndef f(self, n: int, k=2) -> float:\n    if n < 0:\n        return 0\n    elif n == 0:\n        return 1\n    else:\n        for i, w in self.w:\n            k += w\n    return self.x * n + k";
        let def = parse_function(src).unwrap();
        assert_eq!(unparse_function(&def), expected);
    }

    #[test]
    fn test_output_reparses_to_same_text() {
        let src = "def g(a, b):\n    x = y = (a, b)\n    while a > 0:\n        a -= 1\n    else:\n        pass\n    return x, -b\n";
        let once = unparse(&parse(src).unwrap());
        let twice = unparse(&parse(&once).unwrap());
        assert_eq!(once, twice);
        assert!(once.ends_with("return (x, -b)"));
    }

    #[test]
    fn test_attribute_on_int_literal() {
        assert_eq!(roundtrip_expr("(1).real"), "1 .real");
    }
}
