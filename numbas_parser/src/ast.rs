//! Abstract syntax tree for the method language.
//!
//! The node shapes follow CPython's `ast` module closely enough that a
//! method written for a Python class parses without changes, as long as it
//! stays inside the numeric subset. Every node carries its [`Span`].

use numbas_core::Span;

// =============================================================================
// Module Level
// =============================================================================

/// A parsed source unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    /// Top-level statements.
    pub body: Vec<Stmt>,
    /// Source span.
    pub span: Span,
}

impl Module {
    /// Create a new module.
    #[must_use]
    pub fn new(body: Vec<Stmt>, span: Span) -> Self {
        Self { body, span }
    }

    /// Iterate over the top-level function definitions.
    pub fn functions(&self) -> impl Iterator<Item = &FunctionDef> {
        self.body.iter().filter_map(|stmt| match &stmt.kind {
            StmtKind::FunctionDef(def) => Some(def.as_ref()),
            _ => None,
        })
    }
}

// =============================================================================
// Functions
// =============================================================================

/// A function definition: `@deco def name(args) -> ret: body`.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    /// Function name.
    pub name: String,
    /// Parameters.
    pub args: Arguments,
    /// Body.
    pub body: Vec<Stmt>,
    /// Decorator expressions, outermost first.
    pub decorator_list: Vec<Expr>,
    /// Return annotation.
    pub returns: Option<Box<Expr>>,
    /// Source span of the `def` statement.
    pub span: Span,
}

/// Positional parameter list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Arguments {
    /// Parameters in declaration order.
    pub args: Vec<Arg>,
    /// Defaults for the last `defaults.len()` parameters.
    pub defaults: Vec<Expr>,
}

impl Arguments {
    /// Parameter names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.args.iter().map(|a| a.arg.as_str())
    }

    /// Index of the first parameter that has a default.
    #[must_use]
    pub fn first_default(&self) -> usize {
        self.args.len().saturating_sub(self.defaults.len())
    }
}

/// A single parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    /// Parameter name.
    pub arg: String,
    /// Optional annotation.
    pub annotation: Option<Box<Expr>>,
    /// Source span.
    pub span: Span,
}

// =============================================================================
// Statements
// =============================================================================

/// A statement node.
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    /// The statement kind.
    pub kind: StmtKind,
    /// Source span.
    pub span: Span,
}

impl Stmt {
    /// Create a new statement.
    #[must_use]
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Statement kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// Expression statement.
    Expr(Box<Expr>),
    /// Assignment: `a = b = value`
    Assign {
        /// Assignment targets, left to right.
        targets: Vec<Expr>,
        /// Value being assigned.
        value: Box<Expr>,
    },
    /// Augmented assignment: `target += value`
    AugAssign {
        /// Target.
        target: Box<Expr>,
        /// Operator.
        op: BinOp,
        /// Value.
        value: Box<Expr>,
    },
    /// Return statement.
    Return(Option<Box<Expr>>),
    /// Pass statement.
    Pass,
    /// Break statement.
    Break,
    /// Continue statement.
    Continue,
    /// If statement. `elif` chains nest in `orelse`.
    If {
        /// Test expression.
        test: Box<Expr>,
        /// Body.
        body: Vec<Stmt>,
        /// Else clause.
        orelse: Vec<Stmt>,
    },
    /// For loop.
    For {
        /// Loop variable(s).
        target: Box<Expr>,
        /// Iterable.
        iter: Box<Expr>,
        /// Body.
        body: Vec<Stmt>,
        /// Else clause, run when the loop was not broken.
        orelse: Vec<Stmt>,
    },
    /// While loop.
    While {
        /// Test expression.
        test: Box<Expr>,
        /// Body.
        body: Vec<Stmt>,
        /// Else clause, run when the loop was not broken.
        orelse: Vec<Stmt>,
    },
    /// Function definition.
    FunctionDef(Box<FunctionDef>),
}

// =============================================================================
// Expressions
// =============================================================================

/// An expression node.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    /// The expression kind.
    pub kind: ExprKind,
    /// Source span.
    pub span: Span,
}

impl Expr {
    /// Create a new expression.
    #[must_use]
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Create a name reference.
    #[must_use]
    pub fn name(id: impl Into<String>, span: Span) -> Self {
        Self::new(ExprKind::Name(id.into()), span)
    }

    /// If this is a pure attribute chain ending in a name (`a.b.c`), return
    /// its parts root first.
    #[must_use]
    pub fn attribute_chain(&self) -> Option<Vec<&str>> {
        let mut parts = Vec::new();
        let mut node = self;
        loop {
            match &node.kind {
                ExprKind::Attribute { value, attr } => {
                    parts.push(attr.as_str());
                    node = value;
                }
                ExprKind::Name(id) => {
                    parts.push(id.as_str());
                    parts.reverse();
                    return Some(parts);
                }
                _ => return None,
            }
        }
    }
}

/// Expression kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    // === Literals ===
    /// Integer literal.
    Int(i64),
    /// Float literal.
    Float(f64),
    /// Bool literal.
    Bool(bool),
    /// None literal.
    None,

    // === Names ===
    /// Identifier reference.
    Name(String),

    // === Containers ===
    /// Tuple display: `(a, b)`
    Tuple(Vec<Expr>),

    // === Operations ===
    /// Binary operation.
    BinOp {
        /// Left operand.
        left: Box<Expr>,
        /// Operator.
        op: BinOp,
        /// Right operand.
        right: Box<Expr>,
    },
    /// Unary operation.
    UnaryOp {
        /// Operator.
        op: UnaryOp,
        /// Operand.
        operand: Box<Expr>,
    },
    /// Short-circuit boolean operation over two or more values.
    BoolOp {
        /// Operator.
        op: BoolOp,
        /// Operands.
        values: Vec<Expr>,
    },
    /// Comparison chain: `a < b <= c`
    Compare {
        /// Leftmost operand.
        left: Box<Expr>,
        /// Operators.
        ops: Vec<CmpOp>,
        /// Remaining operands.
        comparators: Vec<Expr>,
    },
    /// Conditional expression: `body if test else orelse`
    IfExp {
        /// Condition.
        test: Box<Expr>,
        /// Value if true.
        body: Box<Expr>,
        /// Value if false.
        orelse: Box<Expr>,
    },

    // === Access ===
    /// Attribute access: `value.attr`
    Attribute {
        /// Object.
        value: Box<Expr>,
        /// Attribute name.
        attr: String,
    },
    /// Subscript: `value[index]`
    Subscript {
        /// Container.
        value: Box<Expr>,
        /// Index.
        index: Box<Expr>,
    },
    /// Call with positional arguments.
    Call {
        /// Callee.
        func: Box<Expr>,
        /// Arguments.
        args: Vec<Expr>,
    },
}

// =============================================================================
// Operators
// =============================================================================

/// Binary operators (also used by augmented assignment).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mult,
    /// `/`
    Div,
    /// `//`
    FloorDiv,
    /// `%`
    Mod,
    /// `**`
    Pow,
    /// `<<`
    LShift,
    /// `>>`
    RShift,
    /// `|`
    BitOr,
    /// `^`
    BitXor,
    /// `&`
    BitAnd,
}

impl BinOp {
    /// Operator spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mult => "*",
            Self::Div => "/",
            Self::FloorDiv => "//",
            Self::Mod => "%",
            Self::Pow => "**",
            Self::LShift => "<<",
            Self::RShift => ">>",
            Self::BitOr => "|",
            Self::BitXor => "^",
            Self::BitAnd => "&",
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// `~`
    Invert,
    /// `not`
    Not,
    /// `+`
    UAdd,
    /// `-`
    USub,
}

impl UnaryOp {
    /// Operator spelling, including the trailing space for `not`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Invert => "~",
            Self::Not => "not ",
            Self::UAdd => "+",
            Self::USub => "-",
        }
    }
}

/// Boolean operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoolOp {
    /// `and`
    And,
    /// `or`
    Or,
}

impl BoolOp {
    /// Operator spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpOp {
    /// `==`
    Eq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    LtE,
    /// `>`
    Gt,
    /// `>=`
    GtE,
    /// `is`
    Is,
    /// `is not`
    IsNot,
}

impl CmpOp {
    /// Operator spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtE => "<=",
            Self::Gt => ">",
            Self::GtE => ">=",
            Self::Is => "is",
            Self::IsNot => "is not",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attr(value: Expr, name: &str) -> Expr {
        Expr::new(
            ExprKind::Attribute {
                value: Box::new(value),
                attr: name.to_string(),
            },
            Span::dummy(),
        )
    }

    #[test]
    fn test_attribute_chain() {
        let e = attr(attr(Expr::name("self", Span::dummy()), "a"), "b");
        assert_eq!(e.attribute_chain(), Some(vec!["self", "a", "b"]));
    }

    #[test]
    fn test_attribute_chain_non_name_root() {
        let call = Expr::new(
            ExprKind::Call {
                func: Box::new(Expr::name("f", Span::dummy())),
                args: vec![],
            },
            Span::dummy(),
        );
        assert_eq!(attr(call, "x").attribute_chain(), None);
    }

    #[test]
    fn test_first_default() {
        let arg = |n: &str| Arg {
            arg: n.to_string(),
            annotation: None,
            span: Span::dummy(),
        };
        let args = Arguments {
            args: vec![arg("self"), arg("n"), arg("k")],
            defaults: vec![Expr::new(ExprKind::Int(1), Span::dummy())],
        };
        assert_eq!(args.first_default(), 2);
        assert_eq!(args.names().collect::<Vec<_>>(), vec!["self", "n", "k"]);
    }

    #[test]
    fn test_operator_spelling() {
        assert_eq!(BinOp::FloorDiv.as_str(), "//");
        assert_eq!(CmpOp::IsNot.as_str(), "is not");
        assert_eq!(UnaryOp::Not.as_str(), "not ");
    }
}
