//! Error model shared by the parser, runtime and specializer.
//!
//! Every fallible operation in numbas returns [`NumbasResult`]. Errors are
//! grouped the way a Python runtime reports them: lexing and syntax errors
//! carry a [`Span`], compile errors may carry one, and runtime errors carry
//! a [`RuntimeErrorKind`] naming the Python exception class they mirror.

use crate::span::Span;
use std::fmt;
use thiserror::Error;

/// Result alias used throughout numbas.
pub type NumbasResult<T> = Result<T, NumbasError>;

// =============================================================================
// Runtime Error Kinds
// =============================================================================

/// Python exception class a runtime error corresponds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeErrorKind {
    /// Attribute lookup failed.
    AttributeError,
    /// Name lookup failed.
    NameError,
    /// Operation applied to a value of the wrong type, or bad arity.
    TypeError,
    /// Right type, wrong value.
    ValueError,
    /// Division or modulo by zero.
    ZeroDivisionError,
    /// Sequence index out of range.
    IndexError,
    /// Mapping key missing.
    KeyError,
    /// Integer arithmetic overflowed.
    OverflowError,
    /// Unbounded or cyclic recursion.
    RecursionError,
    /// A weakly referenced object no longer exists.
    ReferenceError,
}

impl RuntimeErrorKind {
    /// Python-facing class name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AttributeError => "AttributeError",
            Self::NameError => "NameError",
            Self::TypeError => "TypeError",
            Self::ValueError => "ValueError",
            Self::ZeroDivisionError => "ZeroDivisionError",
            Self::IndexError => "IndexError",
            Self::KeyError => "KeyError",
            Self::OverflowError => "OverflowError",
            Self::RecursionError => "RecursionError",
            Self::ReferenceError => "ReferenceError",
        }
    }
}

impl fmt::Display for RuntimeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// NumbasError
// =============================================================================

/// The error type for every numbas operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NumbasError {
    /// Invalid token.
    #[error("LexError: {message}")]
    LexError {
        /// Description.
        message: String,
        /// Location in the method source.
        span: Span,
    },

    /// Source does not match the grammar.
    #[error("SyntaxError: {message}")]
    SyntaxError {
        /// Description.
        message: String,
        /// Location in the method source.
        span: Span,
    },

    /// The backend refused the function.
    #[error("CompileError: {message}")]
    CompileError {
        /// Description.
        message: String,
        /// Location, when the failure is tied to a node.
        span: Option<Span>,
    },

    /// Error raised while resolving attributes or running compiled code.
    #[error("{kind}: {message}")]
    RuntimeError {
        /// Exception class.
        kind: RuntimeErrorKind,
        /// Description.
        message: String,
    },

    /// Broken internal invariant.
    #[error("InternalError: {message}")]
    InternalError {
        /// Description.
        message: String,
    },
}

impl NumbasError {
    /// Create a lexer error.
    pub fn lex(message: impl Into<String>, span: Span) -> Self {
        Self::LexError {
            message: message.into(),
            span,
        }
    }

    /// Create a syntax error.
    pub fn syntax(message: impl Into<String>, span: Span) -> Self {
        Self::SyntaxError {
            message: message.into(),
            span,
        }
    }

    /// Create a compile error without location.
    pub fn compile(message: impl Into<String>) -> Self {
        Self::CompileError {
            message: message.into(),
            span: None,
        }
    }

    /// Create a compile error tied to a node.
    pub fn compile_at(message: impl Into<String>, span: Span) -> Self {
        Self::CompileError {
            message: message.into(),
            span: Some(span),
        }
    }

    /// Create a runtime error of the given kind.
    pub fn runtime(kind: RuntimeErrorKind, message: impl Into<String>) -> Self {
        Self::RuntimeError {
            kind,
            message: message.into(),
        }
    }

    /// `AttributeError: '<type>' object has no attribute '<attr>'`.
    pub fn attribute_error(type_name: &str, attr: &str) -> Self {
        Self::runtime(
            RuntimeErrorKind::AttributeError,
            format!("'{}' object has no attribute '{}'", type_name, attr),
        )
    }

    /// `NameError: name '<name>' is not defined`.
    pub fn name_error(name: &str) -> Self {
        Self::runtime(
            RuntimeErrorKind::NameError,
            format!("name '{}' is not defined", name),
        )
    }

    /// Create a `TypeError`.
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::runtime(RuntimeErrorKind::TypeError, message)
    }

    /// Create a `ValueError`.
    pub fn value_error(message: impl Into<String>) -> Self {
        Self::runtime(RuntimeErrorKind::ValueError, message)
    }

    /// Create a `ZeroDivisionError`.
    pub fn zero_division(message: impl Into<String>) -> Self {
        Self::runtime(RuntimeErrorKind::ZeroDivisionError, message)
    }

    /// Create an `OverflowError`.
    pub fn overflow(message: impl Into<String>) -> Self {
        Self::runtime(RuntimeErrorKind::OverflowError, message)
    }

    /// Create a `RecursionError`.
    pub fn recursion(message: impl Into<String>) -> Self {
        Self::runtime(RuntimeErrorKind::RecursionError, message)
    }

    /// `TypeError: unsupported operand type(s) for <op>: '<lhs>' and '<rhs>'`.
    pub fn unsupported_operand(op: &str, lhs: &str, rhs: &str) -> Self {
        Self::type_error(format!(
            "unsupported operand type(s) for {}: '{}' and '{}'",
            op, lhs, rhs
        ))
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }

    /// Runtime error kind, if this is a runtime error.
    #[must_use]
    pub fn runtime_kind(&self) -> Option<RuntimeErrorKind> {
        match self {
            Self::RuntimeError { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Check if this is a runtime error of the given kind.
    #[must_use]
    pub fn is_kind(&self, kind: RuntimeErrorKind) -> bool {
        self.runtime_kind() == Some(kind)
    }

    /// Check if this error came from the backend.
    #[must_use]
    pub fn is_compile_error(&self) -> bool {
        matches!(self, Self::CompileError { .. })
    }

    /// Source location, when one is known.
    #[must_use]
    pub fn span(&self) -> Option<Span> {
        match self {
            Self::LexError { span, .. } | Self::SyntaxError { span, .. } => Some(*span),
            Self::CompileError { span, .. } => *span,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_error_message() {
        let err = NumbasError::attribute_error("Foo", "x");
        assert_eq!(
            err.to_string(),
            "AttributeError: 'Foo' object has no attribute 'x'"
        );
        assert!(err.is_kind(RuntimeErrorKind::AttributeError));
    }

    #[test]
    fn test_syntax_error_span() {
        let err = NumbasError::syntax("expected ':'", Span::new(3, 4));
        assert_eq!(err.span(), Some(Span::new(3, 4)));
        assert_eq!(err.runtime_kind(), None);
    }

    #[test]
    fn test_compile_error() {
        let err = NumbasError::compile("unrecognized option 'nopy'");
        assert!(err.is_compile_error());
        assert_eq!(err.span(), None);
        assert_eq!(err.to_string(), "CompileError: unrecognized option 'nopy'");
    }

    #[test]
    fn test_unsupported_operand() {
        let err = NumbasError::unsupported_operand("+", "int", "NoneType");
        assert!(err.is_kind(RuntimeErrorKind::TypeError));
        assert!(err.to_string().contains("'int' and 'NoneType'"));
    }
}
