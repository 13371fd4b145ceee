//! Runtime values.

use crate::callable::Callable;
use crate::object::Object;
use numbas_core::{NumbasError, NumbasResult};
use std::fmt;
use std::sync::Arc;

/// A runtime value.
///
/// Numbers and booleans are stored inline; tuples, objects and callables
/// are shared through `Arc` and cloning a value never deep-copies.
#[derive(Debug, Clone)]
pub enum Value {
    /// `None`
    None,
    /// `True` / `False`
    Bool(bool),
    /// 64-bit integer. Arithmetic that leaves the range is an
    /// `OverflowError`.
    Int(i64),
    /// Double precision float.
    Float(f64),
    /// Immutable tuple.
    Tuple(Arc<[Value]>),
    /// Class instance.
    Object(Arc<Object>),
    /// Function, builtin or bound method.
    Callable(Arc<dyn Callable>),
}

impl Value {
    /// Build a tuple value.
    pub fn tuple(items: impl IntoIterator<Item = Value>) -> Self {
        Self::Tuple(items.into_iter().collect())
    }

    /// Python type name, used in error messages.
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            Self::None => "NoneType",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Tuple(_) => "tuple",
            Self::Object(obj) => obj.class().name(),
            Self::Callable(_) => "function",
        }
    }

    /// Truth value.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::None => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Tuple(items) => !items.is_empty(),
            Self::Object(_) | Self::Callable(_) => true,
        }
    }

    /// True for `None`, booleans, numbers, and tuples of those.
    ///
    /// These are the values that can be embedded in compiled code as plain
    /// constants.
    #[must_use]
    pub fn is_scalar(&self) -> bool {
        match self {
            Self::None | Self::Bool(_) | Self::Int(_) | Self::Float(_) => true,
            Self::Tuple(items) => items.iter().all(Self::is_scalar),
            Self::Object(_) | Self::Callable(_) => false,
        }
    }

    /// True for ints, floats and bools.
    #[inline]
    #[must_use]
    pub fn is_number(&self) -> bool {
        matches!(self, Self::Bool(_) | Self::Int(_) | Self::Float(_))
    }

    /// Integer view of an int or bool.
    #[inline]
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// Float view of any number.
    #[inline]
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            Self::Bool(b) => Some(f64::from(u8::from(*b))),
            _ => None,
        }
    }

    /// Integer argument or a `TypeError` naming `what`.
    pub fn expect_int(&self, what: &str) -> NumbasResult<i64> {
        self.as_int().ok_or_else(|| {
            NumbasError::type_error(format!(
                "{} must be an integer, not '{}'",
                what,
                self.type_name()
            ))
        })
    }

    /// Float argument or a `TypeError` naming `what`.
    pub fn expect_float(&self, what: &str) -> NumbasResult<f64> {
        self.as_float().ok_or_else(|| {
            NumbasError::type_error(format!(
                "{} must be a real number, not '{}'",
                what,
                self.type_name()
            ))
        })
    }

    /// Identity comparison (`is`).
    ///
    /// Objects and callables compare by address. Immediate values compare by
    /// type and value, which matches how small ints and singletons behave.
    #[must_use]
    pub fn is_same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Tuple(a), Self::Tuple(b)) => Arc::ptr_eq(a, b),
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
            (Self::Callable(a), Self::Callable(b)) => {
                std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            _ => false,
        }
    }

    /// Attribute lookup. Only objects have attributes.
    pub fn get_attr(&self, name: &str) -> NumbasResult<Value> {
        match self {
            Self::Object(obj) => obj.get_attr(name),
            other => Err(NumbasError::attribute_error(other.type_name(), name)),
        }
    }

    /// Call this value with positional arguments.
    pub fn call(&self, args: &[Value]) -> NumbasResult<Value> {
        match self {
            Self::Callable(f) => f.call(args),
            other => Err(NumbasError::type_error(format!(
                "'{}' object is not callable",
                other.type_name()
            ))),
        }
    }
}

// =============================================================================
// Equality
// =============================================================================

impl PartialEq for Value {
    /// Python `==`: numbers compare by value across int, float and bool.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Tuple(a), Self::Tuple(b)) => a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x == y),
            (Self::Object(_), Self::Object(_)) | (Self::Callable(_), Self::Callable(_)) => {
                self.is_same(other)
            }
            (a, b) if a.is_number() && b.is_number() => match (a.as_int(), b.as_int()) {
                (Some(x), Some(y)) => x == y,
                _ => a.as_float() == b.as_float(),
            },
            _ => false,
        }
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<Arc<Object>> for Value {
    fn from(obj: Arc<Object>) -> Self {
        Self::Object(obj)
    }
}

impl From<Arc<dyn Callable>> for Value {
    fn from(f: Arc<dyn Callable>) -> Self {
        Self::Callable(f)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Self::None
    }
}

// =============================================================================
// Display
// =============================================================================

impl fmt::Display for Value {
    /// Python `repr`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) if x.is_nan() => f.write_str("nan"),
            Self::Float(x) => write!(f, "{:?}", x),
            Self::Tuple(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                if items.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
            Self::Object(obj) => write!(f, "<{} object {}>", obj.class().name(), obj.id()),
            Self::Callable(func) => write!(f, "<function {}>", func.name()),
        }
    }
}
