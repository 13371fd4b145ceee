//! Arithmetic and comparison operators.
//!
//! Semantics follow Python for the value types the runtime has: `/` always
//! produces a float, `//` and `%` round toward negative infinity, bools act
//! as ints. Integers are 64-bit, so results that leave the range raise
//! `OverflowError` instead of promoting.

use crate::value::Value;
use numbas_core::{NumbasError, NumbasResult};
use numbas_parser::{BinOp, CmpOp, UnaryOp};
use std::cmp::Ordering;
use std::sync::Arc;

/// Numeric operands after coercion.
enum Pair {
    Int(i64, i64),
    Float(f64, f64),
}

fn coerce(a: &Value, b: &Value) -> Option<Pair> {
    match (a.as_int(), b.as_int()) {
        (Some(x), Some(y)) => Some(Pair::Int(x, y)),
        _ => Some(Pair::Float(a.as_float()?, b.as_float()?)),
    }
}

fn int_overflow() -> NumbasError {
    NumbasError::overflow("integer result out of range")
}

// =============================================================================
// Integer Arithmetic
// =============================================================================

/// Floor division: `a // b` for integers.
pub fn floor_div_int(a: i64, b: i64) -> NumbasResult<i64> {
    if b == 0 {
        return Err(NumbasError::zero_division("integer division or modulo by zero"));
    }
    let q = a.checked_div(b).ok_or_else(int_overflow)?;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        Ok(q - 1)
    } else {
        Ok(q)
    }
}

/// Modulo with the sign of the divisor: `a % b` for integers.
pub fn mod_int(a: i64, b: i64) -> NumbasResult<i64> {
    if b == 0 {
        return Err(NumbasError::zero_division("integer modulo by zero"));
    }
    // `i64::MIN % -1` overflows in Rust but is 0 in Python.
    let r = a.checked_rem(b).unwrap_or(0);
    if r != 0 && ((r < 0) != (b < 0)) {
        Ok(r + b)
    } else {
        Ok(r)
    }
}

/// Integer power; negative exponents produce a float.
pub fn pow_int(a: i64, b: i64) -> NumbasResult<Value> {
    if b < 0 {
        if a == 0 {
            return Err(NumbasError::zero_division(
                "0.0 cannot be raised to a negative power",
            ));
        }
        return Ok(Value::Float((a as f64).powf(b as f64)));
    }
    let result = match (a, u32::try_from(b)) {
        (0 | 1, _) => Some(if b == 0 { 1 } else { a }),
        (-1, _) => Some(if b % 2 == 0 { 1 } else { -1 }),
        (_, Ok(exp)) => a.checked_pow(exp),
        (_, Err(_)) => None,
    };
    result.map(Value::Int).ok_or_else(int_overflow)
}

/// Left shift.
pub fn lshift_int(a: i64, b: i64) -> NumbasResult<i64> {
    if b < 0 {
        return Err(NumbasError::value_error("negative shift count"));
    }
    if a == 0 {
        return Ok(0);
    }
    if b >= 63 {
        return Err(int_overflow());
    }
    let result = a << b;
    if result >> b == a {
        Ok(result)
    } else {
        Err(int_overflow())
    }
}

/// Arithmetic right shift.
pub fn rshift_int(a: i64, b: i64) -> NumbasResult<i64> {
    if b < 0 {
        return Err(NumbasError::value_error("negative shift count"));
    }
    if b >= 64 {
        return Ok(if a < 0 { -1 } else { 0 });
    }
    Ok(a >> b)
}

// =============================================================================
// Float Arithmetic
// =============================================================================

/// Python float modulo.
pub fn mod_float(a: f64, b: f64) -> NumbasResult<f64> {
    if b == 0.0 {
        return Err(NumbasError::zero_division("float modulo"));
    }
    let m = a % b;
    if m == 0.0 {
        Ok(0.0f64.copysign(b))
    } else if (b < 0.0) != (m < 0.0) {
        Ok(m + b)
    } else {
        Ok(m)
    }
}

/// Python float floor division.
pub fn floor_div_float(a: f64, b: f64) -> NumbasResult<f64> {
    if b == 0.0 {
        return Err(NumbasError::zero_division("float floor division by zero"));
    }
    let m = a % b;
    let mut div = (a - m) / b;
    if m != 0.0 && ((b < 0.0) != (m < 0.0)) {
        div -= 1.0;
    }
    if div == 0.0 {
        return Ok(0.0f64.copysign(a / b));
    }
    let floor = div.floor();
    Ok(if div - floor > 0.5 { floor + 1.0 } else { floor })
}

/// Float power.
pub fn pow_float(a: f64, b: f64) -> NumbasResult<f64> {
    if a == 0.0 && b < 0.0 {
        return Err(NumbasError::zero_division(
            "0.0 cannot be raised to a negative power",
        ));
    }
    if a < 0.0 && b.is_finite() && b.fract() != 0.0 {
        return Err(NumbasError::value_error(
            "negative number cannot be raised to a fractional power",
        ));
    }
    let result = a.powf(b);
    if result.is_infinite() && a.is_finite() && b.is_finite() {
        return Err(NumbasError::overflow("float power result too large"));
    }
    Ok(result)
}

// =============================================================================
// Generic Dispatch
// =============================================================================

/// Apply a binary operator.
pub fn binary(op: BinOp, a: &Value, b: &Value) -> NumbasResult<Value> {
    if matches!(a, Value::Tuple(_)) || matches!(b, Value::Tuple(_)) {
        return tuple_binary(op, a, b);
    }

    let pair = coerce(a, b)
        .ok_or_else(|| NumbasError::unsupported_operand(op.as_str(), a.type_name(), b.type_name()))?;

    match pair {
        Pair::Int(x, y) => int_binary(op, x, y),
        Pair::Float(x, y) => float_binary(op, x, y, a, b),
    }
}

fn int_binary(op: BinOp, x: i64, y: i64) -> NumbasResult<Value> {
    let v = match op {
        BinOp::Add => x.checked_add(y).ok_or_else(int_overflow)?,
        BinOp::Sub => x.checked_sub(y).ok_or_else(int_overflow)?,
        BinOp::Mult => x.checked_mul(y).ok_or_else(int_overflow)?,
        BinOp::Div => {
            if y == 0 {
                return Err(NumbasError::zero_division("division by zero"));
            }
            return Ok(Value::Float(x as f64 / y as f64));
        }
        BinOp::FloorDiv => floor_div_int(x, y)?,
        BinOp::Mod => mod_int(x, y)?,
        BinOp::Pow => return pow_int(x, y),
        BinOp::LShift => lshift_int(x, y)?,
        BinOp::RShift => rshift_int(x, y)?,
        BinOp::BitOr => x | y,
        BinOp::BitXor => x ^ y,
        BinOp::BitAnd => x & y,
    };
    Ok(Value::Int(v))
}

fn float_binary(op: BinOp, x: f64, y: f64, a: &Value, b: &Value) -> NumbasResult<Value> {
    let v = match op {
        BinOp::Add => x + y,
        BinOp::Sub => x - y,
        BinOp::Mult => x * y,
        BinOp::Div => {
            if y == 0.0 {
                return Err(NumbasError::zero_division("float division by zero"));
            }
            x / y
        }
        BinOp::FloorDiv => floor_div_float(x, y)?,
        BinOp::Mod => mod_float(x, y)?,
        BinOp::Pow => pow_float(x, y)?,
        BinOp::LShift | BinOp::RShift | BinOp::BitOr | BinOp::BitXor | BinOp::BitAnd => {
            return Err(NumbasError::unsupported_operand(
                op.as_str(),
                a.type_name(),
                b.type_name(),
            ));
        }
    };
    Ok(Value::Float(v))
}

fn tuple_binary(op: BinOp, a: &Value, b: &Value) -> NumbasResult<Value> {
    match (op, a, b) {
        (BinOp::Add, Value::Tuple(x), Value::Tuple(y)) => {
            Ok(Value::Tuple(x.iter().chain(y.iter()).cloned().collect()))
        }
        (BinOp::Mult, Value::Tuple(t), n) | (BinOp::Mult, n, Value::Tuple(t))
            if n.as_int().is_some() =>
        {
            // Negative counts repeat zero times.
            let times = n.as_int().and_then(|c| usize::try_from(c).ok()).unwrap_or(0);
            let items: Arc<[Value]> = std::iter::repeat_n(t.iter(), times).flatten().cloned().collect();
            Ok(Value::Tuple(items))
        }
        _ => Err(NumbasError::unsupported_operand(
            op.as_str(),
            a.type_name(),
            b.type_name(),
        )),
    }
}

/// Apply a unary operator.
pub fn unary(op: UnaryOp, v: &Value) -> NumbasResult<Value> {
    match (op, v) {
        (UnaryOp::Not, _) => Ok(Value::Bool(!v.is_truthy())),
        (UnaryOp::USub, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOp::UAdd, Value::Float(f)) => Ok(Value::Float(*f)),
        (UnaryOp::USub, _) if v.as_int().is_some() => v
            .as_int()
            .and_then(i64::checked_neg)
            .map(Value::Int)
            .ok_or_else(int_overflow),
        (UnaryOp::UAdd, _) | (UnaryOp::Invert, _) if v.as_int().is_some() => {
            let i = v.as_int().unwrap_or_default();
            Ok(Value::Int(if op == UnaryOp::Invert { !i } else { i }))
        }
        _ => Err(NumbasError::type_error(format!(
            "bad operand type for unary {}: '{}'",
            op.as_str(),
            v.type_name()
        ))),
    }
}

// =============================================================================
// Comparison
// =============================================================================

/// Apply a comparison operator.
pub fn compare(op: CmpOp, a: &Value, b: &Value) -> NumbasResult<bool> {
    match op {
        CmpOp::Eq => Ok(a == b),
        CmpOp::NotEq => Ok(a != b),
        CmpOp::Is => Ok(a.is_same(b)),
        CmpOp::IsNot => Ok(!a.is_same(b)),
        CmpOp::Lt | CmpOp::LtE | CmpOp::Gt | CmpOp::GtE => {
            let ord = partial_cmp(op, a, b)?;
            Ok(match (op, ord) {
                (_, None) => false,
                (CmpOp::Lt, Some(o)) => o == Ordering::Less,
                (CmpOp::LtE, Some(o)) => o != Ordering::Greater,
                (CmpOp::Gt, Some(o)) => o == Ordering::Greater,
                (_, Some(o)) => o != Ordering::Less,
            })
        }
    }
}

/// Ordering of two values; `None` when unordered (NaN).
fn partial_cmp(op: CmpOp, a: &Value, b: &Value) -> NumbasResult<Option<Ordering>> {
    if let (Value::Tuple(x), Value::Tuple(y)) = (a, b) {
        for (l, r) in x.iter().zip(y.iter()) {
            if l != r {
                return partial_cmp(op, l, r);
            }
        }
        return Ok(Some(x.len().cmp(&y.len())));
    }

    match coerce(a, b) {
        Some(Pair::Int(x, y)) => Ok(Some(x.cmp(&y))),
        Some(Pair::Float(x, y)) => Ok(x.partial_cmp(&y)),
        None => Err(NumbasError::type_error(format!(
            "'{}' not supported between instances of '{}' and '{}'",
            op.as_str(),
            a.type_name(),
            b.type_name()
        ))),
    }
}

// =============================================================================
// Subscript
// =============================================================================

/// `container[index]` for tuples, with negative indices counting from the
/// end.
pub fn subscript(container: &Value, index: &Value) -> NumbasResult<Value> {
    let Value::Tuple(items) = container else {
        return Err(NumbasError::type_error(format!(
            "'{}' object is not subscriptable",
            container.type_name()
        )));
    };
    let i = index.as_int().ok_or_else(|| {
        NumbasError::type_error(format!(
            "tuple indices must be integers, not {}",
            index.type_name()
        ))
    })?;
    let len = items.len() as i64;
    let pos = if i < 0 { i + len } else { i };
    usize::try_from(pos)
        .ok()
        .and_then(|p| items.get(p))
        .cloned()
        .ok_or_else(|| NumbasError::runtime(numbas_core::RuntimeErrorKind::IndexError, "tuple index out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bin(op: BinOp, a: impl Into<Value>, b: impl Into<Value>) -> NumbasResult<Value> {
        binary(op, &a.into(), &b.into())
    }

    #[test]
    fn test_true_division_is_float() {
        assert_eq!(bin(BinOp::Div, 7i64, 2i64).unwrap(), Value::Float(3.5));
        let err = bin(BinOp::Div, 1i64, 0i64).unwrap_err();
        assert!(err.is_kind(numbas_core::RuntimeErrorKind::ZeroDivisionError));
    }

    #[test]
    fn test_floor_semantics() {
        assert_eq!(floor_div_int(-7, 2).unwrap(), -4);
        assert_eq!(floor_div_int(7, -2).unwrap(), -4);
        assert_eq!(mod_int(-7, 2).unwrap(), 1);
        assert_eq!(mod_int(7, -2).unwrap(), -1);
        assert_eq!(mod_int(i64::MIN, -1).unwrap(), 0);
        assert!(floor_div_int(i64::MIN, -1).is_err());
        assert_eq!(mod_float(-7.5, 2.0).unwrap(), 0.5);
        assert_eq!(floor_div_float(-7.5, 2.0).unwrap(), -4.0);
        assert_eq!(floor_div_float(7.0, 2.0).unwrap(), 3.0);
    }

    #[test]
    fn test_overflow_is_an_error() {
        let err = bin(BinOp::Add, i64::MAX, 1i64).unwrap_err();
        assert!(err.is_kind(numbas_core::RuntimeErrorKind::OverflowError));
        assert!(bin(BinOp::Pow, 10i64, 30i64).is_err());
        assert!(bin(BinOp::LShift, 1i64, 63i64).is_err());
        assert_eq!(bin(BinOp::LShift, 1i64, 62i64).unwrap(), Value::Int(1 << 62));
    }

    #[test]
    fn test_power() {
        assert_eq!(bin(BinOp::Pow, 2i64, 10i64).unwrap(), Value::Int(1024));
        assert_eq!(bin(BinOp::Pow, 2i64, -1i64).unwrap(), Value::Float(0.5));
        assert_eq!(bin(BinOp::Pow, -1i64, i64::MAX).unwrap(), Value::Int(-1));
        assert_eq!(bin(BinOp::Pow, 2.0, 0.5).unwrap(), Value::Float(2f64.sqrt()));
        assert!(bin(BinOp::Pow, 0i64, -1i64).is_err());
        assert!(bin(BinOp::Pow, -8.0, 1.0 / 3.0).is_err());
    }

    #[test]
    fn test_mixed_and_bool() {
        assert_eq!(bin(BinOp::Add, true, 1i64).unwrap(), Value::Int(2));
        assert_eq!(bin(BinOp::Mult, 2i64, 1.5).unwrap(), Value::Float(3.0));
        assert!(bin(BinOp::BitAnd, 1.0, 1i64).is_err());
        assert!(bin(BinOp::Add, Value::None, 1i64).is_err());
    }

    #[test]
    fn test_tuples() {
        let t = Value::tuple([Value::Int(1), Value::Int(2)]);
        let doubled = binary(BinOp::Add, &t, &t).unwrap();
        assert_eq!(doubled.to_string(), "(1, 2, 1, 2)");
        assert_eq!(binary(BinOp::Mult, &Value::Int(2), &t).unwrap(), doubled);
        assert!(binary(BinOp::Sub, &t, &t).is_err());
    }

    #[test]
    fn test_unary() {
        assert_eq!(unary(UnaryOp::USub, &Value::Int(3)).unwrap(), Value::Int(-3));
        assert_eq!(unary(UnaryOp::Invert, &Value::Int(0)).unwrap(), Value::Int(-1));
        assert_eq!(unary(UnaryOp::Not, &Value::None).unwrap(), Value::Bool(true));
        assert_eq!(unary(UnaryOp::UAdd, &Value::Bool(true)).unwrap(), Value::Int(1));
        assert!(unary(UnaryOp::USub, &Value::Int(i64::MIN)).is_err());
        assert!(unary(UnaryOp::Invert, &Value::Float(1.0)).is_err());
    }

    #[test]
    fn test_subscript() {
        let t = Value::tuple([Value::Int(10), Value::Int(20), Value::Int(30)]);
        assert_eq!(subscript(&t, &Value::Int(1)).unwrap(), Value::Int(20));
        assert_eq!(subscript(&t, &Value::Int(-1)).unwrap(), Value::Int(30));
        let err = subscript(&t, &Value::Int(3)).unwrap_err();
        assert!(err.is_kind(numbas_core::RuntimeErrorKind::IndexError));
        assert!(subscript(&t, &Value::Int(-4)).is_err());
        assert!(subscript(&Value::Int(1), &Value::Int(0)).is_err());
        assert!(subscript(&t, &Value::Float(0.0)).is_err());
    }

    #[test]
    fn test_compare() {
        assert!(compare(CmpOp::Lt, &Value::Int(1), &Value::Float(1.5)).unwrap());
        assert!(!compare(CmpOp::Lt, &Value::Float(f64::NAN), &Value::Int(0)).unwrap());
        assert!(compare(CmpOp::Is, &Value::None, &Value::None).unwrap());
        assert!(compare(CmpOp::GtE, &Value::Int(2), &Value::Int(2)).unwrap());
        let a = Value::tuple([Value::Int(1), Value::Int(2)]);
        let b = Value::tuple([Value::Int(1), Value::Int(3)]);
        assert!(compare(CmpOp::Lt, &a, &b).unwrap());
        assert!(compare(CmpOp::Lt, &Value::tuple([Value::Int(1)]), &a).unwrap());
        let err = compare(CmpOp::Lt, &Value::None, &Value::Int(1)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "TypeError: '<' not supported between instances of 'NoneType' and 'int'"
        );
    }
}
