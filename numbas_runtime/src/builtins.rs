//! Builtin functions and the `math` module.
//!
//! The table is built once and shared. Every entry is pure, so a compiler
//! may fold calls whose arguments are constants.

use crate::callable::NativeFunction;
use crate::class::Class;
use crate::object::Object;
use crate::ops;
use crate::scope::Scope;
use crate::value::Value;
use numbas_core::{NumbasError, NumbasResult};
use numbas_parser::{BinOp, CmpOp};
use rustc_hash::FxHashMap;
use std::sync::{Arc, OnceLock};

static BUILTINS: OnceLock<FxHashMap<&'static str, Value>> = OnceLock::new();

/// Look up a builtin by name.
#[must_use]
pub fn lookup(name: &str) -> Option<Value> {
    table().get(name).cloned()
}

/// Names of all builtins, sorted.
#[must_use]
pub fn names() -> Vec<&'static str> {
    let mut names: Vec<_> = table().keys().copied().collect();
    names.sort_unstable();
    names
}

fn table() -> &'static FxHashMap<&'static str, Value> {
    BUILTINS.get_or_init(|| {
        let mut t = FxHashMap::default();
        let mut add = |name: &'static str, min: usize, max: usize, f: fn(&[Value]) -> NumbasResult<Value>| {
            t.insert(name, NativeFunction::new(name, min, max, f).pure().into_value());
        };

        add("abs", 1, 1, |a| abs(&a[0]));
        add("min", 1, usize::MAX, |a| extremum(a, "min", CmpOp::Lt));
        add("max", 1, usize::MAX, |a| extremum(a, "max", CmpOp::Gt));
        add("int", 1, 1, |a| to_int(&a[0]));
        add("float", 1, 1, |a| Ok(Value::Float(a[0].expect_float("float() argument")?)));
        add("bool", 1, 1, |a| Ok(Value::Bool(a[0].is_truthy())));
        add("len", 1, 1, |a| match &a[0] {
            Value::Tuple(items) => Ok(Value::Int(items.len() as i64)),
            other => Err(NumbasError::type_error(format!(
                "object of type '{}' has no len()",
                other.type_name()
            ))),
        });
        add("range", 1, 3, range);
        add("sum", 1, 2, |a| {
            let start = a.get(1).cloned().unwrap_or(Value::Int(0));
            iterate(&a[0])?
                .iter()
                .try_fold(start, |acc, x| ops::binary(BinOp::Add, &acc, x))
        });
        add("pow", 2, 2, |a| ops::binary(BinOp::Pow, &a[0], &a[1]));
        add("round", 1, 2, round);

        t.insert("math", Value::Object(math_module()));
        t
    })
}

// =============================================================================
// Helpers
// =============================================================================

/// Elements of a tuple argument.
pub fn iterate(v: &Value) -> NumbasResult<Arc<[Value]>> {
    match v {
        Value::Tuple(items) => Ok(Arc::clone(items)),
        other => Err(NumbasError::type_error(format!(
            "'{}' object is not iterable",
            other.type_name()
        ))),
    }
}

/// Number of steps in `range(start, stop, step)`.
pub fn range_len(start: i64, stop: i64, step: i64) -> NumbasResult<i64> {
    if step == 0 {
        return Err(NumbasError::value_error("range() arg 3 must not be zero"));
    }
    let (lo, hi, step) = if step > 0 {
        (i128::from(start), i128::from(stop), i128::from(step))
    } else {
        (i128::from(stop), i128::from(start), -i128::from(step))
    };
    if lo >= hi {
        return Ok(0);
    }
    i64::try_from((hi - lo + step - 1) / step).map_err(|_| NumbasError::overflow("range too large"))
}

/// Decode `range` arguments into `(start, stop, step)`.
pub fn range_args(args: &[Value]) -> NumbasResult<(i64, i64, i64)> {
    let ints: Vec<i64> = args
        .iter()
        .map(|a| a.expect_int("range() argument"))
        .collect::<NumbasResult<_>>()?;
    match ints.as_slice() {
        [stop] => Ok((0, *stop, 1)),
        [start, stop] => Ok((*start, *stop, 1)),
        [start, stop, step] => Ok((*start, *stop, *step)),
        _ => Err(NumbasError::type_error("range expected 1 to 3 arguments")),
    }
}

/// Upper bound on a materialized range. Loops over `range` do not
/// materialize and have no such limit.
const MAX_RANGE_LEN: i64 = 1 << 24;

fn range(args: &[Value]) -> NumbasResult<Value> {
    let (start, stop, step) = range_args(args)?;
    let len = range_len(start, stop, step)?;
    if len > MAX_RANGE_LEN {
        return Err(NumbasError::overflow("range too large to materialize"));
    }
    Ok(Value::tuple(
        (0..len).map(|i| Value::Int(start + i * step)),
    ))
}

fn abs(v: &Value) -> NumbasResult<Value> {
    match v {
        Value::Float(f) => Ok(Value::Float(f.abs())),
        other => match other.as_int() {
            Some(i) => i
                .checked_abs()
                .map(Value::Int)
                .ok_or_else(|| NumbasError::overflow("integer result out of range")),
            None => Err(NumbasError::type_error(format!(
                "bad operand type for abs(): '{}'",
                other.type_name()
            ))),
        },
    }
}

fn extremum(args: &[Value], name: &str, better: CmpOp) -> NumbasResult<Value> {
    let items = if let [single] = args {
        iterate(single)?
    } else {
        Arc::from(args)
    };
    let mut iter = items.iter();
    let mut best = iter
        .next()
        .cloned()
        .ok_or_else(|| NumbasError::value_error(format!("{}() arg is an empty sequence", name)))?;
    for item in iter {
        if ops::compare(better, item, &best)? {
            best = item.clone();
        }
    }
    Ok(best)
}

fn to_int(v: &Value) -> NumbasResult<Value> {
    match v {
        Value::Float(f) if f.is_nan() => Err(NumbasError::value_error(
            "cannot convert float NaN to integer",
        )),
        Value::Float(f) if f.is_infinite() => Err(NumbasError::overflow(
            "cannot convert float infinity to integer",
        )),
        Value::Float(f) => {
            let t = f.trunc();
            if t < -(2f64.powi(63)) || t >= 2f64.powi(63) {
                return Err(NumbasError::overflow("int too large to convert"));
            }
            Ok(Value::Int(t as i64))
        }
        other => other.expect_int("int() argument").map(Value::Int),
    }
}

fn round(args: &[Value]) -> NumbasResult<Value> {
    let x = &args[0];
    match args.get(1) {
        None | Some(Value::None) => match x {
            Value::Float(f) => to_int(&Value::Float(f.round_ties_even())),
            other => other.expect_int("round() argument").map(Value::Int),
        },
        Some(ndigits) => {
            let n = ndigits.expect_int("ndigits")?;
            match x {
                Value::Float(f) => {
                    let scale = 10f64.powi(i32::try_from(n).unwrap_or(if n < 0 { -400 } else { 400 }));
                    let r = (f * scale).round_ties_even() / scale;
                    Ok(Value::Float(if r.is_finite() { r } else { *f }))
                }
                other => round_int(other.expect_int("round() argument")?, n).map(Value::Int),
            }
        }
    }
}

/// `round(i, n)` for an int: a no-op for `n >= 0`, otherwise the nearest
/// multiple of `10**-n`, ties to even.
fn round_int(i: i64, n: i64) -> NumbasResult<i64> {
    if n >= 0 {
        return Ok(i);
    }
    // 10**20 exceeds twice any i64, so every larger scale rounds to 0.
    let scale = 10i128.pow(n.unsigned_abs().min(20) as u32);
    let (q, r) = (i128::from(i).div_euclid(scale), i128::from(i).rem_euclid(scale));
    let q = if 2 * r > scale || (2 * r == scale && q % 2 != 0) { q + 1 } else { q };
    i64::try_from(q * scale).map_err(|_| NumbasError::overflow("int too large to round"))
}

// =============================================================================
// math
// =============================================================================

static MATH: OnceLock<Arc<Object>> = OnceLock::new();

/// The `math` module object.
#[must_use]
pub fn math_module() -> Arc<Object> {
    Arc::clone(MATH.get_or_init(|| {
        let class = Class::new("module", Scope::new("math"));
        let unary = |name: &'static str, f: fn(f64) -> f64| {
            (name, NativeFunction::new(name, 1, 1, move |a| {
                Ok(Value::Float(f(a[0].expect_float("must be real number")?)))
            }).pure().into_value())
        };
        let domain = |name: &'static str, ok: fn(f64) -> bool, f: fn(f64) -> f64| {
            (name, NativeFunction::new(name, 1, 1, move |a| {
                let x = a[0].expect_float("must be real number")?;
                if !ok(x) {
                    return Err(NumbasError::value_error("math domain error"));
                }
                Ok(Value::Float(f(x)))
            }).pure().into_value())
        };
        let rounding = |name: &'static str, f: fn(f64) -> f64| {
            (name, NativeFunction::new(name, 1, 1, move |a| match &a[0] {
                Value::Float(x) => to_int(&Value::Float(f(*x))),
                other => other.expect_int("must be real number").map(Value::Int),
            }).pure().into_value())
        };

        let mut attrs = vec![
            ("pi", Value::Float(std::f64::consts::PI)),
            ("e", Value::Float(std::f64::consts::E)),
            ("tau", Value::Float(std::f64::consts::TAU)),
            ("inf", Value::Float(f64::INFINITY)),
            ("nan", Value::Float(f64::NAN)),
            unary("exp", f64::exp),
            unary("sin", f64::sin),
            unary("cos", f64::cos),
            unary("tan", f64::tan),
            unary("atan", f64::atan),
            unary("tanh", f64::tanh),
            unary("fabs", f64::abs),
            domain("sqrt", |x| x >= 0.0 || x.is_nan(), f64::sqrt),
            domain("log10", |x| x > 0.0 || x.is_nan(), f64::log10),
            domain("log2", |x| x > 0.0 || x.is_nan(), f64::log2),
            domain("asin", |x| (-1.0..=1.0).contains(&x) || x.is_nan(), f64::asin),
            domain("acos", |x| (-1.0..=1.0).contains(&x) || x.is_nan(), f64::acos),
            rounding("floor", f64::floor),
            rounding("ceil", f64::ceil),
            rounding("trunc", f64::trunc),
        ];
        attrs.push(("log", NativeFunction::new("log", 1, 2, |a| {
            let x = a[0].expect_float("must be real number")?;
            let base = a.get(1).map(|b| b.expect_float("must be real number")).transpose()?;
            if x <= 0.0 || base.is_some_and(|b| b <= 0.0 || b == 1.0) {
                return Err(NumbasError::value_error("math domain error"));
            }
            Ok(Value::Float(match base {
                Some(b) => x.ln() / b.ln(),
                None => x.ln(),
            }))
        }).pure().into_value()));
        attrs.push(("atan2", NativeFunction::new("atan2", 2, 2, |a| {
            let y = a[0].expect_float("must be real number")?;
            let x = a[1].expect_float("must be real number")?;
            Ok(Value::Float(y.atan2(x)))
        }).pure().into_value()));
        attrs.push(("hypot", NativeFunction::new("hypot", 2, 2, |a| {
            let x = a[0].expect_float("must be real number")?;
            let y = a[1].expect_float("must be real number")?;
            Ok(Value::Float(x.hypot(y)))
        }).pure().into_value()));
        attrs.push(("isnan", NativeFunction::new("isnan", 1, 1, |a| {
            Ok(Value::Bool(a[0].expect_float("must be real number")?.is_nan()))
        }).pure().into_value()));
        attrs.push(("isinf", NativeFunction::new("isinf", 1, 1, |a| {
            Ok(Value::Bool(a[0].expect_float("must be real number")?.is_infinite()))
        }).pure().into_value()));

        Object::with_attrs(&class, attrs)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: &[Value]) -> NumbasResult<Value> {
        lookup(name).unwrap().call(args)
    }

    #[test]
    fn test_table_contents() {
        let names = names();
        for expected in ["abs", "len", "math", "max", "min", "range", "sum"] {
            assert!(names.contains(&expected), "missing {}", expected);
        }
        assert!(lookup("print").is_none());
    }

    #[test]
    fn test_abs_min_max() {
        assert_eq!(call("abs", &[Value::Int(-3)]).unwrap(), Value::Int(3));
        assert_eq!(call("abs", &[Value::Float(-2.5)]).unwrap(), Value::Float(2.5));
        assert!(call("abs", &[Value::Int(i64::MIN)]).is_err());
        assert_eq!(
            call("min", &[Value::Int(3), Value::Float(1.5), Value::Int(2)]).unwrap(),
            Value::Float(1.5)
        );
        let t = Value::tuple([Value::Int(4), Value::Int(9)]);
        assert_eq!(call("max", &[t]).unwrap(), Value::Int(9));
        assert!(call("max", &[Value::tuple([])]).is_err());
    }

    #[test]
    fn test_range_and_sum() {
        let r = call("range", &[Value::Int(1), Value::Int(10), Value::Int(3)]).unwrap();
        assert_eq!(r.to_string(), "(1, 4, 7)");
        assert_eq!(call("sum", &[r]).unwrap(), Value::Int(12));
        assert_eq!(range_len(10, 0, -3).unwrap(), 4);
        assert_eq!(range_len(0, 0, 1).unwrap(), 0);
        assert!(range_len(0, 1, 0).is_err());
    }

    #[test]
    fn test_conversions() {
        assert_eq!(call("int", &[Value::Float(-2.7)]).unwrap(), Value::Int(-2));
        assert!(call("int", &[Value::Float(f64::NAN)]).is_err());
        assert_eq!(call("float", &[Value::Int(2)]).unwrap(), Value::Float(2.0));
        assert_eq!(call("round", &[Value::Float(2.5)]).unwrap(), Value::Int(2));
        assert_eq!(call("round", &[Value::Float(3.5)]).unwrap(), Value::Int(4));
        assert_eq!(
            call("round", &[Value::Float(1.25), Value::Int(1)]).unwrap(),
            Value::Float(1.2)
        );
    }

    #[test]
    fn test_round_int_negative_ndigits() {
        let round = |i: i64, n: i64| call("round", &[Value::Int(i), Value::Int(n)]).unwrap();
        assert!(round(1234, -2).is_same(&Value::Int(1200)));
        assert!(round(1250, -2).is_same(&Value::Int(1200)));
        assert!(round(1350, -2).is_same(&Value::Int(1400)));
        assert!(round(-1251, -2).is_same(&Value::Int(-1300)));
        assert!(round(-1250, -2).is_same(&Value::Int(-1200)));
        assert!(round(1234, 3).is_same(&Value::Int(1234)));
        assert!(round(i64::MAX, -40).is_same(&Value::Int(0)));

        let err = call("round", &[Value::Int(i64::MAX), Value::Int(-1)]).unwrap_err();
        assert!(err.is_kind(numbas_core::RuntimeErrorKind::OverflowError));
    }

    #[test]
    fn test_math_module() {
        let math = math_module();
        assert!(Arc::ptr_eq(&math, &math_module()));
        let sqrt = math.get_attr("sqrt").unwrap();
        assert_eq!(sqrt.call(&[Value::Int(9)]).unwrap(), Value::Float(3.0));
        let err = sqrt.call(&[Value::Float(-1.0)]).unwrap_err();
        assert_eq!(err.to_string(), "ValueError: math domain error");
        assert_eq!(
            math.call_method("floor", &[Value::Float(-0.5)]).unwrap(),
            Value::Int(-1)
        );
        assert_eq!(
            math.call_method("log", &[Value::Float(1.0)]).unwrap(),
            Value::Float(0.0)
        );
        assert!(math.call_method("log", &[Value::Int(0)]).is_err());
    }
}
