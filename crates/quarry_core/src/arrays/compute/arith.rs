use quarry_error::{EngineError, Result};

use crate::arrays::datatype::IntervalUnit;
use crate::arrays::scalar::{IntervalScalar, ScalarValue, TimestampScalar};

/// Numeric operands widened to a common representation.
enum Widened {
    Int(i64, i64),
    Float(f64, f64),
}

fn widen(a: &ScalarValue, b: &ScalarValue) -> Option<Widened> {
    match (a.to_i64(), b.to_i64()) {
        (Some(x), Some(y)) => return Some(Widened::Int(x, y)),
        _ => (),
    }
    match (a.to_f64(), b.to_f64()) {
        (Some(x), Some(y)) => Some(Widened::Float(x, y)),
        _ => None,
    }
}

fn arith_unsupported(op: &str, a: &ScalarValue, b: &ScalarValue) -> EngineError {
    EngineError::unsupported_type(format!(
        "cannot {op} {} and {}",
        a.datatype(),
        b.datatype()
    ))
}

pub fn add_scalars(a: &ScalarValue, b: &ScalarValue) -> Result<ScalarValue> {
    if a.is_null() || b.is_null() {
        return Ok(ScalarValue::Null);
    }
    match (a, b) {
        (ScalarValue::Utf8(x), ScalarValue::Utf8(y)) => {
            return Ok(ScalarValue::Utf8(format!("{x}{y}")));
        }
        (ScalarValue::Timestamp(ts), ScalarValue::Interval(iv))
        | (ScalarValue::Interval(iv), ScalarValue::Timestamp(ts)) => {
            return Ok(ScalarValue::Timestamp(TimestampScalar {
                value: ts.value + iv.nanos,
                timezone: ts.timezone.clone(),
            }));
        }
        (ScalarValue::Interval(x), ScalarValue::Interval(y)) => {
            return Ok(ScalarValue::Interval(IntervalScalar {
                nanos: x.nanos + y.nanos,
                unit: x.unit,
            }));
        }
        _ => (),
    }
    match widen(a, b) {
        Some(Widened::Int(x, y)) => Ok(ScalarValue::Int64(x + y)),
        Some(Widened::Float(x, y)) => Ok(ScalarValue::Float64(x + y)),
        None => Err(arith_unsupported("add", a, b)),
    }
}

pub fn sub_scalars(a: &ScalarValue, b: &ScalarValue) -> Result<ScalarValue> {
    if a.is_null() || b.is_null() {
        return Ok(ScalarValue::Null);
    }
    match (a, b) {
        (ScalarValue::Timestamp(x), ScalarValue::Timestamp(y)) => {
            return Ok(ScalarValue::Interval(IntervalScalar {
                nanos: x.value - y.value,
                unit: IntervalUnit::Nanosecond,
            }));
        }
        (ScalarValue::Timestamp(ts), ScalarValue::Interval(iv)) => {
            return Ok(ScalarValue::Timestamp(TimestampScalar {
                value: ts.value - iv.nanos,
                timezone: ts.timezone.clone(),
            }));
        }
        (ScalarValue::Interval(x), ScalarValue::Interval(y)) => {
            return Ok(ScalarValue::Interval(IntervalScalar {
                nanos: x.nanos - y.nanos,
                unit: x.unit,
            }));
        }
        _ => (),
    }
    match widen(a, b) {
        Some(Widened::Int(x, y)) => Ok(ScalarValue::Int64(x - y)),
        Some(Widened::Float(x, y)) => Ok(ScalarValue::Float64(x - y)),
        None => Err(arith_unsupported("subtract", a, b)),
    }
}

pub fn mul_scalars(a: &ScalarValue, b: &ScalarValue) -> Result<ScalarValue> {
    if a.is_null() || b.is_null() {
        return Ok(ScalarValue::Null);
    }
    // String repetition mirrors python's `str * int`.
    match (a, b) {
        (ScalarValue::Utf8(s), other) | (other, ScalarValue::Utf8(s)) => {
            if let Some(n) = other.to_i64() {
                let n = usize::try_from(n).unwrap_or(0);
                return Ok(ScalarValue::Utf8(s.repeat(n)));
            }
        }
        _ => (),
    }
    match widen(a, b) {
        Some(Widened::Int(x, y)) => Ok(ScalarValue::Int64(x * y)),
        Some(Widened::Float(x, y)) => Ok(ScalarValue::Float64(x * y)),
        None => Err(arith_unsupported("multiply", a, b)),
    }
}

/// True division: integer operands widen to float.
pub fn div_scalars(a: &ScalarValue, b: &ScalarValue) -> Result<ScalarValue> {
    if a.is_null() || b.is_null() {
        return Ok(ScalarValue::Null);
    }
    match widen(a, b) {
        Some(Widened::Int(x, y)) => Ok(ScalarValue::Float64(x as f64 / y as f64)),
        Some(Widened::Float(x, y)) => Ok(ScalarValue::Float64(x / y)),
        None => Err(arith_unsupported("divide", a, b)),
    }
}

pub fn rem_scalars(a: &ScalarValue, b: &ScalarValue) -> Result<ScalarValue> {
    if a.is_null() || b.is_null() {
        return Ok(ScalarValue::Null);
    }
    match widen(a, b) {
        Some(Widened::Int(_, 0)) => Ok(ScalarValue::Null),
        Some(Widened::Int(x, y)) => Ok(ScalarValue::Int64(x.rem_euclid(y))),
        Some(Widened::Float(x, y)) => Ok(ScalarValue::Float64(x.rem_euclid(y))),
        None => Err(arith_unsupported("mod", a, b)),
    }
}

pub fn negate_scalar(a: &ScalarValue) -> Result<ScalarValue> {
    Ok(match a {
        ScalarValue::Null => ScalarValue::Null,
        ScalarValue::Int8(v) => ScalarValue::Int8(-v),
        ScalarValue::Int16(v) => ScalarValue::Int16(-v),
        ScalarValue::Int32(v) => ScalarValue::Int32(-v),
        ScalarValue::Int64(v) => ScalarValue::Int64(-v),
        ScalarValue::Float32(v) => ScalarValue::Float32(-v),
        ScalarValue::Float64(v) => ScalarValue::Float64(-v),
        ScalarValue::Interval(iv) => ScalarValue::Interval(IntervalScalar {
            nanos: -iv.nanos,
            unit: iv.unit,
        }),
        other => {
            return Err(EngineError::unsupported_type(format!(
                "cannot negate {}",
                other.datatype()
            )));
        }
    })
}

/// Apply a float function, preserving null.
pub fn float_unary(a: &ScalarValue, f: impl Fn(f64) -> f64) -> Result<ScalarValue> {
    if a.is_null() {
        return Ok(ScalarValue::Null);
    }
    let value = a.to_f64().ok_or_else(|| {
        EngineError::unsupported_type(format!("expected a numeric value, got {}", a.datatype()))
    })?;
    Ok(ScalarValue::Float64(f(value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_add_stays_integer() {
        let out = add_scalars(&ScalarValue::Int32(1), &ScalarValue::Int64(2)).unwrap();
        assert_eq!(out, ScalarValue::Int64(3));
    }

    #[test]
    fn division_widens_to_float() {
        let out = div_scalars(&ScalarValue::Int64(3), &ScalarValue::Int64(2)).unwrap();
        assert_eq!(out, ScalarValue::Float64(1.5));
    }

    #[test]
    fn string_concat_and_repeat() {
        let out = add_scalars(&ScalarValue::from("ab"), &ScalarValue::from("cd")).unwrap();
        assert_eq!(out, ScalarValue::from("abcd"));

        let out = mul_scalars(&ScalarValue::from("ab"), &ScalarValue::Int64(3)).unwrap();
        assert_eq!(out, ScalarValue::from("ababab"));
    }

    #[test]
    fn timestamp_interval_arith() {
        let ts = ScalarValue::Timestamp(TimestampScalar::new(1_000));
        let iv = ScalarValue::Interval(IntervalScalar::new(1, IntervalUnit::Microsecond));
        let out = add_scalars(&ts, &iv).unwrap();
        assert_eq!(out, ScalarValue::Timestamp(TimestampScalar::new(2_000)));

        let diff = sub_scalars(
            &ScalarValue::Timestamp(TimestampScalar::new(5_000)),
            &ScalarValue::Timestamp(TimestampScalar::new(2_000)),
        )
        .unwrap();
        assert_eq!(
            diff,
            ScalarValue::Interval(IntervalScalar {
                nanos: 3_000,
                unit: IntervalUnit::Nanosecond
            })
        );
    }

    #[test]
    fn null_propagates() {
        let out = add_scalars(&ScalarValue::Null, &ScalarValue::Int64(1)).unwrap();
        assert_eq!(out, ScalarValue::Null);
    }
}
