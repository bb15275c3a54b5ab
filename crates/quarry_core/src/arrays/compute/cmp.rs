use std::cmp::Ordering;

use quarry_error::{EngineError, Result};

use crate::arrays::scalar::ScalarValue;

/// Compare two scalars, `None` when either side is null.
///
/// Numerics compare across widths; everything else compares within its
/// own type.
pub fn compare_scalars(a: &ScalarValue, b: &ScalarValue) -> Result<Option<Ordering>> {
    if a.is_null() || b.is_null() {
        return Ok(None);
    }
    let ord = match (a, b) {
        (ScalarValue::Boolean(x), ScalarValue::Boolean(y)) => x.cmp(y),
        (ScalarValue::Utf8(x), ScalarValue::Utf8(y)) => x.cmp(y),
        (ScalarValue::Timestamp(x), ScalarValue::Timestamp(y)) => x.value.cmp(&y.value),
        (ScalarValue::Date(x), ScalarValue::Date(y)) => x.cmp(y),
        (ScalarValue::Interval(x), ScalarValue::Interval(y)) => x.nanos.cmp(&y.nanos),
        _ => match (a.to_i64(), b.to_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => match (a.to_f64(), b.to_f64()) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                _ => {
                    return Err(EngineError::unsupported_type(format!(
                        "cannot compare {} and {}",
                        a.datatype(),
                        b.datatype()
                    )));
                }
            },
        },
    };
    Ok(Some(ord))
}

fn cmp_kernel(
    a: &ScalarValue,
    b: &ScalarValue,
    f: impl Fn(Ordering) -> bool,
) -> Result<ScalarValue> {
    Ok(match compare_scalars(a, b)? {
        Some(ord) => ScalarValue::Boolean(f(ord)),
        None => ScalarValue::Null,
    })
}

pub fn eq_scalars(a: &ScalarValue, b: &ScalarValue) -> Result<ScalarValue> {
    cmp_kernel(a, b, |ord| ord == Ordering::Equal)
}

pub fn neq_scalars(a: &ScalarValue, b: &ScalarValue) -> Result<ScalarValue> {
    cmp_kernel(a, b, |ord| ord != Ordering::Equal)
}

pub fn lt_scalars(a: &ScalarValue, b: &ScalarValue) -> Result<ScalarValue> {
    cmp_kernel(a, b, |ord| ord == Ordering::Less)
}

pub fn lteq_scalars(a: &ScalarValue, b: &ScalarValue) -> Result<ScalarValue> {
    cmp_kernel(a, b, |ord| ord != Ordering::Greater)
}

pub fn gt_scalars(a: &ScalarValue, b: &ScalarValue) -> Result<ScalarValue> {
    cmp_kernel(a, b, |ord| ord == Ordering::Greater)
}

pub fn gteq_scalars(a: &ScalarValue, b: &ScalarValue) -> Result<ScalarValue> {
    cmp_kernel(a, b, |ord| ord != Ordering::Less)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cross_width_numeric_compare() {
        let out = lt_scalars(&ScalarValue::Int8(1), &ScalarValue::Float64(1.5)).unwrap();
        assert_eq!(out, ScalarValue::Boolean(true));
    }

    #[test]
    fn null_compare_is_null() {
        let out = eq_scalars(&ScalarValue::Null, &ScalarValue::Int64(1)).unwrap();
        assert_eq!(out, ScalarValue::Null);
    }

    #[test]
    fn incomparable_types_error() {
        let err = lt_scalars(&ScalarValue::from("a"), &ScalarValue::Int64(1)).unwrap_err();
        assert_eq!(err.kind(), quarry_error::ErrorKind::UnsupportedType);
    }
}
