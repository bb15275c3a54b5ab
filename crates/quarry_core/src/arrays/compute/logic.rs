use quarry_error::{EngineError, Result};

use crate::arrays::scalar::ScalarValue;

fn expect_bool(v: &ScalarValue) -> Result<Option<bool>> {
    match v {
        ScalarValue::Null => Ok(None),
        ScalarValue::Boolean(b) => Ok(Some(*b)),
        other => Err(EngineError::unsupported_type(format!(
            "expected a boolean operand, got {}",
            other.datatype()
        ))),
    }
}

/// Three-valued AND.
pub fn and_scalars(a: &ScalarValue, b: &ScalarValue) -> Result<ScalarValue> {
    Ok(match (expect_bool(a)?, expect_bool(b)?) {
        (Some(false), _) | (_, Some(false)) => ScalarValue::Boolean(false),
        (Some(true), Some(true)) => ScalarValue::Boolean(true),
        _ => ScalarValue::Null,
    })
}

/// Three-valued OR.
pub fn or_scalars(a: &ScalarValue, b: &ScalarValue) -> Result<ScalarValue> {
    Ok(match (expect_bool(a)?, expect_bool(b)?) {
        (Some(true), _) | (_, Some(true)) => ScalarValue::Boolean(true),
        (Some(false), Some(false)) => ScalarValue::Boolean(false),
        _ => ScalarValue::Null,
    })
}

pub fn not_scalar(a: &ScalarValue) -> Result<ScalarValue> {
    Ok(match expect_bool(a)? {
        Some(b) => ScalarValue::Boolean(!b),
        None => ScalarValue::Null,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_valued_logic() {
        let t = ScalarValue::Boolean(true);
        let f = ScalarValue::Boolean(false);
        let n = ScalarValue::Null;

        assert_eq!(and_scalars(&f, &n).unwrap(), ScalarValue::Boolean(false));
        assert_eq!(and_scalars(&t, &n).unwrap(), ScalarValue::Null);
        assert_eq!(or_scalars(&t, &n).unwrap(), ScalarValue::Boolean(true));
        assert_eq!(or_scalars(&f, &n).unwrap(), ScalarValue::Null);
        assert_eq!(not_scalar(&n).unwrap(), ScalarValue::Null);
    }
}
