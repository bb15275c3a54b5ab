//! Element-wise and reduction kernels over columns.
//!
//! The interpreter proper only decides which kernel to call and how to
//! combine results; the bodies here are deliberately simple scalar loops
//! lifted over columns with scalar broadcast.

pub mod arith;
pub mod cmp;
pub mod logic;
pub mod reduce;
pub mod select;

pub use arith::*;
pub use cmp::*;
pub use logic::*;
pub use reduce::*;
pub use select::*;

use quarry_error::{EngineError, Result};

use crate::arrays::column::Column;
use crate::arrays::scalar::ScalarValue;

/// The result of a lifted kernel: columnar when any input was columnar.
#[derive(Debug, Clone, PartialEq)]
pub enum Computed {
    Scalar(ScalarValue),
    Column(Column),
}

impl Computed {
    pub fn len(&self) -> Option<usize> {
        match self {
            Computed::Scalar(_) => None,
            Computed::Column(col) => Some(col.len()),
        }
    }

    /// Read the value at `row`, broadcasting scalars.
    pub fn value_at(&self, row: usize) -> ScalarValue {
        match self {
            Computed::Scalar(v) => v.clone(),
            Computed::Column(col) => col.get(row).unwrap_or(ScalarValue::Null),
        }
    }
}

/// Lift an element kernel over two operands, broadcasting a scalar
/// against a column. Column operands must agree in length.
pub fn binary_elementwise<F>(left: &Computed, right: &Computed, f: F) -> Result<Computed>
where
    F: Fn(&ScalarValue, &ScalarValue) -> Result<ScalarValue>,
{
    match (left.len(), right.len()) {
        (None, None) => Ok(Computed::Scalar(f(&left.value_at(0), &right.value_at(0))?)),
        (a, b) => {
            let rows = match (a, b) {
                (Some(a), Some(b)) if a != b => {
                    return Err(EngineError::shape_mismatch(format!(
                        "column lengths differ: {a} vs {b}"
                    )));
                }
                (Some(a), _) => a,
                (_, Some(b)) => b,
                (None, None) => unreachable!("scalar case handled above"),
            };
            let values = (0..rows)
                .map(|row| f(&left.value_at(row), &right.value_at(row)))
                .collect::<Result<Vec<_>>>()?;
            Ok(Computed::Column(Column::from_values_inferred(values)?))
        }
    }
}

/// Lift an element kernel over one operand.
pub fn unary_elementwise<F>(operand: &Computed, f: F) -> Result<Computed>
where
    F: Fn(&ScalarValue) -> Result<ScalarValue>,
{
    match operand {
        Computed::Scalar(v) => Ok(Computed::Scalar(f(v)?)),
        Computed::Column(col) => {
            let values = col
                .iter_scalars()
                .map(|v| f(&v))
                .collect::<Result<Vec<_>>>()?;
            Ok(Computed::Column(Column::from_values_inferred(values)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_scalar_against_column() {
        let left = Computed::Column(Column::int64s(&[1, 2, 3]));
        let right = Computed::Scalar(ScalarValue::Int64(10));
        let out = binary_elementwise(&left, &right, add_scalars).unwrap();
        assert_eq!(out, Computed::Column(Column::int64s(&[11, 12, 13])));
    }

    #[test]
    fn length_mismatch_is_shape_error() {
        let left = Computed::Column(Column::int64s(&[1, 2, 3]));
        let right = Computed::Column(Column::int64s(&[1, 2]));
        let err = binary_elementwise(&left, &right, add_scalars).unwrap_err();
        assert_eq!(err.kind(), quarry_error::ErrorKind::ShapeMismatch);
    }
}
