use quarry_error::{EngineError, Result};

use super::Computed;
use crate::arrays::column::Column;
use crate::arrays::scalar::ScalarValue;

/// Row-wise conditional selection over a boolean column.
///
/// A null condition row selects the false branch, matching
/// `Series.where(cond, other)` semantics. Branches may be scalars, which
/// broadcast to the condition's length.
pub fn select(cond: &Column, truthy: &Computed, falsy: &Computed) -> Result<Column> {
    let rows = cond.len();
    for operand in [truthy, falsy] {
        if let Some(len) = operand.len() {
            if len != rows {
                return Err(EngineError::shape_mismatch(format!(
                    "conditional branch has {len} rows, condition has {rows}"
                )));
            }
        }
    }
    let mask = cond.as_bool_mask()?;
    let values = (0..rows).map(|row| {
        if mask[row] {
            truthy.value_at(row)
        } else {
            falsy.value_at(row)
        }
    });
    Column::from_values_inferred(values)
}

/// The broadcast length implied by a heterogeneous operand list: the
/// length shared by every columnar operand, `None` when all operands are
/// scalars. Disagreeing columnar lengths are a shape error.
pub fn final_size(operands: &[Computed]) -> Result<Option<usize>> {
    let mut size: Option<usize> = None;
    for operand in operands {
        if let Some(len) = operand.len() {
            match size {
                Some(existing) if existing != len => {
                    return Err(EngineError::shape_mismatch(format!(
                        "row-wise operands disagree in length: {existing} vs {len}"
                    )));
                }
                _ => size = Some(len),
            }
        }
    }
    Ok(size)
}

/// Fold a row-wise combining function across a heterogeneous operand
/// list, broadcasting scalar operands to the final size.
pub fn row_reduce<F>(operands: &[Computed], f: F) -> Result<Computed>
where
    F: Fn(&ScalarValue, &ScalarValue) -> Result<ScalarValue>,
{
    if operands.is_empty() {
        return Err(EngineError::internal("row-wise reduction of zero operands"));
    }
    match final_size(operands)? {
        None => {
            let mut acc = operands[0].value_at(0);
            for operand in &operands[1..] {
                acc = f(&acc, &operand.value_at(0))?;
            }
            Ok(Computed::Scalar(acc))
        }
        Some(rows) => {
            let values = (0..rows)
                .map(|row| {
                    let mut acc = operands[0].value_at(row);
                    for operand in &operands[1..] {
                        acc = f(&acc, &operand.value_at(row))?;
                    }
                    Ok(acc)
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Computed::Column(Column::from_values_inferred(values)?))
        }
    }
}

/// First non-null of two values.
pub fn coalesce_scalars(a: &ScalarValue, b: &ScalarValue) -> Result<ScalarValue> {
    Ok(if a.is_null() { b.clone() } else { a.clone() })
}

/// Larger of two values; null poisons the row.
pub fn greatest_scalars(a: &ScalarValue, b: &ScalarValue) -> Result<ScalarValue> {
    Ok(match super::compare_scalars(a, b)? {
        Some(std::cmp::Ordering::Less) => b.clone(),
        Some(_) => a.clone(),
        None => ScalarValue::Null,
    })
}

/// Smaller of two values; null poisons the row.
pub fn least_scalars(a: &ScalarValue, b: &ScalarValue) -> Result<ScalarValue> {
    Ok(match super::compare_scalars(a, b)? {
        Some(std::cmp::Ordering::Greater) => b.clone(),
        Some(_) => a.clone(),
        None => ScalarValue::Null,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_with_null_condition_rows() {
        let cond = Column::Boolean(vec![Some(true), None, Some(false)]);
        let truthy = Computed::Column(Column::int64s(&[1, 2, 3]));
        let falsy = Computed::Scalar(ScalarValue::Int64(9));
        let out = select(&cond, &truthy, &falsy).unwrap();
        assert_eq!(out, Column::int64s(&[1, 9, 9]));
    }

    #[test]
    fn row_reduce_broadcasts_scalars() {
        let operands = vec![
            Computed::Column(Column::int64s(&[1, 5, 3])),
            Computed::Scalar(ScalarValue::Int64(4)),
        ];
        let out = row_reduce(&operands, greatest_scalars).unwrap();
        assert_eq!(out, Computed::Column(Column::int64s(&[4, 5, 4])));
    }

    #[test]
    fn mismatched_operand_lengths_rejected() {
        let operands = vec![
            Computed::Column(Column::int64s(&[1, 2])),
            Computed::Column(Column::int64s(&[1, 2, 3])),
        ];
        let err = row_reduce(&operands, coalesce_scalars).unwrap_err();
        assert_eq!(err.kind(), quarry_error::ErrorKind::ShapeMismatch);
    }

    #[test]
    fn all_scalar_operands_stay_scalar() {
        let operands = vec![
            Computed::Scalar(ScalarValue::Null),
            Computed::Scalar(ScalarValue::Int64(2)),
        ];
        let out = row_reduce(&operands, coalesce_scalars).unwrap();
        assert_eq!(out, Computed::Scalar(ScalarValue::Int64(2)));
    }
}
