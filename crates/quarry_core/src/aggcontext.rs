//! Aggregation context strategies.
//!
//! The same logical reduction produces differently shaped results
//! depending on where it sits in the tree. The evaluator selects a
//! strategy from the aggregation's structural position and threads it
//! through recursive calls; reduction handlers only ever call
//! [`AggregationContext::agg`] and stay shape-agnostic.

use std::fmt;
use std::sync::Arc;

use quarry_error::{EngineError, Result};

use crate::arrays::column::Column;
use crate::arrays::compute::Reducer;
use crate::arrays::groupby::GroupedColumn;
use crate::arrays::scalar::ScalarValue;
use crate::value::Value;

/// Input to a reduction: plain or grouped columnar data.
#[derive(Debug, Clone, Copy)]
pub enum AggInput<'a> {
    Series(&'a Column),
    Grouped(&'a GroupedColumn),
}

pub trait AggregationContext: fmt::Debug {
    /// Apply a named reduction, optionally restricted to rows where
    /// `mask` is true. The mask is aligned to the input's original row
    /// order.
    fn agg(&self, data: AggInput<'_>, reducer: &Reducer, mask: Option<&[bool]>) -> Result<Value>;
}

pub type AggContextRef = Arc<dyn AggregationContext>;

fn check_mask(len: usize, mask: Option<&[bool]>) -> Result<()> {
    if let Some(mask) = mask {
        if mask.len() != len {
            return Err(EngineError::shape_mismatch(format!(
                "reduction mask has {} rows, data has {len}",
                mask.len()
            )));
        }
    }
    Ok(())
}

fn masked_rows(rows: impl Iterator<Item = usize>, mask: Option<&[bool]>) -> Vec<usize> {
    match mask {
        Some(mask) => rows.filter(|&row| mask[row]).collect(),
        None => rows.collect(),
    }
}

/// Reduce each group to one value, group-ordered.
fn reduce_groups(
    grouped: &GroupedColumn,
    reducer: &Reducer,
    mask: Option<&[bool]>,
) -> Result<Column> {
    check_mask(grouped.column.len(), mask)?;
    let values = grouped
        .grouping
        .group_rows()
        .into_iter()
        .map(|rows| {
            let rows = masked_rows(rows.into_iter(), mask);
            reducer.apply(&grouped.column, &rows)
        })
        .collect::<Result<Vec<_>>>()?;
    Column::from_values_inferred(values)
}

/// Reduce the whole input to one scalar; grouped input reduces to one
/// value per group.
///
/// This is the strategy for metrics directly under an aggregation node
/// and for top-level reductions.
#[derive(Debug, Clone, Copy)]
pub struct Summarize;

impl AggregationContext for Summarize {
    fn agg(&self, data: AggInput<'_>, reducer: &Reducer, mask: Option<&[bool]>) -> Result<Value> {
        match data {
            AggInput::Series(column) => {
                check_mask(column.len(), mask)?;
                let rows = masked_rows(0..column.len(), mask);
                Ok(Value::Scalar(reducer.apply(column, &rows)?))
            }
            AggInput::Grouped(grouped) => {
                Ok(Value::series(reduce_groups(grouped, reducer, mask)?))
            }
        }
    }
}

/// Reduce per group, then broadcast each group's value back across every
/// member row, preserving the original row order.
///
/// This is the strategy for reductions nested inside row-wise
/// expressions over grouped data, where scalarizing per-group values
/// would be a correctness bug.
#[derive(Debug, Clone, Copy)]
pub struct Transform;

impl AggregationContext for Transform {
    fn agg(&self, data: AggInput<'_>, reducer: &Reducer, mask: Option<&[bool]>) -> Result<Value> {
        match data {
            AggInput::Series(column) => {
                check_mask(column.len(), mask)?;
                let rows = masked_rows(0..column.len(), mask);
                let value = reducer.apply(column, &rows)?;
                Ok(Value::series(Column::repeat(&value, column.len())?))
            }
            AggInput::Grouped(grouped) => {
                let per_group = reduce_groups(grouped, reducer, mask)?;
                Ok(Value::series(grouped.grouping.broadcast(&per_group)?))
            }
        }
    }
}

/// Reduce per row-framed window, one value per row.
///
/// Frames are row-count bounds around each row within its partition (the
/// whole input when ungrouped), in original row order. `None` bounds are
/// unbounded on that side.
#[derive(Debug, Clone, Copy)]
pub struct Windowed {
    pub preceding: Option<usize>,
    pub following: Option<usize>,
}

impl Windowed {
    fn frame_values(
        &self,
        column: &Column,
        member_rows: &[usize],
        reducer: &Reducer,
        mask: Option<&[bool]>,
        out: &mut Vec<(usize, ScalarValue)>,
    ) -> Result<()> {
        for (pos, &row) in member_rows.iter().enumerate() {
            let start = match self.preceding {
                Some(preceding) => pos.saturating_sub(preceding),
                None => 0,
            };
            let end = match self.following {
                Some(following) => (pos + following + 1).min(member_rows.len()),
                None => member_rows.len(),
            };
            let frame = masked_rows(member_rows[start..end].iter().copied(), mask);
            out.push((row, reducer.apply(column, &frame)?));
        }
        Ok(())
    }
}

impl AggregationContext for Windowed {
    fn agg(&self, data: AggInput<'_>, reducer: &Reducer, mask: Option<&[bool]>) -> Result<Value> {
        let mut keyed: Vec<(usize, ScalarValue)> = Vec::new();
        match data {
            AggInput::Series(column) => {
                check_mask(column.len(), mask)?;
                let rows: Vec<usize> = (0..column.len()).collect();
                self.frame_values(column, &rows, reducer, mask, &mut keyed)?;
            }
            AggInput::Grouped(grouped) => {
                check_mask(grouped.column.len(), mask)?;
                for rows in grouped.grouping.group_rows() {
                    self.frame_values(&grouped.column, &rows, reducer, mask, &mut keyed)?;
                }
            }
        }
        keyed.sort_by_key(|(row, _)| *row);
        Column::from_values_inferred(keyed.into_iter().map(|(_, value)| value)).map(Value::series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrays::groupby::Grouping;

    fn grouped(values: &[i64], keys: &[i64]) -> GroupedColumn {
        let grouping = Grouping::from_keys(
            vec![("g".to_string(), Column::int64s(keys))],
            keys.len(),
        )
        .unwrap();
        GroupedColumn::new(Arc::new(Column::int64s(values)), grouping).unwrap()
    }

    #[test]
    fn summarize_series_to_scalar() {
        let col = Column::int64s(&[1, 2, 3]);
        let out = Summarize
            .agg(AggInput::Series(&col), &Reducer::Sum, None)
            .unwrap();
        match out {
            Value::Scalar(ScalarValue::Int64(6)) => (),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn summarize_grouped_to_per_group() {
        let data = grouped(&[1, 2, 3], &[1, 1, 2]);
        let out = Summarize
            .agg(AggInput::Grouped(&data), &Reducer::Count, None)
            .unwrap();
        match out {
            Value::Series(col) => assert_eq!(col.as_ref(), &Column::int64s(&[2, 1])),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn transform_broadcasts_count_in_row_order() {
        let data = grouped(&[1, 2, 3], &[1, 1, 2]);
        let out = Transform
            .agg(AggInput::Grouped(&data), &Reducer::Count, None)
            .unwrap();
        match out {
            Value::Series(col) => assert_eq!(col.as_ref(), &Column::int64s(&[2, 2, 1])),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn windowed_frames_per_row() {
        let col = Column::int64s(&[1, 2, 3]);
        let ctx = Windowed {
            preceding: Some(1),
            following: Some(0),
        };
        let out = ctx.agg(AggInput::Series(&col), &Reducer::Sum, None).unwrap();
        match out {
            Value::Series(col) => assert_eq!(col.as_ref(), &Column::int64s(&[1, 3, 5])),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn windowed_respects_groups() {
        let data = grouped(&[1, 2, 10, 20], &[1, 1, 2, 2]);
        let ctx = Windowed {
            preceding: None,
            following: Some(0),
        };
        let out = ctx
            .agg(AggInput::Grouped(&data), &Reducer::Sum, None)
            .unwrap();
        match out {
            Value::Series(col) => assert_eq!(col.as_ref(), &Column::int64s(&[1, 3, 10, 30])),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn masked_reduction() {
        let col = Column::int64s(&[1, 2, 3, 4]);
        let mask = vec![true, false, true, false];
        let out = Summarize
            .agg(AggInput::Series(&col), &Reducer::Sum, Some(&mask))
            .unwrap();
        match out {
            Value::Scalar(ScalarValue::Int64(4)) => (),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
