use std::cmp::Ordering;
use std::fmt;

use hashbrown::HashSet;
use quarry_error::{EngineError, Result};

use super::compare_scalars;
use crate::arrays::column::Column;
use crate::arrays::ordkey::KeyValue;
use crate::arrays::scalar::ScalarValue;

/// A named reduction applied by an aggregation context.
///
/// Reductions skip null rows, matching the substrate's aggregation
/// semantics: an empty or all-null input yields null (count and sum
/// excepted).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reducer {
    Sum,
    Mean,
    Min,
    Max,
    Count,
    CountDistinct,
    Any,
    All,
    First,
    Last,
    Variance { ddof: u32 },
    StandardDev { ddof: u32 },
    Collect,
}

impl fmt::Display for Reducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sum => write!(f, "sum"),
            Self::Mean => write!(f, "mean"),
            Self::Min => write!(f, "min"),
            Self::Max => write!(f, "max"),
            Self::Count => write!(f, "count"),
            Self::CountDistinct => write!(f, "nunique"),
            Self::Any => write!(f, "any"),
            Self::All => write!(f, "all"),
            Self::First => write!(f, "first"),
            Self::Last => write!(f, "last"),
            Self::Variance { .. } => write!(f, "var"),
            Self::StandardDev { .. } => write!(f, "std"),
            Self::Collect => write!(f, "collect"),
        }
    }
}

impl Reducer {
    /// Reduce the given rows of a column to one scalar.
    pub fn apply(&self, column: &Column, rows: &[usize]) -> Result<ScalarValue> {
        let values = || {
            rows.iter()
                .filter_map(|&row| column.get(row))
                .filter(|v| !v.is_null())
        };
        Ok(match self {
            Reducer::Count => ScalarValue::Int64(values().count() as i64),
            Reducer::CountDistinct => {
                let mut seen: HashSet<KeyValue> = HashSet::new();
                for value in values() {
                    seen.insert(KeyValue::from_scalar(&value)?);
                }
                ScalarValue::Int64(seen.len() as i64)
            }
            Reducer::Sum => {
                if matches!(column, Column::Float32(_) | Column::Float64(_)) {
                    let mut acc = 0.0_f64;
                    for value in values() {
                        acc += value.to_f64().ok_or_else(|| non_numeric("sum", column))?;
                    }
                    ScalarValue::Float64(acc)
                } else {
                    let mut acc = 0_i64;
                    for value in values() {
                        acc += value.to_i64().ok_or_else(|| non_numeric("sum", column))?;
                    }
                    ScalarValue::Int64(acc)
                }
            }
            Reducer::Mean => {
                let mut acc = 0.0_f64;
                let mut count = 0_usize;
                for value in values() {
                    acc += value.to_f64().ok_or_else(|| non_numeric("mean", column))?;
                    count += 1;
                }
                if count == 0 {
                    ScalarValue::Null
                } else {
                    ScalarValue::Float64(acc / count as f64)
                }
            }
            Reducer::Min | Reducer::Max => {
                let want = if matches!(self, Reducer::Min) {
                    Ordering::Less
                } else {
                    Ordering::Greater
                };
                let mut best: Option<ScalarValue> = None;
                for value in values() {
                    best = Some(match best {
                        None => value,
                        Some(current) => match compare_scalars(&value, &current)? {
                            Some(ord) if ord == want => value,
                            _ => current,
                        },
                    });
                }
                best.unwrap_or(ScalarValue::Null)
            }
            Reducer::Any => {
                let mut result = false;
                for value in values() {
                    result = result || expect_bool("any", &value)?;
                }
                ScalarValue::Boolean(result)
            }
            Reducer::All => {
                let mut result = true;
                for value in values() {
                    result = result && expect_bool("all", &value)?;
                }
                ScalarValue::Boolean(result)
            }
            Reducer::First => values().next().unwrap_or(ScalarValue::Null),
            Reducer::Last => values().last().unwrap_or(ScalarValue::Null),
            Reducer::Variance { ddof } => variance(column, rows, *ddof)?
                .map(ScalarValue::Float64)
                .unwrap_or(ScalarValue::Null),
            Reducer::StandardDev { ddof } => variance(column, rows, *ddof)?
                .map(|v| ScalarValue::Float64(v.sqrt()))
                .unwrap_or(ScalarValue::Null),
            Reducer::Collect => ScalarValue::List(
                rows.iter()
                    .filter_map(|&row| column.get(row))
                    .collect(),
            ),
        })
    }
}

fn non_numeric(what: &str, column: &Column) -> EngineError {
    EngineError::unsupported_type(format!(
        "cannot compute {what} over a column of type {}",
        column.datatype()
    ))
}

fn expect_bool(what: &str, value: &ScalarValue) -> Result<bool> {
    value.as_bool().ok_or_else(|| {
        EngineError::unsupported_type(format!(
            "{what} expects boolean values, got {}",
            value.datatype()
        ))
    })
}

fn variance(column: &Column, rows: &[usize], ddof: u32) -> Result<Option<f64>> {
    let mut values = Vec::with_capacity(rows.len());
    for &row in rows {
        match column.get(row) {
            Some(v) if !v.is_null() => {
                values.push(v.to_f64().ok_or_else(|| non_numeric("var", column))?);
            }
            _ => (),
        }
    }
    let n = values.len();
    if n <= ddof as usize {
        return Ok(None);
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let ssq = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>();
    Ok(Some(ssq / (n - ddof as usize) as f64))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_rows(col: &Column) -> Vec<usize> {
        (0..col.len()).collect()
    }

    #[test]
    fn basic_reductions() {
        let col = Column::Int64(vec![Some(1), None, Some(2), Some(2)]);
        let rows = all_rows(&col);

        assert_eq!(
            Reducer::Sum.apply(&col, &rows).unwrap(),
            ScalarValue::Int64(5)
        );
        assert_eq!(
            Reducer::Count.apply(&col, &rows).unwrap(),
            ScalarValue::Int64(3)
        );
        assert_eq!(
            Reducer::CountDistinct.apply(&col, &rows).unwrap(),
            ScalarValue::Int64(2)
        );
        assert_eq!(
            Reducer::Max.apply(&col, &rows).unwrap(),
            ScalarValue::Int64(2)
        );
        assert_eq!(
            Reducer::First.apply(&col, &rows).unwrap(),
            ScalarValue::Int64(1)
        );
    }

    #[test]
    fn mean_of_empty_is_null() {
        let col = Column::Int64(vec![None, None]);
        assert_eq!(
            Reducer::Mean.apply(&col, &all_rows(&col)).unwrap(),
            ScalarValue::Null
        );
    }

    #[test]
    fn sample_variance() {
        let col = Column::float64s(&[1.0, 2.0, 3.0]);
        let out = Reducer::Variance { ddof: 1 }
            .apply(&col, &all_rows(&col))
            .unwrap();
        assert_eq!(out, ScalarValue::Float64(1.0));

        // Not enough observations for the requested ddof.
        let single = Column::float64s(&[1.0]);
        assert_eq!(
            Reducer::Variance { ddof: 1 }.apply(&single, &[0]).unwrap(),
            ScalarValue::Null
        );
    }

    #[test]
    fn subset_of_rows() {
        let col = Column::int64s(&[10, 20, 30]);
        assert_eq!(
            Reducer::Sum.apply(&col, &[0, 2]).unwrap(),
            ScalarValue::Int64(40)
        );
    }
}
