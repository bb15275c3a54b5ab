use quarry_error::{EngineError, Result};
use serde::{Deserialize, Serialize};

use crate::arrays::datatype::{
    DataType,
    IntervalUnit,
    ListTypeMeta,
    StructTypeMeta,
    TimeUnit,
    TimestampTypeMeta,
};
use crate::arrays::scalar::{IntervalScalar, ScalarValue, TimestampScalar};

/// A typed columnar vector of nullable values, positionally aligned to a
/// logical row index.
///
/// Timestamps and intervals are normalized to nanoseconds on the way in;
/// unit metadata lives on the logical type and is reapplied by the
/// coercion layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Column {
    Boolean(Vec<Option<bool>>),
    Int8(Vec<Option<i8>>),
    Int16(Vec<Option<i16>>),
    Int32(Vec<Option<i32>>),
    Int64(Vec<Option<i64>>),
    UInt8(Vec<Option<u8>>),
    UInt16(Vec<Option<u16>>),
    UInt32(Vec<Option<u32>>),
    UInt64(Vec<Option<u64>>),
    Float32(Vec<Option<f32>>),
    Float64(Vec<Option<f64>>),
    Utf8(Vec<Option<String>>),
    Timestamp {
        values: Vec<Option<i64>>,
        timezone: Option<String>,
    },
    Date(Vec<Option<i32>>),
    Interval {
        values: Vec<Option<i64>>,
        unit: IntervalUnit,
    },
    List {
        values: Vec<Option<Vec<ScalarValue>>>,
        datatype: Box<DataType>,
    },
    Struct {
        values: Vec<Option<Vec<(String, ScalarValue)>>>,
        meta: StructTypeMeta,
    },
    /// Untyped fallback, one boxed scalar per row.
    Object(Vec<Option<ScalarValue>>),
    /// Dictionary-encoded strings, stored expanded.
    Category(Vec<Option<String>>),
}

macro_rules! column_len {
    ($self:ident) => {
        match $self {
            Column::Boolean(v) => v.len(),
            Column::Int8(v) => v.len(),
            Column::Int16(v) => v.len(),
            Column::Int32(v) => v.len(),
            Column::Int64(v) => v.len(),
            Column::UInt8(v) => v.len(),
            Column::UInt16(v) => v.len(),
            Column::UInt32(v) => v.len(),
            Column::UInt64(v) => v.len(),
            Column::Float32(v) => v.len(),
            Column::Float64(v) => v.len(),
            Column::Utf8(v) => v.len(),
            Column::Timestamp { values, .. } => values.len(),
            Column::Date(v) => v.len(),
            Column::Interval { values, .. } => values.len(),
            Column::List { values, .. } => values.len(),
            Column::Struct { values, .. } => values.len(),
            Column::Object(v) => v.len(),
            Column::Category(v) => v.len(),
        }
    };
}

impl Column {
    pub fn len(&self) -> usize {
        column_len!(self)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The logical type of this column.
    pub fn datatype(&self) -> DataType {
        match self {
            Column::Boolean(_) => DataType::Boolean,
            Column::Int8(_) => DataType::Int8,
            Column::Int16(_) => DataType::Int16,
            Column::Int32(_) => DataType::Int32,
            Column::Int64(_) => DataType::Int64,
            Column::UInt8(_) => DataType::UInt8,
            Column::UInt16(_) => DataType::UInt16,
            Column::UInt32(_) => DataType::UInt32,
            Column::UInt64(_) => DataType::UInt64,
            Column::Float32(_) => DataType::Float32,
            Column::Float64(_) => DataType::Float64,
            Column::Utf8(_) => DataType::Utf8,
            Column::Timestamp { timezone, .. } => DataType::Timestamp(match timezone {
                Some(tz) => TimestampTypeMeta::with_timezone(TimeUnit::Nanosecond, tz.clone()),
                None => TimestampTypeMeta::new(TimeUnit::Nanosecond),
            }),
            Column::Date(_) => DataType::Date,
            Column::Interval { unit, .. } => DataType::Interval(*unit),
            Column::List { datatype, .. } => {
                DataType::List(ListTypeMeta::new(datatype.as_ref().clone()))
            }
            Column::Struct { meta, .. } => DataType::Struct(meta.clone()),
            Column::Object(_) => DataType::Null,
            Column::Category(_) => DataType::Category,
        }
    }

    /// Read one row as an owned scalar. Out of bounds returns `None`;
    /// a null slot returns `Some(ScalarValue::Null)`.
    pub fn get(&self, row: usize) -> Option<ScalarValue> {
        if row >= self.len() {
            return None;
        }
        Some(match self {
            Column::Boolean(v) => v[row].map(ScalarValue::Boolean).unwrap_or(ScalarValue::Null),
            Column::Int8(v) => v[row].map(ScalarValue::Int8).unwrap_or(ScalarValue::Null),
            Column::Int16(v) => v[row].map(ScalarValue::Int16).unwrap_or(ScalarValue::Null),
            Column::Int32(v) => v[row].map(ScalarValue::Int32).unwrap_or(ScalarValue::Null),
            Column::Int64(v) => v[row].map(ScalarValue::Int64).unwrap_or(ScalarValue::Null),
            Column::UInt8(v) => v[row].map(ScalarValue::UInt8).unwrap_or(ScalarValue::Null),
            Column::UInt16(v) => v[row].map(ScalarValue::UInt16).unwrap_or(ScalarValue::Null),
            Column::UInt32(v) => v[row].map(ScalarValue::UInt32).unwrap_or(ScalarValue::Null),
            Column::UInt64(v) => v[row].map(ScalarValue::UInt64).unwrap_or(ScalarValue::Null),
            Column::Float32(v) => v[row].map(ScalarValue::Float32).unwrap_or(ScalarValue::Null),
            Column::Float64(v) => v[row].map(ScalarValue::Float64).unwrap_or(ScalarValue::Null),
            Column::Utf8(v) => v[row]
                .clone()
                .map(ScalarValue::Utf8)
                .unwrap_or(ScalarValue::Null),
            Column::Timestamp { values, timezone } => values[row]
                .map(|value| {
                    ScalarValue::Timestamp(TimestampScalar {
                        value,
                        timezone: timezone.clone(),
                    })
                })
                .unwrap_or(ScalarValue::Null),
            Column::Date(v) => v[row].map(ScalarValue::Date).unwrap_or(ScalarValue::Null),
            Column::Interval { values, unit } => values[row]
                .map(|nanos| ScalarValue::Interval(IntervalScalar { nanos, unit: *unit }))
                .unwrap_or(ScalarValue::Null),
            Column::List { values, .. } => values[row]
                .clone()
                .map(ScalarValue::List)
                .unwrap_or(ScalarValue::Null),
            Column::Struct { values, .. } => values[row]
                .clone()
                .map(ScalarValue::Struct)
                .unwrap_or(ScalarValue::Null),
            Column::Object(v) => v[row].clone().unwrap_or(ScalarValue::Null),
            Column::Category(v) => v[row]
                .clone()
                .map(ScalarValue::Utf8)
                .unwrap_or(ScalarValue::Null),
        })
    }

    pub fn is_valid(&self, row: usize) -> bool {
        self.get(row).is_some_and(|v| !v.is_null())
    }

    pub fn iter_scalars(&self) -> impl Iterator<Item = ScalarValue> + '_ {
        (0..self.len()).map(|row| self.get(row).unwrap_or(ScalarValue::Null))
    }

    /// Build an empty column for the given logical type.
    pub fn empty_of(datatype: &DataType) -> Column {
        match datatype {
            DataType::Null => Column::Object(Vec::new()),
            DataType::Boolean => Column::Boolean(Vec::new()),
            DataType::Int8 => Column::Int8(Vec::new()),
            DataType::Int16 => Column::Int16(Vec::new()),
            DataType::Int32 => Column::Int32(Vec::new()),
            DataType::Int64 => Column::Int64(Vec::new()),
            DataType::UInt8 => Column::UInt8(Vec::new()),
            DataType::UInt16 => Column::UInt16(Vec::new()),
            DataType::UInt32 => Column::UInt32(Vec::new()),
            DataType::UInt64 => Column::UInt64(Vec::new()),
            DataType::Float32 => Column::Float32(Vec::new()),
            DataType::Float64 => Column::Float64(Vec::new()),
            DataType::Decimal(_) => Column::Object(Vec::new()),
            DataType::Timestamp(meta) => Column::Timestamp {
                values: Vec::new(),
                timezone: meta.timezone.clone(),
            },
            DataType::Date => Column::Date(Vec::new()),
            DataType::Interval(unit) => Column::Interval {
                values: Vec::new(),
                unit: *unit,
            },
            DataType::Utf8 => Column::Utf8(Vec::new()),
            DataType::List(meta) => Column::List {
                values: Vec::new(),
                datatype: meta.datatype.clone(),
            },
            DataType::Struct(meta) => Column::Struct {
                values: Vec::new(),
                meta: meta.clone(),
            },
            DataType::Category => Column::Category(Vec::new()),
        }
    }

    /// Append one scalar, which must be null or inhabit this column's
    /// type.
    pub fn push(&mut self, value: ScalarValue) -> Result<()> {
        match (self, value) {
            (Column::Boolean(v), ScalarValue::Boolean(x)) => v.push(Some(x)),
            (Column::Boolean(v), ScalarValue::Null) => v.push(None),
            (Column::Int8(v), ScalarValue::Int8(x)) => v.push(Some(x)),
            (Column::Int8(v), ScalarValue::Null) => v.push(None),
            (Column::Int16(v), ScalarValue::Int16(x)) => v.push(Some(x)),
            (Column::Int16(v), ScalarValue::Null) => v.push(None),
            (Column::Int32(v), ScalarValue::Int32(x)) => v.push(Some(x)),
            (Column::Int32(v), ScalarValue::Null) => v.push(None),
            (Column::Int64(v), ScalarValue::Int64(x)) => v.push(Some(x)),
            (Column::Int64(v), ScalarValue::Null) => v.push(None),
            (Column::UInt8(v), ScalarValue::UInt8(x)) => v.push(Some(x)),
            (Column::UInt8(v), ScalarValue::Null) => v.push(None),
            (Column::UInt16(v), ScalarValue::UInt16(x)) => v.push(Some(x)),
            (Column::UInt16(v), ScalarValue::Null) => v.push(None),
            (Column::UInt32(v), ScalarValue::UInt32(x)) => v.push(Some(x)),
            (Column::UInt32(v), ScalarValue::Null) => v.push(None),
            (Column::UInt64(v), ScalarValue::UInt64(x)) => v.push(Some(x)),
            (Column::UInt64(v), ScalarValue::Null) => v.push(None),
            (Column::Float32(v), ScalarValue::Float32(x)) => v.push(Some(x)),
            (Column::Float32(v), ScalarValue::Null) => v.push(None),
            (Column::Float64(v), ScalarValue::Float64(x)) => v.push(Some(x)),
            (Column::Float64(v), ScalarValue::Null) => v.push(None),
            (Column::Utf8(v), ScalarValue::Utf8(x)) => v.push(Some(x)),
            (Column::Utf8(v), ScalarValue::Null) => v.push(None),
            (Column::Timestamp { values, .. }, ScalarValue::Timestamp(ts)) => {
                values.push(Some(ts.value))
            }
            (Column::Timestamp { values, .. }, ScalarValue::Null) => values.push(None),
            (Column::Date(v), ScalarValue::Date(x)) => v.push(Some(x)),
            (Column::Date(v), ScalarValue::Null) => v.push(None),
            (Column::Interval { values, .. }, ScalarValue::Interval(iv)) => {
                values.push(Some(iv.nanos))
            }
            (Column::Interval { values, .. }, ScalarValue::Null) => values.push(None),
            (Column::List { values, .. }, ScalarValue::List(x)) => values.push(Some(x)),
            (Column::List { values, .. }, ScalarValue::Null) => values.push(None),
            (Column::Struct { values, .. }, ScalarValue::Struct(x)) => values.push(Some(x)),
            (Column::Struct { values, .. }, ScalarValue::Null) => values.push(None),
            (Column::Object(v), x) => v.push(if x.is_null() { None } else { Some(x) }),
            (Column::Category(v), ScalarValue::Utf8(x)) => v.push(Some(x)),
            (Column::Category(v), ScalarValue::Null) => v.push(None),
            (col, value) => {
                return Err(EngineError::internal(format!(
                    "value {value} does not fit column of type {}",
                    col.datatype()
                )));
            }
        }
        Ok(())
    }

    /// Build a typed column from scalars.
    pub fn from_values(
        datatype: &DataType,
        values: impl IntoIterator<Item = ScalarValue>,
    ) -> Result<Column> {
        let mut col = Column::empty_of(datatype);
        for value in values {
            col.push(value)?;
        }
        Ok(col)
    }

    /// Infer the column type from the first non-null scalar and build.
    ///
    /// An empty or all-null input becomes an object column.
    pub fn from_values_inferred(values: impl IntoIterator<Item = ScalarValue>) -> Result<Column> {
        let values: Vec<_> = values.into_iter().collect();
        let datatype = values
            .iter()
            .find(|v| !v.is_null())
            .map(|v| v.datatype())
            .unwrap_or(DataType::Null);
        Column::from_values(&datatype, values)
    }

    /// Repeat a scalar `len` times.
    pub fn repeat(value: &ScalarValue, len: usize) -> Result<Column> {
        let datatype = value.datatype();
        Column::from_values(&datatype, std::iter::repeat_n(value.clone(), len))
    }

    /// Keep rows where `mask` is true. Mask length must match.
    pub fn filter(&self, mask: &[bool]) -> Result<Column> {
        if mask.len() != self.len() {
            return Err(EngineError::shape_mismatch(format!(
                "filter mask length {} does not match column length {}",
                mask.len(),
                self.len()
            )));
        }
        let datatype = self.datatype();
        Column::from_values(
            &datatype,
            self.iter_scalars()
                .zip(mask.iter())
                .filter_map(|(value, &keep)| keep.then_some(value)),
        )
    }

    /// Gather rows by index.
    pub fn take(&self, rows: &[usize]) -> Result<Column> {
        let datatype = self.datatype();
        Column::from_values(
            &datatype,
            rows.iter().map(|&row| self.get(row).unwrap_or(ScalarValue::Null)),
        )
    }

    pub fn slice(&self, offset: usize, len: usize) -> Result<Column> {
        let end = (offset + len).min(self.len());
        let rows: Vec<usize> = (offset.min(self.len())..end).collect();
        self.take(&rows)
    }

    /// Vertically concatenate columns of the same type.
    pub fn concat(columns: &[&Column]) -> Result<Column> {
        let first = columns
            .first()
            .ok_or_else(|| EngineError::internal("concat of zero columns"))?;
        let datatype = first.datatype();
        let mut out = Column::empty_of(&datatype);
        for col in columns {
            for value in col.iter_scalars() {
                out.push(value)?;
            }
        }
        Ok(out)
    }

    /// View a boolean column as a mask, treating null as false.
    pub fn as_bool_mask(&self) -> Result<Vec<bool>> {
        match self {
            Column::Boolean(v) => Ok(v.iter().map(|b| b.unwrap_or(false)).collect()),
            other => Err(EngineError::unsupported_type(format!(
                "expected a boolean column for a predicate, got {}",
                other.datatype()
            ))),
        }
    }

    // Convenience constructors, mostly for tests.

    pub fn bools(values: &[bool]) -> Column {
        Column::Boolean(values.iter().map(|&v| Some(v)).collect())
    }

    pub fn int32s(values: &[i32]) -> Column {
        Column::Int32(values.iter().map(|&v| Some(v)).collect())
    }

    pub fn int64s(values: &[i64]) -> Column {
        Column::Int64(values.iter().map(|&v| Some(v)).collect())
    }

    pub fn float64s(values: &[f64]) -> Column {
        Column::Float64(values.iter().map(|&v| Some(v)).collect())
    }

    pub fn utf8s<S: AsRef<str>>(values: &[S]) -> Column {
        Column::Utf8(values.iter().map(|v| Some(v.as_ref().to_string())).collect())
    }

    pub fn timestamps(values: &[i64]) -> Column {
        Column::Timestamp {
            values: values.iter().map(|&v| Some(v)).collect(),
            timezone: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_and_take() {
        let col = Column::int64s(&[10, 20, 30, 40]);
        let filtered = col.filter(&[true, false, true, false]).unwrap();
        assert_eq!(filtered, Column::int64s(&[10, 30]));

        let taken = col.take(&[3, 0]).unwrap();
        assert_eq!(taken, Column::int64s(&[40, 10]));
    }

    #[test]
    fn filter_mask_length_checked() {
        let col = Column::int64s(&[1, 2, 3]);
        let err = col.filter(&[true]).unwrap_err();
        assert_eq!(err.kind(), quarry_error::ErrorKind::ShapeMismatch);
    }

    #[test]
    fn push_type_checked() {
        let mut col = Column::int64s(&[1]);
        assert!(col.push(ScalarValue::Utf8("nope".to_string())).is_err());
        col.push(ScalarValue::Null).unwrap();
        assert_eq!(col.get(1), Some(ScalarValue::Null));
    }

    #[test]
    fn repeat_scalar() {
        let col = Column::repeat(&ScalarValue::Int64(7), 3).unwrap();
        assert_eq!(col, Column::int64s(&[7, 7, 7]));
    }
}
