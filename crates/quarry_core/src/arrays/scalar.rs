use std::fmt;

use serde::{Deserialize, Serialize};

use crate::arrays::datatype::{
    DataType,
    IntervalUnit,
    TimeUnit,
    TimestampTypeMeta,
    StructTypeMeta,
};

/// An instant in time as nanoseconds since the unix epoch (UTC), plus the
/// timezone the value is observed in.
///
/// `timezone: None` is a naive timestamp: the instant is interpreted as
/// wall-clock time with no zone attached.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimestampScalar {
    pub value: i64,
    pub timezone: Option<String>,
}

impl TimestampScalar {
    pub const fn new(value: i64) -> Self {
        TimestampScalar {
            value,
            timezone: None,
        }
    }

    pub fn with_timezone(value: i64, timezone: impl Into<String>) -> Self {
        TimestampScalar {
            value,
            timezone: Some(timezone.into()),
        }
    }
}

/// Elapsed time in nanoseconds plus the unit the value was declared in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IntervalScalar {
    pub nanos: i64,
    pub unit: IntervalUnit,
}

impl IntervalScalar {
    pub const fn new(count: i64, unit: IntervalUnit) -> Self {
        IntervalScalar {
            nanos: count * unit.nanos(),
            unit,
        }
    }
}

/// A single owned scalar value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScalarValue {
    /// Represents an absent value of any type.
    Null,
    Boolean(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    /// Utf-8 encoded string.
    Utf8(String),
    Timestamp(TimestampScalar),
    /// Days since the unix epoch.
    Date(i32),
    Interval(IntervalScalar),
    List(Vec<ScalarValue>),
    Struct(Vec<(String, ScalarValue)>),
}

impl ScalarValue {
    /// The logical type this value inhabits.
    ///
    /// List element types are taken from the first non-null element; an
    /// empty or all-null list reports a `Null` element type.
    pub fn datatype(&self) -> DataType {
        match self {
            ScalarValue::Null => DataType::Null,
            ScalarValue::Boolean(_) => DataType::Boolean,
            ScalarValue::Int8(_) => DataType::Int8,
            ScalarValue::Int16(_) => DataType::Int16,
            ScalarValue::Int32(_) => DataType::Int32,
            ScalarValue::Int64(_) => DataType::Int64,
            ScalarValue::UInt8(_) => DataType::UInt8,
            ScalarValue::UInt16(_) => DataType::UInt16,
            ScalarValue::UInt32(_) => DataType::UInt32,
            ScalarValue::UInt64(_) => DataType::UInt64,
            ScalarValue::Float32(_) => DataType::Float32,
            ScalarValue::Float64(_) => DataType::Float64,
            ScalarValue::Utf8(_) => DataType::Utf8,
            ScalarValue::Timestamp(ts) => DataType::Timestamp(match &ts.timezone {
                Some(tz) => TimestampTypeMeta::with_timezone(TimeUnit::Nanosecond, tz.clone()),
                None => TimestampTypeMeta::new(TimeUnit::Nanosecond),
            }),
            ScalarValue::Date(_) => DataType::Date,
            ScalarValue::Interval(iv) => DataType::Interval(iv.unit),
            ScalarValue::List(values) => {
                let elem = values
                    .iter()
                    .find(|v| !v.is_null())
                    .map(|v| v.datatype())
                    .unwrap_or(DataType::Null);
                DataType::List(crate::arrays::datatype::ListTypeMeta::new(elem))
            }
            ScalarValue::Struct(fields) => DataType::Struct(StructTypeMeta {
                fields: fields
                    .iter()
                    .map(|(name, value)| (name.clone(), value.datatype()))
                    .collect(),
            }),
        }
    }

    pub const fn is_null(&self) -> bool {
        matches!(self, ScalarValue::Null)
    }

    /// Widen to f64 if this is any numeric value.
    pub fn to_f64(&self) -> Option<f64> {
        Some(match self {
            ScalarValue::Int8(v) => *v as f64,
            ScalarValue::Int16(v) => *v as f64,
            ScalarValue::Int32(v) => *v as f64,
            ScalarValue::Int64(v) => *v as f64,
            ScalarValue::UInt8(v) => *v as f64,
            ScalarValue::UInt16(v) => *v as f64,
            ScalarValue::UInt32(v) => *v as f64,
            ScalarValue::UInt64(v) => *v as f64,
            ScalarValue::Float32(v) => *v as f64,
            ScalarValue::Float64(v) => *v,
            _ => return None,
        })
    }

    /// Narrow to i64 if this is an integer value.
    pub fn to_i64(&self) -> Option<i64> {
        Some(match self {
            ScalarValue::Int8(v) => *v as i64,
            ScalarValue::Int16(v) => *v as i64,
            ScalarValue::Int32(v) => *v as i64,
            ScalarValue::Int64(v) => *v,
            ScalarValue::UInt8(v) => *v as i64,
            ScalarValue::UInt16(v) => *v as i64,
            ScalarValue::UInt32(v) => *v as i64,
            ScalarValue::UInt64(v) => i64::try_from(*v).ok()?,
            _ => return None,
        })
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ScalarValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScalarValue::Utf8(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Null => write!(f, "NULL"),
            ScalarValue::Boolean(v) => write!(f, "{v}"),
            ScalarValue::Int8(v) => write!(f, "{v}"),
            ScalarValue::Int16(v) => write!(f, "{v}"),
            ScalarValue::Int32(v) => write!(f, "{v}"),
            ScalarValue::Int64(v) => write!(f, "{v}"),
            ScalarValue::UInt8(v) => write!(f, "{v}"),
            ScalarValue::UInt16(v) => write!(f, "{v}"),
            ScalarValue::UInt32(v) => write!(f, "{v}"),
            ScalarValue::UInt64(v) => write!(f, "{v}"),
            ScalarValue::Float32(v) => write!(f, "{v}"),
            ScalarValue::Float64(v) => write!(f, "{v}"),
            ScalarValue::Utf8(v) => write!(f, "'{v}'"),
            ScalarValue::Timestamp(ts) => match &ts.timezone {
                Some(tz) => write!(f, "{} ({tz})", ts.value),
                None => write!(f, "{}", ts.value),
            },
            ScalarValue::Date(v) => write!(f, "date {v}"),
            ScalarValue::Interval(iv) => write!(f, "{}ns", iv.nanos),
            ScalarValue::List(values) => {
                write!(f, "[")?;
                for (idx, value) in values.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{value}")?;
                }
                write!(f, "]")
            }
            ScalarValue::Struct(fields) => {
                write!(f, "{{")?;
                for (idx, (name, value)) in fields.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {value}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<bool> for ScalarValue {
    fn from(value: bool) -> Self {
        ScalarValue::Boolean(value)
    }
}

impl From<i8> for ScalarValue {
    fn from(value: i8) -> Self {
        ScalarValue::Int8(value)
    }
}

impl From<i16> for ScalarValue {
    fn from(value: i16) -> Self {
        ScalarValue::Int16(value)
    }
}

impl From<i32> for ScalarValue {
    fn from(value: i32) -> Self {
        ScalarValue::Int32(value)
    }
}

impl From<i64> for ScalarValue {
    fn from(value: i64) -> Self {
        ScalarValue::Int64(value)
    }
}

impl From<u8> for ScalarValue {
    fn from(value: u8) -> Self {
        ScalarValue::UInt8(value)
    }
}

impl From<u16> for ScalarValue {
    fn from(value: u16) -> Self {
        ScalarValue::UInt16(value)
    }
}

impl From<u32> for ScalarValue {
    fn from(value: u32) -> Self {
        ScalarValue::UInt32(value)
    }
}

impl From<u64> for ScalarValue {
    fn from(value: u64) -> Self {
        ScalarValue::UInt64(value)
    }
}

impl From<f32> for ScalarValue {
    fn from(value: f32) -> Self {
        ScalarValue::Float32(value)
    }
}

impl From<f64> for ScalarValue {
    fn from(value: f64) -> Self {
        ScalarValue::Float64(value)
    }
}

impl From<&str> for ScalarValue {
    fn from(value: &str) -> Self {
        ScalarValue::Utf8(value.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(value: String) -> Self {
        ScalarValue::Utf8(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_datatypes() {
        assert_eq!(ScalarValue::from(3_i64).datatype(), DataType::Int64);
        assert_eq!(ScalarValue::from("a").datatype(), DataType::Utf8);
        assert_eq!(
            ScalarValue::Timestamp(TimestampScalar::with_timezone(0, "UTC")).datatype(),
            DataType::Timestamp(TimestampTypeMeta::with_timezone(TimeUnit::Nanosecond, "UTC")),
        );
    }

    #[test]
    fn interval_normalizes_to_nanos() {
        let iv = IntervalScalar::new(2, IntervalUnit::Second);
        assert_eq!(iv.nanos, 2_000_000_000);
        assert_eq!(iv.unit, IntervalUnit::Second);
    }
}
