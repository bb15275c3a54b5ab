use std::fmt;

use quarry_error::{EngineError, ErrorKind, Result};
use serde::{Deserialize, Serialize};

/// Payload-free identifier for a data type.
///
/// Used wherever a type needs to be referenced without its metadata, e.g.
/// coercion rule tables keyed on the type alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataTypeId {
    /// Any datatype.
    ///
    /// Never equal to a concrete type; only useful for rule tables that
    /// accept any input.
    Any,
    Null,
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Decimal,
    Timestamp,
    Date,
    Interval,
    Utf8,
    List,
    Struct,
    Category,
}

impl fmt::Display for DataTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "Any"),
            Self::Null => write!(f, "Null"),
            Self::Boolean => write!(f, "Boolean"),
            Self::Int8 => write!(f, "Int8"),
            Self::Int16 => write!(f, "Int16"),
            Self::Int32 => write!(f, "Int32"),
            Self::Int64 => write!(f, "Int64"),
            Self::UInt8 => write!(f, "UInt8"),
            Self::UInt16 => write!(f, "UInt16"),
            Self::UInt32 => write!(f, "UInt32"),
            Self::UInt64 => write!(f, "UInt64"),
            Self::Float32 => write!(f, "Float32"),
            Self::Float64 => write!(f, "Float64"),
            Self::Decimal => write!(f, "Decimal"),
            Self::Timestamp => write!(f, "Timestamp"),
            Self::Date => write!(f, "Date"),
            Self::Interval => write!(f, "Interval"),
            Self::Utf8 => write!(f, "Utf8"),
            Self::List => write!(f, "List"),
            Self::Struct => write!(f, "Struct"),
            Self::Category => write!(f, "Category"),
        }
    }
}

/// Resolution of a timestamp type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeUnit {
    Second,
    Millisecond,
    Microsecond,
    Nanosecond,
}

impl TimeUnit {
    /// Nanoseconds in one unit.
    pub const fn nanos(&self) -> i64 {
        match self {
            Self::Second => 1_000_000_000,
            Self::Millisecond => 1_000_000,
            Self::Microsecond => 1_000,
            Self::Nanosecond => 1,
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Second => write!(f, "s"),
            Self::Millisecond => write!(f, "ms"),
            Self::Microsecond => write!(f, "us"),
            Self::Nanosecond => write!(f, "ns"),
        }
    }
}

/// Unit of an interval type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntervalUnit {
    Week,
    Day,
    Hour,
    Minute,
    Second,
    Millisecond,
    Microsecond,
    Nanosecond,
}

impl IntervalUnit {
    /// Nanoseconds in one unit.
    pub const fn nanos(&self) -> i64 {
        match self {
            Self::Week => 7 * 24 * 3_600_000_000_000,
            Self::Day => 24 * 3_600_000_000_000,
            Self::Hour => 3_600_000_000_000,
            Self::Minute => 60_000_000_000,
            Self::Second => 1_000_000_000,
            Self::Millisecond => 1_000_000,
            Self::Microsecond => 1_000,
            Self::Nanosecond => 1,
        }
    }
}

impl fmt::Display for IntervalUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Week => write!(f, "W"),
            Self::Day => write!(f, "D"),
            Self::Hour => write!(f, "h"),
            Self::Minute => write!(f, "m"),
            Self::Second => write!(f, "s"),
            Self::Millisecond => write!(f, "ms"),
            Self::Microsecond => write!(f, "us"),
            Self::Nanosecond => write!(f, "ns"),
        }
    }
}

/// Metadata associated with timestamps.
///
/// `timezone: None` is a timezone-naive timestamp; `Some` carries an IANA
/// zone name. The two are distinct types and compare unequal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimestampTypeMeta {
    pub unit: TimeUnit,
    pub timezone: Option<String>,
}

impl TimestampTypeMeta {
    pub const fn new(unit: TimeUnit) -> Self {
        TimestampTypeMeta {
            unit,
            timezone: None,
        }
    }

    pub fn with_timezone(unit: TimeUnit, timezone: impl Into<String>) -> Self {
        TimestampTypeMeta {
            unit,
            timezone: Some(timezone.into()),
        }
    }
}

/// Metadata associated with decimals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DecimalTypeMeta {
    pub precision: u8,
    pub scale: i8,
}

impl DecimalTypeMeta {
    pub const fn new(precision: u8, scale: i8) -> Self {
        DecimalTypeMeta { precision, scale }
    }
}

/// Metadata associated with lists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListTypeMeta {
    pub datatype: Box<DataType>,
}

impl ListTypeMeta {
    pub fn new(datatype: DataType) -> Self {
        ListTypeMeta {
            datatype: Box::new(datatype),
        }
    }
}

/// Metadata associated with structs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StructTypeMeta {
    pub fields: Vec<(String, DataType)>,
}

/// Logical data types.
///
/// Two types are equal by structural comparison of the variant and its
/// metadata, never by identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// Constant null columns.
    Null,
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Decimal(DecimalTypeMeta),
    Timestamp(TimestampTypeMeta),
    /// Calendar date without time of day.
    Date,
    /// Elapsed time with a declared unit.
    Interval(IntervalUnit),
    Utf8,
    /// A list of values all of the same type.
    List(ListTypeMeta),
    /// A struct of named fields.
    Struct(StructTypeMeta),
    /// Dictionary-encoded strings.
    Category,
}

impl DataType {
    /// Try to create a default data type from the data type id.
    ///
    /// Errors for ids we don't have enough information about (list,
    /// struct) or that can never be a concrete type (any).
    pub fn try_default_datatype(id: DataTypeId) -> Result<Self> {
        Ok(match id {
            DataTypeId::Any => {
                return Err(EngineError::unsupported_type(
                    "Cannot create a default Any datatype",
                ));
            }
            DataTypeId::Null => DataType::Null,
            DataTypeId::Boolean => DataType::Boolean,
            DataTypeId::Int8 => DataType::Int8,
            DataTypeId::Int16 => DataType::Int16,
            DataTypeId::Int32 => DataType::Int32,
            DataTypeId::Int64 => DataType::Int64,
            DataTypeId::UInt8 => DataType::UInt8,
            DataTypeId::UInt16 => DataType::UInt16,
            DataTypeId::UInt32 => DataType::UInt32,
            DataTypeId::UInt64 => DataType::UInt64,
            DataTypeId::Float32 => DataType::Float32,
            DataTypeId::Float64 => DataType::Float64,
            DataTypeId::Decimal => DataType::Decimal(DecimalTypeMeta::new(38, 9)),
            DataTypeId::Timestamp => DataType::Timestamp(TimestampTypeMeta::new(TimeUnit::Nanosecond)),
            DataTypeId::Date => DataType::Date,
            DataTypeId::Interval => DataType::Interval(IntervalUnit::Nanosecond),
            DataTypeId::Utf8 => DataType::Utf8,
            DataTypeId::List => {
                return Err(EngineError::unsupported_type(
                    "Cannot create a default List datatype",
                ));
            }
            DataTypeId::Struct => {
                return Err(EngineError::unsupported_type(
                    "Cannot create a default Struct datatype",
                ));
            }
            DataTypeId::Category => DataType::Category,
        })
    }

    /// Get the data type id from the data type.
    pub const fn datatype_id(&self) -> DataTypeId {
        match self {
            DataType::Null => DataTypeId::Null,
            DataType::Boolean => DataTypeId::Boolean,
            DataType::Int8 => DataTypeId::Int8,
            DataType::Int16 => DataTypeId::Int16,
            DataType::Int32 => DataTypeId::Int32,
            DataType::Int64 => DataTypeId::Int64,
            DataType::UInt8 => DataTypeId::UInt8,
            DataType::UInt16 => DataTypeId::UInt16,
            DataType::UInt32 => DataTypeId::UInt32,
            DataType::UInt64 => DataTypeId::UInt64,
            DataType::Float32 => DataTypeId::Float32,
            DataType::Float64 => DataTypeId::Float64,
            DataType::Decimal(_) => DataTypeId::Decimal,
            DataType::Timestamp(_) => DataTypeId::Timestamp,
            DataType::Date => DataTypeId::Date,
            DataType::Interval(_) => DataTypeId::Interval,
            DataType::Utf8 => DataTypeId::Utf8,
            DataType::List(_) => DataTypeId::List,
            DataType::Struct(_) => DataTypeId::Struct,
            DataType::Category => DataTypeId::Category,
        }
    }

    /// Shorthand for a timezone-naive nanosecond timestamp.
    pub const fn timestamp() -> Self {
        DataType::Timestamp(TimestampTypeMeta::new(TimeUnit::Nanosecond))
    }

    pub const fn is_null(&self) -> bool {
        matches!(self, DataType::Null)
    }

    pub const fn is_boolean(&self) -> bool {
        matches!(self, DataType::Boolean)
    }

    pub const fn is_integer(&self) -> bool {
        matches!(
            self,
            DataType::Int8
                | DataType::Int16
                | DataType::Int32
                | DataType::Int64
                | DataType::UInt8
                | DataType::UInt16
                | DataType::UInt32
                | DataType::UInt64
        )
    }

    pub const fn is_floating(&self) -> bool {
        matches!(self, DataType::Float32 | DataType::Float64)
    }

    pub const fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_floating() || matches!(self, DataType::Decimal(_))
    }

    pub const fn is_temporal(&self) -> bool {
        matches!(
            self,
            DataType::Timestamp(_) | DataType::Date | DataType::Interval(_)
        )
    }

    pub fn try_get_timestamp_type_meta(&self) -> Result<&TimestampTypeMeta> {
        match self {
            DataType::Timestamp(meta) => Ok(meta),
            other => Err(EngineError::new(
                ErrorKind::Internal,
                format!("Expected timestamp datatype, got {other}"),
            )),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Decimal(meta) => write!(f, "Decimal({},{})", meta.precision, meta.scale),
            DataType::Timestamp(meta) => match &meta.timezone {
                Some(tz) => write!(f, "Timestamp({}, {tz})", meta.unit),
                None => write!(f, "Timestamp({})", meta.unit),
            },
            DataType::Interval(unit) => write!(f, "Interval({unit})"),
            DataType::List(meta) => write!(f, "List({})", meta.datatype),
            DataType::Struct(meta) => {
                write!(f, "Struct(")?;
                for (idx, (name, datatype)) in meta.fields.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {datatype}")?;
                }
                write!(f, ")")
            }
            other => write!(f, "{}", other.datatype_id()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_equality() {
        let a = DataType::Timestamp(TimestampTypeMeta::with_timezone(TimeUnit::Nanosecond, "UTC"));
        let b = DataType::Timestamp(TimestampTypeMeta::with_timezone(TimeUnit::Nanosecond, "UTC"));
        assert_eq!(a, b);

        let naive = DataType::timestamp();
        assert_ne!(a, naive);
    }

    #[test]
    fn default_datatype_from_id() {
        assert_eq!(
            DataType::try_default_datatype(DataTypeId::Int64).unwrap(),
            DataType::Int64
        );
        assert!(DataType::try_default_datatype(DataTypeId::Any).is_err());
        assert!(DataType::try_default_datatype(DataTypeId::Struct).is_err());
    }
}
