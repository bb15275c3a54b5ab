//! Bidirectional mapping between logical types and native runtime
//! representations, plus best-effort value conversion.
//!
//! Everything here is pure. The [`TypeCoercion`] object is constructed
//! once per engine and passed by reference; no ambient tables.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Offset, TimeZone};
use chrono_tz::Tz;
use quarry_error::{EngineError, Result};

use crate::arrays::column::Column;
use crate::arrays::datatype::{DataType, IntervalUnit, TimeUnit, TimestampTypeMeta};
use crate::arrays::frame::{DataFrame, Schema};
use crate::arrays::scalar::{IntervalScalar, ScalarValue, TimestampScalar};

const NANOS_PER_DAY: i64 = 24 * 3_600_000_000_000;

/// Native runtime representation of a logical type.
///
/// Timestamps normalize to nanosecond resolution; the declared unit
/// lives only on the logical type. Timezone and interval-unit metadata
/// are preserved so the logical type round-trips, except for types that
/// fall back to [`NativeType::Object`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeType {
    Bool,
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
    Str,
    TimestampNanos { timezone: Option<String> },
    DateDays,
    IntervalNanos(IntervalUnit),
    Category,
    /// Untyped fallback.
    Object,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TypeCoercion;

impl TypeCoercion {
    pub fn new() -> Self {
        TypeCoercion
    }

    /// The native representation a value of `datatype` materializes as.
    pub fn native_type_of(&self, datatype: &DataType) -> NativeType {
        match datatype {
            DataType::Null => NativeType::Object,
            DataType::Boolean => NativeType::Bool,
            DataType::Int8 => NativeType::Int8,
            DataType::Int16 => NativeType::Int16,
            DataType::Int32 => NativeType::Int32,
            DataType::Int64 => NativeType::Int64,
            DataType::UInt8 => NativeType::UInt8,
            DataType::UInt16 => NativeType::UInt16,
            DataType::UInt32 => NativeType::UInt32,
            DataType::UInt64 => NativeType::UInt64,
            DataType::Float32 => NativeType::Float32,
            DataType::Float64 => NativeType::Float64,
            DataType::Utf8 => NativeType::Str,
            DataType::Timestamp(meta) => NativeType::TimestampNanos {
                timezone: meta.timezone.clone(),
            },
            DataType::Date => NativeType::DateDays,
            DataType::Interval(unit) => NativeType::IntervalNanos(*unit),
            DataType::Category => NativeType::Category,
            DataType::Decimal(_) | DataType::List(_) | DataType::Struct(_) => NativeType::Object,
        }
    }

    /// The logical type a native representation maps back to.
    ///
    /// Fails for [`NativeType::Object`]: the fallback representation
    /// carries no recoverable type.
    pub fn logical_type_of(&self, native: &NativeType) -> Result<DataType> {
        Ok(match native {
            NativeType::Bool => DataType::Boolean,
            NativeType::Int8 => DataType::Int8,
            NativeType::Int16 => DataType::Int16,
            NativeType::Int32 => DataType::Int32,
            NativeType::Int64 => DataType::Int64,
            NativeType::UInt8 => DataType::UInt8,
            NativeType::UInt16 => DataType::UInt16,
            NativeType::UInt32 => DataType::UInt32,
            NativeType::UInt64 => DataType::UInt64,
            NativeType::Float32 => DataType::Float32,
            NativeType::Float64 => DataType::Float64,
            NativeType::Str => DataType::Utf8,
            NativeType::TimestampNanos { timezone } => DataType::Timestamp(match timezone {
                Some(tz) => TimestampTypeMeta::with_timezone(TimeUnit::Nanosecond, tz.clone()),
                None => TimestampTypeMeta::new(TimeUnit::Nanosecond),
            }),
            NativeType::DateDays => DataType::Date,
            NativeType::IntervalNanos(unit) => DataType::Interval(*unit),
            NativeType::Category => DataType::Category,
            NativeType::Object => {
                return Err(EngineError::unsupported_type(
                    "the object fallback representation has no logical type",
                ));
            }
        })
    }

    /// Best-effort scalar conversion to `target`.
    ///
    /// A cast where the value already inhabits the target type is a
    /// no-op. Null casts to anything. Boolean to timestamp or interval
    /// is always rejected.
    pub fn convert_scalar(&self, value: &ScalarValue, target: &DataType) -> Result<ScalarValue> {
        if value.is_null() {
            return Ok(ScalarValue::Null);
        }
        if &value.datatype() == target {
            return Ok(value.clone());
        }

        if let ScalarValue::Boolean(_) = value {
            match target {
                DataType::Timestamp(_) => {
                    return Err(EngineError::cast(
                        "Casting boolean values to timestamps does not make sense. If you \
                         really want to cast boolean values to timestamps, cast to int64 \
                         first, then to timestamp",
                    ));
                }
                DataType::Interval(_) => {
                    return Err(EngineError::cast(
                        "Casting boolean values to intervals does not make sense. If you \
                         really want to cast boolean values to intervals, cast to int64 \
                         first, then to interval",
                    ));
                }
                _ => (),
            }
        }

        match target {
            DataType::Boolean => match value {
                ScalarValue::Utf8(s) => match s.as_str() {
                    "true" | "True" => Ok(ScalarValue::Boolean(true)),
                    "false" | "False" => Ok(ScalarValue::Boolean(false)),
                    other => Err(cast_error(value, target, &format!("unparseable '{other}'"))),
                },
                other => match other.to_f64() {
                    Some(v) => Ok(ScalarValue::Boolean(v != 0.0)),
                    None => Err(cast_error(value, target, "not numeric")),
                },
            },
            DataType::Int8 => int_cast(value, target, |v| i8::try_from(v).ok().map(ScalarValue::Int8)),
            DataType::Int16 => int_cast(value, target, |v| i16::try_from(v).ok().map(ScalarValue::Int16)),
            DataType::Int32 => int_cast(value, target, |v| i32::try_from(v).ok().map(ScalarValue::Int32)),
            DataType::Int64 => match value {
                ScalarValue::Timestamp(ts) => Ok(ScalarValue::Int64(ts.value)),
                ScalarValue::Interval(iv) => Ok(ScalarValue::Int64(iv.nanos)),
                other => int_cast(other, target, |v| Some(ScalarValue::Int64(v))),
            },
            DataType::UInt8 => int_cast(value, target, |v| u8::try_from(v).ok().map(ScalarValue::UInt8)),
            DataType::UInt16 => int_cast(value, target, |v| u16::try_from(v).ok().map(ScalarValue::UInt16)),
            DataType::UInt32 => int_cast(value, target, |v| u32::try_from(v).ok().map(ScalarValue::UInt32)),
            DataType::UInt64 => int_cast(value, target, |v| u64::try_from(v).ok().map(ScalarValue::UInt64)),
            DataType::Float32 => float_cast(value, target).map(|v| ScalarValue::Float32(v as f32)),
            DataType::Float64 => float_cast(value, target).map(ScalarValue::Float64),
            DataType::Utf8 => Ok(ScalarValue::Utf8(match value {
                ScalarValue::Timestamp(ts) => format_timestamp(ts)?,
                other => other.to_string(),
            })),
            DataType::Timestamp(meta) => self.scalar_to_timestamp(value, meta),
            DataType::Date => self.scalar_to_date(value),
            DataType::Interval(unit) => match value {
                ScalarValue::Interval(iv) => Ok(ScalarValue::Interval(IntervalScalar {
                    nanos: iv.nanos,
                    unit: *unit,
                })),
                other => match other.to_i64() {
                    Some(count) => Ok(ScalarValue::Interval(IntervalScalar::new(count, *unit))),
                    None => Err(cast_error(value, target, "not an integer count")),
                },
            },
            // Duck conversion into the fallback representation.
            DataType::Decimal(_) | DataType::Null => Ok(value.clone()),
            DataType::Category => match value {
                ScalarValue::Utf8(s) => Ok(ScalarValue::Utf8(s.clone())),
                other => Ok(ScalarValue::Utf8(other.to_string())),
            },
            DataType::List(_) | DataType::Struct(_) => {
                Err(cast_error(value, target, "no scalar conversion"))
            }
        }
    }

    /// Column conversion: element-wise [`Self::convert_scalar`] into a
    /// column typed for `target`.
    pub fn convert_column(&self, column: &Column, target: &DataType) -> Result<Column> {
        if &column.datatype() == target {
            return Ok(column.clone());
        }
        if let DataType::List(meta) = target {
            // Element types must be primitive for a columnar list cast.
            match meta.datatype.as_ref() {
                DataType::List(_) | DataType::Struct(_) | DataType::Decimal(_) => {
                    return Err(EngineError::cast(
                        "Array value type must be a primitive type \
                         (e.g., number, string, or timestamp)",
                    ));
                }
                _ => (),
            }
        }
        let values = column
            .iter_scalars()
            .map(|value| match target {
                DataType::List(meta) => match value {
                    ScalarValue::Null => Ok(ScalarValue::Null),
                    ScalarValue::List(items) => Ok(ScalarValue::List(
                        items
                            .iter()
                            .map(|item| self.convert_scalar(item, &meta.datatype))
                            .collect::<Result<Vec<_>>>()?,
                    )),
                    other => Err(cast_error(&other, target, "not a list")),
                },
                _ => self.convert_scalar(&value, target),
            })
            .collect::<Result<Vec<_>>>()?;
        Column::from_values(target, values)
    }

    /// Force a frame's columns into the declared schema, converting
    /// where the materialized type disagrees.
    pub fn apply_schema(&self, frame: &DataFrame, schema: &Schema) -> Result<DataFrame> {
        let mut out = frame.clone();
        for field in &schema.fields {
            let col = frame.column(&field.name).ok_or_else(|| {
                EngineError::internal(format!("schema names missing column '{}'", field.name))
            })?;
            if col.datatype() != field.datatype {
                let converted = self.convert_column(col, &field.datatype).map_err(|err| {
                    EngineError::cast(format!(
                        "column '{}' does not conform to its declared type {}: {err}",
                        field.name, field.datatype
                    ))
                })?;
                out = out.with_column(field.name.clone(), converted)?;
            }
        }
        Ok(out)
    }

    /// Whether a materialized column inhabits the declared logical type.
    pub fn column_matches(&self, column: &Column, datatype: &DataType) -> bool {
        self.native_type_of(&column.datatype()) == self.native_type_of(datatype)
    }

    fn scalar_to_timestamp(
        &self,
        value: &ScalarValue,
        meta: &TimestampTypeMeta,
    ) -> Result<ScalarValue> {
        match value {
            ScalarValue::Timestamp(ts) => {
                Ok(ScalarValue::Timestamp(retarget_timestamp(ts, meta)?))
            }
            ScalarValue::Date(days) => {
                let wall = *days as i64 * NANOS_PER_DAY;
                localize_wall(wall, meta)
            }
            // Integers are epoch counts in the target unit.
            other => match other.to_i64() {
                Some(count) => {
                    let nanos = count * meta.unit.nanos();
                    Ok(ScalarValue::Timestamp(TimestampScalar {
                        value: nanos,
                        timezone: meta.timezone.clone(),
                    }))
                }
                None => match other.as_str() {
                    Some(text) => parse_timestamp(text, meta),
                    None => Err(cast_error(value, &DataType::Timestamp(meta.clone()), "")),
                },
            },
        }
    }

    fn scalar_to_date(&self, value: &ScalarValue) -> Result<ScalarValue> {
        match value {
            // Normalize to midnight in the timestamp's own zone, then
            // drop the time of day.
            ScalarValue::Timestamp(ts) => {
                let wall = wall_nanos(ts)?;
                Ok(ScalarValue::Date(wall.div_euclid(NANOS_PER_DAY) as i32))
            }
            ScalarValue::Utf8(text) => {
                let date = NaiveDate::parse_from_str(text, "%Y-%m-%d")
                    .map_err(|_| EngineError::cast(format!("unparseable date '{text}'")))?;
                Ok(ScalarValue::Date(
                    (date - NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()).num_days() as i32,
                ))
            }
            // Integers are days since epoch.
            other => match other.to_i64() {
                Some(days) => Ok(ScalarValue::Date(days as i32)),
                None => Err(cast_error(value, &DataType::Date, "")),
            },
        }
    }
}

fn cast_error(value: &ScalarValue, target: &DataType, detail: &str) -> EngineError {
    let detail = if detail.is_empty() {
        String::new()
    } else {
        format!(" ({detail})")
    };
    EngineError::cast(format!(
        "Don't know how to cast {} to {target}{detail}",
        value.datatype()
    ))
}

fn int_cast(
    value: &ScalarValue,
    target: &DataType,
    build: impl Fn(i64) -> Option<ScalarValue>,
) -> Result<ScalarValue> {
    let wide = match value {
        ScalarValue::Boolean(b) => Some(*b as i64),
        ScalarValue::Utf8(s) => s.trim().parse::<i64>().ok(),
        other => match other.to_i64() {
            Some(v) => Some(v),
            None => other.to_f64().map(|v| v.trunc() as i64),
        },
    };
    match wide {
        Some(v) => build(v).ok_or_else(|| cast_error(value, target, "out of range")),
        None => Err(cast_error(value, target, "")),
    }
}

fn float_cast(value: &ScalarValue, target: &DataType) -> Result<f64> {
    match value {
        ScalarValue::Boolean(b) => Ok(*b as i64 as f64),
        ScalarValue::Utf8(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| cast_error(value, target, "unparseable")),
        other => other
            .to_f64()
            .ok_or_else(|| cast_error(value, target, "")),
    }
}

fn parse_tz(name: &str) -> Result<Tz> {
    Tz::from_str(name)
        .map_err(|_| EngineError::cast(format!("unknown timezone '{name}'")))
}

/// Offset from UTC, in nanoseconds, of `tz` at the given instant.
fn tz_offset_nanos(tz: &Tz, instant: i64) -> i64 {
    let utc = DateTime::from_timestamp_nanos(instant).naive_utc();
    tz.offset_from_utc_datetime(&utc).fix().local_minus_utc() as i64 * 1_000_000_000
}

/// The wall-clock nanoseconds a timestamp reads as in its own zone.
pub fn wall_nanos(ts: &TimestampScalar) -> Result<i64> {
    match &ts.timezone {
        None => Ok(ts.value),
        Some(name) => {
            let tz = parse_tz(name)?;
            Ok(ts.value + tz_offset_nanos(&tz, ts.value))
        }
    }
}

/// Interpret wall-clock nanoseconds in the target zone.
pub(crate) fn localize_wall(wall: i64, meta: &TimestampTypeMeta) -> Result<ScalarValue> {
    match &meta.timezone {
        None => Ok(ScalarValue::Timestamp(TimestampScalar::new(wall))),
        Some(name) => {
            let tz = parse_tz(name)?;
            let naive = DateTime::from_timestamp_nanos(wall).naive_utc();
            let localized = tz
                .from_local_datetime(&naive)
                .earliest()
                .ok_or_else(|| EngineError::cast(format!("wall time does not exist in '{name}'")))?;
            let instant = localized
                .timestamp_nanos_opt()
                .ok_or_else(|| EngineError::cast("timestamp out of range"))?;
            Ok(ScalarValue::Timestamp(TimestampScalar {
                value: instant,
                timezone: Some(name.clone()),
            }))
        }
    }
}

/// Timestamp-to-timestamp retargeting.
///
/// Naive to aware localizes in the target zone; aware to aware converts
/// the same instant; aware to naive keeps the local wall clock.
fn retarget_timestamp(ts: &TimestampScalar, meta: &TimestampTypeMeta) -> Result<TimestampScalar> {
    match (&ts.timezone, &meta.timezone) {
        (a, b) if a == b => Ok(ts.clone()),
        (None, Some(_)) => match localize_wall(ts.value, meta)? {
            ScalarValue::Timestamp(out) => Ok(out),
            _ => unreachable!("localize_wall returns a timestamp"),
        },
        (Some(_), None) => Ok(TimestampScalar::new(wall_nanos(ts)?)),
        (Some(_), Some(name)) => {
            // Same instant, new zone metadata.
            parse_tz(name)?;
            Ok(TimestampScalar {
                value: ts.value,
                timezone: Some(name.clone()),
            })
        }
        (None, None) => Ok(ts.clone()),
    }
}

fn parse_timestamp(text: &str, meta: &TimestampTypeMeta) -> Result<ScalarValue> {
    // Offset-carrying text pins the instant; conversion follows.
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        let instant = parsed
            .timestamp_nanos_opt()
            .ok_or_else(|| EngineError::cast("timestamp out of range"))?;
        return Ok(ScalarValue::Timestamp(TimestampScalar {
            value: instant,
            timezone: meta.timezone.clone(),
        }));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d"] {
        let parsed = if format == "%Y-%m-%d" {
            NaiveDate::parse_from_str(text, format).map(|d| d.and_hms_opt(0, 0, 0).unwrap())
        } else {
            NaiveDateTime::parse_from_str(text, format)
        };
        if let Ok(naive) = parsed {
            let wall = naive
                .and_utc()
                .timestamp_nanos_opt()
                .ok_or_else(|| EngineError::cast("timestamp out of range"))?;
            return localize_wall(wall, meta);
        }
    }
    Err(EngineError::cast(format!(
        "unparseable timestamp '{text}'"
    )))
}

fn format_timestamp(ts: &TimestampScalar) -> Result<String> {
    let wall = wall_nanos(ts)?;
    let naive = DateTime::from_timestamp_nanos(wall).naive_utc();
    Ok(match &ts.timezone {
        Some(tz) => format!("{} {tz}", naive.format("%Y-%m-%d %H:%M:%S%.f")),
        None => naive.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrays::datatype::ListTypeMeta;
    use crate::arrays::frame::Field;

    const HOUR: i64 = 3_600_000_000_000;

    #[test]
    fn primitive_types_round_trip() {
        let coercion = TypeCoercion::new();
        let types = [
            DataType::Boolean,
            DataType::Int8,
            DataType::Int16,
            DataType::Int32,
            DataType::Int64,
            DataType::UInt8,
            DataType::UInt16,
            DataType::UInt32,
            DataType::UInt64,
            DataType::Float32,
            DataType::Float64,
            DataType::Utf8,
            DataType::Date,
            DataType::Category,
            DataType::Interval(IntervalUnit::Millisecond),
            DataType::Timestamp(TimestampTypeMeta::new(TimeUnit::Nanosecond)),
            DataType::Timestamp(TimestampTypeMeta::with_timezone(
                TimeUnit::Nanosecond,
                "America/New_York",
            )),
        ];
        for datatype in types {
            let native = coercion.native_type_of(&datatype);
            assert_eq!(coercion.logical_type_of(&native).unwrap(), datatype);
        }
    }

    #[test]
    fn fallback_has_no_logical_type() {
        let coercion = TypeCoercion::new();
        let native = coercion.native_type_of(&DataType::Null);
        let err = coercion.logical_type_of(&native).unwrap_err();
        assert_eq!(err.kind(), quarry_error::ErrorKind::UnsupportedType);
    }

    #[test]
    fn boolean_to_timestamp_always_rejected() {
        let coercion = TypeCoercion::new();
        for value in [true, false] {
            let err = coercion
                .convert_scalar(&ScalarValue::Boolean(value), &DataType::timestamp())
                .unwrap_err();
            assert_eq!(err.kind(), quarry_error::ErrorKind::Cast);
            assert!(err.to_string().contains("int64"));

            let err = coercion
                .convert_scalar(
                    &ScalarValue::Boolean(value),
                    &DataType::Interval(IntervalUnit::Second),
                )
                .unwrap_err();
            assert_eq!(err.kind(), quarry_error::ErrorKind::Cast);
        }
    }

    #[test]
    fn integer_to_timestamp_uses_target_unit() {
        let coercion = TypeCoercion::new();
        let target = DataType::Timestamp(TimestampTypeMeta::new(TimeUnit::Second));
        let out = coercion
            .convert_scalar(&ScalarValue::Int64(2), &target)
            .unwrap();
        assert_eq!(
            out,
            ScalarValue::Timestamp(TimestampScalar::new(2_000_000_000))
        );
    }

    #[test]
    fn naive_to_aware_localizes() {
        let coercion = TypeCoercion::new();
        // Midnight wall clock, localized into a zone 5 hours behind
        // UTC in January.
        let naive = ScalarValue::Timestamp(TimestampScalar::new(0));
        let target = DataType::Timestamp(TimestampTypeMeta::with_timezone(
            TimeUnit::Nanosecond,
            "America/New_York",
        ));
        let out = coercion.convert_scalar(&naive, &target).unwrap();
        match out {
            ScalarValue::Timestamp(ts) => {
                assert_eq!(ts.value, 5 * HOUR);
                assert_eq!(ts.timezone.as_deref(), Some("America/New_York"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn aware_to_aware_converts_instant_unchanged() {
        let coercion = TypeCoercion::new();
        let aware = ScalarValue::Timestamp(TimestampScalar::with_timezone(123, "UTC"));
        let target = DataType::Timestamp(TimestampTypeMeta::with_timezone(
            TimeUnit::Nanosecond,
            "America/New_York",
        ));
        match coercion.convert_scalar(&aware, &target).unwrap() {
            ScalarValue::Timestamp(ts) => {
                assert_eq!(ts.value, 123);
                assert_eq!(ts.timezone.as_deref(), Some("America/New_York"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn timestamp_to_date_truncates_after_zone_conversion() {
        let coercion = TypeCoercion::new();
        // One hour into 1970-01-02 UTC, but still 1970-01-01 in a zone
        // five hours behind.
        let instant = NANOS_PER_DAY + HOUR;
        let aware =
            ScalarValue::Timestamp(TimestampScalar::with_timezone(instant, "America/New_York"));
        assert_eq!(
            coercion.convert_scalar(&aware, &DataType::Date).unwrap(),
            ScalarValue::Date(0)
        );

        let naive = ScalarValue::Timestamp(TimestampScalar::new(instant));
        assert_eq!(
            coercion.convert_scalar(&naive, &DataType::Date).unwrap(),
            ScalarValue::Date(1)
        );
    }

    #[test]
    fn string_parsing() {
        let coercion = TypeCoercion::new();
        let out = coercion
            .convert_scalar(&ScalarValue::from("1970-01-02 00:00:00"), &DataType::timestamp())
            .unwrap();
        assert_eq!(
            out,
            ScalarValue::Timestamp(TimestampScalar::new(NANOS_PER_DAY))
        );

        let out = coercion
            .convert_scalar(&ScalarValue::from("42"), &DataType::Int32)
            .unwrap();
        assert_eq!(out, ScalarValue::Int32(42));
    }

    #[test]
    fn same_type_cast_is_noop() {
        let coercion = TypeCoercion::new();
        let value = ScalarValue::Int64(5);
        assert_eq!(
            coercion.convert_scalar(&value, &DataType::Int64).unwrap(),
            value
        );
    }

    #[test]
    fn list_cast_requires_primitive_element() {
        let coercion = TypeCoercion::new();
        let col = Column::int64s(&[1]);
        let nested = DataType::List(ListTypeMeta::new(DataType::List(ListTypeMeta::new(
            DataType::Int64,
        ))));
        let err = coercion.convert_column(&col, &nested).unwrap_err();
        assert_eq!(err.kind(), quarry_error::ErrorKind::Cast);
    }

    #[test]
    fn apply_schema_converts_and_names_offender() {
        let coercion = TypeCoercion::new();
        let frame = DataFrame::from_columns([
            ("a".to_string(), Column::utf8s(&["1", "2"])),
        ])
        .unwrap();
        let schema = Schema::new([Field::new("a", DataType::Int64)]);
        let out = coercion.apply_schema(&frame, &schema).unwrap();
        assert_eq!(out.column("a").unwrap().as_ref(), &Column::int64s(&[1, 2]));

        let bad = DataFrame::from_columns([
            ("a".to_string(), Column::utf8s(&["x"])),
        ])
        .unwrap();
        let err = coercion.apply_schema(&bad, &schema).unwrap_err();
        assert!(err.to_string().contains("'a'"));
    }
}
